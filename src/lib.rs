//! # ipam-onboard - address management automation for device onboarding
//!
//! This library drives a command-line address-management (IPAM) tool to
//! reserve subnets, DHCP scopes and interfaces for new devices.
//!
//! ## Overview
//!
//! The IPAM tool is only reachable through a flag-based CLI that answers in
//! free text. The library renders typed requests into `-name=value` command
//! lines, runs them through a pluggable [`am::CommandRunner`] and scrapes the
//! responses with regular expressions.
//!
//! ## Architecture
//!
//! - `am`: the tool client, its request types, flag rendering and response parsing
//! - `ip`: pure address selection (ping filtering, congruent DHCP ranges)
//! - `config`: typed configuration with built-in region and site tables
//! - `config_loader`: YAML loading and validation
//! - `onboarding`: CSV host list, per-host provisioning and the xlsx report
//! - `orchestrator`: a complete onboarding run
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ipam_onboard::am::{AmClient, Count};
//! use ipam_onboard::config_loader;
//!
//! let config = config_loader::load_or_default(None)?;
//! let client = AmClient::with_shell("svc-user", "secret", &config);
//!
//! let free = client.find_next_ip("10.35.105.0/29", Count::Exactly(2), true)?;
//! println!("{:?}", free);
//! # Ok::<(), color_eyre::Report>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! client:
//!   interpreter: "perl"
//!   script: "/opt/am/eman-am.pl"
//!   ping_timeout: "1s"
//!
//! onboarding:
//!   subnet_prefix: 29
//!   scope_size: 5
//!
//! regions:
//!   SJC:
//!     address_block: "10.20.0.0/21"
//!     dhcp_policy: "San Jose LAN"
//!     dhcp_server: "dhcp-sjc-1"
//!     call_managers: ["10.1.1.1", "10.1.1.2"]
//! ```
//!
//! ## Error Handling
//!
//! Tool operations return [`am::AmResult`]; file handling and whole runs use
//! `color_eyre` for error reports with context.

pub mod am;
pub mod config;
pub mod config_loader;
pub mod ip;
pub mod onboarding;
pub mod orchestrator;
