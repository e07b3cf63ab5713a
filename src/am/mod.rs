//! Address-management tool integration.
//!
//! The tool is a command-line program driven by `-name=value` flags that
//! answers in free text. This module builds those command lines, runs them
//! and scrapes the answers.

pub mod client;
pub mod error;
pub mod flags;
pub mod requests;
pub mod response;
pub mod runner;

pub use client::{AmClient, InterfaceKey, InterfaceRecord};
pub use error::{AmError, AmResult};
pub use flags::CommandFlags;
pub use requests::{
    AddressBlockRequest, Count, InterfaceQuery, InterfaceRequest, NextAvailableQuery,
    ScopeRequest, ScopeUpdate, SearchFilters, SearchType, SubnetRequest,
};
pub use runner::{CommandOutput, CommandRunner, ShellRunner};
