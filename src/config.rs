use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use ipnet::IpNet;

/// Script name looked up next to the executable when none is configured
pub const DEFAULT_SCRIPT_NAME: &str = "eman-am.pl";
/// Fallback location of the address-management script
pub const FALLBACK_SCRIPT_PATH: &str = "../am_wrapper/am_wrapper/eman-am.pl";

/// Complete tool configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub contact: ContactConfig,
    #[serde(default)]
    pub onboarding: OnboardingConfig,
    #[serde(default = "default_regions")]
    pub regions: BTreeMap<String, RegionConfig>,
    /// Site code -> DHCP server, used by legacy scope creation
    #[serde(default = "default_sites")]
    pub sites: BTreeMap<String, String>,
}

/// How the address-management tool is invoked
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ClientConfig {
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
    /// Exported to the tool as PERL_LWP_SSL_VERIFY_HOSTNAME
    #[serde(default)]
    pub verify_tls_hostname: bool,
    #[serde(default = "default_ping_timeout", with = "humantime_serde")]
    pub ping_timeout: Duration,
}

/// Contact recorded on every subnet and interface we create
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContactConfig {
    #[serde(default = "default_contact_name")]
    pub name: String,
    #[serde(default = "default_contact_kind")]
    pub kind: String,
}

/// Knobs for the onboarding run
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OnboardingConfig {
    #[serde(default = "default_subnet_prefix")]
    pub subnet_prefix: u8,
    /// Number of DHCP addresses per scope (and DHCP interfaces per host)
    #[serde(default = "default_scope_size")]
    pub scope_size: usize,
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    #[serde(default = "default_selection_tags")]
    pub selection_tags: Vec<String>,
    #[serde(default = "default_function")]
    pub function: String,
    #[serde(default = "default_report_prefix")]
    pub report_prefix: String,
}

/// Per-region address block and DHCP settings
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RegionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_block: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp_server: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub call_managers: Vec<String>,
}

impl RegionConfig {
    /// Call managers in the comma separated form the tool expects
    pub fn call_manager_list(&self) -> String {
        self.call_managers.join(",")
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.client.interpreter.trim().is_empty() {
            return Err(ValidationError::InvalidClient(
                "interpreter cannot be empty".to_string(),
            ));
        }

        let onboarding = &self.onboarding;
        if onboarding.subnet_prefix == 0 || onboarding.subnet_prefix > 128 {
            return Err(ValidationError::InvalidOnboarding(format!(
                "subnet_prefix {} out of range (1-128)",
                onboarding.subnet_prefix
            )));
        }
        if onboarding.scope_size == 0 {
            return Err(ValidationError::InvalidOnboarding(
                "scope_size must be at least 1".to_string(),
            ));
        }
        if onboarding.max_rows == 0 {
            return Err(ValidationError::InvalidOnboarding(
                "max_rows must be at least 1".to_string(),
            ));
        }

        for (code, region) in &self.regions {
            if let Some(block) = &region.address_block {
                if block.trim().parse::<IpNet>().is_err() {
                    return Err(ValidationError::InvalidRegion(format!(
                        "region '{}': address_block '{}' is not a CIDR block",
                        code, block
                    )));
                }
            }
            for manager in &region.call_managers {
                if manager.trim().parse::<IpAddr>().is_err() {
                    return Err(ValidationError::InvalidRegion(format!(
                        "region '{}': call manager '{}' is not an IP address",
                        code, manager
                    )));
                }
            }
        }

        Ok(())
    }

    /// Look up a region by code, ignoring case
    pub fn region(&self, code: &str) -> Option<&RegionConfig> {
        let code = code.trim();
        self.regions.get(&code.to_uppercase()).or_else(|| {
            self.regions
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(code))
                .map(|(_, region)| region)
        })
    }

    /// DHCP server for a site code (`mtv`, `sjc`, `rtp`, ...).
    ///
    /// An exact match wins, otherwise the first known code contained in `site`.
    pub fn dhcp_server_for_site(&self, site: &str) -> Option<&str> {
        site_dhcp_server(&self.sites, site)
    }
}

/// Site lookup shared by [`Config::dhcp_server_for_site`] and the client,
/// which only keeps the site table.
pub fn site_dhcp_server<'a>(sites: &'a BTreeMap<String, String>, site: &str) -> Option<&'a str> {
    let site = site.trim().to_lowercase();
    if site.is_empty() {
        return None;
    }
    sites
        .get(&site)
        .or_else(|| {
            sites
                .iter()
                .find(|(code, _)| site.contains(code.as_str()))
                .map(|(_, server)| server)
        })
        .map(String::as_str)
}

impl ClientConfig {
    /// Path of the address-management script to run
    pub fn resolve_script(&self) -> PathBuf {
        if let Some(script) = &self.script {
            return script.clone();
        }
        let beside_exe = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join(DEFAULT_SCRIPT_NAME)));
        match beside_exe {
            Some(path) if path.exists() => path,
            _ => PathBuf::from(FALLBACK_SCRIPT_PATH),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid client configuration: {0}")]
    InvalidClient(String),
    #[error("Invalid onboarding configuration: {0}")]
    InvalidOnboarding(String),
    #[error("Invalid region configuration: {0}")]
    InvalidRegion(String),
}

fn default_interpreter() -> String {
    "perl".to_string()
}

fn default_ping_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_contact_name() -> String {
    "ete-sec".to_string()
}

fn default_contact_kind() -> String {
    "Mail Alias".to_string()
}

fn default_subnet_prefix() -> u8 {
    29
}

fn default_scope_size() -> usize {
    5
}

fn default_max_rows() -> usize {
    1000
}

fn default_selection_tags() -> Vec<String> {
    vec!["IPPhones".to_string(), "OtherDevices".to_string()]
}

fn default_function() -> String {
    "LAN".to_string()
}

fn default_report_prefix() -> String {
    "onboarding".to_string()
}

fn region(
    address_block: Option<&str>,
    dhcp_policy: Option<&str>,
    dhcp_server: Option<&str>,
    call_managers: &[&str],
) -> RegionConfig {
    RegionConfig {
        address_block: address_block.map(str::to_string),
        dhcp_policy: dhcp_policy.map(str::to_string),
        dhcp_server: dhcp_server.map(str::to_string),
        call_managers: call_managers.iter().map(|s| s.to_string()).collect(),
    }
}

// Placeholder values; real deployments ship their own regions file.
fn default_regions() -> BTreeMap<String, RegionConfig> {
    let mut regions = BTreeMap::new();
    regions.insert("SJC".to_string(), region(Some("192.168.0.1/21"), None, None, &[]));
    regions.insert("RTP".to_string(), region(Some("192.168.76.0/22"), None, None, &[]));
    regions.insert("AER".to_string(), region(Some("192.168.232.0/21"), None, None, &[]));
    regions.insert(
        "CHK".to_string(),
        region(
            None,
            Some("Chicago Wireless LAN"),
            Some("server-chk-7-k"),
            &["192.168.146.221", "192.168.131.161"],
        ),
    );
    regions.insert(
        "DFW".to_string(),
        region(
            None,
            Some("DFW Wireless LAN"),
            Some("server-dfw-7-k"),
            &["192.168.36.165", "192.168.24.202"],
        ),
    );
    regions.insert(
        "HOL".to_string(),
        region(
            None,
            Some("Holland WLAN"),
            Some("server-hol-7-k"),
            &["192.168.75.175", "192.168.100.5"],
        ),
    );
    regions.insert(
        "TEST".to_string(),
        region(
            Some("192.168.137.0/24"),
            Some("Home Based LAN"),
            Some("server-test-7-k"),
            &["192.168.146.221", "192.168.131.161"],
        ),
    );
    regions
}

fn default_sites() -> BTreeMap<String, String> {
    [
        ("mtv", "dhcp-mtv1-1-l"),
        ("sjc", "dhcp-mtv1-1-l"),
        ("aer", "dhcp-aer1-1-l"),
        ("ams", "dhcp-aer1-1-l"),
        ("gpk", "dhcp-aer1-1-l"),
        ("bgl", "dhcp-blr1-1-l"),
        ("bxb", "dhcp-bxb1-1-l"),
        ("hkg", "dhcp-hkg1-1-l"),
        ("rch", "dhcp-rch1-1-l"),
        ("rtp", "dhcp-rtp5-1-l"),
        ("sng", "dhcp-sin1-1-l"),
        ("syd", "dhcp-syd1-1-l"),
        ("tky", "dhcp-tyo1-1-l"),
    ]
    .into_iter()
    .map(|(site, server)| (site.to_string(), server.to_string()))
    .collect()
}

/// Default implementations
impl Default for Config {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            contact: ContactConfig::default(),
            onboarding: OnboardingConfig::default(),
            regions: default_regions(),
            sites: default_sites(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            script: None,
            verify_tls_hostname: false,
            ping_timeout: default_ping_timeout(),
        }
    }
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            name: default_contact_name(),
            kind: default_contact_kind(),
        }
    }
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            subnet_prefix: default_subnet_prefix(),
            scope_size: default_scope_size(),
            max_rows: default_max_rows(),
            selection_tags: default_selection_tags(),
            function: default_function(),
            report_prefix: default_report_prefix(),
        }
    }
}
