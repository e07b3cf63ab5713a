//! Parsing of the free-text responses printed by the address-management tool.
//!
//! The tool reports outcomes as human readable sentences such as
//! `Successfully added Subnet 10.34.33.20/30` or
//! `ERROR: No interface found for host.example.com`. Everything we need is
//! pulled out with the patterns below.

use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;

/// Literal markers searched for in tool output.
pub const SUCCESS_MARKER: &str = "Success";
pub const ERROR_MARKER: &str = "ERROR";
pub const UNAUTHORIZED_MARKER: &str = "Unauthorized";

/// Compiled address patterns
pub struct AddressPatterns {
    /// Match: "10.34.33.20/30"
    pub ipv4_with_prefix: Regex,
    /// Match: "10.34.33.20"
    pub ipv4: Regex,
    /// Match: "2001:420:30a:200::a10/127"
    pub ipv6_with_prefix: Regex,
    /// Match: "2001:420:30a:200:0:0:0:a10"
    pub ipv6: Regex,
    /// Match: "0 received" (Linux) or "0 packets received" (BSD)
    pub ping_no_reply: Regex,
}

const IPV6_BODY: &str = concat!(
    r"(([0-9a-fA-F]{1,4}:){7,7}[0-9a-fA-F]{1,4}|([0-9a-fA-F]{1,4}:){1,7}:|",
    r"([0-9a-fA-F]{1,4}:){1,6}:[0-9a-fA-F]{1,4}|([0-9a-fA-F]{1,4}:){1,5}",
    r"(:[0-9a-fA-F]{1,4}){1,2}|([0-9a-fA-F]{1,4}:){1,4}(:[0-9a-fA-F]{1,4}){1,3}|",
    r"([0-9a-fA-F]{1,4}:){1,3}(:[0-9a-fA-F]{1,4}){1,4}|([0-9a-fA-F]{1,4}:){1,2}",
    r"(:[0-9a-fA-F]{1,4}){1,5}|[0-9a-fA-F]{1,4}:((:[0-9a-fA-F]{1,4}){1,6})|:",
    r"((:[0-9a-fA-F]{1,4}){1,7}|:)|fe80:(:[0-9a-fA-F]{0,4}){0,4}%[0-9a-zA-Z]{1,}|",
    r"::(ffff(:0{1,4}){0,1}:){0,1}((25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9])\.){3,3}",
    r"(25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9])|([0-9a-fA-F]{1,4}:){1,4}:((25[0-5]|",
    r"(2[0-4]|1{0,1}[0-9]){0,1}[0-9])\.){3,3}(25[0-5]|(2[0-4]|1{0,1}[0-9]){0,1}[0-9]))",
);

impl AddressPatterns {
    pub fn new() -> Self {
        Self {
            ipv4_with_prefix: Regex::new(r"([0-9]{1,3}\.){3}[0-9]{1,3}/([0-9])([0-9])?")
                .expect("Invalid ipv4_with_prefix regex"),
            ipv4: Regex::new(r"([0-9]{1,3}\.){3}[0-9]{1,3}").expect("Invalid ipv4 regex"),
            ipv6_with_prefix: Regex::new(&format!("{}/([0-9])([0-9])([0-9])?", IPV6_BODY))
                .expect("Invalid ipv6_with_prefix regex"),
            ipv6: Regex::new(IPV6_BODY).expect("Invalid ipv6 regex"),
            ping_no_reply: Regex::new(r"\b0 (packets )?received").expect("Invalid ping_no_reply regex"),
        }
    }
}

impl Default for AddressPatterns {
    fn default() -> Self {
        Self::new()
    }
}

/// Global patterns instance
pub static PATTERNS: LazyLock<AddressPatterns> = LazyLock::new(AddressPatterns::new);

fn first_match(re: &Regex, text: &str) -> Option<String> {
    re.find(text).map(|m| m.as_str().to_string())
}

/// First IPv4 address carrying a prefix length, e.g. `10.34.33.20/30`.
pub fn find_ipv4_with_prefix(text: &str) -> Option<String> {
    first_match(&PATTERNS.ipv4_with_prefix, text)
}

/// First IPv4 address, prefix length not included.
pub fn find_ipv4(text: &str) -> Option<String> {
    first_match(&PATTERNS.ipv4, text)
}

/// First IPv6 address carrying a prefix length, e.g. `2001:420:30a:200::a10/127`.
pub fn find_ipv6_with_prefix(text: &str) -> Option<String> {
    first_match(&PATTERNS.ipv6_with_prefix, text)
}

/// First IPv6 address, prefix length not included.
///
/// The pattern's alternatives are tried leftmost first, so a compressed
/// address with groups after `::` comes back cut at the `::`.
pub fn find_ipv6(text: &str) -> Option<String> {
    first_match(&PATTERNS.ipv6, text)
}

/// Pull the address out of a tool response.
///
/// Tried in order: IPv4 with prefix, IPv4, IPv6 with prefix, IPv6.
///
/// ```
/// use ipam_onboard::am::response::ip_from_response;
///
/// assert_eq!(
///     ip_from_response("Successfully added Subnet 10.34.33.20/30").as_deref(),
///     Some("10.34.33.20/30")
/// );
/// assert_eq!(ip_from_response("no address here"), None);
/// ```
pub fn ip_from_response(text: &str) -> Option<String> {
    find_ipv4_with_prefix(text)
        .or_else(|| find_ipv4(text))
        .or_else(|| find_ipv6_with_prefix(text))
        .or_else(|| find_ipv6(text))
}

pub fn is_success(text: &str) -> bool {
    text.contains(SUCCESS_MARKER)
}

pub fn is_error(text: &str) -> bool {
    text.contains(ERROR_MARKER)
}

pub fn is_unauthorized(text: &str) -> bool {
    text.contains(UNAUTHORIZED_MARKER)
}

/// Split a `-comma` style response into its non-empty, trimmed items.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(|item| item.replace(' ', ""))
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Split an interface record (`ip:fqdn` or `fqdn:ip`) into its two halves.
///
/// IPv6 addresses contain colons themselves, so the split point is chosen
/// so that whichever half is an address stays intact.
pub fn split_pair(item: &str) -> Option<(String, String)> {
    let item = item.trim();
    if let Some((head, tail)) = item.rsplit_once(':') {
        if head.parse::<IpAddr>().is_ok() {
            return Some((head.to_string(), tail.to_string()));
        }
    }
    item.split_once(':')
        .map(|(head, tail)| (head.to_string(), tail.to_string()))
}

/// One scope listed by `scope-info -details`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeSummary {
    pub name: String,
    pub range: Option<String>,
}

/// Collect the `Scope Name:` / `Range:` pairs from a `scope-info` response.
pub fn parse_scope_info(text: &str) -> Vec<ScopeSummary> {
    let mut scopes: Vec<ScopeSummary> = Vec::new();
    for line in text.split(['\n', ',']) {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if key.contains("Scope Name") {
            scopes.push(ScopeSummary { name: value, range: None });
        } else if key.contains("Range") {
            if let Some(scope) = scopes.last_mut() {
                scope.range = Some(value);
            }
        }
    }
    scopes
}

/// Whether `ping` output shows that nothing answered.
pub fn is_ping_inactive(output: &str) -> bool {
    PATTERNS.ping_no_reply.is_match(output)
}
