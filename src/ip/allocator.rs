//! Address selection logic.
//!
//! Pure functions used when handing out addresses: the sequential ping
//! filter and the congruent-range search used to size DHCP scopes.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::IpNet;

use crate::am::AmError;

/// Convert an address to an integer so neighbours can be compared.
fn to_u128(ip: IpAddr) -> u128 {
    match ip {
        IpAddr::V4(v4) => u32::from(v4) as u128,
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Move an address by `delta`, staying within its family.
pub fn offset(ip: IpAddr, delta: i128) -> Option<IpAddr> {
    let base = to_u128(ip);
    let value = if delta >= 0 {
        base.checked_add(delta.unsigned_abs())?
    } else {
        base.checked_sub(delta.unsigned_abs())?
    };
    match ip {
        IpAddr::V4(_) => u32::try_from(value).ok().map(|v| IpAddr::V4(Ipv4Addr::from(v))),
        IpAddr::V6(_) => Some(IpAddr::V6(Ipv6Addr::from(value))),
    }
}

fn parse_address(text: &str) -> Result<IpAddr, AmError> {
    let address = text.split('/').next().unwrap_or_default().trim();
    address
        .parse::<IpAddr>()
        .map_err(|_| AmError::InvalidAddress(text.to_string()))
}

/// Default gateway of a subnet: the address part plus one.
///
/// ```
/// use ipam_onboard::ip::gateway_of;
///
/// assert_eq!(gateway_of("10.35.105.0/29").unwrap().to_string(), "10.35.105.1");
/// ```
pub fn gateway_of(subnet: &str) -> Result<IpAddr, AmError> {
    let address = parse_address(subnet)?;
    offset(address, 1).ok_or_else(|| AmError::InvalidAddress(subnet.to_string()))
}

/// The subnet whose gateway is `gateway`: the address one below, with `prefix`.
pub fn subnet_for_gateway(gateway: &str, prefix: u8) -> Result<String, AmError> {
    let address = parse_address(gateway)?;
    let network = offset(address, -1).ok_or_else(|| AmError::InvalidAddress(gateway.to_string()))?;
    Ok(format!("{}/{}", network, prefix))
}

/// Whether an address block is IPv6.
pub fn is_ipv6_block(block: &str) -> bool {
    match block.trim().parse::<IpNet>() {
        Ok(net) => matches!(net, IpNet::V6(_)),
        Err(_) => crate::am::response::find_ipv6_with_prefix(block).is_some(),
    }
}

/// Address part of an address block (`10.34.182.128/27` -> `10.34.182.128`).
pub fn block_address(block: &str) -> Result<IpAddr, AmError> {
    parse_address(block)
}

/// Normalise an address block the way the tool prints it.
pub fn normalize_block(block: &str) -> Result<String, AmError> {
    let trimmed = block.trim();
    if let Ok(net) = trimmed.parse::<IpNet>() {
        return Ok(net.to_string());
    }
    trimmed
        .parse::<IpAddr>()
        .map(|ip| ip.to_string())
        .map_err(|_| AmError::InvalidAddress(block.to_string()))
}

/// Walk `candidates` in order, skipping those `is_active` reports as in use,
/// until `count` addresses have been collected.
pub fn take_inactive<F>(candidates: &[String], count: usize, mut is_active: F) -> Vec<String>
where
    F: FnMut(&str) -> bool,
{
    let mut free = Vec::with_capacity(count);
    for candidate in candidates {
        if free.len() >= count {
            break;
        }
        if is_active(candidate) {
            log::debug!("Skipping {}: address answers ping", candidate);
            continue;
        }
        free.push(candidate.clone());
    }
    free
}

/// Find `size` numerically consecutive addresses among `available`.
///
/// `available` is in the order the tool lists free addresses (ascending).
/// Windows are tried from the top of the list down so the highest block wins.
/// Returns the `(low, high)` ends of the first consecutive window.
pub fn congruent_range(available: &[IpAddr], size: usize) -> Option<(IpAddr, IpAddr)> {
    if size == 0 || available.len() < size {
        return None;
    }
    // `end` runs down to `size`, so a list of exactly `size` free addresses
    // is itself a candidate. Whole addresses are compared, not last octets.
    (size..=available.len()).rev().find_map(|end| {
        let window = &available[end - size..end];
        let consecutive = window
            .windows(2)
            .all(|pair| to_u128(pair[1]) == to_u128(pair[0]).wrapping_add(1));
        consecutive.then(|| (window[0], window[size - 1]))
    })
}

/// Parse a list of address strings, dropping anything that is not an address.
pub fn parse_addresses(items: &[String]) -> Vec<IpAddr> {
    items
        .iter()
        .filter_map(|item| match item.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                log::warn!("Ignoring '{}' in address list: not an IP address", item);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ips(list: &[&str]) -> Vec<IpAddr> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_gateway_of() {
        assert_eq!(gateway_of("192.168.137.8/29").unwrap(), "192.168.137.9".parse::<IpAddr>().unwrap());
        assert_eq!(gateway_of("2001:db8::/64").unwrap(), "2001:db8::1".parse::<IpAddr>().unwrap());
        assert!(gateway_of("not-an-ip/29").is_err());
        assert!(gateway_of("255.255.255.255/32").is_err());
    }

    #[test]
    fn test_subnet_for_gateway() {
        assert_eq!(subnet_for_gateway("10.35.105.1", 29).unwrap(), "10.35.105.0/29");
        assert_eq!(subnet_for_gateway(" 10.35.106.1 ", 29).unwrap(), "10.35.106.0/29");
        assert!(subnet_for_gateway("0.0.0.0", 29).is_err());
    }

    #[test]
    fn test_is_ipv6_block() {
        assert!(is_ipv6_block("2001:420:30a:200::/56"));
        assert!(!is_ipv6_block("192.168.76.0/22"));
    }

    #[test]
    fn test_normalize_block() {
        assert_eq!(normalize_block("10.34.182.128/27").unwrap(), "10.34.182.128/27");
        assert_eq!(normalize_block("10.34.182.128").unwrap(), "10.34.182.128");
        assert!(normalize_block("garbage").is_err());
    }

    #[test]
    fn test_take_inactive_skips_live_addresses() {
        let candidates: Vec<String> = ["10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut pinged = Vec::new();
        let free = take_inactive(&candidates, 2, |ip| {
            pinged.push(ip.to_string());
            ip == "10.0.0.3"
        });
        assert_eq!(free, vec!["10.0.0.2", "10.0.0.4"]);
        // stops as soon as enough are collected
        assert_eq!(pinged, vec!["10.0.0.2", "10.0.0.3", "10.0.0.4"]);
    }

    #[test]
    fn test_take_inactive_short_supply() {
        let candidates = vec!["10.0.0.2".to_string()];
        assert_eq!(take_inactive(&candidates, 3, |_| false), vec!["10.0.0.2"]);
        assert!(take_inactive(&candidates, 1, |_| true).is_empty());
    }

    #[test]
    fn test_congruent_range_prefers_highest_block() {
        let available = ips(&[
            "10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5", "10.0.0.6",
            "10.0.0.9", "10.0.0.10", "10.0.0.11", "10.0.0.12", "10.0.0.13",
        ]);
        let (low, high) = congruent_range(&available, 5).unwrap();
        assert_eq!(low.to_string(), "10.0.0.9");
        assert_eq!(high.to_string(), "10.0.0.13");
    }

    #[test]
    fn test_congruent_range_uses_whole_list() {
        let available = ips(&["10.0.0.2", "10.0.0.3", "10.0.0.4", "10.0.0.5", "10.0.0.6"]);
        let (low, high) = congruent_range(&available, 5).unwrap();
        assert_eq!(low.to_string(), "10.0.0.2");
        assert_eq!(high.to_string(), "10.0.0.6");
    }

    #[test]
    fn test_congruent_range_with_gaps() {
        let available = ips(&["10.0.0.2", "10.0.0.4", "10.0.0.5", "10.0.0.7"]);
        assert_eq!(congruent_range(&available, 3), None);
        let (low, high) = congruent_range(&available, 2).unwrap();
        assert_eq!((low.to_string(), high.to_string()), ("10.0.0.4".to_string(), "10.0.0.5".to_string()));
    }

    #[test]
    fn test_congruent_range_crosses_octet_boundary() {
        let available = ips(&["10.0.0.254", "10.0.0.255", "10.0.1.0"]);
        let (low, high) = congruent_range(&available, 3).unwrap();
        assert_eq!(low.to_string(), "10.0.0.254");
        assert_eq!(high.to_string(), "10.0.1.0");
    }

    #[test]
    fn test_congruent_range_degenerate_sizes() {
        let available = ips(&["10.0.0.2"]);
        assert_eq!(congruent_range(&available, 0), None);
        assert_eq!(congruent_range(&available, 2), None);
        assert!(congruent_range(&available, 1).is_some());
    }

    #[test]
    fn test_parse_addresses_drops_noise() {
        let items = vec!["10.0.0.2".to_string(), "ERROR".to_string(), "2001:db8::1".to_string()];
        assert_eq!(parse_addresses(&items).len(), 2);
    }
}
