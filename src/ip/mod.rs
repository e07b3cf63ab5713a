//! IP address selection.
//!
//! Helpers for deriving gateways and neighbouring subnets, plus the
//! ping filter and congruent-range search used when carving DHCP scopes
//! out of the free addresses reported by the address-management tool.

pub mod allocator;

// Re-export commonly used functions
pub use allocator::{
    congruent_range, gateway_of, is_ipv6_block, normalize_block, subnet_for_gateway,
    take_inactive,
};
