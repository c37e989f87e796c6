//! Common network types for the Cheetah load-balancer control plane.
//!
//! This crate holds the small set of value types shared by the device
//! boundary and the configuration layer:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//!
//! IPv4 addresses use [`std::net::Ipv4Addr`] directly.

mod mac;

pub use mac::MacAddress;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("MAC address value out of range: 0x{0:x} (must fit in 48 bits)")]
    MacOutOfRange(u64),
}
