//! Built-in profiler families.

pub mod linux;
pub mod network;
pub mod windows;

pub use linux::Linux;
pub use network::NetworkDevice;
pub use windows::Windows;

use crate::transport::Row;

/// Trimmed, non-empty field of a row.
pub(crate) fn field<'r>(row: &'r Row, name: &str) -> Option<&'r str> {
    row.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// Dotted IPv4 netmask for a prefix length.
pub(crate) fn ipv4_netmask(prefix: u8) -> Option<String> {
    if prefix > 32 {
        return None;
    }
    let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
    Some(std::net::Ipv4Addr::from(mask).to_string())
}
