//! Typed device API.
//!
//! Each operation is a correlated exchange on [`crate::DeviceLink`]: one
//! request, one predicate picking the reply, one timeout from
//! [`crate::Timing`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `address` | IPv4/IPv6/MAC codecs |
//! | `command` | Push buttons, factory reset |
//! | `info` | Device identity, AP clients |
//! | `network` | AP, station and credential settings, Wi-Fi scan |
//! | `scan_config` | Stored RF scan range |

// ============================================================================
// Submodules
// ============================================================================

/// Address codecs.
pub mod address;

/// Button emulation.
pub mod command;

/// Device identity and AP clients.
pub mod info;

/// Network settings and Wi-Fi scanning.
pub mod network;

/// Stored RF scan configuration.
pub mod scan_config;

// ============================================================================
// Re-exports
// ============================================================================

pub use address::{MacAddr, decode_ipv4, decode_ipv6, decode_mac, encode_ipv4, encode_ipv6};
pub use command::PushButton;
pub use info::{ApClients, DeviceInfo, DhcpClient};
pub use network::{ApSettings, Credentials, ScannedNetwork, StationSettings, WifiChannel};
