//! Device Link - WebSocket client for RF-control devices.
//!
//! This library talks to an embedded RF-control device over a single
//! WebSocket channel carrying untyped JSON. It owns the connection, sorts
//! inbound messages into channels, pairs replies with requests without
//! protocol-level IDs, and drives the multi-step band scan.
//!
//! # Architecture
//!
//! - **[`DeviceLink`]**: cloneable handle; every method posts a command to
//!   the link loop and awaits a oneshot reply
//! - **Link loop**: one tokio task owning the socket, the waiters and the
//!   scan session; the only mutator of all three
//! - **Classifier**: acks, scan stream events and subsystem read results
//!   are told apart by their keys, in a fixed priority order
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use device_link::{DeviceLink, Result, ScanParams};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let link = DeviceLink::builder()
//!         .fallback_hosts(["192.168.1.2"])
//!         .connect()?;
//!
//!     link.wait_connected(Duration::from_secs(5)).await?;
//!
//!     let info = link.read_device_info().await?;
//!     println!("{} firmware {}", info.device_name, info.firmware_version);
//!
//!     let summary = link.start_scan(ScanParams::new(300.0, 350.0, 0.25, 20)).await?;
//!     println!("{} hits", summary.hits);
//!
//!     link.close().await
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`DeviceLink`], [`LinkBuilder`], [`LinkOptions`] |
//! | [`device`] | Typed device operations and settings |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire requests, inbound classification |
//! | [`scan`] | Band scan state machine and display helpers |
//! | [`transport`] | Endpoints, correlation, link loop |

// ============================================================================
// Modules
// ============================================================================

/// Link handle, builder and configuration.
pub mod client;

/// Typed device operations.
pub mod device;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Wire protocol: outbound requests and inbound classification.
pub mod protocol;

/// Band scan orchestration.
pub mod scan;

/// WebSocket transport layer.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{DeviceLink, LinkBuilder, LinkOptions, Timing};

// Device types
pub use device::{
    ApClients, ApSettings, Credentials, DeviceInfo, DhcpClient, MacAddr, PushButton,
    ScannedNetwork, StationSettings, WifiChannel,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::WaiterId;

// Protocol types
pub use protocol::{Ack, Channel, Hit, Inbound, Progress, Request, Setting, StreamKind, Subsystem};

// Scan types
pub use scan::{
    HitLog, ScanEvent, ScanParams, ScanPhase, ScanProgress, ScanSession, ScanSummary,
};

// Transport types
pub use transport::{ConnectionState, Endpoint, EndpointConfig, LinkEvent, LinkHandlers};
