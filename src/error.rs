//! Error types for the device link.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use device_link::{DeviceLink, Result};
//!
//! async fn example(link: &DeviceLink) -> Result<()> {
//!     let info = link.read_device_info().await?;
//!     println!("firmware {}", info.firmware_version);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidEndpoint`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`], [`Error::NotConnected`] |
//! | Protocol | [`Error::Protocol`], [`Error::DeviceRejected`] |
//! | Correlation | [`Error::WaitTimeout`], [`Error::Timeout`] |
//! | Scan | [`Error::ScanInProgress`], [`Error::ScanBusy`], [`Error::ScanAborted`] |
//! | External | [`Error::Json`], [`Error::WebSocket`] |
//!
//! Transport problems never escape the link loop as errors; they only show up
//! here when a specific caller asked for something that needed the transport.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::WaiterId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when link options cannot be loaded or are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Endpoint URL could not be built or parsed.
    #[error("Invalid endpoint '{url}': {message}")]
    InvalidEndpoint {
        /// The offending URL or host.
        url: String,
        /// Parser message.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when a transport to an endpoint cannot be opened.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timed out waiting for the transport to open.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// The link loop has shut down.
    ///
    /// Returned when every handle was dropped or the loop exited.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The transport is not open right now.
    ///
    /// Nothing is queued; re-read device state after reconnecting.
    #[error("Not connected")]
    NotConnected,

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected message shape.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// The device answered with `{"error": true, "message": ...}`.
    ///
    /// The message text is the device's own, passed through verbatim.
    #[error("Device rejected request: {message}")]
    DeviceRejected {
        /// Device-supplied message.
        message: String,
    },

    // ========================================================================
    // Correlation Errors
    // ========================================================================
    /// A registered waiter saw no matching message in time.
    #[error("Waiter {waiter_id} timed out after {timeout_ms}ms")]
    WaitTimeout {
        /// The waiter that expired.
        waiter_id: WaiterId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Operation timeout.
    ///
    /// Returned when a multi-step operation exceeds a phase deadline.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Scan Errors
    // ========================================================================
    /// A band scan is already in flight on this link.
    #[error("Band scan already in progress")]
    ScanInProgress,

    /// The device stayed busy after the single start retry.
    #[error("Device busy: {message}")]
    ScanBusy {
        /// Device-supplied message.
        message: String,
    },

    /// The scan session was reset by a disconnect or close.
    #[error("Band scan aborted")]
    ScanAborted,

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Channel receive error.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid endpoint error.
    #[inline]
    pub fn invalid_endpoint(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a device rejection error.
    #[inline]
    pub fn device_rejected(message: impl Into<String>) -> Self {
        Self::DeviceRejected {
            message: message.into(),
        }
    }

    /// Creates a waiter timeout error.
    #[inline]
    pub fn wait_timeout(waiter_id: WaiterId, timeout_ms: u64) -> Self {
        Self::WaitTimeout {
            waiter_id,
            timeout_ms,
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a scan busy error.
    #[inline]
    pub fn scan_busy(message: impl Into<String>) -> Self {
        Self::ScanBusy {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::Timeout { .. } | Self::WaitTimeout { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionTimeout { .. }
                | Self::ConnectionClosed
                | Self::NotConnected
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the device itself reported the failure.
    #[inline]
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::DeviceRejected { .. } | Self::ScanBusy { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed on retry once the link is back.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. }
                | Self::NotConnected
                | Self::Timeout { .. }
                | Self::WaitTimeout { .. }
                | Self::ScanBusy { .. }
                | Self::ScanAborted
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
