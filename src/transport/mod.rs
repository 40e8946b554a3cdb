//! WebSocket transport layer.
//!
//! This module owns everything between the typed API and the socket:
//! choosing where to connect, keeping the connection alive, and pairing
//! inbound messages with the callers waiting for them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  DeviceLink     │   mpsc commands / oneshot    │  Link loop      │
//! │  (any clone)    │─────────────────────────────►│  (one task)     │
//! │                 │◄─────────────────────────────│  Correlator     │
//! │                 │   watch state / broadcast    │  ScanOrchestr.  │
//! └─────────────────┘                              └────────┬────────┘
//!                                                           │ WebSocket
//!                                                  ┌────────▼────────┐
//!                                                  │  Device (/ws)   │
//!                                                  └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. [`resolve`] - Ordered, deduplicated endpoint candidates
//! 2. `connect` - Attempt candidates in order, each bounded by a timeout
//! 3. Connected - Frames are classified, broadcast and correlated
//! 4. Lost - Scan session resets, reconnect from the first candidate
//! 5. `close` - Orderly close, reconnection disabled
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `endpoint` | Endpoint configuration and candidate resolution |
//! | `correlator` | Predicate-based waiter registry |
//! | `connection` | Link loop, connection state, events and handlers |

// ============================================================================
// Submodules
// ============================================================================

/// Link loop and lifecycle types.
pub mod connection;

/// Predicate-based request correlation.
pub mod correlator;

/// Endpoint candidates.
pub mod endpoint;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{
    CloseHandler, ConnectionState, ErrorHandler, LinkEvent, LinkHandlers, MessageHandler,
    OpenHandler,
};
pub(crate) use connection::{LinkCommand, LinkLoop};
pub use correlator::{Correlator, MAX_PENDING_WAITERS, Predicate};
pub use endpoint::{DEFAULT_FALLBACK_HOST, DEFAULT_PATH, Endpoint, EndpointConfig, resolve};
