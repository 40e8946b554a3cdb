//! Wire protocol message types.
//!
//! The device speaks newline-free JSON text frames with no envelope, no
//! message ID and no version field.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Shape |
//! |---------|-----------|-------|
//! | [`Request`] | Client → Device | `{"setting", "action", "fields"}` |
//! | [`Ack`] | Device → Client | `{"error": bool, "message": string}` |
//! | Stream event | Device → Client | `{"type": "progress" \| "found" \| "hit", ...}` |
//! | Read result | Device → Client | object keyed by subsystem field names |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `fields` | Field names and subsystem key sets |
//! | `request` | Outbound request builder |
//! | `message` | Inbound classification |
//! | `event` | Typed scan stream payloads |

// ============================================================================
// Submodules
// ============================================================================

/// Typed scan stream payloads.
pub mod event;

/// Wire field names.
pub mod fields;

/// Inbound message classification.
pub mod message;

/// Outbound request messages.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{Hit, HitCode, Progress};
pub use message::{Ack, Channel, Inbound, StreamKind, Subsystem, classify};
pub use request::{Action, Fields, Request, Setting};
