//! Client handle and configuration.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`DeviceLink`] handle |
//! | `builder` | Fluent [`LinkBuilder`] |
//! | `options` | [`LinkOptions`] and [`Timing`], loadable from TOML |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent link builder.
pub mod builder;

/// Device link handle.
pub mod core;

/// Link configuration.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::LinkBuilder;
pub use self::core::DeviceLink;
pub use options::{DEFAULT_EVENT_CAPACITY, LinkOptions, Timing};
