//! Type-safe identifiers.
//!
//! The wire protocol carries no request IDs, so the only identity the crate
//! needs is a local one for registered waiters.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// WaiterId
// ============================================================================

/// Process-unique identifier of a registered waiter.
///
/// Waiters live in an unordered collection keyed only by identity; this is
/// that identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WaiterId(u64);

static NEXT_WAITER_ID: AtomicU64 = AtomicU64::new(1);

impl WaiterId {
    /// Allocates the next identifier.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_WAITER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WaiterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "waiter-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waiter_ids_are_unique_and_increasing() {
        let a = WaiterId::next();
        let b = WaiterId::next();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_waiter_id_display() {
        let id = WaiterId::next();
        assert_eq!(id.to_string(), format!("waiter-{}", id.as_u64()));
    }
}
