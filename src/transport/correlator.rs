//! Predicate-based request correlation.
//!
//! The wire protocol has no request IDs, so a caller that needs a reply
//! registers a predicate describing what that reply looks like. Each inbound
//! message is offered to every outstanding waiter in registration order and
//! resolves at most one: the first whose predicate matches.
//!
//! The correlator is owned by the link loop and never shared, so it needs no
//! locking. Time is passed in explicitly; the loop sleeps until
//! [`Correlator::next_deadline`] and then calls [`Correlator::expire`].

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::WaiterId;
use crate::protocol::Inbound;

// ============================================================================
// Constants
// ============================================================================

/// Maximum outstanding waiters before rejecting new ones.
pub const MAX_PENDING_WAITERS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Reply predicate supplied by the caller.
pub type Predicate = Box<dyn Fn(&Inbound) -> bool + Send>;

/// Channel a waiter resolves through.
pub type WaiterReply = oneshot::Sender<Result<Inbound>>;

/// One outstanding waiter.
struct Waiter {
    id: WaiterId,
    predicate: Predicate,
    reply: WaiterReply,
    deadline: Instant,
    timeout: Duration,
}

// ============================================================================
// Correlator
// ============================================================================

/// Registry of outstanding waiters.
#[derive(Default)]
pub struct Correlator {
    waiters: Vec<Waiter>,
}

impl Correlator {
    /// Creates an empty correlator.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a waiter.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if [`MAX_PENDING_WAITERS`] are already
    /// outstanding. The reply is failed with the same error.
    pub fn register(
        &mut self,
        predicate: Predicate,
        timeout: Duration,
        reply: WaiterReply,
        now: Instant,
    ) -> Result<WaiterId> {
        self.prune_abandoned();

        if self.waiters.len() >= MAX_PENDING_WAITERS {
            warn!(
                pending = self.waiters.len(),
                max = MAX_PENDING_WAITERS,
                "Too many pending waiters"
            );
            let message = format!(
                "Too many pending waiters: {}/{}",
                self.waiters.len(),
                MAX_PENDING_WAITERS
            );
            let _ = reply.send(Err(Error::protocol(message.clone())));
            return Err(Error::protocol(message));
        }

        let id = WaiterId::next();
        self.waiters.push(Waiter {
            id,
            predicate,
            reply,
            deadline: now + timeout,
            timeout,
        });

        debug!(%id, timeout_ms = timeout.as_millis() as u64, "Waiter registered");
        Ok(id)
    }

    /// Offers a message to the waiters.
    ///
    /// Resolves and removes the first waiter in registration order whose
    /// predicate matches. Returns its ID, or `None` if nothing matched.
    pub fn resolve(&mut self, message: &Inbound) -> Option<WaiterId> {
        self.prune_abandoned();

        let index = self
            .waiters
            .iter()
            .position(|waiter| (waiter.predicate)(message))?;

        let waiter = self.waiters.remove(index);
        let _ = waiter.reply.send(Ok(message.clone()));

        trace!(id = %waiter.id, channel = %message.channel(), "Waiter resolved");
        Some(waiter.id)
    }

    /// Rejects every waiter whose deadline is at or before `now`.
    ///
    /// Returns the number of waiters expired.
    pub fn expire(&mut self, now: Instant) -> usize {
        let mut expired = 0;
        let mut index = 0;

        while index < self.waiters.len() {
            if self.waiters[index].deadline <= now {
                let waiter = self.waiters.remove(index);
                let timeout_ms = waiter.timeout.as_millis() as u64;
                debug!(id = %waiter.id, timeout_ms, "Waiter timed out");
                let _ = waiter.reply.send(Err(Error::wait_timeout(waiter.id, timeout_ms)));
                expired += 1;
            } else {
                index += 1;
            }
        }

        expired
    }

    /// Removes a waiter and fails it with `error`.
    ///
    /// Returns `true` if the waiter was still outstanding.
    pub fn fail(&mut self, id: WaiterId, error: Error) -> bool {
        let Some(index) = self.waiters.iter().position(|waiter| waiter.id == id) else {
            return false;
        };

        let waiter = self.waiters.remove(index);
        debug!(%id, error = %error, "Waiter failed");
        let _ = waiter.reply.send(Err(error));
        true
    }

    /// Fails every outstanding waiter with an error built by `make_error`.
    pub fn fail_all(&mut self, make_error: impl Fn() -> Error) {
        let count = self.waiters.len();

        for waiter in self.waiters.drain(..) {
            let _ = waiter.reply.send(Err(make_error()));
        }

        if count > 0 {
            debug!(count, "Failed pending waiters");
        }
    }

    /// Earliest deadline among outstanding waiters.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.waiters.iter().map(|waiter| waiter.deadline).min()
    }

    /// Number of outstanding waiters.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    /// Returns `true` if no waiter is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    /// Drops waiters whose caller stopped listening.
    fn prune_abandoned(&mut self) {
        self.waiters.retain(|waiter| {
            let keep = !waiter.reply.is_closed();
            if !keep {
                trace!(id = %waiter.id, "Pruned abandoned waiter");
            }
            keep
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
