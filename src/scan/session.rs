//! Band scan state machine.
//!
//! ```text
//!            start(params)
//!   Idle ───────────────────► AwaitingWriteAck
//!    ▲                              │ "User settings saved"
//!    │                              │ → send Scan Band
//!    │                              ▼
//!    │  busy twice / error   AwaitingStartAck ◄─┐ busy once:
//!    ├──────────────────────────────┤           │ backoff, resend
//!    │                              │ "Band scan requested"
//!    │  progress >= 100             ▼           │
//!    └────────────────────────── Scanning ──────┘
//! ```
//!
//! Any disconnect forces `Idle`. The orchestrator does no I/O: it consumes
//! messages and clock ticks and returns [`ScanAction`]s for the link loop to
//! perform.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{Ack, Channel, Hit, Inbound, Request, StreamKind};

use super::progress::ScanProgress;

// ============================================================================
// ScanParams
// ============================================================================

/// Range, step and dwell of a band scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanParams {
    /// First frequency in MHz.
    pub start_mhz: f64,
    /// Last frequency in MHz.
    pub end_mhz: f64,
    /// Step between frequencies in MHz.
    pub step_mhz: f64,
    /// Time spent on each frequency in milliseconds.
    pub dwell_ms: u32,
}

impl ScanParams {
    /// Creates scan parameters.
    #[inline]
    #[must_use]
    pub const fn new(start_mhz: f64, end_mhz: f64, step_mhz: f64, dwell_ms: u32) -> Self {
        Self {
            start_mhz,
            end_mhz,
            step_mhz,
            dwell_ms,
        }
    }
}

impl Default for ScanParams {
    /// 300–350 MHz in 0.25 MHz steps, 20 ms dwell.
    fn default() -> Self {
        Self::new(300.0, 350.0, 0.25, 20)
    }
}

// ============================================================================
// ScanPhase / ScanSession
// ============================================================================

/// Phase of the scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanPhase {
    /// No scan in flight.
    #[default]
    Idle,
    /// Scan configuration written, waiting for the save ack.
    AwaitingWriteAck,
    /// Start command sent, waiting for the device to accept it.
    AwaitingStartAck,
    /// Device is sweeping; progress and hits are streaming.
    Scanning,
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::AwaitingWriteAck => "awaiting_write_ack",
            Self::AwaitingStartAck => "awaiting_start_ack",
            Self::Scanning => "scanning",
        })
    }
}

/// Snapshot of the scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSession {
    /// Current phase.
    pub phase: ScanPhase,
    /// The save ack should trigger the start command.
    pub pending_start_after_write: bool,
}

impl ScanSession {
    /// Returns `true` if a scan is in flight.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.phase != ScanPhase::Idle
    }
}

// ============================================================================
// ScanTiming
// ============================================================================

/// Timers used by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTiming {
    /// Deadline for each acknowledgement phase.
    pub ack_timeout: Duration,
    /// Wait before resending the start command after a busy ack.
    pub busy_backoff: Duration,
    /// Optional cap on the `Scanning` phase. `None` waits for progress 100.
    pub safety_timeout: Option<Duration>,
}

impl Default for ScanTiming {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(5000),
            busy_backoff: Duration::from_millis(1500),
            safety_timeout: None,
        }
    }
}

// ============================================================================
// ScanSummary / ScanEvent / ScanAction
// ============================================================================

/// Counters of a finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanSummary {
    /// Hit events received.
    pub hits: u32,
    /// Found events received.
    pub found: u32,
    /// Progress events received.
    pub progress_updates: u32,
}

/// Observable scan events, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Device accepted the start command.
    Started,
    /// Sweep progress.
    Progress(ScanProgress),
    /// Decoded transmission.
    Hit(Hit),
    /// Candidate signal, payload as sent.
    Found(Value),
    /// Device was busy; the start command will be resent once.
    BusyRetry,
    /// Progress reached 100.
    Completed(ScanSummary),
    /// Scan ended with an error.
    Failed(String),
    /// Scan was cut short by a disconnect or close.
    Aborted,
}

/// Work the link loop must carry out for the orchestrator.
#[derive(Debug)]
pub enum ScanAction {
    /// Transmit a request.
    Send(Request),
    /// Broadcast an event.
    Emit(ScanEvent),
    /// Deliver the final outcome to the caller that started the scan.
    Finish(Result<ScanSummary>),
}

// ============================================================================
// ScanOrchestrator
// ============================================================================

/// Drives one band scan at a time.
#[derive(Debug, Default)]
pub struct ScanOrchestrator {
    session: ScanSession,
    timing: ScanTiming,
    summary: ScanSummary,
    /// Deadline of the current phase.
    deadline: Option<Instant>,
    /// When to resend the start command after a busy ack.
    retry_at: Option<Instant>,
    busy_retried: bool,
}

impl ScanOrchestrator {
    /// Creates an idle orchestrator.
    #[must_use]
    pub fn new(timing: ScanTiming) -> Self {
        Self {
            timing,
            ..Self::default()
        }
    }

    /// Current session snapshot.
    #[inline]
    #[must_use]
    pub fn session(&self) -> ScanSession {
        self.session
    }

    /// Current phase.
    #[inline]
    #[must_use]
    pub fn phase(&self) -> ScanPhase {
        self.session.phase
    }

    /// Earliest instant at which [`ScanOrchestrator::on_timer`] has work.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.deadline, self.retry_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Begins a scan by writing its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ScanInProgress`] unless idle.
    pub fn start(&mut self, params: &ScanParams, now: Instant) -> Result<Vec<ScanAction>> {
        if self.session.is_active() {
            return Err(Error::ScanInProgress);
        }

        self.summary = ScanSummary::default();
        self.busy_retried = false;
        self.retry_at = None;
        self.session.pending_start_after_write = true;
        self.enter(ScanPhase::AwaitingWriteAck, now);

        info!(
            start_mhz = params.start_mhz,
            end_mhz = params.end_mhz,
            step_mhz = params.step_mhz,
            dwell_ms = params.dwell_ms,
            "Band scan requested"
        );

        Ok(vec![ScanAction::Send(Request::scan_config_write(params))])
    }

    /// Feeds one classified inbound message.
    pub fn on_message(&mut self, message: &Inbound, now: Instant) -> Vec<ScanAction> {
        match (self.session.phase, message.channel()) {
            (ScanPhase::Idle, _) => Vec::new(),

            (ScanPhase::AwaitingWriteAck, Channel::Ack) => message
                .ack()
                .map(|ack| self.on_write_ack(&ack, now))
                .unwrap_or_default(),

            (ScanPhase::AwaitingStartAck, Channel::Ack) => message
                .ack()
                .map(|ack| self.on_start_ack(&ack, now))
                .unwrap_or_default(),

            (ScanPhase::Scanning, Channel::Stream(kind)) => self.on_stream(kind, message),

            _ => Vec::new(),
        }
    }

    /// Handles elapsed timers.
    pub fn on_timer(&mut self, now: Instant) -> Vec<ScanAction> {
        if let Some(retry_at) = self.retry_at
            && retry_at <= now
        {
            self.retry_at = None;
            self.deadline = Some(now + self.timing.ack_timeout);
            debug!("Resending band scan start after busy backoff");
            return vec![ScanAction::Send(Request::scan_start())];
        }

        if let Some(deadline) = self.deadline
            && deadline <= now
        {
            let (operation, timeout) = match self.session.phase {
                ScanPhase::AwaitingWriteAck => ("scan config ack", self.timing.ack_timeout),
                ScanPhase::AwaitingStartAck => ("scan start ack", self.timing.ack_timeout),
                ScanPhase::Scanning => (
                    "band scan completion",
                    self.timing.safety_timeout.unwrap_or_default(),
                ),
                ScanPhase::Idle => {
                    self.deadline = None;
                    return Vec::new();
                }
            };

            warn!(phase = %self.session.phase, "Band scan phase timed out");
            return self.fail(Error::timeout(operation, timeout.as_millis() as u64));
        }

        Vec::new()
    }

    /// Forces the session back to idle after a disconnect or close.
    pub fn reset(&mut self) -> Vec<ScanAction> {
        let was_active = self.session.is_active();
        let phase = self.session.phase;

        self.session = ScanSession::default();
        self.deadline = None;
        self.retry_at = None;
        self.busy_retried = false;

        if !was_active {
            return Vec::new();
        }

        info!(%phase, "Band scan aborted");
        vec![
            ScanAction::Emit(ScanEvent::Aborted),
            ScanAction::Finish(Err(Error::ScanAborted)),
        ]
    }

    // ========================================================================
    // Phase Handlers
    // ========================================================================

    fn on_write_ack(&mut self, ack: &Ack, now: Instant) -> Vec<ScanAction> {
        if ack.error {
            return self.fail(Error::device_rejected(ack.message.clone()));
        }

        if !ack.is_settings_saved() || !self.session.pending_start_after_write {
            return Vec::new();
        }

        self.session.pending_start_after_write = false;
        self.enter(ScanPhase::AwaitingStartAck, now);
        vec![ScanAction::Send(Request::scan_start())]
    }

    fn on_start_ack(&mut self, ack: &Ack, now: Instant) -> Vec<ScanAction> {
        if self.retry_at.is_some() {
            return Vec::new();
        }

        if ack.is_busy() {
            if self.busy_retried {
                return self.fail(Error::scan_busy(ack.message.clone()));
            }

            self.busy_retried = true;
            self.deadline = None;
            self.retry_at = Some(now + self.timing.busy_backoff);
            debug!(
                backoff_ms = self.timing.busy_backoff.as_millis() as u64,
                "Device busy, retrying band scan start once"
            );
            return vec![ScanAction::Emit(ScanEvent::BusyRetry)];
        }

        if ack.error {
            return self.fail(Error::device_rejected(ack.message.clone()));
        }

        if !ack.is_scan_requested() {
            return Vec::new();
        }

        self.enter(ScanPhase::Scanning, now);
        vec![ScanAction::Emit(ScanEvent::Started)]
    }

    fn on_stream(&mut self, kind: StreamKind, message: &Inbound) -> Vec<ScanAction> {
        match kind {
            StreamKind::Progress => {
                let Some(progress) = message.progress() else {
                    return Vec::new();
                };

                self.summary.progress_updates += 1;
                let mut actions = vec![ScanAction::Emit(ScanEvent::Progress(
                    ScanProgress::from(&progress),
                ))];

                if progress.is_complete() {
                    let summary = self.summary;
                    self.finish_idle();
                    info!(
                        hits = summary.hits,
                        found = summary.found,
                        "Band scan completed"
                    );
                    actions.push(ScanAction::Emit(ScanEvent::Completed(summary)));
                    actions.push(ScanAction::Finish(Ok(summary)));
                }

                actions
            }

            StreamKind::Hit => {
                self.summary.hits += 1;
                vec![ScanAction::Emit(ScanEvent::Hit(Hit::from_value(
                    message.raw(),
                )))]
            }

            StreamKind::Found => {
                self.summary.found += 1;
                vec![ScanAction::Emit(ScanEvent::Found(message.raw().clone()))]
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Moves to `phase` and arms its deadline.
    fn enter(&mut self, phase: ScanPhase, now: Instant) {
        debug!(from = %self.session.phase, to = %phase, "Scan phase change");
        self.session.phase = phase;
        self.deadline = match phase {
            ScanPhase::Idle => None,
            ScanPhase::AwaitingWriteAck | ScanPhase::AwaitingStartAck => {
                Some(now + self.timing.ack_timeout)
            }
            ScanPhase::Scanning => self.timing.safety_timeout.map(|t| now + t),
        };
    }

    fn finish_idle(&mut self) {
        self.session = ScanSession::default();
        self.deadline = None;
        self.retry_at = None;
    }

    fn fail(&mut self, error: Error) -> Vec<ScanAction> {
        warn!(phase = %self.session.phase, error = %error, "Band scan failed");
        self.finish_idle();
        vec![
            ScanAction::Emit(ScanEvent::Failed(error.to_string())),
            ScanAction::Finish(Err(error)),
        ]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::protocol::{Action, Setting};

    fn msg(value: Value) -> Inbound {
        Inbound::classify(value)
    }

    fn ack(error: bool, message: &str) -> Inbound {
        msg(json!({"error": error, "message": message}))
    }

    fn sent(actions: &[ScanAction]) -> Vec<&Request> {
        actions
            .iter()
            .filter_map(|a| match a {
                ScanAction::Send(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn finished(actions: Vec<ScanAction>) -> Option<Result<ScanSummary>> {
        actions.into_iter().find_map(|a| match a {
            ScanAction::Finish(r) => Some(r),
            _ => None,
        })
    }

    fn scanning(orchestrator: &mut ScanOrchestrator, now: Instant) {
        orchestrator
            .start(&ScanParams::default(), now)
            .expect("start");
        orchestrator.on_message(&ack(false, "User settings saved"), now);
        orchestrator.on_message(&ack(false, "Band scan requested"), now);
        assert_eq!(orchestrator.phase(), ScanPhase::Scanning);
    }

    #[test]
    fn test_start_writes_config() {
        let mut orchestrator = ScanOrchestrator::default();
        let actions = orchestrator
            .start(&ScanParams::new(433.0, 434.0, 0.5, 10), Instant::now())
            .expect("start");

        let requests = sent(&actions);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].setting, Setting::User);
        assert_eq!(requests[0].action, Action::Write);

        let session = orchestrator.session();
        assert_eq!(session.phase, ScanPhase::AwaitingWriteAck);
        assert!(session.pending_start_after_write);
    }

    #[test]
    fn test_second_start_is_rejected() {
        let mut orchestrator = ScanOrchestrator::default();
        let now = Instant::now();
        orchestrator
            .start(&ScanParams::default(), now)
            .expect("start");

        let err = orchestrator
            .start(&ScanParams::default(), now)
            .unwrap_err();
        assert!(matches!(err, Error::ScanInProgress));
    }

    #[test]
    fn test_save_ack_sends_start_command() {
        let mut orchestrator = ScanOrchestrator::default();
        let now = Instant::now();
        orchestrator
            .start(&ScanParams::default(), now)
            .expect("start");

        let actions = orchestrator.on_message(&ack(false, "User settings saved"), now);
        let requests = sent(&actions);

        assert_eq!(requests.len(), 1);
        assert_eq!(*requests[0], Request::scan_start());
        assert_eq!(orchestrator.phase(), ScanPhase::AwaitingStartAck);
        assert!(!orchestrator.session().pending_start_after_write);
    }

    #[test]
    fn test_unrelated_acks_are_ignored() {
        let mut orchestrator = ScanOrchestrator::default();
        let now = Instant::now();
        orchestrator
            .start(&ScanParams::default(), now)
            .expect("start");

        assert!(orchestrator.on_message(&ack(false, "Saved"), now).is_empty());
        assert!(
            orchestrator
                .on_message(&msg(json!({"type": "progress", "progress": 100})), now)
                .is_empty()
        );
        assert_eq!(orchestrator.phase(), ScanPhase::AwaitingWriteAck);
    }

    #[test]
    fn test_write_rejection_fails_scan() {
        let mut orchestrator = ScanOrchestrator::default();
        let now = Instant::now();
        orchestrator
            .start(&ScanParams::default(), now)
            .expect("start");

        let actions = orchestrator.on_message(&ack(true, "Invalid range"), now);
        let result = finished(actions).expect("finished");

        assert!(matches!(result, Err(Error::DeviceRejected { ref message }) if message == "Invalid range"));
        assert_eq!(orchestrator.phase(), ScanPhase::Idle);
    }

    #[test]
    fn test_full_scan_completes_once() {
        let mut orchestrator = ScanOrchestrator::default();
        let now = Instant::now();
        scanning(&mut orchestrator, now);

        orchestrator.on_message(&msg(json!({"type": "progress", "progress": 33})), now);
        orchestrator.on_message(&msg(json!({"type": "hit", "freq_MHz": 433.92})), now);
        orchestrator.on_message(&msg(json!({"type": "progress", "progress": 67})), now);
        orchestrator.on_message(&msg(json!({"type": "hit", "freq_MHz": 433.42})), now);
        orchestrator.on_message(&msg(json!({"type": "found"})), now);

        let actions = orchestrator.on_message(&msg(json!({"type": "progress", "progress": 100})), now);
        let completed = actions
            .iter()
            .filter(|a| matches!(a, ScanAction::Emit(ScanEvent::Completed(_))))
            .count();
        assert_eq!(completed, 1);

        let summary = finished(actions).expect("finished").expect("ok");
        assert_eq!(
            summary,
            ScanSummary {
                hits: 2,
                found: 1,
                progress_updates: 3,
            }
        );
        assert_eq!(orchestrator.phase(), ScanPhase::Idle);

        let again = orchestrator.on_message(&msg(json!({"type": "progress", "progress": 100})), now);
        assert!(again.is_empty());
    }

    #[test]
    fn test_completion_with_null_segment_fields() {
        let mut orchestrator = ScanOrchestrator::default();
        let now = Instant::now();
        scanning(&mut orchestrator, now);

        let actions = orchestrator.on_message(
            &msg(json!({
                "type": "band_scan.progress",
                "progress": 100,
                "lastFrequencyMHz": null,
                "segmentNumber": null,
                "segmentTotal": null
            })),
            now,
        );

        let summary = finished(actions).expect("finished").expect("ok");
        assert_eq!(summary.progress_updates, 1);
        assert_eq!(orchestrator.phase(), ScanPhase::Idle);
    }

    #[test]
    fn test_busy_retries_once_then_fails() {
        let timing = ScanTiming::default();
        let mut orchestrator = ScanOrchestrator::new(timing);
        let now = Instant::now();
        orchestrator
            .start(&ScanParams::default(), now)
            .expect("start");
        orchestrator.on_message(&ack(false, "User settings saved"), now);

        let actions = orchestrator.on_message(&ack(true, "Scanner busy"), now);
        assert!(matches!(
            actions.as_slice(),
            [ScanAction::Emit(ScanEvent::BusyRetry)]
        ));
        assert_eq!(orchestrator.next_deadline(), Some(now + timing.busy_backoff));

        assert!(orchestrator.on_timer(now + Duration::from_millis(10)).is_empty());

        let later = now + timing.busy_backoff;
        let actions = orchestrator.on_timer(later);
        assert_eq!(sent(&actions).len(), 1);
        assert_eq!(orchestrator.next_deadline(), Some(later + timing.ack_timeout));

        let actions = orchestrator.on_message(&ack(true, "Scanner busy"), later);
        let result = finished(actions).expect("finished");
        assert!(matches!(result, Err(Error::ScanBusy { .. })));
        assert_eq!(orchestrator.phase(), ScanPhase::Idle);
    }

    #[test]
    fn test_busy_then_accepted() {
        let timing = ScanTiming::default();
        let mut orchestrator = ScanOrchestrator::new(timing);
        let now = Instant::now();
        orchestrator
            .start(&ScanParams::default(), now)
            .expect("start");
        orchestrator.on_message(&ack(false, "User settings saved"), now);
        orchestrator.on_message(&ack(false, "Busy, previous scan running"), now);

        let later = now + timing.busy_backoff;
        orchestrator.on_timer(later);
        let actions = orchestrator.on_message(&ack(false, "Band scan requested"), later);

        assert!(matches!(actions.as_slice(), [ScanAction::Emit(ScanEvent::Started)]));
        assert_eq!(orchestrator.phase(), ScanPhase::Scanning);
    }

    #[test]
    fn test_ack_timeout_fails_scan() {
        let timing = ScanTiming::default();
        let mut orchestrator = ScanOrchestrator::new(timing);
        let now = Instant::now();
        orchestrator
            .start(&ScanParams::default(), now)
            .expect("start");

        let result = finished(orchestrator.on_timer(now + timing.ack_timeout)).expect("finished");
        assert!(matches!(result, Err(Error::Timeout { timeout_ms: 5000, .. })));
        assert_eq!(orchestrator.phase(), ScanPhase::Idle);
        assert_eq!(orchestrator.next_deadline(), None);
    }

    #[test]
    fn test_scanning_has_no_deadline_without_safety_timeout() {
        let mut orchestrator = ScanOrchestrator::default();
        let now = Instant::now();
        scanning(&mut orchestrator, now);

        assert_eq!(orchestrator.next_deadline(), None);
        assert!(orchestrator.on_timer(now + Duration::from_secs(3600)).is_empty());
    }

    #[test]
    fn test_safety_timeout_fails_scan() {
        let timing = ScanTiming {
            safety_timeout: Some(Duration::from_secs(60)),
            ..ScanTiming::default()
        };
        let mut orchestrator = ScanOrchestrator::new(timing);
        let now = Instant::now();
        scanning(&mut orchestrator, now);

        let result =
            finished(orchestrator.on_timer(now + Duration::from_secs(60))).expect("finished");
        assert!(matches!(result, Err(Error::Timeout { .. })));
    }

    #[test]
    fn test_reset_aborts_active_scan() {
        let mut orchestrator = ScanOrchestrator::default();
        let now = Instant::now();
        scanning(&mut orchestrator, now);
        orchestrator.on_message(&msg(json!({"type": "progress", "progress": 80})), now);

        let result = finished(orchestrator.reset()).expect("finished");
        assert!(matches!(result, Err(Error::ScanAborted)));
        assert_eq!(orchestrator.session(), ScanSession::default());

        assert!(orchestrator.reset().is_empty());
    }

    #[test]
    fn test_reset_clears_pending_start() {
        let mut orchestrator = ScanOrchestrator::default();
        orchestrator
            .start(&ScanParams::default(), Instant::now())
            .expect("start");
        assert!(orchestrator.session().pending_start_after_write);

        orchestrator.reset();
        assert!(!orchestrator.session().pending_start_after_write);
        assert_eq!(orchestrator.phase(), ScanPhase::Idle);
    }
}
