//! RF band scan orchestration.
//!
//! A band scan is the one multi-step exchange in the protocol:
//!
//! 1. Write `RF_SCAN_*` configuration (`setting: user`, `action: write`)
//! 2. Device acks `User settings saved`
//! 3. Send `{"Scan Band": true}` (`setting: user`, `action: command`)
//! 4. Device acks `Band scan requested` (or busy: back off, resend once)
//! 5. Progress, found and hit events stream until progress reaches 100
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `session` | State machine and its actions/events |
//! | `progress` | Display helpers: percentage, labels, hit log |

// ============================================================================
// Submodules
// ============================================================================

/// Display helpers for scan progress and hits.
pub mod progress;

/// Band scan state machine.
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use progress::{HitLog, ScanProgress, format_mhz};
pub use session::{
    ScanAction, ScanEvent, ScanOrchestrator, ScanParams, ScanPhase, ScanSession, ScanSummary,
    ScanTiming,
};
