//! Display values for a running band scan.
//!
//! The link only emits progress and hits. Turning them into something a UI
//! can show (clamped percentage, frequency label, bounded hit list) lives
//! here so every front end renders them the same way.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use crate::protocol::{Hit, Progress};

// ============================================================================
// Constants
// ============================================================================

/// Placeholder for a frequency that has not been observed yet.
pub const UNKNOWN_FREQUENCY: &str = "—";

/// Default number of hits kept by [`HitLog`].
pub const DEFAULT_HIT_CAPACITY: usize = 5;

// ============================================================================
// Formatting
// ============================================================================

/// Formats a frequency in MHz.
///
/// Rounds to two decimals and drops the fraction when whole. `None` and NaN
/// render as [`UNKNOWN_FREQUENCY`], never as zero.
#[must_use]
pub fn format_mhz(mhz: Option<f64>) -> String {
    let Some(mhz) = mhz.filter(|v| v.is_finite()) else {
        return UNKNOWN_FREQUENCY.to_string();
    };

    let rounded = (mhz * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{rounded:.0}")
    } else {
        format!("{rounded:.2}")
    }
}

// ============================================================================
// ScanProgress
// ============================================================================

/// Display state derived from one progress event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanProgress {
    /// Percentage in `0..=100`.
    pub percent: u8,
    /// Last tuned frequency, `None` until the device reports one.
    pub last_frequency_mhz: Option<f64>,
    /// Current segment, 1-based.
    pub segment_number: u32,
    /// Total segments.
    pub segment_total: u32,
}

impl ScanProgress {
    /// Frequency label, or the placeholder when unknown.
    #[inline]
    #[must_use]
    pub fn frequency_label(&self) -> String {
        format_mhz(self.last_frequency_mhz)
    }

    /// `Segment n` for single-segment sweeps, `Segment n / t` otherwise.
    #[must_use]
    pub fn segment_label(&self) -> String {
        if self.segment_total > 1 {
            format!("Segment {} / {}", self.segment_number, self.segment_total)
        } else {
            format!("Segment {}", self.segment_number)
        }
    }
}

impl Default for ScanProgress {
    fn default() -> Self {
        Self {
            percent: 0,
            last_frequency_mhz: None,
            segment_number: 1,
            segment_total: 1,
        }
    }
}

impl From<&Progress> for ScanProgress {
    fn from(progress: &Progress) -> Self {
        Self {
            percent: progress.percent(),
            last_frequency_mhz: progress.last_frequency_mhz,
            segment_number: progress.segment_number,
            segment_total: progress.segment_total,
        }
    }
}

// ============================================================================
// HitLog
// ============================================================================

/// Bounded, newest-first list of recent hits.
#[derive(Debug, Clone)]
pub struct HitLog {
    hits: VecDeque<Hit>,
    capacity: usize,
}

impl HitLog {
    /// Creates a log keeping at most `capacity` hits (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            hits: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Records a hit, dropping the oldest when full.
    pub fn push(&mut self, hit: Hit) {
        if self.hits.len() == self.capacity {
            self.hits.pop_back();
        }
        self.hits.push_front(hit);
    }

    /// Hits, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter()
    }

    /// Most recent hit.
    #[inline]
    #[must_use]
    pub fn latest(&self) -> Option<&Hit> {
        self.hits.front()
    }

    /// Number of hits held.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns `true` if empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Maximum number of hits kept.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forgets all hits.
    pub fn clear(&mut self) {
        self.hits.clear();
    }
}

impl Default for HitLog {
    fn default() -> Self {
        Self::new(DEFAULT_HIT_CAPACITY)
    }
}

// ============================================================================
// Tests
// ============================================================================
