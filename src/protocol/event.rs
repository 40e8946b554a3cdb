//! Typed scan stream payloads.
//!
//! While a band scan runs the device pushes `type`-tagged objects. The
//! classifier only decides the stream kind; this module decodes the payload.
//!
//! # Format
//!
//! ```json
//! {"type": "band_scan.progress", "progress": 42, "lastFrequencyMHz": 433.92,
//!  "segmentNumber": 1, "segmentTotal": 2}
//! {"type": "user.band_scan.hit", "freq_MHz": 433.92, "rssi": -61,
//!  "code": 5592405, "bits": 24, "delay_us": 350}
//! ```
//!
//! Every field is optional on the wire. Missing progress counts as zero,
//! missing segment numbers count as `1`.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Progress
// ============================================================================

/// A `progress` stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Raw progress value as sent, nominally `0..=100`.
    #[serde(default)]
    pub progress: f64,

    /// Frequency most recently tuned, absent until the first dwell.
    #[serde(
        rename = "lastFrequencyMHz",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub last_frequency_mhz: Option<f64>,

    /// Current segment, 1-based.
    #[serde(rename = "segmentNumber", default = "one")]
    pub segment_number: u32,

    /// Number of segments in the sweep.
    #[serde(rename = "segmentTotal", default = "one")]
    pub segment_total: u32,
}

fn one() -> u32 {
    1
}

/// Reads a number, accepting the numeric strings some firmware builds send.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl Progress {
    /// Decodes a progress payload. Missing, null or mistyped fields take
    /// their defaults independently, so a bad segment field never hides
    /// the progress value.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let segment = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(1)
        };

        Self {
            progress: value
                .get("progress")
                .and_then(number)
                .unwrap_or_default(),
            last_frequency_mhz: value.get("lastFrequencyMHz").and_then(number),
            segment_number: segment("segmentNumber"),
            segment_total: segment("segmentTotal"),
        }
    }

    /// Integer percentage clamped to `0..=100`.
    #[must_use]
    pub fn percent(&self) -> u8 {
        if self.progress.is_nan() {
            return 0;
        }
        self.progress.round().clamp(0.0, 100.0) as u8
    }

    /// Returns `true` when the sweep has reached its end.
    ///
    /// The protocol has no "finished" message; reaching 100 is the signal.
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.progress >= 100.0
    }
}

// ============================================================================
// Hit
// ============================================================================

/// Decoded code word of a hit, numeric or as the firmware formatted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HitCode {
    /// Numeric code word.
    Number(u64),
    /// Pre-formatted code (hex text, protocol name).
    Text(String),
}

impl fmt::Display for HitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A `hit` stream event: one detected transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Carrier frequency in MHz.
    #[serde(rename = "freq_MHz", default)]
    pub frequency_mhz: Option<f64>,

    /// Received signal strength.
    #[serde(default)]
    pub rssi: Option<i32>,

    /// Decoded code word.
    #[serde(default)]
    pub code: Option<HitCode>,

    /// Number of bits in the code word.
    #[serde(default)]
    pub bits: Option<u32>,

    /// Pulse delay in microseconds.
    #[serde(rename = "delay_us", default)]
    pub delay_us: Option<u32>,
}

impl Hit {
    /// Decodes a hit payload. Unknown or mistyped fields become `None`.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self {
            frequency_mhz: value.get("freq_MHz").and_then(Value::as_f64),
            rssi: value
                .get("rssi")
                .and_then(Value::as_i64)
                .and_then(|v| i32::try_from(v).ok()),
            code: value
                .get("code")
                .and_then(|v| HitCode::deserialize(v).ok()),
            bits: value
                .get("bits")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok()),
            delay_us: value
                .get("delay_us")
                .and_then(Value::as_u64)
                .and_then(|v| u32::try_from(v).ok()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
