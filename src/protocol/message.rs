//! Inbound message classification.
//!
//! Device messages carry no envelope. Meaning is inferred from which keys are
//! present, using ordered, mutually exclusive rules where the first match
//! wins:
//!
//! 1. [`Channel::Ack`]: boolean `error` and string `message`.
//! 2. [`Channel::Stream`]: string `type` naming a known stream.
//! 3. [`Channel::Read`]: any key of a subsystem set, checked in
//!    [`Subsystem::PRIORITY`] order.
//! 4. [`Channel::Raw`]: everything else, including non-objects.
//!
//! Classification is a pure function of the message. Replaying a message
//! always yields the same channel.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::event::{Hit, Progress};
use super::fields;

// ============================================================================
// StreamKind
// ============================================================================

/// Kind of a `type`-tagged scan stream event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Sweep progress.
    Progress,
    /// Candidate signal found.
    Found,
    /// Decoded transmission.
    Hit,
}

impl StreamKind {
    /// Maps a `type` value to a stream kind.
    ///
    /// Accepts the short names and the dotted names the firmware emits.
    #[must_use]
    pub fn from_type(value: &str) -> Option<Self> {
        match value {
            "progress" | "band_scan.progress" => Some(Self::Progress),
            "found" | "user.band_scan.found" => Some(Self::Found),
            "hit" | "user.band_scan.hit" => Some(Self::Hit),
            _ => None,
        }
    }

    /// Short name of the stream.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Found => "found",
            Self::Hit => "hit",
        }
    }
}

// ============================================================================
// Subsystem
// ============================================================================

/// Device subsystem a read result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// Manufacturer, model, serial and firmware.
    DeviceInfo,
    /// Access-point clients.
    Status,
    /// Access-point network settings.
    ApNetwork,
    /// Station (uplink) network settings.
    StationNetwork,
    /// Login credentials.
    Security,
    /// RF band scan configuration.
    ScanConfig,
}

impl Subsystem {
    /// Fixed evaluation order. A message carrying keys of several subsystems
    /// belongs to the first one listed here.
    pub const PRIORITY: [Self; 6] = [
        Self::DeviceInfo,
        Self::Status,
        Self::ApNetwork,
        Self::StationNetwork,
        Self::Security,
        Self::ScanConfig,
    ];

    /// Keys that identify a read result of this subsystem.
    #[must_use]
    pub const fn keys(&self) -> &'static [&'static str] {
        match self {
            Self::DeviceInfo => fields::DEVICE_INFO_KEYS,
            Self::Status => fields::STATUS_KEYS,
            Self::ApNetwork => fields::AP_NETWORK_KEYS,
            Self::StationNetwork => fields::STATION_NETWORK_KEYS,
            Self::Security => fields::SECURITY_KEYS,
            Self::ScanConfig => fields::SCAN_CONFIG_KEYS,
        }
    }

    /// Returns `true` if the object carries any key of this subsystem.
    #[inline]
    #[must_use]
    pub fn matches(&self, object: &Map<String, Value>) -> bool {
        self.keys().iter().any(|key| object.contains_key(*key))
    }

    /// Stable lowercase name, used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DeviceInfo => "device_info",
            Self::Status => "status",
            Self::ApNetwork => "ap_network",
            Self::StationNetwork => "station_network",
            Self::Security => "security",
            Self::ScanConfig => "scan_config",
        }
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Semantic channel of an inbound message. Every message maps to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// `{"error": bool, "message": string}`.
    Ack,
    /// Scan stream event.
    Stream(StreamKind),
    /// Read result of a subsystem.
    Read(Subsystem),
    /// Nothing matched.
    Raw,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => f.write_str("ack"),
            Self::Stream(kind) => write!(f, "stream:{}", kind.as_str()),
            Self::Read(subsystem) => write!(f, "read:{}", subsystem.as_str()),
            Self::Raw => f.write_str("raw"),
        }
    }
}

/// Decides the channel of a parsed message.
#[must_use]
pub fn classify(value: &Value) -> Channel {
    let Some(object) = value.as_object() else {
        return Channel::Raw;
    };

    if object.get("error").is_some_and(Value::is_boolean)
        && object.get("message").is_some_and(Value::is_string)
    {
        return Channel::Ack;
    }

    if let Some(kind) = object
        .get("type")
        .and_then(Value::as_str)
        .and_then(StreamKind::from_type)
    {
        return Channel::Stream(kind);
    }

    Subsystem::PRIORITY
        .iter()
        .find(|subsystem| subsystem.matches(object))
        .map_or(Channel::Raw, |subsystem| Channel::Read(*subsystem))
}

// ============================================================================
// Ack
// ============================================================================

/// A device acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Device-reported failure flag.
    pub error: bool,
    /// Device text, verbatim.
    pub message: String,
}

impl Ack {
    /// Returns `true` if the device reported success.
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !self.error
    }

    /// Returns `true` if the device says it is busy with a prior scan.
    ///
    /// Matches regardless of the error flag; firmware builds disagree on it.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.message
            .to_ascii_lowercase()
            .contains(fields::ACK_BUSY_MARKER)
    }

    /// Returns `true` for the "settings saved" text.
    #[inline]
    #[must_use]
    pub fn is_settings_saved(&self) -> bool {
        self.message == fields::ACK_SETTINGS_SAVED
    }

    /// Returns `true` for the "scan requested" text.
    #[inline]
    #[must_use]
    pub fn is_scan_requested(&self) -> bool {
        self.message == fields::ACK_SCAN_REQUESTED
    }

    /// Converts into a result, mapping `error: true` to
    /// [`Error::DeviceRejected`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceRejected`] carrying the device text.
    pub fn into_result(self) -> Result<String> {
        if self.error {
            Err(Error::device_rejected(self.message))
        } else {
            Ok(self.message)
        }
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// A parsed, classified inbound message.
///
/// The raw JSON is kept so predicates and typed decoders can inspect any key.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    channel: Channel,
    raw: Value,
}

impl Inbound {
    /// Classifies a parsed value.
    #[must_use]
    pub fn classify(raw: Value) -> Self {
        let channel = classify(&raw);
        Self { channel, raw }
    }

    /// Parses and classifies a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not JSON.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: Value = serde_json::from_str(text)?;
        Ok(Self::classify(raw))
    }

    /// Channel this message was routed to.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Raw JSON value.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Consumes the message, returning the raw JSON.
    #[inline]
    #[must_use]
    pub fn into_raw(self) -> Value {
        self.raw
    }

    /// Returns a top-level field.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.raw.get(key)
    }

    /// Returns `true` if the top-level key is present.
    #[inline]
    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        self.raw.get(key).is_some()
    }

    /// Returns `true` if this is an acknowledgement.
    #[inline]
    #[must_use]
    pub fn is_ack(&self) -> bool {
        self.channel == Channel::Ack
    }

    /// Returns `true` if this is a read result of `subsystem`.
    #[inline]
    #[must_use]
    pub fn is_read(&self, subsystem: Subsystem) -> bool {
        self.channel == Channel::Read(subsystem)
    }

    /// Returns the acknowledgement, if this is one.
    #[must_use]
    pub fn ack(&self) -> Option<Ack> {
        if !self.is_ack() {
            return None;
        }

        Some(Ack {
            error: self.raw.get("error").and_then(Value::as_bool)?,
            message: self.raw.get("message").and_then(Value::as_str)?.to_string(),
        })
    }

    /// Decodes a progress payload, if this is a progress event.
    #[must_use]
    pub fn progress(&self) -> Option<Progress> {
        match self.channel {
            Channel::Stream(StreamKind::Progress) => Some(Progress::from_value(&self.raw)),
            _ => None,
        }
    }

    /// Decodes a hit payload, if this is a hit event.
    #[must_use]
    pub fn hit(&self) -> Option<Hit> {
        match self.channel {
            Channel::Stream(StreamKind::Hit) => Some(Hit::from_value(&self.raw)),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
