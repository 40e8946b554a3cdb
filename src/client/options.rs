//! Link configuration.
//!
//! Everything an embedding application may want to tune without code
//! changes: the endpoint candidates and every timer. Defaults match the
//! firmware's reference UI.
//!
//! # Example
//!
//! ```toml
//! event_capacity = 128
//!
//! [endpoints]
//! fallback_hosts = ["192.168.4.1"]
//! port = 81
//!
//! [timing]
//! connect_timeout_ms = 2000
//! scan_safety_timeout_ms = 600000
//! ```
//!
//! ```ignore
//! use device_link::LinkOptions;
//!
//! let options = LinkOptions::from_toml_file("link.toml")?;
//! let link = DeviceLink::builder().options(options).build()?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;
use std::time::Duration;

use figment::Figment;
use figment::providers::{Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scan::ScanTiming;
use crate::transport::EndpointConfig;

// ============================================================================
// Constants
// ============================================================================

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

// ============================================================================
// Timing
// ============================================================================

/// Every timer the link uses, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Wait for a transport to open.
    pub connect_timeout_ms: u64,
    /// Delay before trying the next candidate.
    pub retry_delay_ms: u64,
    /// Delay before a full reconnect cycle.
    pub reconnect_delay_ms: u64,
    /// Reply timeout for settings reads.
    pub read_timeout_ms: u64,
    /// Ack timeout for settings writes.
    pub write_timeout_ms: u64,
    /// Ack timeout for push-button commands.
    pub command_timeout_ms: u64,
    /// Reply timeout for a Wi-Fi network scan.
    pub network_scan_timeout_ms: u64,
    /// Deadline of each band scan ack phase.
    pub scan_ack_timeout_ms: u64,
    /// Backoff before resending a band scan start after a busy ack.
    pub busy_backoff_ms: u64,
    /// Optional cap on the scanning phase.
    pub scan_safety_timeout_ms: Option<u64>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5000,
            retry_delay_ms: 500,
            reconnect_delay_ms: 3000,
            read_timeout_ms: 5000,
            write_timeout_ms: 10_000,
            command_timeout_ms: 5000,
            network_scan_timeout_ms: 10_000,
            scan_ack_timeout_ms: 5000,
            busy_backoff_ms: 1500,
            scan_safety_timeout_ms: None,
        }
    }
}

impl Timing {
    /// Connect timeout.
    #[inline]
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Delay between candidates.
    #[inline]
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Delay between reconnect cycles.
    #[inline]
    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Read reply timeout.
    #[inline]
    #[must_use]
    pub const fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Write ack timeout.
    #[inline]
    #[must_use]
    pub const fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Command ack timeout.
    #[inline]
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Wi-Fi network scan timeout.
    #[inline]
    #[must_use]
    pub const fn network_scan_timeout(&self) -> Duration {
        Duration::from_millis(self.network_scan_timeout_ms)
    }

    /// Timers of the band scan orchestrator.
    #[must_use]
    pub fn scan_timing(&self) -> ScanTiming {
        ScanTiming {
            ack_timeout: Duration::from_millis(self.scan_ack_timeout_ms),
            busy_backoff: Duration::from_millis(self.busy_backoff_ms),
            safety_timeout: self.scan_safety_timeout_ms.map(Duration::from_millis),
        }
    }
}

// ============================================================================
// LinkOptions
// ============================================================================

/// Complete link configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkOptions {
    /// Endpoint candidates.
    pub endpoints: EndpointConfig,
    /// Timers.
    pub timing: Timing,
    /// Capacity of the event broadcast channel.
    pub event_capacity: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            endpoints: EndpointConfig::default(),
            timing: Timing::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl LinkOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Layers a TOML document over the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is malformed or the result
    /// fails validation.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Self::extract(Figment::new().merge(Toml::string(toml)))
    }

    /// Layers a TOML file over the defaults.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is malformed or the result fails
    /// validation.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::extract(Figment::new().merge(Toml::file(path.as_ref())))
    }

    fn extract(layer: Figment) -> Result<Self> {
        let options: Self = Figment::new()
            .merge(Serialized::defaults(Self::new()))
            .merge(layer)
            .extract()
            .map_err(|e| Error::config(e.to_string()))?;

        options.validate()?;
        Ok(options)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl LinkOptions {
    /// Replaces the endpoint configuration.
    #[inline]
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: EndpointConfig) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Replaces the timers.
    #[inline]
    #[must_use]
    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Sets the event broadcast capacity.
    #[inline]
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Enables the scanning-phase safety timeout.
    #[inline]
    #[must_use]
    pub fn with_scan_safety_timeout(mut self, timeout: Duration) -> Self {
        self.timing.scan_safety_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl LinkOptions {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.event_capacity == 0 {
            return Err(Error::config("event_capacity must be greater than zero"));
        }

        if self.timing.connect_timeout_ms == 0 {
            return Err(Error::config("connect_timeout_ms must be greater than zero"));
        }

        if self.timing.scan_safety_timeout_ms == Some(0) {
            return Err(Error::config(
                "scan_safety_timeout_ms must be greater than zero when set",
            ));
        }

        if self.endpoints.path.is_empty() {
            return Err(Error::config("endpoint path must not be empty"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = LinkOptions::new();

        assert_eq!(options.event_capacity, 256);
        assert_eq!(options.timing.connect_timeout(), Duration::from_secs(5));
        assert_eq!(options.timing.retry_delay(), Duration::from_millis(500));
        assert_eq!(options.timing.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(options.timing.write_timeout(), Duration::from_secs(10));
        assert_eq!(options.timing.scan_timing().safety_timeout, None);
        assert_eq!(options.endpoints.fallback_hosts, vec!["192.168.1.2"]);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_from_toml_layers_over_defaults() {
        let options = LinkOptions::from_toml_str(
            r#"
            event_capacity = 64

            [endpoints]
            fallback_hosts = ["192.168.4.1", "device.local"]
            port = 81

            [timing]
            connect_timeout_ms = 2000
            scan_safety_timeout_ms = 600000
            "#,
        )
        .expect("valid toml");

        assert_eq!(options.event_capacity, 64);
        assert_eq!(options.endpoints.port, Some(81));
        assert_eq!(options.endpoints.path, "/ws");
        assert!(options.endpoints.device_first);
        assert_eq!(options.timing.connect_timeout_ms, 2000);
        assert_eq!(options.timing.reconnect_delay_ms, 3000);
        assert_eq!(
            options.timing.scan_timing().safety_timeout,
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_empty_toml_is_default() {
        let options = LinkOptions::from_toml_str("").expect("empty toml");
        assert_eq!(options, LinkOptions::new());
    }

    #[test]
    fn test_missing_file_is_default() {
        let options = LinkOptions::from_toml_file("/nonexistent/device-link.toml")
            .expect("missing file");
        assert_eq!(options, LinkOptions::new());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = LinkOptions::from_toml_str("event_capacity = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let path = std::env::temp_dir().join(format!("device-link-{}.toml", std::process::id()));
        std::fs::write(&path, "[timing\nconnect_timeout_ms = ").expect("write");

        let result = LinkOptions::from_toml_file(&path);
        let _ = std::fs::remove_file(&path);

        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_validation() {
        let err = LinkOptions::new().with_event_capacity(0).validate().unwrap_err();
        assert!(err.to_string().contains("event_capacity"));

        let mut options = LinkOptions::new();
        options.timing.scan_safety_timeout_ms = Some(0);
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_builder_methods() {
        let options = LinkOptions::new()
            .with_event_capacity(32)
            .with_scan_safety_timeout(Duration::from_secs(90));

        assert_eq!(options.event_capacity, 32);
        assert_eq!(options.timing.scan_safety_timeout_ms, Some(90_000));
    }
}
