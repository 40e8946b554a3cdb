//! Stored RF band scan configuration.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use crate::client::DeviceLink;
use crate::error::{Error, Result};
use crate::protocol::{Inbound, Request, Subsystem, fields};
use crate::scan::ScanParams;

// ============================================================================
// Decoding
// ============================================================================

impl ScanParams {
    /// Decodes a scan configuration reply.
    ///
    /// Numbers sent as text are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if any of the four fields is missing or
    /// not numeric.
    pub fn from_inbound(message: &Inbound) -> Result<Self> {
        let number = |key: &str| {
            message
                .get(key)
                .and_then(as_number)
                .ok_or_else(|| Error::protocol(format!("{key} missing or not numeric")))
        };

        let dwell = number(fields::RF_SCAN_DWELL_MS)?;
        if !(0.0..=f64::from(u32::MAX)).contains(&dwell) {
            return Err(Error::protocol(format!("RF_SCAN_DWELL_MS out of range: {dwell}")));
        }

        Ok(Self {
            start_mhz: number(fields::RF_SCAN_START_MHZ)?,
            end_mhz: number(fields::RF_SCAN_END_MHZ)?,
            step_mhz: number(fields::RF_SCAN_STEP_MHZ)?,
            dwell_ms: dwell.round() as u32,
        })
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::String(text) => text.trim().parse().ok(),
        other => other.as_f64(),
    }
}

// ============================================================================
// DeviceLink - Scan Configuration
// ============================================================================

impl DeviceLink {
    /// Reads the stored scan range, step and dwell.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the transport is not open
    /// - [`Error::WaitTimeout`] if the device does not answer in time
    /// - [`Error::Protocol`] if a field is missing or malformed
    pub async fn read_scan_config(&self) -> Result<ScanParams> {
        let reply = self
            .read_subsystem(Request::scan_config_read(), Subsystem::ScanConfig)
            .await?;
        ScanParams::from_inbound(&reply)
    }

    /// Stores scan range, step and dwell without starting a scan.
    ///
    /// Returns the device's ack message.
    ///
    /// # Errors
    ///
    /// - [`Error::ScanInProgress`] if a band scan is running on this link
    /// - [`Error::DeviceRejected`] if the device refuses the values
    /// - [`Error::WaitTimeout`] if no ack arrives in time
    pub async fn write_scan_config(&self, params: &ScanParams) -> Result<String> {
        if self.scan_session().await?.is_active() {
            return Err(Error::ScanInProgress);
        }

        self.acked(
            Request::scan_config_write(params),
            self.timing().write_timeout(),
        )
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_decode_scan_config() {
        let message = Inbound::classify(json!({
            "RF_SCAN_START_MHZ": 300,
            "RF_SCAN_END_MHZ": "350.5",
            "RF_SCAN_STEP_MHZ": 0.25,
            "RF_SCAN_DWELL_MS": 20
        }));
        assert!(message.is_read(Subsystem::ScanConfig));

        let params = ScanParams::from_inbound(&message).expect("params");
        assert_eq!(params, ScanParams::new(300.0, 350.5, 0.25, 20));
    }

    #[test]
    fn test_decode_scan_config_missing_field() {
        let message = Inbound::classify(json!({"RF_SCAN_START_MHZ": 300}));
        let err = ScanParams::from_inbound(&message).unwrap_err();
        assert!(err.to_string().contains("RF_SCAN_END_MHZ") || err.to_string().contains("RF_SCAN_DWELL_MS"));
    }

    #[test]
    fn test_decode_negative_dwell() {
        let message = Inbound::classify(json!({
            "RF_SCAN_START_MHZ": 1, "RF_SCAN_END_MHZ": 2,
            "RF_SCAN_STEP_MHZ": 1, "RF_SCAN_DWELL_MS": -5
        }));
        assert!(ScanParams::from_inbound(&message).is_err());
    }
}
