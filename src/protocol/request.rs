//! Outbound request messages.
//!
//! Every message the client sends has the same three-key shape: which
//! settings area it targets, what to do there, and the fields involved.
//!
//! ```json
//! {"setting": "device", "action": "read",  "fields": ["AP SSID", "AP Port"]}
//! {"setting": "device", "action": "write", "fields": {"AP SSID": "lab"}}
//! {"setting": "command", "action": "push button", "fields": {"AP Button": true}}
//! ```
//!
//! There is no request ID. Replies are matched by the correlator.

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::scan::ScanParams;

use super::fields;

// ============================================================================
// Setting / Action
// ============================================================================

/// Settings area a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Setting {
    /// Network, credential and device-info settings.
    Device,
    /// User area (RF scan configuration and commands).
    User,
    /// Physical button emulation.
    Command,
}

/// What to do in the targeted area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Action {
    /// Read the named fields.
    #[serde(rename = "read")]
    Read,
    /// Write the given field values.
    #[serde(rename = "write")]
    Write,
    /// Run a user-area command.
    #[serde(rename = "command")]
    Command,
    /// Press one or more emulated buttons.
    #[serde(rename = "push button")]
    PushButton,
}

// ============================================================================
// Fields
// ============================================================================

/// Request payload: field names for reads, name/value pairs otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Fields {
    /// Field names to read.
    Names(Vec<String>),
    /// Field values to write or command flags to set.
    Values(Map<String, Value>),
}

// ============================================================================
// Request
// ============================================================================

/// A message from the client to the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Targeted settings area.
    pub setting: Setting,
    /// Action to perform.
    pub action: Action,
    /// Field names or values.
    pub fields: Fields,
}

impl Request {
    /// Creates a read request for the named fields.
    #[must_use]
    pub fn read<I, S>(setting: Setting, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            setting,
            action: Action::Read,
            fields: Fields::Names(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Creates a write request.
    #[inline]
    #[must_use]
    pub fn write(setting: Setting, values: Map<String, Value>) -> Self {
        Self {
            setting,
            action: Action::Write,
            fields: Fields::Values(values),
        }
    }

    /// Creates a push-button command setting each named button to `true`.
    #[must_use]
    pub fn push_buttons<I, S>(buttons: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = buttons
            .into_iter()
            .map(|name| (name.into(), Value::Bool(true)))
            .collect();

        Self {
            setting: Setting::Command,
            action: Action::PushButton,
            fields: Fields::Values(values),
        }
    }

    /// Reads the stored RF scan configuration.
    #[must_use]
    pub fn scan_config_read() -> Self {
        Self::read(Setting::User, fields::SCAN_CONFIG_KEYS.iter().copied())
    }

    /// Writes RF scan range, step and dwell.
    #[must_use]
    pub fn scan_config_write(params: &ScanParams) -> Self {
        let mut values = Map::new();
        values.insert(fields::RF_SCAN_START_MHZ.into(), json!(params.start_mhz));
        values.insert(fields::RF_SCAN_END_MHZ.into(), json!(params.end_mhz));
        values.insert(fields::RF_SCAN_STEP_MHZ.into(), json!(params.step_mhz));
        values.insert(fields::RF_SCAN_DWELL_MS.into(), json!(params.dwell_ms));
        Self::write(Setting::User, values)
    }

    /// The explicit command that starts a band scan.
    #[must_use]
    pub fn scan_start() -> Self {
        let mut values = Map::new();
        values.insert(fields::SCAN_BAND.into(), Value::Bool(true));

        Self {
            setting: Setting::User,
            action: Action::Command,
            fields: Fields::Values(values),
        }
    }

    /// Serializes to the wire text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if a field value cannot be serialized.
    pub fn to_text(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_shape() {
        let request = Request::read(Setting::Device, [fields::DEVICE_INFO]);
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(
            value,
            json!({"setting": "device", "action": "read", "fields": ["Device Info"]})
        );
    }

    #[test]
    fn test_push_button_shape() {
        let request = Request::push_buttons([fields::AP_BUTTON, fields::STA_BUTTON]);
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["setting"], "command");
        assert_eq!(value["action"], "push button");
        assert_eq!(value["fields"]["AP Button"], true);
        assert_eq!(value["fields"]["STA Button"], true);
    }

    #[test]
    fn test_scan_start_shape() {
        let value = serde_json::to_value(Request::scan_start()).expect("serialize");
        assert_eq!(
            value,
            json!({"setting": "user", "action": "command", "fields": {"Scan Band": true}})
        );
    }

    #[test]
    fn test_scan_config_write_shape() {
        let params = ScanParams {
            start_mhz: 433.0,
            end_mhz: 434.5,
            step_mhz: 0.25,
            dwell_ms: 20,
        };
        let value = serde_json::to_value(Request::scan_config_write(&params)).expect("serialize");

        assert_eq!(value["setting"], "user");
        assert_eq!(value["action"], "write");
        assert_eq!(value["fields"]["RF_SCAN_START_MHZ"], 433.0);
        assert_eq!(value["fields"]["RF_SCAN_END_MHZ"], 434.5);
        assert_eq!(value["fields"]["RF_SCAN_STEP_MHZ"], 0.25);
        assert_eq!(value["fields"]["RF_SCAN_DWELL_MS"], 20);
    }

    #[test]
    fn test_to_text_is_single_line() {
        let text = Request::scan_config_read().to_text().expect("serialize");
        assert!(!text.contains('\n'));
        assert!(text.contains("RF_SCAN_DWELL_MS"));
    }
}
