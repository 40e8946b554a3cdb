//! Access-point, station and credential settings, and Wi-Fi scanning.
//!
//! Settings structs are partial: `None` fields were absent from a read and
//! are left out of a write. Values are passed through unvalidated; the
//! firmware enforces its own limits and answers with an error ack.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use serde_json::{Map, Value, json};
use tracing::debug;

use crate::client::DeviceLink;
use crate::error::Result;
use crate::protocol::{Inbound, Request, Setting, Subsystem, fields};

use super::address::{
    MacAddr, decode_ipv4, decode_ipv6, decode_mac, encode_ipv4, encode_ipv6, string_field,
    value_text,
};

// ============================================================================
// WifiChannel
// ============================================================================

/// Access-point radio channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WifiChannel {
    /// Firmware picks the channel.
    #[default]
    Auto,
    /// Fixed channel number.
    Fixed(u8),
}

impl WifiChannel {
    /// Decodes `"auto"`, `0` or a channel number (numeric or text).
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let number = match value {
            Value::String(text) if text.trim().eq_ignore_ascii_case("auto") => return Some(Self::Auto),
            Value::String(text) => text.trim().parse::<u8>().ok()?,
            other => u8::try_from(other.as_u64()?).ok()?,
        };

        Some(if number == 0 {
            Self::Auto
        } else {
            Self::Fixed(number)
        })
    }

    /// Wire form: `"auto"` or the channel number.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Auto => json!("auto"),
            Self::Fixed(channel) => json!(channel),
        }
    }
}

impl fmt::Display for WifiChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(channel) => write!(f, "{channel}"),
        }
    }
}

// ============================================================================
// ApSettings
// ============================================================================

/// Access-point network settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApSettings {
    /// Network name.
    pub ssid: Option<String>,
    /// WPA passphrase.
    pub pre_shared_key: Option<String>,
    /// Hide the SSID from beacons.
    pub ssid_hidden: Option<bool>,
    /// Access-point address.
    pub ipv4: Option<Ipv4Addr>,
    /// Access-point IPv6 address.
    pub ipv6: Option<Ipv6Addr>,
    /// Port of the device's web service.
    pub port: Option<u16>,
    /// Host name.
    pub host_name: Option<String>,
    /// Radio channel.
    pub wifi_channel: Option<WifiChannel>,
    /// Maximum associated stations.
    pub max_connection: Option<u8>,
    /// Hardware address. Read-only.
    pub mac: Option<MacAddr>,
    /// Default gateway.
    pub gateway: Option<Ipv4Addr>,
    /// Subnet mask.
    pub subnet: Option<Ipv4Addr>,
    /// Primary DNS server.
    pub primary_dns: Option<Ipv4Addr>,
    /// Secondary DNS server.
    pub secondary_dns: Option<Ipv4Addr>,
}

impl ApSettings {
    /// Decodes whatever AP fields a reply carries.
    #[must_use]
    pub fn from_inbound(message: &Inbound) -> Self {
        let ipv4 = |key: &str| message.get(key).and_then(decode_ipv4);

        Self {
            ssid: string_field(message.get(fields::AP_SSID)),
            pre_shared_key: string_field(message.get(fields::AP_PRE_SHARED_KEY)),
            ssid_hidden: message.get(fields::SSID_HIDDEN).map(truthy),
            ipv4: ipv4(fields::AP_IPV4),
            ipv6: message.get(fields::AP_IPV6).and_then(decode_ipv6),
            port: message
                .get(fields::AP_PORT)
                .and_then(Value::as_u64)
                .and_then(|port| u16::try_from(port).ok()),
            host_name: string_field(message.get(fields::AP_HOST_NAME)),
            wifi_channel: message.get(fields::WIFI_CHANNEL).and_then(WifiChannel::from_value),
            max_connection: message
                .get(fields::MAX_CONNECTION)
                .and_then(Value::as_u64)
                .and_then(|max| u8::try_from(max).ok()),
            mac: message.get(fields::AP_MAC).and_then(decode_mac),
            gateway: ipv4(fields::GATEWAY),
            subnet: ipv4(fields::SUBNET),
            primary_dns: ipv4(fields::PRIMARY_DNS),
            secondary_dns: ipv4(fields::SECONDARY_DNS),
        }
    }

    /// Write payload with every set, writable field.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut out = Map::new();
        put(&mut out, fields::AP_SSID, self.ssid.as_ref().map(|v| json!(v)));
        put(
            &mut out,
            fields::AP_PRE_SHARED_KEY,
            self.pre_shared_key.as_ref().map(|v| json!(v)),
        );
        put(&mut out, fields::SSID_HIDDEN, self.ssid_hidden.map(Value::Bool));
        put(&mut out, fields::AP_HOST_NAME, self.host_name.as_ref().map(|v| json!(v)));
        put(&mut out, fields::AP_IPV4, self.ipv4.map(encode_ipv4));
        put(&mut out, fields::AP_IPV6, self.ipv6.map(encode_ipv6));
        put(&mut out, fields::AP_PORT, self.port.map(|v| json!(v)));
        put(&mut out, fields::WIFI_CHANNEL, self.wifi_channel.map(|c| c.to_value()));
        put(&mut out, fields::MAX_CONNECTION, self.max_connection.map(|v| json!(v)));
        put(&mut out, fields::GATEWAY, self.gateway.map(encode_ipv4));
        put(&mut out, fields::SUBNET, self.subnet.map(encode_ipv4));
        put(&mut out, fields::PRIMARY_DNS, self.primary_dns.map(encode_ipv4));
        put(&mut out, fields::SECONDARY_DNS, self.secondary_dns.map(encode_ipv4));
        out
    }
}

// ============================================================================
// StationSettings
// ============================================================================

/// Station (uplink) settings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StationSettings {
    /// Upstream network name.
    pub ssid: Option<String>,
    /// Upstream passphrase.
    pub pre_shared_key: Option<String>,
    /// Station host name.
    pub host_name: Option<String>,
    /// Address leased from the upstream network. Read-only.
    pub ip: Option<Ipv4Addr>,
    /// Upstream router hardware address. Read-only.
    pub modem_mac: Option<MacAddr>,
    /// Station interface hardware address. Read-only.
    pub sta_mac: Option<MacAddr>,
}

impl StationSettings {
    /// Decodes whatever station fields a reply carries.
    #[must_use]
    pub fn from_inbound(message: &Inbound) -> Self {
        Self {
            ssid: string_field(message.get(fields::MODEM_SSID)),
            pre_shared_key: string_field(message.get(fields::MODEM_PRE_SHARED_KEY)),
            host_name: string_field(message.get(fields::STA_HOST_NAME)),
            ip: message.get(fields::MODEM_IP).and_then(decode_ipv4),
            modem_mac: message.get(fields::MODEM_MAC).and_then(decode_mac),
            sta_mac: message.get(fields::STA_MAC).and_then(decode_mac),
        }
    }

    /// Write payload with every set, writable field.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut out = Map::new();
        put(&mut out, fields::MODEM_SSID, self.ssid.as_ref().map(|v| json!(v)));
        put(
            &mut out,
            fields::MODEM_PRE_SHARED_KEY,
            self.pre_shared_key.as_ref().map(|v| json!(v)),
        );
        put(&mut out, fields::STA_HOST_NAME, self.host_name.as_ref().map(|v| json!(v)));
        out
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// Web login credentials.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Decodes a security reply.
    #[must_use]
    pub fn from_inbound(message: &Inbound) -> Self {
        Self {
            username: message.get(fields::USERNAME).map(value_text).unwrap_or_default(),
            password: message.get(fields::PASSWORD).map(value_text).unwrap_or_default(),
        }
    }

    /// Write payload.
    #[must_use]
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert(fields::USERNAME.into(), json!(self.username));
        out.insert(fields::PASSWORD.into(), json!(self.password));
        out
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// ScannedNetwork
// ============================================================================

/// One network seen by the device's Wi-Fi scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedNetwork {
    /// Network name.
    pub ssid: String,
    /// Signal strength in dBm, if reported.
    pub rssi: Option<i64>,
    /// Remaining entries as sent (flags, channel, ...).
    pub extra: Vec<Value>,
}

impl ScannedNetwork {
    /// Decodes `[ssid, rssi, ...]`, or a bare SSID.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value.as_array() {
            Some(entries) => Self {
                ssid: entries.first().map(value_text).unwrap_or_default(),
                rssi: entries.get(1).and_then(Value::as_i64),
                extra: entries.iter().skip(2).cloned().collect(),
            },
            None => Self {
                ssid: value_text(value),
                rssi: None,
                extra: Vec::new(),
            },
        }
    }

    /// Decodes a `Scan Networks` value. A string means nothing was found.
    #[must_use]
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        value
            .as_array()
            .map(|items| items.iter().map(Self::from_value).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn put(out: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        out.insert(key.to_string(), value);
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// DeviceLink - Network Settings
// ============================================================================

impl DeviceLink {
    /// Reads access-point settings.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::NotConnected`] if the transport is not open
    /// - [`crate::Error::WaitTimeout`] if the device does not answer in time
    pub async fn read_ap_settings(&self) -> Result<ApSettings> {
        let request = Request::read(Setting::Device, fields::AP_NETWORK_KEYS.iter().copied());
        let reply = self.read_subsystem(request, Subsystem::ApNetwork).await?;
        Ok(ApSettings::from_inbound(&reply))
    }

    /// Writes access-point settings. Returns the device's ack message.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::DeviceRejected`] if the device refuses the values
    /// - [`crate::Error::WaitTimeout`] if no ack arrives in time
    pub async fn write_ap_settings(&self, settings: &ApSettings) -> Result<String> {
        let values = settings.to_fields();
        debug!(fields = values.len(), "Writing AP settings");
        self.acked(
            Request::write(Setting::Device, values),
            self.timing().write_timeout(),
        )
        .await
    }

    /// Reads station settings.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::NotConnected`] if the transport is not open
    /// - [`crate::Error::WaitTimeout`] if the device does not answer in time
    pub async fn read_station_settings(&self) -> Result<StationSettings> {
        let request = Request::read(
            Setting::Device,
            fields::STATION_READ_FIELDS.iter().copied(),
        );
        let reply = self.read_subsystem(request, Subsystem::StationNetwork).await?;
        Ok(StationSettings::from_inbound(&reply))
    }

    /// Writes station settings. Returns the device's ack message.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::DeviceRejected`] if the device refuses the values
    /// - [`crate::Error::WaitTimeout`] if no ack arrives in time
    pub async fn write_station_settings(&self, settings: &StationSettings) -> Result<String> {
        let values = settings.to_fields();
        debug!(fields = values.len(), "Writing station settings");
        self.acked(
            Request::write(Setting::Device, values),
            self.timing().write_timeout(),
        )
        .await
    }

    /// Reads login credentials.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::NotConnected`] if the transport is not open
    /// - [`crate::Error::WaitTimeout`] if the device does not answer in time
    pub async fn read_credentials(&self) -> Result<Credentials> {
        let request = Request::read(Setting::Device, fields::SECURITY_KEYS.iter().copied());
        let reply = self.read_subsystem(request, Subsystem::Security).await?;
        Ok(Credentials::from_inbound(&reply))
    }

    /// Writes login credentials. Returns the device's ack message.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::DeviceRejected`] if the device refuses the values
    /// - [`crate::Error::WaitTimeout`] if no ack arrives in time
    pub async fn write_credentials(&self, credentials: &Credentials) -> Result<String> {
        debug!(username = %credentials.username, "Writing credentials");
        self.acked(
            Request::write(Setting::Device, credentials.to_fields()),
            self.timing().write_timeout(),
        )
        .await
    }

    /// Asks the device to scan for Wi-Fi networks.
    ///
    /// An empty list means the device reported none.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::NotConnected`] if the transport is not open
    /// - [`crate::Error::WaitTimeout`] if the scan does not finish in time
    pub async fn scan_networks(&self) -> Result<Vec<ScannedNetwork>> {
        let reply = self
            .request(
                Request::read(Setting::Device, [fields::SCAN_NETWORKS]),
                |message: &Inbound| message.has_key(fields::SCAN_NETWORKS),
                self.timing().network_scan_timeout(),
            )
            .await?;

        let networks = reply
            .get(fields::SCAN_NETWORKS)
            .map(ScannedNetwork::list_from_value)
            .unwrap_or_default();

        debug!(count = networks.len(), "Wi-Fi scan finished");
        Ok(networks)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::error::Error;
    use crate::testing::{MockDevice, fast_timing};

    #[test]
    fn test_wifi_channel_decode() {
        assert_eq!(WifiChannel::from_value(&json!("auto")), Some(WifiChannel::Auto));
        assert_eq!(WifiChannel::from_value(&json!(0)), Some(WifiChannel::Auto));
        assert_eq!(WifiChannel::from_value(&json!(6)), Some(WifiChannel::Fixed(6)));
        assert_eq!(WifiChannel::from_value(&json!("11")), Some(WifiChannel::Fixed(11)));
        assert_eq!(WifiChannel::from_value(&json!(true)), None);
        assert_eq!(WifiChannel::Fixed(6).to_value(), json!(6));
        assert_eq!(WifiChannel::Auto.to_value(), json!("auto"));
    }

    #[test]
    fn test_ap_settings_decode() {
        let message = Inbound::classify(json!({
            "AP SSID": "lab",
            "Ssid Hidden": 0,
            "AP IPv4": [192, 168, 1, 2],
            "AP Port": 80,
            "Wifi Channel": "auto",
            "Max Connection": 4,
            "AP MAC": [1, 2, 3, 4, 5, 6],
            "Gateway": [192, 168, 1, 1]
        }));

        let ap = ApSettings::from_inbound(&message);
        assert_eq!(ap.ssid.as_deref(), Some("lab"));
        assert_eq!(ap.ssid_hidden, Some(false));
        assert_eq!(ap.ipv4, Some(Ipv4Addr::new(192, 168, 1, 2)));
        assert_eq!(ap.port, Some(80));
        assert_eq!(ap.wifi_channel, Some(WifiChannel::Auto));
        assert_eq!(ap.mac.map(|m| m.to_string()).as_deref(), Some("01:02:03:04:05:06"));
        assert_eq!(ap.subnet, None);
    }

    #[test]
    fn test_ap_settings_write_payload_skips_unset_and_read_only() {
        let ap = ApSettings {
            ssid: Some("lab".into()),
            ipv4: Some(Ipv4Addr::new(10, 0, 0, 1)),
            wifi_channel: Some(WifiChannel::Fixed(6)),
            mac: Some(MacAddr::new([1, 2, 3, 4, 5, 6])),
            ..ApSettings::default()
        };

        assert_eq!(
            Value::Object(ap.to_fields()),
            json!({"AP SSID": "lab", "AP IPv4": [10, 0, 0, 1], "Wifi Channel": 6})
        );
    }

    #[test]
    fn test_station_payload() {
        let sta = StationSettings {
            ssid: Some("home".into()),
            host_name: Some("probe".into()),
            ip: Some(Ipv4Addr::new(10, 0, 0, 9)),
            ..StationSettings::default()
        };

        assert_eq!(
            Value::Object(sta.to_fields()),
            json!({"Modem SSID": "home", "STA HostName": "probe"})
        );
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials::new("admin", "hunter22");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter22"));
    }

    #[test]
    fn test_scanned_networks() {
        let list = ScannedNetwork::list_from_value(&json!([["home", -51, 3], "bare"]));
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].ssid, "home");
        assert_eq!(list[0].rssi, Some(-51));
        assert_eq!(list[0].extra, vec![json!(3)]);
        assert_eq!(list[1].ssid, "bare");

        assert!(ScannedNetwork::list_from_value(&json!("No networks found")).is_empty());
    }

    #[tokio::test]
    async fn test_write_credentials_rejected_verbatim() {
        let device = MockDevice::bind().await;
        let link = DeviceLink::builder()
            .endpoint_list(vec![device.endpoint()])
            .timing(fast_timing())
            .connect()
            .expect("link");
        let mut session = device.accept().await;
        link.wait_connected(Duration::from_secs(2))
            .await
            .expect("connected");

        let pending = tokio::spawn({
            let link = link.clone();
            async move {
                link.write_credentials(&Credentials::new("admin", "x"))
                    .await
            }
        });

        let sent = session.recv_json().await;
        assert_eq!(sent["setting"], "device");
        assert_eq!(sent["action"], "write");
        assert_eq!(sent["fields"], json!({"username": "admin", "password": "x"}));

        session
            .send_json(json!({"error": true, "message": "Password too short"}))
            .await;

        let err = pending.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::DeviceRejected { ref message } if message == "Password too short"));
    }

    #[tokio::test]
    async fn test_scan_networks_none_found() {
        let device = MockDevice::bind().await;
        let link = DeviceLink::builder()
            .endpoint_list(vec![device.endpoint()])
            .timing(fast_timing())
            .connect()
            .expect("link");
        let mut session = device.accept().await;
        link.wait_connected(Duration::from_secs(2))
            .await
            .expect("connected");

        let pending = tokio::spawn({
            let link = link.clone();
            async move { link.scan_networks().await }
        });

        let _ = session.recv_json().await;
        session
            .send_json(json!({"Scan Networks": "No networks"}))
            .await;

        let networks = pending.await.expect("join").expect("networks");
        assert!(networks.is_empty());
    }
}
