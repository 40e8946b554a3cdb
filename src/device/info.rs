//! Device identity and access-point clients.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::debug;

use crate::client::DeviceLink;
use crate::error::{Error, Result};
use crate::protocol::{Inbound, Request, Setting, Subsystem, fields};

use super::address::{decode_ipv4, decode_mac, string_field, value_text};

// ============================================================================
// DeviceInfo
// ============================================================================

/// Identity block answered to a `Device Info` read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Manufacturer name.
    pub manufacturer: String,
    /// Marketing name of the device.
    pub device_name: String,
    /// Model number.
    pub model_number: String,
    /// Hardware model and revision.
    pub device_model: String,
    /// Production date as printed by the firmware.
    pub production_date: String,
    /// Serial number.
    pub serial_number: String,
    /// Firmware version.
    pub firmware_version: String,
}

impl DeviceInfo {
    /// Decodes the 7-entry `Device Info` array.
    ///
    /// Missing trailing entries decode as empty strings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `Device Info` is absent or not an array.
    pub fn from_inbound(message: &Inbound) -> Result<Self> {
        let entries = message
            .get(fields::DEVICE_INFO)
            .and_then(Value::as_array)
            .ok_or_else(|| Error::protocol("Device Info is not an array"))?;

        let entry = |index: usize| entries.get(index).map(value_text).unwrap_or_default();

        Ok(Self {
            manufacturer: entry(0),
            device_name: entry(1),
            model_number: entry(2),
            device_model: entry(3),
            production_date: entry(4),
            serial_number: entry(5),
            firmware_version: entry(6),
        })
    }
}

// ============================================================================
// ApClients
// ============================================================================

/// One DHCP lease on the access point.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DhcpClient {
    /// Client host name.
    pub name: String,
    /// Leased address, as sent.
    pub ip: String,
    /// Client hardware address, as sent.
    pub mac: String,
}

impl DhcpClient {
    /// Decodes a `[name, ip, mac]` triple.
    ///
    /// Byte-array addresses are rendered in their usual text forms.
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        let entries = value.as_array()?;
        let text = |index: usize| entries.get(index).map(value_text).unwrap_or_default();

        let ip = entries
            .get(1)
            .filter(|v| v.is_array())
            .and_then(decode_ipv4)
            .map_or_else(|| text(1), |addr| addr.to_string());

        let mac = entries
            .get(2)
            .filter(|v| v.is_array())
            .and_then(decode_mac)
            .map_or_else(|| text(2), |mac| mac.to_string());

        Some(Self {
            name: text(0),
            ip,
            mac,
        })
    }
}

/// Access-point status: connected stations and their leases.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApClients {
    /// Stations reported by the device, or the lease count if absent.
    pub station_count: usize,
    /// DHCP leases.
    pub clients: Vec<DhcpClient>,
    /// Access-point host name, if included.
    pub host_name: Option<String>,
}

impl ApClients {
    /// Decodes a status reply.
    ///
    /// Leases are read from `Active Clients`, or `Scan Active Clients` when
    /// the firmware uses that name.
    #[must_use]
    pub fn from_inbound(message: &Inbound) -> Self {
        let clients: Vec<DhcpClient> = message
            .get(fields::ACTIVE_CLIENTS)
            .or_else(|| message.get(fields::SCAN_ACTIVE_CLIENTS))
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(DhcpClient::from_value).collect())
            .unwrap_or_default();

        let station_count = message
            .get(fields::AP_STATION_NUM)
            .and_then(Value::as_u64)
            .map_or(clients.len(), |count| count as usize);

        Self {
            station_count,
            clients,
            host_name: string_field(message.get(fields::AP_HOST_NAME)),
        }
    }
}

// ============================================================================
// DeviceLink - Reads
// ============================================================================

impl DeviceLink {
    /// Reads manufacturer, model, serial and firmware.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the transport is not open
    /// - [`Error::WaitTimeout`] if the device does not answer in time
    /// - [`Error::Protocol`] if the reply is malformed
    pub async fn read_device_info(&self) -> Result<DeviceInfo> {
        let request = Request::read(Setting::Device, fields::DEVICE_INFO_KEYS.iter().copied());
        let reply = self.read_subsystem(request, Subsystem::DeviceInfo).await?;
        let info = DeviceInfo::from_inbound(&reply)?;

        debug!(model = %info.model_number, firmware = %info.firmware_version, "Device info read");
        Ok(info)
    }

    /// Reads access-point stations and DHCP leases.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the transport is not open
    /// - [`Error::WaitTimeout`] if the device does not answer in time
    pub async fn read_ap_clients(&self) -> Result<ApClients> {
        let request = Request::read(
            Setting::Device,
            [
                fields::AP_STATION_NUM,
                fields::ACTIVE_CLIENTS,
                fields::AP_HOST_NAME,
            ],
        );
        let reply = self.read_subsystem(request, Subsystem::Status).await?;
        Ok(ApClients::from_inbound(&reply))
    }
}

// ============================================================================
// Tests
// ============================================================================
