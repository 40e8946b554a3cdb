//! Wire field names organized by device subsystem.
//!
//! Field names are literal and case-sensitive. The read-result key sets here
//! drive message classification, so each set must stay disjoint from the
//! others; the priority order lives in [`Subsystem::PRIORITY`].
//!
//! # Subsystems
//!
//! | Subsystem | Keys |
//! |-----------|------|
//! | Device info | `Device Info` |
//! | Status | `AP Station Num`, `Active Clients`, `Scan Active Clients` |
//! | AP network | `AP SSID`, `AP IPv4`, `Gateway`, ... |
//! | Station network | `Modem SSID`, `STA HostName`, `Scan Networks`, ... |
//! | Security | `username`, `password` |
//! | Scan configuration | `RF_SCAN_START_MHZ`, ... |
//!
//! [`Subsystem::PRIORITY`]: super::Subsystem::PRIORITY

// ============================================================================
// Device Info
// ============================================================================

/// Seven-entry string array describing the device.
pub const DEVICE_INFO: &str = "Device Info";

/// Keys answering a device-info read.
pub const DEVICE_INFO_KEYS: &[&str] = &[DEVICE_INFO];

// ============================================================================
// Status (AP clients)
// ============================================================================

/// Number of stations associated with the access point.
pub const AP_STATION_NUM: &str = "AP Station Num";
/// DHCP client list, `[name, ip, mac]` triples.
pub const ACTIVE_CLIENTS: &str = "Active Clients";
/// Alternate spelling of [`ACTIVE_CLIENTS`] used by some firmware builds.
pub const SCAN_ACTIVE_CLIENTS: &str = "Scan Active Clients";

/// Keys answering a status read.
///
/// `AP HostName` also travels with status replies but belongs to the AP
/// network set; listing it here would steal AP-settings replies.
pub const STATUS_KEYS: &[&str] = &[AP_STATION_NUM, ACTIVE_CLIENTS, SCAN_ACTIVE_CLIENTS];

// ============================================================================
// Access Point Network
// ============================================================================

/// Access point network name.
pub const AP_SSID: &str = "AP SSID";
/// Access point passphrase.
pub const AP_PRE_SHARED_KEY: &str = "AP Pre-Shared Key";
/// Whether the AP hides its SSID.
pub const SSID_HIDDEN: &str = "Ssid Hidden";
/// AP address, a four-number array.
pub const AP_IPV4: &str = "AP IPv4";
/// AP address, a sixteen-number array or text.
pub const AP_IPV6: &str = "AP IPv6";
/// Port the device serves on.
pub const AP_PORT: &str = "AP Port";
/// Host name advertised by the AP.
pub const AP_HOST_NAME: &str = "AP HostName";
/// AP channel number, or `auto`.
pub const WIFI_CHANNEL: &str = "Wifi Channel";
/// Maximum associated stations.
pub const MAX_CONNECTION: &str = "Max Connection";
/// AP hardware address. Read-only.
pub const AP_MAC: &str = "AP MAC";
/// Gateway address handed to clients.
pub const GATEWAY: &str = "Gateway";
/// Subnet mask handed to clients.
pub const SUBNET: &str = "Subnet";
/// Primary DNS server.
pub const PRIMARY_DNS: &str = "Primary DNS";
/// Secondary DNS server.
pub const SECONDARY_DNS: &str = "Secondary DNS";

/// Keys answering an AP-network read.
pub const AP_NETWORK_KEYS: &[&str] = &[
    AP_SSID,
    AP_PRE_SHARED_KEY,
    SSID_HIDDEN,
    AP_IPV4,
    AP_IPV6,
    AP_PORT,
    AP_HOST_NAME,
    WIFI_CHANNEL,
    MAX_CONNECTION,
    AP_MAC,
    GATEWAY,
    SUBNET,
    PRIMARY_DNS,
    SECONDARY_DNS,
];

// ============================================================================
// Station Network
// ============================================================================

/// Upstream network the station joins.
pub const MODEM_SSID: &str = "Modem SSID";
/// Upstream network passphrase.
pub const MODEM_PRE_SHARED_KEY: &str = "Modem Pre-Shared Key";
/// Host name the station announces.
pub const STA_HOST_NAME: &str = "STA HostName";
/// Address assigned by the upstream network. Read-only.
pub const MODEM_IP: &str = "Modem IP";
/// Upstream router hardware address. Read-only.
pub const MODEM_MAC: &str = "Modem MAC";
/// Station hardware address. Read-only.
pub const STA_MAC: &str = "STA MAC";
/// Visible Wi-Fi networks, or a string when none were found.
pub const SCAN_NETWORKS: &str = "Scan Networks";

/// Station fields read together on the settings page.
pub const STATION_READ_FIELDS: &[&str] = &[
    MODEM_SSID,
    MODEM_PRE_SHARED_KEY,
    STA_HOST_NAME,
    MODEM_IP,
    MODEM_MAC,
    STA_MAC,
];

/// Keys answering a station-network read.
pub const STATION_NETWORK_KEYS: &[&str] = &[
    MODEM_SSID,
    MODEM_PRE_SHARED_KEY,
    STA_HOST_NAME,
    MODEM_IP,
    MODEM_MAC,
    STA_MAC,
    SCAN_NETWORKS,
];

// ============================================================================
// Security
// ============================================================================

/// Web UI login name.
pub const USERNAME: &str = "username";
/// Web UI login password.
pub const PASSWORD: &str = "password";

/// Keys answering a credentials read.
pub const SECURITY_KEYS: &[&str] = &[USERNAME, PASSWORD];

// ============================================================================
// Scan Configuration
// ============================================================================

/// First frequency of the sweep.
pub const RF_SCAN_START_MHZ: &str = "RF_SCAN_START_MHZ";
/// Last frequency of the sweep.
pub const RF_SCAN_END_MHZ: &str = "RF_SCAN_END_MHZ";
/// Sweep increment.
pub const RF_SCAN_STEP_MHZ: &str = "RF_SCAN_STEP_MHZ";
/// Time spent on each frequency.
pub const RF_SCAN_DWELL_MS: &str = "RF_SCAN_DWELL_MS";

/// Keys answering a scan-configuration read.
pub const SCAN_CONFIG_KEYS: &[&str] = &[
    RF_SCAN_START_MHZ,
    RF_SCAN_END_MHZ,
    RF_SCAN_STEP_MHZ,
    RF_SCAN_DWELL_MS,
];

// ============================================================================
// Commands
// ============================================================================

/// User-area command field that starts a band scan.
pub const SCAN_BAND: &str = "Scan Band";

/// Virtual AP push button.
pub const AP_BUTTON: &str = "AP Button";
/// Virtual station push button.
pub const STA_BUTTON: &str = "STA Button";
/// Virtual config push button.
pub const CONFIG_BUTTON: &str = "Config";
/// Restores factory settings. The device reboots without replying.
pub const RESET_FACTORY: &str = "Reset factory";

// ============================================================================
// Acknowledgement Texts
// ============================================================================

/// Ack text after a user-area write was stored.
pub const ACK_SETTINGS_SAVED: &str = "User settings saved";

/// Ack text after the band scan start command was accepted.
pub const ACK_SCAN_REQUESTED: &str = "Band scan requested";

/// Lowercase marker that flags a busy ack.
pub const ACK_BUSY_MARKER: &str = "busy";

// ============================================================================
// Tests
// ============================================================================
