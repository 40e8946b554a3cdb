//! Address codecs.
//!
//! The firmware sends addresses as arrays of byte values:
//!
//! | Kind | Wire form | Also accepted |
//! |------|-----------|---------------|
//! | IPv4 | `[192, 168, 1, 2]` | `"192.168.1.2"` |
//! | IPv6 | 16 numbers | `"fe80::1"` |
//! | MAC  | 6 numbers | `"aa:bb:cc:dd:ee:ff"` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use serde_json::{Value, json};

use crate::error::{Error, Result};

// ============================================================================
// MacAddr
// ============================================================================

/// Hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// Creates an address from its octets.
    #[inline]
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Returns the octets.
    #[inline]
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut octets = [0u8; 6];
        let mut parts = s.trim().split([':', '-']);

        for octet in &mut octets {
            let part = parts
                .next()
                .ok_or_else(|| Error::protocol(format!("MAC address too short: {s}")))?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| Error::protocol(format!("Invalid MAC octet '{part}' in {s}")))?;
        }

        if parts.next().is_some() {
            return Err(Error::protocol(format!("MAC address too long: {s}")));
        }

        Ok(Self(octets))
    }
}

// ============================================================================
// Decoders
// ============================================================================

/// Decodes an array of exactly `N` byte values.
fn octets<const N: usize>(value: &Value) -> Option<[u8; N]> {
    let items = value.as_array()?;
    if items.len() != N {
        return None;
    }

    let mut out = [0u8; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = u8::try_from(item.as_u64()?).ok()?;
    }
    Some(out)
}

/// Decodes an IPv4 address from 4 numbers or a dotted string.
#[must_use]
pub fn decode_ipv4(value: &Value) -> Option<Ipv4Addr> {
    match value {
        Value::String(text) => text.trim().parse().ok(),
        other => octets::<4>(other).map(Ipv4Addr::from),
    }
}

/// Decodes an IPv6 address from 16 numbers or its text form.
#[must_use]
pub fn decode_ipv6(value: &Value) -> Option<Ipv6Addr> {
    match value {
        Value::String(text) => text.trim().parse().ok(),
        other => octets::<16>(other).map(Ipv6Addr::from),
    }
}

/// Decodes a MAC address from 6 numbers or a colon-separated string.
#[must_use]
pub fn decode_mac(value: &Value) -> Option<MacAddr> {
    match value {
        Value::String(text) => text.parse().ok(),
        other => octets::<6>(other).map(MacAddr),
    }
}

// ============================================================================
// Encoders
// ============================================================================

/// Encodes an IPv4 address as 4 numbers.
#[must_use]
pub fn encode_ipv4(addr: Ipv4Addr) -> Value {
    json!(addr.octets())
}

/// Encodes an IPv6 address in text form, as the firmware expects on write.
#[must_use]
pub fn encode_ipv6(addr: Ipv6Addr) -> Value {
    Value::String(addr.to_string())
}

// ============================================================================
// Value Helpers
// ============================================================================

/// Renders a scalar as text: strings verbatim, everything else as JSON.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Reads an optional string field.
pub(crate) fn string_field(value: Option<&Value>) -> Option<String> {
    value.filter(|v| !v.is_null()).map(value_text)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_display_is_uppercase() {
        let mac = MacAddr::new([0xaa, 0xbb, 0x0c, 0x01, 0xee, 0xff]);
        assert_eq!(mac.to_string(), "AA:BB:0C:01:EE:FF");
    }

    #[test]
    fn test_decode_mac() {
        let mac = decode_mac(&json!([170, 187, 12, 1, 238, 255])).expect("mac");
        assert_eq!(mac.octets(), [0xaa, 0xbb, 0x0c, 0x01, 0xee, 0xff]);
        assert_eq!(decode_mac(&json!("aa:bb:0c:01:ee:ff")), Some(mac));
        assert_eq!(decode_mac(&json!([1, 2, 3])), None);
        assert_eq!(decode_mac(&json!([1, 2, 3, 4, 5, 256])), None);
        assert_eq!(decode_mac(&json!("aa:bb")), None);
    }

    #[test]
    fn test_decode_ipv4() {
        let expected = Ipv4Addr::new(192, 168, 1, 2);
        assert_eq!(decode_ipv4(&json!([192, 168, 1, 2])), Some(expected));
        assert_eq!(decode_ipv4(&json!("192.168.1.2")), Some(expected));
        assert_eq!(decode_ipv4(&json!([192, 168, 1])), None);
        assert_eq!(decode_ipv4(&json!(null)), None);
    }

    #[test]
    fn test_decode_ipv6() {
        let mut bytes = [0u8; 16];
        bytes[0] = 0xfe;
        bytes[1] = 0x80;
        bytes[15] = 1;
        let expected: Ipv6Addr = "fe80::1".parse().expect("ipv6");

        assert_eq!(decode_ipv6(&json!(bytes)), Some(expected));
        assert_eq!(decode_ipv6(&json!("fe80::1")), Some(expected));
        assert_eq!(decode_ipv6(&json!([1, 2])), None);
    }

    #[test]
    fn test_encoders() {
        assert_eq!(encode_ipv4(Ipv4Addr::new(10, 0, 0, 1)), json!([10, 0, 0, 1]));
        assert_eq!(encode_ipv6(Ipv6Addr::LOCALHOST), json!("::1"));
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("x")), "x");
        assert_eq!(value_text(&json!(7)), "7");
        assert_eq!(value_text(&json!(null)), "");
        assert_eq!(string_field(Some(&json!(null))), None);
    }
}
