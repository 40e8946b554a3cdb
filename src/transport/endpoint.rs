//! Endpoint candidate resolution.
//!
//! Produces the ordered list of WebSocket URLs the link walks on every
//! connection cycle.
//!
//! # Ordering
//!
//! 1. Operator override, if any
//! 2. Fallback hosts then current host (device-first), or the reverse
//! 3. Loopback when nothing else survives
//!
//! Duplicates are removed keeping the first occurrence. A current host of
//! `localhost` or `127.0.0.1` is skipped: it means the UI was served by a
//! development machine, not by the device.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::Ipv6Addr;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Address of the device on its own access point.
pub const DEFAULT_FALLBACK_HOST: &str = "192.168.1.2";

/// WebSocket path served by the firmware.
pub const DEFAULT_PATH: &str = "/ws";

/// Host used when no candidate can be produced.
const LOOPBACK_HOST: &str = "localhost";

/// Loopback URL used if the configured port or path cannot form one.
const LOOPBACK_URL: &str = "ws://localhost/ws";

// ============================================================================
// EndpointConfig
// ============================================================================

/// Static endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Hosts tried regardless of where the UI runs.
    pub fallback_hosts: Vec<String>,
    /// Port appended to every host; `None` uses the scheme default.
    pub port: Option<u16>,
    /// Request path.
    pub path: String,
    /// Use `wss://` instead of `ws://`.
    pub secure: bool,
    /// Try fallback hosts before the current host.
    pub device_first: bool,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            fallback_hosts: vec![DEFAULT_FALLBACK_HOST.to_string()],
            port: None,
            path: DEFAULT_PATH.to_string(),
            secure: false,
            device_first: true,
        }
    }
}

impl EndpointConfig {
    /// Builds an endpoint for `host` using this configuration.
    ///
    /// `host` may carry its own `:port`, which then wins over
    /// [`EndpointConfig::port`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the result is not a valid URL.
    pub fn endpoint_for(&self, host: &str) -> Result<Endpoint> {
        let scheme = if self.secure { "wss" } else { "ws" };
        let host = host.trim();

        let authority = if host.parse::<Ipv6Addr>().is_ok() {
            format!("[{host}]")
        } else {
            host.to_string()
        };

        let port = match self.port {
            Some(port) if !has_explicit_port(&authority) => format!(":{port}"),
            _ => String::new(),
        };

        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        Endpoint::parse(&format!("{scheme}://{authority}{port}{path}"))
    }
}

/// Returns `true` if an authority already ends in `:port`.
fn has_explicit_port(authority: &str) -> bool {
    let tail = authority.rsplit(']').next().unwrap_or(authority);
    tail.rsplit_once(':')
        .is_some_and(|(_, port)| !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()))
}

// ============================================================================
// Endpoint
// ============================================================================

/// A resolved WebSocket URL. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint(Url);

impl Endpoint {
    /// Parses a `ws://` or `wss://` URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] for unparsable URLs, other schemes,
    /// or URLs without a host.
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| Error::invalid_endpoint(url, e.to_string()))?;

        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(Error::invalid_endpoint(url, "scheme must be ws or wss"));
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(Error::invalid_endpoint(url, "missing host"));
        }

        Ok(Self(parsed))
    }

    /// Full URL text.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Underlying URL.
    #[inline]
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.0
    }

    /// Host part.
    #[inline]
    #[must_use]
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }

    /// Returns `true` for `wss://`.
    #[inline]
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.0.scheme() == "wss"
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Returns `true` for hosts that mean "the UI runs on this machine".
fn is_local_host(host: &str) -> bool {
    matches!(host.trim(), "localhost" | "127.0.0.1" | "::1" | "[::1]")
}

/// Resolves the ordered, deduplicated candidate list.
///
/// `current_host` is the host the embedding UI was loaded from.
/// `override_target` is an operator-supplied host or full `ws(s)://` URL and
/// always comes first. Invalid entries are skipped with a warning. The result
/// is never empty.
#[must_use]
pub fn resolve(
    config: &EndpointConfig,
    current_host: Option<&str>,
    override_target: Option<&str>,
) -> Vec<Endpoint> {
    let mut candidates: Vec<Result<Endpoint>> = Vec::new();

    if let Some(target) = override_target.map(str::trim).filter(|t| !t.is_empty()) {
        if target.contains("://") {
            candidates.push(Endpoint::parse(target));
        } else {
            candidates.push(config.endpoint_for(target));
        }
    }

    let fallbacks = config
        .fallback_hosts
        .iter()
        .map(String::as_str)
        .filter(|host| !host.trim().is_empty());

    let current = current_host
        .filter(|host| !host.trim().is_empty() && !is_local_host(host))
        .into_iter();

    let hosts: Vec<&str> = if config.device_first {
        fallbacks.chain(current).collect()
    } else {
        current.chain(fallbacks).collect()
    };

    candidates.extend(hosts.into_iter().map(|host| config.endpoint_for(host)));

    let mut seen = FxHashSet::default();
    let mut endpoints = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match candidate {
            Ok(endpoint) => {
                if seen.insert(endpoint.as_str().to_string()) {
                    endpoints.push(endpoint);
                }
            }
            Err(e) => warn!(error = %e, "Skipping endpoint candidate"),
        }
    }

    if endpoints.is_empty() {
        endpoints.extend(
            config
                .endpoint_for(LOOPBACK_HOST)
                .or_else(|_| Endpoint::parse(LOOPBACK_URL))
                .ok(),
        );
    }

    endpoints
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn urls(endpoints: &[Endpoint]) -> Vec<&str> {
        endpoints.iter().map(Endpoint::as_str).collect()
    }

    #[test]
    fn test_default_config() {
        let config = EndpointConfig::default();
        assert_eq!(config.fallback_hosts, vec!["192.168.1.2"]);
        assert_eq!(config.path, "/ws");
        assert!(config.device_first);
        assert!(!config.secure);
    }

    #[test]
    fn test_device_first_order() {
        let config = EndpointConfig::default();
        let endpoints = resolve(&config, Some("10.0.0.7"), None);

        assert_eq!(
            urls(&endpoints),
            vec!["ws://192.168.1.2/ws", "ws://10.0.0.7/ws"]
        );
    }

    #[test]
    fn test_current_host_first_order() {
        let config = EndpointConfig {
            device_first: false,
            ..EndpointConfig::default()
        };
        let endpoints = resolve(&config, Some("10.0.0.7"), None);

        assert_eq!(
            urls(&endpoints),
            vec!["ws://10.0.0.7/ws", "ws://192.168.1.2/ws"]
        );
    }

    #[test]
    fn test_local_current_host_is_skipped() {
        let config = EndpointConfig::default();
        for host in ["localhost", "127.0.0.1"] {
            let endpoints = resolve(&config, Some(host), None);
            assert_eq!(urls(&endpoints), vec!["ws://192.168.1.2/ws"]);
        }
    }

    #[test]
    fn test_override_comes_first_and_dedups() {
        let config = EndpointConfig::default();
        let endpoints = resolve(&config, Some("192.168.1.2"), Some("192.168.1.2"));
        assert_eq!(urls(&endpoints), vec!["ws://192.168.1.2/ws"]);

        let endpoints = resolve(&config, None, Some("ws://10.1.1.1:8080/socket"));
        assert_eq!(
            urls(&endpoints),
            vec!["ws://10.1.1.1:8080/socket", "ws://192.168.1.2/ws"]
        );
    }

    #[test]
    fn test_empty_falls_back_to_loopback() {
        let config = EndpointConfig {
            fallback_hosts: Vec::new(),
            ..EndpointConfig::default()
        };
        let endpoints = resolve(&config, Some("localhost"), None);
        assert_eq!(urls(&endpoints), vec!["ws://localhost/ws"]);
    }

    #[test]
    fn test_port_and_scheme() {
        let config = EndpointConfig {
            port: Some(8080),
            secure: true,
            ..EndpointConfig::default()
        };
        let endpoint = config.endpoint_for("192.168.4.1").expect("endpoint");
        assert_eq!(endpoint.as_str(), "wss://192.168.4.1:8080/ws");
        assert!(endpoint.is_secure());

        let explicit = config.endpoint_for("192.168.4.1:9000").expect("endpoint");
        assert_eq!(explicit.as_str(), "wss://192.168.4.1:9000/ws");
    }

    #[test]
    fn test_ipv6_host_is_bracketed() {
        let config = EndpointConfig::default();
        let endpoint = config.endpoint_for("fe80::1").expect("endpoint");
        assert_eq!(endpoint.host(), "[fe80::1]");
    }

    #[test]
    fn test_parse_rejects_http() {
        let err = Endpoint::parse("http://192.168.1.2/ws").unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_invalid_override_is_skipped() {
        let config = EndpointConfig::default();
        let endpoints = resolve(&config, None, Some("ws://"));
        assert_eq!(urls(&endpoints), vec!["ws://192.168.1.2/ws"]);
    }

    proptest! {
        #[test]
        fn test_resolve_never_empty_and_unique(
            fallbacks in proptest::collection::vec("[a-z]{1,6}|192\\.168\\.[0-9]\\.[0-9]", 0..4),
            current in proptest::option::of("[a-z]{1,6}|localhost|127\\.0\\.0\\.1"),
            device_first in any::<bool>(),
        ) {
            let config = EndpointConfig {
                fallback_hosts: fallbacks,
                device_first,
                ..EndpointConfig::default()
            };

            let endpoints = resolve(&config, current.as_deref(), None);
            prop_assert!(!endpoints.is_empty());

            let unique: FxHashSet<&str> = endpoints.iter().map(Endpoint::as_str).collect();
            prop_assert_eq!(unique.len(), endpoints.len());
        }
    }
}
