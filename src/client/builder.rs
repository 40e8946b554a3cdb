//! Builder pattern for link configuration.
//!
//! Provides a fluent API for configuring and creating [`DeviceLink`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use device_link::DeviceLink;
//!
//! # async fn example() -> device_link::Result<()> {
//! let link = DeviceLink::builder()
//!     .current_host("10.0.0.7")
//!     .fallback_host("192.168.4.1")
//!     .on_open(|endpoint| println!("connected to {endpoint}"))
//!     .connect()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::Inbound;
use crate::transport::{Endpoint, LinkHandlers, resolve};

use super::core::DeviceLink;
use super::options::{LinkOptions, Timing};

// ============================================================================
// LinkBuilder
// ============================================================================

/// Builder for configuring a [`DeviceLink`].
///
/// Use [`DeviceLink::builder()`] to create a new builder.
#[derive(Default)]
pub struct LinkBuilder {
    /// Endpoint, timer and channel settings.
    options: LinkOptions,
    /// Host the embedding UI was loaded from.
    current_host: Option<String>,
    /// Operator-supplied host or URL, tried first.
    override_target: Option<String>,
    /// Explicit candidates; bypasses resolution when set.
    endpoint_list: Option<Vec<Endpoint>>,
    /// Lifecycle callbacks.
    handlers: LinkHandlers,
}

impl fmt::Debug for LinkBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkBuilder")
            .field("options", &self.options)
            .field("current_host", &self.current_host)
            .field("override_target", &self.override_target)
            .field("endpoint_list", &self.endpoint_list)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// LinkBuilder - Endpoints
// ============================================================================

impl LinkBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: LinkOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a fallback host.
    #[must_use]
    pub fn fallback_host(mut self, host: impl Into<String>) -> Self {
        self.options.endpoints.fallback_hosts.push(host.into());
        self
    }

    /// Replaces the fallback hosts.
    #[must_use]
    pub fn fallback_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.endpoints.fallback_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the host the UI was served from.
    ///
    /// Ignored when it is a loopback or empty host.
    #[inline]
    #[must_use]
    pub fn current_host(mut self, host: impl Into<String>) -> Self {
        self.current_host = Some(host.into());
        self
    }

    /// Sets an operator override: a host or a full `ws(s)://` URL.
    ///
    /// Always tried first.
    #[inline]
    #[must_use]
    pub fn endpoint_override(mut self, target: impl Into<String>) -> Self {
        self.override_target = Some(target.into());
        self
    }

    /// Uses exactly these candidates, skipping resolution.
    #[inline]
    #[must_use]
    pub fn endpoint_list(mut self, endpoints: Vec<Endpoint>) -> Self {
        self.endpoint_list = Some(endpoints);
        self
    }

    /// Tries fallback hosts before the current host.
    #[inline]
    #[must_use]
    pub fn device_first(mut self, device_first: bool) -> Self {
        self.options.endpoints.device_first = device_first;
        self
    }

    /// Sets the port appended to every host.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.options.endpoints.port = Some(port);
        self
    }

    /// Sets the request path.
    #[inline]
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.options.endpoints.path = path.into();
        self
    }

    /// Uses `wss://` for resolved hosts.
    #[inline]
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.options.endpoints.secure = secure;
        self
    }
}

// ============================================================================
// LinkBuilder - Timing
// ============================================================================

impl LinkBuilder {
    /// Replaces the timers.
    #[inline]
    #[must_use]
    pub fn timing(mut self, timing: Timing) -> Self {
        self.options.timing = timing;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.timing.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enables the scanning-phase safety timeout.
    #[inline]
    #[must_use]
    pub fn scan_safety_timeout(mut self, timeout: Duration) -> Self {
        self.options = self.options.with_scan_safety_timeout(timeout);
        self
    }

    /// Sets the event broadcast capacity.
    #[inline]
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.options.event_capacity = capacity;
        self
    }
}

// ============================================================================
// LinkBuilder - Handlers
// ============================================================================

impl LinkBuilder {
    /// Called after a transport opens.
    #[must_use]
    pub fn on_open(mut self, handler: impl Fn(&Endpoint) + Send + Sync + 'static) -> Self {
        self.handlers.on_open = Some(Arc::new(handler));
        self
    }

    /// Called after an open transport closes.
    #[must_use]
    pub fn on_close(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.handlers.on_close = Some(Arc::new(handler));
        self
    }

    /// Called on failed attempts and transport errors.
    #[must_use]
    pub fn on_error(mut self, handler: impl Fn(&Error) + Send + Sync + 'static) -> Self {
        self.handlers.on_error = Some(Arc::new(handler));
        self
    }

    /// Called for every classified inbound message.
    #[must_use]
    pub fn on_message(mut self, handler: impl Fn(&Inbound) + Send + Sync + 'static) -> Self {
        self.handlers.on_message = Some(Arc::new(handler));
        self
    }
}

// ============================================================================
// LinkBuilder - Build
// ============================================================================

impl LinkBuilder {
    /// Resolved candidates this builder would use.
    #[must_use]
    pub fn candidates(&self) -> Vec<Endpoint> {
        match &self.endpoint_list {
            Some(list) if !list.is_empty() => list.clone(),
            _ => resolve(
                &self.options.endpoints,
                self.current_host.as_deref(),
                self.override_target.as_deref(),
            ),
        }
    }

    /// Builds the link without connecting.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the options are invalid
    /// - [`Error::Config`] if called outside a tokio runtime
    pub fn build(self) -> Result<DeviceLink> {
        let endpoints = self.candidates();
        DeviceLink::spawn(&self.options, endpoints, self.handlers)
    }

    /// Builds the link and starts connecting.
    ///
    /// # Errors
    ///
    /// Same as [`LinkBuilder::build`].
    pub fn connect(self) -> Result<DeviceLink> {
        let link = self.build()?;
        link.connect()?;
        Ok(link)
    }
}

// ============================================================================
// Tests
// ============================================================================
