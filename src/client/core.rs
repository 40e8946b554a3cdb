//! The device link handle.
//!
//! A [`DeviceLink`] is a cheap, cloneable handle to one link loop. Every
//! clone talks to the same loop; when the last clone is dropped the loop
//! closes the socket and exits.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use device_link::{DeviceLink, Inbound, Request, Result, Setting};
//!
//! # async fn example() -> Result<()> {
//! let link = DeviceLink::builder()
//!     .current_host("192.168.4.1")
//!     .connect()?;
//!
//! link.wait_connected(Duration::from_secs(5)).await?;
//!
//! let reply = link
//!     .request(
//!         Request::read(Setting::Device, ["Device Info"]),
//!         |m: &Inbound| m.has_key("Device Info"),
//!         Duration::from_secs(5),
//!     )
//!     .await?;
//! println!("{}", reply.raw());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::{Inbound, Request};
use crate::scan::{ScanParams, ScanSession, ScanSummary};
use crate::transport::{
    ConnectionState, Endpoint, LinkCommand, LinkEvent, LinkHandlers, LinkLoop,
};

use super::builder::LinkBuilder;
use super::options::{LinkOptions, Timing};

// ============================================================================
// Types
// ============================================================================

/// Shared state behind every clone of a [`DeviceLink`].
struct LinkInner {
    /// Commands to the link loop.
    command_tx: mpsc::UnboundedSender<LinkCommand>,
    /// Connection state published by the loop.
    state_rx: watch::Receiver<ConnectionState>,
    /// Event broadcast; kept to hand out receivers.
    events_tx: broadcast::Sender<LinkEvent>,
    /// Lifecycle callbacks, read by the loop.
    handlers: Arc<Mutex<LinkHandlers>>,
    /// Resolved endpoint candidates, in attempt order.
    endpoints: Vec<Endpoint>,
    /// Timers.
    timing: Timing,
}

// ============================================================================
// DeviceLink
// ============================================================================

/// Handle to a device connection.
///
/// Created with [`DeviceLink::builder()`]. Nothing connects until
/// [`DeviceLink::connect`] is called.
#[derive(Clone)]
pub struct DeviceLink {
    /// Shared inner state.
    inner: Arc<LinkInner>,
}

impl fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceLink")
            .field("state", &self.state())
            .field("endpoints", &self.inner.endpoints)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// DeviceLink - Constructor
// ============================================================================

impl DeviceLink {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> LinkBuilder {
        LinkBuilder::new()
    }

    /// Spawns the link loop for a resolved candidate list.
    pub(crate) fn spawn(
        options: &LinkOptions,
        endpoints: Vec<Endpoint>,
        handlers: LinkHandlers,
    ) -> Result<Self> {
        options.validate()?;

        if endpoints.is_empty() {
            return Err(Error::config("at least one endpoint candidate is required"));
        }

        let handlers = Arc::new(Mutex::new(handlers));
        let channels = LinkLoop::spawn(
            endpoints.clone(),
            options.timing,
            options.event_capacity,
            Arc::clone(&handlers),
        )?;

        debug!(
            candidates = endpoints.len(),
            first = %endpoints[0],
            "Device link created"
        );

        Ok(Self {
            inner: Arc::new(LinkInner {
                command_tx: channels.command_tx,
                state_rx: channels.state_rx,
                events_tx: channels.events_tx,
                handlers,
                endpoints,
                timing: options.timing,
            }),
        })
    }
}

// ============================================================================
// DeviceLink - Accessors
// ============================================================================

impl DeviceLink {
    /// Current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_rx.borrow()
    }

    /// Returns `true` if the transport is open.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Endpoint candidates in attempt order.
    #[inline]
    #[must_use]
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.inner.endpoints
    }

    /// Timers this link was built with.
    #[inline]
    #[must_use]
    pub fn timing(&self) -> &Timing {
        &self.inner.timing
    }

    /// Subscribes to link events.
    ///
    /// Only events sent after this call are received. A slow subscriber
    /// lags; it never slows the link.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Watches connection state changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_rx.clone()
    }
}

// ============================================================================
// DeviceLink - Lifecycle
// ============================================================================

impl DeviceLink {
    /// Starts connecting and enables automatic reconnection.
    ///
    /// No-op while connecting or connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the link loop has exited.
    pub fn connect(&self) -> Result<()> {
        self.post(LinkCommand::Connect)
    }

    /// Closes the connection and disables reconnection.
    ///
    /// Resets any band scan in flight. A later [`DeviceLink::connect`]
    /// re-enables reconnection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the link loop has exited.
    pub async fn close(&self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.post(LinkCommand::Close { reply })?;
        rx.await?;
        Ok(())
    }

    /// Waits until the transport is open.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if not connected within `timeout`
    /// - [`Error::ConnectionClosed`] if the link loop has exited
    pub async fn wait_connected(&self, timeout: Duration) -> Result<()> {
        let mut state_rx = self.inner.state_rx.clone();

        match tokio::time::timeout(
            timeout,
            state_rx.wait_for(|state| *state == ConnectionState::Connected),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => Err(Error::connection_timeout(timeout.as_millis() as u64)),
        }
    }
}

// ============================================================================
// DeviceLink - Messaging
// ============================================================================

impl DeviceLink {
    /// Sends a request and confirms it was written.
    ///
    /// Nothing is queued while disconnected.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the transport is not open
    /// - [`Error::ConnectionClosed`] if the link loop has exited
    pub async fn send(&self, request: Request) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.post(LinkCommand::Send {
            request,
            reply: Some(reply),
        })?;
        rx.await?
    }

    /// Sends a request without waiting for the write.
    ///
    /// Returns `false` if the transport is not open, in which case nothing
    /// is sent.
    pub fn try_send(&self, request: Request) -> bool {
        if !self.is_connected() {
            debug!(setting = ?request.setting, action = ?request.action, "try_send while disconnected");
            return false;
        }

        self.post(LinkCommand::Send {
            request,
            reply: None,
        })
        .is_ok()
    }

    /// Sends a request and waits for the first message matching `predicate`.
    ///
    /// The waiter is registered before the request is written, so a reply
    /// that arrives immediately is not missed.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the request could not be written
    /// - [`Error::WaitTimeout`] if nothing matched within `timeout`
    /// - [`Error::Protocol`] if too many waiters are outstanding
    pub async fn request<P>(&self, request: Request, predicate: P, timeout: Duration) -> Result<Inbound>
    where
        P: Fn(&Inbound) -> bool + Send + 'static,
    {
        self.await_message(Some(request), Box::new(predicate), timeout)
            .await
    }

    /// Waits for the first message matching `predicate` without sending.
    ///
    /// # Errors
    ///
    /// - [`Error::WaitTimeout`] if nothing matched within `timeout`
    /// - [`Error::Protocol`] if too many waiters are outstanding
    pub async fn wait_for<P>(&self, predicate: P, timeout: Duration) -> Result<Inbound>
    where
        P: Fn(&Inbound) -> bool + Send + 'static,
    {
        self.await_message(None, Box::new(predicate), timeout).await
    }

    async fn await_message(
        &self,
        request: Option<Request>,
        predicate: Box<dyn Fn(&Inbound) -> bool + Send>,
        timeout: Duration,
    ) -> Result<Inbound> {
        let (reply, rx) = oneshot::channel();
        self.post(LinkCommand::Await {
            predicate,
            timeout,
            request,
            reply,
        })?;
        rx.await?
    }
}

// ============================================================================
// DeviceLink - Band Scan
// ============================================================================

impl DeviceLink {
    /// Runs a band scan to completion.
    ///
    /// Writes the scan configuration, starts the scan once the write is
    /// acknowledged and resolves when progress reaches 100. Progress, hits
    /// and found records are broadcast as [`LinkEvent::Scan`] meanwhile.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the transport is not open
    /// - [`Error::ScanInProgress`] if a scan is already running
    /// - [`Error::DeviceRejected`] if the device refused a step
    /// - [`Error::ScanBusy`] if the device stayed busy after one retry
    /// - [`Error::Timeout`] if a phase deadline passed
    /// - [`Error::ScanAborted`] on disconnect or close
    pub async fn start_scan(&self, params: ScanParams) -> Result<ScanSummary> {
        let (reply, rx) = oneshot::channel();
        self.post(LinkCommand::StartScan { params, reply })?;
        rx.await?
    }

    /// Snapshot of the scan session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the link loop has exited.
    pub async fn scan_session(&self) -> Result<ScanSession> {
        let (reply, rx) = oneshot::channel();
        self.post(LinkCommand::ScanSession { reply })?;
        Ok(rx.await?)
    }
}

// ============================================================================
// DeviceLink - Handlers
// ============================================================================

impl DeviceLink {
    /// Replaces all lifecycle handlers.
    ///
    /// Safe to call from inside a handler; the change applies from the next
    /// callback.
    pub fn set_handlers(&self, handlers: LinkHandlers) {
        *self.inner.handlers.lock() = handlers;
    }

    /// Removes all lifecycle handlers.
    pub fn clear_handlers(&self) {
        self.set_handlers(LinkHandlers::default());
    }

    /// Replaces the message handler.
    pub fn on_message(&self, handler: impl Fn(&Inbound) + Send + Sync + 'static) {
        self.inner.handlers.lock().on_message = Some(Arc::new(handler));
    }
}

// ============================================================================
// DeviceLink - Internal
// ============================================================================

impl DeviceLink {
    fn post(&self, command: LinkCommand) -> Result<()> {
        self.inner
            .command_tx
            .send(command)
            .map_err(|_| Error::ConnectionClosed)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    use crate::protocol::Setting;
    use crate::scan::{ScanEvent, ScanPhase};
    use crate::testing::{MockDevice, fast_timing};

    fn link_to(endpoints: Vec<Endpoint>) -> DeviceLink {
        DeviceLink::builder()
            .endpoint_list(endpoints)
            .timing(fast_timing())
            .build()
            .expect("build link")
    }

    #[test]
    fn test_device_link_is_clone_send_sync() {
        fn assert_traits<T: Clone + Send + Sync + fmt::Debug>() {}
        assert_traits::<DeviceLink>();
    }

    #[test]
    fn test_build_outside_runtime_fails() {
        let result = DeviceLink::builder().build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn test_send_while_disconnected() {
        let link = DeviceLink::builder().build().expect("build");

        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(!link.try_send(Request::scan_start()));
        let err = assert_err!(link.send(Request::scan_start()).await);
        assert!(matches!(err, Error::NotConnected));

        let err = link
            .request(Request::scan_start(), Inbound::is_ack, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));

        let err = link.start_scan(ScanParams::default()).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
    }

    #[tokio::test]
    async fn test_request_resolves_with_matching_reply() {
        let device = MockDevice::bind().await;
        let link = link_to(vec![device.endpoint()]);
        assert_ok!(link.connect());

        let mut session = device.accept().await;
        assert_ok!(link.wait_connected(Duration::from_secs(2)).await);

        let pending = tokio::spawn({
            let link = link.clone();
            async move {
                link.request(
                    Request::read(Setting::Device, ["AP SSID"]),
                    |m: &Inbound| m.has_key("AP SSID"),
                    Duration::from_secs(2),
                )
                .await
            }
        });

        let sent = session.recv_json().await;
        assert_eq!(
            sent,
            json!({"setting": "device", "action": "read", "fields": ["AP SSID"]})
        );

        session.send_json(json!({"Active Clients": []})).await;
        session.send_json(json!({"AP SSID": "lab"})).await;

        let reply = pending.await.expect("join").expect("reply");
        assert_eq!(reply.get("AP SSID"), Some(&json!("lab")));
    }

    #[tokio::test]
    async fn test_waiter_timeout_is_isolated() {
        let device = MockDevice::bind().await;
        let link = link_to(vec![device.endpoint()]);
        link.connect().expect("connect");
        let mut session = device.accept().await;
        link.wait_connected(Duration::from_secs(2)).await.expect("connected");

        let short = tokio::spawn({
            let link = link.clone();
            async move {
                link.wait_for(|m: &Inbound| m.has_key("never"), Duration::from_millis(50))
                    .await
            }
        });
        let long = tokio::spawn({
            let link = link.clone();
            async move { link.wait_for(Inbound::is_ack, Duration::from_secs(2)).await }
        });

        let err = short.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::WaitTimeout { timeout_ms: 50, .. }));

        session
            .send_json(json!({"error": false, "message": "ok"}))
            .await;
        let ack = long.await.expect("join").expect("ack");
        assert!(ack.is_ack());
    }

    #[tokio::test]
    async fn test_handler_can_replace_handlers() {
        let device = MockDevice::bind().await;
        let link = link_to(vec![device.endpoint()]);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        link.on_message({
            let link = link.clone();
            let first = Arc::clone(&first);
            let second = Arc::clone(&second);
            move |_| {
                first.fetch_add(1, Ordering::SeqCst);
                let second = Arc::clone(&second);
                link.on_message(move |_| {
                    second.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        let mut events = link.subscribe();
        link.connect().expect("connect");
        let mut session = device.accept().await;
        link.wait_connected(Duration::from_secs(2)).await.expect("connected");

        session.send_json(json!({"seq": 1})).await;
        session.send_json(json!({"seq": 2})).await;
        session.send_json(json!({"seq": 3})).await;

        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let LinkEvent::Message(m) = events.recv().await.expect("event")
                    && m.raw().get("seq") == Some(&json!(3))
                {
                    break;
                }
            }
        })
        .await
        .expect("third message");

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert!(second.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_unparsable_frame_is_reported() {
        let device = MockDevice::bind().await;
        let link = link_to(vec![device.endpoint()]);
        let mut events = link.subscribe();
        link.connect().expect("connect");
        let mut session = device.accept().await;

        session.send_text("not json").await;

        loop {
            match events.recv().await.expect("event") {
                LinkEvent::Unparsed(text) => {
                    assert_eq!(text, "not json");
                    break;
                }
                LinkEvent::Connected { .. } => {}
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_end_to_end_band_scan() {
        let device = MockDevice::bind().await;
        let link = link_to(vec![device.endpoint()]);
        let mut events = link.subscribe();
        link.connect().expect("connect");
        let mut session = device.accept().await;
        link.wait_connected(Duration::from_secs(2)).await.expect("connected");

        let scan = tokio::spawn({
            let link = link.clone();
            async move {
                link.start_scan(ScanParams::new(430.0, 440.0, 0.5, 10))
                    .await
            }
        });

        let write = session.recv_json().await;
        assert_eq!(write["action"], "write");
        assert_eq!(write["fields"]["RF_SCAN_START_MHZ"], json!(430.0));
        session
            .send_json(json!({"error": false, "message": "User settings saved"}))
            .await;

        let start = session.recv_json().await;
        assert_eq!(
            start,
            json!({"setting": "user", "action": "command", "fields": {"Scan Band": true}})
        );
        session
            .send_json(json!({"error": false, "message": "Band scan requested"}))
            .await;

        session.send_json(json!({"type": "progress", "progress": 33})).await;
        session
            .send_json(json!({"type": "hit", "freq_MHz": 433.92, "rssi": -40}))
            .await;
        session.send_json(json!({"type": "progress", "progress": 67})).await;
        session.send_json(json!({"type": "progress", "progress": 100})).await;
        session.send_json(json!({"type": "progress", "progress": 100})).await;

        let summary = scan.await.expect("join").expect("summary");
        assert_eq!(summary.hits, 1);
        assert_eq!(summary.progress_updates, 3);

        let mut completed = 0;
        while let Ok(Ok(event)) =
            tokio::time::timeout(Duration::from_millis(100), events.recv()).await
        {
            if let LinkEvent::Scan(ScanEvent::Completed(_)) = event {
                completed += 1;
            }
        }
        assert_eq!(completed, 1);

        let snapshot = link.scan_session().await.expect("session");
        assert_eq!(snapshot.phase, ScanPhase::Idle);
    }

    #[tokio::test]
    async fn test_disconnect_aborts_scan_and_reconnects() {
        let device = MockDevice::bind().await;
        let link = link_to(vec![device.endpoint()]);
        link.connect().expect("connect");
        let mut session = device.accept().await;
        link.wait_connected(Duration::from_secs(2)).await.expect("connected");

        let scan = tokio::spawn({
            let link = link.clone();
            async move { link.start_scan(ScanParams::default()).await }
        });
        let _write = session.recv_json().await;
        session.close().await;

        let err = scan.await.expect("join").unwrap_err();
        assert!(matches!(err, Error::ScanAborted));

        let _again = device.accept().await;
        link.wait_connected(Duration::from_secs(2))
            .await
            .expect("reconnected");

        let snapshot = link.scan_session().await.expect("session");
        assert!(!snapshot.is_active());
        assert!(!snapshot.pending_start_after_write);
    }

    #[tokio::test]
    async fn test_reconnect_walks_candidates_from_first() {
        let live = MockDevice::bind().await;
        let dead = MockDevice::unreachable_endpoint().await;
        let link = link_to(vec![dead.clone(), live.endpoint()]);

        let opened = Arc::new(AtomicUsize::new(0));
        link.set_handlers(LinkHandlers {
            on_open: Some(Arc::new({
                let opened = Arc::clone(&opened);
                move |_| {
                    opened.fetch_add(1, Ordering::SeqCst);
                }
            })),
            ..LinkHandlers::default()
        });

        link.connect().expect("connect");
        let session = live.accept().await;
        link.wait_connected(Duration::from_secs(2)).await.expect("connected");
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        let mut events = link.subscribe();
        session.close().await;
        let _again = live.accept().await;

        let mut retried_dead = false;
        let reconnected_to = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match events.recv().await.expect("event") {
                    LinkEvent::Disconnected {
                        endpoint: Some(endpoint),
                        error: Some(_),
                    } if endpoint == dead => retried_dead = true,
                    LinkEvent::Connected { endpoint } => break endpoint,
                    _ => {}
                }
            }
        })
        .await
        .expect("reconnected");

        assert!(retried_dead, "first candidate was not retried");
        assert_eq!(reconnected_to, live.endpoint());
        assert_eq!(opened.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_close_stops_reconnect() {
        let device = MockDevice::bind().await;
        let link = link_to(vec![device.endpoint()]);
        link.connect().expect("connect");
        let _session = device.accept().await;
        link.wait_connected(Duration::from_secs(2)).await.expect("connected");

        assert_ok!(link.close().await);
        assert_eq!(link.state(), ConnectionState::Disconnected);

        let reconnected = tokio::time::timeout(Duration::from_millis(200), device.accept()).await;
        assert!(reconnected.is_err());
    }

    #[tokio::test]
    async fn test_dropping_every_handle_fails_waiters() {
        let device = MockDevice::bind().await;
        let link = link_to(vec![device.endpoint()]);
        link.connect().expect("connect");
        let _session = device.accept().await;
        link.wait_connected(Duration::from_secs(2)).await.expect("connected");

        let (reply, rx) = oneshot::channel();
        link.post(LinkCommand::Await {
            predicate: Box::new(|_: &Inbound| false),
            timeout: Duration::from_secs(30),
            request: None,
            reply,
        })
        .expect("post");
        drop(link);

        let result = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("loop shut down")
            .expect("reply sent");
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }
}
