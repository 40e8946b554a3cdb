//! Link loop: the single task that owns the device connection.
//!
//! # Event Loop
//!
//! One tokio task per link multiplexes:
//!
//! - Incoming frames from the device (classified, broadcast, correlated)
//! - Commands from [`crate::DeviceLink`] handles
//! - The pending connection attempt, if any
//! - The earliest timer: waiter deadlines, scan phase deadlines, busy
//!   backoff, candidate retry and reconnect delays
//!
//! The task is the only mutator of the socket, the waiter collection and the
//! scan session, so none of them are locked. Frames are processed strictly in
//! arrival order: frame N is fully handled before frame N+1 is read.
//!
//! # Reconnection
//!
//! A failed attempt advances to the next candidate after the retry delay.
//! Past the last candidate the index resets to 0 and a full cycle starts
//! after the reconnect delay. A successful open also resets the index, so
//! the preferred endpoint is always tried first. Only an explicit close stops
//! reconnection.

// ============================================================================
// Imports
// ============================================================================

use std::future::{Future, pending};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use crate::client::Timing;
use crate::error::{Error, Result};
use crate::protocol::{Inbound, Request};
use crate::scan::{ScanAction, ScanEvent, ScanOrchestrator, ScanParams, ScanSession, ScanSummary};

use super::correlator::{Correlator, Predicate};
use super::endpoint::Endpoint;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;
type Attempt = Pin<Box<dyn Future<Output = Result<WsStream>> + Send>>;

/// Called after a transport opens.
pub type OpenHandler = Arc<dyn Fn(&Endpoint) + Send + Sync>;

/// Called after an open transport closes.
pub type CloseHandler = Arc<dyn Fn() + Send + Sync>;

/// Called on failed attempts and transport errors.
pub type ErrorHandler = Arc<dyn Fn(&Error) + Send + Sync>;

/// Called for every classified inbound message.
pub type MessageHandler = Arc<dyn Fn(&Inbound) + Send + Sync>;

// ============================================================================
// ConnectionState
// ============================================================================

/// Connectivity of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No transport, none being opened.
    #[default]
    Disconnected,
    /// A transport is being opened.
    Connecting,
    /// A transport is open.
    Connected,
}

// ============================================================================
// LinkEvent
// ============================================================================

/// Everything observable on a link, broadcast to subscribers.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// Transport opened.
    Connected {
        /// Endpoint that answered.
        endpoint: Endpoint,
    },
    /// Transport closed, or an attempt failed.
    Disconnected {
        /// Endpoint involved, if any.
        endpoint: Option<Endpoint>,
        /// Failure description; `None` for an orderly close.
        error: Option<String>,
    },
    /// Classified inbound message.
    Message(Inbound),
    /// Inbound text that is not JSON.
    Unparsed(String),
    /// Band scan progress.
    Scan(ScanEvent),
}

// ============================================================================
// LinkHandlers
// ============================================================================

/// Lifecycle callbacks.
///
/// Callbacks run on the link task and must not block. The handler lock is
/// released before a callback runs, so a callback may replace handlers.
#[derive(Clone, Default)]
pub struct LinkHandlers {
    /// Transport opened.
    pub on_open: Option<OpenHandler>,
    /// Open transport closed.
    pub on_close: Option<CloseHandler>,
    /// Attempt failed or transport errored.
    pub on_error: Option<ErrorHandler>,
    /// Inbound message classified.
    pub on_message: Option<MessageHandler>,
}

// ============================================================================
// LinkCommand
// ============================================================================

/// Internal commands for the link loop.
pub(crate) enum LinkCommand {
    /// Open a transport unless one is open or opening.
    Connect,
    /// Transmit a request.
    Send {
        request: Request,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    /// Register a waiter, then optionally transmit a request.
    Await {
        predicate: Predicate,
        timeout: Duration,
        request: Option<Request>,
        reply: oneshot::Sender<Result<Inbound>>,
    },
    /// Begin a band scan.
    StartScan {
        params: ScanParams,
        reply: oneshot::Sender<Result<ScanSummary>>,
    },
    /// Report the scan session.
    ScanSession { reply: oneshot::Sender<ScanSession> },
    /// Close the transport and stop reconnecting.
    Close { reply: oneshot::Sender<()> },
}

// ============================================================================
// LinkChannels
// ============================================================================

/// Handle-side ends of a spawned link loop.
pub(crate) struct LinkChannels {
    pub command_tx: mpsc::UnboundedSender<LinkCommand>,
    pub state_rx: watch::Receiver<ConnectionState>,
    pub events_tx: broadcast::Sender<LinkEvent>,
}

// ============================================================================
// LinkLoop
// ============================================================================

/// One step of the loop.
enum Step {
    Frame(Option<std::result::Result<Message, WsError>>),
    Opened(Result<WsStream>),
    Command(Option<LinkCommand>),
    Timer,
}

/// State owned by the link task.
pub(crate) struct LinkLoop {
    endpoints: Vec<Endpoint>,
    index: usize,
    timing: Timing,
    should_reconnect: bool,

    reader: Option<WsReader>,
    writer: Option<WsWriter>,
    current: Option<Endpoint>,
    attempt: Option<Attempt>,
    retry_at: Option<Instant>,

    correlator: Correlator,
    scan: ScanOrchestrator,
    scan_reply: Option<oneshot::Sender<Result<ScanSummary>>>,

    commands: mpsc::UnboundedReceiver<LinkCommand>,
    state_tx: watch::Sender<ConnectionState>,
    events: broadcast::Sender<LinkEvent>,
    handlers: Arc<Mutex<LinkHandlers>>,
}

impl LinkLoop {
    /// Spawns the loop on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when called outside a tokio runtime.
    pub(crate) fn spawn(
        endpoints: Vec<Endpoint>,
        timing: Timing,
        event_capacity: usize,
        handlers: Arc<Mutex<LinkHandlers>>,
    ) -> Result<LinkChannels> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::config("DeviceLink must be built inside a tokio runtime"))?;

        let (command_tx, commands) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, _) = broadcast::channel(event_capacity.max(1));

        let link = Self {
            endpoints,
            index: 0,
            timing,
            should_reconnect: true,
            reader: None,
            writer: None,
            current: None,
            attempt: None,
            retry_at: None,
            correlator: Correlator::new(),
            scan: ScanOrchestrator::new(timing.scan_timing()),
            scan_reply: None,
            commands,
            state_tx,
            events: events_tx.clone(),
            handlers,
        };

        runtime.spawn(link.run());

        Ok(LinkChannels {
            command_tx,
            state_rx,
            events_tx,
        })
    }

    /// Event loop.
    async fn run(mut self) {
        debug!(endpoints = self.endpoints.len(), "Link loop started");

        loop {
            let deadline = self.next_deadline();

            let step = tokio::select! {
                frame = next_frame(&mut self.reader) => Step::Frame(frame),
                opened = poll_attempt(&mut self.attempt) => Step::Opened(opened),
                command = self.commands.recv() => Step::Command(command),
                () = sleep_until_opt(deadline) => Step::Timer,
            };

            match step {
                Step::Frame(frame) => self.handle_frame(frame).await,
                Step::Opened(opened) => self.handle_opened(opened),
                Step::Command(Some(command)) => self.handle_command(command).await,
                Step::Command(None) => {
                    debug!("Command channel closed");
                    break;
                }
                Step::Timer => self.handle_timer().await,
            }
        }

        self.shutdown().await;
        debug!("Link loop terminated");
    }

    // ========================================================================
    // Connection Management
    // ========================================================================

    /// Starts an attempt on the current candidate.
    fn start_attempt(&mut self) {
        let Some(endpoint) = self.endpoints.get(self.index).cloned() else {
            self.index = 0;
            return;
        };

        self.retry_at = None;
        self.set_state(ConnectionState::Connecting);
        info!(
            endpoint = %endpoint,
            index = self.index,
            total = self.endpoints.len(),
            "Connecting"
        );

        self.attempt = Some(Box::pin(open(endpoint, self.timing.connect_timeout())));
    }

    fn handle_opened(&mut self, opened: Result<WsStream>) {
        self.attempt = None;
        let endpoint = self.endpoints.get(self.index).cloned();

        match (opened, endpoint) {
            (Ok(stream), Some(endpoint)) => {
                let (writer, reader) = stream.split();
                self.writer = Some(writer);
                self.reader = Some(reader);
                self.current = Some(endpoint.clone());
                self.index = 0;
                self.set_state(ConnectionState::Connected);

                info!(endpoint = %endpoint, "Connected");
                self.emit(LinkEvent::Connected {
                    endpoint: endpoint.clone(),
                });
                let on_open = self.handlers.lock().on_open.clone();
                if let Some(on_open) = on_open {
                    on_open(&endpoint);
                }
            }

            (Ok(_), None) => {
                self.set_state(ConnectionState::Disconnected);
                self.index = 0;
            }

            (Err(e), endpoint) => {
                warn!(
                    endpoint = endpoint.as_ref().map(Endpoint::as_str),
                    error = %e,
                    "Connection attempt failed"
                );
                self.set_state(ConnectionState::Disconnected);
                self.emit(LinkEvent::Disconnected {
                    endpoint,
                    error: Some(e.to_string()),
                });
                let on_error = self.handlers.lock().on_error.clone();
                if let Some(on_error) = on_error {
                    on_error(&e);
                }
                self.advance_candidate();
            }
        }
    }

    /// Moves to the next candidate, or schedules a full cycle.
    fn advance_candidate(&mut self) {
        if !self.should_reconnect {
            return;
        }

        self.index += 1;
        if self.index < self.endpoints.len() {
            self.retry_at = Some(Instant::now() + self.timing.retry_delay());
        } else {
            error!(
                attempts = self.endpoints.len(),
                "All connection attempts failed"
            );
            self.index = 0;
            self.retry_at = Some(Instant::now() + self.timing.reconnect_delay());
        }
    }

    /// Tears down a transport that failed underneath us.
    fn transport_lost(&mut self, error: Option<Error>) {
        if self.writer.is_none() && self.reader.is_none() {
            return;
        }

        self.writer = None;
        self.reader = None;
        let endpoint = self.current.take();
        self.set_state(ConnectionState::Disconnected);

        match &error {
            Some(e) => warn!(error = %e, "Connection lost"),
            None => info!("Connection closed by device"),
        }

        let actions = self.scan.reset();
        self.deliver_scan(actions);

        self.emit(LinkEvent::Disconnected {
            endpoint,
            error: error.as_ref().map(ToString::to_string),
        });

        let handlers = self.handlers.lock().clone();
        if let Some(e) = &error
            && let Some(on_error) = &handlers.on_error
        {
            on_error(e);
        }
        if let Some(on_close) = &handlers.on_close {
            on_close();
        }

        if self.should_reconnect {
            self.index = 0;
            self.retry_at = Some(Instant::now() + self.timing.reconnect_delay());
            debug!(
                delay_ms = self.timing.reconnect_delay_ms,
                "Reconnect scheduled"
            );
        }
    }

    /// Closes the transport on request and stops reconnecting.
    async fn close(&mut self) {
        self.should_reconnect = false;
        self.retry_at = None;
        self.attempt = None;

        let was_open = self.writer.is_some();
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.close().await;
        }
        self.reader = None;
        let endpoint = self.current.take();
        self.set_state(ConnectionState::Disconnected);

        let actions = self.scan.reset();
        self.deliver_scan(actions);

        if was_open {
            info!(endpoint = endpoint.as_ref().map(Endpoint::as_str), "Connection closed");
            self.emit(LinkEvent::Disconnected {
                endpoint,
                error: None,
            });
            let on_close = self.handlers.lock().on_close.clone();
            if let Some(on_close) = on_close {
                on_close();
            }
        }
    }

    async fn shutdown(&mut self) {
        self.close().await;
        self.correlator.fail_all(|| Error::ConnectionClosed);
        if let Some(reply) = self.scan_reply.take() {
            let _ = reply.send(Err(Error::ConnectionClosed));
        }
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    async fn handle_frame(&mut self, frame: Option<std::result::Result<Message, WsError>>) {
        match frame {
            Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()).await,

            Some(Ok(Message::Close(_))) => {
                debug!("WebSocket closed by remote");
                self.transport_lost(None);
            }

            Some(Err(e)) => self.transport_lost(Some(Error::WebSocket(e))),

            None => {
                debug!("WebSocket stream ended");
                self.transport_lost(None);
            }

            // Ignore Binary, Ping, Pong, Frame
            Some(Ok(_)) => {}
        }
    }

    async fn handle_text(&mut self, text: &str) {
        trace!(len = text.len(), "Frame received");

        let inbound = match Inbound::parse(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                warn!(error = %e, "Unparsable frame");
                self.emit(LinkEvent::Unparsed(text.to_string()));
                return;
            }
        };

        trace!(channel = %inbound.channel(), "Frame classified");
        self.emit(LinkEvent::Message(inbound.clone()));

        let on_message = self.handlers.lock().on_message.clone();
        if let Some(on_message) = on_message {
            on_message(&inbound);
        }

        self.correlator.resolve(&inbound);

        let actions = self.scan.on_message(&inbound, Instant::now());
        self.run_scan_actions(actions).await;
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn handle_command(&mut self, command: LinkCommand) {
        match command {
            LinkCommand::Connect => {
                self.should_reconnect = true;
                if self.attempt.is_some() || self.writer.is_some() {
                    trace!("Connect ignored, already connecting or connected");
                    return;
                }
                self.start_attempt();
            }

            LinkCommand::Send { request, reply } => {
                let result = self.transmit(&request).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }

            LinkCommand::Await {
                predicate,
                timeout,
                request,
                reply,
            } => {
                let Ok(id) = self
                    .correlator
                    .register(predicate, timeout, reply, Instant::now())
                else {
                    return;
                };

                if let Some(request) = request
                    && let Err(e) = self.transmit(&request).await
                {
                    self.correlator.fail(id, e);
                }
            }

            LinkCommand::StartScan { params, reply } => {
                if self.writer.is_none() {
                    let _ = reply.send(Err(Error::NotConnected));
                    return;
                }

                match self.scan.start(&params, Instant::now()) {
                    Ok(actions) => {
                        self.scan_reply = Some(reply);
                        self.run_scan_actions(actions).await;
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                    }
                }
            }

            LinkCommand::ScanSession { reply } => {
                let _ = reply.send(self.scan.session());
            }

            LinkCommand::Close { reply } => {
                self.close().await;
                let _ = reply.send(());
            }
        }
    }

    // ========================================================================
    // Timers
    // ========================================================================

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.correlator.next_deadline(),
            self.scan.next_deadline(),
            self.retry_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    async fn handle_timer(&mut self) {
        let now = Instant::now();

        self.correlator.expire(now);

        let actions = self.scan.on_timer(now);
        self.run_scan_actions(actions).await;

        if let Some(retry_at) = self.retry_at
            && retry_at <= now
        {
            self.retry_at = None;
            if self.attempt.is_none() && self.writer.is_none() && self.should_reconnect {
                self.start_attempt();
            }
        }
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Serializes and transmits a request. Never queues.
    ///
    /// A write failure tears the transport down and reports
    /// [`Error::NotConnected`].
    async fn transmit(&mut self, request: &Request) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            warn!(setting = ?request.setting, action = ?request.action, "Cannot send: not connected");
            return Err(Error::NotConnected);
        };

        let text = request.to_text()?;
        trace!(len = text.len(), "Frame sent");

        if let Err(e) = writer.send(Message::Text(text.into())).await {
            self.transport_lost(Some(Error::WebSocket(e)));
            return Err(Error::NotConnected);
        }

        Ok(())
    }

    async fn run_scan_actions(&mut self, actions: Vec<ScanAction>) {
        for action in actions {
            match action {
                ScanAction::Send(request) => {
                    if let Err(e) = self.transmit(&request).await {
                        warn!(error = %e, "Failed to send band scan request");
                    }
                }
                other => self.deliver_scan(vec![other]),
            }
        }
    }

    /// Delivers emitted events and the final outcome. Sends are dropped.
    fn deliver_scan(&mut self, actions: Vec<ScanAction>) {
        for action in actions {
            match action {
                ScanAction::Emit(event) => self.emit(LinkEvent::Scan(event)),
                ScanAction::Finish(result) => {
                    if let Some(reply) = self.scan_reply.take() {
                        let _ = reply.send(result);
                    }
                }
                ScanAction::Send(request) => {
                    trace!(action = ?request.action, "Dropping scan send outside transport");
                }
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn emit(&self, event: LinkEvent) {
        let _ = self.events.send(event);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Connection state change");
        }
    }
}

// ============================================================================
// Select Helpers
// ============================================================================

/// Opens one transport, bounded by `connect_timeout`.
async fn open(endpoint: Endpoint, connect_timeout: Duration) -> Result<WsStream> {
    match timeout(connect_timeout, connect_async(endpoint.as_str())).await {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(e)) => Err(Error::connection(format!("{endpoint}: {e}"))),
        Err(_) => Err(Error::connection_timeout(connect_timeout.as_millis() as u64)),
    }
}

async fn next_frame(reader: &mut Option<WsReader>) -> Option<std::result::Result<Message, WsError>> {
    match reader {
        Some(reader) => reader.next().await,
        None => pending().await,
    }
}

async fn poll_attempt(attempt: &mut Option<Attempt>) -> Result<WsStream> {
    match attempt {
        Some(attempt) => attempt.as_mut().await,
        None => pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}

// ============================================================================
// Tests
// ============================================================================
