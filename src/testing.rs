//! In-process mock device for link tests.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, accept_async};

use crate::client::Timing;
use crate::transport::Endpoint;

/// Timers short enough for tests.
pub(crate) fn fast_timing() -> Timing {
    Timing {
        connect_timeout_ms: 500,
        retry_delay_ms: 20,
        reconnect_delay_ms: 50,
        read_timeout_ms: 500,
        write_timeout_ms: 500,
        command_timeout_ms: 500,
        network_scan_timeout_ms: 500,
        scan_ack_timeout_ms: 500,
        busy_backoff_ms: 50,
        scan_safety_timeout_ms: None,
    }
}

/// A WebSocket server standing in for the device.
pub(crate) struct MockDevice {
    listener: TcpListener,
}

impl MockDevice {
    pub(crate) async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock device");
        Self { listener }
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        let addr = self.listener.local_addr().expect("local addr");
        Endpoint::parse(&format!("ws://{addr}/ws")).expect("mock endpoint")
    }

    /// An endpoint nothing listens on.
    pub(crate) async fn unreachable_endpoint() -> Endpoint {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        Endpoint::parse(&format!("ws://{addr}/ws")).expect("endpoint")
    }

    /// Accepts the next client, failing the test after 5 seconds.
    pub(crate) async fn accept(&self) -> DeviceSession {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), self.listener.accept())
            .await
            .expect("client connected in time")
            .expect("accept");
        let ws = accept_async(stream).await.expect("websocket handshake");
        DeviceSession { ws }
    }
}

/// One accepted client connection.
pub(crate) struct DeviceSession {
    ws: WebSocketStream<TcpStream>,
}

impl DeviceSession {
    /// Next text frame as JSON.
    pub(crate) async fn recv_json(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), self.ws.next())
                .await
                .expect("frame in time")
                .expect("stream open")
                .expect("frame");

            if let Message::Text(text) = frame {
                return serde_json::from_str(text.as_str()).expect("json frame");
            }
        }
    }

    pub(crate) async fn send_json(&mut self, value: Value) {
        self.send_text(&value.to_string()).await;
    }

    pub(crate) async fn send_text(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("send frame");
    }

    pub(crate) async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
