use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::{Transport, TransportError, TransportEvent};
use crate::protocol::Envelope;

pub mod config;
pub use config::WebSocketConfig;

#[derive(Debug)]
enum WireEvent {
    Text(String),
    Closed,
}

/// Connection number plus what it produced; frames from a replaced
/// connection are ignored.
type Tagged = (u64, WireEvent);

/// [`Transport`] over a websocket to the relay server, one JSON envelope per
/// text frame.
pub struct WebSocketTransport {
    config: WebSocketConfig,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    inbound_tx: mpsc::UnboundedSender<Tagged>,
    inbound: AsyncMutex<mpsc::UnboundedReceiver<Tagged>>,
    generation: Arc<AtomicU64>,
    connected: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport and connect
    pub async fn connect(config: WebSocketConfig) -> Result<Self, TransportError> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let transport = Self {
            config,
            outbound: Mutex::new(None),
            inbound_tx,
            inbound: AsyncMutex::new(inbound_rx),
            generation: Arc::new(AtomicU64::new(0)),
            connected: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        };
        transport.dial().await?;
        Ok(transport)
    }

    async fn dial(&self) -> Result<(), TransportError> {
        let url = self.config.build_url()?;
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|err| TransportError::Connect(err.to_string()))?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx_out, rx_out) = mpsc::unbounded_channel::<String>();
        let handle = tokio::spawn(handle_websocket(
            ws_stream,
            rx_out,
            self.inbound_tx.clone(),
            generation,
            Arc::clone(&self.generation),
            Arc::clone(&self.connected),
        ));

        *self.outbound.lock() = Some(tx_out);
        self.connected.store(true, Ordering::SeqCst);
        if let Some(previous) = self.task.lock().replace(handle) {
            previous.abort();
        }
        info!(target = "prompter.transport", url = %url, generation, "websocket connected");
        Ok(())
    }

    /// Close the WebSocket connection
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.outbound.lock().take();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Unavailable("websocket not connected".into()));
        }
        let text = envelope.to_json()?;
        let guard = self.outbound.lock();
        let sender = guard.as_ref().ok_or(TransportError::Closed)?;
        sender.send(text).map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> TransportEvent {
        let mut inbound = self.inbound.lock().await;
        loop {
            let Some((generation, event)) = inbound.recv().await else {
                return TransportEvent::Closed;
            };
            if generation != self.generation.load(Ordering::SeqCst) {
                continue;
            }
            match event {
                WireEvent::Closed => return TransportEvent::Closed,
                WireEvent::Text(text) => match serde_json::from_str::<Envelope>(&text) {
                    Ok(envelope) => return TransportEvent::Message(envelope),
                    Err(err) => warn!(
                        target = "prompter.transport",
                        error = %err,
                        "dropping undecodable frame"
                    ),
                },
            }
        }
    }

    async fn reconnect(&self) -> Result<(), TransportError> {
        self.dial().await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

async fn handle_websocket(
    ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    mut rx_out: mpsc::UnboundedReceiver<String>,
    tx_in: mpsc::UnboundedSender<Tagged>,
    generation: u64,
    current: Arc<AtomicU64>,
    connected: Arc<AtomicBool>,
) {
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let send_task = tokio::spawn(async move {
        while let Some(text) = rx_out.recv().await {
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if tx_in.send((generation, WireEvent::Text(text))).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(data)) => match String::from_utf8(data) {
                Ok(text) => {
                    if tx_in.send((generation, WireEvent::Text(text))).is_err() {
                        break;
                    }
                }
                Err(_) => warn!(target = "prompter.transport", "dropping non-utf8 binary frame"),
            },
            Ok(Message::Close(_)) => break,
            Err(err) => {
                debug!(target = "prompter.transport", error = %err, "websocket read failed");
                break;
            }
            _ => {}
        }
    }

    if current.load(Ordering::SeqCst) == generation {
        connected.store(false, Ordering::SeqCst);
        warn!(target = "prompter.transport", generation, "websocket closed");
    }
    let _ = tx_in.send((generation, WireEvent::Closed));

    send_task.abort();
    let _ = send_task.await;
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SurfaceKind;
    use axum::Router;
    use axum::extract::ws::{Message as AxumMessage, WebSocket, WebSocketUpgrade};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn echo(ws: WebSocketUpgrade) -> impl IntoResponse {
        ws.on_upgrade(|mut socket: WebSocket| async move {
            while let Some(Ok(message)) = socket.recv().await {
                if let AxumMessage::Text(text) = message {
                    if socket.send(AxumMessage::Text(text)).await.is_err() {
                        break;
                    }
                }
            }
        })
    }

    async fn spawn_echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let app = Router::new().route("/ws", get(echo));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        addr
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn envelopes_round_trip_through_the_server() {
        let addr = spawn_echo_server().await;
        let config = WebSocketConfig::new(format!("ws://{addr}/ws"), "studio", SurfaceKind::Admin);
        let transport = WebSocketTransport::connect(config).await.expect("connect");

        assert!(transport.is_connected());
        transport.send(&Envelope::GetState).expect("send");
        assert_eq!(transport.recv().await, TransportEvent::Message(Envelope::GetState));
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn closed_transport_refuses_sends_until_redialed() {
        let addr = spawn_echo_server().await;
        let config = WebSocketConfig::new(format!("ws://{addr}/ws"), "studio", SurfaceKind::Remote);
        let transport = WebSocketTransport::connect(config).await.expect("connect");

        transport.close();
        assert!(matches!(
            transport.send(&Envelope::GetState),
            Err(TransportError::Unavailable(_))
        ));

        transport.reconnect().await.expect("redial");
        transport.send(&Envelope::GetState).expect("send");
        assert_eq!(transport.recv().await, TransportEvent::Message(Envelope::GetState));
    }

    #[test_timeout::tokio_timeout_test(10)]
    async fn unreachable_server_is_a_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);
        let config = WebSocketConfig::new(format!("ws://{addr}/ws"), "studio", SurfaceKind::Admin);
        assert!(matches!(
            WebSocketTransport::connect(config).await,
            Err(TransportError::Connect(_))
        ));
    }
}
