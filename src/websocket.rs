// file: src/websocket.rs
// description: WebSocket transport for the live feed with bounded-backoff reconnection

use crate::{
    config::TransportConfig,
    error::LiveDropsError,
    transport::{Connection, Transport, TransportEvent, TransportSink},
    types::ServerMessage,
};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, config: &TransportConfig, sink: TransportSink) -> Box<dyn Connection> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(run_connection(config.clone(), sink, shutdown_rx))),
            Err(e) => {
                error!("Cannot open live connection outside a tokio runtime: {}", e);
                sink.emit(TransportEvent::ConnectError {
                    error: e.to_string(),
                });
                None
            }
        };

        Box::new(WebSocketConnection {
            shutdown: shutdown_tx,
            task,
            closed: false,
        })
    }
}

pub struct WebSocketConnection {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
    closed: bool,
}

impl Connection for WebSocketConnection {
    fn is_active(&self) -> bool {
        !self.closed
            && self
                .task
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // the task sends a close frame and exits on its next poll
        let _ = self.shutdown.send(true);
    }
}

impl Drop for WebSocketConnection {
    fn drop(&mut self) {
        self.close();
    }
}

enum SessionEnd {
    Shutdown,
    Closed { reason: String },
}

async fn run_connection(
    config: TransportConfig,
    sink: TransportSink,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;

    loop {
        match connect_and_run(&config, &sink, &mut shutdown, &mut attempt).await {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Closed { reason }) => {
                warn!("Live connection closed: {}", reason);
                sink.emit(TransportEvent::Disconnect { reason });
            }
            Err(e) => {
                warn!("Live connection error: {}", e);
                sink.emit(TransportEvent::ConnectError {
                    error: e.to_string(),
                });
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = backoff_delay(attempt, config.reconnect_min, config.reconnect_max);
        debug!(
            "Reconnecting in {}ms (attempt {})",
            delay.as_millis(),
            attempt
        );
        sink.emit(TransportEvent::Reconnecting { attempt });

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    info!("Live connection task stopped");
}

async fn connect_and_run(
    config: &TransportConfig,
    sink: &TransportSink,
    shutdown: &mut watch::Receiver<bool>,
    attempt: &mut u32,
) -> Result<SessionEnd, LiveDropsError> {
    if *shutdown.borrow() {
        return Ok(SessionEnd::Shutdown);
    }

    let connect = tokio::time::timeout(config.connect_timeout, connect_async(config.url.as_str()));
    let ws_stream = tokio::select! {
        result = connect => match result {
            Ok(Ok((ws_stream, _))) => ws_stream,
            Ok(Err(e)) => return Err(LiveDropsError::WebSocketError(e)),
            Err(_) => return Err(LiveDropsError::Timeout(config.connect_timeout)),
        },
        _ = shutdown.changed() => return Ok(SessionEnd::Shutdown),
    };

    info!("WebSocket connection established to {}", config.url);
    *attempt = 0;
    sink.emit(TransportEvent::Connect);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(SessionEnd::Shutdown);
            }
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    trace!("Received text message: {}", text.as_str());
                    if let Some(event) = decode_frame(text.as_str()) {
                        sink.emit(event);
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!("Ignoring binary message of {} bytes", data.len());
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "server closed the connection".to_string());
                    return Ok(SessionEnd::Closed { reason });
                }
                // ping/pong replies are handled by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    return Ok(SessionEnd::Closed {
                        reason: e.to_string(),
                    });
                }
                None => {
                    return Ok(SessionEnd::Closed {
                        reason: "stream ended".to_string(),
                    });
                }
            }
        }
    }
}

/// Decodes one text frame into a transport event.
///
/// Accepts the `{"event": .., "data": ..}` envelope and the array form
/// `["event", data]`. Anything else is dropped without surfacing an error.
pub fn decode_frame(text: &str) -> Option<TransportEvent> {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(message) => Some(message.into()),
        Err(primary_error) => {
            let value = match serde_json::from_str::<serde_json::Value>(text) {
                Ok(value) => value,
                Err(_) => {
                    debug!(
                        "Discarding unparseable frame: {}. Frame: {}",
                        primary_error,
                        text.chars().take(100).collect::<String>()
                    );
                    return None;
                }
            };

            if let Some([name, data]) = value.as_array().map(Vec::as_slice)
                && let Some(name) = name.as_str()
            {
                let envelope = serde_json::json!({ "event": name, "data": data });
                if let Ok(message) = serde_json::from_value::<ServerMessage>(envelope) {
                    return Some(message.into());
                }
            }

            let name = value
                .get("event")
                .and_then(|v| v.as_str())
                .or_else(|| value.get(0).and_then(|v| v.as_str()))
                .unwrap_or("<none>");
            debug!(
                "Discarding frame for event '{}': {}",
                name, primary_error
            );
            None
        }
    }
}

impl From<ServerMessage> for TransportEvent {
    fn from(message: ServerMessage) -> Self {
        match message {
            ServerMessage::OnlineUsersUpdate(update) => TransportEvent::OnlineUsersUpdate {
                count: update.count,
            },
            ServerMessage::LiveDrop(drop) => TransportEvent::LiveDrop(drop),
            ServerMessage::Notification(notification) => TransportEvent::Notification(notification),
        }
    }
}

/// Exponential delay with +/-50% jitter, clamped to `[min, max]`.
pub fn backoff_delay(attempt: u32, min: Duration, max: Duration) -> Duration {
    // inverted bounds collapse to `min` instead of panicking in clamp
    let max = max.max(min);
    let exponent = attempt.saturating_sub(1).min(16);
    let base = min.saturating_mul(1u32 << exponent).min(max);
    let jitter = 0.5 + fastrand::f64();
    base.mul_f64(jitter).clamp(min, max)
}
