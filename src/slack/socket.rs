//! Socket Mode listener: receives workspace events over a WebSocket.
//!
//! `apps.connections.open` hands out a short-lived WebSocket URL. Slack
//! wraps every event in an envelope that must be acknowledged within three
//! seconds, so envelopes are ACKed before their event is forwarded. When
//! the connection drops (close frame, `disconnect` envelope, read error)
//! the listener fetches a fresh URL and reconnects.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, Stream, StreamExt};
use rand::Rng;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::error::ChannelError;
use crate::slack::client::SlackClient;
use crate::slack::events::SlackEvent;

/// Stream of inbound workspace events.
pub type EventStream = Pin<Box<dyn Stream<Item = SlackEvent> + Send>>;

/// Upper bound on the random delay added to each reconnect.
const MAX_RECONNECT_JITTER_MS: u64 = 500;

/// Socket Mode envelope received from Slack.
#[derive(Debug, Clone, Deserialize)]
struct SocketEnvelope {
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    reason: Option<String>,
}

impl SocketEnvelope {
    /// The inner event of an `events_api` envelope.
    fn event(&self) -> Result<SlackEvent, ChannelError> {
        let event = self
            .payload
            .get("event")
            .cloned()
            .ok_or_else(|| ChannelError::malformed("events_api", "envelope has no payload.event"))?;
        SlackEvent::from_json(event)
    }
}

fn ack_frame(envelope_id: &str) -> String {
    json!({ "envelope_id": envelope_id }).to_string()
}

/// Why a single connection ended.
#[derive(Debug)]
enum ConnectionEnd {
    Reconnect(String),
    ReceiverClosed,
}

pub struct SocketModeListener {
    client: Arc<SlackClient>,
    app_token: SecretString,
    reconnect_delay: Duration,
}

impl SocketModeListener {
    pub fn new(client: Arc<SlackClient>, app_token: SecretString, reconnect_delay: Duration) -> Self {
        Self {
            client,
            app_token,
            reconnect_delay,
        }
    }

    /// Connect and start forwarding events.
    ///
    /// The first `apps.connections.open` call happens here so bad tokens
    /// fail startup instead of looping in the background.
    pub async fn start(&self) -> Result<EventStream, ChannelError> {
        let first_url = self.client.open_socket_url(&self.app_token).await?;
        let (tx, rx) = mpsc::unbounded_channel();

        let client = Arc::clone(&self.client);
        let app_token = self.app_token.clone();
        let reconnect_delay = self.reconnect_delay;

        tokio::spawn(async move {
            let mut next_url = Some(first_url);

            loop {
                let url = match next_url.take() {
                    Some(url) => url,
                    None => match client.open_socket_url(&app_token).await {
                        Ok(url) => url,
                        Err(e) => {
                            tracing::warn!(error = %e, "Could not open Socket Mode connection");
                            if tx.is_closed() {
                                return;
                            }
                            tokio::time::sleep(with_jitter(reconnect_delay)).await;
                            continue;
                        }
                    },
                };

                match run_connection(&url, &tx).await {
                    Ok(ConnectionEnd::ReceiverClosed) => {
                        tracing::info!("Socket Mode listener channel closed");
                        return;
                    }
                    Ok(ConnectionEnd::Reconnect(reason)) => {
                        tracing::info!(%reason, "Socket Mode connection ended, reconnecting");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Socket Mode connection failed, reconnecting");
                    }
                }

                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(with_jitter(reconnect_delay)).await;
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

fn with_jitter(base: Duration) -> Duration {
    let jitter = rand::thread_rng().gen_range(0..=MAX_RECONNECT_JITTER_MS);
    base + Duration::from_millis(jitter)
}

async fn run_connection(
    url: &str,
    tx: &mpsc::UnboundedSender<SlackEvent>,
) -> Result<ConnectionEnd, ChannelError> {
    let (ws, _resp) = connect_async(url)
        .await
        .map_err(|e| ChannelError::StartupFailed {
            reason: e.to_string(),
        })?;
    let (mut write, mut read) = ws.split();

    tracing::info!("Socket Mode connected");

    while let Some(frame) = read.next().await {
        let frame = frame.map_err(|e| ChannelError::Disconnected {
            reason: e.to_string(),
        })?;

        let text = match frame {
            Message::Text(text) => text,
            Message::Ping(data) => {
                write
                    .send(Message::Pong(data))
                    .await
                    .map_err(|e| ChannelError::Disconnected {
                        reason: e.to_string(),
                    })?;
                continue;
            }
            Message::Close(_) => return Ok(ConnectionEnd::Reconnect("close frame".into())),
            _ => continue,
        };

        let envelope: SocketEnvelope = match serde_json::from_str(text.as_str()) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unparseable Socket Mode frame");
                continue;
            }
        };

        if let Some(ref id) = envelope.envelope_id {
            write
                .send(Message::text(ack_frame(id)))
                .await
                .map_err(|e| ChannelError::Disconnected {
                    reason: e.to_string(),
                })?;
        }

        match envelope.kind.as_str() {
            "hello" => tracing::debug!("Socket Mode hello received"),
            "disconnect" => {
                let reason = envelope.reason.unwrap_or_else(|| "disconnect".into());
                return Ok(ConnectionEnd::Reconnect(reason));
            }
            "events_api" => match envelope.event() {
                Ok(event) => {
                    tracing::debug!(event_type = %event.event_type, "Event received");
                    if tx.send(event).is_err() {
                        return Ok(ConnectionEnd::ReceiverClosed);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Dropping events_api envelope"),
            },
            other => tracing::debug!(envelope_type = other, "Ignoring envelope"),
        }
    }

    Ok(ConnectionEnd::Reconnect("stream ended".into()))
}
