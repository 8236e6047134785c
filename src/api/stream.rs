//! Authenticated websocket stream of a leader's order events.
//!
//! One [`OrderStream`] per leader. The read half stays with the connection
//! task; [`StreamHandle`] clones share the write half so the heartbeat task
//! can ping without blocking event processing.

use std::sync::Arc;

use chrono::Utc;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::trace;

use crate::api::sign::sign_ws_login;
use crate::api::ApiError;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Decoded stream message: `{"channel": ..., "type": ..., "data": ...}`.
///
/// Only the `orders` channel carries replication work; everything else
/// (pongs, subscription acks, info frames) is ignored upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

fn login_payload(
    api_key: &str,
    api_secret: &str,
    subaccount: Option<&str>,
    timestamp_ms: i64,
) -> serde_json::Value {
    let mut args = json!({
        "key": api_key,
        "sign": sign_ws_login(api_secret, timestamp_ms),
        "time": timestamp_ms,
    });
    if let Some(sub) = subaccount {
        args["subaccount"] = json!(sub);
    }
    json!({ "op": "login", "args": args })
}

async fn send_json(sink: &Mutex<WsSink>, value: &serde_json::Value) -> Result<(), ApiError> {
    sink.lock()
        .await
        .send(Message::Text(value.to_string()))
        .await
        .map_err(|e| ApiError::Transport(e.to_string()))
}

/// Write-half handle used for keep-alive pings.
#[derive(Clone)]
pub struct StreamHandle {
    sink: Arc<Mutex<WsSink>>,
}

impl StreamHandle {
    pub async fn ping(&self) -> Result<(), ApiError> {
        send_json(&self.sink, &json!({ "op": "ping" })).await
    }

    pub async fn close(&self) -> Result<(), ApiError> {
        self.sink
            .lock()
            .await
            .send(Message::Close(None))
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))
    }
}

/// A connected, authenticated order stream for one leader account.
pub struct OrderStream {
    sink: Arc<Mutex<WsSink>>,
    stream: WsStream,
}

impl OrderStream {
    /// Connect and authenticate. The caller subscribes explicitly so a
    /// reconnect re-runs the same subscription path.
    pub async fn connect(
        ws_url: &str,
        api_key: &str,
        api_secret: &str,
        subaccount: Option<&str>,
    ) -> Result<Self, ApiError> {
        let (ws, _response) = connect_async(ws_url)
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let (sink, stream) = ws.split();
        let sink = Arc::new(Mutex::new(sink));

        let login = login_payload(api_key, api_secret, subaccount, Utc::now().timestamp_millis());
        send_json(&sink, &login).await?;

        Ok(Self { sink, stream })
    }

    pub async fn subscribe_to_orders(&self) -> Result<(), ApiError> {
        send_json(&self.sink, &json!({ "op": "subscribe", "channel": "orders" })).await
    }

    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            sink: self.sink.clone(),
        }
    }

    /// Next decoded envelope.
    ///
    /// `None` means the connection is gone and the caller should reconnect.
    /// A `Malformed` error is a single bad frame; the stream remains usable.
    pub async fn next_envelope(&mut self) -> Option<Result<Envelope, ApiError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(
                        serde_json::from_str(&text)
                            .map_err(|e| ApiError::Malformed(format!("{e}: {text}"))),
                    );
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Binary(_))
                | Ok(Message::Frame(_)) => {
                    trace!("ignoring non-text frame");
                }
                Ok(Message::Close(frame)) => {
                    trace!(?frame, "server closed stream");
                    return None;
                }
                Err(e) => return Some(Err(ApiError::Transport(e.to_string()))),
            }
        }
    }
}
