// WebSocket channels to the server.
//
// Each open channel owns a reader task. Admin channels hand every text
// frame to the message bridge; document channels are drained so the
// server never stalls on a full socket.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message as WsFrame};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace, warn};
use url::Url;

use crate::bridge::MessageBridge;

type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to `{endpoint}`")]
    Connect {
        endpoint: String,
        #[source]
        source: Box<tungstenite::Error>,
    },

    #[error("connecting to `{endpoint}` timed out after {timeout_ms}ms")]
    ConnectTimedOut { endpoint: String, timeout_ms: u64 },

    #[error("sending on channel `{label}` timed out after {timeout_ms}ms")]
    SendTimedOut { label: String, timeout_ms: u64 },

    #[error("failed to send on channel `{label}`")]
    Send {
        label: String,
        #[source]
        source: Box<tungstenite::Error>,
    },
}

/// Where a channel's inbound text frames go.
#[derive(Debug, Clone)]
pub enum Inbound {
    Bridge(MessageBridge),
    Discard,
}

/// Opens channels with a bounded handshake.
#[derive(Debug, Clone, Copy)]
pub struct WsTransport {
    timeout: Duration,
}

impl WsTransport {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn open(
        &self,
        label: impl Into<String>,
        endpoint: &Url,
        inbound: Inbound,
    ) -> Result<ChannelHandle, TransportError> {
        let label = label.into();
        let (socket, _) = tokio::time::timeout(self.timeout, connect_async(endpoint.as_str()))
            .await
            .map_err(|_| TransportError::ConnectTimedOut {
                endpoint: endpoint.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_string(),
                source: Box::new(source),
            })?;
        debug!(channel = %label, %endpoint, "channel open");

        let (sink, stream) = socket.split();
        let reader = tokio::spawn(read_frames(label.clone(), stream, inbound));
        Ok(ChannelHandle { label, sink, reader, timeout: self.timeout })
    }
}

async fn read_frames(label: String, mut stream: SplitStream<ClientSocket>, inbound: Inbound) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(WsFrame::Text(payload)) => {
                trace!(channel = %label, message = %payload.as_str(), "received");
                if let Inbound::Bridge(bridge) = &inbound {
                    bridge.deliver(payload.as_str());
                }
            }
            Ok(WsFrame::Close(_)) => break,
            Ok(WsFrame::Binary(_) | WsFrame::Ping(_) | WsFrame::Pong(_) | WsFrame::Frame(_)) => {}
            Err(error) => {
                debug!(channel = %label, %error, "channel read failed");
                break;
            }
        }
    }
    debug!(channel = %label, "channel reader finished");
}

/// Write half of an open channel plus its reader task.
pub struct ChannelHandle {
    label: String,
    sink: SplitSink<ClientSocket, WsFrame>,
    reader: JoinHandle<()>,
    timeout: Duration,
}

impl ChannelHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub async fn send(&mut self, text: impl Into<String>) -> Result<(), TransportError> {
        let text = text.into();
        debug!(channel = %self.label, message = %text, "sending");
        tokio::time::timeout(self.timeout, self.sink.send(WsFrame::Text(text.into())))
            .await
            .map_err(|_| TransportError::SendTimedOut {
                label: self.label.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|source| TransportError::Send {
                label: self.label.clone(),
                source: Box::new(source),
            })
    }

    /// Close the channel and wait (bounded) for the server to acknowledge.
    pub async fn close(mut self) {
        if let Err(error) = self.sink.send(WsFrame::Close(None)).await {
            debug!(channel = %self.label, %error, "close frame not sent");
        }
        if tokio::time::timeout(self.timeout, &mut self.reader).await.is_err() {
            warn!(channel = %self.label, "server did not acknowledge close");
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle").field("label", &self.label).finish_non_exhaustive()
    }
}
