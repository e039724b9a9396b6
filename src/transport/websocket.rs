//! WebSocket reference transport (`tokio-tungstenite`) — SPEC_FULL.md §4.K.
//!
//! This is the transport the host daemon family this crate is descended
//! from speaks in production. It demonstrates that `Transport` is a
//! sufficient abstraction for a real network carrier; core dispatch never
//! references this module.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::peer::Peer;
use crate::transport::Transport;

pub struct WebSocketTransport<S> {
    sink: AsyncMutex<SplitSink<WebSocketStream<S>, WsMessage>>,
}

/// The read half, not yet wired to a peer. Call [`Pump::run`] after
/// constructing the `Peer` that owns the matching `WebSocketTransport`.
pub struct Pump<S> {
    stream: SplitStream<WebSocketStream<S>>,
}

impl<S> WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Split an already-handshaken WebSocket stream into a send-only
    /// `Transport` and a `Pump` the caller drives once the `Peer` exists.
    pub fn new(ws: WebSocketStream<S>) -> (Arc<Self>, Pump<S>) {
        let (sink, stream) = ws.split();
        let transport = Arc::new(Self {
            sink: AsyncMutex::new(sink),
        });
        (transport, Pump { stream })
    }
}

impl<S> Pump<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Drive inbound frames into `peer.process_message`, signalling
    /// `did_connect` as soon as the socket is ready to read from (the
    /// handshake already completed by the time a `WebSocketStream` exists).
    pub async fn run(mut self, peer: Arc<Peer>) {
        peer.did_connect().await;
        while let Some(frame) = self.stream.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => peer.process_message(&text).await,
                Ok(WsMessage::Close(_)) => {
                    debug!("websocket closed by peer");
                    break;
                }
                Ok(_) => {} // binary/ping/pong frames carry no RPC payload
                Err(e) => {
                    warn!(err = %e, "websocket read error — ending pump");
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl<S> Transport for WebSocketTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, message: String) -> Result<(), TransportError> {
        let mut sink = self.sink.lock().await;
        sink.send(WsMessage::Text(message))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}
