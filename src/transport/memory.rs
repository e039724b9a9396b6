//! In-process loopback transport — ambient test/demo tooling, SPEC_FULL.md
//! §4.K. Used by the integration tests to drive a host [`crate::system::ComponentSystem`]
//! against a guest [`crate::guest::GuestClient`] without a real worker process.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::peer::Peer;
use crate::transport::Transport;

pub struct MemoryTransport {
    outbound: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, message: String) -> Result<(), TransportError> {
        self.outbound
            .send(message)
            .map_err(|_| TransportError::Closed)
    }
}

/// One side of a loopback pair: a `Transport` handle plus the inbound
/// channel the caller must pump into a `Peer`.
pub struct MemoryHalf {
    pub transport: Arc<MemoryTransport>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Build two connected transport halves. Whatever is sent on one side's
/// `transport` arrives on the other side's `inbound`.
pub fn pair() -> (MemoryHalf, MemoryHalf) {
    let (tx_a_to_b, rx_a_to_b) = mpsc::unbounded_channel();
    let (tx_b_to_a, rx_b_to_a) = mpsc::unbounded_channel();
    let side_a = MemoryHalf {
        transport: Arc::new(MemoryTransport {
            outbound: tx_a_to_b,
        }),
        inbound: rx_b_to_a,
    };
    let side_b = MemoryHalf {
        transport: Arc::new(MemoryTransport {
            outbound: tx_b_to_a,
        }),
        inbound: rx_a_to_b,
    };
    (side_a, side_b)
}

/// Spawn the task that feeds `inbound` into `peer.process_message`. The
/// caller is still responsible for calling `peer.did_connect()` once both
/// sides' pumps are running — the loopback is writable immediately, but
/// connect is a distinct signal from transport construction (§4.E).
pub fn spawn_pump(peer: Arc<Peer>, mut inbound: mpsc::UnboundedReceiver<String>) {
    tokio::spawn(async move {
        while let Some(message) = inbound.recv().await {
            peer.process_message(&message).await;
        }
    });
}
