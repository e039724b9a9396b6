//! The abstract duplex transport contract — SPEC_FULL.md §4.E.
//!
//! Core dispatch never depends on a concrete transport; it only needs
//! something that can [`Transport::send`] a string. Delivery of inbound
//! strings into [`crate::peer::Peer::process_message`], and the connect
//! signal into [`crate::peer::Peer::did_connect`], are the transport
//! implementation's job — the two reference transports below show the
//! pattern. Real worker-process/IPC-channel transports are an external
//! collaborator per SPEC_FULL.md §1 and are not shipped here.

pub mod memory;
pub mod websocket;

use async_trait::async_trait;

use crate::error::TransportError;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Hand a serialized message to the wire. Errors are logged by the
    /// [`crate::peer::Peer`] and do not panic the caller.
    async fn send(&self, message: String) -> Result<(), TransportError>;
}
