//! Bidirectional JSON-RPC runtime for host/guest component isolation.
//!
//! A host process and an untrusted guest worker share one symmetric
//! [`peer::Peer`] per connection. The host exposes capabilities as
//! [`component::Component`]s through a [`system::ComponentSystem`]; the
//! guest discovers and calls them through a [`guest::GuestClient`], either
//! directly or through a [`component_proxy!`]-generated typed facade.

pub mod component;
pub mod config;
pub mod error;
pub mod event;
pub mod guest;
pub mod message;
pub mod peer;
pub mod proxy;
pub mod registry;
pub mod system;
pub mod transport;

pub use component::{Component, ComponentFactory, ComponentOptions};
pub use error::{
    CodecError, ComponentRegistryError, ComponentSystemError, HandlerError, PeerClosed,
    RemoteError, TransportError,
};
pub use event::{EventDispatcher, Listener, ListenerId};
pub use guest::GuestClient;
pub use message::{decode, encode, Message, Outcome, Params, WireError};
pub use peer::{MethodHandler, Peer};
pub use registry::ComponentRegistry;
pub use system::{ComponentSystem, Worker};
pub use transport::Transport;
