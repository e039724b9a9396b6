//! Error taxonomy for the RPC runtime — see SPEC_FULL.md §7.
//!
//! Argument errors are pushed to compile time where possible (see
//! [`crate::message::Params`]); what remains here are the asynchronous and
//! lifecycle error classes that genuinely can't be caught earlier.

use serde_json::Value;

/// A message that failed to parse or didn't match the envelope shape in §3.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message cannot be null")]
    NullMessage,
    #[error("top-level message must be a JSON object")]
    NotAnObject,
    #[error("params must be an array or object")]
    InvalidParams,
    #[error("message has neither id+method, id+result/error, nor method without id")]
    Unclassifiable,
}

/// The `{message, code?, data?, stack?}` object a failed remote call rejects with.
///
/// Built directly from the remote peer's error payload — `message()` reads as
/// the remote's own message, not a placeholder (see SPEC_FULL.md §9).
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    pub code: Option<i32>,
    pub data: Option<Value>,
    pub stack: Option<String>,
}

impl RemoteError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            data: None,
            stack: None,
        }
    }

    pub fn method_not_found(name: &str) -> Self {
        Self {
            message: format!("Method not found: {name}"),
            code: Some(-32601),
            data: None,
            stack: None,
        }
    }
}

/// Error returned by a server-role method handler.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
    pub code: Option<i32>,
    pub data: Option<Value>,
    pub stack: Option<String>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            data: None,
            stack: None,
        }
    }
}

impl From<HandlerError> for RemoteError {
    fn from(e: HandlerError) -> Self {
        RemoteError {
            message: e.message,
            code: e.code,
            data: e.data,
            stack: e.stack,
        }
    }
}

/// Failure surfaced by a [`crate::transport::Transport`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("transport is closed")]
    Closed,
    #[error("transport I/O error: {0}")]
    Io(String),
}

/// Errors from [`crate::registry::ComponentRegistry`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ComponentRegistryError {
    #[error("component name already registered: {0}")]
    NameTaken(String),
    #[error("this factory is already registered under a different name")]
    AlreadyRegistered,
    #[error("no component registered under name: {0}")]
    NotFound(String),
}

/// Errors from [`crate::system::ComponentSystem`].
#[derive(Debug, thiserror::Error)]
pub enum ComponentSystemError {
    #[error(transparent)]
    Registry(#[from] ComponentRegistryError),
    #[error("component system is unmounted")]
    Closed,
    #[error("components not found: {0:?}")]
    MissingComponents(Vec<String>),
}

/// The pending-call table rejects every outstanding entry with this error on
/// `ComponentSystem::unmount` (SPEC_FULL.md §9, "Pending calls on teardown").
#[derive(Debug, Clone, thiserror::Error)]
#[error("peer closed before a response arrived")]
pub struct PeerClosed;

impl From<PeerClosed> for RemoteError {
    fn from(_: PeerClosed) -> Self {
        RemoteError::new("peer closed before a response arrived")
    }
}
