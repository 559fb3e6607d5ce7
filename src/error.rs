//! # Error Types
//!
//! Comprehensive error handling for the netron protocol core.
//!
//! This module defines all error variants that can occur during protocol
//! operations, from low-level framing failures to registry and session
//! lifecycle errors.
//!
//! ## Error Categories
//! - **I/O Errors**: transport read/write failures
//! - **Framing Errors**: malformed or oversized packets (fatal to a session)
//! - **Dispatch Errors**: unknown definitions, methods, properties, tasks
//! - **Session Errors**: request timeouts, peer disconnects
//! - **Registry Errors**: duplicate or missing context attachments
//!
//! Errors that cross the wire are carried as [`RemoteError`], a serializable
//! `{kind, message}` pair. A typed error encoded on the serving side decodes
//! back to the same typed variant on the calling side, so a caller always
//! sees a structured rejection rather than an opaque string.

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Framing errors
    pub const ERR_SHORT_HEADER: &str = "Packet header shorter than 5 bytes";
    pub const ERR_TRUNCATED_PAYLOAD: &str = "Packet payload truncated";
    pub const ERR_LENGTH_OVERFLOW: &str = "Declared payload length exceeds maximum";

    /// Dispatch errors
    pub const ERR_ACTION_MISMATCH: &str = "Payload does not match packet action";
    pub const ERR_UNDECODABLE_PAYLOAD: &str = "Payload could not be decoded";

    /// Session errors
    pub const ERR_SESSION_OFFLINE: &str = "Peer session is offline";
    pub const ERR_WRITER_GONE: &str = "Outbound writer task is gone";
}

/// Wire-level error kinds, stable across protocol version 1.
///
/// These strings are the `kind` field of [`RemoteError`] payloads and must
/// not change within a protocol version.
pub mod kind {
    pub const UNKNOWN_DEFINITION: &str = "UnknownDefinition";
    pub const CONTEXT_GONE: &str = "ContextGone";
    pub const UNKNOWN_METHOD: &str = "UnknownMethod";
    pub const UNKNOWN_PROPERTY: &str = "UnknownProperty";
    pub const SET_ON_READ_ONLY: &str = "SetOnReadOnly";
    pub const INVALID_ACTION: &str = "InvalidAction";
    pub const UNKNOWN_TASK: &str = "UnknownTask";
    pub const UNKNOWN_CONTEXT: &str = "UnknownContext";
    pub const MALFORMED_PAYLOAD: &str = "MalformedPayload";
    pub const EXCEPTION: &str = "Exception";
}

/// An error carried inside a response payload.
///
/// Application exceptions thrown inside a context method are caught at the
/// stub boundary and converted into this shape; they never terminate the
/// peer session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Wrap an application-level failure with the generic exception kind.
    pub fn exception(message: impl Into<String>) -> Self {
        Self::new(kind::EXCEPTION, message)
    }

    /// Decode into the typed error taxonomy where the kind is recognized.
    pub fn into_error(self) -> NetronError {
        match self.kind.as_str() {
            kind::UNKNOWN_DEFINITION => {
                NetronError::UnknownDefinition(self.message.parse().unwrap_or(0))
            }
            kind::CONTEXT_GONE => NetronError::ContextGone(self.message.parse().unwrap_or(0)),
            kind::UNKNOWN_METHOD => NetronError::UnknownMethod(self.message),
            kind::UNKNOWN_PROPERTY => NetronError::UnknownProperty(self.message),
            kind::SET_ON_READ_ONLY => NetronError::SetOnReadOnly(self.message),
            kind::UNKNOWN_TASK => NetronError::UnknownTask(self.message),
            kind::UNKNOWN_CONTEXT => NetronError::UnknownContext(self.message),
            _ => NetronError::Remote(self),
        }
    }
}

impl From<NetronError> for RemoteError {
    fn from(err: NetronError) -> Self {
        match err {
            NetronError::UnknownDefinition(id) => {
                RemoteError::new(kind::UNKNOWN_DEFINITION, id.to_string())
            }
            NetronError::ContextGone(id) => RemoteError::new(kind::CONTEXT_GONE, id.to_string()),
            NetronError::UnknownMethod(name) => RemoteError::new(kind::UNKNOWN_METHOD, name),
            NetronError::UnknownProperty(name) => RemoteError::new(kind::UNKNOWN_PROPERTY, name),
            NetronError::SetOnReadOnly(name) => RemoteError::new(kind::SET_ON_READ_ONLY, name),
            NetronError::InvalidAction(code) => {
                RemoteError::new(kind::INVALID_ACTION, code.to_string())
            }
            NetronError::UnknownTask(name) => RemoteError::new(kind::UNKNOWN_TASK, name),
            NetronError::UnknownContext(name) => RemoteError::new(kind::UNKNOWN_CONTEXT, name),
            NetronError::Remote(remote) => remote,
            other => RemoteError::exception(other.to_string()),
        }
    }
}

/// Primary error type for all netron protocol operations.
#[derive(Error, Debug)]
pub enum NetronError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Malformed packet: {0}")]
    MalformedPacket(String),

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Invalid action code: {0}")]
    InvalidAction(u8),

    #[error("Unknown definition id {0}")]
    UnknownDefinition(u64),

    #[error("Context with definition id {0} was detached")]
    ContextGone(u64),

    #[error("Unknown method '{0}'")]
    UnknownMethod(String),

    #[error("Unknown property '{0}'")]
    UnknownProperty(String),

    #[error("Property '{0}' is not writable")]
    SetOnReadOnly(String),

    #[error("Unknown task '{0}'")]
    UnknownTask(String),

    #[error("Unknown context '{0}'")]
    UnknownContext(String),

    #[error("Context '{0}' is already attached")]
    AlreadyAttached(String),

    #[error("Context '{0}' is not attached")]
    NotAttached(String),

    #[error("Unknown peer '{0}'")]
    UnknownPeer(String),

    #[error("Request timed out")]
    RequestTimeout,

    #[error("Peer disconnected")]
    PeerDisconnected,

    #[error("Remote error: {0}")]
    Remote(RemoteError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl NetronError {
    /// Whether this failure terminates the peer session that produced it.
    ///
    /// Framing and transport errors are unrecoverable mid-stream; everything
    /// else is answered with an error reply and the session continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NetronError::Io(_) | NetronError::MalformedPacket(_) | NetronError::OversizedPacket(_)
        )
    }
}

/// Type alias for Results using NetronError
pub type Result<T> = std::result::Result<T, NetronError>;
