//! # Actions and Messages
//!
//! Protocol version 1 action codes and the payload shapes keyed by them.
//!
//! ## Action table (stable within a protocol version)
//! ```text
//! PING            0x00
//! CALL            0x01
//! GET             0x02
//! SET             0x03
//! SUBSCRIBE       0x04
//! UNSUBSCRIBE     0x05
//! TASK            0x06
//! EVENT           0x07
//! CONTEXT_ATTACH  0x70   (reserved control range 0x70-0x7F)
//! CONTEXT_DETACH  0x71
//! ```
//!
//! EVENT, CONTEXT_ATTACH, and CONTEXT_DETACH are impulse=1 fire-and-forget
//! notifications: they never pair with a pending request and produce no
//! reply. Every other impulse packet is answered exactly once with a reply
//! echoing its action code, carrying [`Message::Ok`], [`Message::Defs`], or
//! [`Message::Err`].

use crate::core::value::Value;
use crate::error::{constants, NetronError, RemoteError, Result};
use crate::registry::Definition;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Closed set of action codes consumed by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Action {
    Ping = 0x00,
    Call = 0x01,
    Get = 0x02,
    Set = 0x03,
    Subscribe = 0x04,
    Unsubscribe = 0x05,
    Task = 0x06,
    Event = 0x07,
    ContextAttach = 0x70,
    ContextDetach = 0x71,
}

impl Action {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Whether packets carrying this action are fire-and-forget: no reply
    /// is produced and no pending request is ever registered.
    pub fn is_oneway(self) -> bool {
        matches!(
            self,
            Action::Event | Action::ContextAttach | Action::ContextDetach
        )
    }
}

impl TryFrom<u8> for Action {
    type Error = NetronError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0x00 => Ok(Action::Ping),
            0x01 => Ok(Action::Call),
            0x02 => Ok(Action::Get),
            0x03 => Ok(Action::Set),
            0x04 => Ok(Action::Subscribe),
            0x05 => Ok(Action::Unsubscribe),
            0x06 => Ok(Action::Task),
            0x07 => Ok(Action::Event),
            0x70 => Ok(Action::ContextAttach),
            0x71 => Ok(Action::ContextDetach),
            other => Err(NetronError::InvalidAction(other)),
        }
    }
}

/// Every payload shape the protocol carries, requests and replies alike.
///
/// A closed tagged union with exhaustive matches in the session dispatcher,
/// so adding an action is a compile-time-checked change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Liveness probe; empty request, empty (`Ok(Null)`) response.
    Ping,
    /// Invoke a method on a remote context.
    Call {
        def_id: u64,
        method: String,
        args: Vec<Value>,
    },
    /// Read a property of a remote context.
    Get { def_id: u64, property: String },
    /// Write a property of a remote context.
    Set {
        def_id: u64,
        property: String,
        value: Value,
    },
    /// Register interest in an event name on the serving side.
    Subscribe { event: String },
    Unsubscribe { event: String },
    /// Run a named server-side task.
    Task { name: String, args: Value },
    /// Fire-and-forget event delivery to a subscribed peer.
    Event { event: String, payload: Value },
    /// Control: a context became available on the sending side.
    ContextAttach { def: Definition },
    /// Control: a context was detached on the sending side.
    ContextDetach { def_id: u64, name: String },
    /// Successful reply.
    Ok(Value),
    /// Reply carrying definitions (e.g. the `context_defs` task).
    Defs(Vec<Definition>),
    /// Error reply.
    Err(RemoteError),
}

impl Message {
    /// The action a request payload travels under. Reply payloads echo the
    /// request's action and return `None` here.
    pub fn action(&self) -> Option<Action> {
        match self {
            Message::Ping => Some(Action::Ping),
            Message::Call { .. } => Some(Action::Call),
            Message::Get { .. } => Some(Action::Get),
            Message::Set { .. } => Some(Action::Set),
            Message::Subscribe { .. } => Some(Action::Subscribe),
            Message::Unsubscribe { .. } => Some(Action::Unsubscribe),
            Message::Task { .. } => Some(Action::Task),
            Message::Event { .. } => Some(Action::Event),
            Message::ContextAttach { .. } => Some(Action::ContextAttach),
            Message::ContextDetach { .. } => Some(Action::ContextDetach),
            Message::Ok(_) | Message::Defs(_) | Message::Err(_) => None,
        }
    }

    /// Whether this payload is a reply shape.
    pub fn is_reply(&self) -> bool {
        self.action().is_none()
    }

    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(bincode::serialize(self)?))
    }

    pub fn decode(payload: &[u8]) -> Result<Self> {
        bincode::deserialize(payload).map_err(|_| {
            NetronError::MalformedPacket(constants::ERR_UNDECODABLE_PAYLOAD.to_string())
        })
    }

    /// Check that an inbound request payload matches the action byte it
    /// arrived under.
    pub fn expect_action(&self, action: Action) -> Result<()> {
        if self.action() == Some(action) {
            Ok(())
        } else {
            Err(NetronError::MalformedPacket(
                constants::ERR_ACTION_MISMATCH.to_string(),
            ))
        }
    }
}
