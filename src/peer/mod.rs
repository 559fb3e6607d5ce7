//! # Peer Layer
//!
//! One [`PeerSession`] per multiplexed connection: the read loop, the
//! pending-request table, inbound dispatch, and the session state machine.
//!
//! ## State machine
//! ```text
//! Connecting -> Handshaking -> Online -> Disconnecting -> Offline
//! ```
//! Connecting and Handshaking belong to the external transport collaborator;
//! this core takes over at the transition into Online (first usable packet
//! may flow) and ends at Offline, which is terminal. A new connection
//! requires a new session instance.

pub mod session;

pub use session::PeerSession;

use crate::core::value::Value;

/// Session lifecycle states.
///
/// `Connecting` and `Handshaking` belong to the transport collaborator that
/// establishes the connection; sessions in this crate are constructed only
/// once establishment completes and are therefore born `Online`. The
/// variants exist so collaborating transports can report the full lifecycle
/// with one vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Transport establishment in progress (externally owned).
    Connecting,
    /// Connection-level handshake in progress (externally owned).
    Handshaking,
    Online,
    Disconnecting,
    Offline,
}

/// Peer lifecycle notifications emitted by the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Online { uid: String },
    Offline { uid: String },
}

/// An event delivered by the remote side of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteEvent {
    pub event: String,
    pub payload: Value,
}
