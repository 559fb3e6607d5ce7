//! # Netron Protocol
//!
//! Binary packet framing and peer-session multiplexing for exposing remote
//! "contexts" (objects with callable methods, properties, and events) over
//! any duplex stream transport.
//!
//! ## Architecture
//! - **core**: the 5-byte-header wire format ([`Packet`], [`PacketCodec`]),
//!   id sequencers, and the self-describing [`Value`] payload type
//! - **protocol**: the closed action set ([`Action`]), typed request and
//!   reply payloads ([`Message`]), and the named task dispatcher
//! - **registry**: local context publication ([`ContextRegistry`],
//!   [`Definition`], [`Stub`])
//! - **peer**: one [`PeerSession`] per connection, owning the read and
//!   write loops and the pending-request table
//! - **netron**: the [`Netron`] manager tying registry, tasks, and the
//!   active peer set together
//! - **transport**: TCP dialing and a graceful accept loop
//!
//! ## Example
//! ```no_run
//! use netron_protocol::{Netron, NetronConfig, Value};
//! use std::sync::Arc;
//!
//! # async fn run() -> netron_protocol::Result<()> {
//! let netron = Netron::new(NetronConfig::default());
//! let session = netron.connect("127.0.0.1:8787").await?;
//!
//! let calc = netron.get_interface(session.uid(), "calc").await?;
//! let sum = calc.call("add", vec![Value::Int(2), Value::Int(3)]).await?;
//! assert_eq!(sum.as_i64(), Some(5));
//! # Ok(())
//! # }
//! ```

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod config;
pub mod core;
pub mod error;
pub mod interface;
pub mod netron;
pub mod peer;
pub mod protocol;
pub mod registry;
pub mod transport;
pub mod utils;

pub use crate::core::codec::PacketCodec;
pub use crate::core::packet::Packet;
pub use crate::core::sequencer::{FastSequencer, LongSequencer};
pub use crate::core::value::Value;
pub use config::{NetronConfig, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
pub use error::{NetronError, RemoteError, Result};
pub use interface::Interface;
pub use netron::Netron;
pub use peer::session::PeerSession;
pub use peer::{PeerEvent, PeerState, RemoteEvent};
pub use protocol::dispatcher::{TaskDispatcher, TaskResult};
pub use protocol::message::{Action, Message};
pub use registry::{Context, ContextRegistry, ContextShape, Definition, Stub};
