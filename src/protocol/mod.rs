//! # Protocol Layer
//!
//! The action enumeration, the closed message payload union, and the named
//! task dispatcher.
//!
//! ## Components
//! - **Action**: protocol version 1 action codes carried in the flags byte
//! - **Message**: every payload shape the dispatcher understands
//! - **TaskDispatcher**: server-side named tasks (e.g. `context_defs`)
//!
//! Both ends of a connection must agree on the action enumeration and the
//! payload encoding out of band; together with the wire layout in
//! [`crate::core`] they form [`crate::config::PROTOCOL_VERSION`].

pub mod dispatcher;
pub mod message;


pub use dispatcher::{TaskDispatcher, TaskResult};
pub use message::{Action, Message};
