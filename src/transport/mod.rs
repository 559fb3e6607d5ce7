//! # Transports
//!
//! Establishing the duplex byte streams sessions run over. Only TCP is
//! provided here; any `AsyncRead + AsyncWrite` stream can be handed to the
//! session layer directly, which is what the in-memory tests do.

pub mod tcp;

pub use tcp::{connect, serve, serve_with_shutdown};
