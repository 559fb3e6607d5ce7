//! # Core Protocol Components
//!
//! Low-level packet handling, framing, id generation, and payload values.
//!
//! This module provides the foundation for the protocol: the fixed packet
//! header, the tokio codec that frames packets over a raw byte stream, the
//! correlation-id sequencers, and the closed value model payloads are built
//! from.
//!
//! ## Components
//! - **Packet**: flags + correlation id + opaque payload
//! - **Codec**: Tokio codec for length-prefixed framing over byte streams
//! - **Sequencer**: wrapping u32/u64 id sources
//! - **Value**: codec-neutral payload values, including remote references
//!
//! ## Wire Format
//! ```text
//! [Flags(1)] [Id(4)] [Length(4)] [Payload(N)]
//! ```
//!
//! ## Security
//! - Length validation before allocation (default ceiling 16MB)
//! - The codec never inspects payload semantics

pub mod codec;
pub mod packet;
pub mod sequencer;
pub mod value;
