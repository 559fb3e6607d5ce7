//! # Packet Structure
//!
//! The fixed netron packet: a flags byte, a 32-bit correlation id, and an
//! opaque payload.
//!
//! Flags layout, left to right:
//! ```text
//!     name | offset | bits | range
//!   -------+--------+------+----------
//!   action |      0 |    7 | 0x00-0x7F
//!  impulse |      7 |    1 | 0|1
//! ```
//!
//! The impulse bit marks a packet as request-initiating (1) versus reply (0).
//! The correlation id is unique per in-flight request per peer session and is
//! echoed unchanged on the reply.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::error::{constants, NetronError, Result};
use bytes::Bytes;

/// Mask selecting the action bits (0-6) of the flags byte.
pub const ACTION_MASK: u8 = 0x7F;

/// The impulse bit (bit 7) of the flags byte.
pub const IMPULSE_BIT: u8 = 0x80;

/// Header length on the wire before the length prefix: flags + id.
pub const HEADER_SIZE: usize = 5;

/// Length-prefix width following the header.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// A single protocol packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Impulse bit plus action code. Use the accessors rather than touching
    /// bits directly.
    pub flags: u8,
    /// Correlation id, echoed unchanged on the reply.
    pub id: u32,
    /// Codec-encoded payload. Interpretation is the dispatcher's job, keyed
    /// by the action code.
    pub payload: Bytes,
}

impl Packet {
    /// Create a request packet (impulse = 1).
    pub fn request(id: u32, action: u8, payload: Bytes) -> Result<Self> {
        let mut packet = Packet {
            flags: 0,
            id,
            payload,
        };
        packet.set_action(action)?;
        packet.set_impulse(true);
        Ok(packet)
    }

    /// Create a reply packet (impulse = 0) echoing the request's action.
    pub fn reply(id: u32, action: u8, payload: Bytes) -> Result<Self> {
        let mut packet = Packet {
            flags: 0,
            id,
            payload,
        };
        packet.set_action(action)?;
        Ok(packet)
    }

    /// Set the action code, leaving the impulse bit untouched.
    ///
    /// Errors with `InvalidAction` when the code does not fit in 7 bits.
    pub fn set_action(&mut self, action: u8) -> Result<()> {
        if action > ACTION_MASK {
            return Err(NetronError::InvalidAction(action));
        }
        self.flags = (self.flags & IMPULSE_BIT) | action;
        Ok(())
    }

    /// Read the action bits.
    #[inline]
    pub fn action(&self) -> u8 {
        self.flags & ACTION_MASK
    }

    /// Set or clear the impulse bit, leaving the action bits untouched.
    #[inline]
    pub fn set_impulse(&mut self, impulse: bool) {
        if impulse {
            self.flags |= IMPULSE_BIT;
        } else {
            self.flags &= !IMPULSE_BIT;
        }
    }

    /// Read the impulse bit.
    #[inline]
    pub fn impulse(&self) -> bool {
        self.flags & IMPULSE_BIT != 0
    }

    /// Total encoded size of this packet on the wire.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + LENGTH_PREFIX_SIZE + self.payload.len()
    }

    /// One-shot decode of a fully buffered packet.
    ///
    /// Fails with `MalformedPacket` when fewer than [`HEADER_SIZE`] bytes are
    /// present, when the length prefix is truncated, or when the declared
    /// payload length exceeds [`MAX_PAYLOAD_SIZE`]. For incremental decoding
    /// over a byte stream use [`crate::core::codec::PacketCodec`].
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(NetronError::MalformedPacket(
                constants::ERR_SHORT_HEADER.to_string(),
            ));
        }
        let flags = buf[0];
        let id = u32::from_be_bytes([buf[1], buf[2], buf[3], buf[4]]);

        let rest = &buf[HEADER_SIZE..];
        if rest.len() < LENGTH_PREFIX_SIZE {
            return Err(NetronError::MalformedPacket(
                constants::ERR_TRUNCATED_PAYLOAD.to_string(),
            ));
        }
        let len = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        if len > MAX_PAYLOAD_SIZE {
            return Err(NetronError::OversizedPacket(len));
        }
        let body = &rest[LENGTH_PREFIX_SIZE..];
        if body.len() < len {
            return Err(NetronError::MalformedPacket(
                constants::ERR_TRUNCATED_PAYLOAD.to_string(),
            ));
        }

        Ok(Packet {
            flags,
            id,
            payload: Bytes::copy_from_slice(&body[..len]),
        })
    }
}
