//! # Packet Codec
//!
//! Tokio codec framing [`Packet`]s over a raw byte stream.
//!
//! The transport below a peer session is byte-oriented, not message-framed,
//! so packets are self-delimiting: a 5-byte header (flags + id) followed by
//! a 4-byte big-endian length prefix and the payload.
//!
//! Decoding is incremental; a partial frame yields `None` until the rest of
//! the bytes arrive. A declared payload length above the configured maximum
//! is a hard decode error and terminates the session, since framing is
//! unrecoverable mid-stream.

use crate::config::MAX_PAYLOAD_SIZE;
use crate::core::packet::{Packet, HEADER_SIZE, LENGTH_PREFIX_SIZE};
use crate::error::NetronError;
use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Streaming encoder/decoder for netron packets.
#[derive(Debug, Clone)]
pub struct PacketCodec {
    max_payload_size: usize,
}

impl PacketCodec {
    pub fn new(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(MAX_PAYLOAD_SIZE)
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = NetronError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if packet.payload.len() > self.max_payload_size {
            return Err(NetronError::OversizedPacket(packet.payload.len()));
        }

        dst.reserve(packet.encoded_len());
        dst.put_u8(packet.flags);
        dst.put_u32(packet.id);
        dst.put_u32(packet.payload.len() as u32);
        dst.extend_from_slice(&packet.payload);
        Ok(())
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = NetronError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_SIZE + LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        // Peek the length before consuming anything, so a partial frame
        // leaves the buffer intact.
        let len = u32::from_be_bytes([src[5], src[6], src[7], src[8]]) as usize;
        if len > self.max_payload_size {
            return Err(NetronError::OversizedPacket(len));
        }

        let frame_len = HEADER_SIZE + LENGTH_PREFIX_SIZE + len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let flags = src.get_u8();
        let id = src.get_u32();
        src.advance(LENGTH_PREFIX_SIZE);
        let payload = src.split_to(len).freeze();

        Ok(Some(Packet { flags, id, payload }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn round_trip(packet: Packet) -> Packet {
        let mut codec = PacketCodec::default();
        let mut buf = BytesMut::new();
        codec.encode(packet, &mut buf).unwrap();
        codec.decode(&mut buf).unwrap().unwrap()
    }

    #[test]
    fn encode_decode_round_trips_exactly() {
        for (impulse, action, id) in [
            (true, 0u8, 0u32),
            (false, 1, 1),
            (true, 0x7F, u32::MAX),
            (false, 42, 0xDEAD_BEEF),
        ] {
            let mut packet =
                Packet::reply(id, action, Bytes::from_static(b"payload bytes")).unwrap();
            packet.set_impulse(impulse);
            let decoded = round_trip(packet.clone());
            assert_eq!(decoded, packet);
            assert_eq!(decoded.impulse(), impulse);
            assert_eq!(decoded.action(), action);
        }
    }

    #[test]
    fn empty_payload_round_trips() {
        let packet = Packet::request(9, 0, Bytes::new()).unwrap();
        assert_eq!(round_trip(packet.clone()), packet);
    }

    #[test]
    fn partial_frames_yield_none_until_complete() {
        let mut codec = PacketCodec::default();
        let mut full = BytesMut::new();
        codec
            .encode(Packet::request(3, 1, Bytes::from_static(b"hello")).unwrap(), &mut full)
            .unwrap();

        let mut buf = BytesMut::new();
        for chunk in full.chunks(3) {
            let before = codec.decode(&mut buf).unwrap();
            assert!(before.is_none() || buf.is_empty());
            buf.extend_from_slice(chunk);
        }
        let packet = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(packet.id, 3);
        assert_eq!(&packet.payload[..], b"hello");
    }

    #[test]
    fn two_packets_in_one_buffer_decode_in_order() {
        let mut codec = PacketCodec::default();
        let mut buf = BytesMut::new();
        codec
            .encode(Packet::request(1, 1, Bytes::from_static(b"a")).unwrap(), &mut buf)
            .unwrap();
        codec
            .encode(Packet::request(2, 2, Bytes::from_static(b"b")).unwrap(), &mut buf)
            .unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().id, 1);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap().id, 2);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn oversized_length_is_a_hard_error() {
        let mut codec = PacketCodec::new(16);
        let mut buf = BytesMut::new();
        buf.put_u8(0x81);
        buf.put_u32(1);
        buf.put_u32(1024); // declared length above the 16-byte limit
        assert!(matches!(
            codec.decode(&mut buf),
            Err(NetronError::OversizedPacket(1024))
        ));
    }

    #[test]
    fn encode_refuses_oversized_payload() {
        let mut codec = PacketCodec::new(4);
        let mut buf = BytesMut::new();
        let packet = Packet::request(1, 1, Bytes::from_static(b"too long")).unwrap();
        assert!(matches!(
            codec.encode(packet, &mut buf),
            Err(NetronError::OversizedPacket(_))
        ));
    }
}
