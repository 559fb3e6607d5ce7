#![allow(clippy::unwrap_used, clippy::uninlined_format_args)]

use bytes::{Bytes, BytesMut};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use netron_protocol::core::codec::PacketCodec;
use netron_protocol::core::packet::Packet;
use netron_protocol::protocol::message::Message;
use netron_protocol::Value;
use tokio_util::codec::{Decoder, Encoder};

fn bench_packet_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_codec");
    let sizes = [0usize, 64, 512, 4096, 65536];

    for &size in &sizes {
        let payload = Bytes::from(vec![0u8; size]);
        group.throughput(Throughput::Bytes(
            (size + Packet::request(1, 1, Bytes::new()).unwrap().encoded_len()) as u64,
        ));

        group.bench_function(format!("encode_{}b", size), |b| {
            let packet = Packet::request(42, 1, payload.clone()).unwrap();
            let mut codec = PacketCodec::default();
            b.iter_batched(
                || packet.clone(),
                |p| {
                    let mut buf = BytesMut::with_capacity(p.encoded_len());
                    codec.encode(p, &mut buf).unwrap();
                    buf
                },
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("decode_{}b", size), |b| {
            let mut codec = PacketCodec::default();
            let mut encoded = BytesMut::new();
            codec
                .encode(Packet::request(42, 1, payload.clone()).unwrap(), &mut encoded)
                .unwrap();
            let encoded = encoded.freeze();
            b.iter_batched(
                || BytesMut::from(&encoded[..]),
                |mut buf| codec.decode(&mut buf).unwrap().unwrap(),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_one_shot_decode(c: &mut Criterion) {
    let mut codec = PacketCodec::default();
    let mut buf = BytesMut::new();
    codec
        .encode(
            Packet::request(7, 1, Bytes::from(vec![0u8; 512])).unwrap(),
            &mut buf,
        )
        .unwrap();
    let bytes = buf.freeze();

    c.bench_function("packet_from_bytes_512b", |b| {
        b.iter(|| Packet::from_bytes(&bytes).unwrap())
    });
}

fn bench_message_bincode(c: &mut Criterion) {
    let mut group = c.benchmark_group("message_bincode");
    let messages = vec![
        Message::Ping,
        Message::Call {
            def_id: 1,
            method: "add".into(),
            args: vec![Value::Int(2), Value::Int(3)],
        },
        Message::Event {
            event: "tick".into(),
            payload: Value::Str("a".repeat(1024)),
        },
    ];

    group.bench_function("serialize", |b| {
        b.iter_batched(
            || messages.clone(),
            |msgs| {
                for m in msgs {
                    let _ = m.encode().unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });

    let blob = Message::Event {
        event: "tick".into(),
        payload: Value::Str("a".repeat(1024)),
    }
    .encode()
    .unwrap();
    group.bench_function("deserialize", |b| {
        b.iter(|| Message::decode(&blob).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_packet_codec,
    bench_one_shot_decode,
    bench_message_bincode
);
criterion_main!(benches);
