use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::io;
use std::time::Instant;
use tloe_protocol::frame::{AckKind, Channel, Frame};
use tloe_protocol::sequence::SeqNum;
use tloe_protocol::{Endpoint, Fabric};

struct NullFabric;

impl Fabric for NullFabric {
    fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        black_box(frame);
        Ok(())
    }

    fn recv(&mut self, _buf: &mut [u8]) -> io::Result<Option<usize>> {
        Ok(None)
    }
}

fn data_frame(seq: SeqNum) -> Frame {
    Frame::data(
        seq,
        SeqNum::ZERO,
        Channel::new(1).unwrap(),
        1,
        Bytes::from(vec![0u8; 64]),
    )
}

fn bench_frame_codec(c: &mut Criterion) {
    let frame = data_frame(SeqNum::new(1000));
    let bytes = frame.to_bytes().unwrap();

    let mut group = c.benchmark_group("frame");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("serialize", |b| {
        b.iter(|| black_box(black_box(&frame).to_bytes().unwrap()));
    });

    group.bench_function("deserialize", |b| {
        b.iter(|| black_box(Frame::from_bytes(black_box(&bytes)).unwrap()));
    });

    group.finish();
}

fn bench_seq_ops(c: &mut Criterion) {
    let a = SeqNum::new(1000);
    let b = SeqNum::new(3000);

    c.bench_function("seq_circular_cmp", |bench| {
        bench.iter(|| black_box(black_box(a).circular_cmp(black_box(b))));
    });
}

fn bench_receive_path(c: &mut Criterion) {
    c.bench_function("handle_normal_frame", |b| {
        let mut endpoint = Endpoint::default();
        let mut fabric = NullFabric;
        let now = Instant::now();

        b.iter(|| {
            let frame = data_frame(endpoint.next_rx_seq());
            let event = endpoint.handle_frame(frame, &mut fabric, now).unwrap();
            endpoint.flush_delayed_ack(now).unwrap();
            endpoint.pop_message();
            endpoint.pop_control();
            black_box(event);
        });
    });

    c.bench_function("slide_and_resend", |b| {
        let mut fabric = NullFabric;
        let now = Instant::now();

        b.iter(|| {
            let mut endpoint = Endpoint::default();
            for raw in 0..64 {
                endpoint
                    .record_sent(data_frame(SeqNum::new(raw)), now)
                    .unwrap();
            }
            let nak = Frame::control(AckKind::Nak, SeqNum::new(31), SeqNum::new(31));
            black_box(endpoint.handle_frame(nak, &mut fabric, now).unwrap());
        });
    });
}

criterion_group!(benches, bench_frame_codec, bench_seq_ops, bench_receive_path);
criterion_main!(benches);
