use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use iq_slurper::{
    metadata::{AcquisitionParams, SegmentHeader, SegmenterConfig},
    radio::{SimulatedRadio, StreamCommand, StreamSource},
    ring::ring_buffer,
    sample::{SampleType, WireFormat},
    ELEMENT_SIZE,
};
use rand::prelude::*;
use std::time::Duration;

fn benchmark(c: &mut Criterion) {
    let mut rng = rand::thread_rng();

    let mut dummy_block = vec![0u8; ELEMENT_SIZE];
    rng.fill(&mut dummy_block[..]);

    let (mut tx, mut rx) = ring_buffer(4096);

    c.bench_function("ring push/pop", |b| {
        b.iter(|| {
            tx.try_push(black_box(dummy_block.clone())).unwrap();
            black_box(rx.try_pop())
        })
    });

    let segmenter = SegmenterConfig {
        segment_size: 1_000_000,
        sample_type: SampleType::Short,
        params: AcquisitionParams {
            rate: 1e6,
            freq: 915e6,
            gain: 20.0,
        },
        started_at: Utc::now(),
    };
    let desc = segmenter.descriptor(rng.gen_range(0..1_000_000_000), 1_000_000);

    c.bench_function("header encode", |b| {
        b.iter(|| {
            SegmentHeader::new(black_box(&desc), SampleType::Short)
                .encode()
                .unwrap()
        })
    });

    let mut radio = SimulatedRadio::unpaced();
    radio.configure(SampleType::Short, WireFormat::Sc16).unwrap();
    radio.start(StreamCommand::for_request(0)).unwrap();
    let samps = ELEMENT_SIZE / SampleType::Short.size();

    c.bench_function("simulated receive", |b| {
        b.iter(|| {
            radio.receive(
                black_box(&mut dummy_block),
                black_box(samps),
                Duration::from_secs(1),
            )
        })
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
