//! Benchmark the block search and the full per-event pipeline.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use edvs_patchflow::grid::configure;
use edvs_patchflow::{BlockMatcher, Event, FlowConfig, FlowEngine, SliceMethod};

/// Textured plane with a deterministic pseudo-random pattern.
fn textured_plane(width: usize, height: usize, seed: u32) -> Vec<i32> {
    let mut state = seed;
    (0..width * height)
        .map(|_| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            ((state >> 28) as i32) - 8
        })
        .collect()
}

fn bench_best_shift(c: &mut Criterion) {
    let mut group = c.benchmark_group("best_shift");
    for &sd in &[2u32, 3, 5, 8] {
        let dims = configure(128, 128, 0, sd).unwrap();
        let matcher = BlockMatcher::new(&dims, sd);
        let prev = textured_plane(128, 128, 1);
        let curr = textured_plane(128, 128, 2);
        group.bench_with_input(BenchmarkId::from_parameter(sd), &sd, |b, _| {
            b.iter(|| black_box(matcher.best_shift(black_box(64), black_box(64), &prev, &curr)))
        });
    }
    group.finish();
}

fn bench_engine_stream(c: &mut Criterion) {
    let config = FlowConfig {
        search_distance: 3,
        slice_method: SliceMethod::ConstantEventNumber,
        slice_event_count: 500,
        ..FlowConfig::default()
    };
    // A bar sweeping right across a 128x128 sensor.
    let events: Vec<Event> = (0..10_000i64)
        .map(|i| {
            let x = 8 + ((i / 40) % 112) as u16;
            let y = 8 + (i % 112) as u16;
            Event::new(x, y, i * 10, if i % 3 == 0 { -1 } else { 1 })
        })
        .collect();

    c.bench_function("engine_10k_events", |b| {
        let mut engine = FlowEngine::with_sensor(config.clone(), 128, 128).unwrap();
        let mut out = Vec::with_capacity(events.len());
        b.iter(|| {
            out.clear();
            black_box(engine.process_packet(black_box(&events), &mut out))
        })
    });
}

criterion_group!(benches, bench_best_shift, bench_engine_stream);
criterion_main!(benches);
