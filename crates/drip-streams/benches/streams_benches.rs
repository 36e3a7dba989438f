//! Criterion benchmarks for drip-streams hot paths.
//!
//! Covers: ledger flush over many cycles, max-end solving, and a full
//! reconfiguration with the maximum number of receivers.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use drip_core::constants::MAX_STREAMS_RECEIVERS;
use drip_core::cycle::CycleMath;
use drip_core::types::{AccountId, AssetId, StreamConfig, StreamReceiver};
use drip_streams::deltas::AmtDeltaLedger;
use drip_streams::engine::{CurrStreams, StreamsEngine};
use drip_streams::max_end::calc_max_end;

const NOW: u32 = 1_700_000_000;

fn receivers(n: usize) -> Vec<StreamReceiver> {
    (0..n)
        .map(|i| {
            let start = NOW + (i as u32 % 13) * 3_600;
            let config = StreamConfig::per_sec(1 + i as u128 % 7).with_start(start);
            StreamReceiver::new(AccountId(i as u128 + 1), config)
        })
        .collect()
}

fn bench_flush(c: &mut Criterion) {
    let math = CycleMath::new(600).expect("valid cycle");
    let mut ledger = AmtDeltaLedger::new();
    // One rate change every 7 cycles over ~1000 cycles.
    for i in 0..150u32 {
        let start = NOW + i * 7 * 600 + 17;
        ledger.add_delta_range(&math, start, start + 3_000, 1_000_000_000);
    }
    ledger.receive_from(math.cycle_of(NOW));
    let current = math.cycle_of(NOW + 1_000 * 600);

    c.bench_function("ledger_preview_1000_cycles", |b| {
        b.iter(|| ledger.preview(black_box(current), black_box(u32::MAX)))
    });
}

fn bench_max_end(c: &mut Criterion) {
    let math = CycleMath::new(600).expect("valid cycle");
    let list = receivers(MAX_STREAMS_RECEIVERS);

    c.bench_function("max_end_100_receivers", |b| {
        b.iter(|| calc_max_end(&math, black_box(1_000_000_000), black_box(&list), NOW))
    });
}

fn bench_set_streams(c: &mut Criterion) {
    let math = CycleMath::new(600).expect("valid cycle");
    let list = receivers(MAX_STREAMS_RECEIVERS);
    let sender = AccountId(u128::MAX);

    c.bench_function("set_streams_100_receivers", |b| {
        b.iter(|| {
            let mut engine = StreamsEngine::new(math);
            engine
                .set_streams(
                    sender,
                    AssetId(1),
                    &CurrStreams::empty(),
                    black_box(1_000_000_000),
                    &list,
                    NOW,
                )
                .expect("valid config")
        })
    });
}

criterion_group!(benches, bench_flush, bench_max_end, bench_set_streams);
criterion_main!(benches);
