use criterion::{black_box, criterion_group, criterion_main, Criterion};

use covenant_core::codec::Outpoint;
use covenant_core::outputs::{OutputSet, TxOutput};
use covenant_core::turing::{parse_tape, run, TuringState};
use covenant_core::{evaluate, expected_outputs, Call, Covenant, Hash256, SpendContext, Utxo};

fn context() -> SpendContext {
    let outpoint = Outpoint {
        txid: [0x2a; 32],
        vout: 0,
    };
    SpendContext {
        prevouts: outpoint.encode().to_vec(),
        utxo: Utxo {
            value: 1,
            outpoint,
        },
        hash_outputs: Hash256::of(b""),
        sighash: [0u8; 32],
        change: None,
    }
}

fn bench_commitment(c: &mut Criterion) {
    let mut set = OutputSet::new();
    for i in 0..4u8 {
        set.push(TxOutput::new(u64::from(i) * 1000, vec![i; 64]));
    }
    c.bench_function("output_set_digest", |b| b.iter(|| black_box(&set).digest()));
}

fn bench_turing_step(c: &mut Criterion) {
    let machine = Covenant::TuringMachine(
        TuringState::new(parse_tape("(()())").expect("tape"), 0, vec![0x00])
            .expect("valid machine"),
    );
    let ctx = context();
    let pinned = ctx.with_hash_outputs(
        expected_outputs(&machine, &Call::Transit, &ctx)
            .expect("expected outputs")
            .hash_outputs,
    );
    c.bench_function("turing_transit", |b| {
        b.iter(|| evaluate(black_box(&machine), &Call::Transit, &pinned))
    });
}

fn bench_turing_run(c: &mut Criterion) {
    let tape = "()".repeat(16);
    let machine = TuringState::new(parse_tape(&tape).expect("tape"), 0, vec![]).expect("machine");
    c.bench_function("turing_run_32", |b| b.iter(|| run(black_box(&machine), 10_000)));
}

criterion_group!(benches, bench_commitment, bench_turing_step, bench_turing_run);
criterion_main!(benches);
