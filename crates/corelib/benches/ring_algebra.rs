//! Microbenchmarks for the identifier algebra and local lookup hot paths.
//!
//! These run on every `find_successors` call (directly or via the finger
//! table refresh in `fix_fingers`), so their per-call cost sets a floor on
//! how many lookups a single vnode can serve per second.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chord_core::identifier::{between, hash, power_offset, Identifier, M_BITS};
use chord_core::lookup::find_successors_locally;
use chord_core::vnode::{Vnode, VnodeState};

fn id(byte: u8) -> Identifier {
    hash(&[byte])
}

fn bench_between(c: &mut Criterion) {
    let a = id(0x10);
    let b = id(0xF0);
    let k = id(0x80);
    c.bench_function("between", |bencher| {
        bencher.iter(|| between(black_box(&a), black_box(&b), black_box(&k), false))
    });
}

fn bench_power_offset(c: &mut Criterion) {
    let base = id(0x42);
    c.bench_function("power_offset", |bencher| {
        bencher.iter(|| power_offset(black_box(&base), black_box(87), M_BITS as u32))
    });
}

fn bench_find_successors_locally(c: &mut Criterion) {
    let self_handle = Vnode::new(Identifier::from_bytes(&[0x80]), "bench-host");
    let mut state = VnodeState {
        predecessor: Some(Vnode::new(Identifier::from_bytes(&[0x40]), "pred")),
        successors: (1..=8u8).map(|i| Vnode::new(Identifier::from_bytes(&[0x80 + i]), "succ")).collect(),
        finger: vec![None; M_BITS],
        ..Default::default()
    };
    // A sparsely populated finger table, as a real vnode would have outside
    // of the first few fix_fingers rounds after bootstrap.
    for i in (0..M_BITS).step_by(7) {
        state.finger[i] = Some(Vnode::new(Identifier::from_bytes(&[(i % 256) as u8]), "finger"));
    }

    c.bench_function("find_successors_locally/responsible", |bencher| {
        let key = Identifier::from_bytes(&[0x50]);
        bencher.iter(|| find_successors_locally(black_box(&self_handle), black_box(&state), 8, key))
    });

    c.bench_function("find_successors_locally/forward", |bencher| {
        let key = Identifier::from_bytes(&[0x05]);
        bencher.iter(|| find_successors_locally(black_box(&self_handle), black_box(&state), 8, key))
    });
}

criterion_group!(benches, bench_between, bench_power_offset, bench_find_successors_locally);
criterion_main!(benches);
