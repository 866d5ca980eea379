// Copyright 2020-2022 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! # Transaction throughput benchmarks
//!
//! Test subjects:
//! - uncontended update transactions (read, modify, commit)
//! - read-only snapshots over a run of words

use criterion::{criterion_group, criterion_main, Criterion};
use stm::Stm;
use stronghold_tl2 as stm;

fn bnc_update_commit(c: &mut Criterion) {
    let stm = Stm::new(64, 8).expect("create failed");
    let base = stm.start();

    c.bench_function("update_commit", |b| {
        b.iter(|| {
            let tx = stm.begin(false);
            let mut word = [0u64];
            stm.read(tx, base, &mut word).expect("read failed");
            stm.write(tx, &[word[0] + 1], base).expect("write failed");
            stm.end(tx).expect("commit failed");
        })
    });
}

fn bnc_read_only_snapshot(c: &mut Criterion) {
    let stm = Stm::new(64, 8).expect("create failed");
    let base = stm.start();

    let tx = stm.begin(false);
    stm.write(tx, &[1, 2, 3, 4, 5, 6, 7, 8], base).expect("write failed");
    stm.end(tx).expect("commit failed");

    c.bench_function("read_only_snapshot", |b| {
        b.iter(|| {
            let tx = stm.begin(true);
            let mut words = [0u64; 8];
            stm.read(tx, base, &mut words).expect("read failed");
            stm.end(tx).expect("read-only end failed");
        })
    });
}

criterion_group!(benches, bnc_update_commit, bnc_read_only_snapshot);
criterion_main!(benches);
