#![allow(clippy::cast_possible_wrap)]

//! Criterion benchmark for pool checkout under contention. Every iteration fans a batch
//! of primary-key lookups out over several worker threads sharing one pool, so the
//! numbers reflect lease/return overhead plus statement rendering against the in-memory
//! backend rather than any network latency.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::Rng;
use sql_mapper::prelude::*;
use sql_mapper::test_utils::test_config;
use std::hint::black_box;
use std::thread;

const ROWS: usize = 200;
const LOOKUPS: usize = 256;

#[derive(Debug, Default, Clone)]
struct BenchRow {
    id: i64,
    name: String,
    score: f64,
    active: bool,
}

impl Entity for BenchRow {
    fn table() -> TableDescriptor<Self> {
        TableDescriptor::new("bench_rows")
            .field(field!(BenchRow, id).constraints("PRIMARY KEY AUTO_INCREMENT"))
            .field(field!(BenchRow, name).constraints("NOT_NULL"))
            .field(field!(BenchRow, score))
            .field(field!(BenchRow, active))
    }
}

fn seeded_database(pool_size: usize) -> Result<Database, OrmError> {
    let registry = Registry::builder().entity::<BenchRow>()?.build();
    let config = test_config(DriverKind::Postgres, pool_size);
    let db = Database::with_driver(config, MemoryDriver::new().boxed(), registry)?;
    db.schema().create_table::<BenchRow>()?;

    let rows = db.mapper::<BenchRow>()?;
    for i in 0..ROWS {
        let mut row = BenchRow {
            id: 0,
            name: format!("row-{i}"),
            score: i as f64 * 1.5,
            active: i % 2 == 0,
        };
        rows.save(&mut row)?;
    }
    Ok(db)
}

fn lookup_ids() -> Vec<i64> {
    let mut rng = rand::rng();
    (0..LOOKUPS)
        .map(|_| rng.random_range(1..=ROWS as i64))
        .collect()
}

fn run_batch(db: &Database, ids: &[i64], workers: usize) {
    let chunk = ids.len().div_ceil(workers);
    thread::scope(|scope| {
        for part in ids.chunks(chunk) {
            scope.spawn(move || {
                let rows = db.mapper::<BenchRow>().expect("registered entity");
                for id in part {
                    let found = rows
                        .find_one("id = ?", &sql_params![*id])
                        .expect("lookup succeeds");
                    black_box(found);
                }
            });
        }
    });
}

fn bench_pool_checkout(c: &mut Criterion) {
    let ids = lookup_ids();
    let mut group = c.benchmark_group("pool_checkout");
    group.throughput(Throughput::Elements(ids.len() as u64));

    for (pool_size, workers) in [(1, 1), (4, 4), (4, 16)] {
        let db = seeded_database(pool_size).expect("seed benchmark database");
        group.bench_with_input(
            BenchmarkId::new(format!("pool{pool_size}"), workers),
            &workers,
            |b, &workers| b.iter(|| run_batch(&db, &ids, workers)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_pool_checkout);
criterion_main!(benches);
