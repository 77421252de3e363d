use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Cursor;
use tokio::runtime::Runtime;

use dbbench::{Backend, Changes, Delimiters, EmbeddedStore, Record, Records, Selector};

const ROWS: usize = 1000;

fn bench_parse(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0);
    let input = gen_tsv(&mut rng, ROWS);

    c.bench_function("parse_tsv", move |b| {
        b.iter(|| {
            Records::new(Cursor::new(input.as_bytes()), Delimiters::default())
                .filter(Result::is_ok)
                .count()
        })
    });
}

fn bench_sled(c: &mut Criterion) {
    c.bench_function("sled_insert", |b| {
        let runtime = runtime();
        let mut rng = StdRng::seed_from_u64(0);

        b.iter_batched(
            || (EmbeddedStore::temporary(discard(), 100).unwrap(), gen_records(&mut rng, ROWS)),
            |(mut store, records)| runtime.block_on(store.bulk_insert(records)).unwrap(),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("sled_update", |b| {
        let runtime = runtime();
        let mut rng = StdRng::seed_from_u64(0);
        let mut store = EmbeddedStore::temporary(discard(), 100).unwrap();
        runtime
            .block_on(store.bulk_insert(gen_records(&mut rng, ROWS)))
            .unwrap();
        let changes = Changes::benchmark();

        b.iter(|| {
            runtime
                .block_on(store.bulk_update(&Selector::All, &changes))
                .unwrap()
        })
    });

    c.bench_function("sled_retrieve", |b| {
        let runtime = runtime();
        let mut rng = StdRng::seed_from_u64(0);
        let mut store = EmbeddedStore::temporary(discard(), 100).unwrap();
        runtime
            .block_on(store.bulk_insert(gen_records(&mut rng, ROWS)))
            .unwrap();

        b.iter(|| runtime.block_on(store.retrieve_all()).unwrap().len())
    });
}

fn discard() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn gen_records(rng: &mut impl Rng, rows: usize) -> Vec<Record> {
    (0..rows)
        .map(|i| {
            let mut fields = vec![format!("key{:06}", i)];
            fields.extend((1..6).map(|_| gen_field(&mut *rng)));
            Record::from_values(fields)
        })
        .collect()
}

fn gen_tsv(rng: &mut impl Rng, rows: usize) -> String {
    gen_records(rng, rows)
        .iter()
        .map(|record| record.fields().join("\t") + "\n")
        .collect()
}

fn gen_field(rng: &mut impl Rng) -> String {
    let len = rng.gen_range(1, 33);
    rng.sample_iter(&Alphanumeric).take(len).collect()
}

criterion_group!(benches, bench_parse, bench_sled);
criterion_main!(benches);
