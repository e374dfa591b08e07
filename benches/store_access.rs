//! Store access benchmarks for idxstore
//!
//! Measures per-element get/set cost on each backend for two access patterns:
//!
//! - sequential: indices 0..N in order, the paged store's best case
//! - strided: one element per page-sized stride, so the paged store misses on
//!   every access with its default two ways

use std::sync::Arc;

use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput,
};
use idxstore::{AnyStore, Backend, IndexedStore, StoreBuilder};
use parking_lot::Mutex;
use rusqlite::Connection;
use tempfile::tempdir;

const COUNT: u64 = 20_000;
const STRIDE: u64 = 4099;

type Element = [f64; 2];

fn backends() -> Vec<(&'static str, Backend)> {
    vec![
        ("heap", Backend::Heap),
        ("paged", Backend::PagedFile),
        ("mapped", Backend::MappedFile),
        (
            "relational",
            Backend::Relational(Arc::new(Mutex::new(Connection::open_in_memory().unwrap()))),
        ),
    ]
}

fn indices(strided: bool) -> Vec<u64> {
    if strided {
        (0..COUNT).map(|i| (i * STRIDE) % COUNT).collect()
    } else {
        (0..COUNT).collect()
    }
}

fn filled(builder: &StoreBuilder) -> AnyStore<Element> {
    let mut store = builder.allocate::<Element>(COUNT).unwrap();
    for i in 0..COUNT {
        store.set(i, &[i as f64, 0.5]).unwrap();
    }
    store
}

fn bench_get(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut group = c.benchmark_group("store_get");
    group.throughput(Throughput::Elements(COUNT));

    for (name, backend) in backends() {
        let builder = StoreBuilder::new().backend(backend).temp_dir(dir.path());
        let store = filled(&builder);

        for (pattern, strided) in [("sequential", false), ("strided", true)] {
            let order = indices(strided);
            group.bench_with_input(BenchmarkId::new(name, pattern), &order, |b, order| {
                let mut out = Element::default();
                b.iter(|| {
                    for &i in order {
                        store.get(i, &mut out).unwrap();
                        black_box(&out);
                    }
                });
            });
        }
    }

    group.finish();
}

fn bench_set(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut group = c.benchmark_group("store_set");
    group.throughput(Throughput::Elements(COUNT));

    for (name, backend) in backends() {
        let builder = StoreBuilder::new().backend(backend).temp_dir(dir.path());
        let mut store = builder.allocate::<Element>(COUNT).unwrap();

        for (pattern, strided) in [("sequential", false), ("strided", true)] {
            let order = indices(strided);
            group.bench_with_input(BenchmarkId::new(name, pattern), &order, |b, order| {
                b.iter(|| {
                    for &i in order {
                        store.set(i, black_box(&[i as f64, 1.0])).unwrap();
                    }
                });
            });
        }
    }

    group.finish();
}

fn bench_duplicate(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut group = c.benchmark_group("store_duplicate");

    for (name, backend) in backends() {
        let builder = StoreBuilder::new().backend(backend).temp_dir(dir.path());
        let store = filled(&builder);

        group.bench_function(name, |b| {
            b.iter(|| store.duplicate().unwrap().release().unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_get, bench_set, bench_duplicate);
criterion_main!(benches);
