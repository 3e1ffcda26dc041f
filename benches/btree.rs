//! B+ tree benchmarks for wrendb
//!
//! These benchmarks measure the core operations that determine engine
//! performance: insertion (sequential and reverse order, with the page
//! splits they trigger) and point reads against trees of varying size.
//! Every insert pays for a sync, so absolute numbers track the disk far
//! more than the CPU.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempfile::tempdir;
use wrendb::TableHandle;

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_insert");
    group.sample_size(10);

    for count in [100usize, 500].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("sequential", count), count, |b, &count| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let table = TableHandle::create(dir.path(), "bench").unwrap();
                    (dir, table)
                },
                |(dir, mut table)| {
                    for i in 0..count {
                        let key = format!("key{:08}", i);
                        let value = format!("value{:08}", i);
                        table.insert(key.as_bytes(), value.as_bytes()).unwrap();
                    }
                    (dir, table)
                },
            );
        });

        group.bench_with_input(BenchmarkId::new("reverse", count), count, |b, &count| {
            b.iter_with_setup(
                || {
                    let dir = tempdir().unwrap();
                    let table = TableHandle::create(dir.path(), "bench").unwrap();
                    (dir, table)
                },
                |(dir, mut table)| {
                    for i in (0..count).rev() {
                        let key = format!("key{:08}", i);
                        let value = format!("value{:08}", i);
                        table.insert(key.as_bytes(), value.as_bytes()).unwrap();
                    }
                    (dir, table)
                },
            );
        });
    }

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_search");

    for count in [100usize, 1000].iter() {
        let dir = tempdir().unwrap();
        let mut table = TableHandle::create(dir.path(), "bench").unwrap();
        for i in 0..*count {
            let key = format!("key{:08}", i);
            let value = format!("value{:08}", i).repeat(10);
            table.insert(key.as_bytes(), value.as_bytes()).unwrap();
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("point", count), count, |b, &count| {
            let mut i = 0usize;
            b.iter(|| {
                let key = format!("key{:08}", i % count);
                i += 1;
                black_box(table.search(key.as_bytes()).unwrap())
            });
        });

        group.bench_with_input(BenchmarkId::new("miss", count), count, |b, _| {
            b.iter(|| black_box(table.search(b"key_absent").unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_insert, bench_search);
criterion_main!(benches);
