//! Benchmarks for needlestore volume operations

use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use needlestore::volume::Volume;
use tempfile::TempDir;

fn setup_volume(max_size: u64) -> (TempDir, Volume) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bench.vol");
    Volume::create(&path, 0, max_size).unwrap();
    let volume = Volume::open(&path).unwrap();
    (temp_dir, volume)
}

fn storage_benchmarks(c: &mut Criterion) {
    let payload = vec![0x5au8; 4096];

    let mut group = c.benchmark_group("volume");
    group.throughput(Throughput::Bytes(payload.len() as u64));

    // Each put is fsynced, so this measures durable write latency
    group.bench_function("put_4k", |b| {
        b.iter_batched(
            || setup_volume(1 << 24),
            |(_temp, volume)| {
                volume.put_bytes(1, 0, &payload).unwrap();
            },
            BatchSize::PerIteration,
        )
    });

    let (_temp, volume) = setup_volume(1 << 26);
    for key in 0..1000u64 {
        volume.put_bytes(key, 0, &payload).unwrap();
    }
    let mut key = 0u64;
    group.bench_function("read_4k", |b| {
        b.iter(|| {
            key = (key + 7) % 1000;
            volume.read(key).unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, storage_benchmarks);
criterion_main!(benches);
