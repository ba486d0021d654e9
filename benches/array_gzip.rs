use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use zarrs_compat::{
    array::{codec::{Codec, GzipCodec}, ArrayBuilder, DataType, ReadOptions, WriteOptions},
    storage::store::MemoryStore,
};

fn array_gzip(size: u64) -> zarrs_compat::array::Array<MemoryStore> {
    ArrayBuilder::new(vec![size, size, 3], DataType::UInt8, vec![100, 100, 1])
        .bytes_to_bytes_codecs(vec![Codec::new(GzipCodec::new(5).unwrap())])
        .build(Arc::new(MemoryStore::new()), "/gzip")
        .unwrap()
}

fn array_gzip_write_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_gzip_write_all");
    for size in [128u64, 256, 512].iter() {
        let num_elements = size * size * 3;
        let data = vec![1u8; num_elements.try_into().unwrap()];
        group.throughput(Throughput::Bytes(num_elements));
        for parallel in [false, true] {
            let options = WriteOptions::default().with_parallel(parallel);
            let id = if parallel { "parallel" } else { "sequential" };
            group.bench_with_input(BenchmarkId::new(id, size), size, |b, &size| {
                let array = array_gzip(size);
                b.iter(|| array.write_opt(&[size, size, 3], &data, &options).unwrap());
            });
        }
    }
    group.finish();
}

fn array_gzip_read_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_gzip_read_all");
    for size in [128u64, 256, 512].iter() {
        let num_elements = size * size * 3;
        let array = array_gzip(*size);
        let data: Vec<u8> = (0..num_elements).map(|i| (i % 13) as u8).collect();
        array.write(&[*size, *size, 3], &data).unwrap();
        group.throughput(Throughput::Bytes(num_elements));
        for parallel in [false, true] {
            let options = ReadOptions::default().with_parallel(parallel);
            let id = if parallel { "parallel" } else { "sequential" };
            group.bench_function(BenchmarkId::new(id, size), |b| {
                b.iter(|| array.read_opt(&array.subset_all(), &options).unwrap());
            });
        }
    }
    group.finish();
}

criterion_group!(benches, array_gzip_write_all, array_gzip_read_all);
criterion_main!(benches);
