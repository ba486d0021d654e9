use criterion::{
    criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion, PlotConfiguration,
    Throughput,
};
use zarrs_compat::array::{
    codec::{BytesCodec, Codec, Crc32cCodec},
    CodecChain, DataType, Endianness,
};

fn codec_bytes(c: &mut Criterion) {
    let plot_config = PlotConfiguration::default().summary_scale(AxisScale::Logarithmic);
    let mut group = c.benchmark_group("codec_bytes");
    group.plot_config(plot_config);

    // Set the endianness to be the opposite of the target endianness, so the codec does work
    #[cfg(target_endian = "big")]
    let codecs = CodecChain::new(BytesCodec::new(Some(Endianness::Little)), vec![]);
    #[cfg(target_endian = "little")]
    let codecs = CodecChain::new(BytesCodec::new(Some(Endianness::Big)), vec![]);

    for size in [32u64, 64, 128, 256].iter() {
        let size3 = size * size * size;
        let data = vec![0u8; size3.try_into().unwrap()];
        group.throughput(Throughput::Bytes(size3));
        group.bench_function(BenchmarkId::new("encode", size3), |b| {
            b.iter(|| codecs.encode(data.clone(), DataType::UInt16).unwrap());
        });
        group.bench_function(BenchmarkId::new("decode", size3), |b| {
            b.iter(|| codecs.decode(data.clone(), DataType::UInt16).unwrap());
        });
    }
}

fn codec_crc32c(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec_crc32c");
    let codecs = CodecChain::new(
        BytesCodec::new(Some(Endianness::Little)),
        vec![Codec::new(Crc32cCodec::new())],
    );
    for size in [32u64, 64, 128, 256].iter() {
        let size3 = size * size * size;
        let data = vec![0u8; size3.try_into().unwrap()];
        let encoded = codecs.encode(data.clone(), DataType::UInt8).unwrap();
        group.throughput(Throughput::Bytes(size3));
        group.bench_function(BenchmarkId::new("encode", size3), |b| {
            b.iter(|| codecs.encode(data.clone(), DataType::UInt8).unwrap());
        });
        group.bench_function(BenchmarkId::new("decode", size3), |b| {
            b.iter(|| codecs.decode(encoded.clone(), DataType::UInt8).unwrap());
        });
    }
}

criterion_group!(benches, codec_bytes, codec_crc32c);
criterion_main!(benches);
