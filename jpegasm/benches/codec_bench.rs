use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use jpegasm::sys::{Module, ModuleConfig};
use jpegasm::{EncodeOptions, Runtime};

fn gradient(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8]);
        }
    }
    pixels
}

fn bench_bridge(c: &mut Criterion) {
    let runtime = Runtime::with_module(
        Module::instantiate(ModuleConfig::default()).expect("default module"),
    );
    let mut group = c.benchmark_group("bridge");
    for side in [64u32, 256, 512] {
        let pixels = gradient(side, side);
        let options = EncodeOptions::new(side, side).with_quality(85);
        let jpeg = runtime.encode_blocking(&pixels, &options).expect("encode");

        group.bench_with_input(BenchmarkId::new("encode", side), &pixels, |b, px| {
            b.iter(|| runtime.encode_blocking(black_box(px), &options).expect("encode"))
        });
        group.bench_with_input(BenchmarkId::new("decode", side), &jpeg, |b, jpeg| {
            b.iter(|| runtime.decode_blocking(black_box(jpeg)).expect("decode"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_bridge);
criterion_main!(benches);
