use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rfm_proto::diag::{build_diag_ratios, evaluate};

fn bench_build_ratios(c: &mut Criterion) {
    let mut group = c.benchmark_group("diag");
    group.throughput(Throughput::Elements(1));

    group.bench_function("build_diag_ratios_64_hosts", |b| {
        b.iter(|| build_diag_ratios(black_box(64), black_box(0), black_box(63), |i| (i % 4) + 1, black_box(1)));
    });

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let ratios = vec![1.0f32; 64];
    let counter_read = vec![100i32; 64];
    let mut diag_data = vec![0.0f32; 64];

    let mut group = c.benchmark_group("diag");
    group.throughput(Throughput::Elements(64));

    group.bench_function("evaluate_64_hosts", |b| {
        b.iter(|| evaluate(black_box(100), black_box(0), black_box(63), black_box(&ratios), black_box(&counter_read), black_box(&mut diag_data)));
    });

    group.finish();
}

criterion_group!(benches, bench_build_ratios, bench_evaluate);
criterion_main!(benches);
