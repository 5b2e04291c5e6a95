use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rfm_proto::{PeerLayout, PeerLayoutTable, ReadPlan};

fn peers(n: u32) -> PeerLayoutTable {
    let mut offset = 3136u32;
    let layouts = (0..n)
        .map(|_| {
            let p = PeerLayout {
                write_offset: offset,
                output_size: 64,
                downsample_factor: 1,
            };
            offset += 64 + 4;
            p
        })
        .collect();
    PeerLayoutTable::from_peers(layouts)
}

fn bench_build_small_cluster(c: &mut Criterion) {
    let table = peers(4);
    let mut group = c.benchmark_group("remap");
    group.throughput(Throughput::Elements(1));

    group.bench_function("build_plan_4_hosts_full_window", |b| {
        b.iter(|| ReadPlan::build(black_box(&table), black_box(3136), black_box(4 * (64 + 4))));
    });

    group.finish();
}

fn bench_build_large_cluster_partial_window(c: &mut Criterion) {
    let table = peers(64);
    let mut group = c.benchmark_group("remap");
    group.throughput(Throughput::Elements(1));

    group.bench_function("build_plan_64_hosts_partial_window", |b| {
        b.iter(|| ReadPlan::build(black_box(&table), black_box(3136 + 40), black_box(16)));
    });

    group.finish();
}

fn bench_scatter(c: &mut Criterion) {
    let table = peers(8);
    let plan = ReadPlan::build(&table, 3136, 8 * (64 + 4));
    let internal = vec![0u8; plan.total_bytes as usize];
    let mut external = vec![0u8; 8 * 64];
    let mut counters = vec![0i32; 8];

    let mut group = c.benchmark_group("remap");
    group.throughput(Throughput::Elements(1));

    group.bench_function("scatter_8_hosts", |b| {
        b.iter(|| plan.scatter(black_box(&internal), black_box(&mut external), black_box(&mut counters)));
    });

    group.finish();
}

criterion_group!(benches, bench_build_small_cluster, bench_build_large_cluster_partial_window, bench_scatter);
criterion_main!(benches);
