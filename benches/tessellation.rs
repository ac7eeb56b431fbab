use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use powervor::{compute_tessellation, compute_tessellation_with, Ball, PeriodicBox, Settings, UpdateableTessellation};

/// Synthetic jittered lattice standing in for a packed molecular system.
fn lattice_balls(n_per_axis: usize, spacing: f64) -> Vec<Ball> {
    let mut balls = Vec::with_capacity(n_per_axis.pow(3));
    for ix in 0..n_per_axis {
        for iy in 0..n_per_axis {
            for iz in 0..n_per_axis {
                let seed = (ix * 131 + iy * 17 + iz * 7) as f64;
                let jitter = 0.2 * seed.sin();
                balls.push(Ball::new(
                    spacing * ix as f64 + jitter,
                    spacing * iy as f64 + 0.15 * seed.cos(),
                    spacing * iz as f64 - jitter,
                    1.0 + 0.4 * (seed * 0.5).sin().abs(),
                ));
            }
        }
    }
    balls
}

fn bench_tessellation(c: &mut Criterion) {
    let mut group = c.benchmark_group("tessellation");

    for n_per_axis in [6usize, 10, 14] {
        let balls = lattice_balls(n_per_axis, 2.2);
        let n = balls.len();

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("compute", n), &balls, |b, balls| {
            b.iter(|| compute_tessellation(black_box(balls), black_box(1.4)));
        });
    }

    group.finish();
}

fn bench_tessellation_periodic(c: &mut Criterion) {
    let balls = lattice_balls(8, 2.2);
    let extent = 8.0 * 2.2;
    let settings = Settings {
        probe: 1.4,
        periodic_box: Some(PeriodicBox::from_corners(
            (-1.1, -1.1, -1.1),
            (extent - 1.1, extent - 1.1, extent - 1.1),
        )),
        ..Settings::default()
    };

    let mut group = c.benchmark_group("tessellation_periodic");
    group.throughput(Throughput::Elements(balls.len() as u64));
    group.bench_with_input(BenchmarkId::new("compute", balls.len()), &balls, |b, balls| {
        b.iter(|| compute_tessellation_with(black_box(balls), black_box(&settings)));
    });
    group.finish();
}

fn bench_incremental_update(c: &mut Criterion) {
    let balls = lattice_balls(10, 2.2);

    let mut group = c.benchmark_group("incremental_update");
    group.throughput(Throughput::Elements(1));
    group.bench_function("move_one_sphere", |b| {
        let mut tess = UpdateableTessellation::new();
        tess.init(&balls, 1.4, None).unwrap();
        let mut moved = balls.clone();
        let mut offset = 0.0f64;
        b.iter(|| {
            offset += 0.01;
            moved[500].x = balls[500].x + 0.05 * offset.sin();
            black_box(tess.update_with_changed(&moved, &[500]))
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_tessellation,
    bench_tessellation_periodic,
    bench_incremental_update
);
criterion_main!(benches);
