// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::Rect;
use understory_hash_grid::SpatialHashGrid2D;

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn gen_random_rects(count: usize, width: f64, height: f64, max_extent: f64) -> Vec<Rect> {
    let mut rng = Rng::new(0xBADC_F00D_1234_5678);
    (0..count)
        .map(|_| {
            let x0 = rng.next_f64() * width;
            let y0 = rng.next_f64() * height;
            let w = 1.0 + rng.next_f64() * max_extent;
            let h = 1.0 + rng.next_f64() * max_extent;
            Rect::new(x0, y0, x0 + w, y0 + h)
        })
        .collect()
}

fn bench_build_and_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_grid");
    for &cells in &[8_u32, 16, 32] {
        let rects = gen_random_rects(4000, 1920.0, 1080.0, 64.0);
        group.throughput(Throughput::Elements(rects.len() as u64));
        group.bench_function(format!("add_query_cells{cells}"), |b| {
            b.iter_batched(
                || SpatialHashGrid2D::for_window(1920, 1080, cells, cells).expect("valid grid"),
                |mut grid| {
                    let mut hits = 0_usize;
                    for (z, r) in rects.iter().copied().enumerate() {
                        let z = z as u32;
                        if z > 32 {
                            hits += grid.query_after(r, z - 32).count();
                        }
                        grid.add_clamped(r, z);
                    }
                    black_box(hits)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_splice(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_grid_splice");
    let rects = gen_random_rects(2000, 1920.0, 1080.0, 32.0);
    group.throughput(Throughput::Elements(rects.len() as u64));
    group.bench_function("insert_after_pos", |b| {
        b.iter_batched(
            || SpatialHashGrid2D::for_window(1920, 1080, 16, 16).expect("valid grid"),
            |mut grid| {
                // Every fourth rect is spliced in two slots back, shifting the ones it skips.
                let mut pos_to_z: Vec<u32> = Vec::with_capacity(rects.len());
                for (z, r) in rects.iter().copied().enumerate() {
                    let z = z as u32;
                    let i = pos_to_z.len();
                    if z % 4 == 3 && i >= 3 {
                        let last = i - 3;
                        for p in last + 1..i {
                            grid.set_position(pos_to_z[p], p as u32 + 1);
                        }
                        pos_to_z.push(z);
                        pos_to_z[last + 1..].rotate_right(1);
                        grid.try_insert_after_pos(last as u32, r, z);
                    } else {
                        grid.add_clamped(r, z);
                        pos_to_z.push(z);
                    }
                }
                black_box(grid.len())
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_build_and_query, bench_splice);
criterion_main!(benches);
