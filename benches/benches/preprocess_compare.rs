// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Size};
use understory_batch::{
    BasicPreprocessor, Color, DrawCommand, LinearPreprocessor, MeshHandle, MeshManager,
    PreprocessConfig, SpatialGridPreprocessor, Sprite, SpriteMaterialId, SpriteMaterialInfo,
    material_switches,
};

const VIEWPORT: Size = Size::new(1920.0, 1080.0);

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
    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }
}

fn make_meshes(materials: u32) -> (MeshManager, Vec<MeshHandle>) {
    let mut meshes = MeshManager::new(SpriteMaterialInfo::new(SpriteMaterialId(0), true));
    let handles = (1..=materials)
        .map(|id| {
            let info = SpriteMaterialInfo::new(SpriteMaterialId(id), id % 3 == 0);
            meshes
                .create_mesh(&Sprite::image(info), 0, 0, 0)
                .expect("image meshes fit the default capacity")
        })
        .collect();
    (meshes, handles)
}

/// Widgets laid out in rows: each widget draws a background, an icon and a label.
fn gen_widget_rows(handles: &[MeshHandle], rows: usize, cols: usize) -> Vec<DrawCommand> {
    let mut out = Vec::with_capacity(rows * cols * 3);
    let cell = Size::new(VIEWPORT.width / cols as f64, VIEWPORT.height / rows as f64);
    for y in 0..rows {
        for x in 0..cols {
            let origin = Point::new(x as f64 * cell.width, y as f64 * cell.height);
            out.push(DrawCommand::new(handles[0], origin, cell, Color::WHITE));
            let icon = Size::new(cell.height * 0.5, cell.height * 0.5);
            out.push(DrawCommand::new(handles[1], origin + (2.0, 2.0), icon, Color::WHITE));
            let label = Size::new(cell.width * 0.5, cell.height * 0.5);
            let at = origin + (icon.width + 4.0, 2.0);
            out.push(DrawCommand::new(handles[2], at, label, Color::WHITE));
        }
    }
    out
}

fn gen_random_commands(handles: &[MeshHandle], count: usize, max_extent: f64) -> Vec<DrawCommand> {
    let mut rng = Rng::new(0xFACE_FEED_CAFE_BABE);
    (0..count)
        .map(|_| {
            let origin = Point::new(
                rng.next_f64() * VIEWPORT.width,
                rng.next_f64() * VIEWPORT.height,
            );
            let size = Size::new(
                1.0 + rng.next_f64() * max_extent,
                1.0 + rng.next_f64() * max_extent,
            );
            let mesh = handles[rng.below(handles.len())];
            DrawCommand::new(mesh, origin, size, Color::WHITE)
        })
        .collect()
}

fn config() -> PreprocessConfig {
    PreprocessConfig {
        allow_depth_buffer: true,
        ..PreprocessConfig::for_viewport(VIEWPORT)
    }
}

fn bench_scenarios(c: &mut Criterion) {
    let (meshes, handles) = make_meshes(12);
    let scenarios = [
        ("widget_rows", gen_widget_rows(&handles, 40, 24)),
        ("random_small", gen_random_commands(&handles, 4000, 24.0)),
        ("random_large", gen_random_commands(&handles, 2000, 400.0)),
    ];

    for (name, commands) in &scenarios {
        let mut group = c.benchmark_group(*name);
        group.throughput(Throughput::Elements(commands.len() as u64));

        group.bench_function("basic", |b| {
            let mut pre = BasicPreprocessor::new(config());
            b.iter(|| black_box(pre.process(black_box(commands), &meshes)));
        });
        group.bench_function("linear", |b| {
            let mut pre = LinearPreprocessor::new(config());
            b.iter(|| black_box(pre.process(black_box(commands), &meshes)));
        });
        group.bench_function("grid", |b| {
            let mut pre = SpatialGridPreprocessor::try_new(config()).expect("valid grid config");
            b.iter(|| black_box(pre.process(black_box(commands), &meshes)));
        });
        group.bench_function("linear_cold", |b| {
            b.iter_batched(
                || LinearPreprocessor::new(config()),
                |mut pre| {
                    let result = pre.process(commands, &meshes);
                    black_box(material_switches(pre.transparent_span()) + result.len())
                },
                BatchSize::SmallInput,
            );
        });
        group.finish();
    }
}

fn bench_backtracking(c: &mut Criterion) {
    let (meshes, handles) = make_meshes(12);
    let commands = gen_random_commands(&handles, 4000, 48.0);
    let mut group = c.benchmark_group("max_backtracking");
    group.throughput(Throughput::Elements(commands.len() as u64));
    for &max in &[0_u32, 8, 32, 128] {
        let cfg = PreprocessConfig {
            max_backtracking: max,
            ..config()
        };
        group.bench_function(format!("linear_{max}"), |b| {
            let mut pre = LinearPreprocessor::new(cfg);
            b.iter(|| black_box(pre.process(black_box(&commands), &meshes)));
        });
        group.bench_function(format!("grid_{max}"), |b| {
            let mut pre = SpatialGridPreprocessor::try_new(cfg).expect("valid grid config");
            b.iter(|| black_box(pre.process(black_box(&commands), &meshes)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scenarios, bench_backtracking);
criterion_main!(benches);
