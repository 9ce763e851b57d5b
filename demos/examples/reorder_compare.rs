// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reorder comparison.
//!
//! Run the basic, linear and grid preprocessors over the same random frame and compare the
//! number of material switches each leaves behind.
//!
//! Run:
//! - `cargo run -p understory_demos --example reorder_compare`

use kurbo::{Point, Size};
use understory_batch::{
    BasicPreprocessor, Color, DrawCommand, LinearPreprocessor, MeshManager, PreprocessConfig,
    ProcessedCommandRecord, SpatialGridPreprocessor, Sprite, SpriteMaterialId, SpriteMaterialInfo,
    material_switches,
};

struct Rng(u64);

impl Rng {
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

fn order(span: &[ProcessedCommandRecord]) -> Vec<u32> {
    span.iter().map(|r| r.command_index).collect()
}

fn main() {
    env_logger::init();

    let viewport = Size::new(1280.0, 720.0);
    let mut meshes = MeshManager::new(SpriteMaterialInfo::new(SpriteMaterialId(0), true));
    let handles: Vec<_> = (1..=8)
        .map(|id| {
            let sprite = Sprite::image(SpriteMaterialInfo::new(SpriteMaterialId(id), false));
            meshes.create_mesh(&sprite, 0, 0, 0).unwrap()
        })
        .collect();

    let mut rng = Rng(0x9E37_79B9_7F4A_7C15);
    let commands: Vec<_> = (0..3000)
        .map(|_| {
            let mesh = handles[(rng.next_u64() % handles.len() as u64) as usize];
            let origin = Point::new(
                rng.next_f64() * viewport.width,
                rng.next_f64() * viewport.height,
            );
            let size = Size::new(4.0 + rng.next_f64() * 40.0, 4.0 + rng.next_f64() * 40.0);
            DrawCommand::new(mesh, origin, size, Color::WHITE)
        })
        .collect();

    let config = PreprocessConfig::for_viewport(viewport);
    let mut basic = BasicPreprocessor::new(config);
    let mut linear = LinearPreprocessor::new(config);
    let mut grid = SpatialGridPreprocessor::try_new(config).unwrap();

    basic.process(&commands, &meshes);
    linear.process(&commands, &meshes);
    grid.process(&commands, &meshes);

    println!("commands: {}", commands.len());
    for (name, span, spliced) in [
        ("basic", basic.transparent_span(), basic.stats().spliced),
        ("linear", linear.transparent_span(), linear.stats().spliced),
        ("grid", grid.transparent_span(), grid.stats().spliced),
    ] {
        println!(
            "{name:>6}: {:>5} records, {:>5} material switches, {spliced:>5} spliced",
            span.len(),
            material_switches(span)
        );
    }
    assert_eq!(
        order(linear.transparent_span()),
        order(grid.transparent_span()),
        "grid and linear reordering should agree"
    );

    // Window resize: the grid rebuilds its cells.
    grid.set_viewport(Size::new(1920.0, 1080.0));
    let layout = grid.reorder().grid().layout();
    println!(
        "after resize: {}x{} cells of {}x{} px",
        layout.cell_count_x(),
        layout.cell_count_y(),
        layout.cell_width_px(),
        layout.cell_height_px()
    );

    for mesh in handles {
        meshes.destroy_mesh(mesh);
    }
}
