// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batch basics.
//!
//! Register a few sprites, draw a small UI frame, and print the queues a renderer would submit.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p understory_demos --example batch_basics`

use kurbo::{Insets, Point, Rect, Size};
use understory_batch::{
    Color, DrawCommand, DrawCommandKind, LinearPreprocessor, MeshManager, NineSliceTransparency,
    PreprocessConfig, ProcessedCommandRecord, Sprite, SpriteMaterialId, SpriteMaterialInfo,
    material_switches,
};

fn print_span(label: &str, span: &[ProcessedCommandRecord]) {
    println!("{label}: {} records, {} material switches", span.len(), material_switches(span));
    for r in span {
        println!(
            "  cmd {:>2} material {:>2} flags {:?} rect {:?}",
            r.command_index, r.material.0, r.flags, r.dst_rect
        );
    }
}

fn main() {
    env_logger::init();

    let mut meshes = MeshManager::new(SpriteMaterialInfo::new(SpriteMaterialId(0), true));

    // A panel frame with an opaque center and translucent border, icons and text.
    let panel = Sprite::optimized_nine_slice(
        SpriteMaterialInfo::new(SpriteMaterialId(10), true),
        SpriteMaterialInfo::new(SpriteMaterialId(11), false),
        Insets::uniform(2.0),
        NineSliceTransparency::Mixed,
    );
    let icons = Sprite::image(SpriteMaterialInfo::new(SpriteMaterialId(20), false));
    let font = Sprite::font(SpriteMaterialInfo::new(SpriteMaterialId(30), false));

    let panel_mesh = meshes.create_mesh(&panel, 0, 0, 0).unwrap();
    let icon_mesh = meshes.create_mesh(&icons, 0, 0, 0).unwrap();
    let label_mesh = meshes.create_mesh(&font, 0, 0, 0).unwrap();
    meshes.set_mesh_text(label_mesh, "Settings").unwrap();

    let mut commands = Vec::new();
    for row in 0..4 {
        let y = 10.0 + f64::from(row) * 40.0;
        commands.push(DrawCommand::from_rect(panel_mesh, Rect::new(10.0, y, 300.0, y + 36.0)));
        commands.push(DrawCommand::new(
            icon_mesh,
            Point::new(16.0, y + 4.0),
            Size::new(28.0, 28.0),
            Color::WHITE,
        ));
        commands.push(DrawCommand::new(
            label_mesh,
            Point::new(50.0, y + 8.0),
            Size::new(120.0, 20.0),
            Color::rgba8(0xE0, 0xE0, 0xE0, 0xFF),
        ));
    }
    // A rotated icon and one clipped off screen.
    commands.push(
        DrawCommand::new(icon_mesh, Point::new(320.0, 10.0), Size::new(16.0, 32.0), Color::WHITE)
            .with_kind(DrawCommandKind::DrawRot90Cw),
    );
    commands.push(
        DrawCommand::from_rect(icon_mesh, Rect::new(900.0, 10.0, 928.0, 38.0))
            .with_clip(Rect::new(0.0, 0.0, 640.0, 480.0)),
    );

    let config = PreprocessConfig {
        allow_depth_buffer: true,
        ..PreprocessConfig::for_viewport(Size::new(640.0, 480.0))
    };
    let mut pre = LinearPreprocessor::new(config);
    let result = pre.process(&commands, &meshes);
    println!("{} commands -> {result:?}", commands.len());
    print_span("opaque (front to back)", pre.opaque_span());
    print_span("transparent (paint order)", pre.transparent_span());
    println!("spliced: {}", pre.stats().spliced);

    println!(
        "materials: {} ({} opaque, {} transparent), capacity {:?}",
        meshes.material_lookup().material_count(),
        meshes.material_lookup().opaque_count(),
        meshes.material_lookup().transparent_count(),
        meshes.capacity()
    );

    for mesh in [panel_mesh, icon_mesh, label_mesh] {
        meshes.destroy_mesh(mesh);
    }
    assert!(meshes.sanity_check());
}
