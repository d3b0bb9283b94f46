use bevy::math::{Dir3, Vec3};
use bevy::prelude::Entity;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use roverx_lab::config::TerrainConfig;
use roverx_lab::physics::{ColliderSet, RayQuery};
use roverx_lab::world::terrain::{BuildStep, TerrainBuilder, TerrainMesh};

fn build(config: &TerrainConfig) -> TerrainMesh {
    let mut builder = match TerrainBuilder::new(config, 42) {
        Ok(builder) => builder,
        Err(err) => panic!("bench config rejected: {err}"),
    };
    loop {
        if let BuildStep::Committed(mesh) = builder.tick() {
            return mesh;
        }
    }
}

fn terrain_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("terrain_build");
    for segments in [40, 128] {
        let config = TerrainConfig {
            segments,
            seed: Some(42),
            ..Default::default()
        };
        group.bench_function(format!("{segments}_segments"), |b| {
            b.iter(|| build(black_box(&config)))
        });
    }
    group.finish();
}

fn ground_raycast(c: &mut Criterion) {
    let mesh = build(&TerrainConfig {
        segments: 128,
        seed: Some(42),
        ..Default::default()
    });
    let world = ColliderSet::with_ground(Entity::PLACEHOLDER, mesh.to_collider());
    c.bench_function("ground_raycast_128", |b| {
        let mut x = -90.0_f32;
        b.iter(|| {
            x = if x > 90.0 { -90.0 } else { x + 0.37 };
            world.cast_ray(black_box(Vec3::new(x, 100.0, x * 0.5)), Dir3::NEG_Y, 200.0, &[])
        })
    });
}

criterion_group!(benches, terrain_build, ground_raycast);
criterion_main!(benches);
