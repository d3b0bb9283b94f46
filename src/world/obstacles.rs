//! Rocks scattered over the finished terrain.
//!
//! Placement samples random points, drops a ray onto each, and keeps only
//! points whose first hit is the ground itself, so every rock rests on the
//! surface and never on top of another rock or off the mesh edge.

use std::f32::consts::TAU;

use avian3d::prelude::*;
use bevy::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::{ObstacleConfig, SimConfig};
use crate::game_state::AppState;
use crate::physics::{ColliderRegistry, ColliderSet, RayQuery};

use super::terrain::TerrainReady;
use super::Ground;

pub struct ObstaclePlugin;

impl Plugin for ObstaclePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(AppState::PlacingObstacles), place_obstacles);
    }
}

/// Placement rays start this high above the terrain.
const DROP_HEIGHT: f32 = 100.0;
const DROP_RANGE: f32 = 200.0;

/// Marker for obstacle entities.
#[derive(Component)]
pub struct Rock;

/// A placed obstacle. Immutable once created.
#[derive(Clone, Debug)]
pub struct Obstacle {
    pub entity: Entity,
    pub position: Vec3,
    pub scale: f32,
    pub rotation: Quat,
}

/// Solid box matching a rock of the given scale.
pub fn rock_collider(scale: f32) -> Collider {
    Collider::cuboid(scale, scale, scale)
}

/// Outcome of a placement run.
#[derive(Debug)]
pub struct Placement {
    pub obstacles: Vec<Obstacle>,
    pub attempts: usize,
    /// True when the attempt cap ran out before reaching the target count.
    pub exhausted: bool,
}

/// Scatters obstacles over a square terrain centered on the origin.
pub struct ObstaclePlacer<'a> {
    config: &'a ObstacleConfig,
    half_size: f32,
}

impl<'a> ObstaclePlacer<'a> {
    pub fn new(config: &'a ObstacleConfig, terrain_size: f32) -> Self {
        Self {
            config,
            half_size: terrain_size * 0.5,
        }
    }

    /// Place up to `config.count` obstacles. `spawn` creates the entity for
    /// each accepted obstacle; its collider is registered with `world`
    /// before the next sample so later rays can land on it.
    pub fn place<W, R>(
        &self,
        world: &mut W,
        rng: &mut R,
        mut spawn: impl FnMut(Vec3, f32, Quat) -> Entity,
    ) -> Placement
    where
        W: RayQuery + ColliderRegistry,
        R: Rng,
    {
        let config = self.config;
        let mut obstacles = Vec::with_capacity(config.count);
        let mut attempts = 0;

        while obstacles.len() < config.count {
            if attempts >= config.max_attempts {
                return Placement {
                    obstacles,
                    attempts,
                    exhausted: true,
                };
            }
            attempts += 1;

            let x = rng.gen_range(-self.half_size..=self.half_size);
            let z = rng.gen_range(-self.half_size..=self.half_size);
            if Vec2::new(x, z).length() < config.safe_zone {
                continue;
            }

            let origin = Vec3::new(x, DROP_HEIGHT, z);
            let Some(hit) = world.cast_ray(origin, Dir3::NEG_Y, DROP_RANGE, &[]) else {
                continue;
            };
            if world.ground() != Some(hit.entity) {
                continue;
            }

            let scale = rng.gen_range(config.min_scale..=config.max_scale);
            let sink = rng.gen_range(config.min_sink..=config.max_sink) * scale;
            let rotation = Quat::from_euler(
                EulerRot::XYZ,
                rng.gen_range(0.0..TAU),
                rng.gen_range(0.0..TAU),
                rng.gen_range(0.0..TAU),
            );
            let position = hit.point - Vec3::Y * sink;

            let entity = spawn(position, scale, rotation);
            world.add_obstacle(entity, rock_collider(scale), position, rotation);
            obstacles.push(Obstacle {
                entity,
                position,
                scale,
                rotation,
            });
        }

        Placement {
            obstacles,
            attempts,
            exhausted: false,
        }
    }
}

const ROCK_COLOR: Color = Color::srgb(0.549, 0.482, 0.416);

fn place_obstacles(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut ready: EventReader<TerrainReady>,
    grounds: Query<&Collider, With<Ground>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    next_state.set(AppState::Driving);

    let Some(terrain) = ready.read().last() else {
        error!("Obstacle placement skipped: terrain was never committed");
        return;
    };
    let Ok(ground) = grounds.get(terrain.ground) else {
        error!("Obstacle placement skipped: ground {:?} has no collider", terrain.ground);
        return;
    };
    if let Err(err) = config.obstacles.validate() {
        error!("Obstacle placement skipped: {err}");
        return;
    }
    info!("Placing obstacles on {} triangles...", terrain.triangles);

    let mut rng = match config.obstacles.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mesh = meshes.add(Sphere::new(0.5).mesh().uv(24, 16));
    let material = materials.add(StandardMaterial {
        base_color: ROCK_COLOR,
        perceptual_roughness: 0.9,
        ..default()
    });

    let mut world = ColliderSet::with_ground(terrain.ground, ground.clone());
    let placer = ObstaclePlacer::new(&config.obstacles, config.terrain.size);
    let placement = placer.place(&mut world, &mut rng, |position, scale, rotation| {
        commands
            .spawn((
                Rock,
                Name::new("Rock"),
                RigidBody::Static,
                rock_collider(scale),
                Transform::from_translation(position).with_rotation(rotation),
                Visibility::default(),
            ))
            .with_children(|rock| {
                rock.spawn((
                    Mesh3d(mesh.clone()),
                    MeshMaterial3d(material.clone()),
                    Transform::from_scale(Vec3::splat(scale)),
                ));
            })
            .id()
    });

    if placement.exhausted {
        warn!(
            "Obstacle placement gave up after {} attempts: placed {} of {}",
            placement.attempts,
            placement.obstacles.len(),
            config.obstacles.count
        );
    } else {
        info!(
            "{} rocks placed ({} attempts)",
            placement.obstacles.len(),
            placement.attempts
        );
    }
}
