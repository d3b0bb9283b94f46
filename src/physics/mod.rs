//! Collision queries over avian colliders.
//!
//! The rover and the obstacle placer see the scene through [`RayQuery`] and
//! [`OverlapQuery`]. While driving, [`SpatialWorld`] answers them from
//! avian's spatial query pipeline. During placement the pipeline has not yet
//! seen the rocks spawned that frame, so [`ColliderSet`] answers them by
//! testing the same avian shapes directly.

use avian3d::collision::contact_query;
use avian3d::prelude::*;
use bevy::prelude::*;

pub struct CollisionPlugin;

impl Plugin for CollisionPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(PhysicsPlugins::default());
    }
}

/// Result of a ray query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub entity: Entity,
    pub point: Vec3,
    /// Surface normal, facing back along the ray.
    pub normal: Vec3,
    pub distance: f32,
}

impl RayHit {
    fn new(entity: Entity, origin: Vec3, direction: Dir3, distance: f32, normal: Vec3) -> Self {
        let normal = if normal.dot(direction.as_vec3()) > 0.0 {
            -normal
        } else {
            normal
        };
        Self {
            entity,
            point: origin + direction.as_vec3() * distance,
            normal,
            distance,
        }
    }
}

/// Ray query against the scene.
pub trait RayQuery {
    /// Nearest hit along `direction`, skipping any entity in `ignore`.
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Dir3,
        max_distance: f32,
        ignore: &[Entity],
    ) -> Option<RayHit>;

    /// Entity registered as the walkable ground, if any.
    fn ground(&self) -> Option<Entity>;
}

/// Shape overlap query against solid obstacles. The ground never counts.
pub trait OverlapQuery {
    /// First obstacle intersecting `shape` at the given pose, skipping any
    /// entity in `ignore`.
    fn overlapping(
        &self,
        shape: &Collider,
        position: Vec3,
        rotation: Quat,
        ignore: &[Entity],
    ) -> Option<Entity>;
}

/// Registration of solid obstacles.
pub trait ColliderRegistry {
    fn add_obstacle(&mut self, entity: Entity, collider: Collider, position: Vec3, rotation: Quat);
}

/// Queries answered by avian's [`SpatialQuery`].
pub struct SpatialWorld<'a, 'w, 's> {
    query: &'a SpatialQuery<'w, 's>,
    ground: Option<Entity>,
}

impl<'a, 'w, 's> SpatialWorld<'a, 'w, 's> {
    pub fn new(query: &'a SpatialQuery<'w, 's>, ground: Option<Entity>) -> Self {
        Self { query, ground }
    }
}

impl RayQuery for SpatialWorld<'_, '_, '_> {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Dir3,
        max_distance: f32,
        ignore: &[Entity],
    ) -> Option<RayHit> {
        let filter = SpatialQueryFilter::default().with_excluded_entities(ignore.iter().copied());
        self.query
            .cast_ray(origin, direction, max_distance, true, &filter)
            .map(|hit| RayHit::new(hit.entity, origin, direction, hit.distance, hit.normal))
    }

    fn ground(&self) -> Option<Entity> {
        self.ground
    }
}

impl OverlapQuery for SpatialWorld<'_, '_, '_> {
    fn overlapping(
        &self,
        shape: &Collider,
        position: Vec3,
        rotation: Quat,
        ignore: &[Entity],
    ) -> Option<Entity> {
        let excluded = ignore.iter().copied().chain(self.ground);
        let filter = SpatialQueryFilter::default().with_excluded_entities(excluded);
        self.query
            .shape_intersections(shape, position, rotation, &filter)
            .into_iter()
            .next()
    }
}

#[derive(Clone)]
struct PlacedCollider {
    entity: Entity,
    collider: Collider,
    position: Vec3,
    rotation: Quat,
}

/// Colliders tested one by one, without a broad phase.
///
/// The ground sits at the origin with no rotation; obstacles are appended
/// during placement and never move.
#[derive(Default, Clone)]
pub struct ColliderSet {
    ground: Option<(Entity, Collider)>,
    obstacles: Vec<PlacedCollider>,
}

impl ColliderSet {
    pub fn with_ground(entity: Entity, collider: Collider) -> Self {
        Self {
            ground: Some((entity, collider)),
            obstacles: Vec::new(),
        }
    }

    pub fn obstacle_count(&self) -> usize {
        self.obstacles.len()
    }

    pub fn is_obstacle(&self, entity: Entity) -> bool {
        self.obstacles.iter().any(|placed| placed.entity == entity)
    }
}

impl ColliderRegistry for ColliderSet {
    fn add_obstacle(&mut self, entity: Entity, collider: Collider, position: Vec3, rotation: Quat) {
        self.obstacles.push(PlacedCollider {
            entity,
            collider,
            position,
            rotation,
        });
    }
}

impl RayQuery for ColliderSet {
    fn cast_ray(
        &self,
        origin: Vec3,
        direction: Dir3,
        max_distance: f32,
        ignore: &[Entity],
    ) -> Option<RayHit> {
        let ground = self
            .ground
            .iter()
            .map(|(entity, collider)| (*entity, collider, Vec3::ZERO, Quat::IDENTITY));
        let obstacles = self
            .obstacles
            .iter()
            .map(|placed| (placed.entity, &placed.collider, placed.position, placed.rotation));

        ground
            .chain(obstacles)
            .filter(|(entity, ..)| !ignore.contains(entity))
            .filter_map(|(entity, collider, position, rotation)| {
                let (distance, normal) = collider.cast_ray(
                    Position(position),
                    Rotation(rotation),
                    origin,
                    direction.as_vec3(),
                    max_distance,
                    true,
                )?;
                Some(RayHit::new(entity, origin, direction, distance, normal))
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn ground(&self) -> Option<Entity> {
        self.ground.as_ref().map(|(entity, _)| *entity)
    }
}

impl OverlapQuery for ColliderSet {
    fn overlapping(
        &self,
        shape: &Collider,
        position: Vec3,
        rotation: Quat,
        ignore: &[Entity],
    ) -> Option<Entity> {
        self.obstacles
            .iter()
            .filter(|placed| !ignore.contains(&placed.entity))
            .find(|placed| {
                contact_query::intersection_test(
                    shape,
                    Position(position),
                    Rotation(rotation),
                    &placed.collider,
                    Position(placed.position),
                    Rotation(placed.rotation),
                )
                .unwrap_or(false)
            })
            .map(|placed| placed.entity)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_4;

    use super::*;
    use crate::config::TerrainConfig;
    use crate::world::terrain::{BuildStep, TerrainBuilder};

    fn flat_ground(y: f32) -> Collider {
        Collider::trimesh(
            vec![
                Vec3::new(-10.0, y, -10.0),
                Vec3::new(10.0, y, -10.0),
                Vec3::new(-10.0, y, 10.0),
                Vec3::new(10.0, y, 10.0),
            ],
            vec![[0, 2, 1], [1, 2, 3]],
        )
    }

    fn world() -> (ColliderSet, Entity, Entity) {
        let ground = Entity::from_raw(1);
        let rock = Entity::from_raw(2);
        let mut world = ColliderSet::with_ground(ground, flat_ground(0.0));
        world.add_obstacle(
            rock,
            Collider::cuboid(1.0, 1.0, 1.0),
            Vec3::new(3.0, 0.5, 0.0),
            Quat::IDENTITY,
        );
        (world, ground, rock)
    }

    #[test]
    fn nearest_hit_wins() {
        let (world, ground, rock) = world();
        let hit = world
            .cast_ray(Vec3::new(3.0, 10.0, 0.0), Dir3::NEG_Y, 20.0, &[])
            .unwrap();
        assert_eq!(hit.entity, rock);
        assert!((hit.point.y - 1.0).abs() < 1e-4);
        assert!((hit.normal - Vec3::Y).length() < 1e-4);

        let hit = world
            .cast_ray(Vec3::new(-3.0, 10.0, 0.0), Dir3::NEG_Y, 20.0, &[])
            .unwrap();
        assert_eq!(hit.entity, ground);
        assert!((hit.normal - Vec3::Y).length() < 1e-4);
    }

    #[test]
    fn ignored_entities_are_transparent() {
        let (world, ground, rock) = world();
        let hit = world
            .cast_ray(Vec3::new(3.0, 10.0, 0.0), Dir3::NEG_Y, 20.0, &[rock])
            .unwrap();
        assert_eq!(hit.entity, ground);
        assert!(world
            .cast_ray(Vec3::new(-3.0, 10.0, 0.0), Dir3::NEG_Y, 20.0, &[ground])
            .is_none());
    }

    #[test]
    fn overlap_finds_obstacles_only() {
        let (world, _, rock) = world();
        let body = Collider::cuboid(1.2, 1.2, 1.2);
        let touching = Vec3::new(2.0, 0.5, 0.0);
        assert_eq!(world.overlapping(&body, touching, Quat::IDENTITY, &[]), Some(rock));
        assert_eq!(world.overlapping(&body, touching, Quat::IDENTITY, &[rock]), None);

        // Sitting on the ground is not a collision.
        let clear = Vec3::new(-3.0, 0.5, 0.0);
        assert_eq!(world.overlapping(&body, clear, Quat::IDENTITY, &[]), None);
    }

    #[test]
    fn rotated_rock_blocks_with_its_corner() {
        let ground = Entity::from_raw(1);
        let rock = Entity::from_raw(2);
        let mut world = ColliderSet::with_ground(ground, flat_ground(0.0));
        world.add_obstacle(
            rock,
            Collider::cuboid(1.0, 1.0, 1.0),
            Vec3::new(3.0, 0.5, 0.0),
            Quat::from_rotation_y(FRAC_PI_4),
        );
        // The unrotated face would sit at x = 2.5; the corner reaches x = 2.29.
        let sliver = Collider::cuboid(0.3, 0.3, 0.3);
        assert_eq!(
            world.overlapping(&sliver, Vec3::new(2.2, 0.5, 0.0), Quat::IDENTITY, &[]),
            Some(rock)
        );
    }

    #[test]
    fn rays_through_shared_grid_vertices_and_edges_hit_the_ground() {
        let config = TerrainConfig {
            size: 100.0,
            segments: 20,
            vertices_per_frame: 10_000,
            seed: Some(4),
        };
        let mut builder = TerrainBuilder::new(&config, 4).unwrap();
        let mesh = loop {
            if let BuildStep::Committed(mesh) = builder.tick() {
                break mesh;
            }
        };
        let ground = Entity::from_raw(1);
        let world = ColliderSet::with_ground(ground, mesh.to_collider());

        let width = mesh.segments() as usize + 1;
        let half_cell = mesh.cell_size() * 0.5;
        let positions = mesh.positions();
        for row in 1..width - 1 {
            for col in 1..width - 1 {
                let vertex = positions[row * width + col];
                let right = positions[row * width + col + 1];
                let targets = [
                    (vertex.x, vertex.z, vertex.y),
                    // Shared edge midway to the next vertex in the row.
                    (vertex.x + half_cell, vertex.z, (vertex.y + right.y) * 0.5),
                    (vertex.x - 1e-5, vertex.z + 1e-5, vertex.y),
                ];
                for (x, z, y) in targets {
                    let hit = world
                        .cast_ray(Vec3::new(x, 100.0, z), Dir3::NEG_Y, 200.0, &[])
                        .unwrap_or_else(|| panic!("ray at ({x}, {z}) missed the ground"));
                    assert_eq!(hit.entity, ground);
                    assert!((hit.point.y - y).abs() < 1e-2, "({x}, {z}): {} vs {y}", hit.point.y);
                }
            }
        }
    }
}
