//! Kinematic rover integration.
//!
//! Each frame runs the same fixed sequence: yaw from input, ground sensing
//! (follow the surface, or fall when nothing is below), a tentative move
//! that is rolled back when the body would overlap an obstacle, and finally
//! cosmetic wheel spin. Ground-follow and collision rollback are independent
//! corrections; there is no force solver.

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::config::RoverConfig;
use crate::physics::{OverlapQuery, RayQuery};

use super::parts::{PartMap, WHEEL_COUNT};

/// Held-key input for one frame, each axis in `[-1, 1]`.
#[derive(Component, Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveInput {
    /// Forward minus backward.
    pub throttle: f32,
    /// Left minus right.
    pub turn: f32,
}

impl DriveInput {
    pub fn from_keys(forward: bool, backward: bool, left: bool, right: bool) -> Self {
        let axis = |pos: bool, neg: bool| pos as i8 as f32 - neg as i8 as f32;
        Self {
            throttle: axis(forward, backward),
            turn: axis(left, right),
        }
    }
}

/// Pose of the rover, owned by the controller.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct VehicleState {
    pub position: Vec3,
    /// Always a unit quaternion.
    pub orientation: Quat,
    /// Wheel spin angles in radians, by wheel slot.
    pub wheel_angles: [f32; WHEEL_COUNT],
}

impl VehicleState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
            wheel_angles: [0.0; WHEEL_COUNT],
        }
    }
}

/// What happened during one step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveOutcome {
    /// The ground ray found the terrain.
    pub grounded: bool,
    /// The tentative move was kept.
    pub moving: bool,
    /// Obstacle that blocked the tentative move.
    pub blocked_by: Option<Entity>,
}

/// Per-frame rover integrator.
#[derive(Component, Clone, Debug)]
pub struct VehicleController {
    config: RoverConfig,
    parts: Option<PartMap>,
    ignore: Vec<Entity>,
    body_shape: Collider,
}

impl VehicleController {
    /// Controller for a rover whose parts resolved to `parts`. Without a
    /// body every step is a no-op.
    pub fn new(config: RoverConfig, root: Entity, parts: Option<PartMap>) -> Self {
        let ignore = match &parts {
            Some(parts) => std::iter::once(root).chain(parts.entities()).collect(),
            None => vec![root],
        };
        let size = config.body_half_extents * 2.0;
        Self {
            body_shape: Collider::cuboid(size.x, size.y, size.z),
            config,
            parts,
            ignore,
        }
    }

    pub fn is_active(&self) -> bool {
        self.parts.is_some()
    }

    pub fn parts(&self) -> Option<&PartMap> {
        self.parts.as_ref()
    }

    pub fn forward(&self, state: &VehicleState) -> Vec3 {
        state.orientation * self.config.forward_axis
    }

    /// Advance `state` by `dt` seconds.
    pub fn step<W>(&self, state: &mut VehicleState, input: DriveInput, dt: f32, world: &W) -> DriveOutcome
    where
        W: RayQuery + OverlapQuery,
    {
        if self.parts.is_none() {
            return DriveOutcome::default();
        }
        let config = &self.config;
        let mut outcome = DriveOutcome::default();

        // Yaw around the rover's own up axis.
        let yaw = (input.turn * config.rotation_speed * dt * config.yaw_sign).to_radians();
        state.orientation = (state.orientation * Quat::from_rotation_y(yaw)).normalize();

        // Ground sensing.
        let origin = state.position + Vec3::Y * config.ground_probe_lift;
        let hit = world
            .cast_ray(origin, Dir3::NEG_Y, config.ground_probe_range, &self.ignore)
            .filter(|hit| world.ground() == Some(hit.entity));
        match hit {
            Some(hit) => {
                outcome.grounded = true;
                let target_y = hit.point.y + config.ride_height;
                let t = (config.terrain_follow_smoothness * dt).min(1.0);
                state.position.y += (target_y - state.position.y) * t;

                if let Some(target) = self.surface_aligned(state.orientation, hit.normal) {
                    let t = (config.terrain_adaptation_smoothness * dt).min(1.0);
                    state.orientation = state.orientation.slerp(target, t).normalize();
                }
            }
            None => state.position.y -= config.gravity_strength * dt,
        }

        // Tentative move, reverted on contact.
        if input.throttle != 0.0 {
            let before = state.position;
            state.position += self.forward(state) * input.throttle * config.speed * dt;
            match world.overlapping(
                &self.body_shape,
                state.position,
                state.orientation,
                &self.ignore,
            ) {
                Some(obstacle) => {
                    state.position = before;
                    outcome.blocked_by = Some(obstacle);
                }
                None => outcome.moving = true,
            }
        }

        if outcome.moving {
            let spin = (input.throttle * config.wheel_spin_rate * dt).to_radians();
            for angle in &mut state.wheel_angles {
                *angle = (*angle + spin) % std::f32::consts::TAU;
            }
        }

        outcome
    }

    /// Orientation keeping the current heading with `normal` as up.
    fn surface_aligned(&self, orientation: Quat, normal: Vec3) -> Option<Quat> {
        let up = normal.try_normalize()?;
        let forward = orientation * self.config.forward_axis;
        let heading = forward.reject_from_normalized(up).try_normalize()?;
        let back = -heading;
        let right = up.cross(back);
        let basis = Quat::from_mat3(&Mat3::from_cols(right, up, back));
        let model_to_neg_z =
            Quat::from_rotation_arc(self.config.forward_axis.try_normalize()?, Vec3::NEG_Z);
        Some((basis * model_to_neg_z).normalize())
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;
    use crate::physics::{ColliderRegistry, ColliderSet};
    use crate::rover::parts::{PartMap, DEFAULT_PART_NAMES};

    const ROOT: Entity = Entity::from_raw(1);
    const GROUND: Entity = Entity::from_raw(50);
    const ROCK: Entity = Entity::from_raw(60);

    fn plane(y: f32, tilt: f32) -> Collider {
        // Square plane, optionally sloped along x by `tilt` (rise over run).
        let h = |x: f32| y + x * tilt;
        Collider::trimesh(
            vec![
                Vec3::new(-50.0, h(-50.0), -50.0),
                Vec3::new(50.0, h(50.0), -50.0),
                Vec3::new(-50.0, h(-50.0), 50.0),
                Vec3::new(50.0, h(50.0), 50.0),
            ],
            vec![[0, 2, 1], [1, 2, 3]],
        )
    }

    /// Ground plus unit cube rocks centered on `rocks`.
    fn world_with(ground: Option<Collider>, rocks: &[Vec3]) -> ColliderSet {
        let mut world = match ground {
            Some(ground) => ColliderSet::with_ground(GROUND, ground),
            None => ColliderSet::default(),
        };
        for (i, center) in rocks.iter().enumerate() {
            world.add_obstacle(
                Entity::from_raw(60 + i as u32),
                Collider::cuboid(1.0, 1.0, 1.0),
                *center,
                Quat::IDENTITY,
            );
        }
        world
    }

    fn controller(config: RoverConfig) -> VehicleController {
        let nodes = [(Entity::from_raw(2), "Body"), (Entity::from_raw(3), "Wheel_FL")];
        let parts = PartMap::resolve(nodes, DEFAULT_PART_NAMES).unwrap();
        VehicleController::new(config, ROOT, Some(parts))
    }

    const FORWARD: DriveInput = DriveInput {
        throttle: 1.0,
        turn: 0.0,
    };

    #[test]
    fn drives_forward_on_open_ground() {
        let rover = controller(RoverConfig::default());
        let world = world_with(Some(plane(0.0, 0.0)), &[]);
        let mut state = VehicleState::at(Vec3::new(0.0, 0.7, 0.0));

        let outcome = rover.step(&mut state, FORWARD, 0.1, &world);

        assert!(outcome.grounded && outcome.moving);
        assert_eq!(outcome.blocked_by, None);
        assert!((state.position - Vec3::new(0.0, 0.7, -0.7)).length() < 1e-5);
    }

    #[test]
    fn obstacle_in_path_rolls_back_exactly() {
        let rover = controller(RoverConfig::default());
        let rock = Vec3::new(0.0, 0.7, -2.2);
        let world = world_with(Some(plane(0.0, 0.0)), &[rock]);
        let start = Vec3::new(0.0, 0.7, 0.0);
        let mut state = VehicleState::at(start);

        let outcome = rover.step(&mut state, FORWARD, 0.1, &world);

        assert_eq!(outcome.blocked_by, Some(ROCK));
        assert!(!outcome.moving);
        assert_eq!(state.position, start);
        assert_eq!(state.wheel_angles, [0.0; WHEEL_COUNT]);
    }

    #[test]
    fn rock_behind_does_not_block_forward_motion() {
        let rover = controller(RoverConfig::default());
        let rock = Vec3::new(0.0, 0.7, 2.2);
        let world = world_with(Some(plane(0.0, 0.0)), &[rock]);
        let mut state = VehicleState::at(Vec3::new(0.0, 0.7, 0.0));

        let outcome = rover.step(&mut state, FORWARD, 0.1, &world);
        assert!(outcome.moving);
    }

    #[test]
    fn turned_body_is_tested_in_its_own_orientation() {
        let rover = controller(RoverConfig::default());
        // Beside the rover: clear of the 0.75 half width, inside the 1.25 half length.
        let rock = Vec3::new(1.6, 0.7, 0.0);
        let world = world_with(Some(plane(0.0, 0.0)), &[rock]);

        let mut state = VehicleState::at(Vec3::new(0.0, 0.7, 0.0));
        let creep = DriveInput {
            throttle: 0.01,
            turn: 0.0,
        };
        assert!(rover.step(&mut state, creep, 0.1, &world).moving);

        let mut turned = VehicleState::at(Vec3::new(0.0, 0.7, 0.0));
        turned.orientation = Quat::from_rotation_y(FRAC_PI_2);
        let outcome = rover.step(&mut turned, creep, 0.1, &world);
        assert_eq!(outcome.blocked_by, Some(ROCK));
    }

    #[test]
    fn height_converges_without_overshoot() {
        let rover = controller(RoverConfig::default());
        let world = world_with(Some(plane(2.0, 0.0)), &[]);
        let target = 2.7;
        let mut state = VehicleState::at(Vec3::new(0.0, 6.0, 0.0));

        let mut gap = state.position.y - target;
        for _ in 0..60 {
            rover.step(&mut state, DriveInput::default(), 1.0 / 60.0, &world);
            let next_gap = state.position.y - target;
            assert!(next_gap >= -1e-4 && next_gap <= gap + 1e-6);
            gap = next_gap;
        }
        assert!(gap < 0.01);
    }

    #[test]
    fn falls_at_constant_rate_without_ground() {
        let config = RoverConfig::default();
        let rover = controller(config.clone());
        let world = world_with(None, &[]);
        let dt = 0.05;
        let mut state = VehicleState::at(Vec3::new(0.0, 30.0, 0.0));

        for frame in 1..=8 {
            let outcome = rover.step(&mut state, DriveInput::default(), dt, &world);
            assert!(!outcome.grounded);
            let expected = 30.0 - config.gravity_strength * dt * frame as f32;
            assert!((state.position.y - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn ground_out_of_probe_range_means_falling() {
        let rover = controller(RoverConfig::default());
        let world = world_with(Some(plane(0.0, 0.0)), &[]);
        // Probe starts 2 above and reaches 10, so ground 25 below is missed.
        let mut state = VehicleState::at(Vec3::new(0.0, 25.0, 0.0));
        let outcome = rover.step(&mut state, DriveInput::default(), 0.1, &world);
        assert!(!outcome.grounded);
        assert!(state.position.y < 25.0);
    }

    #[test]
    fn yaw_follows_rotation_speed() {
        let config = RoverConfig::default();
        let rover = controller(config.clone());
        let world = world_with(Some(plane(0.0, 0.0)), &[]);
        let mut state = VehicleState::at(Vec3::new(0.0, 0.7, 0.0));
        let left = DriveInput {
            throttle: 0.0,
            turn: 1.0,
        };

        rover.step(&mut state, left, 0.2, &world);

        let forward = rover.forward(&state);
        let heading = forward.z.atan2(forward.x).to_degrees();
        // Forward starts along -Z (-90 deg); turning left swings it toward -X.
        let expected = -90.0 - config.rotation_speed * 0.2;
        assert!((heading - expected).abs() < 1e-3);
    }

    #[test]
    fn tilts_toward_the_slope_and_stays_unit_length() {
        let rover = controller(RoverConfig::default());
        let world = world_with(Some(plane(0.0, 0.5)), &[]);
        let mut state = VehicleState::at(Vec3::new(0.0, 0.7, 0.0));
        let slope_normal = Vec3::new(-0.5, 1.0, 0.0).normalize();

        let mut previous = (state.orientation * Vec3::Y).dot(slope_normal);
        for _ in 0..120 {
            rover.step(&mut state, DriveInput::default(), 1.0 / 60.0, &world);
            assert!(state.orientation.is_normalized());
            let alignment = (state.orientation * Vec3::Y).dot(slope_normal);
            assert!(alignment >= previous - 1e-5);
            previous = alignment;
        }
        assert!(previous > 0.99);
    }

    #[test]
    fn wheels_spin_only_while_moving() {
        let config = RoverConfig::default();
        let rover = controller(config.clone());
        let world = world_with(Some(plane(0.0, 0.0)), &[]);
        let mut state = VehicleState::at(Vec3::new(0.0, 0.7, 0.0));

        rover.step(&mut state, DriveInput::default(), 0.1, &world);
        assert_eq!(state.wheel_angles, [0.0; WHEEL_COUNT]);

        rover.step(&mut state, FORWARD, 0.1, &world);
        let expected = (config.wheel_spin_rate * 0.1).to_radians();
        for angle in state.wheel_angles {
            assert!((angle - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn missing_body_leaves_state_untouched() {
        let rover = VehicleController::new(RoverConfig::default(), ROOT, None);
        let world = world_with(None, &[]);
        let mut state = VehicleState::at(Vec3::new(1.0, 5.0, 2.0));
        let before = state.clone();

        let outcome = rover.step(&mut state, FORWARD, 0.5, &world);

        assert!(!rover.is_active());
        assert_eq!(outcome, DriveOutcome::default());
        assert_eq!(state, before);
    }

    #[test]
    fn keys_map_to_signed_axes() {
        assert_eq!(
            DriveInput::from_keys(true, false, false, true),
            DriveInput {
                throttle: 1.0,
                turn: -1.0
            }
        );
        assert_eq!(DriveInput::from_keys(true, true, true, true), DriveInput::default());
    }
}
