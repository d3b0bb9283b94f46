//! The drivable rover: assembly, keyboard input, and per-frame driving.

use std::f32::consts::FRAC_PI_2;

use avian3d::prelude::*;
use bevy::prelude::*;

use crate::config::{RoverConfig, SimConfig};
use crate::game_state::AppState;
use crate::physics::{OverlapQuery, RayQuery, SpatialWorld};
use crate::world::Ground;

pub mod controller;
pub mod parts;

pub use controller::{DriveInput, DriveOutcome, VehicleController, VehicleState};
pub use parts::{PartMap, PartMapError, PartRole, DEFAULT_PART_NAMES};

pub struct RoverPlugin;

impl Plugin for RoverPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<CollisionAlert>()
            .add_systems(OnEnter(AppState::Driving), spawn_rover)
            .add_systems(
                Update,
                (read_drive_input, drive_rover, animate_wheels, report_collisions)
                    .chain()
                    .run_if(in_state(AppState::Driving)),
            );
    }
}

/// Root of the rover hierarchy.
#[derive(Component)]
pub struct Rover;

/// Wheel slot of a wheel entity.
#[derive(Component, Clone, Copy, Debug)]
pub struct Wheel {
    pub index: usize,
}

/// Sent every frame the rover is blocked by an obstacle.
#[derive(Event, Clone, Copy, Debug)]
pub struct CollisionAlert {
    pub rover: Entity,
    pub obstacle: Entity,
}

const BODY_COLOR: Color = Color::srgb(0.85, 0.85, 0.82);
const WHEEL_COLOR: Color = Color::srgb(0.12, 0.12, 0.12);

/// Cylinders are built along Y; lay them on their side.
fn wheel_base_rotation() -> Quat {
    Quat::from_rotation_z(FRAC_PI_2)
}

fn spawn_rover(
    mut commands: Commands,
    config: Res<SimConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let rover = &config.rover;
    let root = commands
        .spawn((
            Rover,
            Name::new("Rover"),
            Transform::from_translation(rover.spawn_position),
            Visibility::default(),
        ))
        .id();

    let mut nodes = Vec::with_capacity(DEFAULT_PART_NAMES.len());
    let body_size = rover.body_half_extents * 2.0;
    let body = commands
        .spawn((
            Name::new("Body"),
            Mesh3d(meshes.add(Cuboid::new(body_size.x, body_size.y, body_size.z))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: BODY_COLOR,
                metallic: 0.3,
                perceptual_roughness: 0.5,
                ..default()
            })),
            Transform::default(),
        ))
        .set_parent(root)
        .id();
    nodes.push((body, "Body"));

    let wheel_mesh = meshes.add(Cylinder::new(rover.wheel_radius, rover.wheel_width));
    let wheel_material = materials.add(StandardMaterial {
        base_color: WHEEL_COLOR,
        perceptual_roughness: 0.95,
        ..default()
    });
    for (index, offset) in rover.wheel_offsets.iter().enumerate() {
        let Some(name) = parts::part_name(PartRole::Wheel(index)) else {
            continue;
        };
        let wheel = commands
            .spawn((
                Wheel { index },
                Name::new(name),
                Mesh3d(wheel_mesh.clone()),
                MeshMaterial3d(wheel_material.clone()),
                Transform::from_translation(*offset).with_rotation(wheel_base_rotation()),
            ))
            .set_parent(body)
            .id();
        nodes.push((wheel, name));
    }

    commands.entity(root).insert((
        assemble_controller(rover, root, nodes),
        VehicleState::at(rover.spawn_position),
        DriveInput::default(),
    ));

    info!("Rover spawned at {}", rover.spawn_position);
}

/// Controller for a freshly spawned rover. A rejected config or unresolved
/// parts leave it inert.
fn assemble_controller(
    config: &RoverConfig,
    root: Entity,
    nodes: Vec<(Entity, &str)>,
) -> VehicleController {
    if let Err(err) = config.validate() {
        error!("Rover config rejected, vehicle will stay put: {err}");
        return VehicleController::new(config.clone(), root, None);
    }
    let parts = match PartMap::resolve(nodes, DEFAULT_PART_NAMES) {
        Ok(parts) => Some(parts),
        Err(err) => {
            warn!("Rover parts unresolved, vehicle will stay put: {err}");
            None
        }
    };
    VehicleController::new(config.clone(), root, parts)
}

fn read_drive_input(keys: Res<ButtonInput<KeyCode>>, mut rovers: Query<&mut DriveInput, With<Rover>>) {
    let held = |a: KeyCode, b: KeyCode| keys.pressed(a) || keys.pressed(b);
    let input = DriveInput::from_keys(
        held(KeyCode::ArrowUp, KeyCode::KeyW),
        held(KeyCode::ArrowDown, KeyCode::KeyS),
        held(KeyCode::ArrowLeft, KeyCode::KeyA),
        held(KeyCode::ArrowRight, KeyCode::KeyD),
    );
    for mut drive in &mut rovers {
        *drive = input;
    }
}

fn drive_rover(
    time: Res<Time>,
    spatial: SpatialQuery,
    grounds: Query<Entity, With<Ground>>,
    mut rovers: Query<
        (
            Entity,
            &VehicleController,
            &DriveInput,
            &mut VehicleState,
            &mut Transform,
        ),
        With<Rover>,
    >,
    mut alerts: EventWriter<CollisionAlert>,
) {
    let world = SpatialWorld::new(&spatial, grounds.get_single().ok());
    let dt = time.delta_secs();
    for (entity, controller, input, mut state, mut transform) in &mut rovers {
        let alert = drive(entity, controller, *input, &mut state, &mut transform, dt, &world);
        if let Some(alert) = alert {
            alerts.send(alert);
        }
    }
}

/// One controller step, mirrored onto the rover's transform.
fn drive<W>(
    rover: Entity,
    controller: &VehicleController,
    input: DriveInput,
    state: &mut VehicleState,
    transform: &mut Transform,
    dt: f32,
    world: &W,
) -> Option<CollisionAlert>
where
    W: RayQuery + OverlapQuery,
{
    let outcome = controller.step(state, input, dt, world);
    transform.translation = state.position;
    transform.rotation = state.orientation;
    outcome
        .blocked_by
        .map(|obstacle| CollisionAlert { rover, obstacle })
}

fn animate_wheels(
    config: Res<SimConfig>,
    rovers: Query<(&VehicleController, &VehicleState), With<Rover>>,
    mut wheels: Query<(&Wheel, &mut Transform)>,
) {
    let roll_axis = config.rover.wheel_roll_axis.normalize_or(Vec3::NEG_X);
    for (controller, state) in &rovers {
        let Some(parts) = controller.parts() else {
            continue;
        };
        for entity in parts.wheels.iter().flatten() {
            let Ok((wheel, mut transform)) = wheels.get_mut(*entity) else {
                continue;
            };
            let angle = state.wheel_angles.get(wheel.index).copied().unwrap_or_default();
            transform.rotation = Quat::from_axis_angle(roll_axis, angle) * wheel_base_rotation();
        }
    }
}

/// Logs once per contact episode; an episode ends on the first clear frame.
fn report_collisions(mut alerts: EventReader<CollisionAlert>, mut in_contact: Local<bool>) {
    match alerts.read().last() {
        Some(alert) => {
            if !*in_contact {
                warn!("Collision! {:?} hit obstacle {:?}", alert.rover, alert.obstacle);
            }
            *in_contact = true;
        }
        None => *in_contact = false,
    }
}
