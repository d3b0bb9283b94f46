//! Perspective chase camera with zoom and orbit controls.
//!
//! Before the rover exists the camera holds an overview of the whole
//! terrain; once the rover is spawned it trails behind and above it.

use bevy::{
    core_pipeline::tonemapping::Tonemapping,
    input::mouse::MouseWheel,
    pbr::{DistanceFog, FogFalloff},
    prelude::*,
};

use crate::config::{CameraConfig, SimConfig};
use crate::rover::{Rover, VehicleState};

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera)
            .add_systems(Update, (camera_zoom, camera_orbit, follow_rover).chain());
    }
}

/// Main camera state.
#[derive(Component)]
pub struct ChaseCamera {
    /// Multiplier on the configured follow distance and height.
    pub zoom: f32,
    /// Orbit around the rover in radians, 0 is straight behind.
    pub orbit: f32,
}

impl Default for ChaseCamera {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            orbit: 0.0,
        }
    }
}

const MIN_ZOOM: f32 = 0.1;
const MAX_ZOOM: f32 = 3.0;

/// Where the camera wants to be for a rover at `position` facing `forward`.
pub fn chase_eye(config: &CameraConfig, position: Vec3, forward: Vec3, camera: &ChaseCamera) -> Vec3 {
    let flat = Vec3::new(forward.x, 0.0, forward.z).normalize_or(Vec3::NEG_Z);
    let behind = Quat::from_rotation_y(camera.orbit) * -flat;
    position + (behind * config.distance + Vec3::Y * config.height) * camera.zoom
}

fn setup_camera(mut commands: Commands, config: Res<SimConfig>) {
    let size = config.terrain.size;
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, size * 0.6, size * 0.9).looking_at(Vec3::ZERO, Vec3::Y),
        DistanceFog {
            color: Color::srgba(0.62, 0.7, 0.78, 1.0),
            falloff: FogFalloff::Linear {
                start: size * 0.75,
                end: size * 2.0,
            },
            directional_light_color: Color::srgba(1.0, 0.9, 0.75, 0.3),
            directional_light_exponent: 12.0,
        },
        Tonemapping::TonyMcMapface,
        ChaseCamera::default(),
    ));
}

fn camera_zoom(mut query: Query<&mut ChaseCamera>, mut scroll_events: EventReader<MouseWheel>) {
    let scroll: f32 = scroll_events.read().map(|e| e.y).sum();
    if scroll == 0.0 {
        return;
    }

    for mut camera in &mut query {
        camera.zoom = (camera.zoom - scroll * 0.1).clamp(MIN_ZOOM, MAX_ZOOM);
    }
}

fn camera_orbit(mut query: Query<&mut ChaseCamera>, keys: Res<ButtonInput<KeyCode>>, time: Res<Time>) {
    let rotation_speed = 1.5;
    let mut rotation_delta = 0.0;

    if keys.pressed(KeyCode::KeyQ) {
        rotation_delta -= rotation_speed * time.delta_secs();
    }
    if keys.pressed(KeyCode::KeyE) {
        rotation_delta += rotation_speed * time.delta_secs();
    }
    if keys.just_pressed(KeyCode::KeyR) {
        for mut camera in &mut query {
            *camera = ChaseCamera::default();
        }
        return;
    }

    if rotation_delta != 0.0 {
        for mut camera in &mut query {
            camera.orbit = (camera.orbit + rotation_delta) % std::f32::consts::TAU;
        }
    }
}

fn follow_rover(
    config: Res<SimConfig>,
    time: Res<Time>,
    rovers: Query<&VehicleState, With<Rover>>,
    mut cameras: Query<(&mut Transform, &ChaseCamera)>,
) {
    let Ok(state) = rovers.get_single() else {
        return;
    };
    let forward = state.orientation * config.rover.forward_axis;
    let t = (config.camera.follow_smoothness * time.delta_secs()).min(1.0);

    for (mut transform, camera) in &mut cameras {
        let eye = chase_eye(&config.camera, state.position, forward, camera);
        transform.translation = transform.translation.lerp(eye, t);
        transform.look_at(state.position, Vec3::Y);
    }
}
