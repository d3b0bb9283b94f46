//! Scene lighting and sky.

use bevy::pbr::CascadeShadowConfigBuilder;
use bevy::prelude::*;

use crate::config::SimConfig;

pub struct RenderPlugin;

impl Plugin for RenderPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ClearColor(SKY_COLOR))
            .add_systems(Startup, setup_lighting);
    }
}

const SKY_COLOR: Color = Color::srgb(0.62, 0.7, 0.78);

/// Marker for the sun light.
#[derive(Component)]
pub struct Sun;

fn setup_lighting(mut commands: Commands, config: Res<SimConfig>) {
    commands.insert_resource(AmbientLight {
        color: Color::srgb(0.85, 0.9, 1.0),
        brightness: 400.0,
    });

    // Cascades sized to the terrain; the first one covers the chase view.
    let extent = config.terrain.size;
    commands.spawn((
        DirectionalLight {
            illuminance: 12_000.0,
            shadows_enabled: true,
            shadow_depth_bias: 0.3,
            shadow_normal_bias: 1.8,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(
            EulerRot::XYZ,
            -std::f32::consts::FRAC_PI_3,
            std::f32::consts::FRAC_PI_4,
            0.0,
        )),
        CascadeShadowConfigBuilder {
            num_cascades: 3,
            minimum_distance: 0.1,
            maximum_distance: extent * 1.5,
            first_cascade_far_bound: 40.0,
            overlap_proportion: 0.3,
        }
        .build(),
        Sun,
        Name::new("Sun"),
    ));
}
