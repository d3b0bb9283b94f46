//! RoverX Lab - procedural terrain sandbox with a drivable rover.

use bevy::prelude::*;

use roverx_lab::config::SimConfig;
use roverx_lab::{camera, game_state, physics, render, rover, ui, world};

fn main() {
    // Force Vulkan backend on Windows (DX12 causes crashes on some systems)
    #[cfg(target_os = "windows")]
    std::env::set_var("WGPU_BACKEND", "vulkan");

    let mut app = App::new();
    app.add_plugins(DefaultPlugins.set(WindowPlugin {
        primary_window: Some(Window {
            title: "RoverX Lab".into(),
            resolution: (1280., 720.).into(),
            ..default()
        }),
        ..default()
    }));

    // Read after the log plugin is up so override warnings are visible.
    app.insert_resource(SimConfig::from_env())
        .add_systems(Startup, report_config)
        // App flow
        .add_plugins(game_state::GameStatePlugin)
        // Core plugins
        .add_plugins(physics::CollisionPlugin)
        .add_plugins(camera::CameraPlugin)
        .add_plugins(render::RenderPlugin)
        // Terrain and obstacles
        .add_plugins(world::WorldPlugin)
        // Vehicle
        .add_plugins(rover::RoverPlugin)
        // HUD
        .add_plugins(ui::UiPlugin)
        .run();
}

fn report_config(config: Res<SimConfig>) {
    match config.validate() {
        Ok(()) => info!(
            "Configuration: terrain {}m / {} segments, {} obstacles",
            config.terrain.size, config.terrain.segments, config.obstacles.count
        ),
        Err(err) => error!("Invalid configuration: {err}"),
    }
}
