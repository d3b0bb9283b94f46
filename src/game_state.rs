//! Application flow.
//!
//! The scene is assembled in three stages, each entered only after the
//! previous one has finished: the terrain is built over several frames, the
//! obstacles are scattered in a single frame, then the rover is spawned and
//! driven until exit.

use bevy::app::AppExit;
use bevy::prelude::*;

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.init_state::<AppState>()
            .add_systems(Update, quit_on_escape)
            .add_systems(OnEnter(AppState::Driving), announce_driving);
    }
}

/// High-level stage controlling which systems run.
#[derive(States, Default, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum AppState {
    /// Terrain mesh is being built incrementally.
    #[default]
    GeneratingTerrain,
    /// Terrain is committed; obstacles are being placed.
    PlacingObstacles,
    /// Rover is live.
    Driving,
}

fn quit_on_escape(keys: Res<ButtonInput<KeyCode>>, mut exit: EventWriter<AppExit>) {
    if keys.just_pressed(KeyCode::Escape) {
        info!("Escape pressed, exiting");
        exit.send(AppExit::Success);
    }
}

fn announce_driving() {
    info!("Scene ready. Arrows or WASD to drive, Esc to quit");
}
