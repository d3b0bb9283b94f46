//! World content: the generated ground and the obstacles scattered on it.

use bevy::prelude::*;

pub mod obstacles;
pub mod terrain;

pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(terrain::TerrainPlugin)
            .add_plugins(obstacles::ObstaclePlugin);
    }
}

/// Marker for the terrain surface entity.
#[derive(Component)]
pub struct Ground;
