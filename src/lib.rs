//! RoverX Lab - procedural terrain sandbox with a drivable rover.
//!
//! The terrain is generated a slice at a time so the window stays
//! responsive, rocks are scattered over it, and a kinematic rover follows
//! the surface while the player drives.

pub mod camera;
pub mod config;
pub mod game_state;
pub mod physics;
pub mod render;
pub mod rover;
pub mod ui;
pub mod world;
