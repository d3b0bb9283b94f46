//! Simulation configuration.
//!
//! All tunables live in one immutable [`SimConfig`] resource that is built
//! once at startup, validated, and handed to each component's constructor.

use bevy::prelude::*;
use thiserror::Error;

/// Environment variable overriding the terrain noise seed.
pub const SEED_ENV: &str = "ROVERX_SEED";
/// Environment variable overriding the terrain segment count.
pub const SEGMENTS_ENV: &str = "ROVERX_SEGMENTS";

/// Largest grid accepted. Keeps every vertex index well inside `u32`.
pub const MAX_SEGMENTS: u32 = 4096;

/// Invalid configuration detected before a component starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("terrain needs 1..={max} segments per side (got {0})", max = MAX_SEGMENTS)]
    Segments(u32),
    #[error("terrain size must be positive and finite (got {0})")]
    Size(f32),
    #[error("vertices per frame must be at least 1")]
    BatchSize,
    #[error("obstacle safe zone must be non-negative (got {0})")]
    SafeZone(f32),
    #[error("invalid obstacle {name} range {min}..{max}")]
    Range {
        name: &'static str,
        min: f32,
        max: f32,
    },
    #[error("{name} must be positive and finite (got {value})")]
    Rate { name: &'static str, value: f32 },
}

/// Terrain generation settings.
#[derive(Clone, Debug)]
pub struct TerrainConfig {
    /// World extent of one side of the terrain, in meters.
    pub size: f32,
    /// Grid segments per side.
    pub segments: u32,
    /// Vertices computed per frame while accumulating.
    pub vertices_per_frame: usize,
    /// Noise seed. `None` picks a fresh one every run.
    pub seed: Option<u32>,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            size: 200.0,
            segments: 40,
            vertices_per_frame: 2000,
            seed: None,
        }
    }
}

impl TerrainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_SEGMENTS).contains(&self.segments) {
            return Err(ConfigError::Segments(self.segments));
        }
        if !(self.size.is_finite() && self.size > 0.0) {
            return Err(ConfigError::Size(self.size));
        }
        if self.vertices_per_frame < 1 {
            return Err(ConfigError::BatchSize);
        }
        Ok(())
    }
}

/// Obstacle scattering settings.
#[derive(Clone, Debug)]
pub struct ObstacleConfig {
    pub count: usize,
    /// No obstacle is placed closer than this to the spawn point.
    pub safe_zone: f32,
    /// Sampling attempts before placement gives up.
    pub max_attempts: usize,
    pub min_scale: f32,
    pub max_scale: f32,
    /// How far an obstacle sinks into the ground, as a fraction of its scale.
    pub min_sink: f32,
    pub max_sink: f32,
    /// Seed for placement. `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self {
            count: 10,
            safe_zone: 20.0,
            max_attempts: 10_000,
            min_scale: 1.2,
            max_scale: 2.5,
            min_sink: 0.2,
            max_sink: 0.5,
            seed: None,
        }
    }
}

impl ObstacleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.safe_zone.is_finite() && self.safe_zone >= 0.0) {
            return Err(ConfigError::SafeZone(self.safe_zone));
        }
        check_range("scale", self.min_scale, self.max_scale)?;
        check_range("sink", self.min_sink, self.max_sink)?;
        if self.min_scale <= 0.0 {
            return Err(ConfigError::Range {
                name: "scale",
                min: self.min_scale,
                max: self.max_scale,
            });
        }
        Ok(())
    }
}

/// Rover driving and ground-following settings.
#[derive(Clone, Debug)]
pub struct RoverConfig {
    /// Forward speed in meters per second.
    pub speed: f32,
    /// Yaw rate in degrees per second.
    pub rotation_speed: f32,
    /// Fall speed applied while no ground is under the rover.
    pub gravity_strength: f32,
    pub terrain_follow_smoothness: f32,
    pub terrain_adaptation_smoothness: f32,
    pub ride_height: f32,
    pub spawn_position: Vec3,
    /// Ground ray starts this far above the rover.
    pub ground_probe_lift: f32,
    pub ground_probe_range: f32,
    /// Cosmetic wheel spin in degrees per second at full throttle.
    pub wheel_spin_rate: f32,
    pub body_half_extents: Vec3,
    /// Wheel hubs relative to the body: front-left, front-right, rear-left,
    /// rear-right.
    pub wheel_offsets: [Vec3; 4],
    pub wheel_radius: f32,
    pub wheel_width: f32,
    /// Local axis the model treats as forward.
    pub forward_axis: Vec3,
    /// Local axis wheels roll around.
    pub wheel_roll_axis: Vec3,
    /// +1 turns left on the left key, -1 flips it for mirrored assets.
    pub yaw_sign: f32,
}

impl Default for RoverConfig {
    fn default() -> Self {
        Self {
            speed: 7.0,
            rotation_speed: 75.0,
            gravity_strength: 0.4,
            terrain_follow_smoothness: 10.0,
            terrain_adaptation_smoothness: 5.0,
            ride_height: 0.7,
            spawn_position: Vec3::new(0.0, 25.0, 0.0),
            ground_probe_lift: 2.0,
            ground_probe_range: 10.0,
            wheel_spin_rate: 200.0,
            body_half_extents: Vec3::new(0.75, 0.25, 1.25),
            wheel_offsets: [
                Vec3::new(-0.85, -0.2, -0.8),
                Vec3::new(0.85, -0.2, -0.8),
                Vec3::new(-0.85, -0.2, 0.8),
                Vec3::new(0.85, -0.2, 0.8),
            ],
            wheel_radius: 0.3,
            wheel_width: 0.2,
            forward_axis: Vec3::NEG_Z,
            wheel_roll_axis: Vec3::NEG_X,
            yaw_sign: 1.0,
        }
    }
}

impl RoverConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("terrain follow smoothness", self.terrain_follow_smoothness),
            ("terrain adaptation smoothness", self.terrain_adaptation_smoothness),
            ("ground probe range", self.ground_probe_range),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Rate { name, value });
            }
        }
        if !(self.ride_height.is_finite() && self.ride_height >= 0.0) {
            return Err(ConfigError::Rate {
                name: "ride height",
                value: self.ride_height,
            });
        }
        Ok(())
    }
}

/// Chase camera settings.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Distance behind the rover.
    pub distance: f32,
    /// Height above the rover.
    pub height: f32,
    pub follow_smoothness: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            distance: 50.0,
            height: 7.0,
            follow_smoothness: 2.0,
        }
    }
}

/// Top-level configuration shared by every plugin.
#[derive(Resource, Clone, Debug, Default)]
pub struct SimConfig {
    pub terrain: TerrainConfig,
    pub obstacles: ObstacleConfig,
    pub rover: RoverConfig,
    pub camera: CameraConfig,
}

impl SimConfig {
    /// Defaults with `ROVERX_SEED` / `ROVERX_SEGMENTS` applied when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(
            std::env::var(SEED_ENV).ok().as_deref(),
            std::env::var(SEGMENTS_ENV).ok().as_deref(),
        );
        config
    }

    fn apply_overrides(&mut self, seed: Option<&str>, segments: Option<&str>) {
        if let Some(raw) = seed {
            match raw.trim().parse::<u32>() {
                Ok(seed) => self.terrain.seed = Some(seed),
                Err(err) => warn!("Ignoring {SEED_ENV}={raw:?}: {err}"),
            }
        }
        if let Some(raw) = segments {
            match raw.trim().parse::<u32>() {
                Ok(segments) => self.terrain.segments = segments,
                Err(err) => warn!("Ignoring {SEGMENTS_ENV}={raw:?}: {err}"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.terrain.validate()?;
        self.obstacles.validate()?;
        self.rover.validate()
    }
}

fn check_range(name: &'static str, min: f32, max: f32) -> Result<(), ConfigError> {
    if min.is_finite() && max.is_finite() && min <= max {
        Ok(())
    } else {
        Err(ConfigError::Range { name, min, max })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(SimConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_degenerate_terrain() {
        let mut terrain = TerrainConfig {
            segments: 0,
            ..default()
        };
        assert_eq!(terrain.validate(), Err(ConfigError::Segments(0)));

        terrain.segments = MAX_SEGMENTS + 1;
        assert_eq!(terrain.validate(), Err(ConfigError::Segments(MAX_SEGMENTS + 1)));
        terrain.segments = 65_536;
        assert_eq!(terrain.validate(), Err(ConfigError::Segments(65_536)));
        terrain.segments = MAX_SEGMENTS;
        assert_eq!(terrain.validate(), Ok(()));

        terrain.segments = 4;
        terrain.size = 0.0;
        assert_eq!(terrain.validate(), Err(ConfigError::Size(0.0)));

        terrain.size = 40.0;
        terrain.vertices_per_frame = 0;
        assert_eq!(terrain.validate(), Err(ConfigError::BatchSize));
    }

    #[test]
    fn rejects_inverted_scale_range() {
        let obstacles = ObstacleConfig {
            min_scale: 3.0,
            max_scale: 1.0,
            ..default()
        };
        assert!(matches!(
            obstacles.validate(),
            Err(ConfigError::Range { name: "scale", .. })
        ));
    }

    #[test]
    fn env_overrides_apply_and_bad_values_are_ignored() {
        let mut config = SimConfig::default();
        config.apply_overrides(Some("77"), Some("not-a-number"));
        assert_eq!(config.terrain.seed, Some(77));
        assert_eq!(config.terrain.segments, 40);
    }

    #[test]
    fn oversized_segment_override_fails_validation() {
        let mut config = SimConfig::default();
        config.apply_overrides(None, Some("70000"));
        assert_eq!(config.terrain.segments, 70_000);
        assert_eq!(config.validate(), Err(ConfigError::Segments(70_000)));
    }
}
