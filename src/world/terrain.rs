//! Incremental height-field terrain generation.
//!
//! The terrain is built over several frames so the render loop never stalls:
//! vertices are sampled from layered Perlin noise in fixed-size batches, then
//! the grid is triangulated, normals are computed, and the finished mesh is
//! committed to the ground entity. Each of those phases runs on its own frame.

use avian3d::prelude::*;
use bevy::pbr::NotShadowCaster;
use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;
use noise::{NoiseFn, Perlin};
use rand::Rng;

use crate::config::{ConfigError, SimConfig, TerrainConfig};
use crate::game_state::AppState;

use super::Ground;

pub struct TerrainPlugin;

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<TerrainReady>()
            .add_systems(OnEnter(AppState::GeneratingTerrain), start_terrain_generation)
            .add_systems(
                Update,
                advance_terrain_build.run_if(
                    in_state(AppState::GeneratingTerrain).and(resource_exists::<TerrainBuilder>),
                ),
            );
    }
}

/// Sent once, on the frame the terrain mesh is committed.
#[derive(Event)]
pub struct TerrainReady {
    pub ground: Entity,
    pub triangles: usize,
}

const OCTAVES: usize = 4;
const BASE_AMPLITUDE: f64 = 12.0;
const AMPLITUDE_GAIN: f64 = 0.4;
const FREQUENCY_GAIN: f64 = 2.5;
/// Base frequency is this many noise periods across the whole terrain.
const BASE_PERIODS: f64 = 2.5;

/// Layered 2-D Perlin noise producing terrain elevation.
#[derive(Clone)]
pub struct HeightNoise {
    perlin: Perlin,
    base_frequency: f64,
}

impl HeightNoise {
    pub fn new(seed: u32, terrain_size: f32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            base_frequency: BASE_PERIODS / terrain_size as f64,
        }
    }

    /// Elevation at a world-space `(x, z)`.
    pub fn sample(&self, x: f32, z: f32) -> f32 {
        let (x, z) = (x as f64, z as f64);
        let mut height = 0.0;
        let mut frequency = self.base_frequency;
        let mut amplitude = BASE_AMPLITUDE;
        for _ in 0..OCTAVES {
            height += self.perlin.get([x * frequency, z * frequency]) * amplitude;
            frequency *= FREQUENCY_GAIN;
            amplitude *= AMPLITUDE_GAIN;
        }
        height as f32
    }
}

/// Height-field mesh over a square grid centered on the origin.
#[derive(Clone, Debug)]
pub struct TerrainMesh {
    segments: u32,
    size: f32,
    positions: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    normals: Vec<Vec3>,
}

impl TerrainMesh {
    pub fn new(segments: u32, size: f32) -> Self {
        let expected = Self::vertex_count_for(segments);
        Self {
            segments,
            size,
            positions: Vec::with_capacity(expected),
            triangles: Vec::new(),
            normals: Vec::new(),
        }
    }

    /// Number of vertices in a grid with `segments` cells per side.
    pub fn vertex_count_for(segments: u32) -> usize {
        let width = segments as usize + 1;
        width * width
    }

    pub fn segments(&self) -> u32 {
        self.segments
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn cell_size(&self) -> f32 {
        self.size / self.segments as f32
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// World-space `(x, z)` of the grid vertex at linear index `i`.
    pub fn grid_point(&self, index: usize) -> (f32, f32) {
        let width = self.segments as usize + 1;
        let row = index / width;
        let col = index % width;
        let half = self.segments as f32 / 2.0;
        let cell = self.cell_size();
        ((col as f32 - half) * cell, (row as f32 - half) * cell)
    }

    fn push_vertex(&mut self, position: Vec3) {
        self.positions.push(position);
    }

    /// Split every grid cell into two triangles. Replaces any previous set.
    pub fn triangulate(&mut self) {
        let segments = self.segments;
        let width = segments + 1;
        self.triangles.clear();
        self.triangles.reserve(2 * (segments * segments) as usize);
        for row in 0..segments {
            for col in 0..segments {
                let i = row * width + col;
                self.triangles.push([i, i + 1, i + width]);
                self.triangles.push([i + 1, i + width + 1, i + width]);
            }
        }
    }

    /// Smooth per-vertex normals from the area-weighted sum of adjacent faces.
    pub fn generate_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for &[a, b, c] in &self.triangles {
            let (a, b, c) = (a as usize, b as usize, c as usize);
            let pa = self.positions[a];
            // Grid triangles wind clockwise seen from above.
            let face = (self.positions[c] - pa).cross(self.positions[b] - pa);
            normals[a] += face;
            normals[b] += face;
            normals[c] += face;
        }
        for normal in &mut normals {
            *normal = normal.normalize_or(Vec3::Y);
        }
        self.normals = normals;
    }

    /// Triangles flipped to counter-clockwise, facing up.
    fn front_faces(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.triangles.iter().map(|&[a, b, c]| [a, c, b])
    }

    /// Render mesh for Bevy.
    pub fn to_render_mesh(&self) -> Mesh {
        let positions: Vec<[f32; 3]> = self.positions.iter().map(|p| p.to_array()).collect();
        let normals: Vec<[f32; 3]> = self.normals.iter().map(|n| n.to_array()).collect();
        let indices: Vec<u32> = self.front_faces().flatten().collect();

        let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
        mesh.insert_indices(Indices::U32(indices));
        mesh
    }

    /// Static trimesh collider over the same triangles as the render mesh.
    pub fn to_collider(&self) -> Collider {
        Collider::trimesh(self.positions.clone(), self.front_faces().collect())
    }
}

/// Phases of terrain construction, in order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BuildPhase {
    AccumulatingVertices,
    Triangulating,
    ComputingNormals,
    Committing,
    Done,
}

impl BuildPhase {
    pub fn label(self) -> &'static str {
        match self {
            BuildPhase::AccumulatingVertices => "Generating vertices",
            BuildPhase::Triangulating => "Building triangles",
            BuildPhase::ComputingNormals => "Computing normals",
            BuildPhase::Committing => "Finalizing",
            BuildPhase::Done => "Done",
        }
    }
}

/// Fraction of vertices generated, with decile-throttled reporting.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenerationProgress {
    fraction: f32,
    last_reported_decile: Option<u32>,
}

impl GenerationProgress {
    pub fn fraction(&self) -> f32 {
        self.fraction
    }

    /// Record a new fraction. Returns the whole percentage when it enters a
    /// decile that has not been reported yet.
    fn update(&mut self, fraction: f32) -> Option<u32> {
        self.fraction = self.fraction.max(fraction);
        let percent = (self.fraction * 100.0) as u32;
        let decile = percent / 10;
        if self.last_reported_decile.is_some_and(|last| decile <= last) {
            return None;
        }
        self.last_reported_decile = Some(decile);
        Some(percent)
    }
}

/// What a single [`TerrainBuilder::tick`] did.
#[derive(Debug)]
pub enum BuildStep {
    Accumulated {
        completed: usize,
        total: usize,
        /// Percentage to report, when a new decile was reached.
        report: Option<u32>,
    },
    Triangulated {
        triangles: usize,
    },
    NormalsComputed,
    /// The finished mesh, handed over exactly once.
    Committed(TerrainMesh),
    Idle,
}

/// Frame-sliced terrain generator.
#[derive(Resource)]
pub struct TerrainBuilder {
    noise: HeightNoise,
    mesh: Option<TerrainMesh>,
    phase: BuildPhase,
    next_vertex: usize,
    total_vertices: usize,
    vertices_per_frame: usize,
    progress: GenerationProgress,
}

impl TerrainBuilder {
    pub fn new(config: &TerrainConfig, seed: u32) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            noise: HeightNoise::new(seed, config.size),
            mesh: Some(TerrainMesh::new(config.segments, config.size)),
            phase: BuildPhase::AccumulatingVertices,
            next_vertex: 0,
            total_vertices: TerrainMesh::vertex_count_for(config.segments),
            vertices_per_frame: config.vertices_per_frame,
            progress: GenerationProgress::default(),
        })
    }

    pub fn phase(&self) -> BuildPhase {
        self.phase
    }

    pub fn progress(&self) -> GenerationProgress {
        self.progress
    }

    /// Mesh under construction; `None` once committed.
    pub fn mesh(&self) -> Option<&TerrainMesh> {
        self.mesh.as_ref()
    }

    /// Run one step of the current phase and advance to the next phase.
    pub fn tick(&mut self) -> BuildStep {
        let Some(mesh) = self.mesh.as_mut() else {
            self.phase = BuildPhase::Done;
            return BuildStep::Idle;
        };

        match self.phase {
            BuildPhase::AccumulatingVertices => {
                let end = (self.next_vertex + self.vertices_per_frame).min(self.total_vertices);
                for index in self.next_vertex..end {
                    let (x, z) = mesh.grid_point(index);
                    mesh.push_vertex(Vec3::new(x, self.noise.sample(x, z), z));
                }
                self.next_vertex = end;

                let report = self
                    .progress
                    .update(self.next_vertex as f32 / self.total_vertices as f32);
                if self.next_vertex == self.total_vertices {
                    self.phase = BuildPhase::Triangulating;
                }
                BuildStep::Accumulated {
                    completed: self.next_vertex,
                    total: self.total_vertices,
                    report,
                }
            }
            BuildPhase::Triangulating => {
                mesh.triangulate();
                self.phase = BuildPhase::ComputingNormals;
                BuildStep::Triangulated {
                    triangles: mesh.triangles().len(),
                }
            }
            BuildPhase::ComputingNormals => {
                mesh.generate_normals();
                self.phase = BuildPhase::Committing;
                BuildStep::NormalsComputed
            }
            BuildPhase::Committing => {
                self.phase = BuildPhase::Done;
                match self.mesh.take() {
                    Some(mesh) => BuildStep::Committed(mesh),
                    None => BuildStep::Idle,
                }
            }
            BuildPhase::Done => BuildStep::Idle,
        }
    }
}

fn start_terrain_generation(mut commands: Commands, config: Res<SimConfig>) {
    let seed = config
        .terrain
        .seed
        .unwrap_or_else(|| rand::thread_rng().gen_range(1..=1000));

    match TerrainBuilder::new(&config.terrain, seed) {
        Ok(builder) => {
            info!(
                "Starting progressive terrain generation ({} segments, {:.0}m, seed {})",
                config.terrain.segments, config.terrain.size, seed
            );
            commands.insert_resource(builder);
            commands.spawn((
                Ground,
                Name::new("Ground"),
                Transform::default(),
                Visibility::default(),
            ));
        }
        Err(err) => error!("Terrain generation not started: {err}"),
    }
}

const GROUND_COLOR: Color = Color::srgb(0.353, 0.416, 0.478);

fn advance_terrain_build(
    mut commands: Commands,
    mut builder: ResMut<TerrainBuilder>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut ready: EventWriter<TerrainReady>,
    mut next_state: ResMut<NextState<AppState>>,
    ground_query: Query<Entity, With<Ground>>,
) {
    match builder.tick() {
        BuildStep::Accumulated { report, .. } => {
            if let Some(percent) = report {
                info!("Terrain generation: {percent}%");
            }
        }
        BuildStep::Triangulated { triangles } => {
            debug!("Finalizing terrain: {triangles} triangles");
        }
        BuildStep::NormalsComputed => debug!("Finalizing terrain: normals computed"),
        BuildStep::Committed(mesh) => {
            let Ok(ground) = ground_query.get_single() else {
                error!("Terrain finished but no ground entity exists");
                return;
            };
            let triangles = mesh.triangles().len();
            commands.entity(ground).insert((
                RigidBody::Static,
                mesh.to_collider(),
                Mesh3d(meshes.add(mesh.to_render_mesh())),
                MeshMaterial3d(materials.add(StandardMaterial {
                    base_color: GROUND_COLOR,
                    perceptual_roughness: 0.95,
                    ..default()
                })),
                NotShadowCaster,
            ));
            ready.send(TerrainReady { ground, triangles });
            next_state.set(AppState::PlacingObstacles);
            info!("Terrain generated ({triangles} triangles)");
        }
        BuildStep::Idle => {}
    }
}
