//! Minimal HUD: generation progress, driving status, collision alerts.

use bevy::prelude::*;

use crate::config::SimConfig;
use crate::game_state::AppState;
use crate::rover::{CollisionAlert, Rover, VehicleState};
use crate::world::terrain::{BuildPhase, TerrainBuilder};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (setup_progress_panel, setup_hud))
            .add_systems(
                Update,
                update_progress_panel.run_if(resource_exists::<TerrainBuilder>),
            )
            .add_systems(OnEnter(AppState::Driving), hide_progress_panel)
            .add_systems(
                Update,
                (update_status_line, update_collision_banner).run_if(in_state(AppState::Driving)),
            );
    }
}

/// Seconds a collision alert stays on screen after the last contact.
const ALERT_SECONDS: f32 = 1.5;

const PANEL_BG: Color = Color::srgba(0.03, 0.04, 0.05, 0.85);
const BAR_TRACK: Color = Color::srgb(0.2, 0.2, 0.22);
const BAR_FILL: Color = Color::srgb(0.0, 0.5, 1.0);
const TEXT_COLOR: Color = Color::srgb(0.85, 0.9, 0.95);
const MUTED_TEXT: Color = Color::srgb(0.6, 0.66, 0.7);
const ALERT_COLOR: Color = Color::srgb(1.0, 0.35, 0.25);

#[derive(Component)]
struct ProgressPanel;

#[derive(Component)]
struct ProgressFill;

#[derive(Component)]
struct ProgressLabel;

#[derive(Component)]
struct StatusText;

/// Alert text, visible while `remaining` is positive.
#[derive(Component, Default)]
struct CollisionBanner {
    remaining: f32,
}

/// Caption under the progress bar.
pub fn progress_caption(phase: BuildPhase, fraction: f32) -> String {
    match phase {
        BuildPhase::AccumulatingVertices => {
            format!("{}... {}%", phase.label(), (fraction * 100.0) as u32)
        }
        BuildPhase::Done => "Placing obstacles...".to_string(),
        _ => format!("{}...", phase.label()),
    }
}

fn setup_progress_panel(mut commands: Commands) {
    commands
        .spawn((
            Node {
                position_type: PositionType::Absolute,
                bottom: Val::Percent(45.0),
                left: Val::Percent(10.0),
                width: Val::Percent(80.0),
                padding: UiRect::all(Val::Px(10.0)),
                row_gap: Val::Px(8.0),
                flex_direction: FlexDirection::Column,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(PANEL_BG),
            ProgressPanel,
        ))
        .with_children(|panel| {
            panel.spawn((
                Text::new("Generating terrain..."),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(TEXT_COLOR),
                ProgressLabel,
            ));
            panel
                .spawn((
                    Node {
                        width: Val::Percent(100.0),
                        height: Val::Px(14.0),
                        ..default()
                    },
                    BackgroundColor(BAR_TRACK),
                ))
                .with_children(|track| {
                    track.spawn((
                        Node {
                            width: Val::Percent(0.0),
                            height: Val::Percent(100.0),
                            ..default()
                        },
                        BackgroundColor(BAR_FILL),
                        ProgressFill,
                    ));
                });
        });
}

fn setup_hud(mut commands: Commands) {
    commands
        .spawn(Node {
            position_type: PositionType::Absolute,
            top: Val::Px(10.0),
            left: Val::Px(10.0),
            row_gap: Val::Px(4.0),
            flex_direction: FlexDirection::Column,
            ..default()
        })
        .with_children(|parent| {
            parent.spawn((
                Text::new("ROVERX LAB"),
                TextFont {
                    font_size: 18.0,
                    ..default()
                },
                TextColor(TEXT_COLOR),
            ));
            parent.spawn((
                Text::new("Arrows/WASD drive | Q/E orbit | R reset view | Scroll zoom | Esc quit"),
                TextFont {
                    font_size: 13.0,
                    ..default()
                },
                TextColor(MUTED_TEXT),
            ));
            parent.spawn((
                Text::new(""),
                TextFont {
                    font_size: 13.0,
                    ..default()
                },
                TextColor(TEXT_COLOR),
                StatusText,
            ));
            parent.spawn((
                Text::new(""),
                TextFont {
                    font_size: 20.0,
                    ..default()
                },
                TextColor(ALERT_COLOR),
                CollisionBanner::default(),
            ));
        });
}

fn update_progress_panel(
    builder: Res<TerrainBuilder>,
    mut fill: Query<&mut Node, With<ProgressFill>>,
    mut label: Query<&mut Text, With<ProgressLabel>>,
) {
    if !builder.is_changed() {
        return;
    }
    let fraction = builder.progress().fraction();
    for mut node in &mut fill {
        node.width = Val::Percent(fraction * 100.0);
    }
    for mut text in &mut label {
        **text = progress_caption(builder.phase(), fraction);
    }
}

fn hide_progress_panel(mut panels: Query<&mut Visibility, With<ProgressPanel>>) {
    for mut visibility in &mut panels {
        *visibility = Visibility::Hidden;
    }
}

fn update_status_line(
    config: Res<SimConfig>,
    rovers: Query<&VehicleState, With<Rover>>,
    mut status: Query<&mut Text, With<StatusText>>,
) {
    let Ok(state) = rovers.get_single() else {
        return;
    };
    let forward = state.orientation * config.rover.forward_axis;
    let heading = forward.x.atan2(-forward.z).to_degrees().rem_euclid(360.0);
    let p = state.position;
    for mut text in &mut status {
        **text = format!("POS {:7.1} {:6.1} {:7.1}  HDG {:5.1}", p.x, p.y, p.z, heading);
    }
}

fn update_collision_banner(
    time: Res<Time>,
    mut alerts: EventReader<CollisionAlert>,
    mut banners: Query<(&mut Text, &mut CollisionBanner)>,
) {
    let hit = alerts.read().count() > 0;
    for (mut text, mut banner) in &mut banners {
        if hit {
            if banner.remaining <= 0.0 {
                **text = "COLLISION".to_string();
            }
            banner.remaining = ALERT_SECONDS;
        } else if banner.remaining > 0.0 {
            banner.remaining -= time.delta_secs();
            if banner.remaining <= 0.0 {
                **text = String::new();
            }
        }
    }
}
