//! On-screen rendering of indicator labels and threat trails
//!
//! Labels are absolutely positioned UI text nodes mirrored from [`AnnotationDrawList`].
//! Each trail carries its own retained [`Gizmo`], styled once from the trail's
//! [`TrailSettings`] and rebuilt from its points every frame.

use bevy::camera::visibility::RenderLayers;
use bevy::prelude::*;

use crate::ThreatIndicatorSystems;
use crate::annotation::AnnotationDrawList;
use crate::annotation::LabelDraw;
use crate::components::IndicatorCamera;
use crate::trail::ThreatTrail;
use crate::trail::TrailSettings;

/// Gizmo line width in pixels per meter of trail width, measured one meter from the camera
const TRAIL_PIXELS_PER_METER: f32 = 100.0;

/// UI node mirroring one drawn annotation
#[derive(Component, Reflect)]
#[reflect(Component)]
struct AnnotationLabelNode {
    annotation: Entity,
}

/// Plugin that renders indicator labels and trails
pub struct ThreatVisualizationPlugin;

impl Plugin for ThreatVisualizationPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (attach_trail_gizmos, rebuild_trail_gizmos)
                .chain()
                .after(ThreatIndicatorSystems::Track),
        )
        .add_systems(
            PostUpdate,
            sync_label_nodes.after(ThreatIndicatorSystems::Draw),
        );
    }
}

/// Line style for a trail, taken from the settings it was created with
fn trail_line_config(settings: &TrailSettings) -> GizmoLineConfig {
    GizmoLineConfig {
        width: settings.width * TRAIL_PIXELS_PER_METER,
        perspective: true,
        ..default()
    }
}

/// Gives each new trail a gizmo on the indicator camera's render layers
fn attach_trail_gizmos(
    mut commands: Commands,
    mut gizmo_assets: ResMut<Assets<GizmoAsset>>,
    camera_query: Query<Option<&RenderLayers>, With<IndicatorCamera>>,
    trail_query: Query<(Entity, &ThreatTrail), Without<Gizmo>>,
) {
    let render_layers = camera_query.single().ok().flatten();

    for (entity, trail) in &trail_query {
        let mut trail_commands = commands.entity(entity);
        trail_commands.try_insert(Gizmo {
            handle:      gizmo_assets.add(GizmoAsset::new()),
            line_config: trail_line_config(trail.settings()),
            ..default()
        });
        if let Some(layers) = render_layers {
            trail_commands.try_insert(layers.clone());
        }
    }
}

/// Redraws every trail's points with their current fade
fn rebuild_trail_gizmos(
    time: Res<Time>,
    mut gizmo_assets: ResMut<Assets<GizmoAsset>>,
    mut trail_query: Query<(&ThreatTrail, &mut Gizmo)>,
) {
    let now = time.elapsed_secs();
    for (trail, mut gizmo) in &mut trail_query {
        let mut asset = GizmoAsset::new();
        if trail.len() >= 2 {
            let color = trail.settings().color;
            asset.linestrip_gradient(
                trail
                    .points()
                    .map(|point| (point.position, color.with_alpha(trail.fade(point, now)))),
            );
        }
        gizmo.handle = gizmo_assets.add(asset);
    }
}

fn label_node(draw: &LabelDraw) -> Node {
    Node {
        position_type: PositionType::Absolute,
        left: Val::Px(draw.rect.min.x),
        top: Val::Px(draw.rect.min.y),
        width: Val::Px(draw.rect.width()),
        height: Val::Px(draw.rect.height()),
        ..default()
    }
}

/// Updates, creates and despawns label nodes to match the latest draw list
fn sync_label_nodes(
    mut commands: Commands,
    draw_list: Res<AnnotationDrawList>,
    mut node_query: Query<(
        Entity,
        &AnnotationLabelNode,
        &mut Text,
        &mut TextFont,
        &mut TextColor,
        &mut Node,
    )>,
) {
    let mut existing = Vec::new();

    for (entity, label, mut text, mut font, mut text_color, mut node) in &mut node_query {
        let Some(draw) = draw_list
            .labels
            .iter()
            .find(|draw| draw.annotation == label.annotation)
        else {
            commands.entity(entity).despawn();
            continue;
        };

        if text.0 != draw.text {
            text.0.clone_from(&draw.text);
        }
        font.font_size = draw.font_size;
        text_color.0 = draw.color;
        *node = label_node(draw);
        existing.push(label.annotation);
    }

    for draw in &draw_list.labels {
        if existing.contains(&draw.annotation) {
            continue;
        }
        commands.spawn((
            Text::new(draw.text.clone()),
            TextFont {
                font_size: draw.font_size,
                ..default()
            },
            TextColor(draw.color),
            label_node(draw),
            AnnotationLabelNode {
                annotation: draw.annotation,
            },
            Name::new("Annotation label"),
        ));
    }
}
