//! Demonstrates threat indicators with `bevy_threat_indicator`.
//!
//! - Press Space to throw a grenade from a spot circling the arena
//! - Walls are occluders: grenades behind them lose their indicator
//! - Press 'L' to toggle the line-of-sight requirement
//! - Press 'D' to toggle distance text
//! - Press 'R' to restart the session, which disposes every tracker

use std::f32::consts::TAU;

use bevy::color::palettes::css::DARK_SLATE_GRAY;
use bevy::color::palettes::css::OLIVE;
use bevy::prelude::*;
use bevy_panorbit_camera::PanOrbitCamera;
use bevy_panorbit_camera::PanOrbitCameraPlugin;
use bevy_threat_indicator::prelude::*;

const GRAVITY: f32 = -9.81;
const GRENADE_RADIUS: f32 = 0.15;
const FUSE_SECS: f32 = 4.0;
const THROW_RING_RADIUS: f32 = 18.0;
const THROW_SPEED: f32 = 9.0;
const THROW_LIFT: f32 = 6.0;
const BOUNCE_DAMPING: f32 = 0.4;
const HELP_FONT_SIZE: f32 = 14.0;

#[derive(Component)]
struct Grenade {
    velocity:  Vec3,
    fuse_secs: f32,
}

#[derive(Resource, Default)]
struct ThrowCounter(u32);

#[derive(Resource)]
struct GrenadeAssets {
    mesh:     Handle<Mesh>,
    material: Handle<StandardMaterial>,
}

fn main() {
    App::new()
        .add_plugins((
            DefaultPlugins,
            PanOrbitCameraPlugin,
            ThreatIndicatorPlugin,
            ThreatVisualizationPlugin,
        ))
        .init_resource::<ThrowCounter>()
        .add_systems(Startup, setup)
        .add_systems(
            Update,
            (throw_grenade, tick_grenades, toggle_options, restart_session)
                .before(ThreatIndicatorSystems::Track),
        )
        .add_observer(log_tracking_begin)
        .add_observer(log_tracking_end)
        .run();
}

fn setup(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    commands.spawn((
        PanOrbitCamera {
            radius: Some(25.0),
            pitch: Some(0.5),
            ..default()
        },
        IndicatorCamera,
        Transform::from_xyz(0.0, 12.0, 25.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        DirectionalLight {
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 10.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    commands.spawn((
        Mesh3d(meshes.add(Plane3d::default().mesh().size(60.0, 60.0))),
        MeshMaterial3d(materials.add(Color::from(DARK_SLATE_GRAY))),
    ));

    let wall_mesh = meshes.add(Cuboid::new(8.0, 4.0, 0.5));
    let wall_material = materials.add(Color::from(OLIVE));
    for angle in [0.0, TAU / 3.0, 2.0 * TAU / 3.0] {
        let rotation = Quat::from_rotation_y(angle);
        commands.spawn((
            Mesh3d(wall_mesh.clone()),
            MeshMaterial3d(wall_material.clone()),
            Transform::from_translation(rotation * Vec3::new(0.0, 2.0, -8.0))
                .with_rotation(rotation),
            Occluder::new(OcclusionLayers::TERRAIN),
            Name::new("Wall"),
        ));
    }

    commands.insert_resource(GrenadeAssets {
        mesh:     meshes.add(Sphere::new(GRENADE_RADIUS)),
        material: materials.add(Color::srgb(0.2, 0.25, 0.2)),
    });

    commands.spawn((ThreatSession, ThreatEventSource, Name::new("Session")));

    commands.spawn((
        Text::new("Space: throw | L: line of sight | D: distance text | R: restart session"),
        TextFont {
            font_size: HELP_FONT_SIZE,
            ..default()
        },
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            bottom: Val::Px(12.0),
            ..default()
        },
    ));
}

fn throw_grenade(
    mut commands: Commands,
    keys: Res<ButtonInput<KeyCode>>,
    assets: Res<GrenadeAssets>,
    mut counter: ResMut<ThrowCounter>,
    source_query: Query<Entity, With<ThreatEventSource>>,
) {
    if !keys.just_pressed(KeyCode::Space) {
        return;
    }
    let Ok(source) = source_query.single() else {
        return;
    };

    counter.0 += 1;
    let angle = counter.0 as f32 * 0.7;
    let position = Quat::from_rotation_y(angle) * Vec3::new(0.0, 1.5, THROW_RING_RADIUS);
    let velocity = (-position.with_y(0.0)).normalize_or_zero() * THROW_SPEED + Vec3::Y * THROW_LIFT;

    let threat = commands
        .spawn((
            Mesh3d(assets.mesh.clone()),
            MeshMaterial3d(assets.material.clone()),
            Transform::from_translation(position),
            Grenade {
                velocity,
                fuse_secs: FUSE_SECS,
            },
            Name::new("Grenade"),
        ))
        .id();

    commands.trigger(ThreatThrown::new(source, threat, position, velocity));
}

fn tick_grenades(
    mut commands: Commands,
    time: Res<Time>,
    mut grenade_query: Query<(Entity, &mut Grenade, &mut Transform)>,
) {
    let dt = time.delta_secs();
    for (entity, mut grenade, mut transform) in &mut grenade_query {
        grenade.fuse_secs -= dt;
        if grenade.fuse_secs <= 0.0 {
            commands.trigger(ThreatDestroyed::new(entity));
            commands.entity(entity).despawn();
            continue;
        }

        grenade.velocity.y += GRAVITY * dt;
        transform.translation += grenade.velocity * dt;
        if transform.translation.y < GRENADE_RADIUS {
            transform.translation.y = GRENADE_RADIUS;
            grenade.velocity.y = -grenade.velocity.y * BOUNCE_DAMPING;
            grenade.velocity.x *= 1.0 - BOUNCE_DAMPING;
            grenade.velocity.z *= 1.0 - BOUNCE_DAMPING;
        }
    }
}

fn toggle_options(keys: Res<ButtonInput<KeyCode>>, mut config: ResMut<ThreatIndicatorConfig>) {
    if keys.just_pressed(KeyCode::KeyL) {
        config.require_line_of_sight = !config.require_line_of_sight;
        info!("Line of sight required: {}", config.require_line_of_sight);
    }
    if keys.just_pressed(KeyCode::KeyD) {
        config.show_distance = !config.show_distance;
        info!("Distance text: {}", config.show_distance);
    }
}

fn restart_session(
    mut commands: Commands,
    keys: Res<ButtonInput<KeyCode>>,
    session_query: Query<Entity, With<ThreatSession>>,
) {
    if !keys.just_pressed(KeyCode::KeyR) {
        return;
    }
    for session in &session_query {
        commands.entity(session).despawn();
    }
    commands.spawn((ThreatSession, ThreatEventSource, Name::new("Session")));
}

fn log_tracking_begin(begin: On<TrackingBegin>) {
    info!("Tracking {} with label {}", begin.threat, begin.label);
}

fn log_tracking_end(end: On<TrackingEnd>) {
    info!("Stopped tracking {}", end.threat);
}
