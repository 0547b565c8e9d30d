//! Line-of-sight queries against occluder volumes.
//!
//! An occluder is any entity with [`Occluder`], an [`Aabb`] and a `GlobalTransform`. Mesh
//! entities get their `Aabb` computed by Bevy, so tagging level geometry is enough. The
//! ray test runs in each box's local space, so rotated and scaled boxes are handled.

use std::ops::BitOr;

use bevy::camera::primitives::Aabb;
use bevy::prelude::*;

/// Named collision layers, as a bit set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Reflect)]
pub struct OcclusionLayers(u32);

impl OcclusionLayers {
    pub const NONE: Self = Self(0);
    pub const TERRAIN: Self = Self(1 << 0);
    pub const HIGH_DETAIL: Self = Self(1 << 1);
    pub const PROPS: Self = Self(1 << 2);
    pub const ALL: Self = Self(u32::MAX);

    pub const fn from_bits(bits: u32) -> Self { Self(bits) }

    pub const fn bits(self) -> u32 { self.0 }

    pub const fn intersects(self, other: Self) -> bool { self.0 & other.0 != 0 }
}

impl Default for OcclusionLayers {
    fn default() -> Self { Self::TERRAIN }
}

impl BitOr for OcclusionLayers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self { Self(self.0 | rhs.0) }
}

/// Marks a collision volume that can hide threats from the viewpoint
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Occluder {
    pub layers: OcclusionLayers,
}

impl Occluder {
    pub const fn new(layers: OcclusionLayers) -> Self { Self { layers } }
}

/// Returns true if the segment `start..end` passes through the box.
///
/// A segment that starts inside the box does not count as a hit, matching physics ray
/// casts which ignore the collider they originate in.
pub fn segment_hits_box(start: Vec3, end: Vec3, aabb: &Aabb, transform: &GlobalTransform) -> bool {
    let to_local = transform.affine().inverse();
    let local_start = to_local.transform_point3(start);
    let local_end = to_local.transform_point3(end);
    let delta = local_end - local_start;

    let min = Vec3::from(aabb.min());
    let max = Vec3::from(aabb.max());

    if local_start.cmpge(min).all() && local_start.cmple(max).all() {
        return false;
    }

    let mut t_enter = 0.0_f32;
    let mut t_exit = 1.0_f32;

    for axis in 0..3 {
        let origin = local_start[axis];
        let span = delta[axis];

        // Parallel to this slab: must already be between its planes
        if span.abs() < f32::EPSILON {
            if origin < min[axis] || origin > max[axis] {
                return false;
            }
            continue;
        }

        let inv = span.recip();
        let t0 = (min[axis] - origin) * inv;
        let t1 = (max[axis] - origin) * inv;
        t_enter = t_enter.max(t0.min(t1));
        t_exit = t_exit.min(t0.max(t1));

        if t_enter > t_exit {
            return false;
        }
    }

    true
}

/// Returns true if any occluder on `mask` blocks the view from `origin` to `target`
pub fn line_of_sight_blocked<'a>(
    origin: Vec3,
    target: Vec3,
    occluders: impl IntoIterator<Item = (&'a Occluder, &'a Aabb, &'a GlobalTransform)>,
    mask: OcclusionLayers,
) -> bool {
    if origin.distance_squared(target) <= f32::EPSILON {
        return false;
    }

    occluders
        .into_iter()
        .filter(|(occluder, _, _)| occluder.layers.intersects(mask))
        .any(|(_, aabb, transform)| segment_hits_box(origin, target, aabb, transform))
}
