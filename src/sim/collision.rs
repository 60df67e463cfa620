//! Collision detection and resolution for axis-aligned boxes
//!
//! Everything here is a pure computation over entity extents: no allocation,
//! no failure paths. Degenerate (zero-size) boxes produce degenerate but
//! defined results rather than panics.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::entity::Entity;
use crate::aabb_corners;

/// Contact closer than this to an edge counts as flush, not penetrating.
/// Keeps a freshly snapped pair from re-classifying off float rounding.
const CONTACT_EPS: f32 = 1e-3;

/// Which edge of the stationary box the moving entity is penetrating.
///
/// `Right` means the entity's right edge has entered from the left, and so
/// on. At most one direction is ever reported for a pair: corner overlaps
/// inside the dead zone resolve to "no push" instead of double-resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Hit {
    Left,
    Right,
    Top,
    Bottom,
}

/// True iff the Euclidean distance between centers is within the summed radii
pub fn circles_intersect(a: &Entity, b: &Entity) -> bool {
    a.pos.distance(b.pos) <= a.radius + b.radius
}

/// Coarse AABB overlap test, recomputing each box from center and half-extent
pub fn boxes_intersect(a: &Entity, b: &Entity) -> bool {
    let (a_min, a_max) = aabb_corners(a.pos, a.width, a.height);
    let (b_min, b_max) = aabb_corners(b.pos, b.width, b.height);

    !(a_max.x < b_min.x || a_min.x > b_max.x || a_max.y < b_min.y || a_min.y > b_max.y)
}

/// Classify which single edge of `b` entity `a` is penetrating.
///
/// After the coarse overlap test, horizontal penetration only registers when
/// the contact edge is still `dead_zone` units short of `b`'s center line.
/// Checks run in a fixed order (right, left, bottom, top) and the first match
/// wins, so exactly one or zero directions come back. Flush contact inside
/// [`CONTACT_EPS`] is not penetration: a freshly snapped pair classifies
/// clear.
pub fn directional_intersect(a: &Entity, b: &Entity, dead_zone: f32) -> Option<Hit> {
    let (a_min, a_max) = aabb_corners(a.pos, a.width, a.height);
    let (b_min, b_max) = aabb_corners(b.pos, b.width, b.height);

    if a_max.x < b_min.x || a_min.x > b_max.x || a_max.y < b_min.y || a_min.y > b_max.y {
        return None;
    }

    let overlap_y = a_max.y > b_min.y && a_min.y < b_max.y;
    let overlap_x = a_min.x < b_max.x && a_max.x > b_min.x;

    if a_max.x > b_min.x + CONTACT_EPS && a_max.x < b.pos.x - dead_zone && overlap_y {
        return Some(Hit::Right);
    }
    if a_min.x < b_max.x - CONTACT_EPS && a_min.x > b.pos.x + dead_zone && overlap_y {
        return Some(Hit::Left);
    }
    if a_min.y < b_max.y - CONTACT_EPS && a_min.y > b.pos.y && overlap_x {
        return Some(Hit::Bottom);
    }
    if a_max.y > b_min.y + CONTACT_EPS && a_max.y < b.pos.y && overlap_x {
        return Some(Hit::Top);
    }

    None
}

/// Narrow classifier: left/right discrimination only, no dead zone.
/// Used by simpler entities (pickups) that resolve one axis at a time.
pub fn horizontal_intersect(a: &Entity, b: &Entity) -> Option<Hit> {
    if !boxes_intersect(a, b) {
        return None;
    }
    let (a_min, a_max) = aabb_corners(a.pos, a.width, a.height);
    let (b_min, b_max) = aabb_corners(b.pos, b.width, b.height);

    if a_max.x > b_min.x && a_max.x < b.pos.x && a_max.y > b_min.y && a_min.y < b_max.y {
        return Some(Hit::Right);
    }
    if a_min.x < b_max.x && a_min.x > b.pos.x && a_max.y > b_min.y && a_min.y < b_max.y {
        return Some(Hit::Left);
    }
    None
}

/// Narrow classifier: top/bottom discrimination only, no dead zone.
pub fn vertical_intersect(a: &Entity, b: &Entity) -> Option<Hit> {
    if !boxes_intersect(a, b) {
        return None;
    }
    let (a_min, a_max) = aabb_corners(a.pos, a.width, a.height);
    let (b_min, b_max) = aabb_corners(b.pos, b.width, b.height);

    if a_min.y < b_max.y && a_min.y > b.pos.y && a_min.x < b_max.x && a_max.x > b_min.x {
        return Some(Hit::Bottom);
    }
    if a_max.y > b_min.y && a_max.y < b.pos.y && a_min.x < b_max.x && a_max.x > b_min.x {
        return Some(Hit::Top);
    }
    None
}

/// Place `a` so its penetrating edge sits flush against `b`'s opposing
/// edge. The new center is computed from `b`'s edge directly rather than by
/// subtracting the overlap, so the result is as flush as f32 allows. Must be
/// called with the `Hit` just returned for the same pair; there is no
/// staleness guard.
pub fn snap(a: &mut Entity, b: &Entity, hit: Hit) {
    let (b_min, b_max) = aabb_corners(b.pos, b.width, b.height);

    match hit {
        Hit::Right => a.pos.x = b_min.x - a.width / 2.0,
        Hit::Left => a.pos.x = b_max.x + a.width / 2.0,
        Hit::Bottom => a.pos.y = b_max.y + a.height / 2.0,
        Hit::Top => a.pos.y = b_min.y - a.height / 2.0,
    }
}
