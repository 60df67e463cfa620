//! Movement integration, gravity and knockback
//!
//! Velocity holds a unit/sign direction; `speed` scales it during
//! integration. Walkers and falling projectiles accumulate gravity into
//! `vel.y` so the fall accelerates, while knockback displaces at a fixed
//! rate regardless of the entity's own speed.

use crate::consts::KNOCKBACK_SPEED;

use super::entity::{Entity, KnockDir};

/// Advance position by direction * speed * dt on both axes
pub fn integrate_position(e: &mut Entity, dt: f32) {
    e.pos.x += dt * e.speed * e.vel.x;
    e.pos.y += dt * e.speed * e.vel.y;
}

/// Accumulate gravity into vertical velocity. Gravity is negative, so this
/// pulls `vel.y` toward the floor; grounding code zeroes it on landing.
pub fn apply_walker_gravity(e: &mut Entity, dt: f32) {
    e.vel.y += e.gravity * e.speed * dt;
}

/// Displace a knocked-back entity and age the effect. Runs instead of the
/// entity's own movement while active; on expiry the channel deactivates
/// and the direction resets.
pub fn apply_knockback(e: &mut Entity, dt: f32) {
    match e.knockback.dir {
        Some(KnockDir::Left) => e.pos.x -= dt * KNOCKBACK_SPEED,
        Some(KnockDir::Right) => e.pos.x += dt * KNOCKBACK_SPEED,
        None => {}
    }

    e.knockback.remaining -= dt;
    if e.knockback.remaining <= 0.0 {
        e.knockback.active = false;
        e.knockback.dir = None;
    }
}

/// Clamp an entity so its bottom edge never passes below y = 0
pub fn prevent_below_ground(e: &mut Entity) {
    let bottom = e.pos.y - e.height / 2.0;
    if bottom < 0.0 {
        e.pos.y = e.height / 2.0;
    }
}
