//! Player state, movement, jumping and shooting
//!
//! The player's pool entity carries position and health; everything else
//! (solar meter, buffs, jump budget, fire control) lives in [`PlayerState`].
//! Shots go through a round-robin cursor over the ally-projectile range, so
//! the oldest bullet is overwritten when the range is saturated.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::audio::GameEvent;
use crate::consts::{
    BULLET_LIFETIME, BULLET_SPEED, CHARGE_SHOT_HOLD, CHARGED_BULLET_LIFETIME, GRAVITY_DEFAULT,
    HALF_TILE_SIZE, PLAYER_HEIGHT, PLAYER_JUMP_COUNT, PLAYER_JUMP_FORCE, PLAYER_JUMP_VELOCITY,
    PLAYER_MAX_HEALTH, PLAYER_SPEED, PLAYER_WIDTH, SOLAR_ENERGY_MAX,
};

use super::entity::{
    Archetype, Entity, EntityPool, KnockDir, ProjectileKind, ProjectileState, RoomScope,
};

/// Base fire rate in shots per second; fire-rate buffs raise it
pub const BASE_FIRE_RATE: f32 = 2.0;
/// Constant-rate fall multiplier applied to the player (no accumulation)
pub const PLAYER_GRAVITY_FACTOR: f32 = 28.0;

pub const BULLET_SIZE: f32 = 20.0;
pub const CHARGED_BULLET_SIZE: f32 = 30.0;
pub const BULLET_RADIUS: f32 = 10.0;

pub const SAVE_POINT_SIZE: f32 = 200.0;

/// Player progression and control state outside the pool entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub solar_energy: f32,
    pub solar_energy_max: f32,
    pub buff_attack: i32,
    /// Shots per second; fire period is its reciprocal
    pub buff_fire_rate: f32,
    pub buff_solar: f32,
    /// Slow-time engaged; drains the solar meter at unscaled rate
    pub slow_time: bool,
    pub fire_cooldown: f32,
    pub charge_timer: f32,
    /// Round-robin cursor into the ally-projectile range
    pub bullet_index: usize,
    pub jump_remaining: u32,
    pub jumping: bool,
    pub jump_force_remaining: f32,
}

impl PlayerState {
    pub fn new() -> Self {
        PlayerState {
            solar_energy: SOLAR_ENERGY_MAX,
            solar_energy_max: SOLAR_ENERGY_MAX,
            buff_attack: 1,
            buff_fire_rate: BASE_FIRE_RATE,
            buff_solar: 1.0,
            slow_time: false,
            fire_cooldown: 0.0,
            charge_timer: 0.0,
            bullet_index: 0,
            jump_remaining: PLAYER_JUMP_COUNT,
            jumping: false,
            jump_force_remaining: 0.0,
        }
    }

    pub fn fire_period(&self) -> f32 {
        1.0 / self.buff_fire_rate
    }

    /// Death reset: stats, buffs and fire control back to defaults
    pub fn reset_stats(&mut self) {
        *self = PlayerState::new();
    }

    /// Drop any half-held charge, e.g. when a room switch steals input
    pub fn cancel_charge(&mut self) {
        self.charge_timer = 0.0;
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        PlayerState::new()
    }
}

/// Claim the player slot and give it its base stats
pub fn spawn_player(pool: &mut EntityPool, pos: Vec2) -> Option<usize> {
    let slot = pool.allocate(Archetype::Player)?;
    let e = pool.get_mut(slot);
    e.pos = pos;
    e.width = PLAYER_WIDTH;
    e.height = PLAYER_HEIGHT;
    e.speed = PLAYER_SPEED;
    e.health_max = PLAYER_MAX_HEALTH;
    e.health = PLAYER_MAX_HEALTH;
    e.radius = PLAYER_WIDTH;
    e.scope = RoomScope::Persistent;
    e.refresh_aabb();
    Some(slot)
}

/// Horizontal movement from held input, clamped inside the room bounds.
/// Velocity is rebuilt from input every tick, so releasing the key stops
/// the player dead.
pub fn horizontal_update(e: &mut Entity, move_x: f32, actual_dt: f32, bounds: Vec2) {
    e.vel.x = move_x;
    e.pos.x += e.vel.x * e.speed * actual_dt;
    e.pos.x = e.pos.x.clamp(HALF_TILE_SIZE, bounds.x - HALF_TILE_SIZE);
    e.pos.y = e.pos.y.clamp(HALF_TILE_SIZE, bounds.y - HALF_TILE_SIZE);
}

/// Jump impulse and constant-rate gravity. A jump spends one unit of the
/// jump budget and pushes upward until the force budget runs out; landing
/// (detected by the grid collision pass) refills the budget.
pub fn jump_update(state: &mut PlayerState, e: &mut Entity, jump_pressed: bool, actual_dt: f32) {
    if jump_pressed && state.jump_remaining > 0 {
        state.jump_force_remaining = PLAYER_JUMP_FORCE;
        state.jumping = true;
        state.jump_remaining -= 1;
    }

    if state.jumping {
        let rise = PLAYER_JUMP_VELOCITY * actual_dt;
        e.pos.y += rise;
        state.jump_force_remaining -= rise;
        if state.jump_force_remaining <= 0.0 {
            state.jumping = false;
        }
    }

    e.pos.y += GRAVITY_DEFAULT * PLAYER_GRAVITY_FACTOR * actual_dt;
}

/// Refill the jump budget; called when the grid collision pass grounds the
/// player.
pub fn land(state: &mut PlayerState) {
    state.jump_remaining = PLAYER_JUMP_COUNT;
}

/// Fire control: held primary fire shoots on cooldown; held charge builds
/// toward a charged shot once the cooldown allows. Releasing charge early
/// throws the progress away.
pub fn fire_update(
    state: &mut PlayerState,
    pool: &mut EntityPool,
    from: Vec2,
    aim: Vec2,
    fire_held: bool,
    charge_held: bool,
    actual_dt: f32,
    events: &mut Vec<GameEvent>,
) {
    state.fire_cooldown -= actual_dt;

    if fire_held && state.fire_cooldown <= 0.0 {
        activate_bullet(pool, state, from, aim, false);
        state.fire_cooldown = state.fire_period();
        events.push(GameEvent::ShotFired);
    } else if charge_held && state.fire_cooldown <= 0.0 {
        state.charge_timer += actual_dt;
        if state.charge_timer >= CHARGE_SHOT_HOLD {
            activate_bullet(pool, state, from, aim, true);
            state.fire_cooldown = state.fire_period();
            state.charge_timer = 0.0;
            events.push(GameEvent::ChargedShotFired);
        }
    }

    if !charge_held {
        state.charge_timer = 0.0;
    }
}

/// Write a bullet into the next round-robin slot, overwriting whatever was
/// there. Charged shots are bigger, slower to expire and hit twice as hard.
fn activate_bullet(pool: &mut EntityPool, state: &mut PlayerState, from: Vec2, target: Vec2, charged: bool) {
    let range = Archetype::AllyProjectile.slot_range();
    if state.bullet_index >= range.len() {
        state.bullet_index = 0;
    }
    let slot = range.start + state.bullet_index;
    state.bullet_index += 1;

    pool.clear(slot);
    let e = pool.get_mut(slot);
    e.archetype = Archetype::AllyProjectile;
    e.active = true;
    e.pos = from;
    e.vel = (target - from).normalize_or_zero();
    e.speed = BULLET_SPEED;
    e.radius = BULLET_RADIUS;
    e.scope = RoomScope::Transient;
    if charged {
        e.width = CHARGED_BULLET_SIZE;
        e.height = CHARGED_BULLET_SIZE;
        e.lifetime = CHARGED_BULLET_LIFETIME;
    } else {
        e.width = BULLET_SIZE;
        e.height = BULLET_SIZE;
        e.lifetime = BULLET_LIFETIME;
    }
    e.projectile = Some(ProjectileState {
        kind: if charged {
            ProjectileKind::PlayerChargedShot
        } else {
            ProjectileKind::PlayerShot
        },
        damage: state.buff_attack * if charged { 2 } else { 1 },
        armed: true,
    });
}

/// Advance one player bullet; expiry clears the slot. Player shots run on
/// unscaled time so slow-time does not nerf the player's own fire.
pub fn bullet_update(pool: &mut EntityPool, slot: usize, actual_dt: f32) {
    let e = pool.get_mut(slot);
    if e.projectile.is_none_or(|p| !p.armed) {
        return;
    }
    e.pos += e.vel * e.speed * actual_dt;
    e.lifetime -= actual_dt;
    if e.lifetime <= 0.0 {
        pool.clear(slot);
    }
}

/// Clear every ally projectile and rewind the round-robin cursor
pub fn reset_bullets(pool: &mut EntityPool, state: &mut PlayerState) {
    for slot in Archetype::AllyProjectile.slot_range() {
        pool.clear(slot);
    }
    state.bullet_index = 0;
}

/// Knockback direction an enemy takes from a bullet's travel
pub fn knock_dir_from_bullet(bullet_vel_x: f32) -> KnockDir {
    if bullet_vel_x >= 0.0 {
        KnockDir::Right
    } else {
        KnockDir::Left
    }
}

/// Place a save point for a room. The slot stays active through creation so
/// first-fit allocation moves on; level init parks it and room arrival wakes
/// it. `loot.opened` latches "this save point holds the current save record".
pub fn create_save_point(pool: &mut EntityPool, pos: Vec2, room: usize) -> Option<usize> {
    let slot = pool.allocate(Archetype::SavePoint)?;
    let e = pool.get_mut(slot);
    e.pos = pos;
    e.width = SAVE_POINT_SIZE;
    e.height = SAVE_POINT_SIZE;
    e.scope = RoomScope::Room(room);
    e.refresh_aabb();
    Some(slot)
}
