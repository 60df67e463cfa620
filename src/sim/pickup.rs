//! Drops, buffs and chests
//!
//! Enemy deaths roll a regen drop, chests roll a permanent buff. Drops fall
//! under gravity, spend a short grace period ignoring the world, then sit on
//! the ground until picked up or their lifetime runs out. Everything here is
//! `Transient` scope: a room switch sweeps leftovers away.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::consts::{ATTACK_BUFF_MAX, FIRE_RATE_BUFF_MAX, GRAVITY_DEFAULT, SOLAR_BUFF_MAX, SOLAR_ENERGY_MAX};

use super::entity::{Archetype, Entity, EntityPool, RoomScope};
use super::player::PlayerState;

pub const DROP_SIZE: f32 = 25.0;
pub const DROP_SPEED: f32 = 10.0;
pub const DROP_LIFETIME: f32 = 10.0;
/// Upward pop a fresh drop spawns with
pub const DROP_INITIAL_VELOCITY: f32 = 50.0;
/// Seconds a fresh drop ignores world collision
pub const DROP_COLLISION_GRACE: f32 = 1.0;

pub const CHEST_WIDTH: f32 = 50.0;
pub const CHEST_HEIGHT: f32 = 75.0;

pub const HEALTH_REGEN_AMOUNT: i32 = 3;
pub const ENERGY_REGEN_AMOUNT: f32 = 5.0;
pub const FIRE_RATE_BUFF_STEP: f32 = 0.5;
pub const SOLAR_BUFF_STEP: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupKind {
    HealthRegen,
    EnergyRegen,
    AtkUp,
    FireRateUp,
    SolarUp,
}

/// Roll a drop for a dying enemy: 3..=6 health, 7..=10 energy, miss otherwise
pub fn spawn_enemy_drop<R: Rng>(pool: &mut EntityPool, rng: &mut R, pos: Vec2) {
    let roll: i32 = rng.random_range(1..=10);
    let kind = match roll {
        3..=6 => PickupKind::HealthRegen,
        7..=10 => PickupKind::EnergyRegen,
        _ => return,
    };
    spawn_pickup(pool, pos, kind);
}

/// Roll one of the three permanent buffs out of an opened chest
pub fn spawn_buff_drop<R: Rng>(pool: &mut EntityPool, rng: &mut R, pos: Vec2) {
    let kind = match rng.random_range(1..=3) {
        1 => PickupKind::AtkUp,
        2 => PickupKind::FireRateUp,
        _ => PickupKind::SolarUp,
    };
    spawn_pickup(pool, pos, kind);
}

pub fn spawn_pickup(pool: &mut EntityPool, pos: Vec2, kind: PickupKind) {
    let Some(slot) = pool.allocate(Archetype::Pickup) else {
        return;
    };
    let e = pool.get_mut(slot);
    e.pos = pos;
    e.width = DROP_SIZE;
    e.height = DROP_SIZE;
    e.speed = DROP_SPEED;
    e.lifetime = DROP_LIFETIME;
    e.gravity = GRAVITY_DEFAULT;
    e.vel.y = DROP_INITIAL_VELOCITY;
    e.scope = RoomScope::Transient;
    e.pickup_kind = Some(kind);
    e.loot.no_collision_time = DROP_COLLISION_GRACE;
}

/// Gravity fall for a drop, same accumulation walkers use
pub fn drop_movement(e: &mut Entity, game_dt: f32) {
    e.vel.y += e.gravity * e.speed * game_dt;
    e.pos.y += e.vel.y * game_dt;
}

/// Count down the collision grace. Unscaled time: a fresh drop pops free of
/// its spawner even while slow-time is on.
pub fn grace_tick(e: &mut Entity, actual_dt: f32) {
    e.loot.no_collision_time -= actual_dt;
    if e.loot.no_collision_time <= 0.0 {
        e.loot.collision = true;
    }
}

/// Age a grounded drop; expiry clears the slot
pub fn lifetime_tick(pool: &mut EntityPool, slot: usize, game_dt: f32) {
    let e = pool.get_mut(slot);
    e.lifetime -= game_dt;
    if e.lifetime <= 0.0 {
        pool.clear(slot);
    }
}

/// Apply a collected pickup to the player. Buffs saturate at their caps;
/// regens clamp to the current maximums.
pub fn apply_pickup(kind: PickupKind, player: &mut PlayerState, player_entity: &mut Entity) {
    match kind {
        PickupKind::AtkUp => {
            player.buff_attack = (player.buff_attack + 1).min(ATTACK_BUFF_MAX);
        }
        PickupKind::FireRateUp => {
            player.buff_fire_rate = (player.buff_fire_rate + FIRE_RATE_BUFF_STEP).min(FIRE_RATE_BUFF_MAX);
        }
        PickupKind::SolarUp => {
            player.buff_solar = (player.buff_solar + SOLAR_BUFF_STEP).min(SOLAR_BUFF_MAX);
            player.solar_energy_max = SOLAR_ENERGY_MAX * player.buff_solar;
        }
        PickupKind::HealthRegen => {
            player_entity.health =
                (player_entity.health + HEALTH_REGEN_AMOUNT).min(player_entity.health_max);
        }
        PickupKind::EnergyRegen => {
            player.solar_energy =
                (player.solar_energy + ENERGY_REGEN_AMOUNT).min(player.solar_energy_max);
        }
    }
}

/// Place a chest for a room. The slot stays active through creation so
/// first-fit allocation moves on; level init parks all furniture afterwards
/// and the room-switch roll decides whether one appears on each arrival.
pub fn create_chest(pool: &mut EntityPool, pos: Vec2, room: usize) -> Option<usize> {
    let slot = pool.allocate(Archetype::Chest)?;
    let e = pool.get_mut(slot);
    e.pos = pos;
    e.width = CHEST_WIDTH;
    e.height = CHEST_HEIGHT;
    e.scope = RoomScope::Room(room);
    e.refresh_aabb();
    Some(slot)
}

/// Open a chest: roll a buff drop at its position and latch it opened
pub fn open_chest<R: Rng>(pool: &mut EntityPool, rng: &mut R, chest_slot: usize) {
    let pos = pool.get(chest_slot).pos;
    spawn_buff_drop(pool, rng, pos);
    pool.get_mut(chest_slot).loot.opened = true;
}
