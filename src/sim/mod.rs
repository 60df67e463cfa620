//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Fixed inputs per tick
//! - Seeded RNG only
//! - Stable iteration order (pool-index order, which is archetype order)
//! - No rendering or platform dependencies

pub mod collision;
pub mod daynight;
pub mod enemy;
pub mod entity;
pub mod physics;
pub mod pickup;
pub mod player;
pub mod tick;

pub use collision::{Hit, boxes_intersect, circles_intersect, directional_intersect, snap};
pub use daynight::{DayNight, DayPhase};
pub use entity::{
    Archetype, EnemyKind, Entity, EntityPool, Knockback, KnockDir, ProjectileKind, RoomScope,
};
pub use enemy::{BossAction, Cooldown, FlagTable, SpawnInfo, SpawnRegistry};
pub use pickup::PickupKind;
pub use player::PlayerState;
pub use tick::{Camera, GamePhase, LevelState, TickInput};
