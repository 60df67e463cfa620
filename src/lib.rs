//! Duskfall - gameplay core for a 2D action-platformer
//!
//! Core modules:
//! - `sim`: Deterministic simulation (entity pool, collision, physics, behavior)
//! - `level`: Room/door graph and level-data parsing
//! - `persistence`: Save-point record read/write
//! - `audio`: Event queue consumed by the audio collaborator
//!
//! Rendering, audio playback, input polling and windowing live outside this
//! crate: rendering reads the pool through accessors, audio drains the event
//! queue, and input arrives pre-polled in [`sim::TickInput`].

pub mod audio;
pub mod level;
pub mod persistence;
pub mod sim;

pub use level::{Level, LevelError};
pub use sim::{LevelState, TickInput};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// World size of one grid tile
    pub const TILE_SIZE: f32 = 50.0;
    pub const HALF_TILE_SIZE: f32 = TILE_SIZE * 0.5;

    /// Downward acceleration applied to walkers and falling projectiles
    pub const GRAVITY_DEFAULT: f32 = -9.8;

    /// Dead-zone offset from a box's center used by the directional
    /// intersection classifier to keep corner overlaps from resolving on
    /// two axes at once. Tuning value, no derivation documented.
    pub const COLLISION_DEAD_ZONE: f32 = 20.0;

    /// Knockback displacement speed, independent of the entity's own speed
    pub const KNOCKBACK_SPEED: f32 = 500.0;
    /// Knockback duration applied by a player bullet
    pub const KNOCKBACK_DURATION: f32 = 0.1;

    /// Player
    pub const PLAYER_MAX_HEALTH: i32 = 20;
    pub const PLAYER_WIDTH: f32 = 50.0;
    pub const PLAYER_HEIGHT: f32 = 70.0;
    pub const PLAYER_SPEED: f32 = 300.0;
    pub const PLAYER_JUMP_VELOCITY: f32 = 650.0;
    pub const PLAYER_JUMP_FORCE: f32 = 150.0;
    pub const PLAYER_JUMP_COUNT: u32 = 2;

    /// Solar energy meter
    pub const SOLAR_ENERGY_MAX: f32 = 50.0;
    pub const SOLAR_CHARGE_RATE: f32 = 1.0;
    pub const SOLAR_DEPLETE_RATE: f32 = 2.0;
    /// Gameplay time scale while slow-time is active
    pub const SLOW_TIME_SCALE: f32 = 0.25;

    /// Buff caps
    pub const ATTACK_BUFF_MAX: i32 = 3;
    pub const FIRE_RATE_BUFF_MAX: f32 = 3.0;
    pub const SOLAR_BUFF_MAX: f32 = 2.0;

    /// Player bullets
    pub const BULLET_SPEED: f32 = 500.0;
    pub const BULLET_LIFETIME: f32 = 1.2;
    pub const CHARGED_BULLET_LIFETIME: f32 = 1.7;
    pub const CHARGE_SHOT_HOLD: f32 = 0.5;

    /// Day/night cycle durations (seconds)
    pub const DAY_DURATION: f32 = 70.0;
    pub const EVENING_DURATION: f32 = 20.0;
    pub const NIGHT_DURATION: f32 = 30.0;
    /// Sky-color transition begins this long before a phase boundary
    pub const COLOR_TRANSITION_START: f32 = 3.0;
    pub const COLOR_TRANSITION_TIME: f32 = 6.0;

    /// Room-transition fade, driven by unscaled delta time
    pub const TRANSITION_FADE_DURATION: f32 = 1.0;
    /// Chest respawn probability on room arrival
    pub const CHEST_SPAWN_CHANCE: f64 = 0.8;
    /// Arrival offset from the exit door, as a fraction of player extent
    pub const DOOR_EXIT_OFFSET: f32 = 0.2;

    /// Fixed number of flag-table entries (system limit, never grows)
    pub const FLAG_TABLE_SIZE: usize = 50;
    /// A boss reserves this many flag slots: meteors use offsets 0..=4,
    /// walls use offsets 5 and 6
    pub const BOSS_RESERVED_SLOTS: usize = 7;
}

/// Half-extent AABB corners from a center position
#[inline]
pub fn aabb_corners(pos: Vec2, width: f32, height: f32) -> (Vec2, Vec2) {
    let half = Vec2::new(width / 2.0, height / 2.0);
    (pos - half, pos + half)
}

/// Convert a grid cell (row 0 topmost) to a world-space tile center.
/// Game-space Y grows upward, so rows are flipped.
#[inline]
pub fn grid_to_world(col: usize, row: usize, max_rows: usize) -> Vec2 {
    Vec2::new(
        col as f32 * consts::TILE_SIZE + consts::HALF_TILE_SIZE,
        (max_rows - row - 1) as f32 * consts::TILE_SIZE + consts::HALF_TILE_SIZE,
    )
}
