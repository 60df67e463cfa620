//! Fixed-capacity entity pool, partitioned by archetype
//!
//! Every gameplay object lives in one flat array of [`Entity`] records. Each
//! archetype owns a fixed contiguous slot range, so iterating the pool in
//! index order is also iterating in archetype order. Slots are never moved;
//! `active` is the only liveness signal and inactive slots are skipped by
//! every update and collision pass.

use std::ops::Range;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::pickup::PickupKind;

/// Total pool capacity. The sum of all archetype ranges, fixed at build time.
pub const POOL_SIZE: usize = 530;

/// Which partition of the pool a slot belongs to.
///
/// `Clear` marks a slot that has been reset and holds no object; it owns no
/// range and can never be allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Archetype {
    Player,
    AllyProjectile,
    Enemy,
    Elite,
    Boss,
    EnemyProjectile,
    Pickup,
    SavePoint,
    Chest,
    Door,
    Grid,
    Clear,
}

impl Archetype {
    /// The contiguous slot range owned by this archetype
    pub const fn slot_range(self) -> Range<usize> {
        match self {
            Archetype::Player => 0..1,
            Archetype::AllyProjectile => 1..50,
            Archetype::Enemy => 50..70,
            Archetype::Elite => 70..73,
            Archetype::Boss => 73..75,
            Archetype::EnemyProjectile => 75..100,
            Archetype::Pickup => 100..145,
            Archetype::SavePoint => 145..150,
            Archetype::Chest => 150..160,
            Archetype::Door => 160..170,
            Archetype::Grid => 170..530,
            Archetype::Clear => 0..0,
        }
    }
}

/// Behavioral sub-kind of an enemy-range entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnemyKind {
    Melee,
    Ranged,
    Elite,
    Boss,
}

/// What a projectile is, decided at spawn time. Update and collision
/// behavior dispatch on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectileKind {
    /// Enemy shot aimed at the player's position when fired
    Tracked,
    /// Boss attack: falls from above the player under gravity
    Meteor,
    /// Boss attack: rises from the floor flanking the player
    Wall,
    PlayerShot,
    PlayerChargedShot,
}

/// Projectile payload: damage is its own field, and `armed` gates whether
/// the shot can still hurt something.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectileState {
    pub kind: ProjectileKind,
    pub damage: i32,
    pub armed: bool,
}

/// Which rooms an entity survives. Replaces a sentinel-valued room number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomScope {
    /// Survives every room switch (player, doors, grid)
    Persistent,
    /// Despawned on any room switch (drops, bullets)
    Transient,
    /// Belongs to one room and deactivates when leaving it
    Room(usize),
}

/// Horizontal knockback direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnockDir {
    Left,
    Right,
}

/// Knockback channel. While `active`, displacement pre-empts the entity's
/// own movement logic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Knockback {
    pub active: bool,
    pub dir: Option<KnockDir>,
    pub remaining: f32,
}

impl Knockback {
    pub const fn none() -> Self {
        Knockback {
            active: false,
            dir: None,
            remaining: 0.0,
        }
    }

    pub fn start(&mut self, dir: KnockDir, duration: f32) {
        self.active = true;
        self.dir = Some(dir);
        self.remaining = duration;
    }
}

/// Interactable/pickup bookkeeping. `opened` doubles as the save-point
/// "record written" latch. `no_collision_time` is the grace period before a
/// fresh drop starts colliding with the world.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LootState {
    pub opened: bool,
    pub collision: bool,
    pub no_collision_time: f32,
}

impl LootState {
    pub const fn none() -> Self {
        LootState {
            opened: false,
            collision: false,
            no_collision_time: 0.0,
        }
    }
}

/// One pool record. Plain data; behavior lives in the per-archetype modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub archetype: Archetype,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Cached AABB corners, refreshed by [`Entity::refresh_aabb`]
    pub min_pos: Vec2,
    pub max_pos: Vec2,
    pub width: f32,
    pub height: f32,
    pub radius: f32,
    pub active: bool,
    pub health_max: i32,
    pub health: i32,
    pub speed: f32,
    pub gravity: f32,
    /// Remaining life in seconds for timed entities (bullets, drops)
    pub lifetime: f32,
    pub scope: RoomScope,
    /// Index into the enemy flag table (enemies and bosses only)
    pub flag_slot: usize,
    pub enemy_kind: Option<EnemyKind>,
    pub projectile: Option<ProjectileState>,
    pub pickup_kind: Option<PickupKind>,
    pub loot: LootState,
    pub knockback: Knockback,
}

impl Entity {
    /// A slot holding nothing: inactive, persistent, archetype `Clear`
    pub const fn cleared() -> Self {
        Entity {
            archetype: Archetype::Clear,
            pos: Vec2::ZERO,
            vel: Vec2::ZERO,
            min_pos: Vec2::ZERO,
            max_pos: Vec2::ZERO,
            width: 0.0,
            height: 0.0,
            radius: 0.0,
            active: false,
            health_max: 0,
            health: 0,
            speed: 0.0,
            gravity: 0.0,
            lifetime: 0.0,
            scope: RoomScope::Persistent,
            flag_slot: 0,
            enemy_kind: None,
            projectile: None,
            pickup_kind: None,
            loot: LootState::none(),
            knockback: Knockback::none(),
        }
    }

    /// Recompute the cached AABB corners from the current center and extents
    pub fn refresh_aabb(&mut self) {
        let (min, max) = crate::aabb_corners(self.pos, self.width, self.height);
        self.min_pos = min;
        self.max_pos = max;
    }

    /// True when this entity participates in updates for the given room
    pub fn in_room(&self, room: usize) -> bool {
        match self.scope {
            RoomScope::Persistent | RoomScope::Transient => true,
            RoomScope::Room(r) => r == room,
        }
    }
}

impl Default for Entity {
    fn default() -> Self {
        Entity::cleared()
    }
}

/// The pool itself: a fixed array behind first-fit allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityPool {
    entities: Vec<Entity>,
}

impl EntityPool {
    pub fn new() -> Self {
        EntityPool {
            entities: vec![Entity::cleared(); POOL_SIZE],
        }
    }

    /// First inactive slot within the archetype's range, claimed and reset.
    /// Returns `None` (and warns) when the range is exhausted; gameplay code
    /// treats that as "the spawn silently does not happen".
    pub fn allocate(&mut self, archetype: Archetype) -> Option<usize> {
        let range = archetype.slot_range();
        for idx in range.clone() {
            if !self.entities[idx].active {
                let e = &mut self.entities[idx];
                *e = Entity::cleared();
                e.archetype = archetype;
                e.active = true;
                return Some(idx);
            }
        }
        log::warn!("entity pool exhausted for {archetype:?} ({range:?})");
        None
    }

    /// Reset a slot to the cleared state
    pub fn clear(&mut self, idx: usize) {
        self.entities[idx] = Entity::cleared();
    }

    pub fn get(&self, idx: usize) -> &Entity {
        &self.entities[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Entity {
        &mut self.entities[idx]
    }

    /// Disjoint mutable access to two slots
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut Entity, &mut Entity) {
        debug_assert_ne!(a, b);
        if a < b {
            let (lo, hi) = self.entities.split_at_mut(b);
            (&mut lo[a], &mut hi[0])
        } else {
            let (lo, hi) = self.entities.split_at_mut(a);
            (&mut hi[0], &mut lo[b])
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Entity)> {
        self.entities.iter().enumerate()
    }

    /// Active slots of one archetype, in index order
    pub fn active_slots(&self, archetype: Archetype) -> impl Iterator<Item = usize> + '_ {
        archetype
            .slot_range()
            .filter(move |&i| self.entities[i].active)
    }

    /// All slots of one archetype, active or not
    pub fn slots(&self, archetype: Archetype) -> Range<usize> {
        archetype.slot_range()
    }
}

impl Default for EntityPool {
    fn default() -> Self {
        EntityPool::new()
    }
}
