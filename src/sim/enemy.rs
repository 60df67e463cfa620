//! Enemy, elite and boss behavior plus their projectiles
//!
//! Each enemy-range entity carries a `flag_slot` into the level's
//! [`FlagTable`]: per-enemy timers and latches that survive the entity being
//! despawned and respawned on room switches. A boss reserves a contiguous
//! block of seven slots after its own so every projectile of its two attack
//! patterns has a private in-flight latch.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::{BOSS_RESERVED_SLOTS, FLAG_TABLE_SIZE, GRAVITY_DEFAULT};

use super::collision::{boxes_intersect, circles_intersect};
use super::entity::{
    Archetype, EnemyKind, Entity, EntityPool, ProjectileKind, ProjectileState, RoomScope,
};
use super::physics;

pub const ENEMY_WIDTH: f32 = 70.0;
pub const ENEMY_HEIGHT: f32 = 70.0;
pub const ENEMY_SPEED: f32 = 60.0;
pub const MELEE_RADIUS: f32 = 300.0;
pub const MELEE_HEALTH: i32 = 10;
pub const RANGED_RADIUS: f32 = 400.0;
pub const RANGED_HEALTH: i32 = 5;

pub const ELITE_WIDTH: f32 = 150.0;
pub const ELITE_HEIGHT: f32 = 150.0;
pub const ELITE_SPEED: f32 = 70.0;
pub const ELITE_RADIUS: f32 = 400.0;
pub const ELITE_HEALTH: i32 = 15;

pub const BOSS_WIDTH: f32 = 100.0;
pub const BOSS_HEIGHT: f32 = 110.0;
pub const BOSS_SPEED: f32 = 200.0;
pub const BOSS_RADIUS: f32 = 300.0;
pub const BOSS_HEALTH: i32 = 100;

pub const ENEMY_BULLET_WIDTH: f32 = 50.0;
pub const ENEMY_BULLET_HEIGHT: f32 = 60.0;
pub const ENEMY_BULLET_SPEED: f32 = 300.0;
pub const ENEMY_BULLET_LIFETIME: f32 = 2.0;
pub const ENEMY_BULLET_DAMAGE: i32 = 1;

pub const BOSS_BULLET_WIDTH: f32 = 75.0;
pub const BOSS_BULLET_HEIGHT: f32 = 85.0;
pub const BOSS_BULLET_SPEED: f32 = 70.0;
pub const BOSS_BULLET_LIFETIME: f32 = 4.0;
pub const METEOR_DAMAGE: i32 = 5;
pub const WALL_DAMAGE: i32 = 1;

/// Contact/fire cooldown period shared by melee touch and ranged shots
pub const ATTACK_COOLDOWN: f32 = 2.0;
/// Melee patrol period; the timer wraps here
pub const PATROL_PERIOD: f32 = 8.0;
/// Meteor spawn height above the player
pub const METEOR_DROP_HEIGHT: f32 = 400.0;
/// Horizontal distance the wall pair spawns from the player
pub const WALL_SPAWN_OFFSET: f32 = 400.0;
/// World height the wall pair travels along
pub const WALL_SPAWN_Y: f32 = 330.0;

/// A saturating cooldown. `tick` ages it and reports readiness; `trigger`
/// rewinds it to the full period.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Cooldown {
    remaining: f32,
}

impl Cooldown {
    pub fn ready(&self) -> bool {
        self.remaining <= 0.0
    }

    /// Age by `dt`, returning whether the cooldown is now ready
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.remaining > 0.0 {
            self.remaining -= dt;
        }
        self.ready()
    }

    pub fn trigger(&mut self, period: f32) {
        self.remaining = period;
    }
}

/// Per-enemy timers and latches, parallel to the pool
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnemyFlags {
    /// Elite anchor has been recorded
    pub anchored: bool,
    /// A projectile owned by this slot is in flight; suppresses refire
    pub bullet_in_flight: bool,
    pub patrol_timer: f32,
    /// Boss behavior timeline position
    pub logic_timer: f32,
    pub attack_one_timer: f32,
    pub attack_two_timer: f32,
    /// Contact damage / ranged fire cooldown
    pub attack_cd: Cooldown,
    pub start_pos_x: f32,
}

/// Fixed table of [`EnemyFlags`], one entry per registered flag slot.
///
/// The size is a system limit: registering more enemies than fit is a
/// precondition violation. Debug builds assert; release builds clamp to the
/// last slot rather than index out of bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagTable {
    entries: Vec<EnemyFlags>,
}

impl FlagTable {
    pub fn new() -> Self {
        FlagTable {
            entries: vec![EnemyFlags::default(); FLAG_TABLE_SIZE],
        }
    }

    fn idx(slot: usize) -> usize {
        debug_assert!(slot < FLAG_TABLE_SIZE, "flag slot {slot} out of range");
        slot.min(FLAG_TABLE_SIZE - 1)
    }

    pub fn get(&self, slot: usize) -> &EnemyFlags {
        &self.entries[Self::idx(slot)]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut EnemyFlags {
        &mut self.entries[Self::idx(slot)]
    }

    /// Drop the in-flight latch for a slot. Called when the slot's
    /// projectile dies, before the projectile entity itself is cleared.
    pub fn release(&mut self, slot: usize) {
        self.entries[Self::idx(slot)].bullet_in_flight = false;
    }

    /// Reset one slot's timers for a fresh spawn, keeping nothing
    pub fn reset(&mut self, slot: usize) {
        self.entries[Self::idx(slot)] = EnemyFlags::default();
    }
}

impl Default for FlagTable {
    fn default() -> Self {
        FlagTable::new()
    }
}

/// Where and what to spawn when a room becomes active
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnInfo {
    pub pos: Vec2,
    pub room: usize,
    pub kind: EnemyKind,
    pub flag_slot: usize,
}

/// Registry of all enemy spawn points, recorded once at level init.
/// Flag slots are handed out in registration order; a boss consumes
/// [`BOSS_RESERVED_SLOTS`] so its projectiles get private latches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpawnRegistry {
    infos: Vec<SpawnInfo>,
    next_flag: usize,
}

impl SpawnRegistry {
    pub fn new() -> Self {
        SpawnRegistry::default()
    }

    pub fn record(&mut self, pos: Vec2, room: usize, kind: EnemyKind) -> usize {
        let flag_slot = self.next_flag;
        debug_assert!(flag_slot < FLAG_TABLE_SIZE);
        self.infos.push(SpawnInfo {
            pos,
            room,
            kind,
            flag_slot,
        });
        self.next_flag += if kind == EnemyKind::Boss {
            BOSS_RESERVED_SLOTS
        } else {
            1
        };
        flag_slot
    }

    pub fn for_room(&self, room: usize) -> impl Iterator<Item = &SpawnInfo> {
        self.infos.iter().filter(move |i| i.room == room)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpawnInfo> {
        self.infos.iter()
    }
}

/// Materialize every enemy registered for `room` into the pool
pub fn spawn_for_room(
    pool: &mut EntityPool,
    flags: &mut FlagTable,
    registry: &SpawnRegistry,
    room: usize,
) {
    for info in registry.for_room(room) {
        spawn_enemy(pool, flags, info);
    }
}

fn spawn_enemy(pool: &mut EntityPool, flags: &mut FlagTable, info: &SpawnInfo) {
    let archetype = match info.kind {
        EnemyKind::Melee | EnemyKind::Ranged => Archetype::Enemy,
        EnemyKind::Elite => Archetype::Elite,
        EnemyKind::Boss => Archetype::Boss,
    };
    let Some(slot) = pool.allocate(archetype) else {
        return;
    };

    flags.reset(info.flag_slot);
    flags.get_mut(info.flag_slot).start_pos_x = info.pos.x;

    let e = pool.get_mut(slot);
    e.pos = info.pos;
    e.scope = RoomScope::Room(info.room);
    e.enemy_kind = Some(info.kind);
    e.flag_slot = info.flag_slot;
    e.gravity = GRAVITY_DEFAULT;
    e.vel = Vec2::new(1.0, 1.0);

    match info.kind {
        EnemyKind::Melee => {
            e.width = ENEMY_WIDTH;
            e.height = ENEMY_HEIGHT;
            e.speed = ENEMY_SPEED;
            e.radius = MELEE_RADIUS;
            e.health_max = MELEE_HEALTH;
        }
        EnemyKind::Ranged => {
            e.width = ENEMY_WIDTH;
            e.height = ENEMY_HEIGHT;
            e.speed = ENEMY_SPEED;
            e.radius = RANGED_RADIUS;
            e.health_max = RANGED_HEALTH;
        }
        EnemyKind::Elite => {
            e.width = ELITE_WIDTH;
            e.height = ELITE_HEIGHT;
            e.speed = ELITE_SPEED;
            e.radius = ELITE_RADIUS;
            e.health_max = ELITE_HEALTH;
        }
        EnemyKind::Boss => {
            e.width = BOSS_WIDTH;
            e.height = BOSS_HEIGHT;
            e.speed = BOSS_SPEED;
            e.radius = BOSS_RADIUS;
            e.health_max = BOSS_HEALTH;
        }
    }
    e.health = e.health_max;
    e.refresh_aabb();
}

/// What the melee patrol state machine wants this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeleeAction {
    PatrolLeft,
    PatrolRight,
    Chase,
}

/// Advance the patrol timer and decide a direction. The timer wraps every
/// 8 s: the first 4 s walk left, the rest walk right. Detection overrides
/// patrol entirely.
pub fn melee_action(flag: &mut EnemyFlags, player_in_range: bool, dt: f32) -> MeleeAction {
    flag.patrol_timer += dt;
    if flag.patrol_timer >= PATROL_PERIOD {
        flag.patrol_timer = 0.0;
    }

    if player_in_range {
        return MeleeAction::Chase;
    }
    if flag.patrol_timer < PATROL_PERIOD / 2.0 {
        MeleeAction::PatrolLeft
    } else {
        MeleeAction::PatrolRight
    }
}

/// Melee walker: patrol or chase horizontally, then fall under gravity.
/// While chasing, movement holds once the AABBs already overlap.
pub fn melee_update(enemy: &mut Entity, player: &Entity, flag: &mut EnemyFlags, dt: f32) {
    let in_range = circles_intersect(enemy, player);
    match melee_action(flag, in_range, dt) {
        MeleeAction::PatrolLeft => enemy.vel.x = -1.0,
        MeleeAction::PatrolRight => enemy.vel.x = 1.0,
        MeleeAction::Chase => {
            if !boxes_intersect(enemy, player) {
                if enemy.pos.x < player.pos.x {
                    enemy.vel.x = 1.0;
                } else if enemy.pos.x > player.pos.x {
                    enemy.vel.x = -1.0;
                }
            } else {
                // in contact, stand still and let the contact attack run
                enemy.vel.x = 0.0;
            }
        }
    }

    enemy.pos.x += dt * enemy.speed * enemy.vel.x;
    physics::apply_walker_gravity(enemy, dt);
    enemy.pos.y += enemy.vel.y * dt;
}

/// Ranged enemy: stationary turret. Fires a tracked shot at the player on a
/// saturating 2 s cooldown while the player is inside its detection circle.
pub fn ranged_update(
    pool: &mut EntityPool,
    enemy_slot: usize,
    player_slot: usize,
    flags: &mut FlagTable,
    dt: f32,
) {
    let (from, target, flag_slot, in_range) = {
        let enemy = pool.get(enemy_slot);
        let player = pool.get(player_slot);
        (
            enemy.pos,
            player.pos,
            enemy.flag_slot,
            circles_intersect(enemy, player),
        )
    };

    let ready = flags.get_mut(flag_slot).attack_cd.tick(dt);
    if in_range && ready {
        spawn_tracked_bullet(pool, flags, flag_slot, from, target);
        flags.get_mut(flag_slot).attack_cd.trigger(ATTACK_COOLDOWN);
    }
}

/// Elite: records its anchor X on first update, chases inside its detection
/// circle, otherwise walks back toward the anchor.
pub fn elite_update(elite: &mut Entity, player: &Entity, flag: &mut EnemyFlags, dt: f32) {
    if !flag.anchored {
        flag.start_pos_x = elite.pos.x;
        flag.anchored = true;
    }

    if circles_intersect(elite, player) {
        if !boxes_intersect(elite, player) {
            if elite.pos.x < player.pos.x {
                elite.vel.x = 1.0;
            } else if elite.pos.x > player.pos.x {
                elite.vel.x = -1.0;
            }
        } else {
            elite.vel.x = 0.0;
        }
    } else if elite.pos.x > flag.start_pos_x {
        elite.vel.x = -1.0;
    } else if elite.pos.x < flag.start_pos_x {
        elite.vel.x = 1.0;
    } else {
        elite.vel.x = 0.0;
    }

    elite.pos.x += dt * elite.speed * elite.vel.x;
    physics::apply_walker_gravity(elite, dt);
    elite.pos.y += elite.vel.y * dt;
}

/// What the boss timeline selects at a given timer position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BossAction {
    Idle,
    MoveLeft,
    MoveRight,
    AttackOne,
    AttackTwo,
}

/// Sample the fixed 50 s boss timeline. The pattern assumes the boss is
/// placed on the right side of its arena; MoveRight only triggers while the
/// boss sits left of its spawn X.
pub fn boss_action(timer: f32, pos_x: f32, start_x: f32) -> BossAction {
    if timer > 1.0 && timer <= 16.0 {
        return BossAction::AttackOne;
    }
    if timer > 17.0 && timer <= 20.0 {
        return BossAction::AttackTwo;
    }
    if timer > 20.0 && timer <= 23.0 {
        return BossAction::MoveLeft;
    }
    if timer > 23.0 && timer <= 40.0 {
        return BossAction::AttackOne;
    }
    if timer > 41.0 && timer <= 44.0 {
        return BossAction::AttackTwo;
    }
    if timer > 44.0 && timer <= 50.0 && pos_x < start_x {
        return BossAction::MoveRight;
    }
    BossAction::Idle
}

/// Drive the boss for one tick: advance the timeline, move or run the
/// selected attack pattern. `player_x` is the player's position sampled at
/// the start of the tick; attacks aim at it, not at a live reference.
pub fn boss_update(
    pool: &mut EntityPool,
    boss_slot: usize,
    player_pos: Vec2,
    flags: &mut FlagTable,
    dt: f32,
) {
    let (flag_slot, pos_x) = {
        let boss = pool.get(boss_slot);
        (boss.flag_slot, boss.pos.x)
    };

    let timer = {
        let f = flags.get_mut(flag_slot);
        f.logic_timer += dt;
        if f.logic_timer > 50.0 {
            f.logic_timer = 0.0;
        }
        f.logic_timer
    };
    let start_x = flags.get(flag_slot).start_pos_x;

    match boss_action(timer, pos_x, start_x) {
        BossAction::MoveLeft => {
            let boss = pool.get_mut(boss_slot);
            boss.pos.x -= dt * boss.speed * boss.vel.x;
        }
        BossAction::MoveRight => {
            let boss = pool.get_mut(boss_slot);
            boss.pos.x += dt * boss.speed * boss.vel.x;
        }
        BossAction::AttackOne => boss_attack_one(pool, flags, flag_slot, player_pos, dt),
        BossAction::AttackTwo => boss_attack_two(pool, flags, flag_slot, player_pos, dt),
        BossAction::Idle => {}
    }
}

/// Meteor rain: five drops at staggered sub-second offsets, each above the
/// player's current X, one reserved flag slot apiece. A slot whose meteor is
/// still falling skips its window.
fn boss_attack_one(
    pool: &mut EntityPool,
    flags: &mut FlagTable,
    boss_flag: usize,
    player_pos: Vec2,
    dt: f32,
) {
    let t = {
        let f = flags.get_mut(boss_flag);
        f.attack_one_timer += dt;
        if f.attack_one_timer > 5.4 {
            f.attack_one_timer = 0.0;
        }
        f.attack_one_timer
    };

    let windows: [(f32, f32, f32); 5] = [
        (0.0, 1.0, 0.0),
        (1.0, 2.1, -100.0),
        (2.1, 3.2, 0.0),
        (3.2, 4.3, 100.0),
        (4.3, 5.4, 0.0),
    ];
    for (offset, (lo, hi, dx)) in windows.iter().enumerate() {
        if t > *lo && t < *hi {
            let spawn = Vec2::new(player_pos.x + dx, player_pos.y + METEOR_DROP_HEIGHT);
            spawn_boss_bullet(
                pool,
                flags,
                boss_flag + offset,
                spawn,
                ProjectileKind::Meteor,
                METEOR_DAMAGE,
                Vec2::new(0.0, 1.0),
            );
        }
    }
}

/// Converging walls: a pair flanking the player at ±400, slots 5 and 6,
/// each accelerating toward where the player stood.
fn boss_attack_two(
    pool: &mut EntityPool,
    flags: &mut FlagTable,
    boss_flag: usize,
    player_pos: Vec2,
    dt: f32,
) {
    let t = {
        let f = flags.get_mut(boss_flag);
        f.attack_two_timer += dt;
        if f.attack_two_timer > 2.0 {
            f.attack_two_timer = 0.0;
        }
        f.attack_two_timer
    };

    if t < 2.0 {
        spawn_boss_bullet(
            pool,
            flags,
            boss_flag + 5,
            Vec2::new(player_pos.x - WALL_SPAWN_OFFSET, WALL_SPAWN_Y),
            ProjectileKind::Wall,
            WALL_DAMAGE,
            Vec2::new(1.0, 0.0),
        );
        spawn_boss_bullet(
            pool,
            flags,
            boss_flag + 6,
            Vec2::new(player_pos.x + WALL_SPAWN_OFFSET, WALL_SPAWN_Y),
            ProjectileKind::Wall,
            WALL_DAMAGE,
            Vec2::new(-1.0, 0.0),
        );
    }
}

/// Fire a tracked shot from `from` toward `target`, owned by `flag_slot`.
/// No-op while that slot already has a shot in flight.
pub fn spawn_tracked_bullet(
    pool: &mut EntityPool,
    flags: &mut FlagTable,
    flag_slot: usize,
    from: Vec2,
    target: Vec2,
) {
    if flags.get(flag_slot).bullet_in_flight {
        return;
    }
    let Some(slot) = pool.allocate(Archetype::EnemyProjectile) else {
        return;
    };

    let e = pool.get_mut(slot);
    e.pos = from;
    e.vel = (target - from).normalize_or_zero();
    e.width = ENEMY_BULLET_WIDTH;
    e.height = ENEMY_BULLET_HEIGHT;
    e.speed = ENEMY_BULLET_SPEED;
    e.radius = ENEMY_BULLET_WIDTH;
    e.lifetime = ENEMY_BULLET_LIFETIME;
    e.scope = RoomScope::Transient;
    e.flag_slot = flag_slot;
    e.projectile = Some(ProjectileState {
        kind: ProjectileKind::Tracked,
        damage: ENEMY_BULLET_DAMAGE,
        armed: true,
    });
    flags.get_mut(flag_slot).bullet_in_flight = true;
}

fn spawn_boss_bullet(
    pool: &mut EntityPool,
    flags: &mut FlagTable,
    flag_slot: usize,
    pos: Vec2,
    kind: ProjectileKind,
    damage: i32,
    dir: Vec2,
) {
    if flags.get(flag_slot).bullet_in_flight {
        return;
    }
    let Some(slot) = pool.allocate(Archetype::EnemyProjectile) else {
        return;
    };

    let e = pool.get_mut(slot);
    e.pos = pos;
    e.vel = dir;
    e.width = BOSS_BULLET_WIDTH;
    e.height = BOSS_BULLET_HEIGHT;
    e.speed = BOSS_BULLET_SPEED;
    e.radius = BOSS_BULLET_WIDTH;
    e.lifetime = BOSS_BULLET_LIFETIME;
    e.gravity = GRAVITY_DEFAULT;
    e.scope = RoomScope::Transient;
    e.flag_slot = flag_slot;
    e.projectile = Some(ProjectileState { kind, damage, armed: true });
    flags.get_mut(flag_slot).bullet_in_flight = true;
}

/// Advance one enemy projectile: movement by kind, then lifetime. Expiry
/// releases the owning flag slot before the entity is cleared, so the owner
/// can refire on the very next tick.
pub fn projectile_update(pool: &mut EntityPool, flags: &mut FlagTable, slot: usize, dt: f32) {
    let e = pool.get_mut(slot);
    let Some(proj) = e.projectile else {
        return;
    };

    match proj.kind {
        ProjectileKind::Tracked => physics::integrate_position(e, dt),
        ProjectileKind::Meteor => {
            e.vel.y += e.gravity * e.speed * dt;
            e.pos.y += e.vel.y * dt;
        }
        ProjectileKind::Wall => {
            let dir = e.vel.x.signum();
            e.vel.x += dir * e.speed * dt;
            e.pos.x += e.vel.x * dt;
        }
        // player shots are driven by the player module
        ProjectileKind::PlayerShot | ProjectileKind::PlayerChargedShot => return,
    }

    e.lifetime -= dt;
    if e.lifetime <= 0.0 {
        let flag_slot = e.flag_slot;
        flags.release(flag_slot);
        pool.clear(slot);
    }
}

/// Kill an enemy projectile that hit something: latch first, clear second
pub fn remove_projectile(pool: &mut EntityPool, flags: &mut FlagTable, slot: usize) {
    let flag_slot = pool.get(slot).flag_slot;
    flags.release(flag_slot);
    pool.clear(slot);
}

/// Melee/elite contact damage on the shared 2 s cooldown. Returns the damage
/// dealt this tick (0 or 1).
pub fn contact_attack(flag: &mut EnemyFlags, touching: bool, dt: f32) -> i32 {
    let ready = flag.attack_cd.tick(dt);
    if ready && touching {
        flag.attack_cd.trigger(ATTACK_COOLDOWN);
        return 1;
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player_at(x: f32, y: f32) -> Entity {
        let mut p = Entity::cleared();
        p.archetype = Archetype::Player;
        p.active = true;
        p.pos = Vec2::new(x, y);
        p.width = 50.0;
        p.height = 70.0;
        p.radius = 50.0;
        p
    }

    fn registry_with_melee() -> (EntityPool, FlagTable, SpawnRegistry) {
        let mut pool = EntityPool::new();
        let mut flags = FlagTable::new();
        let mut reg = SpawnRegistry::new();
        reg.record(Vec2::new(500.0, 100.0), 0, EnemyKind::Melee);
        spawn_for_room(&mut pool, &mut flags, &reg, 0);
        (pool, flags, reg)
    }

    #[test]
    fn patrol_goes_left_then_right_and_wraps() {
        let mut flag = EnemyFlags::default();
        // sample at 3.5 s
        let mut last = MeleeAction::Chase;
        for _ in 0..35 {
            last = melee_action(&mut flag, false, 0.1);
        }
        assert_eq!(last, MeleeAction::PatrolLeft);

        // at 6.0 s
        for _ in 0..25 {
            last = melee_action(&mut flag, false, 0.1);
        }
        assert_eq!(last, MeleeAction::PatrolRight);

        // at 8.5 s the timer has wrapped, back to left
        for _ in 0..25 {
            last = melee_action(&mut flag, false, 0.1);
        }
        assert_eq!(last, MeleeAction::PatrolLeft);
    }

    #[test]
    fn melee_velocity_sign_matches_patrol() {
        let (mut pool, mut flags, _reg) = registry_with_melee();
        let enemy_slot = Archetype::Enemy.slot_range().start;
        let player = player_at(-10_000.0, 0.0); // far outside detection

        for _ in 0..35 {
            let enemy = pool.get_mut(enemy_slot);
            let mut flag = *flags.get(enemy.flag_slot);
            melee_update(enemy, &player, &mut flag, 0.1);
            *flags.get_mut(enemy.flag_slot) = flag;
        }
        assert!(pool.get(enemy_slot).vel.x < 0.0, "walking left at 3.5 s");

        for _ in 0..50 {
            let enemy = pool.get_mut(enemy_slot);
            let mut flag = *flags.get(enemy.flag_slot);
            melee_update(enemy, &player, &mut flag, 0.1);
            *flags.get_mut(enemy.flag_slot) = flag;
        }
        assert!(pool.get(enemy_slot).vel.x < 0.0, "walking left again at 8.5 s");
    }

    #[test]
    fn melee_chases_toward_player_in_range() {
        let (mut pool, flags, _reg) = registry_with_melee();
        let enemy_slot = Archetype::Enemy.slot_range().start;
        let player = player_at(700.0, 100.0); // inside the 300 radius

        let enemy = pool.get_mut(enemy_slot);
        let mut flag = *flags.get(enemy.flag_slot);
        melee_update(enemy, &player, &mut flag, 0.1);
        assert!(enemy.vel.x > 0.0, "chasing right toward the player");
    }

    #[test]
    fn ranged_fires_once_until_released() {
        let mut pool = EntityPool::new();
        let mut flags = FlagTable::new();
        let mut reg = SpawnRegistry::new();
        reg.record(Vec2::new(100.0, 0.0), 0, EnemyKind::Ranged);
        spawn_for_room(&mut pool, &mut flags, &reg, 0);
        let enemy_slot = Archetype::Enemy.slot_range().start;

        let player_slot = pool.allocate(Archetype::Player).unwrap();
        *pool.get_mut(player_slot) = player_at(200.0, 0.0);

        ranged_update(&mut pool, enemy_slot, player_slot, &mut flags, 0.1);
        let bullet_slot = Archetype::EnemyProjectile.slot_range().start;
        assert!(pool.get(bullet_slot).active);
        assert!(flags.get(0).bullet_in_flight);

        // second shot is suppressed while the first is in flight
        flags.get_mut(0).attack_cd = Cooldown::default();
        ranged_update(&mut pool, enemy_slot, player_slot, &mut flags, 0.1);
        assert!(!pool.get(bullet_slot + 1).active);

        // expire the bullet: latch drops before the slot is cleared
        pool.get_mut(bullet_slot).lifetime = 0.05;
        projectile_update(&mut pool, &mut flags, bullet_slot, 0.1);
        assert!(!flags.get(0).bullet_in_flight);
        assert!(!pool.get(bullet_slot).active);
    }

    #[test]
    fn tracked_bullet_aims_at_player() {
        let mut pool = EntityPool::new();
        let mut flags = FlagTable::new();
        spawn_tracked_bullet(
            &mut pool,
            &mut flags,
            3,
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
        );
        let bullet = pool.get(Archetype::EnemyProjectile.slot_range().start);
        assert!((bullet.vel.x - 1.0).abs() < 1e-6);
        assert_eq!(bullet.flag_slot, 3);
    }

    #[test]
    fn elite_returns_to_anchor() {
        let mut flag = EnemyFlags::default();
        let mut elite = Entity::cleared();
        elite.archetype = Archetype::Elite;
        elite.active = true;
        elite.pos = Vec2::new(300.0, 0.0);
        elite.width = ELITE_WIDTH;
        elite.height = ELITE_HEIGHT;
        elite.radius = ELITE_RADIUS;
        elite.speed = ELITE_SPEED;
        let player = player_at(10_000.0, 0.0);

        elite_update(&mut elite, &player, &mut flag, 0.1);
        assert!(flag.anchored);
        assert_eq!(flag.start_pos_x, 300.0);

        elite.pos.x = 400.0; // displaced right of anchor
        elite_update(&mut elite, &player, &mut flag, 0.1);
        assert!(elite.vel.x < 0.0, "walks back left toward anchor");
    }

    #[test]
    fn boss_timeline_samples() {
        let start_x = 1000.0;
        assert_eq!(boss_action(0.5, start_x, start_x), BossAction::Idle);
        assert_eq!(boss_action(10.0, start_x, start_x), BossAction::AttackOne);
        assert_eq!(boss_action(16.5, start_x, start_x), BossAction::Idle);
        assert_eq!(boss_action(18.0, start_x, start_x), BossAction::AttackTwo);
        assert_eq!(boss_action(21.0, start_x, start_x), BossAction::MoveLeft);
        assert_eq!(boss_action(30.0, start_x, start_x), BossAction::AttackOne);
        assert_eq!(boss_action(43.5, start_x, start_x), BossAction::AttackTwo);
        // past the AttackTwo window: moves right only if left of its start
        assert_eq!(boss_action(44.5, start_x, start_x), BossAction::Idle);
        assert_eq!(
            boss_action(44.5, start_x - 50.0, start_x),
            BossAction::MoveRight
        );
    }

    #[test]
    fn boss_timer_wraps_at_fifty() {
        let mut pool = EntityPool::new();
        let mut flags = FlagTable::new();
        let mut reg = SpawnRegistry::new();
        reg.record(Vec2::new(1000.0, 100.0), 0, EnemyKind::Boss);
        spawn_for_room(&mut pool, &mut flags, &reg, 0);
        let boss_slot = Archetype::Boss.slot_range().start;

        flags.get_mut(0).logic_timer = 49.95;
        boss_update(&mut pool, boss_slot, Vec2::ZERO, &mut flags, 0.1);
        assert_eq!(flags.get(0).logic_timer, 0.0);
    }

    #[test]
    fn flag_table_survives_serde_round_trip() {
        let mut flags = FlagTable::new();
        flags.get_mut(3).patrol_timer = 1.5;
        flags.get_mut(3).bullet_in_flight = true;

        let json = serde_json::to_string(&flags).unwrap();
        let back: FlagTable = serde_json::from_str(&json).unwrap();
        assert_eq!(*back.get(3), *flags.get(3));
        assert_eq!(*back.get(0), EnemyFlags::default());
    }

    #[test]
    fn boss_reserves_seven_flag_slots() {
        let mut reg = SpawnRegistry::new();
        let boss = reg.record(Vec2::ZERO, 0, EnemyKind::Boss);
        let next = reg.record(Vec2::ZERO, 0, EnemyKind::Melee);
        assert_eq!(boss, 0);
        assert_eq!(next, BOSS_RESERVED_SLOTS);
    }

    #[test]
    fn meteors_fill_reserved_slots_over_one_volley() {
        let mut pool = EntityPool::new();
        let mut flags = FlagTable::new();
        let mut reg = SpawnRegistry::new();
        reg.record(Vec2::new(1000.0, 100.0), 0, EnemyKind::Boss);
        spawn_for_room(&mut pool, &mut flags, &reg, 0);
        let boss_slot = Archetype::Boss.slot_range().start;

        // inside the AttackOne window; run the full 5.4 s stagger
        flags.get_mut(0).logic_timer = 2.0;
        for _ in 0..54 {
            flags.get_mut(0).logic_timer = 2.0; // hold the timeline in place
            boss_update(&mut pool, boss_slot, Vec2::new(0.0, 0.0), &mut flags, 0.1);
        }

        let fired: Vec<bool> = (0..5).map(|i| flags.get(i).bullet_in_flight).collect();
        assert_eq!(fired, vec![true; 5]);
        let live = pool.active_slots(Archetype::EnemyProjectile).count();
        assert_eq!(live, 5);
        for (_, e) in pool
            .iter()
            .filter(|(_, e)| e.active && e.archetype == Archetype::EnemyProjectile)
        {
            assert_eq!(e.projectile.unwrap().kind, ProjectileKind::Meteor);
        }
    }

    #[test]
    fn walls_flank_the_player() {
        let mut pool = EntityPool::new();
        let mut flags = FlagTable::new();
        let mut reg = SpawnRegistry::new();
        reg.record(Vec2::new(1000.0, 100.0), 0, EnemyKind::Boss);
        spawn_for_room(&mut pool, &mut flags, &reg, 0);
        let boss_slot = Archetype::Boss.slot_range().start;

        flags.get_mut(0).logic_timer = 17.9; // entering the AttackTwo window
        boss_update(&mut pool, boss_slot, Vec2::new(500.0, 0.0), &mut flags, 0.1);

        let first = Archetype::EnemyProjectile.slot_range().start;
        let (a, b) = (pool.get(first), pool.get(first + 1));
        assert!(a.active && b.active);
        assert_eq!(a.pos.x, 100.0);
        assert_eq!(b.pos.x, 900.0);
        assert!(a.vel.x > 0.0 && b.vel.x < 0.0, "walls converge");
        assert!(flags.get(5).bullet_in_flight && flags.get(6).bullet_in_flight);
    }

    #[test]
    fn contact_attack_respects_cooldown() {
        let mut flag = EnemyFlags::default();
        assert_eq!(contact_attack(&mut flag, true, 0.1), 1);
        assert_eq!(contact_attack(&mut flag, true, 0.1), 0);
        // run out the 2 s cooldown
        for _ in 0..20 {
            contact_attack(&mut flag, false, 0.1);
        }
        assert_eq!(contact_attack(&mut flag, true, 0.1), 1);
    }
}
