//! Per-tick orchestration of the whole simulation
//!
//! [`LevelState`] owns the entity pool, the level graph, the flag table and
//! every other piece of mutable game state. One call to [`LevelState::tick`]
//! advances everything by one frame: timers, behavior, movement, collision
//! resolution, interaction and the room-switch protocol.
//!
//! Two clocks run side by side. `actual_dt` is wall time and drives the
//! player (movement, jumps, own bullets) plus the room fade; `game_dt` is
//! `actual_dt` scaled by slow-time and drives enemies, their projectiles,
//! drops and the day/night cycle.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::audio::GameEvent;
use crate::consts::{
    CHEST_SPAWN_CHANCE, COLLISION_DEAD_ZONE, DOOR_EXIT_OFFSET, PLAYER_HEIGHT, PLAYER_WIDTH,
    SLOW_TIME_SCALE, SOLAR_CHARGE_RATE, SOLAR_DEPLETE_RATE, TILE_SIZE, TRANSITION_FADE_DURATION,
};
use crate::level::{Cell, DoorId, ExitDir, Level, LevelError, RoomId};
use crate::persistence::SaveRecord;

use super::collision::{self, Hit};
use super::daynight::DayNight;
use super::enemy::{self, FlagTable, SpawnRegistry};
use super::entity::{Archetype, EnemyKind, EntityPool, RoomScope, POOL_SIZE};
use super::physics;
use super::pickup::{self, PickupKind};
use super::player::{self, PlayerState};

/// The player always occupies pool slot 0
const PLAYER_SLOT: usize = 0;

/// Renderer viewport, used only to clamp the camera
pub const VIEW_WIDTH: f32 = 1280.0;
pub const VIEW_HEIGHT: f32 = 720.0;
/// Camera follow strength (exponential approach per second)
pub const CAMERA_LERP: f32 = 5.0;

/// Pre-polled input for one tick. The embedding translates whatever raw
/// input it has into this before calling [`LevelState::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TickInput {
    /// Horizontal move axis in [-1, 1]
    pub move_x: f32,
    /// Jump key went down this tick
    pub jump_pressed: bool,
    pub fire_held: bool,
    pub charge_held: bool,
    /// Interact key went down this tick (chests, save points)
    pub interact_pressed: bool,
    /// Slow-time key went down this tick
    pub slow_toggle: bool,
    /// World-space aim point for shots
    pub aim: Vec2,
}

/// Coarse mode the game is in, derived state for the embedding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Playing,
    /// A room-switch fade is running; the world is frozen
    RoomFade,
    /// The boss is down. Play continues but death no longer respawns.
    Victory,
}

/// Smoothed follow camera, locked inside the room bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub pos: Vec2,
}

impl Camera {
    fn follow(&mut self, target: Vec2, bounds: Vec2, dt: f32) {
        let t = (CAMERA_LERP * dt).min(1.0);
        self.pos = self.pos.lerp(target, t);
        self.clamp(bounds);
    }

    fn snap(&mut self, target: Vec2, bounds: Vec2) {
        self.pos = target;
        self.clamp(bounds);
    }

    fn clamp(&mut self, bounds: Vec2) {
        self.pos.x = if bounds.x <= VIEW_WIDTH {
            bounds.x / 2.0
        } else {
            self.pos.x.clamp(VIEW_WIDTH / 2.0, bounds.x - VIEW_WIDTH / 2.0)
        };
        self.pos.y = if bounds.y <= VIEW_HEIGHT {
            bounds.y / 2.0
        } else {
            self.pos.y.clamp(VIEW_HEIGHT / 2.0, bounds.y - VIEW_HEIGHT / 2.0)
        };
    }
}

/// A running room-switch fade. The world swaps at the midpoint; the fade
/// keeps running to full duration on wall time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct RoomFade {
    elapsed: f32,
    /// Destination: the partner door the player arrives at
    door: DoorId,
    swapped: bool,
}

/// The whole mutable game: pool, graph, timers, RNG, event queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelState {
    pool: EntityPool,
    flags: FlagTable,
    registry: SpawnRegistry,
    player: PlayerState,
    daynight: DayNight,
    camera: Camera,
    rng: Pcg32,
    level: Level,
    events: Vec<GameEvent>,
    bounds: Vec2,
    fade: Option<RoomFade>,
    victory: bool,
    save: Option<SaveRecord>,
    spawn_room: RoomId,
    spawn_pos: Vec2,
}

impl LevelState {
    /// Build the full game state from a parsed level. Scans every room for
    /// spawn markers, materializes doors/chests/save points into the pool,
    /// then performs the initial room switch to wherever the player starts
    /// (the save record's room if one is given, the `P` marker otherwise).
    pub fn new(level: Level, seed: u64, save: Option<SaveRecord>) -> Result<LevelState, LevelError> {
        let mut level = level;
        let mut pool = EntityPool::new();
        let mut registry = SpawnRegistry::new();
        let mut spawn: Option<(RoomId, Vec2)> = None;

        for room in level.rooms() {
            for (col, row, cell) in room.cells() {
                let pos = crate::grid_to_world(col, row, room.rows);
                match cell {
                    Cell::PlayerSpawn => {
                        if spawn.is_none() {
                            spawn = Some((room.id, pos));
                        }
                    }
                    Cell::ChestSpawn => {
                        pickup::create_chest(&mut pool, pos, room.id.0);
                    }
                    Cell::SavePoint => {
                        player::create_save_point(&mut pool, pos, room.id.0);
                    }
                    Cell::MeleeSpawn => {
                        registry.record(pos, room.id.0, EnemyKind::Melee);
                    }
                    Cell::RangedSpawn => {
                        registry.record(pos, room.id.0, EnemyKind::Ranged);
                    }
                    Cell::EliteSpawn => {
                        registry.record(pos, room.id.0, EnemyKind::Elite);
                    }
                    Cell::BossSpawn => {
                        registry.record(pos, room.id.0, EnemyKind::Boss);
                    }
                    Cell::Air | Cell::Solid(_) | Cell::Door => {}
                }
            }
        }

        let Some((spawn_room, spawn_pos)) = spawn else {
            return Err(LevelError::NoPlayerSpawn);
        };

        // every door gets a trigger entity up front, active room or not
        for i in 0..level.doors().len() {
            let id = DoorId(i);
            let (pos, height, room) = {
                let d = level.door(id);
                (d.world_pos(), d.world_height(), d.room)
            };
            if let Some(slot) = pool.allocate(Archetype::Door) {
                let e = pool.get_mut(slot);
                e.pos = pos;
                e.width = TILE_SIZE;
                e.height = height;
                e.scope = RoomScope::Room(room.0);
                e.refresh_aabb();
                level.door_mut(id).pool_slot = Some(slot);
            }
        }

        // park all furniture now that allocation is done; first-fit reuses
        // any slot that goes inactive, so none may sleep mid-allocation.
        // switch_to_room wakes the starting room's set.
        for slot in Archetype::Door
            .slot_range()
            .chain(Archetype::Chest.slot_range())
            .chain(Archetype::SavePoint.slot_range())
        {
            pool.get_mut(slot).active = false;
        }

        player::spawn_player(&mut pool, spawn_pos);

        let (start_room, start_pos) = match &save {
            Some(s) if s.room.0 < level.rooms().len() => (s.room, Vec2::new(s.x, s.y)),
            _ => (spawn_room, spawn_pos),
        };

        let mut state = LevelState {
            pool,
            flags: FlagTable::new(),
            registry,
            player: PlayerState::new(),
            daynight: DayNight::new(),
            camera: Camera { pos: start_pos },
            rng: Pcg32::seed_from_u64(seed),
            level,
            events: Vec::new(),
            bounds: Vec2::ZERO,
            fade: None,
            victory: false,
            save,
            spawn_room,
            spawn_pos,
        };
        state.switch_to_room(start_room, start_pos);
        Ok(state)
    }

    /// Advance the whole simulation by one frame
    pub fn tick(&mut self, input: &TickInput, actual_dt: f32) {
        if self.fade.is_some() {
            self.advance_fade(actual_dt);
            return;
        }

        let (game_dt, slow_ran) = self.update_time_scale(input, actual_dt);

        if let Some(phase) = self.daynight.tick(game_dt) {
            log::debug!("day phase changed to {phase:?}");
        }
        if !slow_ran && self.daynight.solar_charging() {
            self.player.solar_energy = (self.player.solar_energy + SOLAR_CHARGE_RATE * game_dt)
                .min(self.player.solar_energy_max);
        }

        self.update_player(input, actual_dt);
        self.update_bullets(actual_dt);
        self.update_enemies(game_dt);
        self.update_enemy_projectiles(game_dt);
        self.update_pickups(actual_dt, game_dt);

        self.collide_world();
        self.collide_combat(game_dt);
        self.collide_interactables(input);

        if self.pool.get(PLAYER_SLOT).health <= 0 {
            self.handle_player_death();
        }

        let target = self.pool.get(PLAYER_SLOT).pos;
        self.camera.follow(target, self.bounds, actual_dt);
    }

    /// Toggle/drain slow-time. Returns the scaled gameplay delta and whether
    /// slow-time drained this frame; a frame that drains the meter dry must
    /// not also recharge it.
    fn update_time_scale(&mut self, input: &TickInput, actual_dt: f32) -> (f32, bool) {
        if input.slow_toggle {
            if self.player.slow_time {
                self.player.slow_time = false;
            } else if self.player.solar_energy > 0.0 {
                self.player.slow_time = true;
            }
        }
        let slow_ran = self.player.slow_time;

        if self.player.slow_time {
            // drain runs on wall time so slowing time never stretches the meter
            self.player.solar_energy -= SOLAR_DEPLETE_RATE * actual_dt;
            if self.player.solar_energy <= 0.0 {
                self.player.solar_energy = 0.0;
                self.player.slow_time = false;
            }
        }

        let game_dt = if self.player.slow_time {
            actual_dt * SLOW_TIME_SCALE
        } else {
            actual_dt
        };
        (game_dt, slow_ran)
    }

    fn update_player(&mut self, input: &TickInput, actual_dt: f32) {
        let bounds = self.bounds;
        let e = self.pool.get_mut(PLAYER_SLOT);
        player::horizontal_update(e, input.move_x, actual_dt, bounds);
        player::jump_update(&mut self.player, e, input.jump_pressed, actual_dt);
        let from = e.pos;

        player::fire_update(
            &mut self.player,
            &mut self.pool,
            from,
            input.aim,
            input.fire_held,
            input.charge_held,
            actual_dt,
            &mut self.events,
        );
    }

    fn update_bullets(&mut self, actual_dt: f32) {
        for slot in Archetype::AllyProjectile.slot_range() {
            if self.pool.get(slot).active {
                player::bullet_update(&mut self.pool, slot, actual_dt);
            }
        }
    }

    fn update_enemies(&mut self, game_dt: f32) {
        let player_pos = self.pool.get(PLAYER_SLOT).pos;

        for slot in Archetype::Enemy.slot_range() {
            if !self.pool.get(slot).active {
                continue;
            }
            if self.pool.get(slot).knockback.active {
                physics::apply_knockback(self.pool.get_mut(slot), game_dt);
                continue;
            }
            match self.pool.get(slot).enemy_kind {
                Some(EnemyKind::Melee) => {
                    let (e, p) = self.pool.pair_mut(slot, PLAYER_SLOT);
                    let fs = e.flag_slot;
                    enemy::melee_update(e, p, self.flags.get_mut(fs), game_dt);
                }
                Some(EnemyKind::Ranged) => {
                    enemy::ranged_update(&mut self.pool, slot, PLAYER_SLOT, &mut self.flags, game_dt);
                }
                _ => {}
            }
        }

        for slot in Archetype::Elite.slot_range() {
            if !self.pool.get(slot).active {
                continue;
            }
            if self.pool.get(slot).knockback.active {
                physics::apply_knockback(self.pool.get_mut(slot), game_dt);
                continue;
            }
            let (e, p) = self.pool.pair_mut(slot, PLAYER_SLOT);
            let fs = e.flag_slot;
            enemy::elite_update(e, p, self.flags.get_mut(fs), game_dt);
        }

        for slot in Archetype::Boss.slot_range() {
            if self.pool.get(slot).active {
                enemy::boss_update(&mut self.pool, slot, player_pos, &mut self.flags, game_dt);
            }
        }
    }

    fn update_enemy_projectiles(&mut self, game_dt: f32) {
        for slot in Archetype::EnemyProjectile.slot_range() {
            if self.pool.get(slot).active {
                enemy::projectile_update(&mut self.pool, &mut self.flags, slot, game_dt);
            }
        }
    }

    fn update_pickups(&mut self, actual_dt: f32, game_dt: f32) {
        for slot in Archetype::Pickup.slot_range() {
            if !self.pool.get(slot).active {
                continue;
            }
            let e = self.pool.get_mut(slot);
            if !e.loot.collision {
                pickup::grace_tick(e, actual_dt);
            }
            pickup::drop_movement(e, game_dt);
            pickup::lifetime_tick(&mut self.pool, slot, game_dt);
        }
    }

    /// Resolve everything against the solid grid, plus the floor clamp
    fn collide_world(&mut self) {
        // player vs grid, the only snap that refills the jump budget
        let mut grounded = false;
        for t in Archetype::Grid.slot_range() {
            if !self.pool.get(t).active {
                continue;
            }
            let (p, tile) = self.pool.pair_mut(PLAYER_SLOT, t);
            if let Some(hit) = collision::directional_intersect(p, tile, COLLISION_DEAD_ZONE) {
                collision::snap(p, tile, hit);
                if hit == Hit::Bottom {
                    grounded = true;
                }
            }
        }
        {
            let p = self.pool.get_mut(PLAYER_SLOT);
            let before = p.pos.y;
            physics::prevent_below_ground(p);
            if p.pos.y != before {
                grounded = true;
            }
        }
        if grounded {
            player::land(&mut self.player);
        }

        // walkers vs grid
        for slot in Archetype::Enemy
            .slot_range()
            .chain(Archetype::Elite.slot_range())
            .chain(Archetype::Boss.slot_range())
        {
            if !self.pool.get(slot).active {
                continue;
            }
            for t in Archetype::Grid.slot_range() {
                if !self.pool.get(t).active {
                    continue;
                }
                let (e, tile) = self.pool.pair_mut(slot, t);
                if let Some(hit) = collision::directional_intersect(e, tile, COLLISION_DEAD_ZONE) {
                    collision::snap(e, tile, hit);
                    if hit == Hit::Bottom {
                        e.vel.y = 0.0;
                    }
                }
            }
            let e = self.pool.get_mut(slot);
            let before = e.pos.y;
            physics::prevent_below_ground(e);
            if e.pos.y != before {
                e.vel.y = 0.0;
            }
        }

        // drops settle on the grid
        for slot in Archetype::Pickup.slot_range() {
            if !self.pool.get(slot).active || !self.pool.get(slot).loot.collision {
                continue;
            }
            for t in Archetype::Grid.slot_range() {
                if !self.pool.get(t).active {
                    continue;
                }
                let (d, tile) = self.pool.pair_mut(slot, t);
                if let Some(hit) = collision::vertical_intersect(d, tile) {
                    collision::snap(d, tile, hit);
                    d.vel.y = 0.0;
                }
            }
            let d = self.pool.get_mut(slot);
            let before = d.pos.y;
            physics::prevent_below_ground(d);
            if d.pos.y != before {
                d.vel.y = 0.0;
            }
        }

        // bullets die on solids
        for slot in Archetype::AllyProjectile.slot_range() {
            if !self.pool.get(slot).active {
                continue;
            }
            if self.overlaps_grid(slot) {
                self.pool.clear(slot);
            }
        }
        for slot in Archetype::EnemyProjectile.slot_range() {
            if !self.pool.get(slot).active {
                continue;
            }
            if self.overlaps_grid(slot) {
                enemy::remove_projectile(&mut self.pool, &mut self.flags, slot);
            }
        }
    }

    fn overlaps_grid(&self, slot: usize) -> bool {
        let e = self.pool.get(slot);
        Archetype::Grid
            .slot_range()
            .any(|t| self.pool.get(t).active && collision::boxes_intersect(e, self.pool.get(t)))
    }

    fn collide_combat(&mut self, game_dt: f32) {
        // player bullets vs every enemy archetype
        for b in Archetype::AllyProjectile.slot_range() {
            let bullet = self.pool.get(b);
            if !bullet.active || bullet.projectile.is_none_or(|p| !p.armed) {
                continue;
            }
            for es in Archetype::Enemy
                .slot_range()
                .chain(Archetype::Elite.slot_range())
                .chain(Archetype::Boss.slot_range())
            {
                if !self.pool.get(es).active {
                    continue;
                }
                let (bullet, target) = self.pool.pair_mut(b, es);
                if !collision::boxes_intersect(bullet, target) {
                    continue;
                }

                let damage = bullet.projectile.map_or(0, |p| p.damage);
                target.health -= damage;
                // melee and elite stagger; ranged and boss hold their ground
                if target.archetype != Archetype::Boss
                    && target.enemy_kind != Some(EnemyKind::Ranged)
                {
                    target.knockback.start(
                        player::knock_dir_from_bullet(bullet.vel.x),
                        crate::consts::KNOCKBACK_DURATION,
                    );
                }
                let dead = target.health <= 0;
                let death_pos = target.pos;
                let was_boss = target.archetype == Archetype::Boss;

                self.pool.clear(b);
                self.events.push(GameEvent::EnemyHit);

                if dead {
                    self.pool.clear(es);
                    if was_boss {
                        self.victory = true;
                        self.events.push(GameEvent::BossDefeated);
                        log::info!("boss defeated");
                    } else {
                        pickup::spawn_enemy_drop(&mut self.pool, &mut self.rng, death_pos);
                    }
                }
                break; // bullet is spent
            }
        }

        // melee/elite contact damage
        for es in Archetype::Enemy
            .slot_range()
            .chain(Archetype::Elite.slot_range())
        {
            if !self.pool.get(es).active {
                continue;
            }
            // ranged enemies own their cooldown in ranged_update
            if self.pool.get(es).enemy_kind == Some(EnemyKind::Ranged) {
                continue;
            }
            let (e, p) = self.pool.pair_mut(es, PLAYER_SLOT);
            let touching = collision::boxes_intersect(e, p);
            let fs = e.flag_slot;
            p.health -= enemy::contact_attack(self.flags.get_mut(fs), touching, game_dt);
        }

        // enemy projectiles vs the player
        for ps in Archetype::EnemyProjectile.slot_range() {
            if !self.pool.get(ps).active {
                continue;
            }
            let damage = {
                let (proj, p) = self.pool.pair_mut(ps, PLAYER_SLOT);
                match proj.projectile {
                    Some(pr) if pr.armed && collision::boxes_intersect(proj, p) => Some(pr.damage),
                    _ => None,
                }
            };
            if let Some(damage) = damage {
                self.pool.get_mut(PLAYER_SLOT).health -= damage;
                enemy::remove_projectile(&mut self.pool, &mut self.flags, ps);
            }
        }
    }

    fn collide_interactables(&mut self, input: &TickInput) {
        // pickups collect on touch once their grace ends
        for slot in Archetype::Pickup.slot_range() {
            let kind = {
                let d = self.pool.get(slot);
                if !d.active || !d.loot.collision {
                    continue;
                }
                if collision::boxes_intersect(d, self.pool.get(PLAYER_SLOT)) {
                    d.pickup_kind
                } else {
                    None
                }
            };
            if let Some(kind) = kind {
                self.apply_pickup(kind);
                self.pool.clear(slot);
                self.events.push(GameEvent::PickupCollected);
            }
        }

        if input.interact_pressed {
            for slot in Archetype::Chest.slot_range() {
                let chest = self.pool.get(slot);
                if chest.active
                    && !chest.loot.opened
                    && collision::boxes_intersect(chest, self.pool.get(PLAYER_SLOT))
                {
                    pickup::open_chest(&mut self.pool, &mut self.rng, slot);
                    self.events.push(GameEvent::ChestOpened);
                }
            }

            for slot in Archetype::SavePoint.slot_range() {
                let sp = self.pool.get(slot);
                if sp.active && collision::boxes_intersect(sp, self.pool.get(PLAYER_SLOT)) {
                    self.write_save(slot);
                    self.events.push(GameEvent::SavePointToggled);
                }
            }
        }

        // touching an active door begins the switch
        for slot in Archetype::Door.slot_range() {
            let door = self.pool.get(slot);
            if !door.active || !collision::boxes_intersect(door, self.pool.get(PLAYER_SLOT)) {
                continue;
            }
            if let Some(id) = self.level.door_by_pool_slot(slot) {
                self.start_room_switch(id);
                break;
            }
        }
    }

    fn apply_pickup(&mut self, kind: PickupKind) {
        let e = self.pool.get_mut(PLAYER_SLOT);
        pickup::apply_pickup(kind, &mut self.player, e);
    }

    /// Record the current run at a save point and move the latch there
    fn write_save(&mut self, save_slot: usize) {
        let p = self.pool.get(PLAYER_SLOT);
        self.save = Some(SaveRecord {
            health: p.health,
            energy: self.player.solar_energy,
            energy_max: self.player.solar_energy_max,
            attack: self.player.buff_attack,
            fire_rate: self.player.buff_fire_rate,
            room: self.level.active_room_id(),
            x: p.pos.x,
            y: p.pos.y,
        });
        for slot in Archetype::SavePoint.slot_range() {
            self.pool.get_mut(slot).loot.opened = slot == save_slot;
        }
        log::info!("game saved in room {}", self.level.active_room_id().0);
    }

    /// Begin the fade toward a door's partner. Unlinked doors do nothing.
    fn start_room_switch(&mut self, door: DoorId) {
        let Some(partner) = self.level.door(door).partner else {
            return;
        };
        self.player.cancel_charge();
        self.fade = Some(RoomFade {
            elapsed: 0.0,
            door: partner,
            swapped: false,
        });
    }

    /// Drive the fade on wall time; the world swap happens once at the
    /// midpoint while the screen is fully dark.
    fn advance_fade(&mut self, actual_dt: f32) {
        let Some(mut fade) = self.fade else {
            return;
        };
        fade.elapsed += actual_dt;

        if !fade.swapped && fade.elapsed >= TRANSITION_FADE_DURATION / 2.0 {
            fade.swapped = true;
            let (room, pos) = self.arrival_for(fade.door);
            self.switch_to_room(room, pos);
        }

        if fade.elapsed >= TRANSITION_FADE_DURATION {
            self.fade = None;
            self.events.push(GameEvent::RoomTransitionDone);
        } else {
            self.fade = Some(fade);
        }
    }

    /// Where the player lands when coming out of `door`: one tile plus a
    /// small fraction of the player's extent, along the door's exit
    /// direction. An arrival door's exit points into its room.
    fn arrival_for(&self, door: DoorId) -> (RoomId, Vec2) {
        let d = self.level.door(door);
        let mut pos = d.world_pos();
        match d.exit {
            ExitDir::Left => pos.x -= TILE_SIZE + DOOR_EXIT_OFFSET * PLAYER_WIDTH,
            ExitDir::Right => pos.x += TILE_SIZE + DOOR_EXIT_OFFSET * PLAYER_WIDTH,
            ExitDir::Down => pos.y -= TILE_SIZE + DOOR_EXIT_OFFSET * PLAYER_HEIGHT,
            ExitDir::Up => pos.y += TILE_SIZE + DOOR_EXIT_OFFSET * PLAYER_HEIGHT,
        }
        (d.room, pos)
    }

    /// The room-switch protocol. Tears down the old room, sweeps transients
    /// (releasing projectile latches first), builds the new room's grid and
    /// furniture, respawns its enemies and places the player.
    fn switch_to_room(&mut self, room: RoomId, arrival: Vec2) {
        let old = self.level.active_room_id();

        player::reset_bullets(&mut self.pool, &mut self.player);
        self.player.cancel_charge();

        for slot in Archetype::Grid.slot_range() {
            self.pool.clear(slot);
        }

        self.level.set_active_room(room);

        if old != room {
            for slot in Archetype::Door.slot_range() {
                let e = self.pool.get_mut(slot);
                if e.scope == RoomScope::Room(old.0) {
                    e.active = false;
                }
            }
        }
        for slot in Archetype::Chest.slot_range() {
            let e = self.pool.get_mut(slot);
            if e.scope == RoomScope::Room(old.0) {
                e.active = false;
                e.loot.opened = false;
            }
        }
        for slot in Archetype::SavePoint.slot_range() {
            let e = self.pool.get_mut(slot);
            if e.scope == RoomScope::Room(old.0) {
                e.active = false;
            }
        }
        for slot in Archetype::Enemy
            .slot_range()
            .chain(Archetype::Elite.slot_range())
            .chain(Archetype::Boss.slot_range())
        {
            self.pool.clear(slot);
        }

        // transient sweep; latch release must precede the clear
        for slot in 0..POOL_SIZE {
            let e = self.pool.get(slot);
            if !e.active || e.scope != RoomScope::Transient {
                continue;
            }
            if e.projectile.is_some() {
                let fs = e.flag_slot;
                self.flags.release(fs);
            }
            self.pool.clear(slot);
        }

        // new room: grid first, then furniture, then enemies
        let (solids, bounds) = {
            let r = self.level.room(room);
            let solids: Vec<Vec2> = r
                .cells()
                .filter(|(_, _, c)| matches!(c, Cell::Solid(_)))
                .map(|(col, row, _)| crate::grid_to_world(col, row, r.rows))
                .collect();
            (solids, r.world_bounds())
        };
        for pos in solids {
            if let Some(slot) = self.pool.allocate(Archetype::Grid) {
                let e = self.pool.get_mut(slot);
                e.pos = pos;
                e.width = TILE_SIZE;
                e.height = TILE_SIZE;
                e.refresh_aabb();
            }
        }

        for slot in Archetype::Door.slot_range() {
            let e = self.pool.get_mut(slot);
            if e.scope == RoomScope::Room(room.0) && e.archetype == Archetype::Door {
                e.active = true;
            }
        }
        for slot in Archetype::Chest.slot_range() {
            if self.pool.get(slot).scope == RoomScope::Room(room.0)
                && self.pool.get(slot).archetype == Archetype::Chest
            {
                let appears = self.rng.random_bool(CHEST_SPAWN_CHANCE);
                let e = self.pool.get_mut(slot);
                e.active = appears;
                e.loot.opened = false;
            }
        }
        for slot in Archetype::SavePoint.slot_range() {
            let e = self.pool.get_mut(slot);
            if e.scope == RoomScope::Room(room.0) && e.archetype == Archetype::SavePoint {
                e.active = true;
            }
        }

        enemy::spawn_for_room(&mut self.pool, &mut self.flags, &self.registry, room.0);

        self.bounds = bounds;
        let p = self.pool.get_mut(PLAYER_SLOT);
        p.pos = arrival;
        p.vel = Vec2::ZERO;
        p.refresh_aabb();
        self.camera.snap(arrival, bounds);

        log::debug!("switched to room {}", room.0);
    }

    /// Death: full stat reset, then respawn at the save record (if any)
    /// or the level's spawn marker. After victory, death is ignored.
    fn handle_player_death(&mut self) {
        if self.victory {
            return;
        }
        self.events.push(GameEvent::PlayerDied);
        self.player.reset_stats();

        let p = self.pool.get_mut(PLAYER_SLOT);
        p.health = p.health_max;
        p.vel = Vec2::ZERO;

        let (room, pos) = match &self.save {
            Some(s) if s.room.0 < self.level.rooms().len() => (s.room, Vec2::new(s.x, s.y)),
            _ => (self.spawn_room, self.spawn_pos),
        };
        self.switch_to_room(room, pos);
    }

    // accessors for the embedding

    pub fn pool(&self) -> &EntityPool {
        &self.pool
    }

    pub fn player(&self) -> &PlayerState {
        &self.player
    }

    pub fn daynight(&self) -> &DayNight {
        &self.daynight
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn bounds(&self) -> Vec2 {
        self.bounds
    }

    pub fn phase(&self) -> GamePhase {
        if self.fade.is_some() {
            GamePhase::RoomFade
        } else if self.victory {
            GamePhase::Victory
        } else {
            GamePhase::Playing
        }
    }

    /// Fade overlay opacity for the renderer: 0 → 1 → 0 over the fade
    pub fn fade_alpha(&self) -> f32 {
        match &self.fade {
            None => 0.0,
            Some(f) => {
                let half = TRANSITION_FADE_DURATION / 2.0;
                if f.elapsed < half {
                    f.elapsed / half
                } else {
                    ((TRANSITION_FADE_DURATION - f.elapsed) / half).max(0.0)
                }
            }
        }
    }

    /// The latest save record, for the embedding to persist
    pub fn save_record(&self) -> Option<SaveRecord> {
        self.save
    }

    /// Take all events queued since the last drain, in occurrence order
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{PLAYER_MAX_HEALTH, SOLAR_ENERGY_MAX};

    // two rooms joined by a door pair; floor along the bottom.
    // door exits point into their own room: that is the arrival direction.
    const ROOM_A: &str = "\
6,10
0,0,0,0,0,0,0,0,0,0
0,0,0,0,0,0,0,0,0,0
0,0,0,0,0,0,0,0,0,0
0,0,0,0,0,0,0,0,0,0
0,P,0,S,0,L,0,E,0,D1<1
1,1,1,1,1,1,1,1,1,1";

    const ROOM_B: &str = "\
6,10
0,0,0,0,0,0,0,0,0,0
0,0,0,0,0,0,0,0,0,0
0,0,0,0,0,0,0,0,0,0
0,0,0,0,0,0,0,0,0,0
D1>1,0,0,R,0,L,0,0,B,0
1,1,1,1,1,1,1,1,1,1";

    fn state() -> LevelState {
        let level = Level::from_rooms(&[ROOM_A, ROOM_B]).unwrap();
        LevelState::new(level, 42, None).unwrap()
    }

    fn idle() -> TickInput {
        TickInput::default()
    }

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn new_places_player_at_spawn_marker() {
        let s = state();
        let p = s.pool().get(PLAYER_SLOT);
        assert!(p.active);
        assert_eq!(p.health, PLAYER_MAX_HEALTH);
        // P marker is at grid (1, 4) of a 6-row room, world y = row 1
        assert_eq!(p.pos, crate::grid_to_world(1, 4, 6));
        assert_eq!(s.level().active_room_id(), RoomId(0));
        assert_eq!(s.bounds(), Vec2::new(500.0, 300.0));
    }

    #[test]
    fn initial_room_has_grid_and_furniture() {
        let s = state();
        assert_eq!(s.pool().active_slots(Archetype::Grid).count(), 10);
        assert_eq!(s.pool().active_slots(Archetype::Door).count(), 1);
        assert_eq!(s.pool().active_slots(Archetype::SavePoint).count(), 1);
        // room A's melee spawned, room B's ranged and boss did not
        assert_eq!(s.pool().active_slots(Archetype::Enemy).count(), 1);
        assert_eq!(s.pool().active_slots(Archetype::Boss).count(), 0);
    }

    #[test]
    fn player_lands_on_floor_and_regains_jumps() {
        let mut s = state();
        for _ in 0..120 {
            s.tick(&idle(), DT);
        }
        let p = s.pool().get(PLAYER_SLOT);
        // resting on the floor row: bottom edge flush with tile top
        let floor_top = TILE_SIZE;
        assert!((p.pos.y - (floor_top + p.height / 2.0)).abs() < 2.0);
        assert_eq!(s.player().jump_remaining, crate::consts::PLAYER_JUMP_COUNT);
    }

    #[test]
    fn door_contact_fades_and_switches_rooms() {
        let mut s = state();
        // stand the player inside the door trigger
        let door_pos = s.level().door(DoorId(0)).world_pos();
        s.pool.get_mut(PLAYER_SLOT).pos = door_pos;
        s.tick(&idle(), DT);
        assert_eq!(s.phase(), GamePhase::RoomFade);
        s.tick(&idle(), DT);
        assert!(s.fade_alpha() > 0.0);

        // run the full fade out
        for _ in 0..70 {
            s.tick(&idle(), DT);
        }
        assert_eq!(s.phase(), GamePhase::Playing);
        assert_eq!(s.level().active_room_id(), RoomId(1));
        assert!(s.drain_events().contains(&GameEvent::RoomTransitionDone));

        // arrived one tile plus a fifth of the player's width along the
        // partner door's exit, which points right into room B
        let partner = s.level().door(DoorId(1));
        let p = s.pool().get(PLAYER_SLOT);
        let expected_x = partner.world_pos().x + TILE_SIZE + DOOR_EXIT_OFFSET * PLAYER_WIDTH;
        assert!((p.pos.x - expected_x).abs() < 1e-3);

        // room B's enemies are up now
        assert_eq!(s.pool().active_slots(Archetype::Boss).count(), 1);
        assert_eq!(s.pool().active_slots(Archetype::Enemy).count(), 1);
    }

    #[test]
    fn each_door_keeps_its_own_pool_slot() {
        let s = state();
        let a = s.level().door(DoorId(0)).pool_slot.unwrap();
        let b = s.level().door(DoorId(1)).pool_slot.unwrap();
        assert_ne!(a, b);
        assert_eq!(s.pool().get(a).archetype, Archetype::Door);
        assert_eq!(s.pool().get(b).archetype, Archetype::Door);
    }

    #[test]
    fn arriving_room_door_is_active_after_switch() {
        let mut s = state();
        let here = s.level().door(DoorId(0)).pool_slot.unwrap();
        let there = s.level().door(DoorId(1)).pool_slot.unwrap();
        assert!(s.pool().get(here).active);
        assert!(!s.pool().get(there).active);

        let arrival = s.arrival_for(DoorId(1));
        s.switch_to_room(arrival.0, arrival.1);
        assert!(s.pool().get(there).active);
        assert!(!s.pool().get(here).active);
    }

    #[test]
    fn furniture_occupies_distinct_slots() {
        let s = state();
        let chests: Vec<usize> = Archetype::Chest
            .slot_range()
            .filter(|&i| s.pool().get(i).archetype == Archetype::Chest)
            .collect();
        assert_eq!(chests.len(), 2, "one chest placement per room");
        assert_ne!(
            s.pool().get(chests[0]).scope,
            s.pool().get(chests[1]).scope
        );
    }

    #[test]
    fn room_switch_sweeps_transients() {
        let mut s = state();
        pickup::spawn_pickup(&mut s.pool, Vec2::new(100.0, 100.0), PickupKind::HealthRegen);
        assert_eq!(s.pool().active_slots(Archetype::Pickup).count(), 1);

        let arrival = s.arrival_for(DoorId(1));
        s.switch_to_room(arrival.0, arrival.1);
        assert_eq!(s.pool().active_slots(Archetype::Pickup).count(), 0);
        assert_eq!(s.pool().active_slots(Archetype::AllyProjectile).count(), 0);
    }

    #[test]
    fn firing_emits_event_and_damages_enemy() {
        let mut s = state();
        // park the player next to the melee enemy and shoot at it
        let enemy_slot = Archetype::Enemy.slot_range().start;
        let enemy_pos = s.pool().get(enemy_slot).pos;
        s.pool.get_mut(PLAYER_SLOT).pos = enemy_pos - Vec2::new(100.0, 0.0);

        let input = TickInput {
            fire_held: true,
            aim: enemy_pos,
            ..TickInput::default()
        };
        let hp_before = s.pool().get(enemy_slot).health;
        for _ in 0..30 {
            s.tick(&input, DT);
            // keep the player pinned so the enemy cannot shove it away
            s.pool.get_mut(PLAYER_SLOT).pos = enemy_pos - Vec2::new(100.0, 0.0);
        }
        let events = s.drain_events();
        assert!(events.contains(&GameEvent::ShotFired));
        assert!(events.contains(&GameEvent::EnemyHit));
        let e = s.pool().get(enemy_slot);
        assert!(!e.active || e.health < hp_before);
    }

    #[test]
    fn ranged_enemies_shrug_off_knockback() {
        let mut s = state();
        let arrival = s.arrival_for(DoorId(1));
        s.switch_to_room(arrival.0, arrival.1);

        let ranged_slot = Archetype::Enemy.slot_range().start;
        assert_eq!(
            s.pool().get(ranged_slot).enemy_kind,
            Some(EnemyKind::Ranged)
        );
        let pos = s.pool().get(ranged_slot).pos;
        let hp_before = s.pool().get(ranged_slot).health;

        let input = TickInput {
            fire_held: true,
            aim: pos,
            ..TickInput::default()
        };
        for _ in 0..30 {
            s.pool.get_mut(PLAYER_SLOT).pos = pos + Vec2::new(100.0, 0.0);
            s.tick(&input, DT);
            if s.pool().get(ranged_slot).health < hp_before {
                break;
            }
        }
        let e = s.pool().get(ranged_slot);
        assert!(e.health < hp_before, "the shot connected");
        assert!(!e.knockback.active, "ranged enemies hold their ground");
        assert_eq!(e.pos.x, pos.x);
    }

    #[test]
    fn slow_time_drains_solar_and_scales_the_clock() {
        let mut s = state();
        let toggle = TickInput {
            slow_toggle: true,
            ..TickInput::default()
        };
        s.tick(&toggle, DT);
        assert!(s.player().slow_time);

        let day_before = s.daynight().remaining();
        let solar_before = s.player().solar_energy;
        for _ in 0..60 {
            s.tick(&idle(), DT);
        }
        // one wall second passed, the day clock moved a quarter of that
        let day_elapsed = day_before - s.daynight().remaining();
        assert!((day_elapsed - 0.25).abs() < 0.02);
        assert!(s.player().solar_energy < solar_before);

        // drain to empty: slow-time switches itself off
        s.player.solar_energy = 0.01;
        s.tick(&idle(), DT);
        assert!(!s.player().slow_time);
        assert_eq!(s.player().solar_energy, 0.0);
    }

    #[test]
    fn save_point_interaction_writes_a_record() {
        let mut s = state();
        let sp_slot = Archetype::SavePoint.slot_range().start;
        let sp_pos = s.pool().get(sp_slot).pos;
        s.pool.get_mut(PLAYER_SLOT).pos = sp_pos;

        let input = TickInput {
            interact_pressed: true,
            ..TickInput::default()
        };
        s.tick(&input, DT);

        let rec = s.save_record().unwrap();
        assert_eq!(rec.room, RoomId(0));
        assert!(s.pool().get(sp_slot).loot.opened, "latch moved to this point");
        assert!(s.drain_events().contains(&GameEvent::SavePointToggled));
    }

    #[test]
    fn death_without_save_respawns_at_marker() {
        let mut s = state();
        s.pool.get_mut(PLAYER_SLOT).pos = Vec2::new(400.0, 100.0);
        s.player.buff_attack = 3;
        s.pool.get_mut(PLAYER_SLOT).health = 0;
        s.tick(&idle(), DT);

        let p = s.pool().get(PLAYER_SLOT);
        assert_eq!(p.health, PLAYER_MAX_HEALTH);
        assert_eq!(p.pos, crate::grid_to_world(1, 4, 6));
        assert_eq!(s.player().buff_attack, 1, "buffs reset on death");
        assert!(s.drain_events().contains(&GameEvent::PlayerDied));
    }

    #[test]
    fn death_with_save_respawns_at_the_record() {
        let mut s = state();
        s.save = Some(SaveRecord {
            health: 5,
            energy: 10.0,
            energy_max: SOLAR_ENERGY_MAX,
            attack: 1,
            fire_rate: 2.0,
            room: RoomId(1),
            x: 200.0,
            y: 125.0,
        });
        s.pool.get_mut(PLAYER_SLOT).health = 0;
        s.tick(&idle(), DT);

        assert_eq!(s.level().active_room_id(), RoomId(1));
        let p = s.pool().get(PLAYER_SLOT);
        assert_eq!(p.pos, Vec2::new(200.0, 125.0));
        assert_eq!(p.health, PLAYER_MAX_HEALTH);
    }

    #[test]
    fn boss_kill_latches_victory_and_ignores_death() {
        let mut s = state();
        let arrival = s.arrival_for(DoorId(1));
        s.switch_to_room(arrival.0, arrival.1);
        let boss_slot = Archetype::Boss.slot_range().start;
        assert!(s.pool().get(boss_slot).active);

        // point-blank execution
        s.pool.get_mut(boss_slot).health = 1;
        let boss_pos = s.pool().get(boss_slot).pos;
        s.pool.get_mut(PLAYER_SLOT).pos = boss_pos - Vec2::new(60.0, 0.0);
        let input = TickInput {
            fire_held: true,
            aim: boss_pos,
            ..TickInput::default()
        };
        for _ in 0..30 {
            s.tick(&input, DT);
            if s.phase() == GamePhase::Victory {
                break;
            }
            s.pool.get_mut(PLAYER_SLOT).pos = boss_pos - Vec2::new(60.0, 0.0);
        }
        assert_eq!(s.phase(), GamePhase::Victory);
        assert!(s.drain_events().contains(&GameEvent::BossDefeated));

        // death is a no-op now
        s.pool.get_mut(PLAYER_SLOT).health = 0;
        s.tick(&idle(), DT);
        assert!(!s.drain_events().contains(&GameEvent::PlayerDied));
    }

    #[test]
    fn camera_clamps_inside_small_rooms() {
        let mut s = state();
        // room is 500x300, smaller than the viewport: camera centers
        for _ in 0..10 {
            s.tick(&idle(), DT);
        }
        assert_eq!(s.camera().pos, Vec2::new(250.0, 150.0));
    }

    #[test]
    fn no_spawn_marker_is_a_load_error() {
        let bare = "\
2,2
0,0
1,1";
        let level = Level::from_rooms(&[bare]).unwrap();
        assert!(matches!(
            LevelState::new(level, 1, None),
            Err(LevelError::NoPlayerSpawn)
        ));
    }
}
