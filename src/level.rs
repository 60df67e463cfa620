//! Room/door level graph and level-data parsing
//!
//! A level is a list of room CSVs named by a top-level room-list CSV. Each
//! room file starts with a `rows,cols` header followed by the grid, row 0
//! topmost. Cells are either bare integers (collision tiles, background
//! codes) or letter markers for spawn points and doors:
//!
//! - `D<height><dir><id>` door, e.g. `D2>7`: two extra tiles tall, exits
//!   rightward, link id 7
//! - `P` player spawn, `L` chest, `E` melee, `EE` elite, `R` ranged,
//!   `B` boss, `S` save point; all but `D` take an optional background
//!   code suffix
//! - `10`..`12` are background visuals routed to the separate BG grid
//!
//! Doors link in pairs by shared link id, resolved after all rooms parse.
//! Malformed data fails the whole load; the graph is immutable afterward.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{HALF_TILE_SIZE, TILE_SIZE};
use glam::Vec2;

#[derive(Debug, Error)]
pub enum LevelError {
    #[error("io error reading level data: {0}")]
    Io(#[from] std::io::Error),
    #[error("level lists no rooms")]
    EmptyLevel,
    #[error("level has no player spawn marker")]
    NoPlayerSpawn,
    #[error("room {room}: bad dimensions header")]
    BadDimensions { room: usize },
    #[error("room {room}: expected {expected} rows, found {found}")]
    RowCount {
        room: usize,
        expected: usize,
        found: usize,
    },
    #[error("room {room} row {row}: expected {expected} columns, found {found}")]
    ColCount {
        room: usize,
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("room {room} ({row},{col}): unrecognized cell {cell:?}")]
    BadCell {
        room: usize,
        row: usize,
        col: usize,
        cell: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DoorId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitDir {
    Left,
    Right,
    Up,
    Down,
}

/// One parsed grid cell. Solid tiles keep their texture code (1..=4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Air,
    Solid(u8),
    Door,
    PlayerSpawn,
    ChestSpawn,
    MeleeSpawn,
    RangedSpawn,
    EliteSpawn,
    BossSpawn,
    SavePoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub rows: usize,
    pub cols: usize,
    grid: Vec<Cell>,
    bg: Vec<u8>,
}

impl Room {
    pub fn cell(&self, col: usize, row: usize) -> Cell {
        self.grid[row * self.cols + col]
    }

    pub fn bg(&self, col: usize, row: usize) -> u8 {
        self.bg[row * self.cols + col]
    }

    pub fn is_solid(&self, col: usize, row: usize) -> bool {
        matches!(self.cell(col, row), Cell::Solid(_))
    }

    /// All cells with their grid coordinates, row 0 topmost
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, Cell)> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| (col, row, self.cell(col, row))))
    }

    /// World-space playable bounds of this room
    pub fn world_bounds(&self) -> Vec2 {
        Vec2::new(self.cols as f32 * TILE_SIZE, self.rows as f32 * TILE_SIZE)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Door {
    pub room: RoomId,
    /// Grid position, Y already flipped into game space (0 at the floor)
    pub grid_x: usize,
    pub grid_y: usize,
    pub exit: ExitDir,
    /// Extra tiles of hitbox height above the base tile, 0..=9
    pub extra_height: u8,
    pub link_id: u32,
    pub partner: Option<DoorId>,
    /// Pool slot of the door's collision entity, assigned at level init
    pub pool_slot: Option<usize>,
}

impl Door {
    /// World-space center of the door's (possibly stretched) hitbox
    pub fn world_pos(&self) -> Vec2 {
        Vec2::new(
            self.grid_x as f32 * TILE_SIZE + HALF_TILE_SIZE,
            self.grid_y as f32 * TILE_SIZE + HALF_TILE_SIZE + self.extra_height as f32 * HALF_TILE_SIZE,
        )
    }

    pub fn world_height(&self) -> f32 {
        TILE_SIZE + TILE_SIZE * self.extra_height as f32
    }
}

/// The immutable level graph plus the active-room cursor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Level {
    rooms: Vec<Room>,
    doors: Vec<Door>,
    active: RoomId,
}

impl Level {
    /// Load a level from disk: `<dir>/<name>.csv` lists one room file stem
    /// per line; each room loads from `<dir>/<stem>.csv`.
    pub fn load(dir: &Path, name: &str) -> Result<Level, LevelError> {
        let list = fs::read_to_string(dir.join(format!("{name}.csv")))?;
        let mut room_csvs = Vec::new();
        for line in list.lines() {
            let stem = line.split(',').next().unwrap_or("").trim();
            if stem.is_empty() {
                continue;
            }
            room_csvs.push(fs::read_to_string(dir.join(format!("{stem}.csv")))?);
        }
        let refs: Vec<&str> = room_csvs.iter().map(String::as_str).collect();
        let level = Level::from_rooms(&refs)?;
        log::info!("loaded level {name:?}: {} rooms, {} doors", level.rooms.len(), level.doors.len());
        Ok(level)
    }

    /// Parse rooms from in-memory CSVs, ids assigned in order
    pub fn from_rooms(room_csvs: &[&str]) -> Result<Level, LevelError> {
        if room_csvs.is_empty() {
            return Err(LevelError::EmptyLevel);
        }

        let mut rooms = Vec::new();
        let mut doors = Vec::new();
        for (id, csv) in room_csvs.iter().enumerate() {
            rooms.push(parse_room(csv, RoomId(id), &mut doors)?);
        }
        link_doors(&mut doors);

        Ok(Level {
            rooms,
            doors,
            active: RoomId(0),
        })
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn doors(&self) -> &[Door] {
        &self.doors
    }

    pub fn room(&self, id: RoomId) -> &Room {
        &self.rooms[id.0]
    }

    pub fn door(&self, id: DoorId) -> &Door {
        &self.doors[id.0]
    }

    pub fn door_mut(&mut self, id: DoorId) -> &mut Door {
        &mut self.doors[id.0]
    }

    pub fn active_room(&self) -> &Room {
        &self.rooms[self.active.0]
    }

    pub fn active_room_id(&self) -> RoomId {
        self.active
    }

    /// Switch the active-room cursor. An unknown id leaves the cursor
    /// untouched.
    pub fn set_active_room(&mut self, id: RoomId) {
        if id.0 < self.rooms.len() {
            self.active = id;
        }
    }

    /// The door whose collision entity occupies `pool_slot`
    pub fn door_by_pool_slot(&self, slot: usize) -> Option<DoorId> {
        self.doors
            .iter()
            .position(|d| d.pool_slot == Some(slot))
            .map(DoorId)
    }
}

fn parse_room(csv: &str, id: RoomId, doors: &mut Vec<Door>) -> Result<Room, LevelError> {
    let room = id.0;
    let mut lines = csv.lines();

    let header: Vec<&str> = lines.next().unwrap_or("").split(',').collect();
    let (rows, cols) = match header.as_slice() {
        [r, c, ..] => match (r.trim().parse(), c.trim().parse()) {
            (Ok(r), Ok(c)) if r > 0 && c > 0 => (r, c),
            _ => return Err(LevelError::BadDimensions { room }),
        },
        _ => return Err(LevelError::BadDimensions { room }),
    };

    let mut grid = vec![Cell::Air; rows * cols];
    let mut bg = vec![0u8; rows * cols];

    let mut row = 0;
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        if row >= rows {
            return Err(LevelError::RowCount {
                room,
                expected: rows,
                found: row + 1,
            });
        }
        let cells: Vec<&str> = line.split(',').collect();
        if cells.len() != cols {
            return Err(LevelError::ColCount {
                room,
                row,
                expected: cols,
                found: cells.len(),
            });
        }

        for (col, raw) in cells.iter().enumerate() {
            let idx = row * cols + col;
            let cell = raw.trim();
            let bad = || LevelError::BadCell {
                room,
                row,
                col,
                cell: cell.to_string(),
            };

            match cell.chars().next() {
                None => {} // empty cell is air
                Some('D') => {
                    let extra_height: u8 = cell.get(1..2).and_then(|s| s.parse().ok()).ok_or_else(bad)?;
                    let exit = match cell.get(2..3) {
                        Some("<") => ExitDir::Left,
                        Some(">") => ExitDir::Right,
                        Some("^") => ExitDir::Up,
                        Some("v") => ExitDir::Down,
                        _ => return Err(bad()),
                    };
                    let link_id: u32 = cell.get(3..).and_then(|s| s.parse().ok()).ok_or_else(bad)?;
                    doors.push(Door {
                        room: id,
                        grid_x: col,
                        grid_y: rows - row - 1, // flip into game space
                        exit,
                        extra_height,
                        link_id,
                        partner: None,
                        pool_slot: None,
                    });
                    grid[idx] = Cell::Door;
                }
                Some('E') if cell.starts_with("EE") => {
                    grid[idx] = Cell::EliteSpawn;
                    bg[idx] = parse_bg(&cell[2..], &bad)?;
                }
                Some(marker @ ('P' | 'L' | 'E' | 'R' | 'B' | 'S')) => {
                    grid[idx] = match marker {
                        'P' => Cell::PlayerSpawn,
                        'L' => Cell::ChestSpawn,
                        'E' => Cell::MeleeSpawn,
                        'R' => Cell::RangedSpawn,
                        'B' => Cell::BossSpawn,
                        _ => Cell::SavePoint,
                    };
                    bg[idx] = parse_bg(&cell[1..], &bad)?;
                }
                Some(_) => {
                    let code: i32 = cell.parse().map_err(|_| bad())?;
                    match code {
                        0 => {}
                        1..=4 => grid[idx] = Cell::Solid(code as u8),
                        10..=12 => bg[idx] = code as u8,
                        _ => return Err(bad()),
                    }
                }
            }
        }
        row += 1;
    }

    if row != rows {
        return Err(LevelError::RowCount {
            room,
            expected: rows,
            found: row,
        });
    }

    Ok(Room {
        id,
        rows,
        cols,
        grid,
        bg,
    })
}

fn parse_bg(suffix: &str, bad: &impl Fn() -> LevelError) -> Result<u8, LevelError> {
    if suffix.is_empty() {
        return Ok(0);
    }
    suffix.parse().map_err(|_| bad())
}

/// Pair doors by shared link id. A link id held by more than two doors
/// resolves last-writer-wins; an unmatched id stays unlinked.
fn link_doors(doors: &mut [Door]) {
    for i in 0..doors.len() {
        for j in 0..doors.len() {
            if i == j {
                continue;
            }
            if doors[i].link_id == doors[j].link_id {
                doors[i].partner = Some(DoorId(j));
                doors[j].partner = Some(DoorId(i));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 4x6 room: solid floor, a door on the right wall, player spawn, one
    // melee and a chest
    const ROOM_A: &str = "\
4,6
0,0,10,0,0,0
0,P,0,E,L,D0>1
1,1,1,1,1,1
1,2,2,2,2,1";

    const ROOM_B: &str = "\
4,6
0,0,0,0,0,0
D0<1,R,0,EE,S,B11
1,1,1,1,1,1
1,2,2,2,2,1";

    #[test]
    fn parses_rooms_and_cells() {
        let level = Level::from_rooms(&[ROOM_A, ROOM_B]).unwrap();
        assert_eq!(level.rooms().len(), 2);

        let a = level.room(RoomId(0));
        assert_eq!(a.cell(1, 1), Cell::PlayerSpawn);
        assert_eq!(a.cell(3, 1), Cell::MeleeSpawn);
        assert_eq!(a.cell(4, 1), Cell::ChestSpawn);
        assert_eq!(a.cell(0, 2), Cell::Solid(1));
        assert_eq!(a.cell(1, 3), Cell::Solid(2));
        assert!(a.is_solid(0, 3));
        assert!(!a.is_solid(0, 0));
    }

    #[test]
    fn background_codes_route_to_bg_grid() {
        let level = Level::from_rooms(&[ROOM_A, ROOM_B]).unwrap();
        let a = level.room(RoomId(0));
        assert_eq!(a.cell(2, 0), Cell::Air, "bg code leaves collision empty");
        assert_eq!(a.bg(2, 0), 10);

        // marker with bg suffix
        let b = level.room(RoomId(1));
        assert_eq!(b.cell(5, 1), Cell::BossSpawn);
        assert_eq!(b.bg(5, 1), 11);
    }

    #[test]
    fn doors_parse_and_link() {
        let level = Level::from_rooms(&[ROOM_A, ROOM_B]).unwrap();
        assert_eq!(level.doors().len(), 2);

        let d0 = level.door(DoorId(0));
        assert_eq!(d0.room, RoomId(0));
        assert_eq!(d0.exit, ExitDir::Right);
        assert_eq!(d0.extra_height, 0);
        assert_eq!(d0.partner, Some(DoorId(1)));
        // row 1 of 4 flips to game-space y 2
        assert_eq!((d0.grid_x, d0.grid_y), (5, 2));

        let d1 = level.door(DoorId(1));
        assert_eq!(d1.exit, ExitDir::Left);
        assert_eq!(d1.partner, Some(DoorId(0)));
    }

    #[test]
    fn unmatched_link_stays_unlinked() {
        let solo = "\
2,2
D3^9,0
1,1";
        let level = Level::from_rooms(&[solo]).unwrap();
        let d = level.door(DoorId(0));
        assert_eq!(d.partner, None);
        assert_eq!(d.extra_height, 3);
        assert_eq!(d.exit, ExitDir::Up);
        assert_eq!(d.world_height(), TILE_SIZE * 4.0);
    }

    #[test]
    fn malformed_data_is_fatal() {
        assert!(matches!(
            Level::from_rooms(&[]),
            Err(LevelError::EmptyLevel)
        ));
        assert!(matches!(
            Level::from_rooms(&["x,y\n0,0"]),
            Err(LevelError::BadDimensions { .. })
        ));
        assert!(matches!(
            Level::from_rooms(&["1,2\n0,0,0"]),
            Err(LevelError::ColCount { .. })
        ));
        assert!(matches!(
            Level::from_rooms(&["1,2\n0,Z"]),
            Err(LevelError::BadCell { .. })
        ));
        assert!(matches!(
            Level::from_rooms(&["2,1\n0"]),
            Err(LevelError::RowCount { .. })
        ));
        // door with a garbled direction
        assert!(matches!(
            Level::from_rooms(&["1,1\nD2x9"]),
            Err(LevelError::BadCell { .. })
        ));
    }

    #[test]
    fn unknown_room_id_is_ignored() {
        let mut level = Level::from_rooms(&[ROOM_A, ROOM_B]).unwrap();
        level.set_active_room(RoomId(1));
        assert_eq!(level.active_room_id(), RoomId(1));
        level.set_active_room(RoomId(99));
        assert_eq!(level.active_room_id(), RoomId(1));
    }

    #[test]
    fn door_world_position_offsets_by_extra_height() {
        let level = Level::from_rooms(&[ROOM_A, ROOM_B]).unwrap();
        let d = level.door(DoorId(0));
        let pos = d.world_pos();
        assert_eq!(pos.x, 5.0 * TILE_SIZE + HALF_TILE_SIZE);
        assert_eq!(pos.y, 2.0 * TILE_SIZE + HALF_TILE_SIZE);
    }
}
