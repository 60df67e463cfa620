//! Save-point persistence
//!
//! One save slot, stored as a small line-oriented text file. The record
//! captures the stats that survive death: health, solar energy and its
//! buffed maximum, attack and fire-rate buffs, and the room/position to
//! respawn at. Anything the parser cannot read is treated as no save at
//! all rather than a hard error.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::level::RoomId;

pub const SAVE_FILE_NAME: &str = "save_file.txt";

/// Marker on the first line of a valid save file
const SAVE_HEADER: &str = "SAVE";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaveRecord {
    pub health: i32,
    pub energy: f32,
    pub energy_max: f32,
    pub attack: i32,
    pub fire_rate: f32,
    pub room: RoomId,
    pub x: f32,
    pub y: f32,
}

impl SaveRecord {
    /// Serialize to the on-disk text form
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = writeln!(out, "{SAVE_HEADER}");
        let _ = writeln!(out, "H: {}", self.health);
        let _ = writeln!(out, "En: {:.2}", self.energy);
        let _ = writeln!(out, "EnB: {:.2}", self.energy_max);
        let _ = writeln!(out, "A: {}", self.attack);
        let _ = writeln!(out, "FR: {:.2}", self.fire_rate);
        let _ = writeln!(out, "ID: {}", self.room.0);
        let _ = writeln!(out, "X: {:.2}", self.x);
        let _ = writeln!(out, "Y: {:.2}", self.y);
        out
    }

    /// Parse the on-disk text form. Returns `None` for anything that is
    /// not a complete, well-formed record.
    pub fn from_text(text: &str) -> Option<SaveRecord> {
        let mut lines = text.lines();
        if lines.next()?.trim() != SAVE_HEADER {
            return None;
        }
        Some(SaveRecord {
            health: field(lines.next()?, "H:")?,
            energy: field(lines.next()?, "En:")?,
            energy_max: field(lines.next()?, "EnB:")?,
            attack: field(lines.next()?, "A:")?,
            fire_rate: field(lines.next()?, "FR:")?,
            room: RoomId(field(lines.next()?, "ID:")?),
            x: field(lines.next()?, "X:")?,
            y: field(lines.next()?, "Y:")?,
        })
    }

    /// Write the record to `<dir>/save_file.txt`
    pub fn save(&self, dir: &Path) -> io::Result<()> {
        fs::write(dir.join(SAVE_FILE_NAME), self.to_text())?;
        log::info!("game saved in room {}", self.room.0);
        Ok(())
    }

    /// Read the record from `<dir>/save_file.txt`. A missing, empty or
    /// corrupt file yields `None`.
    pub fn load(dir: &Path) -> Option<SaveRecord> {
        let text = fs::read_to_string(dir.join(SAVE_FILE_NAME)).ok()?;
        let record = SaveRecord::from_text(&text);
        if record.is_none() && !text.trim().is_empty() {
            log::warn!("save file unreadable, treating as no save");
        }
        record
    }

    /// Remove the save file if present
    pub fn clear(dir: &Path) -> io::Result<()> {
        match fs::remove_file(dir.join(SAVE_FILE_NAME)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

fn field<T: std::str::FromStr>(line: &str, tag: &str) -> Option<T> {
    line.trim().strip_prefix(tag)?.trim().parse().ok()
}
