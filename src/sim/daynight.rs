//! Day/night cycle: a timed three-phase state machine
//!
//! Day runs 70 s, Evening 20 s, Night 30 s, then the cycle repeats. A sky
//! color transition starts 3 s before each boundary and blends for 6 s,
//! overlapping into the next phase. The renderer reads the blend through
//! [`DayNight::transition`]; solar energy only recharges while
//! [`DayNight::solar_charging`] holds.

use serde::{Deserialize, Serialize};

use crate::consts::{
    COLOR_TRANSITION_START, COLOR_TRANSITION_TIME, DAY_DURATION, EVENING_DURATION, NIGHT_DURATION,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DayPhase {
    Day,
    Evening,
    Night,
}

impl DayPhase {
    pub const fn duration(self) -> f32 {
        match self {
            DayPhase::Day => DAY_DURATION,
            DayPhase::Evening => EVENING_DURATION,
            DayPhase::Night => NIGHT_DURATION,
        }
    }

    pub const fn next(self) -> DayPhase {
        match self {
            DayPhase::Day => DayPhase::Evening,
            DayPhase::Evening => DayPhase::Night,
            DayPhase::Night => DayPhase::Day,
        }
    }
}

/// An in-flight sky blend: from the color of `from` toward its successor,
/// `progress` in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkyTransition {
    pub from: DayPhase,
    pub progress: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayNight {
    phase: DayPhase,
    remaining: f32,
    transition: Option<SkyTransition>,
}

impl DayNight {
    pub fn new() -> Self {
        DayNight {
            phase: DayPhase::Day,
            remaining: DAY_DURATION,
            transition: None,
        }
    }

    pub fn phase(&self) -> DayPhase {
        self.phase
    }

    /// Seconds left in the current phase
    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    /// The active sky blend, if one is running
    pub fn transition(&self) -> Option<SkyTransition> {
        self.transition
    }

    /// True while sunlight recharges the player's solar meter
    pub fn solar_charging(&self) -> bool {
        matches!(self.phase, DayPhase::Day | DayPhase::Evening)
    }

    /// Age the cycle by scaled gameplay time. Returns the new phase when a
    /// boundary is crossed this tick.
    ///
    /// The blend starts once per phase, 3 s before the boundary, and keeps
    /// running across it until its 6 s elapse.
    pub fn tick(&mut self, dt: f32) -> Option<DayPhase> {
        self.remaining -= dt;

        if self.remaining <= COLOR_TRANSITION_START && self.transition.is_none() {
            self.transition = Some(SkyTransition {
                from: self.phase,
                progress: 0.0,
            });
        }

        if let Some(t) = &mut self.transition {
            t.progress += dt / COLOR_TRANSITION_TIME;
            if t.progress >= 1.0 {
                self.transition = None;
            }
        }

        if self.remaining <= 0.0 {
            self.phase = self.phase.next();
            self.remaining = self.phase.duration();
            return Some(self.phase);
        }
        None
    }
}

impl Default for DayNight {
    fn default() -> Self {
        DayNight::new()
    }
}
