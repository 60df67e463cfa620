//! Audio collaborator seam
//!
//! The simulation never plays sound. It pushes [`GameEvent`]s onto a queue
//! inside `LevelState`; the embedding drains that queue each frame into
//! whatever [`AudioSink`] it owns. [`NullAudio`] is the sink used by tests
//! and headless runs.

use serde::{Deserialize, Serialize};

/// Something audible (or otherwise collaborator-visible) that happened
/// during a tick, in occurrence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    ShotFired,
    ChargedShotFired,
    EnemyHit,
    ChestOpened,
    SavePointToggled,
    PickupCollected,
    RoomTransitionDone,
    PlayerDied,
    BossDefeated,
}

pub trait AudioSink {
    fn handle(&mut self, event: GameEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn handle(&mut self, _event: GameEvent) {}
}

/// Feed a drained event batch into a sink
pub fn dispatch(events: impl IntoIterator<Item = GameEvent>, sink: &mut dyn AudioSink) {
    for event in events {
        sink.handle(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Vec<GameEvent>);

    impl AudioSink for Recorder {
        fn handle(&mut self, event: GameEvent) {
            self.0.push(event);
        }
    }

    #[test]
    fn dispatch_preserves_order() {
        let mut rec = Recorder(Vec::new());
        dispatch(
            [GameEvent::ShotFired, GameEvent::EnemyHit, GameEvent::PlayerDied],
            &mut rec,
        );
        assert_eq!(
            rec.0,
            vec![GameEvent::ShotFired, GameEvent::EnemyHit, GameEvent::PlayerDied]
        );
    }
}
