//! Game event sink.
//!
//! Events are the only output channel of the simulation besides world-state
//! mutation. The set is closed: audio/UI collaborators match on it
//! exhaustively. Emission order within a tick matters for pacing (a
//! `GameOver` after a `PlayerHit` reads differently than the reverse), so
//! systems push in resolution order.

use serde::{Deserialize, Serialize};

/// Everything the simulation can tell the outside world about a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// Player crossed a level threshold
    LevelUp,
    /// A boss died
    BossKill,
    /// A rare snitch was captured before it escaped
    SnitchKill,
    /// Player HP reached zero with no guard charge remaining
    GameOver,
    /// An enemy took a damage instance
    Hit,
    /// The player took a damage instance
    PlayerHit { damage: f32 },
}

/// Per-tick event buffer. The driver drains it after each `advance` call.
pub type EventSink = Vec<GameEvent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_compare_by_value() {
        assert_eq!(
            GameEvent::PlayerHit { damage: 5.0 },
            GameEvent::PlayerHit { damage: 5.0 }
        );
        assert_ne!(GameEvent::Hit, GameEvent::BossKill);
    }
}
