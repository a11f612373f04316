//! Shapestorm Combat Core
//!
//! The real-time simulation core of an arena survival game: a fixed-step,
//! single-writer world of enemies, projectiles, and area effects. The
//! driver calls [`game::tick::advance`] once per frame; rendering, audio,
//! input, persistence, and the economy live outside and talk to the core
//! through snapshots, the event sink, and the progression hooks.

pub mod config;
pub mod game;
pub mod util;

pub use game::events::{EventSink, GameEvent};
pub use game::progression::{NullProgression, Progression, StatKey};
pub use game::state::{Authority, World};
pub use game::tick::advance;
