pub mod constants;
pub mod events;
pub mod progression;
pub mod spatial;
pub mod state;
pub mod systems;
pub mod tick;
