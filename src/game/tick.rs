//! Tick orchestration.
//!
//! `advance` is the single entry point and the single writer of the world
//! for one logical step. Pass order follows the frame contract: scheduler
//! decides spawns, AI/movement advances entities, the combat resolver
//! processes collisions, the death pipeline finalizes kills, and player
//! movement/stat bookkeeping closes the frame.
//!
//! Host/guest asymmetry is decided once per tick: a guest advances only its
//! own player prediction and leaves all shared entities to snapshots.

use crate::game::events::EventSink;
use crate::game::progression::Progression;
use crate::game::state::{LegionRoster, MatchPhase, World};
use crate::game::systems::{boss, combat, death, director, legion, merge, movement, player, worm};

/// Advance the whole simulation by one logical step of `dt` seconds.
/// All observable results are world mutation plus events pushed to the sink.
pub fn advance(world: &mut World, hooks: &mut dyn Progression, events: &mut EventSink, dt: f32) {
    if world.phase.is_over() {
        return; // terminal: render may keep consuming the final snapshot
    }

    world.clock += dt as f64;
    world.tick += 1;

    if let MatchPhase::Countdown { until } = world.phase {
        if world.clock >= until {
            world.phase = MatchPhase::Playing;
        } else {
            return;
        }
    }

    player::sync_stats(world, &*hooks);
    begin_tick_resets(world);

    if world.authority.simulates_shared() {
        director::update(world, dt);
        movement::update(world, dt);
        boss::update(world, dt);
        worm::update(world, dt);
        merge::update(world);
        legion::update(world, dt);

        // Legion-leader cache: derived once, handed to the resolver
        let roster = LegionRoster::build(&world.enemies);
        combat::update(world, hooks, &roster, events, dt);

        death::process_pending(world);
        world.compact();
    }

    player::update(world, &*hooks, events, dt);
}

/// Per-frame transient state decays by default: a missed reapplication
/// returns to neutral instead of sticking. Bosses manage their own debuff
/// windows and are exempt.
fn begin_tick_resets(world: &mut World) {
    for enemy in world.enemies.values_mut() {
        if !enemy.is_boss() {
            enemy.taken_damage_mult = 1.0;
        }
    }
}
