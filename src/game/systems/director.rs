//! Director: the time-keyed difficulty curve and spawn scheduler.
//!
//! Pacing (active shape, palette era, pulse tier, spawn rate) is a pure
//! function of elapsed game time, so it can be queried for any instant
//! without touching world state. The update applies that pacing: steady
//! spawns through a fractional accumulator, boss cadence from a sorted
//! offset table, one-shot scripted events flagged for the AI layer, and the
//! once-per-minute unique spawn roll.

use rand::Rng;

use crate::game::constants::{director::*, enemy as ec, enemy_max_hp};
use crate::game::state::{
    Enemy, EntityId, Flank, Role, ScriptedEvent, Shape, UniqueKind, World,
};
use crate::game::systems::boss;
use crate::util::vec2::Vec2;

/// Arena-specific spawn-rate bonus (flat multiplier for this arena)
const ARENA_SPAWN_BONUS: f32 = 1.0;
/// Chance a spawn comes up as a rare snitch
const SNITCH_CHANCE: f64 = 0.006;
/// Baseline elite spawn chance, grows per minute
const ELITE_BASE_CHANCE: f64 = 0.02;
const ELITE_CHANCE_PER_MIN: f64 = 0.005;
/// Infected spawn chance once the plague era begins (minute 5+)
const INFECTED_CHANCE: f64 = 0.05;
const INFECTED_FROM_MIN: f64 = 5.0;
/// Worm nest script fires at this minute
const WORM_NEST_MIN: f32 = 6.0;

/// Pacing values derived purely from elapsed game time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    /// Active enemy shape for regular spawns (cyclic rotation)
    pub shape: Shape,
    /// Palette era index
    pub era: u8,
    /// Pulse/animation speed tier for the renderer
    pub pulse_tier: u8,
    /// Spawns per second before the per-shape weight
    pub spawn_rate: f32,
}

/// Pure time-to-pacing mapping
pub fn pacing_at(seconds: f64, spawn_rate_base: f32, extraction_active: bool) -> Pacing {
    let shape_step = (seconds / SHAPE_ROTATION_SECS as f64) as usize;
    let shape = Shape::ALL[shape_step % Shape::ALL.len()];

    let era = ((seconds / ERA_INTERVAL_SECS as f64) as u64).min(u8::MAX as u64) as u8;
    let pulse_tier = ((seconds / PULSE_TIER_SECS as f64) as u64).min(u8::MAX as u64) as u8;

    let tier = (seconds / SPAWN_TIER_SECS as f64) as f32;
    let mut spawn_rate = (spawn_rate_base + tier * SPAWN_RAMP_PER_TIER) * ARENA_SPAWN_BONUS;
    if extraction_active {
        spawn_rate *= EXTRACTION_RAMP;
    }

    Pacing {
        shape,
        era,
        pulse_tier,
        spawn_rate,
    }
}

pub fn update(world: &mut World, dt: f32) {
    let pacing = pacing_at(world.clock, world.balance.spawn_rate_base, world.extraction_active);
    world.director.era_hint = pacing.era;

    steady_spawns(world, &pacing, dt);
    boss_cadence(world);
    scripted_events(world);
    unique_schedule(world, &pacing);
}

// ============================================================================
// Steady spawns
// ============================================================================

fn steady_spawns(world: &mut World, pacing: &Pacing, dt: f32) {
    if world.live_enemy_count() >= world.balance.max_enemies {
        return; // performance guard: hold the accumulator where it is
    }

    world.director.spawn_accumulator += pacing.spawn_rate * pacing.shape.spawn_weight() * dt;
    while world.director.spawn_accumulator >= 1.0 {
        world.director.spawn_accumulator -= 1.0;
        spawn_regular(world, pacing);
    }
}

fn spawn_regular(world: &mut World, pacing: &Pacing) {
    let mut rng = rand::thread_rng();
    let minutes = world.clock / 60.0;
    let position = edge_spawn_position(world, &mut rng);

    let max_hp = enemy_max_hp(ec::BASE_HP * pacing.shape.hp_mult(), world.clock);
    let id = world.alloc_id();
    let mut enemy = Enemy::normal(id, pacing.shape, position, max_hp, pacing.era);

    if rng.gen_bool(SNITCH_CHANCE) {
        enemy.speed *= ec::SNITCH_SPEED_MULT;
        enemy.role = Role::Rare {
            despawn_at: world.clock + ec::SNITCH_LIFETIME as f64,
        };
    } else if rng.gen_bool((ELITE_BASE_CHANCE + minutes * ELITE_CHANCE_PER_MIN).min(0.25)) {
        enemy.max_hp *= ec::ELITE_HP_MULT;
        enemy.hp = enemy.max_hp;
        enemy.size *= ec::ELITE_SIZE_MULT;
        enemy.speed *= ec::ELITE_SPEED_MULT;
        enemy.role = Role::Elite {
            thorns: rng.gen_bool(ec::ELITE_THORNS_CHANCE),
        };
    } else {
        if rng.gen_bool(ec::FLANK_CHANCE) {
            let side = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
            enemy.flank = Some(Flank {
                angle: side * rng.gen_range(0.5..1.2),
                distance: ec::FLANK_DISTANCE,
            });
        }
        if minutes >= INFECTED_FROM_MIN && rng.gen_bool(INFECTED_CHANCE) {
            enemy.infected = true;
        }
    }

    world.spawn_enemy(enemy);
}

/// Random position on the arena's outer ring, kept clear of the player.
/// Falls back to the last candidate when the arena is too crowded to be
/// picky.
fn edge_spawn_position(world: &World, rng: &mut impl Rng) -> Vec2 {
    use crate::game::constants::arena::*;

    let mut candidate = Vec2::new(world.arena_radius - SPAWN_MARGIN, 0.0);
    for _ in 0..MAX_SPAWN_ATTEMPTS {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let dist = world.arena_radius - SPAWN_MARGIN * rng.gen_range(1.0..3.0);
        candidate = Vec2::from_angle(angle) * dist;
        if candidate.distance_to(world.player.position) >= SPAWN_MIN_PLAYER_DIST {
            return candidate;
        }
    }
    candidate
}

// ============================================================================
// Boss cadence
// ============================================================================

/// Trigger time in seconds for a (cycle, offset index) pair
fn boss_trigger_time(cycle: u32, index: usize) -> f64 {
    (cycle as f64 * BOSS_CYCLE_MIN as f64 + BOSS_OFFSETS_MIN[index] as f64) * 60.0
}

fn boss_cadence(world: &mut World) {
    loop {
        let (cycle, index) = world.director.next_boss;
        if world.clock < boss_trigger_time(cycle, index) {
            break;
        }

        // Tier follows the active cycle
        let tier = (cycle + 1).min(u8::MAX as u32) as u8;
        let mut rng = rand::thread_rng();
        let position = edge_spawn_position(world, &mut rng);
        let pacing = pacing_at(world.clock, world.balance.spawn_rate_base, world.extraction_active);
        boss::spawn_boss(world, pacing.shape, position, tier, pacing.era);

        world.director.next_boss = if index + 1 < BOSS_OFFSETS_MIN.len() {
            (cycle, index + 1)
        } else {
            (cycle + 1, 0)
        };
    }
}

// ============================================================================
// Scripted events
// ============================================================================

/// Flag one-shot events; the AI layer consumes each exactly once
fn scripted_events(world: &mut World) {
    let minutes = (world.clock / 60.0) as f32;
    let mut rng = rand::thread_rng();

    for (i, &at) in LEGION_EVENT_MIN.iter().enumerate() {
        if minutes >= at && !world.director.legion_fired[i] {
            world.director.legion_fired[i] = true;
            let center = edge_spawn_position(world, &mut rng);
            world.pending_scripts.push(ScriptedEvent::Legion { center });
            tracing::info!(minute = at, "legion event flagged");
        }
    }

    for (i, &at) in HORDE_EVENT_MIN.iter().enumerate() {
        if minutes >= at && !world.director.horde_fired[i] {
            world.director.horde_fired[i] = true;
            world.pending_scripts.push(ScriptedEvent::Horde { count: HORDE_COUNT });
            tracing::info!(minute = at, "horde event flagged");
        }
    }

    if minutes >= WORM_NEST_MIN && !world.director.worm_nest_spawned {
        world.director.worm_nest_spawned = true;
        let position = edge_spawn_position(world, &mut rng);
        world.pending_scripts.push(ScriptedEvent::WormNest { position });
        tracing::info!("worm nest event flagged");
    }
}

// ============================================================================
// Scheduled unique spawns
// ============================================================================

/// Roll once per minute window, then fire at a random second inside it
fn unique_schedule(world: &mut World, pacing: &Pacing) {
    let window = (world.clock / 60.0) as i64;

    if window != world.director.unique_rolled_window {
        world.director.unique_rolled_window = window;
        let mut rng = rand::thread_rng();
        if world.director.unique_fire_at.is_none() && rng.gen_bool(UNIQUE_ROLL_CHANCE) {
            let kind = UniqueKind::ALL[rng.gen_range(0..UniqueKind::ALL.len())];
            let fire_at = window as f64 * 60.0 + rng.gen_range(0.0..60.0);
            world.director.unique_fire_at = Some((fire_at, kind));
        }
    }

    if let Some((fire_at, kind)) = world.director.unique_fire_at {
        if world.clock >= fire_at {
            world.director.unique_fire_at = None;
            // At most one live instance of a unique at a time
            if !world.unique_alive(kind) {
                spawn_unique(world, kind, pacing.era);
            }
        }
    }
}

fn spawn_unique(world: &mut World, kind: UniqueKind, era: u8) -> EntityId {
    let mut rng = rand::thread_rng();
    let position = edge_spawn_position(world, &mut rng);
    let max_hp = enemy_max_hp(ec::BASE_HP, world.clock) * kind.hp_mult();

    let id = world.alloc_id();
    let shape = match kind {
        UniqueKind::Crusher => Shape::Square,
        UniqueKind::Gravedigger => Shape::Pentagon,
        UniqueKind::Broodmother => Shape::Circle,
    };
    let mut unique = Enemy::normal(id, shape, position, max_hp, era);
    unique.size *= 2.0;
    unique.speed *= match kind {
        UniqueKind::Crusher => 0.5,
        _ => 0.8,
    };
    unique.role = Role::Unique {
        kind,
        next_summon_at: 0.0,
    };
    world.spawn_enemy(unique);
    tracing::info!(?kind, "unique spawned");
    id
}
