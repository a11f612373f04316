//! Death and reward pipeline.
//!
//! `handle_enemy_death` is idempotent: the dead flag is set before anything
//! else, so a second invocation (or a mid-tick re-kill through soul-link
//! splitting) is a no-op. Rewards and side effects run exactly once.

use rand::Rng;

use crate::game::constants::{boss as bc, enemy as ec, reward};
use crate::game::events::{EventSink, GameEvent};
use crate::game::progression::Progression;
use crate::game::state::{
    AreaEffect, AreaEffectKind, Enemy, EntityId, PendingEffect, Role, Shape, UniqueKind, World,
};
use crate::game::systems::{legion, worm};
use crate::util::vec2::Vec2;

/// Souls raised per grave by a gravedigger's death
const RISE_COUNT: u32 = 5;
/// Delay before the raised minions surface
const RISE_DELAY: f64 = 2.5;

pub fn handle_enemy_death(
    world: &mut World,
    hooks: &mut dyn Progression,
    events: &mut EventSink,
    id: EntityId,
) {
    // Idempotence gate: dead is terminal
    let (position, role, reward_mult, infected) = {
        let Some(enemy) = world.enemies.get_mut(&id) else {
            return;
        };
        if enemy.dead {
            return;
        }
        enemy.dead = true;
        enemy.hp = 0.0;
        (
            enemy.position,
            enemy.role.clone(),
            enemy.reward_mult,
            enemy.infected,
        )
    };

    // Archetype reward multiplier, then the economy-wide one
    let souls = match &role {
        Role::Normal => reward::BASE_SOULS * reward_mult,
        Role::Elite { .. } => reward::BASE_SOULS * reward::ELITE_MULT * reward_mult,
        Role::Rare { .. } => reward::SNITCH_SOULS,
        Role::Minion { .. } | Role::Satellite { .. } => reward::BASE_SOULS * 0.5,
        Role::Unique { kind, .. } => kind.reward_souls(),
        Role::Boss(state) => bc::REWARD_PER_TIER * state.tier as f32,
        Role::LegionLeader { .. } | Role::LegionMember { .. } => {
            reward::BASE_SOULS * reward_mult
        }
        Role::WormSegment(_) => reward::BASE_SOULS * 2.0,
    } * hooks.reward_multiplier();

    world.souls += souls as f64;
    world.kills.total += 1;
    match &role {
        Role::Elite { .. } => world.kills.elites += 1,
        Role::Boss(_) => {
            world.kills.bosses += 1;
            events.push(GameEvent::BossKill);
        }
        Role::Rare { .. } => {
            world.kills.snitches += 1;
            events.push(GameEvent::SnitchKill);
        }
        _ => {}
    }

    hooks.try_drop_loot(position.x, position.y);

    // Archetype side effects
    match &role {
        Role::WormSegment(_) => worm::on_segment_death(world, id),
        Role::LegionLeader { .. } => legion::on_leader_death(world, id),
        Role::Unique { kind: UniqueKind::Gravedigger, .. } => {
            world.pending_effects.push(PendingEffect::Rise {
                at: world.clock + RISE_DELAY,
                position,
                count: RISE_COUNT,
            });
        }
        _ => {}
    }

    if infected {
        spread_contagion(world, position);
    }

    if world.mission_neutral {
        add_xp(world, events, souls);
    }
}

/// A contagious death leaves an infection cloud behind
fn spread_contagion(world: &mut World, position: Vec2) {
    let id = world.alloc_id();
    world.add_effect(AreaEffect {
        id,
        position,
        radius: ec::CONTAGION_RADIUS,
        remaining: ec::CONTAGION_DURATION,
        kind: AreaEffectKind::Contagion { pulse_timer: 0.0 },
    });
}

/// Add XP and fire one `LevelUp` per threshold crossed. The growth factor
/// applies per level, so the loop always terminates; zero gain never enters
/// the loop at all.
pub fn add_xp(world: &mut World, events: &mut EventSink, gained: f32) {
    if gained <= 0.0 {
        return;
    }
    world.xp.current += gained;
    while world.xp.current >= world.xp.needed {
        world.xp.current -= world.xp.needed;
        world.xp.needed *= reward::XP_GROWTH;
        world.xp.level += 1;
        events.push(GameEvent::LevelUp);
    }
}

/// Consume pending rise effects whose deadline arrived
pub fn process_pending(world: &mut World) {
    let now = world.clock;
    let due: Vec<PendingEffect> = {
        let (due, rest): (Vec<_>, Vec<_>) = world
            .pending_effects
            .drain(..)
            .partition(|e| matches!(e, PendingEffect::Rise { at, .. } if *at <= now));
        world.pending_effects = rest;
        due
    };

    for effect in due {
        let PendingEffect::Rise { position, count, .. } = effect;
        let mut rng = rand::thread_rng();
        let era = world.director.era_hint;
        let hp = crate::game::constants::enemy_max_hp(ec::BASE_HP * 0.6, now);
        for _ in 0..count {
            let id = world.alloc_id();
            let offset = Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU))
                * rng.gen_range(10.0..60.0);
            let mut risen = Enemy::normal(id, Shape::Circle, position + offset, hp, era);
            risen.speed *= 0.8;
            risen.role = Role::Minion { owner: None };
            world.spawn_enemy(risen);
        }
        tracing::debug!(count, "grave risen");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::progression::NullProgression;
    use crate::game::state::{Authority, BossPhase, BossState};

    fn setup() -> (World, NullProgression, EventSink) {
        (World::new(Authority::Host), NullProgression, Vec::new())
    }

    fn spawn(world: &mut World, role: Role) -> EntityId {
        let id = world.alloc_id();
        let mut enemy = Enemy::normal(id, Shape::Circle, Vec2::new(10.0, 20.0), 50.0, 0);
        enemy.role = role;
        world.spawn_enemy(enemy);
        id
    }

    #[test]
    fn test_death_is_idempotent() {
        let (mut world, mut hooks, mut events) = setup();
        let id = spawn(&mut world, Role::Normal);

        handle_enemy_death(&mut world, &mut hooks, &mut events, id);
        let souls_once = world.souls;
        let xp_once = world.xp.current;
        let kills_once = world.kills.total;

        handle_enemy_death(&mut world, &mut hooks, &mut events, id);
        assert_eq!(world.souls, souls_once);
        assert_eq!(world.xp.current, xp_once);
        assert_eq!(world.kills.total, kills_once);
    }

    #[test]
    fn test_elite_rewards_more_than_normal() {
        let (mut world, mut hooks, mut events) = setup();
        let normal = spawn(&mut world, Role::Normal);
        handle_enemy_death(&mut world, &mut hooks, &mut events, normal);
        let normal_souls = world.souls;

        let elite = spawn(&mut world, Role::Elite { thorns: false });
        handle_enemy_death(&mut world, &mut hooks, &mut events, elite);
        let elite_souls = world.souls - normal_souls;

        assert!(elite_souls > normal_souls);
        assert_eq!(world.kills.elites, 1);
    }

    #[test]
    fn test_boss_kill_event_and_counter() {
        let (mut world, mut hooks, mut events) = setup();
        let id = spawn(
            &mut world,
            Role::Boss(BossState {
                tier: 2,
                phase: BossPhase::Chase { until: 0.0 },
                ability: crate::game::state::BossAbility::None,
            }),
        );
        handle_enemy_death(&mut world, &mut hooks, &mut events, id);

        assert_eq!(world.kills.bosses, 1);
        assert!(events.contains(&GameEvent::BossKill));
        assert!((world.souls - (bc::REWARD_PER_TIER * 2.0) as f64).abs() < 1e-6);
    }

    #[test]
    fn test_snitch_kill_event() {
        let (mut world, mut hooks, mut events) = setup();
        let id = spawn(&mut world, Role::Rare { despawn_at: 100.0 });
        handle_enemy_death(&mut world, &mut hooks, &mut events, id);

        assert_eq!(world.kills.snitches, 1);
        assert!(events.contains(&GameEvent::SnitchKill));
    }

    #[test]
    fn test_leveling_loop_terminates_and_counts() {
        let (mut world, _hooks, mut events) = setup();
        world.xp.current = 0.0;
        world.xp.needed = 250.0;

        add_xp(&mut world, &mut events, 1_000_000.0);

        let level_ups = events
            .iter()
            .filter(|e| **e == GameEvent::LevelUp)
            .count();
        assert!(level_ups > 0);
        assert_eq!(level_ups as u32, world.xp.level - 1);
        assert!(world.xp.current < world.xp.needed);
        // Growth factor applied once per level crossed
        let expected_needed = 250.0 * reward::XP_GROWTH.powi(level_ups as i32);
        assert!((world.xp.needed - expected_needed).abs() / expected_needed < 1e-3);
    }

    #[test]
    fn test_zero_xp_kill_does_not_enter_loop() {
        let (mut world, _hooks, mut events) = setup();
        world.xp.current = world.xp.needed - 0.1;
        add_xp(&mut world, &mut events, 0.0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_non_neutral_mission_skips_xp() {
        let (mut world, mut hooks, mut events) = setup();
        world.mission_neutral = false;
        let id = spawn(&mut world, Role::Normal);
        handle_enemy_death(&mut world, &mut hooks, &mut events, id);
        assert_eq!(world.xp.current, 0.0);
        // Souls still accrue
        assert!(world.souls > 0.0);
    }

    #[test]
    fn test_infected_death_leaves_contagion_cloud() {
        let (mut world, mut hooks, mut events) = setup();
        let id = spawn(&mut world, Role::Normal);
        world.enemies.get_mut(&id).unwrap().infected = true;

        handle_enemy_death(&mut world, &mut hooks, &mut events, id);

        assert_eq!(world.effects.len(), 1);
        assert!(matches!(
            world.effects[0].kind,
            AreaEffectKind::Contagion { .. }
        ));
    }

    #[test]
    fn test_gravedigger_schedules_rise() {
        let (mut world, mut hooks, mut events) = setup();
        let id = spawn(
            &mut world,
            Role::Unique {
                kind: UniqueKind::Gravedigger,
                next_summon_at: 0.0,
            },
        );
        handle_enemy_death(&mut world, &mut hooks, &mut events, id);
        assert_eq!(world.pending_effects.len(), 1);

        // Not due yet
        process_pending(&mut world);
        assert_eq!(world.pending_effects.len(), 1);

        // Due: minions rise at the grave
        world.clock = RISE_DELAY + 0.1;
        process_pending(&mut world);
        assert!(world.pending_effects.is_empty());
        let risen = world
            .enemies
            .values()
            .filter(|e| !e.dead && matches!(e.role, Role::Minion { .. }))
            .count();
        assert_eq!(risen, RISE_COUNT as usize);
    }

    #[test]
    fn test_reward_multiplier_scales_souls() {
        struct DoubleRewards;
        impl Progression for DoubleRewards {
            fn try_drop_loot(&mut self, _x: f32, _y: f32) {}
            fn stat_bonus(&self, _key: crate::game::progression::StatKey) -> f32 {
                0.0
            }
            fn upgrade_level(&self, _id: &str) -> u32 {
                0
            }
            fn reward_multiplier(&self) -> f32 {
                2.0
            }
        }

        let mut world = World::new(Authority::Host);
        let mut events = Vec::new();
        let id = spawn(&mut world, Role::Normal);
        let mut hooks = DoubleRewards;
        handle_enemy_death(&mut world, &mut hooks, &mut events, id);
        assert!((world.souls - (reward::BASE_SOULS * 2.0) as f64).abs() < 1e-6);
    }
}
