//! Boss phase machines.
//!
//! Every boss runs the same base cycle - chase, lock-on, dash, cooldown -
//! gated by stored deadlines. Higher tiers layer one orthogonal ability on
//! top (pull, shield satellites, deflect, beam, soul-linked escorts)
//! without altering the cycle itself.

use rand::Rng;

use crate::game::constants::boss::*;
use crate::game::state::{
    AreaEffect, AreaEffectKind, BossAbility, BossPhase, BossState, Enemy, EntityId, Role, Shape,
    SoulLink, World,
};
use crate::game::systems::movement;
use crate::util::vec2::Vec2;

/// Ability layered onto a freshly spawned boss of the given tier
pub fn ability_for_tier(tier: u8) -> BossAbility {
    match tier {
        0 | 1 => BossAbility::None,
        2 => BossAbility::Pull,
        3 => BossAbility::Shield {
            satellites: Default::default(),
        },
        4 => BossAbility::Deflect,
        5 => BossAbility::Beam { next_at: 0.0 },
        _ => BossAbility::Link {
            members: Default::default(),
        },
    }
}

pub fn update(world: &mut World, dt: f32) {
    let now = world.clock;
    let player_pos = world.player.position;
    let ids: Vec<EntityId> = world
        .enemies
        .iter()
        .filter(|(_, e)| !e.dead && e.is_boss())
        .map(|(&id, _)| id)
        .collect();

    for id in ids {
        advance_phase(world, id, player_pos, now, dt);
        advance_ability(world, id, player_pos, now, dt);
    }
}

fn advance_phase(world: &mut World, id: EntityId, player_pos: Vec2, now: f64, dt: f32) {
    let arena_radius = world.arena_radius;
    let Some(enemy) = world.enemies.get_mut(&id) else {
        return;
    };
    let Role::Boss(state) = &mut enemy.role else {
        return;
    };

    let to_player = player_pos - enemy.position;
    let speed = enemy.speed;

    let (desired, next_phase) = match state.phase {
        BossPhase::Chase { until } => {
            let desired = to_player.normalize_or(Vec2::ZERO) * speed;
            let next = if now >= until {
                Some(BossPhase::LockOn {
                    until: now + LOCKON_DURATION as f64,
                    target: player_pos,
                })
            } else {
                None
            };
            (desired, next)
        }
        BossPhase::LockOn { until, target } => {
            // Planted, telegraphing the dash line
            let next = if now >= until {
                let dir = (target - enemy.position).normalize_or(Vec2::new(1.0, 0.0));
                Some(BossPhase::Dash {
                    until: now + DASH_DURATION as f64,
                    dir,
                })
            } else {
                None
            };
            (Vec2::ZERO, next)
        }
        BossPhase::Dash { until, dir } => {
            let desired = dir * speed * DASH_SPEED_MULT;
            let next = if now >= until {
                Some(BossPhase::Cooldown {
                    until: now + COOLDOWN_DURATION as f64,
                })
            } else {
                None
            };
            (desired, next)
        }
        BossPhase::Cooldown { until } => {
            let desired = to_player.normalize_or(Vec2::ZERO) * speed * 0.3;
            let next = if now >= until {
                Some(BossPhase::Chase {
                    until: now + CHASE_DURATION as f64,
                })
            } else {
                None
            };
            (desired, next)
        }
    };

    if let Some(next) = next_phase {
        state.phase = next;
    }
    movement::commit_move(enemy, desired, dt, arena_radius);
}

fn advance_ability(world: &mut World, id: EntityId, player_pos: Vec2, now: f64, dt: f32) {
    // Clone the (small) ability payload so the match body can mutate freely
    let (boss_pos, ability) = {
        let Some(enemy) = world.enemy(id) else {
            return;
        };
        let Role::Boss(state) = &enemy.role else {
            return;
        };
        (enemy.position, state.ability.clone())
    };

    match &ability {
        BossAbility::None | BossAbility::Deflect => {}
        BossAbility::Pull => {
            let to_boss = boss_pos - player_pos;
            let dist = to_boss.length();
            if dist < PULL_RADIUS && dist > 1.0 {
                world.player.knockback += to_boss.normalize_or(Vec2::ZERO) * PULL_STRENGTH * dt;
            }
        }
        BossAbility::Shield { satellites } => {
            let live: Vec<EntityId> = satellites
                .iter()
                .copied()
                .filter(|sid| world.enemy(*sid).is_some())
                .collect();
            if live.len() < SATELLITE_COUNT as usize && satellites.is_empty() {
                spawn_satellites(world, id);
            } else {
                write_shield_list(world, id, live);
            }
        }
        BossAbility::Beam { next_at } => {
            if now >= *next_at {
                let angle = (player_pos - boss_pos).angle();
                let effect_id = world.alloc_id();
                world.add_effect(AreaEffect {
                    id: effect_id,
                    position: boss_pos,
                    radius: BEAM_RANGE,
                    remaining: BEAM_DURATION,
                    kind: AreaEffectKind::Beam { owner: id, angle },
                });
                if let Some(enemy) = world.enemy_mut(id) {
                    if let Role::Boss(state) = &mut enemy.role {
                        if let BossAbility::Beam { next_at } = &mut state.ability {
                            *next_at = now + BEAM_INTERVAL as f64;
                        }
                    }
                }
            }
        }
        BossAbility::Link { members } => {
            if members.is_empty() {
                spawn_link_escorts(world, id);
            } else {
                // Prune links to escorts that died; the damage splitter
                // skips dead peers anyway, this just keeps the list short
                let live: Vec<EntityId> = members
                    .iter()
                    .copied()
                    .filter(|mid| world.enemy(*mid).is_some())
                    .collect();
                write_link_list(world, id, live);
            }
        }
    }
}

fn spawn_satellites(world: &mut World, boss_id: EntityId) {
    let Some(boss) = world.enemy(boss_id) else {
        return;
    };
    let boss_pos = boss.position;
    let era = boss.era;
    let sat_hp = boss.max_hp * 0.06;

    let mut spawned = smallvec::SmallVec::<[EntityId; 4]>::new();
    for i in 0..SATELLITE_COUNT {
        let angle = i as f32 / SATELLITE_COUNT as f32 * std::f32::consts::TAU;
        let sid = world.alloc_id();
        let mut sat = Enemy::normal(
            sid,
            Shape::Circle,
            boss_pos + Vec2::from_angle(angle) * SATELLITE_ORBIT,
            sat_hp,
            era,
        );
        sat.size *= 0.8;
        sat.role = Role::Satellite {
            owner: boss_id,
            angle,
        };
        world.spawn_enemy(sat);
        spawned.push(sid);
    }

    if let Some(boss) = world.enemy_mut(boss_id) {
        if let Role::Boss(state) = &mut boss.role {
            state.ability = BossAbility::Shield {
                satellites: spawned,
            };
        }
    }
}

fn spawn_link_escorts(world: &mut World, boss_id: EntityId) {
    let Some(boss) = world.enemy(boss_id) else {
        return;
    };
    let boss_pos = boss.position;
    let era = boss.era;
    let escort_hp = boss.max_hp * 0.15;
    let shape = boss.shape;

    let mut escorts = smallvec::SmallVec::<[EntityId; 4]>::new();
    for i in 0..LINK_MEMBERS {
        let angle = i as f32 / LINK_MEMBERS as f32 * std::f32::consts::TAU;
        let eid = world.alloc_id();
        let mut escort = Enemy::normal(
            eid,
            shape,
            boss_pos + Vec2::from_angle(angle) * 90.0,
            escort_hp,
            era,
        );
        escort.role = Role::Elite { thorns: false };
        escort.soul_link = Some(SoulLink {
            host: Some(boss_id),
            peers: Default::default(),
        });
        world.spawn_enemy(escort);
        escorts.push(eid);
    }

    if let Some(boss) = world.enemy_mut(boss_id) {
        boss.soul_link = Some(SoulLink {
            host: None,
            peers: escorts.clone(),
        });
        if let Role::Boss(state) = &mut boss.role {
            state.ability = BossAbility::Link { members: escorts };
        }
    }
}

fn write_shield_list(world: &mut World, boss_id: EntityId, live: Vec<EntityId>) {
    if let Some(boss) = world.enemy_mut(boss_id) {
        if let Role::Boss(state) = &mut boss.role {
            if let BossAbility::Shield { satellites } = &mut state.ability {
                *satellites = live.into_iter().collect();
            }
        }
    }
}

fn write_link_list(world: &mut World, boss_id: EntityId, live: Vec<EntityId>) {
    if let Some(boss) = world.enemy_mut(boss_id) {
        if let Role::Boss(state) = &mut boss.role {
            if let BossAbility::Link { members } = &mut state.ability {
                *members = live.into_iter().collect();
            }
        }
    }
}

/// Deflection check consulted by the combat resolver before any damage.
/// A deflect boss reflects inside its bubble always, and by chance while
/// dashing anywhere.
pub fn deflects_projectile(enemy: &Enemy, projectile_pos: Vec2) -> bool {
    let Role::Boss(BossState { phase, ability, .. }) = &enemy.role else {
        return false;
    };
    if !matches!(ability, BossAbility::Deflect) {
        return false;
    }
    if enemy.position.distance_to(projectile_pos) < DEFLECT_BUBBLE {
        return true;
    }
    if matches!(phase, BossPhase::Dash { .. }) {
        return rand::thread_rng().gen_bool(DEFLECT_DASH_CHANCE);
    }
    false
}

/// Construct a boss enemy at a position. Tier zero means "derive from
/// game time" rather than an explicit assignment.
pub fn spawn_boss(world: &mut World, shape: Shape, position: Vec2, tier: u8, era: u8) -> EntityId {
    let tier = if tier == 0 {
        world.time_based_boss_tier()
    } else {
        tier
    };
    let base = crate::game::constants::enemy_max_hp(
        crate::game::constants::enemy::BASE_HP * shape.hp_mult(),
        world.clock,
    );
    let max_hp = base * HP_MULT * tier as f32;

    let id = world.alloc_id();
    let mut boss = Enemy::normal(id, shape, position, max_hp, era);
    boss.size *= SIZE_MULT;
    boss.speed *= 0.8;
    boss.role = Role::Boss(BossState {
        tier,
        phase: BossPhase::Chase {
            until: world.clock + CHASE_DURATION as f64,
        },
        ability: ability_for_tier(tier),
    });
    world.spawn_enemy(boss);
    tracing::info!(boss = id, tier, ?shape, "boss spawned");
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Authority;

    fn boss_world(tier: u8) -> (World, EntityId) {
        let mut world = World::new(Authority::Host);
        world.player.position = Vec2::new(400.0, 0.0);
        let id = spawn_boss(&mut world, Shape::Square, Vec2::ZERO, tier, 0);
        (world, id)
    }

    fn phase_of(world: &World, id: EntityId) -> BossPhase {
        match &world.enemies[&id].role {
            Role::Boss(state) => state.phase,
            _ => panic!("not a boss"),
        }
    }

    #[test]
    fn test_base_cycle_progression() {
        let (mut world, id) = boss_world(1);
        assert!(matches!(phase_of(&world, id), BossPhase::Chase { .. }));

        // Drive past chase duration
        world.clock = CHASE_DURATION as f64 + 0.1;
        update(&mut world, 1.0 / 60.0);
        assert!(matches!(phase_of(&world, id), BossPhase::LockOn { .. }));

        world.clock += LOCKON_DURATION as f64 + 0.1;
        update(&mut world, 1.0 / 60.0);
        assert!(matches!(phase_of(&world, id), BossPhase::Dash { .. }));

        world.clock += DASH_DURATION as f64 + 0.1;
        update(&mut world, 1.0 / 60.0);
        assert!(matches!(phase_of(&world, id), BossPhase::Cooldown { .. }));

        world.clock += COOLDOWN_DURATION as f64 + 0.1;
        update(&mut world, 1.0 / 60.0);
        assert!(matches!(phase_of(&world, id), BossPhase::Chase { .. }));
    }

    #[test]
    fn test_dash_is_faster_than_chase() {
        let (mut world, id) = boss_world(1);

        // Measure chase displacement
        let before = world.enemies[&id].position;
        update(&mut world, 1.0 / 60.0);
        let chase_step = world.enemies[&id].position.distance_to(before);

        // Force a dash
        if let Role::Boss(state) = &mut world.enemies.get_mut(&id).unwrap().role {
            state.phase = BossPhase::Dash {
                until: world.clock + 1.0,
                dir: Vec2::new(1.0, 0.0),
            };
        }
        let before = world.enemies[&id].position;
        update(&mut world, 1.0 / 60.0);
        let dash_step = world.enemies[&id].position.distance_to(before);

        assert!(dash_step > chase_step * 2.0, "{} vs {}", dash_step, chase_step);
    }

    #[test]
    fn test_tier_two_pull_drags_player() {
        let (mut world, _id) = boss_world(2);
        world.player.position = Vec2::new(200.0, 0.0);
        world.player.knockback = Vec2::ZERO;

        update(&mut world, 1.0 / 60.0);
        // Pull pushes knockback toward the boss at the origin
        assert!(world.player.knockback.x < 0.0);
    }

    #[test]
    fn test_tier_three_spawns_satellites() {
        let (mut world, id) = boss_world(3);
        update(&mut world, 1.0 / 60.0);

        let sats = world
            .enemies
            .values()
            .filter(|e| matches!(e.role, Role::Satellite { owner, .. } if owner == id))
            .count();
        assert_eq!(sats, SATELLITE_COUNT as usize);
    }

    #[test]
    fn test_tier_five_beam_fires_and_rearms() {
        let (mut world, id) = boss_world(5);
        update(&mut world, 1.0 / 60.0);

        assert_eq!(world.effects.len(), 1);
        assert!(matches!(
            world.effects[0].kind,
            AreaEffectKind::Beam { owner, .. } if owner == id
        ));

        // No second beam until the interval elapses
        update(&mut world, 1.0 / 60.0);
        assert_eq!(world.effects.len(), 1);
    }

    #[test]
    fn test_link_escorts_share_a_soul_link() {
        let (mut world, id) = boss_world(6);
        update(&mut world, 1.0 / 60.0);

        let escorts: Vec<_> = world
            .enemies
            .values()
            .filter(|e| {
                e.soul_link
                    .as_ref()
                    .map(|l| l.host == Some(id))
                    .unwrap_or(false)
            })
            .collect();
        assert_eq!(escorts.len(), LINK_MEMBERS);
        assert!(world.enemies[&id].soul_link.is_some());
    }

    #[test]
    fn test_deflect_bubble() {
        let (world, id) = boss_world(4);
        let boss = &world.enemies[&id];
        assert!(deflects_projectile(boss, boss.position + Vec2::new(10.0, 0.0)));
        assert!(!deflects_projectile(
            boss,
            boss.position + Vec2::new(DEFLECT_BUBBLE + 50.0, 0.0)
        ));
    }
}
