//! Layered damage resolution.
//!
//! One entry point per side: `deal_damage_to_enemy` walks the defense
//! layers in a fixed order (taken-damage debuff, mark amplification, legion
//! shield, thorns, soul-link splitting, execute), `deal_damage_to_player`
//! walks the player's (armor curve, shield chunks, guard). Death side
//! effects are NOT handled here - callers collect lethal ids and hand them
//! to the death pipeline after their scan completes.

use rand::Rng;

use crate::game::constants::{armor, combat, player as pc};
use crate::game::events::{EventSink, GameEvent};
use crate::game::state::{EntityId, LegionRoster, Role, World};
use crate::util::vec2::Vec2;

/// Armor reduction fraction for a given armor value.
///
/// Logarithmic diminishing returns: zero armor gives zero reduction, the
/// curve is monotonic non-decreasing, and it approaches `cap` without
/// reaching it.
pub fn armor_reduction(armor_value: f32, cap: f32) -> f32 {
    if armor_value <= 0.0 {
        return 0.0;
    }
    let log_term = (1.0 + armor_value / armor::SCALE).ln();
    (cap * log_term / (armor::CURVE + log_term)).min(cap)
}

/// Per-hit tuning passed by the attacker
#[derive(Debug, Clone, Copy, Default)]
pub struct HitOptions {
    /// Chance to kill outright when the target ends the hit below the
    /// execute threshold
    pub execute_chance: f32,
}

/// What one hit did to the enemy side
#[derive(Debug, Clone, Default)]
pub struct HitOutcome {
    /// Total HP actually removed across the target and linked members
    pub dealt: f32,
    /// Thorns damage to apply back to the attacker (pre-armor)
    pub reflected: f32,
    /// Enemies whose HP reached zero during this hit, in hit order
    pub lethal: Vec<EntityId>,
}

/// Apply one damage instance to an enemy through the full defense stack
pub fn deal_damage_to_enemy(
    world: &mut World,
    roster: &LegionRoster,
    events: &mut EventSink,
    target_id: EntityId,
    base_damage: f32,
    opts: HitOptions,
    now: f64,
) -> HitOutcome {
    let mut outcome = HitOutcome::default();

    let (mut amount, legion) = {
        let Some(target) = world.enemy(target_id) else {
            return outcome;
        };
        // Taken-damage debuff, then mark amplification
        let mut amount = base_damage * target.taken_damage_mult;
        if now < target.marked_until {
            amount *= combat::MARK_CRIT_MULT;
        }
        (amount, target.legion_id())
    };

    // Legion shield absorbs before any HP is touched
    if let Some(legion) = legion {
        if let Some(leader_id) = roster.leader_of(legion) {
            if let Some(leader) = world.enemy_mut(leader_id) {
                if let Role::LegionLeader { shield, .. } = &mut leader.role {
                    let absorbed = shield.min(amount);
                    *shield -= absorbed;
                    amount -= absorbed;
                }
            }
        }
    }
    if amount <= 0.0 {
        events.push(GameEvent::Hit);
        return outcome;
    }

    // Thorns reflect a fraction of what is about to be dealt; the caller
    // runs it through the attacker's own armor
    if let Some(target) = world.enemy(target_id) {
        if matches!(target.role, Role::Elite { thorns: true }) {
            outcome.reflected = amount * combat::THORNS_RATIO;
        }
    }

    // Soul-link splits the total evenly across all live linked members
    let link_members = linked_members(world, target_id);
    if link_members.len() > 1 {
        let share = amount / link_members.len() as f32;
        for member_id in link_members {
            reduce_hp(world, events, member_id, share, &mut outcome);
        }
    } else {
        reduce_hp(world, events, target_id, amount, &mut outcome);
    }

    // Execute roll: a wounded survivor may be finished outright
    if opts.execute_chance > 0.0 {
        if let Some(target) = world.enemy_mut(target_id) {
            let low = target.hp > 0.0 && target.hp <= target.max_hp * combat::EXECUTE_HP_THRESHOLD;
            if low && rand::thread_rng().gen_bool(opts.execute_chance.clamp(0.0, 1.0) as f64) {
                outcome.dealt += target.hp;
                target.hp = 0.0;
                outcome.lethal.push(target_id);
            }
        }
    }

    outcome
}

/// All live members of the target's soul link, target included.
/// A fully-stale link (host and peers all gone) collapses to just the
/// target, and the dead references are unlinked.
fn linked_members(world: &mut World, target_id: EntityId) -> Vec<EntityId> {
    let Some(target) = world.enemy(target_id) else {
        return Vec::new();
    };
    let Some(link) = target.soul_link.clone() else {
        return vec![target_id];
    };

    let mut members = vec![target_id];
    if let Some(host) = link.host {
        if world.enemy(host).is_some() {
            members.push(host);
        }
    }
    for peer in &link.peers {
        if *peer != target_id && world.enemy(*peer).is_some() {
            members.push(*peer);
        }
    }

    if members.len() == 1 {
        // Everything this link pointed at is gone; drop it
        if let Some(target) = world.enemy_mut(target_id) {
            target.soul_link = None;
        }
        tracing::debug!(target = target_id, "soul link fully stale, unlinked");
    }
    members
}

/// Independent HP reduction with its own hit event and death check
fn reduce_hp(
    world: &mut World,
    events: &mut EventSink,
    id: EntityId,
    amount: f32,
    outcome: &mut HitOutcome,
) {
    let Some(enemy) = world.enemy_mut(id) else {
        return;
    };
    let dealt = amount.min(enemy.hp);
    enemy.hp -= amount;
    outcome.dealt += dealt;
    events.push(GameEvent::Hit);
    if enemy.hp <= 0.0 {
        outcome.lethal.push(id);
    }
}

/// Heal the attacking side for a fraction of damage dealt; overflow past
/// max HP becomes a temporary, capped shield chunk
pub fn grant_lifesteal(world: &mut World, dealt: f32, now: f64) {
    if dealt <= 0.0 {
        return;
    }
    let heal = dealt * pc::LIFESTEAL_RATIO;
    let player = &mut world.player;
    let missing = (player.resolved.max_hp - player.hp).max(0.0);
    let applied = heal.min(missing);
    player.hp += applied;
    let overflow = heal - applied;
    if overflow > 0.0 {
        player.add_shield_chunk(overflow, pc::OVERFLOW_SHIELD_DURATION, now);
    }
}

/// What one damage instance did to the player
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerHitOutcome {
    /// Post-mitigation HP damage taken
    pub taken: f32,
    /// The hit would have been lethal and a guard consumed it
    pub guarded: bool,
    /// Match ended
    pub died: bool,
}

/// Apply one damage instance to the player: armor curve, then shield
/// chunks (soonest expiry first), then HP, then the guard check
pub fn deal_damage_to_player(
    world: &mut World,
    events: &mut EventSink,
    raw_damage: f32,
    now: f64,
) -> PlayerHitOutcome {
    let mut outcome = PlayerHitOutcome::default();
    if raw_damage <= 0.0 || world.player.is_invincible(now) {
        return outcome;
    }

    let reduction = armor_reduction(world.player.resolved.armor, world.player.resolved.armor_cap);
    let mitigated = raw_damage * (1.0 - reduction);

    let after_shield = world.player.absorb_with_shields(mitigated, now);
    if after_shield <= 0.0 {
        events.push(GameEvent::PlayerHit { damage: 0.0 });
        return outcome;
    }

    world.player.hp -= after_shield;
    outcome.taken = after_shield;
    events.push(GameEvent::PlayerHit {
        damage: after_shield,
    });

    if world.player.hp <= 0.0 {
        if world.player.guard_charges > 0 {
            consume_guard(world, now);
            outcome.guarded = true;
        } else {
            world.phase = crate::game::state::MatchPhase::Ended { victory: false };
            events.push(GameEvent::GameOver);
            outcome.died = true;
        }
    }

    outcome
}

/// Guard: full heal, relocate to a safe random point at least the minimum
/// distance away, brief invincibility
fn consume_guard(world: &mut World, now: f64) {
    let mut rng = rand::thread_rng();
    world.player.guard_charges -= 1;
    world.player.hp = world.player.resolved.max_hp;
    world.player.invincible_until = now + pc::GUARD_INVINCIBILITY as f64;

    let old = world.player.position;
    for _ in 0..crate::game::constants::arena::MAX_SPAWN_ATTEMPTS {
        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let dist = rng.gen_range(0.0..world.arena_radius * 0.9);
        let candidate = Vec2::from_angle(angle) * dist;
        if candidate.distance_to(old) >= pc::GUARD_MIN_RELOCATE_DIST {
            world.player.position = candidate;
            world.player.knockback = Vec2::ZERO;
            tracing::info!("guard consumed, player relocated");
            return;
        }
    }
    // Dense fallback: mirror through the center, clamped inside the arena
    world.player.position = (-old).clamp_length(world.arena_radius * 0.9);
    world.player.knockback = Vec2::ZERO;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Authority, Enemy, MatchPhase, Shape, ShieldChunk, SoulLink};
    use smallvec::smallvec;

    fn world_with_enemy(hp: f32) -> (World, EntityId) {
        let mut world = World::new(Authority::Host);
        let id = world.alloc_id();
        world.spawn_enemy(Enemy::normal(id, Shape::Circle, Vec2::ZERO, hp, 0));
        (world, id)
    }

    #[test]
    fn test_armor_zero_gives_zero_reduction() {
        assert_eq!(armor_reduction(0.0, armor::CAP), 0.0);
        assert_eq!(armor_reduction(-10.0, armor::CAP), 0.0);
    }

    #[test]
    fn test_armor_monotonic_and_capped() {
        let samples = [0.0, 1.0, 5.0, 20.0, 100.0, 1_000.0, 1_000_000.0];
        let mut last = -1.0;
        for a in samples {
            let r = armor_reduction(a, armor::CAP);
            assert!(r >= last, "not monotonic at {}", a);
            assert!(r <= armor::CAP, "exceeds cap at {}", a);
            last = r;
        }
        // Extreme armor still stays under the cap
        assert!(armor_reduction(f32::MAX / 2.0, armor::CAP) <= armor::CAP);
    }

    #[test]
    fn test_basic_enemy_damage() {
        let (mut world, id) = world_with_enemy(100.0);
        let roster = LegionRoster::default();
        let mut events = Vec::new();

        let outcome =
            deal_damage_to_enemy(&mut world, &roster, &mut events, id, 30.0, HitOptions::default(), 0.0);
        assert!((outcome.dealt - 30.0).abs() < 1e-3);
        assert!(outcome.lethal.is_empty());
        assert!((world.enemy(id).unwrap().hp - 70.0).abs() < 1e-3);
        assert!(events.contains(&GameEvent::Hit));
    }

    #[test]
    fn test_legion_shield_absorbs_before_hp() {
        let mut world = World::new(Authority::Host);
        let legion = world.alloc_legion_id();

        let leader_id = world.alloc_id();
        let mut leader = Enemy::normal(leader_id, Shape::Square, Vec2::ZERO, 200.0, 0);
        leader.role = Role::LegionLeader { legion, shield: 50.0 };
        world.spawn_enemy(leader);

        let member_id = world.alloc_id();
        let mut member = Enemy::normal(member_id, Shape::Square, Vec2::ZERO, 100.0, 0);
        member.role = Role::LegionMember { legion, slot: 1 };
        world.spawn_enemy(member);

        let roster = LegionRoster::build(&world.enemies);
        let mut events = Vec::new();

        // D <= S: fully absorbed, HP unchanged
        deal_damage_to_enemy(&mut world, &roster, &mut events, member_id, 30.0, HitOptions::default(), 0.0);
        assert!((world.enemy(member_id).unwrap().hp - 100.0).abs() < 1e-3);

        // D > S: HP drops by exactly D - S, shield hits zero
        deal_damage_to_enemy(&mut world, &roster, &mut events, member_id, 60.0, HitOptions::default(), 0.0);
        assert!((world.enemy(member_id).unwrap().hp - 60.0).abs() < 1e-3);
        match &world.enemy(leader_id).unwrap().role {
            Role::LegionLeader { shield, .. } => assert_eq!(*shield, 0.0),
            _ => panic!("leader role changed"),
        }
    }

    #[test]
    fn test_soul_link_splits_damage_evenly() {
        let mut world = World::new(Authority::Host);
        let host_id = world.alloc_id();
        let peer_id = world.alloc_id();
        let target_id = world.alloc_id();

        world.spawn_enemy(Enemy::normal(host_id, Shape::Circle, Vec2::ZERO, 100.0, 0));
        world.spawn_enemy(Enemy::normal(peer_id, Shape::Circle, Vec2::ZERO, 100.0, 0));
        let mut target = Enemy::normal(target_id, Shape::Circle, Vec2::ZERO, 100.0, 0);
        target.soul_link = Some(SoulLink {
            host: Some(host_id),
            peers: smallvec![peer_id],
        });
        world.spawn_enemy(target);

        let roster = LegionRoster::default();
        let mut events = Vec::new();
        deal_damage_to_enemy(&mut world, &roster, &mut events, target_id, 90.0, HitOptions::default(), 0.0);

        // 90 split across 3 live members
        assert!((world.enemy(target_id).unwrap().hp - 70.0).abs() < 1e-3);
        assert!((world.enemy(host_id).unwrap().hp - 70.0).abs() < 1e-3);
        assert!((world.enemy(peer_id).unwrap().hp - 70.0).abs() < 1e-3);
        // One hit event per member
        assert_eq!(events.iter().filter(|e| **e == GameEvent::Hit).count(), 3);
    }

    #[test]
    fn test_stale_soul_link_unlinks() {
        let (mut world, id) = world_with_enemy(100.0);
        world.enemy_mut(id).unwrap().soul_link = Some(SoulLink {
            host: Some(9999),
            peers: smallvec![8888],
        });

        let roster = LegionRoster::default();
        let mut events = Vec::new();
        deal_damage_to_enemy(&mut world, &roster, &mut events, id, 10.0, HitOptions::default(), 0.0);

        // Full damage landed on the target and the dead link was removed
        assert!((world.enemy(id).unwrap().hp - 90.0).abs() < 1e-3);
        assert!(world.enemy(id).unwrap().soul_link.is_none());
    }

    #[test]
    fn test_thorns_reflection_reported() {
        let (mut world, id) = world_with_enemy(100.0);
        world.enemy_mut(id).unwrap().role = Role::Elite { thorns: true };

        let roster = LegionRoster::default();
        let mut events = Vec::new();
        let outcome =
            deal_damage_to_enemy(&mut world, &roster, &mut events, id, 40.0, HitOptions::default(), 0.0);
        assert!((outcome.reflected - 40.0 * combat::THORNS_RATIO).abs() < 1e-3);
    }

    #[test]
    fn test_taken_damage_mult_scales() {
        let (mut world, id) = world_with_enemy(100.0);
        world.enemy_mut(id).unwrap().taken_damage_mult = 2.0;

        let roster = LegionRoster::default();
        let mut events = Vec::new();
        deal_damage_to_enemy(&mut world, &roster, &mut events, id, 10.0, HitOptions::default(), 0.0);
        assert!((world.enemy(id).unwrap().hp - 80.0).abs() < 1e-3);
    }

    #[test]
    fn test_mark_window_amplifies() {
        let (mut world, id) = world_with_enemy(100.0);
        world.enemy_mut(id).unwrap().marked_until = 5.0;

        let roster = LegionRoster::default();
        let mut events = Vec::new();
        deal_damage_to_enemy(&mut world, &roster, &mut events, id, 10.0, HitOptions::default(), 2.0);
        let expected = 100.0 - 10.0 * combat::MARK_CRIT_MULT;
        assert!((world.enemy(id).unwrap().hp - expected).abs() < 1e-3);
    }

    #[test]
    fn test_lethal_reported_once() {
        let (mut world, id) = world_with_enemy(20.0);
        let roster = LegionRoster::default();
        let mut events = Vec::new();
        let outcome =
            deal_damage_to_enemy(&mut world, &roster, &mut events, id, 50.0, HitOptions::default(), 0.0);
        assert_eq!(outcome.lethal, vec![id]);
        // Dealt is clamped to the HP that existed
        assert!((outcome.dealt - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_player_damage_through_armor_and_shields() {
        let mut world = World::new(Authority::Host);
        world.player.resolved.max_hp = 100.0;
        world.player.resolved.armor = 0.0;
        world.player.resolved.armor_cap = armor::CAP;
        world.player.hp = 100.0;
        world.player.shields.push(ShieldChunk {
            amount: 20.0,
            expires_at: 100.0,
        });

        let mut events = Vec::new();
        let outcome = deal_damage_to_player(&mut world, &mut events, 30.0, 0.0);
        // 20 absorbed by shield, 10 to HP
        assert!((outcome.taken - 10.0).abs() < 1e-3);
        assert!((world.player.hp - 90.0).abs() < 1e-3);
        assert!(events.contains(&GameEvent::PlayerHit { damage: outcome.taken }));
    }

    #[test]
    fn test_guard_saves_lethal_hit() {
        let mut world = World::new(Authority::Host);
        world.player.resolved.max_hp = 100.0;
        world.player.resolved.armor_cap = armor::CAP;
        world.player.hp = 5.0;
        world.player.guard_charges = 1;
        world.player.position = Vec2::new(10.0, 0.0);

        let mut events = Vec::new();
        let outcome = deal_damage_to_player(&mut world, &mut events, 50.0, 0.0);
        assert!(outcome.guarded);
        assert!(!outcome.died);
        assert_eq!(world.player.guard_charges, 0);
        assert!((world.player.hp - 100.0).abs() < 1e-3);
        assert!(world.player.position.distance_to(Vec2::new(10.0, 0.0)) >= pc::GUARD_MIN_RELOCATE_DIST);
        assert!(world.player.invincible_until > 0.0);
        assert_eq!(world.phase, MatchPhase::Playing);
    }

    #[test]
    fn test_no_guard_means_game_over() {
        let mut world = World::new(Authority::Host);
        world.player.resolved.max_hp = 100.0;
        world.player.resolved.armor_cap = armor::CAP;
        world.player.hp = 5.0;

        let mut events = Vec::new();
        let outcome = deal_damage_to_player(&mut world, &mut events, 50.0, 0.0);
        assert!(outcome.died);
        assert!(world.phase.is_over());
        assert!(events.contains(&GameEvent::GameOver));
    }

    #[test]
    fn test_invincible_player_takes_nothing() {
        let mut world = World::new(Authority::Host);
        world.player.resolved.max_hp = 100.0;
        world.player.hp = 100.0;
        world.player.invincible_until = 10.0;

        let mut events = Vec::new();
        let outcome = deal_damage_to_player(&mut world, &mut events, 50.0, 5.0);
        assert_eq!(outcome.taken, 0.0);
        assert!((world.player.hp - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_lifesteal_overflow_becomes_shield() {
        let mut world = World::new(Authority::Host);
        world.player.resolved.max_hp = 100.0;
        world.player.hp = 99.0;

        // 100 dealt -> 5 heal; 1 to HP, 4 overflows to shield
        grant_lifesteal(&mut world, 100.0, 0.0);
        assert!((world.player.hp - 100.0).abs() < 1e-3);
        assert!((world.player.total_shield(0.0) - 4.0).abs() < 1e-3);
    }
}
