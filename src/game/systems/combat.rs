//! Combat resolver: projectiles, rings, area effects, contact damage.
//!
//! Projectile hits walk a fixed pipeline: deflection check, then the
//! layered damage stack (see `damage`), then lifesteal, then pierce
//! accounting, then death finalization through the death pipeline. Contact
//! damage shares the same defense layering with a per-enemy cooldown.
//!
//! Entity removal never happens inside a forward scan: projectiles are
//! drained from the world, processed, and reinstated with expired ones
//! filtered; enemies are flagged dead and compacted at end of tick.

use crate::game::constants::{combat::*, contact_damage_for, player as pc, projectile as pj, ring};
use crate::game::events::EventSink;
use crate::game::progression::Progression;
use crate::game::state::{
    EntityId, LegionRoster, Projectile, ProjectileKind, Role, Side, UniqueKind, World,
};
use crate::game::systems::{boss, damage, death, movement};
use crate::util::vec2::Vec2;

/// Broad-phase query radius: hit radius plus the largest plausible enemy
const BROAD_PHASE_PAD: f32 = 96.0;
/// Orbiters and rings persist until fused/decomposed, not by lifetime
const PERSISTENT_LIFE: f32 = 1e9;
/// Taken-damage amplification applied inside a contagion cloud
const CONTAGION_VULNERABILITY: f32 = 1.25;
/// Mark window granted by a nova pulse
const NOVA_MARK_DURATION: f64 = 2.0;
/// Beam sweep rate in radians per second
const BEAM_SWEEP_RATE: f32 = 0.5;

pub fn update(
    world: &mut World,
    hooks: &mut dyn Progression,
    roster: &LegionRoster,
    events: &mut EventSink,
    dt: f32,
) {
    player_auto_attack(world, hooks, dt);
    maintain_orbiters(world, hooks);
    update_ring_fusion(world);
    move_projectiles(world, dt);

    movement::rebuild_separation_grid(world);
    resolve_projectiles(world, hooks, roster, events, dt);
    update_area_effects(world, hooks, roster, events, dt);
    contact_damage(world, hooks, roster, events);
}

// ============================================================================
// Firing
// ============================================================================

fn player_auto_attack(world: &mut World, hooks: &mut dyn Progression, dt: f32) {
    world.player.attack_timer -= dt;
    if world.player.attack_timer > 0.0 {
        return;
    }

    let aim = if world.player.aim.length_sq() > 0.01 {
        Some(world.player.aim.normalize())
    } else {
        nearest_enemy(world, world.player.position)
            .map(|(_, pos)| (pos - world.player.position).normalize_or(Vec2::new(1.0, 0.0)))
    };
    let Some(dir) = aim else {
        return; // nothing to shoot at
    };

    let rate = world.player.resolved.attack_rate.max(0.1);
    world.player.attack_timer = 1.0 / rate;

    let pierce_level = hooks.upgrade_level("piercing_rounds");
    let pierce = if pierce_level >= 6 {
        -1 // infinite
    } else {
        pierce_level as i32
    };

    let id = world.alloc_id();
    let mut projectile = Projectile::standard(
        id,
        Side::Player,
        world.player.position,
        dir * pj::SPEED,
        world.player.resolved.damage,
        pierce,
    );
    if hooks.upgrade_level("homing_rounds") > 0 {
        projectile.kind = ProjectileKind::Homing;
    } else if hooks.upgrade_level("ricochet") > 0 {
        projectile.kind = ProjectileKind::Bouncer {
            bounces_left: pj::BOUNCE_COUNT,
        };
    }
    world.add_projectile(projectile);
}

/// Keep the orbiter count in line with the upgrade level (unless a fused
/// ring is currently holding the pool)
fn maintain_orbiters(world: &mut World, hooks: &mut dyn Progression) {
    let level = hooks.upgrade_level("orbital_blades") as usize;
    if level == 0 {
        return;
    }
    let has_ring = world
        .projectiles
        .iter()
        .any(|p| matches!(p.kind, ProjectileKind::Ring { .. }));
    if has_ring {
        return;
    }

    let target = (level * ring::ORBITERS_PER_LEVEL).min(ring::ORBITER_CAP);
    let current = world
        .projectiles
        .iter()
        .filter(|p| matches!(p.kind, ProjectileKind::Orbiter { .. }))
        .count();

    let damage = world.player.resolved.damage * 0.6;
    for i in current..target {
        let id = world.alloc_id();
        let angle = i as f32 / target.max(1) as f32 * std::f32::consts::TAU;
        let mut orbiter = Projectile::standard(
            id,
            Side::Player,
            world.player.position + Vec2::from_angle(angle) * ring::ORBIT_RADIUS,
            Vec2::ZERO,
            damage,
            0,
        );
        orbiter.kind = ProjectileKind::Orbiter { angle };
        orbiter.life = PERSISTENT_LIFE;
        world.add_projectile(orbiter);
    }
}

/// Threshold-triggered fusion of orbiters into a pooled ring, and the
/// reverse decomposition once ammo falls below the hysteresis bound
fn update_ring_fusion(world: &mut World) {
    let orbiters: Vec<usize> = world
        .projectiles
        .iter()
        .enumerate()
        .filter(|(_, p)| matches!(p.kind, ProjectileKind::Orbiter { .. }))
        .map(|(i, _)| i)
        .collect();

    if orbiters.len() >= ring::FUSE_THRESHOLD {
        let total: f32 = orbiters.iter().map(|&i| world.projectiles[i].damage).sum();
        let avg_damage = total / orbiters.len() as f32;
        let ammo = orbiters.len() as f32;

        world
            .projectiles
            .retain(|p| !matches!(p.kind, ProjectileKind::Orbiter { .. }));

        let id = world.alloc_id();
        let mut ring_proj = Projectile::standard(
            id,
            Side::Player,
            world.player.position,
            Vec2::ZERO,
            avg_damage,
            -1,
        );
        ring_proj.kind = ProjectileKind::Ring {
            ammo,
            avg_damage,
            pulse_timer: 0.0,
        };
        ring_proj.life = PERSISTENT_LIFE;
        world.add_projectile(ring_proj);
        tracing::debug!(ammo, "orbiters fused into ring");
        return;
    }

    // Decompose a depleted ring back into individual orbiters
    let depleted = world.projectiles.iter().find_map(|p| match &p.kind {
        ProjectileKind::Ring { ammo, avg_damage, .. } if *ammo < ring::UNFUSE_AMMO => {
            Some((p.id, ammo.round().max(0.0) as usize, *avg_damage))
        }
        _ => None,
    });
    if let Some((ring_id, count, avg_damage)) = depleted {
        world.projectiles.retain(|p| p.id != ring_id);
        for i in 0..count {
            let id = world.alloc_id();
            let angle = i as f32 / count.max(1) as f32 * std::f32::consts::TAU;
            let mut orbiter = Projectile::standard(
                id,
                Side::Player,
                world.player.position + Vec2::from_angle(angle) * ring::ORBIT_RADIUS,
                Vec2::ZERO,
                avg_damage,
                0,
            );
            orbiter.kind = ProjectileKind::Orbiter { angle };
            orbiter.life = PERSISTENT_LIFE;
            world.add_projectile(orbiter);
        }
        tracing::debug!(count, "ring decomposed into orbiters");
    }
}

// ============================================================================
// Projectile motion
// ============================================================================

fn move_projectiles(world: &mut World, dt: f32) {
    let player_pos = world.player.position;
    let arena_radius = world.arena_radius;
    let homing_target = nearest_enemy(world, player_pos).map(|(_, pos)| pos);

    for projectile in world.projectiles.iter_mut() {
        match &mut projectile.kind {
            ProjectileKind::Orbiter { angle } => {
                *angle += ring::ORBIT_SPEED * dt;
                projectile.position = player_pos + Vec2::from_angle(*angle) * ring::ORBIT_RADIUS;
                continue;
            }
            ProjectileKind::Ring { .. } => {
                projectile.position = player_pos;
                continue;
            }
            ProjectileKind::Homing => {
                if let Some(target) = homing_target {
                    let desired = (target - projectile.position).normalize_or(Vec2::ZERO);
                    let current = projectile.velocity.normalize_or(desired);
                    let max_turn = pj::HOMING_TURN_RATE * dt;
                    let delta = current.angle_to(desired).clamp(-max_turn, max_turn);
                    projectile.velocity =
                        current.rotate(delta) * projectile.velocity.length().max(1.0);
                }
            }
            _ => {}
        }

        projectile.position += projectile.velocity * dt;
        projectile.life -= dt;

        if projectile.position.length() > arena_radius {
            match &mut projectile.kind {
                ProjectileKind::Bouncer { bounces_left } if *bounces_left > 0 => {
                    *bounces_left -= 1;
                    let normal = (-projectile.position).normalize_or(Vec2::new(1.0, 0.0));
                    projectile.velocity = projectile.velocity.reflect(normal);
                    projectile.position = projectile.position.clamp_length(arena_radius);
                }
                // Off the map: gone
                _ => projectile.life = 0.0,
            }
        }
    }

    world.projectiles.retain(|p| p.life > 0.0);
}

// ============================================================================
// Resolution
// ============================================================================

fn resolve_projectiles(
    world: &mut World,
    hooks: &mut dyn Progression,
    roster: &LegionRoster,
    events: &mut EventSink,
    dt: f32,
) {
    let now = world.clock;
    let execute_chance =
        hooks.upgrade_level(EXECUTE_UPGRADE) as f32 * EXECUTE_CHANCE_PER_LEVEL;
    let opts = damage::HitOptions { execute_chance };

    // Drain the list so the world stays freely mutable during resolution;
    // expired projectiles are filtered on reinstatement
    let mut projectiles = std::mem::take(&mut world.projectiles);

    for projectile in projectiles.iter_mut() {
        let is_ring = matches!(projectile.kind, ProjectileKind::Ring { .. });
        match projectile.owner {
            Side::Player if is_ring => {
                resolve_ring(world, hooks, roster, events, projectile, opts, dt)
            }
            Side::Player => {
                resolve_player_projectile(world, hooks, roster, events, projectile, opts, now)
            }
            Side::Enemy => resolve_enemy_projectile(world, events, projectile, now),
        }
    }

    projectiles.retain(|p| p.life > 0.0);
    // Systems may have queued new projectiles while the list was drained
    projectiles.append(&mut world.projectiles);
    world.projectiles = projectiles;
}

fn resolve_player_projectile(
    world: &mut World,
    hooks: &mut dyn Progression,
    roster: &LegionRoster,
    events: &mut EventSink,
    projectile: &mut Projectile,
    opts: damage::HitOptions,
    now: f64,
) {
    let candidates = world.grid.query_with_positions(
        projectile.position.x,
        projectile.position.y,
        HIT_RADIUS + BROAD_PHASE_PAD,
    );
    let mut reflected = false;

    for (enemy_id, _) in candidates {
        if projectile.life <= 0.0 {
            break;
        }
        if projectile.hits.contains(&enemy_id) {
            continue;
        }
        let Some(enemy) = world.enemy(enemy_id) else {
            continue;
        };
        if projectile.position.distance_to(enemy.position) > HIT_RADIUS + enemy.size {
            continue;
        }

        // Deflection first: direction and ownership flip, no damage, and
        // the loop moves on to the next candidate
        if !reflected
            && !matches!(projectile.kind, ProjectileKind::Orbiter { .. })
            && boss::deflects_projectile(enemy, projectile.position)
        {
            let away = (projectile.position - enemy.position).normalize_or(Vec2::new(1.0, 0.0));
            projectile.velocity = away * projectile.velocity.length().max(pj::SPEED * 0.5);
            projectile.owner = Side::Enemy;
            projectile.hits.clear();
            reflected = true;
            continue;
        }
        if reflected {
            continue;
        }

        projectile.hits.insert(enemy_id);
        let outcome = damage::deal_damage_to_enemy(
            world,
            roster,
            events,
            enemy_id,
            projectile.damage,
            opts,
            now,
        );

        if outcome.reflected > 0.0 {
            damage::deal_damage_to_player(world, events, outcome.reflected, now);
        }
        damage::grant_lifesteal(world, outcome.dealt, now);

        for dead_id in &outcome.lethal {
            death::handle_enemy_death(world, hooks, events, *dead_id);
        }

        // Pierce budget: consumed per enemy unless flagged infinite
        if !projectile.infinite_pierce() {
            if projectile.pierce == 0 {
                projectile.life = 0.0;
            } else {
                projectile.pierce -= 1;
            }
        }
    }
}

/// Ring collision is an annulus test around the player, pulsed on a fixed
/// cadence; each struck enemy drains pooled ammo
fn resolve_ring(
    world: &mut World,
    hooks: &mut dyn Progression,
    roster: &LegionRoster,
    events: &mut EventSink,
    projectile: &mut Projectile,
    opts: damage::HitOptions,
    dt: f32,
) {
    let now = world.clock;
    let ProjectileKind::Ring { ammo, avg_damage, pulse_timer } = &mut projectile.kind else {
        return;
    };
    *pulse_timer -= dt;
    if *pulse_timer > 0.0 {
        return;
    }
    *pulse_timer = ring::PULSE_INTERVAL;

    let ring_damage = *avg_damage;
    let center = projectile.position;
    let candidates = world.grid.query_with_positions(
        center.x,
        center.y,
        ring::ORBIT_RADIUS + ring::RING_HIT_PAD + BROAD_PHASE_PAD,
    );

    for (enemy_id, _) in candidates {
        if *ammo <= 0.0 {
            break;
        }
        let Some(enemy) = world.enemy(enemy_id) else {
            continue;
        };
        let dist = center.distance_to(enemy.position);
        if (dist - ring::ORBIT_RADIUS).abs() >= ring::RING_HIT_PAD + enemy.size * 0.5 {
            continue;
        }

        *ammo -= ring::AMMO_PER_HIT;
        let outcome =
            damage::deal_damage_to_enemy(world, roster, events, enemy_id, ring_damage, opts, now);
        damage::grant_lifesteal(world, outcome.dealt, now);
        for dead_id in &outcome.lethal {
            death::handle_enemy_death(world, hooks, events, *dead_id);
        }
    }
}

fn resolve_enemy_projectile(
    world: &mut World,
    events: &mut EventSink,
    projectile: &mut Projectile,
    now: f64,
) {
    let reach = HIT_RADIUS + pc::RADIUS;
    if projectile.position.distance_to(world.player.position) > reach {
        return;
    }
    damage::deal_damage_to_player(world, events, projectile.damage, now);
    projectile.life = 0.0;
}

// ============================================================================
// Area effects
// ============================================================================

fn update_area_effects(
    world: &mut World,
    hooks: &mut dyn Progression,
    roster: &LegionRoster,
    events: &mut EventSink,
    dt: f32,
) {
    use crate::game::constants::area::*;
    use crate::game::state::AreaEffectKind;

    let now = world.clock;
    let mut effects = std::mem::take(&mut world.effects);

    for effect in effects.iter_mut() {
        effect.remaining -= dt;
        if effect.remaining <= 0.0 {
            continue;
        }

        match &mut effect.kind {
            AreaEffectKind::Nova { level, pulse_timer } => {
                // Aura follows its caster
                effect.position = world.player.position;
                *pulse_timer -= dt;
                if *pulse_timer > 0.0 {
                    continue;
                }
                *pulse_timer = NOVA_PULSE_INTERVAL;
                let pulse_damage = NOVA_BASE_DAMAGE + *level as f32 * NOVA_DAMAGE_PER_LEVEL;

                let victims = world
                    .grid
                    .query_with_positions(effect.position.x, effect.position.y, effect.radius);
                for (enemy_id, _) in victims {
                    let Some(enemy) = world.enemy_mut(enemy_id) else {
                        continue;
                    };
                    if enemy.position.distance_to(effect.position) > effect.radius {
                        continue;
                    }
                    // Pulses leave a mark window for follow-up shots
                    enemy.marked_until = now + NOVA_MARK_DURATION;
                    let outcome = damage::deal_damage_to_enemy(
                        world,
                        roster,
                        events,
                        enemy_id,
                        pulse_damage,
                        damage::HitOptions::default(),
                        now,
                    );
                    for dead_id in &outcome.lethal {
                        death::handle_enemy_death(world, hooks, events, *dead_id);
                    }
                }
            }
            AreaEffectKind::Contagion { pulse_timer } => {
                *pulse_timer -= dt;
                if *pulse_timer > 0.0 {
                    continue;
                }
                *pulse_timer = crate::game::constants::enemy::CONTAGION_PULSE_INTERVAL;

                let victims = world
                    .grid
                    .query_with_positions(effect.position.x, effect.position.y, effect.radius);
                for (enemy_id, _) in victims {
                    let Some(enemy) = world.enemy_mut(enemy_id) else {
                        continue;
                    };
                    if enemy.position.distance_to(effect.position) > effect.radius {
                        continue;
                    }
                    // The plague marks its carriers: infection plus a
                    // vulnerability that re-applies every pulse
                    enemy.infected = true;
                    enemy.taken_damage_mult = enemy.taken_damage_mult.max(CONTAGION_VULNERABILITY);
                    let outcome = damage::deal_damage_to_enemy(
                        world,
                        roster,
                        events,
                        enemy_id,
                        CONTAGION_PULSE_DAMAGE,
                        damage::HitOptions::default(),
                        now,
                    );
                    for dead_id in &outcome.lethal {
                        death::handle_enemy_death(world, hooks, events, *dead_id);
                    }
                }
            }
            AreaEffectKind::Beam { owner, angle } => {
                // Beam rides its owner and sweeps; an ownerless beam dies
                match world.enemy(*owner) {
                    Some(boss) => effect.position = boss.position,
                    None => {
                        effect.remaining = 0.0;
                        continue;
                    }
                }
                *angle += BEAM_SWEEP_RATE * dt;

                let to_player = world.player.position - effect.position;
                let along = to_player.dot(Vec2::from_angle(*angle));
                if along > 0.0 && along < effect.radius {
                    let lateral = (to_player - Vec2::from_angle(*angle) * along).length();
                    if lateral < crate::game::constants::boss::BEAM_HALF_WIDTH + pc::RADIUS {
                        damage::deal_damage_to_player(
                            world,
                            events,
                            crate::game::constants::boss::BEAM_DPS * dt,
                            now,
                        );
                    }
                }
            }
        }
    }

    effects.retain(|e| e.remaining > 0.0);
    effects.append(&mut world.effects);
    world.effects = effects;
}

// ============================================================================
// Contact damage
// ============================================================================

fn contact_damage(
    world: &mut World,
    hooks: &mut dyn Progression,
    roster: &LegionRoster,
    events: &mut EventSink,
) {
    let now = world.clock;
    let player_pos = world.player.position;

    let candidates = world
        .grid
        .query_with_positions(player_pos.x, player_pos.y, BROAD_PHASE_PAD);

    for (enemy_id, _) in candidates {
        let Some(enemy) = world.enemy(enemy_id) else {
            continue;
        };
        if now < enemy.contact_ready_at {
            continue;
        }
        if enemy.position.distance_to(player_pos) > enemy.size + CONTACT_PAD {
            continue;
        }

        // Damage-source-specific formula: power-law of enemy max HP by
        // default, fixed fraction of player max HP for custom rules
        let raw = match &enemy.role {
            Role::Unique { kind: UniqueKind::Crusher, .. } => {
                world.player.resolved.max_hp * CONTACT_PLAYER_MAX_HP_RATIO
            }
            _ => contact_damage_for(enemy.max_hp),
        };

        if let Some(enemy) = world.enemy_mut(enemy_id) {
            enemy.contact_ready_at = now + CONTACT_COOLDOWN as f64;
        }
        let outcome = damage::deal_damage_to_player(world, events, raw, now);
        if outcome.died {
            return; // match is over, stop resolving contacts
        }
        // Thorns in reverse: ramming a spiked player costs the rammer
        let thorns_level = hooks.upgrade_level("barbed_plating");
        if thorns_level > 0 && outcome.taken > 0.0 {
            let reflect = outcome.taken * THORNS_RATIO * thorns_level as f32;
            let hit = damage::deal_damage_to_enemy(
                world,
                roster,
                events,
                enemy_id,
                reflect,
                damage::HitOptions::default(),
                now,
            );
            for dead_id in &hit.lethal {
                death::handle_enemy_death(world, hooks, events, *dead_id);
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn nearest_enemy(world: &World, from: Vec2) -> Option<(EntityId, Vec2)> {
    world
        .enemies
        .values()
        .filter(|e| !e.dead)
        .min_by(|a, b| {
            a.position
                .distance_sq_to(from)
                .partial_cmp(&b.position.distance_sq_to(from))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|e| (e.id, e.position))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::progression::NullProgression;
    use crate::game::state::{Authority, Enemy, Shape};

    fn combat_world() -> World {
        let mut world = World::new(Authority::Host);
        world.player.resolved.max_hp = 100.0;
        world.player.resolved.damage = 40.0;
        world.player.resolved.attack_rate = 1.0;
        world.player.resolved.armor_cap = crate::game::constants::armor::CAP;
        world.player.hp = 100.0;
        world
    }

    fn run_combat(world: &mut World, dt: f32) -> EventSink {
        let roster = LegionRoster::build(&world.enemies);
        let mut events = Vec::new();
        let mut hooks = NullProgression;
        update(world, &mut hooks, &roster, &mut events, dt);
        events
    }

    #[test]
    fn test_projectile_hits_and_consumes_pierce_zero() {
        let mut world = combat_world();
        let id = world.alloc_id();
        world.spawn_enemy(Enemy::normal(id, Shape::Circle, Vec2::new(50.0, 0.0), 100.0, 0));

        let pid = world.alloc_id();
        world.add_projectile(Projectile::standard(
            pid,
            Side::Player,
            Vec2::new(45.0, 0.0),
            Vec2::new(1.0, 0.0),
            40.0,
            0,
        ));
        // Stop auto-fire interfering with the projectile count
        world.player.attack_timer = 100.0;

        run_combat(&mut world, 1.0 / 60.0);

        assert!((world.enemies[&id].hp - 60.0).abs() < 1e-3);
        assert!(world.projectiles.is_empty(), "pierce 0 projectile consumed");
    }

    #[test]
    fn test_pierce_budget_allows_multiple_hits() {
        let mut world = combat_world();
        let a = world.alloc_id();
        world.spawn_enemy(Enemy::normal(a, Shape::Circle, Vec2::new(50.0, 0.0), 100.0, 0));
        let b = world.alloc_id();
        world.spawn_enemy(Enemy::normal(b, Shape::Circle, Vec2::new(60.0, 0.0), 100.0, 0));

        let pid = world.alloc_id();
        world.add_projectile(Projectile::standard(
            pid,
            Side::Player,
            Vec2::new(55.0, 0.0),
            Vec2::ZERO,
            40.0,
            1,
        ));
        world.player.attack_timer = 100.0;

        run_combat(&mut world, 1.0 / 60.0);

        // Both candidates in range were damaged once
        assert!((world.enemies[&a].hp - 60.0).abs() < 1e-3);
        assert!((world.enemies[&b].hp - 60.0).abs() < 1e-3);
    }

    #[test]
    fn test_hits_set_prevents_double_damage() {
        let mut world = combat_world();
        let id = world.alloc_id();
        world.spawn_enemy(Enemy::normal(id, Shape::Circle, Vec2::new(50.0, 0.0), 100.0, 0));

        let pid = world.alloc_id();
        // Infinite pierce, stationary: would re-hit every tick without dedup
        let mut p = Projectile::standard(
            pid,
            Side::Player,
            Vec2::new(50.0, 0.0),
            Vec2::ZERO,
            10.0,
            -1,
        );
        p.life = 10.0;
        world.add_projectile(p);
        world.player.attack_timer = 100.0;

        run_combat(&mut world, 1.0 / 60.0);
        run_combat(&mut world, 1.0 / 60.0);

        assert!((world.enemies[&id].hp - 90.0).abs() < 1e-3, "hit exactly once");
    }

    #[test]
    fn test_kill_flows_through_death_pipeline() {
        let mut world = combat_world();
        let id = world.alloc_id();
        world.spawn_enemy(Enemy::normal(id, Shape::Circle, Vec2::new(50.0, 0.0), 30.0, 0));

        let pid = world.alloc_id();
        world.add_projectile(Projectile::standard(
            pid,
            Side::Player,
            Vec2::new(50.0, 0.0),
            Vec2::ZERO,
            40.0,
            0,
        ));
        world.player.attack_timer = 100.0;

        run_combat(&mut world, 1.0 / 60.0);

        assert!(world.enemies[&id].dead);
        assert_eq!(world.kills.total, 1);
        assert!(world.xp.current > 0.0);
    }

    #[test]
    fn test_enemy_projectile_damages_player() {
        let mut world = combat_world();
        let pid = world.alloc_id();
        world.add_projectile(Projectile::standard(
            pid,
            Side::Enemy,
            world.player.position,
            Vec2::ZERO,
            15.0,
            0,
        ));
        world.player.attack_timer = 100.0;

        let events = run_combat(&mut world, 1.0 / 60.0);

        assert!(world.player.hp < 100.0);
        assert!(events
            .iter()
            .any(|e| matches!(e, crate::game::events::GameEvent::PlayerHit { .. })));
        assert!(world.projectiles.is_empty());
    }

    #[test]
    fn test_contact_damage_has_cooldown() {
        let mut world = combat_world();
        let id = world.alloc_id();
        world.spawn_enemy(Enemy::normal(id, Shape::Circle, world.player.position, 100.0, 0));
        world.player.attack_timer = 100.0;

        run_combat(&mut world, 1.0 / 60.0);
        let hp_after_first = world.player.hp;
        assert!(hp_after_first < 100.0, "contact damage applied");

        // Same tick window: cooldown blocks a second instance
        run_combat(&mut world, 1.0 / 60.0);
        assert!((world.player.hp - hp_after_first).abs() < 1e-3);
    }

    #[test]
    fn test_crusher_contact_uses_player_max_hp_rule() {
        let mut world = combat_world();
        world.player.resolved.armor = 0.0;
        let id = world.alloc_id();
        let mut crusher = Enemy::normal(id, Shape::Square, world.player.position, 5000.0, 0);
        crusher.role = Role::Unique {
            kind: UniqueKind::Crusher,
            next_summon_at: 0.0,
        };
        world.spawn_enemy(crusher);
        world.player.attack_timer = 100.0;

        run_combat(&mut world, 1.0 / 60.0);

        let expected = 100.0 * CONTACT_PLAYER_MAX_HP_RATIO;
        assert!((100.0 - world.player.hp - expected).abs() < 1e-3);
    }

    #[test]
    fn test_orbiters_fuse_into_ring_with_hysteresis() {
        struct OrbiterHooks;
        impl Progression for OrbiterHooks {
            fn try_drop_loot(&mut self, _x: f32, _y: f32) {}
            fn stat_bonus(&self, _key: crate::game::progression::StatKey) -> f32 {
                0.0
            }
            fn upgrade_level(&self, id: &str) -> u32 {
                if id == "orbital_blades" {
                    3 // 12 orbiters, above the fuse threshold
                } else {
                    0
                }
            }
        }

        let mut world = combat_world();
        world.player.attack_timer = 100.0;
        let roster = LegionRoster::default();
        let mut events = Vec::new();
        let mut hooks = OrbiterHooks;

        // Maintenance spawns the orbiters and fusion collapses them; the
        // second pass must not spawn a second pool behind the ring
        update(&mut world, &mut hooks, &roster, &mut events, 1.0 / 60.0);
        update(&mut world, &mut hooks, &roster, &mut events, 1.0 / 60.0);

        let rings = world
            .projectiles
            .iter()
            .filter(|p| matches!(p.kind, ProjectileKind::Ring { .. }))
            .count();
        assert_eq!(rings, 1, "orbiters should fuse once over the threshold");

        // Drain the ammo below the hysteresis bound: ring decomposes
        for p in world.projectiles.iter_mut() {
            if let ProjectileKind::Ring { ammo, .. } = &mut p.kind {
                *ammo = ring::UNFUSE_AMMO - 1.0;
            }
        }
        update(&mut world, &mut hooks, &roster, &mut events, 1.0 / 60.0);
        let rings = world
            .projectiles
            .iter()
            .filter(|p| matches!(p.kind, ProjectileKind::Ring { .. }))
            .count();
        assert_eq!(rings, 0, "depleted ring decomposes");
    }

    #[test]
    fn test_ring_annulus_hits_rim_not_center() {
        let mut world = combat_world();
        world.player.attack_timer = 100.0;

        // Enemy on the rim and one at the center
        let rim = world.alloc_id();
        world.spawn_enemy(Enemy::normal(
            rim,
            Shape::Circle,
            Vec2::new(ring::ORBIT_RADIUS, 0.0),
            100.0,
            0,
        ));
        let center = world.alloc_id();
        world.spawn_enemy(Enemy::normal(center, Shape::Circle, Vec2::ZERO, 100.0, 0));

        let pid = world.alloc_id();
        let mut ring_proj =
            Projectile::standard(pid, Side::Player, Vec2::ZERO, Vec2::ZERO, 20.0, -1);
        ring_proj.kind = ProjectileKind::Ring {
            ammo: 10.0,
            avg_damage: 20.0,
            pulse_timer: 0.0,
        };
        ring_proj.life = PERSISTENT_LIFE;
        world.add_projectile(ring_proj);

        run_combat(&mut world, 1.0 / 60.0);

        assert!(world.enemies[&rim].hp < 100.0, "rim enemy takes annulus damage");
        assert!((world.enemies[&center].hp - 100.0).abs() < 1e-3, "center untouched");
    }

    #[test]
    fn test_deflect_boss_reflects_projectile() {
        let mut world = combat_world();
        let boss_id = boss::spawn_boss(&mut world, Shape::Square, Vec2::new(40.0, 0.0), 4, 0);
        world.player.attack_timer = 100.0;

        let pid = world.alloc_id();
        world.add_projectile(Projectile::standard(
            pid,
            Side::Player,
            Vec2::new(40.0, 0.0),
            Vec2::new(300.0, 0.0),
            1000.0,
            0,
        ));

        run_combat(&mut world, 1.0 / 60.0);

        // No damage was applied, the projectile switched sides
        let boss = &world.enemies[&boss_id];
        assert!((boss.hp - boss.max_hp).abs() < 1e-3);
        let reflected = world.projectiles.iter().find(|p| p.id == pid).unwrap();
        assert_eq!(reflected.owner, Side::Enemy);
    }

    #[test]
    fn test_nova_pulse_damages_and_marks() {
        let mut world = combat_world();
        world.player.attack_timer = 100.0;
        let id = world.alloc_id();
        world.spawn_enemy(Enemy::normal(id, Shape::Circle, Vec2::new(80.0, 0.0), 100.0, 0));

        let eid = world.alloc_id();
        world.add_effect(crate::game::state::AreaEffect {
            id: eid,
            position: Vec2::ZERO,
            radius: crate::game::constants::area::NOVA_RADIUS,
            remaining: 5.0,
            kind: crate::game::state::AreaEffectKind::Nova {
                level: 1,
                pulse_timer: 0.0,
            },
        });

        run_combat(&mut world, 1.0 / 60.0);

        let enemy = &world.enemies[&id];
        assert!(enemy.hp < 100.0);
        assert!(enemy.marked_until > 0.0);
    }
}
