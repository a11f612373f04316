//! Per-archetype steering and movement commit.
//!
//! Dispatch precedence is fixed: satellite > boss > minion > unique > rare >
//! elite > normal. Bosses, worms, and legions move in their own systems;
//! this module owns everything else plus the shared commit helper (jitter,
//! boundary containment, bounce) those systems reuse.
//!
//! The flanker overlay replaces the chase target with an offset approach
//! point, and only applies while the enemy has no special maneuver running.

use rand::Rng;

use crate::game::constants::{boss, enemy as ec};
use crate::game::state::{
    Enemy, EntityId, Projectile, Role, ScriptedEvent, Shape, Side, UniqueKind, World,
};
use crate::game::systems::{legion, worm};
use crate::util::vec2::Vec2;

/// Maximum live minions a broodmother maintains
const BROOD_CAP: usize = 6;
/// Minions spawned per summon
const BROOD_BATCH: u32 = 2;
/// Seconds between broodmother summons
const BROOD_INTERVAL: f32 = 7.0;
/// Distance at which a broodmother holds off the player
const BROOD_STANDOFF: f32 = 380.0;
/// Distance at which a flanker abandons its offset point and commits
const FLANK_COMMIT_DIST: f32 = 110.0;

pub fn update(world: &mut World, dt: f32) {
    consume_scripts(world);
    rebuild_separation_grid(world);

    let player_pos = world.player.position;
    let now = world.clock;
    let ids: Vec<EntityId> = world.enemies.keys().copied().collect();

    for id in ids {
        let Some(enemy) = world.enemies.get(&id) else {
            continue;
        };
        if enemy.dead {
            continue;
        }

        match &enemy.role {
            // Moved by their own systems
            Role::Boss(_) | Role::WormSegment(_) | Role::LegionLeader { .. } | Role::LegionMember { .. } => {
                continue
            }
            Role::Satellite { owner, .. } => {
                let owner = *owner;
                update_satellite(world, id, owner, dt);
                continue;
            }
            Role::Unique { kind, .. } => {
                let kind = *kind;
                update_unique(world, id, kind, player_pos, now, dt);
                continue;
            }
            _ => {}
        }

        let enemy = &world.enemies[&id];
        let separation = separation_push(world, enemy);
        let to_player = player_pos - enemy.position;

        let desired = match &enemy.role {
            Role::Rare { .. } => steer_flee(enemy, to_player, now),
            Role::Minion { .. } => to_player.normalize_or(Vec2::ZERO) * enemy.speed,
            // Elites steer like their shape; the stat difference came at promotion
            _ => steer_shape(enemy.shape, to_player, enemy.speed, now),
        };

        // Flanker overlay: approach via an offset point beside the player
        let desired = match enemy.flank {
            Some(flank) if !enemy.has_special_maneuver() => {
                let axis = (enemy.position - player_pos).normalize_or(Vec2::new(1.0, 0.0));
                let offset_point = player_pos + axis.rotate(flank.angle) * flank.distance;
                let to_offset = offset_point - enemy.position;
                if to_player.length() < FLANK_COMMIT_DIST || to_offset.length() < 40.0 {
                    to_player.normalize_or(Vec2::ZERO) * enemy.speed
                } else {
                    to_offset.normalize_or(Vec2::ZERO) * enemy.speed
                }
            }
            _ => desired,
        };

        let arena_radius = world.arena_radius;
        if let Some(enemy) = world.enemies.get_mut(&id) {
            commit_move(enemy, desired + separation, dt, arena_radius);
        }
    }

    expire_snitches(world);
}

/// Per-shape steering: relative target vector in, velocity out
fn steer_shape(shape: Shape, to_target: Vec2, speed: f32, clock: f64) -> Vec2 {
    let dir = to_target.normalize_or(Vec2::ZERO);
    match shape {
        // Straight-line chaser
        Shape::Circle => dir * speed,
        // Fast weave: the approach axis wobbles over time
        Shape::Triangle => {
            let wobble = (clock * 4.0).sin() as f32 * 0.6;
            dir.rotate(wobble) * speed
        }
        // Slow bulldozer, unbothered by anything
        Shape::Square => dir * speed,
        // Closes in, then circles at claw range
        Shape::Pentagon => {
            let dist = to_target.length();
            if dist > 180.0 {
                dir * speed
            } else {
                (dir * 0.4 + dir.perpendicular() * 0.9).normalize_or(dir) * speed
            }
        }
        // Hard zigzag on a time parity
        Shape::Star => {
            let sign = if (clock as i64) % 2 == 0 { 1.0 } else { -1.0 };
            dir.rotate(0.7 * sign) * speed
        }
    }
}

/// Rare runner: flees along the player axis with a drifting wander
fn steer_flee(enemy: &Enemy, to_player: Vec2, clock: f64) -> Vec2 {
    let away = (-to_player).normalize_or(Vec2::new(1.0, 0.0));
    let drift = away.perpendicular() * (clock * 2.0 + enemy.id as f64).sin() as f32 * 0.5;
    (away + drift).normalize_or(away) * enemy.speed
}

fn update_satellite(world: &mut World, id: EntityId, owner: EntityId, dt: f32) {
    let Some(owner_pos) = world.enemy(owner).map(|o| o.position) else {
        // Owner is gone: the satellite has nothing to shield. Remove it
        // directly - this is cleanup, not a kill.
        if let Some(sat) = world.enemies.get_mut(&id) {
            sat.dead = true;
        }
        tracing::debug!(satellite = id, owner = owner, "orphaned satellite removed");
        return;
    };

    if let Some(sat) = world.enemies.get_mut(&id) {
        if let Role::Satellite { angle, .. } = &mut sat.role {
            *angle += boss::SATELLITE_ORBIT_SPEED * dt;
            let target = owner_pos + Vec2::from_angle(*angle) * boss::SATELLITE_ORBIT;
            sat.velocity = (target - sat.position) * (1.0 / dt.max(1e-3));
            sat.position = target;
        }
    }
}

fn update_unique(
    world: &mut World,
    id: EntityId,
    kind: UniqueKind,
    player_pos: Vec2,
    now: f64,
    dt: f32,
) {
    let Some(enemy) = world.enemies.get(&id) else {
        return;
    };
    let to_player = player_pos - enemy.position;
    let separation = separation_push(world, enemy);

    let desired = match kind {
        // Juggernauts walk straight in
        UniqueKind::Crusher | UniqueKind::Gravedigger => {
            to_player.normalize_or(Vec2::ZERO) * enemy.speed
        }
        // Holds a standoff ring while her brood fights
        UniqueKind::Broodmother => {
            let dist = to_player.length();
            if dist > BROOD_STANDOFF {
                to_player.normalize_or(Vec2::ZERO) * enemy.speed
            } else if dist < BROOD_STANDOFF * 0.7 {
                -to_player.normalize_or(Vec2::ZERO) * enemy.speed
            } else {
                to_player.normalize_or(Vec2::new(1.0, 0.0)).perpendicular() * enemy.speed * 0.6
            }
        }
    };

    let arena_radius = world.arena_radius;
    if let Some(enemy) = world.enemies.get_mut(&id) {
        commit_move(enemy, desired + separation, dt, arena_radius);
    }

    if kind == UniqueKind::Broodmother {
        try_brood_summon(world, id, now);
    }
}

fn try_brood_summon(world: &mut World, mother_id: EntityId, now: f64) {
    let Some(mother) = world.enemy(mother_id) else {
        return;
    };
    let Role::Unique { next_summon_at, .. } = mother.role else {
        return;
    };
    if now < next_summon_at {
        return;
    }

    let owned = world
        .enemies
        .values()
        .filter(|e| !e.dead && matches!(e.role, Role::Minion { owner: Some(o) } if o == mother_id))
        .count();

    let mother_pos = mother.position;
    let mother_era = mother.era;
    let mother_hp = mother.max_hp;
    if owned < BROOD_CAP {
        let mut rng = rand::thread_rng();
        for _ in 0..BROOD_BATCH {
            let id = world.alloc_id();
            let angle = rng.gen_range(0.0..std::f32::consts::TAU);
            let pos = mother_pos + Vec2::from_angle(angle) * 50.0;
            let mut minion = Enemy::normal(id, Shape::Circle, pos, mother_hp * 0.05, mother_era);
            minion.size *= 0.7;
            minion.speed *= 1.2;
            minion.role = Role::Minion {
                owner: Some(mother_id),
            };
            world.spawn_enemy(minion);
        }
    }

    // Punctuate the summon with a spit at the player
    let to_player = world.player.position - mother_pos;
    let pid = world.alloc_id();
    world.add_projectile(Projectile::standard(
        pid,
        Side::Enemy,
        mother_pos,
        to_player.normalize_or(Vec2::new(1.0, 0.0)) * 240.0,
        mother_hp * 0.02,
        0,
    ));

    if let Some(mother) = world.enemy_mut(mother_id) {
        if let Role::Unique { next_summon_at, .. } = &mut mother.role {
            *next_summon_at = now + BROOD_INTERVAL as f64;
        }
    }
}

/// Instantiate the director's flagged events. Draining the queue here is
/// what guarantees each script is consumed exactly once.
fn consume_scripts(world: &mut World) {
    let scripts: Vec<ScriptedEvent> = world.pending_scripts.drain(..).collect();
    for script in scripts {
        match script {
            ScriptedEvent::Legion { center } => {
                let era = world.director.era_hint;
                legion::spawn_legion(world, center, era);
            }
            ScriptedEvent::Horde { count } => spawn_horde(world, count),
            ScriptedEvent::WormNest { position } => {
                let era = world.director.era_hint;
                worm::spawn_chain(world, position, 6, era);
            }
        }
    }
}

/// Horde: a burst of fast throwaway enemies from one arc of the boundary
fn spawn_horde(world: &mut World, count: u32) {
    let mut rng = rand::thread_rng();
    let era = world.director.era_hint;
    let base_angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let max_hp = crate::game::constants::enemy_max_hp(ec::BASE_HP * 0.5, world.clock);

    for _ in 0..count {
        let angle = base_angle + rng.gen_range(-0.6..0.6);
        let dist = world.arena_radius - rng.gen_range(20.0..120.0);
        let id = world.alloc_id();
        let mut enemy = Enemy::normal(
            id,
            Shape::Triangle,
            Vec2::from_angle(angle) * dist,
            max_hp,
            era,
        );
        enemy.speed *= 1.3;
        world.spawn_enemy(enemy);
    }
    tracing::info!(count, "horde spawned");
}

/// Uncaught snitches escape: removed without reward
fn expire_snitches(world: &mut World) {
    let now = world.clock;
    for enemy in world.enemies.values_mut() {
        if enemy.dead {
            continue;
        }
        if let Role::Rare { despawn_at } = enemy.role {
            if now >= despawn_at {
                enemy.dead = true;
            }
        }
    }
}

/// Rebuild the spatial grid from live enemies for separation queries.
/// Combat rebuilds it again for its own pass; the grid has no cross-tick
/// state beyond allocation reuse.
pub fn rebuild_separation_grid(world: &mut World) {
    let mut grid = std::mem::take(&mut world.grid);
    grid.clear();
    for enemy in world.enemies.values() {
        if !enemy.dead {
            grid.insert(enemy.id, enemy.position);
        }
    }
    world.grid = grid;
}

/// Local push away from crowded neighbors
pub fn separation_push(world: &World, enemy: &Enemy) -> Vec2 {
    let mut push = Vec2::ZERO;
    let candidates =
        world
            .grid
            .query_with_positions(enemy.position.x, enemy.position.y, ec::SEPARATION_RADIUS);
    for (other_id, other_pos) in candidates {
        if other_id == enemy.id {
            continue;
        }
        let away = enemy.position - other_pos;
        let dist = away.length();
        if dist < ec::SEPARATION_RADIUS {
            let strength = 1.0 - dist / ec::SEPARATION_RADIUS;
            push += away.normalize_or(Vec2::new(1.0, 0.0)) * strength;
        }
    }
    push * ec::SEPARATION_PUSH
}

/// Apply micro-jitter, contain to the arena, and commit or bounce
pub fn commit_move(enemy: &mut Enemy, desired: Vec2, dt: f32, arena_radius: f32) {
    let mut rng = rand::thread_rng();
    let jitter = Vec2::new(
        rng.gen_range(-ec::JITTER..=ec::JITTER),
        rng.gen_range(-ec::JITTER..=ec::JITTER),
    );
    let velocity = desired + jitter;
    let tentative = enemy.position + velocity * dt;

    if tentative.length() > arena_radius {
        // Bounce reaction: reflect off the boundary normal and clamp inside
        let normal = (-tentative).normalize_or(Vec2::new(1.0, 0.0));
        enemy.velocity = velocity.reflect(normal);
        enemy.position = tentative.clamp_length(arena_radius);
    } else {
        enemy.velocity = velocity;
        enemy.position = tentative;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Authority, Flank};

    #[test]
    fn test_circle_chases_player() {
        let mut world = World::new(Authority::Host);
        world.player.position = Vec2::new(500.0, 0.0);
        let id = world.alloc_id();
        world.spawn_enemy(Enemy::normal(id, Shape::Circle, Vec2::ZERO, 20.0, 0));

        let start_dist = world.enemies[&id].position.distance_to(world.player.position);
        for _ in 0..30 {
            update(&mut world, 1.0 / 60.0);
        }
        let end_dist = world.enemies[&id].position.distance_to(world.player.position);
        assert!(end_dist < start_dist, "{} !< {}", end_dist, start_dist);
    }

    #[test]
    fn test_snitch_flees_and_expires() {
        let mut world = World::new(Authority::Host);
        world.player.position = Vec2::ZERO;
        let id = world.alloc_id();
        let mut snitch = Enemy::normal(id, Shape::Star, Vec2::new(100.0, 0.0), 10.0, 0);
        snitch.role = Role::Rare { despawn_at: 0.5 };
        world.spawn_enemy(snitch);

        update(&mut world, 1.0 / 60.0);
        assert!(world.enemies[&id].position.x > 100.0, "snitch should run away");

        world.clock = 1.0;
        update(&mut world, 1.0 / 60.0);
        assert!(world.enemies[&id].dead, "uncaught snitch despawns");
    }

    #[test]
    fn test_enemy_bounces_at_boundary() {
        let mut world = World::new(Authority::Host);
        world.player.position = Vec2::new(world.arena_radius + 500.0, 0.0);
        let id = world.alloc_id();
        let mut enemy = Enemy::normal(id, Shape::Circle, Vec2::new(world.arena_radius - 1.0, 0.0), 20.0, 0);
        enemy.speed = 10_000.0;
        world.spawn_enemy(enemy);

        update(&mut world, 1.0 / 60.0);
        assert!(world.enemies[&id].position.length() <= world.arena_radius + 1e-3);
    }

    #[test]
    fn test_orphaned_satellite_removed() {
        let mut world = World::new(Authority::Host);
        let id = world.alloc_id();
        let mut sat = Enemy::normal(id, Shape::Circle, Vec2::ZERO, 10.0, 0);
        sat.role = Role::Satellite {
            owner: 12345,
            angle: 0.0,
        };
        world.spawn_enemy(sat);

        update(&mut world, 1.0 / 60.0);
        assert!(world.enemies[&id].dead);
    }

    #[test]
    fn test_satellite_orbits_owner() {
        let mut world = World::new(Authority::Host);
        let owner_id = world.alloc_id();
        world.spawn_enemy(Enemy::normal(owner_id, Shape::Square, Vec2::ZERO, 100.0, 0));

        let sat_id = world.alloc_id();
        let mut sat = Enemy::normal(sat_id, Shape::Circle, Vec2::ZERO, 10.0, 0);
        sat.role = Role::Satellite {
            owner: owner_id,
            angle: 0.0,
        };
        world.spawn_enemy(sat);

        update(&mut world, 1.0 / 60.0);
        let dist = world.enemies[&sat_id].position.length();
        assert!((dist - boss::SATELLITE_ORBIT).abs() < 1.0);
    }

    #[test]
    fn test_broodmother_summons_capped() {
        let mut world = World::new(Authority::Host);
        world.player.position = Vec2::new(BROOD_STANDOFF, 0.0);
        let id = world.alloc_id();
        let mut mother = Enemy::normal(id, Shape::Pentagon, Vec2::ZERO, 300.0, 0);
        mother.role = Role::Unique {
            kind: UniqueKind::Broodmother,
            next_summon_at: 0.0,
        };
        world.spawn_enemy(mother);

        // Enough update calls to trigger several summon windows
        for i in 0..20 {
            world.clock = i as f64 * BROOD_INTERVAL as f64;
            update(&mut world, 1.0 / 60.0);
        }

        let minions = world
            .enemies
            .values()
            .filter(|e| matches!(e.role, Role::Minion { .. }))
            .count();
        assert!(minions >= BROOD_BATCH as usize);
        assert!(minions <= BROOD_CAP + BROOD_BATCH as usize);
    }

    #[test]
    fn test_flanker_approaches_offset_point() {
        let mut world = World::new(Authority::Host);
        world.player.position = Vec2::ZERO;
        let id = world.alloc_id();
        let mut enemy = Enemy::normal(id, Shape::Circle, Vec2::new(600.0, 0.0), 20.0, 0);
        enemy.flank = Some(Flank {
            angle: std::f32::consts::FRAC_PI_2,
            distance: ec::FLANK_DISTANCE,
        });
        world.spawn_enemy(enemy);

        for _ in 0..60 {
            update(&mut world, 1.0 / 60.0);
        }
        // A flanker drifts off the direct player axis instead of walking
        // straight down it
        let pos = world.enemies[&id].position;
        assert!(pos.y.abs() > 20.0, "flanker stayed on axis: {:?}", pos);
    }

    #[test]
    fn test_separation_pushes_apart() {
        let mut world = World::new(Authority::Host);
        let a = world.alloc_id();
        world.spawn_enemy(Enemy::normal(a, Shape::Circle, Vec2::new(0.0, 0.0), 20.0, 0));
        let b = world.alloc_id();
        world.spawn_enemy(Enemy::normal(b, Shape::Circle, Vec2::new(5.0, 0.0), 20.0, 0));

        rebuild_separation_grid(&mut world);
        let push = separation_push(&world, &world.enemies[&a]);
        assert!(push.x < 0.0, "push should point away from the neighbor");
    }

}
