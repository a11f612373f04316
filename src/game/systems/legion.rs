//! Legion formations: scripted group spawns sharing one pooled shield.
//!
//! The leader chases the player directly; members chase their slot offset
//! relative to the leader's *current* position, capped to a maximum
//! per-tick displacement so a fast leader drags the formation instead of
//! teleporting it. The pooled shield lives on the leader and absorbs
//! damage for every member (see the damage pipeline); when the leader dies
//! the first surviving member inherits leadership and the remaining pool.

use rand::Rng;

use crate::game::constants::legion::*;
use crate::game::state::{
    Enemy, EntityId, LegionId, LegionRoster, Role, Shape, World, legion_slot_offset,
};
use crate::game::systems::movement;
use crate::util::vec2::Vec2;

pub fn update(world: &mut World, dt: f32) {
    // Fresh view: earlier systems may have killed members this tick
    let roster = LegionRoster::build(&world.enemies);
    let player_pos = world.player.position;
    let arena_radius = world.arena_radius;

    for (legion_id, group) in &roster.groups {
        let leader_id = match group.leader {
            Some(id) => id,
            None => {
                // Leader vanished without the death hook running (stale
                // snapshot, despawn): elect the first surviving member
                match group.members.first().copied() {
                    Some(member) => {
                        promote_member(world, member, 0.0);
                        tracing::warn!(legion = legion_id, "legion leader missing, member promoted");
                        member
                    }
                    None => continue,
                }
            }
        };

        // Leader chases the player directly
        let Some(leader) = world.enemies.get_mut(&leader_id) else {
            continue;
        };
        let desired = (player_pos - leader.position).normalize_or(Vec2::ZERO) * leader.speed;
        movement::commit_move(leader, desired, dt, arena_radius);
        let leader_pos = leader.position;

        // Members chase their slot relative to the current leader position
        for &member_id in &group.members {
            if member_id == leader_id {
                continue;
            }
            let Some(member) = world.enemies.get_mut(&member_id) else {
                continue;
            };
            let Role::LegionMember { slot, .. } = member.role else {
                continue;
            };
            let target = leader_pos + legion_slot_offset(slot);
            let step = (target - member.position).clamp_length(MEMBER_MAX_STEP);
            member.velocity = step * (1.0 / dt.max(1e-3));
            member.position += step;
        }
    }
}

/// Death hook: hand leadership and the remaining shield pool to the first
/// surviving member
pub fn on_leader_death(world: &mut World, dead_id: EntityId) {
    let (legion, remaining_shield) = match world.enemies.get(&dead_id).map(|e| &e.role) {
        Some(Role::LegionLeader { legion, shield }) => (*legion, *shield),
        _ => return,
    };

    let heir = world
        .enemies
        .values()
        .filter(|e| !e.dead && e.id != dead_id)
        .find(|e| matches!(e.role, Role::LegionMember { legion: l, .. } if l == legion))
        .map(|e| e.id);

    if let Some(heir_id) = heir {
        promote_member(world, heir_id, remaining_shield);
        tracing::debug!(legion, heir = heir_id, "legion leadership re-elected");
    }
}

fn promote_member(world: &mut World, member_id: EntityId, shield: f32) {
    if let Some(member) = world.enemies.get_mut(&member_id) {
        if let Role::LegionMember { legion, .. } = member.role {
            member.role = Role::LegionLeader { legion, shield };
        }
    }
}

/// Instantiate a full legion in formation around a center point
pub fn spawn_legion(world: &mut World, center: Vec2, era: u8) -> LegionId {
    let legion = world.alloc_legion_id();
    let count = COLS as u16 * ROWS as u16;
    let shape = Shape::Square;
    let max_hp = crate::game::constants::enemy_max_hp(
        crate::game::constants::enemy::BASE_HP * shape.hp_mult(),
        world.clock,
    );
    let mut rng = rand::thread_rng();

    for slot in 0..count as u8 {
        let id = world.alloc_id();
        let position = center + legion_slot_offset(slot);
        let mut enemy = Enemy::normal(id, shape, position, max_hp, era);
        enemy.reward_mult = REWARD_MULT;
        // Slight per-member speed variance keeps the block from looking stamped
        enemy.speed *= rng.gen_range(0.95..1.05);
        enemy.role = if slot == 0 {
            Role::LegionLeader {
                legion,
                shield: SHIELD_PER_MEMBER * count as f32,
            }
        } else {
            Role::LegionMember { legion, slot }
        };
        world.spawn_enemy(enemy);
    }

    tracing::info!(legion, members = count, "legion spawned");
    legion
}
