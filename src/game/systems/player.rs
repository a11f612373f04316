//! Player movement, boundary physics, regen, and stat sync.
//!
//! Stat sync runs at the start of the tick so the resolver sees this
//! frame's resolved values; movement and regen run at the end, after
//! combat, on both host and guest (guests predict only their own player).

use crate::game::constants::{area, armor, player as pc};
use crate::game::events::EventSink;
use crate::game::progression::{Progression, StatKey};
use crate::game::state::{AreaEffect, AreaEffectKind, SkillKind, World};
use crate::util::vec2::Vec2;

/// Phase shift triggers below this HP fraction
const PHASE_SHIFT_HP_RATIO: f32 = 0.3;
/// Phase shift duration in seconds
const PHASE_SHIFT_DURATION: f64 = 1.5;
/// Nova auto-casts when enemies are inside this radius
const NOVA_TRIGGER_RADIUS: f32 = area::NOVA_RADIUS;

/// Resolve every stat block through the single stat formula plus the
/// progression layer's flat bonuses. Refreshed once per tick.
pub fn sync_stats(world: &mut World, hooks: &dyn Progression) {
    let armor_cap = if hooks.upgrade_level(armor::PLATING_UPGRADE) > 0 {
        armor::UPGRADED_CAP
    } else {
        world.balance.armor_cap
    };

    let player = &mut world.player;
    player.resolved.max_hp = player.stats.max_hp.resolve(hooks.stat_bonus(StatKey::MaxHp));
    player.resolved.damage = player.stats.damage.resolve(hooks.stat_bonus(StatKey::Damage));
    player.resolved.attack_rate = player
        .stats
        .attack_rate
        .resolve(hooks.stat_bonus(StatKey::AttackRate));
    player.resolved.armor = player.stats.armor.resolve(hooks.stat_bonus(StatKey::Armor));
    player.resolved.armor_cap = armor_cap;
    player.resolved.regen = player.stats.regen.resolve(hooks.stat_bonus(StatKey::Regen));

    // A max-HP drop (hex wears off) clamps current HP
    player.hp = player.hp.min(player.resolved.max_hp);
}

pub fn update(world: &mut World, hooks: &dyn Progression, _events: &mut EventSink, dt: f32) {
    let now = world.clock;

    // Movement: input plus decaying knockback, stun gates input only
    let input = if world.player.is_stunned(now) {
        Vec2::ZERO
    } else {
        world.player.move_dir.clamp_length(1.0)
            * (pc::MOVE_SPEED + hooks.stat_bonus(StatKey::MoveSpeed))
    };
    let velocity = input + world.player.knockback;
    world.player.position += velocity * dt;
    world.player.knockback *= (1.0 - pc::KNOCKBACK_DECAY * dt).max(0.0);

    // Arena boundary: clamp and reflect the knockback component
    let radius = world.arena_radius;
    if world.player.position.length() > radius {
        let normal = (-world.player.position).normalize_or(Vec2::new(1.0, 0.0));
        world.player.position = world.player.position.clamp_length(radius);
        world.player.knockback = world.player.knockback.reflect(normal) * 0.5;
    }

    // Regen and shield upkeep
    let max_hp = world.player.resolved.max_hp;
    world.player.hp = (world.player.hp + world.player.resolved.regen * dt).min(max_hp);
    world.player.prune_shields(now);

    auto_cast_skills(world, now);
}

/// Active skills fire themselves when their trigger condition holds
fn auto_cast_skills(world: &mut World, now: f64) {
    let enemy_nearby = {
        let player_pos = world.player.position;
        world
            .enemies
            .values()
            .any(|e| !e.dead && e.position.distance_to(player_pos) < NOVA_TRIGGER_RADIUS)
    };
    let hp_ratio = world.player.hp / world.player.resolved.max_hp.max(1.0);

    let mut cast_nova: Option<u8> = None;
    for skill in world.player.skills.iter_mut() {
        if now < skill.ready_at {
            continue;
        }
        match skill.kind {
            SkillKind::Nova if enemy_nearby => {
                skill.ready_at = now + skill.cooldown as f64;
                cast_nova = Some(skill.level);
            }
            SkillKind::PhaseShift if hp_ratio < PHASE_SHIFT_HP_RATIO => {
                skill.ready_at = now + skill.cooldown as f64;
                world.player.phase_shift_until = now + PHASE_SHIFT_DURATION;
            }
            _ => {}
        }
    }

    if let Some(level) = cast_nova {
        let id = world.alloc_id();
        let position = world.player.position;
        world.add_effect(AreaEffect {
            id,
            position,
            radius: area::NOVA_RADIUS,
            remaining: area::NOVA_DURATION,
            kind: AreaEffectKind::Nova {
                level,
                pulse_timer: 0.0,
            },
        });
    }
}
