//! Worm chains: multi-segment enemies following a head.
//!
//! The head drives a rolling position-history buffer; each trailing segment
//! reads a lagged history index proportional to its chain order, which
//! keeps the body smooth without per-segment steering. The head cycles
//! surface -> digging -> underground -> erupting -> surface, and only grows
//! new segments while underground.
//!
//! Links are ids, never references. Killing an interior segment severs the
//! predecessor link and promotes the nearest living descendant to head.

use rand::Rng;

use crate::game::constants::worm::*;
use crate::game::state::{
    Enemy, EntityId, Role, Shape, World, WormHead, WormPhase, WormSeg,
};
use crate::game::systems::movement;
use crate::util::vec2::Vec2;

pub fn update(world: &mut World, dt: f32) {
    let now = world.clock;
    let player_pos = world.player.position;

    let head_ids: Vec<EntityId> = world
        .enemies
        .values()
        .filter(|e| !e.dead && matches!(&e.role, Role::WormSegment(seg) if seg.is_head()))
        .map(|e| e.id)
        .collect();

    for head_id in head_ids {
        advance_head(world, head_id, player_pos, now, dt);
        follow_history(world, head_id);
    }
}

fn advance_head(world: &mut World, head_id: EntityId, player_pos: Vec2, now: f64, dt: f32) {
    let arena_radius = world.arena_radius;
    let Some(enemy) = world.enemies.get_mut(&head_id) else {
        return;
    };
    let Role::WormSegment(seg) = &mut enemy.role else {
        return;
    };
    let Some(head) = &mut seg.head else {
        return;
    };

    let to_player = player_pos - enemy.position;
    let speed = enemy.speed;

    let (desired, next_phase) = match head.phase {
        WormPhase::Surface { until } => {
            let desired = to_player.normalize_or(Vec2::ZERO) * speed;
            let next = (now >= until).then(|| WormPhase::Digging {
                until: now + DIG_DURATION as f64,
            });
            (desired, next)
        }
        WormPhase::Digging { until } => {
            let next = (now >= until).then(|| WormPhase::Underground {
                until: now + UNDERGROUND_DURATION as f64,
                wander: Vec2::from_angle(rand::thread_rng().gen_range(0.0..std::f32::consts::TAU)),
            });
            (Vec2::ZERO, next)
        }
        WormPhase::Underground { until, wander } => {
            let desired = wander * speed * UNDERGROUND_SPEED_MULT;
            let next = (now >= until).then(|| WormPhase::Erupting {
                until: now + ERUPT_DURATION as f64,
            });
            (desired, next)
        }
        WormPhase::Erupting { until } => {
            let next = (now >= until).then(|| WormPhase::Surface {
                until: now + SURFACE_DURATION as f64,
            });
            (Vec2::ZERO, next)
        }
    };

    let entered_eruption = matches!(next_phase, Some(WormPhase::Erupting { .. }));
    let underground = matches!(head.phase, WormPhase::Underground { .. });
    if let Some(next) = next_phase {
        head.phase = next;
    }

    movement::commit_move(enemy, desired, dt, arena_radius);
    let head_pos = enemy.position;

    // Record after the move so segments lag the committed path
    if let Role::WormSegment(seg) = &mut enemy.role {
        if let Some(head) = &mut seg.head {
            head.record(head_pos);
        }
    }

    if entered_eruption {
        erupt_knockback(world, head_pos);
    }
    if underground {
        regenerate_chain(world, head_id, now, dt);
        try_grow_segment(world, head_id, now);
    }
}

/// Knock the player back if they stand over the eruption
fn erupt_knockback(world: &mut World, head_pos: Vec2) {
    let to_player = world.player.position - head_pos;
    let dist = to_player.length();
    if dist < ERUPT_RADIUS {
        let dir = to_player.normalize_or(Vec2::new(1.0, 0.0));
        world.player.knockback += dir * ERUPT_KNOCKBACK;
    }
}

/// Walk the chain from the head via next links. The loop is capped so a
/// corrupted link cycle cannot hang the tick.
fn chain_members(world: &World, head_id: EntityId) -> Vec<EntityId> {
    let mut members = Vec::new();
    let mut current = Some(head_id);
    while let Some(id) = current {
        if members.len() > MAX_SEGMENTS as usize * 2 {
            tracing::warn!(chain_head = head_id, "worm chain walk exceeded cap, truncating");
            break;
        }
        members.push(id);
        current = world.enemies.get(&id).and_then(|e| match &e.role {
            Role::WormSegment(seg) => seg.next,
            _ => None,
        });
    }
    members
}

fn regenerate_chain(world: &mut World, head_id: EntityId, now: f64, dt: f32) {
    for id in chain_members(world, head_id) {
        if let Some(segment) = world.enemy_mut(id) {
            segment.hp = (segment.hp + segment.max_hp * UNDERGROUND_REGEN * dt).min(segment.max_hp);
            // Buried segments cannot touch the player
            segment.contact_ready_at = now + 0.5;
        }
    }
}

fn try_grow_segment(world: &mut World, head_id: EntityId, now: f64) {
    let ready = match world.enemies.get(&head_id).map(|e| &e.role) {
        Some(Role::WormSegment(seg)) => seg
            .head
            .as_ref()
            .map(|h| now >= h.next_grow_at)
            .unwrap_or(false),
        _ => false,
    };
    if !ready {
        return;
    }

    let members = chain_members(world, head_id);
    if members.len() >= MAX_SEGMENTS as usize {
        return;
    }
    let tail_id = *members.last().unwrap_or(&head_id);

    let (chain, tail_order, tail_pos, era, max_hp) = match world.enemies.get(&tail_id) {
        Some(tail) => match &tail.role {
            Role::WormSegment(seg) => {
                (seg.chain, seg.order, tail.position, tail.era, tail.max_hp)
            }
            _ => return,
        },
        None => return,
    };

    let new_id = world.alloc_id();
    let mut segment = Enemy::normal(new_id, Shape::Star, tail_pos, max_hp, era);
    segment.role = Role::WormSegment(WormSeg {
        chain,
        order: tail_order + 1,
        prev: Some(tail_id),
        next: None,
        head: None,
    });
    world.spawn_enemy(segment);

    if let Some(tail) = world.enemies.get_mut(&tail_id) {
        if let Role::WormSegment(seg) = &mut tail.role {
            seg.next = Some(new_id);
        }
    }
    if let Some(head) = world.enemies.get_mut(&head_id) {
        if let Role::WormSegment(seg) = &mut head.role {
            if let Some(h) = &mut seg.head {
                h.next_grow_at = now + GROW_INTERVAL as f64;
            }
        }
    }
}

/// Position every trailing segment on its lagged history sample
fn follow_history(world: &mut World, head_id: EntityId) {
    let members = chain_members(world, head_id);
    for (index, id) in members.iter().enumerate().skip(1) {
        let sample = match world.enemies.get(&head_id).map(|e| &e.role) {
            Some(Role::WormSegment(seg)) => seg
                .head
                .as_ref()
                .and_then(|h| h.sample(index as u16)),
            _ => None,
        };
        let Some(target) = sample else {
            continue; // history too short yet, hold position
        };
        if let Some(segment) = world.enemies.get_mut(id) {
            segment.velocity = target - segment.position;
            segment.position = target;
            if let Role::WormSegment(seg) = &mut segment.role {
                seg.order = index as u16;
            }
        }
    }
}

/// Death hook: sever the dead segment's links and promote the nearest
/// living descendant to head. The downstream run becomes a brand-new
/// independent chain with probability `SPLIT_CHANCE`, otherwise it inherits
/// the original chain id (and shares its growth cap).
pub fn on_segment_death(world: &mut World, dead_id: EntityId) {
    let (prev, next) = match world.enemies.get(&dead_id).map(|e| &e.role) {
        Some(Role::WormSegment(seg)) => (seg.prev, seg.next),
        _ => return,
    };

    // Sever the predecessor's forward link
    if let Some(prev_id) = prev {
        if let Some(prev_enemy) = world.enemies.get_mut(&prev_id) {
            if let Role::WormSegment(seg) = &mut prev_enemy.role {
                seg.next = None;
            }
        }
    }

    // Find the nearest living descendant
    let mut candidate = next;
    while let Some(id) = candidate {
        match world.enemies.get(&id) {
            Some(e) if !e.dead => break,
            Some(e) => {
                candidate = match &e.role {
                    Role::WormSegment(seg) => seg.next,
                    _ => None,
                };
            }
            None => {
                candidate = None;
            }
        }
    }

    let Some(new_head_id) = candidate else {
        return; // no descendants: nothing to promote
    };

    let split = rand::thread_rng().gen_bool(SPLIT_CHANCE);
    let new_chain = if split { Some(world.alloc_chain_id()) } else { None };

    let now = world.clock;
    let (new_head_pos, old_chain) = match world.enemies.get(&new_head_id) {
        Some(e) => match &e.role {
            Role::WormSegment(seg) => (e.position, seg.chain),
            _ => return,
        },
        None => return,
    };
    let chain = new_chain.unwrap_or(old_chain);

    // Promote and renumber the downstream run from zero
    if let Some(head) = world.enemies.get_mut(&new_head_id) {
        if let Role::WormSegment(seg) = &mut head.role {
            seg.prev = None;
            seg.order = 0;
            seg.chain = chain;
            seg.head = Some(WormHead::new(new_head_pos, now));
        }
    }
    let mut order: u16 = 1;
    let mut current = world.enemies.get(&new_head_id).and_then(|e| match &e.role {
        Role::WormSegment(seg) => seg.next,
        _ => None,
    });
    while let Some(id) = current {
        if order > MAX_SEGMENTS * 2 {
            break;
        }
        current = match world.enemies.get_mut(&id) {
            Some(e) => match &mut e.role {
                Role::WormSegment(seg) => {
                    seg.order = order;
                    seg.chain = chain;
                    let next = seg.next;
                    order += 1;
                    next
                }
                _ => None,
            },
            None => None,
        };
    }

    tracing::debug!(
        dead = dead_id,
        new_head = new_head_id,
        split,
        "worm segment died, descendant promoted"
    );
}

/// Spawn a chain of `segments` total segments (head included)
pub fn spawn_chain(world: &mut World, position: Vec2, segments: u16, era: u8) -> EntityId {
    let chain = world.alloc_chain_id();
    let now = world.clock;
    let base_hp = crate::game::constants::enemy_max_hp(
        crate::game::constants::enemy::BASE_HP * 3.0,
        now,
    );

    let head_id = world.alloc_id();
    let mut head = Enemy::normal(head_id, Shape::Star, position, base_hp * 2.0, era);
    head.size *= 1.6;
    head.role = Role::WormSegment(WormSeg {
        chain,
        order: 0,
        prev: None,
        next: None,
        head: Some(WormHead::new(position, now)),
    });
    world.spawn_enemy(head);

    let mut prev_id = head_id;
    for order in 1..segments.max(1) {
        let id = world.alloc_id();
        let mut segment = Enemy::normal(id, Shape::Star, position, base_hp, era);
        segment.role = Role::WormSegment(WormSeg {
            chain,
            order,
            prev: Some(prev_id),
            next: None,
            head: None,
        });
        world.spawn_enemy(segment);

        if let Some(prev) = world.enemies.get_mut(&prev_id) {
            if let Role::WormSegment(seg) = &mut prev.role {
                seg.next = Some(id);
            }
        }
        prev_id = id;
    }

    head_id
}
