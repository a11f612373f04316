//! Merge clustering: nearby same-shape normals combine into one elite.
//!
//! A periodic scan tags groups of unlinked same-shape enemies into a
//! cluster with a shared timer. A cluster that falls below its shape's
//! threshold first tries to recruit nearby compatible enemies, then
//! disbands (pushing the next scan out by a cooldown so the same pack is
//! not immediately re-tagged). When the timer expires one member is
//! promoted to an elite with multiplied HP/size/reward and the rest are
//! removed.

use rand::Rng;

use crate::game::constants::{enemy as ec, merge::*};
use crate::game::state::{ClusterTag, EntityId, MergeCluster, Role, World};
use crate::game::systems::movement;

pub fn update(world: &mut World) {
    let now = world.clock;

    maintain_clusters(world, now);

    if now >= world.merge_scan_at {
        world.merge_scan_at = now + SCAN_INTERVAL as f64;
        scan_for_clusters(world, now);
    }
}

fn scan_for_clusters(world: &mut World, now: f64) {
    movement::rebuild_separation_grid(world);

    let seed_ids: Vec<EntityId> = world
        .enemies
        .values()
        .filter(|e| !e.dead && e.mergeable())
        .map(|e| e.id)
        .collect();

    for seed_id in seed_ids {
        let Some(seed) = world.enemy(seed_id) else {
            continue;
        };
        // Tagged by an earlier iteration of this same scan
        if !seed.mergeable() {
            continue;
        }
        let shape = seed.shape;
        let threshold = shape.merge_threshold();
        let position = seed.position;

        let mut group: Vec<EntityId> = world
            .grid
            .query(position.x, position.y, RADIUS)
            .into_iter()
            .filter(|id| {
                world
                    .enemy(*id)
                    .map(|e| {
                        e.shape == shape
                            && e.mergeable()
                            && e.position.distance_to(position) <= RADIUS
                    })
                    .unwrap_or(false)
            })
            .collect();

        if group.len() < threshold {
            continue;
        }
        group.truncate(threshold);

        let cluster_id = world.alloc_cluster_id();
        for id in &group {
            if let Some(enemy) = world.enemy_mut(*id) {
                enemy.cluster = Some(ClusterTag { cluster: cluster_id });
            }
        }
        world.clusters.insert(
            cluster_id,
            MergeCluster {
                id: cluster_id,
                shape,
                members: group,
                merge_at: now + TIMER as f64,
            },
        );
        tracing::debug!(cluster = cluster_id, ?shape, "merge cluster formed");
    }
}

fn maintain_clusters(world: &mut World, now: f64) {
    let cluster_ids: Vec<_> = world.clusters.keys().copied().collect();

    for cluster_id in cluster_ids {
        // Drop members that died or despawned since the last tick
        let (shape, merge_at, mut members) = {
            let Some(cluster) = world.clusters.get(&cluster_id) else {
                continue;
            };
            (cluster.shape, cluster.merge_at, cluster.members.clone())
        };
        members.retain(|id| world.enemy(*id).is_some());

        let threshold = shape.merge_threshold();
        if members.len() < threshold {
            recruit_or_disband(world, cluster_id, shape, &mut members, now);
            continue;
        }

        if now >= merge_at {
            promote_cluster(world, cluster_id, &members);
        } else if let Some(cluster) = world.clusters.get_mut(&cluster_id) {
            cluster.members = members;
        }
    }
}

fn recruit_or_disband(
    world: &mut World,
    cluster_id: crate::game::state::ClusterId,
    shape: crate::game::state::Shape,
    members: &mut Vec<EntityId>,
    now: f64,
) {
    let threshold = shape.merge_threshold();

    // Centroid of the surviving members anchors the recruit search
    let centroid = {
        let mut sum = crate::util::vec2::Vec2::ZERO;
        let mut count = 0;
        for id in members.iter() {
            if let Some(e) = world.enemy(*id) {
                sum += e.position;
                count += 1;
            }
        }
        if count == 0 {
            disband(world, cluster_id, members, now);
            return;
        }
        sum * (1.0 / count as f32)
    };

    let recruits: Vec<EntityId> = world
        .enemies
        .values()
        .filter(|e| {
            !e.dead
                && e.shape == shape
                && e.mergeable()
                && e.position.distance_to(centroid) <= RADIUS
        })
        .map(|e| e.id)
        .take(threshold - members.len())
        .collect();

    if members.len() + recruits.len() < threshold {
        disband(world, cluster_id, members, now);
        return;
    }

    for id in recruits {
        if let Some(enemy) = world.enemy_mut(id) {
            enemy.cluster = Some(ClusterTag { cluster: cluster_id });
            members.push(id);
        }
    }
    if let Some(cluster) = world.clusters.get_mut(&cluster_id) {
        cluster.members = members.clone();
    }
}

fn disband(
    world: &mut World,
    cluster_id: crate::game::state::ClusterId,
    members: &[EntityId],
    now: f64,
) {
    for id in members {
        if let Some(enemy) = world.enemy_mut(*id) {
            enemy.cluster = None;
        }
    }
    world.clusters.remove(&cluster_id);
    // Cooldown before the next scan may re-tag the same pack
    world.merge_scan_at = world.merge_scan_at.max(now + DISBAND_COOLDOWN as f64);
    tracing::debug!(cluster = cluster_id, "merge cluster disbanded");
}

/// Timer expiry: one member becomes an elite, the rest are removed
fn promote_cluster(world: &mut World, cluster_id: crate::game::state::ClusterId, members: &[EntityId]) {
    let Some((&chosen, rest)) = members.split_first() else {
        world.clusters.remove(&cluster_id);
        return;
    };

    if let Some(enemy) = world.enemy_mut(chosen) {
        enemy.max_hp *= HP_MULT;
        enemy.hp = enemy.max_hp;
        enemy.size *= SIZE_MULT;
        enemy.speed *= ec::ELITE_SPEED_MULT;
        enemy.reward_mult *= REWARD_MULT;
        enemy.cluster = None;
        enemy.role = Role::Elite {
            thorns: rand::thread_rng().gen_bool(ec::ELITE_THORNS_CHANCE),
        };
    }

    // Absorbed members vanish without rewards; this is a promotion, not a kill
    for id in rest {
        if let Some(enemy) = world.enemy_mut(*id) {
            enemy.dead = true;
        }
    }

    world.clusters.remove(&cluster_id);
    tracing::debug!(cluster = cluster_id, elite = chosen, "cluster merged into elite");
}
