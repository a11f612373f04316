//! Tick throughput benchmark: hundreds of live entities per frame.

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use shapestorm::game::state::{Enemy, Projectile, Shape, Side};
use shapestorm::util::vec2::Vec2;
use shapestorm::{advance, Authority, NullProgression, World};

const DT: f32 = 1.0 / 60.0;

fn crowded_world(enemies: usize, projectiles: usize) -> World {
    let mut world = World::new(Authority::Host);
    world.player.stats.max_hp.flat = 1_000_000.0;
    world.player.hp = 1_000_000.0;

    for i in 0..enemies {
        let id = world.alloc_id();
        let angle = i as f32 * 0.37;
        let dist = 200.0 + (i % 40) as f32 * 30.0;
        let shape = Shape::ALL[i % Shape::ALL.len()];
        world.spawn_enemy(Enemy::normal(
            id,
            shape,
            Vec2::from_angle(angle) * dist,
            100.0,
            0,
        ));
    }

    for i in 0..projectiles {
        let id = world.alloc_id();
        let angle = i as f32 * 0.61;
        world.add_projectile(Projectile::standard(
            id,
            Side::Player,
            Vec2::ZERO,
            Vec2::from_angle(angle) * 400.0,
            10.0,
            3,
        ));
    }

    world
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");

    for &count in &[100usize, 400, 800] {
        group.bench_function(format!("{}_enemies", count), |b| {
            b.iter_batched(
                || crowded_world(count, 64),
                |mut world| {
                    let mut hooks = NullProgression;
                    let mut events = Vec::new();
                    for _ in 0..10 {
                        advance(&mut world, &mut hooks, &mut events, DT);
                    }
                    world
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tick);
criterion_main!(benches);
