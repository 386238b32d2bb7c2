//! Benchmarks for island building and stepping.
//!
//! Run with: cargo bench --bench island_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use island_solver::bodies::BodyId;
use island_solver::core::{IslandBuilder, StackAllocator};
use island_solver::{DistanceConstraint, MotionProperties, PhysicsSettings, PhysicsWorld, RigidBody, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_links(num_bodies: u32, num_links: usize) -> Vec<(u32, u32)> {
    let mut rng = StdRng::seed_from_u64(1);
    (0..num_links)
        .map(|_| (rng.gen_range(0..num_bodies), rng.gen_range(0..num_bodies)))
        .collect()
}

fn bench_build_islands(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_islands");

    for &num_bodies in &[1_000u32, 10_000] {
        let links = random_links(num_bodies, num_bodies as usize / 2);
        let bodies: Vec<BodyId> = (0..num_bodies).map(BodyId::new).collect();
        let mut allocator = StackAllocator::new(16 * 1024 * 1024);
        let mut builder = IslandBuilder::new(num_bodies);

        group.throughput(Throughput::Elements(u64::from(num_bodies)));
        group.bench_with_input(BenchmarkId::from_parameter(num_bodies), &links, |b, links| {
            b.iter(|| {
                builder.prepare_contact_constraints(0, &mut allocator).unwrap();
                builder
                    .prepare_non_contact_constraints(links.len() as u32, &mut allocator)
                    .unwrap();
                for (index, &(first, second)) in links.iter().enumerate() {
                    builder.link_constraint(index as u32, first, second);
                }
                builder.finalize(&bodies, 0, &mut allocator).unwrap();
                black_box(builder.get_num_islands());
                builder.reset_islands(&mut allocator);
            });
        });
    }

    group.finish();
}

fn build_chains(settings: PhysicsSettings, num_chains: u32, chain_length: u32) -> PhysicsWorld {
    let mut world = PhysicsWorld::new(settings).unwrap();
    for chain in 0..num_chains {
        let anchor = world.add_body(RigidBody::new_static(BodyId::INVALID, Vec3::new(chain as f32 * 2.0, 0.0, 0.0)));
        let mut previous = anchor;
        for link in 1..=chain_length {
            let position = Vec3::new(chain as f32 * 2.0 + 0.5, -(link as f32), 0.0);
            let body = world.add_body(RigidBody::new_dynamic(
                BodyId::INVALID,
                position,
                MotionProperties::solid_sphere(1.0, 0.25),
            ));

            let rod = {
                let body1 = world.get_body(previous).unwrap();
                let body2 = world.get_body(body).unwrap();
                DistanceConstraint::from_world_anchors(body1, body2, body1.get_position(), body2.get_position())
            };
            world.add_constraint(Box::new(rod)).unwrap();
            previous = body;
        }
    }
    world
}

fn bench_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_chains");

    for &threads in &[1usize, 4] {
        let settings = PhysicsSettings {
            worker_threads: threads,
            ..Default::default()
        };
        let mut world = build_chains(settings, 256, 8);

        group.bench_with_input(BenchmarkId::new("threads", threads), &threads, |b, _| {
            b.iter(|| black_box(world.step(1.0 / 60.0).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build_islands, bench_step);
criterion_main!(benches);
