//! Benchmarks for scene physics stepping and collision event diffing.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::Vec3;
use unshape_scene_physics::{
    Collider, ConstraintParams, PhysicsWorld, Pose, RigidBody, RigidBodyConfig, Scene,
    ScenePhysics, SimulationConfig,
};

const FRAME_MS: f32 = 1000.0 / 60.0;

fn bench_world_substep(c: &mut Criterion) {
    c.bench_function("world_substep_100_spheres", |b| {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        world.add_body(RigidBody::new_static(
            Vec3::ZERO,
            Collider::Box {
                half_extents: Vec3::new(25.0, 0.5, 25.0),
            },
        ));
        for i in 0..100 {
            let pos = Vec3::new((i % 10) as f32 * 1.5, (i / 10) as f32 * 1.5 + 1.0, 0.0);
            world.add_body(RigidBody::new(pos, Collider::Sphere { radius: 0.5 }, 1.0));
        }

        b.iter(|| {
            world.substep(1.0 / 60.0);
            black_box(&world);
        })
    });
}

fn bench_scene_step(c: &mut Criterion) {
    c.bench_function("scene_step_box_pile", |b| {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        physics
            .add_ground(&mut scene, 50.0, 1.0, 50.0, Pose::IDENTITY)
            .unwrap();
        for i in 0..50 {
            let pos = Vec3::new((i % 5) as f32 * 1.2, 1.0 + (i / 5) as f32 * 1.1, 0.0);
            physics
                .add_box(
                    &mut scene,
                    1.0,
                    1.0,
                    1.0,
                    Pose::from_position(pos),
                    &RigidBodyConfig::default(),
                )
                .unwrap();
        }
        physics.register_global_listener(|event, _| {
            black_box(event);
        });

        b.iter(|| black_box(physics.step(&mut scene, FRAME_MS)))
    });

    c.bench_function("scene_step_chain_20", |b| {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        let (_, mut previous) = physics
            .add_sphere(
                &mut scene,
                0.2,
                Pose::from_position(Vec3::Y * 10.0),
                &RigidBodyConfig::fixed(),
            )
            .unwrap();
        for i in 1..=20 {
            let (_, link) = physics
                .add_sphere(
                    &mut scene,
                    0.2,
                    Pose::from_position(Vec3::new(i as f32 * 0.5, 10.0, 0.0)),
                    &RigidBodyConfig::default(),
                )
                .unwrap();
            physics
                .add_constraint(
                    previous,
                    link,
                    &ConstraintParams::point_to_point(Vec3::X * 0.25, -Vec3::X * 0.25),
                )
                .unwrap();
            previous = link;
        }

        b.iter(|| black_box(physics.step(&mut scene, FRAME_MS)))
    });
}

criterion_group!(benches, bench_world_substep, bench_scene_step);
criterion_main!(benches);
