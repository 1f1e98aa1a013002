//! Rigid body physics kept in sync with a scene graph.
//!
//! The crate sits between a visual scene and a rigid body simulator:
//! - [`ShapeFactory`] turns [`ShapeDescriptor`]s into simulator colliders
//! - [`RigidBodyManager`] binds scene entities to bodies through [`BodyHandle`]s
//! - [`ConstraintManager`] links bodies with point, hinge, slider, fixed and
//!   spring constraints
//! - [`CollisionEventSystem`] diffs touching pairs between steps into
//!   start / collision / end events
//! - [`SimulationStepper`] runs fixed sub-steps and writes poses back
//!
//! [`ScenePhysics`] owns all of them together with the [`PhysicsWorld`].

mod body;
mod collider;
mod collision;
mod constraint;
mod error;
mod events;
mod handle;
mod hull;
mod joint;
mod physics;
mod polytope;
mod rigidbody;
mod scene;
mod shape;
mod stepper;
mod world;

pub use body::{ActivationPolicy, RigidBodyConfig, RigidBodyManager};
pub use collider::{CYLINDER_SEGMENTS, Collider, CompoundChild, TriMesh, compute_inertia};
pub use collision::{
    ContactManifold, ContactPoint, MAX_MANIFOLD_POINTS, bounds_overlap, collide, world_bounds,
};
pub use constraint::{ConstraintKind, ConstraintManager, ConstraintParams};
pub use error::{PhysicsError, Result};
pub use events::{
    CollisionCallback, CollisionEvent, CollisionEventKind, CollisionEventSystem, Deferred,
    DeferredCommand, ListenerId, PairKey,
};
pub use handle::{BodyHandle, ConstraintHandle};
pub use hull::{ConvexHull, HullFace, HullPlane};
pub use joint::{
    FixedJoint, HingeJoint, Joint, JointResidual, JointSolver, PointJoint, SliderJoint,
    SpringJoint,
};
pub use physics::{DebugDrawMode, DebugDrawSettings, ExistingOptions, ScenePhysics};
pub use rigidbody::{BodyType, RigidBody};
pub use scene::{EntityId, Geometry, MeshData, Pose, Scene, SceneEntity, SceneGraph};
pub use shape::{
    BuiltShape, DEFAULT_MARGIN, DEFAULT_TORUS_SEGMENTS, MAX_TORUS_SEGMENTS, ShapeDescriptor,
    ShapeDimensions, ShapeFactory, ShapeKind, ShapeParams,
};
pub use stepper::{SimulationStepper, drive_kinematic, write_back};
pub use world::{JointId, PhysicsWorld, SimBodyId, SimulationConfig};

/// Invariant tests for scene physics.
///
/// Run with: cargo test -p unshape-scene-physics --features invariant-tests
#[cfg(all(test, feature = "invariant-tests"))]
mod invariant_tests {
    use super::*;
    use glam::Vec3;
    use std::cell::RefCell;
    use std::collections::{BTreeSet, HashMap};
    use std::rc::Rc;

    /// Small deterministic generator for scenario layouts.
    struct Lcg(u64);

    impl Lcg {
        fn next_f32(&mut self) -> f32 {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (self.0 >> 40) as f32 / (1u64 << 24) as f32
        }
    }

    /// KE = 0.5 * m * v^2 + 0.5 * I * w^2, PE = m * g * h
    fn total_energy(world: &PhysicsWorld) -> f32 {
        let g = world.gravity().length();
        world
            .bodies()
            .filter(|(_, b)| b.is_dynamic())
            .map(|(_, b)| {
                0.5 * b.mass * b.velocity.length_squared()
                    + 0.5 * b.inertia.dot(b.angular_velocity * b.angular_velocity)
                    + b.mass * g * b.position.y
            })
            .sum()
    }

    fn total_momentum(world: &PhysicsWorld) -> Vec3 {
        world
            .bodies()
            .filter(|(_, b)| b.is_dynamic())
            .map(|(_, b)| b.velocity * b.mass)
            .sum()
    }

    #[test]
    fn invariant_energy_conservation_free_fall() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        let mut body = RigidBody::new(Vec3::Y * 10.0, Collider::Sphere { radius: 1.0 }, 1.0);
        body.linear_damping = 0.0;
        body.angular_damping = 0.0;
        world.add_body(body);

        let initial = total_energy(&world);
        world.step(60, 1.0 / 120.0);
        let error = (total_energy(&world) - initial).abs() / initial.abs();
        assert!(error < 0.01, "energy drifted by {}%", error * 100.0);
    }

    #[test]
    fn invariant_momentum_conservation_head_on() {
        let mut world = PhysicsWorld::new(SimulationConfig::default().with_gravity(Vec3::ZERO));
        let mut a = RigidBody::new(Vec3::new(-2.0, 0.0, 0.0), Collider::Sphere { radius: 0.5 }, 1.0);
        a.velocity = Vec3::X * 4.0;
        let mut b = RigidBody::new(Vec3::new(2.0, 0.0, 0.0), Collider::Sphere { radius: 0.5 }, 3.0);
        b.velocity = -Vec3::X;
        world.add_body(a);
        world.add_body(b);

        let initial = total_momentum(&world);
        world.step(120, 1.0 / 60.0);
        let drift = (total_momentum(&world) - initial).length();
        assert!(drift < 1e-3, "momentum drifted by {}", drift);
    }

    #[test]
    fn invariant_event_lifecycle_per_pair() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        physics
            .add_ground(&mut scene, 40.0, 1.0, 40.0, Pose::IDENTITY)
            .unwrap();

        let mut rng = Lcg(7);
        let mut boxes = Vec::new();
        for _ in 0..12 {
            let pos = Vec3::new(
                rng.next_f32() * 6.0 - 3.0,
                2.0 + rng.next_f32() * 8.0,
                rng.next_f32() * 6.0 - 3.0,
            );
            let (_, body) = physics
                .add_box(
                    &mut scene,
                    1.0,
                    1.0,
                    1.0,
                    Pose::from_position(pos),
                    &RigidBodyConfig::default().with_restitution(0.4),
                )
                .unwrap();
            boxes.push(body);
        }

        let open: Rc<RefCell<BTreeSet<PairKey>>> = Rc::default();
        let violations: Rc<RefCell<Vec<String>>> = Rc::default();
        let (state, errors) = (Rc::clone(&open), Rc::clone(&violations));
        physics.register_global_listener(move |event, _| {
            let Some(key) = event.pair() else {
                errors.borrow_mut().push("event for a self pair".to_string());
                return;
            };
            let mut state = state.borrow_mut();
            let ok = match event.kind {
                CollisionEventKind::Start => state.insert(key),
                CollisionEventKind::Collision => state.contains(&key),
                CollisionEventKind::End => state.remove(&key),
            };
            if !ok {
                errors.borrow_mut().push(format!("{:?} out of order for {:?}", event.kind, key));
            }
        });

        for frame in 0..400 {
            physics.step(&mut scene, 1000.0 / 60.0);
            if frame == 200 {
                for &body in boxes.iter().step_by(3) {
                    physics.destroy_body(body);
                    open.borrow_mut().retain(|key| !key.contains(body));
                }
            }
        }

        assert!(violations.borrow().is_empty(), "{:?}", violations.borrow());
        let touching: BTreeSet<PairKey> = physics.events().touching().collect();
        assert_eq!(*open.borrow(), touching);
    }

    #[test]
    fn invariant_entity_body_maps_stay_bijective() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        let mut rng = Lcg(42);
        let mut live: HashMap<EntityId, BodyHandle> = HashMap::new();

        let entities: Vec<EntityId> = (0..16)
            .map(|i| scene.spawn(SceneEntity::new(format!("e{}", i))))
            .collect();

        for _ in 0..500 {
            let entity = entities[(rng.next_f32() * entities.len() as f32) as usize % entities.len()];
            match live.get(&entity).copied() {
                Some(body) if rng.next_f32() < 0.5 => {
                    assert!(physics.destroy_body(body));
                    live.remove(&entity);
                }
                Some(_) => {
                    let err = physics
                        .add_existing(&scene, entity, &ExistingOptions::default())
                        .unwrap_err();
                    assert_eq!(err, PhysicsError::AlreadyHasBody(entity));
                }
                None => {
                    let body = physics
                        .add_existing(&scene, entity, &ExistingOptions::default())
                        .unwrap();
                    live.insert(entity, body);
                }
            }

            assert_eq!(physics.bodies().len(), live.len());
            for (&entity, &body) in &live {
                assert_eq!(physics.body_of(entity), Ok(body));
                assert_eq!(physics.entity_of(body), Ok(entity));
            }
        }
    }
}
