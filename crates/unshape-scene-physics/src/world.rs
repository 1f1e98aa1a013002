//! Physics simulation world.
//!
//! Contains the `PhysicsWorld` container that drives rigid body simulation
//! including force integration, collision detection, contact and joint
//! solving, and deactivation. The world only knows fixed sub-steps; turning
//! frame time into sub-steps is the job of [`crate::SimulationStepper`].

use std::collections::BTreeSet;

use glam::{Quat, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::collision::{self, ContactManifold};
use crate::joint::{Joint, JointSolver};
use crate::rigidbody::RigidBody;
use crate::shape::DEFAULT_MARGIN;

/// Penetration allowed before positional correction kicks in.
const SLOP: f32 = 0.01;
/// Fraction of excess penetration removed per sub-step.
const CORRECTION_PERCENT: f32 = 0.8;
/// Resting penetration the velocity solver aims for.
const PENETRATION_TARGET: f32 = 0.005;
/// Closing speed below which contacts do not bounce.
const RESTITUTION_THRESHOLD: f32 = 0.5;

/// Configuration for physics simulation.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Gravity acceleration.
    pub gravity: Vec3,
    /// Length of one sub-step in seconds.
    pub fixed_time_step: f32,
    /// Maximum sub-steps per frame; extra time is dropped.
    pub max_substeps: u32,
    /// Number of contact and joint solver iterations.
    pub solver_iterations: u32,
    /// Margin for shapes that do not set one.
    pub default_margin: f32,
    /// Linear speed below which a body counts as idle.
    pub sleep_linear_threshold: f32,
    /// Angular speed below which a body counts as idle.
    pub sleep_angular_threshold: f32,
    /// Idle seconds before a body that allows it is deactivated.
    pub sleep_time: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.81, 0.0),
            fixed_time_step: 1.0 / 60.0,
            max_substeps: 4,
            solver_iterations: 10,
            default_margin: DEFAULT_MARGIN,
            sleep_linear_threshold: 0.8,
            sleep_angular_threshold: 1.0,
            sleep_time: 2.0,
        }
    }
}

impl SimulationConfig {
    /// Set gravity.
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    /// Set the sub-step length in seconds.
    pub fn with_fixed_time_step(mut self, dt: f32) -> Self {
        self.fixed_time_step = dt;
        self
    }

    /// Set the sub-step cap (at least one).
    pub fn with_max_substeps(mut self, max_substeps: u32) -> Self {
        self.max_substeps = max_substeps.max(1);
        self
    }

    /// Set solver iterations (at least one).
    pub fn with_solver_iterations(mut self, iterations: u32) -> Self {
        self.solver_iterations = iterations.max(1);
        self
    }

    /// Set the default shape margin.
    pub fn with_default_margin(mut self, margin: f32) -> Self {
        self.default_margin = margin;
        self
    }

    /// Set deactivation thresholds.
    pub fn with_sleep_thresholds(mut self, linear: f32, angular: f32, time: f32) -> Self {
        self.sleep_linear_threshold = linear;
        self.sleep_angular_threshold = angular;
        self.sleep_time = time;
        self
    }
}

/// Slot of a body in a [`PhysicsWorld`]. Slots are reused after removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SimBodyId(pub(crate) usize);

impl SimBodyId {
    /// Raw slot index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Slot of a joint in a [`PhysicsWorld`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub(crate) usize);

/// Per-point data precomputed for the velocity solver.
struct ContactRow {
    manifold: usize,
    point: Vec3,
    normal: Vec3,
    mass: f32,
    target: f32,
    impulse: f32,
}

/// The physics simulation world.
#[derive(Default)]
pub struct PhysicsWorld {
    bodies: Vec<Option<RigidBody>>,
    free_bodies: Vec<usize>,
    joints: Vec<Option<Joint>>,
    free_joints: Vec<usize>,
    config: SimulationConfig,
    manifolds: Vec<ContactManifold>,
    touching: BTreeSet<(usize, usize)>,
}

impl PhysicsWorld {
    /// Create a new physics world.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Gravity acceleration.
    pub fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    /// Change gravity and wake every body.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
        for body in self.bodies.iter_mut().flatten() {
            body.wake();
        }
    }

    /// Add a rigid body.
    pub fn add_body(&mut self, body: RigidBody) -> SimBodyId {
        match self.free_bodies.pop() {
            Some(index) => {
                self.bodies[index] = Some(body);
                SimBodyId(index)
            }
            None => {
                self.bodies.push(Some(body));
                SimBodyId(self.bodies.len() - 1)
            }
        }
    }

    /// Remove a body, along with any joint, manifold and touching pair
    /// that references it.
    pub fn remove_body(&mut self, id: SimBodyId) -> Option<RigidBody> {
        let body = self.bodies.get_mut(id.0)?.take()?;
        self.free_bodies.push(id.0);

        for (index, slot) in self.joints.iter_mut().enumerate() {
            let references = slot.as_ref().is_some_and(|joint| {
                let (a, b) = joint.bodies();
                a == id.0 || b == id.0
            });
            if references {
                *slot = None;
                self.free_joints.push(index);
            }
        }
        self.manifolds.retain(|m| m.body_a != id.0 && m.body_b != id.0);
        self.touching.retain(|&(a, b)| a != id.0 && b != id.0);
        Some(body)
    }

    /// Get a body.
    pub fn body(&self, id: SimBodyId) -> Option<&RigidBody> {
        self.bodies.get(id.0).and_then(Option::as_ref)
    }

    /// Get a mutable body.
    pub fn body_mut(&mut self, id: SimBodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Iterate over live bodies.
    pub fn bodies(&self) -> impl Iterator<Item = (SimBodyId, &RigidBody)> {
        self.bodies
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (SimBodyId(i), b)))
    }

    /// Number of live bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.iter().flatten().count()
    }

    /// Add a joint. Fails if either body is missing or both are the same.
    pub fn add_joint(&mut self, joint: Joint) -> Option<JointId> {
        let (a, b) = joint.bodies();
        if a == b || self.body(SimBodyId(a)).is_none() || self.body(SimBodyId(b)).is_none() {
            return None;
        }

        for index in [a, b] {
            if let Some(body) = self.bodies[index].as_mut() {
                body.wake();
            }
        }

        Some(match self.free_joints.pop() {
            Some(index) => {
                self.joints[index] = Some(joint);
                JointId(index)
            }
            None => {
                self.joints.push(Some(joint));
                JointId(self.joints.len() - 1)
            }
        })
    }

    /// Remove a joint.
    pub fn remove_joint(&mut self, id: JointId) -> Option<Joint> {
        let joint = self.joints.get_mut(id.0)?.take()?;
        self.free_joints.push(id.0);
        let (a, b) = joint.bodies();
        for index in [a, b] {
            if let Some(body) = self.bodies.get_mut(index).and_then(Option::as_mut) {
                body.wake();
            }
        }
        Some(joint)
    }

    /// Get a joint.
    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.0).and_then(Option::as_ref)
    }

    /// Number of live joints.
    pub fn joint_count(&self) -> usize {
        self.joints.iter().flatten().count()
    }

    /// Manifolds from the most recent sub-step.
    pub fn manifolds(&self) -> &[ContactManifold] {
        &self.manifolds
    }

    /// Pairs that touched during any sub-step since the log was last cleared,
    /// lower slot first.
    pub fn touching_pairs(&self) -> impl Iterator<Item = (SimBodyId, SimBodyId)> + '_ {
        self.touching
            .iter()
            .map(|&(a, b)| (SimBodyId(a), SimBodyId(b)))
    }

    /// Clear the touching-pair log.
    pub fn clear_touching(&mut self) {
        self.touching.clear();
    }

    /// Run `substeps` sub-steps of `dt` seconds.
    ///
    /// The touching-pair log covers exactly these sub-steps; with zero
    /// sub-steps the previous log is left as it is.
    pub fn step(&mut self, substeps: u32, dt: f32) {
        if substeps == 0 {
            return;
        }
        self.clear_touching();
        for _ in 0..substeps {
            self.substep(dt);
        }
    }

    /// Advance the simulation by one sub-step.
    pub fn substep(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        self.apply_forces();
        self.integrate_velocities(dt);

        let manifolds = self.detect_collisions(dt);
        self.wake_touched(&manifolds);
        self.solve_contacts(&manifolds, dt);
        self.correct_penetration(&manifolds);

        self.integrate_positions(dt);
        self.solve_joints(dt);
        self.update_sleep(dt);

        for m in &manifolds {
            if m.is_touching() {
                self.touching
                    .insert((m.body_a.min(m.body_b), m.body_a.max(m.body_b)));
            }
        }
        self.manifolds = manifolds;
    }

    /// Apply joint forces (springs) to bodies.
    fn apply_forces(&mut self) {
        for joint in self.joints.iter().flatten() {
            let (a, b) = joint.bodies();
            if let Some((body_a, body_b)) = pair_mut(&mut self.bodies, a, b) {
                joint.apply_forces(body_a, body_b);
            }
        }
    }

    /// Integrate velocities from gravity and accumulated forces.
    fn integrate_velocities(&mut self, dt: f32) {
        let gravity = self.config.gravity;
        for body in self.bodies.iter_mut().flatten() {
            if body.is_active() {
                // Linear
                body.velocity += (gravity + body.force * body.inv_mass) * dt;
                body.velocity *= (1.0 - body.linear_damping.clamp(0.0, 1.0)).powf(dt);

                // Angular
                let angular_accel = body.inv_inertia_world(body.torque);
                body.angular_velocity += angular_accel * dt;
                body.angular_velocity *= (1.0 - body.angular_damping.clamp(0.0, 1.0)).powf(dt);
            }
            body.clear_forces();
        }
    }

    /// Integrate positions from velocities.
    fn integrate_positions(&mut self, dt: f32) {
        for body in self.bodies.iter_mut().flatten() {
            if body.is_active() || body.is_kinematic() {
                body.position += body.velocity * dt;

                // Orientation (using quaternion integration)
                let w = body.angular_velocity;
                let q = body.orientation;
                let dq = Quat::from_xyzw(w.x, w.y, w.z, 0.0) * q * 0.5 * dt;
                body.orientation = (q + dq).normalize();
            }
        }
    }

    /// Detect all contacts between bodies; at least one body of each pair is
    /// dynamic.
    pub(crate) fn detect_collisions(&self, dt: f32) -> Vec<ContactManifold> {
        let candidates: Vec<(usize, &RigidBody, (Vec3, Vec3))> = self
            .bodies
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|b| (i, b)))
            .map(|(i, b)| {
                let sweep = Vec3::splat(b.velocity.length() * dt);
                let (min, max) = collision::world_bounds(b);
                (i, b, (min - sweep, max + sweep))
            })
            .collect();

        let mut manifolds = Vec::new();
        for (n, &(i, a, bounds_a)) in candidates.iter().enumerate() {
            for &(j, b, bounds_b) in &candidates[n + 1..] {
                if !a.is_dynamic() && !b.is_dynamic() {
                    continue;
                }
                if !collision::bounds_overlap(bounds_a, bounds_b) {
                    continue;
                }
                let speculative = (a.velocity.length() + b.velocity.length()) * dt;
                if let Some(m) = collision::collide(i, a, j, b, speculative) {
                    manifolds.push(m);
                }
            }
        }
        manifolds
    }

    /// Wake sleeping bodies touched by a moving one.
    fn wake_touched(&mut self, manifolds: &[ContactManifold]) {
        for m in manifolds.iter().filter(|m| m.is_touching()) {
            if let Some((a, b)) = pair_mut(&mut self.bodies, m.body_a, m.body_b) {
                if is_mover(a) && b.is_sleeping() {
                    b.wake();
                } else if is_mover(b) && a.is_sleeping() {
                    a.wake();
                }
            }
        }
    }

    /// Sequential impulses over all contact points, with speculative
    /// handling of points that are still apart.
    fn solve_contacts(&mut self, manifolds: &[ContactManifold], dt: f32) {
        let mut rows = Vec::new();
        for (mi, m) in manifolds.iter().enumerate() {
            let Some((a, b)) = pair_ref(&self.bodies, m.body_a, m.body_b) else {
                continue;
            };
            if !a.is_active() && !b.is_active() {
                continue;
            }

            let e = (a.restitution + b.restitution) * 0.5;
            for p in &m.points {
                let n = p.normal;
                let ra = p.point - a.position;
                let rb = p.point - b.position;
                let rn_a = ra.cross(n);
                let rn_b = rb.cross(n);
                let k = a.inv_mass
                    + b.inv_mass
                    + rn_a.dot(a.inv_inertia_world(rn_a))
                    + rn_b.dot(b.inv_inertia_world(rn_b));
                if k <= 0.0 {
                    continue;
                }

                let vn = (a.velocity_at_point(p.point) - b.velocity_at_point(p.point)).dot(n);
                let bounce = if -vn > RESTITUTION_THRESHOLD { -vn * e } else { 0.0 };
                let target = if p.depth < PENETRATION_TARGET {
                    let closing_limit = (PENETRATION_TARGET - p.depth) / dt;
                    if bounce > 0.0 && -vn > closing_limit {
                        bounce
                    } else {
                        -closing_limit
                    }
                } else {
                    bounce
                };

                rows.push(ContactRow {
                    manifold: mi,
                    point: p.point,
                    normal: n,
                    mass: 1.0 / k,
                    target,
                    impulse: 0.0,
                });
            }
        }

        for _ in 0..self.config.solver_iterations {
            for row in &mut rows {
                let m = &manifolds[row.manifold];
                let Some((a, b)) = pair_mut(&mut self.bodies, m.body_a, m.body_b) else {
                    continue;
                };
                let mu = (a.friction + b.friction) * 0.5;

                // Normal impulse, accumulated and clamped non-negative.
                let vn = (a.velocity_at_point(row.point) - b.velocity_at_point(row.point))
                    .dot(row.normal);
                let delta = (row.target - vn) * row.mass;
                let total = (row.impulse + delta).max(0.0);
                let applied = total - row.impulse;
                row.impulse = total;
                if applied != 0.0 {
                    let impulse = row.normal * applied;
                    a.apply_impulse_at_point(impulse, row.point);
                    b.apply_impulse_at_point(-impulse, row.point);
                }

                // Friction (simplified), bounded by the accumulated normal impulse.
                if row.impulse <= 0.0 || mu <= 0.0 {
                    continue;
                }
                let rel = a.velocity_at_point(row.point) - b.velocity_at_point(row.point);
                let tangential = rel - row.normal * rel.dot(row.normal);
                let vt = tangential.length();
                if vt < 1e-6 {
                    continue;
                }
                let t = tangential / vt;
                let ra = row.point - a.position;
                let rb = row.point - b.position;
                let rt_a = ra.cross(t);
                let rt_b = rb.cross(t);
                let kt = a.inv_mass
                    + b.inv_mass
                    + rt_a.dot(a.inv_inertia_world(rt_a))
                    + rt_b.dot(b.inv_inertia_world(rt_b));
                if kt <= 0.0 {
                    continue;
                }
                let jt = (vt / kt).min(mu * row.impulse);
                a.apply_impulse_at_point(-t * jt, row.point);
                b.apply_impulse_at_point(t * jt, row.point);
            }
        }
    }

    /// Positional correction (prevent sinking), once per manifold.
    fn correct_penetration(&mut self, manifolds: &[ContactManifold]) {
        for m in manifolds {
            let Some(deepest) = m.deepest() else {
                continue;
            };
            if deepest.depth <= SLOP {
                continue;
            }
            let Some((a, b)) = pair_mut(&mut self.bodies, m.body_a, m.body_b) else {
                continue;
            };
            if !a.is_active() && !b.is_active() {
                continue;
            }
            let inv_a = if a.is_active() { a.inv_mass } else { 0.0 };
            let inv_b = if b.is_active() { b.inv_mass } else { 0.0 };
            if inv_a + inv_b <= 0.0 {
                continue;
            }

            let correction =
                deepest.normal * (deepest.depth - SLOP) * CORRECTION_PERCENT / (inv_a + inv_b);
            a.position += correction * inv_a;
            b.position -= correction * inv_b;
        }
    }

    /// Solve rigid joints at the position level, then turn the corrections
    /// into velocity so bodies do not spring back.
    fn solve_joints(&mut self, dt: f32) {
        let mut before: Vec<Option<(Vec3, Quat)>> = vec![None; self.bodies.len()];
        let mut any = false;

        for joint in self.joints.iter().flatten().filter(|j| j.is_rigid()) {
            let (a, b) = joint.bodies();
            let Some((body_a, body_b)) = pair_mut(&mut self.bodies, a, b) else {
                continue;
            };
            if !is_mover(body_a) && !is_mover(body_b) {
                continue;
            }
            for (index, body) in [(a, body_a), (b, body_b)] {
                if body.is_sleeping() {
                    body.wake();
                }
                if body.is_dynamic() && before[index].is_none() {
                    before[index] = Some((body.position, body.orientation));
                    any = true;
                }
            }
        }
        if !any {
            return;
        }

        for _ in 0..self.config.solver_iterations {
            for joint in self.joints.iter().flatten().filter(|j| j.is_rigid()) {
                let (a, b) = joint.bodies();
                if before[a].is_none() && before[b].is_none() {
                    continue;
                }
                if let Some((body_a, body_b)) = pair_mut(&mut self.bodies, a, b) {
                    joint.apply_correction(body_a, body_b, joint.stiffness());
                }
            }
        }

        for (slot, start) in self.bodies.iter_mut().zip(&before) {
            let (Some(body), Some((position, orientation))) = (slot.as_mut(), start) else {
                continue;
            };
            body.velocity += (body.position - *position) / dt;
            let mut dq = body.orientation * orientation.inverse();
            if dq.w < 0.0 {
                dq = -dq;
            }
            body.angular_velocity += Vec3::new(dq.x, dq.y, dq.z) * (2.0 / dt);
        }
    }

    /// Deactivate bodies that allow it once they stay idle long enough.
    fn update_sleep(&mut self, dt: f32) {
        let config = &self.config;
        for (index, body) in self.bodies.iter_mut().enumerate() {
            let Some(body) = body.as_mut() else {
                continue;
            };
            if !body.can_sleep || !body.is_active() {
                continue;
            }
            if body.velocity.length() < config.sleep_linear_threshold
                && body.angular_velocity.length() < config.sleep_angular_threshold
            {
                body.idle_time += dt;
                if body.idle_time >= config.sleep_time {
                    body.sleep();
                    tracing::trace!(slot = index, "body deactivated");
                }
            } else {
                body.idle_time = 0.0;
            }
        }
    }
}

/// Bodies whose motion can disturb others.
fn is_mover(body: &RigidBody) -> bool {
    body.is_active()
        || (body.is_kinematic()
            && (body.velocity != Vec3::ZERO || body.angular_velocity != Vec3::ZERO))
}

fn pair_ref(slots: &[Option<RigidBody>], i: usize, j: usize) -> Option<(&RigidBody, &RigidBody)> {
    Some((slots.get(i)?.as_ref()?, slots.get(j)?.as_ref()?))
}

/// Borrow two distinct slots mutably, in the order asked for.
fn pair_mut(
    slots: &mut [Option<RigidBody>],
    i: usize,
    j: usize,
) -> Option<(&mut RigidBody, &mut RigidBody)> {
    if i == j || i >= slots.len() || j >= slots.len() {
        return None;
    }
    let (a, b) = if i < j {
        let (left, right) = slots.split_at_mut(j);
        (&mut left[i], &mut right[0])
    } else {
        let (left, right) = slots.split_at_mut(i);
        (&mut right[0], &mut left[j])
    };
    Some((a.as_mut()?, b.as_mut()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collider::Collider;
    use crate::joint::{HingeJoint, PointJoint};

    const DT: f32 = 1.0 / 60.0;

    fn ground() -> RigidBody {
        RigidBody::new_static(Vec3::ZERO, Collider::box_shape(Vec3::new(25.0, 0.5, 25.0)))
    }

    fn unit_box(y: f32) -> RigidBody {
        RigidBody::new(Vec3::new(0.0, y, 0.0), Collider::box_shape(Vec3::splat(0.5)), 1.0)
    }

    fn run(world: &mut PhysicsWorld, seconds: f32) {
        let steps = (seconds / DT).round() as u32;
        for _ in 0..steps {
            world.step(1, DT);
        }
    }

    #[test]
    fn test_gravity() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        let id = world.add_body(RigidBody::new(Vec3::new(0.0, 10.0, 0.0), Collider::sphere(1.0), 1.0));
        run(&mut world, 1.0);

        let body = world.body(id).unwrap();
        assert!(body.position.y < 10.0);
        assert!((body.velocity.y + 9.81).abs() < 0.01);
    }

    #[test]
    fn test_static_body_stays_put() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        let id = world.add_body(ground());
        run(&mut world, 1.0);
        assert_eq!(world.body(id).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn test_box_settles_on_ground() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        let g = world.add_body(ground());
        let b = world.add_body(unit_box(3.0));
        run(&mut world, 4.0);

        let body = world.body(b).unwrap();
        assert!((body.position.y - 1.0).abs() < 0.02, "y = {}", body.position.y);
        assert!(body.velocity.length() < 0.05);
        assert_eq!(world.touching_pairs().collect::<Vec<_>>(), vec![(g, b)]);
    }

    #[test]
    fn test_stacked_boxes_settle() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        world.add_body(ground());
        let lower = world.add_body(unit_box(1.2));
        let upper = world.add_body(unit_box(2.4));
        run(&mut world, 4.0);

        let y_lower = world.body(lower).unwrap().position.y;
        let y_upper = world.body(upper).unwrap().position.y;
        assert!((y_lower - 1.0).abs() < 0.03, "lower y = {}", y_lower);
        assert!((y_upper - 2.0).abs() < 0.05, "upper y = {}", y_upper);
    }

    #[test]
    fn test_fast_body_does_not_tunnel() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        world.add_body(ground());
        let mut body = unit_box(3.0);
        body.velocity = Vec3::new(0.0, -100.0, 0.0);
        let b = world.add_body(body);
        run(&mut world, 2.0);
        assert!(world.body(b).unwrap().position.y > 0.9);
    }

    #[test]
    fn test_static_pairs_are_skipped() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        world.add_body(ground());
        world.add_body(ground());
        world.step(1, DT);
        assert!(world.manifolds().is_empty());
        assert_eq!(world.touching_pairs().count(), 0);
    }

    #[test]
    fn test_zero_substeps_keep_touching_log() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        world.add_body(ground());
        world.add_body(unit_box(0.99));
        world.step(1, DT);
        assert_eq!(world.touching_pairs().count(), 1);
        world.step(0, DT);
        assert_eq!(world.touching_pairs().count(), 1);
    }

    #[test]
    fn test_remove_body_cleans_up() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        let g = world.add_body(ground());
        let b = world.add_body(unit_box(0.99));
        let j = world.add_joint(Joint::Point(PointJoint::new(g.index(), b.index())));
        assert!(j.is_some());
        world.step(1, DT);

        assert!(world.remove_body(b).is_some());
        assert!(world.remove_body(b).is_none());
        assert_eq!(world.joint_count(), 0);
        assert!(world.manifolds().is_empty());
        assert_eq!(world.touching_pairs().count(), 0);

        // Slot is reused.
        assert_eq!(world.add_body(unit_box(5.0)), b);
    }

    #[test]
    fn test_joint_requires_two_live_bodies() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        let a = world.add_body(unit_box(1.0));
        assert!(world.add_joint(Joint::Point(PointJoint::new(a.index(), a.index()))).is_none());
        assert!(world.add_joint(Joint::Point(PointJoint::new(a.index(), 7))).is_none());
    }

    #[test]
    fn test_pendulum_keeps_length() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        let pivot = world.add_body(RigidBody::new_static(
            Vec3::new(0.0, 5.0, 0.0),
            Collider::sphere(0.1),
        ));
        let bob = world.add_body(RigidBody::new(
            Vec3::new(2.0, 5.0, 0.0),
            Collider::sphere(0.25),
            1.0,
        ));
        world.add_joint(Joint::Point(
            PointJoint::new(pivot.index(), bob.index())
                .with_anchors(Vec3::ZERO, Vec3::new(-2.0, 0.0, 0.0)),
        ));
        run(&mut world, 2.0);

        let bob = world.body(bob).unwrap();
        let anchor = bob.world_point(Vec3::new(-2.0, 0.0, 0.0));
        assert!((anchor - Vec3::new(0.0, 5.0, 0.0)).length() < 0.05);
        assert!(bob.position.y < 5.0);
    }

    #[test]
    fn test_hinge_door_swings_about_axis() {
        let mut world = PhysicsWorld::new(SimulationConfig::default().with_gravity(Vec3::ZERO));
        let frame = world.add_body(RigidBody::new_static(
            Vec3::new(0.0, 3.0, 0.0),
            Collider::sphere(0.1),
        ));
        let door = world.add_body(RigidBody::new(
            Vec3::new(1.0, 0.0, 0.0),
            Collider::box_shape(Vec3::new(1.0, 1.0, 0.05)),
            1.0,
        ));
        let (f, d) = (world.body(frame).unwrap(), world.body(door).unwrap());
        let hinge = HingeJoint::new(frame.index(), f, door.index(), d)
            .with_anchors(Vec3::new(0.0, -3.0, 0.0), Vec3::new(-1.0, 0.0, 0.0));
        world.add_joint(Joint::Hinge(hinge));

        world
            .body_mut(door)
            .unwrap()
            .apply_impulse_at_point(Vec3::new(0.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 0.0));
        run(&mut world, 0.5);

        let door = world.body(door).unwrap();
        let hinge_point = door.world_point(Vec3::new(-1.0, 0.0, 0.0));
        assert!(hinge_point.length() < 0.05);
        assert!(door.position.y.abs() < 0.05);
        assert!(door.position.z.abs() > 0.1);
    }

    #[test]
    fn test_idle_body_falls_asleep_and_wakes() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        world.add_body(ground());
        let mut body = unit_box(1.0);
        body.set_can_sleep(true);
        let b = world.add_body(body);
        run(&mut world, 3.0);
        assert!(world.body(b).unwrap().is_sleeping());

        world.body_mut(b).unwrap().apply_impulse(Vec3::Y * 3.0);
        assert!(!world.body(b).unwrap().is_sleeping());
        world.step(1, DT);
        assert!(world.body(b).unwrap().position.y > 1.0);
    }

    #[test]
    fn test_always_active_body_never_sleeps() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        world.add_body(ground());
        let b = world.add_body(unit_box(1.0));
        run(&mut world, 3.0);
        assert!(!world.body(b).unwrap().is_sleeping());
    }

    #[test]
    fn test_kinematic_moves_by_velocity_only() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        let mut platform = RigidBody::new_kinematic(
            Vec3::ZERO,
            Collider::box_shape(Vec3::new(2.0, 0.25, 2.0)),
            1.0,
        );
        platform.velocity = Vec3::new(0.0, 1.0, 0.0);
        let p = world.add_body(platform);
        let rider = world.add_body(unit_box(0.74));
        run(&mut world, 1.0);

        let platform = world.body(p).unwrap();
        assert!((platform.position.y - 1.0).abs() < 1e-3);
        let rider = world.body(rider).unwrap();
        assert!(rider.position.y > 1.5, "rider y = {}", rider.position.y);
    }

    #[test]
    fn test_set_gravity_wakes_bodies() {
        let mut world = PhysicsWorld::new(SimulationConfig::default());
        let mut body = unit_box(1.0);
        body.set_can_sleep(true);
        body.sleep();
        let b = world.add_body(body);
        world.set_gravity(Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(world.gravity(), Vec3::new(0.0, 5.0, 0.0));
        assert!(!world.body(b).unwrap().is_sleeping());
    }
}
