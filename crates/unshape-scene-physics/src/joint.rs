//! Joints between simulator bodies.
//!
//! Provides point, hinge, slider, fixed and spring joints behind a unified
//! `JointSolver` trait for computing and correcting joint errors. Rigid
//! joints are solved at the position level, moving and rotating both bodies
//! in proportion to their inverse mass; springs act as forces.

use glam::{Quat, Vec3};

use crate::rigidbody::RigidBody;

const EPSILON: f32 = 1e-4;

/// A joint between two bodies of a [`crate::PhysicsWorld`].
#[derive(Clone, Debug)]
pub enum Joint {
    /// Ball joint: two anchor points are held together.
    Point(PointJoint),
    /// Rotation around a single axis.
    Hinge(HingeJoint),
    /// Translation along a single axis, no rotation.
    Slider(SliderJoint),
    /// No relative motion.
    Fixed(FixedJoint),
    /// Elastic connection between anchor points.
    Spring(SpringJoint),
}

// ============================================================================
// Unified Joint Solver Pattern
// ============================================================================

/// Computed error for a joint.
///
/// Contains the positional/angular error that needs to be corrected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointResidual {
    /// Position error vector (world space).
    pub position_error: Vec3,
    /// Angular error vector (axis-angle representation).
    pub angular_error: Vec3,
}

impl JointResidual {
    /// Creates a position-only error.
    pub fn position(error: Vec3) -> Self {
        Self {
            position_error: error,
            angular_error: Vec3::ZERO,
        }
    }

    /// Creates a combined position and angular error.
    pub fn full(position_error: Vec3, angular_error: Vec3) -> Self {
        Self {
            position_error,
            angular_error,
        }
    }

    /// Returns true if the error is negligible.
    pub fn is_negligible(&self) -> bool {
        self.position_error.length_squared() < 1e-5 && self.angular_error.length_squared() < 1e-5
    }
}

/// Trait for joint solvers.
///
/// Rigid joints follow the same pattern:
/// 1. Compute error (position/angular deviation from the joint)
/// 2. Apply correction (adjust bodies to reduce error)
pub trait JointSolver {
    /// Slot indices of the two bodies.
    fn bodies(&self) -> (usize, usize);

    /// Compute the joint error given current body states.
    fn compute_error(&self, a: &RigidBody, b: &RigidBody) -> JointResidual;

    /// Apply corrections to bodies to satisfy the joint.
    ///
    /// The stiffness parameter controls how aggressively to correct (0-1).
    fn apply_correction(&self, a: &mut RigidBody, b: &mut RigidBody, stiffness: f32);

    /// Accumulate forces before velocity integration.
    fn apply_forces(&self, _a: &mut RigidBody, _b: &mut RigidBody) {}

    /// Returns the joint stiffness.
    fn stiffness(&self) -> f32;
}

// ============================================================================
// Joint Types
// ============================================================================

/// Ball joint parameters.
#[derive(Clone, Debug)]
pub struct PointJoint {
    /// First body index.
    pub body_a: usize,
    /// Second body index.
    pub body_b: usize,
    /// Anchor point in body A's local space.
    pub local_anchor_a: Vec3,
    /// Anchor point in body B's local space.
    pub local_anchor_b: Vec3,
    /// Joint stiffness (0-1, 1 = rigid).
    pub stiffness: f32,
}

impl PointJoint {
    /// Create a ball joint with anchors at both centers.
    pub fn new(body_a: usize, body_b: usize) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: Vec3::ZERO,
            local_anchor_b: Vec3::ZERO,
            stiffness: 1.0,
        }
    }

    /// Set anchor points in local body space.
    pub fn with_anchors(mut self, anchor_a: Vec3, anchor_b: Vec3) -> Self {
        self.local_anchor_a = anchor_a;
        self.local_anchor_b = anchor_b;
        self
    }

    /// Set joint stiffness.
    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness.clamp(0.0, 1.0);
        self
    }
}

/// Hinge joint - rotation around a single axis.
#[derive(Clone, Debug)]
pub struct HingeJoint {
    /// First body index.
    pub body_a: usize,
    /// Second body index.
    pub body_b: usize,
    /// Anchor point in body A's local space.
    pub local_anchor_a: Vec3,
    /// Anchor point in body B's local space.
    pub local_anchor_b: Vec3,
    /// Hinge axis in body A's local space.
    pub local_axis_a: Vec3,
    /// Hinge axis in body B's local space.
    pub local_axis_b: Vec3,
    /// Angle reference perpendicular to the axis, body A space.
    local_ref_a: Vec3,
    /// The same reference in body B space, captured at creation.
    local_ref_b: Vec3,
    /// Optional angle limits (min, max) in radians.
    pub limits: Option<(f32, f32)>,
    /// Joint stiffness.
    pub stiffness: f32,
}

impl HingeJoint {
    /// Create a hinge joint with axis along Y.
    ///
    /// The hinge angle is zero at the bodies' current relative orientation.
    pub fn new(body_a: usize, a: &RigidBody, body_b: usize, b: &RigidBody) -> Self {
        let mut hinge = Self {
            body_a,
            body_b,
            local_anchor_a: Vec3::ZERO,
            local_anchor_b: Vec3::ZERO,
            local_axis_a: Vec3::Y,
            local_axis_b: Vec3::Y,
            local_ref_a: Vec3::X,
            local_ref_b: Vec3::X,
            limits: None,
            stiffness: 1.0,
        };
        hinge.capture_reference(a, b);
        hinge
    }

    /// Set anchor points.
    pub fn with_anchors(mut self, anchor_a: Vec3, anchor_b: Vec3) -> Self {
        self.local_anchor_a = anchor_a;
        self.local_anchor_b = anchor_b;
        self
    }

    /// Set hinge axes (normalized) and re-capture the zero angle.
    pub fn with_axes(mut self, a: &RigidBody, axis_a: Vec3, b: &RigidBody, axis_b: Vec3) -> Self {
        self.local_axis_a = axis_a.normalize();
        self.local_axis_b = axis_b.normalize();
        self.capture_reference(a, b);
        self
    }

    /// Set angle limits in radians.
    pub fn with_limits(mut self, min: f32, max: f32) -> Self {
        self.limits = Some((min, max));
        self
    }

    /// Set joint stiffness.
    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness.clamp(0.0, 1.0);
        self
    }

    fn capture_reference(&mut self, a: &RigidBody, b: &RigidBody) {
        self.local_ref_a = self.local_axis_a.any_orthonormal_vector();
        self.local_ref_b = b.orientation.inverse() * (a.orientation * self.local_ref_a);
    }

    /// Current angle of B relative to A around the hinge axis.
    pub fn angle(&self, a: &RigidBody, b: &RigidBody) -> f32 {
        let axis = a.orientation * self.local_axis_a;
        let ref_a = a.orientation * self.local_ref_a;
        let ref_b = b.orientation * self.local_ref_b;
        let ref_b = (ref_b - axis * ref_b.dot(axis)).normalize_or_zero();
        axis.dot(ref_a.cross(ref_b)).atan2(ref_a.dot(ref_b))
    }
}

/// Slider joint - translation along one axis of body A, rotation locked.
#[derive(Clone, Debug)]
pub struct SliderJoint {
    /// First body index.
    pub body_a: usize,
    /// Second body index.
    pub body_b: usize,
    /// Slide axis in body A's local space.
    pub local_axis: Vec3,
    /// Optional travel limits (min, max) along the axis.
    pub limits: Option<(f32, f32)>,
    local_anchor_a: Vec3,
    rest_rotation: Quat,
    /// Joint stiffness.
    pub stiffness: f32,
}

impl SliderJoint {
    /// Create a slider; travel is measured from the current configuration.
    pub fn new(body_a: usize, a: &RigidBody, body_b: usize, b: &RigidBody, axis: Vec3) -> Self {
        Self {
            body_a,
            body_b,
            local_axis: axis.normalize(),
            limits: None,
            local_anchor_a: a.orientation.inverse() * (b.position - a.position),
            rest_rotation: a.orientation.inverse() * b.orientation,
            stiffness: 1.0,
        }
    }

    /// Set travel limits.
    pub fn with_limits(mut self, min: f32, max: f32) -> Self {
        self.limits = Some((min, max));
        self
    }

    /// Current travel along the axis.
    pub fn offset(&self, a: &RigidBody, b: &RigidBody) -> f32 {
        let axis = a.orientation * self.local_axis;
        (b.position - a.world_point(self.local_anchor_a)).dot(axis)
    }

    fn position_error(&self, a: &RigidBody, b: &RigidBody) -> Vec3 {
        let axis = a.orientation * self.local_axis;
        let d = b.position - a.world_point(self.local_anchor_a);
        let along = d.dot(axis);
        let allowed = match self.limits {
            Some((min, max)) => along.clamp(min, max),
            None => along,
        };
        d - axis * allowed
    }
}

/// Fixed joint - holds the relative pose captured at creation.
#[derive(Clone, Debug)]
pub struct FixedJoint {
    /// First body index.
    pub body_a: usize,
    /// Second body index.
    pub body_b: usize,
    local_anchor_a: Vec3,
    rest_rotation: Quat,
    /// Joint stiffness.
    pub stiffness: f32,
}

impl FixedJoint {
    /// Weld two bodies in their current relative pose.
    pub fn new(body_a: usize, a: &RigidBody, body_b: usize, b: &RigidBody) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: a.orientation.inverse() * (b.position - a.position),
            rest_rotation: a.orientation.inverse() * b.orientation,
            stiffness: 1.0,
        }
    }
}

/// Spring joint - elastic connection between points.
#[derive(Clone, Debug)]
pub struct SpringJoint {
    /// First body index.
    pub body_a: usize,
    /// Second body index.
    pub body_b: usize,
    /// Local anchor point on body A.
    pub local_anchor_a: Vec3,
    /// Local anchor point on body B.
    pub local_anchor_b: Vec3,
    /// Spring direction in body A space; the anchor line when `None`.
    pub local_axis: Option<Vec3>,
    /// Rest length of the spring.
    pub rest_length: f32,
    /// Spring stiffness (Hooke's law k).
    pub stiffness: f32,
    /// Damping coefficient.
    pub damping: f32,
}

impl SpringJoint {
    /// Create a new spring joint.
    pub fn new(body_a: usize, body_b: usize, rest_length: f32) -> Self {
        Self {
            body_a,
            body_b,
            local_anchor_a: Vec3::ZERO,
            local_anchor_b: Vec3::ZERO,
            local_axis: None,
            rest_length,
            stiffness: 100.0,
            damping: 1.0,
        }
    }

    /// Set anchor points in local body space.
    pub fn with_anchors(mut self, anchor_a: Vec3, anchor_b: Vec3) -> Self {
        self.local_anchor_a = anchor_a;
        self.local_anchor_b = anchor_b;
        self
    }

    /// Restrict the spring to one axis of body A.
    pub fn with_axis(mut self, axis: Vec3) -> Self {
        self.local_axis = Some(axis.normalize());
        self
    }

    /// Set spring stiffness.
    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness.max(0.0);
        self
    }

    /// Set damping coefficient.
    pub fn with_damping(mut self, damping: f32) -> Self {
        self.damping = damping.max(0.0);
        self
    }

    /// Current spring extension (direction, length).
    fn extension(&self, a: &RigidBody, b: &RigidBody) -> Option<(Vec3, f32)> {
        let d = b.world_point(self.local_anchor_b) - a.world_point(self.local_anchor_a);
        match self.local_axis {
            Some(axis) => {
                let axis = a.orientation * axis;
                Some((axis, d.dot(axis)))
            }
            None => {
                let len = d.length();
                (len > EPSILON).then(|| (d / len, len))
            }
        }
    }
}

// ============================================================================
// Position-level helpers
// ============================================================================

fn generalized_inv_mass(body: &RigidBody, r: Vec3, n: Vec3) -> f32 {
    if !body.is_dynamic() {
        return 0.0;
    }
    let rn = r.cross(n);
    body.inv_mass + rn.dot(body.inv_inertia_world(rn))
}

fn rotate_by(body: &mut RigidBody, rotation: Vec3) {
    let q = body.orientation;
    let dq = Quat::from_xyzw(rotation.x, rotation.y, rotation.z, 0.0) * q * 0.5;
    body.orientation = (q + dq).normalize();
}

fn apply_positional(body: &mut RigidBody, p: Vec3, r: Vec3) {
    if !body.is_dynamic() {
        return;
    }
    body.position += p * body.inv_mass;
    let dtheta = body.inv_inertia_world(r.cross(p));
    rotate_by(body, dtheta);
}

/// Move anchor points so that A's anchor travels by `delta` relative to B's.
fn correct_position(
    a: &mut RigidBody,
    b: &mut RigidBody,
    anchor_a: Vec3,
    anchor_b: Vec3,
    delta: Vec3,
    stiffness: f32,
) {
    let len = delta.length();
    if len < EPSILON {
        return;
    }
    let n = delta / len;
    let ra = anchor_a - a.position;
    let rb = anchor_b - b.position;
    let w = generalized_inv_mass(a, ra, n) + generalized_inv_mass(b, rb, n);
    if w < EPSILON {
        return;
    }

    let p = n * (len * stiffness / w);
    apply_positional(a, p, ra);
    apply_positional(b, -p, rb);
}

/// Rotate A by `error` relative to B, split by angular inverse mass.
fn correct_rotation(a: &mut RigidBody, b: &mut RigidBody, error: Vec3, stiffness: f32) {
    let len = error.length();
    if len < EPSILON {
        return;
    }
    let n = error / len;
    let wa = if a.is_dynamic() { n.dot(a.inv_inertia_world(n)) } else { 0.0 };
    let wb = if b.is_dynamic() { n.dot(b.inv_inertia_world(n)) } else { 0.0 };
    if wa + wb < EPSILON {
        return;
    }

    let lambda = len * stiffness / (wa + wb);
    if a.is_dynamic() {
        let dtheta = a.inv_inertia_world(n * lambda);
        rotate_by(a, dtheta);
    }
    if b.is_dynamic() {
        let dtheta = b.inv_inertia_world(-n * lambda);
        rotate_by(b, dtheta);
    }
}

/// Rotation A must undergo to restore `rest = a⁻¹ b`.
fn rotation_error(a: &RigidBody, b: &RigidBody, rest: Quat) -> Vec3 {
    // B's target orientation is a * rest; rotating A by the inverse of
    // b's deviation restores the same relative pose.
    let mut dq = b.orientation * (a.orientation * rest).inverse();
    if dq.w < 0.0 {
        dq = -dq;
    }
    dq.to_scaled_axis()
}

// ============================================================================
// JointSolver Implementations
// ============================================================================

impl JointSolver for PointJoint {
    fn bodies(&self) -> (usize, usize) {
        (self.body_a, self.body_b)
    }

    fn compute_error(&self, a: &RigidBody, b: &RigidBody) -> JointResidual {
        JointResidual::position(b.world_point(self.local_anchor_b) - a.world_point(self.local_anchor_a))
    }

    fn apply_correction(&self, a: &mut RigidBody, b: &mut RigidBody, stiffness: f32) {
        let pa = a.world_point(self.local_anchor_a);
        let pb = b.world_point(self.local_anchor_b);
        correct_position(a, b, pa, pb, pb - pa, stiffness);
    }

    fn stiffness(&self) -> f32 {
        self.stiffness
    }
}

impl JointSolver for HingeJoint {
    fn bodies(&self) -> (usize, usize) {
        (self.body_a, self.body_b)
    }

    fn compute_error(&self, a: &RigidBody, b: &RigidBody) -> JointResidual {
        let pos_error = b.world_point(self.local_anchor_b) - a.world_point(self.local_anchor_a);
        let world_axis_a = a.orientation * self.local_axis_a;
        let world_axis_b = b.orientation * self.local_axis_b;
        JointResidual::full(pos_error, world_axis_a.cross(world_axis_b))
    }

    fn apply_correction(&self, a: &mut RigidBody, b: &mut RigidBody, stiffness: f32) {
        // Position correction
        let pa = a.world_point(self.local_anchor_a);
        let pb = b.world_point(self.local_anchor_b);
        correct_position(a, b, pa, pb, pb - pa, stiffness);

        // Axis alignment
        let world_axis_a = a.orientation * self.local_axis_a;
        let world_axis_b = b.orientation * self.local_axis_b;
        correct_rotation(a, b, world_axis_a.cross(world_axis_b), stiffness);

        // Angle limits
        if let Some((min, max)) = self.limits {
            let angle = self.angle(a, b);
            let clamped = angle.clamp(min, max);
            if clamped != angle {
                let axis = a.orientation * self.local_axis_a;
                correct_rotation(a, b, -axis * (clamped - angle), stiffness);
            }
        }
    }

    fn stiffness(&self) -> f32 {
        self.stiffness
    }
}

impl JointSolver for SliderJoint {
    fn bodies(&self) -> (usize, usize) {
        (self.body_a, self.body_b)
    }

    fn compute_error(&self, a: &RigidBody, b: &RigidBody) -> JointResidual {
        JointResidual::full(
            self.position_error(a, b),
            rotation_error(a, b, self.rest_rotation),
        )
    }

    fn apply_correction(&self, a: &mut RigidBody, b: &mut RigidBody, stiffness: f32) {
        correct_rotation(a, b, rotation_error(a, b, self.rest_rotation), stiffness);

        let delta = self.position_error(a, b);
        let pb = b.position;
        correct_position(a, b, pb - delta, pb, delta, stiffness);
    }

    fn stiffness(&self) -> f32 {
        self.stiffness
    }
}

impl JointSolver for FixedJoint {
    fn bodies(&self) -> (usize, usize) {
        (self.body_a, self.body_b)
    }

    fn compute_error(&self, a: &RigidBody, b: &RigidBody) -> JointResidual {
        JointResidual::full(
            b.position - a.world_point(self.local_anchor_a),
            rotation_error(a, b, self.rest_rotation),
        )
    }

    fn apply_correction(&self, a: &mut RigidBody, b: &mut RigidBody, stiffness: f32) {
        correct_rotation(a, b, rotation_error(a, b, self.rest_rotation), stiffness);

        let pa = a.world_point(self.local_anchor_a);
        let pb = b.position;
        correct_position(a, b, pa, pb, pb - pa, stiffness);
    }

    fn stiffness(&self) -> f32 {
        self.stiffness
    }
}

impl JointSolver for SpringJoint {
    fn bodies(&self) -> (usize, usize) {
        (self.body_a, self.body_b)
    }

    fn compute_error(&self, a: &RigidBody, b: &RigidBody) -> JointResidual {
        match self.extension(a, b) {
            Some((dir, len)) => JointResidual::position(dir * (len - self.rest_length)),
            None => JointResidual::position(Vec3::ZERO),
        }
    }

    fn apply_correction(&self, _a: &mut RigidBody, _b: &mut RigidBody, _stiffness: f32) {}

    fn apply_forces(&self, a: &mut RigidBody, b: &mut RigidBody) {
        let Some((dir, len)) = self.extension(a, b) else {
            return;
        };
        let pa = a.world_point(self.local_anchor_a);
        let pb = b.world_point(self.local_anchor_b);

        // Spring force (Hooke's law) plus damping on the relative velocity.
        let rel_vel = (b.velocity_at_point(pb) - a.velocity_at_point(pa)).dot(dir);
        let magnitude = self.stiffness * (len - self.rest_length) + self.damping * rel_vel;
        if magnitude.abs() < EPSILON {
            return;
        }

        let force = dir * magnitude;
        a.apply_force_at_point(force, pa);
        b.apply_force_at_point(-force, pb);
    }

    fn stiffness(&self) -> f32 {
        self.stiffness
    }
}

/// Implementation for the Joint enum (delegates to inner type).
impl JointSolver for Joint {
    fn bodies(&self) -> (usize, usize) {
        self.solver().bodies()
    }

    fn compute_error(&self, a: &RigidBody, b: &RigidBody) -> JointResidual {
        self.solver().compute_error(a, b)
    }

    fn apply_correction(&self, a: &mut RigidBody, b: &mut RigidBody, stiffness: f32) {
        self.solver().apply_correction(a, b, stiffness)
    }

    fn apply_forces(&self, a: &mut RigidBody, b: &mut RigidBody) {
        self.solver().apply_forces(a, b)
    }

    fn stiffness(&self) -> f32 {
        self.solver().stiffness()
    }
}

impl Joint {
    fn solver(&self) -> &dyn JointSolver {
        match self {
            Joint::Point(j) => j,
            Joint::Hinge(j) => j,
            Joint::Slider(j) => j,
            Joint::Fixed(j) => j,
            Joint::Spring(j) => j,
        }
    }

    /// Returns true for joints solved at the position level.
    pub fn is_rigid(&self) -> bool {
        !matches!(self, Joint::Spring(_))
    }
}
