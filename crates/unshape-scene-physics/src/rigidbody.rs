//! Rigid body dynamics.
//!
//! Provides the simulator-side `RigidBody` type with mass, inertia, forces,
//! impulses and sleep state.

use glam::{Mat3, Quat, Vec3};

use crate::collider::{Collider, compute_inertia};

/// How the simulator moves a body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyType {
    /// Moved by forces, contacts and joints.
    Dynamic,
    /// Never moves.
    Static,
    /// Moved only by its velocity, which the owner sets; pushes dynamic
    /// bodies but is never pushed back.
    Kinematic,
}

/// A rigid body in the physics simulation.
#[derive(Clone, Debug)]
pub struct RigidBody {
    /// Position in world space.
    pub position: Vec3,
    /// Orientation as quaternion.
    pub orientation: Quat,
    /// Linear velocity.
    pub velocity: Vec3,
    /// Angular velocity.
    pub angular_velocity: Vec3,
    /// Mass (0 = infinite/static).
    pub mass: f32,
    /// Inverse mass (cached, 0 for static and kinematic bodies).
    pub inv_mass: f32,
    /// Inertia tensor (diagonal, body space).
    pub inertia: Vec3,
    /// Inverse inertia tensor (diagonal, body space).
    pub inv_inertia: Vec3,
    /// Restitution (bounciness) 0-1.
    pub restitution: f32,
    /// Friction coefficient.
    pub friction: f32,
    /// Linear damping, fraction of velocity lost per second.
    pub linear_damping: f32,
    /// Angular damping, fraction of angular velocity lost per second.
    pub angular_damping: f32,
    /// Collision shape.
    pub collider: Collider,
    /// Contact distance around the shape.
    pub margin: f32,
    /// Motion type.
    pub body_type: BodyType,
    /// Whether the body may be put to sleep when idle.
    pub(crate) can_sleep: bool,
    pub(crate) sleeping: bool,
    pub(crate) idle_time: f32,
    /// Accumulated force for this frame.
    pub(crate) force: Vec3,
    /// Accumulated torque for this frame.
    pub(crate) torque: Vec3,
}

impl RigidBody {
    /// Create a body; zero mass makes it static.
    pub fn new(position: Vec3, collider: Collider, mass: f32) -> Self {
        if mass <= 0.0 {
            return Self::new_static(position, collider);
        }

        let inertia = compute_inertia(&collider, mass);
        let inv_inertia = Vec3::new(
            recip_or_zero(inertia.x),
            recip_or_zero(inertia.y),
            recip_or_zero(inertia.z),
        );

        Self {
            inv_mass: 1.0 / mass,
            inertia,
            inv_inertia,
            mass,
            body_type: BodyType::Dynamic,
            ..Self::new_static(position, collider)
        }
    }

    /// Create a static (immovable) rigid body.
    pub fn new_static(position: Vec3, collider: Collider) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 0.0,
            inv_mass: 0.0,
            inertia: Vec3::ZERO,
            inv_inertia: Vec3::ZERO,
            restitution: 0.0,
            friction: 0.5,
            linear_damping: 0.0,
            angular_damping: 0.0,
            collider,
            margin: 0.05,
            body_type: BodyType::Static,
            can_sleep: false,
            sleeping: false,
            idle_time: 0.0,
            force: Vec3::ZERO,
            torque: Vec3::ZERO,
        }
    }

    /// Create a kinematic body. It keeps its mass for bookkeeping but
    /// responds to nothing.
    pub fn new_kinematic(position: Vec3, collider: Collider, mass: f32) -> Self {
        Self {
            mass,
            body_type: BodyType::Kinematic,
            ..Self::new_static(position, collider)
        }
    }

    /// Set the orientation.
    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    /// Set the contact margin.
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = margin;
        self
    }

    /// Returns true for static bodies.
    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    /// Returns true for dynamic bodies.
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// Returns true for kinematic bodies.
    pub fn is_kinematic(&self) -> bool {
        self.body_type == BodyType::Kinematic
    }

    /// Returns true while a dynamic body is deactivated.
    pub fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    /// Returns true if the body is dynamic and awake.
    pub fn is_active(&self) -> bool {
        self.is_dynamic() && !self.sleeping
    }

    /// Allow or forbid automatic deactivation.
    pub fn set_can_sleep(&mut self, can_sleep: bool) {
        self.can_sleep = can_sleep && self.is_dynamic();
        if !self.can_sleep {
            self.wake();
        }
    }

    /// Reactivate a sleeping body.
    pub fn wake(&mut self) {
        self.sleeping = false;
        self.idle_time = 0.0;
    }

    pub(crate) fn sleep(&mut self) {
        self.sleeping = true;
        self.velocity = Vec3::ZERO;
        self.angular_velocity = Vec3::ZERO;
    }

    /// Apply a force at the center of mass.
    pub fn apply_force(&mut self, force: Vec3) {
        if self.is_dynamic() {
            self.force += force;
            self.wake();
        }
    }

    /// Apply a force at a world-space point (generates torque).
    pub fn apply_force_at_point(&mut self, force: Vec3, point: Vec3) {
        if self.is_dynamic() {
            self.force += force;
            let r = point - self.position;
            self.torque += r.cross(force);
            self.wake();
        }
    }

    /// Apply an impulse at the center of mass.
    pub fn apply_impulse(&mut self, impulse: Vec3) {
        if self.is_dynamic() {
            self.velocity += impulse * self.inv_mass;
            self.wake();
        }
    }

    /// Apply an impulse at a world-space point.
    pub fn apply_impulse_at_point(&mut self, impulse: Vec3, point: Vec3) {
        if self.is_dynamic() {
            self.velocity += impulse * self.inv_mass;
            let r = point - self.position;
            let angular = self.inv_inertia_world(r.cross(impulse));
            self.angular_velocity += angular;
        }
    }

    /// Apply torque.
    pub fn apply_torque(&mut self, torque: Vec3) {
        if self.is_dynamic() {
            self.torque += torque;
            self.wake();
        }
    }

    /// Get the velocity at a world-space point on the body.
    pub fn velocity_at_point(&self, point: Vec3) -> Vec3 {
        let r = point - self.position;
        self.velocity + self.angular_velocity.cross(r)
    }

    /// Multiply a world-space vector by the world-space inverse inertia.
    pub fn inv_inertia_world(&self, v: Vec3) -> Vec3 {
        let local = self.orientation.inverse() * v;
        self.orientation * (self.inv_inertia * local)
    }

    /// Get the rotation matrix.
    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_quat(self.orientation)
    }

    /// Transform a body-space point to world space.
    pub fn world_point(&self, local: Vec3) -> Vec3 {
        self.position + self.orientation * local
    }

    /// Clear accumulated forces.
    pub(crate) fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
        self.torque = Vec3::ZERO;
    }
}

fn recip_or_zero(x: f32) -> f32 {
    if x > 0.0 { 1.0 / x } else { 0.0 }
}
