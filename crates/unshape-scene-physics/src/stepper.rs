//! Fixed-step driver between the scene and the simulator.

use glam::{Quat, Vec3};

use crate::body::RigidBodyManager;
use crate::rigidbody::BodyType;
use crate::scene::{Pose, SceneGraph};
use crate::world::{PhysicsWorld, SimulationConfig};

/// Accumulates frame time and turns it into fixed sub-steps.
///
/// A frame never runs more than `max_substeps` sub-steps; leftover whole
/// steps are dropped rather than folded into a larger step.
#[derive(Debug, Clone)]
pub struct SimulationStepper {
    fixed_time_step: f32,
    max_substeps: u32,
    accumulated: f32,
    last_substeps: u32,
}

impl Default for SimulationStepper {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

impl SimulationStepper {
    /// Create a stepper.
    pub fn new(fixed_time_step: f32, max_substeps: u32) -> Self {
        Self {
            fixed_time_step,
            max_substeps: max_substeps.max(1),
            accumulated: 0.0,
            last_substeps: 0,
        }
    }

    /// Create a stepper matching a world configuration.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.fixed_time_step, config.max_substeps)
    }

    /// Seconds per sub-step.
    pub fn fixed_time_step(&self) -> f32 {
        self.fixed_time_step
    }

    /// Time carried over to the next frame, in seconds.
    pub fn accumulated(&self) -> f32 {
        self.accumulated
    }

    /// Sub-steps run by the last call to [`Self::step`].
    pub fn last_substeps(&self) -> u32 {
        self.last_substeps
    }

    /// Add `delta_ms` of frame time and return how many sub-steps are due.
    ///
    /// Negative or non-finite deltas add nothing.
    pub fn advance(&mut self, delta_ms: f32) -> u32 {
        if delta_ms.is_finite() && delta_ms > 0.0 {
            self.accumulated += delta_ms / 1000.0;
        }
        if self.fixed_time_step <= 0.0 {
            self.accumulated = 0.0;
            return 0;
        }
        let due = (self.accumulated / self.fixed_time_step).floor();
        self.accumulated -= due * self.fixed_time_step;
        // Guard against drift pushing the remainder just under zero.
        self.accumulated = self.accumulated.max(0.0);
        (due as u32).min(self.max_substeps)
    }

    /// Drive kinematic bodies from the scene, then run the due sub-steps.
    ///
    /// Returns the number of sub-steps run.
    pub fn step<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &S,
        bodies: &RigidBodyManager,
        world: &mut PhysicsWorld,
        delta_ms: f32,
    ) -> u32 {
        let substeps = self.advance(delta_ms);
        self.last_substeps = substeps;
        if substeps == 0 {
            return 0;
        }
        let span = substeps as f32 * self.fixed_time_step;
        drive_kinematic(scene, bodies, world, span);
        world.step(substeps, self.fixed_time_step);
        substeps
    }
}

/// Set kinematic velocities so each body reaches its entity pose after `span`
/// seconds.
pub fn drive_kinematic<S: SceneGraph + ?Sized>(
    scene: &S,
    bodies: &RigidBodyManager,
    world: &mut PhysicsWorld,
    span: f32,
) {
    if span <= 0.0 {
        return;
    }
    for (_, record) in bodies.records() {
        if record.body_type != BodyType::Kinematic {
            continue;
        }
        let Some(pose) = scene.pose(record.entity) else {
            continue;
        };
        let Some(body) = world.body_mut(record.sim) else {
            continue;
        };

        let target = pose.position + pose.rotation * record.center_offset;
        body.velocity = (target - body.position) / span;

        let mut delta = pose.rotation * body.orientation.inverse();
        if delta.w < 0.0 {
            delta = -delta;
        }
        let (axis, angle) = delta.to_axis_angle();
        body.angular_velocity = if angle.abs() > 1e-6 {
            axis * (angle / span)
        } else {
            Vec3::ZERO
        };
    }
}

/// Copy dynamic body poses onto their entities.
pub fn write_back<S: SceneGraph + ?Sized>(scene: &mut S, bodies: &RigidBodyManager, world: &PhysicsWorld) {
    for (_, record) in bodies.records() {
        if record.body_type != BodyType::Dynamic {
            continue;
        }
        if let Some(body) = world.body(record.sim) {
            scene.set_pose(record.entity, body_to_entity(body.position, body.orientation, record.center_offset));
        }
    }
}

fn body_to_entity(position: Vec3, orientation: Quat, center_offset: Vec3) -> Pose {
    Pose::new(position - orientation * center_offset, orientation)
}
