//! Constraints between managed bodies.
//!
//! A constraint names its two bodies by [`BodyHandle`] and carries its kind in
//! the [`ConstraintParams`] variant. Pivots and axes are given in each
//! entity's local space; the manager converts them to simulator body space
//! (accounting for auto-centered shapes) and owns the resulting world joint.

use glam::Vec3;
use slotmap::SlotMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::body::RigidBodyManager;
use crate::error::{PhysicsError, Result};
use crate::handle::{BodyHandle, ConstraintHandle};
use crate::joint::{FixedJoint, HingeJoint, Joint, PointJoint, SliderJoint, SpringJoint};
use crate::world::{JointId, PhysicsWorld};

/// Kind of constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintKind {
    /// Ball joint.
    PointToPoint,
    /// Single rotation axis.
    Hinge,
    /// Single translation axis.
    Slider,
    /// No relative motion.
    Fixed,
    /// Elastic link.
    Spring,
}

/// Constraint parameters, one variant per [`ConstraintKind`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConstraintParams {
    /// Hold two pivots together.
    PointToPoint {
        /// Pivot in A's local space.
        pivot_a: Vec3,
        /// Pivot in B's local space.
        pivot_b: Vec3,
    },
    /// Hold pivots together and allow rotation around one axis.
    Hinge {
        /// Pivot in A's local space.
        pivot_a: Vec3,
        /// Pivot in B's local space.
        pivot_b: Vec3,
        /// Hinge axis in A's local space.
        axis_a: Vec3,
        /// Hinge axis in B's local space.
        axis_b: Vec3,
        /// Angle limits (min, max) in radians, zero at creation.
        limits: Option<(f32, f32)>,
    },
    /// Allow translation along one axis only.
    Slider {
        /// Slide axis in A's local space.
        axis: Vec3,
        /// Travel limits (min, max), zero at creation.
        limits: Option<(f32, f32)>,
    },
    /// Weld the bodies in their current relative pose.
    Fixed,
    /// Spring between two pivots.
    Spring {
        /// Pivot in A's local space.
        pivot_a: Vec3,
        /// Pivot in B's local space.
        pivot_b: Vec3,
        /// Spring direction in A's local space; the pivot line when `None`.
        axis: Option<Vec3>,
        /// Rest length; the current length when `None`.
        rest_length: Option<f32>,
        /// Hooke's law constant.
        stiffness: f32,
        /// Damping coefficient.
        damping: f32,
    },
}

impl ConstraintParams {
    /// Ball joint between two pivots.
    pub fn point_to_point(pivot_a: Vec3, pivot_b: Vec3) -> Self {
        Self::PointToPoint { pivot_a, pivot_b }
    }

    /// Hinge with the same axis on both bodies and no limits.
    pub fn hinge(pivot_a: Vec3, pivot_b: Vec3, axis: Vec3) -> Self {
        Self::Hinge {
            pivot_a,
            pivot_b,
            axis_a: axis,
            axis_b: axis,
            limits: None,
        }
    }

    /// Unlimited slider.
    pub fn slider(axis: Vec3) -> Self {
        Self::Slider { axis, limits: None }
    }

    /// Spring between body origins with rest length taken at creation.
    pub fn spring(stiffness: f32, damping: f32) -> Self {
        Self::Spring {
            pivot_a: Vec3::ZERO,
            pivot_b: Vec3::ZERO,
            axis: None,
            rest_length: None,
            stiffness,
            damping,
        }
    }

    /// Kind of this constraint.
    pub fn kind(&self) -> ConstraintKind {
        match self {
            ConstraintParams::PointToPoint { .. } => ConstraintKind::PointToPoint,
            ConstraintParams::Hinge { .. } => ConstraintKind::Hinge,
            ConstraintParams::Slider { .. } => ConstraintKind::Slider,
            ConstraintParams::Fixed => ConstraintKind::Fixed,
            ConstraintParams::Spring { .. } => ConstraintKind::Spring,
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            ConstraintParams::PointToPoint { pivot_a, pivot_b } => {
                finite_vec("pivot_a", *pivot_a)?;
                finite_vec("pivot_b", *pivot_b)
            }
            ConstraintParams::Hinge {
                pivot_a,
                pivot_b,
                axis_a,
                axis_b,
                limits,
            } => {
                finite_vec("pivot_a", *pivot_a)?;
                finite_vec("pivot_b", *pivot_b)?;
                unit_axis("axis_a", *axis_a)?;
                unit_axis("axis_b", *axis_b)?;
                ordered_limits(*limits)
            }
            ConstraintParams::Slider { axis, limits } => {
                unit_axis("axis", *axis)?;
                ordered_limits(*limits)
            }
            ConstraintParams::Fixed => Ok(()),
            ConstraintParams::Spring {
                pivot_a,
                pivot_b,
                axis,
                rest_length,
                stiffness,
                damping,
            } => {
                finite_vec("pivot_a", *pivot_a)?;
                finite_vec("pivot_b", *pivot_b)?;
                if let Some(axis) = axis {
                    unit_axis("axis", *axis)?;
                }
                for (name, value) in [
                    ("rest_length", rest_length.unwrap_or(0.0)),
                    ("stiffness", *stiffness),
                    ("damping", *damping),
                ] {
                    if !value.is_finite() || value < 0.0 {
                        return Err(PhysicsError::InvalidConstraint(format!(
                            "{} must be non-negative, got {}",
                            name, value
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

fn finite_vec(name: &str, v: Vec3) -> Result<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(PhysicsError::InvalidConstraint(format!(
            "{} is not finite",
            name
        )))
    }
}

fn unit_axis(name: &str, v: Vec3) -> Result<()> {
    if v.is_finite() && v.length_squared() > 1e-12 {
        Ok(())
    } else {
        Err(PhysicsError::InvalidConstraint(format!(
            "{} must be a non-zero direction",
            name
        )))
    }
}

fn ordered_limits(limits: Option<(f32, f32)>) -> Result<()> {
    match limits {
        Some((min, max)) if min.is_nan() || max.is_nan() || min > max => {
            Err(PhysicsError::InvalidConstraint(format!(
                "limits ({}, {}) are not ordered",
                min, max
            )))
        }
        _ => Ok(()),
    }
}

struct ConstraintRecord {
    body_a: BodyHandle,
    body_b: BodyHandle,
    kind: ConstraintKind,
    joint: JointId,
}

/// Owns the constraints between managed bodies.
#[derive(Default)]
pub struct ConstraintManager {
    records: SlotMap<ConstraintHandle, ConstraintRecord>,
}

impl ConstraintManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link two bodies.
    pub fn add_constraint(
        &mut self,
        bodies: &RigidBodyManager,
        world: &mut PhysicsWorld,
        body_a: BodyHandle,
        body_b: BodyHandle,
        params: &ConstraintParams,
    ) -> Result<ConstraintHandle> {
        let rec_a = *bodies
            .record(body_a)
            .ok_or(PhysicsError::UnknownBody(body_a))?;
        let rec_b = *bodies
            .record(body_b)
            .ok_or(PhysicsError::UnknownBody(body_b))?;
        if body_a == body_b {
            return Err(PhysicsError::InvalidConstraint(
                "a body cannot be constrained to itself".to_string(),
            ));
        }
        params.validate()?;

        let (ia, ib) = (rec_a.sim.index(), rec_b.sim.index());
        let (Some(a), Some(b)) = (world.body(rec_a.sim), world.body(rec_b.sim)) else {
            return Err(PhysicsError::NotFound);
        };
        // Entity-space pivots to body space.
        let local_a = |p: Vec3| p - rec_a.center_offset;
        let local_b = |p: Vec3| p - rec_b.center_offset;

        let joint = match params {
            ConstraintParams::PointToPoint { pivot_a, pivot_b } => Joint::Point(
                PointJoint::new(ia, ib).with_anchors(local_a(*pivot_a), local_b(*pivot_b)),
            ),
            ConstraintParams::Hinge {
                pivot_a,
                pivot_b,
                axis_a,
                axis_b,
                limits,
            } => {
                let mut hinge = HingeJoint::new(ia, a, ib, b)
                    .with_anchors(local_a(*pivot_a), local_b(*pivot_b))
                    .with_axes(a, *axis_a, b, *axis_b);
                if let Some((min, max)) = limits {
                    hinge = hinge.with_limits(*min, *max);
                }
                Joint::Hinge(hinge)
            }
            ConstraintParams::Slider { axis, limits } => {
                let mut slider = SliderJoint::new(ia, a, ib, b, *axis);
                if let Some((min, max)) = limits {
                    slider = slider.with_limits(*min, *max);
                }
                Joint::Slider(slider)
            }
            ConstraintParams::Fixed => Joint::Fixed(FixedJoint::new(ia, a, ib, b)),
            ConstraintParams::Spring {
                pivot_a,
                pivot_b,
                axis,
                rest_length,
                stiffness,
                damping,
            } => {
                let anchor_a = local_a(*pivot_a);
                let anchor_b = local_b(*pivot_b);
                let offset = b.world_point(anchor_b) - a.world_point(anchor_a);
                let current = match axis {
                    Some(axis) => offset.dot(a.orientation * axis.normalize()),
                    None => offset.length(),
                };
                let mut spring = SpringJoint::new(ia, ib, rest_length.unwrap_or(current))
                    .with_anchors(anchor_a, anchor_b)
                    .with_stiffness(*stiffness)
                    .with_damping(*damping);
                if let Some(axis) = axis {
                    spring = spring.with_axis(*axis);
                }
                Joint::Spring(spring)
            }
        };

        let joint = world.add_joint(joint).ok_or(PhysicsError::NotFound)?;
        let kind = params.kind();
        let handle = self.records.insert(ConstraintRecord {
            body_a,
            body_b,
            kind,
            joint,
        });
        tracing::debug!(?handle, ?body_a, ?body_b, ?kind, "added constraint");
        Ok(handle)
    }

    /// Remove a constraint. Returns false if it was already gone.
    pub fn remove_constraint(&mut self, world: &mut PhysicsWorld, handle: ConstraintHandle) -> bool {
        let Some(record) = self.records.remove(handle) else {
            return false;
        };
        world.remove_joint(record.joint);
        tracing::debug!(?handle, "removed constraint");
        true
    }

    /// Remove every constraint touching `body`; returns how many went.
    pub fn detach_body(&mut self, world: &mut PhysicsWorld, body: BodyHandle) -> usize {
        let attached = self.constraints_of(body);
        for &handle in &attached {
            self.remove_constraint(world, handle);
        }
        attached.len()
    }

    /// Constraints touching `body`.
    pub fn constraints_of(&self, body: BodyHandle) -> Vec<ConstraintHandle> {
        self.records
            .iter()
            .filter(|(_, r)| r.body_a == body || r.body_b == body)
            .map(|(handle, _)| handle)
            .collect()
    }

    /// Kind of a live constraint.
    pub fn kind(&self, handle: ConstraintHandle) -> Option<ConstraintKind> {
        self.records.get(handle).map(|r| r.kind)
    }

    /// Bodies of a live constraint.
    pub fn bodies(&self, handle: ConstraintHandle) -> Option<(BodyHandle, BodyHandle)> {
        self.records.get(handle).map(|r| (r.body_a, r.body_b))
    }

    /// Returns true if the handle names a live constraint.
    pub fn contains(&self, handle: ConstraintHandle) -> bool {
        self.records.contains_key(handle)
    }

    /// Number of live constraints.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no constraints.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
