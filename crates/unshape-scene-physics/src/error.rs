//! Error types for scene physics.

use thiserror::Error;

use crate::handle::BodyHandle;
use crate::scene::EntityId;

/// Errors returned by shape construction, body management and constraints.
///
/// Every variant is local and recoverable: the failed operation leaves the
/// handle maps, the constraint list and the collision pair state untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// A shape dimension or margin was zero, negative or not finite.
    #[error("invalid dimensions for {shape}: {reason}")]
    InvalidDimensions {
        /// Shape kind being built.
        shape: &'static str,
        /// What was wrong with the parameters.
        reason: String,
    },

    /// Mesh data cannot form the requested shape.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The shape cannot be used with the requested mass.
    #[error("shape {shape} cannot be used with mass {mass}")]
    InvalidMassForShape {
        /// Shape kind being built.
        shape: &'static str,
        /// Requested mass.
        mass: f32,
    },

    /// The entity is already bound to a rigid body.
    #[error("entity {0:?} already has a physical body")]
    AlreadyHasBody(EntityId),

    /// A shape kind name was not recognized.
    #[error("could not recognize shape \"{0}\"")]
    UnknownShapeKind(String),

    /// A handle does not name a live body.
    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),

    /// A lookup did not resolve.
    #[error("not found")]
    NotFound,

    /// Constraint parameters are unusable.
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    /// A collision listener was registered for a body paired with itself.
    #[error("body {0:?} cannot collide with itself")]
    SelfPair(BodyHandle),
}

/// Result alias for scene physics operations.
pub type Result<T> = std::result::Result<T, PhysicsError>;

impl PhysicsError {
    pub(crate) fn dimensions(shape: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            shape,
            reason: reason.into(),
        }
    }
}
