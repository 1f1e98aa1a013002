//! Generational handles for bodies and constraints.
//!
//! Handles are slot map keys: a slot index plus the version the slot had when
//! the value was inserted. Removing a value bumps the slot's version, so
//! handles to destroyed values never resolve again even after the slot is
//! reused.

use slotmap::new_key_type;

new_key_type! {
    /// Opaque identifier of a rigid body managed by [`crate::RigidBodyManager`].
    pub struct BodyHandle;

    /// Opaque identifier of a constraint managed by [`crate::ConstraintManager`].
    pub struct ConstraintHandle;
}
