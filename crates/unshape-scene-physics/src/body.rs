//! Rigid body lifetime and the entity ↔ body mapping.

use std::collections::HashMap;

use glam::Vec3;
use slotmap::SlotMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, Result};
use crate::handle::BodyHandle;
use crate::rigidbody::{BodyType, RigidBody};
use crate::scene::{EntityId, Pose};
use crate::shape::{ShapeDescriptor, ShapeFactory};
use crate::world::{PhysicsWorld, SimBodyId};

/// Whether a dynamic body may be deactivated when idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ActivationPolicy {
    /// Never deactivated.
    #[default]
    AlwaysActive,
    /// Deactivated after staying idle; woken by contact, impulses or joints.
    AllowSleep,
}

/// Material and motion settings for a new body.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBodyConfig {
    /// Mass in kilograms; zero makes the body static.
    pub mass: f32,
    /// Restitution (bounciness) 0-1.
    pub restitution: f32,
    /// Friction coefficient.
    pub friction: f32,
    /// Fraction of linear velocity lost per second.
    pub linear_damping: f32,
    /// Fraction of angular velocity lost per second.
    pub angular_damping: f32,
    /// Margin override, taking precedence over the descriptor's.
    pub margin: Option<f32>,
    /// Drive the body from its entity's pose instead of simulating it.
    pub kinematic: bool,
    /// Deactivation policy for dynamic bodies.
    pub activation: ActivationPolicy,
    /// Extra entity-space offset of the body origin from the entity origin.
    pub offset: Vec3,
}

impl Default for RigidBodyConfig {
    fn default() -> Self {
        Self {
            mass: 1.0,
            restitution: 0.0,
            friction: 0.5,
            linear_damping: 0.0,
            angular_damping: 0.0,
            margin: None,
            kinematic: false,
            activation: ActivationPolicy::AlwaysActive,
            offset: Vec3::ZERO,
        }
    }
}

impl RigidBodyConfig {
    /// Default settings for a static body.
    pub fn fixed() -> Self {
        Self {
            mass: 0.0,
            ..Self::default()
        }
    }

    /// Set the mass.
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    /// Set restitution.
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    /// Set friction.
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Set linear and angular damping.
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Override the shape margin.
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = Some(margin);
        self
    }

    /// Make the body kinematic.
    pub fn with_kinematic(mut self, kinematic: bool) -> Self {
        self.kinematic = kinematic;
        self
    }

    /// Set the activation policy.
    pub fn with_activation(mut self, activation: ActivationPolicy) -> Self {
        self.activation = activation;
        self
    }

    /// Shift the body away from its entity's origin.
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    fn validate(&self) -> Result<()> {
        if !self.offset.is_finite() {
            return Err(PhysicsError::dimensions("body", "offset must be finite"));
        }
        for (name, value) in [
            ("restitution", self.restitution),
            ("friction", self.friction),
            ("linear_damping", self.linear_damping),
            ("angular_damping", self.angular_damping),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PhysicsError::dimensions(
                    "body",
                    format!("{} must be non-negative, got {}", name, value),
                ));
            }
        }
        Ok(())
    }
}

/// Bookkeeping for one managed body.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BodyRecord {
    pub entity: EntityId,
    pub sim: SimBodyId,
    pub center_offset: Vec3,
    pub body_type: BodyType,
}

/// Creates and destroys bodies and maps them to scene entities.
///
/// An entity has at most one body at a time. Lookups either way are hash
/// map hits.
#[derive(Default)]
pub struct RigidBodyManager {
    factory: ShapeFactory,
    records: SlotMap<BodyHandle, BodyRecord>,
    by_entity: HashMap<EntityId, BodyHandle>,
    by_sim: HashMap<SimBodyId, BodyHandle>,
}

impl RigidBodyManager {
    /// Create a manager building shapes with `factory`.
    pub fn new(factory: ShapeFactory) -> Self {
        Self {
            factory,
            ..Self::default()
        }
    }

    /// The shape factory.
    pub fn factory(&self) -> &ShapeFactory {
        &self.factory
    }

    /// Build a body for `entity` and add it to the world.
    ///
    /// Nothing is registered if any step fails.
    pub fn create_body(
        &mut self,
        world: &mut PhysicsWorld,
        entity: EntityId,
        descriptor: &ShapeDescriptor,
        config: &RigidBodyConfig,
        pose: Pose,
    ) -> Result<BodyHandle> {
        if self.by_entity.contains_key(&entity) {
            tracing::warn!(?entity, "entity already has a physical body");
            return Err(PhysicsError::AlreadyHasBody(entity));
        }
        config.validate()?;

        let built = match config.margin {
            Some(margin) => self
                .factory
                .build_for_body(&descriptor.clone().with_margin(margin), config.mass)?,
            None => self.factory.build_for_body(descriptor, config.mass)?,
        };

        let center_offset = built.center_offset + config.offset;
        let position = pose.position + pose.rotation * center_offset;
        let mut body = if config.kinematic {
            RigidBody::new_kinematic(position, built.collider, config.mass)
        } else {
            RigidBody::new(position, built.collider, config.mass)
        }
        .with_orientation(pose.rotation)
        .with_margin(built.margin);
        body.restitution = config.restitution;
        body.friction = config.friction;
        body.linear_damping = config.linear_damping;
        body.angular_damping = config.angular_damping;
        body.set_can_sleep(config.activation == ActivationPolicy::AllowSleep);

        let body_type = body.body_type;
        let sim = world.add_body(body);
        let handle = self.records.insert(BodyRecord {
            entity,
            sim,
            center_offset,
            body_type,
        });
        self.by_entity.insert(entity, handle);
        self.by_sim.insert(sim, handle);

        tracing::debug!(
            ?handle,
            ?entity,
            shape = descriptor.kind().name(),
            ?body_type,
            "created rigid body"
        );
        Ok(handle)
    }

    /// Remove a body from the maps and the world.
    ///
    /// Returns false if the handle was already stale. Constraints and pair
    /// state are the caller's to clean up first.
    pub fn destroy_body(&mut self, world: &mut PhysicsWorld, handle: BodyHandle) -> bool {
        let Some(record) = self.records.remove(handle) else {
            return false;
        };
        self.by_entity.remove(&record.entity);
        self.by_sim.remove(&record.sim);
        world.remove_body(record.sim);
        tracing::debug!(?handle, entity = ?record.entity, "destroyed rigid body");
        true
    }

    /// Returns true if the handle names a live body.
    pub fn contains(&self, handle: BodyHandle) -> bool {
        self.records.contains_key(handle)
    }

    /// Entity bound to a body.
    pub fn entity_of(&self, handle: BodyHandle) -> Result<EntityId> {
        self.record(handle)
            .map(|r| r.entity)
            .ok_or(PhysicsError::NotFound)
    }

    /// Body bound to an entity.
    pub fn body_of(&self, entity: EntityId) -> Result<BodyHandle> {
        self.by_entity
            .get(&entity)
            .copied()
            .ok_or(PhysicsError::NotFound)
    }

    /// Number of live bodies.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no bodies are managed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over live bodies and their entities.
    pub fn iter(&self) -> impl Iterator<Item = (BodyHandle, EntityId)> + '_ {
        self.records
            .iter()
            .map(|(handle, record)| (handle, record.entity))
    }

    pub(crate) fn record(&self, handle: BodyHandle) -> Option<&BodyRecord> {
        self.records.get(handle)
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = (BodyHandle, &BodyRecord)> + '_ {
        self.records.iter()
    }

    pub(crate) fn sim_id(&self, handle: BodyHandle) -> Option<SimBodyId> {
        self.record(handle).map(|r| r.sim)
    }

    pub(crate) fn handle_for_sim(&self, sim: SimBodyId) -> Option<BodyHandle> {
        self.by_sim.get(&sim).copied()
    }
}
