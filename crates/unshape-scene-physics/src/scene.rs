//! Scene graph boundary.
//!
//! The physics layer never owns visual objects. It names them by [`EntityId`]
//! and reaches them through the [`SceneGraph`] trait: it reads declared
//! geometry and poses, and writes poses back after each step. [`Scene`] is a
//! minimal store implementing the trait for tools and tests.

use glam::{Quat, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a visual object in the scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityId(pub u32);

/// Position and rotation of an object in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// World-space position.
    pub position: Vec3,
    /// World-space rotation.
    pub rotation: Quat,
}

impl Pose {
    /// Pose at the origin with no rotation.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    /// Create a pose from position and rotation.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Create an unrotated pose at `position`.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Transform a point from local to world space.
    pub fn transform_point(&self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Triangle mesh vertex data.
///
/// An empty index buffer means the positions are a plain triangle list.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshData {
    /// Vertex positions in the entity's local space.
    pub positions: Vec<Vec3>,
    /// Triangle indices, three per triangle.
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Create mesh data from positions and indices.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        Self { positions, indices }
    }

    /// Triangle index triples, expanding non-indexed data.
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        if self.indices.is_empty() {
            (0..self.positions.len() as u32 / 3)
                .map(|t| [t * 3, t * 3 + 1, t * 3 + 2])
                .collect()
        } else {
            self.indices
                .chunks_exact(3)
                .map(|c| [c[0], c[1], c[2]])
                .collect()
        }
    }
}

/// Geometry an entity declares about itself.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Geometry {
    /// Box with full extents.
    Box {
        /// Extent along X.
        width: f32,
        /// Extent along Y.
        height: f32,
        /// Extent along Z.
        depth: f32,
    },
    /// Sphere.
    Sphere {
        /// Radius.
        radius: f32,
    },
    /// Cylinder along the local Y axis.
    Cylinder {
        /// Radius of the top cap.
        radius_top: f32,
        /// Radius of the bottom cap.
        radius_bottom: f32,
        /// Full height.
        height: f32,
    },
    /// Torus in the local XZ plane.
    Torus {
        /// Distance from the center to the middle of the tube.
        radius: f32,
        /// Tube radius.
        tube: f32,
    },
    /// Arbitrary triangle mesh.
    Mesh(MeshData),
}

/// A visual object.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneEntity {
    /// Display name.
    pub name: String,
    /// Current pose.
    pub pose: Pose,
    /// Declared geometry, if any.
    pub geometry: Option<Geometry>,
}

impl SceneEntity {
    /// Create an entity at the origin with no geometry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pose: Pose::IDENTITY,
            geometry: None,
        }
    }

    /// Set the pose.
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Set the declared geometry.
    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }
}

/// Access the physics layer needs to the presentation layer.
pub trait SceneGraph {
    /// Add an entity and return its id.
    fn spawn(&mut self, entity: SceneEntity) -> EntityId;

    /// Remove an entity.
    fn despawn(&mut self, id: EntityId) -> Option<SceneEntity>;

    /// Current pose of an entity.
    fn pose(&self, id: EntityId) -> Option<Pose>;

    /// Overwrite the pose of an entity. Unknown ids are ignored.
    fn set_pose(&mut self, id: EntityId, pose: Pose);

    /// Declared geometry of an entity.
    fn geometry(&self, id: EntityId) -> Option<&Geometry>;
}

/// Flat entity store.
///
/// Ids are never reused, so a despawned id stays unresolvable.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    entities: Vec<Option<SceneEntity>>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an entity.
    pub fn entity(&self, id: EntityId) -> Option<&SceneEntity> {
        self.entities.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Get a mutable entity.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut SceneEntity> {
        self.entities.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.iter().flatten().count()
    }

    /// Returns true if the scene has no live entities.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over live entities.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &SceneEntity)> {
        self.entities
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (EntityId(i as u32), e)))
    }
}

impl SceneGraph for Scene {
    fn spawn(&mut self, entity: SceneEntity) -> EntityId {
        let id = EntityId(self.entities.len() as u32);
        self.entities.push(Some(entity));
        id
    }

    fn despawn(&mut self, id: EntityId) -> Option<SceneEntity> {
        self.entities.get_mut(id.0 as usize).and_then(Option::take)
    }

    fn pose(&self, id: EntityId) -> Option<Pose> {
        self.entity(id).map(|e| e.pose)
    }

    fn set_pose(&mut self, id: EntityId, pose: Pose) {
        if let Some(entity) = self.entity_mut(id) {
            entity.pose = pose;
        }
    }

    fn geometry(&self, id: EntityId) -> Option<&Geometry> {
        self.entity(id).and_then(|e| e.geometry.as_ref())
    }
}
