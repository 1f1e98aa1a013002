//! Scene-facing physics facade.
//!
//! [`ScenePhysics`] owns the simulator and the managers around it and is the
//! only type most callers touch. A frame looks like:
//!
//! ```
//! use glam::{Vec2, Vec3};
//! use unshape_scene_physics::{Pose, RigidBodyConfig, Scene, ScenePhysics};
//!
//! let mut scene = Scene::new();
//! let mut physics = ScenePhysics::default();
//! physics
//!     .add_ground(&mut scene, 50.0, 1.0, 50.0, Pose::IDENTITY)
//!     .unwrap();
//! let (crate_entity, _) = physics
//!     .add_box(
//!         &mut scene,
//!         1.0,
//!         1.0,
//!         1.0,
//!         Pose::from_position(Vec3::new(0.0, 5.0, 0.0)),
//!         &RigidBodyConfig::default(),
//!     )
//!     .unwrap();
//!
//! for _ in 0..10 {
//!     physics.step(&mut scene, 16.0);
//! }
//! assert!(scene.entity(crate_entity).unwrap().pose.position.y < 5.0);
//! ```

use glam::{Vec2, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::body::{RigidBodyConfig, RigidBodyManager};
use crate::constraint::{ConstraintKind, ConstraintManager, ConstraintParams};
use crate::error::{PhysicsError, Result};
use crate::events::{
    CollisionEvent, CollisionEventSystem, Deferred, DeferredCommand, ListenerId, PairKey,
};
use crate::handle::{BodyHandle, ConstraintHandle};
use crate::rigidbody::RigidBody;
use crate::scene::{EntityId, Geometry, MeshData, Pose, SceneEntity, SceneGraph};
use crate::shape::{ShapeDescriptor, ShapeDimensions, ShapeFactory, ShapeKind};
use crate::stepper::{self, SimulationStepper};
use crate::world::{PhysicsWorld, SimulationConfig};

// ============================================================================
// Debug draw
// ============================================================================

/// What an external debug visualizer should draw, as combinable flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DebugDrawMode(u32);

impl DebugDrawMode {
    /// Nothing.
    pub const NONE: Self = Self(0);
    /// Collider wireframes.
    pub const WIREFRAME: Self = Self(1);
    /// Bounding boxes.
    pub const BOUNDS: Self = Self(1 << 1);
    /// Contact points and normals.
    pub const CONTACTS: Self = Self(1 << 2);
    /// Constraint frames and limits.
    pub const CONSTRAINTS: Self = Self(1 << 3);

    /// Raw flag bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every flag in `other` is set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for DebugDrawMode {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Default for DebugDrawMode {
    fn default() -> Self {
        Self::WIREFRAME
    }
}

/// Debug drawing state read by an external visualizer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DebugDrawSettings {
    enabled: bool,
    mode: DebugDrawMode,
}

impl DebugDrawSettings {
    /// Turn drawing on.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Turn drawing off.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Select what to draw.
    pub fn set_mode(&mut self, mode: DebugDrawMode) {
        self.mode = mode;
    }

    /// Returns true if drawing is on.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current mode.
    pub fn mode(&self) -> DebugDrawMode {
        self.mode
    }
}

// ============================================================================
// Options
// ============================================================================

/// Options for [`ScenePhysics::add_existing`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingOptions {
    /// Shape kind name overriding the entity's own geometry (`"box"`,
    /// `"sphere"`, `"convex"`, ...).
    pub shape: Option<String>,
    /// Dimensions replacing those taken from the geometry or the unit
    /// defaults.
    pub dimensions: ShapeDimensions,
    /// Re-center mesh shapes on their bounds.
    pub auto_center: bool,
    /// Body configuration; mass defaults to 1.
    pub config: RigidBodyConfig,
}

impl Default for ExistingOptions {
    fn default() -> Self {
        Self {
            shape: None,
            dimensions: ShapeDimensions::default(),
            auto_center: true,
            config: RigidBodyConfig::default(),
        }
    }
}

impl ExistingOptions {
    /// Override the shape by name.
    pub fn with_shape(mut self, shape: impl Into<String>) -> Self {
        self.shape = Some(shape.into());
        self
    }

    /// Override the shape by kind.
    pub fn with_shape_kind(self, kind: ShapeKind) -> Self {
        self.with_shape(kind.name())
    }

    /// Set the mass.
    pub fn with_mass(mut self, mass: f32) -> Self {
        self.config.mass = mass;
        self
    }

    /// Override box extents.
    pub fn with_size(mut self, width: f32, height: f32, depth: f32) -> Self {
        self.dimensions.width = Some(width);
        self.dimensions.height = Some(height);
        self.dimensions.depth = Some(depth);
        self
    }

    /// Override the radius.
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.dimensions.radius = Some(radius);
        self
    }

    /// Shift the body away from the entity origin.
    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.config.offset = offset;
        self
    }

    /// Enable or disable re-centering.
    pub fn with_auto_center(mut self, auto_center: bool) -> Self {
        self.auto_center = auto_center;
        self
    }

    /// Replace the body configuration.
    pub fn with_config(mut self, config: RigidBodyConfig) -> Self {
        self.config = config;
        self
    }
}

// ============================================================================
// ScenePhysics
// ============================================================================

/// Rigid body physics kept in step with a scene.
pub struct ScenePhysics {
    world: PhysicsWorld,
    bodies: RigidBodyManager,
    constraints: ConstraintManager,
    events: CollisionEventSystem,
    stepper: SimulationStepper,
    debug_draw: DebugDrawSettings,
}

impl Default for ScenePhysics {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl ScenePhysics {
    /// Create an empty simulation.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            bodies: RigidBodyManager::new(ShapeFactory::new(config.default_margin)),
            constraints: ConstraintManager::new(),
            events: CollisionEventSystem::new(),
            stepper: SimulationStepper::from_config(&config),
            debug_draw: DebugDrawSettings::default(),
            world: PhysicsWorld::new(config),
        }
    }

    /// The simulator.
    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    /// Body manager.
    pub fn bodies(&self) -> &RigidBodyManager {
        &self.bodies
    }

    /// Constraint manager.
    pub fn constraints(&self) -> &ConstraintManager {
        &self.constraints
    }

    /// Collision event system.
    pub fn events(&self) -> &CollisionEventSystem {
        &self.events
    }

    /// Time stepper.
    pub fn stepper(&self) -> &SimulationStepper {
        &self.stepper
    }

    /// Debug draw state.
    pub fn debug_draw(&self) -> &DebugDrawSettings {
        &self.debug_draw
    }

    /// Mutable debug draw state.
    pub fn debug_draw_mut(&mut self) -> &mut DebugDrawSettings {
        &mut self.debug_draw
    }

    /// World gravity.
    pub fn gravity(&self) -> Vec3 {
        self.world.gravity()
    }

    /// Change world gravity; wakes every body.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.world.set_gravity(gravity);
    }

    // ------------------------------------------------------------------
    // Bodies
    // ------------------------------------------------------------------

    /// Build a body for `entity` at `pose`.
    pub fn create_body(
        &mut self,
        entity: EntityId,
        descriptor: &ShapeDescriptor,
        config: &RigidBodyConfig,
        pose: Pose,
    ) -> Result<BodyHandle> {
        self.bodies
            .create_body(&mut self.world, entity, descriptor, config, pose)
    }

    /// Destroy a body with its constraints, listeners and pair state.
    ///
    /// Returns false if the body was already gone. The entity is left alone.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> bool {
        if !self.bodies.contains(handle) {
            return false;
        }
        self.constraints.detach_body(&mut self.world, handle);
        self.events.purge_body(handle);
        self.bodies.destroy_body(&mut self.world, handle)
    }

    /// Entity bound to a body.
    pub fn entity_of(&self, handle: BodyHandle) -> Result<EntityId> {
        self.bodies.entity_of(handle)
    }

    /// Body bound to an entity.
    pub fn body_of(&self, entity: EntityId) -> Result<BodyHandle> {
        self.bodies.body_of(entity)
    }

    /// Simulator body behind a handle.
    pub fn body(&self, handle: BodyHandle) -> Result<&RigidBody> {
        self.bodies
            .sim_id(handle)
            .and_then(|sim| self.world.body(sim))
            .ok_or(PhysicsError::UnknownBody(handle))
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Result<&mut RigidBody> {
        self.bodies
            .sim_id(handle)
            .and_then(|sim| self.world.body_mut(sim))
            .ok_or(PhysicsError::UnknownBody(handle))
    }

    /// Linear velocity.
    pub fn velocity(&self, handle: BodyHandle) -> Result<Vec3> {
        self.body(handle).map(|b| b.velocity)
    }

    /// Set linear velocity and wake the body.
    pub fn set_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> Result<()> {
        let body = self.body_mut(handle)?;
        body.velocity = velocity;
        body.wake();
        Ok(())
    }

    /// Angular velocity.
    pub fn angular_velocity(&self, handle: BodyHandle) -> Result<Vec3> {
        self.body(handle).map(|b| b.angular_velocity)
    }

    /// Set angular velocity and wake the body.
    pub fn set_angular_velocity(&mut self, handle: BodyHandle, angular_velocity: Vec3) -> Result<()> {
        let body = self.body_mut(handle)?;
        body.angular_velocity = angular_velocity;
        body.wake();
        Ok(())
    }

    /// Apply an impulse at the center of mass.
    pub fn apply_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> Result<()> {
        self.body_mut(handle)?.apply_impulse(impulse);
        Ok(())
    }

    /// Apply an impulse at a world-space point.
    pub fn apply_impulse_at_point(&mut self, handle: BodyHandle, impulse: Vec3, point: Vec3) -> Result<()> {
        let body = self.body_mut(handle)?;
        body.apply_impulse_at_point(impulse, point);
        body.wake();
        Ok(())
    }

    /// Apply a force for the next sub-step.
    pub fn apply_force(&mut self, handle: BodyHandle, force: Vec3) -> Result<()> {
        self.body_mut(handle)?.apply_force(force);
        Ok(())
    }

    /// Entity-space pose of a body as the simulator sees it.
    pub fn body_pose(&self, handle: BodyHandle) -> Result<Pose> {
        let offset = self
            .bodies
            .record(handle)
            .map(|r| r.center_offset)
            .ok_or(PhysicsError::UnknownBody(handle))?;
        let body = self.body(handle)?;
        Ok(Pose::new(
            body.position - body.orientation * offset,
            body.orientation,
        ))
    }

    /// Wake a sleeping body.
    pub fn wake(&mut self, handle: BodyHandle) -> Result<()> {
        self.body_mut(handle)?.wake();
        Ok(())
    }

    /// Returns true if the body is deactivated.
    pub fn is_sleeping(&self, handle: BodyHandle) -> Result<bool> {
        self.body(handle).map(RigidBody::is_sleeping)
    }

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    /// Link two bodies.
    pub fn add_constraint(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        params: &ConstraintParams,
    ) -> Result<ConstraintHandle> {
        self.constraints
            .add_constraint(&self.bodies, &mut self.world, body_a, body_b, params)
    }

    /// Remove a constraint. Returns false if it was already gone.
    pub fn remove_constraint(&mut self, handle: ConstraintHandle) -> bool {
        self.constraints.remove_constraint(&mut self.world, handle)
    }

    /// Kind of a live constraint.
    pub fn constraint_kind(&self, handle: ConstraintHandle) -> Option<ConstraintKind> {
        self.constraints.kind(handle)
    }

    // ------------------------------------------------------------------
    // Collision listeners
    // ------------------------------------------------------------------

    /// Listen for events between two bodies. Events report `body_a` first.
    pub fn register_collision_listener(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        callback: impl FnMut(&CollisionEvent, &mut Deferred) + 'static,
    ) -> Result<ListenerId> {
        self.require(body_a)?;
        self.require(body_b)?;
        self.events.register_pair(body_a, body_b, Box::new(callback))
    }

    /// Listen for events involving one body. Events report it first.
    pub fn register_body_listener(
        &mut self,
        body: BodyHandle,
        callback: impl FnMut(&CollisionEvent, &mut Deferred) + 'static,
    ) -> Result<ListenerId> {
        self.require(body)?;
        Ok(self.events.register_body(body, Box::new(callback)))
    }

    /// Listen for every collision event.
    pub fn register_global_listener(
        &mut self,
        callback: impl FnMut(&CollisionEvent, &mut Deferred) + 'static,
    ) -> ListenerId {
        self.events.register_global(Box::new(callback))
    }

    /// Stop delivering to a listener. Returns false if it was not registered.
    pub fn unregister_collision_listener(&mut self, listener: ListenerId) -> bool {
        self.events.unregister(listener)
    }

    fn require(&self, body: BodyHandle) -> Result<()> {
        if self.bodies.contains(body) {
            Ok(())
        } else {
            Err(PhysicsError::UnknownBody(body))
        }
    }

    // ------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------

    /// Advance by `delta_ms` of frame time.
    ///
    /// Runs the due sub-steps, diffs touching pairs into events, delivers
    /// them, applies what listeners deferred and writes dynamic poses back to
    /// the scene. Returns the events of this frame; a frame with no due
    /// sub-step produces none.
    pub fn step<S: SceneGraph + ?Sized>(&mut self, scene: &mut S, delta_ms: f32) -> Vec<CollisionEvent> {
        let substeps = self
            .stepper
            .step(&*scene, &self.bodies, &mut self.world, delta_ms);
        if substeps == 0 {
            return Vec::new();
        }

        let bodies = &self.bodies;
        let touching: Vec<PairKey> = self
            .world
            .touching_pairs()
            .filter_map(|(a, b)| PairKey::new(bodies.handle_for_sim(a)?, bodies.handle_for_sim(b)?))
            .collect();
        let events = self
            .events
            .process(touching, |handle| bodies.entity_of(handle).ok());

        let mut deferred = Deferred::default();
        self.events.dispatch(&events, &mut deferred);
        let deferred_count = deferred.commands().len();
        for command in deferred.drain() {
            self.apply_deferred(command);
        }

        stepper::write_back(scene, &self.bodies, &self.world);

        tracing::trace!(
            substeps,
            events = events.len(),
            deferred = deferred_count,
            bodies = self.bodies.len(),
            "physics step"
        );
        events
    }

    fn apply_deferred(&mut self, command: DeferredCommand) {
        match command {
            DeferredCommand::DestroyBody(body) => {
                self.destroy_body(body);
            }
            DeferredCommand::RemoveConstraint(constraint) => {
                self.remove_constraint(constraint);
            }
            DeferredCommand::UnregisterListener(listener) => {
                self.unregister_collision_listener(listener);
            }
        }
    }

    // ------------------------------------------------------------------
    // Convenience constructors
    // ------------------------------------------------------------------

    /// Spawn a box entity with a body.
    pub fn add_box<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        width: f32,
        height: f32,
        depth: f32,
        pose: Pose,
        config: &RigidBodyConfig,
    ) -> Result<(EntityId, BodyHandle)> {
        let geometry = Geometry::Box {
            width,
            height,
            depth,
        };
        let descriptor = ShapeDescriptor::cuboid(width, height, depth);
        self.spawn_with_body(scene, "box", geometry, &descriptor, pose, config)
    }

    /// Spawn a static box entity to act as ground.
    pub fn add_ground<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        width: f32,
        height: f32,
        depth: f32,
        pose: Pose,
    ) -> Result<(EntityId, BodyHandle)> {
        let geometry = Geometry::Box {
            width,
            height,
            depth,
        };
        let descriptor = ShapeDescriptor::cuboid(width, height, depth);
        self.spawn_with_body(scene, "ground", geometry, &descriptor, pose, &RigidBodyConfig::fixed())
    }

    /// Spawn a sphere entity with a body.
    pub fn add_sphere<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        radius: f32,
        pose: Pose,
        config: &RigidBodyConfig,
    ) -> Result<(EntityId, BodyHandle)> {
        let descriptor = ShapeDescriptor::sphere(radius);
        self.spawn_with_body(scene, "sphere", Geometry::Sphere { radius }, &descriptor, pose, config)
    }

    /// Spawn a cylinder (or cone) entity with a body.
    pub fn add_cylinder<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        pose: Pose,
        config: &RigidBodyConfig,
    ) -> Result<(EntityId, BodyHandle)> {
        let geometry = Geometry::Cylinder {
            radius_top,
            radius_bottom,
            height,
        };
        let descriptor = ShapeDescriptor::cylinder(radius_top, radius_bottom, height);
        self.spawn_with_body(scene, "cylinder", geometry, &descriptor, pose, config)
    }

    /// Spawn a torus entity with a body.
    pub fn add_torus<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        radius: f32,
        tube: f32,
        pose: Pose,
        config: &RigidBodyConfig,
    ) -> Result<(EntityId, BodyHandle)> {
        let descriptor = ShapeDescriptor::torus(radius, tube);
        self.spawn_with_body(scene, "torus", Geometry::Torus { radius, tube }, &descriptor, pose, config)
    }

    /// Spawn a mesh entity with a convex hull body.
    pub fn add_convex<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        mesh: MeshData,
        pose: Pose,
        config: &RigidBodyConfig,
    ) -> Result<(EntityId, BodyHandle)> {
        let descriptor = ShapeDescriptor::convex_hull(mesh.positions.clone());
        self.spawn_with_body(scene, "convex", Geometry::Mesh(mesh), &descriptor, pose, config)
    }

    /// Spawn a mesh entity with an exact triangle mesh body.
    ///
    /// Triangle meshes only collide as static bodies, so `config.mass` must
    /// be zero.
    pub fn add_concave<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        mesh: MeshData,
        pose: Pose,
        config: &RigidBodyConfig,
    ) -> Result<(EntityId, BodyHandle)> {
        let descriptor = ShapeDescriptor::concave_mesh(mesh.positions.clone(), mesh.triangles());
        self.spawn_with_body(scene, "concave", Geometry::Mesh(mesh), &descriptor, pose, config)
    }

    /// Spawn a prism extruded from a 2D outline, with a convex hull body.
    ///
    /// The outline lies in the entity's XY plane and is pushed `depth` along
    /// +Z. Caps are fanned from the first point, so the visual mesh is only
    /// exact for convex outlines; the body is the hull either way.
    pub fn add_extrude<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        outline: &[Vec2],
        depth: f32,
        pose: Pose,
        config: &RigidBodyConfig,
    ) -> Result<(EntityId, BodyHandle)> {
        let mesh = extrude_outline(outline, depth)?;
        let descriptor = ShapeDescriptor::convex_hull(mesh.positions.clone());
        self.spawn_with_body(scene, "extrude", Geometry::Mesh(mesh), &descriptor, pose, config)
    }

    /// Give an entity already in the scene a body.
    ///
    /// The shape comes from `options.shape` when set, else from the entity's
    /// declared geometry, else a unit box.
    pub fn add_existing<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &S,
        entity: EntityId,
        options: &ExistingOptions,
    ) -> Result<BodyHandle> {
        let pose = scene.pose(entity).ok_or(PhysicsError::NotFound)?;
        let geometry = scene.geometry(entity);
        let descriptor = match &options.shape {
            Some(name) => {
                let kind = name.parse::<ShapeKind>().inspect_err(|_| {
                    tracing::warn!(shape = %name, ?entity, "could not recognize shape");
                })?;
                ShapeDescriptor::for_kind(kind, geometry)?
            }
            None => ShapeDescriptor::infer_from_geometry(geometry),
        }
        .with_dimensions(&options.dimensions)
        .with_auto_center(options.auto_center);
        self.create_body(entity, &descriptor, &options.config, pose)
    }

    fn spawn_with_body<S: SceneGraph + ?Sized>(
        &mut self,
        scene: &mut S,
        name: &str,
        geometry: Geometry,
        descriptor: &ShapeDescriptor,
        pose: Pose,
        config: &RigidBodyConfig,
    ) -> Result<(EntityId, BodyHandle)> {
        let entity = scene.spawn(SceneEntity::new(name).with_pose(pose).with_geometry(geometry));
        match self.create_body(entity, descriptor, config, pose) {
            Ok(handle) => Ok((entity, handle)),
            Err(err) => {
                scene.despawn(entity);
                Err(err)
            }
        }
    }
}

/// Prism mesh from an outline: back cap at z = 0, front cap at z = `depth`.
fn extrude_outline(outline: &[Vec2], depth: f32) -> Result<MeshData> {
    if outline.len() < 3 {
        return Err(PhysicsError::dimensions(
            "extrude",
            format!("outline needs at least 3 points, got {}", outline.len()),
        ));
    }
    if !depth.is_finite() || depth <= 0.0 {
        return Err(PhysicsError::dimensions(
            "extrude",
            format!("depth must be positive, got {}", depth),
        ));
    }
    if outline.iter().any(|p| !p.is_finite()) {
        return Err(PhysicsError::dimensions("extrude", "outline must be finite"));
    }

    let n = outline.len() as u32;
    let positions = outline
        .iter()
        .map(|p| p.extend(0.0))
        .chain(outline.iter().map(|p| p.extend(depth)))
        .collect();

    let mut indices = Vec::with_capacity((n as usize - 2) * 6 + n as usize * 6);
    for i in 1..n - 1 {
        indices.extend([0, i + 1, i]);
        indices.extend([n, n + i, n + i + 1]);
    }
    for i in 0..n {
        let j = (i + 1) % n;
        indices.extend([i, j, n + j, i, n + j, n + i]);
    }
    Ok(MeshData::new(positions, indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collider::Collider;
    use crate::events::CollisionEventKind;
    use crate::scene::Scene;
    use std::cell::RefCell;
    use std::rc::Rc;

    const FRAME_MS: f32 = 1000.0 / 60.0;

    fn ground(physics: &mut ScenePhysics, scene: &mut Scene) -> BodyHandle {
        physics
            .add_ground(scene, 50.0, 1.0, 50.0, Pose::IDENTITY)
            .unwrap()
            .1
    }

    fn drop_box(physics: &mut ScenePhysics, scene: &mut Scene, y: f32) -> (EntityId, BodyHandle) {
        physics
            .add_box(
                scene,
                1.0,
                1.0,
                1.0,
                Pose::from_position(Vec3::new(0.0, y, 0.0)),
                &RigidBodyConfig::default(),
            )
            .unwrap()
    }

    fn run(physics: &mut ScenePhysics, scene: &mut Scene, frames: usize) -> Vec<CollisionEvent> {
        (0..frames)
            .flat_map(|_| physics.step(scene, FRAME_MS))
            .collect()
    }

    fn count(events: &[CollisionEvent], kind: CollisionEventKind, pair: PairKey) -> usize {
        events
            .iter()
            .filter(|e| e.kind == kind && e.pair() == Some(pair))
            .count()
    }

    #[test]
    fn test_box_settles_on_ground() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        let ground = ground(&mut physics, &mut scene);
        let (entity, body) = drop_box(&mut physics, &mut scene, 10.0);

        let events = run(&mut physics, &mut scene, 300);

        let y = scene.entity(entity).unwrap().pose.position.y;
        assert!((y - 1.0).abs() < 0.05, "box rests at {}", y);
        let pair = PairKey::new(body, ground).unwrap();
        assert_eq!(count(&events, CollisionEventKind::Start, pair), 1);
        assert_eq!(count(&events, CollisionEventKind::End, pair), 0);
        assert!(count(&events, CollisionEventKind::Collision, pair) > 0);
    }

    #[test]
    fn test_two_box_stack_settles() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        ground(&mut physics, &mut scene);
        let (lower, _) = drop_box(&mut physics, &mut scene, 1.0);
        let (upper, _) = drop_box(&mut physics, &mut scene, 2.1);

        run(&mut physics, &mut scene, 300);

        let y = |entity| scene.entity(entity).unwrap().pose.position.y;
        assert!((y(lower) - 1.0).abs() < 0.05, "lower box at {}", y(lower));
        assert!((y(upper) - 2.0).abs() < 0.05, "upper box at {}", y(upper));
    }

    #[test]
    fn test_crossed_bars_rest_on_each_other() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        ground(&mut physics, &mut scene);
        physics
            .add_box(
                &mut scene,
                4.0,
                0.5,
                0.5,
                Pose::from_position(Vec3::new(0.0, 0.75, 0.0)),
                &RigidBodyConfig::fixed(),
            )
            .unwrap();
        let (bar, _) = physics
            .add_box(
                &mut scene,
                0.5,
                0.5,
                4.0,
                Pose::from_position(Vec3::new(0.0, 2.0, 0.0)),
                &RigidBodyConfig::default(),
            )
            .unwrap();

        run(&mut physics, &mut scene, 300);

        let y = scene.entity(bar).unwrap().pose.position.y;
        assert!((y - 1.25).abs() < 0.05, "bar rests at {}", y);
    }

    #[test]
    fn test_huge_delta_does_not_tunnel() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        ground(&mut physics, &mut scene);
        let (entity, body) = drop_box(&mut physics, &mut scene, 3.0);
        physics.set_velocity(body, Vec3::new(0.0, -150.0, 0.0)).unwrap();

        for _ in 0..20 {
            physics.step(&mut scene, 10_000.0);
            assert_eq!(physics.stepper().last_substeps(), 4);
        }
        let y = scene.entity(entity).unwrap().pose.position.y;
        assert!(y > 0.5, "box fell through to {}", y);
    }

    #[test]
    fn test_lifecycle_start_collision_end() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        let ground = ground(&mut physics, &mut scene);
        let (_, ball) = physics
            .add_sphere(
                &mut scene,
                0.5,
                Pose::from_position(Vec3::new(0.0, 1.2, 0.0)),
                &RigidBodyConfig::default(),
            )
            .unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        physics
            .register_collision_listener(ball, ground, move |e, _| {
                sink.borrow_mut().push((e.kind, e.body_a));
            })
            .unwrap();

        run(&mut physics, &mut scene, 60);
        physics.apply_impulse(ball, Vec3::Y * 15.0).unwrap();
        run(&mut physics, &mut scene, 30);

        let seen = seen.borrow();
        assert_eq!(seen.first(), Some(&(CollisionEventKind::Start, ball)));
        assert!(seen.iter().all(|&(_, a)| a == ball));
        assert!(seen.iter().any(|&(k, _)| k == CollisionEventKind::Collision));
        assert_eq!(seen.last().map(|e| e.0), Some(CollisionEventKind::End));

        // Never two starts without an end between.
        let mut touching = false;
        for &(kind, _) in seen.iter() {
            match kind {
                CollisionEventKind::Start => {
                    assert!(!touching);
                    touching = true;
                }
                CollisionEventKind::Collision => assert!(touching),
                CollisionEventKind::End => {
                    assert!(touching);
                    touching = false;
                }
            }
        }
    }

    #[test]
    fn test_destroy_mid_contact_suppresses_end() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        let ground = ground(&mut physics, &mut scene);
        let (entity, body) = drop_box(&mut physics, &mut scene, 1.0);

        let events = run(&mut physics, &mut scene, 10);
        let pair = PairKey::new(body, ground).unwrap();
        assert_eq!(count(&events, CollisionEventKind::Start, pair), 1);

        assert!(physics.destroy_body(body));
        assert!(!physics.destroy_body(body));
        let events = run(&mut physics, &mut scene, 10);
        assert!(events.iter().all(|e| e.pair() != Some(pair)));
        assert!(!physics.events().is_touching(pair));

        // The entity outlives its body and can be given a new one.
        assert_eq!(physics.body_of(entity), Err(PhysicsError::NotFound));
        let again = physics
            .add_existing(&scene, entity, &ExistingOptions::default())
            .unwrap();
        assert_ne!(again, body);
    }

    #[test]
    fn test_listener_defers_destroy() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        ground(&mut physics, &mut scene);
        let (_, body) = drop_box(&mut physics, &mut scene, 1.0);

        physics.register_body_listener(body, |e, deferred| {
            if e.kind == CollisionEventKind::Start {
                deferred.destroy_body(e.body_a);
            }
        })
        .unwrap();

        let events = run(&mut physics, &mut scene, 5);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, CollisionEventKind::Start);
        assert!(!physics.bodies().contains(body));
        assert_eq!(physics.events().listener_count(), 0);
    }

    #[test]
    fn test_already_has_body() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        let (entity, body) = drop_box(&mut physics, &mut scene, 0.0);
        let err = physics
            .add_existing(&scene, entity, &ExistingOptions::default())
            .unwrap_err();
        assert_eq!(err, PhysicsError::AlreadyHasBody(entity));
        assert_eq!(physics.body_of(entity), Ok(body));
        assert_eq!(physics.entity_of(body), Ok(entity));
    }

    #[test]
    fn test_failed_add_despawns_entity() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        let err = physics
            .add_sphere(&mut scene, -1.0, Pose::IDENTITY, &RigidBodyConfig::default())
            .unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidDimensions { .. }));
        assert!(scene.is_empty());

        let mesh = MeshData::new(
            vec![Vec3::ZERO, Vec3::X, Vec3::Z],
            vec![0, 1, 2],
        );
        let err = physics
            .add_concave(&mut scene, mesh, Pose::IDENTITY, &RigidBodyConfig::default())
            .unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidMassForShape { .. }));
        assert!(scene.is_empty());
        assert!(physics.bodies().is_empty());
    }

    #[test]
    fn test_add_existing_shape_override() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        let entity = scene.spawn(
            SceneEntity::new("ball").with_geometry(Geometry::Sphere { radius: 2.0 }),
        );

        let err = physics
            .add_existing(&scene, entity, &ExistingOptions::default().with_shape("blob"))
            .unwrap_err();
        assert_eq!(err, PhysicsError::UnknownShapeKind("blob".to_string()));

        let body = physics
            .add_existing(
                &scene,
                entity,
                &ExistingOptions::default()
                    .with_shape_kind(ShapeKind::Sphere)
                    .with_mass(2.0),
            )
            .unwrap();
        assert_eq!(physics.body(body).unwrap().mass, 2.0);
        assert_eq!(
            physics.add_existing(&scene, EntityId(99), &ExistingOptions::default()),
            Err(PhysicsError::NotFound)
        );
    }

    #[test]
    fn test_add_existing_dimensions_and_offset() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::new(SimulationConfig::default().with_gravity(Vec3::ZERO));
        let entity = scene.spawn(
            SceneEntity::new("crate").with_pose(Pose::from_position(Vec3::new(1.0, 2.0, 3.0))),
        );

        let body = physics
            .add_existing(
                &scene,
                entity,
                &ExistingOptions::default()
                    .with_shape_kind(ShapeKind::Box)
                    .with_size(2.0, 1.0, 0.5)
                    .with_offset(Vec3::Y),
            )
            .unwrap();
        let rb = physics.body(body).unwrap();
        assert!(matches!(
            rb.collider,
            Collider::Box { half_extents } if half_extents == Vec3::new(1.0, 0.5, 0.25)
        ));
        assert!((rb.position - Vec3::new(1.0, 3.0, 3.0)).length() < 1e-6);

        // Write-back restores the entity origin.
        physics.step(&mut scene, FRAME_MS * 2.0);
        let pose = scene.entity(entity).unwrap().pose;
        assert!((pose.position - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
        assert_eq!(physics.body_pose(body).unwrap().position, pose.position);

        let ball = scene.spawn(SceneEntity::new("ball").with_geometry(Geometry::Sphere { radius: 2.0 }));
        let body = physics
            .add_existing(&scene, ball, &ExistingOptions::default().with_radius(0.25))
            .unwrap();
        assert!(matches!(
            physics.body(body).unwrap().collider,
            Collider::Sphere { radius } if radius == 0.25
        ));
    }

    #[test]
    fn test_add_extrude() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        let outline = [
            Vec2::new(-0.5, -0.5),
            Vec2::new(0.5, -0.5),
            Vec2::new(0.5, 0.5),
            Vec2::new(-0.5, 0.5),
        ];
        let (entity, body) = physics
            .add_extrude(&mut scene, &outline, 2.0, Pose::IDENTITY, &RigidBodyConfig::default())
            .unwrap();

        let Some(Geometry::Mesh(mesh)) = &scene.entity(entity).unwrap().geometry else {
            panic!("extrude should carry mesh geometry");
        };
        assert_eq!(mesh.positions.len(), 8);
        assert_eq!(mesh.triangles().len(), 12);
        let rb = physics.body(body).unwrap();
        assert!(matches!(rb.collider, Collider::ConvexHull(_)));
        // Hull re-centered on its bounds, halfway along the extrusion.
        assert!((rb.position - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-5);

        let err = physics
            .add_extrude(&mut scene, &outline[..2], 1.0, Pose::IDENTITY, &RigidBodyConfig::default())
            .unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidDimensions { shape: "extrude", .. }));
        let err = physics
            .add_extrude(&mut scene, &outline, 0.0, Pose::IDENTITY, &RigidBodyConfig::default())
            .unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidDimensions { .. }));
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_constraints_follow_bodies() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        let (_, a) = drop_box(&mut physics, &mut scene, 5.0);
        let (_, b) = drop_box(&mut physics, &mut scene, 7.0);
        let (_, c) = drop_box(&mut physics, &mut scene, 9.0);

        let ab = physics.add_constraint(a, b, &ConstraintParams::Fixed).unwrap();
        let bc = physics
            .add_constraint(b, c, &ConstraintParams::spring(50.0, 1.0))
            .unwrap();
        assert_eq!(physics.constraint_kind(bc), Some(ConstraintKind::Spring));

        physics.destroy_body(c);
        assert_eq!(
            physics.add_constraint(a, c, &ConstraintParams::Fixed),
            Err(PhysicsError::UnknownBody(c))
        );
        assert_eq!(physics.constraint_kind(bc), None);
        assert!(!physics.remove_constraint(bc));
        assert!(physics.remove_constraint(ab));
        assert!(physics.constraints().is_empty());
        assert_eq!(physics.world().joint_count(), 0);
    }

    #[test]
    fn test_listener_rejections() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::default();
        let (_, a) = drop_box(&mut physics, &mut scene, 0.0);
        let (_, b) = drop_box(&mut physics, &mut scene, 3.0);
        physics.destroy_body(b);

        assert_eq!(
            physics.register_collision_listener(a, a, |_, _| {}),
            Err(PhysicsError::SelfPair(a))
        );
        assert_eq!(
            physics.register_collision_listener(a, b, |_, _| {}),
            Err(PhysicsError::UnknownBody(b))
        );
        let id = physics.register_global_listener(|_, _| {});
        assert!(physics.unregister_collision_listener(id));
        assert!(!physics.unregister_collision_listener(id));
    }

    #[test]
    fn test_body_api() {
        let mut scene = Scene::new();
        let mut physics = ScenePhysics::new(SimulationConfig::default().with_gravity(Vec3::ZERO));
        let (_, body) = drop_box(&mut physics, &mut scene, 0.0);

        physics.set_velocity(body, Vec3::X).unwrap();
        physics.set_angular_velocity(body, Vec3::Y).unwrap();
        assert_eq!(physics.velocity(body), Ok(Vec3::X));
        assert_eq!(physics.angular_velocity(body), Ok(Vec3::Y));

        physics.apply_impulse(body, Vec3::X).unwrap();
        assert_eq!(physics.velocity(body), Ok(Vec3::X * 2.0));

        physics.step(&mut scene, 1000.0 / 60.0 * 1.5);
        assert!(physics.body_pose(body).unwrap().position.x > 0.0);

        physics.set_gravity(Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(physics.gravity(), Vec3::new(0.0, -1.0, 0.0));

        physics.destroy_body(body);
        assert_eq!(physics.velocity(body), Err(PhysicsError::UnknownBody(body)));
        assert_eq!(physics.wake(body), Err(PhysicsError::UnknownBody(body)));
    }

    #[test]
    fn test_debug_draw_settings() {
        let mut physics = ScenePhysics::default();
        assert!(!physics.debug_draw().is_enabled());
        physics.debug_draw_mut().enable();
        physics
            .debug_draw_mut()
            .set_mode(DebugDrawMode::WIREFRAME | DebugDrawMode::CONTACTS);
        let settings = physics.debug_draw();
        assert!(settings.is_enabled());
        assert!(settings.mode().contains(DebugDrawMode::CONTACTS));
        assert!(!settings.mode().contains(DebugDrawMode::BOUNDS));
        physics.debug_draw_mut().disable();
        assert!(!physics.debug_draw().is_enabled());
    }
}
