//! Shape descriptors and their conversion to colliders.
//!
//! A [`ShapeDescriptor`] is the engine-independent description of a collision
//! shape: a primitive kind with dimensions, or raw mesh data. The
//! [`ShapeFactory`] validates it and builds the simulator-native
//! [`Collider`], re-centering mesh data on request.

use std::fmt;
use std::str::FromStr;

use glam::{Quat, Vec3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::collider::{CYLINDER_SEGMENTS, Collider, CompoundChild, TriMesh, points_bounds};
use crate::error::{PhysicsError, Result};
use crate::hull::ConvexHull;
use crate::scene::Geometry;

/// Default contact margin applied to every shape.
pub const DEFAULT_MARGIN: f32 = 0.05;

/// Upper bound on spheres in a torus ring. A tube too thin to close the ring
/// within this many overlapping spheres is rejected.
pub const MAX_TORUS_SEGMENTS: u32 = 1024;

/// Default number of spheres in a torus ring.
pub const DEFAULT_TORUS_SEGMENTS: u32 = 16;

// ============================================================================
// Shape Kinds
// ============================================================================

/// Kind of collision shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeKind {
    /// Box.
    Box,
    /// Sphere.
    Sphere,
    /// Cylinder (or truncated cone).
    Cylinder,
    /// Torus.
    Torus,
    /// Convex envelope of a point cloud.
    ConvexHull,
    /// Exact triangle mesh, static bodies only.
    ConcaveMesh,
}

impl ShapeKind {
    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            ShapeKind::Box => "box",
            ShapeKind::Sphere => "sphere",
            ShapeKind::Cylinder => "cylinder",
            ShapeKind::Torus => "torus",
            ShapeKind::ConvexHull => "convex",
            ShapeKind::ConcaveMesh => "concave",
        }
    }
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShapeKind {
    type Err = PhysicsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "box" => Ok(ShapeKind::Box),
            "sphere" => Ok(ShapeKind::Sphere),
            "cylinder" => Ok(ShapeKind::Cylinder),
            "torus" => Ok(ShapeKind::Torus),
            "convex" | "hull" => Ok(ShapeKind::ConvexHull),
            "concave" | "mesh" => Ok(ShapeKind::ConcaveMesh),
            _ => Err(PhysicsError::UnknownShapeKind(s.to_string())),
        }
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Shape parameters, one variant per [`ShapeKind`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeParams {
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
    /// Cylinder along Y. Unequal radii give a truncated cone.
    Cylinder {
        /// Radius at +Y.
        radius_top: f32,
        /// Radius at -Y.
        radius_bottom: f32,
        /// Full height.
        height: f32,
    },
    /// Torus in the XZ plane.
    Torus {
        /// Ring radius.
        radius: f32,
        /// Tube radius.
        tube: f32,
        /// Minimum number of spheres around the ring.
        segments: u32,
    },
    /// Convex envelope of the given points.
    ConvexHull {
        /// Point cloud.
        vertices: Vec<Vec3>,
    },
    /// Triangle mesh.
    ConcaveMesh {
        /// Vertex positions.
        vertices: Vec<Vec3>,
        /// Triangle indices.
        indices: Vec<[u32; 3]>,
    },
}

/// Dimension overrides merged into a descriptor's primitive parameters.
///
/// Each field replaces the matching parameter where the shape has one:
/// `radius` sets a sphere's radius, both cylinder radii and a torus ring
/// radius; `height` applies to boxes and cylinders. Mesh shapes ignore all
/// of them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeDimensions {
    /// Extent along X.
    pub width: Option<f32>,
    /// Extent along Y.
    pub height: Option<f32>,
    /// Extent along Z.
    pub depth: Option<f32>,
    /// Radius.
    pub radius: Option<f32>,
}

impl ShapeDimensions {
    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Immutable description of a collision shape.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeDescriptor {
    /// Shape parameters.
    pub params: ShapeParams,
    /// Contact margin; the factory default when `None`.
    pub margin: Option<f32>,
    /// Re-center mesh vertices before building (mesh shapes only).
    pub auto_center: bool,
}

impl ShapeDescriptor {
    fn from_params(params: ShapeParams) -> Self {
        Self {
            params,
            margin: None,
            auto_center: true,
        }
    }

    /// Box from full extents.
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        Self::from_params(ShapeParams::Box {
            width,
            height,
            depth,
        })
    }

    /// Sphere.
    pub fn sphere(radius: f32) -> Self {
        Self::from_params(ShapeParams::Sphere { radius })
    }

    /// Cylinder or truncated cone along Y.
    pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32) -> Self {
        Self::from_params(ShapeParams::Cylinder {
            radius_top,
            radius_bottom,
            height,
        })
    }

    /// Torus with the default segment count.
    pub fn torus(radius: f32, tube: f32) -> Self {
        Self::from_params(ShapeParams::Torus {
            radius,
            tube,
            segments: DEFAULT_TORUS_SEGMENTS,
        })
    }

    /// Convex hull of a point cloud.
    pub fn convex_hull(vertices: Vec<Vec3>) -> Self {
        Self::from_params(ShapeParams::ConvexHull { vertices })
    }

    /// Exact triangle mesh.
    pub fn concave_mesh(vertices: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        Self::from_params(ShapeParams::ConcaveMesh { vertices, indices })
    }

    /// Override the contact margin.
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.margin = Some(margin);
        self
    }

    /// Enable or disable mesh re-centering.
    pub fn with_auto_center(mut self, auto_center: bool) -> Self {
        self.auto_center = auto_center;
        self
    }

    /// Merge dimension overrides into the primitive parameters.
    pub fn with_dimensions(mut self, dims: &ShapeDimensions) -> Self {
        match &mut self.params {
            ShapeParams::Box {
                width,
                height,
                depth,
            } => {
                *width = dims.width.unwrap_or(*width);
                *height = dims.height.unwrap_or(*height);
                *depth = dims.depth.unwrap_or(*depth);
            }
            ShapeParams::Sphere { radius } => *radius = dims.radius.unwrap_or(*radius),
            ShapeParams::Cylinder {
                radius_top,
                radius_bottom,
                height,
            } => {
                if let Some(r) = dims.radius {
                    *radius_top = r;
                    *radius_bottom = r;
                }
                *height = dims.height.unwrap_or(*height);
            }
            ShapeParams::Torus { radius, .. } => *radius = dims.radius.unwrap_or(*radius),
            ShapeParams::ConvexHull { .. } | ShapeParams::ConcaveMesh { .. } => {}
        }
        self
    }

    /// Kind of this shape.
    pub fn kind(&self) -> ShapeKind {
        match self.params {
            ShapeParams::Box { .. } => ShapeKind::Box,
            ShapeParams::Sphere { .. } => ShapeKind::Sphere,
            ShapeParams::Cylinder { .. } => ShapeKind::Cylinder,
            ShapeParams::Torus { .. } => ShapeKind::Torus,
            ShapeParams::ConvexHull { .. } => ShapeKind::ConvexHull,
            ShapeParams::ConcaveMesh { .. } => ShapeKind::ConcaveMesh,
        }
    }

    /// Derive a descriptor from an entity's declared geometry.
    ///
    /// Meshes become convex hulls; entities without geometry get a unit box.
    pub fn infer_from_geometry(geometry: Option<&Geometry>) -> Self {
        match geometry {
            None => Self::cuboid(1.0, 1.0, 1.0),
            Some(Geometry::Box {
                width,
                height,
                depth,
            }) => Self::cuboid(*width, *height, *depth),
            Some(Geometry::Sphere { radius }) => Self::sphere(*radius),
            Some(Geometry::Cylinder {
                radius_top,
                radius_bottom,
                height,
            }) => Self::cylinder(*radius_top, *radius_bottom, *height),
            Some(Geometry::Torus { radius, tube }) => Self::torus(*radius, *tube),
            Some(Geometry::Mesh(mesh)) => Self::convex_hull(mesh.positions.clone()),
        }
    }

    /// Build a descriptor of a forced kind, taking dimensions from the
    /// geometry when it matches and falling back to unit defaults.
    ///
    /// Mesh kinds need mesh geometry.
    pub fn for_kind(kind: ShapeKind, geometry: Option<&Geometry>) -> Result<Self> {
        let desc = match (kind, geometry) {
            (ShapeKind::Box, Some(Geometry::Box { .. }))
            | (ShapeKind::Sphere, Some(Geometry::Sphere { .. }))
            | (ShapeKind::Cylinder, Some(Geometry::Cylinder { .. }))
            | (ShapeKind::Torus, Some(Geometry::Torus { .. }))
            | (ShapeKind::ConvexHull, Some(Geometry::Mesh(_))) => {
                Self::infer_from_geometry(geometry)
            }
            (ShapeKind::Box, _) => Self::cuboid(1.0, 1.0, 1.0),
            (ShapeKind::Sphere, _) => Self::sphere(0.5),
            (ShapeKind::Cylinder, _) => Self::cylinder(0.5, 0.5, 1.0),
            (ShapeKind::Torus, _) => Self::torus(1.0, 0.4),
            (ShapeKind::ConcaveMesh, Some(Geometry::Mesh(mesh))) => {
                Self::concave_mesh(mesh.positions.clone(), mesh.triangles())
            }
            (ShapeKind::ConvexHull | ShapeKind::ConcaveMesh, _) => {
                return Err(PhysicsError::DegenerateGeometry(format!(
                    "{} shape needs mesh geometry",
                    kind
                )));
            }
        };
        Ok(desc)
    }
}

// ============================================================================
// Factory
// ============================================================================

/// A collider ready to attach to a body.
#[derive(Debug, Clone)]
pub struct BuiltShape {
    /// Simulator shape.
    pub collider: Collider,
    /// Contact margin.
    pub margin: f32,
    /// Body-space offset of the shape origin from the entity origin.
    pub center_offset: Vec3,
}

/// Builds simulator shapes from descriptors.
#[derive(Debug, Clone, Copy)]
pub struct ShapeFactory {
    /// Margin used when a descriptor does not set one.
    pub default_margin: f32,
}

impl Default for ShapeFactory {
    fn default() -> Self {
        Self {
            default_margin: DEFAULT_MARGIN,
        }
    }
}

impl ShapeFactory {
    /// Create a factory with a custom default margin.
    pub fn new(default_margin: f32) -> Self {
        Self { default_margin }
    }

    /// Build a shape for a body of the given mass.
    ///
    /// Concave meshes only work on static bodies.
    pub fn build_for_body(&self, desc: &ShapeDescriptor, mass: f32) -> Result<BuiltShape> {
        if !mass.is_finite() || mass < 0.0 || (mass > 0.0 && desc.kind() == ShapeKind::ConcaveMesh) {
            return Err(PhysicsError::InvalidMassForShape {
                shape: desc.kind().name(),
                mass,
            });
        }
        self.build(desc)
    }

    /// Validate a descriptor and build its collider.
    pub fn build(&self, desc: &ShapeDescriptor) -> Result<BuiltShape> {
        let shape = desc.kind().name();
        let margin = desc.margin.unwrap_or(self.default_margin);
        if !margin.is_finite() || margin < 0.0 {
            return Err(PhysicsError::dimensions(
                shape,
                format!("margin must be non-negative, got {}", margin),
            ));
        }

        let mut center_offset = Vec3::ZERO;
        let collider = match &desc.params {
            ShapeParams::Box {
                width,
                height,
                depth,
            } => {
                positive(shape, "width", *width)?;
                positive(shape, "height", *height)?;
                positive(shape, "depth", *depth)?;
                Collider::box_shape(Vec3::new(*width, *height, *depth) * 0.5)
            }
            ShapeParams::Sphere { radius } => {
                positive(shape, "radius", *radius)?;
                Collider::sphere(*radius)
            }
            ShapeParams::Cylinder {
                radius_top,
                radius_bottom,
                height,
            } => build_cylinder(*radius_top, *radius_bottom, *height)?,
            ShapeParams::Torus {
                radius,
                tube,
                segments,
            } => build_torus(*radius, *tube, *segments)?,
            ShapeParams::ConvexHull { vertices } => {
                let (points, offset) = recenter(vertices, desc.auto_center);
                center_offset = offset;
                let hull = ConvexHull::from_points(&points).ok_or_else(|| {
                    PhysicsError::DegenerateGeometry(
                        "convex hull needs at least four non-coplanar points".to_string(),
                    )
                })?;
                Collider::ConvexHull(hull)
            }
            ShapeParams::ConcaveMesh { vertices, indices } => {
                if vertices.iter().any(|v| !v.is_finite()) {
                    return Err(PhysicsError::DegenerateGeometry(
                        "mesh has non-finite vertices".to_string(),
                    ));
                }
                let (points, offset) = recenter(vertices, desc.auto_center);
                center_offset = offset;
                let mesh = TriMesh::new(points, indices).ok_or_else(|| {
                    PhysicsError::DegenerateGeometry(
                        "mesh has out-of-range indices or no triangle with area".to_string(),
                    )
                })?;
                Collider::TriMesh(mesh)
            }
        };

        Ok(BuiltShape {
            collider,
            margin,
            center_offset,
        })
    }
}

fn positive(shape: &'static str, name: &str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PhysicsError::dimensions(
            shape,
            format!("{} must be positive, got {}", name, value),
        ))
    }
}

fn build_cylinder(radius_top: f32, radius_bottom: f32, height: f32) -> Result<Collider> {
    positive("cylinder", "height", height)?;
    for (name, r) in [("radius_top", radius_top), ("radius_bottom", radius_bottom)] {
        if !r.is_finite() || r < 0.0 {
            return Err(PhysicsError::dimensions(
                "cylinder",
                format!("{} must be non-negative, got {}", name, r),
            ));
        }
    }
    positive("cylinder", "largest radius", radius_top.max(radius_bottom))?;

    let half_height = height * 0.5;
    if radius_top == radius_bottom {
        return Ok(Collider::cylinder(radius_top, half_height));
    }

    // Truncated cone: hull of both rims.
    let mut points = Vec::with_capacity(CYLINDER_SEGMENTS * 2);
    for i in 0..CYLINDER_SEGMENTS {
        let angle = i as f32 / CYLINDER_SEGMENTS as f32 * std::f32::consts::TAU;
        let (s, c) = angle.sin_cos();
        points.push(Vec3::new(c * radius_top, half_height, s * radius_top));
        points.push(Vec3::new(c * radius_bottom, -half_height, s * radius_bottom));
    }
    ConvexHull::from_points(&points)
        .map(Collider::ConvexHull)
        .ok_or_else(|| PhysicsError::DegenerateGeometry("cylinder rims are degenerate".to_string()))
}

/// Ring of spheres approximating a torus.
///
/// Sphere spacing along the ring never exceeds the tube radius, so neighbors
/// always overlap. Fails if that takes more than [`MAX_TORUS_SEGMENTS`].
fn build_torus(radius: f32, tube: f32, segments: u32) -> Result<Collider> {
    positive("torus", "radius", radius)?;
    positive("torus", "tube", tube)?;

    let needed = (std::f32::consts::TAU * radius / tube).ceil();
    if needed > MAX_TORUS_SEGMENTS as f32 {
        tracing::warn!(radius, tube, "torus tube too thin for its ring");
        return Err(PhysicsError::dimensions(
            "torus",
            format!(
                "tube {} needs {} spheres around radius {}, limit is {}",
                tube, needed, radius, MAX_TORUS_SEGMENTS
            ),
        ));
    }
    let count = segments.clamp(3, MAX_TORUS_SEGMENTS).max(needed as u32);
    let children = (0..count)
        .map(|i| {
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            let (s, c) = angle.sin_cos();
            CompoundChild {
                offset: Vec3::new(c * radius, 0.0, s * radius),
                rotation: Quat::IDENTITY,
                collider: Collider::sphere(tube),
            }
        })
        .collect();
    Ok(Collider::Compound(children))
}

/// Shift points so their bounds are centered on the origin.
fn recenter(points: &[Vec3], enabled: bool) -> (Vec<Vec3>, Vec3) {
    if !enabled || points.is_empty() {
        return (points.to_vec(), Vec3::ZERO);
    }
    let (min, max) = points_bounds(points);
    let center = (min + max) * 0.5;
    if !center.is_finite() {
        return (points.to_vec(), Vec3::ZERO);
    }
    (points.iter().map(|p| *p - center).collect(), center)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MeshData;

    fn cube(offset: Vec3) -> Vec<Vec3> {
        let mut pts = Vec::new();
        for x in [-1.0, 1.0] {
            for y in [-1.0, 1.0] {
                for z in [-1.0, 1.0] {
                    pts.push(Vec3::new(x, y, z) + offset);
                }
            }
        }
        pts
    }

    #[test]
    fn test_box_dimensions_and_default_margin() {
        let built = ShapeFactory::default()
            .build(&ShapeDescriptor::cuboid(2.0, 1.0, 4.0))
            .unwrap();
        assert_eq!(built.margin, DEFAULT_MARGIN);
        match built.collider {
            Collider::Box { half_extents } => {
                assert_eq!(half_extents, Vec3::new(1.0, 0.5, 2.0));
            }
            other => panic!("expected box, got {:?}", other),
        }
    }

    #[test]
    fn test_margin_override() {
        let built = ShapeFactory::default()
            .build(&ShapeDescriptor::sphere(1.0).with_margin(0.2))
            .unwrap();
        assert_eq!(built.margin, 0.2);

        let err = ShapeFactory::default()
            .build(&ShapeDescriptor::sphere(1.0).with_margin(-0.1))
            .unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidDimensions { .. }));
    }

    #[test]
    fn test_invalid_dimensions() {
        let factory = ShapeFactory::default();
        for desc in [
            ShapeDescriptor::cuboid(1.0, 0.0, 1.0),
            ShapeDescriptor::sphere(-1.0),
            ShapeDescriptor::sphere(f32::NAN),
            ShapeDescriptor::cylinder(1.0, 1.0, 0.0),
            ShapeDescriptor::cylinder(0.0, 0.0, 1.0),
            ShapeDescriptor::torus(1.0, f32::INFINITY),
        ] {
            let err = factory.build(&desc).unwrap_err();
            assert!(
                matches!(err, PhysicsError::InvalidDimensions { .. }),
                "{:?} gave {:?}",
                desc,
                err
            );
        }
    }

    #[test]
    fn test_cone_builds_hull() {
        let built = ShapeFactory::default()
            .build(&ShapeDescriptor::cylinder(0.0, 1.0, 2.0))
            .unwrap();
        assert!(matches!(built.collider, Collider::ConvexHull(_)));

        let built = ShapeFactory::default()
            .build(&ShapeDescriptor::cylinder(0.5, 0.5, 2.0))
            .unwrap();
        assert!(matches!(built.collider, Collider::Cylinder { .. }));
    }

    #[test]
    fn test_torus_spheres_overlap() {
        let built = ShapeFactory::default()
            .build(&ShapeDescriptor::torus(2.0, 0.5))
            .unwrap();
        let Collider::Compound(children) = built.collider else {
            panic!("torus should be compound");
        };
        assert!(children.len() >= 26);
        let gap = children[0].offset.distance(children[1].offset);
        assert!(gap < 2.0 * 0.5);
    }

    #[test]
    fn test_dimension_overrides() {
        let dims = ShapeDimensions {
            width: Some(2.0),
            radius: Some(0.25),
            ..ShapeDimensions::default()
        };
        let desc = ShapeDescriptor::cuboid(1.0, 1.0, 1.0).with_dimensions(&dims);
        assert_eq!(
            desc.params,
            ShapeParams::Box {
                width: 2.0,
                height: 1.0,
                depth: 1.0
            }
        );
        let desc = ShapeDescriptor::cylinder(1.0, 0.5, 3.0).with_dimensions(&dims);
        assert_eq!(
            desc.params,
            ShapeParams::Cylinder {
                radius_top: 0.25,
                radius_bottom: 0.25,
                height: 3.0
            }
        );
        let hull = ShapeDescriptor::convex_hull(cube(Vec3::ZERO));
        assert_eq!(hull.clone().with_dimensions(&dims), hull);
        assert!(ShapeDimensions::default().is_empty());
        assert!(!dims.is_empty());
    }

    #[test]
    fn test_thin_torus_keeps_neighbors_overlapping() {
        let built = ShapeFactory::default()
            .build(&ShapeDescriptor::torus(10.0, 0.2))
            .unwrap();
        let Collider::Compound(children) = built.collider else {
            panic!("torus should be compound");
        };
        assert!(children.len() > 64);
        for pair in children.windows(2) {
            let gap = pair[0].offset.distance(pair[1].offset);
            assert!(gap <= 0.2 + 1e-4, "gap {}", gap);
        }
        let closing = children[children.len() - 1].offset.distance(children[0].offset);
        assert!(closing <= 0.2 + 1e-4);

        let err = ShapeFactory::default()
            .build(&ShapeDescriptor::torus(100.0, 0.01))
            .unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidDimensions { shape: "torus", .. }));
    }

    #[test]
    fn test_convex_hull_auto_center() {
        let desc = ShapeDescriptor::convex_hull(cube(Vec3::new(3.0, 0.0, 0.0)));
        let built = ShapeFactory::default().build(&desc).unwrap();
        assert!((built.center_offset - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-6);
        let (min, max) = built.collider.local_bounds();
        assert!((min + max).length() < 1e-6);

        let built = ShapeFactory::default()
            .build(&desc.with_auto_center(false))
            .unwrap();
        assert_eq!(built.center_offset, Vec3::ZERO);
    }

    #[test]
    fn test_degenerate_hull() {
        let flat = vec![Vec3::ZERO, Vec3::X, Vec3::Z, Vec3::new(1.0, 0.0, 1.0)];
        let err = ShapeFactory::default()
            .build(&ShapeDescriptor::convex_hull(flat))
            .unwrap_err();
        assert!(matches!(err, PhysicsError::DegenerateGeometry(_)));
    }

    #[test]
    fn test_concave_mesh_rules() {
        let factory = ShapeFactory::default();
        let verts = vec![Vec3::ZERO, Vec3::X, Vec3::Z];
        let desc = ShapeDescriptor::concave_mesh(verts.clone(), vec![[0, 2, 1]]);

        assert!(factory.build_for_body(&desc, 0.0).is_ok());
        let err = factory.build_for_body(&desc, 1.0).unwrap_err();
        assert!(matches!(err, PhysicsError::InvalidMassForShape { .. }));

        let bad = ShapeDescriptor::concave_mesh(verts, vec![[0, 1, 9]]);
        assert!(matches!(
            factory.build(&bad).unwrap_err(),
            PhysicsError::DegenerateGeometry(_)
        ));
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("box".parse::<ShapeKind>().unwrap(), ShapeKind::Box);
        assert_eq!("Hull".parse::<ShapeKind>().unwrap(), ShapeKind::ConvexHull);
        assert_eq!("convex".parse::<ShapeKind>().unwrap(), ShapeKind::ConvexHull);
        assert_eq!("concave".parse::<ShapeKind>().unwrap(), ShapeKind::ConcaveMesh);
        assert_eq!(
            "blob".parse::<ShapeKind>().unwrap_err(),
            PhysicsError::UnknownShapeKind("blob".to_string())
        );
    }

    #[test]
    fn test_infer_from_geometry() {
        assert_eq!(
            ShapeDescriptor::infer_from_geometry(None),
            ShapeDescriptor::cuboid(1.0, 1.0, 1.0)
        );
        let sphere = Geometry::Sphere { radius: 2.0 };
        assert_eq!(
            ShapeDescriptor::infer_from_geometry(Some(&sphere)).kind(),
            ShapeKind::Sphere
        );
        let mesh = Geometry::Mesh(MeshData::new(cube(Vec3::ZERO), Vec::new()));
        assert_eq!(
            ShapeDescriptor::infer_from_geometry(Some(&mesh)).kind(),
            ShapeKind::ConvexHull
        );
    }

    #[test]
    fn test_for_kind_defaults() {
        let sphere = Geometry::Sphere { radius: 2.0 };
        let desc = ShapeDescriptor::for_kind(ShapeKind::Box, Some(&sphere)).unwrap();
        assert_eq!(desc, ShapeDescriptor::cuboid(1.0, 1.0, 1.0));

        let desc = ShapeDescriptor::for_kind(ShapeKind::Sphere, Some(&sphere)).unwrap();
        assert_eq!(desc, ShapeDescriptor::sphere(2.0));

        assert!(ShapeDescriptor::for_kind(ShapeKind::ConcaveMesh, None).is_err());
    }
}
