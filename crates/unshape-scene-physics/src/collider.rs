//! Simulator-native collision shapes.
//!
//! These are what [`crate::ShapeFactory`] produces and what the narrow phase
//! in [`crate::collision`] consumes. Every convex shape exposes a signed
//! distance function and a set of surface sample points. Spheres and
//! triangle meshes collide through those two queries; boxes, cylinders and
//! hulls against each other go through the separating axis test instead.

use glam::{Quat, Vec3};

use crate::hull::ConvexHull;

/// Number of rim points sampled on each cylinder cap, and side faces of the
/// prism a cylinder becomes in polytope contacts.
pub const CYLINDER_SEGMENTS: usize = 12;

/// Collision shape for rigid bodies.
#[derive(Clone, Debug)]
pub enum Collider {
    /// Sphere collider.
    Sphere {
        /// Radius of the sphere.
        radius: f32,
    },
    /// Oriented box collider.
    Box {
        /// Half-extents along each local axis.
        half_extents: Vec3,
    },
    /// Cylinder along the local Y axis.
    Cylinder {
        /// Radius of the cylinder.
        radius: f32,
        /// Half of the cylinder height.
        half_height: f32,
    },
    /// Convex polyhedron.
    ConvexHull(ConvexHull),
    /// Exact triangle mesh. Only valid on static bodies.
    TriMesh(TriMesh),
    /// Several shapes rigidly attached to one body.
    Compound(Vec<CompoundChild>),
}

/// A child shape of a [`Collider::Compound`].
#[derive(Clone, Debug)]
pub struct CompoundChild {
    /// Offset from the body origin in body space.
    pub offset: Vec3,
    /// Rotation relative to the body.
    pub rotation: Quat,
    /// Child shape. Nested compounds and meshes are not supported.
    pub collider: Collider,
}

/// Triangle mesh with precomputed face normals.
#[derive(Clone, Debug)]
pub struct TriMesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    normals: Vec<Vec3>,
}

impl TriMesh {
    /// Build a mesh, dropping zero-area triangles.
    ///
    /// Returns `None` if an index is out of range or no triangle has area.
    pub fn new(vertices: Vec<Vec3>, triangles: &[[u32; 3]]) -> Option<Self> {
        let mut kept = Vec::with_capacity(triangles.len());
        let mut normals = Vec::with_capacity(triangles.len());
        for &tri in triangles {
            let [a, b, c] = tri.map(|i| vertices.get(i as usize).copied());
            let (a, b, c) = (a?, b?, c?);
            let n = (b - a).cross(c - a);
            if n.length_squared() > 1e-12 {
                kept.push(tri);
                normals.push(n.normalize());
            }
        }
        if kept.is_empty() {
            return None;
        }
        Some(Self {
            vertices,
            triangles: kept,
            normals,
        })
    }

    /// Mesh vertices.
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Iterate over triangles as corner positions plus unit face normal.
    pub fn triangles(&self) -> impl Iterator<Item = ([Vec3; 3], Vec3)> + '_ {
        self.triangles
            .iter()
            .zip(&self.normals)
            .map(|(tri, &n)| (tri.map(|i| self.vertices[i as usize]), n))
    }

    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}

impl Collider {
    /// Create a sphere collider.
    pub fn sphere(radius: f32) -> Self {
        Collider::Sphere { radius }
    }

    /// Create a box collider.
    pub fn box_shape(half_extents: Vec3) -> Self {
        Collider::Box { half_extents }
    }

    /// Create a cylinder collider.
    pub fn cylinder(radius: f32, half_height: f32) -> Self {
        Collider::Cylinder {
            radius,
            half_height,
        }
    }

    /// Short name of the shape kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Collider::Sphere { .. } => "sphere",
            Collider::Box { .. } => "box",
            Collider::Cylinder { .. } => "cylinder",
            Collider::ConvexHull(_) => "convex",
            Collider::TriMesh(_) => "concave",
            Collider::Compound(_) => "compound",
        }
    }

    /// Signed distance and outward normal at a body-space point.
    ///
    /// `None` for shapes without a closed interior (meshes, compounds).
    pub fn signed_distance(&self, p: Vec3) -> Option<(f32, Vec3)> {
        match self {
            Collider::Sphere { radius } => {
                let len = p.length();
                let normal = if len > 1e-6 { p / len } else { Vec3::Y };
                Some((len - radius, normal))
            }
            Collider::Box { half_extents } => Some(box_distance(p, *half_extents)),
            Collider::Cylinder {
                radius,
                half_height,
            } => Some(cylinder_distance(p, *radius, *half_height)),
            Collider::ConvexHull(hull) => Some(hull.signed_distance(p)),
            Collider::TriMesh(_) | Collider::Compound(_) => None,
        }
    }

    /// Body-space points on the surface used as contact candidates.
    ///
    /// Spheres have no finite sample set and are handled analytically.
    pub fn surface_points(&self) -> Vec<Vec3> {
        match self {
            Collider::Box { half_extents } => {
                let mut pts = Vec::with_capacity(8);
                for sx in [-1.0_f32, 1.0] {
                    for sy in [-1.0_f32, 1.0] {
                        for sz in [-1.0_f32, 1.0] {
                            pts.push(*half_extents * Vec3::new(sx, sy, sz));
                        }
                    }
                }
                pts
            }
            Collider::Cylinder {
                radius,
                half_height,
            } => {
                let mut pts = Vec::with_capacity(CYLINDER_SEGMENTS * 2);
                for i in 0..CYLINDER_SEGMENTS {
                    let angle = i as f32 / CYLINDER_SEGMENTS as f32 * std::f32::consts::TAU;
                    let (s, c) = angle.sin_cos();
                    pts.push(Vec3::new(c * radius, *half_height, s * radius));
                    pts.push(Vec3::new(c * radius, -half_height, s * radius));
                }
                pts
            }
            Collider::ConvexHull(hull) => hull.vertices().to_vec(),
            Collider::TriMesh(mesh) => mesh.vertices().to_vec(),
            Collider::Sphere { .. } | Collider::Compound(_) => Vec::new(),
        }
    }

    /// Body-space axis-aligned bounds.
    pub fn local_bounds(&self) -> (Vec3, Vec3) {
        match self {
            Collider::Sphere { radius } => (Vec3::splat(-radius), Vec3::splat(*radius)),
            Collider::Box { half_extents } => (-*half_extents, *half_extents),
            Collider::Cylinder {
                radius,
                half_height,
            } => {
                let e = Vec3::new(*radius, *half_height, *radius);
                (-e, e)
            }
            Collider::ConvexHull(hull) => hull.bounds(),
            Collider::TriMesh(mesh) => points_bounds(mesh.vertices()),
            Collider::Compound(children) => children.iter().fold(
                (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
                |(min, max), child| {
                    let (cmin, cmax) = transformed_bounds(
                        child.collider.local_bounds(),
                        child.offset,
                        child.rotation,
                    );
                    (min.min(cmin), max.max(cmax))
                },
            ),
        }
    }
}

/// Compute the diagonal inertia tensor for a shape.
pub fn compute_inertia(collider: &Collider, mass: f32) -> Vec3 {
    if mass == 0.0 {
        return Vec3::ZERO;
    }

    match collider {
        Collider::Sphere { radius } => {
            let i = 0.4 * mass * radius * radius;
            Vec3::splat(i)
        }
        Collider::Box { half_extents } => box_inertia(*half_extents * 2.0, mass),
        Collider::Cylinder {
            radius,
            half_height,
        } => {
            let h = half_height * 2.0;
            let side = mass * (3.0 * radius * radius + h * h) / 12.0;
            Vec3::new(side, 0.5 * mass * radius * radius, side)
        }
        // Bounding-box approximation for everything else.
        _ => {
            let (min, max) = collider.local_bounds();
            box_inertia(max - min, mass)
        }
    }
}

fn box_inertia(e: Vec3, mass: f32) -> Vec3 {
    let factor = mass / 12.0;
    Vec3::new(
        factor * (e.y * e.y + e.z * e.z),
        factor * (e.x * e.x + e.z * e.z),
        factor * (e.x * e.x + e.y * e.y),
    )
}

fn box_distance(p: Vec3, half_extents: Vec3) -> (f32, Vec3) {
    let q = p.abs() - half_extents;
    let outside = q.max(Vec3::ZERO);
    if outside.length_squared() > 0.0 {
        let normal = (outside * p.signum()).normalize();
        return (outside.length(), normal);
    }

    // Inside: push out through the nearest face.
    let depth = q.max_element();
    let normal = if q.x >= q.y && q.x >= q.z {
        Vec3::X * p.x.signum()
    } else if q.y >= q.z {
        Vec3::Y * p.y.signum()
    } else {
        Vec3::Z * p.z.signum()
    };
    (depth, normal)
}

fn cylinder_distance(p: Vec3, radius: f32, half_height: f32) -> (f32, Vec3) {
    let radial = Vec3::new(p.x, 0.0, p.z);
    let r = radial.length();
    let radial_dir = if r > 1e-6 { radial / r } else { Vec3::X };
    let dr = r - radius;
    let dy = p.y.abs() - half_height;
    let axial_dir = Vec3::Y * p.y.signum();

    if dr > 0.0 || dy > 0.0 {
        let n = radial_dir * dr.max(0.0) + axial_dir * dy.max(0.0);
        let dist = n.length();
        (dist, n / dist)
    } else if dr > dy {
        (dr, radial_dir)
    } else {
        (dy, axial_dir)
    }
}

pub(crate) fn points_bounds(points: &[Vec3]) -> (Vec3, Vec3) {
    points.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), &p| (min.min(p), max.max(p)),
    )
}

/// Bounds of a local box after rotation and translation.
pub(crate) fn transformed_bounds(
    (min, max): (Vec3, Vec3),
    position: Vec3,
    rotation: Quat,
) -> (Vec3, Vec3) {
    let center = (min + max) * 0.5;
    let half = (max - min) * 0.5;
    let rot = glam::Mat3::from_quat(rotation);
    let extent = rot.col(0).abs() * half.x + rot.col(1).abs() * half.y + rot.col(2).abs() * half.z;
    let world_center = position + rotation * center;
    (world_center - extent, world_center + extent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_distance_inside_and_outside() {
        let c = Collider::box_shape(Vec3::splat(0.5));
        let (d, n) = c.signed_distance(Vec3::new(0.0, 0.4, 0.0)).unwrap();
        assert!((d + 0.1).abs() < 1e-6);
        assert_eq!(n, Vec3::Y);

        let (d, n) = c.signed_distance(Vec3::new(0.0, 0.0, -2.0)).unwrap();
        assert!((d - 1.5).abs() < 1e-6);
        assert_eq!(n, Vec3::NEG_Z);
    }

    #[test]
    fn test_cylinder_distance() {
        let c = Collider::cylinder(1.0, 2.0);
        let (d, n) = c.signed_distance(Vec3::new(1.5, 0.0, 0.0)).unwrap();
        assert!((d - 0.5).abs() < 1e-6);
        assert!((n - Vec3::X).length() < 1e-6);

        let (d, n) = c.signed_distance(Vec3::new(0.0, 1.9, 0.0)).unwrap();
        assert!((d + 0.1).abs() < 1e-5);
        assert_eq!(n, Vec3::Y);
    }

    #[test]
    fn test_surface_points() {
        assert_eq!(Collider::box_shape(Vec3::ONE).surface_points().len(), 8);
        assert_eq!(
            Collider::cylinder(1.0, 1.0).surface_points().len(),
            CYLINDER_SEGMENTS * 2
        );
        assert!(Collider::sphere(1.0).surface_points().is_empty());
    }

    #[test]
    fn test_trimesh_rejects_bad_indices() {
        let verts = vec![Vec3::ZERO, Vec3::X, Vec3::Z];
        assert!(TriMesh::new(verts.clone(), &[[0, 1, 5]]).is_none());
        assert!(TriMesh::new(verts.clone(), &[[0, 0, 1]]).is_none());
        let mesh = TriMesh::new(verts, &[[0, 2, 1]]).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
        let (_, n) = mesh.triangles().next().unwrap();
        assert!((n - Vec3::Y).length() < 1e-6);
    }

    #[test]
    fn test_inertia_static_is_zero() {
        assert_eq!(compute_inertia(&Collider::sphere(1.0), 0.0), Vec3::ZERO);
        let i = compute_inertia(&Collider::box_shape(Vec3::splat(0.5)), 12.0);
        assert!((i - Vec3::splat(2.0)).length() < 1e-5);
    }

    #[test]
    fn test_rotated_bounds() {
        let (min, max) = transformed_bounds(
            (Vec3::new(-2.0, -0.5, -0.5), Vec3::new(2.0, 0.5, 0.5)),
            Vec3::Y,
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
        );
        assert!((max - Vec3::new(0.5, 3.0, 0.5)).length() < 1e-5);
        assert!((min - Vec3::new(-0.5, -1.0, -0.5)).length() < 1e-5);
    }
}
