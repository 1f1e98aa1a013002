//! Convex colliders as vertex, face and edge sets.
//!
//! Boxes, cylinders and hulls all reduce to a [`Polytope`] for the separating
//! axis test in [`crate::collision`]. Cylinders become prisms whose flat sides
//! sit at the true radius.

use glam::{Quat, Vec3};

use crate::collider::{CYLINDER_SEGMENTS, Collider};

/// Planar face with an outward normal and an ordered vertex loop.
#[derive(Clone, Debug)]
pub(crate) struct PolyFace {
    pub normal: Vec3,
    pub offset: f32,
    pub indices: Vec<usize>,
}

#[derive(Clone, Debug)]
pub(crate) struct Polytope {
    pub vertices: Vec<Vec3>,
    pub faces: Vec<PolyFace>,
    /// Unique edge directions, parallel and opposite edges collapsed.
    pub edge_directions: Vec<Vec3>,
    /// Every edge as a vertex index pair.
    pub edges: Vec<[usize; 2]>,
}

impl Polytope {
    /// Polyhedral form of a convex collider, `None` for spheres, meshes and
    /// compounds.
    pub fn of(collider: &Collider) -> Option<Self> {
        match collider {
            Collider::Box { half_extents } => Some(Self::cuboid(*half_extents)),
            Collider::Cylinder {
                radius,
                half_height,
            } => Some(Self::prism(*radius, *half_height)),
            Collider::ConvexHull(hull) => Some(Self::from_loops(
                hull.vertices().to_vec(),
                hull.faces().iter().map(|f| f.vertices.clone()).collect(),
            )),
            Collider::Sphere { .. } | Collider::TriMesh(_) | Collider::Compound(_) => None,
        }
    }

    fn cuboid(h: Vec3) -> Self {
        // Vertex index bits: x = 4, y = 2, z = 1.
        let vertices = (0..8)
            .map(|i| {
                let sign = |bit: usize| if i & bit != 0 { 1.0 } else { -1.0 };
                h * Vec3::new(sign(4), sign(2), sign(1))
            })
            .collect();
        let loops = vec![
            vec![0, 1, 3, 2],
            vec![4, 6, 7, 5],
            vec![0, 4, 5, 1],
            vec![2, 3, 7, 6],
            vec![0, 2, 6, 4],
            vec![1, 5, 7, 3],
        ];
        Self::from_loops(vertices, loops)
    }

    fn prism(radius: f32, half_height: f32) -> Self {
        let n = CYLINDER_SEGMENTS;
        let corner = radius / (std::f32::consts::PI / n as f32).cos();
        let mut vertices = Vec::with_capacity(n * 2);
        for y in [half_height, -half_height] {
            for i in 0..n {
                let angle = (i as f32 + 0.5) / n as f32 * std::f32::consts::TAU;
                let (s, c) = angle.sin_cos();
                vertices.push(Vec3::new(c * corner, y, s * corner));
            }
        }
        let mut loops = vec![(0..n).collect(), (n..2 * n).collect()];
        loops.extend((0..n).map(|i| {
            let j = (i + 1) % n;
            vec![i, j, n + j, n + i]
        }));
        Self::from_loops(vertices, loops)
    }

    fn from_loops(vertices: Vec<Vec3>, loops: Vec<Vec<usize>>) -> Self {
        let centroid = vertices.iter().sum::<Vec3>() / vertices.len().max(1) as f32;

        let mut faces = Vec::with_capacity(loops.len());
        let mut edges: Vec<[usize; 2]> = Vec::new();
        for indices in loops {
            if indices.len() < 3 {
                continue;
            }
            // Newell normal, then point it away from the interior.
            let mut normal = Vec3::ZERO;
            for (k, &i) in indices.iter().enumerate() {
                let p = vertices[i];
                let q = vertices[indices[(k + 1) % indices.len()]];
                normal += (p - q).cross(p + q);
            }
            let mut normal = normal.normalize_or_zero();
            if normal == Vec3::ZERO {
                continue;
            }
            if normal.dot(vertices[indices[0]] - centroid) < 0.0 {
                normal = -normal;
            }

            for (k, &i) in indices.iter().enumerate() {
                let j = indices[(k + 1) % indices.len()];
                let edge = [i.min(j), i.max(j)];
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
            faces.push(PolyFace {
                normal,
                offset: normal.dot(vertices[indices[0]]),
                indices,
            });
        }

        let mut edge_directions: Vec<Vec3> = Vec::new();
        for &[i, j] in &edges {
            let dir = (vertices[j] - vertices[i]).normalize_or_zero();
            let seen = edge_directions
                .iter()
                .any(|d| d.cross(dir).length_squared() < 1e-8);
            if dir != Vec3::ZERO && !seen {
                edge_directions.push(dir);
            }
        }

        Self {
            vertices,
            faces,
            edge_directions,
            edges,
        }
    }

    /// Copy moved into world space.
    pub fn placed(&self, position: Vec3, rotation: Quat) -> Self {
        Self {
            vertices: self.vertices.iter().map(|&v| position + rotation * v).collect(),
            faces: self
                .faces
                .iter()
                .map(|f| {
                    let normal = rotation * f.normal;
                    PolyFace {
                        normal,
                        offset: f.offset + normal.dot(position),
                        indices: f.indices.clone(),
                    }
                })
                .collect(),
            edge_directions: self.edge_directions.iter().map(|&d| rotation * d).collect(),
            edges: self.edges.clone(),
        }
    }

    /// Smallest and largest projection of the vertices onto `axis`.
    pub fn project(&self, axis: Vec3) -> (f32, f32) {
        self.vertices
            .iter()
            .fold((f32::MAX, f32::MIN), |(lo, hi), v| {
                let d = axis.dot(*v);
                (lo.min(d), hi.max(d))
            })
    }

    /// World positions of a face's vertex loop.
    pub fn face_polygon(&self, face: usize) -> Vec<Vec3> {
        self.faces[face]
            .indices
            .iter()
            .map(|&i| self.vertices[i])
            .collect()
    }

    /// Face whose normal points most along `dir`.
    pub fn face_toward(&self, dir: Vec3) -> usize {
        let mut best = 0;
        let mut best_dot = f32::MIN;
        for (i, face) in self.faces.iter().enumerate() {
            let d = face.normal.dot(dir);
            if d > best_dot {
                best_dot = d;
                best = i;
            }
        }
        best
    }

    /// Among edges parallel to `dir`, the one reaching furthest along `axis`.
    pub fn extreme_edge(&self, dir: Vec3, axis: Vec3) -> Option<(Vec3, Vec3)> {
        self.edges
            .iter()
            .map(|&[i, j]| (self.vertices[i], self.vertices[j]))
            .filter(|(p, q)| (*q - *p).normalize_or_zero().cross(dir).length_squared() < 1e-8)
            .max_by(|(p0, q0), (p1, q1)| axis.dot(*p0 + *q0).total_cmp(&axis.dot(*p1 + *q1)))
    }

    /// Vertex reaching furthest along `axis`.
    pub fn support(&self, axis: Vec3) -> Vec3 {
        self.vertices
            .iter()
            .copied()
            .max_by(|a, b| axis.dot(*a).total_cmp(&axis.dot(*b)))
            .unwrap_or(Vec3::ZERO)
    }
}
