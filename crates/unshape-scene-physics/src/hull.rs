//! Incremental 3D convex hull.
//!
//! Builds the convex envelope of a point cloud by growing an initial
//! tetrahedron one point at a time: faces visible from the new point are
//! removed and the resulting hole is closed with a fan from its horizon.

use glam::Vec3;

/// Outward-facing supporting plane of a hull face: `normal · x = offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HullPlane {
    /// Unit outward normal.
    pub normal: Vec3,
    /// Plane offset along the normal.
    pub offset: f32,
}

/// Planar polygon of a hull: coplanar triangles merged into one loop.
#[derive(Clone, Debug, PartialEq)]
pub struct HullFace {
    /// Unit outward normal.
    pub normal: Vec3,
    /// Vertex indices in order around the face.
    pub vertices: Vec<usize>,
}

/// Convex polyhedron with triangulated faces.
#[derive(Clone, Debug)]
pub struct ConvexHull {
    vertices: Vec<Vec3>,
    triangles: Vec<[usize; 3]>,
    planes: Vec<HullPlane>,
    faces: Vec<HullFace>,
}

#[derive(Clone, Copy)]
struct Face {
    v: [usize; 3],
    normal: Vec3,
    offset: f32,
}

impl Face {
    fn oriented(points: &[Vec3], [a, b, c]: [usize; 3], interior: Vec3) -> Self {
        let mut v = [a, b, c];
        let mut normal = (points[b] - points[a]).cross(points[c] - points[a]);
        if normal.dot(interior - points[a]) > 0.0 {
            v = [a, c, b];
            normal = -normal;
        }
        let normal = normal.normalize_or_zero();
        Self {
            v,
            normal,
            offset: normal.dot(points[a]),
        }
    }

    fn distance(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.offset
    }
}

impl ConvexHull {
    /// Compute the hull of `points`.
    ///
    /// Returns `None` unless the points span a volume, i.e. there are at least
    /// four finite points that are not all coplanar.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let points: Vec<Vec3> = points.iter().copied().filter(|p| p.is_finite()).collect();
        if points.len() < 4 {
            return None;
        }

        let (min, max) = bounds(&points);
        let scale = (max - min).max_element();
        if scale <= 0.0 {
            return None;
        }
        let eps = scale * 1e-5;

        let i0 = argmax(&points, |p| -p.x);
        let i1 = argmax(&points, |p| p.distance(points[i0]));
        if points[i1].distance(points[i0]) <= eps {
            return None;
        }

        let dir = (points[i1] - points[i0]).normalize();
        let i2 = argmax(&points, |p| (p - points[i0]).cross(dir).length());
        if (points[i2] - points[i0]).cross(dir).length() <= eps {
            return None;
        }

        let n = (points[i1] - points[i0])
            .cross(points[i2] - points[i0])
            .normalize();
        let i3 = argmax(&points, |p| (p - points[i0]).dot(n).abs());
        if (points[i3] - points[i0]).dot(n).abs() <= eps {
            return None;
        }

        let seed = [i0, i1, i2, i3];
        let interior = (points[i0] + points[i1] + points[i2] + points[i3]) * 0.25;
        let mut faces: Vec<Face> = [[i0, i1, i2], [i0, i1, i3], [i0, i2, i3], [i1, i2, i3]]
            .into_iter()
            .map(|tri| Face::oriented(&points, tri, interior))
            .collect();

        for (i, &p) in points.iter().enumerate() {
            if seed.contains(&i) {
                continue;
            }

            let mut visible: Vec<usize> = faces
                .iter()
                .enumerate()
                .filter(|(_, f)| f.distance(p) > eps)
                .map(|(fi, _)| fi)
                .collect();
            if visible.is_empty() {
                continue;
            }

            let edges: Vec<(usize, usize)> = visible
                .iter()
                .flat_map(|&fi| {
                    let [a, b, c] = faces[fi].v;
                    [(a, b), (b, c), (c, a)]
                })
                .collect();
            let horizon: Vec<(usize, usize)> = edges
                .iter()
                .copied()
                .filter(|&(a, b)| !edges.contains(&(b, a)))
                .collect();

            visible.sort_unstable_by(|a, b| b.cmp(a));
            for fi in visible {
                faces.swap_remove(fi);
            }
            faces.extend(
                horizon
                    .into_iter()
                    .map(|(a, b)| Face::oriented(&points, [a, b, i], interior)),
            );
        }

        // Compact to the vertices actually referenced by faces.
        let mut remap = vec![usize::MAX; points.len()];
        let mut vertices = Vec::new();
        let mut triangles = Vec::with_capacity(faces.len());
        let mut planes = Vec::with_capacity(faces.len());
        let mut normals = Vec::with_capacity(faces.len());
        for face in &faces {
            let mut tri = [0; 3];
            for (slot, &v) in tri.iter_mut().zip(&face.v) {
                if remap[v] == usize::MAX {
                    remap[v] = vertices.len();
                    vertices.push(points[v]);
                }
                *slot = remap[v];
            }
            triangles.push(tri);
            normals.push(face.normal);
            if face.normal != Vec3::ZERO {
                planes.push(HullPlane {
                    normal: face.normal,
                    offset: face.offset,
                });
            }
        }

        let faces = merge_coplanar(&vertices, &triangles, &normals, eps);
        Some(Self {
            vertices,
            triangles,
            planes,
            faces,
        })
    }

    /// Hull vertices.
    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    /// Triangles indexing into [`Self::vertices`], wound outward.
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// Face planes.
    pub fn planes(&self) -> &[HullPlane] {
        &self.planes
    }

    /// Polygonal faces, with coplanar triangles merged.
    pub fn faces(&self) -> &[HullFace] {
        &self.faces
    }

    /// Signed distance estimate and outward normal at `p`.
    ///
    /// Exact inside the hull and near faces; past edges and corners it
    /// underestimates the true distance.
    pub fn signed_distance(&self, p: Vec3) -> (f32, Vec3) {
        self.planes
            .iter()
            .map(|plane| (plane.normal.dot(p) - plane.offset, plane.normal))
            .fold((f32::MIN, Vec3::Y), |best, cur| {
                if cur.0 > best.0 { cur } else { best }
            })
    }

    /// Axis-aligned bounds of the hull.
    pub fn bounds(&self) -> (Vec3, Vec3) {
        bounds(&self.vertices)
    }
}

fn bounds(points: &[Vec3]) -> (Vec3, Vec3) {
    points.iter().fold(
        (Vec3::splat(f32::MAX), Vec3::splat(f32::MIN)),
        |(min, max), &p| (min.min(p), max.max(p)),
    )
}

/// Group triangles lying in the same plane and order each group's vertices
/// around the group center.
fn merge_coplanar(
    vertices: &[Vec3],
    triangles: &[[usize; 3]],
    normals: &[Vec3],
    eps: f32,
) -> Vec<HullFace> {
    let mut faces: Vec<(HullFace, f32)> = Vec::new();
    for (tri, &normal) in triangles.iter().zip(normals) {
        if normal == Vec3::ZERO {
            continue;
        }
        let offset = normal.dot(vertices[tri[0]]);
        let same_plane = faces
            .iter_mut()
            .find(|(f, o)| f.normal.dot(normal) > 1.0 - 1e-4 && (o - offset).abs() <= eps);
        match same_plane {
            Some((face, _)) => {
                for &v in tri {
                    if !face.vertices.contains(&v) {
                        face.vertices.push(v);
                    }
                }
            }
            None => faces.push((
                HullFace {
                    normal,
                    vertices: tri.to_vec(),
                },
                offset,
            )),
        }
    }

    faces
        .into_iter()
        .map(|(mut face, _)| {
            let center = face.vertices.iter().map(|&v| vertices[v]).sum::<Vec3>()
                / face.vertices.len() as f32;
            let (u, w) = face.normal.any_orthonormal_pair();
            let mut keyed: Vec<(f32, usize)> = face
                .vertices
                .iter()
                .map(|&v| {
                    let d = vertices[v] - center;
                    (d.dot(w).atan2(d.dot(u)), v)
                })
                .collect();
            keyed.sort_by(|a, b| a.0.total_cmp(&b.0));
            face.vertices = keyed.into_iter().map(|(_, v)| v).collect();
            face
        })
        .collect()
}

fn argmax(points: &[Vec3], key: impl Fn(Vec3) -> f32) -> usize {
    let mut best = 0;
    let mut best_key = f32::MIN;
    for (i, &p) in points.iter().enumerate() {
        let k = key(p);
        if k > best_key {
            best_key = k;
            best = i;
        }
    }
    best
}
