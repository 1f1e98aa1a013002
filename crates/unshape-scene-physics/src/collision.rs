//! Collision detection.
//!
//! Broad phase culls body pairs by world-space bounds; the narrow phase then
//! produces a [`ContactManifold`] per overlapping pair. Boxes, cylinders and
//! hulls go through a separating axis test with face clipping, spheres are
//! handled analytically against signed distance functions, and triangle
//! meshes per triangle. Points are reported up to the pair's combined margin away,
//! so a manifold can hold separated points as well as penetrating ones.

use glam::{Quat, Vec3};

use crate::collider::{Collider, TriMesh, transformed_bounds};
use crate::polytope::Polytope;
use crate::rigidbody::RigidBody;

/// Maximum points kept per manifold (the deepest ones survive).
pub const MAX_MANIFOLD_POINTS: usize = 16;

/// How far below a mesh triangle a point still counts as touching it.
const MESH_THICKNESS: f32 = 0.3;

/// A contact point between two bodies.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactPoint {
    /// Contact point in world space.
    pub point: Vec3,
    /// Contact normal, pointing from body B toward body A.
    pub normal: Vec3,
    /// Penetration depth; negative when the surfaces are still apart.
    pub depth: f32,
}

impl ContactPoint {
    /// Signed surface distance (negative when penetrating).
    pub fn distance(&self) -> f32 {
        -self.depth
    }

    fn flip(mut self) -> Self {
        self.normal = -self.normal;
        self
    }
}

/// All contact points between one pair of bodies.
#[derive(Clone, Debug)]
pub struct ContactManifold {
    /// Index of first body.
    pub body_a: usize,
    /// Index of second body.
    pub body_b: usize,
    /// Contact points, deepest first.
    pub points: Vec<ContactPoint>,
}

impl ContactManifold {
    /// Returns true if any point is at or below zero distance.
    pub fn is_touching(&self) -> bool {
        self.points.iter().any(|p| p.distance() <= 0.0)
    }

    /// Deepest point.
    pub fn deepest(&self) -> Option<&ContactPoint> {
        self.points.first()
    }
}

#[derive(Clone, Copy)]
struct Placement {
    position: Vec3,
    rotation: Quat,
}

impl Placement {
    fn of(body: &RigidBody) -> Self {
        Self {
            position: body.position,
            rotation: body.orientation,
        }
    }

    fn child(self, offset: Vec3, rotation: Quat) -> Self {
        Self {
            position: self.position + self.rotation * offset,
            rotation: self.rotation * rotation,
        }
    }

    fn to_world(self, local: Vec3) -> Vec3 {
        self.position + self.rotation * local
    }

    fn to_local(self, world: Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.position)
    }
}

/// World-space bounds of a body, grown by its margin.
pub fn world_bounds(body: &RigidBody) -> (Vec3, Vec3) {
    let (min, max) = transformed_bounds(
        body.collider.local_bounds(),
        body.position,
        body.orientation,
    );
    (min - Vec3::splat(body.margin), max + Vec3::splat(body.margin))
}

/// Returns true if two bounds overlap.
pub fn bounds_overlap(a: (Vec3, Vec3), b: (Vec3, Vec3)) -> bool {
    a.0.cmple(b.1).all() && b.0.cmple(a.1).all()
}

/// Test two bodies and return their manifold if any point is within margin.
///
/// `speculative` widens the contact distance, typically by the distance the
/// bodies can close within one sub-step.
pub fn collide(
    a: usize,
    body_a: &RigidBody,
    b: usize,
    body_b: &RigidBody,
    speculative: f32,
) -> Option<ContactManifold> {
    let skin = body_a.margin + body_b.margin + speculative.max(0.0);
    let mut points = Vec::new();
    collide_shapes(
        &body_a.collider,
        Placement::of(body_a),
        &body_b.collider,
        Placement::of(body_b),
        skin,
        &mut points,
    );

    if points.is_empty() {
        return None;
    }

    points.sort_by(|p, q| q.depth.total_cmp(&p.depth));
    points.truncate(MAX_MANIFOLD_POINTS);
    Some(ContactManifold {
        body_a: a,
        body_b: b,
        points,
    })
}

fn collide_shapes(
    sa: &Collider,
    pa: Placement,
    sb: &Collider,
    pb: Placement,
    skin: f32,
    out: &mut Vec<ContactPoint>,
) {
    match (sa, sb) {
        (Collider::Compound(children), _) => {
            for child in children {
                collide_shapes(
                    &child.collider,
                    pa.child(child.offset, child.rotation),
                    sb,
                    pb,
                    skin,
                    out,
                );
            }
        }
        (_, Collider::Compound(children)) => {
            for child in children {
                collide_shapes(
                    sa,
                    pa,
                    &child.collider,
                    pb.child(child.offset, child.rotation),
                    skin,
                    out,
                );
            }
        }
        (Collider::TriMesh(_), Collider::TriMesh(_)) => {}
        (Collider::TriMesh(mesh), _) => {
            let start = out.len();
            shape_mesh(sb, pb, mesh, pa, skin, out);
            for p in &mut out[start..] {
                *p = p.flip();
            }
        }
        (_, Collider::TriMesh(mesh)) => shape_mesh(sa, pa, mesh, pb, skin, out),
        (Collider::Sphere { radius: ra }, Collider::Sphere { radius: rb }) => {
            out.extend(sphere_sphere(pa.position, *ra, pb.position, *rb, skin));
        }
        (Collider::Sphere { radius }, _) => {
            out.extend(sphere_convex(pa.position, *radius, sb, pb, skin));
        }
        (_, Collider::Sphere { radius }) => {
            out.extend(sphere_convex(pb.position, *radius, sa, pa, skin).map(ContactPoint::flip));
        }
        _ => convex_convex(sa, pa, sb, pb, skin, out),
    }
}

/// Test sphere-sphere proximity.
fn sphere_sphere(
    center_a: Vec3,
    radius_a: f32,
    center_b: Vec3,
    radius_b: f32,
    skin: f32,
) -> Option<ContactPoint> {
    let d = center_a - center_b;
    let dist = d.length();
    let separation = dist - radius_a - radius_b;
    if separation >= skin {
        return None;
    }

    let normal = if dist > 1e-6 { d / dist } else { Vec3::Y };
    Some(ContactPoint {
        point: center_a - normal * radius_a,
        normal,
        depth: -separation,
    })
}

/// Test a sphere (body A) against a convex shape (body B).
fn sphere_convex(
    center: Vec3,
    radius: f32,
    shape: &Collider,
    placement: Placement,
    skin: f32,
) -> Option<ContactPoint> {
    let (dist, local_normal) = shape.signed_distance(placement.to_local(center))?;
    let separation = dist - radius;
    if separation >= skin {
        return None;
    }

    let normal = placement.rotation * local_normal;
    Some(ContactPoint {
        point: center - normal * radius,
        normal,
        depth: -separation,
    })
}

/// Candidate separating axis and how far apart the shapes are along it.
#[derive(Clone, Copy, Debug)]
enum Axis {
    /// Face normal of A, by face index.
    FaceA(usize, f32),
    /// Face normal of B, by face index.
    FaceB(usize, f32),
    /// Cross product of an edge direction of A and one of B, oriented from
    /// B toward A.
    Edges { axis: Vec3, dir_a: Vec3, dir_b: Vec3, separation: f32 },
}

impl Axis {
    fn separation(&self) -> f32 {
        match *self {
            Axis::FaceA(_, s) | Axis::FaceB(_, s) => s,
            Axis::Edges { separation, .. } => separation,
        }
    }
}

/// Separation below which one axis is preferred over a nearly equal one, so
/// the reference face does not flip between frames.
const AXIS_TOLERANCE: f32 = 1e-3;

fn convex_convex(
    sa: &Collider,
    pa: Placement,
    sb: &Collider,
    pb: Placement,
    skin: f32,
    out: &mut Vec<ContactPoint>,
) {
    let (Some(a), Some(b)) = (Polytope::of(sa), Polytope::of(sb)) else {
        return;
    };
    let a = a.placed(pa.position, pa.rotation);
    let b = b.placed(pb.position, pb.rotation);
    polytope_polytope(&a, &b, skin, out);
}

/// Separating axis test between two world-space polytopes.
///
/// Face normals of both shapes and cross products of their edge directions
/// are tried; any axis with separation at or beyond `skin` ends the test. On
/// a face axis the other shape's most opposed face is clipped against the
/// reference face, on an edge axis the two closest edges give one point.
fn polytope_polytope(a: &Polytope, b: &Polytope, skin: f32, out: &mut Vec<ContactPoint>) {
    let Some(face_a) = best_face_axis(a, b, skin) else {
        return;
    };
    let Some(face_b) = best_face_axis(b, a, skin) else {
        return;
    };
    let Some(edges) = best_edge_axis(a, b, skin) else {
        return;
    };

    let face = if face_b.1 > face_a.1 + AXIS_TOLERANCE {
        Axis::FaceB(face_b.0, face_b.1)
    } else {
        Axis::FaceA(face_a.0, face_a.1)
    };
    let axis = match edges {
        Some(e) if e.separation() > face.separation() + AXIS_TOLERANCE => e,
        _ => face,
    };

    match axis {
        Axis::FaceA(f, separation) => {
            let start = out.len();
            clip_faces(a, f, b, skin, separation, out);
            for p in &mut out[start..] {
                *p = p.flip();
            }
        }
        Axis::FaceB(f, separation) => clip_faces(b, f, a, skin, separation, out),
        Axis::Edges {
            axis,
            dir_a,
            dir_b,
            separation,
        } => {
            let (Some(ea), Some(eb)) = (a.extreme_edge(dir_a, -axis), b.extreme_edge(dir_b, axis))
            else {
                return;
            };
            let (on_a, on_b) = closest_points_on_segments(ea, eb);
            out.push(ContactPoint {
                point: (on_a + on_b) * 0.5,
                normal: axis,
                depth: -separation,
            });
        }
    }
}

/// Face of `r` along which `other` is furthest out, or `None` if that
/// distance reaches `skin`.
fn best_face_axis(r: &Polytope, other: &Polytope, skin: f32) -> Option<(usize, f32)> {
    let mut best = (0, f32::MIN);
    for (i, face) in r.faces.iter().enumerate() {
        let separation = other.project(face.normal).0 - face.offset;
        if separation >= skin {
            return None;
        }
        if separation > best.1 {
            best = (i, separation);
        }
    }
    Some(best)
}

/// Best edge-edge axis. The outer `None` means a separating axis was found;
/// the inner one that every edge pair is parallel.
fn best_edge_axis(a: &Polytope, b: &Polytope, skin: f32) -> Option<Option<Axis>> {
    let mut best: Option<Axis> = None;
    for &dir_a in &a.edge_directions {
        for &dir_b in &b.edge_directions {
            let cross = dir_a.cross(dir_b);
            if cross.length_squared() < 1e-6 {
                continue;
            }
            let axis = cross.normalize();
            let (a_lo, a_hi) = a.project(axis);
            let (b_lo, b_hi) = b.project(axis);
            // Either orientation of the line may be the one that separates.
            let (axis, separation) = if a_lo - b_hi >= b_lo - a_hi {
                (axis, a_lo - b_hi)
            } else {
                (-axis, b_lo - a_hi)
            };
            if separation >= skin {
                return None;
            }
            if best.is_none_or(|e| separation > e.separation()) {
                best = Some(Axis::Edges {
                    axis,
                    dir_a,
                    dir_b,
                    separation,
                });
            }
        }
    }
    Some(best)
}

/// Clip the face of `incident` most opposed to `reference`'s face `f`
/// against that face's side planes. Points come out with the normal pointing
/// from `reference` toward `incident`.
fn clip_faces(
    reference: &Polytope,
    f: usize,
    incident: &Polytope,
    skin: f32,
    separation: f32,
    out: &mut Vec<ContactPoint>,
) {
    let ref_face = &reference.faces[f];
    let normal = ref_face.normal;
    let ref_polygon = reference.face_polygon(f);
    let center = ref_polygon.iter().sum::<Vec3>() / ref_polygon.len() as f32;

    let mut polygon = incident.face_polygon(incident.face_toward(-normal));
    for (k, &v0) in ref_polygon.iter().enumerate() {
        let v1 = ref_polygon[(k + 1) % ref_polygon.len()];
        let mut side = (v1 - v0).cross(normal).normalize_or_zero();
        if side.dot(center - v0) > 0.0 {
            side = -side;
        }
        polygon = clip_polygon(&polygon, side, side.dot(v0));
        if polygon.is_empty() {
            break;
        }
    }

    let start = out.len();
    for p in polygon {
        let s = normal.dot(p) - ref_face.offset;
        if s >= skin {
            continue;
        }
        let point = p - normal * (s * 0.5);
        if out[start..]
            .iter()
            .any(|q| q.point.distance_squared(point) < 1e-10)
        {
            continue;
        }
        out.push(ContactPoint {
            point,
            normal,
            depth: -s,
        });
    }

    // Clipping can lose everything to round-off on grazing contact.
    if out.len() == start {
        let deepest = incident.support(-normal);
        out.push(ContactPoint {
            point: deepest,
            normal,
            depth: -separation,
        });
    }
}

/// Keep the part of a convex polygon with `normal · p <= offset`.
fn clip_polygon(polygon: &[Vec3], normal: Vec3, offset: f32) -> Vec<Vec3> {
    let mut clipped = Vec::with_capacity(polygon.len() + 1);
    for (k, &p) in polygon.iter().enumerate() {
        let q = polygon[(k + 1) % polygon.len()];
        let dp = normal.dot(p) - offset;
        let dq = normal.dot(q) - offset;
        if dp <= 0.0 {
            clipped.push(p);
        }
        if (dp <= 0.0) != (dq <= 0.0) {
            clipped.push(p + (q - p) * (dp / (dp - dq)));
        }
    }
    clipped
}

/// Closest points between segments `(p1, q1)` and `(p2, q2)`.
fn closest_points_on_segments((p1, q1): (Vec3, Vec3), (p2, q2): (Vec3, Vec3)) -> (Vec3, Vec3) {
    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);
    if a <= 1e-12 && e <= 1e-12 {
        return (p1, p2);
    }

    let (s, t) = if a <= 1e-12 {
        (0.0, (f / e).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if e <= 1e-12 {
            ((-c / a).clamp(0.0, 1.0), 0.0)
        } else {
            let b = d1.dot(d2);
            let denom = a * e - b * b;
            let s = if denom > 1e-12 {
                ((b * f - c * e) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let t = (b * s + f) / e;
            if t < 0.0 {
                ((-c / a).clamp(0.0, 1.0), 0.0)
            } else if t > 1.0 {
                (((b - c) / a).clamp(0.0, 1.0), 1.0)
            } else {
                (s, t)
            }
        }
    };
    (p1 + d1 * s, p2 + d2 * t)
}

/// Test a shape (body A) against a triangle mesh (body B).
fn shape_mesh(
    shape: &Collider,
    pa: Placement,
    mesh: &TriMesh,
    pb: Placement,
    skin: f32,
    out: &mut Vec<ContactPoint>,
) {
    // Shape bounds in mesh space, for triangle culling.
    let relative = Placement {
        position: pb.to_local(pa.position),
        rotation: pb.rotation.inverse() * pa.rotation,
    };
    let (min, max) = transformed_bounds(shape.local_bounds(), relative.position, relative.rotation);
    let reach = Vec3::splat(skin + MESH_THICKNESS);
    let query = (min - reach, max + reach);

    let nearby: Vec<([Vec3; 3], Vec3)> = mesh
        .triangles()
        .filter(|(tri, _)| {
            let tmin = tri[0].min(tri[1]).min(tri[2]);
            let tmax = tri[0].max(tri[1]).max(tri[2]);
            bounds_overlap((tmin, tmax), query)
        })
        .collect();
    if nearby.is_empty() {
        return;
    }

    if let Collider::Sphere { radius } = shape {
        let center = relative.position;
        for (tri, face_normal) in &nearby {
            let closest = closest_point_on_triangle(center, tri);
            let d = center - closest;
            let dist = d.length();
            let separation = dist - radius;
            if separation < skin {
                let n = if dist > 1e-6 { d / dist } else { *face_normal };
                let normal = pb.rotation * n;
                out.push(ContactPoint {
                    point: pa.position - normal * *radius,
                    normal,
                    depth: -separation,
                });
            }
        }
        return;
    }

    for local in shape.surface_points() {
        let world = pa.to_world(local);
        let p = pb.to_local(world);

        // Closest surface from above among triangles the point projects onto.
        let mut best: Option<(f32, Vec3)> = None;
        for (tri, n) in &nearby {
            let s = n.dot(p - tri[0]);
            if s >= skin || s <= -MESH_THICKNESS {
                continue;
            }
            if !point_in_triangle(p - *n * s, tri, *n) {
                continue;
            }
            if best.is_none_or(|(bs, _)| s > bs) {
                best = Some((s, *n));
            }
        }

        if let Some((s, n)) = best {
            out.push(ContactPoint {
                point: world,
                normal: pb.rotation * n,
                depth: -s,
            });
        }
    }
}

fn point_in_triangle(p: Vec3, [a, b, c]: &[Vec3; 3], normal: Vec3) -> bool {
    let e0 = (b - *a).cross(p - *a).dot(normal);
    let e1 = (*c - *b).cross(p - *b).dot(normal);
    let e2 = (*a - *c).cross(p - *c).dot(normal);
    e0 >= 0.0 && e1 >= 0.0 && e2 >= 0.0
}

/// Closest point on triangle `abc` to `p` (Voronoi region walk).
fn closest_point_on_triangle(p: Vec3, [a, b, c]: &[Vec3; 3]) -> Vec3 {
    let (a, b, c) = (*a, *b, *c);
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }

    let denom = 1.0 / (va + vb + vc);
    a + ab * (vb * denom) + ac * (vc * denom)
}
