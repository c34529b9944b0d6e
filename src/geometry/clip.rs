//! Exact polygon-polygon and tetrahedron-tetrahedron intersection moments.
//!
//! Two reduction levels mirror the two intersection algorithms: convex
//! polygons are clipped directly against each other's half-planes
//! (Sutherland-Hodgman); everything else is reduced to signed simplices
//! (triangle fans in 2-D, tetrahedra in 3-D) whose pairwise convex
//! intersections are summed with decomposition signs. The signed sum
//! reproduces the exact intersection moments for arbitrary simple regions.

use super::moments::{polygon_moments, polygon_is_convex, triangle_moments, Moments};
use super::point::{Point, Vector};

/// Clip a polygon against the half-plane `n·x <= d`, Sutherland-Hodgman
/// style. The winding of the input is preserved.
pub fn clip_polygon_halfplane(poly: &[Point<2>], n: Vector<2>, d: f64) -> Vec<Point<2>> {
    let len = poly.len();
    let mut out = Vec::with_capacity(len + 2);
    for i in 0..len {
        let p = poly[i];
        let q = poly[(i + 1) % len];
        let dp = n.dot(&p.as_vector()) - d;
        let dq = n.dot(&q.as_vector()) - d;
        if dp <= 0.0 {
            out.push(p);
        }
        if (dp < 0.0 && dq > 0.0) || (dp > 0.0 && dq < 0.0) {
            let t = dp / (dp - dq);
            out.push(p + (q - p) * t);
        }
    }
    out
}

/// Clip `subject` against every edge half-plane of the convex
/// counterclockwise polygon `clip`.
pub fn clip_polygon_convex(subject: &[Point<2>], clip: &[Point<2>]) -> Vec<Point<2>> {
    let mut poly = subject.to_vec();
    let n = clip.len();
    for i in 0..n {
        if poly.len() < 3 {
            return Vec::new();
        }
        let a = clip[i];
        let b = clip[(i + 1) % n];
        // Outward normal of a ccw edge; interior satisfies n·x <= n·a.
        let normal = (b - a).perp();
        poly = clip_polygon_halfplane(&poly, normal, normal.dot(&a.as_vector()));
    }
    poly
}

/// Intersection moments of two convex counterclockwise polygons.
///
/// Returns `None` when the clipped output polygon fails the convexity test
/// that the direct algorithm assumes; the caller treats the pair as empty
/// and lets mismatch repair cover the target.
pub fn intersect_convex_polygons_moments(
    a: &[Point<2>],
    b: &[Point<2>],
    convexity_eps: f64,
) -> Option<Moments<2>> {
    let clipped = clip_polygon_convex(a, b);
    if clipped.len() < 3 {
        return Some(Moments::zero());
    }
    if !polygon_is_convex(&clipped, convexity_eps) {
        return None;
    }
    Some(polygon_moments(&clipped))
}

/// Intersection moments of two signed triangles: both are oriented
/// positively, clipped, and the result carries the product of the
/// decomposition signs.
pub fn intersect_triangles_moments(t1: &[Point<2>; 3], t2: &[Point<2>; 3]) -> Moments<2> {
    let (s1, a) = orient_triangle(*t1);
    let (s2, b) = orient_triangle(*t2);
    if s1 == 0.0 || s2 == 0.0 {
        return Moments::zero();
    }
    let clipped = clip_polygon_convex(&a, &b);
    let mut m = polygon_moments(&clipped);
    m.scale(s1 * s2);
    m
}

/// Intersection moments of two simple polygons via signed triangle-fan
/// reduction; exact for non-convex inputs.
pub fn intersect_polygons_by_reduction(a: &[Point<2>], b: &[Point<2>]) -> Moments<2> {
    let mut m = Moments::zero();
    for i in 1..a.len().saturating_sub(1) {
        let ta = [a[0], a[i], a[i + 1]];
        for j in 1..b.len().saturating_sub(1) {
            let tb = [b[0], b[j], b[j + 1]];
            m.accumulate(&intersect_triangles_moments(&ta, &tb));
        }
    }
    m
}

fn orient_triangle(t: [Point<2>; 3]) -> (f64, [Point<2>; 3]) {
    let area = triangle_moments(t[0], t[1], t[2]).volume;
    if area > 0.0 {
        (1.0, t)
    } else if area < 0.0 {
        (-1.0, [t[0], t[2], t[1]])
    } else {
        (0.0, t)
    }
}

// --- 3-D: convex polyhedron clipping ---

/// A convex polyhedron held as outward-wound face loops. Faces own their
/// vertices; no shared index buffer is kept through clipping.
#[derive(Clone, Debug, Default)]
pub struct Polyhedron3 {
    pub faces: Vec<Vec<Point<3>>>,
}

impl Polyhedron3 {
    /// Build from a tetrahedron, reordering to positive orientation.
    /// Returns the decomposition sign (`-1` when the input was negatively
    /// oriented, `0` for a degenerate tet).
    pub fn from_signed_tet(t: &[Point<3>; 4]) -> (f64, Polyhedron3) {
        let vol = super::moments::tet_signed_volume(t[0], t[1], t[2], t[3]);
        if vol == 0.0 {
            return (0.0, Polyhedron3::default());
        }
        let (sign, v) = if vol > 0.0 {
            (1.0, *t)
        } else {
            (-1.0, [t[0], t[1], t[3], t[2]])
        };
        let faces = super::moments::tet_faces(v[0], v[1], v[2], v[3]);
        (sign, Polyhedron3 { faces: faces.to_vec() })
    }

    pub fn is_empty(&self) -> bool {
        self.faces.len() < 4
    }

    /// Characteristic length used to scale on-plane tolerances.
    fn scale(&self) -> f64 {
        let mut s = 0.0_f64;
        for f in &self.faces {
            for p in f {
                for k in 0..3 {
                    s = s.max(p[k].abs());
                }
            }
        }
        s.max(1.0)
    }

    /// Clip against the half-space `n·x <= d` (`n` need not be unit), and
    /// close the cut with a cap face wound outward.
    pub fn clip_halfspace(&self, n: Vector<3>, d: f64) -> Polyhedron3 {
        let norm = n.norm();
        if norm == 0.0 {
            return self.clone();
        }
        let n = n / norm;
        let d = d / norm;
        let on_tol = 1e-12 * self.scale();

        let mut out_faces: Vec<Vec<Point<3>>> = Vec::with_capacity(self.faces.len() + 1);
        let mut cut_points: Vec<Point<3>> = Vec::new();

        for face in &self.faces {
            let len = face.len();
            let mut kept = Vec::with_capacity(len + 2);
            for i in 0..len {
                let p = face[i];
                let q = face[(i + 1) % len];
                let dp = n.dot(&p.as_vector()) - d;
                let dq = n.dot(&q.as_vector()) - d;
                if dp <= 0.0 {
                    kept.push(p);
                    if dp.abs() <= on_tol {
                        cut_points.push(p);
                    }
                }
                if (dp < -on_tol && dq > on_tol) || (dp > on_tol && dq < -on_tol) {
                    let t = dp / (dp - dq);
                    let x = p + (q - p) * t;
                    kept.push(x);
                    cut_points.push(x);
                }
            }
            if kept.len() >= 3 {
                out_faces.push(kept);
            }
        }

        if out_faces.is_empty() {
            return Polyhedron3::default();
        }

        if let Some(cap) = build_cap(&cut_points, n, on_tol) {
            out_faces.push(cap);
        }
        Polyhedron3 { faces: out_faces }
    }

    pub fn moments(&self) -> Moments<3> {
        super::moments::polyhedron_moments(&self.faces)
    }
}

/// Deduplicate the cut points and order them counterclockwise around `n`,
/// which winds the cap outward for the kept (`n·x <= d`) side.
fn build_cap(cut_points: &[Point<3>], n: Vector<3>, tol: f64) -> Option<Vec<Point<3>>> {
    let mut unique: Vec<Point<3>> = Vec::with_capacity(cut_points.len());
    for p in cut_points {
        if !unique.iter().any(|q| (*p - *q).norm() <= tol) {
            unique.push(*p);
        }
    }
    if unique.len() < 3 {
        return None;
    }
    // In-plane basis (u, v) with u x v = n.
    let mut axis = Vector::<3>::zero();
    let k_min = (0..3).min_by(|&i, &j| n[i].abs().partial_cmp(&n[j].abs()).unwrap())?;
    axis[k_min] = 1.0;
    let u = {
        let u = axis.cross(&n);
        u / u.norm()
    };
    let v = n.cross(&u);

    let center = super::point::centroid_of(&unique);
    unique.sort_by(|p, q| {
        let ap = f64::atan2(v.dot(&(*p - center)), u.dot(&(*p - center)));
        let aq = f64::atan2(v.dot(&(*q - center)), u.dot(&(*q - center)));
        ap.partial_cmp(&aq).unwrap_or(std::cmp::Ordering::Equal)
    });
    // u x v = -n basis would wind inward; with v = n x u, ascending angle
    // winds counterclockwise around n as required.
    Some(unique)
}

/// Intersection moments of two signed tetrahedra: both are oriented
/// positively, the first is clipped by the four face planes of the second,
/// and the result carries the product of the decomposition signs.
pub fn intersect_tets_moments(t1: &[Point<3>; 4], t2: &[Point<3>; 4]) -> Moments<3> {
    let (s1, mut poly) = Polyhedron3::from_signed_tet(t1);
    let (s2, clipper) = Polyhedron3::from_signed_tet(t2);
    if s1 == 0.0 || s2 == 0.0 {
        return Moments::zero();
    }
    for face in &clipper.faces {
        let (n, d) = super::moments::triangle_plane(face[0], face[1], face[2]);
        poly = poly.clip_halfspace(n, d);
        if poly.is_empty() {
            return Moments::zero();
        }
    }
    let mut m = poly.moments();
    m.scale(s1 * s2);
    m
}
