//! Zeroth and first geometric moments of polygons and polyhedra.
//!
//! Moments are signed: a counterclockwise polygon (and a positively
//! oriented simplicial decomposition) yields positive volume. Polygons are
//! decomposed into a triangle fan from vertex 0 and polyhedra into
//! tetrahedra against a reference point; the signed pieces sum to the exact
//! moments for any simple (not necessarily convex) region.

use super::point::{Point, Vector};

/// Accumulated moments of a region: `volume = ∫ dV` and
/// `first[k] = ∫ x_k dV`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Moments<const D: usize> {
    pub volume: f64,
    pub first: [f64; D],
}

impl<const D: usize> Default for Moments<D> {
    fn default() -> Self {
        Self { volume: 0.0, first: [0.0; D] }
    }
}

impl<const D: usize> Moments<D> {
    pub fn zero() -> Self {
        Self { volume: 0.0, first: [0.0; D] }
    }

    #[inline]
    pub fn accumulate(&mut self, other: &Moments<D>) {
        self.volume += other.volume;
        for k in 0..D {
            self.first[k] += other.first[k];
        }
    }

    #[inline]
    pub fn scale(&mut self, s: f64) {
        self.volume *= s;
        for v in &mut self.first {
            *v *= s;
        }
    }

    /// Centroid `first / volume`; only meaningful for non-zero volume.
    pub fn centroid(&self) -> Point<D> {
        let mut c = [0.0; D];
        for k in 0..D {
            c[k] = self.first[k] / self.volume;
        }
        Point(c)
    }

    /// Flatten to the `[V, V·c_x, V·c_y (, V·c_z)]` layout carried in
    /// interpolation weights.
    pub fn to_weight_vec(&self) -> Vec<f64> {
        let mut w = Vec::with_capacity(1 + D);
        w.push(self.volume);
        w.extend_from_slice(&self.first);
        w
    }
}

/// Signed moments of the triangle `(a, b, c)`; positive for
/// counterclockwise orientation.
pub fn triangle_moments(a: Point<2>, b: Point<2>, c: Point<2>) -> Moments<2> {
    let area = 0.5 * (b - a).cross(&(c - a));
    let third = 1.0 / 3.0;
    Moments {
        volume: area,
        first: [
            area * (a[0] + b[0] + c[0]) * third,
            area * (a[1] + b[1] + c[1]) * third,
        ],
    }
}

/// Signed moments of a simple polygon, decomposed into a fan of signed
/// triangles from vertex 0.
pub fn polygon_moments(poly: &[Point<2>]) -> Moments<2> {
    let mut m = Moments::zero();
    if poly.len() < 3 {
        return m;
    }
    for i in 1..poly.len() - 1 {
        m.accumulate(&triangle_moments(poly[0], poly[i], poly[i + 1]));
    }
    m
}

/// Whether all successive edge cross-products of a polygon share one sign
/// to within `eps`; the convexity test the fast clipping path relies on.
pub fn polygon_is_convex(poly: &[Point<2>], eps: f64) -> bool {
    let n = poly.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0_f64;
    for i in 0..n {
        let e0 = poly[(i + 1) % n] - poly[i];
        let e1 = poly[(i + 2) % n] - poly[(i + 1) % n];
        let cross = e0.cross(&e1);
        if cross.abs() <= eps {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    sign != 0.0
}

/// Signed volume of the tetrahedron `(a, b, c, d)`:
/// `det(b-a, c-a, d-a) / 6`.
pub fn tet_signed_volume(a: Point<3>, b: Point<3>, c: Point<3>, d: Point<3>) -> f64 {
    let u = b - a;
    let v = c - a;
    let w = d - a;
    u.dot(&v.cross(&w)) / 6.0
}

/// Signed moments of the tetrahedron `(a, b, c, d)`.
pub fn tet_moments(a: Point<3>, b: Point<3>, c: Point<3>, d: Point<3>) -> Moments<3> {
    let vol = tet_signed_volume(a, b, c, d);
    Moments {
        volume: vol,
        first: [
            vol * 0.25 * (a[0] + b[0] + c[0] + d[0]),
            vol * 0.25 * (a[1] + b[1] + c[1] + d[1]),
            vol * 0.25 * (a[2] + b[2] + c[2] + d[2]),
        ],
    }
}

/// Signed moments of a polyhedron given by outward-wound face loops.
///
/// Each face is fanned into triangles from its first vertex and joined to a
/// reference point into signed tetrahedra; summed over all faces the signed
/// pieces reproduce the enclosed region exactly.
pub fn polyhedron_moments(faces: &[Vec<Point<3>>]) -> Moments<3> {
    let mut m = Moments::zero();
    // Reference point near the body keeps the signed pieces small.
    let reference = faces
        .iter()
        .find(|f| !f.is_empty())
        .map(|f| f[0])
        .unwrap_or_else(Point::origin);
    for face in faces {
        if face.len() < 3 {
            continue;
        }
        for i in 1..face.len() - 1 {
            m.accumulate(&tet_moments(reference, face[0], face[i], face[i + 1]));
        }
    }
    m
}

/// Outward-wound face loops of a positively oriented tetrahedron.
pub fn tet_faces(a: Point<3>, b: Point<3>, c: Point<3>, d: Point<3>) -> [Vec<Point<3>>; 4] {
    [
        vec![a, c, b],
        vec![a, b, d],
        vec![a, d, c],
        vec![b, c, d],
    ]
}

/// Unit-scaled plane `(normal, offset)` of a triangle, with `n·x <= off`
/// for points behind the triangle.
pub fn triangle_plane(a: Point<3>, b: Point<3>, c: Point<3>) -> (Vector<3>, f64) {
    let n = (b - a).cross(&(c - a));
    (n, n.dot(&a.as_vector()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_square_moments() {
        let sq = [
            Point([0.0, 0.0]),
            Point([1.0, 0.0]),
            Point([1.0, 1.0]),
            Point([0.0, 1.0]),
        ];
        let m = polygon_moments(&sq);
        assert!((m.volume - 1.0).abs() < 1e-15);
        let c = m.centroid();
        assert!((c[0] - 0.5).abs() < 1e-15);
        assert!((c[1] - 0.5).abs() < 1e-15);
    }

    #[test]
    fn clockwise_polygon_has_negative_area() {
        let sq = [
            Point([0.0, 0.0]),
            Point([0.0, 1.0]),
            Point([1.0, 1.0]),
            Point([1.0, 0.0]),
        ];
        assert!(polygon_moments(&sq).volume < 0.0);
    }

    #[test]
    fn nonconvex_polygon_detected() {
        let convex = [
            Point([0.0, 0.0]),
            Point([2.0, 0.0]),
            Point([2.0, 2.0]),
            Point([0.0, 2.0]),
        ];
        let dart = [
            Point([0.0, 0.0]),
            Point([2.0, 0.0]),
            Point([0.5, 0.5]),
            Point([0.0, 2.0]),
        ];
        assert!(polygon_is_convex(&convex, 1e-14));
        assert!(!polygon_is_convex(&dart, 1e-14));
    }

    #[test]
    fn nonconvex_fan_still_sums_exactly() {
        // L-shape of area 3 = 2x2 square minus 1x1 corner.
        let ell = [
            Point([0.0, 0.0]),
            Point([2.0, 0.0]),
            Point([2.0, 1.0]),
            Point([1.0, 1.0]),
            Point([1.0, 2.0]),
            Point([0.0, 2.0]),
        ];
        let m = polygon_moments(&ell);
        assert!((m.volume - 3.0).abs() < 1e-14);
    }

    #[test]
    fn unit_tet_volume() {
        let v = tet_signed_volume(
            Point([0.0, 0.0, 0.0]),
            Point([1.0, 0.0, 0.0]),
            Point([0.0, 1.0, 0.0]),
            Point([0.0, 0.0, 1.0]),
        );
        assert!((v - 1.0 / 6.0).abs() < 1e-15);
    }

    #[test]
    fn cube_from_faces() {
        let p = |x: f64, y: f64, z: f64| Point([x, y, z]);
        // Outward-wound faces of the unit cube.
        let faces = vec![
            vec![p(0., 0., 0.), p(0., 1., 0.), p(1., 1., 0.), p(1., 0., 0.)], // z=0
            vec![p(0., 0., 1.), p(1., 0., 1.), p(1., 1., 1.), p(0., 1., 1.)], // z=1
            vec![p(0., 0., 0.), p(0., 0., 1.), p(0., 1., 1.), p(0., 1., 0.)], // x=0
            vec![p(1., 0., 0.), p(1., 1., 0.), p(1., 1., 1.), p(1., 0., 1.)], // x=1
            vec![p(0., 0., 0.), p(1., 0., 0.), p(1., 0., 1.), p(0., 0., 1.)], // y=0
            vec![p(0., 1., 0.), p(0., 1., 1.), p(1., 1., 1.), p(1., 1., 0.)], // y=1
        ];
        let m = polyhedron_moments(&faces);
        assert!((m.volume - 1.0).abs() < 1e-14);
        let c = m.centroid();
        for k in 0..3 {
            assert!((c[k] - 0.5).abs() < 1e-14);
        }
    }

    #[test]
    fn tet_faces_enclose_tet() {
        let (a, b, c, d) = (
            Point([0.0, 0.0, 0.0]),
            Point([2.0, 0.0, 0.0]),
            Point([0.0, 2.0, 0.0]),
            Point([0.0, 0.0, 2.0]),
        );
        let m = polyhedron_moments(&tet_faces(a, b, c, d));
        assert!((m.volume - tet_signed_volume(a, b, c, d)).abs() < 1e-14);
    }
}
