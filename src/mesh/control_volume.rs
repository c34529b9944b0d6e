//! Control volumes: the uniform view of "the region an entity integrates
//! over" that the search, intersect, gradient and repair stages consume.
//!
//! For cell-centered remap the control volume of a cell is the cell itself;
//! for node-centered remap it is the node's dual cell, the union of its
//! wedges (see [`super::dual`]). Both are presented through the same trait
//! so the pipeline code is written once per dimension, not per entity kind.

use crate::geometry::moments::{tet_signed_volume, triangle_moments, Moments};
use crate::geometry::{BoundingBox, Point};
use crate::mesh::MeshView;

/// A signed triangle; positive orientation is counterclockwise.
#[derive(Copy, Clone, Debug)]
pub struct Simplex2(pub [Point<2>; 3]);

/// A signed tetrahedron.
#[derive(Copy, Clone, Debug)]
pub struct Simplex3(pub [Point<3>; 4]);

impl Simplex2 {
    pub fn moments(&self) -> Moments<2> {
        triangle_moments(self.0[0], self.0[1], self.0[2])
    }
}

impl Simplex3 {
    pub fn signed_volume(&self) -> f64 {
        tet_signed_volume(self.0[0], self.0[1], self.0[2], self.0[3])
    }

    pub fn moments(&self) -> Moments<3> {
        crate::geometry::moments::tet_moments(self.0[0], self.0[1], self.0[2], self.0[3])
    }

    /// The same tetrahedron with positive orientation.
    pub fn oriented(&self) -> Simplex3 {
        if self.signed_volume() < 0.0 {
            Simplex3([self.0[0], self.0[1], self.0[3], self.0[2]])
        } else {
            *self
        }
    }
}

/// Entity-kind-independent view of a set of control volumes.
pub trait ControlVolumes<const D: usize> {
    fn num_owned(&self) -> usize;
    fn num_all(&self) -> usize;
    fn volume(&self, id: usize) -> f64;
    fn centroid(&self, id: usize) -> Point<D>;
    fn bounding_box(&self, id: usize) -> BoundingBox<D>;
    /// Stencil for gradient reconstruction and repair adjacency.
    fn neighbors(&self, id: usize) -> Vec<usize>;
    /// Points at which the Barth-Jespersen limiter evaluates the linear
    /// reconstruction.
    fn hull_points(&self, id: usize) -> Vec<Point<D>>;
    fn on_exterior_boundary(&self, id: usize) -> bool;
    fn global_id(&self, id: usize) -> u64;
}

/// 2-D decomposition into signed triangles, plus the single-polygon view
/// the convex fast path can use when available.
pub trait Decompose2: ControlVolumes<2> {
    fn simplices(&self, id: usize) -> Vec<Simplex2>;
    /// The control volume as one polygon loop, if it is one (cells are,
    /// dual cells are not).
    fn polygon(&self, id: usize) -> Option<Vec<Point<2>>>;
}

/// 3-D decomposition into signed tetrahedra.
pub trait Decompose3: ControlVolumes<3> {
    fn simplices(&self, id: usize) -> Vec<Simplex3>;
}

/// Cells of a mesh viewed as control volumes.
pub struct CellVolumes<'a, M, const D: usize> {
    mesh: &'a M,
}

impl<'a, M: MeshView<D>, const D: usize> CellVolumes<'a, M, D> {
    pub fn new(mesh: &'a M) -> Self {
        Self { mesh }
    }

    pub fn mesh(&self) -> &'a M {
        self.mesh
    }
}

impl<'a, M: MeshView<D>, const D: usize> ControlVolumes<D> for CellVolumes<'a, M, D> {
    fn num_owned(&self) -> usize {
        self.mesh.num_owned_cells()
    }

    fn num_all(&self) -> usize {
        self.mesh.num_cells()
    }

    fn volume(&self, id: usize) -> f64 {
        self.mesh.cell_volume(id)
    }

    fn centroid(&self, id: usize) -> Point<D> {
        self.mesh.cell_centroid(id)
    }

    fn bounding_box(&self, id: usize) -> BoundingBox<D> {
        self.mesh.cell_bounding_box(id)
    }

    fn neighbors(&self, id: usize) -> Vec<usize> {
        self.mesh.cell_face_neighbors(id)
    }

    fn hull_points(&self, id: usize) -> Vec<Point<D>> {
        self.mesh.cell_coordinates(id)
    }

    fn on_exterior_boundary(&self, id: usize) -> bool {
        self.mesh.cell_on_exterior_boundary(id)
    }

    fn global_id(&self, id: usize) -> u64 {
        self.mesh.cell_global_id(id)
    }
}

impl<'a, M: MeshView<2>> Decompose2 for CellVolumes<'a, M, 2> {
    fn simplices(&self, id: usize) -> Vec<Simplex2> {
        let poly = self.mesh.cell_coordinates(id);
        let mut out = Vec::with_capacity(poly.len().saturating_sub(2));
        for i in 1..poly.len().saturating_sub(1) {
            out.push(Simplex2([poly[0], poly[i], poly[i + 1]]));
        }
        out
    }

    fn polygon(&self, id: usize) -> Option<Vec<Point<2>>> {
        Some(self.mesh.cell_coordinates(id))
    }
}

impl<'a, M: MeshView<3>> Decompose3 for CellVolumes<'a, M, 3> {
    fn simplices(&self, id: usize) -> Vec<Simplex3> {
        cell_tets(self.mesh, id)
    }
}

/// Decompose a 3-D cell into signed tetrahedra: each face is fanned into
/// triangles from the face centroid (outward winding per the face
/// direction) and joined to the cell centroid.
pub fn cell_tets<M: MeshView<3>>(mesh: &M, c: usize) -> Vec<Simplex3> {
    let gc = mesh.cell_centroid(c);
    let (faces, dirs) = mesh.cell_faces_and_dirs(c);
    let mut tets = Vec::new();
    for (f, dir) in faces.into_iter().zip(dirs) {
        let mut loop_pts: Vec<Point<3>> = mesh
            .face_nodes(f)
            .into_iter()
            .map(|n| mesh.node_coordinate(n))
            .collect();
        if !dir {
            loop_pts.reverse();
        }
        let gf = crate::geometry::point::centroid_of(&loop_pts);
        let len = loop_pts.len();
        for i in 0..len {
            let a = loop_pts[i];
            let b = loop_pts[(i + 1) % len];
            // Outward face triangle (gf, a, b) with apex at the cell
            // centroid yields a positive tet for a star-shaped cell.
            tets.push(Simplex3([gc, gf, a, b]));
        }
    }
    tets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::simple::SimpleMesh;

    #[test]
    fn cell_simplices_cover_cell_2d() {
        let mesh = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [2, 2]);
        let cv = CellVolumes::new(&mesh);
        for c in 0..cv.num_all() {
            let total: f64 = cv.simplices(c).iter().map(|s| s.moments().volume).sum();
            assert!((total - cv.volume(c)).abs() < 1e-14);
        }
    }

    #[test]
    fn cell_simplices_cover_cell_3d() {
        let mesh = SimpleMesh::<3>::new([0.0, 0.0, 0.0], [2.0, 1.0, 1.0], [2, 1, 1]);
        let cv = CellVolumes::new(&mesh);
        for c in 0..cv.num_all() {
            let tets = cv.simplices(c);
            assert!(tets.iter().all(|t| t.signed_volume() > 0.0));
            let total: f64 = tets.iter().map(|t| t.signed_volume()).sum();
            assert!((total - cv.volume(c)).abs() < 1e-13);
        }
    }

    #[test]
    fn oriented_tet_is_positive() {
        let t = Simplex3([
            Point([0.0, 0.0, 0.0]),
            Point([0.0, 1.0, 0.0]),
            Point([1.0, 0.0, 0.0]),
            Point([0.0, 0.0, 1.0]),
        ]);
        assert!(t.signed_volume() < 0.0);
        assert!(t.oriented().signed_volume() > 0.0);
    }
}
