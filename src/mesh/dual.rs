//! Dual control volumes for node-centered remap.
//!
//! The dual cell of a node is the union of its corners: per incident cell,
//! in 2-D the quad spanned by the node, the two adjacent edge midpoints and
//! the cell centroid; in 3-D the wedge tetrahedra spanned by the node, an
//! edge midpoint, a face centroid and the cell centroid. The wedge pieces
//! are returned as positively oriented simplices, so the piecewise
//! intersection machinery applies to dual cells unchanged.
//!
//! The bounding box of a dual cell is the union of the incident cells'
//! boxes; a conservative superset, which is all the search stage needs.

use super::control_volume::{ControlVolumes, Decompose2, Decompose3, Simplex2, Simplex3};
use super::MeshView;
use crate::geometry::point::{centroid_of, midpoint};
use crate::geometry::{BoundingBox, Point};

/// Nodes of a mesh viewed as dual-cell control volumes.
pub struct DualVolumes<'a, M, const D: usize> {
    mesh: &'a M,
}

impl<'a, M: MeshView<D>, const D: usize> DualVolumes<'a, M, D> {
    pub fn new(mesh: &'a M) -> Self {
        Self { mesh }
    }

    pub fn mesh(&self) -> &'a M {
        self.mesh
    }
}

/// 2-D wedge triangles of node `n` inside cell `c`.
fn wedges_2d<M: MeshView<2>>(mesh: &M, n: usize, c: usize) -> Vec<Simplex2> {
    let nodes = mesh.cell_nodes(c);
    let len = nodes.len();
    let Some(k) = nodes.iter().position(|&x| x == n) else {
        return Vec::new();
    };
    let xn = mesh.node_coordinate(n);
    let next = mesh.node_coordinate(nodes[(k + 1) % len]);
    let prev = mesh.node_coordinate(nodes[(k + len - 1) % len]);
    let m_next = midpoint(xn, next);
    let m_prev = midpoint(xn, prev);
    let gc = mesh.cell_centroid(c);
    // Both triangles are counterclockwise for a ccw cell loop.
    vec![
        Simplex2([xn, m_next, gc]),
        Simplex2([xn, gc, m_prev]),
    ]
}

/// 3-D wedge tetrahedra of node `n` inside cell `c`.
fn wedges_3d<M: MeshView<3>>(mesh: &M, n: usize, c: usize) -> Vec<Simplex3> {
    let xn = mesh.node_coordinate(n);
    let gc = mesh.cell_centroid(c);
    let (faces, dirs) = mesh.cell_faces_and_dirs(c);
    let mut out = Vec::new();
    for (f, dir) in faces.into_iter().zip(dirs) {
        let mut fnodes = mesh.face_nodes(f);
        if !dir {
            fnodes.reverse();
        }
        let len = fnodes.len();
        let Some(k) = fnodes.iter().position(|&x| x == n) else {
            continue;
        };
        let pts: Vec<Point<3>> = fnodes.iter().map(|&x| mesh.node_coordinate(x)).collect();
        let gf = centroid_of(&pts);
        let m_next = midpoint(xn, pts[(k + 1) % len]);
        let m_prev = midpoint(xn, pts[(k + len - 1) % len]);
        out.push(Simplex3([xn, m_next, gf, gc]).oriented());
        out.push(Simplex3([xn, gf, m_prev, gc]).oriented());
    }
    out
}

impl<'a, M: MeshView<D>, const D: usize> ControlVolumes<D> for DualVolumes<'a, M, D>
where
    Self: DualPieces<D>,
{
    fn num_owned(&self) -> usize {
        self.mesh.num_owned_nodes()
    }

    fn num_all(&self) -> usize {
        self.mesh.num_nodes()
    }

    fn volume(&self, id: usize) -> f64 {
        self.piece_moments(id).0
    }

    /// The node position itself: node values are point values there, so it
    /// is the reference point for gradient stencils and reconstruction.
    fn centroid(&self, id: usize) -> Point<D> {
        self.mesh.node_coordinate(id)
    }

    fn bounding_box(&self, id: usize) -> BoundingBox<D> {
        let mut b = BoundingBox::empty();
        for c in self.mesh.node_cells(id) {
            b.merge(&self.mesh.cell_bounding_box(c));
        }
        b
    }

    fn neighbors(&self, id: usize) -> Vec<usize> {
        self.mesh.node_neighbors(id)
    }

    fn hull_points(&self, id: usize) -> Vec<Point<D>> {
        self.piece_points(id)
    }

    fn on_exterior_boundary(&self, id: usize) -> bool {
        self.mesh.node_on_exterior_boundary(id)
    }

    fn global_id(&self, id: usize) -> u64 {
        self.mesh.node_global_id(id)
    }
}

/// Dimension-specific access to the wedge decomposition, shared by the
/// `ControlVolumes` impl above.
pub trait DualPieces<const D: usize> {
    fn piece_moments(&self, id: usize) -> (f64, [f64; D]);
    fn piece_points(&self, id: usize) -> Vec<Point<D>>;
}

impl<'a, M: MeshView<2>> DualPieces<2> for DualVolumes<'a, M, 2> {
    fn piece_moments(&self, id: usize) -> (f64, [f64; 2]) {
        let mut vol = 0.0;
        let mut first = [0.0; 2];
        for s in self.simplices(id) {
            let m = s.moments();
            vol += m.volume;
            first[0] += m.first[0];
            first[1] += m.first[1];
        }
        (vol, first)
    }

    fn piece_points(&self, id: usize) -> Vec<Point<2>> {
        let mut pts = Vec::new();
        for s in self.simplices(id) {
            pts.extend_from_slice(&s.0);
        }
        pts
    }
}

impl<'a, M: MeshView<3>> DualPieces<3> for DualVolumes<'a, M, 3> {
    fn piece_moments(&self, id: usize) -> (f64, [f64; 3]) {
        let mut vol = 0.0;
        let mut first = [0.0; 3];
        for s in self.simplices(id) {
            let m = s.moments();
            vol += m.volume;
            for k in 0..3 {
                first[k] += m.first[k];
            }
        }
        (vol, first)
    }

    fn piece_points(&self, id: usize) -> Vec<Point<3>> {
        let mut pts = Vec::new();
        for s in self.simplices(id) {
            pts.extend_from_slice(&s.0);
        }
        pts
    }
}

impl<'a, M: MeshView<2>> Decompose2 for DualVolumes<'a, M, 2> {
    fn simplices(&self, id: usize) -> Vec<Simplex2> {
        let mut out = Vec::new();
        for c in self.mesh.node_cells(id) {
            out.extend(wedges_2d(self.mesh, id, c));
        }
        out
    }

    fn polygon(&self, _id: usize) -> Option<Vec<Point<2>>> {
        // Dual cells are unions of corner quads, not a single loop.
        None
    }
}

impl<'a, M: MeshView<3>> Decompose3 for DualVolumes<'a, M, 3> {
    fn simplices(&self, id: usize) -> Vec<Simplex3> {
        let mut out = Vec::new();
        for c in self.mesh.node_cells(id) {
            out.extend(wedges_3d(self.mesh, id, c));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::simple::SimpleMesh;

    #[test]
    fn dual_volumes_partition_domain_2d() {
        let mesh = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [3, 3]);
        let dual = DualVolumes::new(&mesh);
        let total: f64 = (0..dual.num_all()).map(|n| dual.volume(n)).sum();
        assert!((total - 1.0).abs() < 1e-13);
        // Interior node of a uniform 3x3 grid owns one full cell's worth.
        let cell_vol = 1.0 / 9.0;
        let n_interior = mesh.node_index([1, 1]);
        assert!((dual.volume(n_interior) - cell_vol).abs() < 1e-14);
        // Corner node owns a quarter cell.
        let n_corner = mesh.node_index([0, 0]);
        assert!((dual.volume(n_corner) - 0.25 * cell_vol).abs() < 1e-14);
    }

    #[test]
    fn dual_volumes_partition_domain_3d() {
        let mesh = SimpleMesh::<3>::new([0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2, 2, 2]);
        let dual = DualVolumes::new(&mesh);
        let total: f64 = (0..dual.num_all()).map(|n| dual.volume(n)).sum();
        assert!((total - 1.0).abs() < 1e-12);
        // The body-center node of a 2x2x2 grid owns one full cell's worth.
        let center = mesh.node_index([1, 1, 1]);
        assert!((dual.volume(center) - 0.125).abs() < 1e-13);
    }

    #[test]
    fn dual_volume_centroid_of_interior_node_is_the_node() {
        // For an interior node of a uniform grid the dual cell's volume
        // centroid coincides with the node, so the reference point the
        // trait reports is also the mass center.
        let mesh = SimpleMesh::<2>::new([0.0, 0.0], [2.0, 2.0], [2, 2]);
        let dual = DualVolumes::new(&mesh);
        let n = mesh.node_index([1, 1]);
        let x = mesh.node_coordinate(n);
        let (vol, first) = dual.piece_moments(n);
        assert!((first[0] / vol - x[0]).abs() < 1e-14);
        assert!((first[1] / vol - x[1]).abs() < 1e-14);
        assert_eq!(dual.centroid(n), x);
    }
}
