//! Material polygons/polyhedra and the interface-reconstruction contract.
//!
//! When a source cell holds several materials, the intersector first asks a
//! reconstructor for the region each material occupies (its matpoly), then
//! intersects each matpoly against the target cell. Reconstruction itself
//! is an external collaborator; the crate only defines the contract plus a
//! no-op implementation for single-material runs.

use crate::geometry::point::{centroid_of, Point};
use crate::mesh::control_volume::{Simplex2, Simplex3};

/// The region one material occupies inside a 2-D cell: a simple
/// counterclockwise polygon.
#[derive(Clone, Debug)]
pub struct MatPoly2(pub Vec<Point<2>>);

impl MatPoly2 {
    /// Signed triangle-fan decomposition, ready for piecewise clipping.
    pub fn simplices(&self) -> Vec<Simplex2> {
        let poly = &self.0;
        let mut out = Vec::with_capacity(poly.len().saturating_sub(2));
        for i in 1..poly.len().saturating_sub(1) {
            out.push(Simplex2([poly[0], poly[i], poly[i + 1]]));
        }
        out
    }
}

/// The region one material occupies inside a 3-D cell: outward-wound face
/// loops of a star-shaped polyhedron.
#[derive(Clone, Debug)]
pub struct MatPoly3 {
    pub faces: Vec<Vec<Point<3>>>,
}

impl MatPoly3 {
    /// Signed tetrahedral decomposition against the vertex centroid.
    pub fn simplices(&self) -> Vec<Simplex3> {
        let mut all_points = Vec::new();
        for f in &self.faces {
            all_points.extend_from_slice(f);
        }
        if all_points.is_empty() {
            return Vec::new();
        }
        let apex = centroid_of(&all_points);
        let mut out = Vec::new();
        for f in &self.faces {
            if f.len() < 3 {
                continue;
            }
            for i in 1..f.len() - 1 {
                out.push(Simplex3([apex, f[0], f[i], f[i + 1]]));
            }
        }
        out
    }
}

/// Supplier of per-material regions for 2-D multi-material cells.
pub trait InterfaceReconstructor2d {
    /// The (material id, matpoly) pairs of a cell; empty when the cell is
    /// single-material or no reconstruction is available.
    fn cell_matpolys(&self, cell: usize) -> Vec<(usize, MatPoly2)>;
}

/// Supplier of per-material regions for 3-D multi-material cells.
pub trait InterfaceReconstructor3d {
    fn cell_matpolys(&self, cell: usize) -> Vec<(usize, MatPoly3)>;
}

/// No-op reconstructor for single-material runs: reports no matpolys, so
/// every cell is treated as wholly occupied by each material it lists.
#[derive(Copy, Clone, Debug, Default)]
pub struct DummyInterfaceReconstructor;

impl InterfaceReconstructor2d for DummyInterfaceReconstructor {
    fn cell_matpolys(&self, _cell: usize) -> Vec<(usize, MatPoly2)> {
        Vec::new()
    }
}

impl InterfaceReconstructor3d for DummyInterfaceReconstructor {
    fn cell_matpolys(&self, _cell: usize) -> Vec<(usize, MatPoly3)> {
        Vec::new()
    }
}
