//! The mesh contract consumed by the remap pipeline.
//!
//! The core never implements a mesh; it programs exclusively against
//! [`MeshView`], which any container can satisfy. Two implementations ship
//! with the crate: [`simple::SimpleMesh`], a uniform-grid reference wrapper
//! used by the test-suite, and [`crate::flat::FlatMesh`], the
//! redistribution-friendly container the distributor operates on.
//!
//! In 2-D, "faces" are the edges of the mesh. Cell node loops are
//! counterclockwise in 2-D; 3-D face loops are wound so that the face
//! normal with `dir = true` points out of the cell.

pub mod control_volume;
pub mod dual;
pub mod simple;

use crate::geometry::{BoundingBox, Point};
use crate::support::{EntityKind, EntityType};

/// Read-only view of an unstructured mesh in `D` dimensions.
pub trait MeshView<const D: usize> {
    fn num_owned_cells(&self) -> usize;
    fn num_ghost_cells(&self) -> usize;
    fn num_owned_nodes(&self) -> usize;
    fn num_ghost_nodes(&self) -> usize;
    fn num_owned_faces(&self) -> usize;
    fn num_ghost_faces(&self) -> usize;

    /// Node indices of a cell; counterclockwise in 2-D.
    fn cell_nodes(&self, c: usize) -> Vec<usize>;
    /// Face indices of a cell and, per face, whether the face's natural
    /// orientation points out of this cell.
    fn cell_faces_and_dirs(&self, c: usize) -> (Vec<usize>, Vec<bool>);
    /// Node indices of a face in winding order.
    fn face_nodes(&self, f: usize) -> Vec<usize>;
    /// The one or two cells incident on a face.
    fn face_cells(&self, f: usize) -> Vec<usize>;
    /// Cells incident on a node.
    fn node_cells(&self, n: usize) -> Vec<usize>;

    fn node_coordinate(&self, n: usize) -> Point<D>;
    fn cell_centroid(&self, c: usize) -> Point<D>;
    fn cell_volume(&self, c: usize) -> f64;

    fn cell_global_id(&self, c: usize) -> u64;
    fn node_global_id(&self, n: usize) -> u64;
    fn face_global_id(&self, f: usize) -> u64;

    // --- provided queries ---

    fn space_dimension(&self) -> usize {
        D
    }

    fn num_cells(&self) -> usize {
        self.num_owned_cells() + self.num_ghost_cells()
    }

    fn num_nodes(&self) -> usize {
        self.num_owned_nodes() + self.num_ghost_nodes()
    }

    fn num_faces(&self) -> usize {
        self.num_owned_faces() + self.num_ghost_faces()
    }

    fn num_entities(&self, kind: EntityKind, etype: EntityType) -> usize {
        let (owned, all) = match kind {
            EntityKind::Cell => (self.num_owned_cells(), self.num_cells()),
            EntityKind::Node => (self.num_owned_nodes(), self.num_nodes()),
            EntityKind::Face | EntityKind::Edge => (self.num_owned_faces(), self.num_faces()),
            _ => (0, 0),
        };
        match etype {
            EntityType::Owned => owned,
            EntityType::Ghost => all - owned,
            EntityType::All => all,
        }
    }

    /// Coordinates of a cell's nodes in loop order.
    fn cell_coordinates(&self, c: usize) -> Vec<Point<D>> {
        self.cell_nodes(c)
            .into_iter()
            .map(|n| self.node_coordinate(n))
            .collect()
    }

    fn cell_bounding_box(&self, c: usize) -> BoundingBox<D> {
        BoundingBox::from_points(&self.cell_coordinates(c))
    }

    /// Cells sharing a face with `c`, in face order.
    fn cell_face_neighbors(&self, c: usize) -> Vec<usize> {
        let (faces, _) = self.cell_faces_and_dirs(c);
        let mut out = Vec::with_capacity(faces.len());
        for f in faces {
            for fc in self.face_cells(f) {
                if fc != c {
                    out.push(fc);
                }
            }
        }
        out
    }

    /// Nodes connected to `n` through a face/edge of an incident cell,
    /// deduplicated and sorted.
    fn node_neighbors(&self, n: usize) -> Vec<usize> {
        let mut out = Vec::new();
        for c in self.node_cells(n) {
            let (faces, _) = self.cell_faces_and_dirs(c);
            for f in faces {
                let fnodes = self.face_nodes(f);
                let len = fnodes.len();
                if len == 2 {
                    // 2-D edge: the other endpoint.
                    if fnodes[0] == n {
                        out.push(fnodes[1]);
                    } else if fnodes[1] == n {
                        out.push(fnodes[0]);
                    }
                } else if let Some(k) = fnodes.iter().position(|&x| x == n) {
                    out.push(fnodes[(k + 1) % len]);
                    out.push(fnodes[(k + len - 1) % len]);
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    fn cell_on_exterior_boundary(&self, c: usize) -> bool {
        let (faces, _) = self.cell_faces_and_dirs(c);
        faces.iter().any(|&f| self.face_cells(f).len() < 2)
    }

    fn node_on_exterior_boundary(&self, n: usize) -> bool {
        for c in self.node_cells(n) {
            let (faces, _) = self.cell_faces_and_dirs(c);
            for f in faces {
                if self.face_cells(f).len() < 2 && self.face_nodes(f).contains(&n) {
                    return true;
                }
            }
        }
        false
    }

    fn on_exterior_boundary(&self, kind: EntityKind, id: usize) -> bool {
        match kind {
            EntityKind::Cell => self.cell_on_exterior_boundary(id),
            EntityKind::Node => self.node_on_exterior_boundary(id),
            _ => false,
        }
    }
}

impl<const D: usize, M: MeshView<D> + ?Sized> MeshView<D> for &M {
    fn num_owned_cells(&self) -> usize {
        (**self).num_owned_cells()
    }
    fn num_ghost_cells(&self) -> usize {
        (**self).num_ghost_cells()
    }
    fn num_owned_nodes(&self) -> usize {
        (**self).num_owned_nodes()
    }
    fn num_ghost_nodes(&self) -> usize {
        (**self).num_ghost_nodes()
    }
    fn num_owned_faces(&self) -> usize {
        (**self).num_owned_faces()
    }
    fn num_ghost_faces(&self) -> usize {
        (**self).num_ghost_faces()
    }
    fn cell_nodes(&self, c: usize) -> Vec<usize> {
        (**self).cell_nodes(c)
    }
    fn cell_faces_and_dirs(&self, c: usize) -> (Vec<usize>, Vec<bool>) {
        (**self).cell_faces_and_dirs(c)
    }
    fn face_nodes(&self, f: usize) -> Vec<usize> {
        (**self).face_nodes(f)
    }
    fn face_cells(&self, f: usize) -> Vec<usize> {
        (**self).face_cells(f)
    }
    fn node_cells(&self, n: usize) -> Vec<usize> {
        (**self).node_cells(n)
    }
    fn node_coordinate(&self, n: usize) -> Point<D> {
        (**self).node_coordinate(n)
    }
    fn cell_centroid(&self, c: usize) -> Point<D> {
        (**self).cell_centroid(c)
    }
    fn cell_volume(&self, c: usize) -> f64 {
        (**self).cell_volume(c)
    }
    fn cell_global_id(&self, c: usize) -> u64 {
        (**self).cell_global_id(c)
    }
    fn node_global_id(&self, n: usize) -> u64 {
        (**self).node_global_id(n)
    }
    fn face_global_id(&self, f: usize) -> u64 {
        (**self).face_global_id(f)
    }
}
