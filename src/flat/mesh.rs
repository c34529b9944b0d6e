//! `FlatMesh`: a redistribution-friendly mesh container.
//!
//! Everything is a contiguous array: interleaved node coordinates,
//! CSR cell→node (and, in 3-D, cell→face and face→node) adjacency with
//! implicit prefix-sum offsets, and parallel global-id arrays. The
//! distributor ships these arrays wholesale, installs the received data
//! through the `set_*` mutators, and calls [`FlatMesh::finish_init`],
//! which derives prefix sums, inverse adjacency (node→cell, face→cell),
//! cell centroids/volumes, bounding boxes, and (in 2-D) the edge lists
//! that serve as faces.
//!
//! Geometry queries panic before `finish_init` has run; structural
//! problems surface there as errors, not later.

use crate::geometry::moments::{polygon_moments, polyhedron_moments};
use crate::geometry::{BoundingBox, Point};
use crate::mesh::MeshView;
use crate::remap_error::RemapError;
use hashbrown::HashMap;

#[derive(Clone, Debug, Default)]
pub struct FlatMesh<const D: usize> {
    // Shipped data.
    coords: Vec<f64>,
    cell_node_counts: Vec<usize>,
    cell_to_node: Vec<usize>,
    cell_face_counts: Vec<usize>,
    cell_to_face: Vec<usize>,
    cell_to_face_dirs: Vec<bool>,
    face_node_counts: Vec<usize>,
    face_to_node: Vec<usize>,
    cell_global_ids: Vec<u64>,
    node_global_ids: Vec<u64>,
    face_global_ids: Vec<u64>,
    owned_cells: usize,
    owned_nodes: usize,
    owned_faces: usize,

    // Derived by finish_init.
    cell_node_offsets: Vec<usize>,
    cell_face_offsets: Vec<usize>,
    face_node_offsets: Vec<usize>,
    node_cell_offsets: Vec<usize>,
    node_cell_list: Vec<usize>,
    face_cell_offsets: Vec<usize>,
    face_cell_list: Vec<usize>,
    cell_centroids: Vec<f64>,
    cell_volumes: Vec<f64>,
    cell_boxes: Vec<BoundingBox<D>>,
    finalized: bool,
}

fn prefix_sum(counts: &[usize]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(counts.len() + 1);
    let mut acc = 0;
    offsets.push(0);
    for &c in counts {
        acc += c;
        offsets.push(acc);
    }
    offsets
}

impl<const D: usize> FlatMesh<D> {
    /// Flatten any mesh into the contiguous representation. Counts and
    /// ghost layout are preserved; 2-D face/edge lists are not copied
    /// (they are re-derived by `finish_init`).
    pub fn from_mesh<M: MeshView<D>>(mesh: &M) -> Result<Self, RemapError> {
        let ncells = mesh.num_cells();
        let nnodes = mesh.num_nodes();

        let mut flat = FlatMesh::<D> {
            owned_cells: mesh.num_owned_cells(),
            owned_nodes: mesh.num_owned_nodes(),
            ..Default::default()
        };

        flat.coords.reserve(D * nnodes);
        for n in 0..nnodes {
            let p = mesh.node_coordinate(n);
            flat.coords.extend_from_slice(p.coords());
        }
        flat.node_global_ids = (0..nnodes).map(|n| mesh.node_global_id(n)).collect();
        flat.cell_global_ids = (0..ncells).map(|c| mesh.cell_global_id(c)).collect();

        for c in 0..ncells {
            let nodes = mesh.cell_nodes(c);
            flat.cell_node_counts.push(nodes.len());
            flat.cell_to_node.extend(nodes);
        }

        if D == 3 {
            let nfaces = mesh.num_faces();
            flat.owned_faces = mesh.num_owned_faces();
            flat.face_global_ids = (0..nfaces).map(|f| mesh.face_global_id(f)).collect();
            for f in 0..nfaces {
                let nodes = mesh.face_nodes(f);
                flat.face_node_counts.push(nodes.len());
                flat.face_to_node.extend(nodes);
            }
            for c in 0..ncells {
                let (faces, dirs) = mesh.cell_faces_and_dirs(c);
                flat.cell_face_counts.push(faces.len());
                flat.cell_to_face.extend(faces);
                flat.cell_to_face_dirs.extend(dirs);
            }
        }

        flat.finish_init()?;
        Ok(flat)
    }

    // --- mutators used by the distributor ---

    pub fn set_coords(&mut self, coords: Vec<f64>) {
        self.coords = coords;
        self.finalized = false;
    }

    pub fn set_cell_node_counts(&mut self, counts: Vec<usize>) {
        self.cell_node_counts = counts;
        self.finalized = false;
    }

    pub fn set_cell_to_node(&mut self, list: Vec<usize>) {
        self.cell_to_node = list;
        self.finalized = false;
    }

    pub fn set_cell_face_counts(&mut self, counts: Vec<usize>) {
        self.cell_face_counts = counts;
        self.finalized = false;
    }

    pub fn set_cell_to_face(&mut self, list: Vec<usize>, dirs: Vec<bool>) {
        self.cell_to_face = list;
        self.cell_to_face_dirs = dirs;
        self.finalized = false;
    }

    pub fn set_face_node_counts(&mut self, counts: Vec<usize>) {
        self.face_node_counts = counts;
        self.finalized = false;
    }

    pub fn set_face_to_node(&mut self, list: Vec<usize>) {
        self.face_to_node = list;
        self.finalized = false;
    }

    pub fn set_cell_global_ids(&mut self, gids: Vec<u64>) {
        self.cell_global_ids = gids;
        self.finalized = false;
    }

    pub fn set_node_global_ids(&mut self, gids: Vec<u64>) {
        self.node_global_ids = gids;
        self.finalized = false;
    }

    pub fn set_face_global_ids(&mut self, gids: Vec<u64>) {
        self.face_global_ids = gids;
        self.finalized = false;
    }

    pub fn set_num_owned_cells(&mut self, n: usize) {
        self.owned_cells = n;
    }

    pub fn set_num_owned_nodes(&mut self, n: usize) {
        self.owned_nodes = n;
    }

    pub fn set_num_owned_faces(&mut self, n: usize) {
        self.owned_faces = n;
    }

    // --- accessors the distributor reads before shipping ---

    pub fn get_coords(&self) -> &[f64] {
        &self.coords
    }

    pub fn get_cell_node_counts(&self) -> &[usize] {
        &self.cell_node_counts
    }

    pub fn get_cell_to_node(&self) -> &[usize] {
        &self.cell_to_node
    }

    pub fn get_cell_face_counts(&self) -> &[usize] {
        &self.cell_face_counts
    }

    pub fn get_cell_to_face(&self) -> (&[usize], &[bool]) {
        (&self.cell_to_face, &self.cell_to_face_dirs)
    }

    pub fn get_face_node_counts(&self) -> &[usize] {
        &self.face_node_counts
    }

    pub fn get_face_to_node(&self) -> &[usize] {
        &self.face_to_node
    }

    pub fn get_cell_global_ids(&self) -> &[u64] {
        &self.cell_global_ids
    }

    pub fn get_node_global_ids(&self) -> &[u64] {
        &self.node_global_ids
    }

    pub fn get_face_global_ids(&self) -> &[u64] {
        &self.face_global_ids
    }

    /// Derive prefix sums, inverse adjacency, 2-D edges, and the geometry
    /// caches. Must be called after any batch of `set_*` mutations.
    pub fn finish_init(&mut self) -> Result<(), RemapError> {
        let ncells = self.cell_node_counts.len();
        if self.cell_global_ids.len() != ncells {
            return Err(RemapError::FlatMeshNotFinalized);
        }
        self.cell_node_offsets = prefix_sum(&self.cell_node_counts);
        if *self.cell_node_offsets.last().unwrap_or(&0) != self.cell_to_node.len() {
            return Err(RemapError::FlatMeshNotFinalized);
        }

        if D == 2 {
            self.derive_edges_2d();
        }
        self.cell_face_offsets = prefix_sum(&self.cell_face_counts);
        self.face_node_offsets = prefix_sum(&self.face_node_counts);

        // Inverse adjacency: node -> cells.
        let nnodes = self.node_global_ids.len();
        let mut node_counts = vec![0usize; nnodes];
        for &n in &self.cell_to_node {
            node_counts[n] += 1;
        }
        self.node_cell_offsets = prefix_sum(&node_counts);
        self.node_cell_list = vec![0; self.cell_to_node.len()];
        let mut cursor = self.node_cell_offsets.clone();
        for c in 0..ncells {
            for i in self.cell_node_offsets[c]..self.cell_node_offsets[c + 1] {
                let n = self.cell_to_node[i];
                self.node_cell_list[cursor[n]] = c;
                cursor[n] += 1;
            }
        }

        // Inverse adjacency: face -> cells.
        let nfaces = self.face_node_counts.len();
        let mut face_counts = vec![0usize; nfaces];
        for &f in &self.cell_to_face {
            face_counts[f] += 1;
        }
        self.face_cell_offsets = prefix_sum(&face_counts);
        self.face_cell_list = vec![0; self.cell_to_face.len()];
        let mut cursor = self.face_cell_offsets.clone();
        for c in 0..ncells {
            for i in self.cell_face_offsets[c]..self.cell_face_offsets[c + 1] {
                let f = self.cell_to_face[i];
                self.face_cell_list[cursor[f]] = c;
                cursor[f] += 1;
            }
        }

        self.compute_geometry()?;
        self.finalized = true;
        Ok(())
    }

    /// Build the edge list from the cell loops: one face per unique
    /// (unordered) node pair, oriented from the lower to the higher node
    /// index, with direction bits recomputed per cell.
    fn derive_edges_2d(&mut self) {
        let ncells = self.cell_node_counts.len();
        let mut edge_of: HashMap<(usize, usize), usize> = HashMap::new();
        self.face_node_counts.clear();
        self.face_to_node.clear();
        self.cell_face_counts.clear();
        self.cell_to_face.clear();
        self.cell_to_face_dirs.clear();

        for c in 0..ncells {
            let lo = self.cell_node_offsets[c];
            let hi = self.cell_node_offsets[c + 1];
            let loop_len = hi - lo;
            self.cell_face_counts.push(loop_len);
            for i in 0..loop_len {
                let a = self.cell_to_node[lo + i];
                let b = self.cell_to_node[lo + (i + 1) % loop_len];
                let key = (a.min(b), a.max(b));
                let id = *edge_of.entry(key).or_insert_with(|| {
                    let id = self.face_node_counts.len();
                    self.face_node_counts.push(2);
                    self.face_to_node.push(key.0);
                    self.face_to_node.push(key.1);
                    id
                });
                self.cell_to_face.push(id);
                // The cell traverses the edge a -> b; the canonical edge
                // runs key.0 -> key.1. For a ccw loop the outward normal
                // of the canonical edge coincides with the traversal
                // orientation.
                self.cell_to_face_dirs.push(a == key.0);
            }
        }
        self.face_global_ids = (0..self.face_node_counts.len() as u64).collect();
        self.owned_faces = self.face_node_counts.len();
    }

    fn node_point(&self, n: usize) -> Point<D> {
        let mut x = [0.0; D];
        x.copy_from_slice(&self.coords[D * n..D * (n + 1)]);
        Point(x)
    }

    fn compute_geometry(&mut self) -> Result<(), RemapError> {
        let ncells = self.cell_node_counts.len();
        self.cell_centroids = vec![0.0; D * ncells];
        self.cell_volumes = vec![0.0; ncells];
        self.cell_boxes = vec![BoundingBox::empty(); ncells];

        for c in 0..ncells {
            let lo = self.cell_node_offsets[c];
            let hi = self.cell_node_offsets[c + 1];
            if hi - lo < D + 1 {
                return Err(RemapError::DegenerateCell {
                    cell: c,
                    detail: "fewer nodes than a valid cell requires",
                });
            }
            for &n in &self.cell_to_node[lo..hi] {
                let p = self.node_point(n);
                self.cell_boxes[c].add_point(p);
            }

            if D == 2 {
                let poly: Vec<Point<2>> = self.cell_to_node[lo..hi]
                    .iter()
                    .map(|&n| Point([self.coords[2 * n], self.coords[2 * n + 1]]))
                    .collect();
                let m = polygon_moments(&poly);
                if m.volume <= 0.0 {
                    return Err(RemapError::DegenerateCell {
                        cell: c,
                        detail: "non-positive area (clockwise or collapsed loop)",
                    });
                }
                self.cell_volumes[c] = m.volume;
                self.cell_centroids[2 * c] = m.first[0] / m.volume;
                self.cell_centroids[2 * c + 1] = m.first[1] / m.volume;
            } else {
                let flo = self.cell_face_offsets[c];
                let fhi = self.cell_face_offsets[c + 1];
                let mut faces: Vec<Vec<Point<3>>> = Vec::with_capacity(fhi - flo);
                for i in flo..fhi {
                    let f = self.cell_to_face[i];
                    let dir = self.cell_to_face_dirs[i];
                    let nlo = self.face_node_offsets[f];
                    let nhi = self.face_node_offsets[f + 1];
                    let mut loop_pts: Vec<Point<3>> = self.face_to_node[nlo..nhi]
                        .iter()
                        .map(|&n| {
                            Point([
                                self.coords[3 * n],
                                self.coords[3 * n + 1],
                                self.coords[3 * n + 2],
                            ])
                        })
                        .collect();
                    if !dir {
                        loop_pts.reverse();
                    }
                    faces.push(loop_pts);
                }
                let m = polyhedron_moments(&faces);
                if m.volume <= 0.0 {
                    return Err(RemapError::DegenerateCell {
                        cell: c,
                        detail: "non-positive volume (inverted or collapsed cell)",
                    });
                }
                self.cell_volumes[c] = m.volume;
                for k in 0..3 {
                    self.cell_centroids[3 * c + k] = m.first[k] / m.volume;
                }
            }
        }
        Ok(())
    }

    #[inline]
    fn assert_finalized(&self) {
        assert!(self.finalized, "FlatMesh used before finish_init()");
    }
}

impl<const D: usize> MeshView<D> for FlatMesh<D> {
    fn num_owned_cells(&self) -> usize {
        self.owned_cells
    }

    fn num_ghost_cells(&self) -> usize {
        self.cell_node_counts.len() - self.owned_cells
    }

    fn num_owned_nodes(&self) -> usize {
        self.owned_nodes
    }

    fn num_ghost_nodes(&self) -> usize {
        self.node_global_ids.len() - self.owned_nodes
    }

    fn num_owned_faces(&self) -> usize {
        self.owned_faces
    }

    fn num_ghost_faces(&self) -> usize {
        self.face_node_counts.len() - self.owned_faces
    }

    fn cell_nodes(&self, c: usize) -> Vec<usize> {
        self.assert_finalized();
        self.cell_to_node[self.cell_node_offsets[c]..self.cell_node_offsets[c + 1]].to_vec()
    }

    fn cell_faces_and_dirs(&self, c: usize) -> (Vec<usize>, Vec<bool>) {
        self.assert_finalized();
        let lo = self.cell_face_offsets[c];
        let hi = self.cell_face_offsets[c + 1];
        (
            self.cell_to_face[lo..hi].to_vec(),
            self.cell_to_face_dirs[lo..hi].to_vec(),
        )
    }

    fn face_nodes(&self, f: usize) -> Vec<usize> {
        self.assert_finalized();
        self.face_to_node[self.face_node_offsets[f]..self.face_node_offsets[f + 1]].to_vec()
    }

    fn face_cells(&self, f: usize) -> Vec<usize> {
        self.assert_finalized();
        self.face_cell_list[self.face_cell_offsets[f]..self.face_cell_offsets[f + 1]].to_vec()
    }

    fn node_cells(&self, n: usize) -> Vec<usize> {
        self.assert_finalized();
        self.node_cell_list[self.node_cell_offsets[n]..self.node_cell_offsets[n + 1]].to_vec()
    }

    fn node_coordinate(&self, n: usize) -> Point<D> {
        self.node_point(n)
    }

    fn cell_centroid(&self, c: usize) -> Point<D> {
        self.assert_finalized();
        let mut x = [0.0; D];
        x.copy_from_slice(&self.cell_centroids[D * c..D * (c + 1)]);
        Point(x)
    }

    fn cell_volume(&self, c: usize) -> f64 {
        self.assert_finalized();
        self.cell_volumes[c]
    }

    fn cell_global_id(&self, c: usize) -> u64 {
        self.cell_global_ids[c]
    }

    fn node_global_id(&self, n: usize) -> u64 {
        self.node_global_ids[n]
    }

    fn face_global_id(&self, f: usize) -> u64 {
        self.face_global_ids[f]
    }

    fn cell_bounding_box(&self, c: usize) -> BoundingBox<D> {
        self.assert_finalized();
        self.cell_boxes[c]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::simple::SimpleMesh;

    #[test]
    fn flatten_preserves_geometry_2d() {
        let mesh = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [3, 2]);
        let flat = FlatMesh::from_mesh(&mesh).unwrap();
        assert_eq!(flat.num_owned_cells(), 6);
        assert_eq!(flat.num_owned_nodes(), 12);
        for c in 0..6 {
            assert!((flat.cell_volume(c) - mesh.cell_volume(c)).abs() < 1e-14);
            let fc = flat.cell_centroid(c);
            let mc = mesh.cell_centroid(c);
            assert!((fc[0] - mc[0]).abs() < 1e-14);
            assert!((fc[1] - mc[1]).abs() < 1e-14);
            assert_eq!(flat.cell_global_id(c), mesh.cell_global_id(c));
        }
    }

    #[test]
    fn derived_edges_connect_cells_2d() {
        let mesh = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [3, 3]);
        let flat = FlatMesh::from_mesh(&mesh).unwrap();
        // Euler: a 3x3 quad grid has 24 edges.
        assert_eq!(flat.num_owned_faces(), 24);
        for c in 0..9 {
            let mut nbrs = flat.cell_face_neighbors(c);
            nbrs.sort_unstable();
            let mut expect = mesh.cell_face_neighbors(c);
            expect.sort_unstable();
            assert_eq!(nbrs, expect, "cell {c}");
        }
    }

    #[test]
    fn flatten_preserves_geometry_3d() {
        let mesh = SimpleMesh::<3>::new([0.0; 3], [2.0, 1.0, 1.0], [2, 1, 1]);
        let flat = FlatMesh::from_mesh(&mesh).unwrap();
        assert_eq!(flat.num_owned_cells(), 2);
        assert_eq!(flat.num_owned_faces(), mesh.num_owned_faces());
        for c in 0..2 {
            assert!((flat.cell_volume(c) - 1.0).abs() < 1e-13);
            let fc = flat.cell_centroid(c);
            let mc = mesh.cell_centroid(c);
            for k in 0..3 {
                assert!((fc[k] - mc[k]).abs() < 1e-13);
            }
        }
        // The shared face has two incident cells.
        let shared: Vec<usize> = (0..flat.num_owned_faces())
            .filter(|&f| flat.face_cells(f).len() == 2)
            .collect();
        assert_eq!(shared.len(), 1);
    }

    #[test]
    fn inverted_cell_is_rejected() {
        let mut flat = FlatMesh::<2>::default();
        // Clockwise unit square.
        flat.set_coords(vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0]);
        flat.set_cell_node_counts(vec![4]);
        flat.set_cell_to_node(vec![0, 1, 2, 3]);
        flat.set_cell_global_ids(vec![0]);
        flat.set_node_global_ids(vec![0, 1, 2, 3]);
        flat.set_num_owned_cells(1);
        flat.set_num_owned_nodes(4);
        let err = flat.finish_init().unwrap_err();
        assert!(matches!(err, RemapError::DegenerateCell { .. }));
    }
}
