//! Swept-face intersection for Lagrangian-style remap between meshes with
//! identical topology and displaced vertex positions.
//!
//! For each face of a target cell, the region swept by the face between
//! its source and target positions is computed with consistent winding so
//! that outward flux is positive. A positive swept region is credited to
//! the neighbor across the face (material flowing in from the neighbor's
//! old position), a negative one to the cell itself; the weight list opens
//! with the source cell's own moments so the zeroth moments sum exactly to
//! the target cell volume. A swept region with mixed orientation signs is
//! a twisted face and aborts the remap.

use super::MeshIntersect;
use crate::geometry::moments::{polygon_moments, tet_moments, Moments};
use crate::geometry::point::Point;
use crate::mesh::MeshView;
use crate::remap_error::RemapError;
use crate::support::{NumericTolerances, Weight};

/// The cell across face `f` from `cell`, or `None` on the boundary.
fn face_neighbor<const D: usize, M: MeshView<D>>(mesh: &M, cell: usize, f: usize) -> Option<usize> {
    let cells = mesh.face_cells(f);
    if cells.len() == 2 {
        Some(if cells[0] == cell { cells[1] } else { cells[0] })
    } else {
        None
    }
}

pub struct IntersectSweptFace2D<'a, SM, TM> {
    source_mesh: &'a SM,
    target_mesh: &'a TM,
    tols: NumericTolerances,
}

impl<'a, SM: MeshView<2>, TM: MeshView<2>> IntersectSweptFace2D<'a, SM, TM> {
    pub fn new(source_mesh: &'a SM, target_mesh: &'a TM, tols: NumericTolerances) -> Self {
        Self { source_mesh, target_mesh, tols }
    }
}

impl<'a, SM: MeshView<2>, TM: MeshView<2>> MeshIntersect<2> for IntersectSweptFace2D<'a, SM, TM> {
    fn intersect(
        &self,
        target_id: usize,
        stencil: &[usize],
    ) -> Result<Vec<Weight>, RemapError> {
        // Source and target share ids under matching topology.
        let source_id = target_id;
        let dead_band = self.tols.minimal_intersection_volume.abs();
        let mut weights = Vec::new();

        // The source cell's own moments anchor the list.
        let vol = self.source_mesh.cell_volume(source_id);
        let cen = self.source_mesh.cell_centroid(source_id);
        weights.push(Weight::new(source_id, vec![vol, vol * cen[0], vol * cen[1]]));

        let (faces, dirs) = self.source_mesh.cell_faces_and_dirs(source_id);
        for (f, dir) in faces.into_iter().zip(dirs) {
            let nodes = self.source_mesh.face_nodes(f);
            let (n0, n1) = (nodes[0], nodes[1]);
            // Wind so that the swept area is positive on the outside of
            // the cell.
            let quad: [Point<2>; 4] = if dir {
                [
                    self.source_mesh.node_coordinate(n1),
                    self.source_mesh.node_coordinate(n0),
                    self.target_mesh.node_coordinate(n0),
                    self.target_mesh.node_coordinate(n1),
                ]
            } else {
                [
                    self.source_mesh.node_coordinate(n0),
                    self.source_mesh.node_coordinate(n1),
                    self.target_mesh.node_coordinate(n1),
                    self.target_mesh.node_coordinate(n0),
                ]
            };

            // Orientation of the two diagonal triangles (a,b,d), (b,c,d);
            // opposite signs mean the quad crosses itself.
            let [a, b, c, d] = quad;
            let det0 = (b - a).cross(&(d - a));
            let det1 = (c - b).cross(&(d - b));
            if (det0 > dead_band && det1 < -dead_band)
                || (det0 < -dead_band && det1 > dead_band)
            {
                return Err(RemapError::TwistedSweptFace { cell: source_id, face: f });
            }

            let m = polygon_moments(&quad);
            if m.volume.abs() <= dead_band {
                continue;
            }
            if m.volume < 0.0 {
                weights.push(Weight::new(source_id, m.to_weight_vec()));
            } else {
                match face_neighbor(self.source_mesh, source_id, f) {
                    // Outflow through a boundary face leaves the domain.
                    None => continue,
                    Some(neigh) => {
                        if !stencil.contains(&neigh) {
                            return Err(RemapError::InvalidSweptStencil(source_id));
                        }
                        weights.push(Weight::new(neigh, m.to_weight_vec()));
                    }
                }
            }
        }
        Ok(weights)
    }
}

pub struct IntersectSweptFace3D<'a, SM, TM> {
    source_mesh: &'a SM,
    target_mesh: &'a TM,
    tols: NumericTolerances,
}

impl<'a, SM: MeshView<3>, TM: MeshView<3>> IntersectSweptFace3D<'a, SM, TM> {
    pub fn new(source_mesh: &'a SM, target_mesh: &'a TM, tols: NumericTolerances) -> Self {
        Self { source_mesh, target_mesh, tols }
    }

    /// Signed moments of the regions swept by one face: the face loop is
    /// fanned into triangles from vertex 0 and each triangle's sweep (a
    /// prism split into three tetrahedra) is a separate region. Per
    /// region, the summed moments and the per-tet signed volumes for the
    /// twist check are returned.
    fn swept_regions(
        &self,
        fnodes: &[usize],
        reverse: bool,
    ) -> Vec<(Moments<3>, Vec<f64>)> {
        let mut ids = fnodes.to_vec();
        if reverse {
            ids.reverse();
        }
        let src: Vec<Point<3>> = ids
            .iter()
            .map(|&n| self.source_mesh.node_coordinate(n))
            .collect();
        let tgt: Vec<Point<3>> = ids
            .iter()
            .map(|&n| self.target_mesh.node_coordinate(n))
            .collect();

        let len = ids.len();
        let mut regions = Vec::with_capacity(len.saturating_sub(2));
        for i in 1..len.saturating_sub(1) {
            let (s0, s1, s2) = (src[0], src[i], src[i + 1]);
            let (t0, t1, t2) = (tgt[0], tgt[i], tgt[i + 1]);
            let mut m = Moments::zero();
            let mut tet_vols = Vec::with_capacity(3);
            for tet in [
                [s0, s1, s2, t0],
                [s1, s2, t0, t1],
                [s2, t0, t1, t2],
            ] {
                let tm = tet_moments(tet[0], tet[1], tet[2], tet[3]);
                tet_vols.push(tm.volume);
                m.accumulate(&tm);
            }
            regions.push((m, tet_vols));
        }
        regions
    }
}

impl<'a, SM: MeshView<3>, TM: MeshView<3>> MeshIntersect<3> for IntersectSweptFace3D<'a, SM, TM> {
    fn intersect(
        &self,
        target_id: usize,
        stencil: &[usize],
    ) -> Result<Vec<Weight>, RemapError> {
        let source_id = target_id;
        let dead_band = self.tols.minimal_intersection_volume.abs();
        let mut weights = Vec::new();

        let vol = self.source_mesh.cell_volume(source_id);
        let cen = self.source_mesh.cell_centroid(source_id);
        weights.push(Weight::new(
            source_id,
            vec![vol, vol * cen[0], vol * cen[1], vol * cen[2]],
        ));

        let (faces, dirs) = self.source_mesh.cell_faces_and_dirs(source_id);
        for (f, dir) in faces.into_iter().zip(dirs) {
            let fnodes = self.source_mesh.face_nodes(f);
            // Outward winding makes outward flux positive.
            for (m, tet_vols) in self.swept_regions(&fnodes, !dir) {
                let has_pos = tet_vols.iter().any(|&v| v > dead_band);
                let has_neg = tet_vols.iter().any(|&v| v < -dead_band);
                if has_pos && has_neg {
                    return Err(RemapError::TwistedSweptFace { cell: source_id, face: f });
                }

                if m.volume.abs() <= dead_band {
                    continue;
                }
                if m.volume < 0.0 {
                    weights.push(Weight::new(source_id, m.to_weight_vec()));
                } else {
                    match face_neighbor(self.source_mesh, source_id, f) {
                        None => continue,
                        Some(neigh) => {
                            if !stencil.contains(&neigh) {
                                return Err(RemapError::InvalidSweptStencil(source_id));
                            }
                            weights.push(Weight::new(neigh, m.to_weight_vec()));
                        }
                    }
                }
            }
        }
        Ok(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::simple::SimpleMesh;

    fn stencil_of<const D: usize, M: MeshView<D>>(mesh: &M, c: usize) -> Vec<usize> {
        let mut s = vec![c];
        s.extend(mesh.cell_face_neighbors(c));
        s
    }

    #[test]
    fn translated_grid_2d_weights_sum_to_cell_volume() {
        let src = SimpleMesh::<2>::new([0.0, 0.0], [3.0, 3.0], [3, 3]);
        let tgt = SimpleMesh::<2>::new([0.2, 0.1], [3.2, 3.1], [3, 3]);
        let tols = NumericTolerances::default();
        let ix = IntersectSweptFace2D::new(&src, &tgt, tols);

        let c = src.cell_index([1, 1]);
        let weights = ix.intersect(c, &stencil_of(&src, c)).unwrap();
        let total: f64 = weights.iter().map(|w| w.volume()).sum();
        // For an interior cell of a rigid translation the swept volumes
        // cancel against the base moment to the target cell volume.
        assert!((total - 1.0).abs() < 1e-13);
        // Positive swept regions landed on neighbors, negative on self.
        for w in &weights[1..] {
            if w.entity_id == c {
                assert!(w.volume() < 0.0);
            } else {
                assert!(w.volume() > 0.0);
            }
        }
    }

    #[test]
    fn twisted_face_is_rejected_2d() {
        // Shear the two nodes of the interior face in opposite directions
        // so the swept quadrilateral crosses itself.
        let src = SimpleMesh::<2>::new([0.0, 0.0], [2.0, 2.0], [2, 1]);
        struct Twisted {
            inner: SimpleMesh<2>,
        }
        impl MeshView<2> for Twisted {
            fn num_owned_cells(&self) -> usize {
                self.inner.num_owned_cells()
            }
            fn num_ghost_cells(&self) -> usize {
                0
            }
            fn num_owned_nodes(&self) -> usize {
                self.inner.num_owned_nodes()
            }
            fn num_ghost_nodes(&self) -> usize {
                0
            }
            fn num_owned_faces(&self) -> usize {
                self.inner.num_owned_faces()
            }
            fn num_ghost_faces(&self) -> usize {
                0
            }
            fn cell_nodes(&self, c: usize) -> Vec<usize> {
                self.inner.cell_nodes(c)
            }
            fn cell_faces_and_dirs(&self, c: usize) -> (Vec<usize>, Vec<bool>) {
                self.inner.cell_faces_and_dirs(c)
            }
            fn face_nodes(&self, f: usize) -> Vec<usize> {
                self.inner.face_nodes(f)
            }
            fn face_cells(&self, f: usize) -> Vec<usize> {
                self.inner.face_cells(f)
            }
            fn node_cells(&self, n: usize) -> Vec<usize> {
                self.inner.node_cells(n)
            }
            fn node_coordinate(&self, n: usize) -> Point<2> {
                let lo = self.inner.node_index([1, 0]);
                let hi = self.inner.node_index([1, 1]);
                let p = self.inner.node_coordinate(n);
                if n == lo {
                    Point([p[0] + 0.3, p[1]])
                } else if n == hi {
                    Point([p[0] - 0.3, p[1]])
                } else {
                    p
                }
            }
            fn cell_centroid(&self, c: usize) -> Point<2> {
                self.inner.cell_centroid(c)
            }
            fn cell_volume(&self, c: usize) -> f64 {
                self.inner.cell_volume(c)
            }
            fn cell_global_id(&self, c: usize) -> u64 {
                self.inner.cell_global_id(c)
            }
            fn node_global_id(&self, n: usize) -> u64 {
                self.inner.node_global_id(n)
            }
            fn face_global_id(&self, f: usize) -> u64 {
                self.inner.face_global_id(f)
            }
        }

        let tgt = Twisted { inner: SimpleMesh::<2>::new([0.0, 0.0], [2.0, 2.0], [2, 1]) };
        let tols = NumericTolerances::default();
        let ix = IntersectSweptFace2D::new(&src, &tgt, tols);
        let c = 0;
        let err = ix.intersect(c, &stencil_of(&src, c)).unwrap_err();
        assert!(matches!(err, RemapError::TwistedSweptFace { .. }));
    }

    #[test]
    fn translated_grid_3d_unit_regions() {
        // 3x3x3 grid on [0,6]^3, rigidly translated by (1,1,1): every
        // swept region of the center cell has volume exactly 2.
        let src = SimpleMesh::<3>::new([0.0; 3], [6.0; 3], [3, 3, 3]);
        let tgt = SimpleMesh::<3>::new([1.0; 3], [7.0; 3], [3, 3, 3]);
        let tols = NumericTolerances::default();
        let ix = IntersectSweptFace3D::new(&src, &tgt, tols);

        let c = src.cell_index([1, 1, 1]);
        let weights = ix.intersect(c, &stencil_of(&src, c)).unwrap();

        // Base moment plus two swept regions per face.
        assert_eq!(weights.len(), 13);
        assert!((weights[0].volume() - 8.0).abs() < 1e-12);
        let mut outgoing = 0.0;
        let mut signed = 0.0;
        for w in &weights[1..] {
            assert!((w.volume().abs() - 2.0).abs() < 1e-12);
            if w.volume() > 0.0 {
                outgoing += w.volume();
            }
            signed += w.volume();
        }
        // Outgoing flux: displacement . face area over the downwind faces.
        assert!((outgoing - 12.0).abs() < 1e-12);
        assert!(signed.abs() < 1e-12);
        // Total weight matches the target cell volume.
        let total: f64 = weights.iter().map(|w| w.volume()).sum();
        assert!((total - 8.0).abs() < 1e-12);
    }
}
