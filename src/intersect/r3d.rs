//! Polyhedron-polyhedron intersection moments in 3-D.
//!
//! Both cells are decomposed into signed tetrahedra (faces fanned from
//! their centroids, joined to the cell centroid); each source tet is
//! clipped against each target tet and the signed pieces are summed. The
//! moments over the target from a single source cell are therefore exact
//! for arbitrary star-shaped cells.

use super::MeshIntersect;
use crate::geometry::clip::intersect_tets_moments;
use crate::geometry::moments::Moments;
use crate::mesh::control_volume::{Decompose3, Simplex3};
use crate::remap_error::RemapError;
use crate::support::{NumericTolerances, Weight};

pub struct IntersectR3D<'a, S, T> {
    source: &'a S,
    target: &'a T,
    tols: NumericTolerances,
}

impl<'a, S: Decompose3, T: Decompose3> IntersectR3D<'a, S, T> {
    pub fn new(source: &'a S, target: &'a T, tols: NumericTolerances) -> Self {
        Self { source, target, tols }
    }

    /// Moments of a target cell against an explicit tetrahedral piece list
    /// (a material polyhedron); used by the multi-material path.
    pub fn moments_with_pieces(
        &self,
        target_id: usize,
        pieces: &[Simplex3],
    ) -> Result<Moments<3>, RemapError> {
        let target_tets = self.target.simplices(target_id);
        let mut m = Moments::zero();
        for p in pieces {
            for tt in &target_tets {
                m.accumulate(&intersect_tets_moments(&p.0, &tt.0));
            }
        }
        if m.volume < self.tols.minimal_intersection_volume {
            return Err(RemapError::NegativeIntersectionVolume {
                target: target_id,
                source_cell: usize::MAX,
                volume: m.volume,
            });
        }
        Ok(m)
    }
}

impl<'a, S: Decompose3, T: Decompose3> MeshIntersect<3> for IntersectR3D<'a, S, T> {
    fn intersect(
        &self,
        target_id: usize,
        candidates: &[usize],
    ) -> Result<Vec<Weight>, RemapError> {
        let target_tets = self.target.simplices(target_id);
        let mut weights = Vec::with_capacity(candidates.len());
        for &s in candidates {
            let mut m = Moments::zero();
            for st in self.source.simplices(s) {
                for tt in &target_tets {
                    m.accumulate(&intersect_tets_moments(&st.0, &tt.0));
                }
            }
            if m.volume < self.tols.minimal_intersection_volume {
                return Err(RemapError::NegativeIntersectionVolume {
                    target: target_id,
                    source_cell: s,
                    volume: m.volume,
                });
            }
            if m.volume <= 0.0 {
                continue;
            }
            weights.push(Weight::new(s, m.to_weight_vec()));
        }
        Ok(weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::control_volume::{CellVolumes, ControlVolumes};
    use crate::mesh::simple::SimpleMesh;
    use crate::search::SearchKdTree;

    #[test]
    fn two_to_three_overlaps_sum_to_target_volume() {
        let src = SimpleMesh::<3>::new([0.0; 3], [1.0; 3], [2, 2, 2]);
        let tgt = SimpleMesh::<3>::new([0.0; 3], [1.0; 3], [3, 3, 3]);
        let scv = CellVolumes::new(&src);
        let tcv = CellVolumes::new(&tgt);
        let tols = NumericTolerances::default();
        let search = SearchKdTree::new(&scv, &tcv, tols);
        let ix = IntersectR3D::new(&scv, &tcv, tols);

        for t in 0..27 {
            let weights = ix.intersect(t, &search.candidates(t)).unwrap();
            let total: f64 = weights.iter().map(|w| w.volume()).sum();
            assert!(
                (total - tcv.volume(t)).abs() < 1e-12,
                "target {t}: covered {total}"
            );
        }
    }

    #[test]
    fn shifted_cube_overlap_moments() {
        let src = SimpleMesh::<3>::new([0.0; 3], [1.0; 3], [1, 1, 1]);
        let tgt = SimpleMesh::<3>::new([0.5, 0.0, 0.0], [1.5, 1.0, 1.0], [1, 1, 1]);
        let scv = CellVolumes::new(&src);
        let tcv = CellVolumes::new(&tgt);
        let tols = NumericTolerances::default();
        let ix = IntersectR3D::new(&scv, &tcv, tols);
        let weights = ix.intersect(0, &[0]).unwrap();
        assert_eq!(weights.len(), 1);
        let w = &weights[0];
        assert!((w.volume() - 0.5).abs() < 1e-12);
        assert!((w.moments[1] / w.volume() - 0.75).abs() < 1e-12);
        assert!((w.moments[2] / w.volume() - 0.5).abs() < 1e-12);
        assert!((w.moments[3] / w.volume() - 0.5).abs() < 1e-12);
    }
}
