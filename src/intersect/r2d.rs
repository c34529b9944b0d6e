//! Polygon-polygon intersection moments in 2-D.
//!
//! Convex candidate/target pairs take the direct Sutherland-Hodgman path;
//! anything else is reduced to signed triangle fans whose pairwise clipped
//! moments sum to the exact result. A pair whose clipped output fails the
//! convexity check is dropped (the target falls back to its neighbors via
//! mismatch repair); a pair whose total volume is more negative than
//! `minimal_intersection_volume` aborts the remap.

use super::MeshIntersect;
use crate::geometry::clip::{
    intersect_convex_polygons_moments, intersect_triangles_moments,
};
use crate::geometry::moments::{polygon_is_convex, polygon_moments, Moments};
use crate::mesh::control_volume::{Decompose2, Simplex2};
use crate::remap_error::RemapError;
use crate::support::{NumericTolerances, Weight};

pub struct IntersectR2D<'a, S, T> {
    source: &'a S,
    target: &'a T,
    tols: NumericTolerances,
}

impl<'a, S: Decompose2, T: Decompose2> IntersectR2D<'a, S, T> {
    pub fn new(source: &'a S, target: &'a T, tols: NumericTolerances) -> Self {
        Self { source, target, tols }
    }

    /// Moments of one (target, candidate) overlap, or `None` when the
    /// convex fast path detected a degenerate output and the pair should
    /// be treated as empty.
    fn pair_moments(
        &self,
        target_poly: Option<&[crate::geometry::Point<2>]>,
        target_simplices: &[Simplex2],
        source_id: usize,
    ) -> Option<Moments<2>> {
        let eps = self.tols.polygon_convexity_eps;
        if let (Some(tp), Some(sp)) = (target_poly, self.source.polygon(source_id)) {
            if polygon_moments(tp).volume > 0.0
                && polygon_moments(&sp).volume > 0.0
                && polygon_is_convex(tp, eps)
                && polygon_is_convex(&sp, eps)
            {
                return intersect_convex_polygons_moments(&sp, tp, eps);
            }
        }
        let mut m = Moments::zero();
        for ss in self.source.simplices(source_id) {
            for ts in target_simplices {
                m.accumulate(&intersect_triangles_moments(&ss.0, &ts.0));
            }
        }
        Some(m)
    }

    /// Moments of a target cell against an explicit simplicial piece list
    /// (a material polygon); used by the multi-material path.
    pub fn moments_with_pieces(
        &self,
        target_id: usize,
        pieces: &[Simplex2],
    ) -> Result<Moments<2>, RemapError> {
        let target_simplices = self.target.simplices(target_id);
        let mut m = Moments::zero();
        for p in pieces {
            for ts in &target_simplices {
                m.accumulate(&intersect_triangles_moments(&p.0, &ts.0));
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

impl<'a, S: Decompose2, T: Decompose2> MeshIntersect<2> for IntersectR2D<'a, S, T> {
    fn intersect(
        &self,
        target_id: usize,
        candidates: &[usize],
    ) -> Result<Vec<Weight>, RemapError> {
        let target_poly = self.target.polygon(target_id);
        let target_simplices = self.target.simplices(target_id);
        let mut weights = Vec::with_capacity(candidates.len());
        for &s in candidates {
            let Some(m) = self.pair_moments(target_poly.as_deref(), &target_simplices, s)
            else {
                continue;
            };
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
    use crate::mesh::dual::DualVolumes;
    use crate::mesh::simple::SimpleMesh;
    use crate::search::SearchKdTree;

    #[test]
    fn four_to_five_overlaps_sum_to_target_volume() {
        let src = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [4, 4]);
        let tgt = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [5, 5]);
        let scv = CellVolumes::new(&src);
        let tcv = CellVolumes::new(&tgt);
        let tols = NumericTolerances::default();
        let search = SearchKdTree::new(&scv, &tcv, tols);
        let ix = IntersectR2D::new(&scv, &tcv, tols);

        for t in 0..25 {
            let weights = ix.intersect(t, &search.candidates(t)).unwrap();
            let total: f64 = weights.iter().map(|w| w.volume()).sum();
            assert!((total - tcv.volume(t)).abs() < 1e-13);
            for w in &weights {
                assert!(w.volume() > 0.0);
                // Overlap centroid lies inside the target's box.
                let c = [w.moments[1] / w.volume(), w.moments[2] / w.volume()];
                let bb = tcv.bounding_box(t);
                assert!(c[0] >= bb.min[0] - 1e-12 && c[0] <= bb.max[0] + 1e-12);
                assert!(c[1] >= bb.min[1] - 1e-12 && c[1] <= bb.max[1] + 1e-12);
            }
        }
    }

    #[test]
    fn identical_grids_give_identity_weights() {
        let src = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [3, 3]);
        let tgt = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [3, 3]);
        let scv = CellVolumes::new(&src);
        let tcv = CellVolumes::new(&tgt);
        let tols = NumericTolerances::default();
        let search = SearchKdTree::new(&scv, &tcv, tols);
        let ix = IntersectR2D::new(&scv, &tcv, tols);

        for t in 0..9 {
            let weights = ix.intersect(t, &search.candidates(t)).unwrap();
            // All mass comes from the matching source cell.
            let own: f64 = weights
                .iter()
                .filter(|w| w.entity_id == t)
                .map(|w| w.volume())
                .sum();
            assert!((own - tcv.volume(t)).abs() < 1e-13);
            let other: f64 = weights
                .iter()
                .filter(|w| w.entity_id != t)
                .map(|w| w.volume())
                .sum();
            assert!(other.abs() < 1e-13);
        }
    }

    #[test]
    fn dual_cells_intersect_piecewise() {
        // Node-centered: dual cells of identical grids match one-to-one.
        let src = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [3, 3]);
        let tgt = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [3, 3]);
        let sdv = DualVolumes::new(&src);
        let tdv = DualVolumes::new(&tgt);
        let tols = NumericTolerances::default();
        let search = SearchKdTree::new(&sdv, &tdv, tols);
        let ix = IntersectR2D::new(&sdv, &tdv, tols);

        for n in 0..tdv.num_all() {
            let weights = ix.intersect(n, &search.candidates(n)).unwrap();
            let total: f64 = weights.iter().map(|w| w.volume()).sum();
            assert!((total - tdv.volume(n)).abs() < 1e-12);
            let own: f64 = weights
                .iter()
                .filter(|w| w.entity_id == n)
                .map(|w| w.volume())
                .sum();
            assert!((own - tdv.volume(n)).abs() < 1e-12);
        }
    }
}
