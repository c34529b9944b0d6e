//! Candidate search: for each target control volume, the source control
//! volumes whose bounding boxes may overlap it.

pub mod kdtree;

use crate::mesh::control_volume::ControlVolumes;
use crate::support::NumericTolerances;
use kdtree::KdTree;

/// k-d tree search over source control-volume bounding boxes.
///
/// Works identically for cells and for node dual cells; the dual case is
/// presented through [`crate::mesh::dual::DualVolumes`], whose boxes are
/// the unions of incident-cell boxes.
pub struct SearchKdTree<'a, const D: usize, S, T> {
    tree: KdTree<D>,
    target: &'a T,
    rel: f64,
    _source: std::marker::PhantomData<&'a S>,
}

impl<'a, const D: usize, S, T> SearchKdTree<'a, D, S, T>
where
    S: ControlVolumes<D>,
    T: ControlVolumes<D>,
{
    pub fn new(source: &'a S, target: &'a T, tols: NumericTolerances) -> Self {
        let boxes = (0..source.num_all())
            .map(|e| source.bounding_box(e))
            .collect();
        Self {
            tree: KdTree::build(boxes),
            target,
            rel: tols.intersect_bb_relative_distance,
            _source: std::marker::PhantomData,
        }
    }

    /// Source candidates for one target entity, sorted ascending. False
    /// positives are fine; false negatives are not.
    pub fn candidates(&self, target_id: usize) -> Vec<usize> {
        self.tree
            .query(&self.target.bounding_box(target_id), self.rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::control_volume::CellVolumes;
    use crate::mesh::simple::SimpleMesh;

    #[test]
    fn overlapping_grids_find_all_touching_cells() {
        let src = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [4, 4]);
        let tgt = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [5, 5]);
        let scv = CellVolumes::new(&src);
        let tcv = CellVolumes::new(&tgt);
        let search = SearchKdTree::new(&scv, &tcv, NumericTolerances::default());

        // Target cell [0, 0.2]^2 touches only source cell [0, 0.25]^2.
        let c = search.candidates(0);
        assert!(c.contains(&0));
        // Every target cell has at least one and at most four genuine
        // overlaps on these grids; with box slack corners may add more.
        for t in 0..25 {
            let c = search.candidates(t);
            assert!(!c.is_empty());
            let mut sorted = c.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, c, "candidates come back sorted");
        }
    }
}
