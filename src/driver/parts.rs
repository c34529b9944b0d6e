//! Part-by-part remap: an explicit pairing of a source cell subset with a
//! target cell subset, remapped and repaired independently of the rest of
//! the mesh.

use hashbrown::HashSet;

/// A (source cells, target cells) pair defining one remap region.
#[derive(Clone, Debug)]
pub struct PartsPair {
    source_cells: Vec<usize>,
    target_cells: Vec<usize>,
    source_set: HashSet<usize>,
    target_set: HashSet<usize>,
}

impl PartsPair {
    pub fn new(source_cells: Vec<usize>, target_cells: Vec<usize>) -> Self {
        let source_set = source_cells.iter().copied().collect();
        let target_set = target_cells.iter().copied().collect();
        Self { source_cells, target_cells, source_set, target_set }
    }

    pub fn source_cells(&self) -> &[usize] {
        &self.source_cells
    }

    pub fn target_cells(&self) -> &[usize] {
        &self.target_cells
    }

    #[inline]
    pub fn contains_source(&self, c: usize) -> bool {
        self.source_set.contains(&c)
    }

    #[inline]
    pub fn contains_target(&self, c: usize) -> bool {
        self.target_set.contains(&c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership() {
        let part = PartsPair::new(vec![0, 2, 4], vec![1, 3]);
        assert!(part.contains_source(2));
        assert!(!part.contains_source(1));
        assert!(part.contains_target(3));
        assert!(!part.contains_target(0));
        assert_eq!(part.source_cells(), &[0, 2, 4]);
        assert_eq!(part.target_cells(), &[1, 3]);
    }
}
