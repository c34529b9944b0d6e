//! Median-split k-d tree over control-volume bounding boxes.
//!
//! The tree is built once per remap over all source entities and queried
//! per target entity. Queries may return false positives (the intersect
//! stage discards them); they must never miss a genuinely overlapping box.

use crate::geometry::BoundingBox;

/// Entities per leaf; splits stop below this.
const MAX_LEAF: usize = 8;

const NO_CHILD: usize = usize::MAX;

#[derive(Clone, Debug)]
struct KdNode<const D: usize> {
    bbox: BoundingBox<D>,
    // Children, or NO_CHILD for a leaf.
    left: usize,
    right: usize,
    // Range into `order` covered by this subtree.
    start: usize,
    end: usize,
}

/// A static k-d tree over axis-aligned boxes.
#[derive(Clone, Debug)]
pub struct KdTree<const D: usize> {
    boxes: Vec<BoundingBox<D>>,
    order: Vec<usize>,
    nodes: Vec<KdNode<D>>,
}

impl<const D: usize> KdTree<D> {
    /// Build over one box per entity; entity ids are the indices of
    /// `boxes`.
    pub fn build(boxes: Vec<BoundingBox<D>>) -> Self {
        let mut order: Vec<usize> = (0..boxes.len()).collect();
        let mut nodes = Vec::new();
        if !boxes.is_empty() {
            build_node(&boxes, &mut order, 0, boxes.len(), &mut nodes);
        }
        Self { boxes, order, nodes }
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// All entities whose box overlaps `query`, each box grown by `rel` of
    /// its extent. The result is sorted ascending, so repeated queries with
    /// unchanged inputs are byte-identical.
    pub fn query(&self, query: &BoundingBox<D>, rel: f64) -> Vec<usize> {
        let mut out = Vec::new();
        if self.nodes.is_empty() {
            return out;
        }
        let mut stack = vec![0usize];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.bbox.intersects_with_slack(query, rel) {
                continue;
            }
            if node.left == NO_CHILD {
                for &e in &self.order[node.start..node.end] {
                    if self.boxes[e].intersects_with_slack(query, rel) {
                        out.push(e);
                    }
                }
            } else {
                stack.push(node.left);
                stack.push(node.right);
            }
        }
        out.sort_unstable();
        out
    }
}

fn build_node<const D: usize>(
    boxes: &[BoundingBox<D>],
    order: &mut [usize],
    start: usize,
    end: usize,
    nodes: &mut Vec<KdNode<D>>,
) -> usize {
    let mut bbox = BoundingBox::empty();
    for &e in &order[start..end] {
        bbox.merge(&boxes[e]);
    }
    let idx = nodes.len();
    nodes.push(KdNode {
        bbox,
        left: NO_CHILD,
        right: NO_CHILD,
        start,
        end,
    });

    let count = end - start;
    if count <= MAX_LEAF {
        return idx;
    }

    // Median split on the longest axis of the enclosing box.
    let axis = bbox.longest_axis();
    let mid = count / 2;
    order[start..end].select_nth_unstable_by(mid, |&a, &b| {
        let ca = 0.5 * (boxes[a].min[axis] + boxes[a].max[axis]);
        let cb = 0.5 * (boxes[b].min[axis] + boxes[b].max[axis]);
        ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let left = build_node(boxes, order, start, start + mid, nodes);
    let right = build_node(boxes, order, start + mid, end, nodes);
    nodes[idx].left = left;
    nodes[idx].right = right;
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn grid_boxes(n: usize) -> Vec<BoundingBox<2>> {
        let h = 1.0 / n as f64;
        let mut boxes = Vec::with_capacity(n * n);
        for j in 0..n {
            for i in 0..n {
                boxes.push(BoundingBox {
                    min: [i as f64 * h, j as f64 * h],
                    max: [(i + 1) as f64 * h, (j + 1) as f64 * h],
                });
            }
        }
        boxes
    }

    fn brute_force<const D: usize>(
        boxes: &[BoundingBox<D>],
        q: &BoundingBox<D>,
        rel: f64,
    ) -> Vec<usize> {
        (0..boxes.len())
            .filter(|&e| boxes[e].intersects_with_slack(q, rel))
            .collect()
    }

    #[test]
    fn matches_brute_force_on_grid() {
        let boxes = grid_boxes(10);
        let tree = KdTree::build(boxes.clone());
        let q = BoundingBox { min: [0.33, 0.47], max: [0.61, 0.52] };
        assert_eq!(tree.query(&q, 1e-12), brute_force(&boxes, &q, 1e-12));
    }

    #[test]
    fn repeated_queries_are_identical() {
        let boxes = grid_boxes(7);
        let tree = KdTree::build(boxes);
        let q = BoundingBox { min: [0.1, 0.1], max: [0.4, 0.9] };
        let first = tree.query(&q, 1e-12);
        for _ in 0..3 {
            assert_eq!(tree.query(&q, 1e-12), first);
        }
    }

    #[test]
    fn empty_tree_returns_nothing() {
        let tree = KdTree::<2>::build(Vec::new());
        let q = BoundingBox { min: [0.0, 0.0], max: [1.0, 1.0] };
        assert!(tree.query(&q, 0.0).is_empty());
    }

    proptest! {
        // No false negatives against brute force for random box soups.
        #[test]
        fn never_misses_overlaps(
            raw in prop::collection::vec(
                (0.0f64..1.0, 0.0f64..1.0, 0.0f64..0.2, 0.0f64..0.2),
                1..200,
            ),
            qx in 0.0f64..1.0,
            qy in 0.0f64..1.0,
            qw in 0.0f64..0.5,
            qh in 0.0f64..0.5,
        ) {
            let boxes: Vec<BoundingBox<2>> = raw
                .iter()
                .map(|&(x, y, w, h)| BoundingBox {
                    min: [x, y],
                    max: [x + w, y + h],
                })
                .collect();
            let q = BoundingBox { min: [qx, qy], max: [qx + qw, qy + qh] };
            let tree = KdTree::build(boxes.clone());
            let got = tree.query(&q, 0.0);
            let expect = brute_force(&boxes, &q, 0.0);
            prop_assert_eq!(got, expect);
        }
    }
}
