//! Axis-aligned bounding boxes used by the search stage and the
//! distributor's rank-overlap test.

use super::point::Point;

/// An axis-aligned box in `D` dimensions. A freshly constructed box is
/// empty (`min > max`) and grows by absorbing points or other boxes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox<const D: usize> {
    pub min: [f64; D],
    pub max: [f64; D],
}

impl<const D: usize> Default for BoundingBox<D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const D: usize> BoundingBox<D> {
    pub fn empty() -> Self {
        Self {
            min: [f64::MAX; D],
            max: [-f64::MAX; D],
        }
    }

    pub fn from_points(points: &[Point<D>]) -> Self {
        let mut b = Self::empty();
        for p in points {
            b.add_point(*p);
        }
        b
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..D).any(|k| self.min[k] > self.max[k])
    }

    #[inline]
    pub fn add_point(&mut self, p: Point<D>) {
        for k in 0..D {
            if p[k] < self.min[k] {
                self.min[k] = p[k];
            }
            if p[k] > self.max[k] {
                self.max[k] = p[k];
            }
        }
    }

    #[inline]
    pub fn merge(&mut self, other: &BoundingBox<D>) {
        for k in 0..D {
            self.min[k] = self.min[k].min(other.min[k]);
            self.max[k] = self.max[k].max(other.max[k]);
        }
    }

    /// Closed-interval overlap test.
    #[inline]
    pub fn intersects(&self, other: &BoundingBox<D>) -> bool {
        (0..D).all(|k| self.min[k] <= other.max[k] && other.min[k] <= self.max[k])
    }

    /// Overlap test with each box grown by `rel` times its own extent on
    /// every axis, so near-touching boxes still count as candidates.
    pub fn intersects_with_slack(&self, other: &BoundingBox<D>, rel: f64) -> bool {
        (0..D).all(|k| {
            let slack = rel * ((self.max[k] - self.min[k]) + (other.max[k] - other.min[k]));
            self.min[k] - slack <= other.max[k] && other.min[k] - slack <= self.max[k]
        })
    }

    /// Overlap test with both boxes shrunk inward by `offset` on every
    /// face, excluding mere face contact; the distributor's rank test.
    pub fn overlaps_shrunk(&self, other: &BoundingBox<D>, offset: f64) -> bool {
        (0..D).all(|k| {
            let (amin, amax) = (self.min[k] + offset, self.max[k] - offset);
            let (bmin, bmax) = (other.min[k] + offset, other.max[k] - offset);
            (amin <= bmin && bmin <= amax) || (bmin <= amin && amin <= bmax)
        })
    }

    #[inline]
    pub fn center(&self) -> Point<D> {
        let mut c = [0.0; D];
        for k in 0..D {
            c[k] = 0.5 * (self.min[k] + self.max[k]);
        }
        Point(c)
    }

    /// Axis with the largest extent.
    pub fn longest_axis(&self) -> usize {
        let mut axis = 0;
        let mut best = self.max[0] - self.min[0];
        for k in 1..D {
            let w = self.max[k] - self.min[k];
            if w > best {
                best = w;
                axis = k;
            }
        }
        axis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_from_empty() {
        let mut b = BoundingBox::<2>::empty();
        assert!(b.is_empty());
        b.add_point(Point([1.0, 2.0]));
        b.add_point(Point([-1.0, 0.5]));
        assert_eq!(b.min, [-1.0, 0.5]);
        assert_eq!(b.max, [1.0, 2.0]);
        assert!(!b.is_empty());
    }

    #[test]
    fn overlap_tests() {
        let a = BoundingBox::<2> { min: [0.0, 0.0], max: [1.0, 1.0] };
        let b = BoundingBox::<2> { min: [0.5, 0.5], max: [2.0, 2.0] };
        let c = BoundingBox::<2> { min: [1.5, 1.5], max: [2.0, 2.0] };
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        // Face contact counts for the closed test but not the shrunk one.
        let d = BoundingBox::<2> { min: [1.0, 0.0], max: [2.0, 1.0] };
        assert!(a.intersects(&d));
        assert!(!a.overlaps_shrunk(&d, 2.0 * f64::EPSILON));
        assert!(a.overlaps_shrunk(&b, 2.0 * f64::EPSILON));
    }

    #[test]
    fn longest_axis_picks_widest() {
        let b = BoundingBox::<3> { min: [0.0, 0.0, 0.0], max: [1.0, 3.0, 2.0] };
        assert_eq!(b.longest_axis(), 1);
    }
}
