//! Weighted least-squares gradient reconstruction with slope limiting.
//!
//! Per source entity the gradient minimizes
//! `Σ_j w_j (φ_j - φ_i - ∇φ·(x_j - x_i))²` over the entity's stencil
//! (face neighbors for cells, node neighbors for dual cells). The normal
//! equations are a `D x D` system solved directly, with rank-deficient
//! stencils handled by the pseudo-inverse behavior of the solver.
//!
//! Entities without a value (a material absent from a cell) contribute
//! nothing to any stencil and get a zero gradient themselves.

use crate::geometry::DenseMatrix;
use crate::mesh::control_volume::ControlVolumes;
use crate::support::parallel::parallel_transform;
use crate::support::{BoundaryLimiter, Limiter};

/// Stencil weighting for the least-squares fit.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum GradientWeights {
    /// All neighbors weigh 1.
    #[default]
    Uniform,
    /// Neighbors weigh `1 / |x_j - x_i|`; the faceted mode.
    InverseDistance,
}

pub struct LimitedGradient<'a, const D: usize, CV> {
    cv: &'a CV,
    values: &'a [Option<f64>],
    limiter: Limiter,
    boundary_limiter: BoundaryLimiter,
    weights: GradientWeights,
}

impl<'a, const D: usize, CV: ControlVolumes<D> + Sync> LimitedGradient<'a, D, CV> {
    pub fn new(
        cv: &'a CV,
        values: &'a [Option<f64>],
        limiter: Limiter,
        boundary_limiter: BoundaryLimiter,
        weights: GradientWeights,
    ) -> Self {
        Self { cv, values, limiter, boundary_limiter, weights }
    }

    /// Unlimited least-squares gradient at entity `i`.
    fn unlimited(&self, i: usize) -> [f64; D] {
        let Some(phi_i) = self.values.get(i).copied().flatten() else {
            return [0.0; D];
        };
        let xi = self.cv.centroid(i);
        let mut a = DenseMatrix::<D>::zero();
        let mut b = [0.0; D];
        let mut used = 0usize;
        for j in self.cv.neighbors(i) {
            let Some(phi_j) = self.values.get(j).copied().flatten() else {
                continue;
            };
            let dx = self.cv.centroid(j) - xi;
            let w = match self.weights {
                GradientWeights::Uniform => 1.0,
                GradientWeights::InverseDistance => {
                    let r = dx.norm();
                    if r > 0.0 {
                        1.0 / r
                    } else {
                        continue;
                    }
                }
            };
            for r in 0..D {
                for c in 0..D {
                    a.rows[r][c] += w * dx[r] * dx[c];
                }
                b[r] += w * dx[r] * (phi_j - phi_i);
            }
            used += 1;
        }
        if used == 0 {
            return [0.0; D];
        }
        a.solve(&b)
    }

    /// Barth-Jespersen: scale the gradient so every reconstructed value at
    /// the entity's hull points stays within the stencil's value range.
    fn barth_jespersen(&self, i: usize, grad: [f64; D]) -> [f64; D] {
        let Some(phi_i) = self.values.get(i).copied().flatten() else {
            return [0.0; D];
        };
        let mut phi_min = phi_i;
        let mut phi_max = phi_i;
        for j in self.cv.neighbors(i) {
            if let Some(phi_j) = self.values.get(j).copied().flatten() {
                phi_min = phi_min.min(phi_j);
                phi_max = phi_max.max(phi_j);
            }
        }
        let xi = self.cv.centroid(i);
        let mut alpha = 1.0_f64;
        for p in self.cv.hull_points(i) {
            let dx = p - xi;
            let mut delta = 0.0;
            for k in 0..D {
                delta += grad[k] * dx[k];
            }
            if delta > f64::EPSILON {
                alpha = alpha.min(((phi_max - phi_i) / delta).clamp(0.0, 1.0));
            } else if delta < -f64::EPSILON {
                alpha = alpha.min(((phi_min - phi_i) / delta).clamp(0.0, 1.0));
            }
        }
        let mut out = grad;
        for g in &mut out {
            *g *= alpha;
        }
        out
    }

    /// Limited gradient at entity `i`, honoring the boundary policy.
    pub fn gradient(&self, i: usize) -> [f64; D] {
        let grad = self.unlimited(i);
        if self.cv.on_exterior_boundary(i) {
            match self.boundary_limiter {
                BoundaryLimiter::BndNoLimiter => grad,
                BoundaryLimiter::BndZeroGradient => [0.0; D],
                BoundaryLimiter::BndBarthJespersen => self.barth_jespersen(i, grad),
            }
        } else {
            match self.limiter {
                Limiter::NoLimiter => grad,
                Limiter::BarthJespersen => self.barth_jespersen(i, grad),
            }
        }
    }

    /// Gradients for every entity, owned and ghost.
    pub fn compute_all(&self) -> Vec<[f64; D]>
    where
        Self: Sync,
    {
        parallel_transform(self.cv.num_all(), |i| self.gradient(i))
    }
}
