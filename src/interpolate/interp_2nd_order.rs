//! Second-order (piecewise-linear) interpolation.
//!
//! Per weight entry the linear reconstruction around the source entity is
//! evaluated at the centroid of the overlap piece and volume-weighted:
//!
//! `φ_t = Σ_j (φ_j w0_j + ∇φ_j · (w1_j - w0_j x_j)) / Σ_j w0_j`
//!
//! where `w1_j` is the first moment of the overlap and `x_j` the source
//! reference point. Exact for linear fields on fully covered targets; with
//! limited gradients the reconstruction is bounded by the source extrema.

use super::Interpolate;
use crate::mesh::control_volume::ControlVolumes;
use crate::support::{NumericTolerances, Weight};

pub struct Interpolate2ndOrder<'a, const D: usize, S, T> {
    source: &'a S,
    target: &'a T,
    values: &'a [Option<f64>],
    gradients: &'a [[f64; D]],
    tols: NumericTolerances,
}

impl<'a, const D: usize, S: ControlVolumes<D>, T: ControlVolumes<D>>
    Interpolate2ndOrder<'a, D, S, T>
{
    /// `gradients` are the precomputed (limited) source gradients, one per
    /// source entity, as produced by
    /// [`LimitedGradient::compute_all`](super::gradient::LimitedGradient::compute_all).
    pub fn new(
        source: &'a S,
        target: &'a T,
        values: &'a [Option<f64>],
        gradients: &'a [[f64; D]],
        tols: NumericTolerances,
    ) -> Self {
        Self { source, target, values, gradients, tols }
    }
}

impl<'a, const D: usize, S: ControlVolumes<D>, T: ControlVolumes<D>> Interpolate<D>
    for Interpolate2ndOrder<'a, D, S, T>
{
    fn interpolate(&self, target_id: usize, weights: &[Weight]) -> f64 {
        let floor = self.tols.min_relative_volume * self.target.volume(target_id);
        let mut num = 0.0;
        let mut den = 0.0;
        for w in weights {
            let vol = w.volume();
            // Magnitude test: swept-face weight lists carry legitimate
            // negative entries.
            if vol.abs() < floor {
                continue;
            }
            let Some(phi) = self.values.get(w.entity_id).copied().flatten() else {
                continue;
            };
            let grad = self.gradients[w.entity_id];
            let xs = self.source.centroid(w.entity_id);
            let mut contrib = phi * vol;
            for k in 0..D {
                contrib += grad[k] * (w.moments[1 + k] - vol * xs[k]);
            }
            num += contrib;
            den += vol;
        }
        if den > 0.0 {
            num / den
        } else {
            0.0
        }
    }
}
