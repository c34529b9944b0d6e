//! First-order (piecewise-constant) interpolation.
//!
//! The target value is the overlap-volume-weighted average of the source
//! values, `Σ φ_j w_j / Σ w_j`: the cell-intersection-based donor-cell
//! remap. Positivity preserving and exact for constants; mismatch repair
//! later rescales partially covered entities per its policy.

use super::Interpolate;
use crate::mesh::control_volume::ControlVolumes;
use crate::support::{NumericTolerances, Weight};

pub struct Interpolate1stOrder<'a, const D: usize, T> {
    target: &'a T,
    values: &'a [Option<f64>],
    tols: NumericTolerances,
}

impl<'a, const D: usize, T: ControlVolumes<D>> Interpolate1stOrder<'a, D, T> {
    /// `values` holds the source field indexed by source entity id; `None`
    /// marks entities carrying no value (a material absent from a cell).
    pub fn new(target: &'a T, values: &'a [Option<f64>], tols: NumericTolerances) -> Self {
        Self { target, values, tols }
    }
}

impl<'a, const D: usize, T: ControlVolumes<D>> Interpolate<D> for Interpolate1stOrder<'a, D, T> {
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
            num += phi * vol;
            den += vol;
        }
        if den > 0.0 {
            num / den
        } else {
            0.0
        }
    }
}
