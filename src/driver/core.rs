//! Pipeline kernels shared by the driver: candidate search, bulk
//! intersection, interpolation with repair, and multi-material
//! intersection for both dimensions.

use super::mismatch::MismatchFixer;
use super::parts::PartsPair;
use crate::intersect::matpoly::{InterfaceReconstructor2d, InterfaceReconstructor3d};
use crate::intersect::{IntersectR2D, IntersectR3D, MeshIntersect};
use crate::interpolate::{
    GradientWeights, Interpolate, Interpolate1stOrder, Interpolate2ndOrder, InterpolationOrder,
    LimitedGradient,
};
use crate::mesh::control_volume::{
    CellVolumes, ControlVolumes, Decompose2, Decompose3, Simplex2, Simplex3,
};
use crate::mesh::MeshView;
use crate::remap_error::RemapError;
use crate::search::SearchKdTree;
use crate::state::StateView;
use crate::support::parallel::parallel_transform;
use crate::support::{MismatchStats, NumericTolerances, VarOptions, Weight};
use hashbrown::HashSet;
use std::collections::BTreeMap;

/// Candidate lists for every owned target control volume.
pub(crate) fn search_control_volumes<const D: usize, S, T>(
    scv: &S,
    tcv: &T,
    tols: NumericTolerances,
) -> Vec<Vec<usize>>
where
    S: ControlVolumes<D> + Sync,
    T: ControlVolumes<D> + Sync,
{
    let search = SearchKdTree::new(scv, tcv, tols);
    parallel_transform(tcv.num_owned(), |t| search.candidates(t))
}

/// Run one intersector over every owned target entity.
pub(crate) fn intersect_all<const D: usize, IX>(
    ix: &IX,
    n_owned: usize,
    candidates: &[Vec<usize>],
) -> Result<Vec<Vec<Weight>>, RemapError>
where
    IX: MeshIntersect<D> + Sync,
{
    parallel_transform(n_owned, |t| ix.intersect(t, &candidates[t]))
        .into_iter()
        .collect()
}

/// Drop weight entries whose source cell is outside the part.
pub(crate) fn filter_weights_by_part(
    weights: &[Vec<Weight>],
    part: &PartsPair,
) -> Vec<Vec<Weight>> {
    weights
        .iter()
        .map(|list| {
            list.iter()
                .filter(|w| part.contains_source(w.entity_id))
                .cloned()
                .collect()
        })
        .collect()
}

/// Interpolate every owned target entity and repair mismatch in place.
/// Returns the values (one per owned target) and the repair outcome.
#[allow(clippy::too_many_arguments)]
pub(crate) fn interpolate_with_fixup<const D: usize, S, T>(
    scv: &S,
    tcv: &T,
    weights: &[Vec<Weight>],
    src_values: &[Option<f64>],
    order: InterpolationOrder,
    opts: &VarOptions,
    tols: NumericTolerances,
    part: Option<&PartsPair>,
    apply_fixup: bool,
) -> Result<(Vec<f64>, MismatchStats), RemapError>
where
    S: ControlVolumes<D> + Sync,
    T: ControlVolumes<D> + Sync,
{
    let n = tcv.num_owned();
    let mut values = match order {
        InterpolationOrder::First => {
            let interp = Interpolate1stOrder::new(tcv, src_values, tols);
            parallel_transform(n, |t| interp.interpolate(t, &weights[t]))
        }
        InterpolationOrder::Second => {
            let gradients = LimitedGradient::new(
                scv,
                src_values,
                opts.limiter,
                opts.boundary_limiter,
                GradientWeights::Uniform,
            )
            .compute_all();
            let interp = Interpolate2ndOrder::new(scv, tcv, src_values, &gradients, tols);
            parallel_transform(n, |t| interp.interpolate(t, &weights[t]))
        }
    };

    let stats = if apply_fixup {
        MismatchFixer::new(scv, tcv, weights, part).fix(&mut values, src_values, opts)?
    } else {
        MismatchStats { converged: true, ..Default::default() }
    };
    Ok((values, stats))
}

/// Per-material intersection in 2-D: one weight list per target cell per
/// material, with matpolys supplied by the reconstructor for cells holding
/// several materials.
pub(crate) fn intersect_materials_2d<SM, SS, TM, R>(
    source_mesh: &SM,
    source_state: &SS,
    target_mesh: &TM,
    candidates: &[Vec<usize>],
    tols: NumericTolerances,
    recon: &R,
) -> Result<BTreeMap<usize, Vec<Vec<Weight>>>, RemapError>
where
    SM: MeshView<2>,
    SS: StateView,
    TM: MeshView<2>,
    R: InterfaceReconstructor2d,
{
    let scv = CellVolumes::new(source_mesh);
    let tcv = CellVolumes::new(target_mesh);
    let ix = IntersectR2D::new(&scv, &tcv, tols);
    let n = target_mesh.num_owned_cells();

    let mut out = BTreeMap::new();
    for m in source_state.material_ids() {
        let in_mat: HashSet<usize> = source_state.mat_cells(m)?.iter().copied().collect();
        let mut per_target: Vec<Vec<Weight>> = vec![Vec::new(); n];
        for (t, per) in per_target.iter_mut().enumerate() {
            for &s in &candidates[t] {
                if !in_mat.contains(&s) {
                    continue;
                }
                let pieces: Vec<Simplex2> = if source_state.cell_materials(s).len() > 1 {
                    let selected: Vec<Simplex2> = recon
                        .cell_matpolys(s)
                        .into_iter()
                        .filter(|(id, _)| *id == m)
                        .flat_map(|(_, poly)| poly.simplices())
                        .collect();
                    if selected.is_empty() {
                        scv.simplices(s)
                    } else {
                        selected
                    }
                } else {
                    scv.simplices(s)
                };
                let mm = ix.moments_with_pieces(t, &pieces)?;
                if mm.volume > 0.0 {
                    per.push(Weight::new(s, mm.to_weight_vec()));
                }
            }
        }
        out.insert(m, per_target);
    }
    Ok(out)
}

/// Per-material intersection in 3-D.
pub(crate) fn intersect_materials_3d<SM, SS, TM, R>(
    source_mesh: &SM,
    source_state: &SS,
    target_mesh: &TM,
    candidates: &[Vec<usize>],
    tols: NumericTolerances,
    recon: &R,
) -> Result<BTreeMap<usize, Vec<Vec<Weight>>>, RemapError>
where
    SM: MeshView<3>,
    SS: StateView,
    TM: MeshView<3>,
    R: InterfaceReconstructor3d,
{
    let scv = CellVolumes::new(source_mesh);
    let tcv = CellVolumes::new(target_mesh);
    let ix = IntersectR3D::new(&scv, &tcv, tols);
    let n = target_mesh.num_owned_cells();

    let mut out = BTreeMap::new();
    for m in source_state.material_ids() {
        let in_mat: HashSet<usize> = source_state.mat_cells(m)?.iter().copied().collect();
        let mut per_target: Vec<Vec<Weight>> = vec![Vec::new(); n];
        for (t, per) in per_target.iter_mut().enumerate() {
            for &s in &candidates[t] {
                if !in_mat.contains(&s) {
                    continue;
                }
                let pieces: Vec<Simplex3> = if source_state.cell_materials(s).len() > 1 {
                    let selected: Vec<Simplex3> = recon
                        .cell_matpolys(s)
                        .into_iter()
                        .filter(|(id, _)| *id == m)
                        .flat_map(|(_, poly)| poly.simplices())
                        .collect();
                    if selected.is_empty() {
                        scv.simplices(s)
                    } else {
                        selected
                    }
                } else {
                    scv.simplices(s)
                };
                let mm = ix.moments_with_pieces(t, &pieces)?;
                if mm.volume > 0.0 {
                    per.push(Weight::new(s, mm.to_weight_vec()));
                }
            }
        }
        out.insert(m, per_target);
    }
    Ok(out)
}

/// Swept-face stencils: the cell itself plus its face neighbors.
pub(crate) fn swept_stencils<const D: usize, M: MeshView<D>>(mesh: &M) -> Vec<Vec<usize>> {
    (0..mesh.num_owned_cells())
        .map(|c| {
            let mut s = vec![c];
            s.extend(mesh.cell_face_neighbors(c));
            s
        })
        .collect()
}
