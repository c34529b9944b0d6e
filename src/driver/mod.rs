//! The remap driver: orchestrates distribute → search → intersect →
//! interpolate → repair for a set of variables, caching candidates and
//! weights per entity kind so one weight computation services many field
//! interpolations.
//!
//! Phase order is enforced: each phase requires its predecessor and
//! re-running an earlier phase invalidates everything after it. Cell
//! variables remap through the primal mesh, node variables through the
//! dual mesh presented by [`crate::mesh::dual::DualVolumes`]; the driver
//! dispatches on the runtime entity kind of each variable.

mod core;
pub mod mismatch;
pub mod parts;

pub use mismatch::MismatchFixer;
pub use parts::PartsPair;

use crate::distributed::{BoundingBoxDistributor, Communicator, NoComm};
use crate::flat::{FlatMesh, FlatState};
use crate::intersect::matpoly::{
    DummyInterfaceReconstructor, InterfaceReconstructor2d, InterfaceReconstructor3d,
};
use crate::intersect::{IntersectR2D, IntersectR3D, IntersectSweptFace2D, IntersectSweptFace3D};
use crate::interpolate::InterpolationOrder;
use crate::mesh::control_volume::CellVolumes;
use crate::mesh::dual::DualVolumes;
use crate::mesh::MeshView;
use crate::remap_error::RemapError;
use crate::state::{StateView, StateViewMut};
use crate::support::{
    EntityKind, EntityType, FieldType, MismatchStats, NumericTolerances, VarOptions, Weight,
};
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;

/// How target control volumes are intersected with source control volumes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IntersectMethod {
    /// Exact polygon/polyhedron intersection of arbitrary overlapping
    /// meshes.
    Exact,
    /// Swept-face regions; requires identical topology with displaced
    /// vertex positions.
    SweptFace,
}

/// Driver for remapping fields between a source and a target mesh/state.
pub struct RemapDriver<'a, const D: usize, SM, SS, TM, TS, C = NoComm> {
    source_mesh: &'a SM,
    source_state: &'a SS,
    target_mesh: &'a TM,
    target_state: &'a mut TS,
    comm: C,
    tols: NumericTolerances,
    vars: Vec<String>,
    entity_kinds: Vec<EntityKind>,
    have_mm_fields: bool,
    flat: Option<(FlatMesh<D>, FlatState)>,
    candidates: HashMap<EntityKind, Vec<Vec<usize>>>,
    weights: HashMap<EntityKind, Vec<Vec<Weight>>>,
    mat_weights: BTreeMap<usize, Vec<Vec<Weight>>>,
    mismatch: HashMap<EntityKind, bool>,
}

impl<'a, const D: usize, SM, SS, TM, TS, C> RemapDriver<'a, D, SM, SS, TM, TS, C>
where
    SM: MeshView<D>,
    SS: StateView,
    TM: MeshView<D>,
    TS: StateViewMut,
    C: Communicator,
{
    pub fn new(
        source_mesh: &'a SM,
        source_state: &'a SS,
        target_mesh: &'a TM,
        target_state: &'a mut TS,
        comm: C,
    ) -> Self {
        Self {
            source_mesh,
            source_state,
            target_mesh,
            target_state,
            comm,
            tols: NumericTolerances::default(),
            vars: Vec::new(),
            entity_kinds: Vec::new(),
            have_mm_fields: false,
            flat: None,
            candidates: HashMap::new(),
            weights: HashMap::new(),
            mat_weights: BTreeMap::new(),
            mismatch: HashMap::new(),
        }
    }

    pub fn with_tolerances(mut self, tols: NumericTolerances) -> Self {
        self.tols = tols;
        self
    }

    /// Declare the source variables to remap; derives the entity kinds the
    /// pipeline must cover and resets every later phase.
    pub fn set_remap_var_names(&mut self, vars: &[&str]) -> Result<(), RemapError> {
        let mut kinds = Vec::new();
        let mut have_mm = false;
        for &name in vars {
            let kind = self
                .source_state
                .entity_kind(name)
                .ok_or_else(|| RemapError::VariableNotFound(name.to_string()))?;
            if !matches!(kind, EntityKind::Cell | EntityKind::Node) {
                return Err(RemapError::UnsupportedEntityKind(kind));
            }
            if self.source_state.field_type(kind, name) == Some(FieldType::MultiMaterialField) {
                have_mm = true;
            }
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        self.vars = vars.iter().map(|s| s.to_string()).collect();
        self.entity_kinds = kinds;
        self.have_mm_fields = have_mm;
        self.flat = None;
        self.invalidate_pipeline();
        Ok(())
    }

    /// Whether more than one rank participates.
    pub fn is_distributed_run(&self) -> bool {
        self.comm.size() > 1
    }

    /// Whether the intersect phase detected geometric mismatch for fields
    /// of the given kind.
    pub fn has_mismatch(&self, kind: EntityKind) -> bool {
        self.mismatch.get(&kind).copied().unwrap_or(false)
    }

    pub fn tolerances(&self) -> NumericTolerances {
        self.tols
    }

    fn invalidate_pipeline(&mut self) {
        self.candidates.clear();
        self.invalidate_weights();
    }

    fn invalidate_weights(&mut self) {
        self.weights.clear();
        self.mat_weights.clear();
        self.mismatch.clear();
    }

    fn require_configured(&self, requested: &'static str) -> Result<(), RemapError> {
        if self.vars.is_empty() {
            return Err(RemapError::PhaseOrder {
                requested,
                missing: "set_remap_var_names",
            });
        }
        Ok(())
    }
}

macro_rules! remap_driver_dim_impl {
    ($d:literal, $exact:ident, $swept:ident, $recon:ident, $mat_fn:ident) => {
        impl<'a, SM, SS, TM, TS, C> RemapDriver<'a, $d, SM, SS, TM, TS, C>
        where
            SM: MeshView<$d> + Sync,
            SS: StateView,
            TM: MeshView<$d> + Sync,
            TS: StateViewMut,
            C: Communicator,
        {
            /// Flatten and redistribute the source so every source entity
            /// overlapping this rank's target box is present locally.
            /// Idempotent; a no-op on a single rank.
            pub fn distribute(&mut self) -> Result<(), RemapError> {
                self.require_configured("distribute")?;
                if !self.is_distributed_run() || self.flat.is_some() {
                    return Ok(());
                }
                let mut fm = FlatMesh::from_mesh(self.source_mesh)?;
                let mut fs = FlatState::from_state(self.source_state, &self.vars)?;
                BoundingBoxDistributor::new(&self.comm)
                    .distribute(&mut fm, &mut fs, self.target_mesh)?;
                self.flat = Some((fm, fs));
                self.invalidate_pipeline();
                Ok(())
            }

            /// Find, per target control volume, the candidate source
            /// control volumes; invalidates cached weights.
            pub fn search(&mut self) -> Result<(), RemapError> {
                self.require_configured("search")?;
                if self.is_distributed_run() && self.flat.is_none() {
                    self.distribute()?;
                }
                for kind in self.entity_kinds.clone() {
                    let cands = match (&self.flat, kind) {
                        (Some((fm, _)), EntityKind::Cell) => core::search_control_volumes(
                            &CellVolumes::new(fm),
                            &CellVolumes::new(self.target_mesh),
                            self.tols,
                        ),
                        (None, EntityKind::Cell) => core::search_control_volumes(
                            &CellVolumes::new(self.source_mesh),
                            &CellVolumes::new(self.target_mesh),
                            self.tols,
                        ),
                        (Some((fm, _)), EntityKind::Node) => core::search_control_volumes(
                            &DualVolumes::new(fm),
                            &DualVolumes::new(self.target_mesh),
                            self.tols,
                        ),
                        (None, EntityKind::Node) => core::search_control_volumes(
                            &DualVolumes::new(self.source_mesh),
                            &DualVolumes::new(self.target_mesh),
                            self.tols,
                        ),
                        (_, k) => return Err(RemapError::UnsupportedEntityKind(k)),
                    };
                    self.candidates.insert(kind, cands);
                }
                self.invalidate_weights();
                Ok(())
            }

            /// Exact intersection of every target control volume with its
            /// candidates; also classifies mesh mismatch per kind.
            pub fn intersect(&mut self) -> Result<(), RemapError> {
                for kind in self.entity_kinds.clone() {
                    let cands = self.candidates.get(&kind).ok_or(RemapError::PhaseOrder {
                        requested: "intersect",
                        missing: "search",
                    })?;
                    let (w, mm) = match (&self.flat, kind) {
                        (Some((fm, _)), EntityKind::Cell) => {
                            let scv = CellVolumes::new(fm);
                            let tcv = CellVolumes::new(self.target_mesh);
                            let ix = $exact::new(&scv, &tcv, self.tols);
                            let w = core::intersect_all(&ix, self.target_mesh.num_owned_cells(), cands)?;
                            let mm = MismatchFixer::new(&scv, &tcv, &w, None).has_mismatch();
                            (w, mm)
                        }
                        (None, EntityKind::Cell) => {
                            let scv = CellVolumes::new(self.source_mesh);
                            let tcv = CellVolumes::new(self.target_mesh);
                            let ix = $exact::new(&scv, &tcv, self.tols);
                            let w = core::intersect_all(&ix, self.target_mesh.num_owned_cells(), cands)?;
                            let mm = MismatchFixer::new(&scv, &tcv, &w, None).has_mismatch();
                            (w, mm)
                        }
                        (Some((fm, _)), EntityKind::Node) => {
                            let scv = DualVolumes::new(fm);
                            let tcv = DualVolumes::new(self.target_mesh);
                            let ix = $exact::new(&scv, &tcv, self.tols);
                            let w = core::intersect_all(&ix, self.target_mesh.num_owned_nodes(), cands)?;
                            let mm = MismatchFixer::new(&scv, &tcv, &w, None).has_mismatch();
                            (w, mm)
                        }
                        (None, EntityKind::Node) => {
                            let scv = DualVolumes::new(self.source_mesh);
                            let tcv = DualVolumes::new(self.target_mesh);
                            let ix = $exact::new(&scv, &tcv, self.tols);
                            let w = core::intersect_all(&ix, self.target_mesh.num_owned_nodes(), cands)?;
                            let mm = MismatchFixer::new(&scv, &tcv, &w, None).has_mismatch();
                            (w, mm)
                        }
                        (_, k) => return Err(RemapError::UnsupportedEntityKind(k)),
                    };
                    self.weights.insert(kind, w);
                    self.mismatch.insert(kind, mm);
                }
                Ok(())
            }

            /// Swept-face intersection for same-topology displaced meshes.
            /// Serves cell variables only and never runs on a
            /// redistributed source.
            pub fn intersect_swept(&mut self) -> Result<(), RemapError> {
                self.require_configured("intersect_swept")?;
                if self.flat.is_some() {
                    return Err(RemapError::TopologyMismatch(
                        "swept-face remap requires the native source partitioning",
                    ));
                }
                if self.entity_kinds.iter().any(|&k| k != EntityKind::Cell) {
                    return Err(RemapError::UnsupportedEntityKind(EntityKind::Node));
                }
                if self.source_mesh.num_cells() != self.target_mesh.num_cells()
                    || self.source_mesh.num_nodes() != self.target_mesh.num_nodes()
                    || self.source_mesh.num_faces() != self.target_mesh.num_faces()
                {
                    return Err(RemapError::TopologyMismatch(
                        "source and target entity counts differ",
                    ));
                }

                let stencils = core::swept_stencils(self.source_mesh);
                let ix = $swept::new(self.source_mesh, self.target_mesh, self.tols);
                let w =
                    core::intersect_all(&ix, self.target_mesh.num_owned_cells(), &stencils)?;
                let scv = CellVolumes::new(self.source_mesh);
                let tcv = CellVolumes::new(self.target_mesh);
                let mm = MismatchFixer::new(&scv, &tcv, &w, None).has_mismatch();
                self.candidates.insert(EntityKind::Cell, stencils);
                self.weights.insert(EntityKind::Cell, w);
                self.mismatch.insert(EntityKind::Cell, mm);
                Ok(())
            }

            /// Per-material intersection against the matpolys supplied by
            /// an interface reconstructor.
            pub fn intersect_materials<R: $recon>(
                &mut self,
                recon: &R,
            ) -> Result<(), RemapError> {
                let cands =
                    self.candidates
                        .get(&EntityKind::Cell)
                        .ok_or(RemapError::PhaseOrder {
                            requested: "intersect_materials",
                            missing: "search",
                        })?;
                self.mat_weights = match &self.flat {
                    Some((fm, fs)) => {
                        core::$mat_fn(fm, fs, self.target_mesh, cands, self.tols, recon)?
                    }
                    None => core::$mat_fn(
                        self.source_mesh,
                        self.source_state,
                        self.target_mesh,
                        cands,
                        self.tols,
                        recon,
                    )?,
                };
                Ok(())
            }

            /// Run distribute (if needed), search, and intersect for all
            /// configured variables; single-material runs use the no-op
            /// reconstructor.
            pub fn compute_interpolation_weights(
                &mut self,
                method: IntersectMethod,
            ) -> Result<(), RemapError> {
                self.compute_interpolation_weights_with(method, &DummyInterfaceReconstructor)
            }

            /// As [`Self::compute_interpolation_weights`], with an explicit
            /// interface reconstructor for multi-material sources.
            pub fn compute_interpolation_weights_with<R: $recon>(
                &mut self,
                method: IntersectMethod,
                recon: &R,
            ) -> Result<(), RemapError> {
                match method {
                    IntersectMethod::Exact => {
                        self.search()?;
                        self.intersect()?;
                    }
                    IntersectMethod::SweptFace => {
                        self.intersect_swept()?;
                    }
                }
                if self.have_mm_fields {
                    self.intersect_materials(recon)?;
                }
                Ok(())
            }

            /// Interpolate one mesh variable from the cached weights into
            /// the target state, repairing mismatch per the options.
            /// Multi-material variables are routed to
            /// [`Self::interpolate_mat_var`].
            pub fn interpolate(
                &mut self,
                srcvarname: &str,
                trgvarname: &str,
                order: InterpolationOrder,
                opts: &VarOptions,
                part: Option<&PartsPair>,
            ) -> Result<MismatchStats, RemapError> {
                if !self.vars.iter().any(|v| v == srcvarname) {
                    return Err(RemapError::VariableNotFound(srcvarname.to_string()));
                }
                let kind = self
                    .source_state
                    .entity_kind(srcvarname)
                    .ok_or_else(|| RemapError::VariableNotFound(srcvarname.to_string()))?;
                if self.source_state.field_type(kind, srcvarname)
                    == Some(FieldType::MultiMaterialField)
                {
                    self.interpolate_mat_var(srcvarname, trgvarname, order, opts)?;
                    return Ok(MismatchStats { converged: true, ..Default::default() });
                }
                if part.is_some() && kind != EntityKind::Cell {
                    return Err(RemapError::UnsupportedEntityKind(kind));
                }

                let weights = self.weights.get(&kind).ok_or(RemapError::PhaseOrder {
                    requested: "interpolate",
                    missing: "intersect",
                })?;
                let filtered;
                let wref: &[Vec<Weight>] = match part {
                    Some(p) => {
                        filtered = core::filter_weights_by_part(weights, p);
                        &filtered
                    }
                    None => weights,
                };

                let src_values: Vec<Option<f64>> = match &self.flat {
                    Some((_, fs)) => fs.mesh_field(kind, srcvarname)?,
                    None => self.source_state.mesh_field(kind, srcvarname)?,
                }
                .iter()
                .copied()
                .map(Some)
                .collect();

                let (values, stats) = match (&self.flat, kind) {
                    (Some((fm, _)), EntityKind::Cell) => core::interpolate_with_fixup(
                        &CellVolumes::new(fm),
                        &CellVolumes::new(self.target_mesh),
                        wref,
                        &src_values,
                        order,
                        opts,
                        self.tols,
                        part,
                        true,
                    )?,
                    (None, EntityKind::Cell) => core::interpolate_with_fixup(
                        &CellVolumes::new(self.source_mesh),
                        &CellVolumes::new(self.target_mesh),
                        wref,
                        &src_values,
                        order,
                        opts,
                        self.tols,
                        part,
                        true,
                    )?,
                    (Some((fm, _)), EntityKind::Node) => core::interpolate_with_fixup(
                        &DualVolumes::new(fm),
                        &DualVolumes::new(self.target_mesh),
                        wref,
                        &src_values,
                        order,
                        opts,
                        self.tols,
                        None,
                        true,
                    )?,
                    (None, EntityKind::Node) => core::interpolate_with_fixup(
                        &DualVolumes::new(self.source_mesh),
                        &DualVolumes::new(self.target_mesh),
                        wref,
                        &src_values,
                        order,
                        opts,
                        self.tols,
                        None,
                        true,
                    )?,
                    (_, k) => return Err(RemapError::UnsupportedEntityKind(k)),
                };

                // Only owned entries are computed; ghosts keep whatever the
                // target state already holds.
                let n_all = self.target_mesh.num_entities(kind, EntityType::All);
                let mut data = match self.target_state.mesh_field(kind, trgvarname) {
                    Ok(existing) => existing.to_vec(),
                    Err(_) => vec![0.0; n_all],
                };
                if data.len() < n_all {
                    data.resize(n_all, 0.0);
                }
                match part {
                    Some(p) => {
                        for &c in p.target_cells() {
                            if c < values.len() {
                                data[c] = values[c];
                            }
                        }
                    }
                    None => data[..values.len()].copy_from_slice(&values),
                }
                self.target_state.set_mesh_field(kind, trgvarname, data)?;
                Ok(stats)
            }

            /// Interpolate one multi-material variable. Target material
            /// membership is inferred from the per-material coverage: a
            /// target cell joins material `m` iff its overlap with `m`
            /// exceeds `driver_relative_min_mat_vol` of its volume.
            pub fn interpolate_mat_var(
                &mut self,
                srcvarname: &str,
                trgvarname: &str,
                order: InterpolationOrder,
                opts: &VarOptions,
            ) -> Result<(), RemapError> {
                if self.mat_weights.is_empty() {
                    return Err(RemapError::PhaseOrder {
                        requested: "interpolate_mat_var",
                        missing: "intersect_materials",
                    });
                }
                let n_owned = self.target_mesh.num_owned_cells();
                let mat_ids: Vec<usize> = self.mat_weights.keys().copied().collect();

                for m in mat_ids {
                    let weights = &self.mat_weights[&m];

                    let mut tcells = Vec::new();
                    for t in 0..n_owned {
                        let cov: f64 = weights[t].iter().map(|w| w.volume()).sum();
                        let floor = self.tols.driver_relative_min_mat_vol
                            * self.target_mesh.cell_volume(t);
                        if cov > floor {
                            tcells.push(t);
                        }
                    }
                    if tcells.is_empty() {
                        continue;
                    }

                    // Source values live per (material, cell).
                    let (src_values, mat_name): (Vec<Option<f64>>, String) = match &self.flat
                    {
                        Some((fm, fs)) => {
                            let data = fs.mat_celldata(srcvarname, m)?;
                            let vals = (0..fm.num_cells())
                                .map(|c| {
                                    fs.cell_index_in_material(c, m).map(|i| data[i])
                                })
                                .collect();
                            (vals, fs.material_name(m).unwrap_or("").to_string())
                        }
                        None => {
                            let data = self.source_state.mat_celldata(srcvarname, m)?;
                            let vals = (0..self.source_mesh.num_cells())
                                .map(|c| {
                                    self.source_state
                                        .cell_index_in_material(c, m)
                                        .map(|i| data[i])
                                })
                                .collect();
                            (
                                vals,
                                self.source_state
                                    .material_name(m)
                                    .unwrap_or("")
                                    .to_string(),
                            )
                        }
                    };

                    let (values, _) = match &self.flat {
                        Some((fm, _)) => core::interpolate_with_fixup(
                            &CellVolumes::new(fm),
                            &CellVolumes::new(self.target_mesh),
                            weights,
                            &src_values,
                            order,
                            opts,
                            self.tols,
                            None,
                            false,
                        )?,
                        None => core::interpolate_with_fixup(
                            &CellVolumes::new(self.source_mesh),
                            &CellVolumes::new(self.target_mesh),
                            weights,
                            &src_values,
                            order,
                            opts,
                            self.tols,
                            None,
                            false,
                        )?,
                    };

                    self.target_state.ensure_material(m, &mat_name);
                    self.target_state.mat_add_cells(m, &tcells)?;
                    let member: HashSet<usize> = tcells.iter().copied().collect();
                    let existing: Vec<f64> = self
                        .target_state
                        .mat_celldata(trgvarname, m)
                        .map(|s| s.to_vec())
                        .unwrap_or_default();
                    let cells_now = self.target_state.mat_cells(m)?.to_vec();
                    let aligned: Vec<f64> = cells_now
                        .iter()
                        .enumerate()
                        .map(|(i, &c)| {
                            if member.contains(&c) {
                                values[c]
                            } else {
                                existing.get(i).copied().unwrap_or(0.0)
                            }
                        })
                        .collect();
                    self.target_state
                        .set_mat_celldata(trgvarname, m, aligned)?;
                }
                Ok(())
            }
        }
    };
}

remap_driver_dim_impl!(2, IntersectR2D, IntersectSweptFace2D, InterfaceReconstructor2d, intersect_materials_2d);
remap_driver_dim_impl!(3, IntersectR3D, IntersectSweptFace3D, InterfaceReconstructor3d, intersect_materials_3d);
