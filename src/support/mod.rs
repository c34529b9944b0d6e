//! Shared vocabulary for the remap pipeline: entity kinds, field kinds,
//! limiter and fixup policies, numeric tolerances, and the weight records
//! exchanged between the intersect and interpolate stages.
//!
//! Cells are the highest-dimension entities of a mesh and nodes the lowest;
//! faces of a 3-D mesh are 2-D entities and of a 2-D mesh 1-D entities
//! (edges). Wedges are a simplicial decomposition of a cell: in 2-D a
//! triangle spanned by a node, an adjacent edge midpoint and the cell
//! centroid; in 3-D a tetrahedron spanned by a node, an edge midpoint, a
//! face centroid and the cell centroid. A corner is the union of the wedges
//! of one node in one cell; the dual cell of a node is the union of its
//! corners and is the control volume used for node-centered remap.

pub mod parallel;

use serde::{Deserialize, Serialize};

/// Kinds of mesh entities a field can live on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Cell,
    Node,
    Face,
    Edge,
    Wedge,
    Corner,
}

/// Parallel ownership class of an entity on a partition.
///
/// Owned entities always precede ghosts in local-index order, so
/// `[0, owned)` are owned and `[owned, all)` are ghost.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Owned,
    Ghost,
    All,
}

/// Whether a field stores one value per entity or one value per
/// (material, cell) pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    MeshField,
    MultiMaterialField,
}

/// Slope limiter applied to interior entities during gradient
/// reconstruction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Limiter {
    NoLimiter,
    BarthJespersen,
}

/// Slope limiter applied to entities on the exterior boundary.
///
/// Kept separate from [`Limiter`] so that boundary cells, whose stencils
/// are one-sided, do not spuriously clamp interior gradients.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundaryLimiter {
    BndNoLimiter,
    BndZeroGradient,
    BndBarthJespersen,
}

/// Fixup policy for partially covered target entities.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartialFixup {
    /// Keep the locally conservative value `Σ φ·w / V_target`.
    LocallyConservative,
    /// Renormalize to the covered average `Σ φ·w / Σ w`; preserves
    /// constants but loses local conservation.
    Constant,
    /// Start from `Constant`, then shift every adjustable cell by its share
    /// of the global mass discrepancy until conservation is restored.
    ShiftedConservative,
}

/// Fixup policy for target entities with no source overlap at all.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmptyFixup {
    /// Write zero and exclude the entity from repair.
    LeaveEmpty,
    /// Copy the value of the nearest non-empty entity (breadth-first over
    /// face adjacency).
    Extrapolate,
    /// Reserved; requesting it is an error.
    Fill,
}

pub const DEFAULT_LIMITER: Limiter = Limiter::BarthJespersen;
pub const DEFAULT_BND_LIMITER: BoundaryLimiter = BoundaryLimiter::BndNoLimiter;
pub const DEFAULT_PARTIAL_FIXUP: PartialFixup = PartialFixup::LocallyConservative;
pub const DEFAULT_EMPTY_FIXUP: EmptyFixup = EmptyFixup::LeaveEmpty;

/// Default relative tolerance on aggregated field values used to detect and
/// repair mesh mismatch.
pub const DEFAULT_CONSERVATION_TOL: f64 = 100.0 * f64::EPSILON;

/// Default iteration cap for the shifted-conservative repair loop.
pub const DEFAULT_MAX_FIXUP_ITER: usize = 5;

/// Tolerances used to handle tiny values throughout the pipeline.
///
/// Carried by value through the driver; never global state.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NumericTolerances {
    /// A polygon whose successive edge cross-products change sign by more
    /// than this is treated as non-convex.
    pub polygon_convexity_eps: f64,
    /// Intersection volumes below this (slightly negative) floor abort the
    /// remap; values between it and zero are treated as empty.
    pub minimal_intersection_volume: f64,
    /// Relative slack applied to bounding-box overlap tests in the search.
    pub intersect_bb_relative_distance: f64,
    /// Intersection entries with relative volume below this are skipped by
    /// the interpolators.
    pub min_relative_volume: f64,
    /// A material whose relative overlap volume with a target cell is below
    /// this is not added to the cell.
    pub driver_relative_min_mat_vol: f64,
}

impl Default for NumericTolerances {
    fn default() -> Self {
        Self {
            polygon_convexity_eps: 1e-14,
            minimal_intersection_volume: -1e-14,
            intersect_bb_relative_distance: 1e-12,
            min_relative_volume: 1e-12,
            driver_relative_min_mat_vol: 1e-10,
        }
    }
}

/// One contribution of a source entity to a target entity: the source's
/// local index and the geometric moments of the overlap region,
/// `[V, V·c_x, V·c_y (, V·c_z)]`.
///
/// A source entity may appear more than once in a target's list when the
/// overlap consists of disjoint pieces; the interpolation formulas are
/// commutative and associative over the list, so multiplicity and order do
/// not matter.
#[derive(Clone, Debug, PartialEq)]
pub struct Weight {
    pub entity_id: usize,
    pub moments: Vec<f64>,
}

impl Weight {
    pub fn new(entity_id: usize, moments: Vec<f64>) -> Self {
        Self { entity_id, moments }
    }

    /// Zeroth moment: the overlap volume.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.moments[0]
    }
}

/// Outcome of one mismatch-repair pass.
///
/// Non-convergence is reported here (and logged), never raised as an error;
/// the partially repaired field is kept.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct MismatchStats {
    /// Number of shifted-conservative iterations performed.
    pub iterations: usize,
    /// Final relative mass residual `|Δm| / |m_source|`.
    pub residual: f64,
    /// Whether the residual reached `conservation_tol`.
    pub converged: bool,
}

/// Per-variable interpolation options.
///
/// `Default` reproduces the library defaults: Barth-Jespersen limiting on
/// the interior, no limiting on the boundary, locally conservative partial
/// fixup, empty cells left empty, and unbounded field values.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VarOptions {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub limiter: Limiter,
    pub boundary_limiter: BoundaryLimiter,
    pub partial_fixup: PartialFixup,
    pub empty_fixup: EmptyFixup,
    pub conservation_tol: f64,
    pub max_fixup_iter: usize,
}

impl Default for VarOptions {
    fn default() -> Self {
        Self {
            lower_bound: f64::NEG_INFINITY,
            upper_bound: f64::INFINITY,
            limiter: DEFAULT_LIMITER,
            boundary_limiter: DEFAULT_BND_LIMITER,
            partial_fixup: DEFAULT_PARTIAL_FIXUP,
            empty_fixup: DEFAULT_EMPTY_FIXUP,
            conservation_tol: DEFAULT_CONSERVATION_TOL,
            max_fixup_iter: DEFAULT_MAX_FIXUP_ITER,
        }
    }
}
