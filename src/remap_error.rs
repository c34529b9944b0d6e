//! RemapError: unified error type for mesh-remap public APIs
//!
//! Every fallible public API in this crate reports failures through this
//! type rather than panicking. Geometric impossibilities and contract
//! violations are fatal to the current driver call; recoverable conditions
//! (empty or partially covered target entities) never surface here and are
//! handled by the mismatch-repair stage instead.

use crate::support::EntityKind;
use thiserror::Error;

/// Unified error type for mesh-remap operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RemapError {
    /// Source and target meshes live in different ambient dimensions.
    #[error("space dimension mismatch: source is {source_dim}-D, target is {target_dim}-D")]
    DimensionMismatch { source_dim: usize, target_dim: usize },
    /// A named variable is not registered on the state it was requested from.
    #[error("variable `{0}` not found on state")]
    VariableNotFound(String),
    /// A variable was addressed on the wrong entity kind.
    #[error("variable `{name}` lives on {actual:?}, not {requested:?}")]
    EntityKindMismatch {
        name: String,
        requested: EntityKind,
        actual: EntityKind,
    },
    /// Remap is only defined for cell- and node-centered fields.
    #[error("cannot remap fields on {0:?} entities")]
    UnsupportedEntityKind(EntityKind),
    /// A material id is unknown to the state being queried.
    #[error("material {0} not found on state")]
    MaterialNotFound(usize),
    /// A pipeline phase was invoked before the phase it depends on.
    #[error("driver phase `{requested}` requires `{missing}` to have run first")]
    PhaseOrder {
        requested: &'static str,
        missing: &'static str,
    },
    /// The `Fill` empty-cell policy is reserved and not implemented.
    #[error("empty-cell fixup policy `Fill` is not implemented")]
    FillNotImplemented,

    /// An intersection produced a volume more negative than the
    /// `minimal_intersection_volume` tolerance allows.
    #[error(
        "negative intersection volume {volume:e} between target {target} and source {source_cell}"
    )]
    NegativeIntersectionVolume {
        target: usize,
        source_cell: usize,
        volume: f64,
    },
    /// A swept face connects source and target positions that cross each
    /// other; the swept region is not a simple polygon/polyhedron.
    #[error("twisted swept face {face} on cell {cell}")]
    TwistedSweptFace { cell: usize, face: usize },
    /// A swept region flowed into a cell outside the provided stencil.
    #[error("invalid swept-face stencil for source cell {0}")]
    InvalidSweptStencil(usize),
    /// A cell has fewer vertices than a valid polygon/polyhedron requires.
    #[error("degenerate cell {cell}: {detail}")]
    DegenerateCell { cell: usize, detail: &'static str },

    /// Swept-face remap requires source and target meshes with identical
    /// topology (and no prior redistribution).
    #[error("swept-face remap topology requirement violated: {0}")]
    TopologyMismatch(&'static str),

    /// A flat container was used before `finish_init` derived its caches.
    #[error("flat mesh used before finish_init()")]
    FlatMeshNotFinalized,
    /// An adjacency entry referenced a global id absent from the id table.
    #[error("global id {0} not present in the local id table")]
    UnknownGlobalId(u64),

    /// A point-to-point exchange with a peer failed.
    #[error("communication with rank {neighbor} failed: {detail}")]
    CommError { neighbor: usize, detail: String },
    /// A peer shipped a different number of bytes than the size-exchange
    /// round declared.
    #[error("message from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
}
