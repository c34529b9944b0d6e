//! # mesh-remap
//!
//! mesh-remap is a modular Rust library for conservatively remapping
//! discretized scalar fields between unstructured meshes that cover
//! overlapping regions of space, in serial and distributed settings. It
//! provides the classic three-stage pipeline (search for candidate
//! overlaps, exact intersection moments, interpolation with gradient
//! reconstruction and slope limiting) plus mismatch repair and a
//! bounding-box source redistributor built on pluggable communication
//! backends (serial, threads, MPI).
//!
//! ## Features
//! - Cell-centered and node-centered (dual mesh) remap in 2-D and 3-D
//! - First-order (constant-preserving) and second-order (linear-preserving)
//!   interpolation with Barth-Jespersen limiting and boundary policies
//! - Exact polygon/polyhedron intersection and swept-face (Lagrangian)
//!   intersection for same-topology displaced meshes
//! - Multi-material fields through a pluggable interface-reconstructor
//!   contract
//! - Partial/empty-cell mismatch repair with a reported residual
//! - Flat mesh/state containers and a bounding-box distributor for
//!   multi-rank runs
//!
//! ## Usage
//! Add `mesh-remap` as a dependency and enable features as needed:
//!
//! ```toml
//! [dependencies]
//! mesh-remap = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```
//!
//! Meshes and states are consumed through the [`mesh::MeshView`] and
//! [`state::StateView`] traits; the crate ships a uniform-grid reference
//! implementation ([`mesh::simple::SimpleMesh`],
//! [`state::simple::SimpleState`]) and the flat containers the
//! distributor operates on. The driver mutates only the target state.

pub mod distributed;
pub mod driver;
pub mod flat;
pub mod geometry;
pub mod intersect;
pub mod interpolate;
pub mod mesh;
pub mod remap_error;
pub mod search;
pub mod state;
pub mod support;

/// A convenient prelude importing the most-used traits and types.
pub mod prelude {
    pub use crate::distributed::{BoundingBoxDistributor, Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::distributed::MpiComm;
    pub use crate::driver::{IntersectMethod, MismatchFixer, PartsPair, RemapDriver};
    pub use crate::flat::{FlatMesh, FlatState};
    pub use crate::geometry::{BoundingBox, Moments, Point, Vector};
    pub use crate::intersect::{
        DummyInterfaceReconstructor, IntersectR2D, IntersectR3D, IntersectSweptFace2D,
        IntersectSweptFace3D, MeshIntersect,
    };
    pub use crate::interpolate::{
        Interpolate, Interpolate1stOrder, Interpolate2ndOrder, InterpolationOrder,
        LimitedGradient,
    };
    pub use crate::mesh::control_volume::{CellVolumes, ControlVolumes};
    pub use crate::mesh::dual::DualVolumes;
    pub use crate::mesh::simple::SimpleMesh;
    pub use crate::mesh::MeshView;
    pub use crate::remap_error::RemapError;
    pub use crate::search::SearchKdTree;
    pub use crate::state::simple::SimpleState;
    pub use crate::state::{StateView, StateViewMut};
    pub use crate::support::{
        BoundaryLimiter, EmptyFixup, EntityKind, EntityType, FieldType, Limiter,
        MismatchStats, NumericTolerances, PartialFixup, VarOptions, Weight,
        DEFAULT_CONSERVATION_TOL, DEFAULT_MAX_FIXUP_ITER,
    };
}
