//! Contiguous, redistribution-friendly mesh and state containers.
//!
//! The distributor cannot ship pointer-rich mesh structures; it ships the
//! flat arrays these containers are made of. A remap over a distributed
//! source first flattens the native source mesh/state into `FlatMesh` /
//! `FlatState`, redistributes them, and runs the pipeline against the flat
//! containers through the same interfaces the native wrappers satisfy.

pub mod mesh;
pub mod state;

pub use mesh::FlatMesh;
pub use state::{FlatField, FlatState};
