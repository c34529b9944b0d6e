//! Exact intersection of target control volumes with source control
//! volumes: the weights feeding the interpolators.
//!
//! Three algorithms, selected by the driver: polygon-polygon clipping in
//! 2-D, tetrahedral reduction in 3-D, and swept-face regions for meshes
//! with identical topology but displaced vertices.

pub mod matpoly;
pub mod r2d;
pub mod r3d;
pub mod swept_face;

use crate::remap_error::RemapError;
use crate::support::Weight;

pub use matpoly::{DummyInterfaceReconstructor, InterfaceReconstructor2d, InterfaceReconstructor3d, MatPoly2, MatPoly3};
pub use r2d::IntersectR2D;
pub use r3d::IntersectR3D;
pub use swept_face::{IntersectSweptFace2D, IntersectSweptFace3D};

/// One target entity's intersection against a candidate list, producing
/// `(source_id, moments)` weights. Implemented by all three algorithms so
/// the driver can be written once per dimension.
pub trait MeshIntersect<const D: usize> {
    fn intersect(&self, target_id: usize, candidates: &[usize]) -> Result<Vec<Weight>, RemapError>;
}
