//! Geometry primitives: fixed-dimension points and vectors, small dense
//! matrices, bounding boxes, signed moments of polygons and polyhedra, and
//! the exact clipping kernels behind the intersect stage.

pub mod bbox;
pub mod clip;
pub mod matrix;
pub mod moments;
pub mod point;

pub use bbox::BoundingBox;
pub use matrix::DenseMatrix;
pub use moments::Moments;
pub use point::{midpoint, Point, Vector};
