//! Distributed-memory support: the communicator abstraction and the
//! bounding-box source redistribution that runs before the pipeline.

pub mod bounding_boxes;
pub mod communicator;

pub use bounding_boxes::BoundingBoxDistributor;
pub use communicator::{CommTag, Communicator, NoComm, ThreadComm, Wait};

#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
