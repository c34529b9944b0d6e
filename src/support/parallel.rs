//! Element-wise parallel-for and transform primitives over entity index
//! ranges.
//!
//! The pipeline phases are embarrassingly parallel per target entity; every
//! element-wise loop in the driver and interpolators goes through these two
//! functions so the sequential and `rayon` execution paths stay in one
//! place. Work functions must be pure `(entity_index) -> value`.

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Apply `op` to every index in `[0, n)` and collect the results in index
/// order.
#[cfg(feature = "rayon")]
pub fn parallel_transform<T, F>(n: usize, op: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    (0..n).into_par_iter().map(op).collect()
}

/// Apply `op` to every index in `[0, n)` and collect the results in index
/// order.
#[cfg(not(feature = "rayon"))]
pub fn parallel_transform<T, F>(n: usize, op: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    (0..n).map(op).collect()
}

/// Run `op` for every index in `[0, n)` for its side effects on captured
/// shared state. The caller guarantees distinct indices touch disjoint data.
#[cfg(feature = "rayon")]
pub fn parallel_for<F>(n: usize, op: F)
where
    F: Fn(usize) + Sync + Send,
{
    (0..n).into_par_iter().for_each(op);
}

/// Run `op` for every index in `[0, n)` for its side effects on captured
/// shared state.
#[cfg(not(feature = "rayon"))]
pub fn parallel_for<F>(n: usize, op: F)
where
    F: Fn(usize) + Sync + Send,
{
    (0..n).for_each(op);
}
