//! Distributed remap through the flat containers and the bounding-box
//! distributor must agree with the serial remap of the same problem.
//!
//! Two thread "ranks" each own an x-slab of the source and target grids;
//! results are gathered by target global id and compared against the
//! single-rank run. All scenarios share one test body so the mailbox tags
//! of consecutive distributor rounds never interleave across tests.

use mesh_remap::prelude::*;
use std::collections::HashMap;
use std::sync::Mutex;

/// Tests sharing the process-wide mailbox must not interleave.
static MAILBOX_GUARD: Mutex<()> = Mutex::new(());

const NX_SRC: usize = 4;
const NX_TGT: usize = 5;

fn density(_x: Point<2>) -> f64 {
    7.5
}

fn linear(x: Point<2>) -> f64 {
    2.0 * x[0] - x[1] + 0.5
}

fn serial_remap(f: fn(Point<2>) -> f64, order: InterpolationOrder, opts: &VarOptions) -> HashMap<u64, f64> {
    let src = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [NX_SRC, NX_SRC]);
    let tgt = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [NX_TGT, NX_TGT]);
    let vals: Vec<f64> = (0..src.num_owned_cells())
        .map(|c| f(src.cell_centroid(c)))
        .collect();
    let mut source_state = SimpleState::new();
    source_state.add_field("q", EntityKind::Cell, vals);
    let mut target_state = SimpleState::new();
    let mut driver = RemapDriver::new(&src, &source_state, &tgt, &mut target_state, NoComm);
    driver.set_remap_var_names(&["q"]).unwrap();
    driver
        .compute_interpolation_weights(IntersectMethod::Exact)
        .unwrap();
    driver
        .interpolate("q", "q", order, opts, None)
        .unwrap();
    drop(driver);
    let out = target_state.mesh_field(EntityKind::Cell, "q").unwrap();
    (0..tgt.num_owned_cells())
        .map(|c| (tgt.cell_global_id(c), out[c]))
        .collect()
}

fn distributed_remap(
    nranks: usize,
    f: fn(Point<2>) -> f64,
    order: InterpolationOrder,
    opts: VarOptions,
) -> HashMap<u64, f64> {
    let handles: Vec<_> = (0..nranks)
        .map(|rank| {
            let opts = opts;
            std::thread::spawn(move || {
                // Ghost layers give partition-boundary source cells the
                // same gradient stencils the serial run sees.
                let src = SimpleMesh::<2>::slab_with_ghosts(
                    [0.0, 0.0],
                    [1.0, 1.0],
                    [NX_SRC, NX_SRC],
                    nranks,
                    rank,
                );
                let tgt =
                    SimpleMesh::<2>::slab([0.0, 0.0], [1.0, 1.0], [NX_TGT, NX_TGT], nranks, rank);
                // Field values cover owned and ghost cells alike.
                let vals: Vec<f64> = (0..src.num_cells())
                    .map(|c| f(src.cell_centroid(c)))
                    .collect();
                let mut source_state = SimpleState::new();
                source_state.add_field("q", EntityKind::Cell, vals);
                let mut target_state = SimpleState::new();

                let comm = ThreadComm::new(rank, nranks);
                let mut driver =
                    RemapDriver::new(&src, &source_state, &tgt, &mut target_state, comm);
                driver.set_remap_var_names(&["q"]).unwrap();
                driver
                    .compute_interpolation_weights(IntersectMethod::Exact)
                    .unwrap();
                driver
                    .interpolate("q", "q", order, &opts, None)
                    .unwrap();
                drop(driver);

                let out = target_state.mesh_field(EntityKind::Cell, "q").unwrap();
                (0..tgt.num_owned_cells())
                    .map(|c| (tgt.cell_global_id(c), out[c]))
                    .collect::<Vec<(u64, f64)>>()
            })
        })
        .collect();

    let mut merged = HashMap::new();
    for h in handles {
        for (gid, v) in h.join().expect("rank panicked") {
            let prev = merged.insert(gid, v);
            assert!(prev.is_none(), "target cell {gid} owned by two ranks");
        }
    }
    merged
}

#[test]
fn two_ranks_match_serial() {
    let _guard = MAILBOX_GUARD.lock().unwrap();
    let plain = VarOptions::default();
    let unlimited = VarOptions {
        limiter: Limiter::NoLimiter,
        boundary_limiter: BoundaryLimiter::BndNoLimiter,
        ..Default::default()
    };
    let limited = VarOptions::default();

    // Scenarios run back-to-back on the shared mailbox, one at a time.
    let cases: [(fn(Point<2>) -> f64, InterpolationOrder, VarOptions, f64); 3] = [
        (density, InterpolationOrder::First, plain, 1e-13),
        (linear, InterpolationOrder::First, unlimited, 1e-13),
        (linear, InterpolationOrder::Second, limited, 1e-12),
    ];

    for (i, (f, order, opts, tol)) in cases.into_iter().enumerate() {
        let serial = serial_remap(f, order, &opts);
        let distributed = distributed_remap(2, f, order, opts);
        assert_eq!(serial.len(), distributed.len(), "case {i}");
        for (gid, &sv) in &serial {
            let dv = distributed[gid];
            assert!(
                (sv - dv).abs() <= tol * sv.abs().max(1.0),
                "case {i}, target gid {gid}: serial {sv} vs distributed {dv}"
            );
        }
    }
}

#[test]
fn three_ranks_match_serial_for_constants() {
    let _guard = MAILBOX_GUARD.lock().unwrap();
    let serial = serial_remap(density, InterpolationOrder::First, &VarOptions::default());
    let distributed = distributed_remap(
        3,
        density,
        InterpolationOrder::First,
        VarOptions::default(),
    );
    assert_eq!(serial.len(), distributed.len());
    for (gid, &sv) in &serial {
        assert!((sv - distributed[gid]).abs() <= 1e-13);
    }
}
