//! Part-by-part remap with mismatched part geometries.
//!
//! Source: 4x4 grid on the unit square, density 100 for x < 0.5 and 1
//! elsewhere, split into parts at x = 0.5. Target: 5x5 grid split at
//! x = 0.8. The first target part therefore has a partially covered column
//! at [0.4, 0.6], an empty band at [0.6, 0.8], and the second part a
//! single fully covered column carrying far less source mass than its
//! source part holds.

use mesh_remap::prelude::*;

fn centroid_x(mesh: &SimpleMesh<2>, c: usize) -> f64 {
    mesh.cell_centroid(c)[0]
}

fn make_parts(mesh: &SimpleMesh<2>, threshold: f64) -> (Vec<usize>, Vec<usize>) {
    let mut below = Vec::new();
    let mut above = Vec::new();
    for c in 0..mesh.num_owned_cells() {
        if centroid_x(mesh, c) < threshold {
            below.push(c);
        } else {
            above.push(c);
        }
    }
    (below, above)
}

fn expected_density(x: f64, partial: PartialFixup, empty: EmptyFixup) -> f64 {
    use EmptyFixup::*;
    use PartialFixup::*;
    match (partial, empty) {
        (LocallyConservative, LeaveEmpty) => {
            if x < 0.4 {
                100.0
            } else if x < 0.6 {
                50.0
            } else if x < 0.8 {
                0.0
            } else {
                1.0
            }
        }
        (LocallyConservative, Extrapolate) => {
            if x < 0.4 {
                100.0
            } else if x < 0.8 {
                50.0
            } else {
                1.0
            }
        }
        (Constant, LeaveEmpty) => {
            if x < 0.6 {
                100.0
            } else if x < 0.8 {
                0.0
            } else {
                1.0
            }
        }
        (Constant, Extrapolate) => {
            if x < 0.8 {
                100.0
            } else {
                1.0
            }
        }
        (ShiftedConservative, LeaveEmpty) => {
            if x < 0.6 {
                // 15 covered cells at constant 100 hold 60 mass against a
                // 50-mass source part.
                (20.0 - (20.0 * 3.0 - 50.0) / 3.0) / 0.2
            } else if x < 0.8 {
                0.0
            } else {
                (0.2 - (0.2 - 0.5)) / 0.2
            }
        }
        (ShiftedConservative, Extrapolate) => {
            if x < 0.8 {
                (20.0 - (20.0 * 4.0 - 50.0) / 4.0) / 0.2
            } else {
                (0.2 - (0.2 - 0.5)) / 0.2
            }
        }
        _ => unreachable!(),
    }
}

fn run_case(partial: PartialFixup, empty: EmptyFixup) {
    let src = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [4, 4]);
    let tgt = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [5, 5]);

    let density: Vec<f64> = (0..16)
        .map(|c| if centroid_x(&src, c) < 0.5 { 100.0 } else { 1.0 })
        .collect();
    let mut source_state = SimpleState::new();
    source_state.add_field("density", EntityKind::Cell, density);
    let mut target_state = SimpleState::new();

    let (src_lo, src_hi) = make_parts(&src, 0.5);
    let (tgt_lo, tgt_hi) = make_parts(&tgt, 0.8);
    let parts = [
        PartsPair::new(src_lo, tgt_lo),
        PartsPair::new(src_hi, tgt_hi),
    ];

    let mut driver = RemapDriver::new(&src, &source_state, &tgt, &mut target_state, NoComm);
    driver.set_remap_var_names(&["density"]).unwrap();
    driver
        .compute_interpolation_weights(IntersectMethod::Exact)
        .unwrap();

    let opts = VarOptions {
        partial_fixup: partial,
        empty_fixup: empty,
        ..Default::default()
    };
    for part in &parts {
        driver
            .interpolate(
                "density",
                "density",
                InterpolationOrder::First,
                &opts,
                Some(part),
            )
            .unwrap();
    }
    drop(driver);

    let remapped = target_state
        .mesh_field(EntityKind::Cell, "density")
        .unwrap();
    for c in 0..25 {
        let expect = expected_density(centroid_x(&tgt, c), partial, empty);
        assert!(
            (remapped[c] - expect).abs() < 1e-10,
            "{partial:?}/{empty:?} cell {c} (x={}): {} vs {expect}",
            centroid_x(&tgt, c),
            remapped[c]
        );
    }
}

#[test]
fn locally_conservative_leave_empty() {
    run_case(PartialFixup::LocallyConservative, EmptyFixup::LeaveEmpty);
}

#[test]
fn locally_conservative_extrapolate() {
    run_case(PartialFixup::LocallyConservative, EmptyFixup::Extrapolate);
}

#[test]
fn constant_leave_empty() {
    run_case(PartialFixup::Constant, EmptyFixup::LeaveEmpty);
}

#[test]
fn constant_extrapolate() {
    run_case(PartialFixup::Constant, EmptyFixup::Extrapolate);
}

#[test]
fn shifted_conservative_leave_empty() {
    run_case(PartialFixup::ShiftedConservative, EmptyFixup::LeaveEmpty);
}

#[test]
fn shifted_conservative_extrapolate() {
    run_case(PartialFixup::ShiftedConservative, EmptyFixup::Extrapolate);
}

#[test]
fn shifted_conservative_conserves_part_mass() {
    // Direct check of the conservation identity behind the expected
    // values: after repair each part's target mass equals its source mass.
    let src = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [4, 4]);
    let tgt = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [5, 5]);
    let density: Vec<f64> = (0..16)
        .map(|c| if centroid_x(&src, c) < 0.5 { 100.0 } else { 1.0 })
        .collect();
    let mut source_state = SimpleState::new();
    source_state.add_field("density", EntityKind::Cell, density.clone());
    let mut target_state = SimpleState::new();

    let (src_lo, tgt_lo) = (make_parts(&src, 0.5).0, make_parts(&tgt, 0.8).0);
    let part = PartsPair::new(src_lo.clone(), tgt_lo.clone());

    let mut driver = RemapDriver::new(&src, &source_state, &tgt, &mut target_state, NoComm);
    driver.set_remap_var_names(&["density"]).unwrap();
    driver
        .compute_interpolation_weights(IntersectMethod::Exact)
        .unwrap();
    let opts = VarOptions {
        partial_fixup: PartialFixup::ShiftedConservative,
        ..Default::default()
    };
    let stats = driver
        .interpolate(
            "density",
            "density",
            InterpolationOrder::First,
            &opts,
            Some(&part),
        )
        .unwrap();
    assert!(stats.converged);
    assert!(stats.residual <= DEFAULT_CONSERVATION_TOL);
    drop(driver);

    let remapped = target_state
        .mesh_field(EntityKind::Cell, "density")
        .unwrap();
    let source_mass: f64 = src_lo.iter().map(|&c| density[c] * src.cell_volume(c)).sum();
    let target_mass: f64 = tgt_lo
        .iter()
        .map(|&c| remapped[c] * tgt.cell_volume(c))
        .sum();
    assert!((target_mass - source_mass).abs() < 1e-10);
}
