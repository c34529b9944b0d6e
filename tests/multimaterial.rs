//! Multi-material remap: membership inference and per-material values.

use mesh_remap::intersect::matpoly::{InterfaceReconstructor2d, MatPoly2};
use mesh_remap::prelude::*;

/// Two materials split at x = 0.5 along source cell boundaries, so every
/// source cell is single-material and the no-op reconstructor suffices.
#[test]
fn single_material_cells_remap_per_material() {
    let src = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [4, 4]);
    let tgt = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [5, 5]);

    let left: Vec<usize> = (0..16)
        .filter(|&c| src.cell_centroid(c)[0] < 0.5)
        .collect();
    let right: Vec<usize> = (0..16)
        .filter(|&c| src.cell_centroid(c)[0] >= 0.5)
        .collect();

    let mut source_state = SimpleState::new();
    // Non-contiguous ids on purpose.
    source_state.add_material_with_id(0, "steel", left.clone());
    source_state.add_material_with_id(7, "air", right.clone());
    source_state.add_mat_field("mat_rho", 0, vec![10.0; left.len()]);
    source_state.add_mat_field("mat_rho", 7, vec![2.0; right.len()]);

    let mut target_state = SimpleState::new();
    let mut driver = RemapDriver::new(&src, &source_state, &tgt, &mut target_state, NoComm);
    driver.set_remap_var_names(&["mat_rho"]).unwrap();
    driver
        .compute_interpolation_weights(IntersectMethod::Exact)
        .unwrap();
    driver
        .interpolate(
            "mat_rho",
            "mat_rho",
            InterpolationOrder::First,
            &VarOptions::default(),
            None,
        )
        .unwrap();
    drop(driver);

    // Target columns are 0.2 wide: columns 1-2 are pure steel, column 3
    // straddles the interface, columns 4-5 are pure air.
    for c in 0..25 {
        let x = tgt.cell_centroid(c)[0];
        let mats = target_state.cell_materials(c);
        if x < 0.4 {
            assert_eq!(mats, vec![0], "cell {c}");
        } else if x < 0.6 {
            assert_eq!(mats, vec![0, 7], "cell {c}");
        } else {
            assert_eq!(mats, vec![7], "cell {c}");
        }
    }

    for &m in &[0usize, 7] {
        let cells = target_state.mat_cells(m).unwrap().to_vec();
        let data = target_state.mat_celldata("mat_rho", m).unwrap();
        let expect = if m == 0 { 10.0 } else { 2.0 };
        assert_eq!(cells.len(), data.len());
        for (i, &c) in cells.iter().enumerate() {
            assert!(
                (data[i] - expect).abs() < 1e-12,
                "material {m}, cell {c}: {}",
                data[i]
            );
        }
    }
}

/// A planar-interface reconstructor for one vertical interface per cell.
struct VerticalSplit {
    // (cell, interface x, left material, right material), per mixed cell.
    cuts: Vec<(usize, f64, usize, usize)>,
    mesh: SimpleMesh<2>,
}

impl InterfaceReconstructor2d for VerticalSplit {
    fn cell_matpolys(&self, cell: usize) -> Vec<(usize, MatPoly2)> {
        let Some(&(_, cut, left, right)) = self.cuts.iter().find(|&&(c, ..)| c == cell)
        else {
            return Vec::new();
        };
        let bb = self.mesh.cell_bounding_box(cell);
        let (x0, x1) = (bb.min[0], bb.max[0]);
        let (y0, y1) = (bb.min[1], bb.max[1]);
        vec![
            (
                left,
                MatPoly2(vec![
                    Point([x0, y0]),
                    Point([cut, y0]),
                    Point([cut, y1]),
                    Point([x0, y1]),
                ]),
            ),
            (
                right,
                MatPoly2(vec![
                    Point([cut, y0]),
                    Point([x1, y0]),
                    Point([x1, y1]),
                    Point([cut, y1]),
                ]),
            ),
        ]
    }
}

/// One mixed source cell whose matpolys are supplied by a reconstructor:
/// the target halves land in exactly one material each.
#[test]
fn mixed_cell_uses_reconstructed_matpolys() {
    let src = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [1, 1]);
    let tgt = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [2, 1]);

    let mut source_state = SimpleState::new();
    source_state.add_material_with_id(0, "water", vec![0]);
    source_state.add_material_with_id(1, "oil", vec![0]);
    source_state.add_mat_field("mat_rho", 0, vec![1000.0]);
    source_state.add_mat_field("mat_rho", 1, vec![800.0]);

    let recon = VerticalSplit {
        cuts: vec![(0, 0.5, 0, 1)],
        mesh: src.clone(),
    };

    let mut target_state = SimpleState::new();
    let mut driver = RemapDriver::new(&src, &source_state, &tgt, &mut target_state, NoComm);
    driver.set_remap_var_names(&["mat_rho"]).unwrap();
    driver
        .compute_interpolation_weights_with(IntersectMethod::Exact, &recon)
        .unwrap();
    driver
        .interpolate_mat_var(
            "mat_rho",
            "mat_rho",
            InterpolationOrder::First,
            &VarOptions::default(),
        )
        .unwrap();
    drop(driver);

    assert_eq!(target_state.cell_materials(0), vec![0]);
    assert_eq!(target_state.cell_materials(1), vec![1]);
    assert!((target_state.mat_celldata("mat_rho", 0).unwrap()[0] - 1000.0).abs() < 1e-9);
    assert!((target_state.mat_celldata("mat_rho", 1).unwrap()[0] - 800.0).abs() < 1e-9);
}
