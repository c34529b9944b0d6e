//! An in-memory state manager satisfying [`StateView`]/[`StateViewMut`]:
//! the reference wrapper used by the test-suite and examples.

use super::{StateView, StateViewMut};
use crate::remap_error::RemapError;
use crate::support::{EntityKind, FieldType};
use hashbrown::HashMap;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
struct MeshField {
    kind: EntityKind,
    data: Vec<f64>,
}

#[derive(Clone, Debug, Default)]
struct Material {
    name: String,
    cells: Vec<usize>,
    index_of: HashMap<usize, usize>,
}

impl Material {
    fn push_cells(&mut self, cells: &[usize]) {
        for &c in cells {
            if !self.index_of.contains_key(&c) {
                self.index_of.insert(c, self.cells.len());
                self.cells.push(c);
            }
        }
    }
}

/// A simple state manager: named scalar fields on cells or nodes plus a
/// material registry with per-material cell data.
#[derive(Clone, Debug, Default)]
pub struct SimpleState {
    mesh_fields: BTreeMap<String, MeshField>,
    // field name -> material id -> values aligned with the material's cells
    mat_fields: BTreeMap<String, BTreeMap<usize, Vec<f64>>>,
    materials: BTreeMap<usize, Material>,
}

impl SimpleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mesh field, replacing any previous values.
    pub fn add_field(&mut self, name: &str, kind: EntityKind, data: Vec<f64>) {
        self.mesh_fields
            .insert(name.to_string(), MeshField { kind, data });
    }

    /// Register a material under an explicit id.
    pub fn add_material_with_id(&mut self, m: usize, name: &str, cells: Vec<usize>) {
        let mut mat = Material {
            name: name.to_string(),
            ..Default::default()
        };
        mat.push_cells(&cells);
        self.materials.insert(m, mat);
    }

    /// Register a multi-material field for one material; values align with
    /// the material's cell list.
    pub fn add_mat_field(&mut self, name: &str, m: usize, values: Vec<f64>) {
        self.mat_fields
            .entry(name.to_string())
            .or_default()
            .insert(m, values);
    }
}

impl StateView for SimpleState {
    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.mesh_fields.keys().cloned().collect();
        names.extend(self.mat_fields.keys().cloned());
        names
    }

    fn entity_kind(&self, name: &str) -> Option<EntityKind> {
        if let Some(f) = self.mesh_fields.get(name) {
            return Some(f.kind);
        }
        // Multi-material fields are always cell-based.
        self.mat_fields.get(name).map(|_| EntityKind::Cell)
    }

    fn field_type(&self, kind: EntityKind, name: &str) -> Option<FieldType> {
        if let Some(f) = self.mesh_fields.get(name) {
            return (f.kind == kind).then_some(FieldType::MeshField);
        }
        if self.mat_fields.contains_key(name) && kind == EntityKind::Cell {
            return Some(FieldType::MultiMaterialField);
        }
        None
    }

    fn mesh_field(&self, kind: EntityKind, name: &str) -> Result<&[f64], RemapError> {
        let f = self
            .mesh_fields
            .get(name)
            .ok_or_else(|| RemapError::VariableNotFound(name.to_string()))?;
        if f.kind != kind {
            return Err(RemapError::EntityKindMismatch {
                name: name.to_string(),
                requested: kind,
                actual: f.kind,
            });
        }
        Ok(&f.data)
    }

    fn material_ids(&self) -> Vec<usize> {
        self.materials.keys().copied().collect()
    }

    fn material_name(&self, m: usize) -> Option<&str> {
        self.materials.get(&m).map(|mat| mat.name.as_str())
    }

    fn mat_cells(&self, m: usize) -> Result<&[usize], RemapError> {
        self.materials
            .get(&m)
            .map(|mat| mat.cells.as_slice())
            .ok_or(RemapError::MaterialNotFound(m))
    }

    fn cell_index_in_material(&self, c: usize, m: usize) -> Option<usize> {
        self.materials.get(&m)?.index_of.get(&c).copied()
    }

    fn mat_celldata(&self, name: &str, m: usize) -> Result<&[f64], RemapError> {
        let per_mat = self
            .mat_fields
            .get(name)
            .ok_or_else(|| RemapError::VariableNotFound(name.to_string()))?;
        per_mat
            .get(&m)
            .map(|v| v.as_slice())
            .ok_or(RemapError::MaterialNotFound(m))
    }
}

impl StateViewMut for SimpleState {
    fn set_mesh_field(
        &mut self,
        kind: EntityKind,
        name: &str,
        values: Vec<f64>,
    ) -> Result<(), RemapError> {
        self.add_field(name, kind, values);
        Ok(())
    }

    fn mesh_field_mut(
        &mut self,
        kind: EntityKind,
        name: &str,
    ) -> Result<&mut [f64], RemapError> {
        let f = self
            .mesh_fields
            .get_mut(name)
            .ok_or_else(|| RemapError::VariableNotFound(name.to_string()))?;
        if f.kind != kind {
            return Err(RemapError::EntityKindMismatch {
                name: name.to_string(),
                requested: kind,
                actual: f.kind,
            });
        }
        Ok(&mut f.data)
    }

    fn add_material(&mut self, name: &str, cells: Vec<usize>) -> usize {
        let id = self.materials.keys().next_back().map_or(0, |&m| m + 1);
        self.add_material_with_id(id, name, cells);
        id
    }

    fn ensure_material(&mut self, m: usize, name: &str) {
        if !self.materials.contains_key(&m) {
            self.add_material_with_id(m, name, Vec::new());
        }
    }

    fn mat_add_cells(&mut self, m: usize, cells: &[usize]) -> Result<(), RemapError> {
        self.materials
            .get_mut(&m)
            .ok_or(RemapError::MaterialNotFound(m))?
            .push_cells(cells);
        Ok(())
    }

    fn set_mat_celldata(
        &mut self,
        name: &str,
        m: usize,
        values: Vec<f64>,
    ) -> Result<(), RemapError> {
        if !self.materials.contains_key(&m) {
            return Err(RemapError::MaterialNotFound(m));
        }
        self.mat_fields
            .entry(name.to_string())
            .or_default()
            .insert(m, values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_field_roundtrip() {
        let mut s = SimpleState::new();
        s.add_field("density", EntityKind::Cell, vec![1.0, 2.0, 3.0]);
        assert_eq!(s.entity_kind("density"), Some(EntityKind::Cell));
        assert_eq!(
            s.field_type(EntityKind::Cell, "density"),
            Some(FieldType::MeshField)
        );
        assert_eq!(
            s.mesh_field(EntityKind::Cell, "density").unwrap(),
            &[1.0, 2.0, 3.0]
        );
        assert!(matches!(
            s.mesh_field(EntityKind::Node, "density"),
            Err(RemapError::EntityKindMismatch { .. })
        ));
        assert!(matches!(
            s.mesh_field(EntityKind::Cell, "missing"),
            Err(RemapError::VariableNotFound(_))
        ));
    }

    #[test]
    fn material_consistency() {
        let mut s = SimpleState::new();
        s.add_material_with_id(2, "steel", vec![0, 3, 5]);
        s.add_material_with_id(7, "air", vec![1, 3]);
        assert_eq!(s.material_ids(), vec![2, 7]);
        assert_eq!(s.mat_cells(2).unwrap(), &[0, 3, 5]);
        assert_eq!(s.cell_index_in_material(5, 2), Some(2));
        assert_eq!(s.cell_index_in_material(5, 7), None);
        // A cell lists a material iff the material lists the cell.
        assert_eq!(s.cell_materials(3), vec![2, 7]);
        assert_eq!(s.cell_materials(0), vec![2]);
    }

    #[test]
    fn mat_add_cells_ignores_duplicates() {
        let mut s = SimpleState::new();
        s.add_material_with_id(0, "fluid", vec![1, 2]);
        s.mat_add_cells(0, &[2, 4]).unwrap();
        assert_eq!(s.mat_cells(0).unwrap(), &[1, 2, 4]);
    }

    #[test]
    fn mat_field_addressing() {
        let mut s = SimpleState::new();
        s.add_material_with_id(0, "a", vec![0, 1]);
        s.add_mat_field("rho", 0, vec![10.0, 20.0]);
        assert_eq!(
            s.field_type(EntityKind::Cell, "rho"),
            Some(FieldType::MultiMaterialField)
        );
        assert_eq!(s.mat_celldata("rho", 0).unwrap(), &[10.0, 20.0]);
        assert!(s.mat_celldata("rho", 1).is_err());
    }
}
