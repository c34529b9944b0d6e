//! `FlatState`: the redistribution-friendly state container paired with
//! [`FlatMesh`](super::FlatMesh).
//!
//! Field values live in one contiguous `Vec<f64>` per field. Multi-material
//! fields are concatenated material-major: for each material id in
//! ascending order, one value per cell in that material's cell list. The
//! material registry itself is three parallel arrays (ids, shapes,
//! concatenated cell list) plus derived per-material lookup tables, which
//! is exactly the layout the distributor ships.

use crate::remap_error::RemapError;
use crate::state::{StateView, StateViewMut};
use crate::support::{EntityKind, FieldType};
use hashbrown::HashMap;

#[derive(Clone, Debug)]
pub struct FlatField {
    pub name: String,
    pub kind: EntityKind,
    pub ftype: FieldType,
    pub data: Vec<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct FlatState {
    fields: Vec<FlatField>,
    material_ids: Vec<usize>,
    material_names: Vec<String>,
    material_shapes: Vec<usize>,
    material_cells: Vec<usize>,
    // Derived: per material, cell -> position in its cell list.
    index_in_mat: Vec<HashMap<usize, usize>>,
}

impl FlatState {
    /// Flatten the listed variables (or all of them when `vars` is empty)
    /// out of any state manager.
    pub fn from_state<S: StateView>(state: &S, vars: &[String]) -> Result<Self, RemapError> {
        let names: Vec<String> = if vars.is_empty() {
            state.names()
        } else {
            vars.to_vec()
        };

        let mut flat = FlatState {
            material_ids: state.material_ids(),
            ..Default::default()
        };
        for &m in &flat.material_ids {
            flat.material_names
                .push(state.material_name(m).unwrap_or("").to_string());
            let cells = state.mat_cells(m)?;
            flat.material_shapes.push(cells.len());
            flat.material_cells.extend_from_slice(cells);
        }
        flat.rebuild_material_lookup();

        for name in names {
            let kind = state
                .entity_kind(&name)
                .ok_or_else(|| RemapError::VariableNotFound(name.clone()))?;
            let ftype = state
                .field_type(kind, &name)
                .ok_or_else(|| RemapError::VariableNotFound(name.clone()))?;
            let data = match ftype {
                FieldType::MeshField => state.mesh_field(kind, &name)?.to_vec(),
                FieldType::MultiMaterialField => {
                    let mut data = Vec::new();
                    for &m in &flat.material_ids {
                        data.extend_from_slice(state.mat_celldata(&name, m)?);
                    }
                    data
                }
            };
            flat.fields.push(FlatField { name, kind, ftype, data });
        }
        Ok(flat)
    }

    pub fn rebuild_material_lookup(&mut self) {
        self.index_in_mat.clear();
        let mut offset = 0;
        for &shape in &self.material_shapes {
            let mut map = HashMap::with_capacity(shape);
            for (i, &c) in self.material_cells[offset..offset + shape].iter().enumerate() {
                map.entry(c).or_insert(i);
            }
            self.index_in_mat.push(map);
            offset += shape;
        }
    }

    fn mat_pos(&self, m: usize) -> Option<usize> {
        self.material_ids.iter().position(|&id| id == m)
    }

    fn mat_offset(&self, pos: usize) -> usize {
        self.material_shapes[..pos].iter().sum()
    }

    // --- distributor access ---

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FlatField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut FlatField> {
        self.fields.iter_mut().find(|f| f.name == name)
    }

    pub fn get_material_ids(&self) -> &[usize] {
        &self.material_ids
    }

    pub fn get_material_shapes(&self) -> &[usize] {
        &self.material_shapes
    }

    pub fn get_material_cells(&self) -> &[usize] {
        &self.material_cells
    }

    pub fn num_material_cells(&self) -> usize {
        self.material_cells.len()
    }

    /// Replace the material registry wholesale (post-distribution) and
    /// rebuild the lookup tables.
    pub fn set_materials(
        &mut self,
        ids: Vec<usize>,
        names: Vec<String>,
        shapes: Vec<usize>,
        cells: Vec<usize>,
    ) {
        self.material_ids = ids;
        self.material_names = names;
        self.material_shapes = shapes;
        self.material_cells = cells;
        self.rebuild_material_lookup();
    }
}

impl StateView for FlatState {
    fn names(&self) -> Vec<String> {
        self.field_names()
    }

    fn entity_kind(&self, name: &str) -> Option<EntityKind> {
        self.field(name).map(|f| f.kind)
    }

    fn field_type(&self, kind: EntityKind, name: &str) -> Option<FieldType> {
        self.field(name)
            .filter(|f| f.kind == kind)
            .map(|f| f.ftype)
    }

    fn mesh_field(&self, kind: EntityKind, name: &str) -> Result<&[f64], RemapError> {
        let f = self
            .field(name)
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
        self.material_ids.clone()
    }

    fn material_name(&self, m: usize) -> Option<&str> {
        self.mat_pos(m).map(|p| self.material_names[p].as_str())
    }

    fn mat_cells(&self, m: usize) -> Result<&[usize], RemapError> {
        let pos = self.mat_pos(m).ok_or(RemapError::MaterialNotFound(m))?;
        let off = self.mat_offset(pos);
        Ok(&self.material_cells[off..off + self.material_shapes[pos]])
    }

    fn cell_index_in_material(&self, c: usize, m: usize) -> Option<usize> {
        let pos = self.mat_pos(m)?;
        self.index_in_mat[pos].get(&c).copied()
    }

    fn mat_celldata(&self, name: &str, m: usize) -> Result<&[f64], RemapError> {
        let f = self
            .field(name)
            .ok_or_else(|| RemapError::VariableNotFound(name.to_string()))?;
        let pos = self.mat_pos(m).ok_or(RemapError::MaterialNotFound(m))?;
        let off = self.mat_offset(pos);
        Ok(&f.data[off..off + self.material_shapes[pos]])
    }
}

impl StateViewMut for FlatState {
    fn set_mesh_field(
        &mut self,
        kind: EntityKind,
        name: &str,
        values: Vec<f64>,
    ) -> Result<(), RemapError> {
        if let Some(f) = self.field_mut(name) {
            f.kind = kind;
            f.ftype = FieldType::MeshField;
            f.data = values;
        } else {
            self.fields.push(FlatField {
                name: name.to_string(),
                kind,
                ftype: FieldType::MeshField,
                data: values,
            });
        }
        Ok(())
    }

    fn mesh_field_mut(
        &mut self,
        kind: EntityKind,
        name: &str,
    ) -> Result<&mut [f64], RemapError> {
        let f = self
            .fields
            .iter_mut()
            .find(|f| f.name == name)
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
        let id = self.material_ids.iter().max().map_or(0, |&m| m + 1);
        self.material_ids.push(id);
        self.material_names.push(name.to_string());
        self.material_shapes.push(cells.len());
        self.material_cells.extend(cells);
        self.rebuild_material_lookup();
        id
    }

    fn ensure_material(&mut self, m: usize, name: &str) {
        if self.mat_pos(m).is_none() {
            self.material_ids.push(m);
            self.material_names.push(name.to_string());
            self.material_shapes.push(0);
            self.rebuild_material_lookup();
        }
    }

    // Registry mutation shifts the material-major field layout; callers
    // must (re)set multi-material field data after the last mutation.
    fn mat_add_cells(&mut self, m: usize, cells: &[usize]) -> Result<(), RemapError> {
        let pos = self.mat_pos(m).ok_or(RemapError::MaterialNotFound(m))?;
        let off = self.mat_offset(pos);
        let mut insert_at = off + self.material_shapes[pos];
        for &c in cells {
            if self.index_in_mat[pos].contains_key(&c) {
                continue;
            }
            self.material_cells.insert(insert_at, c);
            self.material_shapes[pos] += 1;
            insert_at += 1;
        }
        self.rebuild_material_lookup();
        Ok(())
    }

    fn set_mat_celldata(
        &mut self,
        name: &str,
        m: usize,
        values: Vec<f64>,
    ) -> Result<(), RemapError> {
        let pos = self.mat_pos(m).ok_or(RemapError::MaterialNotFound(m))?;
        let off = self.mat_offset(pos);
        let shape = self.material_shapes[pos];
        if let Some(pos_f) = self.fields.iter().position(|f| f.name == name) {
            let total = self.material_cells.len();
            let f = &mut self.fields[pos_f];
            f.data.resize(total, 0.0);
            f.data[off..off + shape].copy_from_slice(&values);
        } else {
            // New multi-material field: zero-fill the other materials.
            let mut data = vec![0.0; self.material_cells.len()];
            data[off..off + shape].copy_from_slice(&values);
            self.fields.push(FlatField {
                name: name.to_string(),
                kind: EntityKind::Cell,
                ftype: FieldType::MultiMaterialField,
                data,
            });
        }
        Ok(())
    }
}
