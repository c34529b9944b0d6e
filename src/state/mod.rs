//! The state-manager contract consumed by the remap pipeline.
//!
//! A state is a bag of named fields plus a material registry. Mesh fields
//! hold one value per entity of their kind; multi-material fields hold one
//! value per (material, cell) pair, addressed by the cell's position in the
//! material's cell list. Invariantly, a cell lists a material if and only
//! if the material lists the cell.
//!
//! The driver reads the source state through [`StateView`] and writes the
//! target state through [`StateViewMut`]; it is the only writer.

pub mod simple;

use crate::remap_error::RemapError;
use crate::support::{EntityKind, FieldType};

/// Read-only view of a state manager.
pub trait StateView {
    /// Names of all registered fields, in a deterministic order.
    fn names(&self) -> Vec<String>;
    /// The entity kind a field lives on.
    fn entity_kind(&self, name: &str) -> Option<EntityKind>;
    /// Whether a field is a mesh field or a multi-material field.
    fn field_type(&self, kind: EntityKind, name: &str) -> Option<FieldType>;
    /// Values of a mesh field, one per entity of `kind`.
    fn mesh_field(&self, kind: EntityKind, name: &str) -> Result<&[f64], RemapError>;

    /// Ids of all registered materials, ascending.
    fn material_ids(&self) -> Vec<usize>;
    fn num_materials(&self) -> usize {
        self.material_ids().len()
    }
    fn material_name(&self, m: usize) -> Option<&str>;
    /// Cells containing material `m`, in registration order.
    fn mat_cells(&self, m: usize) -> Result<&[usize], RemapError>;
    /// Position of cell `c` within `mat_cells(m)`, if present.
    fn cell_index_in_material(&self, c: usize, m: usize) -> Option<usize>;
    /// Materials present in cell `c`, ascending.
    fn cell_materials(&self, c: usize) -> Vec<usize> {
        self.material_ids()
            .into_iter()
            .filter(|&m| self.cell_index_in_material(c, m).is_some())
            .collect()
    }
    /// Values of a multi-material field for material `m`, aligned with
    /// `mat_cells(m)`.
    fn mat_celldata(&self, name: &str, m: usize) -> Result<&[f64], RemapError>;
}

/// Mutable view of a state manager; the target side of a remap.
pub trait StateViewMut: StateView {
    /// Add a mesh field or replace the values of an existing one.
    fn set_mesh_field(
        &mut self,
        kind: EntityKind,
        name: &str,
        values: Vec<f64>,
    ) -> Result<(), RemapError>;
    fn mesh_field_mut(&mut self, kind: EntityKind, name: &str)
        -> Result<&mut [f64], RemapError>;

    /// Register a material with an initial cell list; returns its id.
    fn add_material(&mut self, name: &str, cells: Vec<usize>) -> usize;
    /// Register a material under a specific id if not already present.
    fn ensure_material(&mut self, m: usize, name: &str);
    /// Append cells to a material (cells already present are ignored).
    fn mat_add_cells(&mut self, m: usize, cells: &[usize]) -> Result<(), RemapError>;
    /// Set the values of a multi-material field for material `m`, aligned
    /// with `mat_cells(m)`.
    fn set_mat_celldata(
        &mut self,
        name: &str,
        m: usize,
        values: Vec<f64>,
    ) -> Result<(), RemapError>;
}

impl<S: StateView + ?Sized> StateView for &S {
    fn names(&self) -> Vec<String> {
        (**self).names()
    }
    fn entity_kind(&self, name: &str) -> Option<EntityKind> {
        (**self).entity_kind(name)
    }
    fn field_type(&self, kind: EntityKind, name: &str) -> Option<FieldType> {
        (**self).field_type(kind, name)
    }
    fn mesh_field(&self, kind: EntityKind, name: &str) -> Result<&[f64], RemapError> {
        (**self).mesh_field(kind, name)
    }
    fn material_ids(&self) -> Vec<usize> {
        (**self).material_ids()
    }
    fn material_name(&self, m: usize) -> Option<&str> {
        (**self).material_name(m)
    }
    fn mat_cells(&self, m: usize) -> Result<&[usize], RemapError> {
        (**self).mat_cells(m)
    }
    fn cell_index_in_material(&self, c: usize, m: usize) -> Option<usize> {
        (**self).cell_index_in_material(c, m)
    }
    fn mat_celldata(&self, name: &str, m: usize) -> Result<&[f64], RemapError> {
        (**self).mat_celldata(name, m)
    }
}

impl<S: StateView + ?Sized> StateView for &mut S {
    fn names(&self) -> Vec<String> {
        (**self).names()
    }
    fn entity_kind(&self, name: &str) -> Option<EntityKind> {
        (**self).entity_kind(name)
    }
    fn field_type(&self, kind: EntityKind, name: &str) -> Option<FieldType> {
        (**self).field_type(kind, name)
    }
    fn mesh_field(&self, kind: EntityKind, name: &str) -> Result<&[f64], RemapError> {
        (**self).mesh_field(kind, name)
    }
    fn material_ids(&self) -> Vec<usize> {
        (**self).material_ids()
    }
    fn material_name(&self, m: usize) -> Option<&str> {
        (**self).material_name(m)
    }
    fn mat_cells(&self, m: usize) -> Result<&[usize], RemapError> {
        (**self).mat_cells(m)
    }
    fn cell_index_in_material(&self, c: usize, m: usize) -> Option<usize> {
        (**self).cell_index_in_material(c, m)
    }
    fn mat_celldata(&self, name: &str, m: usize) -> Result<&[f64], RemapError> {
        (**self).mat_celldata(name, m)
    }
}

impl<S: StateViewMut + ?Sized> StateViewMut for &mut S {
    fn set_mesh_field(
        &mut self,
        kind: EntityKind,
        name: &str,
        values: Vec<f64>,
    ) -> Result<(), RemapError> {
        (**self).set_mesh_field(kind, name, values)
    }
    fn mesh_field_mut(
        &mut self,
        kind: EntityKind,
        name: &str,
    ) -> Result<&mut [f64], RemapError> {
        (**self).mesh_field_mut(kind, name)
    }
    fn add_material(&mut self, name: &str, cells: Vec<usize>) -> usize {
        (**self).add_material(name, cells)
    }
    fn ensure_material(&mut self, m: usize, name: &str) {
        (**self).ensure_material(m, name)
    }
    fn mat_add_cells(&mut self, m: usize, cells: &[usize]) -> Result<(), RemapError> {
        (**self).mat_add_cells(m, cells)
    }
    fn set_mat_celldata(
        &mut self,
        name: &str,
        m: usize,
        values: Vec<f64>,
    ) -> Result<(), RemapError> {
        (**self).set_mat_celldata(name, m, values)
    }
}
