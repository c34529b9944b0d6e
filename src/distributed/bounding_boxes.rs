//! Bounding-box source redistribution.
//!
//! Before the pipeline runs on a distributed source, every target
//! partition must own every source entity whose bounding box touches its
//! own. Each rank gathers all target partition boxes, tests its source box
//! against each (shrunk by `2ε` per face so mere face contact does not
//! count), and ships its whole flat source mesh and state to each
//! overlapping rank: per category a size exchange, then an owned round and
//! a ghost round of point-to-point payloads, with locally retained data
//! copied in place.
//!
//! Adjacency lists travel as global ids (3-D cell→face entries packed as
//! `(gid << 1) | dir`). On receipt every entity category is deduplicated
//! through a first-occurrence `global id → new local index` table, so an
//! entity received from several partitions collapses to one, and adjacency
//! and material references are rewritten through the tables. A declared
//! and received message size disagreeing is a fatal contract violation.

use crate::distributed::communicator::{CommTag, Communicator, Wait};
use crate::flat::{FlatMesh, FlatState};
use crate::geometry::BoundingBox;
use crate::mesh::MeshView;
use crate::remap_error::RemapError;
use crate::state::StateView;
use crate::support::{EntityKind, FieldType};
use hashbrown::HashMap;

/// Comms layout for one entity category, mirrored on every rank.
#[derive(Clone, Debug, Default)]
struct CommInfo {
    source_num: usize,
    source_num_owned: usize,
    send_counts: Vec<usize>,
    send_owned: Vec<usize>,
    recv_counts: Vec<usize>,
    recv_owned: Vec<usize>,
    new_num: usize,
    new_num_owned: usize,
}

/// First tag of a distribute() round; well clear of the mailbox barrier
/// tag and small ad-hoc test tags.
const BASE_TAG: CommTag = CommTag::new(0x100);

pub struct BoundingBoxDistributor<'a, C: Communicator> {
    comm: &'a C,
}

impl<'a, C: Communicator> BoundingBoxDistributor<'a, C> {
    pub fn new(comm: &'a C) -> Self {
        Self { comm }
    }

    /// Redistribute the flat source mesh and state so that this rank holds
    /// every source entity whose partition box overlaps this rank's target
    /// box. A single-rank communicator is a no-op.
    pub fn distribute<const D: usize, TM: MeshView<D>>(
        &self,
        source_mesh: &mut FlatMesh<D>,
        source_state: &mut FlatState,
        target_mesh: &TM,
    ) -> Result<(), RemapError> {
        let size = self.comm.size();
        if size <= 1 {
            return Ok(());
        }
        let me = self.comm.rank();
        // Every category and round of one distribute() gets its own tag.
        let mut tag = BASE_TAG;
        let mut next_tag = |n: u16| {
            let t = tag.as_u16();
            tag = tag.offset(n);
            t
        };

        // Target partition boxes, gathered everywhere.
        let mut tbox = BoundingBox::<D>::empty();
        for c in 0..target_mesh.num_owned_cells() {
            for n in target_mesh.cell_nodes(c) {
                tbox.add_point(target_mesh.node_coordinate(n));
            }
        }
        let tboxes = self.allgather_box(next_tag(1), &tbox)?;

        let mut sbox = BoundingBox::<D>::empty();
        for c in 0..source_mesh.num_owned_cells() {
            sbox.merge(&source_mesh.cell_bounding_box(c));
        }

        // Face-contact alone must not trigger a send.
        let shrink = 2.0 * f64::EPSILON;
        let send_flags: Vec<bool> = tboxes
            .iter()
            .map(|tb| sbox.overlaps_shrunk(tb, shrink))
            .collect();
        log::debug!(
            "rank {me}: sending source partition to {} of {size} ranks",
            send_flags.iter().filter(|&&f| f).count()
        );

        // --- size exchange per category ---
        let ncells = source_mesh.num_cells();
        let ncells_owned = source_mesh.num_owned_cells();
        let nnodes = source_mesh.num_nodes();
        let nnodes_owned = source_mesh.num_owned_nodes();

        let cell_info = self.set_info(next_tag(1), &send_flags, ncells, ncells_owned)?;
        let node_info = self.set_info(next_tag(1), &send_flags, nnodes, nnodes_owned)?;

        let cell_node_counts = source_mesh.get_cell_node_counts().to_vec();
        let c2n_owned: usize = cell_node_counts[..ncells_owned].iter().sum();
        let c2n_info = self.set_info(
            next_tag(1),
            &send_flags,
            source_mesh.get_cell_to_node().len(),
            c2n_owned,
        )?;

        let (face_info, c2f_info, f2n_info) = if D == 3 {
            let nfaces = source_mesh.get_face_node_counts().len();
            let nfaces_owned = source_mesh.num_owned_faces();
            let face_info = self.set_info(next_tag(1), &send_flags, nfaces, nfaces_owned)?;
            let cell_face_counts = source_mesh.get_cell_face_counts();
            let c2f_owned: usize = cell_face_counts[..ncells_owned].iter().sum();
            let c2f_info = self.set_info(
                next_tag(1),
                &send_flags,
                source_mesh.get_cell_to_face().0.len(),
                c2f_owned,
            )?;
            let face_node_counts = source_mesh.get_face_node_counts();
            let f2n_owned: usize = face_node_counts[..nfaces_owned].iter().sum();
            let f2n_info = self.set_info(
                next_tag(1),
                &send_flags,
                source_mesh.get_face_to_node().len(),
                f2n_owned,
            )?;
            (face_info, c2f_info, f2n_info)
        } else {
            (CommInfo::default(), CommInfo::default(), CommInfo::default())
        };

        let nmats = source_state.get_material_ids().len();
        let mats_info = self.set_info(next_tag(1), &send_flags, nmats, nmats)?;
        let nmatcells = source_state.num_material_cells();
        let matcells_info = self.set_info(next_tag(1), &send_flags, nmatcells, nmatcells)?;

        // --- payload exchange ---
        let new_coords = self.move_field(
            &node_info,
            next_tag(2),
            D,
            source_mesh.get_coords(),
        )?;
        let new_node_gids =
            self.move_field(&node_info, next_tag(2), 1, source_mesh.get_node_global_ids())?;
        let new_cell_gids =
            self.move_field(&cell_info, next_tag(2), 1, source_mesh.get_cell_global_ids())?;

        let counts_u64: Vec<u64> = cell_node_counts.iter().map(|&c| c as u64).collect();
        let new_cell_node_counts = self.move_field(&cell_info, next_tag(2), 1, &counts_u64)?;

        // Node references travel as global ids.
        let node_gids = source_mesh.get_node_global_ids();
        let c2n_gids: Vec<u64> = source_mesh
            .get_cell_to_node()
            .iter()
            .map(|&n| node_gids[n])
            .collect();
        let new_c2n_gids = self.move_field(&c2n_info, next_tag(2), 1, &c2n_gids)?;

        let (new_face_gids, new_cell_face_counts, new_c2f_packed, new_face_node_counts, new_f2n_gids) =
            if D == 3 {
                let face_gids = source_mesh.get_face_global_ids();
                let new_face_gids =
                    self.move_field(&face_info, next_tag(2), 1, face_gids)?;

                let cfc_u64: Vec<u64> = source_mesh
                    .get_cell_face_counts()
                    .iter()
                    .map(|&c| c as u64)
                    .collect();
                let new_cell_face_counts =
                    self.move_field(&cell_info, next_tag(2), 1, &cfc_u64)?;

                // Face id and direction bit packed into one integer.
                let (c2f, dirs) = source_mesh.get_cell_to_face();
                let packed: Vec<u64> = c2f
                    .iter()
                    .zip(dirs)
                    .map(|(&f, &d)| (face_gids[f] << 1) | u64::from(d))
                    .collect();
                let new_c2f_packed = self.move_field(&c2f_info, next_tag(2), 1, &packed)?;

                let fnc_u64: Vec<u64> = source_mesh
                    .get_face_node_counts()
                    .iter()
                    .map(|&c| c as u64)
                    .collect();
                let new_face_node_counts =
                    self.move_field(&face_info, next_tag(2), 1, &fnc_u64)?;

                let f2n_gids: Vec<u64> = source_mesh
                    .get_face_to_node()
                    .iter()
                    .map(|&n| node_gids[n])
                    .collect();
                let new_f2n_gids = self.move_field(&f2n_info, next_tag(2), 1, &f2n_gids)?;

                (new_face_gids, new_cell_face_counts, new_c2f_packed, new_face_node_counts, new_f2n_gids)
            } else {
                (Vec::new(), Vec::new(), Vec::new(), Vec::new(), Vec::new())
            };

        // Material registry: ids, shapes, and the cell list as global ids.
        let cell_gids = source_mesh.get_cell_global_ids();
        let mat_ids_u64: Vec<u64> = source_state
            .get_material_ids()
            .iter()
            .map(|&m| m as u64)
            .collect();
        let new_mat_ids = self.move_field(&mats_info, next_tag(2), 1, &mat_ids_u64)?;
        let shapes_u64: Vec<u64> = source_state
            .get_material_shapes()
            .iter()
            .map(|&s| s as u64)
            .collect();
        let new_mat_shapes = self.move_field(&mats_info, next_tag(2), 1, &shapes_u64)?;
        let matcell_gids: Vec<u64> = source_state
            .get_material_cells()
            .iter()
            .map(|&c| cell_gids[c])
            .collect();
        let new_matcell_gids = self.move_field(&matcells_info, next_tag(2), 1, &matcell_gids)?;

        // Field data, chosen per category.
        let mut new_fields: Vec<(String, Vec<f64>)> = Vec::new();
        for name in source_state.field_names() {
            let field = source_state
                .field(&name)
                .ok_or_else(|| RemapError::VariableNotFound(name.clone()))?;
            let info = match (field.kind, field.ftype) {
                (EntityKind::Node, _) => &node_info,
                (_, FieldType::MeshField) => &cell_info,
                (_, FieldType::MultiMaterialField) => &matcells_info,
            };
            let moved = self.move_field(info, next_tag(2), 1, &field.data)?;
            new_fields.push((name, moved));
        }

        // --- de-duplication through global-id tables ---
        let (keep_cell, cell_local, new_owned_cells) =
            unique_table(&new_cell_gids, cell_info.new_num_owned);
        let (keep_node, node_local, new_owned_nodes) =
            unique_table(&new_node_gids, node_info.new_num_owned);

        source_mesh.set_coords(filter_stride(&new_coords, &keep_node, D));
        source_mesh.set_node_global_ids(filter_stride(&new_node_gids, &keep_node, 1));
        source_mesh.set_cell_global_ids(filter_stride(&new_cell_gids, &keep_cell, 1));

        let kept_cell_node_counts: Vec<usize> = new_cell_node_counts
            .iter()
            .zip(&keep_cell)
            .filter(|(_, &k)| k)
            .map(|(&c, _)| c as usize)
            .collect();
        let kept_c2n = remap_csr(
            &new_cell_node_counts,
            &new_c2n_gids,
            &keep_cell,
            &node_local,
        )?;
        source_mesh.set_cell_node_counts(kept_cell_node_counts);
        source_mesh.set_cell_to_node(kept_c2n);

        if D == 3 {
            let (keep_face, face_local, new_owned_faces) =
                unique_table(&new_face_gids, face_info.new_num_owned);
            source_mesh.set_face_global_ids(filter_stride(&new_face_gids, &keep_face, 1));

            let kept_face_node_counts: Vec<usize> = new_face_node_counts
                .iter()
                .zip(&keep_face)
                .filter(|(_, &k)| k)
                .map(|(&c, _)| c as usize)
                .collect();
            let kept_f2n = remap_csr(
                &new_face_node_counts,
                &new_f2n_gids,
                &keep_face,
                &node_local,
            )?;
            source_mesh.set_face_node_counts(kept_face_node_counts);
            source_mesh.set_face_to_node(kept_f2n);

            let kept_cell_face_counts: Vec<usize> = new_cell_face_counts
                .iter()
                .zip(&keep_cell)
                .filter(|(_, &k)| k)
                .map(|(&c, _)| c as usize)
                .collect();
            // Unpack the direction bit, then rewrite face gids.
            let mut kept_c2f = Vec::new();
            let mut kept_dirs = Vec::new();
            let mut pos = 0usize;
            for (i, &count) in new_cell_face_counts.iter().enumerate() {
                let count = count as usize;
                if keep_cell[i] {
                    for &packed in &new_c2f_packed[pos..pos + count] {
                        let gid = packed >> 1;
                        let dir = packed & 1 == 1;
                        let f = *face_local
                            .get(&gid)
                            .ok_or(RemapError::UnknownGlobalId(gid))?;
                        kept_c2f.push(f);
                        kept_dirs.push(dir);
                    }
                }
                pos += count;
            }
            source_mesh.set_cell_face_counts(kept_cell_face_counts);
            source_mesh.set_cell_to_face(kept_c2f, kept_dirs);
            source_mesh.set_num_owned_faces(new_owned_faces);
        }

        source_mesh.set_num_owned_cells(new_owned_cells);
        source_mesh.set_num_owned_nodes(new_owned_nodes);
        source_mesh.finish_init()?;

        // --- material reconciliation ---
        // Walk the concatenated (material, cell-gid) stream in arrival
        // order, mapping each cell gid through the unique-representative
        // table and dropping (material, cell) pairs already seen. The kept
        // stream positions drive the same filtering of every
        // multi-material field below.
        let mut per_mat: HashMap<u64, (Vec<usize>, Vec<usize>)> = HashMap::new();
        {
            let mut pos = 0usize;
            for (&mat, &shape) in new_mat_ids.iter().zip(&new_mat_shapes) {
                let (cells, stream) = per_mat.entry(mat).or_default();
                for i in pos..pos + shape as usize {
                    let gid = new_matcell_gids[i];
                    let local = *cell_local
                        .get(&gid)
                        .ok_or(RemapError::UnknownGlobalId(gid))?;
                    if !cells.contains(&local) {
                        cells.push(local);
                        stream.push(i);
                    }
                }
                pos += shape as usize;
            }
        }
        let mut sorted_mat_ids: Vec<u64> = per_mat.keys().copied().collect();
        sorted_mat_ids.sort_unstable();

        let mut reg_ids = Vec::with_capacity(sorted_mat_ids.len());
        let mut reg_names = Vec::with_capacity(sorted_mat_ids.len());
        let mut reg_shapes = Vec::with_capacity(sorted_mat_ids.len());
        let mut reg_cells = Vec::new();
        let mut kept_stream: Vec<usize> = Vec::new();
        for &m in &sorted_mat_ids {
            let (cells, stream) = &per_mat[&m];
            reg_ids.push(m as usize);
            reg_names.push(
                source_state
                    .material_name(m as usize)
                    .unwrap_or("")
                    .to_string(),
            );
            reg_shapes.push(cells.len());
            reg_cells.extend_from_slice(cells);
            kept_stream.extend_from_slice(stream);
        }

        // --- install the field data ---
        for (name, moved) in new_fields {
            let field = source_state
                .field_mut(&name)
                .ok_or_else(|| RemapError::VariableNotFound(name.clone()))?;
            field.data = match (field.kind, field.ftype) {
                (EntityKind::Node, _) => filter_stride(&moved, &keep_node, 1),
                (_, FieldType::MeshField) => filter_stride(&moved, &keep_cell, 1),
                (_, FieldType::MultiMaterialField) => {
                    kept_stream.iter().map(|&i| moved[i]).collect()
                }
            };
        }
        source_state.set_materials(reg_ids, reg_names, reg_shapes, reg_cells);

        Ok(())
    }

    /// Every rank's box, in rank order.
    fn allgather_box<const D: usize>(
        &self,
        tag: u16,
        own: &BoundingBox<D>,
    ) -> Result<Vec<BoundingBox<D>>, RemapError> {
        let size = self.comm.size();
        let me = self.comm.rank();
        let mut flat = [0.0f64; 6];
        for k in 0..D {
            flat[k] = own.min[k];
            flat[D + k] = own.max[k];
        }
        let payload = &flat[..2 * D];

        let mut recvs = Vec::new();
        for peer in 0..size {
            if peer == me {
                continue;
            }
            let mut buf = vec![0u8; 2 * D * std::mem::size_of::<f64>()];
            let h = self.comm.irecv(peer, tag, &mut buf);
            recvs.push((peer, h, buf.len()));
        }
        let mut sends = Vec::new();
        for peer in 0..size {
            if peer != me {
                sends.push(self.comm.isend(peer, tag, bytemuck::cast_slice(payload)));
            }
        }

        let mut boxes = vec![BoundingBox::<D>::empty(); size];
        boxes[me] = *own;
        for (peer, h, expect) in recvs {
            let raw = wait_exact(h, peer, expect)?;
            let vals: &[f64] = bytemuck::cast_slice(&raw);
            let mut b = BoundingBox::<D>::empty();
            for k in 0..D {
                b.min[k] = vals[k];
                b.max[k] = vals[D + k];
            }
            boxes[peer] = b;
        }
        for s in sends {
            let _ = s.wait();
        }
        Ok(boxes)
    }

    /// All-to-all of this category's (all, owned) counts.
    fn set_info(
        &self,
        tag: u16,
        send_flags: &[bool],
        num: usize,
        num_owned: usize,
    ) -> Result<CommInfo, RemapError> {
        let size = self.comm.size();
        let me = self.comm.rank();
        let send_counts: Vec<usize> = send_flags.iter().map(|&f| if f { num } else { 0 }).collect();
        let send_owned: Vec<usize> = send_flags
            .iter()
            .map(|&f| if f { num_owned } else { 0 })
            .collect();

        let mut recvs = Vec::new();
        for peer in 0..size {
            if peer == me {
                continue;
            }
            let mut buf = vec![0u8; 16];
            let h = self.comm.irecv(peer, tag, &mut buf);
            recvs.push((peer, h));
        }
        let mut sends = Vec::new();
        for peer in 0..size {
            if peer == me {
                continue;
            }
            let pair = [send_counts[peer] as u64, send_owned[peer] as u64];
            sends.push(self.comm.isend(peer, tag, bytemuck::cast_slice(&pair)));
        }

        let mut recv_counts = vec![0usize; size];
        let mut recv_owned = vec![0usize; size];
        recv_counts[me] = send_counts[me];
        recv_owned[me] = send_owned[me];
        for (peer, h) in recvs {
            let raw = wait_exact(h, peer, 16)?;
            let pair: &[u64] = bytemuck::cast_slice(&raw);
            recv_counts[peer] = pair[0] as usize;
            recv_owned[peer] = pair[1] as usize;
        }
        for s in sends {
            let _ = s.wait();
        }

        Ok(CommInfo {
            source_num: num,
            source_num_owned: num_owned,
            new_num: recv_counts.iter().sum(),
            new_num_owned: recv_owned.iter().sum(),
            send_counts,
            send_owned,
            recv_counts,
            recv_owned,
        })
    }

    /// Ship one data category: an owned round, then a ghost round whose
    /// data lands after all owned data.
    fn move_field<T: bytemuck::Pod>(
        &self,
        info: &CommInfo,
        tag: u16,
        stride: usize,
        source: &[T],
    ) -> Result<Vec<T>, RemapError> {
        let mut dest = vec![T::zeroed(); stride * info.new_num];
        let size = self.comm.size();
        let ghost_send: Vec<usize> = (0..size)
            .map(|r| info.send_counts[r] - info.send_owned[r])
            .collect();
        let ghost_recv: Vec<usize> = (0..size)
            .map(|r| info.recv_counts[r] - info.recv_owned[r])
            .collect();

        self.move_data(
            tag,
            stride,
            0,
            info.source_num_owned,
            0,
            &info.send_owned,
            &info.recv_owned,
            source,
            &mut dest,
        )?;
        self.move_data(
            tag.wrapping_add(1),
            stride,
            info.source_num_owned,
            info.source_num,
            info.new_num_owned,
            &ghost_send,
            &ghost_recv,
            source,
            &mut dest,
        )?;
        Ok(dest)
    }

    /// One round of non-blocking receives, an in-place local copy, sends,
    /// then completion of all receives.
    #[allow(clippy::too_many_arguments)]
    fn move_data<T: bytemuck::Pod>(
        &self,
        tag: u16,
        stride: usize,
        src_start: usize,
        src_end: usize,
        new_start: usize,
        send_counts: &[usize],
        recv_counts: &[usize],
        source: &[T],
        dest: &mut [T],
    ) -> Result<(), RemapError> {
        let size = self.comm.size();
        let me = self.comm.rank();
        let item = std::mem::size_of::<T>();

        let mut recvs = Vec::new();
        let mut write_offset = new_start;
        let mut my_offset = new_start;
        for peer in 0..size {
            if peer != me && recv_counts[peer] > 0 {
                let nbytes = stride * recv_counts[peer] * item;
                let mut buf = vec![0u8; nbytes];
                let h = self.comm.irecv(peer, tag, &mut buf);
                recvs.push((peer, h, nbytes, write_offset));
            } else if peer == me {
                my_offset = write_offset;
            }
            write_offset += recv_counts[peer];
        }

        if recv_counts[me] > 0 {
            let n = src_end - src_start;
            dest[stride * my_offset..stride * (my_offset + n)]
                .copy_from_slice(&source[stride * src_start..stride * src_end]);
        }

        let mut sends = Vec::new();
        for peer in 0..size {
            if peer != me && send_counts[peer] > 0 {
                let bytes =
                    bytemuck::cast_slice(&source[stride * src_start..stride * src_end]);
                sends.push(self.comm.isend(peer, tag, bytes));
            }
        }

        for (peer, h, expect, offset) in recvs {
            let raw = wait_exact(h, peer, expect)?;
            let vals: &[T] = bytemuck::cast_slice(&raw);
            dest[stride * offset..stride * offset + vals.len()].copy_from_slice(vals);
        }
        for s in sends {
            let _ = s.wait();
        }
        Ok(())
    }
}

fn wait_exact<H: Wait>(h: H, peer: usize, expect: usize) -> Result<Vec<u8>, RemapError> {
    let raw = h.wait().ok_or_else(|| RemapError::CommError {
        neighbor: peer,
        detail: "receive completed without data".to_string(),
    })?;
    if raw.len() != expect {
        return Err(RemapError::BufferSizeMismatch {
            neighbor: peer,
            expected: expect,
            got: raw.len(),
        });
    }
    Ok(raw)
}

/// First-occurrence unique table over a gid stream: per-entry keep flags,
/// the `gid -> new local index` map, and the number of uniques inside the
/// owned region `[0, owned_region)`.
fn unique_table(gids: &[u64], owned_region: usize) -> (Vec<bool>, HashMap<u64, usize>, usize) {
    let mut keep = vec![false; gids.len()];
    let mut local = HashMap::with_capacity(gids.len());
    let mut uniques = 0usize;
    for (i, &g) in gids.iter().enumerate() {
        if !local.contains_key(&g) {
            local.insert(g, uniques);
            keep[i] = true;
            uniques += 1;
        }
    }
    // Uniques are numbered in stream order, matching the filtered arrays;
    // the ones inside the owned region stay owned.
    let owned = keep[..owned_region.min(keep.len())]
        .iter()
        .filter(|&&k| k)
        .count();
    (keep, local, owned)
}

fn filter_stride<T: Copy>(data: &[T], keep: &[bool], stride: usize) -> Vec<T> {
    let mut out = Vec::with_capacity(data.len());
    for (i, &k) in keep.iter().enumerate() {
        if k {
            out.extend_from_slice(&data[stride * i..stride * (i + 1)]);
        }
    }
    out
}

/// Keep the CSR segments of surviving entities and map their gid entries
/// through a local-index table.
fn remap_csr(
    counts: &[u64],
    gids: &[u64],
    keep: &[bool],
    local: &HashMap<u64, usize>,
) -> Result<Vec<usize>, RemapError> {
    let mut out = Vec::with_capacity(gids.len());
    let mut pos = 0usize;
    for (i, &count) in counts.iter().enumerate() {
        let count = count as usize;
        if keep[i] {
            for &g in &gids[pos..pos + count] {
                out.push(*local.get(&g).ok_or(RemapError::UnknownGlobalId(g))?);
            }
        }
        pos += count;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::communicator::NoComm;
    use crate::mesh::simple::SimpleMesh;
    use crate::state::simple::SimpleState;
    use crate::state::StateView;
    use crate::support::EntityKind;

    #[test]
    fn serial_distribute_is_a_noop() {
        let mesh = SimpleMesh::<2>::new([0.0, 0.0], [1.0, 1.0], [2, 2]);
        let mut flat = FlatMesh::from_mesh(&mesh).unwrap();
        let mut state = SimpleState::new();
        state.add_field("density", EntityKind::Cell, vec![1.0; 4]);
        let mut flat_state = FlatState::from_state(&state, &[]).unwrap();

        let comm = NoComm;
        let dist = BoundingBoxDistributor::new(&comm);
        dist.distribute(&mut flat, &mut flat_state, &mesh).unwrap();
        assert_eq!(flat.num_owned_cells(), 4);
        assert_eq!(
            flat_state.mesh_field(EntityKind::Cell, "density").unwrap(),
            &[1.0; 4]
        );
    }

    #[test]
    fn unique_table_collapses_duplicates() {
        let gids = [10u64, 11, 12, 11, 13, 10];
        let (keep, local, owned) = unique_table(&gids, 4);
        assert_eq!(keep, vec![true, true, true, false, true, false]);
        assert_eq!(owned, 3);
        assert_eq!(local[&10], 0);
        assert_eq!(local[&11], 1);
        assert_eq!(local[&12], 2);
        assert_eq!(local[&13], 3);
    }

    #[test]
    fn remap_csr_drops_segments_of_dropped_entities() {
        let counts = [2u64, 2, 2];
        let gids = [5u64, 6, 6, 7, 5, 6];
        let keep = [true, true, false];
        let mut local = HashMap::new();
        local.insert(5u64, 0usize);
        local.insert(6u64, 1usize);
        local.insert(7u64, 2usize);
        let out = remap_csr(&counts, &gids, &keep, &local).unwrap();
        assert_eq!(out, vec![0, 1, 1, 2]);
    }
}
