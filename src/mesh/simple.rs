//! A uniform axis-aligned grid satisfying [`MeshView`]: the reference mesh
//! wrapper used by the test-suite and examples.
//!
//! A `SimpleMesh` can describe either a whole grid or one contiguous slab
//! of a larger global grid (see [`SimpleMesh::slab`] and
//! [`SimpleMesh::slab_with_ghosts`]); local entities carry the global
//! grid's ids, so slabs on different ranks agree on shared node and face
//! identities. A ghosted slab lists its owned cells first and the ghost
//! columns after them; nodes and faces of the extended box are all local.
//!
//! Faces are numbered by normal axis: all faces with normal `+x` first,
//! then `+y`, then (in 3-D) `+z`. A face's natural orientation is the
//! positive axis direction, so a cell's lower face on each axis carries
//! `dir = false` and its upper face `dir = true`.

use super::MeshView;
use crate::geometry::Point;

#[derive(Clone, Debug)]
pub struct SimpleMesh<const D: usize> {
    origin: [f64; D],
    spacing: [f64; D],
    global_ncells: [usize; D],
    cell_lo: [usize; D],
    cell_hi: [usize; D],
    owned_lo: [usize; D],
    owned_hi: [usize; D],
}

impl<const D: usize> SimpleMesh<D> {
    /// A serial grid covering `[lo, hi]` with `ncells` cells per axis.
    pub fn new(lo: [f64; D], hi: [f64; D], ncells: [usize; D]) -> Self {
        let mut spacing = [0.0; D];
        for k in 0..D {
            assert!(ncells[k] > 0, "grid needs at least one cell per axis");
            spacing[k] = (hi[k] - lo[k]) / ncells[k] as f64;
        }
        Self {
            origin: lo,
            spacing,
            global_ncells: ncells,
            cell_lo: [0; D],
            cell_hi: ncells,
            owned_lo: [0; D],
            owned_hi: ncells,
        }
    }

    /// The slab of the global grid owned by `rank` out of `nranks`,
    /// partitioned into contiguous chunks along the x axis.
    pub fn slab(
        lo: [f64; D],
        hi: [f64; D],
        ncells: [usize; D],
        nranks: usize,
        rank: usize,
    ) -> Self {
        let mut mesh = Self::new(lo, hi, ncells);
        let n = ncells[0];
        let base = n / nranks;
        let rem = n % nranks;
        let start = rank * base + rank.min(rem);
        let len = base + usize::from(rank < rem);
        mesh.cell_lo[0] = start;
        mesh.cell_hi[0] = start + len;
        mesh.owned_lo = mesh.cell_lo;
        mesh.owned_hi = mesh.cell_hi;
        mesh
    }

    /// Like [`SimpleMesh::slab`], but with one ghost cell layer on each
    /// interior side of the slab. Owned cells come first in local index
    /// order, ghost columns follow; nodes and faces of the extended box
    /// all stay locally indexed. Complete ghost layers give partition
    /// boundary cells the same gradient stencils a serial run sees.
    pub fn slab_with_ghosts(
        lo: [f64; D],
        hi: [f64; D],
        ncells: [usize; D],
        nranks: usize,
        rank: usize,
    ) -> Self {
        let mut mesh = Self::slab(lo, hi, ncells, nranks, rank);
        if mesh.cell_lo[0] > 0 {
            mesh.cell_lo[0] -= 1;
        }
        if mesh.cell_hi[0] < ncells[0] {
            mesh.cell_hi[0] += 1;
        }
        mesh
    }

    #[inline]
    fn ncells_local(&self) -> [usize; D] {
        let mut n = [0; D];
        for k in 0..D {
            n[k] = self.cell_hi[k] - self.cell_lo[k];
        }
        n
    }

    #[inline]
    fn owned_dims(&self) -> [usize; D] {
        let mut n = [0; D];
        for k in 0..D {
            n[k] = self.owned_hi[k] - self.owned_lo[k];
        }
        n
    }

    #[inline]
    fn owned_off(&self) -> [usize; D] {
        let mut n = [0; D];
        for k in 0..D {
            n[k] = self.owned_lo[k] - self.cell_lo[k];
        }
        n
    }

    fn n_owned_cells(&self) -> usize {
        self.owned_dims().iter().product()
    }

    /// Cells per ghost column: the extended box's cross-section off axis 0.
    fn ghost_cross(&self) -> usize {
        let ext = self.ncells_local();
        let mut cross = 1;
        for k in 1..D {
            cross *= ext[k];
        }
        cross
    }

    #[inline]
    fn nnodes_local(&self) -> [usize; D] {
        let mut n = self.ncells_local();
        for v in &mut n {
            *v += 1;
        }
        n
    }

    fn linear(dims: &[usize; D], m: &[usize; D]) -> usize {
        let mut idx = 0;
        let mut stride = 1;
        for k in 0..D {
            idx += m[k] * stride;
            stride *= dims[k];
        }
        idx
    }

    fn unlinear(dims: &[usize; D], mut idx: usize) -> [usize; D] {
        let mut m = [0; D];
        for k in 0..D {
            m[k] = idx % dims[k];
            idx /= dims[k];
        }
        m
    }

    /// Local index of the cell at extended-box multi-index `m`: owned
    /// cells first in x-fastest order, then the left and right ghost
    /// columns.
    pub fn cell_index(&self, m: [usize; D]) -> usize {
        let od = self.owned_dims();
        let off = self.owned_off();
        let in_owned = (0..D).all(|k| m[k] >= off[k] && m[k] < off[k] + od[k]);
        if in_owned {
            let mut mm = m;
            for k in 0..D {
                mm[k] -= off[k];
            }
            return Self::linear(&od, &mm);
        }
        let ext = self.ncells_local();
        let cross = self.ghost_cross();
        let mut j = 0;
        let mut stride = 1;
        for k in 1..D {
            j += m[k] * stride;
            stride *= ext[k];
        }
        if m[0] < off[0] {
            self.n_owned_cells() + m[0] * cross + j
        } else {
            let col = m[0] - (off[0] + od[0]);
            self.n_owned_cells() + (off[0] + col) * cross + j
        }
    }

    /// Local index of the node at local multi-index `m`.
    pub fn node_index(&self, m: [usize; D]) -> usize {
        Self::linear(&self.nnodes_local(), &m)
    }

    fn cell_multi(&self, c: usize) -> [usize; D] {
        let od = self.owned_dims();
        let n_owned = self.n_owned_cells();
        if c < n_owned {
            let mut m = Self::unlinear(&od, c);
            let off = self.owned_off();
            for k in 0..D {
                m[k] += off[k];
            }
            return m;
        }
        let ext = self.ncells_local();
        let cross = self.ghost_cross();
        let off0 = self.owned_off()[0];
        let mut g = c - n_owned;
        let col = if g < off0 * cross {
            g / cross
        } else {
            g -= off0 * cross;
            off0 + od[0] + g / cross
        };
        let mut m = [0usize; D];
        m[0] = col;
        let mut idx = g % cross;
        for k in 1..D {
            m[k] = idx % ext[k];
            idx /= ext[k];
        }
        m
    }

    fn node_multi(&self, n: usize) -> [usize; D] {
        Self::unlinear(&self.nnodes_local(), n)
    }

    /// Per-axis face grid dimensions for faces with normal `axis`.
    fn face_dims(&self, axis: usize) -> [usize; D] {
        let mut dims = self.ncells_local();
        dims[axis] += 1;
        dims
    }

    fn num_faces_axis(&self, axis: usize) -> usize {
        self.face_dims(axis).iter().product()
    }

    /// Split a linear face index into (normal axis, multi-index).
    fn face_split(&self, mut f: usize) -> (usize, [usize; D]) {
        for axis in 0..D {
            let n = self.num_faces_axis(axis);
            if f < n {
                return (axis, Self::unlinear(&self.face_dims(axis), f));
            }
            f -= n;
        }
        panic!("face index {f} out of range");
    }

    fn face_join(&self, axis: usize, m: &[usize; D]) -> usize {
        let mut idx = Self::linear(&self.face_dims(axis), m);
        for a in 0..axis {
            idx += self.num_faces_axis(a);
        }
        idx
    }

    fn global_face_dims(&self, axis: usize) -> [usize; D] {
        let mut dims = self.global_ncells;
        dims[axis] += 1;
        dims
    }
}

macro_rules! impl_counts_and_ids {
    ($d:literal) => {
        fn num_owned_cells(&self) -> usize {
            self.n_owned_cells()
        }

        fn num_ghost_cells(&self) -> usize {
            self.ncells_local().iter().product::<usize>() - self.n_owned_cells()
        }

        fn num_owned_nodes(&self) -> usize {
            self.nnodes_local().iter().product()
        }

        fn num_ghost_nodes(&self) -> usize {
            0
        }

        fn num_owned_faces(&self) -> usize {
            (0..$d).map(|a| self.num_faces_axis(a)).sum()
        }

        fn num_ghost_faces(&self) -> usize {
            0
        }

        fn node_coordinate(&self, n: usize) -> Point<$d> {
            let m = self.node_multi(n);
            let mut x = [0.0; $d];
            for k in 0..$d {
                x[k] = self.origin[k] + (self.cell_lo[k] + m[k]) as f64 * self.spacing[k];
            }
            Point(x)
        }

        fn node_cells(&self, n: usize) -> Vec<usize> {
            let m = self.node_multi(n);
            let ncl = self.ncells_local();
            let mut out = Vec::new();
            // Up to 2^D incident cells, offset 0 or -1 per axis.
            for mask in 0..(1usize << $d) {
                let mut cm = [0usize; $d];
                let mut ok = true;
                for k in 0..$d {
                    if mask & (1 << k) != 0 {
                        if m[k] == 0 {
                            ok = false;
                            break;
                        }
                        cm[k] = m[k] - 1;
                    } else {
                        if m[k] >= ncl[k] {
                            ok = false;
                            break;
                        }
                        cm[k] = m[k];
                    }
                }
                if ok {
                    out.push(self.cell_index(cm));
                }
            }
            out.sort_unstable();
            out.dedup();
            out
        }

        fn cell_centroid(&self, c: usize) -> Point<$d> {
            let m = self.cell_multi(c);
            let mut x = [0.0; $d];
            for k in 0..$d {
                x[k] = self.origin[k]
                    + ((self.cell_lo[k] + m[k]) as f64 + 0.5) * self.spacing[k];
            }
            Point(x)
        }

        fn cell_volume(&self, _c: usize) -> f64 {
            self.spacing.iter().product()
        }

        fn cell_faces_and_dirs(&self, c: usize) -> (Vec<usize>, Vec<bool>) {
            let m = self.cell_multi(c);
            let mut faces = Vec::with_capacity(2 * $d);
            let mut dirs = Vec::with_capacity(2 * $d);
            for axis in 0..$d {
                let mut lo = m;
                faces.push(self.face_join(axis, &lo));
                dirs.push(false);
                lo[axis] += 1;
                faces.push(self.face_join(axis, &lo));
                dirs.push(true);
            }
            (faces, dirs)
        }

        fn face_cells(&self, f: usize) -> Vec<usize> {
            let (axis, m) = self.face_split(f);
            let ncl = self.ncells_local();
            let mut out = Vec::with_capacity(2);
            if m[axis] > 0 {
                let mut cm = m;
                cm[axis] -= 1;
                out.push(self.cell_index(cm));
            }
            if m[axis] < ncl[axis] {
                out.push(self.cell_index(m));
            }
            out
        }

        fn cell_global_id(&self, c: usize) -> u64 {
            let mut m = self.cell_multi(c);
            for k in 0..$d {
                m[k] += self.cell_lo[k];
            }
            Self::linear(&self.global_ncells, &m) as u64
        }

        fn node_global_id(&self, n: usize) -> u64 {
            let mut m = self.node_multi(n);
            let mut dims = self.global_ncells;
            for k in 0..$d {
                m[k] += self.cell_lo[k];
                dims[k] += 1;
            }
            Self::linear(&dims, &m) as u64
        }

        fn face_global_id(&self, f: usize) -> u64 {
            let (axis, mut m) = self.face_split(f);
            for k in 0..$d {
                m[k] += self.cell_lo[k];
            }
            let mut gid = Self::linear(&self.global_face_dims(axis), &m);
            for a in 0..axis {
                gid += self.global_face_dims(a).iter().product::<usize>();
            }
            gid as u64
        }
    };
}

impl MeshView<2> for SimpleMesh<2> {
    impl_counts_and_ids!(2);

    fn cell_nodes(&self, c: usize) -> Vec<usize> {
        let [i, j] = self.cell_multi(c);
        vec![
            self.node_index([i, j]),
            self.node_index([i + 1, j]),
            self.node_index([i + 1, j + 1]),
            self.node_index([i, j + 1]),
        ]
    }

    fn face_nodes(&self, f: usize) -> Vec<usize> {
        let (axis, [i, j]) = self.face_split(f);
        match axis {
            // Normal +x: tangent +y.
            0 => vec![self.node_index([i, j]), self.node_index([i, j + 1])],
            // Normal +y: tangent -x.
            _ => vec![self.node_index([i + 1, j]), self.node_index([i, j])],
        }
    }
}

impl MeshView<3> for SimpleMesh<3> {
    impl_counts_and_ids!(3);

    fn cell_nodes(&self, c: usize) -> Vec<usize> {
        let [i, j, k] = self.cell_multi(c);
        vec![
            self.node_index([i, j, k]),
            self.node_index([i + 1, j, k]),
            self.node_index([i + 1, j + 1, k]),
            self.node_index([i, j + 1, k]),
            self.node_index([i, j, k + 1]),
            self.node_index([i + 1, j, k + 1]),
            self.node_index([i + 1, j + 1, k + 1]),
            self.node_index([i, j + 1, k + 1]),
        ]
    }

    fn face_nodes(&self, f: usize) -> Vec<usize> {
        let (axis, [i, j, k]) = self.face_split(f);
        match axis {
            0 => vec![
                self.node_index([i, j, k]),
                self.node_index([i, j + 1, k]),
                self.node_index([i, j + 1, k + 1]),
                self.node_index([i, j, k + 1]),
            ],
            1 => vec![
                self.node_index([i, j, k]),
                self.node_index([i, j, k + 1]),
                self.node_index([i + 1, j, k + 1]),
                self.node_index([i + 1, j, k]),
            ],
            _ => vec![
                self.node_index([i, j, k]),
                self.node_index([i + 1, j, k]),
                self.node_index([i + 1, j + 1, k]),
                self.node_index([i, j + 1, k]),
            ],
        }
    }
}
