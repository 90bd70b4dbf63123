//! Sparse Boolean-Matrix Kernel
//!
//! Two representations over the boolean semiring `⟨{0,1}, OR, AND⟩`:
//!
//! - [`DokMatrix`] — mutable build-time form (dictionary of kept cells),
//!   supports `set`/`get`, in-place OR, and ordered nonzero iteration.
//! - [`CsrMatrix`] — read-optimized row-compressed form, supports boolean
//!   matrix multiply, Kronecker product, block-diagonal combination,
//!   transpose, and row slicing.
//!
//! ## Invariants
//!
//! - Every stored coordinate lies inside the matrix shape; out-of-range
//!   writes are a caller bug and panic.
//! - Nonzero iteration is row-major ordered and therefore stable across
//!   repeated calls on an unchanged matrix. `nnz` equality between passes
//!   is the fixed-point witness used by every solver in this crate.
//! - Multiplication short-circuits per output cell: a column already
//!   marked true in the scratch row is never revisited.
//!
//! Arithmetic cannot overflow or fail; the kernel exposes no error type.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::BTreeSet;

// ============================================================================
// DOK (build-time) form
// ============================================================================

/// Mutable sparse boolean matrix keyed by `(row, col)`.
///
/// Backed by a `BTreeSet` so nonzero iteration is ordered and deterministic.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DokMatrix {
    rows: usize,
    cols: usize,
    cells: BTreeSet<(usize, usize)>,
}

impl DokMatrix {
    /// All-zero matrix of the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols, cells: BTreeSet::new() }
    }

    /// `n × n` identity.
    pub fn identity(n: usize) -> Self {
        Self { rows: n, cols: n, cells: (0..n).map(|i| (i, i)).collect() }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Count of true cells.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.cells.is_empty()
    }

    /// Set cell `(i, j)` to true. Returns whether the cell was newly set.
    pub fn set(&mut self, i: usize, j: usize) -> bool {
        assert!(i < self.rows && j < self.cols, "cell ({i}, {j}) outside {}x{}", self.rows, self.cols);
        self.cells.insert((i, j))
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> bool {
        self.cells.contains(&(i, j))
    }

    /// Row-major iteration over true cells.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells.iter().copied()
    }

    /// Element-wise OR of `other` into `self`. Shapes must match.
    pub fn or_assign(&mut self, other: &DokMatrix) {
        assert_eq!((self.rows, self.cols), (other.rows, other.cols), "shape mismatch in or_assign");
        self.cells.extend(other.cells.iter().copied());
    }

    /// Convert to the read-optimized form.
    pub fn to_csr(&self) -> CsrMatrix {
        CsrMatrix::from_sorted_entries(self.rows, self.cols, self.cells.iter().copied())
    }
}

// ============================================================================
// CSR (read-optimized) form
// ============================================================================

/// Row-compressed sparse boolean matrix.
///
/// `row_ptr` has `rows + 1` entries; the column indices of row `i` occupy
/// `col_idx[row_ptr[i]..row_ptr[i + 1]]` in strictly increasing order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrMatrix {
    rows: usize,
    cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl CsrMatrix {
    /// All-zero matrix of the given shape.
    pub fn zero(rows: usize, cols: usize) -> Self {
        Self { rows, cols, row_ptr: vec![0; rows + 1], col_idx: Vec::new() }
    }

    /// `n × n` identity.
    pub fn identity(n: usize) -> Self {
        Self { rows: n, cols: n, row_ptr: (0..=n).collect(), col_idx: (0..n).collect() }
    }

    /// Build from entries already sorted row-major with no duplicates.
    fn from_sorted_entries(rows: usize, cols: usize, entries: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut row_ptr = Vec::with_capacity(rows + 1);
        let mut col_idx = Vec::new();
        row_ptr.push(0);
        let mut cur_row = 0usize;
        for (i, j) in entries {
            debug_assert!(i < rows && j < cols);
            while cur_row < i {
                row_ptr.push(col_idx.len());
                cur_row += 1;
            }
            col_idx.push(j);
        }
        while cur_row < rows {
            row_ptr.push(col_idx.len());
            cur_row += 1;
        }
        Self { rows, cols, row_ptr, col_idx }
    }

    /// Build from arbitrary entries (sorted and deduplicated here).
    pub fn from_entries(rows: usize, cols: usize, entries: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut cells: Vec<(usize, usize)> = entries.into_iter().collect();
        cells.sort_unstable();
        cells.dedup();
        Self::from_sorted_entries(rows, cols, cells)
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.col_idx.is_empty()
    }

    /// Column indices of row `i`, strictly increasing.
    #[inline]
    pub fn row(&self, i: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[i]..self.row_ptr[i + 1]]
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> bool {
        self.row(i).binary_search(&j).is_ok()
    }

    /// Row-major iteration over true cells.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.rows).flat_map(move |i| self.row(i).iter().map(move |&j| (i, j)))
    }

    pub fn to_dok(&self) -> DokMatrix {
        DokMatrix { rows: self.rows, cols: self.cols, cells: self.iter().collect() }
    }

    // ------------------------- Semiring operations -------------------------

    /// Element-wise OR. Shapes must match.
    pub fn add(&self, other: &CsrMatrix) -> CsrMatrix {
        assert_eq!((self.rows, self.cols), (other.rows, other.cols), "shape mismatch in add");
        let mut row_ptr = Vec::with_capacity(self.rows + 1);
        let mut col_idx = Vec::with_capacity(self.col_idx.len() + other.col_idx.len());
        row_ptr.push(0);
        for i in 0..self.rows {
            merge_sorted(self.row(i), other.row(i), &mut col_idx);
            row_ptr.push(col_idx.len());
        }
        CsrMatrix { rows: self.rows, cols: self.cols, row_ptr, col_idx }
    }

    /// Boolean matrix product `self · other`.
    ///
    /// Row-times-column over OR/AND, realized as a row merge: the scratch
    /// mark vector short-circuits every cell that is already true.
    pub fn multiply(&self, other: &CsrMatrix) -> CsrMatrix {
        assert_eq!(self.cols, other.rows, "inner dimension mismatch in multiply");
        let mut row_ptr = Vec::with_capacity(self.rows + 1);
        let mut col_idx = Vec::new();
        row_ptr.push(0);
        let mut mark = vec![false; other.cols];
        let mut touched: Vec<usize> = Vec::new();
        for i in 0..self.rows {
            for &k in self.row(i) {
                for &j in other.row(k) {
                    if !mark[j] {
                        mark[j] = true;
                        touched.push(j);
                    }
                }
            }
            touched.sort_unstable();
            col_idx.extend_from_slice(&touched);
            row_ptr.push(col_idx.len());
            for &j in &touched {
                mark[j] = false;
            }
            touched.clear();
        }
        CsrMatrix { rows: self.rows, cols: other.cols, row_ptr, col_idx }
    }

    /// Kronecker product `self ⊗ other`.
    ///
    /// `(A ⊗ B)[i·rB + i', j·cB + j'] = A[i, j] ∧ B[i', j']`.
    pub fn kronecker(&self, other: &CsrMatrix) -> CsrMatrix {
        let rows = self.rows * other.rows;
        let cols = self.cols * other.cols;
        let mut row_ptr = Vec::with_capacity(rows + 1);
        let mut col_idx = Vec::with_capacity(self.nnz() * other.nnz());
        row_ptr.push(0);
        for i in 0..self.rows {
            for ip in 0..other.rows {
                // Output stays sorted: outer blocks increase with j, inner with j'.
                for &j in self.row(i) {
                    for &jp in other.row(ip) {
                        col_idx.push(j * other.cols + jp);
                    }
                }
                row_ptr.push(col_idx.len());
            }
        }
        CsrMatrix { rows, cols, row_ptr, col_idx }
    }

    /// Block-diagonal combination `self ⊕ other`: `self` upper-left,
    /// `other` lower-right, zero elsewhere.
    pub fn block_diag(&self, other: &CsrMatrix) -> CsrMatrix {
        let rows = self.rows + other.rows;
        let cols = self.cols + other.cols;
        let mut row_ptr = Vec::with_capacity(rows + 1);
        let mut col_idx = Vec::with_capacity(self.nnz() + other.nnz());
        row_ptr.push(0);
        for i in 0..self.rows {
            col_idx.extend_from_slice(self.row(i));
            row_ptr.push(col_idx.len());
        }
        for i in 0..other.rows {
            col_idx.extend(other.row(i).iter().map(|&j| j + self.cols));
            row_ptr.push(col_idx.len());
        }
        CsrMatrix { rows, cols, row_ptr, col_idx }
    }

    pub fn transpose(&self) -> CsrMatrix {
        let mut counts = vec![0usize; self.cols];
        for &j in &self.col_idx {
            counts[j] += 1;
        }
        let mut row_ptr = Vec::with_capacity(self.cols + 1);
        row_ptr.push(0);
        for c in &counts {
            row_ptr.push(row_ptr.last().unwrap() + c);
        }
        let mut cursor = row_ptr[..self.cols].to_vec();
        let mut col_idx = vec![0usize; self.col_idx.len()];
        for (i, j) in self.iter() {
            col_idx[cursor[j]] = i;
            cursor[j] += 1;
        }
        CsrMatrix { rows: self.cols, cols: self.rows, row_ptr, col_idx }
    }
}

/// Transitive closure of a square adjacency matrix.
///
/// Iterates `M ← M + M·M` until `nnz` stabilizes; the result is
/// non-reflexive unless `m` already carries diagonal cells. The zero matrix
/// is returned unchanged without iterating.
pub fn transitive_closure(m: &CsrMatrix) -> CsrMatrix {
    assert_eq!(m.rows(), m.cols(), "transitive closure requires a square matrix");
    if m.is_zero() {
        return m.clone();
    }
    let mut closure = m.clone();
    let mut prev = usize::MAX;
    let mut steps = 0usize;
    while closure.nnz() != prev {
        prev = closure.nnz();
        closure = closure.add(&closure.multiply(&closure));
        steps += 1;
    }
    tracing::debug!(steps, nnz = closure.nnz(), "transitive closure reached fixed point");
    closure
}

#[inline]
fn merge_sorted(a: &[usize], b: &[usize], out: &mut Vec<usize>) {
    let (mut x, mut y) = (0usize, 0usize);
    while x < a.len() && y < b.len() {
        match a[x].cmp(&b[y]) {
            std::cmp::Ordering::Less => {
                out.push(a[x]);
                x += 1;
            }
            std::cmp::Ordering::Greater => {
                out.push(b[y]);
                y += 1;
            }
            std::cmp::Ordering::Equal => {
                out.push(a[x]);
                x += 1;
                y += 1;
            }
        }
    }
    out.extend_from_slice(&a[x..]);
    out.extend_from_slice(&b[y..]);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn from_cells(rows: usize, cols: usize, cells: &[(usize, usize)]) -> CsrMatrix {
        CsrMatrix::from_entries(rows, cols, cells.iter().copied())
    }

    #[test]
    fn dok_roundtrip_preserves_cells() {
        let mut dok = DokMatrix::new(3, 4);
        assert!(dok.set(2, 1));
        assert!(dok.set(0, 3));
        assert!(!dok.set(2, 1));
        let csr = dok.to_csr();
        assert_eq!(csr.nnz(), 2);
        assert!(csr.get(2, 1) && csr.get(0, 3));
        assert_eq!(csr.to_dok(), dok);
    }

    #[test]
    fn iteration_is_row_major_and_stable() {
        let m = from_cells(3, 3, &[(2, 0), (0, 2), (0, 1), (1, 1)]);
        let first: Vec<_> = m.iter().collect();
        assert_eq!(first, vec![(0, 1), (0, 2), (1, 1), (2, 0)]);
        assert_eq!(first, m.iter().collect::<Vec<_>>());
    }

    #[test]
    fn add_is_elementwise_or() {
        let a = from_cells(2, 2, &[(0, 0), (1, 1)]);
        let b = from_cells(2, 2, &[(0, 0), (0, 1)]);
        let sum = a.add(&b);
        assert_eq!(sum.iter().collect::<Vec<_>>(), vec![(0, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn multiply_is_boolean_product() {
        // Path 0 -> 1 -> 2 composes into 0 -> 2.
        let a = from_cells(3, 3, &[(0, 1)]);
        let b = from_cells(3, 3, &[(1, 2)]);
        let p = a.multiply(&b);
        assert_eq!(p.iter().collect::<Vec<_>>(), vec![(0, 2)]);
        // OR-saturation: two different witnesses for the same cell count once.
        let c = from_cells(2, 3, &[(0, 0), (0, 1)]);
        let d = from_cells(3, 2, &[(0, 1), (1, 1)]);
        let q = c.multiply(&d);
        assert_eq!(q.nnz(), 1);
        assert!(q.get(0, 1));
    }

    #[test]
    fn kronecker_matches_definition() {
        let a = from_cells(2, 2, &[(0, 1), (1, 0)]);
        let b = from_cells(2, 2, &[(0, 0), (1, 1)]);
        let k = a.kronecker(&b);
        assert_eq!(k.rows(), 4);
        for (i, j) in k.iter() {
            let (ai, bi) = (i / 2, i % 2);
            let (aj, bj) = (j / 2, j % 2);
            assert!(a.get(ai, aj) && b.get(bi, bj));
        }
        assert_eq!(k.nnz(), a.nnz() * b.nnz());
    }

    #[test]
    fn block_diag_keeps_sides_apart() {
        let a = from_cells(2, 2, &[(0, 1)]);
        let b = from_cells(3, 3, &[(2, 0)]);
        let d = a.block_diag(&b);
        assert_eq!((d.rows(), d.cols()), (5, 5));
        assert_eq!(d.iter().collect::<Vec<_>>(), vec![(0, 1), (4, 2)]);
    }

    #[test]
    fn transpose_involutes() {
        let m = from_cells(3, 2, &[(0, 1), (2, 0), (1, 0)]);
        let t = m.transpose();
        assert_eq!((t.rows(), t.cols()), (2, 3));
        assert!(t.get(1, 0) && t.get(0, 2) && t.get(0, 1));
        assert_eq!(t.transpose(), m);
    }

    #[test]
    fn closure_of_cycle_is_all_ones() {
        // 0 -> 1 -> 2 -> 0
        let m = from_cells(3, 3, &[(0, 1), (1, 2), (2, 0)]);
        let t = transitive_closure(&m);
        assert_eq!(t.nnz(), 9);
    }

    #[test]
    fn closure_is_idempotent() {
        let m = from_cells(4, 4, &[(0, 1), (1, 2), (2, 3)]);
        let once = transitive_closure(&m);
        let twice = transitive_closure(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn closure_of_zero_matrix_is_zero() {
        let z = CsrMatrix::zero(5, 5);
        assert_eq!(transitive_closure(&z), z);
    }

    #[test]
    fn closure_is_non_reflexive_on_a_dag() {
        let m = from_cells(3, 3, &[(0, 1), (1, 2)]);
        let t = transitive_closure(&m);
        assert_eq!(t.iter().collect::<Vec<_>>(), vec![(0, 1), (0, 2), (1, 2)]);
    }
}
