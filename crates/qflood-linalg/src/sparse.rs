//! Compressed sparse row matrices backed by `sprs`.

use ndarray::{Array1, Array2, ArrayView1};
use sprs::{CsMat, TriMat};

use crate::error::{LinalgError, LinalgResult};

/// A real matrix in compressed sparse row form.
///
/// Column indices are strictly increasing within each row and every stored
/// value is finite. Explicit zeros may be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    inner: CsMat<f64>,
}

impl CsrMatrix {
    /// Assemble from `(row, col, value)` triplets. Duplicate coordinates are
    /// summed.
    pub fn from_triplets(
        nrows: usize,
        ncols: usize,
        triplets: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> LinalgResult<Self> {
        let mut tri = TriMat::new((nrows, ncols));
        for (position, (row, col, value)) in triplets.into_iter().enumerate() {
            if row >= nrows || col >= ncols {
                return Err(LinalgError::IndexOutOfBounds {
                    row,
                    col,
                    nrows,
                    ncols,
                });
            }
            if !value.is_finite() {
                return Err(LinalgError::NonFinite {
                    what: "matrix",
                    index: position,
                });
            }
            tri.add_triplet(row, col, value);
        }
        Ok(Self {
            inner: tri.to_csr(),
        })
    }

    /// Build from raw CSR arrays, validating every structural invariant.
    pub fn from_parts(
        nrows: usize,
        ncols: usize,
        indptr: Vec<usize>,
        indices: Vec<usize>,
        data: Vec<f64>,
    ) -> LinalgResult<Self> {
        if indptr.len() != nrows + 1 {
            return Err(LinalgError::InvalidStructure(format!(
                "indptr has length {}, expected {}",
                indptr.len(),
                nrows + 1
            )));
        }
        if indices.len() != data.len() {
            return Err(LinalgError::InvalidStructure(format!(
                "{} column indices but {} values",
                indices.len(),
                data.len()
            )));
        }
        if indptr[0] != 0 || indptr[nrows] != data.len() {
            return Err(LinalgError::InvalidStructure(
                "indptr must start at 0 and end at nnz".into(),
            ));
        }
        for row in 0..nrows {
            let (start, end) = (indptr[row], indptr[row + 1]);
            if start > end {
                return Err(LinalgError::InvalidStructure(format!(
                    "indptr decreases at row {row}"
                )));
            }
            let cols = &indices[start..end];
            if let Some(&col) = cols.iter().find(|&&c| c >= ncols) {
                return Err(LinalgError::IndexOutOfBounds {
                    row,
                    col,
                    nrows,
                    ncols,
                });
            }
            if cols.windows(2).any(|w| w[0] >= w[1]) {
                return Err(LinalgError::InvalidStructure(format!(
                    "column indices of row {row} are not strictly increasing"
                )));
            }
        }
        if let Some(index) = data.iter().position(|v| !v.is_finite()) {
            return Err(LinalgError::NonFinite {
                what: "matrix",
                index,
            });
        }

        // Every invariant `CsMat::new` asserts was checked above.
        Ok(Self {
            inner: CsMat::new((nrows, ncols), indptr, indices, data),
        })
    }

    /// Convert a dense matrix, skipping exact zeros.
    ///
    /// Non-finite entries are stored as-is; use [`CsrMatrix::from_triplets`]
    /// when the input is untrusted.
    pub fn from_dense(dense: &Array2<f64>) -> Self {
        let mut tri = TriMat::new(dense.dim());
        for ((row, col), &value) in dense.indexed_iter() {
            if value != 0.0 {
                tri.add_triplet(row, col, value);
            }
        }
        Self {
            inner: tri.to_csr(),
        }
    }

    /// Diagonal matrix with the given entries.
    pub fn from_diagonal(diagonal: &[f64]) -> Self {
        let n = diagonal.len();
        Self {
            inner: CsMat::new((n, n), (0..=n).collect(), (0..n).collect(), diagonal.to_vec()),
        }
    }

    /// The underlying `sprs` matrix.
    pub fn as_sprs(&self) -> &CsMat<f64> {
        &self.inner
    }

    pub fn nrows(&self) -> usize {
        self.inner.rows()
    }

    pub fn ncols(&self) -> usize {
        self.inner.cols()
    }

    pub fn shape(&self) -> (usize, usize) {
        self.inner.shape()
    }

    pub fn is_square(&self) -> bool {
        self.nrows() == self.ncols()
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    pub fn indptr(&self) -> &[usize] {
        self.inner.indptr().into_raw_storage()
    }

    pub fn indices(&self) -> &[usize] {
        self.inner.indices()
    }

    pub fn data(&self) -> &[f64] {
        self.inner.data()
    }

    /// Iterate over the stored `(col, value)` pairs of one row.
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = if row < self.nrows() {
            let indptr = self.indptr();
            indptr[row]..indptr[row + 1]
        } else {
            0..0
        };
        self.indices()[range.clone()]
            .iter()
            .copied()
            .zip(self.data()[range].iter().copied())
    }

    /// Iterate over every stored `(row, col, value)` triplet in row order.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.nrows()).flat_map(move |row| self.row(row).map(move |(col, value)| (row, col, value)))
    }

    /// Value at `(row, col)`, zero when not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        if row >= self.nrows() || col >= self.ncols() {
            return 0.0;
        }
        self.inner.get(row, col).copied().unwrap_or(0.0)
    }

    /// Main diagonal (length `min(nrows, ncols)`).
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.nrows().min(self.ncols()))
            .map(|i| self.get(i, i))
            .collect()
    }

    /// Compute `A x`.
    pub fn matvec(&self, x: &ArrayView1<'_, f64>) -> LinalgResult<Array1<f64>> {
        if x.len() != self.ncols() {
            return Err(LinalgError::DimensionMismatch {
                expected: self.ncols(),
                found: x.len(),
            });
        }
        Ok(self
            .inner
            .outer_iterator()
            .map(|row| row.iter().map(|(col, &value)| value * x[col]).sum())
            .collect())
    }

    /// Transpose, in CSR form.
    pub fn transpose(&self) -> Self {
        Self {
            inner: self.inner.transpose_view().to_csr(),
        }
    }

    /// `Aᵀ A`, symmetric positive semi-definite.
    pub fn gram(&self) -> Self {
        let at = self.inner.transpose_view().to_csr();
        Self {
            inner: &at * &self.inner,
        }
    }

    /// Densify.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros(self.shape());
        for (row, col, value) in self.triplets() {
            dense[[row, col]] = value;
        }
        dense
    }

    /// Dense principal submatrix on `indices` (rows and columns, in the
    /// given order).
    pub fn principal_submatrix(&self, indices: &[usize]) -> Array2<f64> {
        let k = indices.len();
        let mut block = Array2::zeros((k, k));
        for (i, &row) in indices.iter().enumerate() {
            for (j, &col) in indices.iter().enumerate() {
                block[[i, j]] = self.get(row, col);
            }
        }
        block
    }

    /// True when square and `|a_ij - a_ji| <= tolerance` for every stored
    /// entry.
    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        self.is_square()
            && self
                .triplets()
                .all(|(row, col, value)| (value - self.get(col, row)).abs() <= tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn triplets_are_sorted_and_summed() {
        let m = CsrMatrix::from_triplets(
            2,
            3,
            vec![(1, 2, 1.0), (0, 1, 2.0), (1, 0, 3.0), (1, 2, 0.5)],
        )
        .unwrap();
        assert_eq!(m.indptr(), &[0, 1, 3]);
        assert_eq!(m.indices(), &[1, 0, 2]);
        assert_eq!(m.data(), &[2.0, 3.0, 1.5]);
        assert_eq!(m.get(1, 2), 1.5);
        assert_eq!(m.get(0, 0), 0.0);
    }

    #[test]
    fn out_of_bounds_triplet_rejected() {
        let err = CsrMatrix::from_triplets(2, 2, vec![(2, 0, 1.0)]).unwrap_err();
        assert!(matches!(err, LinalgError::IndexOutOfBounds { row: 2, .. }));
    }

    #[test]
    fn non_finite_triplet_rejected() {
        let err = CsrMatrix::from_triplets(2, 2, vec![(0, 0, 1.0), (1, 1, f64::NAN)]).unwrap_err();
        assert!(matches!(err, LinalgError::NonFinite { index: 1, .. }));
    }

    #[test]
    fn from_parts_checks_column_order() {
        let err = CsrMatrix::from_parts(1, 3, vec![0, 2], vec![2, 1], vec![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, LinalgError::InvalidStructure(_)));
    }

    #[test]
    fn dense_round_trip_and_matvec() {
        let dense = array![[4.0, -1.0, 0.0], [-1.0, 4.0, -1.0], [0.0, -1.0, 4.0]];
        let m = CsrMatrix::from_dense(&dense);
        assert_eq!(m.nnz(), 7);
        assert_eq!(m.to_dense(), dense);

        let y = m.matvec(&array![1.0, 1.0, 1.0].view()).unwrap();
        assert_eq!(y, array![3.0, 2.0, 3.0]);
        assert!(m.is_symmetric(0.0));
    }

    #[test]
    fn matvec_length_checked() {
        let m = CsrMatrix::from_diagonal(&[1.0, 2.0]);
        assert!(matches!(
            m.matvec(&array![1.0].view()),
            Err(LinalgError::DimensionMismatch {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn principal_submatrix_follows_index_order() {
        let dense = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let m = CsrMatrix::from_dense(&dense);
        let block = m.principal_submatrix(&[2, 0]);
        assert_eq!(block, array![[9.0, 7.0], [3.0, 1.0]]);
        assert!(!m.is_symmetric(1e-12));
    }

    #[test]
    fn transpose_and_gram() {
        let m = CsrMatrix::from_dense(&array![[1.0, 2.0], [0.0, 3.0]]);
        assert_eq!(m.transpose().to_dense(), array![[1.0, 0.0], [2.0, 3.0]]);
        assert_eq!(m.gram().to_dense(), array![[1.0, 2.0], [2.0, 13.0]]);
        assert!(m.gram().is_symmetric(0.0));
    }
}
