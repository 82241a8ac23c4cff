//! Compressed sparse row matrix and feature-space fingerprints.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fmt;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Fingerprint of an ordered list of feature names.
///
/// Two vectorizers share an id iff they map the same feature names to the
/// same column indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureSpaceId(u64);

impl FeatureSpaceId {
    /// Hash feature names in column order (FNV-1a, 64 bit).
    pub fn from_feature_names<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = FNV_OFFSET;
        for name in names {
            for b in name.as_bytes() {
                state = (state ^ u64::from(*b)).wrapping_mul(FNV_PRIME);
            }
            // 0xff never occurs in UTF-8, so ["ab", "c"] and ["a", "bc"] differ.
            state = (state ^ 0xff).wrapping_mul(FNV_PRIME);
        }
        Self(state)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FeatureSpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Sparse matrix in compressed sparse row layout.
///
/// Column indices are strictly increasing within each row.
#[derive(Clone, Debug, PartialEq)]
pub struct CsrMatrix {
    n_rows: usize,
    n_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<f64>,
    feature_space: Option<FeatureSpaceId>,
}

impl CsrMatrix {
    /// An `n_rows x n_cols` matrix with no stored entries.
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_rows,
            n_cols,
            indptr: vec![0; n_rows + 1],
            indices: Vec::new(),
            data: Vec::new(),
            feature_space: None,
        }
    }

    /// Build a matrix from per-row `(column, value)` entries.
    ///
    /// Entries are sorted by column; duplicates within a row are summed.
    pub fn from_rows(n_cols: usize, rows: Vec<Vec<(usize, f64)>>) -> Result<Self> {
        let n_rows = rows.len();
        let mut indptr = Vec::with_capacity(n_rows + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        indptr.push(0);

        for (row_idx, mut row) in rows.into_iter().enumerate() {
            row.sort_by_key(|&(col, _)| col);
            let row_start = indices.len();
            for (col, value) in row {
                if col >= n_cols {
                    return Err(PipelineError::InvalidParameter(format!(
                        "column index {} out of bounds for width {} at row {}",
                        col, n_cols, row_idx
                    )));
                }
                if indices.len() > row_start && indices.last() == Some(&col) {
                    if let Some(last) = data.last_mut() {
                        *last += value;
                    }
                } else {
                    indices.push(col);
                    data.push(value);
                }
            }
            indptr.push(indices.len());
        }

        Ok(Self {
            n_rows,
            n_cols,
            indptr,
            indices,
            data,
            feature_space: None,
        })
    }

    /// Tag the matrix with the feature space that produced it.
    pub fn with_feature_space(mut self, id: FeatureSpaceId) -> Self {
        self.feature_space = Some(id);
        self
    }

    pub fn feature_space(&self) -> Option<FeatureSpaceId> {
        self.feature_space
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.n_rows, self.n_cols)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Number of stored entries.
    pub fn nnz(&self) -> usize {
        self.data.len()
    }

    /// Stored `(column, value)` entries of row `i`.
    ///
    /// # Panics
    /// If `i >= n_rows`.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.indptr[i]..self.indptr[i + 1];
        self.indices[range.clone()]
            .iter()
            .copied()
            .zip(self.data[range].iter().copied())
    }

    /// Value at `(row, col)`, zero when not stored.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        if row >= self.n_rows {
            return 0.0;
        }
        let range = self.indptr[row]..self.indptr[row + 1];
        match self.indices[range.clone()].binary_search(&col) {
            Ok(pos) => self.data[range.start + pos],
            Err(_) => 0.0,
        }
    }

    /// Matrix-vector product `X @ v`.
    pub fn dot(&self, v: &Array1<f64>) -> Result<Array1<f64>> {
        if v.len() != self.n_cols {
            return Err(PipelineError::FeatureMismatch {
                expected_features: v.len(),
                got_features: self.n_cols,
            });
        }
        let mut out = Array1::zeros(self.n_rows);
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.row(i).map(|(col, value)| value * v[col]).sum();
        }
        Ok(out)
    }

    /// Transposed product `X^T @ u`.
    pub fn tdot(&self, u: &Array1<f64>) -> Result<Array1<f64>> {
        if u.len() != self.n_rows {
            return Err(PipelineError::ShapeMismatch {
                context: "transposed product",
                expected: self.n_rows,
                got: u.len(),
            });
        }
        let mut out = Array1::zeros(self.n_cols);
        for i in 0..self.n_rows {
            let ui = u[i];
            if ui == 0.0 {
                continue;
            }
            for (col, value) in self.row(i) {
                out[col] += value * ui;
            }
        }
        Ok(out)
    }

    /// Mean of every column (zeros when the matrix has no rows).
    pub fn column_means(&self) -> Array1<f64> {
        let mut sums = Array1::zeros(self.n_cols);
        if self.n_rows == 0 {
            return sums;
        }
        for (&col, &value) in self.indices.iter().zip(self.data.iter()) {
            sums[col] += value;
        }
        sums / self.n_rows as f64
    }

    /// Dense copy, mainly for inspection in tests and debugging.
    pub fn to_dense(&self) -> Array2<f64> {
        let mut dense = Array2::zeros((self.n_rows, self.n_cols));
        for i in 0..self.n_rows {
            for (col, value) in self.row(i) {
                dense[[i, col]] = value;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample() -> CsrMatrix {
        // [[1, 0, 2],
        //  [0, 0, 0],
        //  [0, 3, 0]]
        CsrMatrix::from_rows(
            3,
            vec![vec![(2, 2.0), (0, 1.0)], vec![], vec![(1, 3.0)]],
        )
        .unwrap()
    }

    // === Construction ===

    #[test]
    fn test_from_rows_sorts_columns() {
        let m = sample();
        assert_eq!(m.shape(), (3, 3));
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.row(0).collect::<Vec<_>>(), vec![(0, 1.0), (2, 2.0)]);
        assert_eq!(m.row(1).count(), 0);
    }

    #[test]
    fn test_from_rows_sums_duplicates() {
        let m = CsrMatrix::from_rows(2, vec![vec![(1, 1.0), (1, 2.5)]]).unwrap();
        assert_eq!(m.nnz(), 1);
        assert_eq!(m.get(0, 1), 3.5);
    }

    #[test]
    fn test_from_rows_rejects_out_of_bounds() {
        let result = CsrMatrix::from_rows(2, vec![vec![(2, 1.0)]]);
        assert!(matches!(result, Err(PipelineError::InvalidParameter(_))));
    }

    #[test]
    fn test_zeros() {
        let m = CsrMatrix::zeros(0, 4);
        assert_eq!(m.shape(), (0, 4));
        assert_eq!(m.nnz(), 0);
    }

    // === Products ===

    #[test]
    fn test_dot() {
        let m = sample();
        let out = m.dot(&array![1.0, 10.0, 100.0]).unwrap();
        assert_eq!(out, array![201.0, 0.0, 30.0]);
    }

    #[test]
    fn test_dot_width_mismatch() {
        let m = sample();
        let result = m.dot(&array![1.0, 2.0]);
        assert!(matches!(
            result,
            Err(PipelineError::FeatureMismatch {
                expected_features: 2,
                got_features: 3
            })
        ));
    }

    #[test]
    fn test_tdot() {
        let m = sample();
        let out = m.tdot(&array![1.0, 5.0, 2.0]).unwrap();
        assert_eq!(out, array![1.0, 6.0, 2.0]);
    }

    #[test]
    fn test_tdot_length_mismatch() {
        let m = sample();
        assert!(m.tdot(&array![1.0]).is_err());
    }

    #[test]
    fn test_column_means() {
        let m = sample();
        let means = m.column_means();
        assert_eq!(means, array![1.0 / 3.0, 1.0, 2.0 / 3.0]);
    }

    #[test]
    fn test_to_dense() {
        let dense = sample().to_dense();
        assert_eq!(
            dense,
            array![[1.0, 0.0, 2.0], [0.0, 0.0, 0.0], [0.0, 3.0, 0.0]]
        );
    }

    // === Feature space ===

    #[test]
    fn test_feature_space_id_is_order_sensitive() {
        let a = FeatureSpaceId::from_feature_names(["a=1", "b=2"]);
        let b = FeatureSpaceId::from_feature_names(["b=2", "a=1"]);
        let c = FeatureSpaceId::from_feature_names(["a=1", "b=2"]);
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_feature_space_id_separates_names() {
        let a = FeatureSpaceId::from_feature_names(["ab", "c"]);
        let b = FeatureSpaceId::from_feature_names(["a", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_matrix_carries_feature_space() {
        let id = FeatureSpaceId::from_feature_names(["x"]);
        let m = CsrMatrix::zeros(1, 1).with_feature_space(id);
        assert_eq!(m.feature_space(), Some(id));
        assert_eq!(id.to_string().len(), 16);
    }
}
