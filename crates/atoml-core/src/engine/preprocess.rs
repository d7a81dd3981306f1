use itertools::Itertools;
use nalgebra::{DMatrix, RowDVector};
use std::collections::BTreeSet;

/// Column statistics of a training matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaling {
    pub mean: RowDVector<f64>,
    /// Population standard deviation; constant columns get 1 so they map to 0.
    pub std: RowDVector<f64>,
}

impl Scaling {
    pub fn fit(train: &DMatrix<f64>) -> Self {
        let n = train.nrows().max(1) as f64;
        let mean = train.row_mean();
        let std = RowDVector::from_iterator(
            train.ncols(),
            train.column_iter().zip(mean.iter()).map(|(col, &m)| {
                let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
                let s = var.sqrt();
                if s > 1e-12 { s } else { 1.0 }
            }),
        );
        Self { mean, std }
    }

    pub fn apply(&self, matrix: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = matrix.clone();
        for mut row in out.row_iter_mut() {
            row -= &self.mean;
            row.component_div_assign(&self.std);
        }
        out
    }
}

/// Standardises both matrices with the training set's column statistics.
pub fn standardize(
    train: &DMatrix<f64>,
    test: &DMatrix<f64>,
) -> (DMatrix<f64>, DMatrix<f64>, Scaling) {
    let scaling = Scaling::fit(train);
    (scaling.apply(train), scaling.apply(test), scaling)
}

/// Removes the given columns, keeping the others in their original order.
///
/// Out-of-range and repeated indices are ignored.
pub fn delete_columns(matrix: &DMatrix<f64>, rejected: &[usize]) -> DMatrix<f64> {
    let rejected: BTreeSet<usize> = rejected.iter().copied().collect();
    let kept: Vec<usize> = (0..matrix.ncols()).filter(|c| !rejected.contains(c)).collect();
    select_columns(matrix, &kept)
}

/// Builds a matrix from the given columns, in the given order.
pub fn select_columns(matrix: &DMatrix<f64>, columns: &[usize]) -> DMatrix<f64> {
    DMatrix::from_fn(matrix.nrows(), columns.len(), |r, c| matrix[(r, columns[c])])
}

/// Appends every pairwise product of the original columns, squares included.
///
/// Product columns are named `"{a}*{b}"`.
pub fn expand_features(matrix: &DMatrix<f64>, names: &[String]) -> (DMatrix<f64>, Vec<String>) {
    let pairs: Vec<(usize, usize)> = (0..matrix.ncols())
        .combinations_with_replacement(2)
        .map(|p| (p[0], p[1]))
        .collect();
    let width = matrix.ncols() + pairs.len();

    let expanded = DMatrix::from_fn(matrix.nrows(), width, |r, c| {
        if c < matrix.ncols() {
            matrix[(r, c)]
        } else {
            let (a, b) = pairs[c - matrix.ncols()];
            matrix[(r, a)] * matrix[(r, b)]
        }
    });
    let mut expanded_names = names.to_vec();
    expanded_names.extend(pairs.iter().map(|&(a, b)| format!("{}*{}", names[a], names[b])));
    (expanded, expanded_names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardize_uses_train_statistics() {
        let train = DMatrix::from_row_slice(2, 2, &[1.0, 5.0, 3.0, 5.0]);
        let test = DMatrix::from_row_slice(1, 2, &[5.0, 7.0]);
        let (train_s, test_s, scaling) = standardize(&train, &test);
        assert_eq!(train_s, DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, 1.0, 0.0]));
        assert_eq!(test_s, DMatrix::from_row_slice(1, 2, &[3.0, 2.0]));
        assert_eq!(scaling.std[1], 1.0);
    }

    #[test]
    fn delete_columns_matches_positional_removal() {
        let m = DMatrix::from_row_slice(2, 4, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let out = delete_columns(&m, &[2, 0, 2, 9]);
        assert_eq!(out, DMatrix::from_row_slice(2, 2, &[1.0, 3.0, 5.0, 7.0]));
    }

    #[test]
    fn expand_features_appends_products() {
        let m = DMatrix::from_row_slice(1, 2, &[2.0, 3.0]);
        let names = vec!["a".to_string(), "b".to_string()];
        let (out, out_names) = expand_features(&m, &names);
        assert_eq!(out_names, ["a", "b", "a*a", "a*b", "b*b"]);
        assert_eq!(out, DMatrix::from_row_slice(1, 5, &[2.0, 3.0, 4.0, 6.0, 9.0]));
    }
}
