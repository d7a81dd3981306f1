//! Feature screening: ranking fingerprint columns against the target and
//! reducing matrices to the selected columns.

pub mod correlation;
pub mod pca;
pub mod screening;

pub use correlation::{Correlation, UnknownCorrelation};
pub use pca::{PcaProjection, pca};
pub use screening::{
    ScreeningMethod, iterative_screening, robust_rank_correlation_screening,
    sure_independence_screening,
};

use super::preprocess::delete_columns;
use nalgebra::DMatrix;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SelectionError {
    #[error("Cannot keep {size} features out of {features}")]
    InvalidSize { size: usize, features: usize },
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("Iterative screening step must be positive")]
    InvalidStep,
    #[error("Requested {requested} principal components but only {available} are available")]
    TooManyComponents { requested: usize, available: usize },
    #[error("Matrix decomposition failed: {0}")]
    Decomposition(String),
}

/// Outcome of a screening routine.
#[derive(Debug, Clone, PartialEq)]
pub struct Screening {
    /// Kept column indices, best first.
    pub accepted: Vec<usize>,
    /// Dropped column indices, ascending.
    pub rejected: Vec<usize>,
    /// Absolute correlation score of every column, in column order.
    pub correlation: Vec<f64>,
}

impl Screening {
    pub(crate) fn from_accepted(accepted: Vec<usize>, features: usize, correlation: Vec<f64>) -> Self {
        let rejected = (0..features).filter(|c| !accepted.contains(c)).collect();
        Self {
            accepted,
            rejected,
            correlation,
        }
    }

    /// Drops the rejected columns from `matrix`.
    pub fn reduce(&self, matrix: &DMatrix<f64>) -> DMatrix<f64> {
        delete_columns(matrix, &self.rejected)
    }

    /// Names of the accepted columns, in column order.
    pub fn kept_names(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.rejected.contains(i))
            .map(|(_, n)| n.clone())
            .collect()
    }
}
