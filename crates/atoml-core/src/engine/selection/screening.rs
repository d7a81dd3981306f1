use super::correlation::Correlation;
use super::{Screening, SelectionError};
use nalgebra::{DMatrix, DVector};
use std::collections::BTreeSet;
use tracing::{debug, instrument};

/// Scoring rule used by [`iterative_screening`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreeningMethod {
    /// Sure independence screening (absolute Pearson correlation).
    Sis,
    /// Robust rank correlation screening with the given rank correlation.
    Rrcs(Correlation),
}

impl ScreeningMethod {
    fn correlation(self) -> Correlation {
        match self {
            ScreeningMethod::Sis => Correlation::Pearson,
            ScreeningMethod::Rrcs(corr) => corr,
        }
    }
}

fn check_inputs(target: &[f64], train: &DMatrix<f64>, size: usize) -> Result<(), SelectionError> {
    if target.len() != train.nrows() {
        return Err(SelectionError::DimensionMismatch {
            expected: train.nrows(),
            found: target.len(),
        });
    }
    if size == 0 || size > train.ncols() {
        return Err(SelectionError::InvalidSize {
            size,
            features: train.ncols(),
        });
    }
    Ok(())
}

/// Absolute correlation of every column with `target`.
fn score_columns(target: &[f64], train: &DMatrix<f64>, corr: Correlation) -> Vec<f64> {
    train
        .column_iter()
        .map(|col| {
            let values: Vec<f64> = col.iter().copied().collect();
            let score = corr.coefficient(&values, target).abs();
            if score.is_finite() { score } else { 0.0 }
        })
        .collect()
}

/// Column indices ordered by descending score; ties keep column order.
fn rank_by_score(scores: &[f64], columns: impl IntoIterator<Item = usize>) -> Vec<usize> {
    let mut ranked: Vec<usize> = columns.into_iter().collect();
    ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    ranked
}

fn screen(target: &[f64], train: &DMatrix<f64>, size: usize, corr: Correlation) -> Result<Screening, SelectionError> {
    check_inputs(target, train, size)?;
    let correlation = score_columns(target, train, corr);
    let ranked = rank_by_score(&correlation, 0..train.ncols());
    Ok(Screening::from_accepted(
        ranked[..size].to_vec(),
        train.ncols(),
        correlation,
    ))
}

/// Keeps the `size` columns most correlated with the target (absolute Pearson).
#[instrument(level = "debug", skip_all, fields(size))]
pub fn sure_independence_screening(
    target: &[f64],
    train: &DMatrix<f64>,
    size: usize,
) -> Result<Screening, SelectionError> {
    screen(target, train, size, Correlation::Pearson)
}

/// Keeps the `size` columns with the largest absolute rank correlation to the target.
#[instrument(level = "debug", skip_all, fields(size, corr = %corr))]
pub fn robust_rank_correlation_screening(
    target: &[f64],
    train: &DMatrix<f64>,
    size: usize,
    corr: Correlation,
) -> Result<Screening, SelectionError> {
    screen(target, train, size, corr)
}

/// Least-squares fit of `target` on the given columns plus an intercept.
fn fitted_values(
    target: &DVector<f64>,
    train: &DMatrix<f64>,
    columns: &[usize],
) -> Result<DVector<f64>, SelectionError> {
    let design = DMatrix::from_fn(train.nrows(), columns.len() + 1, |r, c| {
        if c == 0 { 1.0 } else { train[(r, columns[c - 1])] }
    });
    let coefficients = design
        .clone()
        .svd(true, true)
        .solve(target, 1e-12)
        .map_err(|e| SelectionError::Decomposition(e.to_string()))?;
    Ok(design * coefficients)
}

/// Screens `step` columns at a time against the residual of a least-squares fit
/// on the columns picked so far, until `size` columns are picked.
#[instrument(level = "debug", skip_all, fields(size, step))]
pub fn iterative_screening(
    target: &[f64],
    train: &DMatrix<f64>,
    size: usize,
    step: usize,
    method: ScreeningMethod,
) -> Result<Screening, SelectionError> {
    check_inputs(target, train, size)?;
    if step == 0 {
        return Err(SelectionError::InvalidStep);
    }
    let corr = method.correlation();
    let target_vec = DVector::from_column_slice(target);

    let mut accepted: Vec<usize> = Vec::with_capacity(size);
    let mut remaining: BTreeSet<usize> = (0..train.ncols()).collect();
    let mut correlation = vec![0.0; train.ncols()];
    let mut residual = target_vec.clone();

    while accepted.len() < size {
        let scores = score_columns(residual.as_slice(), train, corr);
        for &c in &remaining {
            correlation[c] = scores[c];
        }
        let take = step.min(size - accepted.len());
        let picked: Vec<usize> = rank_by_score(&scores, remaining.iter().copied())
            .into_iter()
            .take(take)
            .collect();
        for c in &picked {
            remaining.remove(c);
        }
        accepted.extend(picked);

        residual = &target_vec - fitted_values(&target_vec, train, &accepted)?;
        debug!(picked = accepted.len(), residual_norm = residual.norm(), "Screening round done.");
    }

    Ok(Screening::from_accepted(accepted, train.ncols(), correlation))
}
