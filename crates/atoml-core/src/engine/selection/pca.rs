use super::SelectionError;
use nalgebra::DMatrix;
use tracing::instrument;

/// Train and test data projected onto the leading principal components.
#[derive(Debug, Clone, PartialEq)]
pub struct PcaProjection {
    pub train: DMatrix<f64>,
    pub test: DMatrix<f64>,
    /// Variance captured by each kept component, largest first.
    pub explained_variance: Vec<f64>,
    /// Fraction of the total training variance captured by each kept component.
    pub explained_variance_ratio: Vec<f64>,
}

/// Projects both sets onto the `components` leading right singular vectors of the
/// mean-centred training matrix.
#[instrument(level = "debug", skip(train, test))]
pub fn pca(
    components: usize,
    train: &DMatrix<f64>,
    test: &DMatrix<f64>,
) -> Result<PcaProjection, SelectionError> {
    if test.ncols() != train.ncols() {
        return Err(SelectionError::DimensionMismatch {
            expected: train.ncols(),
            found: test.ncols(),
        });
    }
    if components == 0 {
        return Err(SelectionError::InvalidSize {
            size: 0,
            features: train.ncols(),
        });
    }
    let available = train.nrows().min(train.ncols());
    if components > available {
        return Err(SelectionError::TooManyComponents {
            requested: components,
            available,
        });
    }

    let mean = train.row_mean();
    let center = |m: &DMatrix<f64>| {
        let mut out = m.clone();
        for mut row in out.row_iter_mut() {
            row -= &mean;
        }
        out
    };
    let centered_train = center(train);
    let centered_test = center(test);

    let svd = centered_train.clone().svd(false, true);
    let v_t = svd
        .v_t
        .ok_or_else(|| SelectionError::Decomposition("right singular vectors missing".into()))?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));
    let kept = &order[..components];

    let basis = DMatrix::from_fn(train.ncols(), components, |r, c| v_t[(kept[c], r)]);
    let dof = (train.nrows().saturating_sub(1)).max(1) as f64;
    let variance = |i: usize| svd.singular_values[i].powi(2) / dof;
    let total: f64 = (0..svd.singular_values.len()).map(variance).sum();
    let explained_variance: Vec<f64> = kept.iter().map(|&i| variance(i)).collect();
    let explained_variance_ratio = explained_variance
        .iter()
        .map(|v| if total > 0.0 { v / total } else { 0.0 })
        .collect();

    Ok(PcaProjection {
        train: centered_train * &basis,
        test: centered_test * &basis,
        explained_variance,
        explained_variance_ratio,
    })
}
