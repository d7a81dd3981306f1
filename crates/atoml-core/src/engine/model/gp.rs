use super::ModelError;
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use tracing::{debug, instrument};

/// Squared-exponential kernel and noise settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperparameters {
    pub lengthscale: f64,
    /// Standard deviation of the observation noise.
    pub noise: f64,
    pub signal_variance: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            lengthscale: 1.0,
            noise: 0.1,
            signal_variance: 1.0,
        }
    }
}

const LENGTHSCALE_GRID: [f64; 7] = [0.1, 0.3, 1.0, 3.0, 10.0, 30.0, 100.0];
const NOISE_GRID: [f64; 5] = [1e-3, 1e-2, 0.05, 0.1, 0.3];

/// A Gaussian process regressor with a constant mean equal to the training mean.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    train: DMatrix<f64>,
    target_mean: f64,
    alpha: DVector<f64>,
    cholesky: Cholesky<f64, Dyn>,
    hyperparameters: Hyperparameters,
    log_marginal_likelihood: f64,
}

fn squared_distance(a: &DMatrix<f64>, i: usize, b: &DMatrix<f64>, j: usize) -> f64 {
    a.row(i)
        .iter()
        .zip(b.row(j).iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum()
}

fn kernel(a: &DMatrix<f64>, b: &DMatrix<f64>, hp: &Hyperparameters) -> DMatrix<f64> {
    let scale = 2.0 * hp.lengthscale * hp.lengthscale;
    DMatrix::from_fn(a.nrows(), b.nrows(), |i, j| {
        hp.signal_variance * (-squared_distance(a, i, b, j) / scale).exp()
    })
}

impl GaussianProcess {
    /// Fits the process to `train` rows and their `target` values.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EmptyTrainingSet`] without training rows and
    /// [`ModelError::NotPositiveDefinite`] if the kernel matrix cannot be factorised.
    pub fn fit(
        train: &DMatrix<f64>,
        target: &[f64],
        hyperparameters: Hyperparameters,
    ) -> Result<Self, ModelError> {
        let n = train.nrows();
        if n == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        if target.len() != n {
            return Err(ModelError::DimensionMismatch {
                what: "training targets",
                expected: n,
                found: target.len(),
            });
        }

        let target_mean = target.iter().sum::<f64>() / n as f64;
        let y = DVector::from_iterator(n, target.iter().map(|t| t - target_mean));

        let mut k = kernel(train, train, &hyperparameters);
        for i in 0..n {
            k[(i, i)] += hyperparameters.noise.powi(2);
        }
        let cholesky = Cholesky::new(k).ok_or(ModelError::NotPositiveDefinite)?;
        let alpha = cholesky.solve(&y);

        let log_det: f64 = cholesky.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
        let log_marginal_likelihood = -0.5 * y.dot(&alpha)
            - log_det
            - 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln();

        Ok(Self {
            train: train.clone(),
            target_mean,
            alpha,
            cholesky,
            hyperparameters,
            log_marginal_likelihood,
        })
    }

    /// Fits with the hyperparameters that maximise the log marginal likelihood
    /// over a fixed grid. The signal variance follows the target variance.
    #[instrument(level = "debug", skip_all, fields(rows = train.nrows(), cols = train.ncols()))]
    pub fn fit_optimized(train: &DMatrix<f64>, target: &[f64]) -> Result<Self, ModelError> {
        let signal_variance = target_variance(target);
        let mut best: Option<Self> = None;
        for &lengthscale in &LENGTHSCALE_GRID {
            for &noise in &NOISE_GRID {
                let hp = Hyperparameters {
                    lengthscale,
                    noise: noise * signal_variance.sqrt(),
                    signal_variance,
                };
                let Ok(gp) = Self::fit(train, target, hp) else {
                    continue;
                };
                if !gp.log_marginal_likelihood.is_finite() {
                    continue;
                }
                if best
                    .as_ref()
                    .is_none_or(|b| gp.log_marginal_likelihood > b.log_marginal_likelihood)
                {
                    best = Some(gp);
                }
            }
        }
        let best = match best {
            Some(gp) => gp,
            None => Self::fit(train, target, Hyperparameters::default())?,
        };
        debug!(
            lengthscale = best.hyperparameters.lengthscale,
            noise = best.hyperparameters.noise,
            lml = best.log_marginal_likelihood,
            "Selected hyperparameters."
        );
        Ok(best)
    }

    pub fn hyperparameters(&self) -> Hyperparameters {
        self.hyperparameters
    }

    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_marginal_likelihood
    }

    /// Predictive means and standard deviations (noise included) for each row of `test`.
    pub fn predict(&self, test: &DMatrix<f64>) -> Result<(Vec<f64>, Vec<f64>), ModelError> {
        if test.nrows() == 0 {
            return Ok((Vec::new(), Vec::new()));
        }
        if test.ncols() != self.train.ncols() {
            return Err(ModelError::DimensionMismatch {
                what: "test feature columns",
                expected: self.train.ncols(),
                found: test.ncols(),
            });
        }
        let k_star = kernel(test, &self.train, &self.hyperparameters);
        let mean = &k_star * &self.alpha;
        let v = self
            .cholesky
            .l()
            .solve_lower_triangular(&k_star.transpose())
            .ok_or(ModelError::NotPositiveDefinite)?;

        let noise_var = self.hyperparameters.noise.powi(2);
        let predictions = mean.iter().map(|m| m + self.target_mean).collect();
        let uncertainty = v
            .column_iter()
            .map(|col| {
                let var = self.hyperparameters.signal_variance - col.norm_squared();
                (var.max(0.0) + noise_var).sqrt()
            })
            .collect();
        Ok((predictions, uncertainty))
    }
}

pub(crate) fn target_variance(target: &[f64]) -> f64 {
    if target.is_empty() {
        return 1.0;
    }
    let n = target.len() as f64;
    let mean = target.iter().sum::<f64>() / n;
    let var = target.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
    if var > 1e-12 { var } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> (DMatrix<f64>, Vec<f64>) {
        let xs: Vec<f64> = (0..n).map(|i| i as f64 / (n - 1) as f64 * 4.0 - 2.0).collect();
        let target = xs.iter().map(|x| x.sin()).collect();
        (DMatrix::from_column_slice(n, 1, &xs), target)
    }

    #[test]
    fn interpolates_training_points_with_small_noise() {
        let (x, y) = line(15);
        let hp = Hyperparameters {
            lengthscale: 1.0,
            noise: 1e-3,
            signal_variance: 1.0,
        };
        let gp = GaussianProcess::fit(&x, &y, hp).unwrap();
        let (pred, std) = gp.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(&y) {
            assert!((p - t).abs() < 1e-2);
        }
        assert!(std.iter().all(|s| *s >= 1e-3 - 1e-12 && *s < 0.1));
    }

    #[test]
    fn uncertainty_grows_away_from_data() {
        let (x, y) = line(10);
        let gp = GaussianProcess::fit(&x, &y, Hyperparameters::default()).unwrap();
        let far = DMatrix::from_column_slice(2, 1, &[0.0, 25.0]);
        let (_, std) = gp.predict(&far).unwrap();
        assert!(std[1] > std[0]);
    }

    #[test]
    fn optimisation_does_not_lower_the_likelihood() {
        let (x, y) = line(12);
        let signal_variance = target_variance(&y);
        let baseline = GaussianProcess::fit(
            &x,
            &y,
            Hyperparameters {
                lengthscale: 1.0,
                noise: 0.1 * signal_variance.sqrt(),
                signal_variance,
            },
        )
        .unwrap();
        let tuned = GaussianProcess::fit_optimized(&x, &y).unwrap();
        assert!(tuned.log_marginal_likelihood() >= baseline.log_marginal_likelihood() - 1e-9);
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let result = GaussianProcess::fit(&DMatrix::zeros(0, 2), &[], Hyperparameters::default());
        assert!(matches!(result, Err(ModelError::EmptyTrainingSet)));
    }
}
