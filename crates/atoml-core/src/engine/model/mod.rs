//! Regression model fitted on fingerprint matrices.

pub mod gp;
pub mod metrics;

pub use gp::{GaussianProcess, Hyperparameters};

use super::config::{ModelConfig, StoreConfig};
use super::error::EngineError;
use super::fingerprint::FingerprintPipeline;
use super::preprocess::{expand_features, standardize};
use super::progress::{ProgressReporter, Stage};
use super::selection::{SelectionError, sure_independence_screening};
use super::split::Dataset;
use crate::core::io::descriptor_db::{DescriptorDatabase, DescriptorDbError};
use nalgebra::DMatrix;
use std::path::Path;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ModelError {
    #[error("The training set is empty")]
    EmptyTrainingSet,
    #[error("Dimension mismatch in {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Kernel matrix is not positive definite")]
    NotPositiveDefinite,
    #[error("Feature reduction failed: {0}")]
    Selection(#[from] SelectionError),
}

/// Everything needed to fit and evaluate a model.
#[derive(Debug, Clone, Copy)]
pub struct ModelInput<'a> {
    pub train_matrix: &'a DMatrix<f64>,
    pub feature_names: &'a [String],
    pub train_id: &'a [String],
    pub train_target: &'a [f64],
    pub test_matrix: &'a DMatrix<f64>,
    pub test_id: &'a [String],
    pub test_target: &'a [f64],
}

fn expect_len(what: &'static str, expected: usize, found: usize) -> Result<(), ModelError> {
    if expected == found {
        Ok(())
    } else {
        Err(ModelError::DimensionMismatch {
            what,
            expected,
            found,
        })
    }
}

impl ModelInput<'_> {
    fn validate(&self) -> Result<(), ModelError> {
        let (train_rows, cols) = self.train_matrix.shape();
        if train_rows == 0 {
            return Err(ModelError::EmptyTrainingSet);
        }
        expect_len("training ids", train_rows, self.train_id.len())?;
        expect_len("training targets", train_rows, self.train_target.len())?;
        expect_len("feature names", cols, self.feature_names.len())?;
        let test_rows = self.test_matrix.nrows();
        expect_len("test ids", test_rows, self.test_id.len())?;
        expect_len("test targets", test_rows, self.test_target.len())?;
        if test_rows > 0 {
            expect_len("test feature columns", cols, self.test_matrix.ncols())?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub unique_id: String,
    pub target: f64,
    pub predicted: f64,
    pub uncertainty: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelReport {
    /// Features the model was finally fitted on.
    pub feature_names: Vec<String>,
    pub hyperparameters: Hyperparameters,
    pub log_marginal_likelihood: f64,
    pub train_size: usize,
    pub test_size: usize,
    pub rmse: Option<f64>,
    pub mae: Option<f64>,
    pub predictions: Vec<Prediction>,
}

/// Fits a Gaussian process to fingerprint data and evaluates it on a test set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelBuilder {
    /// Append pairwise feature products before fitting.
    pub expand: bool,
    /// Grid-search the kernel hyperparameters.
    pub optimize: bool,
    /// Keep only this many features, chosen by sure independence screening.
    pub size: Option<usize>,
}

impl From<ModelConfig> for ModelBuilder {
    fn from(config: ModelConfig) -> Self {
        Self {
            expand: config.expand,
            optimize: config.optimize,
            size: config.size,
        }
    }
}

impl ModelBuilder {
    pub fn new(expand: bool, optimize: bool, size: Option<usize>) -> Self {
        Self {
            expand,
            optimize,
            size,
        }
    }

    #[instrument(level = "info", skip_all, fields(train = input.train_matrix.nrows(), test = input.test_matrix.nrows()))]
    pub fn build_model(&self, input: ModelInput<'_>) -> Result<ModelReport, ModelError> {
        input.validate()?;

        let test_matrix = if input.test_matrix.nrows() == 0 {
            DMatrix::zeros(0, input.train_matrix.ncols())
        } else {
            input.test_matrix.clone()
        };
        let (mut train, mut test, _) = standardize(input.train_matrix, &test_matrix);
        let mut names = input.feature_names.to_vec();

        if self.expand {
            let (expanded_train, expanded_names) = expand_features(&train, &names);
            let (expanded_test, _) = expand_features(&test, &names);
            train = expanded_train;
            test = expanded_test;
            names = expanded_names;
        }

        if let Some(size) = self.size.filter(|&s| s < train.ncols()) {
            let screening = sure_independence_screening(input.train_target, &train, size)?;
            train = screening.reduce(&train);
            test = screening.reduce(&test);
            names = screening.kept_names(&names);
        }

        let gp = if self.optimize {
            GaussianProcess::fit_optimized(&train, input.train_target)?
        } else {
            let signal_variance = gp::target_variance(input.train_target);
            GaussianProcess::fit(
                &train,
                input.train_target,
                Hyperparameters {
                    noise: 0.1 * signal_variance.sqrt(),
                    signal_variance,
                    ..Hyperparameters::default()
                },
            )?
        };

        let (predicted, uncertainty) = gp.predict(&test)?;
        let rmse = metrics::rmse(&predicted, input.test_target);
        let mae = metrics::mae(&predicted, input.test_target);
        info!(
            features = names.len(),
            rmse = ?rmse,
            mae = ?mae,
            "Model fitted."
        );

        let predictions = input
            .test_id
            .iter()
            .zip(input.test_target)
            .zip(predicted.into_iter().zip(uncertainty))
            .map(|((id, &target), (predicted, uncertainty))| Prediction {
                unique_id: id.clone(),
                target,
                predicted,
                uncertainty,
            })
            .collect();

        Ok(ModelReport {
            feature_names: names,
            hyperparameters: gp.hyperparameters(),
            log_marginal_likelihood: gp.log_marginal_likelihood(),
            train_size: input.train_matrix.nrows(),
            test_size: input.test_matrix.nrows(),
            rmse,
            mae,
            predictions,
        })
    }

    /// Fingerprints both datasets, optionally writes them to the descriptor
    /// stores, and fits the model.
    pub fn from_candidates(
        &self,
        train: &Dataset,
        test: &Dataset,
        pipeline: &FingerprintPipeline,
        stores: Option<&StoreConfig>,
        reporter: &ProgressReporter,
    ) -> Result<ModelReport, EngineError> {
        let (train_fp, test_fp) = reporter.stage(Stage::Fingerprint, || {
            let train_fp = pipeline.compute(&train.candidates, reporter)?;
            let test_fp = pipeline.compute(&test.candidates, reporter)?;
            Ok::<_, EngineError>((train_fp, test_fp))
        })?;
        let train_id = train.unique_ids();
        let test_id = test.unique_ids();
        let names = if train_fp.ncols() > 0 {
            train_fp.names().to_vec()
        } else {
            test_fp.names().to_vec()
        };

        if let Some(stores) = stores {
            reporter.stage(Stage::Storage, || {
                write_descriptor_store(
                    &stores.train_store,
                    &stores.table,
                    &names,
                    &train_id,
                    train_fp.values(),
                    &train.target,
                )?;
                write_descriptor_store(
                    &stores.test_store,
                    &stores.table,
                    &names,
                    &test_id,
                    test_fp.values(),
                    &test.target,
                )
            })?;
        }

        let test_matrix = if test_fp.nrows() == 0 {
            DMatrix::zeros(0, names.len())
        } else {
            test_fp.values().clone()
        };
        let report = reporter.stage(Stage::ModelFit, || {
            self.build_model(ModelInput {
                train_matrix: train_fp.values(),
                feature_names: &names,
                train_id: &train_id,
                train_target: &train.target,
                test_matrix: &test_matrix,
                test_id: &test_id,
                test_target: &test.target,
            })
        })?;
        Ok(report)
    }
}

/// Creates a descriptor store and fills it with one row per sample.
pub fn write_descriptor_store(
    path: &Path,
    table: &str,
    feature_names: &[String],
    ids: &[String],
    matrix: &DMatrix<f64>,
    targets: &[f64],
) -> Result<(), DescriptorDbError> {
    let mut store = DescriptorDatabase::create(path, table, feature_names)?;
    if ids.is_empty() {
        return Ok(());
    }
    let rows = store.insert_rows(ids, matrix, targets)?;
    info!(rows, path = %path.display(), "Descriptor store written.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atoms::Atoms;
    use crate::core::models::candidate::Candidate;
    use crate::engine::config::FingerprintConfig;
    use crate::engine::fingerprint::FeatureKind;
    use nalgebra::Point3;

    fn synthetic(rows: usize, offset: f64) -> (DMatrix<f64>, Vec<f64>, Vec<String>) {
        let m = DMatrix::from_fn(rows, 2, |r, c| {
            let x = r as f64 / rows as f64 + offset;
            if c == 0 { x } else { (3.0 * x).cos() }
        });
        let y = (0..rows).map(|r| 2.0 * m[(r, 0)] - m[(r, 1)]).collect();
        let ids = (0..rows).map(|r| format!("s{}", r)).collect();
        (m, y, ids)
    }

    fn names() -> Vec<String> {
        vec!["f_0".into(), "f_1".into()]
    }

    #[test]
    fn build_model_predicts_smooth_target() {
        let (train, train_y, train_id) = synthetic(30, 0.0);
        let (test, test_y, test_id) = synthetic(7, 0.013);
        let names = names();
        let report = ModelBuilder::new(false, true, None)
            .build_model(ModelInput {
                train_matrix: &train,
                feature_names: &names,
                train_id: &train_id,
                train_target: &train_y,
                test_matrix: &test,
                test_id: &test_id,
                test_target: &test_y,
            })
            .unwrap();
        assert_eq!(report.predictions.len(), 7);
        assert!(report.rmse.unwrap() < 0.1);
        assert!(report.mae.unwrap() <= report.rmse.unwrap() + 1e-12);
    }

    #[test]
    fn expansion_and_size_control_feature_names() {
        let (train, train_y, train_id) = synthetic(12, 0.0);
        let (test, test_y, test_id) = synthetic(3, 0.05);
        let names = names();
        let input = ModelInput {
            train_matrix: &train,
            feature_names: &names,
            train_id: &train_id,
            train_target: &train_y,
            test_matrix: &test,
            test_id: &test_id,
            test_target: &test_y,
        };

        let expanded = ModelBuilder::new(true, false, None).build_model(input).unwrap();
        assert_eq!(expanded.feature_names, ["f_0", "f_1", "f_0*f_0", "f_0*f_1", "f_1*f_1"]);

        let reduced = ModelBuilder::new(true, false, Some(2)).build_model(input).unwrap();
        assert_eq!(reduced.feature_names.len(), 2);
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let (train, train_y, train_id) = synthetic(5, 0.0);
        let names = names();
        let empty = DMatrix::zeros(0, 2);
        let result = ModelBuilder::default().build_model(ModelInput {
            train_matrix: &train,
            feature_names: &names,
            train_id: &train_id[..4],
            train_target: &train_y,
            test_matrix: &empty,
            test_id: &[],
            test_target: &[],
        });
        assert_eq!(
            result.unwrap_err(),
            ModelError::DimensionMismatch {
                what: "training ids",
                expected: 5,
                found: 4
            }
        );

        let result = ModelBuilder::default().build_model(ModelInput {
            train_matrix: &empty,
            feature_names: &names,
            train_id: &[],
            train_target: &[],
            test_matrix: &empty,
            test_id: &[],
            test_target: &[],
        });
        assert_eq!(result.unwrap_err(), ModelError::EmptyTrainingSet);
    }

    fn cluster(uid: &str, n_pt: usize, n_au: usize) -> Candidate {
        let numbers: Vec<u8> = std::iter::repeat_n(78, n_pt)
            .chain(std::iter::repeat_n(79, n_au))
            .collect();
        let positions = (0..numbers.len())
            .map(|i| Point3::new(2.7 * i as f64, 0.0, 0.0))
            .collect();
        let score = -(n_pt as f64) * 1.2 - n_au as f64;
        Candidate::new(uid, Atoms::new(numbers, positions).unwrap()).with_value("raw_score", score)
    }

    fn dataset(candidates: Vec<Candidate>) -> Dataset {
        Dataset {
            target: candidates.iter().map(|c| c.target("raw_score").unwrap()).collect(),
            indices: (0..candidates.len()).collect(),
            candidates,
            ..Dataset::default()
        }
    }

    #[test]
    fn from_candidates_writes_both_descriptor_stores() {
        let dir = tempfile::tempdir().unwrap();
        let stores = StoreConfig {
            train_store: dir.path().join("train.sqlite"),
            test_store: dir.path().join("test.sqlite"),
            ..StoreConfig::default()
        };
        let train = dataset((0..6).map(|i| cluster(&format!("t{}", i), 6 - i, i)).collect());
        let test = dataset(vec![cluster("q", 3, 3)]);
        let config = FingerprintConfig {
            features: vec![FeatureKind::Composition, FeatureKind::Mass],
            ..FingerprintConfig::default()
        };
        let pipeline = FingerprintPipeline::from_config(&config, &[78, 79]);

        let report = ModelBuilder::new(false, false, None)
            .from_candidates(&train, &test, &pipeline, Some(&stores), &ProgressReporter::new())
            .unwrap();
        assert_eq!(report.train_size, 6);
        assert_eq!(report.predictions[0].unique_id, "q");

        let stored = DescriptorDatabase::open(&stores.train_store, &stores.table).unwrap();
        assert_eq!(
            stored.feature_names().unwrap(),
            ["composition_0", "composition_1", "mass_0"]
        );
        assert_eq!(stored.query_text("uuid").unwrap(), train.unique_ids());
        assert_eq!(stored.query_targets().unwrap(), train.target);
        let stored_test = DescriptorDatabase::open(&stores.test_store, &stores.table).unwrap();
        assert_eq!(stored_test.len().unwrap(), 1);
    }
}
