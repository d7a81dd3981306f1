use super::prepare::load_and_split;
use crate::core::io::descriptor_db::{DescriptorDatabase, ID_COLUMN};
use crate::engine::config::{PipelineConfig, StoreConfig};
use crate::engine::error::EngineError;
use crate::engine::fingerprint::FingerprintPipeline;
use crate::engine::model::{ModelBuilder, ModelInput, ModelReport};
use crate::engine::progress::{Progress, ProgressReporter, Stage};
use std::path::PathBuf;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildModelReport {
    /// Number of relaxed candidates loaded, when the stores were built.
    pub pool_size: Option<usize>,
    /// Model fitted while building the stores.
    pub built: Option<ModelReport>,
    /// Model re-fitted from the stores alone.
    pub tested: Option<ModelReport>,
    /// Stores that were deleted during cleanup.
    pub removed_stores: Vec<PathBuf>,
}

#[instrument(skip_all, name = "build_model_workflow")]
pub fn run(
    config: &PipelineConfig,
    reporter: &ProgressReporter,
) -> Result<BuildModelReport, EngineError> {
    let builder = ModelBuilder::from(config.model);
    let mut report = BuildModelReport::default();

    if config.stages.build_db {
        let prepared = load_and_split(
            &config.database_path,
            &config.split,
            config.fingerprint.atom_numbers.as_deref(),
            reporter,
        )?;
        let pipeline = FingerprintPipeline::from_config(&config.fingerprint, &prepared.atom_numbers);
        info!(
            elements = ?prepared.atom_numbers,
            functions = ?pipeline.function_names(),
            "Fingerprinting candidates."
        );
        let built = builder.from_candidates(
            &prepared.split.train,
            &prepared.split.test,
            &pipeline,
            Some(&config.stores),
            reporter,
        )?;
        report.pool_size = Some(prepared.pool_size);
        report.built = Some(built);
    }

    if config.stages.test_model {
        report.tested = Some(test_model(&builder, &config.stores, reporter)?);
    }

    if config.stages.cleanup {
        report.removed_stores = cleanup(&config.stores, reporter)?;
    }

    Ok(report)
}

struct StoredSet {
    matrix: nalgebra::DMatrix<f64>,
    ids: Vec<String>,
    target: Vec<f64>,
}

fn read_store(store: &DescriptorDatabase, names: &[String]) -> Result<StoredSet, EngineError> {
    Ok(StoredSet {
        matrix: store.query_db(names)?,
        ids: store.query_text(ID_COLUMN)?,
        target: store.query_targets()?,
    })
}

/// Re-fits the model from the train and test descriptor stores.
///
/// Feature names are the train store's columns without the leading `uuid`
/// and trailing `target` columns.
#[instrument(skip_all, name = "test_model")]
pub fn test_model(
    builder: &ModelBuilder,
    stores: &StoreConfig,
    reporter: &ProgressReporter,
) -> Result<ModelReport, EngineError> {
    let train_store = DescriptorDatabase::open(&stores.train_store, &stores.table)?;
    let test_store = DescriptorDatabase::open(&stores.test_store, &stores.table)?;

    let columns = train_store.get_column_names()?;
    let feature_names: Vec<String> = match columns.len() {
        0..=2 => Vec::new(),
        n => columns[1..n - 1].to_vec(),
    };
    let train = read_store(&train_store, &feature_names)?;
    let test = read_store(&test_store, &feature_names)?;
    info!(
        features = feature_names.len(),
        train = train.ids.len(),
        test = test.ids.len(),
        "Loaded descriptor stores."
    );

    let report = reporter.stage(Stage::ModelFit, || {
        builder.build_model(ModelInput {
            train_matrix: &train.matrix,
            feature_names: &feature_names,
            train_id: &train.ids,
            train_target: &train.target,
            test_matrix: &test.matrix,
            test_id: &test.ids,
            test_target: &test.target,
        })
    })?;
    Ok(report)
}

/// Deletes both descriptor stores.
///
/// Missing files are skipped with a warning. Both deletions are always
/// attempted; the first other I/O error is returned afterwards.
pub fn cleanup(
    stores: &StoreConfig,
    reporter: &ProgressReporter,
) -> Result<Vec<PathBuf>, EngineError> {
    reporter.stage(Stage::Cleanup, || {
        let mut removed = Vec::new();
        let mut first_error = None;
        for path in [&stores.train_store, &stores.test_store] {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    reporter.report(Progress::Message(format!("Removed {}", path.display())));
                    removed.push(path.clone());
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    warn!(path = %path.display(), "Descriptor store not found; nothing to remove.");
                }
                Err(source) => {
                    warn!(path = %path.display(), error = %source, "Failed to remove descriptor store.");
                    if first_error.is_none() {
                        first_error = Some(EngineError::Cleanup {
                            path: path.display().to_string(),
                            source,
                        });
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(removed),
        }
    })
}
