use super::prepare::load_and_split;
use crate::engine::config::ScreeningConfig;
use crate::engine::error::EngineError;
use crate::engine::fingerprint::{FeatureMatrix, FingerprintPipeline};
use crate::engine::progress::{Progress, ProgressReporter, Stage};
use crate::engine::selection::{
    Correlation, Screening, ScreeningMethod, iterative_screening, pca,
    robust_rank_correlation_screening, sure_independence_screening,
};
use nalgebra::DMatrix;
use tracing::{info, instrument};

/// Reduced widths produced by one screening routine.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodOutcome {
    pub method: String,
    pub train_width: usize,
    pub test_width: usize,
    /// Names of the kept features; empty for projections.
    pub kept_features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningReport {
    pub pool_size: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub feature_names: Vec<String>,
    pub outcomes: Vec<MethodOutcome>,
    pub explained_variance_ratio: Vec<f64>,
}

const SCREENING_ROUTINES: u64 = 7;

fn outcome(
    method: impl Into<String>,
    screening: &Screening,
    names: &[String],
    train: &DMatrix<f64>,
    test: &DMatrix<f64>,
) -> MethodOutcome {
    MethodOutcome {
        method: method.into(),
        train_width: screening.reduce(train).ncols(),
        test_width: screening.reduce(test).ncols(),
        kept_features: screening.kept_names(names),
    }
}

#[instrument(skip_all, name = "screening_workflow")]
pub fn run(
    config: &ScreeningConfig,
    reporter: &ProgressReporter,
) -> Result<ScreeningReport, EngineError> {
    let mut prepared = load_and_split(
        &config.database_path,
        &config.split,
        config.fingerprint.atom_numbers.as_deref(),
        reporter,
    )?;
    if config.clear_cache {
        prepared.split.test.clear_caches();
        prepared.split.train.clear_caches();
    }

    let pipeline = FingerprintPipeline::from_config(&config.fingerprint, &prepared.atom_numbers);
    let (train_fp, test_fp) = reporter.stage(Stage::Fingerprint, || {
        let train_fp = pipeline.compute(&prepared.split.train.candidates, reporter)?;
        let test_fp = pipeline.compute(&prepared.split.test.candidates, reporter)?;
        Ok::<(FeatureMatrix, FeatureMatrix), EngineError>((train_fp, test_fp))
    })?;

    let names = train_fp.names().to_vec();
    let train = train_fp.values();
    let test = if test_fp.nrows() == 0 {
        DMatrix::zeros(0, train.ncols())
    } else {
        test_fp.values().clone()
    };
    let target = &prepared.split.train.target;
    let (size, step) = (config.size, config.step);

    let (outcomes, explained_variance_ratio) = reporter.stage(Stage::Screening, || {
        reporter.report(Progress::TaskStart {
            total_steps: SCREENING_ROUTINES,
        });
        let mut outcomes = Vec::new();
        let mut record = |method: String, screening: Screening| {
            info!(method = %method, accepted = ?screening.accepted, "Screening done.");
            outcomes.push(outcome(method, &screening, &names, train, &test));
            reporter.report(Progress::TaskIncrement);
        };

        record("sis".into(), sure_independence_screening(target, train, size)?);
        for corr in [Correlation::Kendall, Correlation::Spearman] {
            record(
                format!("rrcs-{corr}"),
                robust_rank_correlation_screening(target, train, size, corr)?,
            );
        }
        for method in [
            ScreeningMethod::Sis,
            ScreeningMethod::Rrcs(Correlation::Kendall),
            ScreeningMethod::Rrcs(Correlation::Spearman),
        ] {
            let label = match method {
                ScreeningMethod::Sis => "iterative-sis".to_string(),
                ScreeningMethod::Rrcs(corr) => format!("iterative-rrcs-{corr}"),
            };
            record(label, iterative_screening(target, train, size, step, method)?);
        }

        let projection = pca(config.components, train, &test)?;
        outcomes.push(MethodOutcome {
            method: "pca".into(),
            train_width: projection.train.ncols(),
            test_width: projection.test.ncols(),
            kept_features: Vec::new(),
        });
        reporter.report(Progress::TaskIncrement);
        reporter.report(Progress::TaskFinish);
        Ok::<_, EngineError>((outcomes, projection.explained_variance_ratio))
    })?;

    Ok(ScreeningReport {
        pool_size: prepared.pool_size,
        train_size: prepared.split.train.len(),
        test_size: prepared.split.test.len(),
        feature_names: names,
        outcomes,
        explained_variance_ratio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::config::ScreeningConfigBuilder;
    use crate::engine::selection::SelectionError;
    use crate::workflows::prepare::fixtures::write_ga_db;
    use tempfile::tempdir;

    fn config(dir: &std::path::Path, size: usize) -> ScreeningConfig {
        ScreeningConfigBuilder::new()
            .database_path(dir.join("gadb.db"))
            .test_size(5)
            .train_size(10)
            .seed(Some(3))
            .size(size)
            .build()
            .unwrap()
    }

    #[test]
    fn every_routine_reduces_to_requested_width() {
        let dir = tempdir().unwrap();
        write_ga_db(&dir.path().join("gadb.db"), 20);

        let report = run(&config(dir.path(), 4), &ProgressReporter::new()).unwrap();
        assert_eq!(report.test_size, 5);
        assert_eq!(report.train_size, 10);
        // nearestneighbour (4) + mass (1) + composition (2)
        assert_eq!(report.feature_names.len(), 7);
        assert_eq!(report.outcomes.len(), SCREENING_ROUTINES as usize);
        for outcome in &report.outcomes {
            assert_eq!(outcome.train_width, 4, "{}", outcome.method);
            assert_eq!(outcome.test_width, 4, "{}", outcome.method);
        }
        assert_eq!(report.explained_variance_ratio.len(), 4);
    }

    #[test]
    fn oversized_request_is_rejected() {
        let dir = tempdir().unwrap();
        write_ga_db(&dir.path().join("gadb.db"), 20);
        let result = run(&config(dir.path(), 8), &ProgressReporter::new());
        assert!(matches!(
            result,
            Err(EngineError::Selection {
                source: SelectionError::InvalidSize { size: 8, features: 7 }
            })
        ));
    }
}
