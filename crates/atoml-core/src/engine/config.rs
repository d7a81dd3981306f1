use super::fingerprint::FeatureKind;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{parameter}': {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
}

pub const DEFAULT_KEY: &str = "raw_score";
pub const DEFAULT_TABLE: &str = "OriginalFeatureSpace";
pub const DEFAULT_TRAIN_STORE: &str = "train_fpv_store.sqlite";
pub const DEFAULT_TEST_STORE: &str = "test_fpv_store.sqlite";

#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    pub key: String,
    pub test_size: usize,
    pub train_size: usize,
    pub seed: Option<u64>,
    pub use_extinct: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintConfig {
    /// Element ordering for per-element features; `None` uses the pool's elements.
    pub atom_numbers: Option<Vec<u8>>,
    pub max_bonds: usize,
    pub get_nl: bool,
    /// Bond tolerance added to the covalent radius sum, in Å.
    pub dx: f64,
    pub cell_size: f64,
    pub nbin: usize,
    pub features: Vec<FeatureKind>,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            atom_numbers: None,
            max_bonds: 13,
            get_nl: false,
            dx: 0.2,
            cell_size: 50.0,
            nbin: 4,
            features: vec![
                FeatureKind::NearestNeighbour,
                FeatureKind::Mass,
                FeatureKind::Composition,
            ],
        }
    }
}

impl FingerprintConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.features.is_empty() {
            return Err(ConfigError::InvalidValue {
                parameter: "features",
                reason: "at least one feature function is required".into(),
            });
        }
        if let Some(kind) = self
            .features
            .iter()
            .enumerate()
            .find_map(|(i, kind)| self.features[..i].contains(kind).then_some(kind))
        {
            return Err(ConfigError::InvalidValue {
                parameter: "features",
                reason: format!("'{kind}' is listed more than once"),
            });
        }
        if self.nbin == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "nbin",
                reason: "must be positive".into(),
            });
        }
        if !(self.dx.is_finite() && self.dx >= 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "dx",
                reason: format!("must be a non-negative number, got {}", self.dx),
            });
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(ConfigError::InvalidValue {
                parameter: "cell_size",
                reason: format!("must be a positive number, got {}", self.cell_size),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    pub expand: bool,
    pub optimize: bool,
    pub size: Option<usize>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            expand: true,
            optimize: true,
            size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub train_store: PathBuf,
    pub test_store: PathBuf,
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            train_store: PathBuf::from(DEFAULT_TRAIN_STORE),
            test_store: PathBuf::from(DEFAULT_TEST_STORE),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

/// Which phases of the model-building pipeline run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStages {
    pub build_db: bool,
    pub test_model: bool,
    pub cleanup: bool,
}

impl Default for RunStages {
    fn default() -> Self {
        Self {
            build_db: true,
            test_model: false,
            cleanup: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub database_path: PathBuf,
    pub split: SplitConfig,
    pub fingerprint: FingerprintConfig,
    pub model: ModelConfig,
    pub stores: StoreConfig,
    pub stages: RunStages,
}

#[derive(Default)]
pub struct PipelineConfigBuilder {
    database_path: Option<PathBuf>,
    key: Option<String>,
    test_size: Option<usize>,
    train_size: Option<usize>,
    seed: Option<u64>,
    use_extinct: Option<bool>,
    fingerprint: Option<FingerprintConfig>,
    model: Option<ModelConfig>,
    stores: Option<StoreConfig>,
    stages: Option<RunStages>,
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.database_path = Some(path);
        self
    }
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
    pub fn test_size(mut self, n: usize) -> Self {
        self.test_size = Some(n);
        self
    }
    pub fn train_size(mut self, n: usize) -> Self {
        self.train_size = Some(n);
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
    pub fn use_extinct(mut self, use_extinct: bool) -> Self {
        self.use_extinct = Some(use_extinct);
        self
    }
    pub fn fingerprint(mut self, fingerprint: FingerprintConfig) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }
    pub fn model(mut self, model: ModelConfig) -> Self {
        self.model = Some(model);
        self
    }
    pub fn stores(mut self, stores: StoreConfig) -> Self {
        self.stores = Some(stores);
        self
    }
    pub fn stages(mut self, stages: RunStages) -> Self {
        self.stages = Some(stages);
        self
    }

    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let split = SplitConfig {
            key: self.key.unwrap_or_else(|| DEFAULT_KEY.to_string()),
            test_size: self
                .test_size
                .ok_or(ConfigError::MissingParameter("test_size"))?,
            train_size: self
                .train_size
                .ok_or(ConfigError::MissingParameter("train_size"))?,
            seed: self.seed,
            use_extinct: self.use_extinct.unwrap_or(false),
        };
        let fingerprint = self.fingerprint.unwrap_or_default();
        fingerprint.validate()?;
        if let Some(0) = self.model.and_then(|m| m.size) {
            return Err(ConfigError::InvalidValue {
                parameter: "size",
                reason: "must be positive when given".into(),
            });
        }

        Ok(PipelineConfig {
            database_path: self
                .database_path
                .ok_or(ConfigError::MissingParameter("database_path"))?,
            split,
            fingerprint,
            model: self.model.unwrap_or_default(),
            stores: self.stores.unwrap_or_default(),
            stages: self.stages.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningConfig {
    pub database_path: PathBuf,
    pub split: SplitConfig,
    pub fingerprint: FingerprintConfig,
    /// Number of features each screening routine keeps.
    pub size: usize,
    /// Features picked per round of iterative screening.
    pub step: usize,
    pub components: usize,
    pub clear_cache: bool,
}

#[derive(Default)]
pub struct ScreeningConfigBuilder {
    database_path: Option<PathBuf>,
    key: Option<String>,
    test_size: Option<usize>,
    train_size: Option<usize>,
    seed: Option<u64>,
    use_extinct: Option<bool>,
    fingerprint: Option<FingerprintConfig>,
    size: Option<usize>,
    step: Option<usize>,
    components: Option<usize>,
    clear_cache: Option<bool>,
}

impl ScreeningConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.database_path = Some(path);
        self
    }
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
    pub fn test_size(mut self, n: usize) -> Self {
        self.test_size = Some(n);
        self
    }
    pub fn train_size(mut self, n: usize) -> Self {
        self.train_size = Some(n);
        self
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
    pub fn use_extinct(mut self, use_extinct: bool) -> Self {
        self.use_extinct = Some(use_extinct);
        self
    }
    pub fn fingerprint(mut self, fingerprint: FingerprintConfig) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }
    pub fn size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }
    pub fn step(mut self, step: usize) -> Self {
        self.step = Some(step);
        self
    }
    pub fn components(mut self, components: usize) -> Self {
        self.components = Some(components);
        self
    }
    pub fn clear_cache(mut self, clear: bool) -> Self {
        self.clear_cache = Some(clear);
        self
    }

    pub fn build(self) -> Result<ScreeningConfig, ConfigError> {
        let size = self.size.ok_or(ConfigError::MissingParameter("size"))?;
        let step = self.step.unwrap_or(1);
        if size == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "size",
                reason: "must be positive".into(),
            });
        }
        if step == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "step",
                reason: "must be positive".into(),
            });
        }
        let fingerprint = self.fingerprint.unwrap_or_default();
        fingerprint.validate()?;

        Ok(ScreeningConfig {
            database_path: self
                .database_path
                .ok_or(ConfigError::MissingParameter("database_path"))?,
            split: SplitConfig {
                key: self.key.unwrap_or_else(|| DEFAULT_KEY.to_string()),
                test_size: self
                    .test_size
                    .ok_or(ConfigError::MissingParameter("test_size"))?,
                train_size: self
                    .train_size
                    .ok_or(ConfigError::MissingParameter("train_size"))?,
                seed: self.seed,
                use_extinct: self.use_extinct.unwrap_or(false),
            },
            fingerprint,
            size,
            step,
            components: self.components.unwrap_or(size),
            clear_cache: self.clear_cache.unwrap_or(true),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
            .database_path(PathBuf::from("gadb.db"))
            .test_size(50)
            .train_size(50)
    }

    #[test]
    fn pipeline_builder_applies_script_defaults() {
        let config = minimal().build().unwrap();
        assert_eq!(config.split.key, "raw_score");
        assert!(!config.split.use_extinct);
        assert_eq!(config.model, ModelConfig::default());
        assert!(config.model.expand && config.model.optimize);
        assert_eq!(config.stores.table, "OriginalFeatureSpace");
        assert_eq!(config.stages, RunStages::default());
        assert_eq!(config.fingerprint.max_bonds, 13);
    }

    #[test]
    fn pipeline_builder_reports_missing_parameters() {
        let result = PipelineConfigBuilder::new().test_size(1).train_size(1).build();
        assert_eq!(
            result.unwrap_err(),
            ConfigError::MissingParameter("database_path")
        );
        let result = PipelineConfigBuilder::new()
            .database_path(PathBuf::from("x"))
            .train_size(1)
            .build();
        assert_eq!(result.unwrap_err(), ConfigError::MissingParameter("test_size"));
    }

    #[test]
    fn pipeline_builder_rejects_invalid_fingerprint_settings() {
        let fingerprint = FingerprintConfig {
            nbin: 0,
            ..FingerprintConfig::default()
        };
        let result = minimal().fingerprint(fingerprint).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { parameter: "nbin", .. })
        ));

        let fingerprint = FingerprintConfig {
            features: Vec::new(),
            ..FingerprintConfig::default()
        };
        assert!(minimal().fingerprint(fingerprint).build().is_err());
    }

    #[test]
    fn repeated_features_are_rejected() {
        let fingerprint = FingerprintConfig {
            features: vec![FeatureKind::Mass, FeatureKind::Composition, FeatureKind::Mass],
            ..FingerprintConfig::default()
        };
        match minimal().fingerprint(fingerprint).build() {
            Err(ConfigError::InvalidValue { parameter, reason }) => {
                assert_eq!(parameter, "features");
                assert!(reason.contains("mass"), "{reason}");
            }
            other => panic!("expected an invalid features error, got {other:?}"),
        }
    }

    #[test]
    fn screening_builder_defaults_components_to_size() {
        let config = ScreeningConfigBuilder::new()
            .database_path(PathBuf::from("gadb.db"))
            .test_size(5)
            .train_size(10)
            .size(4)
            .build()
            .unwrap();
        assert_eq!(config.components, 4);
        assert_eq!(config.step, 1);
        assert!(config.clear_cache);
    }

    #[test]
    fn screening_builder_rejects_zero_step() {
        let result = ScreeningConfigBuilder::new()
            .database_path(PathBuf::from("gadb.db"))
            .test_size(5)
            .train_size(10)
            .size(4)
            .step(0)
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { parameter: "step", .. })
        ));
    }
}
