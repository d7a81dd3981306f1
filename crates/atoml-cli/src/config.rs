use crate::cli::{BuildModelArgs, ScreenArgs};
use crate::error::{CliError, Result};
use atoml::engine::config as core_config;
use atoml::engine::fingerprint::FeatureKind;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialDatabaseConfig {
    path: Option<PathBuf>,
    #[serde(rename = "use-extinct")]
    use_extinct: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialSplitConfig {
    key: Option<String>,
    #[serde(rename = "test-size")]
    test_size: Option<usize>,
    #[serde(rename = "train-size")]
    train_size: Option<usize>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialFingerprintConfig {
    #[serde(rename = "atom-numbers")]
    atom_numbers: Option<Vec<u8>>,
    #[serde(rename = "max-bonds")]
    max_bonds: Option<usize>,
    #[serde(rename = "get-nl")]
    get_nl: Option<bool>,
    dx: Option<f64>,
    #[serde(rename = "cell-size")]
    cell_size: Option<f64>,
    nbin: Option<usize>,
    features: Option<Vec<String>>,
}

impl PartialFingerprintConfig {
    fn resolve(self) -> Result<core_config::FingerprintConfig> {
        let defaults = core_config::FingerprintConfig::default();
        let features = match self.features {
            Some(names) => names
                .iter()
                .map(|name| FeatureKind::from_str(name))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| CliError::Config(e.to_string()))?,
            None => defaults.features,
        };
        Ok(core_config::FingerprintConfig {
            atom_numbers: self.atom_numbers.or(defaults.atom_numbers),
            max_bonds: self.max_bonds.unwrap_or(defaults.max_bonds),
            get_nl: self.get_nl.unwrap_or(defaults.get_nl),
            dx: self.dx.unwrap_or(defaults.dx),
            cell_size: self.cell_size.unwrap_or(defaults.cell_size),
            nbin: self.nbin.unwrap_or(defaults.nbin),
            features,
        })
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialModelConfig {
    expand: Option<bool>,
    optimize: Option<bool>,
    size: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialStoreConfig {
    #[serde(rename = "train-store")]
    train_store: Option<PathBuf>,
    #[serde(rename = "test-store")]
    test_store: Option<PathBuf>,
    table: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialRunConfig {
    #[serde(rename = "build-db")]
    build_db: Option<bool>,
    #[serde(rename = "test-model")]
    test_model: Option<bool>,
    cleanup: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
struct PartialScreeningConfig {
    size: Option<usize>,
    step: Option<usize>,
    components: Option<usize>,
    #[serde(rename = "clear-cache")]
    clear_cache: Option<bool>,
}

/// The TOML configuration file. Every field is optional; command-line flags
/// take precedence over `--set` values, which take precedence over the file.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    database: Option<PartialDatabaseConfig>,
    split: Option<PartialSplitConfig>,
    fingerprint: Option<PartialFingerprintConfig>,
    model: Option<PartialModelConfig>,
    stores: Option<PartialStoreConfig>,
    run: Option<PartialRunConfig>,
    screening: Option<PartialScreeningConfig>,
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn parse_list<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<Vec<T>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| parse_value(key, item, kind))
        .collect()
}

impl PartialConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn merge_for_build_model(
        mut self,
        args: &BuildModelArgs,
    ) -> Result<core_config::PipelineConfig> {
        self.apply_set_values(&args.set_values)?;

        let database = self.database.unwrap_or_default();
        let split = self.split.unwrap_or_default();
        let model = self.model.unwrap_or_default();
        let stores = self.stores.unwrap_or_default();
        let run = self.run.unwrap_or_default();

        let model_defaults = core_config::ModelConfig::default();
        let store_defaults = core_config::StoreConfig::default();
        let stage_defaults = core_config::RunStages::default();

        let mut builder = core_config::PipelineConfigBuilder::new()
            .key(
                args.key
                    .clone()
                    .or(split.key)
                    .unwrap_or_else(|| core_config::DEFAULT_KEY.to_string()),
            )
            .seed(args.seed.or(split.seed))
            .use_extinct(database.use_extinct.unwrap_or(false))
            .fingerprint(self.fingerprint.unwrap_or_default().resolve()?)
            .model(core_config::ModelConfig {
                expand: model.expand.unwrap_or(model_defaults.expand),
                optimize: model.optimize.unwrap_or(model_defaults.optimize),
                size: model.size.or(model_defaults.size),
            })
            .stores(core_config::StoreConfig {
                train_store: stores.train_store.unwrap_or(store_defaults.train_store),
                test_store: stores.test_store.unwrap_or(store_defaults.test_store),
                table: stores.table.unwrap_or(store_defaults.table),
            })
            .stages(core_config::RunStages {
                build_db: !args.no_build_db && run.build_db.unwrap_or(stage_defaults.build_db),
                test_model: args.test_model || run.test_model.unwrap_or(stage_defaults.test_model),
                cleanup: !args.no_cleanup && run.cleanup.unwrap_or(stage_defaults.cleanup),
            });

        if let Some(path) = args.database.clone().or(database.path) {
            builder = builder.database_path(path);
        }
        if let Some(n) = args.test_size.or(split.test_size) {
            builder = builder.test_size(n);
        }
        if let Some(n) = args.train_size.or(split.train_size) {
            builder = builder.train_size(n);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    pub fn merge_for_screening(mut self, args: &ScreenArgs) -> Result<core_config::ScreeningConfig> {
        self.apply_set_values(&args.set_values)?;

        let database = self.database.unwrap_or_default();
        let split = self.split.unwrap_or_default();
        let screening = self.screening.unwrap_or_default();

        let mut builder = core_config::ScreeningConfigBuilder::new()
            .key(split.key.unwrap_or_else(|| core_config::DEFAULT_KEY.to_string()))
            .seed(split.seed)
            .use_extinct(database.use_extinct.unwrap_or(false))
            .fingerprint(self.fingerprint.unwrap_or_default().resolve()?)
            .clear_cache(!args.keep_cache && screening.clear_cache.unwrap_or(true));

        if let Some(path) = args.database.clone().or(database.path) {
            builder = builder.database_path(path);
        }
        if let Some(n) = split.test_size {
            builder = builder.test_size(n);
        }
        if let Some(n) = split.train_size {
            builder = builder.train_size(n);
        }
        if let Some(size) = args.size.or(screening.size) {
            builder = builder.size(size);
        }
        if let Some(step) = args.step.or(screening.step) {
            builder = builder.step(step);
        }
        if let Some(components) = screening.components {
            builder = builder.components(components);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let parts: Vec<_> = kv_pair.splitn(2, '=').collect();
            if parts.len() != 2 {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            }
            let key = parts[0].trim();
            let value = parts[1];

            match key {
                "database.path" => {
                    self.database.get_or_insert_with(Default::default).path =
                        Some(PathBuf::from(value.trim()));
                }
                "database.use-extinct" => {
                    self.database.get_or_insert_with(Default::default).use_extinct =
                        Some(parse_value(key, value, "boolean")?);
                }
                "split.key" => {
                    self.split.get_or_insert_with(Default::default).key =
                        Some(value.trim().to_string());
                }
                "split.test-size" => {
                    self.split.get_or_insert_with(Default::default).test_size =
                        Some(parse_value(key, value, "integer")?);
                }
                "split.train-size" => {
                    self.split.get_or_insert_with(Default::default).train_size =
                        Some(parse_value(key, value, "integer")?);
                }
                "split.seed" => {
                    self.split.get_or_insert_with(Default::default).seed =
                        Some(parse_value(key, value, "integer")?);
                }
                "fingerprint.atom-numbers" => {
                    self.fingerprint
                        .get_or_insert_with(Default::default)
                        .atom_numbers = Some(parse_list(key, value, "integer")?);
                }
                "fingerprint.max-bonds" => {
                    self.fingerprint.get_or_insert_with(Default::default).max_bonds =
                        Some(parse_value(key, value, "integer")?);
                }
                "fingerprint.get-nl" => {
                    self.fingerprint.get_or_insert_with(Default::default).get_nl =
                        Some(parse_value(key, value, "boolean")?);
                }
                "fingerprint.dx" => {
                    self.fingerprint.get_or_insert_with(Default::default).dx =
                        Some(parse_value(key, value, "float")?);
                }
                "fingerprint.cell-size" => {
                    self.fingerprint.get_or_insert_with(Default::default).cell_size =
                        Some(parse_value(key, value, "float")?);
                }
                "fingerprint.nbin" => {
                    self.fingerprint.get_or_insert_with(Default::default).nbin =
                        Some(parse_value(key, value, "integer")?);
                }
                "fingerprint.features" => {
                    self.fingerprint.get_or_insert_with(Default::default).features =
                        Some(parse_list(key, value, "string")?);
                }
                "model.expand" => {
                    self.model.get_or_insert_with(Default::default).expand =
                        Some(parse_value(key, value, "boolean")?);
                }
                "model.optimize" => {
                    self.model.get_or_insert_with(Default::default).optimize =
                        Some(parse_value(key, value, "boolean")?);
                }
                "model.size" => {
                    self.model.get_or_insert_with(Default::default).size =
                        Some(parse_value(key, value, "integer")?);
                }
                "stores.train-store" => {
                    self.stores.get_or_insert_with(Default::default).train_store =
                        Some(PathBuf::from(value.trim()));
                }
                "stores.test-store" => {
                    self.stores.get_or_insert_with(Default::default).test_store =
                        Some(PathBuf::from(value.trim()));
                }
                "stores.table" => {
                    self.stores.get_or_insert_with(Default::default).table =
                        Some(value.trim().to_string());
                }
                "run.build-db" => {
                    self.run.get_or_insert_with(Default::default).build_db =
                        Some(parse_value(key, value, "boolean")?);
                }
                "run.test-model" => {
                    self.run.get_or_insert_with(Default::default).test_model =
                        Some(parse_value(key, value, "boolean")?);
                }
                "run.cleanup" => {
                    self.run.get_or_insert_with(Default::default).cleanup =
                        Some(parse_value(key, value, "boolean")?);
                }
                "screening.size" => {
                    self.screening.get_or_insert_with(Default::default).size =
                        Some(parse_value(key, value, "integer")?);
                }
                "screening.step" => {
                    self.screening.get_or_insert_with(Default::default).step =
                        Some(parse_value(key, value, "integer")?);
                }
                "screening.components" => {
                    self.screening.get_or_insert_with(Default::default).components =
                        Some(parse_value(key, value, "integer")?);
                }
                "screening.clear-cache" => {
                    self.screening.get_or_insert_with(Default::default).clear_cache =
                        Some(parse_value(key, value, "boolean")?);
                }
                _ => {
                    return Err(CliError::Config(format!(
                        "Unknown configuration key for --set: {}",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use once_cell::sync::Lazy;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    static TEST_DIR: Lazy<TempDir> = Lazy::new(|| tempdir().expect("Failed to create temp dir"));

    const FULL_CONFIG: &str = r#"
        [database]
        path = "gadb.db"
        use-extinct = true

        [split]
        key = "raw_score"
        test-size = 50
        train-size = 100
        seed = 7

        [fingerprint]
        atom-numbers = [78, 79]
        max-bonds = 12
        nbin = 5
        features = ["nearestneighbour", "bond_count_fpv", "eigenspectrum"]

        [model]
        expand = false
        size = 20

        [stores]
        table = "Features"

        [run]
        test-model = true

        [screening]
        size = 4
        step = 2
    "#;

    fn write_config_file(name: &str, content: &str) -> PathBuf {
        let file_path = TEST_DIR.path().join(name);
        fs::write(&file_path, content).unwrap();
        file_path
    }

    fn build_model_args(extra: &[&str], config_path: &Path) -> BuildModelArgs {
        let mut argv = vec![
            "atoml".to_string(),
            "build-model".to_string(),
            "-c".to_string(),
            config_path.to_str().unwrap().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        match Cli::parse_from(argv).command {
            Commands::BuildModel(args) => args,
            other => panic!("Expected build-model, got {:?}", other),
        }
    }

    fn screen_args(extra: &[&str], config_path: &Path) -> ScreenArgs {
        let mut argv = vec![
            "atoml".to_string(),
            "screen".to_string(),
            "-c".to_string(),
            config_path.to_str().unwrap().to_string(),
        ];
        argv.extend(extra.iter().map(|s| s.to_string()));
        match Cli::parse_from(argv).command {
            Commands::Screen(args) => args,
            other => panic!("Expected screen, got {:?}", other),
        }
    }

    #[test]
    fn file_values_are_merged_over_defaults() {
        let path = write_config_file("full.toml", FULL_CONFIG);
        let args = build_model_args(&[], &path);
        let config = PartialConfig::from_file(&path)
            .unwrap()
            .merge_for_build_model(&args)
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("gadb.db"));
        assert!(config.split.use_extinct);
        assert_eq!(config.split.test_size, 50);
        assert_eq!(config.split.train_size, 100);
        assert_eq!(config.split.seed, Some(7));
        assert_eq!(config.fingerprint.atom_numbers, Some(vec![78, 79]));
        assert_eq!(config.fingerprint.max_bonds, 12);
        assert_eq!(config.fingerprint.nbin, 5);
        assert_eq!(
            config.fingerprint.features,
            vec![
                FeatureKind::NearestNeighbour,
                FeatureKind::BondCount,
                FeatureKind::Eigenspectrum
            ]
        );
        assert!(!config.model.expand);
        assert!(config.model.optimize);
        assert_eq!(config.model.size, Some(20));
        assert_eq!(config.stores.table, "Features");
        assert_eq!(
            config.stores.train_store,
            PathBuf::from(core_config::DEFAULT_TRAIN_STORE)
        );
        assert!(config.stages.build_db && config.stages.test_model && config.stages.cleanup);
    }

    #[test]
    fn cli_flags_override_set_values_and_file() {
        let path = write_config_file("override.toml", FULL_CONFIG);
        let args = build_model_args(
            &[
                "--test-size",
                "5",
                "--database",
                "other.db",
                "--no-cleanup",
                "-S",
                "split.test-size=9",
                "split.train-size=11",
                "model.expand=true",
            ],
            &path,
        );
        let config = PartialConfig::from_file(&path)
            .unwrap()
            .merge_for_build_model(&args)
            .unwrap();

        assert_eq!(config.split.test_size, 5);
        assert_eq!(config.split.train_size, 11);
        assert_eq!(config.database_path, PathBuf::from("other.db"));
        assert!(config.model.expand);
        assert!(!config.stages.cleanup);
    }

    #[test]
    fn missing_sizes_are_reported() {
        let path = write_config_file("minimal.toml", "[database]\npath = \"gadb.db\"\n");
        let args = build_model_args(&[], &path);
        let result = PartialConfig::from_file(&path)
            .unwrap()
            .merge_for_build_model(&args);
        match result {
            Err(CliError::Config(msg)) => assert!(msg.contains("test_size"), "{}", msg),
            other => panic!("Expected a config error, got {:?}", other),
        }
    }

    #[test]
    fn unknown_fields_fail_to_parse() {
        let path = write_config_file("unknown.toml", "[model]\nexpnd = true\n");
        assert!(matches!(
            PartialConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn unknown_feature_names_are_rejected() {
        let path = write_config_file(
            "bad_feature.toml",
            "[database]\npath = \"gadb.db\"\n[split]\ntest-size = 1\ntrain-size = 1\n[fingerprint]\nfeatures = [\"soap\"]\n",
        );
        let args = build_model_args(&[], &path);
        let result = PartialConfig::from_file(&path)
            .unwrap()
            .merge_for_build_model(&args);
        match result {
            Err(CliError::Config(msg)) => assert!(msg.contains("soap"), "{}", msg),
            other => panic!("Expected a config error, got {:?}", other),
        }
    }

    #[test]
    fn set_values_parse_lists_and_reject_bad_input() {
        let mut config = PartialConfig::default();
        config
            .apply_set_values(&[
                "fingerprint.atom-numbers=78, 79".to_string(),
                "fingerprint.features=mass,composition".to_string(),
            ])
            .unwrap();
        let fingerprint = config.fingerprint.clone().unwrap().resolve().unwrap();
        assert_eq!(fingerprint.atom_numbers, Some(vec![78, 79]));
        assert_eq!(
            fingerprint.features,
            vec![FeatureKind::Mass, FeatureKind::Composition]
        );

        assert!(config.apply_set_values(&["model.size".to_string()]).is_err());
        assert!(config.apply_set_values(&["model.size=abc".to_string()]).is_err());
        assert!(config.apply_set_values(&["model.colour=red".to_string()]).is_err());
    }

    #[test]
    fn screening_merge_uses_screening_section() {
        let path = write_config_file("screen.toml", FULL_CONFIG);
        let args = screen_args(&["--step", "3", "--keep-cache"], &path);
        let config = PartialConfig::from_file(&path)
            .unwrap()
            .merge_for_screening(&args)
            .unwrap();

        assert_eq!(config.size, 4);
        assert_eq!(config.step, 3);
        assert_eq!(config.components, 4);
        assert!(!config.clear_cache);
        assert_eq!(config.split.test_size, 50);
    }

    #[test]
    fn screening_requires_a_size() {
        let path = write_config_file(
            "screen_no_size.toml",
            "[database]\npath = \"gadb.db\"\n[split]\ntest-size = 5\ntrain-size = 10\n",
        );
        let args = screen_args(&[], &path);
        let result = PartialConfig::from_file(&path)
            .unwrap()
            .merge_for_screening(&args);
        assert!(matches!(result, Err(CliError::Config(_))));

        let args = screen_args(&["--size", "3"], &path);
        let config = PartialConfig::from_file(&path)
            .unwrap()
            .merge_for_screening(&args)
            .unwrap();
        assert_eq!(config.size, 3);
    }
}
