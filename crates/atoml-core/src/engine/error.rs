use thiserror::Error;

use super::config::ConfigError;
use super::fingerprint::FingerprintError;
use super::model::ModelError;
use super::selection::SelectionError;
use super::split::SplitError;
use crate::core::io::descriptor_db::DescriptorDbError;
use crate::core::io::ga_db::DatabaseError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Candidate database error: {source}")]
    Database {
        #[from]
        source: DatabaseError,
    },

    #[error("Descriptor store error: {source}")]
    DescriptorStore {
        #[from]
        source: DescriptorDbError,
    },

    #[error("Dataset split failed: {source}")]
    Split {
        #[from]
        source: SplitError,
    },

    #[error("Fingerprint generation failed: {source}")]
    Fingerprint {
        #[from]
        source: FingerprintError,
    },

    #[error("Feature selection failed: {source}")]
    Selection {
        #[from]
        source: SelectionError,
    },

    #[error("Model building failed: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Failed to remove '{path}': {source}")]
    Cleanup {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
