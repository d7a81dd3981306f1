//! The machinery behind the workflows: dataset splitting, fingerprinting,
//! feature screening and model fitting, with their configuration, progress
//! reporting and error types.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod model;
pub mod preprocess;
pub mod progress;
pub mod sampling;
pub mod selection;
pub mod split;
