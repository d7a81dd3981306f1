//! # Workflows Module
//!
//! End-to-end pipelines over a GA search database. Each workflow loads the
//! relaxed candidates, splits them into test and train datasets keyed by a
//! score, fingerprints them and then either fits a model or screens features.
//!
//! - **Model building** ([`build_model`]) - writes the train/test descriptor
//!   stores, fits a Gaussian process, optionally re-fits from the stores alone,
//!   and removes the stores afterwards.
//! - **Feature screening** ([`screening`]) - runs every screening routine and
//!   PCA over the same fingerprints and reports the reduced widths.
//!
//! Shared loading and splitting lives in [`prepare`].

pub mod build_model;
pub mod prepare;
pub mod screening;
