//! # AtoML Core Library
//!
//! Fingerprinting, feature screening and predictive model building for candidate
//! structures produced by a genetic-algorithm (GA) search.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Atoms`, `Candidate`), element
//!   tables, neighbour analysis, and the SQLite-backed candidate and descriptor stores.
//!
//! - **[`engine`]: The Logic Core.** Dataset splitting with pluggable samplers, the
//!   fingerprint pipeline and its generators, feature screening, and the Gaussian process
//!   model builder.
//!
//! - **[`workflows`]: The Public API.** End-to-end pipelines (`build_model`, `screening`)
//!   driven by an explicit configuration struct instead of process-wide toggles.

pub mod core;
pub mod engine;
pub mod workflows;
