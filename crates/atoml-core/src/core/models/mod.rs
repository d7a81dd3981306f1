//! # Core Models Module
//!
//! Data structures describing the samples that flow through a pipeline run.
//!
//! - [`atoms`] - Atomic numbers and Cartesian positions of one structure
//! - [`candidate`] - A GA database row: structure, key-value metadata and cached data
//! - [`value`] - Typed metadata values and the notion of a *defined* label
//!
//! ```ignore
//! use atoml::core::models::{atoms::Atoms, candidate::Candidate, value::KeyValue};
//! use nalgebra::Point3;
//!
//! let atoms = Atoms::new(vec![78, 79], vec![Point3::origin(), Point3::new(2.7, 0.0, 0.0)])?;
//! let mut candidate = Candidate::new("a1", atoms);
//! candidate.set("raw_score", KeyValue::Float(-3.2));
//! ```

pub mod atoms;
pub mod candidate;
pub mod value;
