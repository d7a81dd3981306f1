//! Storage for candidates and fingerprint vectors.
//!
//! - [`ga_db`] - The SQLite database of GA search candidates
//! - [`descriptor_db`] - Tabular SQLite stores of fingerprint vectors keyed by `uuid`
//! - [`split_csv`] - CSV export of train/test assignments

pub mod descriptor_db;
pub mod ga_db;
pub mod split_csv;
