//! # Core Module
//!
//! Fundamental building blocks shared by every pipeline stage.
//!
//! - **Structure Representation** ([`models`]) - Atoms, candidates and their metadata
//! - **Element Data** ([`elements`]) - Atomic masses and covalent radii
//! - **Neighbour Analysis** ([`neighbors`]) - Bond detection and the element-pair neighbour matrix
//! - **Storage** ([`io`]) - The GA candidate database, descriptor stores and CSV export

pub mod elements;
pub mod io;
pub mod models;
pub mod neighbors;
