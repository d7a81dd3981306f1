//! Fingerprint generation: turning candidates into fixed-length feature vectors.
//!
//! A [`FeatureFunction`] maps one candidate to a vector of numbers. Several
//! functions are concatenated into one row per candidate by [`return_fpv`] or a
//! [`FingerprintPipeline`], producing a [`FeatureMatrix`] whose columns are named
//! `"{function}_{j}"`.

pub mod particle;
pub mod standard;

pub use particle::{ParticleFeature, ParticleFingerprintGenerator, ParticleKind};
pub use standard::{StandardFeature, StandardFingerprintGenerator, StandardKind};

use super::config::FingerprintConfig;
use super::progress::{Progress, ProgressReporter};
use crate::core::models::candidate::Candidate;
use crate::core::neighbors::NeighborError;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FingerprintError {
    #[error(
        "Feature function '{function}' returned {found} values for sample '{sample}', expected {expected}"
    )]
    InconsistentVectorLength {
        function: String,
        sample: String,
        expected: usize,
        found: usize,
    },
    #[error("No feature functions were given")]
    EmptyFeatureList,
    #[error("No element data is known for atomic number {0}")]
    UnknownElement(u8),
}

impl From<NeighborError> for FingerprintError {
    fn from(err: NeighborError) -> Self {
        match err {
            NeighborError::UnknownElement(z) => FingerprintError::UnknownElement(z),
        }
    }
}

/// A function computing part of a candidate's fingerprint.
pub trait FeatureFunction: Send + Sync {
    /// Prefix for the names of the columns this function produces.
    fn name(&self) -> &str;

    fn compute(&self, candidate: &Candidate) -> Result<Vec<f64>, FingerprintError>;
}

/// The feature families that can be requested by name in a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeatureKind {
    #[serde(alias = "nearestneighbour")]
    NearestNeighbour,
    #[serde(alias = "bond_count")]
    BondCount,
    Distribution,
    Rdf,
    Mass,
    Composition,
    Eigenspectrum,
    Distance,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 8] = [
        FeatureKind::NearestNeighbour,
        FeatureKind::BondCount,
        FeatureKind::Distribution,
        FeatureKind::Rdf,
        FeatureKind::Mass,
        FeatureKind::Composition,
        FeatureKind::Eigenspectrum,
        FeatureKind::Distance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FeatureKind::NearestNeighbour => "nearestneighbour",
            FeatureKind::BondCount => "bond_count",
            FeatureKind::Distribution => "distribution",
            FeatureKind::Rdf => "rdf",
            FeatureKind::Mass => "mass",
            FeatureKind::Composition => "composition",
            FeatureKind::Eigenspectrum => "eigenspectrum",
            FeatureKind::Distance => "distance",
        }
    }

    /// Whether this feature is produced by the particle generator.
    pub fn is_particle(self) -> bool {
        matches!(
            self,
            FeatureKind::NearestNeighbour
                | FeatureKind::BondCount
                | FeatureKind::Distribution
                | FeatureKind::Rdf
        )
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("Unknown feature function '{0}'")]
pub struct UnknownFeature(pub String);

impl FromStr for FeatureKind {
    type Err = UnknownFeature;

    /// Accepts `bond_count`, `bond-count` and `bond_count_fpv` style names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let normalized = normalized.strip_suffix("_fpv").unwrap_or(&normalized);
        let normalized = if normalized == "nearest_neighbour" {
            "nearestneighbour"
        } else {
            normalized
        };
        FeatureKind::ALL
            .into_iter()
            .find(|kind| kind.name() == normalized)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

/// Fingerprint vectors of a set of candidates, one row per candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    names: Vec<String>,
    values: DMatrix<f64>,
}

impl FeatureMatrix {
    pub fn new(names: Vec<String>, values: DMatrix<f64>) -> Self {
        debug_assert_eq!(names.len(), values.ncols());
        Self { names, values }
    }

    pub fn empty() -> Self {
        Self {
            names: Vec::new(),
            values: DMatrix::zeros(0, 0),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn into_parts(self) -> (Vec<String>, DMatrix<f64>) {
        (self.names, self.values)
    }
}

fn compute_row(
    candidate: &Candidate,
    functions: &[Box<dyn FeatureFunction>],
) -> Result<Vec<Vec<f64>>, FingerprintError> {
    functions.iter().map(|f| f.compute(candidate)).collect()
}

fn assemble(
    candidates: &[Candidate],
    functions: &[Box<dyn FeatureFunction>],
    rows: Vec<Vec<Vec<f64>>>,
) -> Result<FeatureMatrix, FingerprintError> {
    let Some(first) = rows.first() else {
        return Ok(FeatureMatrix::empty());
    };
    let widths: Vec<usize> = first.iter().map(Vec::len).collect();

    for (candidate, row) in candidates.iter().zip(&rows) {
        for ((function, part), &expected) in functions.iter().zip(row).zip(&widths) {
            if part.len() != expected {
                return Err(FingerprintError::InconsistentVectorLength {
                    function: function.name().to_string(),
                    sample: candidate.unique_id.clone(),
                    expected,
                    found: part.len(),
                });
            }
        }
    }

    let names: Vec<String> = functions
        .iter()
        .zip(&widths)
        .flat_map(|(function, &width)| (0..width).map(move |j| format!("{}_{}", function.name(), j)))
        .collect();
    let flat: Vec<f64> = rows.into_iter().flatten().flatten().collect();
    let values = DMatrix::from_row_slice(candidates.len(), names.len(), &flat);
    Ok(FeatureMatrix::new(names, values))
}

fn fingerprint(
    candidates: &[Candidate],
    functions: &[Box<dyn FeatureFunction>],
    reporter: &ProgressReporter,
) -> Result<FeatureMatrix, FingerprintError> {
    if functions.is_empty() {
        return Err(FingerprintError::EmptyFeatureList);
    }
    reporter.report(Progress::TaskStart {
        total_steps: candidates.len() as u64,
    });

    let step = |c: &Candidate| {
        let row = compute_row(c, functions);
        reporter.report(Progress::TaskIncrement);
        row
    };

    #[cfg(not(feature = "parallel"))]
    let rows = candidates.iter().map(step).collect::<Result<Vec<_>, _>>();
    #[cfg(feature = "parallel")]
    let rows = candidates.par_iter().map(step).collect::<Result<Vec<_>, _>>();

    reporter.report(Progress::TaskFinish);
    assemble(candidates, functions, rows?)
}

/// Computes the concatenated fingerprint of every candidate.
///
/// # Errors
///
/// Returns [`FingerprintError::EmptyFeatureList`] if `functions` is empty, and
/// [`FingerprintError::InconsistentVectorLength`] if a function's output width
/// varies between candidates.
pub fn return_fpv(
    candidates: &[Candidate],
    functions: &[Box<dyn FeatureFunction>],
) -> Result<FeatureMatrix, FingerprintError> {
    fingerprint(candidates, functions, &ProgressReporter::new())
}

/// An ordered list of feature functions applied to every candidate.
#[derive(Default)]
pub struct FingerprintPipeline {
    functions: Vec<Box<dyn FeatureFunction>>,
}

impl FingerprintPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_function(mut self, function: impl FeatureFunction + 'static) -> Self {
        self.functions.push(Box::new(function));
        self
    }

    pub fn push(&mut self, function: Box<dyn FeatureFunction>) {
        self.functions.push(function);
    }

    /// Builds the configured feature functions over a fixed element ordering.
    pub fn from_config(config: &FingerprintConfig, atom_numbers: &[u8]) -> Self {
        let particle = ParticleFingerprintGenerator::from_config(config, atom_numbers);
        let standard = StandardFingerprintGenerator::new(atom_numbers.to_vec());

        let mut pipeline = Self::new();
        for &kind in &config.features {
            let function: Box<dyn FeatureFunction> = match kind {
                FeatureKind::NearestNeighbour => {
                    Box::new(particle.feature(ParticleKind::NearestNeighbour))
                }
                FeatureKind::BondCount => Box::new(particle.feature(ParticleKind::BondCount)),
                FeatureKind::Distribution => {
                    Box::new(particle.feature(ParticleKind::Distribution))
                }
                FeatureKind::Rdf => Box::new(particle.feature(ParticleKind::Rdf)),
                FeatureKind::Mass => Box::new(standard.feature(StandardKind::Mass)),
                FeatureKind::Composition => Box::new(standard.feature(StandardKind::Composition)),
                FeatureKind::Eigenspectrum => {
                    Box::new(standard.feature(StandardKind::Eigenspectrum))
                }
                FeatureKind::Distance => Box::new(standard.feature(StandardKind::Distance)),
            };
            pipeline.push(function);
        }
        pipeline
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.iter().map(|f| f.name()).collect()
    }

    #[instrument(level = "debug", skip_all, fields(candidates = candidates.len(), functions = self.functions.len()))]
    pub fn compute(
        &self,
        candidates: &[Candidate],
        reporter: &ProgressReporter,
    ) -> Result<FeatureMatrix, FingerprintError> {
        let matrix = fingerprint(candidates, &self.functions, reporter)?;
        debug!(
            rows = matrix.nrows(),
            cols = matrix.ncols(),
            "Fingerprint matrix computed."
        );
        Ok(matrix)
    }
}
