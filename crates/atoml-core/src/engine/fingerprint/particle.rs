use super::{FeatureFunction, FingerprintError};
use crate::core::elements::atomic_mass;
use crate::core::models::candidate::Candidate;
use crate::core::neighbors::{NeighborMatrix, compute_nnmat, neighbor_list};
use crate::engine::config::FingerprintConfig;
use itertools::Itertools;
use std::borrow::Cow;

/// Fingerprints describing the shape and bonding of nanoparticles.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleFingerprintGenerator {
    atom_numbers: Vec<u8>,
    max_bonds: usize,
    get_nl: bool,
    dx: f64,
    cell_size: f64,
    nbin: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleKind {
    NearestNeighbour,
    BondCount,
    Distribution,
    Rdf,
}

impl ParticleFingerprintGenerator {
    pub fn new(atom_numbers: Vec<u8>) -> Self {
        Self {
            atom_numbers,
            max_bonds: 13,
            get_nl: false,
            dx: 0.2,
            cell_size: 50.0,
            nbin: 4,
        }
    }

    pub fn from_config(config: &FingerprintConfig, atom_numbers: &[u8]) -> Self {
        Self {
            atom_numbers: atom_numbers.to_vec(),
            max_bonds: config.max_bonds,
            get_nl: config.get_nl,
            dx: config.dx,
            cell_size: config.cell_size,
            nbin: config.nbin.max(1),
        }
    }

    pub fn with_max_bonds(mut self, max_bonds: usize) -> Self {
        self.max_bonds = max_bonds;
        self
    }

    /// Always recompute the neighbour matrix instead of using the cached one.
    pub fn with_get_nl(mut self, get_nl: bool) -> Self {
        self.get_nl = get_nl;
        self
    }

    pub fn with_dx(mut self, dx: f64) -> Self {
        self.dx = dx;
        self
    }

    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.cell_size = cell_size;
        self
    }

    pub fn with_nbin(mut self, nbin: usize) -> Self {
        self.nbin = nbin.max(1);
        self
    }

    pub fn atom_numbers(&self) -> &[u8] {
        &self.atom_numbers
    }

    pub fn feature(&self, kind: ParticleKind) -> ParticleFeature {
        ParticleFeature {
            generator: self.clone(),
            kind,
        }
    }

    fn type_index(&self, z: u8) -> Option<usize> {
        self.atom_numbers.iter().position(|&t| t == z)
    }

    /// Returns the neighbour matrix for this generator's element ordering and
    /// tolerance, filling the candidate's cache when it is empty.
    fn nnmat<'c>(&self, candidate: &'c Candidate) -> Result<Cow<'c, NeighborMatrix>, FingerprintError> {
        let cached = candidate.data.nnmat();
        if !self.get_nl {
            if let Some(matrix) = cached.filter(|m| m.matches(&self.atom_numbers, self.dx)) {
                return Ok(Cow::Borrowed(matrix));
            }
        }

        let computed = compute_nnmat(&candidate.atoms, &self.atom_numbers, self.dx)?;
        if self.get_nl || cached.is_some() {
            return Ok(Cow::Owned(computed));
        }
        let stored = candidate.data.cache_nnmat(computed);
        if stored.matches(&self.atom_numbers, self.dx) {
            Ok(Cow::Borrowed(stored))
        } else {
            Ok(Cow::Owned(compute_nnmat(
                &candidate.atoms,
                &self.atom_numbers,
                self.dx,
            )?))
        }
    }

    /// Flattened element-pair mean neighbour counts.
    pub fn nearestneighbour_fpv(&self, candidate: &Candidate) -> Result<Vec<f64>, FingerprintError> {
        Ok(self.nnmat(candidate)?.values().to_vec())
    }

    /// Per element, the fraction of its atoms having 0..=max_bonds bonds.
    pub fn bond_count_fpv(&self, candidate: &Candidate) -> Result<Vec<f64>, FingerprintError> {
        let atoms = &candidate.atoms;
        let neighbors = neighbor_list(atoms, self.dx)?;
        let width = self.max_bonds + 1;

        let mut histogram = vec![0.0; self.atom_numbers.len() * width];
        let mut totals = vec![0usize; self.atom_numbers.len()];
        for (i, &z) in atoms.numbers().iter().enumerate() {
            let Some(t) = self.type_index(z) else { continue };
            let bonds = neighbors[i].len().min(self.max_bonds);
            histogram[t * width + bonds] += 1.0;
            totals[t] += 1;
        }
        normalize_blocks(&mut histogram, &totals, width);
        Ok(histogram)
    }

    /// Per element, a histogram of distances from the centre of mass.
    ///
    /// Distances are scaled by the largest one in the structure before binning.
    pub fn distribution_fpv(&self, candidate: &Candidate) -> Result<Vec<f64>, FingerprintError> {
        let atoms = &candidate.atoms;
        let com = atoms
            .center_of_mass(atomic_mass)
            .map_err(FingerprintError::UnknownElement)?;
        let distances: Vec<f64> = atoms.positions().iter().map(|p| (p - com).norm()).collect();
        let max_distance = distances.iter().copied().fold(0.0_f64, f64::max);

        let mut histogram = vec![0.0; self.atom_numbers.len() * self.nbin];
        let mut totals = vec![0usize; self.atom_numbers.len()];
        for (&z, &d) in atoms.numbers().iter().zip(&distances) {
            let Some(t) = self.type_index(z) else { continue };
            let scaled = if max_distance > 0.0 { d / max_distance } else { 0.0 };
            histogram[t * self.nbin + bin_of(scaled, 1.0, self.nbin)] += 1.0;
            totals[t] += 1;
        }
        normalize_blocks(&mut histogram, &totals, self.nbin);
        Ok(histogram)
    }

    /// Pair-distance histogram over `[0, cell_size / 2)`, per atom.
    pub fn rdf_fpv(&self, candidate: &Candidate) -> Result<Vec<f64>, FingerprintError> {
        let atoms = &candidate.atoms;
        let cutoff = self.cell_size / 2.0;
        let mut histogram = vec![0.0; self.nbin];
        if atoms.is_empty() {
            return Ok(histogram);
        }
        for (i, j) in (0..atoms.len()).tuple_combinations() {
            let d = atoms.distance(i, j);
            if d < cutoff {
                histogram[bin_of(d, cutoff, self.nbin)] += 1.0;
            }
        }
        let n = atoms.len() as f64;
        histogram.iter_mut().for_each(|v| *v /= n);
        Ok(histogram)
    }
}

fn bin_of(value: f64, upper: f64, nbin: usize) -> usize {
    ((value / upper * nbin as f64) as usize).min(nbin - 1)
}

/// Turns per-element counts into fractions; elements with no atoms stay zero.
fn normalize_blocks(histogram: &mut [f64], totals: &[usize], width: usize) {
    for (block, &total) in histogram.chunks_mut(width).zip(totals) {
        if total > 0 {
            block.iter_mut().for_each(|v| *v /= total as f64);
        }
    }
}

/// One particle fingerprint, usable as a [`FeatureFunction`].
#[derive(Debug, Clone)]
pub struct ParticleFeature {
    generator: ParticleFingerprintGenerator,
    kind: ParticleKind,
}

impl FeatureFunction for ParticleFeature {
    fn name(&self) -> &str {
        match self.kind {
            ParticleKind::NearestNeighbour => "nearestneighbour",
            ParticleKind::BondCount => "bond_count",
            ParticleKind::Distribution => "distribution",
            ParticleKind::Rdf => "rdf",
        }
    }

    fn compute(&self, candidate: &Candidate) -> Result<Vec<f64>, FingerprintError> {
        match self.kind {
            ParticleKind::NearestNeighbour => self.generator.nearestneighbour_fpv(candidate),
            ParticleKind::BondCount => self.generator.bond_count_fpv(candidate),
            ParticleKind::Distribution => self.generator.distribution_fpv(candidate),
            ParticleKind::Rdf => self.generator.rdf_fpv(candidate),
        }
    }
}
