use super::{FeatureFunction, FingerprintError};
use crate::core::elements::atomic_mass;
use crate::core::models::candidate::Candidate;
use itertools::Itertools;
use nalgebra::{DMatrix, SymmetricEigen};

/// Composition and geometry fingerprints that apply to any structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardFingerprintGenerator {
    atom_types: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardKind {
    Mass,
    Composition,
    Eigenspectrum,
    Distance,
}

impl StandardFingerprintGenerator {
    pub fn new(atom_types: Vec<u8>) -> Self {
        Self { atom_types }
    }

    pub fn atom_types(&self) -> &[u8] {
        &self.atom_types
    }

    pub fn feature(&self, kind: StandardKind) -> StandardFeature {
        StandardFeature {
            generator: self.clone(),
            kind,
        }
    }

    /// Total mass of the structure.
    pub fn mass_fpv(&self, candidate: &Candidate) -> Result<Vec<f64>, FingerprintError> {
        let mass = candidate
            .atoms
            .numbers()
            .iter()
            .map(|&z| atomic_mass(z).ok_or(FingerprintError::UnknownElement(z)))
            .sum::<Result<f64, _>>()?;
        Ok(vec![mass])
    }

    /// Number of atoms of each configured type.
    pub fn composition_fpv(&self, candidate: &Candidate) -> Result<Vec<f64>, FingerprintError> {
        Ok(self
            .atom_types
            .iter()
            .map(|&z| candidate.atoms.count_of(z) as f64)
            .collect())
    }

    /// Eigenvalues of the Coulomb matrix, largest first.
    pub fn eigenspectrum_fpv(&self, candidate: &Candidate) -> Result<Vec<f64>, FingerprintError> {
        let atoms = &candidate.atoms;
        let n = atoms.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let charges: Vec<f64> = atoms.numbers().iter().map(|&z| z as f64).collect();
        let coulomb = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                0.5 * charges[i].powf(2.4)
            } else {
                let d = atoms.distance(i, j);
                // Coincident atoms carry no pair term.
                if d > 1e-12 {
                    charges[i] * charges[j] / d
                } else {
                    0.0
                }
            }
        });
        let mut eigenvalues: Vec<f64> = SymmetricEigen::new(coulomb).eigenvalues.iter().copied().collect();
        eigenvalues.sort_by(|a, b| b.total_cmp(a));
        Ok(eigenvalues)
    }

    /// Mean distance between atoms of each unordered type pair, self-pairs included.
    pub fn distance_fpv(&self, candidate: &Candidate) -> Result<Vec<f64>, FingerprintError> {
        let atoms = &candidate.atoms;
        let numbers = atoms.numbers();
        let fp = self
            .atom_types
            .iter()
            .combinations_with_replacement(2)
            .map(|pair| {
                let (a, b) = (*pair[0], *pair[1]);
                let (sum, count) = (0..atoms.len())
                    .tuple_combinations()
                    .filter(|&(i, j)| {
                        (numbers[i] == a && numbers[j] == b) || (numbers[i] == b && numbers[j] == a)
                    })
                    .fold((0.0, 0usize), |(sum, count), (i, j)| {
                        (sum + atoms.distance(i, j), count + 1)
                    });
                if count > 0 { sum / count as f64 } else { 0.0 }
            })
            .collect();
        Ok(fp)
    }
}

/// One standard fingerprint, usable as a [`FeatureFunction`].
#[derive(Debug, Clone)]
pub struct StandardFeature {
    generator: StandardFingerprintGenerator,
    kind: StandardKind,
}

impl FeatureFunction for StandardFeature {
    fn name(&self) -> &str {
        match self.kind {
            StandardKind::Mass => "mass",
            StandardKind::Composition => "composition",
            StandardKind::Eigenspectrum => "eigenspectrum",
            StandardKind::Distance => "distance",
        }
    }

    fn compute(&self, candidate: &Candidate) -> Result<Vec<f64>, FingerprintError> {
        match self.kind {
            StandardKind::Mass => self.generator.mass_fpv(candidate),
            StandardKind::Composition => self.generator.composition_fpv(candidate),
            StandardKind::Eigenspectrum => self.generator.eigenspectrum_fpv(candidate),
            StandardKind::Distance => self.generator.distance_fpv(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atoms::Atoms;
    use nalgebra::Point3;

    fn dimer() -> Candidate {
        let atoms = Atoms::new(
            vec![78, 79],
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 2.5)],
        )
        .unwrap();
        Candidate::new("dimer", atoms)
    }

    fn generator() -> StandardFingerprintGenerator {
        StandardFingerprintGenerator::new(vec![78, 79])
    }

    #[test]
    fn mass_sums_atomic_masses() {
        let fp = generator().mass_fpv(&dimer()).unwrap();
        let expected = atomic_mass(78).unwrap() + atomic_mass(79).unwrap();
        assert!((fp[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn composition_counts_each_type() {
        let generator = StandardFingerprintGenerator::new(vec![79, 78, 46]);
        assert_eq!(generator.composition_fpv(&dimer()).unwrap(), vec![1.0, 1.0, 0.0]);
    }

    #[test]
    fn eigenspectrum_is_descending_with_trace_of_diagonal() {
        let fp = generator().eigenspectrum_fpv(&dimer()).unwrap();
        assert_eq!(fp.len(), 2);
        assert!(fp[0] >= fp[1]);
        let trace = 0.5 * 78f64.powf(2.4) + 0.5 * 79f64.powf(2.4);
        assert!((fp.iter().sum::<f64>() - trace).abs() < 1e-6 * trace);
    }

    #[test]
    fn distance_covers_type_pairs_with_zero_for_absent_pairs() {
        let fp = generator().distance_fpv(&dimer()).unwrap();
        // Pairs: (78, 78), (78, 79), (79, 79).
        assert_eq!(fp, vec![0.0, 2.5, 0.0]);
    }

    #[test]
    fn unknown_mass_is_an_error() {
        let atoms = Atoms::new(vec![118], vec![Point3::origin()]).unwrap();
        assert_eq!(
            generator().mass_fpv(&Candidate::new("x", atoms)).unwrap_err(),
            FingerprintError::UnknownElement(118)
        );
    }
}
