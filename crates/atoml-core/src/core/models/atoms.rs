use nalgebra::{Matrix3, Point3, Vector3};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AtomsError {
    #[error("Atomic numbers ({numbers}) and positions ({positions}) differ in length")]
    LengthMismatch { numbers: usize, positions: usize },
}

/// The atomic structure of one candidate.
///
/// Stores the atomic number and Cartesian position (in Angstroms) of every atom,
/// in the order they were written to the GA database. An optional unit cell is
/// carried along for periodic structures but is not used by the fingerprints.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Atoms {
    numbers: Vec<u8>,
    positions: Vec<Point3<f64>>,
    cell: Option<Matrix3<f64>>,
}

impl Atoms {
    /// Creates a structure from parallel lists of atomic numbers and positions.
    ///
    /// # Errors
    ///
    /// Returns [`AtomsError::LengthMismatch`] if the two lists differ in length.
    pub fn new(numbers: Vec<u8>, positions: Vec<Point3<f64>>) -> Result<Self, AtomsError> {
        if numbers.len() != positions.len() {
            return Err(AtomsError::LengthMismatch {
                numbers: numbers.len(),
                positions: positions.len(),
            });
        }
        Ok(Self {
            numbers,
            positions,
            cell: None,
        })
    }

    pub fn with_cell(mut self, cell: Matrix3<f64>) -> Self {
        self.cell = Some(cell);
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    #[inline]
    pub fn numbers(&self) -> &[u8] {
        &self.numbers
    }

    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    #[inline]
    pub fn cell(&self) -> Option<&Matrix3<f64>> {
        self.cell.as_ref()
    }

    /// Iterates over `(atomic_number, position)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &Point3<f64>)> {
        self.numbers.iter().copied().zip(self.positions.iter())
    }

    /// Euclidean distance between atoms `i` and `j`, in Angstroms.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        nalgebra::distance(&self.positions[i], &self.positions[j])
    }

    /// The sorted set of distinct atomic numbers present in the structure.
    pub fn unique_numbers(&self) -> BTreeSet<u8> {
        self.numbers.iter().copied().collect()
    }

    /// Number of atoms with the given atomic number.
    pub fn count_of(&self, number: u8) -> usize {
        self.numbers.iter().filter(|&&z| z == number).count()
    }

    /// Mass-weighted centre of the structure.
    ///
    /// `mass_of` supplies the mass for each atomic number; atoms for which it returns
    /// `None` are reported through the error value as their atomic number.
    ///
    /// # Errors
    ///
    /// Returns the first atomic number without a known mass.
    pub fn center_of_mass<F>(&self, mass_of: F) -> Result<Point3<f64>, u8>
    where
        F: Fn(u8) -> Option<f64>,
    {
        let mut total_mass = 0.0;
        let mut weighted = Vector3::zeros();
        for (z, pos) in self.iter() {
            let mass = mass_of(z).ok_or(z)?;
            total_mass += mass;
            weighted += pos.coords * mass;
        }
        if total_mass <= 0.0 {
            return Ok(Point3::origin());
        }
        Ok(Point3::from(weighted / total_mass))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimer() -> Atoms {
        Atoms::new(
            vec![78, 79],
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(3.0, 4.0, 0.0)],
        )
        .unwrap()
    }

    #[test]
    fn new_rejects_mismatched_lengths() {
        let result = Atoms::new(vec![78, 79], vec![Point3::origin()]);
        assert_eq!(
            result,
            Err(AtomsError::LengthMismatch {
                numbers: 2,
                positions: 1
            })
        );
    }

    #[test]
    fn distance_is_euclidean() {
        assert!((dimer().distance(0, 1) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn unique_numbers_are_sorted_and_deduplicated() {
        let atoms = Atoms::new(
            vec![79, 78, 79],
            vec![Point3::origin(), Point3::origin(), Point3::origin()],
        )
        .unwrap();
        assert_eq!(atoms.unique_numbers().into_iter().collect::<Vec<_>>(), vec![78, 79]);
        assert_eq!(atoms.count_of(79), 2);
    }

    #[test]
    fn center_of_mass_weights_positions() {
        let atoms = dimer();
        let com = atoms.center_of_mass(|_| Some(1.0)).unwrap();
        assert!((com - Point3::new(1.5, 2.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn center_of_mass_reports_unknown_element() {
        let atoms = dimer();
        let result = atoms.center_of_mass(|z| if z == 78 { Some(1.0) } else { None });
        assert_eq!(result, Err(79));
    }
}
