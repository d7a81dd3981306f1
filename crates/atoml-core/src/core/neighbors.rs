use crate::core::elements::covalent_radius;
use crate::core::models::atoms::Atoms;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NeighborError {
    #[error("No covalent radius is known for atomic number {0}")]
    UnknownElement(u8),
}

/// Element-pair mean neighbour counts for one structure.
///
/// Entry `(a, b)` holds the average number of neighbours of element
/// `atom_numbers[b]` around an atom of element `atom_numbers[a]`. The matrix
/// records the element ordering and bond tolerance it was computed with, so a
/// cached copy is only reused by callers asking for the same analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborMatrix {
    atom_numbers: Vec<u8>,
    tolerance: f64,
    values: Vec<f64>,
}

impl NeighborMatrix {
    pub fn new(atom_numbers: Vec<u8>, tolerance: f64, values: Vec<f64>) -> Self {
        Self {
            atom_numbers,
            tolerance,
            values,
        }
    }

    pub fn atom_numbers(&self) -> &[u8] {
        &self.atom_numbers
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Row-major flattened values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.atom_numbers.len()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        let n = self.dim();
        (row < n && col < n)
            .then(|| self.values.get(row * n + col).copied())
            .flatten()
    }

    /// Whether this matrix was computed for the given element ordering and tolerance.
    pub fn matches(&self, atom_numbers: &[u8], tolerance: f64) -> bool {
        self.atom_numbers == atom_numbers && (self.tolerance - tolerance).abs() < 1e-12
    }
}

/// Builds the bonded-neighbour list of a structure.
///
/// Atoms `i` and `j` are bonded when their distance is below the sum of their
/// covalent radii plus `tolerance`.
///
/// # Errors
///
/// Returns [`NeighborError::UnknownElement`] for atoms without a covalent radius.
pub fn neighbor_list(atoms: &Atoms, tolerance: f64) -> Result<Vec<Vec<usize>>, NeighborError> {
    let radii = atoms
        .numbers()
        .iter()
        .map(|&z| covalent_radius(z).ok_or(NeighborError::UnknownElement(z)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut neighbors = vec![Vec::new(); atoms.len()];
    for (i, j) in (0..atoms.len()).tuple_combinations() {
        if atoms.distance(i, j) < radii[i] + radii[j] + tolerance {
            neighbors[i].push(j);
            neighbors[j].push(i);
        }
    }
    Ok(neighbors)
}

/// Computes the element-pair neighbour matrix from a neighbour list.
///
/// Atoms whose element is not listed in `atom_numbers` still take part in bond
/// detection but contribute no rows or columns.
pub fn nnmat_from_neighbors(
    atoms: &Atoms,
    neighbors: &[Vec<usize>],
    atom_numbers: &[u8],
    tolerance: f64,
) -> NeighborMatrix {
    let n = atom_numbers.len();
    let index_of = |z: u8| atom_numbers.iter().position(|&t| t == z);

    let mut counts = vec![0.0; n * n];
    let mut atoms_per_type = vec![0usize; n];
    for (i, &z) in atoms.numbers().iter().enumerate() {
        let Some(row) = index_of(z) else { continue };
        atoms_per_type[row] += 1;
        for &j in &neighbors[i] {
            if let Some(col) = index_of(atoms.numbers()[j]) {
                counts[row * n + col] += 1.0;
            }
        }
    }

    for (row, &count) in atoms_per_type.iter().enumerate() {
        if count > 0 {
            for value in &mut counts[row * n..(row + 1) * n] {
                *value /= count as f64;
            }
        }
    }

    NeighborMatrix::new(atom_numbers.to_vec(), tolerance, counts)
}

/// Computes the element-pair neighbour matrix of a structure.
///
/// # Errors
///
/// Returns [`NeighborError::UnknownElement`] for atoms without a covalent radius.
pub fn compute_nnmat(
    atoms: &Atoms,
    atom_numbers: &[u8],
    tolerance: f64,
) -> Result<NeighborMatrix, NeighborError> {
    let neighbors = neighbor_list(atoms, tolerance)?;
    Ok(nnmat_from_neighbors(
        atoms,
        &neighbors,
        atom_numbers,
        tolerance,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    // Pt-Au-Pt chain with 2.7 A spacing: the outer atoms are 5.4 A apart.
    fn chain() -> Atoms {
        Atoms::new(
            vec![78, 79, 78],
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(2.7, 0.0, 0.0),
                Point3::new(5.4, 0.0, 0.0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn neighbor_list_uses_covalent_radii_plus_tolerance() {
        let neighbors = neighbor_list(&chain(), 0.2).unwrap();
        assert_eq!(neighbors, vec![vec![1], vec![0, 2], vec![1]]);
    }

    #[test]
    fn zero_tolerance_can_break_bonds() {
        // Pt-Pt at 2.8 A sits just outside the 2.72 A radius sum.
        let atoms = Atoms::new(
            vec![78, 78],
            vec![Point3::origin(), Point3::new(2.8, 0.0, 0.0)],
        )
        .unwrap();
        assert_eq!(
            neighbor_list(&atoms, 0.0).unwrap(),
            vec![Vec::<usize>::new(), Vec::new()]
        );
        assert_eq!(neighbor_list(&atoms, 0.2).unwrap(), vec![vec![1], vec![0]]);
    }

    #[test]
    fn nnmat_averages_counts_per_source_atom() {
        let m = compute_nnmat(&chain(), &[78, 79], 0.2).unwrap();
        // Each Pt has one Au neighbour; the Au has two Pt neighbours.
        assert_eq!(m.values(), &[0.0, 1.0, 2.0, 0.0]);
        assert_eq!(m.get(1, 0), Some(2.0));
        assert_eq!(m.get(2, 0), None);
    }

    #[test]
    fn absent_element_rows_stay_zero() {
        let m = compute_nnmat(&chain(), &[46, 78, 79], 0.2).unwrap();
        assert_eq!(&m.values()[0..3], &[0.0, 0.0, 0.0]);
        assert_eq!(m.dim(), 3);
    }

    #[test]
    fn unknown_elements_are_reported() {
        let atoms = Atoms::new(vec![200], vec![Point3::origin()]).unwrap();
        assert_eq!(
            neighbor_list(&atoms, 0.2),
            Err(NeighborError::UnknownElement(200))
        );
    }

    #[test]
    fn matches_checks_ordering_and_tolerance() {
        let m = compute_nnmat(&chain(), &[78, 79], 0.2).unwrap();
        assert!(m.matches(&[78, 79], 0.2));
        assert!(!m.matches(&[79, 78], 0.2));
        assert!(!m.matches(&[78, 79], 0.3));
    }

    #[test]
    fn matrix_serializes_to_json_and_back() {
        let m = compute_nnmat(&chain(), &[78, 79], 0.2).unwrap();
        let json = serde_json::to_string(&m).unwrap();
        let back: NeighborMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
