use super::atoms::Atoms;
use super::value::KeyValue;
use crate::core::neighbors::NeighborMatrix;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Cached, recomputable results attached to a candidate.
///
/// The cache never affects a candidate's identity or labels. Fingerprint
/// generators populate it through a shared reference, so a pipeline run can
/// memoise expensive neighbour analysis without requiring `&mut` access.
#[derive(Debug, Clone, Default)]
pub struct CandidateData {
    nnmat: OnceLock<NeighborMatrix>,
}

impl CandidateData {
    /// Returns the cached neighbour matrix, if one has been computed or loaded.
    pub fn nnmat(&self) -> Option<&NeighborMatrix> {
        self.nnmat.get()
    }

    /// Stores a neighbour matrix unless one is already cached.
    ///
    /// Returns the matrix held by the cache afterwards, which is the previously
    /// cached one if the cache was already populated.
    pub fn cache_nnmat(&self, matrix: NeighborMatrix) -> &NeighborMatrix {
        self.nnmat.get_or_init(move || matrix)
    }

    /// Replaces any cached neighbour matrix.
    pub fn set_nnmat(&mut self, matrix: NeighborMatrix) {
        self.nnmat = OnceLock::from(matrix);
    }

    /// Drops every cached result.
    pub fn clear(&mut self) {
        self.nnmat.take();
    }

    pub fn is_empty(&self) -> bool {
        self.nnmat.get().is_none()
    }
}

/// A candidate structure from a genetic-algorithm search.
///
/// Mirrors a row of the GA database: a storage id (absent for candidates that
/// were never persisted), a globally unique string id, the atomic structure,
/// its key-value metadata (scores, flags), and the cached data block.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Row id in the GA database, if the candidate was loaded from one.
    pub id: Option<i64>,
    /// Globally unique identifier, used as the `uuid` column in descriptor stores.
    pub unique_id: String,
    /// The atomic structure.
    pub atoms: Atoms,
    /// Metadata such as `raw_score`, `relaxed` or `generation`.
    pub key_value_pairs: BTreeMap<String, KeyValue>,
    /// Cached results that may be invalidated independently.
    pub data: CandidateData,
}

impl Candidate {
    pub fn new(unique_id: impl Into<String>, atoms: Atoms) -> Self {
        Self {
            id: None,
            unique_id: unique_id.into(),
            atoms,
            key_value_pairs: BTreeMap::new(),
            data: CandidateData::default(),
        }
    }

    pub fn with_value(mut self, key: &str, value: impl Into<KeyValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<KeyValue>) {
        self.key_value_pairs.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&KeyValue> {
        self.key_value_pairs.get(key)
    }

    /// Whether the metadata contains `key`, regardless of its value.
    pub fn has_key(&self, key: &str) -> bool {
        self.key_value_pairs.contains_key(key)
    }

    /// The target value stored under `key`, if it is a defined numeric label.
    pub fn target(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(KeyValue::as_target)
    }

    /// Whether `key` holds a truthy flag.
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(KeyValue::is_truthy)
    }

    /// Invalidates cached results such as the neighbour matrix.
    pub fn clear_cache(&mut self) {
        self.data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn candidate() -> Candidate {
        let atoms = Atoms::new(vec![78], vec![Point3::origin()]).unwrap();
        Candidate::new("c-1", atoms)
            .with_value("raw_score", -2.5)
            .with_value("relaxed", true)
            .with_value("description", "seed")
    }

    fn matrix() -> NeighborMatrix {
        NeighborMatrix::new(vec![78], 0.2, vec![0.0])
    }

    #[test]
    fn target_returns_numeric_labels_only() {
        let c = candidate();
        assert_eq!(c.target("raw_score"), Some(-2.5));
        assert_eq!(c.target("description"), None);
        assert_eq!(c.target("missing"), None);
        assert!(c.has_key("description"));
    }

    #[test]
    fn flag_reads_truthy_values() {
        let c = candidate();
        assert!(c.flag("relaxed"));
        assert!(!c.flag("extinct"));
    }

    #[test]
    fn cache_keeps_first_value_until_cleared() {
        let mut c = candidate();
        assert!(c.data.is_empty());

        c.data.cache_nnmat(matrix());
        let other = NeighborMatrix::new(vec![78], 0.5, vec![1.0]);
        assert_eq!(c.data.cache_nnmat(other).tolerance(), 0.2);

        c.clear_cache();
        assert!(c.data.nnmat().is_none());
        assert_eq!(c.target("raw_score"), Some(-2.5));
        assert_eq!(c.unique_id, "c-1");
    }

    #[test]
    fn set_nnmat_replaces_cached_value() {
        let mut c = candidate();
        c.data.cache_nnmat(matrix());
        c.data.set_nnmat(NeighborMatrix::new(vec![78], 0.5, vec![1.0]));
        assert_eq!(c.data.nnmat().unwrap().tolerance(), 0.5);
    }
}
