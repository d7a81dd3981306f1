use super::sampling::Sampler;
use crate::core::io::split_csv::{SplitRecord, SubsetKind};
use crate::core::models::candidate::Candidate;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SplitError {
    #[error("No candidate in the pool carries the key '{key}'")]
    MissingKey { key: String },
}

/// Samples drawn from a pool, with their targets and the cumulative claim record.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// The sampled candidates, cloned out of the pool, in selection order.
    pub candidates: Vec<Candidate>,
    /// The target value of each sampled candidate.
    pub target: Vec<f64>,
    /// Pool index of each sampled candidate.
    pub indices: Vec<usize>,
    /// Every pool index claimed so far, including claims made before this draw.
    pub taken: BTreeSet<usize>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn unique_ids(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.unique_id.clone()).collect()
    }

    /// Invalidates the cached results of every sampled candidate.
    pub fn clear_caches(&mut self) {
        self.candidates.iter_mut().for_each(Candidate::clear_cache);
    }
}

/// Disjoint test and train datasets drawn from one pool.
#[derive(Debug, Clone, Default)]
pub struct Split {
    pub test: Dataset,
    pub train: Dataset,
}

impl Split {
    /// Every pool index claimed by the test and train draws.
    pub fn taken(&self) -> &BTreeSet<usize> {
        &self.train.taken
    }

    /// One assignment record per sampled candidate, test rows first.
    pub fn records(&self) -> Vec<SplitRecord> {
        let rows = |dataset: &Dataset, set: SubsetKind| {
            dataset
                .candidates
                .iter()
                .zip(&dataset.target)
                .map(|(c, &target)| SplitRecord {
                    unique_id: c.unique_id.clone(),
                    set,
                    target,
                })
                .collect::<Vec<_>>()
        };
        let mut records = rows(&self.test, SubsetKind::Test);
        records.extend(rows(&self.train, SubsetKind::Train));
        records
    }
}

/// Draws a test set of up to `testsize` candidates carrying a defined value for `key`.
///
/// # Errors
///
/// Returns [`SplitError::MissingKey`] if no candidate in the pool carries `key`.
pub fn get_unique<S: Sampler + ?Sized>(
    pool: &[Candidate],
    testsize: usize,
    key: &str,
    sampler: &mut S,
) -> Result<Dataset, SplitError> {
    draw(pool, testsize, &BTreeSet::new(), key, sampler)
}

/// Draws a train set of up to `trainsize` candidates, skipping indices in `taken`.
///
/// # Errors
///
/// Returns [`SplitError::MissingKey`] if no candidate in the pool carries `key`.
pub fn get_train<S: Sampler + ?Sized>(
    pool: &[Candidate],
    trainsize: usize,
    taken: &BTreeSet<usize>,
    key: &str,
    sampler: &mut S,
) -> Result<Dataset, SplitError> {
    draw(pool, trainsize, taken, key, sampler)
}

#[instrument(level = "debug", skip(pool, taken, sampler), fields(pool_size = pool.len()))]
fn draw<S: Sampler + ?Sized>(
    pool: &[Candidate],
    size: usize,
    taken: &BTreeSet<usize>,
    key: &str,
    sampler: &mut S,
) -> Result<Dataset, SplitError> {
    if !pool.iter().any(|c| c.has_key(key)) {
        return Err(SplitError::MissingKey {
            key: key.to_string(),
        });
    }

    let eligible: Vec<usize> = pool
        .iter()
        .enumerate()
        .filter(|(i, c)| !taken.contains(i) && c.target(key).is_some())
        .map(|(i, _)| i)
        .collect();
    if eligible.len() < size {
        warn!(
            requested = size,
            available = eligible.len(),
            "Fewer eligible candidates than requested; returning all of them."
        );
    }

    // Keep only distinct eligible picks, whatever the sampler returned.
    let allowed: BTreeSet<usize> = eligible.iter().copied().collect();
    let mut seen = BTreeSet::new();
    let chosen: Vec<usize> = sampler
        .choose(&eligible, size)
        .into_iter()
        .filter(|i| allowed.contains(i) && seen.insert(*i))
        .take(size)
        .collect();

    let mut dataset = Dataset {
        taken: taken.clone(),
        ..Dataset::default()
    };
    for &i in &chosen {
        let candidate = &pool[i];
        if let Some(target) = candidate.target(key) {
            dataset.candidates.push(candidate.clone());
            dataset.target.push(target);
            dataset.indices.push(i);
            dataset.taken.insert(i);
        }
    }
    debug!(drawn = dataset.len(), "Dataset drawn.");
    Ok(dataset)
}

/// Splits a pool into disjoint test and train datasets.
pub struct DatasetSplitter<S: Sampler> {
    key: String,
    sampler: S,
}

impl<S: Sampler> DatasetSplitter<S> {
    pub fn new(key: impl Into<String>, sampler: S) -> Self {
        Self {
            key: key.into(),
            sampler,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Draws the test set first, then the train set from the remaining candidates.
    pub fn split(
        &mut self,
        pool: &[Candidate],
        testsize: usize,
        trainsize: usize,
    ) -> Result<Split, SplitError> {
        let test = get_unique(pool, testsize, &self.key, &mut self.sampler)?;
        let train = get_train(pool, trainsize, &test.taken, &self.key, &mut self.sampler)?;
        Ok(Split { test, train })
    }

    /// Draws a further train set that avoids everything claimed by `previous`.
    pub fn extend(
        &mut self,
        pool: &[Candidate],
        previous: &Split,
        trainsize: usize,
    ) -> Result<Dataset, SplitError> {
        get_train(
            pool,
            trainsize,
            previous.taken(),
            &self.key,
            &mut self.sampler,
        )
    }
}
