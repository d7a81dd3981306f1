use crate::core::io::ga_db::CandidateDatabase;
use crate::core::models::candidate::Candidate;
use crate::engine::config::SplitConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::{ProgressReporter, Stage};
use crate::engine::sampling::UniformSampler;
use crate::engine::split::{DatasetSplitter, Split};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{info, instrument};

/// A loaded candidate pool and the split drawn from it.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub pool_size: usize,
    /// Element ordering used for per-element fingerprints.
    pub atom_numbers: Vec<u8>,
    pub split: Split,
}

/// The configured element ordering, or the sorted union of the pool's elements.
pub fn resolve_atom_numbers(pool: &[Candidate], configured: Option<&[u8]>) -> Vec<u8> {
    match configured {
        Some(numbers) if !numbers.is_empty() => numbers.to_vec(),
        _ => pool
            .iter()
            .flat_map(|c| c.atoms.unique_numbers())
            .collect::<BTreeSet<u8>>()
            .into_iter()
            .collect(),
    }
}

/// Loads the relaxed candidates of a GA database.
pub fn load_pool(
    database_path: &Path,
    use_extinct: bool,
    reporter: &ProgressReporter,
) -> Result<Vec<Candidate>, EngineError> {
    reporter.stage(Stage::LoadCandidates, || -> Result<_, EngineError> {
        let db = CandidateDatabase::open(database_path)?;
        let pool = db.relaxed_candidates(use_extinct)?;
        info!(count = pool.len(), "Loaded relaxed candidates.");
        Ok(pool)
    })
}

/// Loads the pool and splits it into test and train datasets.
#[instrument(level = "info", skip_all, fields(database = %database_path.display()))]
pub fn load_and_split(
    database_path: &Path,
    split: &SplitConfig,
    atom_numbers: Option<&[u8]>,
    reporter: &ProgressReporter,
) -> Result<PreparedData, EngineError> {
    let pool = load_pool(database_path, split.use_extinct, reporter)?;
    let atom_numbers = resolve_atom_numbers(&pool, atom_numbers);

    let drawn = reporter.stage(Stage::Split, || {
        let mut splitter =
            DatasetSplitter::new(split.key.as_str(), UniformSampler::from_seed_option(split.seed));
        splitter.split(&pool, split.test_size, split.train_size)
    })?;
    info!(
        test = drawn.test.len(),
        train = drawn.train.len(),
        key = %split.key,
        "Dataset split."
    );

    Ok(PreparedData {
        pool_size: pool.len(),
        atom_numbers,
        split: drawn,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::core::io::ga_db::CandidateDatabase;
    use crate::core::models::atoms::Atoms;
    use crate::core::models::candidate::Candidate;
    use nalgebra::Point3;
    use std::path::Path;

    /// A relaxed Pt/Au cluster whose score depends on its composition.
    pub fn cluster(i: usize) -> Candidate {
        let n_au = i % 6;
        let numbers: Vec<u8> = (0..6).map(|k| if k < n_au { 79 } else { 78 }).collect();
        let positions = (0..6)
            .map(|k| {
                let angle = k as f64 * std::f64::consts::PI / 3.0;
                let radius = 2.7 + 0.01 * i as f64;
                Point3::new(radius * angle.cos(), radius * angle.sin(), 0.1 * (k % 2) as f64)
            })
            .collect();
        let score = -(n_au as f64) * 0.4 - 0.02 * i as f64;
        Candidate::new(format!("cand-{i}"), Atoms::new(numbers, positions).unwrap())
            .with_value("raw_score", score)
            .with_value("relaxed", true)
    }

    /// Writes `n` relaxed clusters plus one unrelaxed and one extinct row.
    pub fn write_ga_db(path: &Path, n: usize) {
        let db = CandidateDatabase::create(path).unwrap();
        for i in 0..n {
            db.add_candidate(&cluster(i)).unwrap();
        }
        db.add_candidate(&cluster(n).with_value("relaxed", false))
            .unwrap();
        let mut extinct = cluster(n + 1);
        extinct.set("extinct", 1i64);
        db.add_candidate(&extinct).unwrap();
    }
}
