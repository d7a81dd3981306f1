use crate::core::models::atoms::{Atoms, AtomsError};
use crate::core::models::candidate::Candidate;
use crate::core::models::value::KeyValue;
use crate::core::neighbors::NeighborMatrix;
use nalgebra::{Matrix3, Point3};
use rusqlite::{Connection, OpenFlags, params};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

const RELAXED_KEY: &str = "relaxed";
const EXTINCT_KEY: &str = "extinct";
const SCORE_KEY: &str = "raw_score";
const TABLE: &str = "systems";

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS systems (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unique_id TEXT NOT NULL UNIQUE,
    numbers TEXT NOT NULL,
    positions TEXT NOT NULL,
    cell TEXT,
    key_value_pairs TEXT NOT NULL DEFAULT '{}',
    data TEXT NOT NULL DEFAULT '{}'
);
";

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Candidate database not found: {}", path.display())]
    StorageNotFound { path: PathBuf },
    #[error("'{}' is not a candidate database: table 'systems' is missing", path.display())]
    MissingTable { path: PathBuf },
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON in column '{column}' of row {row}: {source}")]
    Json {
        column: &'static str,
        row: i64,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid structure in row {row}: {source}")]
    InvalidStructure {
        row: i64,
        #[source]
        source: AtomsError,
    },
    #[error("Failed to encode candidate '{unique_id}': {source}")]
    Encode {
        unique_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Persisted form of a candidate's cached data block.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nnmat: Option<NeighborMatrix>,
}

struct RawRow {
    id: i64,
    unique_id: String,
    numbers: String,
    positions: String,
    cell: Option<String>,
    key_value_pairs: String,
    data: String,
}

/// A SQLite store of GA search candidates.
///
/// Every row holds one structure. Atomic numbers, positions, the cell, the
/// key-value pairs and the cached data block are stored as JSON text columns.
pub struct CandidateDatabase {
    conn: Connection,
    path: PathBuf,
}

impl CandidateDatabase {
    /// Opens an existing database read-only.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::StorageNotFound`] if `path` does not exist,
    /// [`DatabaseError::MissingTable`] if the file has no `systems` table, and a
    /// SQLite error if the file cannot be opened as a database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DatabaseError::StorageNotFound {
                path: path.to_path_buf(),
            });
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let tables: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [TABLE],
            |row| row.get(0),
        )?;
        if tables == 0 {
            return Err(DatabaseError::MissingTable {
                path: path.to_path_buf(),
            });
        }
        debug!("Opened candidate database at {:?}", path);
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Creates (or opens) a database at `path`, creating parent directories as needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Inserts a candidate and returns its row id.
    ///
    /// A cached neighbour matrix is persisted in the `data` column.
    pub fn add_candidate(&self, candidate: &Candidate) -> Result<i64, DatabaseError> {
        let encode = |source| DatabaseError::Encode {
            unique_id: candidate.unique_id.clone(),
            source,
        };

        let positions: Vec<[f64; 3]> = candidate
            .atoms
            .positions()
            .iter()
            .map(|p| [p.x, p.y, p.z])
            .collect();
        let cell = candidate
            .atoms
            .cell()
            .map(|m| {
                let rows: Vec<[f64; 3]> = (0..3)
                    .map(|i| [m[(i, 0)], m[(i, 1)], m[(i, 2)]])
                    .collect();
                serde_json::to_string(&rows)
            })
            .transpose()
            .map_err(encode)?;
        let data = StoredData {
            nnmat: candidate.data.nnmat().cloned(),
        };

        self.conn.execute(
            "INSERT INTO systems (unique_id, numbers, positions, cell, key_value_pairs, data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                candidate.unique_id,
                serde_json::to_string(candidate.atoms.numbers()).map_err(encode)?,
                serde_json::to_string(&positions).map_err(encode)?,
                cell,
                serde_json::to_string(&candidate.key_value_pairs).map_err(encode)?,
                serde_json::to_string(&data).map_err(encode)?,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn count(&self) -> Result<usize, DatabaseError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM systems", [], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    }

    /// Loads every candidate, ordered by row id.
    pub fn all_candidates(&self) -> Result<Vec<Candidate>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, unique_id, numbers, positions, cell, key_value_pairs, data
             FROM systems ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawRow {
                    id: row.get(0)?,
                    unique_id: row.get(1)?,
                    numbers: row.get(2)?,
                    positions: row.get(3)?,
                    cell: row.get(4)?,
                    key_value_pairs: row.get(5)?,
                    data: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(decode_row).collect()
    }

    /// Loads all relaxed candidates, best `raw_score` first.
    ///
    /// A candidate is relaxed when its `relaxed` key is truthy. Unless
    /// `use_extinct` is set, candidates flagged `extinct` are left out.
    /// Candidates without a numeric score come last, in row order.
    #[instrument(level = "debug", skip(self), fields(path = ?self.path))]
    pub fn relaxed_candidates(&self, use_extinct: bool) -> Result<Vec<Candidate>, DatabaseError> {
        let mut candidates: Vec<Candidate> = self
            .all_candidates()?
            .into_iter()
            .filter(|c| c.flag(RELAXED_KEY))
            .filter(|c| use_extinct || !c.flag(EXTINCT_KEY))
            .collect();
        candidates.sort_by(|a, b| {
            by_descending_score(a.target(SCORE_KEY), b.target(SCORE_KEY))
        });
        debug!(count = candidates.len(), "Loaded relaxed candidates.");
        Ok(candidates)
    }
}

fn by_descending_score(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn decode_row(raw: RawRow) -> Result<Candidate, DatabaseError> {
    let row = raw.id;
    let json_err =
        |column: &'static str| move |source| DatabaseError::Json { column, row, source };

    let numbers: Vec<u8> = serde_json::from_str(&raw.numbers).map_err(json_err("numbers"))?;
    let positions: Vec<[f64; 3]> =
        serde_json::from_str(&raw.positions).map_err(json_err("positions"))?;
    let key_value_pairs: BTreeMap<String, KeyValue> =
        serde_json::from_str(&raw.key_value_pairs).map_err(json_err("key_value_pairs"))?;
    let data: StoredData = serde_json::from_str(&raw.data).map_err(json_err("data"))?;

    let positions = positions
        .into_iter()
        .map(|[x, y, z]| Point3::new(x, y, z))
        .collect();
    let mut atoms = Atoms::new(numbers, positions)
        .map_err(|source| DatabaseError::InvalidStructure { row, source })?;
    if let Some(cell) = raw.cell {
        let rows: Vec<[f64; 3]> = serde_json::from_str(&cell).map_err(json_err("cell"))?;
        if rows.len() == 3 {
            let flat: Vec<f64> = rows.iter().flatten().copied().collect();
            atoms = atoms.with_cell(Matrix3::from_row_slice(&flat));
        }
    }

    let mut candidate = Candidate::new(raw.unique_id, atoms);
    candidate.id = Some(row);
    candidate.key_value_pairs = key_value_pairs;
    if let Some(nnmat) = data.nnmat {
        candidate.data.set_nnmat(nnmat);
    }
    Ok(candidate)
}
