use nalgebra::DMatrix;
use rusqlite::{Connection, OpenFlags, params_from_iter, types::Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Name of the leading identifier column.
pub const ID_COLUMN: &str = "uuid";
/// Name of the trailing target column.
pub const TARGET_COLUMN: &str = "target";

#[derive(Debug, Error)]
pub enum DescriptorDbError {
    #[error("Descriptor store not found: {}", path.display())]
    StorageNotFound { path: PathBuf },
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),
    #[error("Reserved column name '{0}' cannot be used as a feature name")]
    ReservedName(String),
    #[error("Row data mismatch: {0}")]
    RowMismatch(String),
}

/// Quotes an SQL identifier so arbitrary feature names (e.g. `a*b`) are valid column names.
fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A tabular on-disk store of fingerprint vectors.
///
/// Each table has a `uuid` text column, one `REAL` column per feature and a
/// trailing `target` column. Columns are queried by name.
pub struct DescriptorDatabase {
    conn: Connection,
    table: String,
    path: PathBuf,
}

impl DescriptorDatabase {
    /// Creates a store with a fresh table for the given feature names.
    ///
    /// An existing table of the same name is replaced.
    pub fn create(
        path: impl AsRef<Path>,
        table: &str,
        feature_names: &[String],
    ) -> Result<Self, DescriptorDbError> {
        let path = path.as_ref();
        if let Some(name) = feature_names
            .iter()
            .find(|n| n.as_str() == ID_COLUMN || n.as_str() == TARGET_COLUMN)
        {
            return Err(DescriptorDbError::ReservedName(name.clone()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let columns = std::iter::once(format!("{} TEXT NOT NULL", quote(ID_COLUMN)))
            .chain(feature_names.iter().map(|n| format!("{} REAL", quote(n))))
            .chain(std::iter::once(format!("{} REAL", quote(TARGET_COLUMN))))
            .collect::<Vec<_>>()
            .join(", ");
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({columns});",
            table = quote(table),
        ))?;
        debug!(
            "Created descriptor store {:?} with {} feature columns.",
            path,
            feature_names.len()
        );

        Ok(Self {
            conn,
            table: table.to_string(),
            path: path.to_path_buf(),
        })
    }

    /// Opens an existing store.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorDbError::StorageNotFound`] if `path` does not exist.
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self, DescriptorDbError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DescriptorDbError::StorageNotFound {
                path: path.to_path_buf(),
            });
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            table: table.to_string(),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Inserts one row per sample inside a single transaction.
    pub fn insert_rows(
        &mut self,
        ids: &[String],
        matrix: &DMatrix<f64>,
        targets: &[f64],
    ) -> Result<usize, DescriptorDbError> {
        if ids.len() != matrix.nrows() || targets.len() != matrix.nrows() {
            return Err(DescriptorDbError::RowMismatch(format!(
                "{} ids, {} matrix rows, {} targets",
                ids.len(),
                matrix.nrows(),
                targets.len()
            )));
        }
        let expected_columns = self.get_column_names()?.len();
        if matrix.ncols() + 2 != expected_columns {
            return Err(DescriptorDbError::RowMismatch(format!(
                "matrix has {} columns but table '{}' has {} feature columns",
                matrix.ncols(),
                self.table,
                expected_columns.saturating_sub(2)
            )));
        }

        let placeholders = vec!["?"; expected_columns].join(", ");
        let sql = format!("INSERT INTO {} VALUES ({})", quote(&self.table), placeholders);

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for (row, (id, target)) in ids.iter().zip(targets).enumerate() {
                let matrix_row = matrix.row(row);
                let values = std::iter::once(Value::Text(id.clone()))
                    .chain(matrix_row.iter().map(|&v| Value::Real(v)))
                    .chain(std::iter::once(Value::Real(*target)));
                stmt.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(ids.len())
    }

    /// Column names in table order: `uuid`, the feature names, then `target`.
    pub fn get_column_names(&self) -> Result<Vec<String>, DescriptorDbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote(&self.table)))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Feature column names, i.e. all columns except `uuid` and `target`.
    pub fn feature_names(&self) -> Result<Vec<String>, DescriptorDbError> {
        Ok(self
            .get_column_names()?
            .into_iter()
            .filter(|n| n != ID_COLUMN && n != TARGET_COLUMN)
            .collect())
    }

    fn check_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<(), DescriptorDbError> {
        let columns = self.get_column_names()?;
        let missing = names
            .iter()
            .map(|n| n.as_ref())
            .find(|n| !columns.iter().any(|c| c.as_str() == *n));
        match missing {
            Some(name) => Err(DescriptorDbError::UnknownColumn(name.to_string())),
            None => Ok(()),
        }
    }

    /// Reads the named numeric columns into a matrix, one row per stored sample.
    pub fn query_db<S: AsRef<str>>(&self, names: &[S]) -> Result<DMatrix<f64>, DescriptorDbError> {
        self.check_columns(names)?;
        if names.is_empty() {
            return Ok(DMatrix::zeros(self.len()?, 0));
        }
        let columns = names
            .iter()
            .map(|n| quote(n.as_ref()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            columns,
            quote(&self.table)
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let width = names.len();
        let rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, f64>(i))
                    .collect::<Result<Vec<f64>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        Ok(DMatrix::from_row_slice(rows.len(), width, &flat))
    }

    /// Reads a single text column, such as `uuid`.
    pub fn query_text(&self, name: &str) -> Result<Vec<String>, DescriptorDbError> {
        self.check_columns(&[name])?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            quote(name),
            quote(&self.table)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let values = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(values)
    }

    /// Reads the `target` column as a flat vector.
    pub fn query_targets(&self) -> Result<Vec<f64>, DescriptorDbError> {
        Ok(self.query_db(&[TARGET_COLUMN])?.iter().copied().collect())
    }

    pub fn len(&self) -> Result<usize, DescriptorDbError> {
        let n: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote(&self.table)),
            [],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as usize)
    }

    pub fn is_empty(&self) -> Result<bool, DescriptorDbError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn names() -> Vec<String> {
        vec!["mass_0".into(), "composition_0".into(), "a*b".into()]
    }

    fn populated(path: &Path) -> DescriptorDatabase {
        let mut db = DescriptorDatabase::create(path, "OriginalFeatureSpace", &names()).unwrap();
        let matrix = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let ids = vec!["u1".to_string(), "u2".to_string()];
        assert_eq!(db.insert_rows(&ids, &matrix, &[-1.0, -2.0]).unwrap(), 2);
        db
    }

    #[test]
    fn columns_are_uuid_features_target() {
        let dir = tempdir().unwrap();
        let db = populated(&dir.path().join("train.sqlite"));
        assert_eq!(
            db.get_column_names().unwrap(),
            vec!["uuid", "mass_0", "composition_0", "a*b", "target"]
        );
        assert_eq!(db.feature_names().unwrap(), names());
    }

    #[test]
    fn query_by_column_subset_preserves_row_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.sqlite");
        drop(populated(&path));

        let db = DescriptorDatabase::open(&path, "OriginalFeatureSpace").unwrap();
        let m = db.query_db(&["a*b", "mass_0"]).unwrap();
        assert_eq!(m, DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 6.0, 4.0]));
        assert_eq!(db.query_targets().unwrap(), vec![-1.0, -2.0]);
        assert_eq!(db.query_text(ID_COLUMN).unwrap(), vec!["u1", "u2"]);
        assert_eq!(db.len().unwrap(), 2);
    }

    #[test]
    fn open_missing_store_is_storage_not_found() {
        let dir = tempdir().unwrap();
        let result = DescriptorDatabase::open(dir.path().join("none.sqlite"), "t");
        assert!(matches!(
            result,
            Err(DescriptorDbError::StorageNotFound { .. })
        ));
    }

    #[test]
    fn unknown_columns_are_rejected() {
        let dir = tempdir().unwrap();
        let db = populated(&dir.path().join("train.sqlite"));
        assert!(matches!(
            db.query_db(&["nope"]),
            Err(DescriptorDbError::UnknownColumn(name)) if name == "nope"
        ));
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let dir = tempdir().unwrap();
        let mut db =
            DescriptorDatabase::create(dir.path().join("t.sqlite"), "t", &names()).unwrap();
        let matrix = DMatrix::zeros(2, 2);
        let ids = vec!["a".to_string(), "b".to_string()];
        assert!(matches!(
            db.insert_rows(&ids, &matrix, &[0.0, 0.0]),
            Err(DescriptorDbError::RowMismatch(_))
        ));
        assert!(db.is_empty().unwrap());
    }

    #[test]
    fn reserved_feature_names_are_rejected() {
        let dir = tempdir().unwrap();
        let result =
            DescriptorDatabase::create(dir.path().join("t.sqlite"), "t", &["target".to_string()]);
        assert!(matches!(result, Err(DescriptorDbError::ReservedName(_))));
    }

    #[test]
    fn create_replaces_an_existing_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("train.sqlite");
        drop(populated(&path));
        let db = DescriptorDatabase::create(&path, "OriginalFeatureSpace", &names()).unwrap();
        assert!(db.is_empty().unwrap());
    }
}
