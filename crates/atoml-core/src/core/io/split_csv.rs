use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Which subset a sample was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubsetKind {
    Test,
    Train,
}

/// One row of a split assignment table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitRecord {
    pub unique_id: String,
    pub set: SubsetKind,
    pub target: f64,
}

/// Writes split assignments as CSV with a `unique_id,set,target` header.
pub fn write_split<W: Write>(
    writer: W,
    records: impl IntoIterator<Item = SplitRecord>,
) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_split_to_path(
    path: &Path,
    records: impl IntoIterator<Item = SplitRecord>,
) -> Result<(), csv::Error> {
    let file = std::fs::File::create(path)?;
    write_split(std::io::BufWriter::new(file), records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_lowercase_set_names() {
        let mut buf = Vec::new();
        write_split(
            &mut buf,
            vec![
                SplitRecord {
                    unique_id: "a".into(),
                    set: SubsetKind::Test,
                    target: -1.5,
                },
                SplitRecord {
                    unique_id: "b".into(),
                    set: SubsetKind::Train,
                    target: 2.0,
                },
            ],
        )
        .unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "unique_id,set,target\na,test,-1.5\nb,train,2.0\n");
    }

    #[test]
    fn writes_to_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("split.csv");
        write_split_to_path(&path, Vec::new()).unwrap();
        assert!(path.exists());
    }
}
