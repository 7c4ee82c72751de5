//! Tabular I/O: reading the comment table and writing it back with the
//! predicted stance column appended.

use std::fs;
use std::io;
use std::path::Path;

use csv::StringRecord;
use tracing::debug;

use crate::error::{Result, StanceError};

/// Dataset marker hashtag deleted from every comment at ingestion.
pub const SEMST_MARKER: &str = "#SemST";

/// Column the input table must provide.
pub const COMMENT_COLUMN: &str = "comment";

/// Column appended to the output table.
pub const STANCE_COLUMN: &str = "LLM_stance";

/// One comment, identified by its row position in the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub id: usize,
    pub text: String,
}

/// The input table, held in memory for the duration of one run.
///
/// All columns are preserved byte-for-byte except the comment column, which
/// has every occurrence of [`SEMST_MARKER`] deleted at ingestion (plain
/// substring deletion, no other normalization).
#[derive(Debug, Clone)]
pub struct CommentTable {
    headers: StringRecord,
    comment_idx: usize,
    rows: Vec<StringRecord>,
}

impl CommentTable {
    /// Read a CSV file with at least a `comment` column.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = fs::File::open(path).map_err(|e| {
            StanceError::Ingestion(format!("Failed to open '{}': {e}", path.display()))
        })?;
        let table = Self::from_reader(file)?;
        debug!(rows = table.len(), path = %path.display(), "comment table loaded");
        Ok(table)
    }

    /// Read a CSV stream with at least a `comment` column.
    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| StanceError::Ingestion(format!("Failed to read header row: {e}")))?
            .clone();
        let comment_idx = headers
            .iter()
            .position(|h| h == COMMENT_COLUMN)
            .ok_or_else(|| {
                StanceError::Ingestion(format!(
                    "Input table has no '{COMMENT_COLUMN}' column (found: {})",
                    headers.iter().collect::<Vec<_>>().join(", ")
                ))
            })?;

        let mut rows = Vec::new();
        for (i, record) in rdr.records().enumerate() {
            let record =
                record.map_err(|e| StanceError::Ingestion(format!("Bad row {}: {e}", i + 1)))?;
            rows.push(strip_marker(record, comment_idx));
        }

        Ok(Self {
            headers,
            comment_idx,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Comments in file row order, marker already stripped.
    pub fn records(&self) -> impl Iterator<Item = CommentRecord> + '_ {
        self.rows.iter().enumerate().map(|(id, row)| CommentRecord {
            id,
            text: row.get(self.comment_idx).unwrap_or_default().to_string(),
        })
    }

    /// Write the table plus a final stance column, atomically.
    ///
    /// The data lands in a sibling temp file first and is renamed into place,
    /// so a failed run never leaves a partially written output behind.
    pub fn write_with_labels(&self, path: &Path, labels: &[String]) -> Result<()> {
        if labels.len() != self.rows.len() {
            return Err(StanceError::Persistence(format!(
                "Label count ({}) does not match row count ({})",
                labels.len(),
                self.rows.len()
            )));
        }

        let tmp_path = path.with_file_name(format!(
            "{}.tmp",
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("stance-output")
        ));

        let write_result = (|| -> Result<()> {
            let file = fs::File::create(&tmp_path).map_err(|e| {
                StanceError::Persistence(format!(
                    "Failed to create '{}': {e}",
                    tmp_path.display()
                ))
            })?;
            self.write_records(file, labels)?;
            fs::rename(&tmp_path, path).map_err(|e| {
                StanceError::Persistence(format!(
                    "Failed to move output into '{}': {e}",
                    path.display()
                ))
            })
        })();

        if write_result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        write_result
    }

    fn write_records<W: io::Write>(&self, writer: W, labels: &[String]) -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);

        let mut header_row = self.headers.clone();
        header_row.push_field(STANCE_COLUMN);
        wtr.write_record(&header_row)
            .map_err(|e| StanceError::Persistence(format!("Failed to write header: {e}")))?;

        for (row, label) in self.rows.iter().zip(labels) {
            let mut out = row.clone();
            out.push_field(label);
            wtr.write_record(&out)
                .map_err(|e| StanceError::Persistence(format!("Failed to write row: {e}")))?;
        }

        wtr.flush()
            .map_err(|e| StanceError::Persistence(format!("Failed to flush output: {e}")))
    }
}

fn strip_marker(record: StringRecord, comment_idx: usize) -> StringRecord {
    let mut out = StringRecord::new();
    for (i, field) in record.iter().enumerate() {
        if i == comment_idx {
            out.push_field(&field.replace(SEMST_MARKER, ""));
        } else {
            out.push_field(field);
        }
    }
    out
}
