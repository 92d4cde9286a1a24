//! Log → store import pipeline.

use crate::parse::{parse_row, ImportRow, ParseResult, StatusField};
use crate::store::{AccessStore, StoreError};
use chrono_tz::Tz;
use gatewatch_core::eventlog::{is_blank, snapshot_reader, strip_bom};
use gatewatch_core::LogRow;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("cannot read access log {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Counters for one import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    /// Non-blank data rows seen (header excluded).
    pub rows_read: usize,
    /// Rows that passed every check.
    pub rows_validated: usize,
    /// Rows reported and skipped.
    pub rows_skipped: usize,
    /// Validated rows whose status was not recognized; kept out of the store.
    pub rows_held: usize,
    /// Rows new to the store.
    pub rows_inserted: usize,
}

/// Parse the log and bulk-insert every valid row.
///
/// Reads only the bytes present when the file was opened. Per-row problems
/// are logged and skipped; I/O and store failures abort the run with
/// nothing committed.
pub fn import_log(path: &Path, store: &mut AccessStore, tz: Tz) -> Result<ImportResult, ImportError> {
    let (rows, mut result) = read_log(path, tz)?;

    let mut batch: Vec<ImportRow> = Vec::with_capacity(rows.len());
    for (line, row) in rows {
        if let StatusField::Raw(text) = &row.status {
            tracing::warn!(line, status = %text, "unrecognized status; row held back");
            result.rows_held += 1;
            continue;
        }
        batch.push(row);
    }

    result.rows_inserted = store.insert_batch(&batch)?;
    tracing::info!(
        path = %path.display(),
        read = result.rows_read,
        validated = result.rows_validated,
        skipped = result.rows_skipped,
        held = result.rows_held,
        inserted = result.rows_inserted,
        "import finished"
    );
    Ok(result)
}

/// Parse every row of the log, returning valid rows with their line numbers.
pub fn read_log(path: &Path, tz: Tz) -> Result<(Vec<(u64, ImportRow)>, ImportResult), ImportError> {
    let read_err = |source: std::io::Error| ImportError::Read {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(read_err)?;
    let mut reader = snapshot_reader(file).map_err(read_err)?;

    let mut result = ImportResult::default();
    let mut valid = Vec::new();

    for record in reader.byte_records() {
        let record = record.map_err(|source| ImportError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let mut fields: Vec<String> = record
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        if let Some(first) = fields.first_mut() {
            *first = strip_bom(first).to_string();
        }

        if is_blank(&fields) || LogRow::is_header(&fields) {
            continue;
        }
        result.rows_read += 1;

        match parse_row(&fields, tz) {
            ParseResult::Valid(row) => {
                result.rows_validated += 1;
                valid.push((line, row));
            }
            ParseResult::Skipped(reason) => {
                tracing::warn!(line, row = ?fields, %reason, "row skipped");
                result.rows_skipped += 1;
            }
        }
    }

    Ok((valid, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::Sao_Paulo;
    use std::io::Write;

    fn write_log(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        f.flush().unwrap();
        f
    }

    #[test]
    fn test_header_and_blank_rows_not_counted() {
        let log = write_log(&[
            "data,hora,id,status,primeira_vez,ocorrencia",
            "",
            ",,,,,",
            "01/01/2024,10:00:00,Identity 1,Aprovado,sim,1",
        ]);
        let (rows, result) = read_log(log.path(), Sao_Paulo).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(result.rows_read, 1);
        assert_eq!(result.rows_validated, 1);
        assert_eq!(result.rows_skipped, 0);
    }

    #[test]
    fn test_short_and_bad_rows_are_skipped() {
        let log = write_log(&[
            "01/01/2024,10:00:00,Identity 1,Aprovado",
            "xx/01/2024,10:00:00,Identity 1,Aprovado,sim,1",
            "01/01/2024,10:00:05,Identity 1,Negado,nao,2",
        ]);
        let (rows, result) = read_log(log.path(), Sao_Paulo).unwrap();
        assert_eq!(result.rows_read, 3);
        assert_eq!(result.rows_skipped, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, 3);
    }

    #[test]
    fn test_bom_is_stripped() {
        let log = write_log(&["\u{feff}01/01/2024,10:00:00,Identity 1,Aprovado,sim,1"]);
        let (_, result) = read_log(log.path(), Sao_Paulo).unwrap();
        assert_eq!(result.rows_validated, 1);
    }

    #[test]
    fn test_raw_status_is_held_back() {
        let log = write_log(&[
            "01/01/2024,10:00:00,Identity 1,Aguardando,sim,1",
            "01/01/2024,10:00:05,Identity 1,Negado,nao,2",
        ]);
        let mut store = AccessStore::open_in_memory().unwrap();
        let result = import_log(log.path(), &mut store, Sao_Paulo).unwrap();
        assert_eq!(result.rows_validated, 2);
        assert_eq!(result.rows_held, 1);
        assert_eq!(result.rows_inserted, 1);
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let mut store = AccessStore::open_in_memory().unwrap();
        let err = import_log(Path::new("/nonexistent/log.csv"), &mut store, Sao_Paulo);
        assert!(matches!(err, Err(ImportError::Read { .. })));
    }
}
