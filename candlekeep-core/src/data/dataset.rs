//! Candle dataset files: delimited text, optionally gzip-compressed.
//!
//! - Reads accept any header variant [`CandleSchema`] can resolve
//! - Paths ending in `.gz` are decoded/encoded transparently
//! - Writes are atomic (write to `.tmp`, rename into place)

use super::schema::{parse_timestamp, parse_value, CandleSchema};
use crate::domain::RawCandle;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing a candle file.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("line {line}: missing or out-of-range timestamp")]
    MissingTimestamp { line: u64 },

    #[error("line {line}: invalid value '{value}' in column '{column}'")]
    MalformedValue {
        line: u64,
        column: String,
        value: String,
    },
}

impl DatasetError {
    fn io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_path_buf())
        } else {
            Self::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// True for paths whose final extension is `gz`.
pub fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

fn open_input(path: &Path) -> Result<Box<dyn Read>, DatasetError> {
    let file = File::open(path).map_err(|e| DatasetError::io(path, e))?;
    let reader = BufReader::new(file);
    if is_gzip(path) {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Stream every record of a candle file through `visit`, in file order.
///
/// Returns the number of records visited.
pub fn scan<F>(path: &Path, mut visit: F) -> Result<usize, DatasetError>
where
    F: FnMut(RawCandle),
{
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(open_input(path)?);

    let columns = CandleSchema::resolve(reader.headers()?)?;
    let mut record = csv::StringRecord::new();
    let mut count = 0;

    while reader.read_record(&mut record)? {
        let line = record.position().map_or(0, |p| p.line());
        let cell = |i: usize| record.get(i).unwrap_or("");

        let timestamp =
            parse_timestamp(cell(columns.timestamp)).ok_or(DatasetError::MissingTimestamp { line })?;

        let mut values = [None; 5];
        for (slot, (&col, name)) in values
            .iter_mut()
            .zip(columns.values.iter().zip(&CandleSchema::HEADER[1..]))
        {
            *slot = parse_value(cell(col)).map_err(|_| DatasetError::MalformedValue {
                line,
                column: name.to_string(),
                value: cell(col).to_string(),
            })?;
        }
        let [open, high, low, close, volume] = values;

        visit(RawCandle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
        count += 1;
    }

    Ok(count)
}

/// Load a whole candle file into memory, in file order.
pub fn read_candles(path: &Path) -> Result<Vec<RawCandle>, DatasetError> {
    let mut candles = Vec::new();
    scan(path, |c| candles.push(c))?;
    Ok(candles)
}

/// Largest timestamp in a candle file, without keeping its records.
pub fn last_timestamp(path: &Path) -> Result<Option<i64>, DatasetError> {
    let mut last: Option<i64> = None;
    scan(path, |c| last = last.max(Some(c.timestamp)))?;
    Ok(last)
}

/// Write rows under the canonical header, replacing `path` atomically.
///
/// Rows serialize in schema order; absent values are written as empty cells.
/// The parent directory is created if needed.
pub fn write_candles<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| DatasetError::io(parent, e))?;
    }

    let tmp_path = tmp_sibling(path);
    let result = write_to(&tmp_path, rows, is_gzip(path)).and_then(|()| {
        fs::rename(&tmp_path, path).map_err(|e| DatasetError::io(path, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_to<T: Serialize>(path: &Path, rows: &[T], gzip: bool) -> Result<(), DatasetError> {
    let file = File::create(path).map_err(|e| DatasetError::io(path, e))?;
    let out = BufWriter::new(file);

    if gzip {
        let encoder = write_rows(GzEncoder::new(out, Compression::default()), rows)?;
        let mut out = encoder.finish().map_err(|e| DatasetError::io(path, e))?;
        out.flush().map_err(|e| DatasetError::io(path, e))?;
    } else {
        let mut out = write_rows(out, rows)?;
        out.flush().map_err(|e| DatasetError::io(path, e))?;
    }
    Ok(())
}

fn write_rows<W: Write, T: Serialize>(out: W, rows: &[T]) -> Result<W, DatasetError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(CandleSchema::HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| DatasetError::Csv(csv::Error::from(e.into_error())))
}

/// `{path}.tmp` next to the target, so the final rename stays on one filesystem.
fn tmp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
