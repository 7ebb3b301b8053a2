//! Seam to the tabular-file decoder.
//!
//! The export pipeline only needs "open a path" and "give me up to N more rows".
//! [`ParquetSource`] implements that over Apache Parquet files with polars; each batch
//! is read with a row slice so at most one batch is decoded in memory at a time.

use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::debug;

use crate::error::{AppError, AppResult};

pub trait TableSource: Send + Sync {
    /// Open a read handle. Missing sources map to a not-found error, anything that
    /// prevents decoding the file header maps to a read error.
    fn open(&self, path: &Path) -> AppResult<Box<dyn TableReader>>;
}

pub trait TableReader: Send {
    /// Next batch of at most `max_rows` rows, or None once the source is exhausted.
    fn read_batch(&mut self, max_rows: usize) -> AppResult<Option<DataFrame>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParquetSource;

impl TableSource for ParquetSource {
    fn open(&self, path: &Path) -> AppResult<Box<dyn TableReader>> {
        let meta = std::fs::metadata(path)?;
        if meta.is_dir() {
            return Err(AppError::not_found("source_not_found", format!("{} is a directory", path.display())));
        }
        let file = File::open(path)?;
        let total_rows = ParquetReader::new(file.try_clone()?)
            .num_rows()
            .map_err(|e| AppError::read("corrupt_source", format!("{}: {}", path.display(), e)))?;
        debug!(target: "tablegate::export", path = %path.display(), total_rows, "parquet source opened");
        Ok(Box::new(ParquetTableReader { file, path: path.to_path_buf(), total_rows, offset: 0 }))
    }
}

/// Holds the open file handle for the lifetime of one export; dropping it closes the file.
struct ParquetTableReader {
    file: File,
    path: PathBuf,
    total_rows: usize,
    offset: usize,
}

impl TableReader for ParquetTableReader {
    fn read_batch(&mut self, max_rows: usize) -> AppResult<Option<DataFrame>> {
        if self.offset >= self.total_rows { return Ok(None); }
        let len = max_rows.min(self.total_rows - self.offset);
        let df = ParquetReader::new(self.file.try_clone()?)
            .with_slice(Some((self.offset, len)))
            .finish()
            .map_err(|e| AppError::read("read_error", format!("{} at row {}: {}", self.path.display(), self.offset, e)))?;
        self.offset += len;
        Ok(Some(df))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_parquet(path: &Path, n: i64) {
        let ids: Vec<i64> = (0..n).collect();
        let names: Vec<String> = (0..n).map(|i| format!("row{}", i)).collect();
        let mut df = DataFrame::new(vec![
            Series::new("id".into(), ids).into(),
            Series::new("name".into(), names).into(),
        ]).unwrap();
        let mut f = File::create(path).unwrap();
        ParquetWriter::new(&mut f).finish(&mut df).unwrap();
    }

    #[test]
    fn reads_in_bounded_batches() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("t.parquet");
        write_parquet(&path, 10);
        let mut reader = ParquetSource.open(&path).unwrap();
        let mut sizes = Vec::new();
        let mut first_ids = Vec::new();
        while let Some(df) = reader.read_batch(4).unwrap() {
            sizes.push(df.height());
            first_ids.push(df.column("id").unwrap().get(0).unwrap().try_extract::<i64>().unwrap());
        }
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(first_ids, vec![0, 4, 8]);
        assert!(reader.read_batch(4).unwrap().is_none());
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ParquetSource.open(&tmp.path().join("nope.parquet")).err().unwrap();
        assert_eq!(err.http_status(), 404);
        let err = ParquetSource.open(tmp.path()).err().unwrap();
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn corrupt_file_is_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bad.parquet");
        std::fs::write(&path, b"definitely not parquet").unwrap();
        let err = ParquetSource.open(&path).err().unwrap();
        assert_eq!(err.http_status(), 500);
        assert_eq!(err.code_str(), "corrupt_source");
    }
}
