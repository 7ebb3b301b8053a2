use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use polars::prelude::*;
use tracing::{debug, info, warn};

use super::encode::{frame_to_csv, frame_to_json};
use super::format::ExportFormat;
use super::source::{TableReader, TableSource};
use crate::error::{AppError, AppResult};

const PROGRESS_EVERY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Opening,
    Streaming,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Canonical path returned by the access engine.
    pub path: PathBuf,
    pub format: ExportFormat,
    pub chunk_size: usize,
}

/// One batch of rows; only the first chunk of an export carries the header.
pub struct ExportChunk {
    pub index: usize,
    pub header: bool,
    pub frame: DataFrame,
}

impl ExportChunk {
    pub fn rows(&self) -> usize { self.frame.height() }

    pub fn to_csv(&mut self) -> AppResult<Vec<u8>> {
        frame_to_csv(&mut self.frame, self.header)
    }
}

pub enum ExportOutput {
    Stream(ExportPipeline),
    Document(Vec<u8>),
}

/// Open the source and prepare the requested representation.
///
/// CSV is returned as a pull-based pipeline already in STREAMING state, so an open
/// failure surfaces here before any response byte is committed. JSON is fully
/// materialized into one array.
pub fn export(source: Arc<dyn TableSource>, req: &ExportRequest) -> AppResult<ExportOutput> {
    let mut pipeline = ExportPipeline::new(source, req.path.clone(), req.chunk_size);
    pipeline.open()?;
    match req.format {
        ExportFormat::Csv => Ok(ExportOutput::Stream(pipeline)),
        ExportFormat::Json => Ok(ExportOutput::Document(pipeline.collect_json()?)),
    }
}

pub struct ExportPipeline {
    source: Arc<dyn TableSource>,
    path: PathBuf,
    chunk_size: usize,
    state: ExportState,
    reader: Option<Box<dyn TableReader>>,
    chunks: usize,
    rows: u64,
    started: Instant,
    last_progress: Instant,
}

impl ExportPipeline {
    pub fn new(source: Arc<dyn TableSource>, path: PathBuf, chunk_size: usize) -> Self {
        let now = Instant::now();
        Self {
            source,
            path,
            chunk_size: chunk_size.max(1),
            state: ExportState::Opening,
            reader: None,
            chunks: 0,
            rows: 0,
            started: now,
            last_progress: now,
        }
    }

    pub fn state(&self) -> ExportState { self.state }
    pub fn chunks_emitted(&self) -> usize { self.chunks }
    pub fn rows_emitted(&self) -> u64 { self.rows }

    pub fn open(&mut self) -> AppResult<()> {
        if self.state != ExportState::Opening {
            return Err(AppError::internal("export_state", format!("open called in state {:?}", self.state)));
        }
        info!(target: "tablegate::export", path = %self.path.display(), chunk_size = self.chunk_size, "started reading table");
        match self.source.open(&self.path) {
            Ok(reader) => {
                self.reader = Some(reader);
                self.state = ExportState::Streaming;
                self.started = Instant::now();
                self.last_progress = self.started;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Pull the next chunk. Returns None once the source is exhausted, at which point the
    /// reader is released and the state is DONE.
    pub fn next_chunk(&mut self) -> AppResult<Option<ExportChunk>> {
        match self.state {
            ExportState::Opening => self.open()?,
            ExportState::Streaming => {}
            ExportState::Done => return Ok(None),
            ExportState::Failed => {
                return Err(AppError::read("export_failed", format!("export of {} already failed", self.path.display())))
            }
        }
        let Some(reader) = self.reader.as_mut() else {
            return Err(self.fail(AppError::internal("export_state", "streaming without a reader")));
        };
        let batch = match reader.read_batch(self.chunk_size) {
            Ok(b) => b,
            Err(e) => return Err(self.fail(e)),
        };
        let frame = match batch {
            Some(df) if df.height() > 0 => df,
            _ => {
                self.finish();
                return Ok(None);
            }
        };
        let chunk = ExportChunk { index: self.chunks, header: self.chunks == 0, frame };
        self.chunks += 1;
        self.rows += chunk.rows() as u64;
        debug!(target: "tablegate::export", path = %self.path.display(), chunk = chunk.index, rows = chunk.rows(), "chunk read");
        if self.last_progress.elapsed() >= PROGRESS_EVERY {
            self.last_progress = Instant::now();
            info!(target: "tablegate::export", path = %self.path.display(), rows = self.rows, chunks = self.chunks, "export in progress");
        }
        Ok(Some(chunk))
    }

    /// Next chunk already rendered as CSV text.
    pub fn next_csv(&mut self) -> AppResult<Option<Vec<u8>>> {
        let Some(mut chunk) = self.next_chunk()? else { return Ok(None) };
        match chunk.to_csv() {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Drain every remaining chunk into one JSON array. Row order and content do not
    /// depend on the chunk size.
    pub fn collect_json(&mut self) -> AppResult<Vec<u8>> {
        let mut all: Option<DataFrame> = None;
        while let Some(chunk) = self.next_chunk()? {
            match all.as_mut() {
                None => all = Some(chunk.frame),
                Some(acc) => {
                    if let Err(e) = acc.vstack_mut(&chunk.frame) {
                        return Err(self.fail(AppError::read("convert_error", format!("stack chunks: {}", e))));
                    }
                }
            }
        }
        match all {
            Some(df) => frame_to_json(&df),
            None => Ok(b"[]".to_vec()),
        }
    }

    /// Stop the export early (client went away). Releases the reader.
    pub fn abort(&mut self) {
        if matches!(self.state, ExportState::Opening | ExportState::Streaming) {
            warn!(target: "tablegate::export", path = %self.path.display(), rows = self.rows, chunks = self.chunks, "export aborted");
            self.reader = None;
            self.state = ExportState::Failed;
        }
    }

    fn finish(&mut self) {
        self.reader = None;
        self.state = ExportState::Done;
        info!(
            target: "tablegate::export",
            path = %self.path.display(),
            rows = self.rows,
            chunks = self.chunks,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "table processed"
        );
    }

    fn fail(&mut self, err: AppError) -> AppError {
        self.reader = None;
        self.state = ExportState::Failed;
        warn!(target: "tablegate::export", path = %self.path.display(), rows = self.rows, "export failed: {}", err);
        err
    }
}

impl Iterator for ExportPipeline {
    type Item = AppResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == ExportState::Failed { return None; }
        self.next_csv().transpose()
    }
}

impl Drop for ExportPipeline {
    fn drop(&mut self) {
        if self.state == ExportState::Streaming {
            self.abort();
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod pipeline_tests;
