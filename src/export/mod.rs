//! Tabular export: read a columnar file in bounded chunks and render it as CSV or JSON.

mod encode;
mod format;
mod pipeline;
mod source;

pub use encode::{frame_to_csv, frame_to_json};
pub use format::ExportFormat;
pub use pipeline::{export, ExportChunk, ExportOutput, ExportPipeline, ExportRequest, ExportState};
pub use source::{ParquetSource, TableReader, TableSource};
