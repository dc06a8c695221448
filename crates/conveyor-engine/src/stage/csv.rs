//! Delimited-text extractor and loader backed by `arrow::csv`.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::record_batch::RecordBatch;
use conveyor_types::error::StageError;
use conveyor_types::params::StageParams;

use super::{Extractor, Loader};
use crate::dataset::Dataset;

const DEFAULT_BATCH_SIZE: usize = 8192;

/// Options shared by both directions.
#[derive(Debug, Clone)]
struct CsvOptions {
    path: PathBuf,
    delimiter: u8,
    has_header: bool,
}

impl CsvOptions {
    fn from_params(params: &StageParams) -> Result<Self, StageError> {
        let path = PathBuf::from(params.require_str("path")?);
        let delimiter = match params.optional_str("delimiter")? {
            None => b',',
            Some(d) if d.len() == 1 && d.is_ascii() => d.as_bytes()[0],
            Some(d) => {
                return Err(StageError::config(
                    "INVALID_DELIMITER",
                    format!("delimiter must be a single ASCII character, got '{d}'"),
                ))
            }
        };
        let has_header = params.optional_bool("has_header")?.unwrap_or(true);
        Ok(Self {
            path,
            delimiter,
            has_header,
        })
    }
}

fn batch_size(params: &StageParams) -> Result<usize, StageError> {
    match params.optional_u64("batch_size")? {
        None => Ok(DEFAULT_BATCH_SIZE),
        Some(0) => Err(StageError::config(
            "INVALID_BATCH_SIZE",
            "batch_size must be at least 1",
        )),
        Some(n) => usize::try_from(n)
            .map_err(|_| StageError::config("INVALID_BATCH_SIZE", "batch_size is too large")),
    }
}

fn io_error(code: &str, path: &Path, err: impl std::fmt::Display) -> StageError {
    StageError::io(code, format!("{}: {err}", path.display()))
        .with_details(serde_json::json!({ "path": path.display().to_string() }))
}

/// Reads a delimited text file into a [`Dataset`], inferring column types.
///
/// Params: `path` (required), `delimiter` (default `,`), `has_header`
/// (default `true`), `batch_size` (default 8192 rows).
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExtractor;

impl Extractor for CsvExtractor {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn validate(&self, params: &StageParams) -> Result<(), StageError> {
        CsvOptions::from_params(params)?;
        batch_size(params)?;
        Ok(())
    }

    fn extract(&self, params: &StageParams) -> Result<Dataset, StageError> {
        let opts = CsvOptions::from_params(params)?;
        let batch_size = batch_size(params)?;
        let start = Instant::now();

        let mut file = File::open(&opts.path).map_err(|e| io_error("OPEN_FAILED", &opts.path, e))?;
        let format = Format::default()
            .with_header(opts.has_header)
            .with_delimiter(opts.delimiter);
        let (schema, _) = format
            .infer_schema(&mut file, None)
            .map_err(|e| StageError::data("INFER_SCHEMA_FAILED", e.to_string()))?;
        file.rewind()
            .map_err(|e| io_error("SEEK_FAILED", &opts.path, e))?;

        let schema = Arc::new(schema);
        let reader = ReaderBuilder::new(schema.clone())
            .with_format(format)
            .with_batch_size(batch_size)
            .build(file)
            .map_err(|e| StageError::data("READ_FAILED", e.to_string()))?;
        let batches = reader
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StageError::data("READ_FAILED", e.to_string()))?;
        let dataset = Dataset::new(schema, batches)?;

        tracing::debug!(
            path = %opts.path.display(),
            rows = dataset.num_rows(),
            columns = dataset.num_columns(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "CSV extracted"
        );
        Ok(dataset)
    }
}

/// Writes a [`Dataset`] as a delimited text file, replacing any existing file.
///
/// Params: `path` (required), `delimiter` (default `,`), `has_header`
/// (default `true`). A header is still written for an empty dataset.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvLoader;

impl Loader for CsvLoader {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn validate(&self, params: &StageParams) -> Result<(), StageError> {
        CsvOptions::from_params(params).map(|_| ())
    }

    fn load(&self, data: &Dataset, params: &StageParams) -> Result<(), StageError> {
        let opts = CsvOptions::from_params(params)?;
        let start = Instant::now();

        let file = File::create(&opts.path).map_err(|e| io_error("CREATE_FAILED", &opts.path, e))?;
        let mut out = BufWriter::new(file);
        {
            let mut writer = WriterBuilder::new()
                .with_header(opts.has_header)
                .with_delimiter(opts.delimiter)
                .build(&mut out);
            if data.batches().is_empty() {
                writer
                    .write(&RecordBatch::new_empty(data.schema()))
                    .map_err(|e| io_error("WRITE_FAILED", &opts.path, e))?;
            }
            for batch in data.batches() {
                writer
                    .write(batch)
                    .map_err(|e| io_error("WRITE_FAILED", &opts.path, e))?;
            }
        }
        out.flush()
            .map_err(|e| io_error("WRITE_FAILED", &opts.path, e))?;

        tracing::debug!(
            path = %opts.path.display(),
            rows = data.num_rows(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "CSV loaded"
        );
        Ok(())
    }
}
