//! Reading and writing tables
//!
//! A table on disk is a data file (feather, parquet or csv) plus a JSON
//! sidecar with its metadata (see [`sidecar`]). Feather and parquet files
//! additionally embed the sidecar JSON in their Arrow schema metadata, so a
//! lone data file still carries its metadata. On read the sidecar wins over
//! embedded metadata.

pub mod format;
pub mod sidecar;

use std::collections::HashMap;
use std::io::{Cursor, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use arrow::compute::concat_batches;
use arrow::datatypes::{Schema, SchemaRef};
use arrow::error::ArrowError;
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use bytes::Bytes;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use tracing::{debug, info, warn};

pub use format::Format;
pub use sidecar::{SCHEMA_METADATA_KEY, TableSidecar, sidecar_path};

use crate::table::{Table, TableError};

/// Errors raised while encoding or decoding tables
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),
    #[error("Table error: {0}")]
    Table(#[from] TableError),
}

/// Encode the data of `table` in `format`
///
/// Feather and parquet payloads embed the table metadata.
pub fn encode_table(table: &Table, format: Format) -> Result<Vec<u8>, FormatError> {
    let batch = if format.embeds_metadata() {
        let json = serde_json::to_string(&TableSidecar::from_table(table))?;
        with_schema_metadata(table.data(), HashMap::from([(SCHEMA_METADATA_KEY.to_string(), json)]))?
    } else {
        table.data().clone()
    };

    match format {
        Format::Feather => {
            let mut writer = FileWriter::try_new(Vec::new(), &batch.schema())?;
            writer.write(&batch)?;
            writer.finish()?;
            Ok(writer.into_inner()?)
        }
        Format::Parquet => {
            let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), None)?;
            writer.write(&batch)?;
            Ok(writer.into_inner()?)
        }
        Format::Csv => {
            let mut writer = arrow::csv::WriterBuilder::new()
                .with_header(true)
                .build(Vec::new());
            writer.write(&batch)?;
            Ok(writer.into_inner())
        }
    }
}

/// Decode a payload into a table
///
/// Metadata comes from `sidecar` when given, otherwise from the metadata
/// embedded in the payload; a table without either gets empty metadata.
pub fn decode_table(bytes: &[u8], format: Format, sidecar: Option<&[u8]>) -> Result<Table, FormatError> {
    let (schema, batches) = match format {
        Format::Feather => {
            let reader = FileReader::try_new(Cursor::new(bytes), None)?;
            let schema = reader.schema();
            (schema, reader.collect::<Result<Vec<_>, _>>()?)
        }
        Format::Parquet => {
            let builder = ParquetRecordBatchReaderBuilder::try_new(Bytes::copy_from_slice(bytes))?;
            let schema = builder.schema().clone();
            (schema, builder.build()?.collect::<Result<Vec<_>, _>>()?)
        }
        Format::Csv => {
            let mut cursor = Cursor::new(bytes);
            let csv_format = arrow::csv::reader::Format::default().with_header(true);
            let (schema, _) = csv_format.infer_schema(&mut cursor, None)?;
            cursor.seek(SeekFrom::Start(0))?;
            let schema = Arc::new(schema);
            let reader = arrow::csv::ReaderBuilder::new(schema.clone())
                .with_format(csv_format)
                .build(cursor)?;
            (schema, reader.collect::<Result<Vec<_>, _>>()?)
        }
    };

    let embedded = schema.metadata().get(SCHEMA_METADATA_KEY).cloned();
    let batch = combine(schema, &batches)?;
    let data = with_schema_metadata(&batch, HashMap::new())?;

    let sidecar = match (sidecar, embedded) {
        (Some(content), _) => TableSidecar::from_slice(content)?,
        (None, Some(json)) => TableSidecar::from_json(&json)?,
        (None, None) => {
            debug!("No metadata found for {} payload", format);
            TableSidecar::default()
        }
    };
    sidecar.into_table(data)
}

/// Write `table` to `path` in `format`, with its sidecar next to it
pub fn write_table(table: &Table, path: &Path, format: Format) -> Result<(), FormatError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, encode_table(table, format)?)?;
    TableSidecar::from_table(table).write(&sidecar_path(path))?;
    info!(
        "Wrote table {} ({} rows) to {}",
        table.metadata.short_name.as_deref().unwrap_or("<unnamed>"),
        table.num_rows(),
        path.display()
    );
    Ok(())
}

/// Read a table file, format taken from the extension
pub fn read_table(path: &Path) -> Result<Table, FormatError> {
    let format = Format::from_path(path)?;
    let bytes = std::fs::read(path)?;
    let sidecar_file = sidecar_path(path);
    let sidecar = if sidecar_file.exists() {
        Some(std::fs::read(&sidecar_file)?)
    } else {
        if !format.embeds_metadata() {
            warn!("No metadata sidecar for {}", path.display());
        }
        None
    };
    decode_table(&bytes, format, sidecar.as_deref())
}

fn combine(schema: SchemaRef, batches: &[RecordBatch]) -> Result<RecordBatch, ArrowError> {
    match batches {
        [single] => Ok(single.clone()),
        _ => concat_batches(&schema, batches),
    }
}

fn with_schema_metadata(
    batch: &RecordBatch,
    metadata: HashMap<String, String>,
) -> Result<RecordBatch, ArrowError> {
    let schema = Schema::new(batch.schema().fields().clone()).with_metadata(metadata);
    RecordBatch::try_new_with_options(
        Arc::new(schema),
        batch.columns().to_vec(),
        &RecordBatchOptions::new().with_row_count(Some(batch.num_rows())),
    )
}
