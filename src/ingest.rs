//! JSON Lines ingestion
//!
//! Each non-empty line is one JSON object. Numeric and boolean members become
//! columns; integers stay integer columns until a float shows up in the same
//! column. Rows holding per-event arrays (`"FatJet_eta": [..]`) can be
//! flattened into one record per array element.

use crate::error::{JetDiffError, Result};
use crate::record::{ChainedStream, Column, ColumnStream, RecordStream};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Options for reading one JSON Lines source
#[derive(Debug, Clone, Default)]
pub struct JsonlOptions {
    /// Flatten array-valued rows; the element position is written to this field
    pub flatten_index_field: Option<String>,
}

impl JsonlOptions {
    pub fn flatten_into(field: impl Into<String>) -> Self {
        Self {
            flatten_index_field: Some(field.into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Scalar {
    Int(i64),
    Float(f64),
}

/// Column-wise accumulator with a schema fixed by the first record
struct StreamBuilder {
    source_name: String,
    order: Vec<String>,
    columns: HashMap<String, Column>,
    rows: usize,
}

impl StreamBuilder {
    fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            order: Vec::new(),
            columns: HashMap::new(),
            rows: 0,
        }
    }

    fn error(&self, line: usize, message: String) -> JetDiffError {
        JetDiffError::Ingest {
            source_name: self.source_name.clone(),
            line,
            message,
        }
    }

    fn push_record(&mut self, line: usize, record: Vec<(String, Scalar)>) -> Result<()> {
        if self.rows == 0 && self.order.is_empty() {
            for (field, _) in &record {
                self.order.push(field.clone());
                self.columns.insert(field.clone(), Column::Int(Vec::new()));
            }
        }
        if record.len() != self.order.len() {
            return Err(self.error(
                line,
                format!(
                    "record has {} fields, expected {}",
                    record.len(),
                    self.order.len()
                ),
            ));
        }
        for (field, scalar) in record {
            let Some(column) = self.columns.get_mut(&field) else {
                return Err(self.error(line, format!("unexpected field '{}'", field)));
            };
            push_scalar(column, scalar);
        }
        self.rows += 1;
        Ok(())
    }

    fn finish(self) -> Result<ColumnStream> {
        let mut columns = self.columns;
        let ordered: Vec<(String, Column)> = self
            .order
            .into_iter()
            .filter_map(|field| columns.remove(&field).map(|c| (field, c)))
            .collect();
        ColumnStream::from_columns(self.source_name, ordered)
    }
}

fn push_scalar(column: &mut Column, scalar: Scalar) {
    match column {
        Column::Int(values) => match scalar {
            Scalar::Int(x) => values.push(x),
            Scalar::Float(x) => {
                // Promote the whole column once a float appears
                let mut floats: Vec<f64> = values.iter().map(|&v| v as f64).collect();
                floats.push(x);
                *column = Column::Float(floats);
            }
        },
        Column::Float(values) => values.push(match scalar {
            Scalar::Int(x) => x as f64,
            Scalar::Float(x) => x,
        }),
    }
}

fn to_scalar(value: &Value) -> std::result::Result<Scalar, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Scalar::Int(i))
            } else {
                n.as_f64()
                    .map(Scalar::Float)
                    .ok_or_else(|| format!("unrepresentable number {}", n))
            }
        }
        Value::Bool(b) => Ok(Scalar::Int(i64::from(*b))),
        Value::Null => Ok(Scalar::Float(f64::NAN)),
        other => Err(format!("non-numeric value {}", other)),
    }
}

/// Expand one JSON object into flat records
fn expand_row(
    row: &Map<String, Value>,
    options: &JsonlOptions,
) -> std::result::Result<Vec<Vec<(String, Scalar)>>, String> {
    let array_len = row
        .values()
        .filter_map(|v| v.as_array().map(Vec::len))
        .try_fold(None, |acc: Option<usize>, n| match acc {
            Some(m) if m != n => Err(format!(
                "array fields disagree in length ({} vs {})",
                m, n
            )),
            _ => Ok(Some(n)),
        })?;

    let Some(n_objects) = array_len else {
        let mut record = Vec::with_capacity(row.len() + 1);
        for (field, value) in row {
            let scalar = to_scalar(value).map_err(|e| format!("{}: {}", field, e))?;
            record.push((field.clone(), scalar));
        }
        if let Some(index_field) = &options.flatten_index_field {
            if !row.contains_key(index_field) {
                record.push((index_field.clone(), Scalar::Int(0)));
            }
        }
        return Ok(vec![record]);
    };

    let Some(index_field) = &options.flatten_index_field else {
        return Err("array-valued row in a stream that is not flattened".to_string());
    };

    let mut records = Vec::with_capacity(n_objects);
    for k in 0..n_objects {
        let mut record = Vec::with_capacity(row.len() + 1);
        for (field, value) in row {
            let element = match value {
                Value::Array(items) => &items[k],
                scalar => scalar,
            };
            record.push((
                field.clone(),
                to_scalar(element).map_err(|e| format!("{}[{}]: {}", field, k, e))?,
            ));
        }
        if !row.contains_key(index_field) {
            record.push((index_field.clone(), Scalar::Int(k as i64)));
        }
        records.push(record);
    }
    Ok(records)
}

/// Parse JSON Lines text into a column stream
pub fn parse_jsonl(source_name: &str, text: &str, options: &JsonlOptions) -> Result<ColumnStream> {
    let mut builder = StreamBuilder::new(source_name);
    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let value: Value =
            serde_json::from_str(trimmed).map_err(|e| builder.error(line_no, e.to_string()))?;
        let Value::Object(row) = value else {
            return Err(builder.error(line_no, "expected a JSON object".to_string()));
        };
        let records = expand_row(&row, options).map_err(|e| builder.error(line_no, e))?;
        for record in records {
            builder.push_record(line_no, record)?;
        }
    }
    builder.finish()
}

/// Load one JSON Lines file (memory-mapped)
pub fn load_jsonl(path: &Path, options: &JsonlOptions) -> Result<ColumnStream> {
    let source_name = path.display().to_string();
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Ok(ColumnStream::new(source_name));
    }
    // SAFETY: the mapping is only read, and input files are not modified
    // while a run is in progress.
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    let text = std::str::from_utf8(&mmap).map_err(|e| JetDiffError::Ingest {
        source_name: source_name.clone(),
        line: 0,
        message: e.to_string(),
    })?;
    let stream = parse_jsonl(&source_name, text, options)?;
    tracing::debug!("Loaded {} records from {}", stream.len(), source_name);
    Ok(stream)
}

/// Load several files as one logical stream
pub fn load_chain(name: &str, paths: &[PathBuf], options: &JsonlOptions) -> Result<ChainedStream> {
    let mut parts: Vec<Box<dyn RecordStream>> = Vec::with_capacity(paths.len());
    for path in paths {
        tracing::info!("Opening file: {}", path.display());
        parts.push(Box::new(load_jsonl(path, options)?));
    }
    Ok(ChainedStream::new(name, parts))
}
