//! Record streams
//!
//! A stream is an ordered, randomly indexable collection of flat per-jet
//! records with named numeric fields. Streams backed by several files are
//! presented as one logical stream through [`ChainedStream`].

use crate::error::{JetDiffError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One typed column of a stream
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_f64(&self, i: usize) -> Option<f64> {
        match self {
            Column::Int(v) => v.get(i).map(|&x| x as f64),
            Column::Float(v) => v.get(i).copied(),
        }
    }

    /// Integer view; float values are truncated toward zero, non-finite
    /// values have no integer view.
    pub fn get_i64(&self, i: usize) -> Option<i64> {
        match self {
            Column::Int(v) => v.get(i).copied(),
            Column::Float(v) => v.get(i).filter(|x| x.is_finite()).map(|&x| x as i64),
        }
    }
}

/// Random-access provider of per-jet records
pub trait RecordStream: Send + Sync {
    /// Stream name used in diagnostics
    fn name(&self) -> &str;

    /// Total number of records
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every record carries `field`
    fn has_field(&self, field: &str) -> bool;

    /// Numeric value of `field` at `position`
    fn value(&self, position: usize, field: &str) -> Option<f64>;

    /// Integer value of `field` at `position`
    fn int_value(&self, position: usize, field: &str) -> Option<i64>;
}

/// Check at startup that `stream` exposes every field in `fields`.
pub fn require_fields<'a>(
    stream: &dyn RecordStream,
    fields: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    for field in fields {
        if !stream.has_field(field) {
            return Err(JetDiffError::MissingField {
                stream: stream.name().to_string(),
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

/// Read a float field, turning absence into a [`JetDiffError::MissingField`].
pub fn read_f64(stream: &dyn RecordStream, position: usize, field: &str) -> Result<f64> {
    stream
        .value(position, field)
        .ok_or_else(|| JetDiffError::MissingField {
            stream: stream.name().to_string(),
            field: field.to_string(),
        })
}

/// Read an integer field, turning absence into a [`JetDiffError::MissingField`].
pub fn read_i64(stream: &dyn RecordStream, position: usize, field: &str) -> Result<i64> {
    stream
        .int_value(position, field)
        .ok_or_else(|| JetDiffError::MissingField {
            stream: stream.name().to_string(),
            field: field.to_string(),
        })
}

/// In-memory columnar stream
#[derive(Debug, Clone)]
pub struct ColumnStream {
    name: String,
    columns: HashMap<String, Column>,
    len: usize,
}

impl ColumnStream {
    /// Create an empty stream with no fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: HashMap::new(),
            len: 0,
        }
    }

    /// Build a stream from named columns of equal length
    pub fn from_columns<S: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = (S, Column)>,
    ) -> Result<Self> {
        let name = name.into();
        let mut map = HashMap::new();
        let mut len = None;
        for (field, column) in columns {
            let field = field.into();
            match len {
                None => len = Some(column.len()),
                Some(n) if n != column.len() => {
                    return Err(JetDiffError::Ingest {
                        source_name: name,
                        line: 0,
                        message: format!(
                            "column '{}' has {} values, expected {}",
                            field,
                            column.len(),
                            n
                        ),
                    });
                }
                Some(_) => {}
            }
            map.insert(field, column);
        }
        Ok(Self {
            name,
            columns: map,
            len: len.unwrap_or(0),
        })
    }

    pub fn column(&self, field: &str) -> Option<&Column> {
        self.columns.get(field)
    }

    /// Field names in sorted order
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.columns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl RecordStream for ColumnStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.len
    }

    fn has_field(&self, field: &str) -> bool {
        self.len == 0 || self.columns.contains_key(field)
    }

    fn value(&self, position: usize, field: &str) -> Option<f64> {
        self.columns.get(field)?.get_f64(position)
    }

    fn int_value(&self, position: usize, field: &str) -> Option<i64> {
        self.columns.get(field)?.get_i64(position)
    }
}

/// Several streams concatenated into one logical stream
pub struct ChainedStream {
    name: String,
    parts: Vec<Box<dyn RecordStream>>,
    /// `cum_len[i]` = total records in parts `0..i`; length is `parts.len() + 1`
    cum_len: Vec<usize>,
}

impl ChainedStream {
    pub fn new(name: impl Into<String>, parts: Vec<Box<dyn RecordStream>>) -> Self {
        let mut cum_len = Vec::with_capacity(parts.len() + 1);
        cum_len.push(0);
        let mut total = 0;
        for part in &parts {
            total += part.len();
            cum_len.push(total);
        }
        Self {
            name: name.into(),
            parts,
            cum_len,
        }
    }

    pub fn n_parts(&self) -> usize {
        self.parts.len()
    }

    /// Map a logical position to (part index, local position)
    fn locate(&self, position: usize) -> Option<(usize, usize)> {
        if position >= self.len() {
            return None;
        }
        // First part whose end offset is past `position`
        let part = self.cum_len[1..].partition_point(|&end| end <= position);
        Some((part, position - self.cum_len[part]))
    }
}

impl RecordStream for ChainedStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.cum_len.last().copied().unwrap_or(0)
    }

    fn has_field(&self, field: &str) -> bool {
        self.parts
            .iter()
            .filter(|p| !p.is_empty())
            .all(|p| p.has_field(field))
    }

    fn value(&self, position: usize, field: &str) -> Option<f64> {
        let (part, local) = self.locate(position)?;
        self.parts[part].value(local, field)
    }

    fn int_value(&self, position: usize, field: &str) -> Option<i64> {
        let (part, local) = self.locate(position)?;
        self.parts[part].int_value(local, field)
    }
}

/// Field names of the per-jet quantities the matcher needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JetFields {
    pub event_id: String,
    pub object_index: String,
    pub eta: String,
    pub phi: String,
    pub mass: String,
    /// Only used in diagnostics
    #[serde(default)]
    pub pt: Option<String>,
}

impl JetFields {
    /// Field layout of the reconstruction-side (NanoAOD-style) records
    pub fn reference_default() -> Self {
        Self {
            event_id: "event".into(),
            object_index: "jet_idx".into(),
            eta: "FatJet_eta".into(),
            phi: "FatJet_phi".into(),
            mass: "FatJet_mass".into(),
            pt: Some("FatJet_pt".into()),
        }
    }

    /// Field layout of the training-framework prediction records
    pub fn candidate_default() -> Self {
        Self {
            event_id: "event_no".into(),
            object_index: "jet_no".into(),
            eta: "fj_eta".into(),
            phi: "fj_phi".into(),
            mass: "fj_mass".into(),
            pt: Some("fj_pt".into()),
        }
    }

    /// Fields every record must carry (pt excluded)
    pub fn required(&self) -> [&str; 5] {
        [
            &self.event_id,
            &self.object_index,
            &self.eta,
            &self.phi,
            &self.mass,
        ]
    }

    /// Read the jet at `position`
    pub fn read(&self, stream: &dyn RecordStream, position: usize) -> Result<JetRecord> {
        Ok(JetRecord {
            position,
            event_id: read_i64(stream, position, &self.event_id)?,
            object_index: read_i64(stream, position, &self.object_index)?,
            eta: read_f64(stream, position, &self.eta)?,
            phi: read_f64(stream, position, &self.phi)?,
            mass: read_f64(stream, position, &self.mass)?,
            pt: self
                .pt
                .as_deref()
                .and_then(|field| stream.value(position, field)),
        })
    }
}

/// Geometry and identity of one jet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JetRecord {
    pub position: usize,
    pub event_id: i64,
    pub object_index: i64,
    pub eta: f64,
    pub phi: f64,
    pub mass: f64,
    pub pt: Option<f64>,
}
