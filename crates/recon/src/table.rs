//! Loosely-typed table as loaded from a CSV source.
//!
//! This is the only dynamically-shaped structure in the engine. The join stage
//! works on it (column prefixing, optional joins); everything after the join
//! reads rows through the typed [`crate::model::ReferralRecord`] view.

use crate::error::ReconError;
use crate::parse::is_null_token;

pub type Cell = Option<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// A missing source: no columns and no rows.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Parse comma-separated text with a header row.
    pub fn from_csv_str(name: &str, data: &str) -> Result<Self, ReconError> {
        Self::from_delimited_str(name, data, b',')
    }

    /// Parse delimited text with a header row. Null tokens load as `None`.
    /// Short rows are padded with nulls, long rows are cut to the header width.
    pub fn from_delimited_str(name: &str, data: &str, delimiter: u8) -> Result<Self, ReconError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(data.as_bytes());

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| ReconError::SourceParse {
                source: name.into(),
                message: e.to_string(),
            })?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut table = Table::new(name, columns);
        let width = table.columns.len();

        for record in reader.records() {
            let record = record.map_err(|e| ReconError::SourceParse {
                source: name.into(),
                message: e.to_string(),
            })?;
            let row: Vec<Cell> = (0..width)
                .map(|i| {
                    record
                        .get(i)
                        .filter(|v| !is_null_token(v))
                        .map(|v| v.to_string())
                })
                .collect();
            table.rows.push(row);
        }

        Ok(table)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }

    /// Copy of this table with every column renamed to `{prefix}{column}`.
    pub fn with_prefix(&self, prefix: &str) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.iter().map(|c| format!("{prefix}{c}")).collect(),
            rows: self.rows.clone(),
        }
    }

    /// Serialize with a header row; nulls become empty fields.
    pub fn to_csv_string(&self) -> Result<String, ReconError> {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        let io_err = |e: csv::Error| ReconError::Io(e.to_string());

        writer.write_record(&self.columns).map_err(io_err)?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))
                .map_err(io_err)?;
        }

        let bytes = writer.into_inner().map_err(|e| ReconError::Io(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| ReconError::Io(e.to_string()))
    }
}
