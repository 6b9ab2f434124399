//! Table, column and row models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::common::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Date,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Date => "date",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(ColumnType::Text),
            "date" => Ok(ColumnType::Date),
            other => Err(CoreError::Validation(format!(
                "unknown column type '{}', expected 'text' or 'date'",
                other
            ))),
        }
    }
}

/// Where a column's values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnOrigin {
    /// Populated from the bound external sheet
    External,
    /// Added locally for annotation; never populated by synchronization
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub name: String,
    pub data_type: ColumnType,
    pub origin: ColumnOrigin,
}

impl Column {
    pub fn is_external(&self) -> bool {
        self.origin == ColumnOrigin::External
    }
}

/// Name and type of a column to be created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub data_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, data_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Date)
    }
}

/// One row: column id to raw cell value
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    cells: BTreeMap<String, String>,
}

impl Row {
    pub fn get(&self, column_id: &str) -> Option<&str> {
        self.cells.get(column_id).map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub(crate) fn set(&mut self, column_id: &str, value: String) {
        self.cells.insert(column_id.to_string(), value);
    }
}

impl FromIterator<(String, String)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

/// A table bound to an external sheet.
///
/// Columns and rows only change through the methods below, which keep every
/// row's key set equal to the column id set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    pub id: String,
    pub name: String,
    pub source_locator: String,
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Table {
    pub(crate) fn new(
        id: String,
        name: String,
        source_locator: String,
        columns: Vec<Column>,
    ) -> Self {
        Self {
            id,
            name,
            source_locator,
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn has_column(&self, column_id: &str) -> bool {
        self.column(column_id).is_some()
    }

    /// Append a column and backfill an empty value into every row
    pub(crate) fn push_column(&mut self, column: Column) -> Result<(), CoreError> {
        if self.has_column(&column.id) {
            return Err(CoreError::Validation(format!(
                "column id {} already exists on table {}",
                column.id, self.id
            )));
        }

        for row in &mut self.rows {
            row.set(&column.id, String::new());
        }
        self.columns.push(column);
        Ok(())
    }

    /// Append a row after conforming it to the current columns: missing
    /// keys become empty values and keys of unknown columns are dropped.
    pub(crate) fn push_row(&mut self, row: Row) {
        let mut conformed = row;
        conformed
            .cells
            .retain(|key, _| self.columns.iter().any(|c| &c.id == key));
        for column in &self.columns {
            conformed.cells.entry(column.id.clone()).or_default();
        }
        self.rows.push(conformed);
    }

    /// True when every row carries exactly the current column ids
    pub fn rows_conform(&self) -> bool {
        self.rows.iter().all(|row| {
            row.len() == self.columns.len() && self.columns.iter().all(|c| row.get(&c.id).is_some())
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableRequest {
    pub columns: Vec<ColumnSpec>,
    pub source_locator: String,
}

/// What one synchronization tick changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Upstream columns that were not known locally yet
    pub columns_added: Vec<Column>,
    pub row_appended: bool,
    pub row_count: usize,
}

impl SyncOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.columns_added.is_empty() && !self.row_appended
    }
}
