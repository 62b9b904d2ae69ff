//! Spreadsheet-like table content
//!
//! Invariants kept by every mutating method:
//!
//! - every `(row, column)` pair in `rows × columns` has a cell (possibly empty)
//! - no cell exists for a row or column that is not in the table
//! - removing the last column clears all rows

use crate::error::{ArchiveError, Result};
use crate::sort::compare_names;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::collections::{HashSet, HashSetExt};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A table column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column id
    pub id: Uuid,
    /// Header title
    pub title: String,
}

impl Column {
    /// Create a column with a fresh id
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
        }
    }
}

/// A table row; its values live in the cell map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Row id
    pub id: Uuid,
    /// When the row was appended
    pub created_at: DateTime<Utc>,
    /// Last cell edit in this row
    pub modified_at: DateTime<Utc>,
}

impl Row {
    /// Create a row with a fresh id stamped now
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            modified_at: now,
        }
    }
}

impl Default for Row {
    fn default() -> Self {
        Self::new()
    }
}

/// Row presentation order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableSortBy {
    /// Insertion order
    #[default]
    Manual,
    /// Oldest row first
    Created,
    /// Most recently edited row first
    Modified,
    /// By one column's text
    Column {
        /// Column compared
        column_id: Uuid,
        /// Direction
        ascending: bool,
    },
}

/// Outcome of [`TableContent::edit_columns`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnEdit {
    /// Ids of columns that were dropped
    pub removed: Vec<Uuid>,
    /// For each new position, the column's position before the edit
    pub source_positions: Vec<usize>,
}

/// Table of columns, rows and cells
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableContent {
    columns: Vec<Column>,
    rows: Vec<Row>,
    /// row id -> column id -> value
    cells: BTreeMap<Uuid, BTreeMap<Uuid, String>>,
    sort_by: TableSortBy,
}

impl TableContent {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the given column titles and no rows
    pub fn with_columns<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: titles.into_iter().map(Column::new).collect(),
            ..Self::default()
        }
    }

    /// Rebuild a table from rows whose values are aligned with `columns`
    ///
    /// Missing trailing values become empty cells; extra values are ignored.
    pub fn from_positional(
        columns: Vec<Column>,
        rows: Vec<(Row, Vec<String>)>,
        sort_by: TableSortBy,
    ) -> Self {
        let mut table = Self {
            columns,
            rows: Vec::with_capacity(rows.len()),
            cells: BTreeMap::new(),
            sort_by,
        };
        for (row, values) in rows {
            let mut values = values.into_iter();
            let row_cells = table
                .columns
                .iter()
                .map(|c| (c.id, values.next().unwrap_or_default()))
                .collect();
            table.cells.insert(row.id, row_cells);
            table.rows.push(row);
        }
        table
    }

    /// Columns in display order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Rows in insertion order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Row presentation order
    pub fn sort_by(&self) -> TableSortBy {
        self.sort_by
    }

    /// Change the row presentation order
    pub fn set_sort_by(&mut self, sort_by: TableSortBy) {
        self.sort_by = sort_by;
    }

    /// Value of one cell
    pub fn cell(&self, row_id: Uuid, column_id: Uuid) -> Option<&str> {
        self.cells
            .get(&row_id)
            .and_then(|row| row.get(&column_id))
            .map(String::as_str)
    }

    /// Values of a row aligned with the column order
    pub fn row_values(&self, row_id: Uuid) -> Option<Vec<String>> {
        let row = self.cells.get(&row_id)?;
        Some(
            self.columns
                .iter()
                .map(|c| row.get(&c.id).cloned().unwrap_or_default())
                .collect(),
        )
    }

    /// Position of a column
    pub fn column_position(&self, column_id: Uuid) -> Option<usize> {
        self.columns.iter().position(|c| c.id == column_id)
    }

    /// Position of a row in insertion order
    pub fn row_position(&self, row_id: Uuid) -> Option<usize> {
        self.rows.iter().position(|r| r.id == row_id)
    }

    /// Append an empty row (one empty cell per column)
    pub fn append_row(&mut self) -> Row {
        let row = Row::new();
        let row_cells = self.columns.iter().map(|c| (c.id, String::new())).collect();
        self.cells.insert(row.id, row_cells);
        self.rows.push(row.clone());
        row
    }

    /// Append a column (one empty cell per existing row)
    pub fn append_column(&mut self, title: impl Into<String>) -> Column {
        let column = Column::new(title);
        for row_cells in self.cells.values_mut() {
            row_cells.insert(column.id, String::new());
        }
        self.columns.push(column.clone());
        column
    }

    /// Remove a row and its cells
    pub fn remove_row(&mut self, row_id: Uuid) -> Result<Row> {
        let index = self
            .row_position(row_id)
            .ok_or(ArchiveError::RowNotFound(row_id))?;
        self.cells.remove(&row_id);
        Ok(self.rows.remove(index))
    }

    /// Remove a column and all its cells
    ///
    /// Removing the last column clears every row.
    pub fn remove_column(&mut self, column_id: Uuid) -> Result<Column> {
        let index = self
            .column_position(column_id)
            .ok_or(ArchiveError::ColumnNotFound(column_id))?;
        let column = self.columns.remove(index);
        for row_cells in self.cells.values_mut() {
            row_cells.remove(&column_id);
        }
        if self.columns.is_empty() {
            self.clear_rows();
        }
        Ok(column)
    }

    /// Reorder, rename and prune columns in one step
    ///
    /// `new_columns` lists surviving columns in their new order with their new
    /// titles. Columns absent from it are removed along with their cells. Every
    /// id must already belong to the table and appear once; otherwise nothing
    /// changes.
    pub fn edit_columns(&mut self, new_columns: Vec<Column>) -> Result<ColumnEdit> {
        let mut seen = HashSet::with_capacity(new_columns.len());
        let mut source_positions = Vec::with_capacity(new_columns.len());
        for column in &new_columns {
            if !seen.insert(column.id) {
                return Err(ArchiveError::InvalidEdit(format!(
                    "column {} listed twice",
                    column.id
                )));
            }
            let position = self
                .column_position(column.id)
                .ok_or(ArchiveError::ColumnNotFound(column.id))?;
            source_positions.push(position);
        }

        let removed: Vec<Uuid> = self
            .columns
            .iter()
            .map(|c| c.id)
            .filter(|id| !seen.contains(id))
            .collect();

        for row_cells in self.cells.values_mut() {
            for id in &removed {
                row_cells.remove(id);
            }
        }
        self.columns = new_columns;
        if self.columns.is_empty() {
            self.clear_rows();
        }
        if let TableSortBy::Column { column_id, .. } = self.sort_by {
            if removed.contains(&column_id) {
                self.sort_by = TableSortBy::Manual;
            }
        }

        Ok(ColumnEdit {
            removed,
            source_positions,
        })
    }

    /// Set one cell and bump the row's modification time
    pub fn edit_cell(&mut self, row_id: Uuid, column_id: Uuid, value: impl Into<String>) -> Result<()> {
        if self.column_position(column_id).is_none() {
            return Err(ArchiveError::ColumnNotFound(column_id));
        }
        let row_index = self
            .row_position(row_id)
            .ok_or(ArchiveError::RowNotFound(row_id))?;
        self.cells
            .entry(row_id)
            .or_default()
            .insert(column_id, value.into());
        self.rows[row_index].modified_at = Utc::now();
        Ok(())
    }

    /// Paste `values` into consecutive columns of one row
    ///
    /// The range starts at `first_column` and runs right in display order. A
    /// range that would run past the last column is rejected without changes.
    pub fn insert_cells(&mut self, row_id: Uuid, first_column: Uuid, values: Vec<String>) -> Result<()> {
        let start = self
            .column_position(first_column)
            .ok_or(ArchiveError::ColumnNotFound(first_column))?;
        let row_index = self
            .row_position(row_id)
            .ok_or(ArchiveError::RowNotFound(row_id))?;
        if start + values.len() > self.columns.len() {
            return Err(ArchiveError::InvalidEdit(format!(
                "{} values do not fit from column {} of {}",
                values.len(),
                start,
                self.columns.len()
            )));
        }
        let row_cells = self.cells.entry(row_id).or_default();
        for (column, value) in self.columns[start..].iter().zip(values) {
            row_cells.insert(column.id, value);
        }
        self.rows[row_index].modified_at = Utc::now();
        Ok(())
    }

    /// Rows in presentation order
    pub fn ordered_rows(&self) -> Vec<&Row> {
        let mut rows: Vec<&Row> = self.rows.iter().collect();
        match self.sort_by {
            TableSortBy::Manual => {}
            TableSortBy::Created => rows.sort_by_key(|r| r.created_at),
            TableSortBy::Modified => rows.sort_by(|a, b| b.modified_at.cmp(&a.modified_at)),
            TableSortBy::Column { column_id, ascending } => rows.sort_by(|a, b| {
                let ord = compare_names(
                    self.cell(a.id, column_id).unwrap_or(""),
                    self.cell(b.id, column_id).unwrap_or(""),
                );
                if ascending {
                    ord
                } else {
                    ord.reverse()
                }
            }),
        }
        rows
    }

    /// Whether the cell map matches `rows × columns` exactly
    pub fn is_consistent(&self) -> bool {
        if self.cells.len() != self.rows.len() {
            return false;
        }
        self.rows.iter().all(|row| {
            self.cells.get(&row.id).is_some_and(|row_cells| {
                row_cells.len() == self.columns.len()
                    && self.columns.iter().all(|c| row_cells.contains_key(&c.id))
            })
        })
    }

    fn clear_rows(&mut self) {
        self.rows.clear();
        self.cells.clear();
    }
}
