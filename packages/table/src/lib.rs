#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory columnar table used by every cleaning stage.
//!
//! A [`Table`] is a set of equally long, named columns of [`Value`] cells.
//! Transformations consume a table and return a new one, so a stage never
//! mutates a table its caller can still observe. Raw CSV input is read as
//! text; [`normalize`] then strips placeholders and infers numeric columns.

pub mod normalize;
pub mod value;

use std::collections::BTreeSet;
use std::path::Path;

pub use normalize::{MISSING_STRINGS, infer_column_types, normalize};
pub use value::{Value, ValueKey};

/// Errors that can occur while building or reading a table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// CSV decoding or encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A column's length disagrees with the rest of the table.
    #[error("column {column} has {actual} rows, expected {expected}")]
    RaggedColumn {
        /// Offending column name.
        column: String,
        /// Row count of the table.
        expected: usize,
        /// Row count of the column.
        actual: usize,
    },

    /// Two columns share a name.
    #[error("duplicate column {0}")]
    DuplicateColumn(String),

    /// A column a stage depends on is absent.
    #[error("missing required column {0}")]
    MissingColumn(String),
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Header name.
    pub name: String,
    /// Cells, one per row.
    pub values: Vec<Value>,
}

/// An immutable-by-convention columnar table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Builds a table from `(name, values)` pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if column lengths differ or a name repeats.
    pub fn new<N: Into<String>>(columns: Vec<(N, Vec<Value>)>) -> Result<Self, TableError> {
        let mut table = Self::default();
        let mut seen = BTreeSet::new();
        for (i, (name, values)) in columns.into_iter().enumerate() {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(TableError::DuplicateColumn(name));
            }
            if i == 0 {
                table.rows = values.len();
            } else if values.len() != table.rows {
                return Err(TableError::RaggedColumn {
                    column: name,
                    expected: table.rows,
                    actual: values.len(),
                });
            }
            table.columns.push(Column { name, values });
        }
        Ok(table)
    }

    /// Reads a headered CSV stream. Every cell is read verbatim as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the CSV is malformed or rows are ragged.
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self, TableError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];

        for record in rdr.records() {
            let record = record?;
            for (i, column) in columns.iter_mut().enumerate() {
                column.push(Value::Text(record.get(i).unwrap_or_default().to_string()));
            }
        }

        Self::new(headers.into_iter().zip(columns).collect())
    }

    /// Reads a headered CSV file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or parsed.
    pub fn from_csv_path(path: &Path) -> Result<Self, TableError> {
        let file = std::fs::File::open(path)?;
        let table = Self::from_csv_reader(std::io::BufReader::new(file))?;
        log::info!(
            "Read {} rows x {} columns from {}",
            table.row_count(),
            table.column_count(),
            path.display()
        );
        Ok(table)
    }

    /// Writes the table as CSV with a header row. Missing cells are empty.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<(), TableError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(self.columns.iter().map(|c| c.name.as_str()))?;
        for row in 0..self.rows {
            wtr.write_record(self.columns.iter().map(|c| c.values[row].to_string()))?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Number of rows.
    #[must_use]
    pub const fn row_count(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[must_use]
    pub const fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// All columns in table order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Whether a column with this name exists.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Cells of the named column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Cells of the named column, or [`TableError::MissingColumn`].
    ///
    /// # Errors
    ///
    /// Returns an error if the column is absent.
    pub fn require_column(&self, name: &str) -> Result<&[Value], TableError> {
        self.column(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// The cell at (`row`, `name`), or `None` if the column is absent.
    #[must_use]
    pub fn value(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name).and_then(|values| values.get(row))
    }

    /// Replaces the named column, or appends it if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if `values` does not have one cell per row.
    pub fn with_column(mut self, name: &str, values: Vec<Value>) -> Result<Self, TableError> {
        if !self.columns.is_empty() && values.len() != self.rows {
            return Err(TableError::RaggedColumn {
                column: name.to_string(),
                expected: self.rows,
                actual: values.len(),
            });
        }
        if self.columns.is_empty() {
            self.rows = values.len();
        }
        if let Some(existing) = self.columns.iter_mut().find(|c| c.name == name) {
            existing.values = values;
        } else {
            self.columns.push(Column {
                name: name.to_string(),
                values,
            });
        }
        Ok(self)
    }

    /// Applies `f` to every cell of the named column. A no-op when the
    /// column is absent.
    #[must_use]
    pub fn map_column(mut self, name: &str, f: impl Fn(&Value) -> Value) -> Self {
        if let Some(column) = self.columns.iter_mut().find(|c| c.name == name) {
            column.values = column.values.iter().map(f).collect();
        }
        self
    }

    /// Applies `f` to every column, returning the rebuilt table.
    #[must_use]
    pub fn map_columns(mut self, f: impl Fn(Column) -> Column) -> Self {
        self.columns = self.columns.into_iter().map(f).collect();
        self
    }

    /// Removes the named columns. Names that are absent are ignored.
    #[must_use]
    pub fn drop_columns<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.columns
            .retain(|c| !names.iter().any(|n| n.as_ref() == c.name));
        self
    }

    /// Renames a column. A no-op when the column is absent.
    #[must_use]
    pub fn rename_column(mut self, from: &str, to: &str) -> Self {
        if let Some(column) = self.columns.iter_mut().find(|c| c.name == from) {
            column.name = to.to_string();
        }
        self
    }

    /// Keeps only the rows whose flag in `keep` is `true`.
    ///
    /// Row order is preserved and the index is contiguous afterwards.
    #[must_use]
    pub fn retain_rows(mut self, keep: &[bool]) -> Self {
        for column in &mut self.columns {
            let mut flags = keep.iter();
            column
                .values
                .retain(|_| flags.next().copied().unwrap_or(false));
        }
        self.rows = keep.iter().take(self.rows).filter(|k| **k).count();
        self
    }

    /// Builds a new table containing `indices` in the given order.
    #[must_use]
    pub fn take_rows(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: indices.iter().map(|&i| c.values[i].clone()).collect(),
            })
            .collect();
        Self {
            columns,
            rows: indices.len(),
        }
    }

    /// Fraction of missing cells in the named column (0.0 for an empty
    /// table or absent column).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn missing_fraction(&self, name: &str) -> f64 {
        match self.column(name) {
            Some(values) if !values.is_empty() => {
                values.iter().filter(|v| v.is_missing()).count() as f64 / values.len() as f64
            }
            _ => 0.0,
        }
    }

    /// Whether the named column holds a single distinct value, counting
    /// "missing" as a value of its own.
    #[must_use]
    pub fn is_constant(&self, name: &str) -> bool {
        self.column(name).is_some_and(|values| match values.split_first() {
            Some((first, rest)) => rest.iter().all(|v| v == first),
            None => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_csv_reader("A,B,C\n1,x,\n2,x,\n3,x,\n".as_bytes()).unwrap()
    }

    #[test]
    fn reads_csv_as_text() {
        let table = sample();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_names().collect::<Vec<_>>(), ["A", "B", "C"]);
        assert_eq!(table.value(0, "A"), Some(&Value::Text("1".to_string())));
    }

    #[test]
    fn rejects_ragged_columns() {
        let result = Table::new(vec![
            ("A", vec![Value::Int(1)]),
            ("B", vec![Value::Int(1), Value::Int(2)]),
        ]);
        assert!(matches!(result, Err(TableError::RaggedColumn { .. })));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let result = Table::new(vec![("A", vec![]), ("A", vec![])]);
        assert!(matches!(result, Err(TableError::DuplicateColumn(_))));
    }

    #[test]
    fn constant_counts_missing_as_a_value() {
        let table = normalize(&sample());
        assert!(table.is_constant("B"));
        assert!(table.is_constant("C"));
        assert!(!table.is_constant("A"));
        assert!((table.missing_fraction("C") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn retain_rows_keeps_order() {
        let table = sample().retain_rows(&[true, false, true]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.value(1, "A"), Some(&Value::Text("3".to_string())));
    }

    #[test]
    fn write_csv_renders_missing_as_empty() {
        let table = normalize(&sample()).drop_columns(&["B"]);
        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "A,C\n1,\n2,\n3,\n");
    }
}
