//! Placeholder normalization and column type inference.
//!
//! Source exports encode "no data" as assorted dash strings or blanks.
//! [`normalize`] trims every text cell and maps those placeholders to
//! [`Value::Missing`]; [`infer_column_types`] then converts text columns
//! that are entirely numeric.

use crate::value::parse_finite;
use crate::{Column, Table, Value};

/// Text values treated as "no data" after trimming.
pub const MISSING_STRINGS: &[&str] = &["-", "- ", " -", "--", ""];

/// Trims surrounding whitespace from every text cell and replaces
/// placeholder strings with [`Value::Missing`].
///
/// Non-text cells pass through unchanged. The input is left untouched.
#[must_use]
pub fn normalize(table: &Table) -> Table {
    table.clone().map_columns(|column| Column {
        name: column.name,
        values: column.values.into_iter().map(normalize_value).collect(),
    })
}

fn normalize_value(value: Value) -> Value {
    match value {
        Value::Text(s) => {
            let trimmed = s.trim();
            if MISSING_STRINGS.contains(&trimmed) {
                Value::Missing
            } else if trimmed.len() == s.len() {
                Value::Text(s)
            } else {
                Value::Text(trimmed.to_string())
            }
        }
        other => other,
    }
}

/// Converts text columns whose every non-missing cell is numeric.
///
/// A column becomes integer when every present cell parses as `i64`,
/// otherwise float when every present cell parses as a finite `f64`.
/// Columns holding any non-text cell, or no present cells at all, are
/// left as they are.
#[must_use]
pub fn infer_column_types(table: Table) -> Table {
    table.map_columns(|column| {
        let present: Vec<&str> = column
            .values
            .iter()
            .filter(|v| !v.is_missing())
            .filter_map(Value::as_str)
            .collect();
        let all_text =
            present.len() == column.values.iter().filter(|v| !v.is_missing()).count();

        if present.is_empty() || !all_text {
            return column;
        }

        if present.iter().all(|s| s.parse::<i64>().is_ok()) {
            log::debug!("Column {} inferred as integer", column.name);
            return Column {
                name: column.name,
                values: column
                    .values
                    .into_iter()
                    .map(|v| match v {
                        Value::Text(s) => s.parse().map_or(Value::Missing, Value::Int),
                        other => other,
                    })
                    .collect(),
            };
        }

        if present.iter().all(|s| parse_finite(s).is_some()) {
            log::debug!("Column {} inferred as float", column.name);
            return Column {
                name: column.name,
                values: column
                    .values
                    .into_iter()
                    .map(|v| match v {
                        Value::Text(s) => parse_finite(&s).map_or(Value::Missing, Value::Float),
                        other => other,
                    })
                    .collect(),
            };
        }

        column
    })
}
