//! Victim-level denormalized view.
//!
//! Victims are left-joined onto parties by `(CASE_ID, PARTY_NUMBER)`, and
//! the result onto crashes by `CASE_ID`. The view always has exactly one row
//! per victim.

use std::collections::HashMap;

use collision_map_table::{Table, Value, ValueKey};

use crate::report::{CleaningReport, DataIntegrityWarning};
use crate::{CASE_ID, CleanError, Cleaned, PARTY_NUMBER};

/// Suffix for victim-side columns that also exist on the party table.
pub const VICTIM_SUFFIX: &str = "_victim";
/// Suffix for party-side columns that also exist on the victim table.
pub const PARTY_SUFFIX: &str = "_party";
/// Suffix for crash-side columns that collide with the victim/party columns.
pub const CRASH_SUFFIX: &str = "_crash";

/// Builds the victim-level view from cleaned tables.
///
/// # Errors
///
/// Returns an error if a join key is absent from any
/// input.
pub fn build_victim_level_view(
    victims: &Table,
    parties: &Table,
    crashes: &Table,
) -> Result<Cleaned, CleanError> {
    let mut report = CleaningReport::default();

    let with_parties = left_join(
        victims,
        parties,
        &[CASE_ID, PARTY_NUMBER],
        (VICTIM_SUFFIX, PARTY_SUFFIX),
        "parties",
        &mut report,
    )?;
    let table = left_join(
        &with_parties,
        crashes,
        &[CASE_ID],
        ("", CRASH_SUFFIX),
        "crashes",
        &mut report,
    )?;

    log::info!(
        "Built victim-level view: {} rows x {} columns",
        table.row_count(),
        table.column_count()
    );

    Ok(Cleaned { table, report })
}

/// Left join preserving every row of `left` in order.
///
/// Non-key columns present on both sides get the respective suffix (an
/// empty suffix keeps the name). Rows with a missing key part never match.
/// When a key occurs more than once on the right, the first row is used.
///
/// # Errors
///
/// Returns an error if a key column is absent or the suffixed names
/// collide.
pub fn left_join(
    left: &Table,
    right: &Table,
    keys: &[&str],
    suffixes: (&str, &str),
    right_name: &'static str,
    report: &mut CleaningReport,
) -> Result<Table, CleanError> {
    let left_keys = key_columns(left, keys)?;
    let right_keys = key_columns(right, keys)?;

    let mut index: HashMap<Vec<ValueKey>, usize> = HashMap::new();
    for row in 0..right.row_count() {
        let Some(key) = row_key(&right_keys, row) else {
            continue;
        };
        if index.contains_key(&key) {
            report.push(DataIntegrityWarning::AmbiguousJoinKey {
                table: right_name,
                key: render_key(&right_keys, row),
            });
        } else {
            index.insert(key, row);
        }
    }

    let matches: Vec<Option<usize>> = (0..left.row_count())
        .map(|row| row_key(&left_keys, row).and_then(|key| index.get(&key).copied()))
        .collect();

    let matched = matches.iter().filter(|m| m.is_some()).count();
    log::debug!(
        "Joined {right_name}: {matched}/{} left rows matched",
        left.row_count()
    );

    let overlaps = |name: &str| !keys.contains(&name) && left.has_column(name) && right.has_column(name);
    let mut columns: Vec<(String, Vec<Value>)> = Vec::new();

    for column in left.columns() {
        let name = if overlaps(&column.name) {
            format!("{}{}", column.name, suffixes.0)
        } else {
            column.name.clone()
        };
        columns.push((name, column.values.clone()));
    }

    for column in right.columns() {
        if keys.contains(&column.name.as_str()) {
            continue;
        }
        let name = if overlaps(&column.name) {
            format!("{}{}", column.name, suffixes.1)
        } else {
            column.name.clone()
        };
        let values = matches
            .iter()
            .map(|m| m.map_or(Value::Missing, |row| column.values[row].clone()))
            .collect();
        columns.push((name, values));
    }

    Ok(Table::new(columns)?)
}

fn key_columns<'a>(table: &'a Table, keys: &[&str]) -> Result<Vec<&'a [Value]>, CleanError> {
    keys.iter()
        .map(|key| table.require_column(key).map_err(CleanError::from))
        .collect()
}

fn row_key(columns: &[&[Value]], row: usize) -> Option<Vec<ValueKey>> {
    columns.iter().map(|column| column[row].key()).collect()
}

fn render_key(columns: &[&[Value]], row: usize) -> String {
    columns
        .iter()
        .map(|column| column[row].to_string())
        .collect::<Vec<_>>()
        .join("/")
}
