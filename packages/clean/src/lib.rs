#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cleaning rules for the SWITRS crash, party, and victim tables.
//!
//! Each cleaner consumes a raw table by reference and returns a new
//! [`Cleaned`] table together with the [`CleaningReport`] of recoverable
//! anomalies it worked around. A bad row never aborts cleaning; only a
//! missing key column does.

pub mod age;
pub mod crash;
pub mod eliminate;
pub mod join;
pub mod party;
pub mod records;
pub mod report;
pub mod victim;

use std::path::Path;

use collision_map_table::{Table, TableError, Value};

pub use crash::{CrashCleanOptions, IndicatorMissing, clean_crashes};
pub use join::build_victim_level_view;
pub use party::clean_parties;
pub use records::{crash_records, party_records, victim_records};
pub use report::{CleaningReport, DataIntegrityWarning, DropReason};
pub use victim::clean_victims;

/// Case identifier shared by all three tables.
pub const CASE_ID: &str = "CASE_ID";
/// Party number within a case, shared by the party and victim tables.
pub const PARTY_NUMBER: &str = "PARTY_NUMBER";

/// Errors that abort a cleaning stage.
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    /// Table construction, lookup, or CSV I/O failed.
    #[error(transparent)]
    Table(#[from] TableError),
}

/// A cleaned table and the warnings raised while producing it.
#[derive(Debug, Clone)]
pub struct Cleaned {
    /// The cleaned table.
    pub table: Table,
    /// Recoverable anomalies.
    pub report: CleaningReport,
}

/// All cleaned tables for one data directory.
#[derive(Debug, Clone)]
pub struct CleanDataset {
    /// Cleaned crash table.
    pub crashes: Table,
    /// Cleaned party table.
    pub parties: Table,
    /// Cleaned victim table.
    pub victims: Table,
    /// Victim-level join of the three.
    pub victim_level: Table,
    /// Warnings from every stage, in stage order.
    pub report: CleaningReport,
}

/// Reads `Crashes.csv`, `Parties.csv`, and `Victims.csv` from `data_dir`
/// and cleans them.
///
/// # Errors
///
/// Returns an error if a file cannot be read or lacks a key column.
pub fn load_all_clean(
    data_dir: &Path,
    options: &CrashCleanOptions,
) -> Result<CleanDataset, CleanError> {
    let crashes = clean_crashes(&Table::from_csv_path(&data_dir.join("Crashes.csv"))?, options)?;
    let parties = clean_parties(&Table::from_csv_path(&data_dir.join("Parties.csv"))?)?;
    let victims = clean_victims(&Table::from_csv_path(&data_dir.join("Victims.csv"))?)?;
    let view = build_victim_level_view(&victims.table, &parties.table, &crashes.table)?;

    let mut report = crashes.report;
    report.merge(parties.report);
    report.merge(victims.report);
    report.merge(view.report);

    Ok(CleanDataset {
        crashes: crashes.table,
        parties: parties.table,
        victims: victims.table,
        victim_level: view.table,
        report,
    })
}

/// Sex code `X` means "not stated".
pub(crate) fn unknown_sex(value: &Value) -> Value {
    match value.as_str() {
        Some("X") => Value::Missing,
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sex_becomes_missing() {
        assert!(unknown_sex(&Value::from("X")).is_missing());
        assert_eq!(unknown_sex(&Value::from("F")), Value::from("F"));
    }

    #[test]
    fn loads_and_joins_a_data_directory() {
        let dir = std::env::temp_dir().join(format!("collision_map_clean_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("Crashes.csv"),
            "CASE_ID,POINT_X,POINT_Y,COLLISION_SEVERITY\n1,-122.41,37.77,2\n2,,,3\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("Parties.csv"),
            "CASE_ID,PARTY_NUMBER,PARTY_AGE,ACCIDENT_YEAR\n1,1,30,2019\n2,1,998,2019\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("Victims.csv"),
            "CASE_ID,PARTY_NUMBER,VICTIM_AGE\n1,1,29\n2,1,0\n3,1,41\n",
        )
        .unwrap();

        let dataset = load_all_clean(&dir, &CrashCleanOptions::default()).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(dataset.crashes.row_count(), 1);
        assert_eq!(dataset.victim_level.row_count(), 3);
        assert_eq!(dataset.victim_level.value(0, "PARTY_AGE"), Some(&Value::Int(30)));
        assert!(dataset.victim_level.value(1, "latitude").unwrap().is_missing());
        assert!(!dataset.report.is_empty());
    }
}
