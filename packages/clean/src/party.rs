//! Party table cleaning.

use collision_map_table::{Table, Value, infer_column_types, normalize};

use crate::age::sanitize_age;
use crate::crash::ACCIDENT_YEAR;
use crate::eliminate::Elimination;
use crate::report::{CleaningReport, DropReason};
use crate::{CASE_ID, CleanError, Cleaned, PARTY_NUMBER, unknown_sex};

pub const PARTY_AGE: &str = "PARTY_AGE";
pub const PARTY_SEX: &str = "PARTY_SEX";
pub const AT_FAULT: &str = "AT_FAULT";
pub const VEHICLE_TYPE: &str = "STWD_VEHICLE_TYPE";

const MAX_MISSING_FRACTION: f64 = 0.90;

/// Cleans a raw party table. No rows are dropped.
///
/// # Errors
///
/// Returns an error if either join key is absent.
pub fn clean_parties(raw: &Table) -> Result<Cleaned, CleanError> {
    let mut report = CleaningReport::default();
    raw.require_column(CASE_ID)?;
    raw.require_column(PARTY_NUMBER)?;

    let mut table = infer_column_types(normalize(raw));
    if let Some(ages) = table.column(PARTY_AGE) {
        let ages = sanitize_age(ages);
        table = table.with_column(PARTY_AGE, ages)?;
    }
    let table = table
        .map_column(PARTY_SEX, unknown_sex)
        .map_column(AT_FAULT, at_fault);

    let table = Elimination {
        table: "parties",
        constant: false,
        max_missing: Some(MAX_MISSING_FRACTION),
        exempt: &[CASE_ID, PARTY_NUMBER],
        always: &[ACCIDENT_YEAR],
        always_reason: DropReason::Redundant,
    }
    .apply(table, &mut report);

    log::info!(
        "Cleaned parties: {} rows x {} columns",
        table.row_count(),
        table.column_count()
    );

    Ok(Cleaned { table, report })
}

/// `Y` is true and `N` false; anything else is missing.
fn at_fault(value: &Value) -> Value {
    match value.as_str() {
        Some("Y") => Value::Bool(true),
        Some("N") => Value::Bool(false),
        _ => value.as_bool().map_or(Value::Missing, Value::Bool),
    }
}
