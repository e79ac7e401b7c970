//! Victim table cleaning.

use collision_map_table::{Table, infer_column_types, normalize};

use crate::age::sanitize_age;
use crate::crash::ACCIDENT_YEAR;
use crate::eliminate::Elimination;
use crate::report::{CleaningReport, DropReason};
use crate::{CASE_ID, CleanError, Cleaned, PARTY_NUMBER, unknown_sex};

pub const VICTIM_AGE: &str = "VICTIM_AGE";
pub const VICTIM_SEX: &str = "VICTIM_SEX";

/// Cleans a raw victim table. No rows are dropped.
///
/// Constant columns (a single-city extract carries e.g. `CITY` and
/// `COUNTY` on every row) are removed; the join keys are exempt.
///
/// # Errors
///
/// Returns an error if either join key is absent.
pub fn clean_victims(raw: &Table) -> Result<Cleaned, CleanError> {
    let mut report = CleaningReport::default();
    raw.require_column(CASE_ID)?;
    raw.require_column(PARTY_NUMBER)?;

    let mut table = infer_column_types(normalize(raw));
    if let Some(ages) = table.column(VICTIM_AGE) {
        let ages = sanitize_age(ages);
        table = table.with_column(VICTIM_AGE, ages)?;
    }
    let table = table.map_column(VICTIM_SEX, unknown_sex);

    let table = Elimination {
        table: "victims",
        constant: true,
        max_missing: None,
        exempt: &[CASE_ID, PARTY_NUMBER],
        always: &[ACCIDENT_YEAR],
        always_reason: DropReason::Redundant,
    }
    .apply(table, &mut report);

    log::info!(
        "Cleaned victims: {} rows x {} columns",
        table.row_count(),
        table.column_count()
    );

    Ok(Cleaned { table, report })
}

#[cfg(test)]
mod tests {
    use collision_map_table::Value;

    use super::*;

    #[test]
    fn cleans_age_sex_and_constant_columns() {
        let raw = Table::from_csv_reader(
            "CASE_ID,PARTY_NUMBER,VICTIM_AGE,VICTIM_SEX,CITY,ACCIDENT_YEAR\n\
             10,1,0,X,SF,2019\n\
             10,1,27,F,SF,2019\n\
             11,1,998,M,SF,2020\n"
                .as_bytes(),
        )
        .unwrap();
        let cleaned = clean_victims(&raw).unwrap();

        assert_eq!(cleaned.table.row_count(), 3);
        assert_eq!(
            cleaned.table.column(VICTIM_AGE).unwrap(),
            &[Value::Missing, Value::Int(27), Value::Missing]
        );
        assert!(cleaned.table.value(0, VICTIM_SEX).unwrap().is_missing());
        assert!(!cleaned.table.has_column("CITY"));
        assert!(!cleaned.table.has_column(ACCIDENT_YEAR));
        // Constant, but a join key.
        assert!(cleaned.table.has_column(PARTY_NUMBER));
    }
}
