//! Typed extraction of cleaned tables.
//!
//! Only `CASE_ID` (and `PARTY_NUMBER` for parties and victims) is required;
//! every other field reads as `None` when its column was absent or dropped.

use chrono::Datelike;
use collision_map_collision_models::{CollisionSeverity, CrashRecord, PartyRecord, VictimRecord};
use collision_map_table::{Table, Value};

use crate::crash::{
    ACCIDENT_YEAR, COLLISION_DATETIME, COLLISION_HOUR, COLLISION_SEVERITY, INDICATOR_COLUMNS,
    LATITUDE_RESOLVED, LONGITUDE_RESOLVED, PRIMARY_RD, SECONDARY_RD,
};
use crate::party::{AT_FAULT, PARTY_AGE, PARTY_SEX, VEHICLE_TYPE};
use crate::victim::{VICTIM_AGE, VICTIM_SEX};
use crate::{CASE_ID, CleanError, PARTY_NUMBER};

/// Reads every row of a cleaned crash table.
///
/// The year comes from `ACCIDENT_YEAR` when present, otherwise from
/// `collision_datetime`.
///
/// # Errors
///
/// Returns an error if `CASE_ID` is absent.
pub fn crash_records(table: &Table) -> Result<Vec<CrashRecord>, CleanError> {
    let ids = table.require_column(CASE_ID)?;
    let field = |row: usize, name: &str| table.value(row, name).unwrap_or(&Value::Missing);
    let flag = |row: usize, name: &str| field(row, name).as_bool();

    Ok(ids
        .iter()
        .enumerate()
        .map(|(row, id)| {
            let collision_datetime = field(row, COLLISION_DATETIME).as_datetime();
            let accident_year = field(row, ACCIDENT_YEAR)
                .as_i64()
                .and_then(|y| i32::try_from(y).ok())
                .or_else(|| collision_datetime.map(|dt| dt.year()));

            CrashRecord {
                case_id: id.to_string(),
                latitude: field(row, LATITUDE_RESOLVED).as_f64(),
                longitude: field(row, LONGITUDE_RESOLVED).as_f64(),
                collision_datetime,
                collision_hour: field(row, COLLISION_HOUR)
                    .as_i64()
                    .and_then(|h| u32::try_from(h).ok()),
                accident_year,
                severity: severity(field(row, COLLISION_SEVERITY)),
                alcohol_involved: flag(row, INDICATOR_COLUMNS[0]),
                pedestrian_accident: flag(row, INDICATOR_COLUMNS[1]),
                motorcycle_accident: flag(row, INDICATOR_COLUMNS[2]),
                truck_accident: flag(row, INDICATOR_COLUMNS[3]),
                primary_road: text(field(row, PRIMARY_RD)),
                secondary_road: text(field(row, SECONDARY_RD)),
            }
        })
        .collect())
}

/// Reads every row of a cleaned party table. Rows without a party number
/// are skipped.
///
/// # Errors
///
/// Returns an error if either key column is absent.
pub fn party_records(table: &Table) -> Result<Vec<PartyRecord>, CleanError> {
    let keys = keyed_rows(table)?;
    let field = |row: usize, name: &str| table.value(row, name).unwrap_or(&Value::Missing);

    Ok(keys
        .into_iter()
        .map(|(row, case_id, party_number)| PartyRecord {
            case_id,
            party_number,
            age: age(field(row, PARTY_AGE)),
            sex: text(field(row, PARTY_SEX)),
            at_fault: field(row, AT_FAULT).as_bool(),
            vehicle_type: text(field(row, VEHICLE_TYPE)),
        })
        .collect())
}

/// Reads every row of a cleaned victim table. Rows without a party number
/// are skipped.
///
/// # Errors
///
/// Returns an error if either key column is absent.
pub fn victim_records(table: &Table) -> Result<Vec<VictimRecord>, CleanError> {
    let keys = keyed_rows(table)?;
    let field = |row: usize, name: &str| table.value(row, name).unwrap_or(&Value::Missing);

    Ok(keys
        .into_iter()
        .map(|(row, case_id, party_number)| VictimRecord {
            case_id,
            party_number,
            age: age(field(row, VICTIM_AGE)),
            sex: text(field(row, VICTIM_SEX)),
        })
        .collect())
}

fn keyed_rows(table: &Table) -> Result<Vec<(usize, String, i64)>, CleanError> {
    let ids = table.require_column(CASE_ID)?;
    let numbers = table.require_column(PARTY_NUMBER)?;

    Ok(ids
        .iter()
        .zip(numbers)
        .enumerate()
        .filter_map(|(row, (id, number))| {
            let Some(number) = number.as_i64() else {
                log::warn!("Row {row} (case {id}) has no party number, skipping");
                return None;
            };
            Some((row, id.to_string(), number))
        })
        .collect())
}

fn severity(value: &Value) -> Option<CollisionSeverity> {
    let code = u8::try_from(value.as_i64()?).ok()?;
    CollisionSeverity::from_value(code).ok()
}

fn age(value: &Value) -> Option<u16> {
    value.as_i64().and_then(|a| u16::try_from(a).ok())
}

fn text(value: &Value) -> Option<String> {
    if value.is_missing() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crash::{CrashCleanOptions, clean_crashes};

    #[test]
    fn extracts_typed_crashes() {
        let raw = Table::from_csv_reader(
            "CASE_ID,POINT_X,POINT_Y,COLLISION_DATE,COLLISION_TIME,COLLISION_SEVERITY,ALCOHOL_INVOLVED,PRIMARY_RD\n\
             100,-122.41,37.77,2021-07-04,2215,1,Y,MARKET ST\n\
             101,-122.42,37.78,2022-01-01,905,7,,\n"
                .as_bytes(),
        )
        .unwrap();
        let cleaned = clean_crashes(&raw, &CrashCleanOptions::default()).unwrap();
        let records = crash_records(&cleaned.table).unwrap();

        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.case_id, "100");
        assert_eq!(first.location(), Some((37.77, -122.41)));
        assert_eq!(first.collision_hour, Some(22));
        assert_eq!(first.accident_year, Some(2021));
        assert_eq!(first.severity, Some(CollisionSeverity::Fatal));
        assert_eq!(first.alcohol_involved, Some(true));
        assert_eq!(first.primary_road.as_deref(), Some("MARKET ST"));

        let second = &records[1];
        assert_eq!(second.collision_hour, Some(9));
        assert_eq!(second.severity, None);
        assert_eq!(second.alcohol_involved, None);
        assert_eq!(second.primary_road, None);
        assert_eq!(second.truck_accident, None);
    }

    #[test]
    fn skips_rows_without_party_number() {
        let table = Table::new(vec![
            (CASE_ID, vec![Value::Int(1), Value::Int(2)]),
            (PARTY_NUMBER, vec![Value::Int(1), Value::Missing]),
            (VICTIM_AGE, vec![Value::Int(30), Value::Int(40)]),
        ])
        .unwrap();
        let victims = victim_records(&table).unwrap();
        assert_eq!(victims.len(), 1);
        assert_eq!(victims[0].age, Some(30));
        assert_eq!(victims[0].sex, None);
    }
}
