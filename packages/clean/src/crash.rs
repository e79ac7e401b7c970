//! Crash table cleaning.
//!
//! One row per collision case. Coordinates are resolved from the named
//! `LATITUDE`/`LONGITUDE` pair with `POINT_Y`/`POINT_X` as fallback, the
//! date and HHMM time are combined into `collision_datetime`, and the Y/blank
//! involvement indicators become nullable booleans.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use collision_map_table::{Table, Value, infer_column_types, normalize};

use crate::eliminate::Elimination;
use crate::report::{CleaningReport, DataIntegrityWarning, DropReason};
use crate::{CASE_ID, CleanError, Cleaned};

pub const LATITUDE: &str = "LATITUDE";
pub const LONGITUDE: &str = "LONGITUDE";
pub const POINT_X: &str = "POINT_X";
pub const POINT_Y: &str = "POINT_Y";
pub const COLLISION_DATE: &str = "COLLISION_DATE";
pub const COLLISION_TIME: &str = "COLLISION_TIME";
pub const COLLISION_SEVERITY: &str = "COLLISION_SEVERITY";
pub const ACCIDENT_YEAR: &str = "ACCIDENT_YEAR";
pub const PRIMARY_RD: &str = "PRIMARY_RD";
pub const SECONDARY_RD: &str = "SECONDARY_RD";

/// Resolved latitude column.
pub const LATITUDE_RESOLVED: &str = "latitude";
/// Resolved longitude column.
pub const LONGITUDE_RESOLVED: &str = "longitude";
/// Combined date + time column.
pub const COLLISION_DATETIME: &str = "collision_datetime";
/// Hour of `collision_datetime`.
pub const COLLISION_HOUR: &str = "collision_hour";

/// Y/blank involvement indicator columns.
pub const INDICATOR_COLUMNS: &[&str] = &[
    "ALCOHOL_INVOLVED",
    "PEDESTRIAN_ACCIDENT",
    "MOTORCYCLE_ACCIDENT",
    "TRUCK_ACCIDENT",
];

/// Raw coordinate sources, always dropped once resolved.
pub const RAW_COORDINATE_COLUMNS: &[&str] = &[POINT_X, POINT_Y, LATITUDE, LONGITUDE];

/// Columns the constant/sparse rules keep by default. A blank indicator
/// means "not involved", so the indicators are never judged sparse.
pub const DEFAULT_EXEMPT_COLUMNS: &[&str] = &[
    CASE_ID,
    LATITUDE_RESOLVED,
    LONGITUDE_RESOLVED,
    COLLISION_DATETIME,
    COLLISION_HOUR,
    COLLISION_SEVERITY,
    ACCIDENT_YEAR,
    PRIMARY_RD,
    SECONDARY_RD,
    "ALCOHOL_INVOLVED",
    "PEDESTRIAN_ACCIDENT",
    "MOTORCYCLE_ACCIDENT",
    "TRUCK_ACCIDENT",
];

const MAX_MISSING_FRACTION: f64 = 0.95;
const MAX_TIME_CODE: i64 = 2359;

/// How a missing involvement indicator is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndicatorMissing {
    /// A missing raw value stays missing.
    #[default]
    Preserve,
    /// A missing raw value becomes `false`.
    AsFalse,
}

/// Options for [`clean_crashes`].
#[derive(Debug, Clone)]
pub struct CrashCleanOptions {
    /// Drop rows whose latitude or longitude is still missing.
    pub require_location: bool,
    /// Representation of missing involvement indicators.
    pub indicator_missing: IndicatorMissing,
    /// Columns never dropped by the constant/sparse rules.
    pub exempt_columns: Vec<String>,
}

impl Default for CrashCleanOptions {
    fn default() -> Self {
        Self {
            require_location: true,
            indicator_missing: IndicatorMissing::default(),
            exempt_columns: DEFAULT_EXEMPT_COLUMNS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Cleans a raw crash table.
///
/// # Errors
///
/// Returns an error if `CASE_ID` is absent. Every
/// other column is optional; derivations whose sources are absent are
/// skipped.
pub fn clean_crashes(raw: &Table, options: &CrashCleanOptions) -> Result<Cleaned, CleanError> {
    let mut report = CleaningReport::default();
    raw.require_column(CASE_ID)?;

    let table = infer_column_types(normalize(raw));
    let table = dedup_case_ids(table, &mut report)?;
    let case_ids: Vec<String> = table
        .require_column(CASE_ID)?
        .iter()
        .map(ToString::to_string)
        .collect();

    let longitude = resolve_coordinate(
        &table,
        LONGITUDE,
        POINT_X,
        LONGITUDE_RESOLVED,
        180.0,
        &case_ids,
        &mut report,
    );
    let latitude = resolve_coordinate(
        &table,
        LATITUDE,
        POINT_Y,
        LATITUDE_RESOLVED,
        90.0,
        &case_ids,
        &mut report,
    );
    let mut table = table
        .with_column(LONGITUDE_RESOLVED, longitude)?
        .with_column(LATITUDE_RESOLVED, latitude)?;

    if table.has_column(COLLISION_DATE) && table.has_column(COLLISION_TIME) {
        let datetimes = combine_datetimes(&table, &case_ids, &mut report);
        let hours = datetimes
            .iter()
            .map(|v| {
                v.as_datetime()
                    .map_or(Value::Missing, |dt| Value::Int(i64::from(dt.hour())))
            })
            .collect();
        table = table
            .with_column(COLLISION_DATETIME, datetimes)?
            .with_column(COLLISION_HOUR, hours)?;
    } else {
        log::debug!("Crash table lacks date/time columns, skipping collision_datetime");
    }

    for &column in INDICATOR_COLUMNS {
        table = table.map_column(column, |v| indicator(v, options.indicator_missing));
    }

    let exempt: Vec<&str> = options.exempt_columns.iter().map(String::as_str).collect();
    let table = Elimination {
        table: "crashes",
        constant: true,
        max_missing: Some(MAX_MISSING_FRACTION),
        exempt: &exempt,
        always: RAW_COORDINATE_COLUMNS,
        always_reason: DropReason::RawCoordinate,
    }
    .apply(table, &mut report);

    let table = if options.require_location {
        drop_missing_location(table, &mut report)?
    } else {
        table
    };

    log::info!(
        "Cleaned crashes: {} rows x {} columns ({} warnings)",
        table.row_count(),
        table.column_count(),
        report.len()
    );

    Ok(Cleaned { table, report })
}

/// Keeps the first row for each case id. Missing ids collapse together.
fn dedup_case_ids(table: Table, report: &mut CleaningReport) -> Result<Table, CleanError> {
    let ids = table.require_column(CASE_ID)?;
    let mut seen = HashSet::new();
    let keep: Vec<bool> = ids
        .iter()
        .map(|id| {
            let first = seen.insert(id.key());
            if !first {
                report.push(DataIntegrityWarning::DuplicateCaseId {
                    case_id: id.to_string(),
                });
            }
            first
        })
        .collect();
    Ok(table.retain_rows(&keep))
}

/// First-non-missing-wins: `preferred` over `fallback`. A resolved value
/// outside `[-bound, bound]` becomes missing.
fn resolve_coordinate(
    table: &Table,
    preferred: &str,
    fallback: &str,
    axis: &'static str,
    bound: f64,
    case_ids: &[String],
    report: &mut CleaningReport,
) -> Vec<Value> {
    (0..table.row_count())
        .map(|row| {
            let pick = |name: &str| table.value(row, name).and_then(Value::as_f64);
            let Some(value) = pick(preferred).or_else(|| pick(fallback)) else {
                return Value::Missing;
            };
            if value.abs() > bound {
                report.push(DataIntegrityWarning::CoordinateOutOfRange {
                    case_id: case_ids[row].clone(),
                    axis,
                    value,
                });
                return Value::Missing;
            }
            Value::Float(value)
        })
        .collect()
}

fn combine_datetimes(
    table: &Table,
    case_ids: &[String],
    report: &mut CleaningReport,
) -> Vec<Value> {
    (0..table.row_count())
        .map(|row| {
            let date = table.value(row, COLLISION_DATE).unwrap_or(&Value::Missing);
            let time = table.value(row, COLLISION_TIME).unwrap_or(&Value::Missing);

            if time.is_missing() {
                return Value::Missing;
            }
            let case_id = &case_ids[row];

            let Some(code) = time.as_i64() else {
                return unparseable(report, case_id, date, time.to_string());
            };
            if !(0..=MAX_TIME_CODE).contains(&code) {
                report.push(DataIntegrityWarning::TimeOutOfRange {
                    case_id: case_id.clone(),
                    time: code,
                });
                return Value::Missing;
            }
            if date.is_missing() {
                return unparseable(report, case_id, date, format!("{code:04}"));
            }

            parse_collision_datetime(&date.to_string(), code).map_or_else(
                || unparseable(report, case_id, date, format!("{code:04}")),
                Value::DateTime,
            )
        })
        .collect()
}

fn unparseable(report: &mut CleaningReport, case_id: &str, date: &Value, time: String) -> Value {
    report.push(DataIntegrityWarning::UnparseableDateTime {
        case_id: case_id.to_string(),
        date: date.to_string(),
        time,
    });
    Value::Missing
}

/// Combines a `YYYY-MM-DD` date with an HHMM time code in `0..=2359`.
///
/// Returns `None` for an unparseable date or a code whose minute part is
/// 60 or more.
#[must_use]
pub fn parse_collision_datetime(date: &str, hhmm: i64) -> Option<NaiveDateTime> {
    if !(0..=MAX_TIME_CODE).contains(&hhmm) {
        return None;
    }
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let hour = u32::try_from(hhmm / 100).ok()?;
    let minute = u32::try_from(hhmm % 100).ok()?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    Some(date.and_time(time))
}

fn indicator(value: &Value, missing: IndicatorMissing) -> Value {
    match value {
        Value::Missing => match missing {
            IndicatorMissing::Preserve => Value::Missing,
            IndicatorMissing::AsFalse => Value::Bool(false),
        },
        Value::Text(s) => Value::Bool(s == "Y"),
        Value::Bool(b) => Value::Bool(*b),
        _ => Value::Bool(false),
    }
}

fn drop_missing_location(table: Table, report: &mut CleaningReport) -> Result<Table, CleanError> {
    let lat = table.require_column(LATITUDE_RESOLVED)?;
    let lng = table.require_column(LONGITUDE_RESOLVED)?;
    let keep: Vec<bool> = lat
        .iter()
        .zip(lng)
        .map(|(a, b)| !a.is_missing() && !b.is_missing())
        .collect();

    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        report.push(DataIntegrityWarning::RowsMissingLocation { count: dropped });
    }
    Ok(table.retain_rows(&keep))
}
