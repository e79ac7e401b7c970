//! Filtered-subset selection of cleaned crashes.

use chrono::Datelike;
use collision_map_clean::crash::{
    ACCIDENT_YEAR, COLLISION_DATETIME, COLLISION_SEVERITY, LATITUDE_RESOLVED, LONGITUDE_RESOLVED,
};
use collision_map_collision_models::ClusterLabel;
use collision_map_table::{Table, TableError, Value};
use geo::Point;

use crate::HotspotError;
use crate::config::HotspotQuery;

/// Keeps the located crashes that match the query's severity and year
/// selections, in input order.
///
/// The year of a crash is `ACCIDENT_YEAR`, or the year of
/// `collision_datetime` when that column is absent or the cell missing.
/// Crashes with a missing severity (or year) never match a severity (or
/// year) selection.
///
/// # Errors
///
/// * [`HotspotError::Configuration`] - the query is invalid
/// * [`HotspotError::Table`] - a column needed by the query is absent
pub fn select_crashes(crashes: &Table, query: &HotspotQuery) -> Result<Table, HotspotError> {
    query.validate()?;

    let latitudes = crashes.require_column(LATITUDE_RESOLVED)?;
    let longitudes = crashes.require_column(LONGITUDE_RESOLVED)?;
    let mut keep: Vec<bool> = latitudes
        .iter()
        .zip(longitudes)
        .map(|(lat, lng)| lat.as_f64().is_some() && lng.as_f64().is_some())
        .collect();
    let located = keep.iter().filter(|k| **k).count();

    if let Some(severities) = &query.severity {
        let column = crashes.require_column(COLLISION_SEVERITY)?;
        for (flag, value) in keep.iter_mut().zip(column) {
            *flag &= value.as_i64().is_some_and(|s| severities.contains(&s));
        }
    }

    if let Some(years) = &query.year {
        let accident_years = crashes.column(ACCIDENT_YEAR);
        let datetimes = crashes.column(COLLISION_DATETIME);
        if accident_years.is_none() && datetimes.is_none() {
            return Err(TableError::MissingColumn(ACCIDENT_YEAR.to_string()).into());
        }
        for (row, flag) in keep.iter_mut().enumerate() {
            let year = accident_years
                .and_then(|c| c[row].as_i64())
                .or_else(|| {
                    datetimes
                        .and_then(|c| c[row].as_datetime())
                        .map(|dt| i64::from(dt.year()))
                });
            *flag &= year.is_some_and(|y| years.contains(&y));
        }
    }

    let selected = crashes.clone().retain_rows(&keep);
    log::info!(
        "Selected {} of {} crashes ({located} located)",
        selected.row_count(),
        crashes.row_count()
    );
    Ok(selected)
}

/// Geographic points (`x = longitude`, `y = latitude`) of every row.
///
/// Rows without a location map to a non-finite point, which the cluster
/// engine labels noise and the density estimator ignores.
///
/// # Errors
///
/// Returns an error if either resolved coordinate column is absent.
pub fn crash_points(crashes: &Table) -> Result<Vec<Point<f64>>, TableError> {
    let latitudes = crashes.require_column(LATITUDE_RESOLVED)?;
    let longitudes = crashes.require_column(LONGITUDE_RESOLVED)?;
    Ok(latitudes
        .iter()
        .zip(longitudes)
        .map(|(lat, lng)| {
            Point::new(
                lng.as_f64().unwrap_or(f64::NAN),
                lat.as_f64().unwrap_or(f64::NAN),
            )
        })
        .collect())
}

/// Cluster label column appended to the selected crashes: the cluster id,
/// or missing for noise.
pub const CLUSTER: &str = "cluster";

pub(crate) fn cluster_column(labels: &[ClusterLabel]) -> Vec<Value> {
    labels
        .iter()
        .map(|label| {
            label
                .cluster_id()
                .and_then(|id| i64::try_from(id).ok())
                .map_or(Value::Missing, Value::Int)
        })
        .collect()
}
