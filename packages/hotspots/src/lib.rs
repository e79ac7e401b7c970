#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crash hot-spot analysis.
//!
//! Selects the cleaned crashes matching a severity and year query, clusters
//! their locations with DBSCAN, estimates a density surface over the
//! projected points, and ranks the clustered crashes by a grouping column.
//! The resulting [`HotspotReport`] is the hand-off to rendering.

pub mod config;
pub mod select;

use collision_map_analytics::{AnalyticsError, TopGroupsResult};
use collision_map_clean::CleanError;
use collision_map_collision_models::ClusterLabel;
use collision_map_density::{DensityError, DensitySurface, Grid};
use collision_map_spatial::{ClusterSummary, dbscan, summarize, to_web_mercator};
use collision_map_table::{Table, TableError};
use geo::Point;
use serde::Serialize;
use thiserror::Error;

pub use config::{ConfigError, HotspotConfig, HotspotQuery, Selection};
pub use select::{CLUSTER, crash_points, select_crashes};

/// Errors that abort a hot-spot analysis.
#[derive(Debug, Error)]
pub enum HotspotError {
    /// A query parameter is invalid.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The selected crashes cannot support a density surface.
    #[error(transparent)]
    DegenerateInput(#[from] DensityError),

    /// Loading or cleaning the input failed.
    #[error(transparent)]
    Clean(#[from] CleanError),

    /// A column the analysis depends on is absent.
    #[error(transparent)]
    Table(#[from] TableError),

    /// The grouping column is absent.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

/// One selected crash and its cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabeledPoint {
    pub case_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub cluster: ClusterLabel,
}

/// Everything a rendering step needs for one query.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotReport {
    /// The configuration the report was produced with.
    pub config: HotspotConfig,
    /// Crashes matching the query.
    pub selected: usize,
    pub noise: usize,
    pub clusters: Vec<ClusterSummary>,
    pub points: Vec<LabeledPoint>,
    /// `None` when density estimation was disabled or failed.
    pub density: Option<DensitySurface>,
    /// Why the surface is absent although density estimation was enabled.
    pub density_error: Option<DensityError>,
    pub top_groups: TopGroupsResult,
    /// Selected crashes with a [`CLUSTER`] column appended.
    #[serde(skip)]
    pub labeled: Table,
}

impl HotspotReport {
    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// The density surface, `None` when density estimation was disabled.
    ///
    /// # Errors
    ///
    /// Returns [`HotspotError::DegenerateInput`] when estimation was enabled
    /// but the selected crashes could not support a surface.
    pub fn density_outcome(&self) -> Result<Option<&DensitySurface>, HotspotError> {
        match &self.density_error {
            Some(e) => Err(HotspotError::DegenerateInput(e.clone())),
            None => Ok(self.density.as_ref()),
        }
    }
}

/// Clusters the crash locations of `crashes`.
///
/// # Errors
///
/// Returns an error if the query is invalid or the coordinate columns are
/// absent.
pub fn cluster_crashes(
    crashes: &Table,
    query: &HotspotQuery,
) -> Result<Vec<ClusterLabel>, HotspotError> {
    query.validate()?;
    let points = crash_points(crashes)?;
    Ok(dbscan(&points, query.eps_meters, query.min_samples()))
}

/// Projects the crash locations to Web Mercator and estimates their density.
///
/// # Errors
///
/// Returns [`HotspotError::DegenerateInput`] when fewer than two distinct
/// locations remain, or the locations are collinear.
pub fn density_surface(crashes: &Table, grid: &Grid) -> Result<DensitySurface, HotspotError> {
    let projected: Vec<Point<f64>> = crash_points(crashes)?
        .into_iter()
        .filter(|p| p.x().is_finite() && p.y().is_finite())
        .map(to_web_mercator)
        .collect();
    Ok(collision_map_density::estimate(&projected, grid)?)
}

/// Runs the full analysis on a cleaned crash table.
///
/// An empty selection yields an empty report. When density estimation is
/// enabled but the selection has too little spread, the clustering is still
/// returned and [`HotspotReport::density_outcome`] reports the failure.
///
/// # Errors
///
/// * [`HotspotError::Configuration`] - the config is invalid
/// * [`HotspotError::Table`] or [`HotspotError::Analytics`] - a required
///   column is absent
pub fn run(crashes: &Table, config: &HotspotConfig) -> Result<HotspotReport, HotspotError> {
    config.validate()?;

    let selected = select_crashes(crashes, &config.query)?;
    let points = crash_points(&selected)?;
    let labels = dbscan(&points, config.query.eps_meters, config.query.min_samples());
    let clusters = summarize(&points, &labels);
    let noise = labels.iter().filter(|l| l.is_noise()).count();

    let (density, density_error) = if config.density {
        match density_surface(&selected, &config.grid()) {
            Ok(surface) => (Some(surface), None),
            Err(HotspotError::DegenerateInput(e)) => {
                log::warn!("Skipping density surface: {e}");
                (None, Some(e))
            }
            Err(e) => return Err(e),
        }
    } else {
        (None, None)
    };

    let top_groups =
        collision_map_analytics::top_groups(&selected, &labels, &config.group_by, config.top_k())?;

    let ids = selected.require_column(collision_map_clean::CASE_ID)?;
    let labeled_points = ids
        .iter()
        .zip(&points)
        .zip(&labels)
        .map(|((id, point), label)| LabeledPoint {
            case_id: id.to_string(),
            latitude: point.y(),
            longitude: point.x(),
            cluster: *label,
        })
        .collect();

    let labeled = selected
        .clone()
        .with_column(CLUSTER, select::cluster_column(&labels))?;

    log::info!(
        "Hot-spot analysis: {} crashes, {} clusters, {noise} noise",
        selected.row_count(),
        clusters.len()
    );

    Ok(HotspotReport {
        config: config.clone(),
        selected: selected.row_count(),
        noise,
        clusters,
        points: labeled_points,
        density,
        density_error,
        top_groups,
        labeled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use collision_map_clean::{CrashCleanOptions, clean_crashes};
    use collision_map_spatial::haversine_distance_m;

    /// 25 crashes within about 30 m of each other on Market St and Mission
    /// St, plus 5 crashes each more than a kilometer from everything.
    fn synthetic_crashes() -> Table {
        let mut csv = String::from(
            "CASE_ID,POINT_X,POINT_Y,COLLISION_DATE,COLLISION_TIME,COLLISION_SEVERITY,ACCIDENT_YEAR,PRIMARY_RD\n",
        );
        let mut case = 0;
        for i in 0..5 {
            for j in 0..5 {
                case += 1;
                let road = if case <= 15 { "MARKET ST" } else { "MISSION ST" };
                csv.push_str(&format!(
                    "{case},{},{},2019-06-01,{},{},2019,{road}\n",
                    -122.41 + f64::from(j) * 0.000_05,
                    37.77 + f64::from(i) * 0.000_05,
                    800 + case,
                    case % 5,
                ));
            }
        }
        for (lng, lat) in [
            (-122.43, 37.77),
            (-122.39, 37.77),
            (-122.41, 37.79),
            (-122.41, 37.75),
            (-122.45, 37.80),
        ] {
            case += 1;
            csv.push_str(&format!("{case},{lng},{lat},2020-06-01,1300,2,2020,OTHER ST\n"));
        }

        let raw = Table::from_csv_reader(csv.as_bytes()).unwrap();
        clean_crashes(&raw, &CrashCleanOptions::default()).unwrap().table
    }

    fn config() -> HotspotConfig {
        HotspotConfig {
            query: HotspotQuery {
                eps_meters: 100.0,
                min_samples: 10,
                ..HotspotQuery::default()
            },
            grid_size: 50,
            ..HotspotConfig::default()
        }
    }

    #[test]
    fn finds_one_hotspot_among_scattered_crashes() {
        let report = run(&synthetic_crashes(), &config()).unwrap();

        assert_eq!(report.selected, 30);
        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].size, 25);
        assert_eq!(report.noise, 5);
        assert!(report.points[25..].iter().all(|p| p.cluster.is_noise()));
        assert_eq!(report.points[0].case_id, "1");

        let names: Vec<&str> = report.top_groups.groups.iter().map(|g| g.group.as_str()).collect();
        assert_eq!(names, ["MARKET ST", "MISSION ST"]);
        assert_eq!(report.top_groups.total, 25);

        assert_eq!(report.labeled.value(0, CLUSTER), Some(&collision_map_table::Value::Int(0)));
        assert!(report.labeled.value(29, CLUSTER).unwrap().is_missing());
    }

    #[test]
    fn density_peaks_near_the_hotspot() {
        let report = run(&synthetic_crashes(), &config()).unwrap();
        let density = report.density_outcome().unwrap().unwrap();
        assert_eq!(density.xs.len(), 50);

        let (x, y, _) = density.peak().unwrap();
        let peak = collision_map_spatial::from_web_mercator(Point::new(x, y));
        let center = Point::new(-122.4099, 37.7701);
        assert!(haversine_distance_m(peak, center) < 1_500.0);
    }

    #[test]
    fn severity_filter_narrows_the_selection() {
        let mut config = config();
        config.query.severity = Some(Selection::One(2));
        config.query.min_samples = 2;
        let report = run(&synthetic_crashes(), &config).unwrap();

        // Five clustered crashes have severity 2, plus the scattered ones.
        assert_eq!(report.selected, 10);
        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].size, 5);
    }

    #[test]
    fn empty_selection_is_empty_without_density() {
        let mut config = config();
        config.query.year = Some(Selection::One(2015));
        config.density = false;
        let report = run(&synthetic_crashes(), &config).unwrap();
        assert_eq!(report.selected, 0);
        assert!(report.clusters.is_empty());
        assert!(report.points.is_empty());
        assert!(report.density.is_none());
        assert!(report.top_groups.groups.is_empty());
    }

    #[test]
    fn empty_selection_with_density_reports_degenerate_input() {
        let mut config = config();
        config.query.year = Some(Selection::One(2015));
        let report = run(&synthetic_crashes(), &config).unwrap();
        assert_eq!(report.selected, 0);
        assert!(report.density.is_none());
        assert!(matches!(
            report.density_outcome(),
            Err(HotspotError::DegenerateInput(DensityError::DegenerateInput { .. }))
        ));
    }

    #[test]
    fn coincident_crashes_keep_their_cluster_without_density() {
        let raw = Table::from_csv_reader(
            "CASE_ID,POINT_X,POINT_Y,COLLISION_SEVERITY,PRIMARY_RD\n\
             1,-122.41,37.77,1,MARKET ST\n\
             2,-122.41,37.77,2,MARKET ST\n\
             3,-122.41,37.77,3,MARKET ST\n"
                .as_bytes(),
        )
        .unwrap();
        let crashes = clean_crashes(&raw, &CrashCleanOptions::default())
            .unwrap()
            .table;
        let mut config = config();
        config.query.min_samples = 2;

        let report = run(&crashes, &config).unwrap();
        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].size, 3);
        assert_eq!(report.top_groups.groups[0].count, 3);
        assert!(report.density.is_none());
        assert!(report.density_outcome().is_err());

        let value: serde_json::Value =
            serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(value["densityError"]["kind"], "degenerateInput");
    }

    #[test]
    fn disabled_density_is_not_an_error() {
        let mut config = config();
        config.density = false;
        let report = run(&synthetic_crashes(), &config).unwrap();
        assert!(matches!(report.density_outcome(), Ok(None)));
    }

    #[test]
    fn invalid_config_is_rejected_before_work() {
        let mut config = config();
        config.query.eps_meters = 0.0;
        assert!(matches!(
            run(&synthetic_crashes(), &config),
            Err(HotspotError::Configuration(ConfigError::NonPositiveEps { .. }))
        ));
    }

    #[test]
    fn unknown_group_column_is_an_error() {
        let mut config = config();
        config.group_by = "NOT_A_COLUMN".to_string();
        config.density = false;
        assert!(matches!(
            run(&synthetic_crashes(), &config),
            Err(HotspotError::Analytics(_))
        ));
    }

    #[test]
    fn cluster_crashes_matches_run() {
        let crashes = synthetic_crashes();
        let labels = cluster_crashes(&crashes, &config().query).unwrap();
        assert_eq!(labels.iter().filter(|l| !l.is_noise()).count(), 25);
    }

    #[test]
    fn report_serializes_to_json() {
        let mut config = config();
        config.density = false;
        let json = run(&synthetic_crashes(), &config).unwrap().to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["selected"], 30);
        assert_eq!(value["clusters"][0]["size"], 25);
        assert_eq!(value["points"][29]["cluster"], "noise");
        assert_eq!(value["topGroups"]["groupBy"], "PRIMARY_RD");
        assert!(value["density"].is_null());
        assert!(value["densityError"].is_null());
    }
}
