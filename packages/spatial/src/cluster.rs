//! Density-based clustering (DBSCAN) under the [`HAVERSINE`] metric.
//!
//! A point's neighborhood is every point within `eps` great-circle meters,
//! itself included. A point is core when its neighborhood holds at least
//! `min_samples` points. Clusters are grown breadth-first from core points
//! in input order, so ids follow the first core point of each cluster and
//! the result is deterministic for a given input order.

use std::collections::{BTreeMap, VecDeque};

use collision_map_collision_models::ClusterLabel;
use geo::{Distance, Point};
use rayon::prelude::*;
use rstar::{AABB, RTree, RTreeObject};
use serde::Serialize;

use crate::projection::{HAVERSINE, meters_to_radians};

/// Padding added to degree-space query windows so that rounding never
/// excludes a true neighbor.
const WINDOW_PADDING_DEG: f64 = 1e-9;

/// A located input point stored in the R-tree.
struct PointEntry {
    index: usize,
    point: Point<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for PointEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Labels each point as noise or a member of a cluster.
///
/// Points are `(x = longitude, y = latitude)` in degrees. An empty input
/// yields an empty result; a non-positive or non-finite `eps_meters` makes
/// every point noise. Points with a non-finite coordinate are always noise.
#[must_use]
pub fn dbscan(points: &[Point<f64>], eps_meters: f64, min_samples: usize) -> Vec<ClusterLabel> {
    if points.is_empty() {
        return Vec::new();
    }
    if !(eps_meters.is_finite() && eps_meters > 0.0) {
        log::warn!("DBSCAN eps {eps_meters} m is not positive, labeling all points noise");
        return vec![ClusterLabel::Noise; points.len()];
    }

    let min_samples = min_samples.max(1);
    let neighborhoods = neighborhoods(points, eps_meters);

    let is_core: Vec<bool> = neighborhoods
        .iter()
        .map(|neighbors| neighbors.len() >= min_samples)
        .collect();

    let mut labels: Vec<Option<ClusterLabel>> = vec![None; points.len()];
    let mut next_id = 0;
    let mut queue = VecDeque::new();

    for seed in 0..points.len() {
        if labels[seed].is_some() || !is_core[seed] {
            continue;
        }
        let label = ClusterLabel::Cluster(next_id);
        next_id += 1;
        labels[seed] = Some(label);
        queue.push_back(seed);

        while let Some(current) = queue.pop_front() {
            if !is_core[current] {
                continue;
            }
            for &neighbor in &neighborhoods[current] {
                if labels[neighbor].is_none() {
                    labels[neighbor] = Some(label);
                    queue.push_back(neighbor);
                }
            }
        }
    }

    let labels: Vec<ClusterLabel> = labels
        .into_iter()
        .map(|label| label.unwrap_or(ClusterLabel::Noise))
        .collect();

    let noise = labels.iter().filter(|l| l.is_noise()).count();
    log::debug!(
        "DBSCAN(eps={eps_meters} m, min_samples={min_samples}): {} points, {next_id} clusters, {noise} noise",
        points.len()
    );

    labels
}

/// Sorted neighbor indices of every point, computed in parallel.
fn neighborhoods(points: &[Point<f64>], eps_meters: f64) -> Vec<Vec<usize>> {
    let eps = meters_to_radians(eps_meters);
    let entries: Vec<PointEntry> = points
        .iter()
        .enumerate()
        .filter(|(_, p)| p.x().is_finite() && p.y().is_finite())
        .map(|(index, p)| PointEntry {
            index,
            point: *p,
            envelope: AABB::from_point([p.x(), p.y()]),
        })
        .collect();
    let tree = RTree::bulk_load(entries);

    points
        .par_iter()
        .map(|p| {
            if !(p.x().is_finite() && p.y().is_finite()) {
                return Vec::new();
            }
            let mut neighbors: Vec<usize> = tree
                .locate_in_envelope_intersecting(&query_window(*p, eps))
                .filter(|entry| HAVERSINE.distance(*p, entry.point) <= eps_meters)
                .map(|entry| entry.index)
                .collect();
            neighbors.sort_unstable();
            neighbors
        })
        .collect()
}

/// Degree-space window containing every point within central angle `eps`
/// of `origin`. Falls back to the full longitude range near the poles and
/// across the antimeridian.
fn query_window(origin: Point<f64>, eps: f64) -> AABB<[f64; 2]> {
    let eps_deg = eps.to_degrees() + WINDOW_PADDING_DEG;
    let lat_deg = origin.y();
    let lat = lat_deg.to_radians();
    let min_lat = (lat_deg - eps_deg).max(-90.0);
    let max_lat = (lat_deg + eps_deg).min(90.0);

    let full = AABB::from_corners([-180.0, min_lat], [180.0, max_lat]);
    if lat_deg.abs() + eps_deg >= 90.0 || eps >= std::f64::consts::FRAC_PI_2 {
        return full;
    }

    // Widest longitude offset reachable at this latitude.
    let ratio = eps.sin() / lat.cos();
    if ratio >= 1.0 {
        return full;
    }
    let dlng = ratio.asin().to_degrees() + WINDOW_PADDING_DEG;
    let lng_deg = origin.x();
    if lng_deg - dlng < -180.0 || lng_deg + dlng > 180.0 {
        return full;
    }

    AABB::from_corners([lng_deg - dlng, min_lat], [lng_deg + dlng, max_lat])
}

/// Size and centroid of one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    /// Cluster id, as in [`ClusterLabel::Cluster`].
    pub id: usize,
    /// Member count, border points included.
    pub size: usize,
    /// Mean member latitude in degrees.
    pub centroid_latitude: f64,
    /// Mean member longitude in degrees.
    pub centroid_longitude: f64,
}

/// Summarizes every non-noise cluster, ordered by id.
///
/// `labels` must be the output of [`dbscan`] for `points`.
#[must_use]
pub fn summarize(points: &[Point<f64>], labels: &[ClusterLabel]) -> Vec<ClusterSummary> {
    let mut sums: BTreeMap<usize, (usize, f64, f64)> = BTreeMap::new();
    for (point, label) in points.iter().zip(labels) {
        if let Some(id) = label.cluster_id() {
            let entry = sums.entry(id).or_insert((0, 0.0, 0.0));
            entry.0 += 1;
            entry.1 += point.y();
            entry.2 += point.x();
        }
    }

    sums.into_iter()
        .map(|(id, (size, lat, lng))| {
            #[allow(clippy::cast_precision_loss)]
            let n = size as f64;
            ClusterSummary {
                id,
                size,
                centroid_latitude: lat / n,
                centroid_longitude: lng / n,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 25 points on a 5x5 grid about 5 m apart near Market St, followed by 5
    /// isolated points roughly a kilometer away from everything.
    fn hotspot_with_scatter() -> Vec<Point<f64>> {
        let mut points = Vec::new();
        for i in 0..5 {
            for j in 0..5 {
                points.push(Point::new(
                    -122.41 + f64::from(j) * 0.000_05,
                    37.77 + f64::from(i) * 0.000_05,
                ));
            }
        }
        points.extend([
            Point::new(-122.43, 37.77),
            Point::new(-122.39, 37.77),
            Point::new(-122.41, 37.79),
            Point::new(-122.41, 37.75),
            Point::new(-122.45, 37.80),
        ]);
        points
    }

    #[test]
    fn finds_single_hotspot_and_noise() {
        let points = hotspot_with_scatter();
        let labels = dbscan(&points, 100.0, 10);

        assert_eq!(labels.len(), 30);
        assert!(labels[..25].iter().all(|l| *l == ClusterLabel::Cluster(0)));
        assert!(labels[25..].iter().all(|l| l.is_noise()));

        let summary = summarize(&points, &labels);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].size, 25);
        assert!((summary[0].centroid_latitude - 37.7701).abs() < 1e-9);
        assert!((summary[0].centroid_longitude - -122.4099).abs() < 1e-9);
    }

    #[test]
    fn empty_input_is_empty() {
        assert!(dbscan(&[], 100.0, 5).is_empty());
    }

    #[test]
    fn fewer_points_than_min_samples_is_all_noise() {
        let points = vec![Point::new(-122.41, 37.77), Point::new(-122.41, 37.770_01)];
        let labels = dbscan(&points, 100.0, 3);
        assert_eq!(labels, vec![ClusterLabel::Noise; 2]);
    }

    #[test]
    fn non_positive_eps_is_all_noise() {
        let points = hotspot_with_scatter();
        assert!(dbscan(&points, 0.0, 1).iter().all(|l| l.is_noise()));
        assert!(dbscan(&points, -5.0, 1).iter().all(|l| l.is_noise()));
        assert!(dbscan(&points, f64::NAN, 1).iter().all(|l| l.is_noise()));
    }

    #[test]
    fn neighborhood_counts_the_point_itself() {
        let labels = dbscan(&[Point::new(-122.41, 37.77)], 10.0, 1);
        assert_eq!(labels, vec![ClusterLabel::Cluster(0)]);
    }

    #[test]
    fn ids_follow_first_core_point() {
        let points = vec![
            Point::new(-122.50, 37.70),
            Point::new(-122.40, 37.80),
            Point::new(-122.40, 37.800_1),
            Point::new(-122.50, 37.700_1),
        ];
        let labels = dbscan(&points, 50.0, 2);
        assert_eq!(
            labels,
            vec![
                ClusterLabel::Cluster(0),
                ClusterLabel::Cluster(1),
                ClusterLabel::Cluster(1),
                ClusterLabel::Cluster(0),
            ]
        );
    }

    #[test]
    fn border_points_join_but_do_not_expand() {
        // 0.0008 deg of latitude is about 89 m, 0.00092 deg about 102 m.
        let points = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.000_8),
            Point::new(0.0, 0.001_72),
            Point::new(0.0, -0.000_12),
        ];
        let labels = dbscan(&points, 100.0, 3);
        assert_eq!(labels[0], ClusterLabel::Cluster(0));
        assert_eq!(labels[1], ClusterLabel::Cluster(0));
        assert_eq!(labels[3], ClusterLabel::Cluster(0));
        assert!(labels[2].is_noise());
    }

    #[test]
    fn clusters_across_the_antimeridian() {
        let points = vec![Point::new(179.999_9, 0.0), Point::new(-179.999_9, 0.0)];
        let labels = dbscan(&points, 50.0, 2);
        assert_eq!(labels, vec![ClusterLabel::Cluster(0); 2]);
    }

    #[test]
    fn clusters_across_the_pole() {
        let points = vec![Point::new(0.0, 89.999_5), Point::new(180.0, 89.999_5)];
        let labels = dbscan(&points, 200.0, 2);
        assert_eq!(labels, vec![ClusterLabel::Cluster(0); 2]);
    }

    #[test]
    fn non_finite_points_are_noise() {
        let points = vec![
            Point::new(-122.41, 37.77),
            Point::new(f64::NAN, 37.77),
            Point::new(-122.41, 37.770_01),
        ];
        let labels = dbscan(&points, 50.0, 2);
        assert_eq!(labels[0], ClusterLabel::Cluster(0));
        assert!(labels[1].is_noise());
        assert_eq!(labels[2], ClusterLabel::Cluster(0));
    }

    #[test]
    fn is_deterministic() {
        let points = hotspot_with_scatter();
        let first = dbscan(&points, 100.0, 10);
        for _ in 0..5 {
            assert_eq!(dbscan(&points, 100.0, 10), first);
        }
    }
}
