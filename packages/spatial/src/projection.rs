//! Coordinate conversions.
//!
//! Geographic points are [`geo::Point`]s with `x = longitude` and
//! `y = latitude` in degrees (WGS84). Great-circle distances use
//! [`HAVERSINE`]; planar work uses spherical Web Mercator (EPSG:3857) in
//! meters.

use std::f64::consts::FRAC_PI_4;

use geo::{Distance, HaversineMeasure, Point};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances.
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_000.0;

/// Sphere radius of the Web Mercator projection.
pub const WEB_MERCATOR_RADIUS_M: f64 = 6_378_137.0;

/// Latitude at which Web Mercator becomes square; inputs are clamped to it.
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Converts a distance along the Earth's surface to a central angle.
#[must_use]
pub fn meters_to_radians(meters: f64) -> f64 {
    meters / EARTH_MEAN_RADIUS_M
}

/// Haversine metric on a sphere of [`EARTH_MEAN_RADIUS_M`].
pub const HAVERSINE: HaversineMeasure = HaversineMeasure::new(EARTH_MEAN_RADIUS_M);

/// Great-circle distance in meters.
#[must_use]
pub fn haversine_distance_m(a: Point<f64>, b: Point<f64>) -> f64 {
    HAVERSINE.distance(a, b)
}

/// Projects a geographic point to Web Mercator meters.
#[must_use]
pub fn to_web_mercator(point: Point<f64>) -> Point<f64> {
    let lat = point
        .y()
        .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
        .to_radians();
    let x = WEB_MERCATOR_RADIUS_M * point.x().to_radians();
    let y = WEB_MERCATOR_RADIUS_M * (FRAC_PI_4 + lat / 2.0).tan().ln();
    Point::new(x, y)
}

/// Inverse of [`to_web_mercator`].
#[must_use]
pub fn from_web_mercator(point: Point<f64>) -> Point<f64> {
    let lng = (point.x() / WEB_MERCATOR_RADIUS_M).to_degrees();
    let lat = (2.0 * (point.y() / WEB_MERCATOR_RADIUS_M).exp().atan() - 2.0 * FRAC_PI_4)
        .to_degrees();
    Point::new(lng, lat)
}

/// An axis-aligned rectangle in Web Mercator meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// West edge.
    pub min_x: f64,
    /// South edge.
    pub min_y: f64,
    /// East edge.
    pub max_x: f64,
    /// North edge.
    pub max_y: f64,
}

impl BoundingBox {
    /// San Francisco, slightly tightened on the west and south.
    pub const SAN_FRANCISCO: Self = Self {
        min_x: -13_639_000.0,
        min_y: 4_538_000.0,
        max_x: -13_620_000.0,
        max_y: 4_555_000.0,
    };

    /// Smallest box containing every point, `None` for no points.
    #[must_use]
    pub fn from_points(points: &[Point<f64>]) -> Option<Self> {
        let first = points.first()?;
        Some(points.iter().fold(
            Self {
                min_x: first.x(),
                min_y: first.y(),
                max_x: first.x(),
                max_y: first.y(),
            },
            |b, p| Self {
                min_x: b.min_x.min(p.x()),
                min_y: b.min_y.min(p.y()),
                max_x: b.max_x.max(p.x()),
                max_y: b.max_y.max(p.y()),
            },
        ))
    }

    /// Grows the box by `meters` on every side.
    #[must_use]
    pub fn expand(self, meters: f64) -> Self {
        Self {
            min_x: self.min_x - meters,
            min_y: self.min_y - meters,
            max_x: self.max_x + meters,
            max_y: self.max_y + meters,
        }
    }

    /// Whether the box has positive width and height.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.max_x > self.min_x && self.max_y > self.min_y
    }

    /// Whether `point` lies inside or on the edge of the box.
    #[must_use]
    pub fn contains(&self, point: Point<f64>) -> bool {
        (self.min_x..=self.max_x).contains(&point.x())
            && (self.min_y..=self.max_y).contains(&point.y())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_known_landmark() {
        // Ferry Building, San Francisco.
        let p = to_web_mercator(Point::new(-122.3937, 37.7955));
        assert!((p.x() - -13_624_804.36).abs() < 0.01, "x = {}", p.x());
        assert!((p.y() - 4_550_576.97).abs() < 0.01, "y = {}", p.y());
        assert!(BoundingBox::SAN_FRANCISCO.contains(p));
    }

    #[test]
    fn mercator_roundtrip() {
        let original = Point::new(-122.45, 37.76);
        let back = from_web_mercator(to_web_mercator(original));
        assert!((back.x() - original.x()).abs() < 1e-9);
        assert!((back.y() - original.y()).abs() < 1e-9);
    }

    #[test]
    fn origin_projects_to_origin() {
        let p = to_web_mercator(Point::new(0.0, 0.0));
        assert!(p.x().abs() < 1e-9);
        assert!(p.y().abs() < 1e-9);
    }

    #[test]
    fn poles_are_clamped() {
        let p = to_web_mercator(Point::new(0.0, 90.0));
        assert!(p.y().is_finite());
    }

    #[test]
    fn haversine_matches_one_degree_of_latitude() {
        let d = haversine_distance_m(Point::new(0.0, 0.0), Point::new(0.0, 1.0));
        let expected = EARTH_MEAN_RADIUS_M * 1f64.to_radians();
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn haversine_uses_mean_radius() {
        assert!((HAVERSINE.radius() - EARTH_MEAN_RADIUS_M).abs() < f64::EPSILON);
        // A quarter meridian.
        let d = haversine_distance_m(Point::new(10.0, 0.0), Point::new(10.0, 90.0));
        assert!((d - EARTH_MEAN_RADIUS_M * std::f64::consts::FRAC_PI_2).abs() < 1e-6);
    }

    #[test]
    fn haversine_is_zero_for_same_point() {
        let p = Point::new(-122.41, 37.77);
        assert!(haversine_distance_m(p, p).abs() < f64::EPSILON);
    }

    #[test]
    fn meters_to_radians_uses_mean_radius() {
        assert!((meters_to_radians(6_371_000.0) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bounding_box_from_points() {
        let b = BoundingBox::from_points(&[Point::new(1.0, 5.0), Point::new(-2.0, 7.0)]).unwrap();
        assert_eq!(
            b,
            BoundingBox {
                min_x: -2.0,
                min_y: 5.0,
                max_x: 1.0,
                max_y: 7.0
            }
        );
        assert!(BoundingBox::from_points(&[]).is_none());
        assert!(b.expand(1.0).contains(Point::new(2.0, 8.0)));
    }
}
