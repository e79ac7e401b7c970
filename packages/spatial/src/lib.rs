#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial primitives for crash locations.
//!
//! Web Mercator projection, haversine distances, and DBSCAN clustering
//! backed by an R-tree over the input points.

pub mod cluster;
pub mod projection;

pub use cluster::{ClusterSummary, dbscan, summarize};
pub use projection::{
    BoundingBox, EARTH_MEAN_RADIUS_M, HAVERSINE, MAX_MERCATOR_LATITUDE, WEB_MERCATOR_RADIUS_M,
    from_web_mercator, haversine_distance_m, meters_to_radians, to_web_mercator,
};
