//! Hot-spot query parameters and their TOML file form.

use std::path::Path;

use collision_map_analytics::DEFAULT_TOP_K;
use collision_map_density::{DEFAULT_GRID_SIZE, Grid};
use collision_map_spatial::BoundingBox;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// First accident year covered by the data.
pub const MIN_YEAR: i64 = 2014;
/// Last accident year covered by the data.
pub const MAX_YEAR: i64 = 2024;
/// Highest severity code (complaint of pain).
pub const MAX_SEVERITY: i64 = 4;

/// Default neighborhood radius.
pub const DEFAULT_EPS_METERS: f64 = 100.0;
/// Default minimum neighborhood size of a core point.
pub const DEFAULT_MIN_SAMPLES: i64 = 25;
/// Default grouping column of the top-K ranking.
pub const DEFAULT_GROUP_BY: &str = "PRIMARY_RD";

/// A configuration value outside its valid domain, or an unreadable file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A selected year outside the covered years.
    #[error("Year {year} is outside {MIN_YEAR}-{MAX_YEAR}")]
    YearOutOfRange { year: i64 },

    /// A selected severity code that does not exist.
    #[error("Severity {severity} is outside 0-{MAX_SEVERITY}")]
    SeverityOutOfRange { severity: i64 },

    /// The neighborhood radius is not a positive finite number.
    #[error("eps_meters must be a positive number, got {eps_meters}")]
    NonPositiveEps { eps_meters: f64 },

    /// A core point must need at least one neighbor.
    #[error("min_samples must be positive, got {min_samples}")]
    NonPositiveMinSamples { min_samples: i64 },

    /// Density is enabled over a grid without samples or area.
    #[error("Density grid is empty: {reason}")]
    EmptyGrid { reason: String },

    /// The TOML document is malformed or has mistyped values.
    #[error("Invalid config file: {0}")]
    Toml(#[from] toml::de::Error),

    /// The config file could not be read.
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
}

/// Either a single value or a list of values.
///
/// In TOML, `severity = 1` and `severity = [1, 2]` are both accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Selection<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Selection<T> {
    /// The selected values.
    #[must_use]
    pub fn values(&self) -> &[T] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

impl<T: PartialEq> Selection<T> {
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.values().contains(value)
    }
}

impl<T> From<Vec<T>> for Selection<T> {
    fn from(mut values: Vec<T>) -> Self {
        if values.len() == 1 {
            Self::One(values.remove(0))
        } else {
            Self::Many(values)
        }
    }
}

/// Which crashes to cluster and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotspotQuery {
    /// Severity codes to keep; all severities when `None`.
    pub severity: Option<Selection<i64>>,
    /// Accident years to keep; all years when `None`.
    pub year: Option<Selection<i64>>,
    /// Neighborhood radius in great-circle meters.
    pub eps_meters: f64,
    /// Neighborhood size, the point itself included, that makes a core point.
    pub min_samples: i64,
}

impl Default for HotspotQuery {
    fn default() -> Self {
        Self {
            severity: None,
            year: None,
            eps_meters: DEFAULT_EPS_METERS,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

impl HotspotQuery {
    /// Checks every parameter against its valid domain.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::YearOutOfRange`] - a year outside 2014-2024
    /// * [`ConfigError::SeverityOutOfRange`] - a severity outside 0-4
    /// * [`ConfigError::NonPositiveEps`] - `eps_meters` not positive and finite
    /// * [`ConfigError::NonPositiveMinSamples`] - `min_samples <= 0`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(&year) = self
            .year
            .iter()
            .flat_map(Selection::values)
            .find(|y| !(MIN_YEAR..=MAX_YEAR).contains(*y))
        {
            return Err(ConfigError::YearOutOfRange { year });
        }
        if let Some(&severity) = self
            .severity
            .iter()
            .flat_map(Selection::values)
            .find(|s| !(0..=MAX_SEVERITY).contains(*s))
        {
            return Err(ConfigError::SeverityOutOfRange { severity });
        }
        if !(self.eps_meters.is_finite() && self.eps_meters > 0.0) {
            return Err(ConfigError::NonPositiveEps {
                eps_meters: self.eps_meters,
            });
        }
        if self.min_samples <= 0 {
            return Err(ConfigError::NonPositiveMinSamples {
                min_samples: self.min_samples,
            });
        }
        Ok(())
    }

    /// `min_samples` as a count. Only meaningful after [`Self::validate`].
    #[must_use]
    pub fn min_samples(&self) -> usize {
        usize::try_from(self.min_samples).unwrap_or(0)
    }
}

/// A full hot-spot analysis configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HotspotConfig {
    #[serde(flatten)]
    pub query: HotspotQuery,
    /// Groups in the top-K ranking; zero or negative returns none.
    pub top_k: i64,
    /// Column the clustered rows are ranked by.
    pub group_by: String,
    /// Density samples along each axis.
    pub grid_size: usize,
    /// Extent of the density grid in Web Mercator meters.
    pub bounding_box: BoundingBox,
    /// Whether to estimate a density surface at all.
    pub density: bool,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            query: HotspotQuery::default(),
            #[allow(clippy::cast_possible_wrap)]
            top_k: DEFAULT_TOP_K as i64,
            group_by: DEFAULT_GROUP_BY.to_string(),
            grid_size: DEFAULT_GRID_SIZE,
            bounding_box: BoundingBox::SAN_FRANCISCO,
            density: true,
        }
    }
}

impl HotspotConfig {
    /// Parses a TOML document; absent keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the document is malformed.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Toml`] if it is malformed.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::from_toml_str(&std::fs::read_to_string(path)?)?;
        log::info!("Loaded hot-spot config from {}", path.display());
        Ok(config)
    }

    /// Validates the query and the density grid.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.query.validate()?;
        if self.density {
            if self.grid_size == 0 {
                return Err(ConfigError::EmptyGrid {
                    reason: "grid_size is 0".to_string(),
                });
            }
            if !self.bounding_box.is_valid() {
                return Err(ConfigError::EmptyGrid {
                    reason: format!("bounding box {:?} has no area", self.bounding_box),
                });
            }
        }
        Ok(())
    }

    /// `top_k` as a count, zero for non-positive values.
    #[must_use]
    pub fn top_k(&self) -> usize {
        usize::try_from(self.top_k).unwrap_or(0)
    }

    #[must_use]
    pub const fn grid(&self) -> Grid {
        Grid::square(self.bounding_box, self.grid_size)
    }
}
