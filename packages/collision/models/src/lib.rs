#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collision record types and severity definitions.
//!
//! This crate defines the typed view of the cleaned crash, party, and
//! victim tables used by the spatial pipeline, along with the SWITRS
//! collision severity scale and the cluster labels attached to crash
//! points.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Collision severity, from 0 (property damage only) to 4 (complaint of
/// pain).
///
/// The numeric scale is ordinal but not monotone in harm: 1 is the most
/// severe outcome and 0 the least.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CollisionSeverity {
    /// Level 0: No injuries reported
    PropertyDamageOnly = 0,
    /// Level 1: At least one person killed
    Fatal = 1,
    /// Level 2: Severe injury
    SevereInjury = 2,
    /// Level 3: Other visible injury
    VisibleInjury = 3,
    /// Level 4: Complaint of pain
    ComplaintOfPain = 4,
}

impl CollisionSeverity {
    /// Returns the numeric code of this severity level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Creates a severity level from its numeric code.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 0-4.
    pub const fn from_value(value: u8) -> Result<Self, InvalidSeverityError> {
        match value {
            0 => Ok(Self::PropertyDamageOnly),
            1 => Ok(Self::Fatal),
            2 => Ok(Self::SevereInjury),
            3 => Ok(Self::VisibleInjury),
            4 => Ok(Self::ComplaintOfPain),
            _ => Err(InvalidSeverityError { value }),
        }
    }

    /// Whether this severity counts toward Killed-or-Severely-Injured.
    #[must_use]
    pub const fn is_ksi(self) -> bool {
        matches!(self, Self::Fatal | Self::SevereInjury)
    }

    /// Human-readable label as printed in the SWITRS codebook.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::PropertyDamageOnly => "Property Damage Only",
            Self::Fatal => "Fatal",
            Self::SevereInjury => "Injury (Severe)",
            Self::VisibleInjury => "Injury (Other Visible)",
            Self::ComplaintOfPain => "Injury (Complaint of Pain)",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::PropertyDamageOnly,
            Self::Fatal,
            Self::SevereInjury,
            Self::VisibleInjury,
            Self::ComplaintOfPain,
        ]
    }
}

/// Error returned when attempting to create a [`CollisionSeverity`] from an
/// invalid numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSeverityError {
    /// The invalid severity value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidSeverityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid severity value {}: expected 0-4", self.value)
    }
}

impl std::error::Error for InvalidSeverityError {}

/// One collision case from the cleaned crash table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashRecord {
    /// Case identifier, unique within a cleaned crash table.
    pub case_id: String,
    /// Latitude (WGS84). `None` if neither coordinate source was populated.
    pub latitude: Option<f64>,
    /// Longitude (WGS84). `None` if neither coordinate source was populated.
    pub longitude: Option<f64>,
    /// Date plus HHMM time of the collision.
    pub collision_datetime: Option<NaiveDateTime>,
    /// Hour component of `collision_datetime` (0-23).
    pub collision_hour: Option<u32>,
    /// Reporting year.
    pub accident_year: Option<i32>,
    /// Collision severity.
    pub severity: Option<CollisionSeverity>,
    /// Alcohol involvement flag.
    pub alcohol_involved: Option<bool>,
    /// Pedestrian involvement flag.
    pub pedestrian_accident: Option<bool>,
    /// Motorcycle involvement flag.
    pub motorcycle_accident: Option<bool>,
    /// Truck involvement flag.
    pub truck_accident: Option<bool>,
    /// Primary road name.
    pub primary_road: Option<String>,
    /// Secondary (cross) road name.
    pub secondary_road: Option<String>,
}

impl CrashRecord {
    /// Returns `(latitude, longitude)` when both are known.
    #[must_use]
    pub const fn location(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }
}

/// One party (driver, pedestrian, cyclist, ...) to a collision case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyRecord {
    /// Owning case identifier.
    pub case_id: String,
    /// Party number within the case.
    pub party_number: i64,
    /// Age in years, `None` when unknown.
    pub age: Option<u16>,
    /// Sex code (`M`/`F`), `None` when unknown.
    pub sex: Option<String>,
    /// Whether this party was found at fault.
    pub at_fault: Option<bool>,
    /// Vehicle type code.
    pub vehicle_type: Option<String>,
}

/// One victim, attached to the party they were associated with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VictimRecord {
    /// Owning case identifier.
    pub case_id: String,
    /// Party number of the owning party.
    pub party_number: i64,
    /// Age in years, `None` when unknown.
    pub age: Option<u16>,
    /// Sex code (`M`/`F`), `None` when unknown.
    pub sex: Option<String>,
}

/// Cluster membership of a single crash point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterLabel {
    /// Not density-reachable from any core point.
    Noise,
    /// Member of the cluster with this id.
    Cluster(usize),
}

impl ClusterLabel {
    /// Returns the cluster id, or `None` for noise.
    #[must_use]
    pub const fn cluster_id(self) -> Option<usize> {
        match self {
            Self::Noise => None,
            Self::Cluster(id) => Some(id),
        }
    }

    /// Whether this point belongs to the noise class.
    #[must_use]
    pub const fn is_noise(self) -> bool {
        matches!(self, Self::Noise)
    }
}
