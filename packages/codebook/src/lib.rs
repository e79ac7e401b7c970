#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! SWITRS codebooks.
//!
//! Static code-to-label tables for the coded crash columns, and
//! [`decode_table`] which applies them to a [`Table`]. Codes absent from a
//! codebook pass through unchanged.

use collision_map_table::{Table, TableError, Value};

/// A codebook: `(code, label)` pairs.
pub type Codebook = &'static [(&'static str, &'static str)];

pub const WEATHER: Codebook = &[
    ("A", "Clear"),
    ("B", "Cloudy"),
    ("C", "Raining"),
    ("D", "Snowing"),
    ("E", "Fog"),
    ("F", "Other"),
    ("G", "Wind"),
    ("-", "Not Stated"),
];

pub const SEVERITY: Codebook = &[
    ("0", "Property Damage Only"),
    ("1", "Fatal"),
    ("2", "Injury (Severe)"),
    ("3", "Injury (Other Visible)"),
    ("4", "Injury (Complaint of Pain)"),
];

pub const COLLISION_TYPE: Codebook = &[
    ("A", "Head-On"),
    ("B", "Sideswipe"),
    ("C", "Rear End"),
    ("D", "Broadside"),
    ("E", "Hit Object"),
    ("F", "Overturned"),
    ("G", "Vehicle/Pedestrian"),
    ("H", "Other"),
    ("-", "Not Stated"),
];

pub const ROAD_SURFACE: Codebook = &[
    ("A", "Dry"),
    ("B", "Wet"),
    ("C", "Snowy"),
    ("D", "Icy"),
    ("E", "Slippery (Mud/Oil)"),
    ("F", "Loose Material"),
    ("G", "Rough"),
    ("H", "Damaged"),
    ("I", "Construction"),
    ("J", "Other"),
    ("-", "Not Stated"),
];

pub const LIGHTING: Codebook = &[
    ("A", "Daylight"),
    ("B", "Dusk - Dawn"),
    ("C", "Dark - Street Lights"),
    ("D", "Dark - No Street Lights"),
    ("E", "Dark - Street Lights Not Functioning"),
    ("-", "Not Stated"),
];

pub const PRIMARY_COLLISION_FACTOR: Codebook = &[
    ("A", "VC Section Violation"),
    ("B", "Other Improper Driving"),
    ("C", "Other Than Driver"),
    ("D", "Unknown"),
    ("E", "Fell Asleep"),
    ("-", "Not Stated"),
];

pub const MOVEMENT: Codebook = &[
    ("A", "Stopped"),
    ("B", "Proceeding Straight"),
    ("C", "Ran Red Light"),
    ("D", "Ran Stop Sign"),
    ("E", "U-Turn"),
    ("F", "Left Turn"),
    ("G", "Right Turn"),
    ("H", "Slowing/Stopping"),
    ("J", "Changing Lanes"),
    ("K", "Parking Maneuver"),
    ("L", "Entering Traffic"),
    ("M", "Other Unsafe Turning"),
    ("N", "Xing into Opposing Lane"),
    ("O", "Parked"),
    ("P", "Merging"),
    ("Q", "Traveling Wrong Way"),
    ("R", "Other"),
    ("-", "Not Stated"),
];

pub const DAY_OF_WEEK: Codebook = &[
    ("1", "Monday"),
    ("2", "Tuesday"),
    ("3", "Wednesday"),
    ("4", "Thursday"),
    ("5", "Friday"),
    ("6", "Saturday"),
    ("7", "Sunday"),
];

/// Column name to codebook.
pub const COLUMN_CODEBOOKS: &[(&str, Codebook)] = &[
    ("WEATHER_1", WEATHER),
    ("WEATHER_2", WEATHER),
    ("COLLISION_SEVERITY", SEVERITY),
    ("TYPE_OF_COLLISION", COLLISION_TYPE),
    ("ROAD_SURFACE", ROAD_SURFACE),
    ("LIGHTING", LIGHTING),
    ("PCF_VIOL_CATEGORY", PRIMARY_COLLISION_FACTOR),
    ("DAY_OF_WEEK", DAY_OF_WEEK),
    ("MVIW", MOVEMENT),
];

/// Suffix of the label column added by [`DecodeMode::NewColumns`].
pub const DESC_SUFFIX: &str = "_DESC";

/// Where decoded labels are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Add a `<COLUMN>_DESC` column next to each coded column.
    #[default]
    NewColumns,
    /// Replace the coded values in place.
    Overwrite,
}

/// Returns the codebook for a column, if it is a coded column.
#[must_use]
pub fn codebook_for(column: &str) -> Option<Codebook> {
    COLUMN_CODEBOOKS
        .iter()
        .find(|(name, _)| *name == column)
        .map(|(_, book)| *book)
}

/// Looks up the label of `code` in the codebook of `column`.
#[must_use]
pub fn lookup(column: &str, code: &str) -> Option<&'static str> {
    let code = code.trim();
    codebook_for(column)?
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| *label)
}

/// Decodes every coded column present in `table`.
///
/// Missing cells stay missing; unknown codes pass through unchanged.
///
/// # Errors
///
/// Returns an error if a `_DESC` column name collides with an existing
/// column of a different length (never the case for a well-formed table).
pub fn decode_table(table: &Table, mode: DecodeMode) -> Result<Table, TableError> {
    let mut out = table.clone();
    for (column, _) in COLUMN_CODEBOOKS {
        let Some(values) = table.column(column) else {
            continue;
        };
        let decoded: Vec<Value> = values.iter().map(|v| decode_value(column, v)).collect();

        out = match mode {
            DecodeMode::NewColumns => {
                let name = format!("{column}{DESC_SUFFIX}");
                log::debug!("Created decoded column {name}");
                out.with_column(&name, decoded)?
            }
            DecodeMode::Overwrite => {
                log::debug!("Overwrote column {column} with descriptions");
                out.with_column(column, decoded)?
            }
        };
    }
    Ok(out)
}

fn decode_value(column: &str, value: &Value) -> Value {
    if value.is_missing() {
        return Value::Missing;
    }
    lookup(column, &value.to_string()).map_or_else(|| value.clone(), Value::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_known_codes() {
        assert_eq!(lookup("WEATHER_1", "A"), Some("Clear"));
        assert_eq!(lookup("COLLISION_SEVERITY", "1"), Some("Fatal"));
        assert_eq!(lookup("DAY_OF_WEEK", "7"), Some("Sunday"));
        assert_eq!(lookup("MVIW", "I"), None);
        assert_eq!(lookup("NOT_CODED", "A"), None);
    }

    #[test]
    fn new_columns_mode_keeps_codes() {
        let table = Table::new(vec![
            ("COLLISION_SEVERITY", vec![Value::Int(2), Value::Int(9), Value::Missing]),
            ("LIGHTING", vec![Value::from("C"), Value::from("Z"), Value::from("A")]),
        ])
        .unwrap();
        let decoded = decode_table(&table, DecodeMode::NewColumns).unwrap();

        assert_eq!(decoded.value(0, "COLLISION_SEVERITY"), Some(&Value::Int(2)));
        assert_eq!(
            decoded.column("COLLISION_SEVERITY_DESC").unwrap(),
            &[Value::from("Injury (Severe)"), Value::Int(9), Value::Missing]
        );
        assert_eq!(
            decoded.value(1, "LIGHTING_DESC"),
            Some(&Value::from("Z"))
        );
    }

    #[test]
    fn overwrite_mode_replaces_codes() {
        let table = Table::new(vec![("WEATHER_2", vec![Value::from("E")])]).unwrap();
        let decoded = decode_table(&table, DecodeMode::Overwrite).unwrap();
        assert_eq!(decoded.column_count(), 1);
        assert_eq!(decoded.value(0, "WEATHER_2"), Some(&Value::from("Fog")));
    }
}
