//! Cell values.

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// Format used when rendering timestamps to text.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single table cell.
///
/// Every column is nullable; [`Value::Missing`] is the one missing-value
/// marker regardless of the column's type.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No data.
    Missing,
    /// Boolean flag.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Finite floating point number.
    Float(f64),
    /// Free text.
    Text(String),
    /// Timestamp without time zone.
    DateTime(NaiveDateTime),
}

/// Hashable identity of a non-missing [`Value`], used for join keys and
/// deduplication.
///
/// Integral floats and integer text collapse onto the integer key so that
/// `1`, `1.0` and `"1"` match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    /// Boolean key.
    Bool(bool),
    /// Integer key.
    Int(i64),
    /// Non-integral float key, compared by bit pattern.
    Float(u64),
    /// Text key.
    Text(String),
    /// Timestamp key.
    DateTime(NaiveDateTime),
}

impl Value {
    /// Whether this cell is missing.
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Returns the text payload, if this is a text cell.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an integer.
    ///
    /// Integral floats and numeric text are accepted.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as a float.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => parse_finite(s),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean cell.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the timestamp payload, if this is a timestamp cell.
    #[must_use]
    pub const fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    /// Hashable key for this value, `None` when missing.
    #[must_use]
    pub fn key(&self) -> Option<ValueKey> {
        match self {
            Self::Missing => None,
            Self::Bool(b) => Some(ValueKey::Bool(*b)),
            Self::Int(i) => Some(ValueKey::Int(*i)),
            Self::Float(f) => Some(
                self.as_i64()
                    .map_or(ValueKey::Float(f.to_bits()), ValueKey::Int),
            ),
            Self::Text(s) => Some(
                s.trim()
                    .parse()
                    .map_or_else(|_| ValueKey::Text(s.clone()), ValueKey::Int),
            ),
            Self::DateTime(dt) => Some(ValueKey::DateTime(*dt)),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Missing => serializer.serialize_none(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::Float(x) => serializer.serialize_f64(*x),
            Self::Text(s) => serializer.serialize_str(s),
            Self::DateTime(dt) => serializer.collect_str(&dt.format(DATETIME_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Missing, Into::into)
    }
}

/// Parses a float, rejecting `NaN` and infinities.
#[must_use]
pub fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_float_matches_int_key() {
        assert_eq!(Value::Float(3.0).key(), Value::Int(3).key());
        assert_ne!(Value::Float(3.5).key(), Value::Int(3).key());
        assert_eq!(Value::Missing.key(), None);
    }

    #[test]
    fn integer_text_matches_int_key() {
        assert_eq!(Value::from("100").key(), Value::Int(100).key());
        assert_eq!(Value::from(" 7 ").key(), Value::Int(7).key());
        assert_eq!(
            Value::from("A101").key(),
            Some(ValueKey::Text("A101".to_string()))
        );
    }

    #[test]
    fn parse_finite_rejects_nan() {
        assert!(parse_finite("NaN").is_none());
        assert!(parse_finite("inf").is_none());
        assert!((parse_finite(" 37.5 ").unwrap() - 37.5).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_renders_empty() {
        assert_eq!(Value::Missing.to_string(), "");
        assert_eq!(Value::Int(-4).to_string(), "-4");
    }
}
