//! Recoverable data-integrity findings collected while cleaning.

use serde::Serialize;

/// Why a column was removed from a cleaned table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DropReason {
    /// Every row holds the same value (all-missing included).
    Constant,
    /// Missing fraction exceeded the table's threshold.
    Sparse {
        /// Observed missing fraction.
        fraction: f64,
        /// Threshold it exceeded.
        threshold: f64,
    },
    /// Raw coordinate source superseded by the resolved `latitude` /
    /// `longitude` columns.
    RawCoordinate,
    /// Duplicates a column kept on another table.
    Redundant,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Constant => f.write_str("constant across all rows"),
            Self::Sparse {
                fraction,
                threshold,
            } => write!(
                f,
                "{:.1}% missing (threshold {:.0}%)",
                fraction * 100.0,
                threshold * 100.0
            ),
            Self::RawCoordinate => f.write_str("raw coordinate source"),
            Self::Redundant => f.write_str("redundant with another table"),
        }
    }
}

/// A recoverable anomaly. Cleaning substitutes a missing value (or drops
/// the column) and continues.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DataIntegrityWarning {
    /// Date and time were both present but did not form a valid timestamp.
    UnparseableDateTime {
        /// Case the row belongs to.
        case_id: String,
        /// Raw date value.
        date: String,
        /// Zero-padded HHMM time value.
        time: String,
    },
    /// A time code outside `0..=2359`.
    TimeOutOfRange {
        /// Case the row belongs to.
        case_id: String,
        /// Raw time code.
        time: i64,
    },
    /// A resolved coordinate outside the valid geographic range.
    CoordinateOutOfRange {
        /// Case the row belongs to.
        case_id: String,
        /// `latitude` or `longitude`.
        axis: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A repeated case id collapsed onto its first occurrence.
    DuplicateCaseId {
        /// The repeated case id.
        case_id: String,
    },
    /// A column removed by an elimination rule.
    DroppedColumn {
        /// Table the column was removed from.
        table: &'static str,
        /// Column name.
        column: String,
        /// Rule that removed it.
        reason: DropReason,
    },
    /// Rows removed because their location could not be resolved.
    RowsMissingLocation {
        /// Number of rows removed.
        count: usize,
    },
    /// A join key matched more than one row on the right-hand side; the
    /// first match was used.
    AmbiguousJoinKey {
        /// Right-hand table name.
        table: &'static str,
        /// Rendered key.
        key: String,
    },
}

impl std::fmt::Display for DataIntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnparseableDateTime {
                case_id,
                date,
                time,
            } => write!(f, "case {case_id}: unparseable date/time '{date} {time}'"),
            Self::TimeOutOfRange { case_id, time } => {
                write!(f, "case {case_id}: time code {time} outside 0-2359")
            }
            Self::CoordinateOutOfRange {
                case_id,
                axis,
                value,
            } => write!(f, "case {case_id}: {axis} {value} out of range"),
            Self::DuplicateCaseId { case_id } => {
                write!(f, "duplicate case id {case_id} collapsed")
            }
            Self::DroppedColumn {
                table,
                column,
                reason,
            } => write!(f, "{table}: dropped column {column} ({reason})"),
            Self::RowsMissingLocation { count } => {
                write!(f, "dropped {count} rows with unresolved location")
            }
            Self::AmbiguousJoinKey { table, key } => {
                write!(f, "{table}: key {key} matched several rows, using first")
            }
        }
    }
}

/// Warnings accumulated by one cleaning stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningReport {
    /// Findings in the order they were encountered.
    pub warnings: Vec<DataIntegrityWarning>,
}

impl CleaningReport {
    /// Records and logs a warning.
    pub fn push(&mut self, warning: DataIntegrityWarning) {
        match &warning {
            DataIntegrityWarning::DroppedColumn {
                reason: DropReason::Constant | DropReason::RawCoordinate | DropReason::Redundant,
                ..
            } => log::debug!("{warning}"),
            _ => log::warn!("{warning}"),
        }
        self.warnings.push(warning);
    }

    /// Appends another report's warnings.
    pub fn merge(&mut self, other: Self) {
        self.warnings.extend(other.warnings);
    }

    /// Names of columns dropped from `table`, in drop order.
    #[must_use]
    pub fn dropped_columns(&self, table: &str) -> Vec<&str> {
        self.warnings
            .iter()
            .filter_map(|w| match w {
                DataIntegrityWarning::DroppedColumn {
                    table: t, column, ..
                } if *t == table => Some(column.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of warnings recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Whether no warnings were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }
}
