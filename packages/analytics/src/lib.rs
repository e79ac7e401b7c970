#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Group aggregation over clustered crash records.
//!
//! Counts how often each value of a categorical column occurs among the
//! rows that belong to some cluster, and ranks the groups by count. Ties
//! keep the order in which the groups were first encountered.

use std::collections::HashMap;

use collision_map_collision_models::ClusterLabel;
use collision_map_table::{Table, TableError};
use serde::Serialize;
use thiserror::Error;

/// Default number of groups returned by [`top_groups`].
pub const DEFAULT_TOP_K: usize = 10;

/// Errors that can occur during aggregation.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The grouping column is absent.
    #[error(transparent)]
    Table(#[from] TableError),

    /// One label is required per table row.
    #[error("Expected {rows} cluster labels, got {labels}")]
    LabelMismatch {
        /// Rows in the table.
        rows: usize,
        /// Labels supplied.
        labels: usize,
    },
}

/// Occurrences of one group value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    /// Group value as text.
    pub group: String,
    /// Rows holding the value.
    pub count: u64,
}

/// Ranked groups of a column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopGroupsResult {
    /// Column the rows were grouped by.
    pub group_by: String,
    /// Up to `k` groups, most frequent first.
    pub groups: Vec<GroupCount>,
    /// Clustered rows with a non-missing group value.
    pub total: u64,
}

/// Counts each distinct group, in order of first appearance.
pub fn count_groups<I, S>(groups: I) -> Vec<GroupCount>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: Vec<GroupCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for group in groups {
        let group = group.as_ref();
        if let Some(&i) = index.get(group) {
            counts[i].count += 1;
        } else {
            index.insert(group.to_string(), counts.len());
            counts.push(GroupCount {
                group: group.to_string(),
                count: 1,
            });
        }
    }

    counts
}

/// The `k` most frequent groups, descending by count.
///
/// The sort is stable, so equal counts keep first-encounter order. `k == 0`
/// yields an empty result.
pub fn top_k<I, S>(groups: I, k: usize) -> Vec<GroupCount>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    if k == 0 {
        return Vec::new();
    }
    let mut counts = count_groups(groups);
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(k);
    counts
}

/// Ranks the values of `group_by` among rows whose label is a cluster.
///
/// Noise rows and rows with a missing group value are not counted.
///
/// # Errors
///
/// * If `group_by` is not a column of `table`
/// * If `labels` does not have one entry per row
pub fn top_groups(
    table: &Table,
    labels: &[ClusterLabel],
    group_by: &str,
    k: usize,
) -> Result<TopGroupsResult, AnalyticsError> {
    if labels.len() != table.row_count() {
        return Err(AnalyticsError::LabelMismatch {
            rows: table.row_count(),
            labels: labels.len(),
        });
    }
    let values = table.require_column(group_by)?;

    let clustered: Vec<String> = values
        .iter()
        .zip(labels)
        .filter(|(value, label)| !label.is_noise() && !value.is_missing())
        .map(|(value, _)| value.to_string())
        .collect();

    let total = clustered.len() as u64;
    let groups = top_k(&clustered, k);

    log::debug!(
        "Top {} of {} groups by {group_by} across {total} clustered rows",
        groups.len(),
        count_groups(&clustered).len()
    );

    Ok(TopGroupsResult {
        group_by: group_by.to_string(),
        groups,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use collision_map_table::Value;

    fn count(group: &str, count: u64) -> GroupCount {
        GroupCount {
            group: group.to_string(),
            count,
        }
    }

    #[test]
    fn ties_keep_first_encounter_order() {
        let groups = ["C", "A", "B", "A", "B", "C", "A", "B", "A", "B", "C", "A", "B"];
        assert_eq!(top_k(groups, 2), vec![count("A", 5), count("B", 5)]);
    }

    #[test]
    fn breaks_ties_by_first_encounter_not_name() {
        let groups = ["B", "A", "A", "B", "C"];
        assert_eq!(top_k(groups, 3), vec![count("B", 2), count("A", 2), count("C", 1)]);
    }

    #[test]
    fn zero_k_is_empty() {
        assert!(top_k(["A", "B"], 0).is_empty());
    }

    #[test]
    fn k_larger_than_groups_returns_all() {
        assert_eq!(top_k(["A", "A", "B"], 10).len(), 2);
    }

    #[test]
    fn top_groups_skips_noise_and_missing() {
        let table = Table::new(vec![(
            "PRIMARY_RD",
            vec![
                Value::from("MARKET ST"),
                Value::from("MISSION ST"),
                Value::Missing,
                Value::from("MARKET ST"),
                Value::from("MISSION ST"),
                Value::from("MISSION ST"),
            ],
        )])
        .unwrap();
        let labels = [
            ClusterLabel::Cluster(0),
            ClusterLabel::Cluster(0),
            ClusterLabel::Cluster(1),
            ClusterLabel::Cluster(1),
            ClusterLabel::Noise,
            ClusterLabel::Noise,
        ];

        let result = top_groups(&table, &labels, "PRIMARY_RD", DEFAULT_TOP_K).unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.groups, vec![count("MARKET ST", 2), count("MISSION ST", 1)]);
    }

    #[test]
    fn top_groups_rejects_bad_input() {
        let table = Table::new(vec![("PRIMARY_RD", vec![Value::from("A")])]).unwrap();
        assert!(matches!(
            top_groups(&table, &[], "PRIMARY_RD", 1),
            Err(AnalyticsError::LabelMismatch { rows: 1, labels: 0 })
        ));
        assert!(matches!(
            top_groups(&table, &[ClusterLabel::Noise], "NOPE", 1),
            Err(AnalyticsError::Table(_))
        ));
    }
}
