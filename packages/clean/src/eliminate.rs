//! Column elimination rules.

use collision_map_table::Table;

use crate::report::{CleaningReport, DataIntegrityWarning, DropReason};

/// Which elimination rules a cleaner applies, and which columns are immune.
#[derive(Debug, Clone)]
pub struct Elimination<'a> {
    /// Table name used in warnings.
    pub table: &'static str,
    /// Drop columns with a single distinct value.
    pub constant: bool,
    /// Drop columns whose missing fraction is strictly above this.
    pub max_missing: Option<f64>,
    /// Columns the threshold rules never drop.
    pub exempt: &'a [&'a str],
    /// Columns dropped unconditionally.
    pub always: &'a [&'a str],
    /// Reason recorded for `always` drops.
    pub always_reason: DropReason,
}

impl Elimination<'_> {
    /// Evaluates every rule against `table` as it stands, then drops the
    /// union of the selected columns.
    #[must_use]
    pub fn apply(&self, table: Table, report: &mut CleaningReport) -> Table {
        let mut drops: Vec<(String, DropReason)> = Vec::new();

        for name in table.column_names() {
            if self.always.contains(&name) {
                drops.push((name.to_string(), self.always_reason.clone()));
                continue;
            }
            if self.exempt.contains(&name) {
                continue;
            }
            if self.constant && table.is_constant(name) {
                drops.push((name.to_string(), DropReason::Constant));
                continue;
            }
            if let Some(threshold) = self.max_missing {
                let fraction = table.missing_fraction(name);
                if fraction > threshold {
                    drops.push((
                        name.to_string(),
                        DropReason::Sparse {
                            fraction,
                            threshold,
                        },
                    ));
                }
            }
        }

        let names: Vec<&str> = drops.iter().map(|(n, _)| n.as_str()).collect();
        let table = table.drop_columns(&names);

        for (column, reason) in drops {
            report.push(DataIntegrityWarning::DroppedColumn {
                table: self.table,
                column,
                reason,
            });
        }

        table
    }
}
