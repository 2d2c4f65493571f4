use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{info, warn};

use crate::process::table::{Table, TableKind};
use crate::process::utils::{distinct_non_null, non_null_count, string_values};

/// Which columns a prune pass removed, and under which rule.
///
/// A column can appear under more than one rule; `dropped` is the union.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub table: TableKind,
    pub all_null: Vec<String>,
    pub mostly_null: Vec<String>,
    pub constant: Vec<String>,
    pub specified: Vec<String>,
    pub dropped: BTreeSet<String>,
}

impl fmt::Display for PruneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: Dropping columns - All NULL: {:?}, Mostly NULL: {:?}, Constant: {:?}, Specified: {:?}",
            self.table, self.all_null, self.mostly_null, self.constant, self.specified
        )
    }
}

/// Remove columns that carry no signal.
///
/// A column goes when it is entirely null, when its non-null fraction is below
/// `1 - null_threshold`, when it holds a single distinct non-null value, or when
/// it is listed in `redundant`. Lists in the report follow column order.
pub fn prune_columns(
    table: &Table,
    null_threshold: f64,
    redundant: &[String],
) -> Result<(Table, PruneReport)> {
    let total_rows = table.num_rows();
    let min_completeness = 1.0 - null_threshold;
    let batch = table.batch();
    let schema = batch.schema();

    let mut all_null = Vec::new();
    let mut mostly_null = Vec::new();
    let mut constant = Vec::new();

    for (field, array) in schema.fields().iter().zip(batch.columns()) {
        let name = field.name();
        let non_null = non_null_count(array.as_ref());

        if non_null == 0 {
            all_null.push(name.clone());
        } else if (non_null as f64 / total_rows as f64) < min_completeness {
            mostly_null.push(name.clone());
        }

        if non_null > 0 && distinct_non_null(&string_values(array.as_ref())?) == 1 {
            constant.push(name.clone());
        }
    }

    let mut specified = Vec::with_capacity(redundant.len());
    for name in redundant {
        if table.has_column(name) {
            specified.push(name.clone());
        } else {
            warn!(table = %table.kind(), column = %name, "redundant column not present; ignoring");
        }
    }

    let dropped: BTreeSet<String> = all_null
        .iter()
        .chain(&mostly_null)
        .chain(&constant)
        .chain(&specified)
        .cloned()
        .collect();

    let report = PruneReport {
        table: table.kind(),
        all_null,
        mostly_null,
        constant,
        specified,
        dropped,
    };
    info!("{}", report);

    let pruned = if report.dropped.is_empty() {
        table.clone()
    } else {
        let names: Vec<&String> = report.dropped.iter().collect();
        table.drop_columns(&names)?
    };
    Ok((pruned, report))
}
