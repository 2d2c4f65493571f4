use anyhow::Result;
use arrow::array::{ArrayRef, StringArray, UInt32Array};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::info;

use crate::process::backfill::{COUNTRY_TYPE, PROVIDER_TYPE_COLUMN};
use crate::process::convert::SHARE_COLUMN;
use crate::process::table::Table;
use crate::process::utils::float_values;
use crate::validate::{PROVIDED_ID_COLUMN, PROVIDER_ID_COLUMN};

pub const PROVIDED_NAME_COLUMN: &str = "provided_name";

/// `provider_id` → every `provider_type` recorded for it, in row order.
fn provider_types(providers: &Table) -> Result<HashMap<String, Vec<Option<String>>>> {
    let ids = providers.strings(PROVIDER_ID_COLUMN)?;
    let types = providers.strings(PROVIDER_TYPE_COLUMN)?;
    let mut index: HashMap<String, Vec<Option<String>>> = HashMap::new();
    for (id, ty) in ids.into_iter().zip(types) {
        if let Some(id) = id {
            index.entry(id).or_default().push(ty);
        }
    }
    Ok(index)
}

/// Left join `provision` with `providers.provider_type` on `provider_id`.
///
/// Returns the joined table (`provider_type` appended) with the usual join
/// multiplicity: a provider listed twice yields two rows, and a provision row
/// with no match keeps a null type.
pub fn with_provider_type(provision: &Table, providers: &Table) -> Result<Table> {
    let index = provider_types(providers)?;
    let ids = provision.strings(PROVIDER_ID_COLUMN)?;

    let mut rows: Vec<u32> = Vec::with_capacity(ids.len());
    let mut types: Vec<Option<String>> = Vec::with_capacity(ids.len());
    for (row, id) in ids.iter().enumerate() {
        match id.as_ref().and_then(|id| index.get(id)) {
            Some(matches) => {
                for ty in matches {
                    rows.push(row as u32);
                    types.push(ty.clone());
                }
            }
            None => {
                rows.push(row as u32);
                types.push(None);
            }
        }
    }

    let joined = provision.take(&UInt32Array::from(rows))?;
    joined.with_column(
        PROVIDER_TYPE_COLUMN,
        Arc::new(StringArray::from(types)) as ArrayRef,
    )
}

/// Keep only provision rows whose provider is a country.
///
/// Rows for companies, regions or unknown providers are removed, so an item
/// supplied only by them disappears from later grouping entirely.
pub fn filter_country_rows(provision: &Table, providers: &Table) -> Result<Table> {
    let joined = with_provider_type(provision, providers)?;
    let mask = joined
        .strings(PROVIDER_TYPE_COLUMN)?
        .iter()
        .map(|ty| Some(ty.as_deref() == Some(COUNTRY_TYPE)))
        .collect();
    let filtered = joined.filter(&mask)?.drop_columns(&[PROVIDER_TYPE_COLUMN])?;

    info!(
        before = provision.num_rows(),
        after = filtered.num_rows(),
        "kept country-level provision rows"
    );
    Ok(filtered)
}

/// Keep only provision rows whose `provided_id` is in `ids`.
pub fn rows_for_ids(provision: &Table, ids: &[String]) -> Result<Table> {
    let mask = provision
        .strings(PROVIDED_ID_COLUMN)?
        .iter()
        .map(|id| Some(id.as_ref().is_some_and(|id| ids.contains(id))))
        .collect();
    provision.filter(&mask)
}

/// One line of the outlier breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownRow {
    pub provided_id: Option<String>,
    pub provider_id: Option<String>,
    pub provided_name: Option<String>,
    pub provider_type: Option<String>,
    pub share_provided: Option<f64>,
    pub row_count: usize,
}

/// Group the outlier ids' provision rows by
/// `(provided_id, provider_id, provided_name, provider_type, share_provided)`
/// and count rows per group, ordered by `provided_id`, then `provider_id`.
pub fn outlier_breakdown(
    provision: &Table,
    providers: &Table,
    outlier_ids: &[String],
) -> Result<Vec<BreakdownRow>> {
    let subset = rows_for_ids(provision, outlier_ids)?;
    let joined = with_provider_type(&subset, providers)?;

    let provided = joined.strings(PROVIDED_ID_COLUMN)?;
    let provider = joined.strings(PROVIDER_ID_COLUMN)?;
    let names = if joined.has_column(PROVIDED_NAME_COLUMN) {
        joined.strings(PROVIDED_NAME_COLUMN)?
    } else {
        vec![None; joined.num_rows()]
    };
    let types = joined.strings(PROVIDER_TYPE_COLUMN)?;
    let shares = float_values(joined.require(SHARE_COLUMN)?.as_ref())?;

    type Key = (
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
    );
    let mut groups: BTreeMap<Key, (Option<f64>, usize)> = BTreeMap::new();
    for i in 0..joined.num_rows() {
        let key = (
            provided[i].clone(),
            provider[i].clone(),
            names[i].clone(),
            types[i].clone(),
            shares[i].map(|s| s.to_string()),
        );
        groups.entry(key).or_insert((shares[i], 0)).1 += 1;
    }

    Ok(groups
        .into_iter()
        .map(
            |((provided_id, provider_id, provided_name, provider_type, _), (share, n))| {
                BreakdownRow {
                    provided_id,
                    provider_id,
                    provided_name,
                    provider_type,
                    share_provided: share,
                    row_count: n,
                }
            },
        )
        .collect())
}

/// Total breakdown rows per `provided_id`.
pub fn rows_per_id(breakdown: &[BreakdownRow]) -> BTreeMap<Option<String>, usize> {
    let mut totals = BTreeMap::new();
    for row in breakdown {
        *totals.entry(row.provided_id.clone()).or_insert(0) += row.row_count;
    }
    totals
}
