use anyhow::Result;
use arrow::array::{ArrayRef, StringArray};
use std::sync::Arc;
use tracing::{debug, info};

use crate::process::table::Table;

pub const PROVIDER_TYPE_COLUMN: &str = "provider_type";
pub const PROVIDER_NAME_COLUMN: &str = "provider_name";
pub const COUNTRY_COLUMN: &str = "country";
pub const COUNTRY_TYPE: &str = "country";

/// Country-type providers are their own country: fill a null `country` with
/// `provider_name`. Every other row keeps its value, null included.
pub fn backfill_country(providers: &Table) -> Result<Table> {
    let types = providers.strings(PROVIDER_TYPE_COLUMN)?;
    let names = providers.strings(PROVIDER_NAME_COLUMN)?;
    let countries = if providers.has_column(COUNTRY_COLUMN) {
        providers.strings(COUNTRY_COLUMN)?
    } else {
        debug!("`country` column absent; recreating it");
        vec![None; providers.num_rows()]
    };

    let mut filled = 0usize;
    let backfilled: StringArray = types
        .iter()
        .zip(names)
        .zip(countries)
        .map(|((ty, name), country)| match (ty.as_deref(), country) {
            (Some(COUNTRY_TYPE), None) => {
                if name.is_some() {
                    filled += 1;
                }
                name
            }
            (_, country) => country,
        })
        .collect();

    info!(filled, "backfilled country for country-type providers");
    providers.with_column(COUNTRY_COLUMN, Arc::new(backfilled) as ArrayRef)
}
