use anyhow::Result;
use arrow::array::{Array, ArrayRef, Float64Array, Int32Array};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::process::table::Table;

pub const SHARE_COLUMN: &str = "share_provided";
pub const MARKET_INFO_COLUMN: &str = "market_share_chart_global_market_size_info";
pub const MARKET_SIZE_COLUMN: &str = "market_size";
pub const YEAR_COLUMN: &str = "year";

static MAGNITUDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([\d.]+)\s*(billion|million)").expect("magnitude regex"));
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\((\d{4})\)").expect("year regex"));

/// `"61%"` → `61.0`. At most one trailing `%` is stripped; a bare number is
/// accepted as-is; anything else is `None`.
pub fn parse_percentage(raw: &str) -> Option<f64> {
    let s = raw.trim();
    let s = s.strip_suffix('%').unwrap_or(s).trim_end();
    s.parse::<f64>().ok()
}

/// Multiplier that brings a magnitude into millions.
///
/// Anything other than `billion` (including no unit at all) is taken to
/// already be in millions.
pub fn unit_multiplier(unit: Option<&str>) -> f64 {
    match unit {
        Some("billion") => 1000.0,
        _ => 1.0,
    }
}

/// `"$12.5 billion (2022)"` → `(Some(12500.0), Some(2022))`.
pub fn parse_market_size(raw: &str) -> (Option<f64>, Option<i32>) {
    let size = MAGNITUDE_RE.captures(raw).and_then(|caps| {
        let magnitude: f64 = caps.get(1)?.as_str().parse().ok()?;
        Some(magnitude * unit_multiplier(caps.get(2).map(|m| m.as_str())))
    });
    let year = YEAR_RE
        .captures(raw)
        .and_then(|caps| caps.get(1)?.as_str().parse::<i32>().ok());
    (size, year)
}

/// Rewrite `share_provided` as a float column.
pub fn normalize_share(table: &Table) -> Result<Table> {
    let raw = table.strings(SHARE_COLUMN)?;
    let parsed: Float64Array = raw
        .iter()
        .map(|v| v.as_deref().and_then(parse_percentage))
        .collect();

    let failed = raw.iter().flatten().count() - (parsed.len() - parsed.null_count());
    if failed > 0 {
        debug!(table = %table.kind(), failed, "share values that did not parse became null");
    }
    table.with_column(SHARE_COLUMN, Arc::new(parsed) as ArrayRef)
}

/// Derive `market_size` (in millions) and `year` from the market description.
pub fn add_market_size(table: &Table) -> Result<Table> {
    let raw = if table.has_column(MARKET_INFO_COLUMN) {
        table.strings(MARKET_INFO_COLUMN)?
    } else {
        warn!(
            table = %table.kind(),
            column = MARKET_INFO_COLUMN,
            "market description missing; market_size and year will be null"
        );
        vec![None; table.num_rows()]
    };

    let (sizes, years): (Vec<Option<f64>>, Vec<Option<i32>>) = raw
        .iter()
        .map(|v| match v {
            Some(s) => parse_market_size(s),
            None => (None, None),
        })
        .unzip();

    table
        .with_column(MARKET_SIZE_COLUMN, Arc::new(Float64Array::from(sizes)))?
        .with_column(YEAR_COLUMN, Arc::new(Int32Array::from(years)))
}
