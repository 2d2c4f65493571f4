//! Terminal diagnostics: table previews and validation listings.
//!
//! Everything is rendered through arrow's pretty printer, which never
//! truncates cell values.

use anyhow::Result;
use arrow::{
    array::{Array, ArrayRef, Float64Array, StringArray, UInt64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
    util::pretty::pretty_format_batches,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use crate::process::table::Table;
use crate::validate::join::BreakdownRow;
use crate::validate::ShareSum;

fn write_batch<W: Write>(out: &mut W, batch: RecordBatch) -> Result<()> {
    writeln!(out, "{}", pretty_format_batches(&[batch])?)?;
    Ok(())
}

fn batch_of(columns: Vec<(&str, ArrayRef)>) -> Result<RecordBatch> {
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, arr)| Field::new(*name, arr.data_type().clone(), true))
        .collect();
    let arrays = columns.into_iter().map(|(_, arr)| arr).collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Labelled preview of the first `rows` rows of `table`.
pub fn write_preview<W: Write>(out: &mut W, table: &Table, rows: usize) -> Result<()> {
    writeln!(out, "\n=== {} ===", table.kind())?;
    write_batch(out, table.head(rows))?;
    writeln!(out, "{}", "=".repeat(50))?;
    Ok(())
}

/// All rows of `table`, e.g. the raw provision rows behind an outlier.
pub fn write_rows<W: Write>(out: &mut W, table: &Table) -> Result<()> {
    write_batch(out, table.batch().clone())
}

/// `provided_id | total_share` listing.
pub fn write_share_sums<'a, W, I>(out: &mut W, sums: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'a ShareSum>,
{
    let (ids, totals): (Vec<Option<String>>, Vec<Option<f64>>) = sums
        .into_iter()
        .map(|s| (s.provided_id.clone(), s.total_share))
        .unzip();
    let batch = batch_of(vec![
        ("provided_id", Arc::new(StringArray::from(ids)) as ArrayRef),
        ("total_share", Arc::new(Float64Array::from(totals)) as ArrayRef),
    ])?;
    write_batch(out, batch)
}

pub fn write_breakdown<W: Write>(out: &mut W, rows: &[BreakdownRow]) -> Result<()> {
    let text = |f: fn(&BreakdownRow) -> &Option<String>| -> ArrayRef {
        Arc::new(StringArray::from(
            rows.iter().map(|r| f(r).clone()).collect::<Vec<_>>(),
        ))
    };
    let batch = batch_of(vec![
        ("provided_id", text(|r| &r.provided_id)),
        ("provider_id", text(|r| &r.provider_id)),
        ("provided_name", text(|r| &r.provided_name)),
        ("provider_type", text(|r| &r.provider_type)),
        (
            "share_provided",
            Arc::new(Float64Array::from(
                rows.iter().map(|r| r.share_provided).collect::<Vec<_>>(),
            )) as ArrayRef,
        ),
        (
            "row_count",
            Arc::new(UInt64Array::from(
                rows.iter().map(|r| r.row_count as u64).collect::<Vec<_>>(),
            )) as ArrayRef,
        ),
    ])?;
    write_batch(out, batch)
}

pub fn write_row_totals<W: Write>(
    out: &mut W,
    totals: &BTreeMap<Option<String>, usize>,
) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("provided_id", DataType::Utf8, true),
        Field::new("total_rows", DataType::UInt64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(totals.keys().cloned().collect::<Vec<_>>())),
            Arc::new(UInt64Array::from(
                totals.values().map(|n| *n as u64).collect::<Vec<_>>(),
            )),
        ],
    )?;
    write_batch(out, batch)
}
