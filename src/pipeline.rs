use anyhow::Result;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::info;

use crate::process::{
    backfill::backfill_country,
    convert::{add_market_size, normalize_share},
    load_all,
    prune::{prune_columns, PruneReport},
    table::{Table, TableKind},
    trimming::{clean_description, collapse_description_newlines},
};
use crate::report;
use crate::session::Session;
use crate::validate::{
    join::{filter_country_rows, outlier_breakdown, rows_for_ids, rows_per_id},
    validate_share_sums, ShareValidation, ValidationSummary,
};

/// The observable result of a transform run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// Rows per table after every cleaning step, provision filtered.
    pub row_counts: BTreeMap<TableKind, usize>,
    pub pruned: Vec<PruneReport>,
    pub pre_filter: ValidationSummary,
    pub post_filter: ValidationSummary,
}

/// The five cleaned tables.
#[derive(Debug, Clone)]
pub struct CleanTables {
    pub inputs: Table,
    pub providers: Table,
    pub provision: Table,
    pub sequence: Table,
    pub stages: Table,
}

impl CleanTables {
    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        [
            &self.inputs,
            &self.providers,
            &self.provision,
            &self.sequence,
            &self.stages,
        ]
        .into_iter()
    }
}

/// Load, prune and clean every table. Provision is not yet filtered.
pub fn clean_tables(session: &Session) -> Result<(CleanTables, Vec<PruneReport>)> {
    let cfg = session.config();
    let mut pruned = Vec::with_capacity(TableKind::ALL.len());
    let mut tables = BTreeMap::new();

    for table in load_all(&cfg.raw_dir)? {
        let kind = table.kind();
        let (table, report) =
            prune_columns(&table, cfg.null_threshold, cfg.redundant_for(kind))?;
        pruned.push(report);
        tables.insert(kind, table);
    }
    let mut take = |kind: TableKind| {
        tables
            .remove(&kind)
            .ok_or_else(|| anyhow::anyhow!("table `{}` was not loaded", kind))
    };

    let provision = normalize_share(&take(TableKind::Provision)?)?;

    let inputs = add_market_size(&take(TableKind::Inputs)?)?;
    let stages = add_market_size(&take(TableKind::Stages)?)?;

    let stages = collapse_description_newlines(&stages)?;
    let inputs = clean_description(&inputs)?;
    let stages = clean_description(&stages)?;

    let providers = backfill_country(&take(TableKind::Providers)?)?;
    let sequence = take(TableKind::Sequence)?;

    Ok((
        CleanTables {
            inputs,
            providers,
            provision,
            sequence,
            stages,
        },
        pruned,
    ))
}

fn write_summary<W: Write>(out: &mut W, label: &str, v: &ShareValidation) -> Result<()> {
    writeln!(out, "Validation Summary ({}):", label)?;
    writeln!(out, "{}", v)?;
    writeln!(
        out,
        "\nOutlier rows with total_share > {} ({}):",
        v.outlier_threshold, label
    )?;
    report::write_share_sums(out, v.outliers())?;
    Ok(())
}

/// Pre-filter pass with the outlier diagnostics.
fn examine_pre_filter<W: Write>(
    out: &mut W,
    tables: &CleanTables,
    threshold: f64,
) -> Result<ShareValidation> {
    writeln!(out, "\nPre-filter examination of provision:")?;
    let v = validate_share_sums(&tables.provision, threshold)?;
    write_summary(out, "pre-filter", &v)?;

    writeln!(out, "\nRows with total_share = NULL (pre-filter):")?;
    report::write_share_sums(out, v.null_sums())?;
    writeln!(out, "\nValidating provision sums by provided_id (pre-filter):")?;
    report::write_share_sums(out, &v.sums)?;

    let outlier_ids = v.outlier_ids();
    writeln!(out, "Outlier provided_ids (pre-filter): {:?}", outlier_ids)?;
    writeln!(
        out,
        "\nRaw data for outlier provided_ids {:?} (pre-filter):",
        outlier_ids
    )?;
    report::write_rows(out, &rows_for_ids(&tables.provision, &outlier_ids)?)?;

    let breakdown = outlier_breakdown(&tables.provision, &tables.providers, &outlier_ids)?;
    report::write_breakdown(out, &breakdown)?;
    writeln!(out, "\nRow counts per outlier provided_id (pre-filter):")?;
    report::write_row_totals(out, &rows_per_id(&breakdown))?;

    Ok(v)
}

fn examine_post_filter<W: Write>(
    out: &mut W,
    provision: &Table,
    threshold: f64,
) -> Result<ShareValidation> {
    writeln!(out, "\nPost-filter examination of provision:")?;
    let v = validate_share_sums(provision, threshold)?;
    write_summary(out, "post-filter", &v)?;

    writeln!(out, "\nValidating provision sums by provided_id (post-filter):")?;
    report::write_share_sums(out, &v.sums)?;
    writeln!(
        out,
        "Post filter, > {} outliers count is {}",
        threshold,
        v.outliers().count()
    )?;
    Ok(v)
}

/// Clean and validate the tables already on disk, writing diagnostics to `out`.
pub fn run_transform<W: Write>(session: &Session, out: &mut W) -> Result<PipelineReport> {
    let cfg = session.config();
    let (mut tables, pruned) = clean_tables(session)?;

    let pre = examine_pre_filter(out, &tables, cfg.outlier_threshold)?;

    tables.provision = filter_country_rows(&tables.provision, &tables.providers)?;

    let post = examine_post_filter(out, &tables.provision, cfg.outlier_threshold)?;

    for table in tables.iter() {
        report::write_preview(out, table, cfg.preview_rows)?;
    }

    let summary = PipelineReport {
        row_counts: tables.iter().map(|t| (t.kind(), t.num_rows())).collect(),
        pruned,
        pre_filter: pre.summary(),
        post_filter: post.summary(),
    };
    info!(
        pre_outliers = summary.pre_filter.outliers,
        post_outliers = summary.post_filter.outliers,
        "transform finished"
    );
    Ok(summary)
}
