// src/validate/mod.rs
use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;

use crate::process::convert::SHARE_COLUMN;
use crate::process::table::Table;
use crate::process::utils::float_values;

pub mod join;

pub const PROVIDED_ID_COLUMN: &str = "provided_id";
pub const PROVIDER_ID_COLUMN: &str = "provider_id";

/// Summed `share_provided` for one `provided_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShareSum {
    pub provided_id: Option<String>,
    /// `None` only when every contributing share was null.
    pub total_share: Option<f64>,
}

/// Per-id share sums plus the threshold they were judged against.
#[derive(Debug, Clone)]
pub struct ShareValidation {
    pub sums: Vec<ShareSum>,
    pub outlier_threshold: f64,
}

/// Headline numbers of one validation pass, comparable across runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSummary {
    pub total_ids: usize,
    pub outliers: usize,
    pub null_sums: usize,
}

/// Group `provision` by `provided_id` and sum the shares, skipping nulls.
///
/// Groups come out ordered by `provided_id` (a null id forms its own group and
/// sorts first).
pub fn validate_share_sums(provision: &Table, outlier_threshold: f64) -> Result<ShareValidation> {
    let ids = provision.strings(PROVIDED_ID_COLUMN)?;
    let shares = float_values(provision.require(SHARE_COLUMN)?.as_ref())?;

    let mut groups: BTreeMap<Option<String>, Option<f64>> = BTreeMap::new();
    for (id, share) in ids.into_iter().zip(shares) {
        let total = groups.entry(id).or_insert(None);
        if let Some(v) = share {
            *total = Some(total.unwrap_or(0.0) + v);
        }
    }

    Ok(ShareValidation {
        sums: groups
            .into_iter()
            .map(|(provided_id, total_share)| ShareSum {
                provided_id,
                total_share,
            })
            .collect(),
        outlier_threshold,
    })
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl ShareValidation {
    pub fn total_ids(&self) -> usize {
        self.sums.len()
    }

    pub fn is_outlier(&self, sum: &ShareSum) -> bool {
        sum.total_share.is_some_and(|t| t > self.outlier_threshold)
    }

    pub fn outliers(&self) -> impl Iterator<Item = &ShareSum> {
        self.sums.iter().filter(move |s| self.is_outlier(s))
    }

    pub fn null_sums(&self) -> impl Iterator<Item = &ShareSum> {
        self.sums.iter().filter(|s| s.total_share.is_none())
    }

    /// Non-null `provided_id`s of the outlier groups.
    pub fn outlier_ids(&self) -> Vec<String> {
        self.outliers()
            .filter_map(|s| s.provided_id.clone())
            .collect()
    }

    pub fn get(&self, provided_id: &str) -> Option<&ShareSum> {
        self.sums
            .iter()
            .find(|s| s.provided_id.as_deref() == Some(provided_id))
    }

    pub fn summary(&self) -> ValidationSummary {
        ValidationSummary {
            total_ids: self.total_ids(),
            outliers: self.outliers().count(),
            null_sums: self.null_sums().count(),
        }
    }
}

impl fmt::Display for ShareValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.summary();
        writeln!(f, "Total provided_ids: {}", s.total_ids)?;
        writeln!(
            f,
            "Outliers with total_share > {}: {} ({:.2}%)",
            self.outlier_threshold,
            s.outliers,
            percent(s.outliers, s.total_ids)
        )?;
        write!(
            f,
            "provided_ids with total_share = NULL: {} ({:.2}%)",
            s.null_sums,
            percent(s.null_sums, s.total_ids)
        )
    }
}
