use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::process::table::TableKind;

pub const DEFAULT_BASE_URL: &str =
    "https://raw.githubusercontent.com/georgetown-cset/eto-chip-explorer/main/data/";

/// Environment variable naming an optional YAML config file.
pub const CONFIG_ENV: &str = "SEMICHAIN_CONFIG";

/// Knobs for one fetch + clean run. Every field has a default, so an empty
/// YAML document is a valid config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Remote directory holding the five CSVs.
    pub base_url: String,
    /// Local directory the CSVs are written to and read back from.
    pub raw_dir: PathBuf,
    /// A column whose null fraction exceeds this is dropped.
    pub null_threshold: f64,
    /// A `provided_id` whose shares sum above this is an outlier.
    pub outlier_threshold: f64,
    pub preview_rows: usize,
    /// Known-redundant columns to drop, per table.
    pub redundant_columns: BTreeMap<TableKind, Vec<String>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            raw_dir: PathBuf::from("raw_data"),
            null_threshold: 0.9,
            outlier_threshold: 110.0,
            preview_rows: 10,
            redundant_columns: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: PipelineConfig = serde_yaml::from_str(text).context("parsing config YAML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read `path` if given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                let cfg = Self::from_yaml(&text)
                    .with_context(|| format!("loading config {}", p.display()))?;
                info!(path = %p.display(), "loaded config");
                Ok(cfg)
            }
            None => Ok(Self::default()),
        }
    }

    /// Config named by `SEMICHAIN_CONFIG`, or defaults when it is unset.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::load(path.as_deref())
    }

    pub fn redundant_for(&self, kind: TableKind) -> &[String] {
        self.redundant_columns
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.null_threshold) {
            bail!("null_threshold must be within [0, 1], got {}", self.null_threshold);
        }
        if self.preview_rows == 0 {
            bail!("preview_rows must be positive");
        }
        Ok(())
    }
}
