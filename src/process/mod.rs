// src/process/mod.rs
use anyhow::{Context, Result};
use arrow::{
    compute::concat_batches,
    csv::{reader::Format, ReaderBuilder},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use std::{
    fs::File,
    io::Seek,
    path::Path,
    sync::Arc,
};
use tracing::info;

pub mod backfill;
pub mod convert;
pub mod prune;
pub mod table;
pub mod trimming;
pub mod utils;

use table::{LoadMode, Table, TableKind};

/// Read `<raw_dir>/<kind.file_name()>` into a single-batch [`Table`].
///
/// The reader is quote-aware, so quoted fields may hold commas and newlines;
/// a doubled `""` inside a quoted field is a literal quote. Empty cells are null.
#[tracing::instrument(level = "info", skip(raw_dir), fields(table = %kind))]
pub fn load_table(raw_dir: &Path, kind: TableKind) -> Result<Table> {
    let path = raw_dir.join(kind.file_name());
    read_csv(&path, kind)
        .with_context(|| format!("loading table `{}` from {}", kind, path.display()))
}

fn read_csv(path: &Path, kind: TableKind) -> Result<Table> {
    let mut file = File::open(path).context("opening CSV")?;

    let format = Format::default().with_header(true).with_quote(b'"');
    let (inferred, _) = format
        .infer_schema(&mut file, None)
        .context("inferring CSV schema")?;
    file.rewind()?;

    let schema = match kind.load_mode() {
        LoadMode::Inferred => inferred,
        LoadMode::Text => Schema::new(
            inferred
                .fields()
                .iter()
                .map(|f| Field::new(f.name(), DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ),
    };
    let schema = Arc::new(schema);

    let reader = ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(file)
        .context("building CSV reader")?;
    let batches = reader
        .collect::<std::result::Result<Vec<RecordBatch>, _>>()
        .context("parsing CSV records")?;
    let batch = concat_batches(&schema, &batches)?;

    info!(
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "loaded"
    );
    Ok(Table::new(kind, batch))
}

/// Load all five tables in manifest order.
pub fn load_all(raw_dir: &Path) -> Result<Vec<Table>> {
    TableKind::ALL
        .iter()
        .map(|kind| load_table(raw_dir, *kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::DataType;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn text_mode_keeps_quoted_newlines_and_commas() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("stages.csv"),
            "stage_id,description,market_share_chart_global_market_size_info\n\
             S1,\"Wafer fabrication.\n\nIncludes \"\"front-end,\"\" steps\",$12.5 billion (2022)\n\
             S2,,$750 million (2020)\n",
        )?;

        let t = load_table(dir.path(), TableKind::Stages)?;
        assert_eq!(t.num_rows(), 2);
        for field in t.batch().schema().fields() {
            assert_eq!(field.data_type(), &DataType::Utf8);
        }
        let desc = t.strings("description")?;
        assert_eq!(
            desc[0].as_deref(),
            Some("Wafer fabrication.\n\nIncludes \"front-end,\" steps")
        );
        assert_eq!(desc[1], None);
        Ok(())
    }

    #[test]
    fn inferred_mode_types_numbers() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("provision.csv"),
            "provider_id,provided_id,share_provided,year\nP1,N1,61%,2021\nP2,N1,39%,2021\n",
        )?;

        let t = load_table(dir.path(), TableKind::Provision)?;
        let schema = t.batch().schema();
        assert_eq!(
            schema.field_with_name("year")?.data_type(),
            &DataType::Int64
        );
        assert_eq!(
            schema.field_with_name("share_provided")?.data_type(),
            &DataType::Utf8
        );
        Ok(())
    }

    #[test]
    fn missing_file_names_the_table() {
        let dir = tempdir().unwrap();
        let err = load_table(dir.path(), TableKind::Sequence).unwrap_err();
        assert!(err.to_string().starts_with("loading table `sequence` from"));
    }
}
