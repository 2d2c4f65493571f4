use anyhow::{anyhow, Context, Result};
use arrow::{
    array::{Array, ArrayRef, BooleanArray, UInt32Array},
    compute::{filter_record_batch, take_record_batch},
    datatypes::{Field, Schema},
    record_batch::RecordBatch,
};
use serde::Deserialize;
use std::{fmt, sync::Arc};

use crate::process::utils::string_values;

/// The five tables of the supply-chain dataset, in manifest order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    Inputs,
    Providers,
    Provision,
    Sequence,
    Stages,
}

/// How a raw CSV is turned into columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Every column is read as text. Used for the files with long quoted,
    /// multi-line descriptions.
    Text,
    /// Column types are inferred from the whole file.
    Inferred,
}

impl TableKind {
    pub const ALL: [TableKind; 5] = [
        TableKind::Inputs,
        TableKind::Providers,
        TableKind::Provision,
        TableKind::Sequence,
        TableKind::Stages,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TableKind::Inputs => "inputs",
            TableKind::Providers => "providers",
            TableKind::Provision => "provision",
            TableKind::Sequence => "sequence",
            TableKind::Stages => "stages",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            TableKind::Inputs => "inputs.csv",
            TableKind::Providers => "providers.csv",
            TableKind::Provision => "provision.csv",
            TableKind::Sequence => "sequence.csv",
            TableKind::Stages => "stages.csv",
        }
    }

    pub fn load_mode(&self) -> LoadMode {
        match self {
            TableKind::Inputs | TableKind::Stages => LoadMode::Text,
            _ => LoadMode::Inferred,
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One loaded table: a single concatenated batch tagged with its kind.
#[derive(Debug, Clone)]
pub struct Table {
    kind: TableKind,
    batch: RecordBatch,
}

impl Table {
    pub fn new(kind: TableKind, batch: RecordBatch) -> Self {
        Self { kind, batch }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// Like [`Table::column`] but a missing column is an error naming the table.
    pub fn require(&self, name: &str) -> Result<&ArrayRef> {
        self.column(name)
            .ok_or_else(|| anyhow!("table `{}` has no column `{}`", self.kind, name))
    }

    /// Column rendered as optional strings, one per row.
    pub fn strings(&self, name: &str) -> Result<Vec<Option<String>>> {
        string_values(self.require(name)?.as_ref())
            .with_context(|| format!("reading `{}.{}` as text", self.kind, name))
    }

    /// Drop the named columns; names not present are ignored.
    pub fn drop_columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Table> {
        let schema = self.batch.schema();
        let keep: Vec<usize> = schema
            .fields()
            .iter()
            .enumerate()
            .filter(|(_, f)| !names.iter().any(|n| n.as_ref() == f.name()))
            .map(|(i, _)| i)
            .collect();
        let batch = self
            .batch
            .project(&keep)
            .with_context(|| format!("dropping columns from `{}`", self.kind))?;
        Ok(Table::new(self.kind, batch))
    }

    /// Replace the column `name` in place, or append it when absent.
    pub fn with_column(&self, name: &str, values: ArrayRef) -> Result<Table> {
        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut columns: Vec<ArrayRef> = self.batch.columns().to_vec();
        let field = Field::new(name, values.data_type().clone(), true);

        match schema.index_of(name) {
            Ok(idx) => {
                fields[idx] = field;
                columns[idx] = values;
            }
            Err(_) => {
                fields.push(field);
                columns.push(values);
            }
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
            .with_context(|| format!("setting column `{}` on `{}`", name, self.kind))?;
        Ok(Table::new(self.kind, batch))
    }

    /// Keep the rows where `mask` is true.
    pub fn filter(&self, mask: &BooleanArray) -> Result<Table> {
        let batch = filter_record_batch(&self.batch, mask)
            .with_context(|| format!("filtering `{}`", self.kind))?;
        Ok(Table::new(self.kind, batch))
    }

    /// Gather rows by index; an index may repeat.
    pub fn take(&self, indices: &UInt32Array) -> Result<Table> {
        let batch = take_record_batch(&self.batch, indices)
            .with_context(|| format!("gathering rows of `{}`", self.kind))?;
        Ok(Table::new(self.kind, batch))
    }

    /// The first `n` rows.
    pub fn head(&self, n: usize) -> RecordBatch {
        self.batch.slice(0, n.min(self.batch.num_rows()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, StringArray};

    fn sample() -> Table {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", arrow::datatypes::DataType::Utf8, true),
            Field::new("share", arrow::datatypes::DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![Some("a"), Some("b"), None])),
                Arc::new(Float64Array::from(vec![Some(1.0), None, Some(3.0)])),
            ],
        )
        .unwrap();
        Table::new(TableKind::Provision, batch)
    }

    #[test]
    fn drop_ignores_unknown_names() {
        let t = sample().drop_columns(&["share", "nope"]).unwrap();
        assert_eq!(t.column_names(), vec!["id"]);
        assert_eq!(t.num_rows(), 3);
    }

    #[test]
    fn with_column_replaces_or_appends() {
        let t = sample();
        let replaced = t
            .with_column("id", Arc::new(StringArray::from(vec!["x", "y", "z"])))
            .unwrap();
        assert_eq!(replaced.column_names(), vec!["id", "share"]);
        assert_eq!(replaced.strings("id").unwrap()[2].as_deref(), Some("z"));

        let appended = t
            .with_column("extra", Arc::new(StringArray::from(vec!["1", "2", "3"])))
            .unwrap();
        assert_eq!(appended.column_names(), vec!["id", "share", "extra"]);
    }

    #[test]
    fn missing_column_names_the_table() {
        let err = sample().require("provider_type").unwrap_err();
        assert_eq!(
            err.to_string(),
            "table `provision` has no column `provider_type`"
        );
    }

    #[test]
    fn take_repeats_rows() {
        let t = sample().take(&UInt32Array::from(vec![0, 0, 2])).unwrap();
        assert_eq!(
            t.strings("id").unwrap(),
            vec![Some("a".to_string()), Some("a".to_string()), None]
        );
    }
}
