use anyhow::Result;
use arrow::array::{ArrayRef, StringArray};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::warn;

use crate::process::table::Table;

pub const DESCRIPTION_COLUMN: &str = "description";

/// U+201A, left behind where a curly quote was decoded as cp1252.
const STRAY_LOW_QUOTE: char = '\u{201A}';

static NEWLINES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").expect("newline regex"));
static QUOTED_TRAILING_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]+?)[,.]+""#).expect("quoted punctuation regex"));

/// Collapse each run of newlines into one space.
pub fn collapse_newlines(s: &str) -> Cow<'_, str> {
    NEWLINES_RE.replace_all(s, " ")
}

/// Drop the stray low quote, then strip `,`/`.` sitting right before a closing
/// `"`. Repeats until nothing changes, so cleaning clean text is a no-op.
pub fn clean_quoted_text(s: &str) -> String {
    let mut out: String = s.chars().filter(|c| *c != STRAY_LOW_QUOTE).collect();
    loop {
        match QUOTED_TRAILING_PUNCT_RE.replace_all(&out, "\"$1\"") {
            Cow::Borrowed(_) => return out,
            Cow::Owned(next) => out = next,
        }
    }
}

fn map_text_column<F>(table: &Table, column: &str, f: F) -> Result<Table>
where
    F: Fn(&str) -> String,
{
    if !table.has_column(column) {
        warn!(table = %table.kind(), column, "text column missing; skipping");
        return Ok(table.clone());
    }
    let cleaned: StringArray = table
        .strings(column)?
        .iter()
        .map(|v| v.as_deref().map(&f))
        .collect();
    table.with_column(column, Arc::new(cleaned) as ArrayRef)
}

/// Newline collapsing on the description column.
pub fn collapse_description_newlines(table: &Table) -> Result<Table> {
    map_text_column(table, DESCRIPTION_COLUMN, |s| collapse_newlines(s).into_owned())
}

/// Quoted-text cleanup on the description column.
pub fn clean_description(table: &Table) -> Result<Table> {
    map_text_column(table, DESCRIPTION_COLUMN, clean_quoted_text)
}
