use anyhow::Result;
use semichain::{
    config::PipelineConfig,
    pipeline::{clean_tables, run_transform, PipelineReport},
    process::{table::TableKind, utils::float_values},
    session::Session,
    validate::ValidationSummary,
};
use std::{fs, path::Path};
use tempfile::{tempdir, TempDir};

fn fixture_dir() -> TempDir {
    let dir = tempdir().unwrap();
    let src = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    for kind in TableKind::ALL {
        fs::copy(src.join(kind.file_name()), dir.path().join(kind.file_name())).unwrap();
    }
    dir
}

fn session(raw_dir: &Path) -> Session {
    Session::open(PipelineConfig {
        raw_dir: raw_dir.to_path_buf(),
        ..PipelineConfig::default()
    })
    .unwrap()
}

fn run(raw_dir: &Path) -> Result<(PipelineReport, String)> {
    let mut out = Vec::new();
    let report = run_transform(&session(raw_dir), &mut out)?;
    Ok((report, String::from_utf8(out)?))
}

#[test]
fn repeated_runs_are_identical() -> Result<()> {
    let dir = fixture_dir();
    let (first, first_text) = run(dir.path())?;
    let (second, second_text) = run(dir.path())?;
    assert_eq!(first, second);
    assert_eq!(first_text, second_text);
    Ok(())
}

#[test]
fn validation_before_and_after_country_filter() -> Result<()> {
    let dir = fixture_dir();
    let (report, text) = run(dir.path())?;

    assert_eq!(
        report.pre_filter,
        ValidationSummary {
            total_ids: 5,
            outliers: 2,
            null_sums: 1
        }
    );
    // S1 is supplied by companies only and leaves the domain
    assert_eq!(
        report.post_filter,
        ValidationSummary {
            total_ids: 4,
            outliers: 1,
            null_sums: 1
        }
    );

    assert!(text.contains("Outliers with total_share > 110: 2 (40.00%)"));
    assert!(text.contains("provided_ids with total_share = NULL: 1 (20.00%)"));
    assert!(text.contains(r#"Outlier provided_ids (pre-filter): ["N2", "N4"]"#));
    assert!(text.contains("Post filter, > 110 outliers count is 1"));
    Ok(())
}

#[test]
fn row_counts_and_dropped_columns() -> Result<()> {
    let dir = fixture_dir();
    let (report, _) = run(dir.path())?;

    let counts: Vec<(TableKind, usize)> = report.row_counts.into_iter().collect();
    assert_eq!(
        counts,
        vec![
            (TableKind::Inputs, 4),
            (TableKind::Providers, 7),
            (TableKind::Provision, 8),
            (TableKind::Sequence, 3),
            (TableKind::Stages, 2),
        ]
    );

    let dropped: Vec<(TableKind, Vec<String>)> = report
        .pruned
        .iter()
        .map(|p| (p.table, p.dropped.iter().cloned().collect()))
        .collect();
    assert_eq!(
        dropped,
        vec![
            (
                TableKind::Inputs,
                vec!["always_blank".to_string(), "source_tag".to_string()]
            ),
            (
                TableKind::Providers,
                vec!["alias".to_string(), "region".to_string()]
            ),
            (
                TableKind::Provision,
                vec!["minimum_share_provided".to_string(), "year".to_string()]
            ),
            (
                TableKind::Sequence,
                vec!["is_type_of_id".to_string(), "notes".to_string()]
            ),
            (TableKind::Stages, vec![]),
        ]
    );
    Ok(())
}

#[test]
fn cleaned_values() -> Result<()> {
    let dir = fixture_dir();
    let (tables, _) = clean_tables(&session(dir.path()))?;

    let stages = &tables.stages;
    assert_eq!(
        stages.strings("description")?[0].as_deref(),
        Some(r#"Wafer fabrication. Includes "front-end" processes."#)
    );
    assert_eq!(
        float_values(stages.require("market_size")?.as_ref())?,
        vec![Some(12500.0), Some(750.0)]
    );
    assert_eq!(
        stages.strings("year")?,
        vec![Some("2022".to_string()), Some("2020".to_string())]
    );

    let inputs = &tables.inputs;
    let desc = inputs.strings("description")?;
    assert_eq!(
        desc[0].as_deref(),
        Some(r#"Photoresist is a "light-sensitive" polymer."#)
    );
    // newline collapsing is for stages only
    assert_eq!(
        desc[1].as_deref(),
        Some("Silicon wafers\nare the substrate.")
    );
    assert_eq!(
        desc[2].as_deref(),
        Some(r#"Specialty gases used in "etching""#)
    );
    let sizes = float_values(inputs.require("market_size")?.as_ref())?;
    assert!((sizes[0].unwrap() - 2100.0).abs() < 1e-9);
    assert_eq!(sizes[1], Some(750.0));
    assert_eq!(sizes[2], None);
    assert_eq!(sizes[3], None);

    let country = tables.providers.strings("country")?;
    assert_eq!(country[0].as_deref(), Some("United States"));
    assert_eq!(country[3].as_deref(), Some("Taiwan"));
    assert_eq!(country[6], None);
    Ok(())
}

#[test]
fn missing_file_fails_with_table_name() {
    let dir = fixture_dir();
    fs::remove_file(dir.path().join("sequence.csv")).unwrap();
    let err = run(dir.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("loading table `sequence`"));
}
