// src/fetch/mod.rs
use anyhow::Result;
use tracing::{error, info, instrument, warn};

pub mod download;

use crate::process::table::TableKind;
use crate::session::Session;
use download::{directory_url, download_file, FileStatus};

/// Outcome of one pass over the manifest, in manifest order.
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub files: Vec<(&'static str, FileStatus)>,
}

impl FetchSummary {
    pub fn downloaded(&self) -> usize {
        self.files.iter().filter(|(_, s)| s.is_downloaded()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.files
            .iter()
            .filter(|(_, s)| !s.is_downloaded())
            .map(|(name, _)| *name)
    }
}

/// Download every manifest file, one request at a time.
///
/// A file that cannot be fetched is logged and skipped; the others still run.
/// Only an unusable base URL is an error.
#[instrument(level = "info", skip(session))]
pub async fn fetch_all(session: &Session) -> Result<FetchSummary> {
    let cfg = session.config();
    let base = directory_url(&cfg.base_url)?;
    let mut summary = FetchSummary::default();

    for kind in TableKind::ALL {
        let file = kind.file_name();
        let status = download_file(session.client(), &base, file, &cfg.raw_dir).await;
        match &status {
            FileStatus::Downloaded(path) => {
                info!("Downloaded {} to {}", file, path.display());
            }
            FileStatus::Rejected(code) => {
                warn!("Failed to download {}. Status: {}", file, code.as_u16());
            }
            FileStatus::Failed(err) => {
                error!("Failed to download {}: {:#}", file, err);
            }
        }
        summary.files.push((file, status));
    }

    info!(
        downloaded = summary.downloaded(),
        total = summary.files.len(),
        "fetch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use std::fs;
    use tempfile::tempdir;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,semichain::fetch=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn session(base_url: String, raw_dir: &std::path::Path) -> Session {
        let cfg = PipelineConfig {
            base_url,
            raw_dir: raw_dir.to_path_buf(),
            ..PipelineConfig::default()
        };
        Session::open(cfg).unwrap()
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_loop() {
        init_test_logging();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/inputs.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("input_id\nN1\n"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/stages.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("stage_id\nS1\n"))
            .mount(&server)
            .await;
        // everything else falls through to wiremock's 404

        let dir = tempdir().unwrap();
        let raw = dir.path().join("raw_data");
        let summary = fetch_all(&session(format!("{}/data", server.uri()), &raw))
            .await
            .unwrap();

        assert_eq!(summary.downloaded(), 2);
        assert_eq!(
            summary.failed().collect::<Vec<_>>(),
            vec!["providers.csv", "provision.csv", "sequence.csv"]
        );
        assert!(matches!(
            summary.files[1].1,
            FileStatus::Rejected(code) if code.as_u16() == 404
        ));
        assert_eq!(
            fs::read_to_string(raw.join("inputs.csv")).unwrap(),
            "input_id\nN1\n"
        );
        assert!(!raw.join("providers.csv").exists());
    }

    #[tokio::test]
    async fn existing_files_are_overwritten() {
        init_test_logging();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sequence.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        fs::write(dir.path().join("sequence.csv"), "stale").unwrap();
        fetch_all(&session(server.uri(), dir.path())).await.unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("sequence.csv")).unwrap(),
            "fresh"
        );
    }

    #[tokio::test]
    async fn unreachable_host_is_reported_per_file() {
        init_test_logging();
        let dir = tempdir().unwrap();
        // port 9 (discard) on localhost is not listening in test environments
        let summary = fetch_all(&session("http://127.0.0.1:9/".into(), dir.path()))
            .await
            .unwrap();
        assert_eq!(summary.downloaded(), 0);
        assert_eq!(summary.failed().count(), 5);
    }
}
