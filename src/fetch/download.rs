use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use tokio::fs;
use url::Url;

/// What happened to one file of the manifest.
#[derive(Debug)]
pub enum FileStatus {
    Downloaded(PathBuf),
    /// The server answered with a non-success status; nothing was written.
    Rejected(StatusCode),
    /// The request or the local write failed.
    Failed(anyhow::Error),
}

impl FileStatus {
    pub fn is_downloaded(&self) -> bool {
        matches!(self, FileStatus::Downloaded(_))
    }
}

/// `base` with a guaranteed trailing slash, so joining keeps its last segment.
pub fn directory_url(base: &str) -> Result<Url> {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    Url::parse(&base).with_context(|| format!("parsing base URL {}", base))
}

/// GET `<base>/<file_name>` once and save the body as `<dest_dir>/<file_name>`,
/// overwriting any previous copy. A non-success status is reported, not raised.
pub async fn download_file(
    client: &Client,
    base: &Url,
    file_name: &str,
    dest_dir: impl AsRef<Path>,
) -> FileStatus {
    match try_download(client, base, file_name, dest_dir.as_ref()).await {
        Ok(status) => status,
        Err(e) => FileStatus::Failed(e),
    }
}

async fn try_download(
    client: &Client,
    base: &Url,
    file_name: &str,
    dest_dir: &Path,
) -> Result<FileStatus> {
    let url = base
        .join(file_name)
        .with_context(|| format!("joining {} onto {}", file_name, base))?;

    let resp = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {}", url))?;
    if !resp.status().is_success() {
        return Ok(FileStatus::Rejected(resp.status()));
    }
    let bytes = resp
        .bytes()
        .await
        .with_context(|| format!("reading body from {}", url))?;

    fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("creating {}", dest_dir.display()))?;
    let dest_path = dest_dir.join(file_name);
    fs::write(&dest_path, &bytes)
        .await
        .with_context(|| format!("writing {}", dest_path.display()))?;

    Ok(FileStatus::Downloaded(dest_path))
}
