use anyhow::Result;
use semichain::{config::PipelineConfig, fetch, pipeline, session::Session};
use std::{io::Write, sync::Arc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 2) config + session ─────────────────────────────────────────
    let config = PipelineConfig::from_env()?;
    let session = Arc::new(Session::open(config)?);

    // ─── 3) fetch the five CSVs ──────────────────────────────────────
    let summary = fetch::fetch_all(&session).await?;
    let failed: Vec<&str> = summary.failed().collect();
    if !failed.is_empty() {
        warn!(?failed, "some files were not downloaded; loading will use whatever is on disk");
    }

    // ─── 4) clean + validate on the blocking pool ────────────────────
    let report = tokio::task::spawn_blocking({
        let session = Arc::clone(&session);
        move || {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let report = pipeline::run_transform(&session, &mut out)?;
            out.flush()?;
            Ok::<_, anyhow::Error>(report)
        }
    })
    .await??;

    info!(row_counts = ?report.row_counts, "all done");
    Ok(())
}
