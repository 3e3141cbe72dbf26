use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{self, FeedSubscription, Options};
use crate::mirror::{self, MirrorError, MirrorRecord};
use crate::opml;
use crate::telemetry;

/// `podcached sync` — mirror every configured feed, then write the OPML.
#[derive(Args)]
pub struct SyncCmd {
    /// Feed list file, one `name url` per line (PODCACHED_FEEDS)
    #[arg(long)]
    pub feeds: Option<PathBuf>,
    /// Public URL prefix the mirror is served under (PODCACHED_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,
    /// Mirror directory root (PODCACHED_DIR)
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Refuse https -> http redirects while fetching
    #[arg(long, default_value_t = false)]
    pub secure_redirects_only: bool,
    /// Per-attempt fetch timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub feeds: usize,
    pub mirrored: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub per_feed: Vec<mirror::FeedReport>,
}

/// Drive the whole run over an already-resolved configuration. One bad feed
/// never aborts the batch; its error is logged and the loop moves on.
/// Cancellation aborts the current feed and skips the rest, but the OPML is
/// still written for everything that completed.
pub async fn run_sync(
    fetcher: &dyn mirror::fetch::Fetcher,
    options: &Options,
    subs: &[FeedSubscription],
    cancel: &CancellationToken,
) -> Result<RunSummary> {
    info!("podcached starting: {} feeds", subs.len());

    let mut records: Vec<MirrorRecord> = Vec::new();
    let mut summary = RunSummary {
        feeds: subs.len(),
        mirrored: 0,
        failed: 0,
        cancelled: false,
        per_feed: Vec::new(),
    };

    for sub in subs {
        if cancel.is_cancelled() {
            warn!("interrupted, skipping remaining feeds");
            summary.cancelled = true;
            break;
        }
        debug!("processing {}", sub.name);
        match mirror::process_feed(fetcher, options, &sub.name, &sub.url, cancel).await {
            Ok(report) => {
                records.push(report.record.clone());
                summary.mirrored += 1;
                summary.per_feed.push(report);
            }
            Err(MirrorError::Cancelled) => {
                warn!("interrupted while processing {}", sub.name);
                summary.cancelled = true;
                break;
            }
            Err(err) => {
                error!("error processing feed {}: {err}", sub.name);
                summary.failed += 1;
            }
        }
    }

    let entries: Vec<opml::OpmlEntry> =
        records.iter().map(|r| r.to_opml_entry(&options.base_url)).collect();
    mirror::write_atomic(&options.dir.join(opml::OPML_FILENAME), opml::render(&entries).as_bytes())
        .context("writing subscription list")?;

    info!(
        "podcached done: {} mirrored, {} failed{}",
        summary.mirrored,
        summary.failed,
        if summary.cancelled { ", interrupted" } else { "" }
    );
    Ok(summary)
}

pub async fn run(args: SyncCmd) -> Result<()> {
    let t0 = Instant::now();

    let base_url = args
        .base_url
        .or_else(|| env::var("PODCACHED_BASE_URL").ok())
        .context("provide --base-url or set PODCACHED_BASE_URL")?;
    let dir = args
        .dir
        .or_else(|| env::var("PODCACHED_DIR").ok().map(PathBuf::from))
        .context("provide --dir or set PODCACHED_DIR")?;
    let feeds_path = args
        .feeds
        .or_else(|| env::var("PODCACHED_FEEDS").ok().map(PathBuf::from))
        .context("provide --feeds or set PODCACHED_FEEDS")?;

    let options = Options::new(&base_url, dir)?;
    fs::create_dir_all(&options.dir)
        .with_context(|| format!("cannot prepare mirror directory {}", options.dir.display()))?;
    let list = fs::read_to_string(&feeds_path)
        .with_context(|| format!("cannot read feed list {}", feeds_path.display()))?;
    let subs = config::parse_feed_list(&list);

    let fetcher = mirror::fetch::HttpFetcher::new(mirror::fetch::FetchConfig {
        timeout: Duration::from_secs(args.timeout_secs),
        allow_cross_scheme_redirects: !args.secure_redirects_only,
        ..Default::default()
    })?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let summary = run_sync(&fetcher, &options, &subs, &cancel).await?;

    if telemetry::json_mode() {
        telemetry::print_result(
            "sync",
            &summary,
            Some(telemetry::Meta { duration_ms: Some(t0.elapsed().as_millis()) }),
        )?;
    }
    Ok(())
}
