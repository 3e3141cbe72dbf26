use rss::Channel;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub mod fetch;
pub mod filename;
pub mod integrity;
pub mod parse;
pub mod reconcile;
#[cfg(test)]
pub(crate) mod testutil;

use crate::config::Options;
use crate::opml::OpmlEntry;
use fetch::{FetchError, Fetcher};
use reconcile::ReconcileOutcome;

/// Items kept in the trimmed per-feed output. Document order is assumed
/// newest-first, so trimming drops the tail.
pub const RECENT_ITEMS: usize = 10;

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("feed document did not parse")]
    Parse(#[from] rss::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("item {0:?} has no parseable publication date")]
    MissingPubDate(String),
    #[error("mirror url for {0} is not constructible")]
    BadMirrorUrl(String),
    #[error("interrupted")]
    Cancelled,
}

/// One successfully mirrored feed, in processing order.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorRecord {
    pub feed_name: String,
    pub title: String,
    pub link: String,
}

impl MirrorRecord {
    pub fn to_opml_entry(&self, base_url: &url::Url) -> OpmlEntry {
        let xml_url = base_url
            .join(&format!("{}/feed", self.feed_name))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| format!("{}{}/feed", base_url, self.feed_name));
        OpmlEntry { title: self.title.clone(), xml_url, html_url: self.link.clone() }
    }
}

#[derive(Debug, Serialize)]
pub struct FeedReport {
    #[serde(flatten)]
    pub record: MirrorRecord,
    pub items: usize,
    pub downloaded: usize,
    pub already_mirrored: usize,
    pub overridden: usize,
    pub item_errors: usize,
}

// Write via a sibling temp file and rename, so an interrupt mid-write never
// leaves a half-written file under the final name.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".part");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)
}

fn trim_to_recent(channel: &mut Channel, keep: usize) {
    if channel.items().len() > keep {
        let kept = channel.items()[..keep].to_vec();
        channel.set_items(kept);
    }
}

/// Mirror one feed end-to-end: fetch and parse the document, reconcile every
/// enclosure, persist the full copy as `{name}/feed-full` and the trimmed
/// copy as `{name}/feed`.
///
/// A failing enclosure does not abort the feed: the item keeps its origin URL
/// and is counted in `item_errors`. Fetch/parse failure of the feed document
/// itself aborts this feed only; the caller decides whether to continue.
pub async fn process_feed(
    fetcher: &dyn Fetcher,
    options: &Options,
    name: &str,
    url: &str,
    cancel: &CancellationToken,
) -> Result<FeedReport, MirrorError> {
    let xml = fetcher.fetch(url).await?;
    let mut channel = parse::parse_channel(&xml)?;
    parse::normalize_description(&mut channel);

    let record = MirrorRecord {
        feed_name: name.to_string(),
        title: channel.title().to_string(),
        link: channel.link().to_string(),
    };

    let mut report = FeedReport {
        record,
        items: channel.items().len(),
        downloaded: 0,
        already_mirrored: 0,
        overridden: 0,
        item_errors: 0,
    };

    for item in channel.items_mut() {
        if cancel.is_cancelled() {
            return Err(MirrorError::Cancelled);
        }
        match reconcile::reconcile_item(fetcher, options, name, item).await {
            Ok(ReconcileOutcome::Downloaded) => report.downloaded += 1,
            Ok(ReconcileOutcome::AlreadyMirrored) => report.already_mirrored += 1,
            Ok(ReconcileOutcome::Overridden) => report.overridden += 1,
            Ok(ReconcileOutcome::Skipped) => {}
            Err(err) => {
                report.item_errors += 1;
                error!(
                    "failed to mirror item {:?} from {name}: {err}",
                    item.title().unwrap_or("<untitled>")
                );
            }
        }
    }

    let feed_dir = options.dir.join(name);
    fs::create_dir_all(&feed_dir)?;
    write_atomic(&feed_dir.join("feed-full"), channel.to_string().as_bytes())?;
    trim_to_recent(&mut channel, RECENT_ITEMS);
    write_atomic(&feed_dir.join("feed"), channel.to_string().as_bytes())?;

    info!(
        "mirrored {name}: {} items, {} downloaded, {} already local, {} overridden, {} errors",
        report.items, report.downloaded, report.already_mirrored, report.overridden, report.item_errors
    );
    Ok(report)
}
