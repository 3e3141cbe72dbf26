use anyhow::{Context, Result};
use clap::Args;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use crate::config::{self, FeedSubscription};
use crate::opml::{self, OpmlEntry};

/// `podcached export` — OPML straight from the feed list, no fetching.
/// Entries point at the source URLs, for importing the raw subscriptions
/// into a client.
#[derive(Args)]
pub struct ExportCmd {
    /// Feed list file, one `name url` per line (PODCACHED_FEEDS)
    #[arg(long)]
    pub feeds: Option<PathBuf>,
    /// Output file; stdout if omitted
    #[arg(long)]
    pub out: Option<PathBuf>,
}

fn entries_from(subs: &[FeedSubscription]) -> Vec<OpmlEntry> {
    subs.iter()
        .map(|sub| OpmlEntry {
            title: sub.name.clone(),
            xml_url: sub.url.clone(),
            html_url: sub.url.clone(),
        })
        .collect()
}

pub fn run(args: ExportCmd) -> Result<()> {
    let feeds_path = args
        .feeds
        .or_else(|| env::var("PODCACHED_FEEDS").ok().map(PathBuf::from))
        .context("provide --feeds or set PODCACHED_FEEDS")?;
    let list = fs::read_to_string(&feeds_path)
        .with_context(|| format!("cannot read feed list {}", feeds_path.display()))?;
    let subs = config::parse_feed_list(&list);
    let doc = opml::render(&entries_from(&subs));

    match args.out {
        Some(path) => {
            fs::write(&path, doc)
                .with_context(|| format!("cannot write {}", path.display()))?;
            info!("exported {} subscriptions to {}", subs.len(), path.display());
        }
        None => print!("{doc}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_entries_point_at_source_urls() {
        let subs = config::parse_feed_list("showA http://x/a.rss\nshowB http://x/b.rss\n");
        let entries = entries_from(&subs);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title, "showA");
        assert_eq!(entries[0].xml_url, "http://x/a.rss");
        assert_eq!(entries[0].html_url, "http://x/a.rss");

        let doc = opml::render(&entries);
        assert_eq!(doc.matches("<outline ").count(), 2);
    }
}
