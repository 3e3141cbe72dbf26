use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use tracing::warn;
use url::Url;

/// Run-wide settings resolved from flags and environment.
pub struct Options {
    /// Public prefix rewritten enclosure URLs and OPML links point at.
    /// Always ends with `/` so relative mirror paths join cleanly.
    pub base_url: Url,
    /// Root of the local mirror; per-feed directories live under it.
    pub dir: PathBuf,
}

impl Options {
    pub fn new(base_url: &str, dir: PathBuf) -> Result<Self> {
        let raw = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{base_url}/")
        };
        let base_url = Url::parse(&raw).with_context(|| format!("invalid base url {base_url}"))?;
        if base_url.cannot_be_a_base() {
            bail!("base url {base_url} cannot serve as a prefix");
        }
        Ok(Self { base_url, dir })
    }
}

/// One configured feed: mirror directory name plus source URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSubscription {
    pub name: String,
    pub url: String,
}

/// Parse the line-oriented feed list: `name url` per line, blank lines and
/// `#` comments skipped. Lines without both tokens are skipped with a warning.
pub fn parse_feed_list(input: &str) -> Vec<FeedSubscription> {
    let mut feeds = Vec::new();
    for line in input.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some(name), Some(url)) => feeds.push(FeedSubscription {
                name: name.to_string(),
                url: url.to_string(),
            }),
            _ => warn!("skipping malformed feed list line: {line}"),
        }
    }
    feeds
}
