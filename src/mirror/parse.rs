use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use rss::{Channel, Item};

pub fn parse_channel(xml: &Bytes) -> Result<Channel, rss::Error> {
    Channel::read_from(&xml[..])
}

pub fn published_at(item: &Item) -> Option<DateTime<FixedOffset>> {
    item.pub_date().and_then(|s| DateTime::parse_from_rfc2822(s).ok())
}

/// Downstream consumers reject empty channel descriptions; backfill from the
/// iTunes summary, or "N/A" as a last resort.
pub fn normalize_description(channel: &mut Channel) {
    if !channel.description().trim().is_empty() {
        return;
    }
    let fallback = channel
        .itunes_ext()
        .and_then(|ext| ext.summary())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "N/A".to_string());
    channel.set_description(fallback);
}

// Guids arrive as structured elements or bare strings; either way the string
// content is what matters. Kept for dedup logging, never for naming.
pub fn normalized_guid(item: &Item) -> Option<String> {
    item.guid().map(|guid| guid.value().replace('/', "_"))
}
