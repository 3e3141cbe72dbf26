use chrono::{DateTime, FixedOffset};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

static DISALLOWED: OnceLock<Regex> = OnceLock::new();

fn disallowed() -> &'static Regex {
    DISALLOWED.get_or_init(|| Regex::new(r#"[^0-9A-Za-z.,\-'": ]"#).expect("static regex"))
}

pub fn sanitize_title(title: &str) -> String {
    disallowed().replace_all(title.trim(), "_").into_owned()
}

// File extension of the URL's path component, leading dot included.
// Query strings and fragments never leak into the extension.
fn url_extension(url: &str) -> String {
    let path = match Url::parse(url) {
        Ok(u) => u.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let segment = path.rsplit('/').next().unwrap_or("");
    match segment.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < segment.len() => segment[idx..].to_string(),
        _ => String::new(),
    }
}

/// Local mirror path for an enclosure, relative to the mirror root:
/// `{feed}/{YYYY-MM-DD HH:MM - }{title}{.ext}`.
///
/// Deterministic in its inputs, and deliberately so: this path is the only
/// de-duplication key across runs. Human-readable names were chosen over
/// globally unique ones (no content hash, no guid), so a feed that re-dates
/// or retitles an episode will mirror it again under the new name.
pub fn derive_local_path(
    feed_name: &str,
    published: DateTime<FixedOffset>,
    title: &str,
    enclosure_url: &str,
) -> String {
    format!(
        "{feed_name}/{}{}{}",
        published.format("%Y-%m-%d %H:%M - "),
        sanitize_title(title),
        url_extension(enclosure_url)
    )
}
