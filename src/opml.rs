//! OPML 1.0 rendering for the aggregate subscription list.

use std::fmt::Write;

pub const OPML_FILENAME: &str = "podcached.opml";

/// One `<outline>` in the subscription list, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpmlEntry {
    pub title: String,
    pub xml_url: String,
    pub html_url: String,
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render(entries: &[OpmlEntry]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<opml version=\"1.0\">\n");
    out.push_str("  <head>\n    <title>Podcached Podcasts</title>\n  </head>\n");
    out.push_str("  <body>\n");
    for entry in entries {
        let title = escape_attr(&entry.title);
        // writing to a String cannot fail
        let _ = writeln!(
            out,
            "    <outline text=\"{title}\" title=\"{title}\" type=\"rss\" xmlUrl=\"{}\" htmlUrl=\"{}\"/>",
            escape_attr(&entry.xml_url),
            escape_attr(&entry.html_url),
        );
    }
    out.push_str("  </body>\n</opml>\n");
    out
}
