use std::sync::OnceLock;

use regex::Regex;
use scraper::Html;

use crate::feeds::types::RawEntry;
use crate::util::time::parse_feed_timestamp;

use super::NormalizedArticle;

pub const UNTITLED: &str = "(no title)";

pub fn normalize(raw: &RawEntry) -> NormalizedArticle {
    let title = raw
        .title
        .as_deref()
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let url = raw
        .link
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .or_else(|| {
            raw.permalink
                .as_deref()
                .map(str::trim)
                .filter(|p| p.starts_with("http://") || p.starts_with("https://"))
        })
        .unwrap_or_default()
        .to_string();

    let published_at = raw.published.as_deref().and_then(parse_feed_timestamp);

    let body = format!(
        "{}\n\n{}",
        raw.summary.as_deref().unwrap_or(""),
        raw.content.as_deref().unwrap_or("")
    );

    NormalizedArticle { title, url, published_at, text: clean_text(&body) }
}

/// Strip markup and collapse whitespace.
pub fn clean_text(html_or_text: &str) -> String {
    if html_or_text.trim().is_empty() {
        return String::new();
    }
    let frag = Html::parse_fragment(html_or_text);
    let joined = frag.root_element().text().collect::<Vec<_>>().join(" ");
    whitespace().replace_all(&joined, " ").trim().to_string()
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn full_entry() {
        let raw = RawEntry {
            title: Some("  Cobots &amp; vision  ".into()),
            link: Some(" https://example.com/a ".into()),
            permalink: None,
            published: Some("Tue, 05 Mar 2024 10:30:00 +0000".into()),
            summary: Some("<p>Teaser   text</p>".into()),
            content: Some("<div><p>Body</p>\n<p>more</p></div>".into()),
        };
        let a = normalize(&raw);
        assert_eq!(a.title, "Cobots & vision");
        assert_eq!(a.url, "https://example.com/a");
        assert_eq!(a.published_at, Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap()));
        assert_eq!(a.text, "Teaser text Body more");
    }

    #[test]
    fn missing_fields_never_fail() {
        let a = normalize(&RawEntry::default());
        assert_eq!(a.title, UNTITLED);
        assert_eq!(a.url, "");
        assert!(!a.has_identity());
        assert_eq!(a.published_at, None);
        assert_eq!(a.text, "");
    }

    #[test]
    fn unparseable_date_is_unknown() {
        let raw = RawEntry {
            link: Some("https://example.com/x".into()),
            published: Some("sometime last week".into()),
            ..Default::default()
        };
        assert_eq!(normalize(&raw).published_at, None);
    }

    #[test]
    fn permalink_guid_backs_up_missing_link() {
        let raw = RawEntry {
            permalink: Some("https://example.com/p/42".into()),
            ..Default::default()
        };
        assert_eq!(normalize(&raw).url, "https://example.com/p/42");

        let not_a_url = RawEntry { permalink: Some("urn:uuid:1234".into()), ..Default::default() };
        assert_eq!(normalize(&not_a_url).url, "");
    }

    #[test]
    fn clean_text_plain_passthrough() {
        assert_eq!(clean_text("plain\ttext\n\nhere"), "plain text here");
        assert_eq!(clean_text("   "), "");
    }
}
