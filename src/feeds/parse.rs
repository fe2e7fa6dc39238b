use bytes::Bytes;
use feed_rs::model::{Entry, Link};
use rss::{Channel, Item};

use super::reader::FeedError;
use super::types::RawEntry;

/// RSS 2.0 through the rss crate; anything it rejects (Atom, RSS 1.0) goes to feed-rs.
pub fn parse_feed(xml: &Bytes) -> Result<Vec<RawEntry>, FeedError> {
    match Channel::read_from(&xml[..]) {
        Ok(channel) => Ok(channel.items().iter().map(raw_entry).collect()),
        Err(rss_err) => {
            let feed = feed_rs::parser::parse(&xml[..])
                .map_err(|e| FeedError::Parse(format!("{rss_err}; {e}")))?;
            Ok(feed.entries.iter().map(atom_entry).collect())
        }
    }
}

fn raw_entry(item: &Item) -> RawEntry {
    RawEntry {
        title: item.title().map(str::to_string),
        link: item.link().map(str::to_string),
        permalink: item
            .guid()
            .filter(|g| g.is_permalink())
            .map(|g| g.value().to_string()),
        published: published_raw(item),
        summary: item.description().map(str::to_string),
        content: item.content().map(str::to_string),
    }
}

// pubDate first, then the first Dublin Core date
fn published_raw(item: &Item) -> Option<String> {
    if let Some(p) = item.pub_date() {
        return Some(p.to_string());
    }
    item.dublin_core_ext()
        .and_then(|dc| dc.dates().first().cloned())
}

fn atom_entry(entry: &Entry) -> RawEntry {
    RawEntry {
        title: entry.title.as_ref().map(|t| t.content.clone()),
        link: entry_link(&entry.links).map(|l| l.href.clone()),
        // Atom ids are often tag: URIs; only an http(s) id can stand in for a link
        permalink: Some(entry.id.clone()).filter(|id| id.starts_with("http://") || id.starts_with("https://")),
        published: entry.published.or(entry.updated).map(|ts| ts.to_rfc3339()),
        summary: entry.summary.as_ref().map(|t| t.content.clone()),
        content: entry.content.as_ref().and_then(|c| c.body.clone()),
    }
}

// rel="alternate" (or no rel) is the article page; fall back to the first link
fn entry_link(links: &[Link]) -> Option<&Link> {
    links
        .iter()
        .find(|l| l.rel.as_deref().is_none_or(|r| r == "alternate"))
        .or_else(|| links.first())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::time::parse_feed_timestamp;
    use chrono::{TimeZone, Utc};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Plant Floor</title>
    <link>https://example.com</link>
    <description>news</description>
    <item>
      <title>Vision inspection at scale</title>
      <link>https://example.com/a?utm_source=rss</link>
      <pubDate>Tue, 05 Mar 2024 10:30:00 +0000</pubDate>
      <description>&lt;p&gt;Short teaser&lt;/p&gt;</description>
      <content:encoded><![CDATA[<p>Long body</p>]]></content:encoded>
    </item>
    <item>
      <title>No link here</title>
      <guid isPermaLink="true">https://example.com/b</guid>
      <dc:date>2024-03-04T08:00:00Z</dc:date>
    </item>
    <item>
      <guid isPermaLink="false">tag:example.com,2024:c</guid>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn maps_items_to_raw_entries() {
        let entries = parse_feed(&Bytes::from_static(FEED.as_bytes())).unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].title.as_deref(), Some("Vision inspection at scale"));
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/a?utm_source=rss"));
        assert_eq!(entries[0].published.as_deref(), Some("Tue, 05 Mar 2024 10:30:00 +0000"));
        assert_eq!(entries[0].summary.as_deref(), Some("<p>Short teaser</p>"));
        assert_eq!(entries[0].content.as_deref(), Some("<p>Long body</p>"));

        assert_eq!(entries[1].link, None);
        assert_eq!(entries[1].permalink.as_deref(), Some("https://example.com/b"));
        assert_eq!(entries[1].published.as_deref(), Some("2024-03-04T08:00:00Z"));

        assert_eq!(entries[2].permalink, None);
        assert_eq!(entries[2].title, None);
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let err = parse_feed(&Bytes::from_static(b"<html><body>nope</body></html>")).unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Factory Notes</title>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2024-03-05T10:30:00Z</updated>
  <entry>
    <title>Digital twins for press lines</title>
    <link rel="self" href="https://example.org/api/entries/1"/>
    <link rel="alternate" href="https://example.org/twins"/>
    <id>tag:example.org,2024:1</id>
    <published>2024-03-05T10:30:00Z</published>
    <updated>2024-03-06T09:00:00Z</updated>
    <summary>Short teaser</summary>
    <content type="html">&lt;p&gt;Long body&lt;/p&gt;</content>
  </entry>
  <entry>
    <title>Only updated</title>
    <id>https://example.org/updated-only</id>
    <updated>2024-03-04T08:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn atom_entries_map_to_raw_entries() {
        let entries = parse_feed(&Bytes::from_static(ATOM.as_bytes())).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title.as_deref(), Some("Digital twins for press lines"));
        assert_eq!(first.link.as_deref(), Some("https://example.org/twins"));
        assert_eq!(first.permalink, None);
        let published = first.published.as_deref().and_then(parse_feed_timestamp);
        assert_eq!(published, Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap()));
        assert_eq!(first.summary.as_deref(), Some("Short teaser"));
        assert!(first.content.as_deref().is_some_and(|c| c.contains("Long body")));

        let second = &entries[1];
        assert_eq!(second.link, None);
        assert_eq!(second.permalink.as_deref(), Some("https://example.org/updated-only"));
        let updated = second.published.as_deref().and_then(parse_feed_timestamp);
        assert_eq!(updated, Some(Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap()));
    }
}
