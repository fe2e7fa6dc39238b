use std::collections::HashSet;

use url::Url;

use super::NormalizedArticle;

// Query parameters that only carry campaign / click attribution.
const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "yclid", "mc_cid", "mc_eid", "igshid", "ref", "ref_src"];

// Fewer words than this and a title is too generic to identify an article.
const MIN_FINGERPRINT_WORDS: usize = 3;

/// Dedup key for a URL: host (lowercased, default port dropped), path without
/// trailing slash, and the non-tracking query parameters in sorted order. The
/// scheme and fragment are ignored. Unparseable input is only trimmed and lowercased.
pub fn canonical_url(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(url) = Url::parse(raw) else {
        return raw.trim_end_matches('/').to_lowercase();
    };
    let Some(host) = url.host_str() else {
        return raw.trim_end_matches('/').to_lowercase();
    };

    let mut key = host.to_lowercase();
    if let Some(port) = url.port() {
        key.push_str(&format!(":{port}"));
    }
    key.push_str(url.path().trim_end_matches('/'));

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !params.is_empty() {
        params.sort();
        let query = params
            .iter()
            .map(|(k, v)| if v.is_empty() { k.clone() } else { format!("{k}={v}") })
            .collect::<Vec<_>>()
            .join("&");
        key.push('?');
        key.push_str(&query);
    }
    key
}

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name.as_str())
}

/// Lowercased alphanumeric words of a title, or None when the title is too short to trust.
pub fn title_fingerprint(title: &str) -> Option<String> {
    let words: Vec<String> = title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect();
    if words.len() < MIN_FINGERPRINT_WORDS {
        return None;
    }
    Some(words.join(" "))
}

/// Snapshot of what the destination already holds, keyed the way `is_duplicate` compares.
#[derive(Debug, Clone, Default)]
pub struct KnownArticles {
    urls: HashSet<String>,
    titles: HashSet<String>,
}

impl KnownArticles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: &str, title: Option<&str>) {
        if !url.trim().is_empty() {
            self.urls.insert(canonical_url(url));
        }
        if let Some(fp) = title.and_then(title_fingerprint) {
            self.titles.insert(fp);
        }
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.urls.contains(&canonical_url(url))
    }

    pub fn contains_title(&self, title: &str) -> bool {
        title_fingerprint(title).is_some_and(|fp| self.titles.contains(&fp))
    }

    pub fn url_count(&self) -> usize {
        self.urls.len()
    }
}

impl<'a> FromIterator<(&'a str, Option<&'a str>)> for KnownArticles {
    fn from_iter<I: IntoIterator<Item = (&'a str, Option<&'a str>)>>(iter: I) -> Self {
        let mut known = KnownArticles::new();
        for (url, title) in iter {
            known.insert(url, title);
        }
        known
    }
}

/// Pure membership test against the snapshot; no store access.
pub fn is_duplicate(article: &NormalizedArticle, known: &KnownArticles) -> bool {
    (article.has_identity() && known.contains_url(&article.url)) || known.contains_title(&article.title)
}
