use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;

use super::NormalizedArticle;

/// What to do with an entry whose feed gave no usable date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownDatePolicy {
    #[default]
    Accept,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordMatch {
    /// Keyword must sit between non-alphanumeric characters ("ai" does not match "said").
    /// A trailing plural "s"/"es" still matches ("robots", "inspections").
    #[default]
    WholeWord,
    Substring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    TooShort,
    Stale,
    Irrelevant,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::TooShort => "too-short",
            Rejection::Stale => "stale",
            Rejection::Irrelevant => "irrelevant",
        }
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Pattern(Regex),
    Substrings(Vec<String>),
}

/// Freshness + relevance rules, built once per run from configuration.
#[derive(Debug, Clone)]
pub struct FilterPolicy {
    max_age: Duration,
    unknown_date: UnknownDatePolicy,
    min_text_chars: usize,
    matcher: Matcher,
}

impl FilterPolicy {
    pub fn new(cfg: &FilterConfig, keywords: &[String]) -> Result<Self> {
        let terms: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        let matcher = match cfg.keyword_match {
            KeywordMatch::Substring => Matcher::Substrings(terms),
            KeywordMatch::WholeWord => {
                // an empty alternation would match everywhere
                let alternation = if terms.is_empty() {
                    "[^\\s\\S]".to_string()
                } else {
                    terms.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|")
                };
                let pattern = format!(r"(?:^|[^\p{{L}}\p{{N}}])(?:{alternation})(?:e?s)?(?:$|[^\p{{L}}\p{{N}}])");
                let re = RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .context("compile keyword pattern")?;
                Matcher::Pattern(re)
            }
        };
        Ok(Self {
            max_age: Duration::days(i64::from(cfg.max_age_days)),
            unknown_date: cfg.unknown_date,
            min_text_chars: cfg.min_text_chars,
            matcher,
        })
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Fresh, relevant and long enough.
    pub fn accept(&self, article: &NormalizedArticle, now: DateTime<Utc>) -> bool {
        self.check(article, now).is_ok()
    }

    /// Same decision as `accept`, with the first failing rule. Order: length, age, keywords.
    pub fn check(&self, article: &NormalizedArticle, now: DateTime<Utc>) -> Result<(), Rejection> {
        if self.min_text_chars > 0 && article.text.chars().count() < self.min_text_chars {
            return Err(Rejection::TooShort);
        }
        if !self.is_fresh(article.published_at, now) {
            return Err(Rejection::Stale);
        }
        if !self.is_relevant(article) {
            return Err(Rejection::Irrelevant);
        }
        Ok(())
    }

    /// Exactly `max_age` old still counts as fresh.
    pub fn is_fresh(&self, published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match published_at {
            Some(ts) => now.signed_duration_since(ts) <= self.max_age,
            None => self.unknown_date == UnknownDatePolicy::Accept,
        }
    }

    pub fn is_relevant(&self, article: &NormalizedArticle) -> bool {
        let haystack = format!("{} {}", article.title, article.text);
        match &self.matcher {
            Matcher::Pattern(re) => re.is_match(&haystack),
            Matcher::Substrings(terms) => {
                let lower = haystack.to_lowercase();
                terms.iter().any(|t| lower.contains(t.as_str()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    fn policy(cfg: FilterConfig) -> FilterPolicy {
        let kw: Vec<String> = ["predictive maintenance", "AI", "c++", "industry 4.0"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        FilterPolicy::new(&cfg, &kw).unwrap()
    }

    fn lenient() -> FilterConfig {
        FilterConfig { min_text_chars: 0, ..FilterConfig::default() }
    }

    fn article(text: &str, published_at: Option<DateTime<Utc>>) -> NormalizedArticle {
        NormalizedArticle {
            title: "Plant update".into(),
            url: "https://example.com/a".into(),
            published_at,
            text: text.into(),
        }
    }

    #[test]
    fn max_age_boundary_is_inclusive() {
        let p = policy(lenient());
        let exactly = article("AI on the line", Some(now() - Duration::days(7)));
        let just_over = article("AI on the line", Some(now() - Duration::days(7) - Duration::seconds(1)));
        assert!(p.accept(&exactly, now()));
        assert!(!p.accept(&just_over, now()));
        assert_eq!(p.check(&just_over, now()), Err(Rejection::Stale));
    }

    #[test]
    fn future_dates_are_fresh() {
        let p = policy(lenient());
        assert!(p.accept(&article("AI", Some(now() + Duration::hours(3))), now()));
    }

    #[test]
    fn unknown_date_follows_policy() {
        let accept = policy(lenient());
        let reject = policy(FilterConfig { unknown_date: UnknownDatePolicy::Reject, ..lenient() });
        let a = article("AI for welding", None);
        assert!(accept.accept(&a, now()));
        assert_eq!(reject.check(&a, now()), Err(Rejection::Stale));
    }

    #[test]
    fn irrelevant_regardless_of_freshness() {
        let p = policy(lenient());
        let fresh = article("Quarterly earnings call recap", Some(now()));
        assert_eq!(p.check(&fresh, now()), Err(Rejection::Irrelevant));
        assert!(!p.accept(&fresh, now()));
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let p = policy(lenient());
        assert!(p.is_relevant(&article("PREDICTIVE Maintenance cuts downtime", None)));
        assert!(p.is_relevant(&article("Adopting Industry 4.0 playbooks", None)));
        assert!(p.is_relevant(&article("Rewriting the PLC bridge in C++.", None)));
    }

    #[test]
    fn title_counts_toward_relevance() {
        let p = policy(lenient());
        let mut a = article("nothing relevant in the body", None);
        a.title = "How AI spots defects".into();
        assert!(p.is_relevant(&a));
    }

    #[test]
    fn whole_word_vs_substring() {
        let word = policy(lenient());
        let sub = policy(FilterConfig { keyword_match: KeywordMatch::Substring, ..lenient() });
        let a = article("The CEO said margins improved", None);
        assert!(!word.is_relevant(&a));
        assert!(sub.is_relevant(&a));
    }

    #[test]
    fn short_text_rejected_first() {
        let p = policy(FilterConfig::default());
        let a = article("AI", Some(now() - Duration::days(30)));
        assert_eq!(p.check(&a, now()), Err(Rejection::TooShort));
        let long = article(&format!("AI {}", "x".repeat(300)), Some(now()));
        assert!(p.accept(&long, now()));
    }

    #[test]
    fn no_keywords_rejects_everything() {
        let p = FilterPolicy::new(&lenient(), &[]).unwrap();
        assert!(!p.is_relevant(&article("AI robots everywhere", None)));
    }

    #[test]
    fn max_age_override() {
        let p = policy(lenient()).with_max_age(Duration::days(1));
        assert!(p.accept(&article("AI", Some(now() - Duration::hours(23))), now()));
        assert!(!p.accept(&article("AI", Some(now() - Duration::days(2))), now()));
    }

    #[test]
    fn plurals_match_whole_word_keywords() {
        let cfg = crate::config::DigestConfig::default();
        let p = FilterPolicy::new(&cfg.filter, &cfg.keywords).unwrap();
        let mut a = article("Two new cobots now sand car bodies.", None);
        a.title = "Cobots and robots join the paint line".into();
        assert!(p.is_relevant(&a));

        let local = policy(lenient());
        assert!(local.is_relevant(&article("Three AIs reviewed the weld logs", None)));
        assert!(!local.is_relevant(&article("The CEO said margins improved", None)));
        assert!(!local.is_relevant(&article("Airline fleet news", None)));
    }
}
