//! Concrete upstream news providers.
//!
//! Each provider maps a category slug onto its own query syntax, calls its
//! upstream, and normalises the response into [`Candidate`] values.

pub mod cloud_rss;
pub mod gnews;
pub mod google_rss;
pub mod newsapi;
pub mod newsdata;

pub use cloud_rss::CloudRssProvider;
pub use gnews::GNewsProvider;
pub use google_rss::GoogleRssProvider;
pub use newsapi::NewsApiProvider;
pub use newsdata::NewsDataProvider;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::types::{Candidate, Topic};

/// Resolve the upstream query for a topic.
///
/// Categories missing from `table` are passed through verbatim, with
/// hyphens read as spaces.
pub(crate) fn topic_query(table: &[(&str, &str)], topic: &Topic) -> String {
    match topic {
        Topic::Category(slug) => table
            .iter()
            .find(|(key, _)| key == slug)
            .map(|(_, query)| (*query).to_owned())
            .unwrap_or_else(|| slug.replace('-', " ")),
        Topic::Query(text) => text.trim().to_owned(),
    }
}

/// Parse the timestamp formats upstreams use.
///
/// Accepts RFC 3339, RFC 2822 (RSS), and the naive `YYYY-MM-DD HH:MM:SS`
/// form read as UTC. Anything else yields `fallback`, the fetch time.
pub(crate) fn parse_timestamp(raw: Option<&str>, fallback: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return fallback;
    };
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return ts.with_timezone(&Utc);
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(raw) {
        return ts.with_timezone(&Utc);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return ts.and_utc();
    }
    tracing::debug!(raw, "unparseable upstream timestamp, using fetch time");
    fallback
}

/// Build a candidate from loosely-typed upstream fields.
///
/// Items without a title or URL are dropped.
pub(crate) fn build_candidate(
    title: Option<String>,
    url: Option<String>,
    published_at: DateTime<Utc>,
    topic: &Topic,
    source: Option<String>,
    provider: &str,
) -> Option<Candidate> {
    let title = title.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty())?;
    let url = url.map(|u| u.trim().to_owned()).filter(|u| !u.is_empty())?;
    let source = source
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| provider.to_owned());
    Some(
        Candidate::new(title, url, published_at)
            .with_category(topic.category_label())
            .with_source(source),
    )
}

/// Longest feed description kept, in characters.
pub(crate) const MAX_DESCRIPTION_CHARS: usize = 200;

/// Plain-text summary of an HTML feed description: tags dropped,
/// whitespace collapsed, cut to [`MAX_DESCRIPTION_CHARS`] with `...`.
pub(crate) fn summarize_description(raw: &str) -> Option<String> {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    let clean = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.is_empty() {
        return None;
    }
    if clean.chars().count() <= MAX_DESCRIPTION_CHARS {
        return Some(clean);
    }
    let truncated: String = clean.chars().take(MAX_DESCRIPTION_CHARS).collect();
    Some(format!("{}...", truncated.trim_end()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TABLE: &[(&str, &str)] = &[("ai", "artificial intelligence")];

    fn fallback() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn known_category_uses_table() {
        assert_eq!(
            topic_query(TABLE, &Topic::Category("ai".into())),
            "artificial intelligence"
        );
    }

    #[test]
    fn unknown_category_passes_through() {
        assert_eq!(
            topic_query(TABLE, &Topic::Category("quantum-computing".into())),
            "quantum computing"
        );
    }

    #[test]
    fn free_text_is_trimmed() {
        assert_eq!(topic_query(TABLE, &Topic::Query("  rust async ".into())), "rust async");
    }

    #[test]
    fn parses_rfc3339() {
        let ts = parse_timestamp(Some("2025-03-01T10:30:00Z"), fallback());
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap());
    }

    #[test]
    fn parses_rfc2822() {
        let ts = parse_timestamp(Some("Sat, 01 Mar 2025 10:30:00 GMT"), fallback());
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap());
    }

    #[test]
    fn parses_naive_utc() {
        let ts = parse_timestamp(Some("2025-03-01 10:30:00"), fallback());
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 3, 1, 10, 30, 0).unwrap());
    }

    #[test]
    fn garbage_and_missing_fall_back() {
        assert_eq!(parse_timestamp(Some("yesterday"), fallback()), fallback());
        assert_eq!(parse_timestamp(None, fallback()), fallback());
        assert_eq!(parse_timestamp(Some("  "), fallback()), fallback());
    }

    #[test]
    fn build_candidate_requires_title_and_url() {
        let topic = Topic::Category("ai".into());
        let url = || Some("https://a.com".to_owned());
        assert!(build_candidate(None, url(), fallback(), &topic, None, "p").is_none());
        let blank_url = Some(" ".to_owned());
        let built = build_candidate(Some("T".into()), blank_url, fallback(), &topic, None, "p");
        assert!(built.is_none());

        let c = build_candidate(Some(" T ".into()), url(), fallback(), &topic, None, "gnews")
            .unwrap();
        assert_eq!(c.title, "T");
        assert_eq!(c.source, "gnews");
        assert_eq!(c.category, "ai");
    }

    #[test]
    fn description_drops_markup_and_collapses_space() {
        let raw = "<p>New <b>Graviton</b>\n  instances.</p><img src=\"x.png\"/>";
        assert_eq!(summarize_description(raw).unwrap(), "New Graviton instances.");
        assert!(summarize_description("<br/> ").is_none());
    }

    #[test]
    fn long_description_is_cut_with_ellipsis() {
        let raw = "word ".repeat(100);
        let summary = summarize_description(&raw).unwrap();
        assert!(summary.ends_with("..."));
        assert!(summary.chars().count() <= MAX_DESCRIPTION_CHARS + 3);
    }
}
