//! Candidate deduplication by dedup key.
//!
//! Runs after provider aggregation and after over-fetched vector search,
//! before ranking, so no score is ever computed for a duplicate.

use std::collections::HashMap;

use crate::types::Candidate;

/// Collapse candidates sharing a dedup key.
///
/// Output order is first-seen order. For each key the occurrence with the
/// lowest distance is kept; when distances are absent or equal the first
/// occurrence (the higher-priority source) wins.
pub fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut slots: HashMap<String, usize> = HashMap::with_capacity(candidates.len());
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match slots.get(&candidate.dedup_key) {
            Some(&index) => {
                if is_closer(&candidate, &kept[index]) {
                    kept[index] = candidate;
                }
            }
            None => {
                slots.insert(candidate.dedup_key.clone(), kept.len());
                kept.push(candidate);
            }
        }
    }

    kept
}

fn is_closer(challenger: &Candidate, incumbent: &Candidate) -> bool {
    match (challenger.distance, incumbent.distance) {
        (Some(new), Some(old)) => new < old,
        (Some(_), None) => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::HashSet;

    fn make_candidate(url: &str, source: &str) -> Candidate {
        let published = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        Candidate::new(format!("Title from {source}"), url, published).with_source(source)
    }

    #[test]
    fn unique_urls_pass_through_in_order() {
        let deduped = dedupe(vec![
            make_candidate("https://b.com/x", "gnews"),
            make_candidate("https://a.com/y", "gnews"),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].url, "https://b.com/x");
        assert_eq!(deduped[1].url, "https://a.com/y");
    }

    #[test]
    fn first_seen_wins_without_distances() {
        let deduped = dedupe(vec![
            make_candidate("https://example.com/page", "gnews"),
            make_candidate("https://www.example.com/page/?utm_source=rss", "newsapi"),
        ]);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].source, "gnews");
    }

    #[test]
    fn lowest_distance_kept_at_first_position() {
        let deduped = dedupe(vec![
            make_candidate("https://a.com/1", "index").with_distance(0.40),
            make_candidate("https://b.com/2", "index").with_distance(0.20),
            make_candidate("https://a.com/1?fbclid=z", "index").with_distance(0.10),
        ]);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].distance, Some(0.10));
        assert_eq!(deduped[0].url, "https://a.com/1?fbclid=z");
        assert_eq!(deduped[1].url, "https://b.com/2");
    }

    #[test]
    fn equal_distance_keeps_first() {
        let deduped = dedupe(vec![
            make_candidate("https://a.com/1", "first").with_distance(0.3),
            make_candidate("https://a.com/1", "second").with_distance(0.3),
        ]);
        assert_eq!(deduped[0].source, "first");
    }

    #[test]
    fn empty_input_returns_empty() {
        assert!(dedupe(vec![]).is_empty());
    }

    #[test]
    fn output_keys_are_unique() {
        let input: Vec<Candidate> = (0..30)
            .map(|i| make_candidate(&format!("https://site{}.com/story", i % 7), "gnews"))
            .collect();
        let deduped = dedupe(input);
        let keys: HashSet<_> = deduped.iter().map(|c| c.dedup_key.clone()).collect();
        assert_eq!(keys.len(), deduped.len());
        assert_eq!(deduped.len(), 7);
    }
}
