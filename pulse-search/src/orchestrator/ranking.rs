//! Relevance, recency and engagement scoring.
//!
//! # Scoring Formula
//!
//! ```text
//! relevance        = 1 / (distance + 1e-6)        (1.0 when there is no distance)
//! hours_elapsed    = max(now - published_at, 0) in hours
//! time_decay       = 1 / (1 + decay_factor * hours_elapsed)
//! engagement_boost = 1 + boost_factor * ln(1 + likes + views / 10)
//! final_score      = relevance * time_decay * engagement_boost
//! ```
//!
//! `final_score` depends only on `(distance, published_at, likes, views, now)`
//! and the two factors. Ties are broken by newer `published_at` first, then
//! by dedup key ascending, so the output order is a total order.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::types::{Candidate, RankedResult};

/// Guards `1 / distance` against a zero distance.
pub const RELEVANCE_EPSILON: f64 = 1e-6;

pub const DEFAULT_DECAY_FACTOR: f64 = 0.1;
pub const DEFAULT_BOOST_FACTOR: f64 = 0.05;

/// Decay and boost factors, clamped into `[0, 1]` on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingParams {
    decay_factor: f64,
    boost_factor: f64,
}

impl Default for RankingParams {
    fn default() -> Self {
        Self {
            decay_factor: DEFAULT_DECAY_FACTOR,
            boost_factor: DEFAULT_BOOST_FACTOR,
        }
    }
}

impl RankingParams {
    /// Out-of-range factors are clamped; non-finite ones fall back to the defaults.
    pub fn new(decay_factor: f64, boost_factor: f64) -> Self {
        Self {
            decay_factor: clamp_unit(decay_factor, DEFAULT_DECAY_FACTOR),
            boost_factor: clamp_unit(boost_factor, DEFAULT_BOOST_FACTOR),
        }
    }

    pub fn decay_factor(&self) -> f64 {
        self.decay_factor
    }

    pub fn boost_factor(&self) -> f64 {
        self.boost_factor
    }

    /// Same boost, different decay (the per-request knob).
    pub fn with_decay(self, decay_factor: f64) -> Self {
        Self::new(decay_factor, self.boost_factor)
    }
}

fn clamp_unit(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

/// Hours between `published_at` and `now`, never negative.
pub fn hours_elapsed(published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - published_at).num_milliseconds().max(0);
    millis as f64 / 3_600_000.0
}

/// Relevance from a raw distance; candidates without one score 1.0.
pub fn relevance(distance: Option<f64>) -> f64 {
    match distance {
        Some(d) if d.is_finite() => 1.0 / (d.max(0.0) + RELEVANCE_EPSILON),
        Some(_) => 0.0,
        None => 1.0,
    }
}

pub fn time_decay(hours: f64, decay_factor: f64) -> f64 {
    1.0 / (1.0 + decay_factor * hours)
}

pub fn engagement_boost(likes: u64, views: u64, boost_factor: f64) -> f64 {
    let signal = 1.0 + likes as f64 + views as f64 / 10.0;
    1.0 + boost_factor * signal.ln()
}

/// Score a single candidate.
pub fn score(candidate: Candidate, now: DateTime<Utc>, params: RankingParams) -> RankedResult {
    let relevance = relevance(candidate.distance);
    let time_decay = time_decay(
        hours_elapsed(candidate.published_at, now),
        params.decay_factor,
    );
    let engagement_boost = engagement_boost(candidate.likes, candidate.views, params.boost_factor);
    let final_score = relevance * time_decay * engagement_boost;

    RankedResult {
        candidate,
        relevance,
        time_decay,
        engagement_boost,
        final_score,
    }
}

/// Score every candidate and sort by descending `final_score`.
pub fn rank(
    candidates: Vec<Candidate>,
    now: DateTime<Utc>,
    params: RankingParams,
) -> Vec<RankedResult> {
    let mut ranked: Vec<RankedResult> = candidates
        .into_iter()
        .map(|candidate| score(candidate, now, params))
        .collect();
    ranked.sort_by(compare_ranked);
    ranked
}

/// Total order: final score desc, then published_at desc, then dedup key asc.
pub fn compare_ranked(a: &RankedResult, b: &RankedResult) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| b.candidate.published_at.cmp(&a.candidate.published_at))
        .then_with(|| a.candidate.dedup_key.cmp(&b.candidate.dedup_key))
}
