//! Fetch pipeline: provider failover, dedup, ranking, assembly.
//!
//! [`failover`] picks one healthy upstream per request. The remaining
//! stages are pure functions over candidate lists: [`dedup`] collapses
//! repeated URLs, [`ranking`] scores and orders, and [`assemble`] shapes the
//! outgoing payload.

pub mod assemble;
pub mod dedup;
pub mod failover;
pub mod ranking;
pub mod url_normalize;

pub use assemble::{assemble, AssembledResult};
pub use dedup::dedupe;
pub use failover::{FailoverOrchestrator, FailoverStats, FetchOutcome, ProviderUsage};
pub use ranking::{rank, RankingParams};
