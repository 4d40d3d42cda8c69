//! treatmap-ingestion: Rate-limited PubTator3 fetch client.
//! - Entity autocomplete resolution
//! - Relation lookup ranked by publication count
//! - Paginated relation-evidence search
//!
//! Every call goes through one shared rate gate and a bounded retry policy.

pub mod models;
pub mod pubtator;
pub mod rate_gate;
pub mod retry;

pub use models::{Related, Resolution, SearchHit, SearchResults};
pub use pubtator::PubTatorClient;
