//! Global score cache shared across index universes.
//!
//! Every symbol is scored once by the agent coordinator and the result is
//! reused by every universe that contains it, so two symbols keep the same
//! relative order in every top picks list they appear in.

pub mod error;
pub mod recommendation;
pub mod snapshot;
pub mod store;
pub mod universe;

pub use error::StoreError;
pub use recommendation::{
    calculate_risk_reward_ratio, display_text, filter_actionable, get_recommendation, ColorScheme, Recommendation,
    RecommendationResult, RiskInputs,
};
pub use snapshot::ScoreSnapshot;
pub use store::{
    rank_order, verify_consistency, GlobalScoreStore, Inconsistency, RankedPick, RefreshMode, RefreshSummary,
    ScoreRecord, StoreConfig, TopPicks, TopPicksQuery, UniversePicks,
};
pub use universe::UniverseRegistry;
