//! Heuristic scoring agents. Each one reads market data through a
//! [`MarketDataProvider`] and returns a 0-100 score with signals.

use std::collections::HashMap;
use std::sync::Arc;

use analysis_core::{Agent, MarketDataProvider};

pub mod global_market;
pub mod memory;
pub mod microstructure;
pub mod pattern;
pub mod policy_macro;
pub mod regime;
pub mod risk;
pub mod sentiment;
pub mod technical;

#[cfg(test)]
mod test_support;

pub use global_market::GlobalMarketAgent;
pub use memory::InMemoryMarketData;
pub use microstructure::MicrostructureAgent;
pub use pattern::PatternAgent;
pub use policy_macro::PolicyMacroAgent;
pub use regime::RegimeAgent;
pub use risk::RiskAgent;
pub use sentiment::SentimentAgent;
pub use technical::TechnicalAgent;

/// Default blend weights for the scoring agents (sum to 1.0)
pub const DEFAULT_WEIGHTS: &[(&str, f64)] = &[
    (technical::NAME, 0.25),
    (global_market::NAME, 0.12),
    (policy_macro::NAME, 0.08),
    (sentiment::NAME, 0.15),
    (microstructure::NAME, 0.10),
    (risk::NAME, 0.10),
    (pattern::NAME, 0.12),
    (regime::NAME, 0.08),
];

pub fn default_weights() -> HashMap<String, f64> {
    DEFAULT_WEIGHTS
        .iter()
        .map(|(name, w)| (name.to_string(), *w))
        .collect()
}

/// The full scoring agent set, sharing one provider. `benchmark` is the index
/// symbol used for beta and relative strength.
pub fn default_agents(provider: Arc<dyn MarketDataProvider>, benchmark: &str) -> Vec<Arc<dyn Agent>> {
    vec![
        Arc::new(TechnicalAgent::new(Arc::clone(&provider))),
        Arc::new(GlobalMarketAgent::new(Arc::clone(&provider), benchmark)),
        Arc::new(PolicyMacroAgent::new(Arc::clone(&provider))),
        Arc::new(SentimentAgent::new(Arc::clone(&provider))),
        Arc::new(MicrostructureAgent::new(Arc::clone(&provider))),
        Arc::new(RiskAgent::new(Arc::clone(&provider), benchmark)),
        Arc::new(PatternAgent::new(Arc::clone(&provider))),
        Arc::new(RegimeAgent::new(provider)),
    ]
}

/// Round to 2 decimals for metadata output
pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let total: f64 = DEFAULT_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_agents_cover_weights() {
        let provider: Arc<dyn MarketDataProvider> = Arc::new(InMemoryMarketData::new());
        let agents = default_agents(provider, "NIFTY50");
        let weights = default_weights();
        assert_eq!(agents.len(), weights.len());
        for agent in agents {
            assert!(weights.contains_key(agent.name()), "{} has no weight", agent.name());
        }
    }
}
