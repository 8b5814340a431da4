use std::collections::HashMap;

use analysis_core::{AgentResult, AgentSignal, Confidence};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Weight used for an agent that has no entry in the weight map.
pub const FALLBACK_WEIGHT: f64 = 0.1;

/// Number of signals surfaced in `key_signals`
pub const KEY_SIGNAL_LIMIT: usize = 10;

/// One agent's contribution to an aggregated analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentBreakdown {
    pub agent: String,
    pub score: f64,
    pub confidence: Confidence,
    pub weight: f64,
    pub reasoning: String,
    #[serde(default)]
    pub signals: Vec<AgentSignal>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AgentBreakdown {
    /// Weight 0 agents are reported but never blended
    pub fn is_utility(&self) -> bool {
        self.weight <= 0.0
    }
}

/// A signal tagged with the agent that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedSignal {
    pub agent: String,
    #[serde(flatten)]
    pub signal: AgentSignal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedAnalysis {
    pub symbol: String,
    pub blend_score: f64,
    pub confidence: Confidence,
    /// Coarse label from the blend score alone
    pub recommendation: String,
    pub agent_count: usize,
    /// Scoring agents first, then utility agents
    pub agents: Vec<AgentBreakdown>,
    pub key_signals: Vec<TaggedSignal>,
    pub timestamp: DateTime<Utc>,
}

impl AggregatedAnalysis {
    pub fn agent(&self, name: &str) -> Option<&AgentBreakdown> {
        self.agents.iter().find(|a| a.agent == name)
    }
}

/// Weight lookup shared by blending and confidence.
pub fn weight_for(weights: &HashMap<String, f64>, agent: &str) -> f64 {
    weights.get(agent).copied().unwrap_or(FALLBACK_WEIGHT)
}

pub fn recommendation_label(blend_score: f64) -> &'static str {
    if blend_score >= 70.0 {
        "Strong Buy"
    } else if blend_score >= 60.0 {
        "Buy"
    } else if blend_score >= 50.0 {
        "Hold"
    } else if blend_score >= 40.0 {
        "Sell"
    } else {
        "Strong Sell"
    }
}

/// Blend agent results for one symbol. `results` must be in registration order.
///
/// The blend is the weighted mean of the scoring agents that succeeded,
/// rescaled by the sum of positive configured weights so that a full weight
/// map summing to 1.0 leaves it untouched.
pub fn aggregate(symbol: &str, results: Vec<AgentResult>, weights: &HashMap<String, f64>) -> AggregatedAnalysis {
    let mut scoring = Vec::new();
    let mut utility = Vec::new();
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    let mut key_signals = Vec::new();

    for result in results {
        let weight = weight_for(weights, &result.agent_type);
        for signal in &result.signals {
            if key_signals.len() < KEY_SIGNAL_LIMIT {
                key_signals.push(TaggedSignal {
                    agent: result.agent_type.clone(),
                    signal: signal.clone(),
                });
            }
        }

        let breakdown = AgentBreakdown {
            agent: result.agent_type,
            score: result.score,
            confidence: result.confidence,
            weight,
            reasoning: result.reasoning,
            signals: result.signals,
            metadata: result.metadata,
        };
        if weight > 0.0 {
            weighted += breakdown.score * weight;
            total_weight += weight;
            scoring.push(breakdown);
        } else {
            utility.push(breakdown);
        }
    }

    let blend_score = if total_weight > 0.0 {
        let configured: f64 = weights.values().filter(|w| **w > 0.0).sum();
        let scale = if configured > 0.0 { configured } else { 1.0 };
        weighted / total_weight * scale
    } else {
        0.0
    };
    let blend_score = (blend_score * 100.0).round() / 100.0;

    let confidence = if scoring.is_empty() {
        Confidence::Low
    } else {
        let levels: f64 = scoring.iter().map(|a| a.confidence.level() as f64).sum();
        Confidence::from_average_level(levels / scoring.len() as f64)
    };

    let agent_count = scoring.len() + utility.len();
    let mut agents = scoring;
    agents.extend(utility);

    AggregatedAnalysis {
        symbol: symbol.to_string(),
        blend_score,
        confidence,
        recommendation: recommendation_label(blend_score).to_string(),
        agent_count,
        agents,
        key_signals,
        timestamp: Utc::now(),
    }
}
