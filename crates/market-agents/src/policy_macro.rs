use std::collections::BTreeMap;
use std::sync::Arc;

use analysis_core::{Agent, AgentContext, AgentResult, AgentSignal, AnalysisError, Confidence, MarketDataProvider};
use async_trait::async_trait;
use serde_json::json;

use crate::round2;
use crate::sentiment::recency_weight;

pub const NAME: &str = "policy";

const NEWS_LIMIT: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum PolicyCategory {
    Monetary,
    Fiscal,
    Trade,
    Regulatory,
    Corporate,
    Macro,
}

/// (category, phrase, impact in [-1, 1])
const POLICY_RULES: &[(PolicyCategory, &str, f64)] = &[
    (PolicyCategory::Monetary, "rate cut", 0.8),
    (PolicyCategory::Monetary, "cuts repo", 0.8),
    (PolicyCategory::Monetary, "rate hike", -0.8),
    (PolicyCategory::Monetary, "hikes repo", -0.8),
    (PolicyCategory::Monetary, "accommodative", 0.5),
    (PolicyCategory::Monetary, "hawkish", -0.5),
    (PolicyCategory::Monetary, "liquidity infusion", 0.5),
    (PolicyCategory::Fiscal, "stimulus", 0.7),
    (PolicyCategory::Fiscal, "subsidy", 0.4),
    (PolicyCategory::Fiscal, "pli scheme", 0.6),
    (PolicyCategory::Fiscal, "tax cut", 0.6),
    (PolicyCategory::Fiscal, "capex push", 0.5),
    (PolicyCategory::Fiscal, "windfall tax", -0.7),
    (PolicyCategory::Fiscal, "tax hike", -0.6),
    (PolicyCategory::Trade, "tariff", -0.6),
    (PolicyCategory::Trade, "export ban", -0.8),
    (PolicyCategory::Trade, "import duty", -0.4),
    (PolicyCategory::Trade, "trade deal", 0.6),
    (PolicyCategory::Trade, "sanction", -0.6),
    (PolicyCategory::Regulatory, "ban", -0.7),
    (PolicyCategory::Regulatory, "penalty", -0.5),
    (PolicyCategory::Regulatory, "approval", 0.5),
    (PolicyCategory::Regulatory, "deregulat", 0.5),
    (PolicyCategory::Corporate, "buyback", 0.6),
    (PolicyCategory::Corporate, "dividend", 0.4),
    (PolicyCategory::Corporate, "bonus issue", 0.4),
    (PolicyCategory::Corporate, "stock split", 0.3),
    (PolicyCategory::Macro, "inflation eases", 0.5),
    (PolicyCategory::Macro, "inflation rises", -0.5),
    (PolicyCategory::Macro, "gdp growth", 0.4),
    (PolicyCategory::Macro, "slowdown", -0.5),
    (PolicyCategory::Macro, "recession", -0.8),
];

/// Total impact and categories hit for one headline. Each phrase counts once.
pub(crate) fn classify_policy(text: &str) -> Option<(f64, Vec<PolicyCategory>)> {
    let mut impact = 0.0;
    let mut categories = Vec::new();
    for (category, phrase, weight) in POLICY_RULES {
        if text.contains(phrase) {
            impact += weight;
            if !categories.contains(category) {
                categories.push(*category);
            }
        }
    }
    (!categories.is_empty()).then(|| (impact.clamp(-1.0, 1.0), categories))
}

/// Headlines from the context's `policy_events`: strings or objects with a `title`.
fn context_events(context: &AgentContext) -> Vec<String> {
    context
        .policy_events
        .as_ref()
        .and_then(|v| v.get("events").or(Some(v)))
        .and_then(|v| v.as_array())
        .map(|events| {
            events
                .iter()
                .filter_map(|e| e.as_str().or_else(|| e.get("title").and_then(|t| t.as_str())))
                .map(|s| s.to_lowercase())
                .collect()
        })
        .unwrap_or_default()
}

/// Policy and macro headline impact.
pub struct PolicyMacroAgent {
    provider: Arc<dyn MarketDataProvider>,
}

impl PolicyMacroAgent {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Agent for PolicyMacroAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn analyze(&self, symbol: &str, context: &AgentContext) -> Result<AgentResult, AnalysisError> {
        let news = self.provider.fetch_news(symbol, NEWS_LIMIT).await?;
        let now = context.analysis_time;

        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        let mut by_category: BTreeMap<PolicyCategory, (usize, f64)> = BTreeMap::new();
        let mut tailwinds = Vec::new();
        let mut headwinds = Vec::new();

        let headlines = news
            .iter()
            .map(|a| (a.text(), recency_weight(a.published_utc, now), a.title.clone()))
            .chain(context_events(context).into_iter().map(|t| (t.clone(), 1.0, t)));

        for (text, weight, title) in headlines {
            let Some((impact, categories)) = classify_policy(&text) else {
                continue;
            };
            weighted += impact * weight;
            total_weight += weight;
            for category in categories {
                let entry = by_category.entry(category).or_default();
                entry.0 += 1;
                entry.1 += impact;
            }
            if impact > 0.0 {
                tailwinds.push(title);
            } else if impact < 0.0 {
                headwinds.push(title);
            }
        }

        if total_weight == 0.0 {
            return Ok(AgentResult::new(
                NAME,
                symbol,
                50.0,
                Confidence::Low,
                vec![],
                "No policy or macro events affecting the symbol",
            ));
        }

        let net = (weighted / total_weight).clamp(-1.0, 1.0);
        let score = 50.0 + 40.0 * net;
        let signals: Vec<AgentSignal> = by_category
            .iter()
            .map(|(category, (count, impact))| {
                let label = if *impact > 0.0 {
                    "Positive"
                } else if *impact < 0.0 {
                    "Negative"
                } else {
                    "Neutral"
                };
                AgentSignal::new(format!("{category:?}").to_uppercase(), format!("{count} events"), label)
            })
            .collect();

        let matched = tailwinds.len() + headwinds.len();
        let confidence = if matched >= 3 && net.abs() >= 0.4 {
            Confidence::High
        } else if matched >= 2 {
            Confidence::Medium
        } else {
            Confidence::Low
        };
        let reasoning = format!(
            "{} tailwinds and {} headwinds from policy and macro news (net impact {net:+.2})",
            tailwinds.len(),
            headwinds.len()
        );

        Ok(AgentResult::new(NAME, symbol, score, confidence, signals, reasoning).with_metadata(json!({
            "net_impact": round2(net),
            "policy_tailwinds": tailwinds.into_iter().take(5).collect::<Vec<_>>(),
            "policy_headwinds": headwinds.into_iter().take(5).collect::<Vec<_>>(),
        })))
    }
}
