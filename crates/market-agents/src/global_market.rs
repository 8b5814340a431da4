use std::sync::Arc;

use analysis_core::{
    confidence_for, stats, Agent, AgentContext, AgentResult, AgentSignal, AnalysisError, MarketDataProvider,
};
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use crate::round2;

pub const NAME: &str = "global";

const LOOKBACK: usize = 20;

/// Scores a symbol against the broad market: its relative strength over the
/// benchmark index and the index's own direction.
pub struct GlobalMarketAgent {
    provider: Arc<dyn MarketDataProvider>,
    benchmark: String,
}

impl GlobalMarketAgent {
    pub fn new(provider: Arc<dyn MarketDataProvider>, benchmark: &str) -> Self {
        Self {
            provider,
            benchmark: benchmark.to_uppercase(),
        }
    }
}

/// Outperformance in percentage points over the lookback
pub(crate) fn relative_strength_score(spread: f64) -> (f64, &'static str) {
    if spread > 5.0 {
        (80.0, "Strong Positive")
    } else if spread > 1.0 {
        (65.0, "Positive")
    } else if spread > -1.0 {
        (50.0, "Neutral")
    } else if spread > -5.0 {
        (35.0, "Negative")
    } else {
        (20.0, "Strong Negative")
    }
}

pub(crate) fn market_trend_score(change: f64) -> (f64, &'static str) {
    if change > 3.0 {
        (70.0, "Bullish")
    } else if change > 0.0 {
        (58.0, "Positive")
    } else if change > -3.0 {
        (42.0, "Negative")
    } else {
        (30.0, "Bearish")
    }
}

/// Caller-supplied global sentiment shifts the score by at most 5 points
pub(crate) fn sentiment_nudge(sentiment: Option<&str>) -> f64 {
    match sentiment.map(|s| s.to_lowercase()) {
        Some(s) if matches!(s.as_str(), "bullish" | "positive" | "risk-on" | "risk_on") => 5.0,
        Some(s) if matches!(s.as_str(), "bearish" | "negative" | "risk-off" | "risk_off") => -5.0,
        _ => 0.0,
    }
}

#[async_trait]
impl Agent for GlobalMarketAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn analyze(&self, symbol: &str, context: &AgentContext) -> Result<AgentResult, AnalysisError> {
        let bars = self.provider.fetch_bars(symbol, LOOKBACK + 1).await?;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let Some(own_change) = stats::rate_of_change(&closes, LOOKBACK) else {
            return Ok(AgentResult::insufficient_data(NAME, symbol, &format!("{} bars", bars.len())));
        };

        let bench_change = if symbol.eq_ignore_ascii_case(&self.benchmark) {
            Some(own_change)
        } else {
            match self.provider.fetch_bars(&self.benchmark, LOOKBACK + 1).await {
                Ok(bench) => {
                    let closes: Vec<f64> = bench.iter().map(|b| b.close).collect();
                    stats::rate_of_change(&closes, LOOKBACK)
                }
                Err(e) => {
                    warn!(benchmark = %self.benchmark, error = %e, "benchmark unavailable");
                    None
                }
            }
        };
        let Some(bench_change) = bench_change else {
            return Ok(AgentResult::insufficient_data(NAME, symbol, "benchmark history"));
        };

        let spread = own_change - bench_change;
        let (rs_score, rs_label) = relative_strength_score(spread);
        let (trend_score, trend_label) = market_trend_score(bench_change);
        let sentiment = context.global_sentiment();
        let nudge = sentiment_nudge(sentiment);
        let score = rs_score * 0.6 + trend_score * 0.4 + nudge;

        let mut signals = vec![
            AgentSignal::new("RELATIVE_STRENGTH", format!("{spread:+.2}% vs {}", self.benchmark), rs_label),
            AgentSignal::new("MARKET_TREND", format!("{} {bench_change:+.2}%", self.benchmark), trend_label),
        ];
        if let Some(s) = sentiment {
            signals.push(AgentSignal::new("GLOBAL_SENTIMENT", s, s));
        }
        let confidence = confidence_for(score, signals.len());

        let reasoning = format!(
            "{symbol} {} the {} by {:.2} points over {LOOKBACK} sessions while the index moved {bench_change:+.2}%",
            if spread >= 0.0 { "outperformed" } else { "underperformed" },
            self.benchmark,
            spread.abs()
        );

        Ok(AgentResult::new(NAME, symbol, score, confidence, signals, reasoning).with_metadata(json!({
            "benchmark": self.benchmark,
            "symbol_change_pct": round2(own_change),
            "benchmark_change_pct": round2(bench_change),
            "relative_strength": round2(spread),
            "sentiment": sentiment.unwrap_or("neutral"),
        })))
    }
}
