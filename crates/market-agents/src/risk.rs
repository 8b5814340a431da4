use std::sync::Arc;

use analysis_core::{
    confidence_for, stats, Agent, AgentContext, AgentResult, AgentSignal, AnalysisError, Bar, MarketDataProvider,
};
use async_trait::async_trait;
use serde_json::json;
use technical_analysis::atr;
use tracing::warn;

use crate::round2;

pub const NAME: &str = "risk";

const HISTORY_DAYS: usize = 60;
const MIN_BARS: usize = 20;

/// Volatility and beta risk scorer with stop-loss and position sizing.
/// Low risk scores high.
pub struct RiskAgent {
    provider: Arc<dyn MarketDataProvider>,
    benchmark: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionSize {
    pub quantity: u64,
    pub position_value: f64,
    pub risk_amount: f64,
    pub position_pct: f64,
}

impl RiskAgent {
    pub fn new(provider: Arc<dyn MarketDataProvider>, benchmark: &str) -> Self {
        Self {
            provider,
            benchmark: benchmark.to_uppercase(),
        }
    }

    async fn beta(&self, symbol: &str, closes: &[f64]) -> Option<f64> {
        if symbol.eq_ignore_ascii_case(&self.benchmark) {
            return Some(1.0);
        }
        match self.provider.fetch_bars(&self.benchmark, HISTORY_DAYS).await {
            Ok(bench) => {
                let bench: Vec<f64> = bench.iter().map(|b| b.close).collect();
                stats::beta(&stats::returns(closes), &stats::returns(&bench))
            }
            Err(e) => {
                warn!(benchmark = %self.benchmark, error = %e, "benchmark unavailable, beta unknown");
                None
            }
        }
    }
}

pub(crate) fn volatility_score(volatility: f64) -> f64 {
    if volatility > 40.0 {
        35.0
    } else if volatility < 20.0 {
        70.0
    } else {
        55.0
    }
}

pub(crate) fn beta_score(beta: Option<f64>) -> f64 {
    match beta {
        Some(b) if b > 1.3 => 40.0,
        Some(b) if b < 0.7 => 65.0,
        _ => 55.0,
    }
}

/// Tighter of a 2·ATR stop and 2% under the 20-bar low.
pub fn stop_loss(bars: &[Bar], entry: f64, atr: f64) -> f64 {
    let recent = &bars[bars.len().saturating_sub(20)..];
    let low = recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let atr_stop = entry - 2.0 * atr;
    if low.is_finite() {
        atr_stop.max(low * 0.98)
    } else {
        atr_stop
    }
}

/// Shares such that hitting the stop loses `portfolio · risk_per_trade`.
pub fn position_size(entry: f64, stop: f64, portfolio: f64, risk_per_trade: f64) -> PositionSize {
    let risk_amount = portfolio * risk_per_trade;
    let per_share = entry - stop;
    let quantity = if per_share > 0.0 { (risk_amount / per_share).floor() as u64 } else { 0 };
    let position_value = quantity as f64 * entry;
    let position_pct = if portfolio > 0.0 { position_value / portfolio * 100.0 } else { 0.0 };
    PositionSize {
        quantity,
        position_value,
        risk_amount,
        position_pct,
    }
}

#[async_trait]
impl Agent for RiskAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn analyze(&self, symbol: &str, context: &AgentContext) -> Result<AgentResult, AnalysisError> {
        let bars = self.provider.fetch_bars(symbol, HISTORY_DAYS).await?;
        if bars.len() < MIN_BARS {
            return Ok(AgentResult::insufficient_data(NAME, symbol, &format!("{} bars", bars.len())));
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let last = closes.last().copied().unwrap_or(0.0);
        let entry = context.entry_price.unwrap_or(last);
        let atr = atr(&bars, 14).last().copied().unwrap_or(0.0);
        let volatility = stats::annualized_volatility(&closes);
        let beta = self.beta(symbol, &closes).await;

        let stop = stop_loss(&bars, entry, atr);
        let size = position_size(entry, stop, context.portfolio_size, context.risk_per_trade);
        let sl_distance = if entry > 0.0 { (entry - stop) / entry * 100.0 } else { 0.0 };

        let vol_label = if volatility > 40.0 {
            "Bearish"
        } else if volatility < 20.0 {
            "Bullish"
        } else {
            "Neutral"
        };
        let mut signals = vec![
            AgentSignal::new("VOLATILITY", format!("{volatility:.1}%"), vol_label),
            AgentSignal::new("STOP_LOSS", format!("{stop:.2} ({sl_distance:.1}%)"), "Neutral"),
            AgentSignal::new(
                "POSITION_SIZE",
                format!("{} shares ({:.0})", size.quantity, size.position_value),
                "Neutral",
            ),
        ];
        if size.position_pct > 10.0 {
            signals.push(AgentSignal::new("POSITION_WARNING", "Large position", "Caution"));
        }
        signals.push(match beta {
            Some(b) => AgentSignal::new("BETA", format!("{b:.2}"), if b > 1.3 { "Bearish" } else { "Neutral" }),
            None => AgentSignal::new("BETA", "unknown", "Neutral"),
        });

        let score = volatility_score(volatility) * 0.7 + beta_score(beta) * 0.3;
        let confidence = confidence_for(score, signals.len());
        let reasoning = format!(
            "{symbol} - Volatility: {volatility:.1}%. Recommended: {} shares with SL at {stop:.2}. Max risk: {:.0}.",
            size.quantity, size.risk_amount
        );

        Ok(AgentResult::new(NAME, symbol, score, confidence, signals, reasoning).with_metadata(json!({
            "atr": round2(atr),
            "volatility": round2(volatility),
            "beta": beta.map(round2),
            "stop_loss": round2(stop),
            "position_size": round2(size.position_value),
            "quantity": size.quantity,
            "risk_amount": round2(size.risk_amount),
        })))
    }
}
