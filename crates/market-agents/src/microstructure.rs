use std::sync::Arc;

use analysis_core::{
    confidence_for, stats, Agent, AgentContext, AgentResult, AgentSignal, AnalysisError, Bar, MarketDataProvider,
};
use async_trait::async_trait;
use serde_json::json;

use crate::round2;

pub const NAME: &str = "microstructure";

const WINDOW: usize = 20;

/// Volume, VWAP and order-flow balance.
pub struct MicrostructureAgent {
    provider: Arc<dyn MarketDataProvider>,
}

struct Component {
    score: f64,
    signals: Vec<AgentSignal>,
}

impl MicrostructureAgent {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

/// Relative volume of the last bar against the window mean, confirmed by the
/// 5-bar price change.
fn volume_component(bars: &[Bar]) -> (Component, f64) {
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let avg = stats::mean(&volumes);
    let last = volumes.last().copied().unwrap_or(0.0);
    let ratio = if avg > 0.0 { last / avg } else { 1.0 };

    let mut signals = Vec::new();
    let mut score = if ratio > 1.5 {
        signals.push(AgentSignal::new("VOLUME", format!("{ratio:.1}x average"), "Bullish"));
        70.0
    } else if ratio < 0.5 {
        signals.push(AgentSignal::new("VOLUME", format!("{ratio:.1}x average"), "Bearish"));
        40.0
    } else {
        signals.push(AgentSignal::new("VOLUME", "Normal", "Neutral"));
        50.0
    };

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let change = stats::rate_of_change(&closes, 4).unwrap_or(0.0);
    if change > 2.0 && ratio > 1.2 {
        signals.push(AgentSignal::new("VOLUME_CONFIRM", "Price up + Volume up", "Bullish"));
        score = f64::min(score + 10.0, 85.0);
    } else if change > 2.0 && ratio < 0.8 {
        signals.push(AgentSignal::new("VOLUME_DIVERGENCE", "Price up + Volume down", "Bearish"));
        score = f64::max(score - 10.0, 40.0);
    }

    (Component { score, signals }, ratio)
}

/// Window VWAP, using the bar's own vwap when the feed carries one and the
/// typical price otherwise.
pub(crate) fn window_vwap(bars: &[Bar]) -> Option<f64> {
    let volume: f64 = bars.iter().map(|b| b.volume).sum();
    if volume <= 0.0 {
        return None;
    }
    let notional: f64 = bars
        .iter()
        .map(|b| b.vwap.unwrap_or_else(|| b.typical_price()) * b.volume)
        .sum();
    Some(notional / volume)
}

fn vwap_component(bars: &[Bar]) -> (Component, Option<f64>) {
    let vwap = window_vwap(bars);
    let close = bars.last().map(|b| b.close).unwrap_or(0.0);
    let Some(vwap) = vwap.filter(|v| *v > 0.0) else {
        return (Component { score: 50.0, signals: vec![] }, None);
    };
    let distance = (close - vwap) / vwap * 100.0;

    // Stretched above VWAP tends to mean-revert, below it tends to bounce
    let (score, signal) = if distance > 2.0 {
        (45.0, AgentSignal::new("VWAP", format!("{distance:+.1}% above VWAP"), "Bearish"))
    } else if distance < -2.0 {
        (65.0, AgentSignal::new("VWAP", format!("{distance:+.1}% below VWAP"), "Bullish"))
    } else {
        (50.0, AgentSignal::new("VWAP", "Near VWAP", "Neutral"))
    };
    (Component { score, signals: vec![signal] }, Some(vwap))
}

/// Share of volume traded on up bars.
pub(crate) fn up_volume_share(bars: &[Bar]) -> Option<f64> {
    let (up, down) = bars.windows(2).fold((0.0, 0.0), |(up, down), w| {
        if w[1].close > w[0].close {
            (up + w[1].volume, down)
        } else if w[1].close < w[0].close {
            (up, down + w[1].volume)
        } else {
            (up, down)
        }
    });
    let total = up + down;
    (total > 0.0).then(|| up / total)
}

fn flow_component(bars: &[Bar]) -> (Component, Option<f64>) {
    let share = up_volume_share(bars);
    let (score, signal) = match share {
        Some(s) if s > 0.6 => (65.0, AgentSignal::new("ORDER_FLOW", format!("{:.0}% up-volume", s * 100.0), "Bullish")),
        Some(s) if s < 0.4 => (35.0, AgentSignal::new("ORDER_FLOW", format!("{:.0}% up-volume", s * 100.0), "Bearish")),
        Some(s) => (50.0, AgentSignal::new("ORDER_FLOW", format!("{:.0}% up-volume", s * 100.0), "Neutral")),
        None => (50.0, AgentSignal::new("ORDER_FLOW", "No directional volume", "Neutral")),
    };
    (Component { score, signals: vec![signal] }, share)
}

#[async_trait]
impl Agent for MicrostructureAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn analyze(&self, symbol: &str, _context: &AgentContext) -> Result<AgentResult, AnalysisError> {
        let bars = self.provider.fetch_bars(symbol, WINDOW + 1).await?;
        if bars.len() < WINDOW {
            return Ok(AgentResult::insufficient_data(NAME, symbol, &format!("{} bars", bars.len())));
        }
        let window = &bars[bars.len() - WINDOW..];

        let (volume, ratio) = volume_component(window);
        let (vwap, vwap_value) = vwap_component(window);
        let (flow, share) = flow_component(&bars);

        let score = (volume.score + vwap.score + flow.score) / 3.0;
        let signals: Vec<AgentSignal> = [volume.signals, vwap.signals, flow.signals].concat();
        let confidence = confidence_for(score, signals.len());

        let volume_trend = if ratio > 1.2 {
            "increasing"
        } else if ratio < 0.8 {
            "decreasing"
        } else {
            "stable"
        };
        let reasoning = format!(
            "Volume {volume_trend} at {ratio:.1}x the {WINDOW}-day average; {}",
            match share {
                Some(s) => format!("{:.0}% of volume on up days", s * 100.0),
                None => "no directional volume".to_string(),
            }
        );

        Ok(AgentResult::new(NAME, symbol, score, confidence, signals, reasoning).with_metadata(json!({
            "relative_volume": round2(ratio),
            "vwap": vwap_value.map(round2),
            "up_volume_share": share.map(round2),
        })))
    }
}
