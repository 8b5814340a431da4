use std::sync::Arc;

use analysis_core::{Agent, AgentContext, AgentResult, AgentSignal, AnalysisError, Bar, Confidence, MarketDataProvider};
use async_trait::async_trait;
use serde_json::json;
use technical_analysis::{detect_patterns, detect_trend, PatternMatch, Trend};
use tracing::debug;

pub const NAME: &str = "pattern";

const HISTORY_DAYS: usize = 120;
const MIN_BARS: usize = 20;
const PATTERN_LOOKBACK: usize = 5;
const BREAKOUT_WINDOW: usize = 20;

/// Candlestick and breakout pattern scorer.
pub struct PatternAgent {
    provider: Arc<dyn MarketDataProvider>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Breakout {
    Up,
    Down,
    None,
}

impl PatternAgent {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

/// Close beyond the high/low range of the prior `window` bars
pub(crate) fn breakout(bars: &[Bar], window: usize) -> Breakout {
    if bars.len() < window + 1 {
        return Breakout::None;
    }
    let (prior, last) = bars.split_at(bars.len() - 1);
    let prior = &prior[prior.len() - window..];
    let close = last[0].close;
    let high = prior.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = prior.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

    if close > high {
        Breakout::Up
    } else if close < low {
        Breakout::Down
    } else {
        Breakout::None
    }
}

pub(crate) fn pattern_score(patterns: &[PatternMatch], breakout: Breakout, trend: Trend) -> f64 {
    let mut score = 50.0;
    for p in patterns {
        match p.bullish {
            Some(true) => score += 25.0 * p.strength,
            Some(false) => score -= 25.0 * p.strength,
            None => {}
        }
    }
    score += match breakout {
        Breakout::Up => 15.0,
        Breakout::Down => -15.0,
        Breakout::None => 0.0,
    };
    score += match trend {
        Trend::Uptrend => 5.0,
        Trend::Downtrend => -5.0,
        Trend::Sideways => 0.0,
    };
    score.clamp(0.0, 100.0)
}

#[async_trait]
impl Agent for PatternAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn analyze(&self, symbol: &str, _context: &AgentContext) -> Result<AgentResult, AnalysisError> {
        let bars = self.provider.fetch_bars(symbol, HISTORY_DAYS).await?;
        if bars.len() < MIN_BARS {
            return Ok(AgentResult::insufficient_data(NAME, symbol, &format!("{} candles", bars.len())));
        }

        let patterns = detect_patterns(&bars, PATTERN_LOOKBACK);
        let breakout = breakout(&bars, BREAKOUT_WINDOW);
        let trend = detect_trend(&bars, BREAKOUT_WINDOW);
        let score = pattern_score(&patterns, breakout, trend);
        debug!(symbol, patterns = patterns.len(), ?breakout, ?trend, "pattern scan");

        let mut signals: Vec<AgentSignal> = patterns
            .iter()
            .map(|p| {
                let direction = match p.bullish {
                    Some(true) => "Bullish",
                    Some(false) => "Bearish",
                    None => "Neutral",
                };
                AgentSignal::new(p.pattern.name(), format!("strength {:.0}%", p.strength * 100.0), direction)
            })
            .collect();
        match breakout {
            Breakout::Up => signals.push(AgentSignal::new("BREAKOUT", "Above 20-day high", "Bullish")),
            Breakout::Down => signals.push(AgentSignal::new("BREAKDOWN", "Below 20-day low", "Bearish")),
            Breakout::None => {}
        }

        let bullish_count = patterns.iter().filter(|p| p.bullish == Some(true)).count();
        let bearish_count = patterns.iter().filter(|p| p.bullish == Some(false)).count();
        let strongest = patterns
            .iter()
            .max_by(|a, b| a.strength.total_cmp(&b.strength))
            .map(|p| p.pattern.name());

        let confidence = if score >= 70.0 || score <= 30.0 {
            Confidence::High
        } else if signals.is_empty() {
            Confidence::Low
        } else {
            Confidence::Medium
        };

        let reasoning = match strongest {
            Some(name) if score > 55.0 => format!("Bullish pattern detected: {name}. Trend {trend:?}."),
            Some(name) if score < 45.0 => format!("Bearish pattern detected: {name}. Trend {trend:?}."),
            Some(name) => format!("Mixed signals. Primary pattern: {name}. Trend {trend:?}."),
            None if breakout != Breakout::None => format!("No candlestick pattern, price {breakout:?} breakout of the 20-day range"),
            None => "No significant patterns detected".to_string(),
        };

        Ok(AgentResult::new(NAME, symbol, score, confidence, signals, reasoning).with_metadata(json!({
            "total_patterns": patterns.len(),
            "bullish_count": bullish_count,
            "bearish_count": bearish_count,
            "strongest_pattern": strongest,
            "trend": format!("{trend:?}"),
        })))
    }
}
