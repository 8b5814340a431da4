use std::sync::Arc;

use analysis_core::{
    confidence_for, score_outlook, stats, Agent, AgentContext, AgentResult, AgentSignal, AnalysisError, Bar,
    MarketDataProvider, SignalBias,
};
use async_trait::async_trait;
use serde_json::json;
use technical_analysis::{atr, bollinger_bands, macd, rsi, sma, stochastic};

use crate::round2;

pub const NAME: &str = "technical";

const HISTORY_DAYS: usize = 200;
const MIN_BARS: usize = 50;

/// Multi-indicator technical scorer: RSI, MACD, Bollinger, moving-average trend, stochastic.
pub struct TechnicalAgent {
    provider: Arc<dyn MarketDataProvider>,
}

/// One indicator's contribution
struct Reading {
    score: f64,
    signal: AgentSignal,
}

impl TechnicalAgent {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }

    fn score_bars(&self, symbol: &str, bars: &[Bar]) -> AgentResult {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let readings: Vec<Reading> = [
            rsi_reading(&closes),
            macd_reading(&closes),
            bollinger_reading(&closes),
            trend_reading(&closes),
            stochastic_reading(bars),
        ]
        .into_iter()
        .flatten()
        .collect();

        let score = if readings.is_empty() {
            50.0
        } else {
            stats::mean(&readings.iter().map(|r| r.score).collect::<Vec<_>>())
        };
        let signals: Vec<AgentSignal> = readings.into_iter().map(|r| r.signal).collect();
        let confidence = confidence_for(score, signals.len());
        let reasoning = reasoning(symbol, &signals, score);
        let levels = price_levels(bars, score);

        AgentResult::new(NAME, symbol, score, confidence, signals, reasoning).with_metadata(levels)
    }
}

#[async_trait]
impl Agent for TechnicalAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn analyze(&self, symbol: &str, _context: &AgentContext) -> Result<AgentResult, AnalysisError> {
        let bars = self.provider.fetch_bars(symbol, HISTORY_DAYS).await?;
        if bars.len() < MIN_BARS {
            return Ok(AgentResult::insufficient_data(
                NAME,
                symbol,
                &format!("{} bars, need {MIN_BARS}", bars.len()),
            ));
        }
        Ok(self.score_bars(symbol, &bars))
    }
}

/// RSI mapped to 0-100: 50-65 is the sweet spot of an uptrend, deep oversold is
/// an opportunity, overbought is a risk.
pub(crate) fn rsi_score(rsi: f64) -> f64 {
    if (50.0..=65.0).contains(&rsi) {
        80.0 + (rsi - 50.0) * 1.3
    } else if (40.0..50.0).contains(&rsi) {
        60.0 + (rsi - 40.0) * 2.0
    } else if rsi > 65.0 && rsi <= 75.0 {
        70.0 - (rsi - 65.0) * 2.0
    } else if rsi < 30.0 {
        70.0 + (30.0 - rsi)
    } else if rsi > 75.0 {
        40.0 - (rsi - 75.0) * 1.6
    } else {
        50.0
    }
}

fn rsi_label(rsi: f64) -> &'static str {
    if rsi > 70.0 {
        "Sell"
    } else if rsi < 30.0 {
        "Buy"
    } else if rsi > 60.0 {
        "Bullish"
    } else if rsi < 40.0 {
        "Bearish"
    } else {
        "Neutral"
    }
}

fn rsi_reading(closes: &[f64]) -> Option<Reading> {
    let value = *rsi(closes, 14).last()?;
    Some(Reading {
        score: rsi_score(value).clamp(0.0, 100.0),
        signal: AgentSignal::new("RSI", format!("{value:.1}"), rsi_label(value)),
    })
}

/// Histogram crossover scoring from the last two histogram values.
pub(crate) fn macd_score(hist_prev: f64, hist_curr: f64) -> (f64, &'static str, &'static str) {
    if hist_prev < 0.0 && hist_curr > 0.0 {
        (85.0, "Bullish Crossover", "Buy")
    } else if hist_prev > 0.0 && hist_curr < 0.0 {
        (25.0, "Bearish Crossover", "Sell")
    } else if hist_curr > 0.0 {
        (if hist_curr > hist_prev { 70.0 } else { 60.0 }, "Bullish", "Hold Long")
    } else if hist_curr < hist_prev {
        (35.0, "Bearish", "Hold Short")
    } else {
        (45.0, "Bearish", "Hold Short")
    }
}

fn macd_reading(closes: &[f64]) -> Option<Reading> {
    let result = macd(closes, 12, 26, 9);
    let n = result.histogram.len();
    if n < 2 {
        return None;
    }
    let (prev, curr) = (result.histogram[n - 2], result.histogram[n - 1]);
    let (score, value, label) = macd_score(prev, curr);
    Some(Reading {
        score,
        signal: AgentSignal::new("MACD", format!("{value} ({curr:.2})"), label),
    })
}

fn bollinger_reading(closes: &[f64]) -> Option<Reading> {
    let bands = bollinger_bands(closes, 20, 2.0);
    let upper = *bands.upper.last()?;
    let middle = *bands.middle.last()?;
    let lower = *bands.lower.last()?;
    let close = *closes.last()?;

    // Squeeze: current width well below its recent average
    let widths: Vec<f64> = bands
        .upper
        .iter()
        .zip(&bands.lower)
        .zip(&bands.middle)
        .map(|((u, l), m)| if *m != 0.0 { (u - l) / m } else { 0.0 })
        .collect();
    let recent = &widths[widths.len().saturating_sub(20)..];
    let squeeze = widths.last().copied().unwrap_or(0.0) < stats::mean(recent) * 0.8;

    let (score, value, label) = if close > upper {
        (if squeeze { 75.0 } else { 65.0 }, "Upper band breakout", "Bullish")
    } else if close < lower {
        (if squeeze { 25.0 } else { 35.0 }, "Lower band breakdown", "Bearish")
    } else if close > middle {
        (60.0, "Above middle band", "Bullish")
    } else if close < middle {
        (40.0, "Below middle band", "Bearish")
    } else {
        (50.0, "At middle band", "Neutral")
    };
    let value = if squeeze { format!("{value} (squeeze)") } else { value.to_string() };
    Some(Reading {
        score,
        signal: AgentSignal::new("BOLLINGER", value, label),
    })
}

fn trend_reading(closes: &[f64]) -> Option<Reading> {
    let sma20 = *sma(closes, 20).last()?;
    let sma50 = *sma(closes, 50).last()?;
    let close = *closes.last()?;

    let (score, label) = if close > sma20 && sma20 > sma50 {
        (75.0, "Bullish")
    } else if close < sma20 && sma20 < sma50 {
        (25.0, "Bearish")
    } else {
        (50.0, "Neutral")
    };
    Some(Reading {
        score,
        signal: AgentSignal::new("SMA_TREND", format!("SMA20 {sma20:.2} / SMA50 {sma50:.2}"), label),
    })
}

fn stochastic_reading(bars: &[Bar]) -> Option<Reading> {
    let result = stochastic(bars, 14, 3);
    let k = *result.k.last()?;
    let d = *result.d.last()?;

    let (score, label) = if k < 20.0 && k > d {
        (75.0, "Buy")
    } else if k > 80.0 && k < d {
        (25.0, "Sell")
    } else if k > d {
        (60.0, "Bullish")
    } else if k < d {
        (40.0, "Bearish")
    } else {
        (50.0, "Neutral")
    };
    Some(Reading {
        score,
        signal: AgentSignal::new("STOCHASTIC", format!("%K {k:.1} / %D {d:.1}"), label),
    })
}

fn reasoning(symbol: &str, signals: &[AgentSignal], score: f64) -> String {
    let action = if score >= 75.0 {
        "Consider buying or adding to position"
    } else if score >= 60.0 {
        "Cautiously bullish, wait for confirmation"
    } else if score >= 50.0 {
        "Hold and watch for clearer signals"
    } else if score >= 35.0 {
        "Consider reducing exposure"
    } else {
        "Avoid or exit position"
    };
    let bullish = signals.iter().filter(|s| s.bias() == SignalBias::Bullish).count();
    let bearish = signals.iter().filter(|s| s.bias() == SignalBias::Bearish).count();

    format!(
        "{symbol} shows {} technical setup with {bullish} bullish and {bearish} bearish readings across {} indicators. {action}.",
        score_outlook(score),
        signals.len()
    )
}

/// Entry, stop and targets from the last 20 bars and ATR. Bullish setups
/// (score >= 60) target upside; everything else targets downside.
pub(crate) fn price_levels(bars: &[Bar], score: f64) -> serde_json::Value {
    let recent = &bars[bars.len().saturating_sub(20)..];
    let current = bars.last().map(|b| b.close).unwrap_or(0.0);
    let high = recent.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let atr = atr(bars, 14).last().copied().unwrap_or(0.0);

    let (support, resistance, stop_loss, target_1, target_2) = if score >= 60.0 {
        let support = current * 0.97;
        (support, high, support * 0.995, current + atr * 2.0, current + atr * 3.5)
    } else {
        let resistance = current * 1.03;
        (low, resistance, resistance * 1.005, current - atr * 2.0, current - atr * 3.5)
    };

    json!({
        "current_price": round2(current),
        "support": round2(support),
        "resistance": round2(resistance),
        "entry_price": round2(current),
        "stop_loss": round2(stop_loss),
        "target_price": round2(target_1),
        "target_1": round2(target_1),
        "target_2": round2(target_2),
        "atr": round2(atr),
    })
}
