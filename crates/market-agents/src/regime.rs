use std::fmt;
use std::sync::Arc;

use analysis_core::{stats, Agent, AgentContext, AgentResult, AgentSignal, AnalysisError, Confidence, MarketDataProvider};
use async_trait::async_trait;
use serde_json::json;
use technical_analysis::{adx, macd, rsi, sma};

use crate::round2;

pub const NAME: &str = "regime";

const HISTORY_DAYS: usize = 250;
const MIN_BARS: usize = 50;

/// Trend/volatility/momentum regime classifier.
pub struct RegimeAgent {
    provider: Arc<dyn MarketDataProvider>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regime {
    Bull,
    WeakBull,
    Sideways,
    WeakBear,
    Bear,
}

impl Regime {
    /// Score bands: [70,100] BULL, [55,70) WEAK_BULL, [45,55) SIDEWAYS, [30,45) WEAK_BEAR, below 30 BEAR
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            Regime::Bull
        } else if score >= 55.0 {
            Regime::WeakBull
        } else if score >= 45.0 {
            Regime::Sideways
        } else if score >= 30.0 {
            Regime::WeakBear
        } else {
            Regime::Bear
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Regime::Bull => "Strong uptrend",
            Regime::WeakBull => "Weakening uptrend",
            Regime::Sideways => "Range-bound",
            Regime::WeakBear => "Weakening downtrend",
            Regime::Bear => "Strong downtrend",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Regime::Bull => "BULL",
            Regime::WeakBull => "WEAK_BULL",
            Regime::Sideways => "SIDEWAYS",
            Regime::WeakBear => "WEAK_BEAR",
            Regime::Bear => "BEAR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum VolatilityLevel {
    Low,
    Medium,
    High,
}

/// Daily return standard deviation over the last 20 bars
pub(crate) fn volatility_level(daily_std: f64) -> VolatilityLevel {
    if daily_std > 0.03 {
        VolatilityLevel::High
    } else if daily_std > 0.02 {
        VolatilityLevel::Medium
    } else {
        VolatilityLevel::Low
    }
}

/// Trend score pulled towards neutral under high volatility, then blended 70/30
/// with the momentum reading.
pub(crate) fn regime_score(trend_score: f64, volatility: VolatilityLevel, momentum: Option<bool>) -> f64 {
    let mut score = trend_score;
    if volatility == VolatilityLevel::High {
        score = score * 0.9 + 50.0 * 0.1;
    }
    match momentum {
        Some(true) => score * 0.7 + 75.0 * 0.3,
        Some(false) => score * 0.7 + 25.0 * 0.3,
        None => score,
    }
}

impl RegimeAgent {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Agent for RegimeAgent {
    fn name(&self) -> &str {
        NAME
    }

    async fn analyze(&self, symbol: &str, _context: &AgentContext) -> Result<AgentResult, AnalysisError> {
        let bars = self.provider.fetch_bars(symbol, HISTORY_DAYS).await?;
        if bars.len() < MIN_BARS {
            return Ok(AgentResult::insufficient_data(NAME, symbol, &format!("{} bars", bars.len())));
        }
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let close = closes.last().copied().unwrap_or(0.0);

        // Trend from moving-average alignment
        let sma20 = sma(&closes, 20).last().copied().unwrap_or(close);
        let sma50 = sma(&closes, 50).last().copied().unwrap_or(close);
        let (direction, trend_score) = if close > sma20 && sma20 > sma50 {
            ("UP", 75.0)
        } else if close < sma20 && sma20 < sma50 {
            ("DOWN", 25.0)
        } else {
            ("FLAT", 50.0)
        };
        let adx_value = adx(&bars, 14).adx.last().copied().unwrap_or(0.0);
        let strength = if adx_value > 25.0 {
            "STRONG"
        } else if adx_value > 20.0 {
            "MODERATE"
        } else {
            "WEAK"
        };

        let returns = stats::returns(&closes);
        let daily_std = stats::std_dev(&returns[returns.len().saturating_sub(20)..]);
        let volatility = volatility_level(daily_std);

        let rsi_value = rsi(&closes, 14).last().copied().unwrap_or(50.0);
        let m = macd(&closes, 12, 26, 9);
        let macd_above = match (m.macd_line.last(), m.signal_line.last()) {
            (Some(line), Some(signal)) => line > signal,
            _ => false,
        };
        let momentum = if rsi_value > 60.0 && macd_above {
            Some(true)
        } else if rsi_value < 40.0 && !macd_above {
            Some(false)
        } else {
            None
        };

        let score = regime_score(trend_score, volatility, momentum);
        let regime = Regime::from_score(score);

        let confidence = if strength == "STRONG" && volatility == VolatilityLevel::Low {
            Confidence::High
        } else if strength == "WEAK" || volatility == VolatilityLevel::High {
            Confidence::Low
        } else {
            Confidence::Medium
        };

        let regime_bias = match regime {
            Regime::Bull | Regime::WeakBull => "Bullish",
            Regime::Bear | Regime::WeakBear => "Bearish",
            Regime::Sideways => "Neutral",
        };
        let mut signals = vec![
            AgentSignal::new("REGIME", regime.to_string(), regime_bias),
            AgentSignal::new("TREND_STRENGTH", format!("ADX {adx_value:.1} ({strength})"), "Neutral"),
        ];
        if volatility == VolatilityLevel::High {
            signals.push(AgentSignal::new("VOLATILITY", format!("{:.1}% daily", daily_std * 100.0), "Caution"));
        }

        let recent = &bars[bars.len().saturating_sub(50)..];
        let support = recent.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
        let resistance = recent.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);

        let reasoning = format!(
            "{} regime ({}): trend {direction} with {} strength, {:?} volatility",
            regime,
            regime.description(),
            strength.to_lowercase(),
            volatility
        );

        Ok(AgentResult::new(NAME, symbol, score, confidence, signals, reasoning).with_metadata(json!({
            "regime": regime.to_string(),
            "regime_description": regime.description(),
            "trend_direction": direction,
            "trend_strength": round2(adx_value),
            "volatility": format!("{volatility:?}").to_uppercase(),
            "momentum": match momentum {
                Some(true) => "BULLISH",
                Some(false) => "BEARISH",
                None => "NEUTRAL",
            },
            "support_level": round2(support),
            "resistance_level": round2(resistance),
        })))
    }
}
