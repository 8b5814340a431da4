use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// OHLCV bar data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub vwap: Option<f64>,
}

impl Bar {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// News article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsArticle {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    pub published_utc: DateTime<Utc>,
    #[serde(default)]
    pub tickers: Vec<String>,
}

impl NewsArticle {
    /// Title and description joined and lower-cased, for keyword matching.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description.as_deref().unwrap_or("")).to_lowercase()
    }
}

/// Qualitative confidence attached to agent results and blended scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Confidence {
    Low,
    #[default]
    Medium,
    High,
}

impl Confidence {
    /// Numeric level used for averaging and filtering (Low=1, Medium=2, High=3)
    pub fn level(&self) -> u8 {
        match self {
            Confidence::Low => 1,
            Confidence::Medium => 2,
            Confidence::High => 3,
        }
    }

    /// Bucket an average level back into a confidence
    pub fn from_average_level(avg: f64) -> Self {
        if avg >= 2.5 {
            Confidence::High
        } else if avg >= 1.5 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }

    /// Case-insensitive parse; anything unrecognised is treated as Medium.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Confidence::Medium)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "Low",
            Confidence::Medium => "Medium",
            Confidence::High => "High",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Confidence::Low),
            "medium" => Ok(Confidence::Medium),
            "high" => Ok(Confidence::High),
            other => Err(format!("unknown confidence level: {other}")),
        }
    }
}

/// Directional reading of a signal label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalBias {
    Bullish,
    Bearish,
    Neutral,
}

/// One observation produced by an agent, e.g. `{type: "RSI", value: "55.2", signal: "Neutral"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSignal {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub signal: String,
}

impl AgentSignal {
    pub fn new(kind: impl Into<String>, value: impl Into<String>, signal: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            signal: signal.into(),
        }
    }

    pub fn bias(&self) -> SignalBias {
        match self.signal.as_str() {
            "Bullish" | "Buy" | "Positive" => SignalBias::Bullish,
            "Bearish" | "Sell" | "Negative" => SignalBias::Bearish,
            _ => SignalBias::Neutral,
        }
    }
}

/// Standard result format for all agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub agent_type: String,
    pub symbol: String,
    /// 0-100
    pub score: f64,
    pub confidence: Confidence,
    #[serde(default)]
    pub signals: Vec<AgentSignal>,
    pub reasoning: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl AgentResult {
    /// Build a result, clamping the score into 0-100 (NaN becomes 50).
    pub fn new(
        agent_type: impl Into<String>,
        symbol: impl Into<String>,
        score: f64,
        confidence: Confidence,
        signals: Vec<AgentSignal>,
        reasoning: impl Into<String>,
    ) -> Self {
        let score = if score.is_nan() { 50.0 } else { score.clamp(0.0, 100.0) };
        Self {
            agent_type: agent_type.into(),
            symbol: symbol.into(),
            score: (score * 100.0).round() / 100.0,
            confidence,
            signals,
            reasoning: reasoning.into(),
            metadata: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Neutral low-confidence result for when an agent lacks the data it needs
    pub fn insufficient_data(agent_type: &str, symbol: &str, detail: &str) -> Self {
        Self::new(
            agent_type,
            symbol,
            50.0,
            Confidence::Low,
            Vec::new(),
            format!("Insufficient data for {agent_type} analysis ({detail})"),
        )
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = metadata {
            self.metadata.extend(map);
        }
        self
    }

    /// Numeric metadata lookup
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(|v| v.as_f64())
    }
}

pub const DEFAULT_PORTFOLIO_SIZE: f64 = 1_000_000.0;
pub const DEFAULT_RISK_PER_TRADE: f64 = 0.02;

/// Context handed to every agent for one symbol analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub analysis_time: DateTime<Utc>,
    #[serde(default)]
    pub global_market: Option<serde_json::Value>,
    #[serde(default)]
    pub policy_events: Option<serde_json::Value>,
    #[serde(default)]
    pub entry_price: Option<f64>,
    pub portfolio_size: f64,
    pub risk_per_trade: f64,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for AgentContext {
    fn default() -> Self {
        Self {
            analysis_time: Utc::now(),
            global_market: None,
            policy_events: None,
            entry_price: None,
            portfolio_size: DEFAULT_PORTFOLIO_SIZE,
            risk_per_trade: DEFAULT_RISK_PER_TRADE,
            extra: serde_json::Map::new(),
        }
    }
}

impl AgentContext {
    /// `global_market.sentiment`, if the caller supplied one
    pub fn global_sentiment(&self) -> Option<&str> {
        self.global_market
            .as_ref()
            .and_then(|g| g.get("sentiment"))
            .and_then(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_confidence_parse_and_order() {
        assert_eq!(Confidence::parse_lenient("HIGH"), Confidence::High);
        assert_eq!(Confidence::parse_lenient(" low "), Confidence::Low);
        assert_eq!(Confidence::parse_lenient("bogus"), Confidence::Medium);
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
        assert_eq!(Confidence::from_average_level(2.5), Confidence::High);
        assert_eq!(Confidence::from_average_level(2.0), Confidence::Medium);
        assert_eq!(Confidence::from_average_level(1.4), Confidence::Low);
    }

    #[test]
    fn test_confidence_serializes_as_label() {
        let s = serde_json::to_string(&Confidence::Medium).unwrap();
        assert_eq!(s, "\"Medium\"");
    }

    #[test]
    fn test_signal_bias() {
        assert_eq!(AgentSignal::new("MACD", "x", "Buy").bias(), SignalBias::Bullish);
        assert_eq!(AgentSignal::new("NEWS", "x", "Negative").bias(), SignalBias::Bearish);
        assert_eq!(AgentSignal::new("MACD", "x", "Hold Long").bias(), SignalBias::Neutral);
    }

    #[test]
    fn test_signal_serializes_kind_as_type() {
        let v = serde_json::to_value(AgentSignal::new("RSI", "55", "Neutral")).unwrap();
        assert_eq!(v["type"], "RSI");
    }

    #[test]
    fn test_agent_result_clamps_score() {
        let r = AgentResult::new("technical", "TCS", 140.0, Confidence::High, vec![], "x");
        assert_eq!(r.score, 100.0);
        let r = AgentResult::new("technical", "TCS", -3.0, Confidence::High, vec![], "x");
        assert_eq!(r.score, 0.0);
        let r = AgentResult::new("technical", "TCS", f64::NAN, Confidence::High, vec![], "x");
        assert_eq!(r.score, 50.0);
    }

    #[test]
    fn test_metadata_merge() {
        let r = AgentResult::new("risk", "SBIN", 60.0, Confidence::Medium, vec![], "x")
            .with_metadata(json!({"atr": 12.5, "beta": null}));
        assert_eq!(r.metric("atr"), Some(12.5));
        assert_eq!(r.metric("beta"), None);
    }

    #[test]
    fn test_context_global_sentiment() {
        let ctx = AgentContext {
            global_market: Some(json!({"sentiment": "Bullish"})),
            ..Default::default()
        };
        assert_eq!(ctx.global_sentiment(), Some("Bullish"));
        assert_eq!(AgentContext::default().global_sentiment(), None);
    }
}
