//! Actionable recommendation labels. The blend score sets the band, the
//! risk/reward ratio and agent agreement decide the label inside it.

use std::fmt;

use analysis_core::{Confidence, SignalBias};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recommendation {
    #[serde(rename = "Strong Buy")]
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    #[serde(rename = "Strong Sell")]
    StrongSell,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::StrongBuy => "Strong Buy",
            Recommendation::Buy => "Buy",
            Recommendation::Neutral => "Neutral",
            Recommendation::Sell => "Sell",
            Recommendation::StrongSell => "Strong Sell",
        }
    }

    pub fn is_actionable(&self) -> bool {
        *self != Recommendation::Neutral
    }

    pub fn color_scheme(&self) -> ColorScheme {
        let (text, background, border, badge) = match self {
            Recommendation::StrongBuy => ("#166534", "#dcfce7", "#86efac", "bg-green-100 text-green-800 border-green-300"),
            Recommendation::Buy => ("#15803d", "#f0fdf4", "#bbf7d0", "bg-green-50 text-green-700 border-green-200"),
            Recommendation::Neutral => ("#64748b", "#f1f5f9", "#cbd5e1", "bg-gray-100 text-gray-700 border-gray-300"),
            Recommendation::Sell => ("#991b1b", "#fee2e2", "#fecaca", "bg-red-100 text-red-800 border-red-300"),
            Recommendation::StrongSell => ("#7f1d1d", "#fee2e2", "#b91c1c", "bg-red-200 text-red-900 border-red-400"),
        };
        ColorScheme {
            text: text.to_string(),
            background: background.to_string(),
            border: border.to_string(),
            badge: badge.to_string(),
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display colours for a recommendation badge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub text: String,
    pub background: String,
    pub border: String,
    pub badge: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Favorability {
    HighlyFavorable,
    Acceptable,
    Poor,
}

/// Inputs for the risk/reward side of a recommendation. All optional.
#[derive(Debug, Clone, Default)]
pub struct RiskInputs {
    /// Precomputed ratio; skips the calculation when set
    pub risk_reward_ratio: Option<f64>,
    pub entry_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub target_price: Option<f64>,
    /// Risk agent score, higher is safer
    pub risk_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub recommendation: Recommendation,
    pub score: f64,
    pub confidence: Confidence,
    pub color_scheme: ColorScheme,
    pub risk_reward_ratio: Option<f64>,
    pub is_actionable: bool,
    pub note: Option<String>,
}

/// Reward over risk from price levels, adjusted by the risk agent's score.
///
/// Levels count only when positive. Without usable levels the risk score
/// alone maps onto 1.0..3.0.
pub fn calculate_risk_reward_ratio(
    entry_price: Option<f64>,
    stop_loss: Option<f64>,
    target_price: Option<f64>,
    risk_score: Option<f64>,
) -> Option<f64> {
    let positive = |v: Option<f64>| v.filter(|p| *p > 0.0);
    let technical = match (positive(entry_price), positive(stop_loss), positive(target_price)) {
        (Some(entry), Some(stop), Some(target)) => {
            let risk = (entry - stop).abs();
            (risk > 0.0).then(|| (target - entry).abs() / risk)
        }
        _ => None,
    };

    match (technical, risk_score) {
        (Some(rr), Some(risk)) => Some(rr * (0.8 + 0.4 * risk / 100.0)),
        (Some(rr), None) => Some(rr),
        (None, Some(risk)) => Some(1.0 + 2.0 * risk / 100.0),
        (None, None) => None,
    }
}

/// An unknown ratio is treated as acceptable.
pub fn assess_favorability(risk_reward_ratio: Option<f64>) -> Favorability {
    match risk_reward_ratio {
        None => Favorability::Acceptable,
        Some(rr) if rr >= 2.5 => Favorability::HighlyFavorable,
        Some(rr) if rr >= 1.5 => Favorability::Acceptable,
        Some(_) => Favorability::Poor,
    }
}

/// True when there are at least three signals and the bullish and bearish
/// counts differ by no more than 30% of all of them. Neutral signals count
/// toward the total.
pub fn has_contradictions(signals: impl IntoIterator<Item = SignalBias>) -> bool {
    let mut bullish = 0usize;
    let mut bearish = 0usize;
    let mut total = 0usize;
    for bias in signals {
        total += 1;
        match bias {
            SignalBias::Bullish => bullish += 1,
            SignalBias::Bearish => bearish += 1,
            SignalBias::Neutral => {}
        }
    }
    total >= 3 && (bullish.abs_diff(bearish) as f64) <= 0.3 * total as f64
}

pub fn get_recommendation(
    score: f64,
    confidence: Confidence,
    inputs: &RiskInputs,
    signals: impl IntoIterator<Item = SignalBias>,
) -> RecommendationResult {
    let risk_reward_ratio = inputs.risk_reward_ratio.or_else(|| {
        calculate_risk_reward_ratio(inputs.entry_price, inputs.stop_loss, inputs.target_price, inputs.risk_score)
    });
    let favorability = assess_favorability(risk_reward_ratio);
    let acceptable_or_better = favorability != Favorability::Poor;
    let contradictions = has_contradictions(signals);

    let (recommendation, note) = if score >= 70.0 {
        match favorability {
            Favorability::HighlyFavorable => (Recommendation::StrongBuy, None),
            Favorability::Acceptable => (
                Recommendation::Buy,
                Some("High score with acceptable risk/reward. Consider active management of position size."),
            ),
            Favorability::Poor => (
                Recommendation::Buy,
                Some("High score but poor risk/reward. Wait for better entry or reduce position size."),
            ),
        }
    } else if score >= 60.0 {
        if acceptable_or_better {
            (Recommendation::Buy, None)
        } else {
            (
                Recommendation::Neutral,
                Some("Moderate positive score but unattractive risk/reward. Wait for better opportunity."),
            )
        }
    } else if score >= 45.0 {
        let note = if contradictions {
            "Mixed signals from agents. No clear directional bias."
        } else {
            "Score in neutral zone. Monitor for clearer bullish or bearish setup."
        };
        (Recommendation::Neutral, Some(note))
    } else if score >= 35.0 {
        if acceptable_or_better {
            (
                Recommendation::Sell,
                Some("Bearish outlook with acceptable risk/reward (typically for F&O stocks)."),
            )
        } else {
            (
                Recommendation::Neutral,
                Some("Bearish tilt but poor risk/reward. Avoid taking fresh short positions."),
            )
        }
    } else if acceptable_or_better && !contradictions {
        (
            Recommendation::StrongSell,
            Some("Strongly bearish outlook with favorable risk/reward (primarily for F&O instruments)."),
        )
    } else {
        (
            Recommendation::Sell,
            Some("Very weak score but either mixed signals or poor risk/reward. Treat as Sell, not Strong Sell."),
        )
    };

    RecommendationResult {
        recommendation,
        score,
        confidence,
        color_scheme: recommendation.color_scheme(),
        risk_reward_ratio,
        is_actionable: recommendation.is_actionable(),
        note: note.map(str::to_string),
    }
}

/// Drop Neutral and Hold labels
pub fn filter_actionable<'a, T, F>(items: &'a [T], label: F) -> Vec<&'a T>
where
    F: Fn(&T) -> &str,
{
    items
        .iter()
        .filter(|item| !matches!(label(item), "Neutral" | "Hold"))
        .collect()
}

/// Headline for a top picks list of `count` actionable entries
pub fn display_text(count: usize) -> String {
    match count {
        0 => "No strong opportunities today. Market conditions unclear.".to_string(),
        1 => "Only 1 actionable opportunity today".to_string(),
        n if n < 5 => format!("Only {n} actionable opportunities today"),
        n => format!("Top {n} Trading Opportunities"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use SignalBias::{Bearish, Bullish, Neutral};

    fn rec(score: f64, inputs: RiskInputs, signals: &[SignalBias]) -> RecommendationResult {
        get_recommendation(score, Confidence::Medium, &inputs, signals.iter().copied())
    }

    fn ratio(rr: f64) -> RiskInputs {
        RiskInputs {
            risk_reward_ratio: Some(rr),
            ..RiskInputs::default()
        }
    }

    #[test]
    fn test_risk_reward_from_levels() {
        let rr = calculate_risk_reward_ratio(Some(100.0), Some(95.0), Some(115.0), None).unwrap();
        assert!((rr - 3.0).abs() < 1e-9);

        // risk score 50 scales by 1.0
        let rr = calculate_risk_reward_ratio(Some(100.0), Some(95.0), Some(115.0), Some(50.0)).unwrap();
        assert!((rr - 3.0).abs() < 1e-9);

        let rr = calculate_risk_reward_ratio(None, None, None, Some(75.0)).unwrap();
        assert!((rr - 2.5).abs() < 1e-9);

        assert_eq!(calculate_risk_reward_ratio(Some(100.0), Some(100.0), Some(110.0), None), None);
        assert_eq!(calculate_risk_reward_ratio(Some(100.0), Some(0.0), Some(110.0), None), None);
        assert_eq!(calculate_risk_reward_ratio(None, None, None, None), None);
    }

    #[test]
    fn test_favorability() {
        assert_eq!(assess_favorability(None), Favorability::Acceptable);
        assert_eq!(assess_favorability(Some(2.5)), Favorability::HighlyFavorable);
        assert_eq!(assess_favorability(Some(1.5)), Favorability::Acceptable);
        assert_eq!(assess_favorability(Some(1.49)), Favorability::Poor);
    }

    #[test]
    fn test_contradictions() {
        assert!(has_contradictions([Bullish, Bearish, Bullish, Bearish]));
        assert!(!has_contradictions([Bullish, Bearish]));
        assert!(!has_contradictions([Bullish, Bullish, Bullish, Bearish]));
        assert!(has_contradictions([Neutral, Neutral, Neutral]));
        assert!(has_contradictions([Bullish, Neutral, Neutral, Neutral, Neutral, Neutral]));
        assert!(!has_contradictions([Bullish, Bullish, Neutral]));
    }

    #[test]
    fn test_mostly_neutral_signals_downgrade_strong_sell() {
        let signals = [Bullish, Neutral, Neutral, Neutral, Neutral, Neutral];
        let result = rec(20.0, RiskInputs::default(), &signals);
        assert_eq!(result.recommendation, Recommendation::Sell);
        assert!(result.note.unwrap().starts_with("Very weak score but either mixed signals"));
    }

    #[test]
    fn test_high_band() {
        assert_eq!(rec(75.0, ratio(3.0), &[]).recommendation, Recommendation::StrongBuy);

        let acceptable = rec(75.0, RiskInputs::default(), &[]);
        assert_eq!(acceptable.recommendation, Recommendation::Buy);
        assert!(acceptable.note.unwrap().starts_with("High score with acceptable"));

        let poor = rec(75.0, ratio(1.0), &[]);
        assert_eq!(poor.recommendation, Recommendation::Buy);
        assert!(poor.note.unwrap().starts_with("High score but poor"));
    }

    #[test]
    fn test_buy_band() {
        assert_eq!(rec(65.0, ratio(2.0), &[]).recommendation, Recommendation::Buy);
        let poor = rec(65.0, ratio(1.0), &[]);
        assert_eq!(poor.recommendation, Recommendation::Neutral);
        assert!(!poor.is_actionable);
    }

    #[test]
    fn test_neutral_band_notes() {
        let mixed = rec(50.0, RiskInputs::default(), &[Bullish, Bearish, Bullish, Bearish]);
        assert_eq!(mixed.recommendation, Recommendation::Neutral);
        assert_eq!(mixed.note.as_deref(), Some("Mixed signals from agents. No clear directional bias."));

        let quiet = rec(50.0, RiskInputs::default(), &[Bullish]);
        assert!(quiet.note.unwrap().starts_with("Score in neutral zone"));
    }

    #[test]
    fn test_sell_bands() {
        assert_eq!(rec(40.0, RiskInputs::default(), &[]).recommendation, Recommendation::Sell);
        assert_eq!(rec(40.0, ratio(1.0), &[]).recommendation, Recommendation::Neutral);

        assert_eq!(rec(20.0, ratio(2.0), &[]).recommendation, Recommendation::StrongSell);
        assert_eq!(rec(20.0, ratio(1.0), &[]).recommendation, Recommendation::Sell);
        let mixed = rec(20.0, ratio(3.0), &[Bullish, Bearish, Bullish, Bearish]);
        assert_eq!(mixed.recommendation, Recommendation::Sell);
    }

    #[test]
    fn test_result_carries_colors() {
        let result = rec(75.0, ratio(3.0), &[]);
        assert_eq!(result.color_scheme.text, "#166534");
        assert_eq!(result.risk_reward_ratio, Some(3.0));
        assert!(result.is_actionable);
        assert_eq!(result.recommendation.to_string(), "Strong Buy");
        assert_eq!(serde_json::to_value(result.recommendation).unwrap(), "Strong Buy");
    }

    #[test]
    fn test_filter_actionable() {
        let labels = ["Buy", "Neutral", "Hold", "Strong Sell"];
        let kept = filter_actionable(&labels, |l| *l);
        assert_eq!(kept, vec![&"Buy", &"Strong Sell"]);
    }

    #[test]
    fn test_display_text() {
        assert_eq!(display_text(0), "No strong opportunities today. Market conditions unclear.");
        assert_eq!(display_text(1), "Only 1 actionable opportunity today");
        assert_eq!(display_text(3), "Only 3 actionable opportunities today");
        assert_eq!(display_text(5), "Top 5 Trading Opportunities");
    }
}
