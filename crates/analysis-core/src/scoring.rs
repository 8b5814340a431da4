use crate::Confidence;

/// Map `raw` from [min, max] onto 0-100, clamped. Degenerate ranges give 50.
pub fn normalize_score(raw: f64, min: f64, max: f64) -> f64 {
    if (max - min).abs() < f64::EPSILON {
        return 50.0;
    }
    (((raw - min) / (max - min)) * 100.0).clamp(0.0, 100.0)
}

/// Confidence from score level and how many signals back it up.
pub fn confidence_for(score: f64, signal_count: usize) -> Confidence {
    if score >= 75.0 && signal_count >= 3 {
        Confidence::High
    } else if score >= 50.0 && signal_count >= 2 {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Plain-English label for a 0-100 score
pub fn score_outlook(score: f64) -> &'static str {
    if score >= 75.0 {
        "strong bullish"
    } else if score >= 60.0 {
        "moderately bullish"
    } else if score >= 50.0 {
        "neutral"
    } else if score >= 35.0 {
        "moderately bearish"
    } else {
        "bearish"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_score() {
        assert!((normalize_score(5.0, 0.0, 10.0) - 50.0).abs() < 1e-9);
        assert_eq!(normalize_score(20.0, 0.0, 10.0), 100.0);
        assert_eq!(normalize_score(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(normalize_score(3.0, 4.0, 4.0), 50.0);
    }

    #[test]
    fn test_confidence_for() {
        assert_eq!(confidence_for(80.0, 3), Confidence::High);
        assert_eq!(confidence_for(80.0, 2), Confidence::Medium);
        assert_eq!(confidence_for(55.0, 5), Confidence::Medium);
        assert_eq!(confidence_for(40.0, 5), Confidence::Low);
        assert_eq!(confidence_for(90.0, 1), Confidence::Low);
    }

    #[test]
    fn test_score_outlook() {
        assert_eq!(score_outlook(80.0), "strong bullish");
        assert_eq!(score_outlook(50.0), "neutral");
        assert_eq!(score_outlook(10.0), "bearish");
    }
}
