use analysis_core::Bar;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CandlestickPattern {
    Doji,
    Hammer,
    ShootingStar,
    BullishEngulfing,
    BearishEngulfing,
    MorningStar,
    EveningStar,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
}

impl CandlestickPattern {
    pub fn name(&self) -> &'static str {
        match self {
            CandlestickPattern::Doji => "Doji",
            CandlestickPattern::Hammer => "Hammer",
            CandlestickPattern::ShootingStar => "Shooting Star",
            CandlestickPattern::BullishEngulfing => "Bullish Engulfing",
            CandlestickPattern::BearishEngulfing => "Bearish Engulfing",
            CandlestickPattern::MorningStar => "Morning Star",
            CandlestickPattern::EveningStar => "Evening Star",
            CandlestickPattern::ThreeWhiteSoldiers => "Three White Soldiers",
            CandlestickPattern::ThreeBlackCrows => "Three Black Crows",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub pattern: CandlestickPattern,
    /// Index of the bar that completes the pattern
    pub index: usize,
    pub strength: f64, // 0.0 to 1.0
    /// None for indecision patterns (doji)
    pub bullish: Option<bool>,
}

struct Candle {
    body: f64,
    range: f64,
    upper_shadow: f64,
    lower_shadow: f64,
    bullish: bool,
}

fn candle(bar: &Bar) -> Candle {
    Candle {
        body: (bar.close - bar.open).abs(),
        range: bar.high - bar.low,
        upper_shadow: bar.high - bar.open.max(bar.close),
        lower_shadow: bar.open.min(bar.close) - bar.low,
        bullish: bar.close > bar.open,
    }
}

fn is_doji(bar: &Bar) -> Option<(CandlestickPattern, f64, Option<bool>)> {
    let c = candle(bar);
    if c.range > 0.0 && c.body / c.range < 0.1 {
        return Some((CandlestickPattern::Doji, 0.5, None));
    }
    None
}

/// Small body, long lower shadow, little upper shadow
fn is_hammer(bar: &Bar) -> Option<(CandlestickPattern, f64, Option<bool>)> {
    let c = candle(bar);
    if c.range == 0.0 || c.body == 0.0 {
        return None;
    }
    if c.body / c.range < 0.3 && c.lower_shadow > 2.0 * c.body && c.upper_shadow < c.body * 0.5 {
        let strength = (c.lower_shadow / c.body).min(5.0) / 5.0;
        return Some((CandlestickPattern::Hammer, strength, Some(true)));
    }
    None
}

/// Small body at the bottom, long upper shadow
fn is_shooting_star(bar: &Bar) -> Option<(CandlestickPattern, f64, Option<bool>)> {
    let c = candle(bar);
    if c.range == 0.0 || c.body == 0.0 {
        return None;
    }
    if c.body / c.range < 0.3 && c.upper_shadow > 2.0 * c.body && c.lower_shadow < c.body * 0.5 {
        let strength = (c.upper_shadow / c.body).min(5.0) / 5.0;
        return Some((CandlestickPattern::ShootingStar, strength, Some(false)));
    }
    None
}

fn is_engulfing(prev: &Bar, curr: &Bar) -> Option<(CandlestickPattern, f64, Option<bool>)> {
    let p = candle(prev);
    let c = candle(curr);
    if p.body == 0.0 {
        return None;
    }

    if !p.bullish && c.bullish && curr.open <= prev.close && curr.close >= prev.open {
        let strength = (c.body / p.body).min(2.0) / 2.0;
        return Some((CandlestickPattern::BullishEngulfing, strength, Some(true)));
    }

    if p.bullish && !c.bullish && curr.open >= prev.close && curr.close <= prev.open {
        let strength = (c.body / p.body).min(2.0) / 2.0;
        return Some((CandlestickPattern::BearishEngulfing, strength, Some(false)));
    }

    None
}

fn is_star(first: &Bar, star: &Bar, third: &Bar) -> Option<(CandlestickPattern, f64, Option<bool>)> {
    let f = candle(first);
    let s = candle(star);
    let t = candle(third);
    if f.range == 0.0 || s.body >= f.body * 0.3 {
        return None;
    }
    let first_midpoint = (first.open + first.close) / 2.0;

    if !f.bullish && t.bullish && third.close > first_midpoint {
        return Some((CandlestickPattern::MorningStar, 0.8, Some(true)));
    }
    if f.bullish && !t.bullish && third.close < first_midpoint {
        return Some((CandlestickPattern::EveningStar, 0.8, Some(false)));
    }
    None
}

fn is_three_soldiers_or_crows(w: &[Bar]) -> Option<(CandlestickPattern, f64, Option<bool>)> {
    let (a, b, c) = (&w[0], &w[1], &w[2]);

    if w.iter().all(|x| x.close > x.open)
        && b.close > a.close
        && c.close > b.close
        && b.open > a.open && b.open < a.close
        && c.open > b.open && c.open < b.close
    {
        return Some((CandlestickPattern::ThreeWhiteSoldiers, 0.8, Some(true)));
    }

    if w.iter().all(|x| x.close < x.open)
        && b.close < a.close
        && c.close < b.close
        && b.open < a.open && b.open > a.close
        && c.open < b.open && c.open > b.close
    {
        return Some((CandlestickPattern::ThreeBlackCrows, 0.8, Some(false)));
    }

    None
}

/// Detect patterns completed within the last `lookback` bars.
pub fn detect_patterns(bars: &[Bar], lookback: usize) -> Vec<PatternMatch> {
    let mut patterns = Vec::new();
    let start = bars.len().saturating_sub(lookback);

    for i in start..bars.len() {
        let mut push = |found: Option<(CandlestickPattern, f64, Option<bool>)>| {
            if let Some((pattern, strength, bullish)) = found {
                patterns.push(PatternMatch { pattern, index: i, strength, bullish });
            }
        };

        let bar = &bars[i];
        push(is_doji(bar));
        push(is_hammer(bar));
        push(is_shooting_star(bar));

        if i >= 1 {
            push(is_engulfing(&bars[i - 1], bar));
        }
        if i >= 2 {
            push(is_star(&bars[i - 2], &bars[i - 1], bar));
            push(is_three_soldiers_or_crows(&bars[i - 2..=i]));
        }
    }

    patterns
}

/// Detect trend direction using highs and lows
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trend {
    Uptrend,
    Downtrend,
    Sideways,
}

/// Least-squares slope of highs and lows over `lookback` bars, compared to the average bar range.
pub fn detect_trend(bars: &[Bar], lookback: usize) -> Trend {
    if lookback < 2 || bars.len() < lookback {
        return Trend::Sideways;
    }

    let recent = &bars[bars.len() - lookback..];
    let n = recent.len() as f64;

    let slope = |values: &[f64]| {
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = values.iter().sum::<f64>() / n;
        let num: f64 = values.iter().enumerate().map(|(i, y)| (i as f64 - x_mean) * (y - y_mean)).sum();
        let den: f64 = (0..values.len()).map(|i| (i as f64 - x_mean).powi(2)).sum();
        num / den
    };

    let highs: Vec<f64> = recent.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = recent.iter().map(|b| b.low).collect();
    let avg_slope = (slope(&highs) + slope(&lows)) / 2.0;
    let price_range = recent.iter().map(|b| b.high - b.low).sum::<f64>() / n;

    if avg_slope > price_range * 0.1 {
        Trend::Uptrend
    } else if avg_slope < -price_range * 0.1 {
        Trend::Downtrend
    } else {
        Trend::Sideways
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bar(open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar { timestamp: Utc::now(), open, high, low, close, volume: 1000.0, vwap: None }
    }

    #[test]
    fn test_hammer_detected() {
        let bars = vec![bar(100.0, 100.6, 94.0, 100.5)];
        let found = detect_patterns(&bars, 1);
        assert!(found.iter().any(|p| p.pattern == CandlestickPattern::Hammer && p.bullish == Some(true)));
    }

    #[test]
    fn test_bullish_engulfing() {
        let bars = vec![bar(105.0, 105.5, 101.5, 102.0), bar(101.5, 106.5, 101.0, 106.0)];
        let found = detect_patterns(&bars, 1);
        let p = found.iter().find(|p| p.pattern == CandlestickPattern::BullishEngulfing).unwrap();
        assert_eq!(p.index, 1);
        assert!(p.strength > 0.0 && p.strength <= 1.0);
    }

    #[test]
    fn test_bearish_engulfing() {
        let bars = vec![bar(100.0, 103.5, 99.5, 103.0), bar(103.5, 104.0, 98.0, 99.0)];
        let found = detect_patterns(&bars, 1);
        assert!(found.iter().any(|p| p.pattern == CandlestickPattern::BearishEngulfing && p.bullish == Some(false)));
    }

    #[test]
    fn test_three_white_soldiers() {
        let bars = vec![
            bar(100.0, 103.2, 99.8, 103.0),
            bar(101.5, 106.2, 101.0, 106.0),
            bar(104.5, 109.2, 104.0, 109.0),
        ];
        let found = detect_patterns(&bars, 1);
        assert!(found.iter().any(|p| p.pattern == CandlestickPattern::ThreeWhiteSoldiers));
    }

    #[test]
    fn test_lookback_limits_scan() {
        let mut bars = vec![bar(105.0, 105.5, 101.5, 102.0), bar(101.5, 106.5, 101.0, 106.0)];
        for _ in 0..5 {
            bars.push(bar(106.0, 107.0, 105.0, 106.8));
        }
        let found = detect_patterns(&bars, 3);
        assert!(found.iter().all(|p| p.index >= bars.len() - 3));
    }

    #[test]
    fn test_detect_trend() {
        let up: Vec<Bar> = (0..20).map(|i| {
            let base = 100.0 + i as f64 * 2.0;
            bar(base, base + 1.0, base - 1.0, base + 0.5)
        }).collect();
        assert_eq!(detect_trend(&up, 20), Trend::Uptrend);

        let flat: Vec<Bar> = (0..20).map(|_| bar(100.0, 101.0, 99.0, 100.0)).collect();
        assert_eq!(detect_trend(&flat, 20), Trend::Sideways);
        assert_eq!(detect_trend(&flat, 30), Trend::Sideways);
    }
}
