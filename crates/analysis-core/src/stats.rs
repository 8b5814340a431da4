//! Small statistics helpers shared by the agents.

/// Trading days per year, used to annualize daily volatility.
pub const TRADING_DAYS: f64 = 252.0;

/// Compute the mean of a data slice.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Compute sample standard deviation.
pub fn std_dev(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }
    let m = mean(data);
    let variance = data.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (data.len() - 1) as f64;
    variance.sqrt()
}

/// Simple period-over-period returns. Zero prices are skipped.
pub fn returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect()
}

/// Annualized volatility in percent from a daily close series.
pub fn annualized_volatility(closes: &[f64]) -> f64 {
    std_dev(&returns(closes)) * TRADING_DAYS.sqrt() * 100.0
}

/// Sample covariance of two equally long series (uses the shorter tail).
pub fn covariance(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];
    let (ma, mb) = (mean(a), mean(b));
    a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum::<f64>() / (n - 1) as f64
}

/// Beta of `asset` returns against `benchmark` returns.
/// None when the benchmark has no variance or the overlap is too short.
pub fn beta(asset: &[f64], benchmark: &[f64]) -> Option<f64> {
    let n = asset.len().min(benchmark.len());
    if n < 10 {
        return None;
    }
    let bench = &benchmark[benchmark.len() - n..];
    let var = std_dev(bench).powi(2);
    if var < f64::EPSILON {
        return None;
    }
    Some(covariance(asset, benchmark) / var)
}

/// Percentage change between the value `lookback` periods ago and the last value.
pub fn rate_of_change(prices: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || prices.len() <= lookback {
        return None;
    }
    let past = prices[prices.len() - 1 - lookback];
    let last = *prices.last()?;
    if past == 0.0 {
        return None;
    }
    Some((last - past) / past * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std_dev() {
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&data) - 5.0).abs() < 1e-9);
        assert!((std_dev(&data) - 2.138).abs() < 0.01);
        assert_eq!(std_dev(&[1.0]), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_returns() {
        let r = returns(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 2);
        assert!((r[0] - 0.10).abs() < 1e-9);
        assert!((r[1] + 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_beta_of_scaled_series() {
        let bench: Vec<f64> = (0..30).map(|i| ((i as f64) * 0.7).sin() / 100.0).collect();
        let asset: Vec<f64> = bench.iter().map(|r| r * 1.5).collect();
        let b = beta(&asset, &bench).unwrap();
        assert!((b - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_beta_needs_variance() {
        let flat = vec![0.0; 30];
        let asset: Vec<f64> = (0..30).map(|i| i as f64 / 100.0).collect();
        assert!(beta(&asset, &flat).is_none());
        assert!(beta(&asset[..5], &asset[..5]).is_none());
    }

    #[test]
    fn test_rate_of_change() {
        let prices = vec![100.0, 105.0, 110.0];
        assert!((rate_of_change(&prices, 2).unwrap() - 10.0).abs() < 1e-9);
        assert!(rate_of_change(&prices, 3).is_none());
    }

    #[test]
    fn test_annualized_volatility_flat_is_zero() {
        assert_eq!(annualized_volatility(&[50.0; 20]), 0.0);
    }
}
