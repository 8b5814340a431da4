use std::sync::Arc;

use analysis_core::{Bar, NewsArticle};
use chrono::{Duration, TimeZone, Utc};

use crate::memory::InMemoryMarketData;

/// `n` daily bars with closes following `f(i)`, 1.5% high/low spread.
pub fn bars_from(n: usize, volume: f64, f: impl Fn(usize) -> f64) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let close = f(i);
            let open = if i == 0 { close } else { f(i - 1) };
            Bar {
                timestamp: start + Duration::days(i as i64),
                open,
                high: open.max(close) * 1.0075,
                low: open.min(close) * 0.9925,
                close,
                volume,
                vwap: None,
            }
        })
        .collect()
}

pub fn uptrend(n: usize) -> Vec<Bar> {
    bars_from(n, 1_000_000.0, |i| 100.0 * 1.01f64.powi(i as i32))
}

pub fn downtrend(n: usize) -> Vec<Bar> {
    bars_from(n, 1_000_000.0, |i| 200.0 * 0.99f64.powi(i as i32))
}

pub fn article(title: &str, hours_ago: i64) -> NewsArticle {
    NewsArticle {
        id: format!("{title}-{hours_ago}"),
        title: title.to_string(),
        description: None,
        source: None,
        published_utc: Utc::now() - Duration::hours(hours_ago),
        tickers: vec![],
    }
}

pub fn provider_with(symbol: &str, bars: Vec<Bar>) -> Arc<InMemoryMarketData> {
    let provider = InMemoryMarketData::new();
    provider.insert_bars(symbol, bars);
    Arc::new(provider)
}
