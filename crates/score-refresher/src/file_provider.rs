use std::path::{Path, PathBuf};

use analysis_core::{AnalysisError, Bar, MarketDataProvider, NewsArticle};
use async_trait::async_trait;
use serde::de::DeserializeOwned;

/// Reads daily bars from `{data_dir}/bars/{SYMBOL}.json` and articles from
/// `{data_dir}/news/{SYMBOL}.json`, both JSON arrays.
pub struct JsonFileProvider {
    data_dir: PathBuf,
}

impl JsonFileProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn path(&self, kind: &str, symbol: &str) -> PathBuf {
        self.data_dir.join(kind).join(format!("{}.json", symbol.to_uppercase()))
    }
}

/// `Ok(None)` when the file does not exist
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, AnalysisError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AnalysisError::DataProvider(format!("{}: {e}", path.display()))),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| AnalysisError::InvalidData(format!("{}: {e}", path.display())))
}

#[async_trait]
impl MarketDataProvider for JsonFileProvider {
    async fn fetch_bars(&self, symbol: &str, days: usize) -> Result<Vec<Bar>, AnalysisError> {
        let path = self.path("bars", symbol);
        let mut bars: Vec<Bar> = read_json(&path)
            .await?
            .ok_or_else(|| AnalysisError::DataProvider(format!("no bars for {symbol} at {}", path.display())))?;
        bars.sort_by_key(|b| b.timestamp);
        let start = bars.len().saturating_sub(days);
        Ok(bars.split_off(start))
    }

    async fn fetch_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsArticle>, AnalysisError> {
        let mut news: Vec<NewsArticle> = read_json(&self.path("news", symbol)).await?.unwrap_or_default();
        news.sort_by(|a, b| b.published_utc.cmp(&a.published_utc));
        news.truncate(limit);
        Ok(news)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use tempfile::tempdir;

    fn write(dir: &Path, kind: &str, symbol: &str, value: serde_json::Value) {
        let folder = dir.join(kind);
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join(format!("{symbol}.json")), value.to_string()).unwrap();
    }

    fn bar(day: i64, close: f64) -> serde_json::Value {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day);
        json!({ "timestamp": ts, "open": close, "high": close + 1.0, "low": close - 1.0, "close": close, "volume": 1000.0 })
    }

    #[tokio::test]
    async fn test_bars_are_sorted_and_trimmed() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bars", "SBIN", json!([bar(2, 102.0), bar(0, 100.0), bar(1, 101.0)]));
        let provider = JsonFileProvider::new(dir.path());

        let bars = provider.fetch_bars("sbin", 2).await.unwrap();
        assert_eq!(bars.iter().map(|b| b.close).collect::<Vec<_>>(), vec![101.0, 102.0]);
        assert_eq!(bars[0].vwap, None);
    }

    #[tokio::test]
    async fn test_missing_bars_is_provider_error() {
        let dir = tempdir().unwrap();
        let provider = JsonFileProvider::new(dir.path());
        assert!(matches!(
            provider.fetch_bars("TCS", 10).await,
            Err(AnalysisError::DataProvider(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_bars_is_invalid_data() {
        let dir = tempdir().unwrap();
        write(dir.path(), "bars", "TCS", json!({ "not": "an array" }));
        let provider = JsonFileProvider::new(dir.path());
        assert!(matches!(
            provider.fetch_bars("TCS", 10).await,
            Err(AnalysisError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn test_news_newest_first_and_missing_is_empty() {
        let dir = tempdir().unwrap();
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        write(
            dir.path(),
            "news",
            "INFY",
            json!([
                { "id": "1", "title": "old", "published_utc": base },
                { "id": "2", "title": "new", "published_utc": base + Duration::hours(5) },
                { "id": "3", "title": "mid", "published_utc": base + Duration::hours(2) },
            ]),
        );
        let provider = JsonFileProvider::new(dir.path());

        let news = provider.fetch_news("INFY", 2).await.unwrap();
        assert_eq!(news.iter().map(|n| n.title.as_str()).collect::<Vec<_>>(), vec!["new", "mid"]);
        assert!(provider.fetch_news("WIPRO", 5).await.unwrap().is_empty());
    }
}
