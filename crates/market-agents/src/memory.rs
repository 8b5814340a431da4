use analysis_core::{AnalysisError, Bar, MarketDataProvider, NewsArticle};
use async_trait::async_trait;
use dashmap::DashMap;

/// Provider backed by in-process maps. Used for replays and tests.
#[derive(Default)]
pub struct InMemoryMarketData {
    bars: DashMap<String, Vec<Bar>>,
    news: DashMap<String, Vec<NewsArticle>>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bars must be oldest first.
    pub fn insert_bars(&self, symbol: &str, bars: Vec<Bar>) {
        self.bars.insert(symbol.to_uppercase(), bars);
    }

    pub fn insert_news(&self, symbol: &str, mut news: Vec<NewsArticle>) {
        news.sort_by(|a, b| b.published_utc.cmp(&a.published_utc));
        self.news.insert(symbol.to_uppercase(), news);
    }
}

#[async_trait]
impl MarketDataProvider for InMemoryMarketData {
    async fn fetch_bars(&self, symbol: &str, days: usize) -> Result<Vec<Bar>, AnalysisError> {
        let bars = self
            .bars
            .get(&symbol.to_uppercase())
            .ok_or_else(|| AnalysisError::DataProvider(format!("no bars for {symbol}")))?;
        let start = bars.len().saturating_sub(days);
        Ok(bars[start..].to_vec())
    }

    async fn fetch_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsArticle>, AnalysisError> {
        Ok(self
            .news
            .get(&symbol.to_uppercase())
            .map(|n| n.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
