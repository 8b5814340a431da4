use async_trait::async_trait;
use crate::{AgentContext, AgentResult, AnalysisError, Bar, NewsArticle};

/// A heuristic scorer. `name()` is the key used for weights and caching.
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze(&self, symbol: &str, context: &AgentContext) -> Result<AgentResult, AnalysisError>;
}

/// Source of market data for the agents
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Most recent `days` daily bars, oldest first
    async fn fetch_bars(&self, symbol: &str, days: usize) -> Result<Vec<Bar>, AnalysisError>;

    /// Most recent `limit` articles, newest first
    async fn fetch_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsArticle>, AnalysisError>;
}
