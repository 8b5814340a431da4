//! Runs the registered agents for a symbol concurrently and blends their
//! scores into one [`AggregatedAnalysis`].

use analysis_core::{Agent, AgentContext, AgentResult, AnalysisError};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub mod aggregate;
pub use aggregate::{
    aggregate, recommendation_label, weight_for, AgentBreakdown, AggregatedAnalysis, TaggedSignal, FALLBACK_WEIGHT,
};

/// Accepted deviation of the weight sum from 1.0
const WEIGHT_TOLERANCE: f64 = 0.01;

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub agent_timeout: std::time::Duration,
    pub cache_ttl: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            agent_timeout: std::time::Duration::from_secs(15),
            cache_ttl: Duration::seconds(300),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentStatus {
    pub total_agents: usize,
    pub agents: Vec<AgentInfo>,
    pub weights: HashMap<String, f64>,
}

pub struct AgentCoordinator {
    /// Registration order is the run and report order
    agents: Vec<Arc<dyn Agent>>,
    weights: HashMap<String, f64>,
    config: CoordinatorConfig,
    /// Per (agent, symbol) results
    result_cache: DashMap<(String, String), CacheEntry<AgentResult>>,
}

impl AgentCoordinator {
    pub fn new(weights: HashMap<String, f64>, config: CoordinatorConfig) -> Self {
        Self {
            agents: Vec::new(),
            weights,
            config,
            result_cache: DashMap::new(),
        }
    }

    /// Register an agent. An agent with the same name is replaced in place.
    pub fn register_agent(&mut self, agent: Arc<dyn Agent>) {
        match self.agents.iter().position(|a| a.name() == agent.name()) {
            Some(i) => self.agents[i] = agent,
            None => self.agents.push(agent),
        }
    }

    pub fn with_agents(mut self, agents: impl IntoIterator<Item = Arc<dyn Agent>>) -> Self {
        for agent in agents {
            self.register_agent(agent);
        }
        self
    }

    /// Replace the weight map. Weights must be non-negative and sum to 1.0 (±0.01).
    pub fn set_weights(&mut self, weights: HashMap<String, f64>) -> Result<(), AnalysisError> {
        if let Some((name, w)) = weights.iter().find(|(_, w)| **w < 0.0 || !w.is_finite()) {
            return Err(AnalysisError::InvalidWeights(format!("{name} has weight {w}")));
        }
        let total: f64 = weights.values().sum();
        if (total - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(AnalysisError::InvalidWeights(format!("weights sum to {total:.3}, expected 1.0")));
        }
        self.weights = weights;
        Ok(())
    }

    pub fn weights(&self) -> &HashMap<String, f64> {
        &self.weights
    }

    fn has_agent(&self, name: &str) -> bool {
        self.agents.iter().any(|a| a.name() == name)
    }

    /// Fill neutral placeholders for agents that read optional context and
    /// stamp the analysis time.
    fn build_context(&self, base: Option<AgentContext>) -> AgentContext {
        let mut context = base.unwrap_or_default();
        if context.global_market.is_none() && self.has_agent("global") {
            context.global_market = Some(serde_json::json!({ "sentiment": "Neutral" }));
        }
        if context.policy_events.is_none() && self.has_agent("policy") {
            context.policy_events = Some(serde_json::json!({ "recent": [], "upcoming": [] }));
        }
        context.analysis_time = Utc::now();
        context
    }

    fn cached_result(&self, agent: &str, symbol: &str) -> Option<AgentResult> {
        let key = (agent.to_string(), symbol.to_string());
        let entry = self.result_cache.get(&key)?;
        if Utc::now() - entry.cached_at < self.config.cache_ttl {
            Some(entry.data.clone())
        } else {
            drop(entry);
            self.result_cache.remove(&key);
            None
        }
    }

    /// Run one agent under the timeout, through the result cache. Failures are
    /// logged and reported as `None`.
    async fn run_agent(&self, agent: &Arc<dyn Agent>, symbol: &str, context: &AgentContext) -> Option<AgentResult> {
        let name = agent.name();
        if let Some(cached) = self.cached_result(name, symbol) {
            tracing::debug!(agent = name, symbol, "using cached agent result");
            return Some(cached);
        }

        match tokio::time::timeout(self.config.agent_timeout, agent.analyze(symbol, context)).await {
            Ok(Ok(result)) => {
                tracing::debug!(agent = name, symbol, score = result.score, confidence = %result.confidence, "agent ok");
                self.result_cache.insert(
                    (name.to_string(), symbol.to_string()),
                    CacheEntry {
                        data: result.clone(),
                        cached_at: Utc::now(),
                    },
                );
                Some(result)
            }
            Ok(Err(e)) => {
                tracing::warn!(agent = name, symbol, error = %e, "agent failed");
                None
            }
            Err(_) => {
                let err = AnalysisError::Timeout {
                    agent: name.to_string(),
                    secs: self.config.agent_timeout.as_secs(),
                };
                tracing::warn!(symbol, "{}", err);
                None
            }
        }
    }

    /// Run the selected agents (all when `agent_names` is None) and blend their scores.
    pub async fn analyze_symbol(
        &self,
        symbol: &str,
        agent_names: Option<&[String]>,
        context: Option<AgentContext>,
    ) -> Result<AggregatedAnalysis, AnalysisError> {
        let selected: Vec<&Arc<dyn Agent>> = match agent_names {
            None => self.agents.iter().collect(),
            Some(names) => self
                .agents
                .iter()
                .filter(|a| names.iter().any(|n| n == a.name()))
                .collect(),
        };
        if selected.is_empty() {
            return Err(AnalysisError::NoAgents);
        }

        let context = self.build_context(context);
        let results: Vec<AgentResult> = join_all(selected.iter().map(|agent| self.run_agent(agent, symbol, &context)))
            .await
            .into_iter()
            .flatten()
            .collect();

        if results.is_empty() {
            return Err(AnalysisError::AllAgentsFailed(symbol.to_string()));
        }

        let analysis = aggregate(symbol, results, &self.weights);
        tracing::info!(
            symbol,
            blend_score = analysis.blend_score,
            confidence = %analysis.confidence,
            agents = analysis.agent_count,
            "analysis complete"
        );
        Ok(analysis)
    }

    /// Analyze many symbols, at most `max_concurrent` at a time. Failed symbols
    /// are logged and left out; the rest keep input order.
    pub async fn batch_analyze(
        self: &Arc<Self>,
        symbols: &[String],
        agent_names: Option<Vec<String>>,
        max_concurrent: usize,
    ) -> Vec<AggregatedAnalysis> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let agent_names = Arc::new(agent_names);
        let mut handles = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            let sem = Arc::clone(&semaphore);
            let coordinator = Arc::clone(self);
            let agent_names = Arc::clone(&agent_names);
            let symbol = symbol.clone();

            handles.push(tokio::spawn(async move {
                let _permit = sem.acquire_owned().await.ok()?;
                match coordinator.analyze_symbol(&symbol, agent_names.as_deref(), None).await {
                    Ok(analysis) => Some(analysis),
                    Err(e) => {
                        tracing::warn!(symbol = %symbol, error = %e, "analysis failed");
                        None
                    }
                }
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(analysis)) => results.push(analysis),
                Ok(None) => {}
                Err(e) => tracing::error!("analysis task panicked: {}", e),
            }
        }
        results
    }

    pub fn agent_status(&self) -> AgentStatus {
        AgentStatus {
            total_agents: self.agents.len(),
            agents: self
                .agents
                .iter()
                .map(|a| AgentInfo {
                    name: a.name().to_string(),
                    weight: weight_for(&self.weights, a.name()),
                })
                .collect(),
            weights: self.weights.clone(),
        }
    }

    pub fn clear_agent_cache(&self) {
        self.result_cache.clear();
    }
}
