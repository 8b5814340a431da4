use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use analysis_core::Confidence;
use analysis_orchestrator::{AgentBreakdown, AgentCoordinator, AggregatedAnalysis, TaggedSignal};
use chrono::{DateTime, Duration, Utc};
use market_agents::risk;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::recommendation::{display_text, get_recommendation, ColorScheme, Recommendation, RiskInputs};
use crate::snapshot::ScoreSnapshot;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub snapshot_path: PathBuf,
    pub ttl_hours: i64,
    pub max_concurrent: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("data/global_scores/score_cache.json"),
            ttl_hours: 6,
            max_concurrent: 10,
        }
    }
}

/// One symbol's blended score and the recommendation derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub symbol: String,
    pub blend_score: f64,
    pub confidence: Confidence,
    pub recommendation: Recommendation,
    pub is_actionable: bool,
    pub recommendation_note: Option<String>,
    pub risk_reward_ratio: Option<f64>,
    pub color_scheme: ColorScheme,
    pub agents: Vec<AgentBreakdown>,
    pub key_signals: Vec<TaggedSignal>,
    pub reasoning: String,
    pub analyzed_at: DateTime<Utc>,
}

impl ScoreRecord {
    /// Risk/reward comes from the risk agent's score alone. Without a risk
    /// agent the ratio is unknown.
    pub fn from_analysis(analysis: AggregatedAnalysis, analyzed_at: DateTime<Utc>) -> Self {
        let inputs = RiskInputs {
            risk_score: analysis.agent(risk::NAME).map(|a| a.score),
            ..RiskInputs::default()
        };
        let rec = get_recommendation(
            analysis.blend_score,
            analysis.confidence,
            &inputs,
            analysis.key_signals.iter().map(|s| s.signal.bias()),
        );

        let reasoning = analysis
            .agents
            .iter()
            .filter(|a| !a.is_utility())
            .map(|a| format!("{}: {}", a.agent, a.reasoning))
            .collect::<Vec<_>>()
            .join(" | ");

        Self {
            symbol: analysis.symbol,
            blend_score: analysis.blend_score,
            confidence: analysis.confidence,
            recommendation: rec.recommendation,
            is_actionable: rec.is_actionable,
            recommendation_note: rec.note,
            risk_reward_ratio: rec.risk_reward_ratio,
            color_scheme: rec.color_scheme,
            agents: analysis.agents,
            key_signals: analysis.key_signals,
            reasoning,
            analyzed_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TopPicksQuery {
    pub top_n: usize,
    pub min_confidence: Confidence,
    /// Drop Neutral recommendations
    pub actionable_only: bool,
}

impl Default for TopPicksQuery {
    fn default() -> Self {
        Self {
            top_n: 5,
            min_confidence: Confidence::Medium,
            actionable_only: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPick {
    pub rank: usize,
    #[serde(flatten)]
    pub record: ScoreRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopPicks {
    pub picks: Vec<RankedPick>,
    /// Distinct symbols in the universe
    pub total_symbols: usize,
    /// Symbols with a cached score
    pub total_scored: usize,
    /// Scored symbols passing every filter before truncation to `top_n`
    pub total_eligible: usize,
    pub message: String,
}

impl TopPicks {
    pub fn rank_of(&self, symbol: &str) -> Option<usize> {
        self.picks.iter().find(|p| p.record.symbol == symbol).map(|p| p.rank)
    }
}

/// Two symbols whose ranks in one universe disagree with their global scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inconsistency {
    pub universe: String,
    pub higher: String,
    pub higher_rank: usize,
    pub lower: String,
    pub lower_rank: usize,
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (rank {}) ranked below {} (rank {})",
            self.universe, self.higher, self.higher_rank, self.lower, self.lower_rank
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversePicks {
    pub universes: BTreeMap<String, TopPicks>,
    pub inconsistencies: Vec<Inconsistency>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Cache valid and complete, nothing analyzed
    CacheHit,
    /// Only missing symbols analyzed, timestamp unchanged
    Partial,
    /// Cache rebuilt from the requested symbols
    Full,
    /// Requested symbols re-analyzed, others kept
    Forced,
}

#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub mode: RefreshMode,
    pub requested: usize,
    pub analyzed: usize,
    pub failed: usize,
    pub cached_total: usize,
}

#[derive(Default)]
struct CacheState {
    scores: BTreeMap<String, ScoreRecord>,
    timestamp: Option<DateTime<Utc>>,
}

impl CacheState {
    fn is_valid(&self, ttl: Duration) -> bool {
        match self.timestamp {
            Some(ts) => !self.scores.is_empty() && Utc::now() - ts < ttl,
            None => false,
        }
    }
}

/// Trimmed, upper-cased symbol. Empty input yields `None`.
fn normalize_symbol(symbol: &str) -> Option<String> {
    let symbol = symbol.trim();
    (!symbol.is_empty()).then(|| symbol.to_uppercase())
}

/// Blend score ordering: higher score first, symbol ascending on ties.
pub fn rank_order(a: &ScoreRecord, b: &ScoreRecord) -> std::cmp::Ordering {
    b.blend_score.total_cmp(&a.blend_score).then_with(|| a.symbol.cmp(&b.symbol))
}

/// One score per symbol shared by every universe, so rankings agree wherever
/// two symbols meet.
pub struct GlobalScoreStore {
    config: StoreConfig,
    coordinator: Arc<AgentCoordinator>,
    state: RwLock<CacheState>,
    refresh_lock: Mutex<()>,
}

impl GlobalScoreStore {
    /// Open the store, loading the snapshot when it is still valid. Load
    /// failures start an empty cache.
    pub fn open(config: StoreConfig, coordinator: Arc<AgentCoordinator>) -> Self {
        let path = &config.snapshot_path;
        let state = match ScoreSnapshot::load(path) {
            Ok(Some(mut snapshot)) => {
                snapshot.ttl_hours = config.ttl_hours;
                if snapshot.is_fresh(Utc::now()) {
                    info!(path = %path.display(), symbols = snapshot.scores.len(), "loaded score snapshot");
                    CacheState {
                        scores: snapshot.scores,
                        timestamp: snapshot.timestamp,
                    }
                } else {
                    info!(path = %path.display(), "score snapshot expired, will refresh");
                    CacheState::default()
                }
            }
            Ok(None) => {
                debug!(path = %path.display(), "no score snapshot");
                CacheState::default()
            }
            Err(e) => {
                warn!(error = %e, "failed to load score snapshot");
                CacheState::default()
            }
        };

        Self {
            config,
            coordinator,
            state: RwLock::new(state),
            refresh_lock: Mutex::new(()),
        }
    }

    fn ttl(&self) -> Duration {
        Duration::hours(self.config.ttl_hours)
    }

    pub async fn is_cache_valid(&self) -> bool {
        self.state.read().await.is_valid(self.ttl())
    }

    pub async fn cache_timestamp(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.timestamp
    }

    /// Make sure every symbol has a score, analyzing only what the cache
    /// cannot answer. Refreshes run one at a time.
    pub async fn ensure_scores_available(&self, symbols: &[String], force_refresh: bool) -> Result<RefreshSummary, StoreError> {
        let _refresh = self.refresh_lock.lock().await;
        if force_refresh {
            self.coordinator.clear_agent_cache();
        }
        let requested: BTreeSet<String> = symbols.iter().filter_map(|s| normalize_symbol(s)).collect();

        let (mode, to_analyze) = {
            let state = self.state.read().await;
            let valid = state.is_valid(self.ttl());
            if force_refresh {
                let mode = if valid { RefreshMode::Forced } else { RefreshMode::Full };
                (mode, requested.iter().cloned().collect::<Vec<_>>())
            } else if valid {
                let missing: Vec<String> = requested.iter().filter(|s| !state.scores.contains_key(*s)).cloned().collect();
                if missing.is_empty() {
                    info!(symbols = requested.len(), "score cache hit");
                    return Ok(RefreshSummary {
                        mode: RefreshMode::CacheHit,
                        requested: requested.len(),
                        analyzed: 0,
                        failed: 0,
                        cached_total: state.scores.len(),
                    });
                }
                info!(missing = missing.len(), "partial score cache hit");
                (RefreshMode::Partial, missing)
            } else {
                info!(symbols = requested.len(), "score cache invalid, analyzing all symbols");
                (RefreshMode::Full, requested.iter().cloned().collect())
            }
        };

        let started = Instant::now();
        let analyses = self
            .coordinator
            .batch_analyze(&to_analyze, None, self.config.max_concurrent)
            .await;
        let analyzed_at = Utc::now();
        let analyzed = analyses.len();
        info!(
            symbols = to_analyze.len(),
            analyzed,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "score analysis complete"
        );

        let snapshot = {
            let mut state = self.state.write().await;
            if mode == RefreshMode::Full {
                state.scores.clear();
            }
            for analysis in analyses {
                let record = ScoreRecord::from_analysis(analysis, analyzed_at);
                state.scores.insert(record.symbol.clone(), record);
            }
            if mode != RefreshMode::Partial {
                state.timestamp = Some(analyzed_at);
            }
            ScoreSnapshot {
                timestamp: state.timestamp,
                scores: state.scores.clone(),
                ttl_hours: self.config.ttl_hours,
            }
        };

        if let Err(e) = snapshot.save(&self.config.snapshot_path) {
            error!(error = %e, "failed to save score snapshot");
            return Err(e);
        }
        info!(symbols = snapshot.scores.len(), "score snapshot saved");

        Ok(RefreshSummary {
            mode,
            requested: requested.len(),
            analyzed,
            failed: to_analyze.len() - analyzed,
            cached_total: snapshot.scores.len(),
        })
    }

    /// Rank a universe from the shared scores. Symbols without a score are
    /// skipped.
    pub async fn top_picks_for_universe(&self, symbols: &[String], query: &TopPicksQuery) -> TopPicks {
        let universe: BTreeSet<String> = symbols.iter().filter_map(|s| normalize_symbol(s)).collect();
        let mut candidates: Vec<ScoreRecord> = {
            let state = self.state.read().await;
            universe.iter().filter_map(|s| state.scores.get(s).cloned()).collect()
        };
        let total_scored = candidates.len();

        candidates.retain(|r| r.confidence.level() >= query.min_confidence.level());
        if query.actionable_only {
            candidates.retain(|r| r.is_actionable);
        }
        candidates.sort_by(rank_order);
        let total_eligible = candidates.len();

        let picks: Vec<RankedPick> = candidates
            .into_iter()
            .take(query.top_n)
            .enumerate()
            .map(|(i, record)| RankedPick { rank: i + 1, record })
            .collect();

        debug!(
            picks = picks.len(),
            eligible = total_eligible,
            scored = total_scored,
            universe = universe.len(),
            "top picks selected"
        );

        TopPicks {
            message: display_text(picks.len()),
            picks,
            total_symbols: universe.len(),
            total_scored,
            total_eligible,
        }
    }

    pub async fn get_score(&self, symbol: &str) -> Option<ScoreRecord> {
        let symbol = normalize_symbol(symbol)?;
        self.state.read().await.scores.get(&symbol).cloned()
    }

    pub async fn all_scores(&self) -> BTreeMap<String, ScoreRecord> {
        self.state.read().await.scores.clone()
    }

    /// Drop every score and remove the snapshot so a restart does not
    /// resurrect them.
    pub async fn invalidate(&self) -> Result<(), StoreError> {
        let _refresh = self.refresh_lock.lock().await;
        {
            let mut state = self.state.write().await;
            state.scores.clear();
            state.timestamp = None;
        }
        let path = &self.config.snapshot_path;
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(path, e)),
        }
        info!("score cache invalidated");
        Ok(())
    }

    /// Score the union of all universes once, then rank each universe from
    /// those shared scores.
    pub async fn consistent_top_picks(
        &self,
        universes: &BTreeMap<String, Vec<String>>,
        top_n: usize,
        force_refresh: bool,
    ) -> Result<UniversePicks, StoreError> {
        let all: Vec<String> = universes
            .values()
            .flatten()
            .filter_map(|s| normalize_symbol(s))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        info!(symbols = all.len(), universes = universes.len(), "computing consistent top picks");

        self.ensure_scores_available(&all, force_refresh).await?;

        let query = TopPicksQuery {
            top_n,
            ..TopPicksQuery::default()
        };
        let mut picks = BTreeMap::new();
        for (name, symbols) in universes {
            picks.insert(name.clone(), self.top_picks_for_universe(symbols, &query).await);
        }

        let inconsistencies = verify_consistency(&picks, universes);
        Ok(UniversePicks {
            universes: picks,
            inconsistencies,
            generated_at: Utc::now(),
        })
    }
}

/// Check that every pair of symbols common to all universes is ordered the
/// same way wherever both were picked. Returns the violations.
pub fn verify_consistency(
    results: &BTreeMap<String, TopPicks>,
    universes: &BTreeMap<String, Vec<String>>,
) -> Vec<Inconsistency> {
    if universes.len() < 2 {
        return Vec::new();
    }
    let mut sets = universes
        .values()
        .map(|syms| syms.iter().filter_map(|s| normalize_symbol(s)).collect::<BTreeSet<String>>());
    let Some(first) = sets.next() else {
        return Vec::new();
    };
    let common: BTreeSet<String> = sets.fold(first, |acc, set| &acc & &set);
    if common.is_empty() {
        debug!("no common symbols between universes");
        return Vec::new();
    }

    let mut inconsistencies = Vec::new();
    for (universe, picks) in results {
        let picked: Vec<&RankedPick> = picks.picks.iter().filter(|p| common.contains(&p.record.symbol)).collect();
        for (i, a) in picked.iter().enumerate() {
            for b in &picked[i + 1..] {
                let (better, worse) = match rank_order(&a.record, &b.record) {
                    std::cmp::Ordering::Greater => (b, a),
                    _ => (a, b),
                };
                if better.rank > worse.rank {
                    inconsistencies.push(Inconsistency {
                        universe: universe.clone(),
                        higher: better.record.symbol.clone(),
                        higher_rank: better.rank,
                        lower: worse.record.symbol.clone(),
                        lower_rank: worse.rank,
                    });
                }
            }
        }
    }

    if inconsistencies.is_empty() {
        info!(common = common.len(), "rankings consistent across universes");
    } else {
        warn!(count = inconsistencies.len(), "ranking inconsistencies found");
        for issue in inconsistencies.iter().take(5) {
            warn!("{}", issue);
        }
    }
    inconsistencies
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
