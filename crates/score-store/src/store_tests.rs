use super::*;
use analysis_core::{Agent, AgentContext, AgentResult, AgentSignal, AnalysisError};
use analysis_orchestrator::CoordinatorConfig;
use async_trait::async_trait;
use market_agents::technical;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::{tempdir, TempDir};

/// Scores symbols from a table and reports fixed price levels. Unknown
/// symbols fail.
struct TableAgent {
    table: std::sync::Mutex<HashMap<String, (f64, Confidence)>>,
    calls: AtomicUsize,
    delay: std::time::Duration,
}

impl TableAgent {
    fn new(rows: &[(&str, f64, Confidence)]) -> Arc<Self> {
        Self::slow(rows, std::time::Duration::ZERO)
    }

    fn slow(rows: &[(&str, f64, Confidence)], delay: std::time::Duration) -> Arc<Self> {
        Arc::new(Self {
            table: std::sync::Mutex::new(rows.iter().map(|(s, score, c)| (s.to_string(), (*score, *c))).collect()),
            calls: AtomicUsize::new(0),
            delay,
        })
    }

    fn set(&self, symbol: &str, score: f64, confidence: Confidence) {
        self.table.lock().unwrap().insert(symbol.to_string(), (score, confidence));
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for TableAgent {
    fn name(&self) -> &str {
        technical::NAME
    }

    async fn analyze(&self, symbol: &str, _context: &AgentContext) -> Result<AgentResult, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let row = self.table.lock().unwrap().get(symbol).copied();
        let (score, confidence) = row.ok_or_else(|| AnalysisError::DataProvider(format!("no data for {symbol}")))?;
        Ok(AgentResult::new(
            technical::NAME,
            symbol,
            score,
            confidence,
            vec![AgentSignal::new("TREND", "up", "Bullish")],
            "table",
        )
        .with_metadata(serde_json::json!({
            "entry_price": 100.0,
            "stop_loss": 95.0,
            "target_price": 115.0,
        })))
    }
}

/// Risk agent stand-in with a fixed safety score.
struct FixedRiskAgent(f64);

#[async_trait]
impl Agent for FixedRiskAgent {
    fn name(&self) -> &str {
        risk::NAME
    }

    async fn analyze(&self, symbol: &str, _context: &AgentContext) -> Result<AgentResult, AnalysisError> {
        Ok(AgentResult::new(risk::NAME, symbol, self.0, Confidence::High, vec![], "fixed"))
    }
}

fn rows() -> Vec<(&'static str, f64, Confidence)> {
    vec![
        ("SBIN", 82.0, Confidence::High),
        ("ICICIBANK", 75.0, Confidence::Medium),
        ("HDFCBANK", 75.0, Confidence::Medium),
        ("TCS", 66.0, Confidence::Medium),
        ("INFY", 52.0, Confidence::Medium),
        ("ITC", 90.0, Confidence::Low),
        ("PNB", 30.0, Confidence::High),
    ]
}

fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn universes() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        (
            "nifty50".to_string(),
            symbols(&["RELIANCE", "TCS", "HDFCBANK", "ICICIBANK", "SBIN", "INFY", "ITC"]),
        ),
        ("banknifty".to_string(), symbols(&["HDFCBANK", "ICICIBANK", "SBIN", "PNB"])),
    ])
}

struct Fixture {
    agent: Arc<TableAgent>,
    coordinator: Arc<AgentCoordinator>,
    config: StoreConfig,
    _dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self::with_agent(TableAgent::new(&rows()), None)
    }

    /// Table agent plus an optional weight 0 risk agent.
    fn with_agent(agent: Arc<TableAgent>, risk_score: Option<f64>) -> Self {
        let dir = tempdir().unwrap();
        let mut weights = HashMap::from([(technical::NAME.to_string(), 1.0)]);
        let mut agents: Vec<Arc<dyn Agent>> = vec![Arc::clone(&agent) as Arc<dyn Agent>];
        if let Some(score) = risk_score {
            weights.insert(risk::NAME.to_string(), 0.0);
            agents.push(Arc::new(FixedRiskAgent(score)));
        }
        let coordinator = Arc::new(AgentCoordinator::new(weights, CoordinatorConfig::default()).with_agents(agents));
        let config = StoreConfig {
            snapshot_path: dir.path().join("global_scores").join("score_cache.json"),
            ttl_hours: 6,
            max_concurrent: 3,
        };
        Self {
            agent,
            coordinator,
            config,
            _dir: dir,
        }
    }

    fn open(&self) -> GlobalScoreStore {
        GlobalScoreStore::open(self.config.clone(), Arc::clone(&self.coordinator))
    }
}

#[tokio::test]
async fn test_full_refresh_scores_and_persists() {
    let fx = Fixture::new();
    let store = fx.open();
    assert!(!store.is_cache_valid().await);

    let all = symbols(&["sbin", "TCS", "RELIANCE", "PNB"]);
    let summary = store.ensure_scores_available(&all, false).await.unwrap();
    assert_eq!(summary.mode, RefreshMode::Full);
    assert_eq!(summary.requested, 4);
    assert_eq!(summary.analyzed, 3);
    assert_eq!(summary.failed, 1);
    assert!(store.is_cache_valid().await);
    assert!(fx.config.snapshot_path.exists());

    let sbin = store.get_score("sbin").await.unwrap();
    // price levels in the metadata do not feed risk/reward; no risk agent means unknown
    assert_eq!(sbin.recommendation, Recommendation::Buy);
    assert_eq!(sbin.risk_reward_ratio, None);
    assert!(sbin
        .recommendation_note
        .as_deref()
        .unwrap()
        .starts_with("High score with acceptable risk/reward"));
    assert!(sbin.reasoning.starts_with("technical: "));

    let pnb = store.get_score("PNB").await.unwrap();
    assert_eq!(pnb.recommendation, Recommendation::StrongSell);
    assert!(store.get_score("RELIANCE").await.is_none());
}

#[tokio::test]
async fn test_risk_agent_score_drives_risk_reward() {
    let fx = Fixture::with_agent(TableAgent::new(&rows()), Some(75.0));
    let store = fx.open();
    store.ensure_scores_available(&symbols(&["SBIN"]), false).await.unwrap();

    let sbin = store.get_score("SBIN").await.unwrap();
    // 1 + 2 * 0.75
    assert_eq!(sbin.risk_reward_ratio, Some(2.5));
    assert_eq!(sbin.recommendation, Recommendation::StrongBuy);
    assert_eq!(sbin.blend_score, 82.0);
}

#[tokio::test]
async fn test_concurrent_refreshes_are_serialized() {
    let agent = TableAgent::slow(&rows(), std::time::Duration::from_millis(50));
    let fx = Fixture::with_agent(agent, None);
    let store = fx.open();
    let all = symbols(&["SBIN", "TCS", "INFY"]);

    let (first, second) = tokio::join!(
        store.ensure_scores_available(&all, false),
        store.ensure_scores_available(&all, false)
    );
    let mut modes = vec![first.unwrap().mode, second.unwrap().mode];
    modes.sort_by_key(|m| *m == RefreshMode::CacheHit);
    assert_eq!(modes, vec![RefreshMode::Full, RefreshMode::CacheHit]);
    assert_eq!(fx.agent.calls(), 3);
}

#[tokio::test]
async fn test_valid_complete_cache_is_a_hit() {
    let fx = Fixture::new();
    let store = fx.open();
    let all = symbols(&["SBIN", "TCS"]);
    store.ensure_scores_available(&all, false).await.unwrap();
    let calls = fx.agent.calls();

    let summary = store.ensure_scores_available(&all, false).await.unwrap();
    assert_eq!(summary.mode, RefreshMode::CacheHit);
    assert_eq!(fx.agent.calls(), calls);
}

#[tokio::test]
async fn test_partial_refresh_keeps_timestamp() {
    let fx = Fixture::new();
    let store = fx.open();
    store.ensure_scores_available(&symbols(&["SBIN", "TCS"]), false).await.unwrap();
    let stamped = store.cache_timestamp().await;
    let calls = fx.agent.calls();

    let summary = store
        .ensure_scores_available(&symbols(&["SBIN", "TCS", "INFY"]), false)
        .await
        .unwrap();
    assert_eq!(summary.mode, RefreshMode::Partial);
    assert_eq!(summary.analyzed, 1);
    assert_eq!(fx.agent.calls(), calls + 1);
    assert_eq!(store.cache_timestamp().await, stamped);
    assert_eq!(store.all_scores().await.len(), 3);
}

#[tokio::test]
async fn test_forced_refresh_overwrites_requested_and_keeps_others() {
    let fx = Fixture::new();
    let store = fx.open();
    store.ensure_scores_available(&symbols(&["SBIN", "TCS"]), false).await.unwrap();

    fx.agent.set("SBIN", 40.0, Confidence::Medium);
    let summary = store.ensure_scores_available(&symbols(&["SBIN"]), true).await.unwrap();
    assert_eq!(summary.mode, RefreshMode::Forced);

    assert_eq!(store.get_score("SBIN").await.unwrap().blend_score, 40.0);
    assert_eq!(store.get_score("TCS").await.unwrap().blend_score, 66.0);
}

#[tokio::test]
async fn test_reopen_uses_snapshot() {
    let fx = Fixture::new();
    {
        let store = fx.open();
        store.ensure_scores_available(&symbols(&["SBIN", "TCS"]), false).await.unwrap();
    }
    let calls = fx.agent.calls();

    let reopened = fx.open();
    assert!(reopened.is_cache_valid().await);
    let summary = reopened.ensure_scores_available(&symbols(&["TCS"]), false).await.unwrap();
    assert_eq!(summary.mode, RefreshMode::CacheHit);
    assert_eq!(fx.agent.calls(), calls);
}

#[tokio::test]
async fn test_expired_or_corrupt_snapshot_starts_empty() {
    let fx = Fixture::new();
    {
        let store = fx.open();
        store.ensure_scores_available(&symbols(&["SBIN"]), false).await.unwrap();
    }
    let mut snapshot = ScoreSnapshot::load(&fx.config.snapshot_path).unwrap().unwrap();
    snapshot.timestamp = Some(Utc::now() - Duration::hours(7));
    snapshot.save(&fx.config.snapshot_path).unwrap();
    assert!(fx.open().all_scores().await.is_empty());

    std::fs::write(&fx.config.snapshot_path, "{ not json").unwrap();
    let store = fx.open();
    assert!(!store.is_cache_valid().await);
    assert!(store.all_scores().await.is_empty());
}

#[tokio::test]
async fn test_top_picks_filters_and_ranks() {
    let fx = Fixture::new();
    let store = fx.open();
    let nifty = universes()["nifty50"].clone();
    store.ensure_scores_available(&nifty, false).await.unwrap();

    let top = store.top_picks_for_universe(&nifty, &TopPicksQuery::default()).await;
    let order: Vec<&str> = top.picks.iter().map(|p| p.record.symbol.as_str()).collect();
    // ITC is Low confidence, INFY is Neutral, HDFCBANK beats ICICIBANK on the tie
    assert_eq!(order, vec!["SBIN", "HDFCBANK", "ICICIBANK", "TCS"]);
    assert_eq!(top.picks.iter().map(|p| p.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    assert_eq!(top.total_symbols, 7);
    assert_eq!(top.total_scored, 6);
    assert_eq!(top.total_eligible, 4);
    assert_eq!(top.message, "Only 4 actionable opportunities today");

    let everything = TopPicksQuery {
        top_n: 2,
        min_confidence: Confidence::Low,
        actionable_only: false,
    };
    let top = store.top_picks_for_universe(&nifty, &everything).await;
    assert_eq!(top.picks.len(), 2);
    assert_eq!(top.picks[0].record.symbol, "ITC");
    assert_eq!(top.total_eligible, 6);
}

#[tokio::test]
async fn test_consistent_top_picks_share_one_ranking() {
    let fx = Fixture::new();
    let store = fx.open();
    let result = store.consistent_top_picks(&universes(), 5, false).await.unwrap();
    assert!(result.inconsistencies.is_empty());

    let nifty = &result.universes["nifty50"];
    let bank = &result.universes["banknifty"];
    for (a, b) in [("SBIN", "HDFCBANK"), ("HDFCBANK", "ICICIBANK"), ("SBIN", "ICICIBANK")] {
        assert!(nifty.rank_of(a) < nifty.rank_of(b));
        assert!(bank.rank_of(a) < bank.rank_of(b));
    }
    assert_eq!(bank.rank_of("PNB"), Some(4));

    // every symbol analyzed exactly once
    assert_eq!(fx.agent.calls(), 8);
}

#[tokio::test]
async fn test_padded_symbols_are_normalized() {
    let fx = Fixture::new();
    let store = fx.open();
    let padded = BTreeMap::from([
        ("nifty50".to_string(), symbols(&[" sbin", "TCS ", "hdfcbank", ""])),
        ("banknifty".to_string(), symbols(&["SBIN", " HDFCBANK "])),
    ]);
    let result = store.consistent_top_picks(&padded, 5, false).await.unwrap();
    assert_eq!(fx.agent.calls(), 3);
    assert_eq!(result.universes["nifty50"].total_symbols, 3);
    assert_eq!(result.universes["banknifty"].rank_of("HDFCBANK"), Some(2));
    assert!(store.get_score(" sbin ").await.is_some());
}

#[tokio::test]
async fn test_invalidate_clears_memory_and_file() {
    let fx = Fixture::new();
    let store = fx.open();
    store.ensure_scores_available(&symbols(&["SBIN"]), false).await.unwrap();
    assert!(fx.config.snapshot_path.exists());

    store.invalidate().await.unwrap();
    assert!(!store.is_cache_valid().await);
    assert!(store.all_scores().await.is_empty());
    assert!(!fx.config.snapshot_path.exists());

    // a second invalidate with no file is fine
    store.invalidate().await.unwrap();
}

fn record(symbol: &str, blend_score: f64) -> ScoreRecord {
    let rec = get_recommendation(blend_score, Confidence::High, &RiskInputs::default(), std::iter::empty());
    ScoreRecord {
        symbol: symbol.to_string(),
        blend_score,
        confidence: Confidence::High,
        recommendation: rec.recommendation,
        is_actionable: rec.is_actionable,
        recommendation_note: rec.note,
        risk_reward_ratio: None,
        color_scheme: rec.color_scheme,
        agents: vec![],
        key_signals: vec![],
        reasoning: String::new(),
        analyzed_at: Utc::now(),
    }
}

fn picks(ranked: &[(&str, f64)]) -> TopPicks {
    TopPicks {
        picks: ranked
            .iter()
            .enumerate()
            .map(|(i, (s, score))| RankedPick {
                rank: i + 1,
                record: record(s, *score),
            })
            .collect(),
        total_symbols: ranked.len(),
        total_scored: ranked.len(),
        total_eligible: ranked.len(),
        message: display_text(ranked.len()),
    }
}

#[test]
fn test_verify_consistency_flags_misordered_pairs() {
    let universes = BTreeMap::from([
        ("a".to_string(), symbols(&["X", "Y", "Z"])),
        ("b".to_string(), symbols(&["X", "Y"])),
    ]);
    let results = BTreeMap::from([
        ("a".to_string(), picks(&[("X", 80.0), ("Y", 70.0)])),
        ("b".to_string(), picks(&[("Y", 70.0), ("X", 80.0)])),
    ]);
    let issues = verify_consistency(&results, &universes);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].universe, "b");
    assert_eq!(issues[0].higher, "X");
    assert_eq!(issues[0].higher_rank, 2);
}

#[test]
fn test_verify_consistency_matches_padded_symbols() {
    let universes = BTreeMap::from([
        ("a".to_string(), symbols(&[" x", "Y"])),
        ("b".to_string(), symbols(&["X ", "y"])),
    ]);
    let results = BTreeMap::from([
        ("a".to_string(), picks(&[("X", 80.0), ("Y", 70.0)])),
        ("b".to_string(), picks(&[("Y", 70.0), ("X", 80.0)])),
    ]);
    let issues = verify_consistency(&results, &universes);
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].lower, "Y");
}

#[test]
fn test_rank_order_breaks_ties_by_symbol() {
    let mut records = vec![record("B", 60.0), record("A", 60.0), record("C", 75.0)];
    records.sort_by(rank_order);
    let order: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
    assert_eq!(order, vec!["C", "A", "B"]);
}
