use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct RefresherConfig {
    // Inputs
    pub data_dir: PathBuf,                 // bars/ and news/ JSON files
    pub benchmark_symbol: String,          // NIFTY50

    // Score cache
    pub score_cache_path: PathBuf,
    pub cache_ttl_hours: i64,              // 6 (one market session)
    pub max_concurrent: usize,             // 10

    // Agent coordinator
    pub agent_timeout_secs: u64,           // 15
    pub agent_cache_ttl_secs: i64,         // 300

    // Universes
    pub universe_cache_path: PathBuf,
    pub universes: Vec<String>,            // nifty50,banknifty
    pub top_picks_n: usize,                // 5
    pub top_picks_output: PathBuf,

    // Loop
    pub refresh_interval_secs: u64,        // 1800
    pub run_once: bool,
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{key} has invalid value {raw:?}"))
}

impl RefresherConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Missing keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            data_dir: PathBuf::from(text("SCORE_DATA_DIR", "data")),
            benchmark_symbol: text("BENCHMARK_SYMBOL", "NIFTY50").trim().to_uppercase(),

            score_cache_path: PathBuf::from(text("SCORE_CACHE_PATH", "data/global_scores/score_cache.json")),
            cache_ttl_hours: parse_var(&lookup, "SCORE_CACHE_TTL_HOURS", "6")?,
            max_concurrent: parse_var(&lookup, "SCORE_MAX_CONCURRENT", "10")?,

            agent_timeout_secs: parse_var(&lookup, "AGENT_TIMEOUT_SECS", "15")?,
            agent_cache_ttl_secs: parse_var(&lookup, "AGENT_CACHE_TTL_SECS", "300")?,

            universe_cache_path: PathBuf::from(text(
                "UNIVERSE_CACHE_PATH",
                "data/index_universe/index_universes.json",
            )),
            universes: text("SCORE_UNIVERSES", "nifty50,banknifty")
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            top_picks_n: parse_var(&lookup, "TOP_PICKS_N", "5")?,
            top_picks_output: PathBuf::from(text("TOP_PICKS_OUTPUT", "data/global_scores/top_picks.json")),

            refresh_interval_secs: parse_var(&lookup, "REFRESH_INTERVAL_SECS", "1800")?,
            run_once: parse_var(&lookup, "RUN_ONCE", "false")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_hours <= 0 {
            bail!("SCORE_CACHE_TTL_HOURS must be positive, got {}", self.cache_ttl_hours);
        }
        if self.max_concurrent == 0 {
            bail!("SCORE_MAX_CONCURRENT must be at least 1");
        }
        if self.top_picks_n == 0 {
            bail!("TOP_PICKS_N must be at least 1");
        }
        if self.agent_timeout_secs == 0 {
            bail!("AGENT_TIMEOUT_SECS must be at least 1");
        }
        if self.universes.is_empty() {
            bail!("SCORE_UNIVERSES names no universe");
        }
        if !self.run_once && self.refresh_interval_secs == 0 {
            bail!("REFRESH_INTERVAL_SECS must be at least 1 unless RUN_ONCE is set");
        }
        Ok(())
    }
}
