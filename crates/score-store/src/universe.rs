//! Index universes: named symbol lists. Static lists can be overridden by a
//! JSON file of `{name: [symbols]}` refreshed out of band.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::StoreError;
use crate::snapshot::write_json_atomic;

pub const NIFTY50: &[&str] = &[
    "RELIANCE", "TCS", "HDFCBANK", "INFY", "ICICIBANK",
    "HINDUNILVR", "ITC", "SBIN", "BHARTIARTL", "KOTAKBANK",
    "LT", "AXISBANK", "ASIANPAINT", "MARUTI", "SUNPHARMA",
    "TITAN", "ULTRACEMCO", "NESTLEIND", "BAJFINANCE", "WIPRO",
    "ONGC", "NTPC", "POWERGRID", "COALINDIA", "TATAMOTORS",
    "TECHM", "HCLTECH", "INDUSINDBK", "DRREDDY", "CIPLA",
    "EICHERMOT", "TATASTEEL", "ADANIPORTS", "JSWSTEEL", "HINDALCO",
    "BRITANNIA", "HEROMOTOCO", "GRASIM", "SHREECEM", "TATACONSUM",
    "APOLLOHOSP", "DIVISLAB", "BAJAJFINSV", "BAJAJ-AUTO", "SBILIFE",
    "HDFCLIFE", "UPL", "BPCL", "M&M", "ADANIENT",
];

pub const BANKNIFTY: &[&str] = &[
    "HDFCBANK", "ICICIBANK", "AXISBANK", "KOTAKBANK", "SBIN",
    "INDUSINDBK", "BANKBARODA", "PNB", "FEDERALBNK", "IDFCFIRSTB",
    "AUBANK", "BANDHANBNK",
];

/// Small universe for smoke runs
pub const TEST_UNIVERSE: &[&str] = &["RELIANCE", "TCS", "HDFCBANK", "INFY", "ICICIBANK"];

/// Universes written to the override file by [`UniverseRegistry::write_snapshot`]
pub const INDEX_NAMES: &[&str] = &["nifty50", "banknifty", "nifty100", "nifty500"];

/// Built-in list for a lower-cased universe name.
// nifty100 and nifty500 are the nifty50 list until their constituents are loaded
pub fn static_universe(name: &str) -> Option<&'static [&'static str]> {
    match name {
        "nifty50" | "nifty100" | "nifty500" => Some(NIFTY50),
        "banknifty" => Some(BANKNIFTY),
        "test" => Some(TEST_UNIVERSE),
        _ => None,
    }
}

fn to_owned(symbols: &[&str]) -> Vec<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Default)]
pub struct UniverseRegistry {
    overrides_path: Option<PathBuf>,
}

impl UniverseRegistry {
    pub fn new(overrides_path: Option<PathBuf>) -> Self {
        Self { overrides_path }
    }

    /// Read the override file. Missing or unreadable files yield nothing.
    fn load_overrides(&self) -> HashMap<String, Vec<String>> {
        let Some(path) = &self.overrides_path else {
            return HashMap::new();
        };
        if !path.exists() {
            return HashMap::new();
        }
        let parsed = std::fs::read_to_string(path)
            .map_err(|e| StoreError::io(path, e))
            .and_then(|raw| serde_json::from_str::<HashMap<String, serde_json::Value>>(&raw).map_err(|e| StoreError::json(path, e)));

        match parsed {
            Ok(map) => map
                .into_iter()
                .filter_map(|(name, value)| {
                    let symbols: Vec<String> = value
                        .as_array()?
                        .iter()
                        .filter_map(|s| s.as_str())
                        .map(|s| s.to_uppercase())
                        .collect();
                    Some((name.to_lowercase(), symbols))
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "failed to read index universe overrides");
                HashMap::new()
            }
        }
    }

    /// Symbols for a universe name, case-insensitive. Precedence: non-empty
    /// override, built-in list, then NIFTY 50.
    pub fn resolve(&self, name: &str) -> Vec<String> {
        let name = name.to_lowercase();
        if let Some(symbols) = self.load_overrides().remove(&name).filter(|s| !s.is_empty()) {
            return symbols;
        }
        match static_universe(&name) {
            Some(symbols) => to_owned(symbols),
            None => {
                warn!(universe = %name, "unknown universe, falling back to nifty50");
                to_owned(NIFTY50)
            }
        }
    }

    /// Resolve several universes at once, keyed by lower-cased name.
    pub fn resolve_all<S: AsRef<str>>(&self, names: &[S]) -> BTreeMap<String, Vec<String>> {
        names
            .iter()
            .map(|n| (n.as_ref().to_lowercase(), self.resolve(n.as_ref())))
            .collect()
    }

    /// Every distinct symbol across the named universes, sorted.
    pub fn union<S: AsRef<str>>(&self, names: &[S]) -> Vec<String> {
        names
            .iter()
            .flat_map(|n| self.resolve(n.as_ref()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Persist the index lists to `path` so later resolves pick them up as
    /// overrides. Non-empty overrides already on file are carried over, and
    /// the built-in lists fill in the index names they do not cover.
    pub fn write_snapshot(&self, path: &Path) -> Result<(), StoreError> {
        let mut mapping: BTreeMap<String, Vec<String>> = self
            .load_overrides()
            .into_iter()
            .filter(|(_, symbols)| !symbols.is_empty())
            .collect();
        for name in INDEX_NAMES {
            if let Some(symbols) = static_universe(name) {
                mapping.entry(name.to_string()).or_insert_with(|| to_owned(symbols));
            }
        }
        write_json_atomic(path, &mapping)?;
        info!(path = %path.display(), universes = mapping.len(), "index universe snapshot written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_static_lists() {
        assert_eq!(NIFTY50.len(), 50);
        assert_eq!(BANKNIFTY.len(), 12);
        assert_eq!(TEST_UNIVERSE.len(), 5);
        assert_eq!(NIFTY50.iter().collect::<BTreeSet<_>>().len(), 50);
    }

    #[test]
    fn test_resolve_is_case_insensitive_with_fallback() {
        let registry = UniverseRegistry::default();
        assert_eq!(registry.resolve("BankNifty").len(), 12);
        assert_eq!(registry.resolve("nifty500"), registry.resolve("nifty50"));
        assert_eq!(registry.resolve("no-such-index").len(), 50);
    }

    #[test]
    fn test_override_file_wins_when_non_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("universes.json");
        std::fs::write(&path, r#"{"BANKNIFTY": ["sbin", "pnb"], "nifty50": []}"#).unwrap();

        let registry = UniverseRegistry::new(Some(path));
        assert_eq!(registry.resolve("banknifty"), vec!["SBIN", "PNB"]);
        assert_eq!(registry.resolve("nifty50").len(), 50);
    }

    #[test]
    fn test_malformed_override_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("universes.json");
        std::fs::write(&path, "not json").unwrap();
        let registry = UniverseRegistry::new(Some(path));
        assert_eq!(registry.resolve("test").len(), 5);
    }

    #[test]
    fn test_union_dedupes() {
        let registry = UniverseRegistry::default();
        let all = registry.union(&["nifty50", "banknifty"]);
        // BANKBARODA, PNB, FEDERALBNK, IDFCFIRSTB, AUBANK, BANDHANBNK are bank only
        assert_eq!(all.len(), 56);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_write_snapshot_round_trips_through_resolve() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("index_universes.json");
        let registry = UniverseRegistry::new(Some(path.clone()));
        registry.write_snapshot(&path).unwrap();

        let raw: HashMap<String, Vec<String>> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 4);
        assert_eq!(registry.resolve("banknifty").len(), 12);
    }

    #[test]
    fn test_write_snapshot_keeps_existing_overrides() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index_universes.json");
        std::fs::write(&path, r#"{"banknifty": ["SBIN", "PNB"], "midcap": ["tcs"], "nifty100": []}"#).unwrap();

        let registry = UniverseRegistry::new(Some(path.clone()));
        registry.write_snapshot(&path).unwrap();
        registry.write_snapshot(&path).unwrap();

        assert_eq!(registry.resolve("banknifty"), vec!["SBIN", "PNB"]);
        assert_eq!(registry.resolve("midcap"), vec!["TCS"]);
        assert_eq!(registry.resolve("nifty100").len(), 50);

        let raw: HashMap<String, Vec<String>> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.len(), 5);
        assert_eq!(raw["nifty100"].len(), 50);
    }
}
