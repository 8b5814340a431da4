use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use analysis_core::MarketDataProvider;
use analysis_orchestrator::{AgentCoordinator, CoordinatorConfig};
use anyhow::{Context, Result};
use market_agents::{default_agents, default_weights};
use score_store::{GlobalScoreStore, StoreConfig, UniverseRegistry, UniversePicks};
use tokio::signal::unix::SignalKind;
use tokio::time;

mod config;
mod file_provider;

use config::RefresherConfig;
use file_provider::JsonFileProvider;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    tracing::info!("Starting score refresher");

    // 2. Configuration
    let config = RefresherConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Data dir: {}", config.data_dir.display());
    tracing::info!("  Universes: {}", config.universes.join(", "));
    tracing::info!("  Cache TTL: {}h, max concurrent: {}", config.cache_ttl_hours, config.max_concurrent);
    tracing::info!("  Refresh interval: {}s (run once: {})", config.refresh_interval_secs, config.run_once);

    // 3. Agents and coordinator
    let provider: Arc<dyn MarketDataProvider> = Arc::new(JsonFileProvider::new(&config.data_dir));
    let coordinator_config = CoordinatorConfig {
        agent_timeout: Duration::from_secs(config.agent_timeout_secs),
        cache_ttl: chrono::Duration::seconds(config.agent_cache_ttl_secs),
    };
    let coordinator = Arc::new(
        AgentCoordinator::new(default_weights(), coordinator_config)
            .with_agents(default_agents(provider, &config.benchmark_symbol)),
    );
    tracing::info!("Agent coordinator initialized with {} agents", coordinator.agent_status().total_agents);

    // 4. Score store and universes
    let store = GlobalScoreStore::open(
        StoreConfig {
            snapshot_path: config.score_cache_path.clone(),
            ttl_hours: config.cache_ttl_hours,
            max_concurrent: config.max_concurrent,
        },
        coordinator,
    );
    let registry = UniverseRegistry::new(Some(config.universe_cache_path.clone()));

    if config.run_once {
        run_refresh_cycle(&store, &registry, &config).await?;
        tracing::info!("Single refresh complete, exiting");
        return Ok(());
    }

    // 5. Main loop with graceful shutdown (SIGINT + SIGTERM)
    let mut interval = time::interval(Duration::from_secs(config.refresh_interval_secs));
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_refresh_cycle(&store, &registry, &config).await {
                    tracing::error!("Error in refresh cycle: {:#}", e);
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                break;
            }
        }
    }

    tracing::info!("Score refresher shut down.");
    Ok(())
}

/// Refresh universe lists, score their union once and publish the picks.
async fn run_refresh_cycle(store: &GlobalScoreStore, registry: &UniverseRegistry, config: &RefresherConfig) -> Result<()> {
    if let Err(e) = registry.write_snapshot(&config.universe_cache_path) {
        tracing::warn!("Failed to refresh index universes: {}", e);
    }

    let universes = registry.resolve_all(&config.universes);
    let result = store
        .consistent_top_picks(&universes, config.top_picks_n, false)
        .await
        .context("scoring universes")?;

    for (name, picks) in &result.universes {
        tracing::info!(
            "[{}] {} ({} of {} symbols scored)",
            name,
            picks.message,
            picks.total_scored,
            picks.total_symbols
        );
        for pick in &picks.picks {
            tracing::info!(
                "  #{} {} {:.2} {} ({})",
                pick.rank,
                pick.record.symbol,
                pick.record.blend_score,
                pick.record.recommendation,
                pick.record.confidence
            );
        }
    }
    if !result.inconsistencies.is_empty() {
        tracing::warn!("{} ranking inconsistencies across universes", result.inconsistencies.len());
    }

    write_picks(&config.top_picks_output, &result).await?;
    tracing::info!("Top picks written to {}", config.top_picks_output.display());
    Ok(())
}

async fn write_picks(path: &Path, picks: &UniversePicks) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let body = serde_json::to_string_pretty(picks)?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("writing {}", path.display()))
}
