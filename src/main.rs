//! ARBWATCH: cross-source token price arbitrage scanner.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the providers into a single bounded scan session and serves
//! the dashboard until Ctrl+C.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use arbwatch::candidates;
use arbwatch::config::AppConfig;
use arbwatch::dashboard;
use arbwatch::engine::aggregator::PriceAggregator;
use arbwatch::engine::detector::{ArbitrageDetector, DetectorConfig};
use arbwatch::engine::scheduler::{ScanScheduler, SchedulerConfig};
use arbwatch::engine::state::SharedState;
use arbwatch::providers::birdeye::BirdeyeSource;
use arbwatch::providers::coingecko::CoinGeckoSource;
use arbwatch::providers::{PriceProvider, ProviderPolicy, ResilientProvider};
use arbwatch::storage::JsonFileArchive;

const BANNER: &str = r#"
    _    ____  ______        ___  _____ ____ _   _
   / \  |  _ \| __ ) \      / / \|_   _/ ___| | | |
  / _ \ | |_) |  _ \\ \ /\ / / _ \ | || |   | |_| |
 / ___ \|  _ <| |_) |\ V  V / ___ \| || |___|  _  |
/_/   \_\_| \_\____/  \_/\_/_/   \_\_| \____|_| |_|

  Cross-source token price arbitrage scanner
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load("config.toml")?;
    init_logging();

    println!("{BANNER}");
    info!(
        duration_minutes = cfg.session.duration_minutes,
        scan_interval_secs = cfg.session.scan_interval_secs,
        min_profit_percent = cfg.arbitrage.min_profit_percent,
        "ARBWATCH starting up"
    );

    // -- Providers -------------------------------------------------------

    let policy = ProviderPolicy::from_settings(&cfg.retry);
    let mut providers: Vec<Box<dyn PriceProvider>> = Vec::new();

    if cfg.providers.coingecko.enabled {
        let key = AppConfig::resolve_secret(cfg.providers.coingecko.pro_api_key_env.as_deref());
        info!(pro = key.is_some(), tokens = cfg.providers.coingecko.ids.len(), "CoinGecko enabled");
        let source = CoinGeckoSource::new(cfg.providers.coingecko.ids.clone(), key)?;
        providers.push(Box::new(ResilientProvider::new(source, policy.clone())));
    }

    if cfg.providers.birdeye.enabled {
        match AppConfig::resolve_secret(Some(&cfg.providers.birdeye.api_key_env)) {
            Some(key) => {
                info!(tokens = cfg.providers.birdeye.addresses.len(), "Birdeye enabled");
                let source = BirdeyeSource::new(cfg.providers.birdeye.addresses.clone(), key)?;
                providers.push(Box::new(ResilientProvider::new(source, policy.clone())));
            }
            None => warn!(
                env = %cfg.providers.birdeye.api_key_env,
                "Birdeye API key not set, skipping Birdeye"
            ),
        }
    }

    if providers.is_empty() {
        warn!("No price providers enabled; every token will lack quotes");
    }

    // -- Engine ----------------------------------------------------------

    let detector = ArbitrageDetector::new(DetectorConfig {
        fees: cfg.arbitrage.fee_schedule()?,
        min_profit_percent: cfg.arbitrage.min_profit()?,
    });

    let state = Arc::new(SharedState::new());
    let mut scheduler = ScanScheduler::new(
        PriceAggregator::new(providers),
        detector,
        Arc::clone(&state),
        SchedulerConfig::from(&cfg.session),
    );

    if cfg.archive.enabled {
        info!(path = %cfg.archive.path, "Archiving opportunities to disk");
        scheduler = scheduler.with_archive(Box::new(JsonFileArchive::new(&cfg.archive.path)));
    }

    let known = cfg.known_tokens();
    let candidates = candidates::load_candidates(Path::new(&cfg.session.candidates_file));

    let worker = scheduler.spawn(known, candidates);

    // -- Dashboard -------------------------------------------------------

    let server = if cfg.dashboard.enabled {
        Some(dashboard::spawn_dashboard(Arc::clone(&state), cfg.dashboard.port).await?)
    } else {
        None
    };

    // -- Wait ------------------------------------------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let finished = tokio::select! {
        result = worker => Some(result),
        _ = &mut shutdown => None,
    };

    match finished {
        Some(result) => {
            match result {
                Ok(reason) => info!(reason = ?reason, "Scan worker finished"),
                Err(e) => error!(error = %e, "Scan worker panicked"),
            }
            if server.is_some() {
                info!("Session over. Dashboard stays up until Ctrl+C.");
                if let Err(e) = shutdown.await {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
            }
        }
        None => info!("Shutdown signal received."),
    }

    let session = state.session().await;
    info!(session = %session, "ARBWATCH shut down.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("arbwatch=info"));

    let json_logging = std::env::var("ARBWATCH_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
