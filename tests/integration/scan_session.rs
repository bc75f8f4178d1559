//! Full-session scenarios with paused time.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use arbwatch::candidates;
use arbwatch::dashboard::build_router;
use arbwatch::engine::aggregator::PriceAggregator;
use arbwatch::engine::detector::{ArbitrageDetector, DetectorConfig};
use arbwatch::engine::scheduler::{ScanScheduler, SchedulerConfig};
use arbwatch::engine::state::SharedState;
use arbwatch::providers::PriceProvider;
use arbwatch::storage::{self, JsonFileArchive};
use arbwatch::types::{FinishReason, SessionStatus};

use crate::mock_source::{Failure, MockSource};

fn session_config(minutes: u64) -> SchedulerConfig {
    SchedulerConfig {
        session_duration: Duration::from_secs(minutes * 60),
        ..SchedulerConfig::default()
    }
}

fn scheduler(
    providers: Vec<Box<dyn PriceProvider>>,
    config: SchedulerConfig,
) -> (ScanScheduler, Arc<SharedState>) {
    let state = Arc::new(SharedState::new());
    let s = ScanScheduler::new(
        PriceAggregator::new(providers),
        ArbitrageDetector::new(DetectorConfig::default()),
        Arc::clone(&state),
        config,
    );
    (s, state)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn temp_path(prefix: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("{prefix}_{}.json", uuid::Uuid::new_v4()));
    p
}

async fn get_json(state: Arc<SharedState>, uri: &str) -> serde_json::Value {
    let resp = build_router(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_session_end_to_end() {
    let coingecko = MockSource::new("coingecko", &[("SOL", 100.0), ("JTO", 2.0)]);
    let birdeye = MockSource::new("birdeye", &[("SOL", 102.0), ("JTO", 2.0)]);
    let archive_path = temp_path("arbwatch_it_archive");

    let (s, state) = scheduler(vec![coingecko.provider(), birdeye.provider()], session_config(3));
    let s = s.with_archive(Box::new(JsonFileArchive::new(&archive_path)));

    let reason = s.spawn(strings(&["SOL", "JTO"]), Vec::new()).await.unwrap();
    assert_eq!(reason, FinishReason::Normal);

    // Cycles start at 0s and 90s; the 180s deadline ends the session.
    let status = get_json(Arc::clone(&state), "/api/status").await;
    assert_eq!(status["status"], "Analysis Finished");
    assert_eq!(status["cycles_completed"], 2);
    assert_eq!(status["cycles_discarded"], 0);
    assert_eq!(status["opportunities_this_session"], 2);
    assert_eq!(status["target_tokens"], serde_json::json!(["SOL", "JTO"]));

    let opps = get_json(Arc::clone(&state), "/api/opportunities").await;
    let opps = opps.as_array().unwrap();
    assert_eq!(opps.len(), 2);
    for o in opps {
        assert_eq!(o["token"], "SOL");
        assert_eq!(o["buy_exchange"], "coingecko");
        assert_eq!(o["sell_exchange"], "birdeye");
    }

    let archived = storage::load_archive(&archive_path).unwrap();
    assert_eq!(archived.len(), 2);
    assert_eq!(archived[0].profit_percent, dec!(1.6946));
    storage::delete_archive(&archive_path).unwrap();

    // Each source saw each token once per cycle.
    let mut requested = coingecko.requests();
    requested.sort();
    assert_eq!(requested, strings(&["jto", "jto", "sol", "sol"]));
}

#[tokio::test(start_paused = true)]
async fn test_failing_source_is_isolated() {
    // (failure, requests made for one token in one cycle)
    let cases = [
        (Failure::Transient, 3),
        (Failure::RateLimited, 1),
        (Failure::Invalid, 1),
    ];

    for (failure, expected_requests) in cases {
        let coingecko = MockSource::new("coingecko", &[("SOL", 100.0)]);
        let birdeye = MockSource::new("birdeye", &[("SOL", 110.0)]);
        birdeye.fail_with(Some(failure));

        let (s, state) =
            scheduler(vec![coingecko.provider(), birdeye.provider()], session_config(1));
        let reason = s.run(&strings(&["SOL"]), &[]).await;

        assert_eq!(reason, FinishReason::Normal, "{failure:?}");
        assert_eq!(birdeye.requests().len(), expected_requests, "{failure:?}");
        assert_eq!(coingecko.requests().len(), 1, "{failure:?}");

        let snap = state.read().await;
        assert_eq!(snap.session.cycles_completed, 1, "{failure:?}");
        assert!(snap.opportunities.is_empty(), "{failure:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_prices_move_between_cycles() {
    let coingecko = MockSource::new("coingecko", &[("SOL", 100.0)]);
    let birdeye = MockSource::new("birdeye", &[("SOL", 102.0)]);

    let (s, state) = scheduler(vec![coingecko.provider(), birdeye.provider()], session_config(3));
    let handle = s.spawn(strings(&["SOL"]), Vec::new());

    // First cycle is done well before the second one starts at 90s.
    tokio::time::sleep(Duration::from_secs(45)).await;
    assert_eq!(state.opportunities().await.len(), 1);
    assert_eq!(
        state.session().await.status,
        SessionStatus::Running
    );
    birdeye.set_price("SOL", 100.1);

    handle.await.unwrap();
    let snap = state.read().await;
    assert_eq!(snap.session.cycles_completed, 2);
    assert_eq!(snap.opportunities.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_candidates_extend_known_tokens() {
    let path = temp_path("arbwatch_it_candidates");
    std::fs::write(&path, r#"{"identified_tokens": ["jto", "SOL", 7, "BONK"]}"#).unwrap();
    let candidates = candidates::load_candidates(&path);
    std::fs::remove_file(&path).unwrap();

    let coingecko = MockSource::new("coingecko", &[("SOL", 100.0), ("JTO", 2.0)]);
    let birdeye = MockSource::new("birdeye", &[("SOL", 100.0), ("JTO", 2.0)]);
    let (s, state) = scheduler(vec![coingecko.provider(), birdeye.provider()], session_config(1));

    s.run(&strings(&["SOL"]), &candidates).await;

    let session = state.session().await;
    assert_eq!(session.target_tokens, strings(&["SOL", "JTO", "BONK"]));
    // BONK is not mapped by either source, so it never reaches the wire.
    assert!(!coingecko.requests().contains(&"bonk".to_string()));
    assert_eq!(coingecko.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_targets_reported_on_dashboard() {
    let (s, state) = scheduler(Vec::new(), SchedulerConfig::default());
    let missing = candidates::load_candidates(&temp_path("arbwatch_it_missing"));

    let reason = s.run(&[], &missing).await;
    assert_eq!(reason, FinishReason::NoTargets);

    let status = get_json(state, "/api/status").await;
    assert_eq!(status["status"], "Finished: No Tokens To Analyze");
    assert!(status["start_time"].is_null());
    assert_eq!(status["cycles_completed"], 0);
}

#[tokio::test(start_paused = true)]
async fn test_cycle_overrunning_deadline_is_not_archived() {
    let coingecko =
        MockSource::new("coingecko", &[("SOL", 100.0)]).with_latency(Duration::from_secs(10 * 60));
    let birdeye = MockSource::new("birdeye", &[("SOL", 102.0)]);
    let archive_path = temp_path("arbwatch_it_overrun");

    let (s, state) = scheduler(vec![coingecko.provider(), birdeye.provider()], session_config(5));
    let s = s.with_archive(Box::new(JsonFileArchive::new(&archive_path)));
    s.run(&strings(&["SOL"]), &[]).await;

    let snap = state.read().await;
    assert_eq!(snap.session.status, SessionStatus::Finished(FinishReason::Normal));
    assert_eq!(snap.session.cycles_completed, 0);
    assert_eq!(snap.session.cycles_discarded, 1);
    assert!(snap.opportunities.is_empty());
    assert!(!archive_path.exists());
}
