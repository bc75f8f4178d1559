//! Dashboard API route handlers.
//!
//! All endpoints return JSON copied out of `SharedState`.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::state::SharedState;
use crate::types::{ArbitrageOpportunity, ScanSession};

pub type AppState = Arc<SharedState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub session_id: Uuid,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub last_scan_time: Option<DateTime<Utc>>,
    pub target_tokens: Vec<String>,
    pub opportunities_this_session: u64,
    pub cycles_completed: u64,
    pub cycles_discarded: u64,
}

impl From<ScanSession> for StatusResponse {
    fn from(s: ScanSession) -> Self {
        Self {
            status: s.status.to_string(),
            session_id: s.session_id,
            start_time: s.start_time,
            end_time: s.end_time,
            last_scan_time: s.last_scan_time,
            target_tokens: s.target_tokens,
            opportunities_this_session: s.opportunities_this_session,
            cycles_completed: s.cycles_completed,
            cycles_discarded: s.cycles_discarded,
        }
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/status
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(state.session().await.into())
}

/// GET /api/opportunities
pub async fn get_opportunities(State(state): State<AppState>) -> Json<Vec<ArbitrageOpportunity>> {
    Json(state.opportunities().await)
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
