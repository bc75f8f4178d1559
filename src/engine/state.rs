//! Session state shared between the scan worker and the dashboard.
//!
//! One lock guards both the session record and the opportunity log, so
//! every read returns values written under the same acquisition. Reads
//! copy out; writes only append or advance the session. The lock is
//! never held across a network call or a sleep.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::{ArbitrageOpportunity, FinishReason, ScanSession, SessionStatus};

/// A consistent copy of everything the reporting layer can see.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub session: ScanSession,
    pub opportunities: Vec<ArbitrageOpportunity>,
}

#[derive(Debug, Default)]
struct Inner {
    session: ScanSession,
    opportunities: Vec<ArbitrageOpportunity>,
}

#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<Inner>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Reads -----------------------------------------------------------

    pub async fn session(&self) -> ScanSession {
        self.inner.lock().await.session.clone()
    }

    pub async fn opportunities(&self) -> Vec<ArbitrageOpportunity> {
        self.inner.lock().await.opportunities.clone()
    }

    /// Session and opportunity log from a single lock acquisition.
    pub async fn read(&self) -> StateSnapshot {
        let inner = self.inner.lock().await;
        StateSnapshot {
            session: inner.session.clone(),
            opportunities: inner.opportunities.clone(),
        }
    }

    // -- Writes (scan worker only) ---------------------------------------

    /// Enter `Running` with the resolved session window and targets.
    pub(crate) async fn begin(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        target_tokens: Vec<String>,
    ) {
        let mut inner = self.inner.lock().await;
        let session = &mut inner.session;
        session.status = SessionStatus::Running;
        session.start_time = Some(start_time);
        session.end_time = Some(end_time);
        session.target_tokens = target_tokens;
        session.opportunities_this_session = 0;
    }

    /// Append a completed cycle's opportunities and advance its counters.
    pub(crate) async fn publish(&self, batch: &[ArbitrageOpportunity], scanned_at: DateTime<Utc>) {
        let mut inner = self.inner.lock().await;
        inner.opportunities.extend_from_slice(batch);
        let session = &mut inner.session;
        session.opportunities_this_session += batch.len() as u64;
        session.cycles_completed += 1;
        session.last_scan_time = Some(scanned_at);
        debug!(
            added = batch.len(),
            total = session.opportunities_this_session,
            "Cycle published"
        );
    }

    pub(crate) async fn record_discarded(&self) {
        self.inner.lock().await.session.cycles_discarded += 1;
    }

    /// Move to the terminal state. Later calls are ignored.
    pub(crate) async fn finish(&self, reason: FinishReason) {
        let mut inner = self.inner.lock().await;
        if !inner.session.status.is_finished() {
            inner.session.status = SessionStatus::Finished(reason);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
