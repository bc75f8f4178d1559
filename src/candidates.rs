//! Candidate token list produced by the discovery agent.
//!
//! The agent writes `{"identified_tokens": ["SOL", "JTO", ...]}`. A missing
//! or malformed file is not fatal: the scanner just falls back to the
//! known tokens.

use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct CandidateFile {
    #[serde(default)]
    identified_tokens: Vec<serde_json::Value>,
}

/// Read candidate symbols from `path`, skipping non-string entries.
pub fn load_candidates(path: &Path) -> Vec<String> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Candidate file unavailable, using known tokens only");
            return Vec::new();
        }
    };

    let tokens = parse_candidates(&contents);
    if tokens.is_empty() {
        warn!(path = %path.display(), "Candidate file empty or invalid");
    } else {
        info!(path = %path.display(), count = tokens.len(), tokens = ?tokens, "Loaded candidate tokens");
    }
    tokens
}

pub fn parse_candidates(contents: &str) -> Vec<String> {
    match serde_json::from_str::<CandidateFile>(contents) {
        Ok(file) => file
            .identified_tokens
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Err(e) => {
            warn!(error = %e, "Malformed candidate file");
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
