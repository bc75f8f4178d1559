//! End-to-end tests: in-memory sources driven through the full
//! provider → scheduler → state → dashboard/archive pipeline.

mod mock_source;
mod scan_session;
