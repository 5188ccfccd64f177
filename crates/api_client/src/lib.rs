//! Dashboard API client, shared by the worksheet controller and the CLI.
//!
//! This crate is the single source of truth for the dashboard wire
//! contract: capability tree, unique controls, analysis, scenarios,
//! current user.
//!
//! No UI concepts. No retries. Blocking calls only.

mod client;
mod error;
mod scenarios;

pub use client::{ApiClient, CurrentUser, DEFAULT_TIMEOUT};
pub use error::{extract_error_detail, ApiError};
pub use scenarios::{Scenario, ScenarioClient, ScenarioSummary};
