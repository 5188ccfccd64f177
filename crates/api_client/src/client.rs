//! Dashboard service HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). Covers the
//! reference data reads and the analysis call; scenario persistence lives
//! in [`crate::scenarios`].

use std::time::Duration;

use capsheet_core::{AnalysisRequest, Capability, CapabilityTree, Metrics, UniqueControls};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ApiError;
use crate::scenarios::ScenarioClient;

/// Default request timeout, matching the dashboard proxy's own upstream timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("capsheet/", env!("CARGO_PKG_VERSION"));

/// Dashboard API client (blocking).
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::blocking::Client,
    api_base: String,
}

/// Response of `GET /api/current-user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(deserialize_with = "int_or_numeric_string")]
    pub user_id: i64,
}

impl ApiClient {
    /// Create a client against `api_base` (e.g. `http://localhost:5000`).
    pub fn new(api_base: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(api_base, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(api_base: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Identify the signed-in user.
    pub fn current_user(&self) -> Result<CurrentUser, ApiError> {
        self.get_json("/api/current-user")
    }

    /// Full capability reference tree.
    pub fn capability_tree(&self) -> Result<CapabilityTree, ApiError> {
        let capabilities: Vec<Capability> = self.get_json("/api/capability-tree")?;
        log::debug!("loaded capability tree: {} capabilities", capabilities.len());
        Ok(CapabilityTree::new(capabilities))
    }

    /// Per-capability unique control data.
    pub fn unique_controls(&self) -> Result<UniqueControls, ApiError> {
        self.get_json("/api/capability-unique-controls")
    }

    /// Compute coverage metrics for a set of active capabilities.
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<Metrics, ApiError> {
        log::debug!(
            "analysis: {} capabilities, control filter {}",
            request.capability_ids.len(),
            request
                .control_ids
                .as_ref()
                .map(|ids| ids.len().to_string())
                .unwrap_or_else(|| "none".into())
        );
        self.send_json(reqwest::Method::POST, "/api/capability-analysis", request, None)
    }

    /// Scenario endpoints scoped to `user_id` (or the server's default user when `None`).
    pub fn scenarios(&self, user_id: Option<i64>) -> ScenarioClient {
        ScenarioClient::new(self.clone(), user_id)
    }

    // ── Internal helpers ────────────────────────────────────────────

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    pub(crate) fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.get_json_with_query(path, &[])
    }

    pub(crate) fn get_json_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .map_err(network_error)?;

        let response = check(response, None)?;
        parse_json(response)
    }

    /// Send a JSON body and parse the JSON response.
    ///
    /// `scenario_name` phrases duplicate-name errors for create and rename.
    pub(crate) fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
        scenario_name: Option<&str>,
    ) -> Result<T, ApiError> {
        self.send_json_with_query(method, path, &[], body, scenario_name)
    }

    pub(crate) fn send_json_with_query<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        query: &[(&str, String)],
        body: &B,
        scenario_name: Option<&str>,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .request(method, self.url(path))
            .query(query)
            .json(body)
            .send()
            .map_err(network_error)?;

        let response = check(response, scenario_name)?;
        parse_json(response)
    }

    pub(crate) fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.url(path))
            .query(query)
            .send()
            .map_err(network_error)?;

        check(response, None)?;
        Ok(())
    }
}

fn network_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Network("Request timed out".into())
    } else if e.is_connect() {
        ApiError::Network(format!("Could not connect to server: {}", e))
    } else {
        ApiError::Network(e.to_string())
    }
}

/// Map a non-2xx response to an [`ApiError`] using the body's error detail.
fn check(
    response: reqwest::blocking::Response,
    scenario_name: Option<&str>,
) -> Result<reqwest::blocking::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let body = response.text().unwrap_or_default();
    let err = ApiError::from_response(code, &body, scenario_name);
    log::warn!("request failed ({}): {}", code, err.user_message());
    Err(err)
}

fn parse_json<T: DeserializeOwned>(response: reqwest::blocking::Response) -> Result<T, ApiError> {
    let text = response.text().map_err(network_error)?;
    serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))
}

/// Ids arrive as JSON numbers from the data service but as strings from
/// some proxy paths.
pub(crate) fn int_or_numeric_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IntOrString {
        Int(i64),
        Str(String),
    }

    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(n) => Ok(n),
        IntOrString::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("expected numeric id, got {:?}", s))),
    }
}
