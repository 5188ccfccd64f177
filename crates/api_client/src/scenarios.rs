//! Named scenario CRUD.
//!
//! Scenarios are scoped to a user. The user id travels as a `user_id`
//! query parameter on reads/updates/deletes and inside the body on create;
//! when no user is known it is left out and the proxy falls back to its
//! session user.

use capsheet_core::{CapabilitySelection, ControlSelection, SelectionSnapshot};
use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};

use crate::client::{int_or_numeric_string, ApiClient};
use crate::error::ApiError;

/// Row of `GET /api/capability-scenarios`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    #[serde(deserialize_with = "int_or_numeric_string")]
    pub scenario_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub scenario_name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// A scenario with its stored selections.
///
/// Create and update responses carry only the summary fields, so both
/// selection lists default to empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(flatten)]
    pub summary: ScenarioSummary,
    #[serde(default)]
    pub selections: Vec<CapabilitySelection>,
    #[serde(default)]
    pub control_selections: Vec<ControlSelection>,
}

impl Scenario {
    pub fn id(&self) -> i64 {
        self.summary.scenario_id
    }

    pub fn name(&self) -> &str {
        &self.summary.scenario_name
    }

    pub fn snapshot(&self) -> SelectionSnapshot {
        SelectionSnapshot {
            selections: self.selections.clone(),
            control_selections: self.control_selections.clone(),
        }
    }
}

/// Some proxy versions wrap the single-scenario response in a list.
fn scenario_or_first<'de, D>(deserializer: D) -> Result<Scenario, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Box<Scenario>),
        Many(Vec<Scenario>),
    }

    match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => Ok(*s),
        OneOrMany::Many(list) => list
            .into_iter()
            .next()
            .ok_or_else(|| serde::de::Error::custom("empty scenario list")),
    }
}

#[derive(Deserialize)]
struct LoadResponse(#[serde(deserialize_with = "scenario_or_first")] Scenario);

#[derive(Serialize)]
struct CreateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<i64>,
    scenario_name: &'a str,
    is_default: bool,
}

/// Body of `PUT /api/capability-scenarios/{id}`. Absent fields are left
/// unchanged by the server.
#[derive(Debug, Default, Serialize)]
struct UpdateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    scenario_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_default: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    selections: Option<&'a [CapabilitySelection]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    control_selections: Option<&'a [ControlSelection]>,
}

/// Scenario endpoints for one user.
#[derive(Clone)]
pub struct ScenarioClient {
    api: ApiClient,
    user_id: Option<i64>,
}

impl ScenarioClient {
    pub fn new(api: ApiClient, user_id: Option<i64>) -> Self {
        Self { api, user_id }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    fn user_query(&self) -> Vec<(&'static str, String)> {
        self.user_id
            .map(|id| vec![("user_id", id.to_string())])
            .unwrap_or_default()
    }

    fn path(scenario_id: i64) -> String {
        format!("/api/capability-scenarios/{}", scenario_id)
    }

    /// All scenarios for the user, default first.
    pub fn list(&self) -> Result<Vec<ScenarioSummary>, ApiError> {
        self.api
            .get_json_with_query("/api/capability-scenarios", &self.user_query())
    }

    /// The user's default scenario, if one is flagged.
    pub fn default_scenario(&self) -> Result<Option<ScenarioSummary>, ApiError> {
        Ok(self.list()?.into_iter().find(|s| s.is_default))
    }

    pub fn load(&self, scenario_id: i64) -> Result<Scenario, ApiError> {
        let LoadResponse(scenario) = self
            .api
            .get_json_with_query(&Self::path(scenario_id), &self.user_query())?;
        log::debug!(
            "loaded scenario {} ({} selections, {} control selections)",
            scenario_id,
            scenario.selections.len(),
            scenario.control_selections.len()
        );
        Ok(scenario)
    }

    /// Create an empty scenario. Name conflicts come back as
    /// [`ApiError::DuplicateName`] with the server's message.
    pub fn create(&self, name: &str, is_default: bool) -> Result<Scenario, ApiError> {
        let body = CreateBody {
            user_id: self.user_id,
            scenario_name: name,
            is_default,
        };
        let scenario: Scenario = self.api.send_json(
            Method::POST,
            "/api/capability-scenarios",
            &body,
            Some(name),
        )?;
        log::info!("created scenario {} '{}'", scenario.id(), name);
        Ok(scenario)
    }

    /// Replace the stored selections.
    pub fn update(&self, scenario_id: i64, snapshot: &SelectionSnapshot) -> Result<Scenario, ApiError> {
        let body = UpdateBody {
            selections: Some(&snapshot.selections),
            control_selections: Some(&snapshot.control_selections),
            ..UpdateBody::default()
        };
        self.put(scenario_id, &body, None)
    }

    pub fn rename(&self, scenario_id: i64, name: &str) -> Result<Scenario, ApiError> {
        let body = UpdateBody {
            scenario_name: Some(name),
            ..UpdateBody::default()
        };
        self.put(scenario_id, &body, Some(name))
    }

    /// Flag or unflag as default. The server clears the flag on the
    /// user's other scenarios.
    pub fn set_default(&self, scenario_id: i64, is_default: bool) -> Result<Scenario, ApiError> {
        let body = UpdateBody {
            is_default: Some(is_default),
            ..UpdateBody::default()
        };
        self.put(scenario_id, &body, None)
    }

    pub fn delete(&self, scenario_id: i64) -> Result<(), ApiError> {
        self.api.delete(&Self::path(scenario_id), &self.user_query())?;
        log::info!("deleted scenario {}", scenario_id);
        Ok(())
    }

    fn put(
        &self,
        scenario_id: i64,
        body: &UpdateBody<'_>,
        scenario_name: Option<&str>,
    ) -> Result<Scenario, ApiError> {
        self.api.send_json_with_query(
            Method::PUT,
            &Self::path(scenario_id),
            &self.user_query(),
            body,
            scenario_name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn scenarios(server: &MockServer, user_id: Option<i64>) -> ScenarioClient {
        ApiClient::new(server.base_url()).unwrap().scenarios(user_id)
    }

    fn summary_json(id: i64, name: &str, is_default: bool) -> serde_json::Value {
        serde_json::json!({
            "scenario_id": id,
            "user_id": 42,
            "scenario_name": name,
            "is_default": is_default,
            "created_at": "2025-03-01 10:00:00",
            "updated_at": "2025-03-02 09:30:00"
        })
    }

    #[test]
    fn test_list_sends_user_id() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/capability-scenarios")
                .query_param("user_id", "42");
            then.status(200).json_body(serde_json::json!([
                summary_json(2, "Baseline", true),
                summary_json(1, "Stretch", false),
            ]));
        });

        let client = scenarios(&server, Some(42));
        let list = client.list().unwrap();
        mock.assert();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].scenario_name, "Baseline");
        assert_eq!(list[1].updated_at.as_deref(), Some("2025-03-02 09:30:00"));

        let default = client.default_scenario().unwrap().unwrap();
        assert_eq!(default.scenario_id, 2);
    }

    #[test]
    fn test_list_without_user_omits_query() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/capability-scenarios")
                .query_param_missing("user_id");
            then.status(200).json_body(serde_json::json!([]));
        });

        assert!(scenarios(&server, None).list().unwrap().is_empty());
        mock.assert();
    }

    #[test]
    fn test_load_with_selections() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/capability-scenarios/7");
            let mut body = summary_json(7, "Baseline", true);
            body["selections"] = serde_json::json!([
                { "capability_id": "CAP-1", "is_active": true },
                { "capability_id": "CAP-2", "is_active": false }
            ]);
            body["control_selections"] = serde_json::json!([
                { "control_id": "C-1", "is_active": true }
            ]);
            then.status(200).json_body(body);
        });

        let scenario = scenarios(&server, Some(42)).load(7).unwrap();
        assert_eq!(scenario.id(), 7);
        assert_eq!(scenario.snapshot().active_capability_count(), 1);
        assert_eq!(scenario.control_selections.len(), 1);
    }

    #[test]
    fn test_load_takes_first_of_list() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/capability-scenarios/3");
            then.status(200).json_body(serde_json::json!([
                summary_json(3, "Wrapped", false),
                summary_json(4, "Ignored", false),
            ]));
        });

        let scenario = scenarios(&server, None).load(3).unwrap();
        assert_eq!(scenario.name(), "Wrapped");
        assert!(scenario.selections.is_empty());
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/capability-scenarios/99");
            then.status(404).json_body(serde_json::json!({ "detail": "Scenario not found" }));
        });

        let err = scenarios(&server, None).load(99).unwrap_err();
        assert_eq!(err, ApiError::NotFound("Scenario not found".into()));
    }

    #[test]
    fn test_create_posts_user_and_name() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/capability-scenarios")
                .json_body(serde_json::json!({
                    "user_id": 42,
                    "scenario_name": "Q3 plan",
                    "is_default": false
                }));
            then.status(200).json_body(summary_json(11, "Q3 plan", false));
        });

        let created = scenarios(&server, Some(42)).create("Q3 plan", false).unwrap();
        mock.assert();
        assert_eq!(created.id(), 11);
    }

    #[test]
    fn test_create_duplicate_surfaces_server_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/capability-scenarios");
            then.status(400).json_body(serde_json::json!({
                "detail": "Scenario name 'Baseline' already exists for this user. Please choose a different name."
            }));
        });

        let err = scenarios(&server, Some(42)).create("Baseline", false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Scenario name 'Baseline' already exists for this user. Please choose a different name."
        );
        assert!(matches!(err, ApiError::DuplicateName(_)));
    }

    #[test]
    fn test_update_sends_both_selection_lists() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/capability-scenarios/5")
                .query_param("user_id", "42")
                .json_body(serde_json::json!({
                    "selections": [{ "capability_id": "CAP-1", "is_active": true }],
                    "control_selections": []
                }));
            then.status(200).json_body(summary_json(5, "Baseline", true));
        });

        let snapshot = SelectionSnapshot {
            selections: vec![CapabilitySelection {
                capability_id: "CAP-1".into(),
                is_active: true,
            }],
            control_selections: Vec::new(),
        };
        scenarios(&server, Some(42)).update(5, &snapshot).unwrap();
        mock.assert();
    }

    #[test]
    fn test_update_integrity_error_keeps_server_detail() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT).path("/api/capability-scenarios/5");
            then.status(500).json_body(serde_json::json!({
                "detail": "IntegrityError: FOREIGN KEY constraint failed"
            }));
        });

        let err = scenarios(&server, Some(42))
            .update(5, &SelectionSnapshot::default())
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Http(500, "IntegrityError: FOREIGN KEY constraint failed".into())
        );
    }

    #[test]
    fn test_rename_and_set_default_send_single_field() {
        let server = MockServer::start();
        let rename = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/capability-scenarios/5")
                .json_body(serde_json::json!({ "scenario_name": "Renamed" }));
            then.status(200).json_body(summary_json(5, "Renamed", false));
        });
        let flag = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/capability-scenarios/5")
                .json_body(serde_json::json!({ "is_default": true }));
            then.status(200).json_body(summary_json(5, "Renamed", true));
        });

        let client = scenarios(&server, None);
        assert_eq!(client.rename(5, "Renamed").unwrap().name(), "Renamed");
        assert!(client.set_default(5, true).unwrap().summary.is_default);
        rename.assert();
        flag.assert();
    }

    #[test]
    fn test_delete() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/capability-scenarios/5")
                .query_param("user_id", "42");
            then.status(200)
                .json_body(serde_json::json!({ "message": "Scenario deleted successfully" }));
        });

        scenarios(&server, Some(42)).delete(5).unwrap();
        mock.assert();
    }
}
