//! Network seam for the worksheet.
//!
//! The controller talks to the dashboard only through [`WorksheetBackend`],
//! so it can be driven against an in-memory implementation in tests.

use capsheet_api::{ApiClient, ApiError, Scenario, ScenarioClient, ScenarioSummary};
use capsheet_core::{AnalysisRequest, CapabilityTree, Metrics, SelectionSnapshot, UniqueControls};

pub trait WorksheetBackend {
    fn capability_tree(&self) -> Result<CapabilityTree, ApiError>;
    fn unique_controls(&self) -> Result<UniqueControls, ApiError>;
    fn analyze(&self, request: &AnalysisRequest) -> Result<Metrics, ApiError>;

    fn list_scenarios(&self) -> Result<Vec<ScenarioSummary>, ApiError>;
    fn load_scenario(&self, scenario_id: i64) -> Result<Scenario, ApiError>;
    fn create_scenario(&self, name: &str, is_default: bool) -> Result<Scenario, ApiError>;
    fn update_scenario(&self, scenario_id: i64, snapshot: &SelectionSnapshot) -> Result<Scenario, ApiError>;
    fn rename_scenario(&self, scenario_id: i64, name: &str) -> Result<Scenario, ApiError>;
    fn set_default_scenario(&self, scenario_id: i64, is_default: bool) -> Result<Scenario, ApiError>;
    fn delete_scenario(&self, scenario_id: i64) -> Result<(), ApiError>;
}

/// The real thing: dashboard HTTP API for one user.
#[derive(Clone)]
pub struct HttpBackend {
    api: ApiClient,
    scenarios: ScenarioClient,
}

impl HttpBackend {
    pub fn new(api: ApiClient, user_id: Option<i64>) -> Self {
        let scenarios = api.scenarios(user_id);
        Self { api, scenarios }
    }

    pub fn scenarios(&self) -> &ScenarioClient {
        &self.scenarios
    }
}

impl WorksheetBackend for HttpBackend {
    fn capability_tree(&self) -> Result<CapabilityTree, ApiError> {
        self.api.capability_tree()
    }

    fn unique_controls(&self) -> Result<UniqueControls, ApiError> {
        self.api.unique_controls()
    }

    fn analyze(&self, request: &AnalysisRequest) -> Result<Metrics, ApiError> {
        self.api.analyze(request)
    }

    fn list_scenarios(&self) -> Result<Vec<ScenarioSummary>, ApiError> {
        self.scenarios.list()
    }

    fn load_scenario(&self, scenario_id: i64) -> Result<Scenario, ApiError> {
        self.scenarios.load(scenario_id)
    }

    fn create_scenario(&self, name: &str, is_default: bool) -> Result<Scenario, ApiError> {
        self.scenarios.create(name, is_default)
    }

    fn update_scenario(&self, scenario_id: i64, snapshot: &SelectionSnapshot) -> Result<Scenario, ApiError> {
        self.scenarios.update(scenario_id, snapshot)
    }

    fn rename_scenario(&self, scenario_id: i64, name: &str) -> Result<Scenario, ApiError> {
        self.scenarios.rename(scenario_id, name)
    }

    fn set_default_scenario(&self, scenario_id: i64, is_default: bool) -> Result<Scenario, ApiError> {
        self.scenarios.set_default(scenario_id, is_default)
    }

    fn delete_scenario(&self, scenario_id: i64) -> Result<(), ApiError> {
        self.scenarios.delete(scenario_id)
    }
}
