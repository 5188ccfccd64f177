//! In-memory backend and storage fakes for controller tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;
use std::time::Duration;

use capsheet_api::{ApiError, Scenario, ScenarioSummary};
use capsheet_config::{DraftStorage, DraftStore, MemoryStorage, StorageError};
use capsheet_core::{
    AnalysisRequest, Capability, CapabilitySelection, CapabilityTree, ControlSelection, Metrics,
    RiskRef, SelectionSnapshot, UniqueControls,
};
use capsheet_worksheet::{ManualClock, WorksheetController};

pub const DEBOUNCE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Tree,
    Unique,
    Analyze(AnalysisRequest),
    List,
    Load(i64),
    Create(String),
    Update(i64, SelectionSnapshot),
    Rename(i64, String),
    SetDefault(i64, bool),
    Delete(i64),
}

#[derive(Default)]
pub struct FakeState {
    pub tree: Vec<Capability>,
    pub unique: Option<UniqueControls>,
    pub scenarios: BTreeMap<i64, Scenario>,
    pub next_id: i64,
    pub calls: Vec<Call>,
    /// Every request fails with a connection error
    pub offline: bool,
    /// Only the analysis endpoint fails
    pub analyze_fails: bool,
    /// Only selection updates fail
    pub update_fails: bool,
}

/// Records every call; scenario storage and analysis are computed locally.
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub state: Rc<RefCell<FakeState>>,
}

impl FakeBackend {
    pub fn new(tree: Vec<Capability>) -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state.borrow_mut();
            state.tree = tree;
            state.next_id = 1;
        }
        backend
    }

    pub fn with_scenario(self, name: &str, is_default: bool, snapshot: SelectionSnapshot) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let id = state.next_id;
            state.next_id += 1;
            state.scenarios.insert(id, scenario(id, name, is_default, snapshot));
        }
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn update_calls(&self) -> Vec<(i64, SelectionSnapshot)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Update(id, snap) => Some((id, snap)),
                _ => None,
            })
            .collect()
    }

    pub fn analyze_calls(&self) -> Vec<AnalysisRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Analyze(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.borrow_mut().offline = offline;
    }

    pub fn set_analyze_fails(&self, fails: bool) {
        self.state.borrow_mut().analyze_fails = fails;
    }

    pub fn set_update_fails(&self, fails: bool) {
        self.state.borrow_mut().update_fails = fails;
    }

    pub fn stored(&self, scenario_id: i64) -> Option<Scenario> {
        self.state.borrow().scenarios.get(&scenario_id).cloned()
    }

    fn record(&self, call: Call) -> Result<(), ApiError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(call);
        if state.offline {
            return Err(ApiError::Network("Could not connect to server".into()));
        }
        Ok(())
    }
}

pub fn scenario(id: i64, name: &str, is_default: bool, snapshot: SelectionSnapshot) -> Scenario {
    Scenario {
        summary: ScenarioSummary {
            scenario_id: id,
            user_id: Some(42),
            scenario_name: name.to_string(),
            is_default,
            created_at: None,
            updated_at: None,
        },
        selections: snapshot.selections,
        control_selections: snapshot.control_selections,
    }
}

/// Risk coverage from the fake tree: a risk is fully covered when every
/// capability listing it is active, exposed when none is.
fn analyze_locally(tree: &[Capability], request: &AnalysisRequest) -> Metrics {
    let active: BTreeSet<&str> = request.capability_ids.iter().map(String::as_str).collect();

    let all_controls: BTreeSet<&str> = tree.iter().flat_map(|c| c.control_ids()).collect();
    let mut active_controls: BTreeSet<&str> = tree
        .iter()
        .filter(|c| c.id().map_or(false, |id| active.contains(id)))
        .flat_map(|c| c.control_ids())
        .collect();
    if let Some(filter) = &request.control_ids {
        active_controls.retain(|id| filter.iter().any(|f| f.as_str() == *id));
    }

    let mut risks: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for cap in tree {
        let is_active = cap.id().map_or(false, |id| active.contains(id));
        for risk in &cap.risks {
            let entry = risks.entry(risk.risk_id.as_str()).or_default();
            entry.0 += 1;
            if is_active {
                entry.1 += 1;
            }
        }
    }

    let mut metrics = Metrics {
        total_controls: all_controls.len() as u64,
        controls_in_capabilities: all_controls.len() as u64,
        active_controls: active_controls.len() as u64,
        total_risks: risks.len() as u64,
        ..Metrics::default()
    };
    for (total, covered) in risks.values() {
        if *covered == 0 {
            metrics.exposed_risks += 1;
        } else if covered == total {
            metrics.active_risks += 1;
        } else {
            metrics.partially_covered_risks += 1;
        }
    }
    metrics
}

impl capsheet_worksheet::WorksheetBackend for FakeBackend {
    fn capability_tree(&self) -> Result<CapabilityTree, ApiError> {
        self.record(Call::Tree)?;
        Ok(CapabilityTree::new(self.state.borrow().tree.clone()))
    }

    fn unique_controls(&self) -> Result<UniqueControls, ApiError> {
        self.record(Call::Unique)?;
        self.state
            .borrow()
            .unique
            .clone()
            .ok_or_else(|| ApiError::Http(500, "unique controls unavailable".into()))
    }

    fn analyze(&self, request: &AnalysisRequest) -> Result<Metrics, ApiError> {
        self.record(Call::Analyze(request.clone()))?;
        let state = self.state.borrow();
        if state.analyze_fails {
            return Err(ApiError::Http(500, "Analysis service unavailable".into()));
        }
        Ok(analyze_locally(&state.tree, request))
    }

    fn list_scenarios(&self) -> Result<Vec<ScenarioSummary>, ApiError> {
        self.record(Call::List)?;
        let mut list: Vec<ScenarioSummary> = self
            .state
            .borrow()
            .scenarios
            .values()
            .map(|s| s.summary.clone())
            .collect();
        list.sort_by_key(|s| (!s.is_default, -s.scenario_id));
        Ok(list)
    }

    fn load_scenario(&self, scenario_id: i64) -> Result<Scenario, ApiError> {
        self.record(Call::Load(scenario_id))?;
        self.stored(scenario_id)
            .ok_or_else(|| ApiError::NotFound("Scenario not found".into()))
    }

    fn create_scenario(&self, name: &str, is_default: bool) -> Result<Scenario, ApiError> {
        self.record(Call::Create(name.to_string()))?;
        let mut state = self.state.borrow_mut();
        if state.scenarios.values().any(|s| s.name() == name) {
            let body = format!(
                r#"{{"detail": "Scenario name '{}' already exists for this user. Please choose a different name."}}"#,
                name
            );
            return Err(ApiError::from_response(400, &body, Some(name)));
        }
        let id = state.next_id;
        state.next_id += 1;
        let created = scenario(id, name, is_default, SelectionSnapshot::default());
        state.scenarios.insert(id, created.clone());
        Ok(created)
    }

    fn update_scenario(&self, scenario_id: i64, snapshot: &SelectionSnapshot) -> Result<Scenario, ApiError> {
        self.record(Call::Update(scenario_id, snapshot.clone()))?;
        let mut state = self.state.borrow_mut();
        if state.update_fails {
            return Err(ApiError::Http(500, "database is locked".into()));
        }
        let stored = state
            .scenarios
            .get_mut(&scenario_id)
            .ok_or_else(|| ApiError::NotFound("Scenario not found".into()))?;
        stored.selections = snapshot.selections.clone();
        stored.control_selections = snapshot.control_selections.clone();
        Ok(stored.clone())
    }

    fn rename_scenario(&self, scenario_id: i64, name: &str) -> Result<Scenario, ApiError> {
        self.record(Call::Rename(scenario_id, name.to_string()))?;
        let mut state = self.state.borrow_mut();
        if state
            .scenarios
            .values()
            .any(|s| s.name() == name && s.id() != scenario_id)
        {
            return Err(ApiError::from_response(
                500,
                r#"{"detail": "Database error: UNIQUE constraint failed: capability_scenarios.user_id, capability_scenarios.scenario_name"}"#,
                Some(name),
            ));
        }
        let stored = state
            .scenarios
            .get_mut(&scenario_id)
            .ok_or_else(|| ApiError::NotFound("Scenario not found".into()))?;
        stored.summary.scenario_name = name.to_string();
        Ok(stored.clone())
    }

    fn set_default_scenario(&self, scenario_id: i64, is_default: bool) -> Result<Scenario, ApiError> {
        self.record(Call::SetDefault(scenario_id, is_default))?;
        let mut state = self.state.borrow_mut();
        if is_default {
            for s in state.scenarios.values_mut() {
                s.summary.is_default = false;
            }
        }
        let stored = state
            .scenarios
            .get_mut(&scenario_id)
            .ok_or_else(|| ApiError::NotFound("Scenario not found".into()))?;
        stored.summary.is_default = is_default;
        Ok(stored.clone())
    }

    fn delete_scenario(&self, scenario_id: i64) -> Result<(), ApiError> {
        self.record(Call::Delete(scenario_id))?;
        self.state
            .borrow_mut()
            .scenarios
            .remove(&scenario_id)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound("Scenario not found".into()))
    }
}

/// Draft storage whose contents stay visible to the test after the
/// controller takes ownership of its store.
#[derive(Clone, Default)]
pub struct SharedStorage(pub Rc<RefCell<MemoryStorage>>);

impl DraftStorage for SharedStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.0.borrow().get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.0.borrow_mut().set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.0.borrow_mut().remove(key)
    }
}

impl SharedStorage {
    pub fn store(&self) -> DraftStore {
        DraftStore::new(Box::new(self.clone()), Some(42))
    }
}

/// Three capabilities: two sharing control C-2, one without controls.
pub fn sample_tree() -> Vec<Capability> {
    let mut logging = Capability::new("CAP-1", "Logging").with_controls(["C-1", "C-2"]);
    logging.risks = vec![risk("R-1"), risk("R-2")];
    let mut monitoring = Capability::new("CAP-2", "Monitoring").with_controls(["C-2", "C-3"]);
    monitoring.risks = vec![risk("R-2")];
    let mut policy = Capability::new("CAP-3", "Policy");
    policy.risks = vec![risk("R-3")];
    vec![logging, monitoring, policy]
}

fn risk(id: &str) -> RiskRef {
    RiskRef {
        risk_id: id.to_string(),
        risk_title: format!("Risk {}", id),
    }
}

pub fn snapshot(caps: &[(&str, bool)], controls: &[(&str, bool)]) -> SelectionSnapshot {
    SelectionSnapshot {
        selections: caps
            .iter()
            .map(|(id, on)| CapabilitySelection {
                capability_id: id.to_string(),
                is_active: *on,
            })
            .collect(),
        control_selections: controls
            .iter()
            .map(|(id, on)| ControlSelection {
                control_id: id.to_string(),
                is_active: *on,
            })
            .collect(),
    }
}

pub struct Harness {
    pub backend: FakeBackend,
    pub storage: SharedStorage,
    pub clock: ManualClock,
    pub controller: WorksheetController,
}

impl Harness {
    pub fn new(backend: FakeBackend) -> Self {
        let storage = SharedStorage::default();
        let clock = ManualClock::new();
        let controller = WorksheetController::new(
            Box::new(backend.clone()),
            Some(storage.store()),
            Box::new(clock.clone()),
            DEBOUNCE,
        );
        Self {
            backend,
            storage,
            clock,
            controller,
        }
    }

    /// Controller over the sample tree, started up.
    pub fn started(backend: FakeBackend) -> Self {
        let mut harness = Self::new(backend);
        harness.controller.startup().unwrap();
        harness.backend.clear_calls();
        harness
    }

    pub fn draft(&self) -> Option<capsheet_config::Draft> {
        self.storage.store().restore()
    }
}
