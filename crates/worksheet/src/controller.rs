//! Worksheet controller.
//!
//! Owns the selection, the metrics engine, the auto-save slot and the
//! scenario binding. Every user operation goes through here and ends with
//! a status message. Network failures never leave the selection half
//! applied: remote calls happen first, local state changes after.
//!
//! States: `NoScenario` (edits go to the local draft) and `ScenarioBound`
//! (edits go to the server). `Saving` / `Recalculating` are reported via
//! [`Activity`] while a call is in flight.

use std::fmt;
use std::time::{Duration, Instant};

use capsheet_api::{ApiError, Scenario, ScenarioSummary};
use capsheet_config::{Draft, DraftStore};
use capsheet_core::{ActivationStatus, CapabilityTree, SelectionError, SelectionState, UniqueControls};
use serde::Serialize;

use crate::autosave::{AutoSave, Clock};
use crate::backend::WorksheetBackend;
use crate::metrics::{MetricsEngine, RecalcOutcome};
use crate::status::{StatusLevel, StatusMessage};
use crate::view::{CapabilityRow, ControlRow, WorksheetView};

/// What the worksheet is currently saving into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Binding {
    NoScenario,
    ScenarioBound {
        scenario_id: i64,
        scenario_name: String,
        is_default: bool,
    },
}

impl Binding {
    pub fn scenario_id(&self) -> Option<i64> {
        match self {
            Binding::NoScenario => None,
            Binding::ScenarioBound { scenario_id, .. } => Some(*scenario_id),
        }
    }

    pub fn scenario_name(&self) -> Option<&str> {
        match self {
            Binding::NoScenario => None,
            Binding::ScenarioBound { scenario_name, .. } => Some(scenario_name),
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, Binding::ScenarioBound { .. })
    }

    fn from_scenario(scenario: &Scenario) -> Self {
        Binding::ScenarioBound {
            scenario_id: scenario.id(),
            scenario_name: scenario.name().to_string(),
            is_default: scenario.summary.is_default,
        }
    }
}

/// Transient sub-state while a blocking call is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Idle,
    Saving,
    Recalculating,
}

/// Result of [`WorksheetController::startup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    LoadedDefault(ScenarioSummary),
    /// No default scenario, but a local draft exists. The caller decides
    /// between `restore_draft` and `discard_draft`.
    DraftAvailable(Draft),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlToggle {
    Activated,
    Deactivated,
    /// Owning capability is inactive. Nothing changed.
    Reverted,
}

/// Where an explicit save ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    Scenario(i64),
    Draft { persisted: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorksheetError {
    Api(ApiError),
    Selection(SelectionError),
    /// Operation needs a bound scenario
    NoScenarioBound,
    /// Capability tree hasn't been loaded (or failed to load)
    TreeNotLoaded,
    InvalidName(String),
}

impl fmt::Display for WorksheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorksheetError::Api(e) => write!(f, "{}", e),
            WorksheetError::Selection(e) => write!(f, "{}", e),
            WorksheetError::NoScenarioBound => write!(f, "No scenario selected"),
            WorksheetError::TreeNotLoaded => write!(f, "Capability tree not loaded"),
            WorksheetError::InvalidName(msg) => write!(f, "Invalid scenario name: {}", msg),
        }
    }
}

impl std::error::Error for WorksheetError {}

impl From<ApiError> for WorksheetError {
    fn from(e: ApiError) -> Self {
        WorksheetError::Api(e)
    }
}

impl From<SelectionError> for WorksheetError {
    fn from(e: SelectionError) -> Self {
        WorksheetError::Selection(e)
    }
}

impl WorksheetError {
    pub fn user_message(&self) -> String {
        match self {
            WorksheetError::Api(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

pub struct WorksheetController {
    backend: Box<dyn WorksheetBackend>,
    drafts: Option<DraftStore>,
    clock: Box<dyn Clock>,
    tree: Option<CapabilityTree>,
    unique: Option<UniqueControls>,
    selection: SelectionState,
    metrics: MetricsEngine,
    autosave: AutoSave,
    binding: Binding,
    activity: Activity,
    status: Option<StatusMessage>,
    pending_draft: Option<Draft>,
}

impl WorksheetController {
    pub fn new(
        backend: Box<dyn WorksheetBackend>,
        drafts: Option<DraftStore>,
        clock: Box<dyn Clock>,
        debounce: Duration,
    ) -> Self {
        Self {
            backend,
            drafts,
            clock,
            tree: None,
            unique: None,
            selection: SelectionState::new(),
            metrics: MetricsEngine::new(),
            autosave: AutoSave::new(debounce),
            binding: Binding::NoScenario,
            activity: Activity::Idle,
            status: None,
            pending_draft: None,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn dismiss_status(&mut self) {
        self.status = None;
    }

    pub fn metrics(&self) -> &MetricsEngine {
        &self.metrics
    }

    pub fn tree(&self) -> Option<&CapabilityTree> {
        self.tree.as_ref()
    }

    pub fn unique_controls(&self) -> Option<&UniqueControls> {
        self.unique.as_ref()
    }

    pub fn pending_draft(&self) -> Option<&Draft> {
        self.pending_draft.as_ref()
    }

    pub fn is_autosave_pending(&self) -> bool {
        self.autosave.is_pending()
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Load reference data, then the default scenario if the user has one.
    /// Without a default, offer the local draft if there is one.
    pub fn startup(&mut self) -> Result<StartupOutcome, WorksheetError> {
        let tree = match self.backend.capability_tree() {
            Ok(tree) => tree,
            Err(e) => return self.fail("Failed to load capability tree", e),
        };
        log::info!("capability tree loaded: {} capabilities", tree.len());
        self.tree = Some(tree);

        self.unique = match self.backend.unique_controls() {
            Ok(unique) => Some(unique),
            Err(e) => {
                log::warn!("unique control data unavailable: {}", e);
                None
            }
        };

        match self.backend.list_scenarios() {
            Ok(list) => {
                if let Some(default) = list.into_iter().find(|s| s.is_default) {
                    if self.load(Some(default.scenario_id)).is_ok() {
                        return Ok(StartupOutcome::LoadedDefault(default));
                    }
                }
            }
            Err(e) => {
                log::warn!("could not list scenarios: {}", e);
                self.set_status(StatusMessage::warning(format!(
                    "Could not load saved scenarios: {}",
                    e.user_message()
                )));
            }
        }

        self.recalculate();

        let draft = self.drafts.as_ref().and_then(DraftStore::restore);
        match draft {
            Some(draft) if !draft.is_empty() => {
                let has_error = matches!(&self.status, Some(s) if s.level == StatusLevel::Error);
                if !has_error {
                    self.set_status(StatusMessage::info(
                        "An unsaved draft from a previous session is available",
                    ));
                }
                self.pending_draft = Some(draft.clone());
                Ok(StartupOutcome::DraftAvailable(draft))
            }
            _ => Ok(StartupOutcome::Empty),
        }
    }

    /// Apply the local draft to the selection. Ids that no longer exist in
    /// the tree are dropped.
    pub fn restore_draft(&mut self) -> bool {
        if self.binding.is_bound() {
            self.set_status(StatusMessage::warning(
                "A scenario is loaded; unload it before restoring the draft",
            ));
            return false;
        }

        let draft = self
            .pending_draft
            .take()
            .or_else(|| self.drafts.as_ref().and_then(DraftStore::restore));
        let Some(draft) = draft else {
            self.set_status(StatusMessage::info("No draft to restore"));
            return false;
        };

        let empty = CapabilityTree::default();
        let tree = self.tree.as_ref().unwrap_or(&empty);
        self.selection =
            SelectionState::restored(tree, &draft.active_capability_ids, &draft.active_control_ids);

        let dropped = draft
            .active_capability_ids
            .len()
            .saturating_sub(self.selection.active_capabilities().len());
        if dropped > 0 {
            log::info!("draft restore dropped {} unknown capabilities", dropped);
        }
        self.set_status(StatusMessage::success(format!(
            "Draft restored ({} capabilities)",
            self.selection.active_capabilities().len()
        )));
        self.recalculate();
        true
    }

    pub fn discard_draft(&mut self) {
        self.pending_draft = None;
        self.clear_draft();
        self.set_status(StatusMessage::info("Draft discarded"));
    }

    // ── Selection ───────────────────────────────────────────────────

    pub fn toggle_capability(&mut self, capability_id: &str) -> Result<ActivationStatus, WorksheetError> {
        if capability_id.trim().is_empty() {
            let err = SelectionError::InvalidEntity("capability id is empty".into());
            return self.fail("Cannot toggle capability", err);
        }
        let Some(tree) = self.tree.as_ref() else {
            return self.fail("Cannot toggle capability", WorksheetError::TreeNotLoaded);
        };
        let Some(capability) = tree.get(capability_id) else {
            let err = SelectionError::UnknownCapability(capability_id.to_string());
            return self.fail("Cannot toggle capability", err);
        };

        let result = self.selection.toggle_capability(capability);
        let status = self.selection.status(capability);
        match result {
            Ok(_) => {
                self.after_mutation();
                Ok(status)
            }
            Err(e) => self.fail("Cannot toggle capability", e),
        }
    }

    /// Flip one control. Attempting it under an inactive capability is
    /// reported as [`ControlToggle::Reverted`] with a warning, not an error.
    pub fn toggle_control(
        &mut self,
        control_id: &str,
        capability_id: &str,
    ) -> Result<ControlToggle, WorksheetError> {
        let control_id = control_id.trim();
        if control_id.is_empty() {
            let err = SelectionError::InvalidEntity("control id is empty".into());
            return self.fail("Cannot toggle control", err);
        }
        let Some(tree) = self.tree.as_ref() else {
            return self.fail("Cannot toggle control", WorksheetError::TreeNotLoaded);
        };
        let Some(capability) = tree.get(capability_id) else {
            let err = SelectionError::UnknownCapability(capability_id.to_string());
            return self.fail("Cannot toggle control", err);
        };
        if !capability.contains_control(control_id) {
            let err = SelectionError::InvalidEntity(format!(
                "control {} is not part of capability {}",
                control_id, capability_id
            ));
            return self.fail("Cannot toggle control", err);
        }
        let capability_name = capability.capability_name.clone();

        match self.selection.toggle_control(control_id, capability_id) {
            Ok(active) => {
                self.after_mutation();
                Ok(if active {
                    ControlToggle::Activated
                } else {
                    ControlToggle::Deactivated
                })
            }
            Err(SelectionError::CapabilityInactive { .. }) => {
                log::debug!("control {} toggle reverted: {} inactive", control_id, capability_id);
                self.set_status(StatusMessage::warning(format!(
                    "Activate '{}' before changing its controls",
                    capability_name
                )));
                Ok(ControlToggle::Reverted)
            }
            Err(e) => self.fail("Cannot toggle control", e),
        }
    }

    pub fn activate_all(&mut self) -> Result<(), WorksheetError> {
        let Some(tree) = self.tree.as_ref() else {
            return self.fail("Cannot activate all", WorksheetError::TreeNotLoaded);
        };
        self.selection.activate_all(tree);
        self.set_status(StatusMessage::info(format!(
            "All {} capabilities activated",
            self.selection.active_capabilities().len()
        )));
        self.after_mutation();
        Ok(())
    }

    pub fn clear_all(&mut self) {
        self.selection.clear();
        self.set_status(StatusMessage::info("All capabilities cleared"));
        self.after_mutation();
    }

    // ── Auto-save ───────────────────────────────────────────────────

    /// Run the pending auto-save if its deadline has passed.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        self.tick_at(now)
    }

    pub fn tick_at(&mut self, now: Instant) -> bool {
        if self.autosave.take_due(now) {
            self.run_autosave();
            true
        } else {
            false
        }
    }

    /// Run the pending auto-save now, whatever its deadline (exit path).
    pub fn flush(&mut self) -> bool {
        if self.autosave.take_pending() {
            self.run_autosave();
            true
        } else {
            false
        }
    }

    /// Flush before the binding changes. Returns the failure message of
    /// the scenario update, if it failed.
    fn flush_previous(&mut self) -> Option<String> {
        if self.autosave.take_pending() {
            self.run_autosave().err()
        } else {
            None
        }
    }

    fn run_autosave(&mut self) -> Result<(), String> {
        let Some(scenario_id) = self.binding.scenario_id() else {
            self.persist_draft();
            return Ok(());
        };
        let Some(tree) = self.tree.as_ref() else {
            log::warn!("auto-save skipped: capability tree not loaded");
            return Ok(());
        };
        let snapshot = self.selection.snapshot(tree);
        self.activity = Activity::Saving;
        let result = self.backend.update_scenario(scenario_id, &snapshot);
        self.activity = Activity::Idle;
        match result {
            Ok(_) => {
                log::debug!("auto-saved scenario {}", scenario_id);
                Ok(())
            }
            Err(e) => {
                log::warn!("auto-save of scenario {} failed: {}", scenario_id, e);
                let text = format!("Auto-save failed: {}", e.user_message());
                self.set_status(StatusMessage::error(text.clone()));
                Err(text)
            }
        }
    }

    // ── Scenarios ───────────────────────────────────────────────────

    /// Save into the bound scenario. Without one, the selection goes to
    /// the local draft and a warning says so.
    pub fn save(&mut self) -> Result<SaveTarget, WorksheetError> {
        let Some(scenario_id) = self.binding.scenario_id() else {
            let persisted = self.persist_draft();
            if persisted {
                self.autosave.cancel();
            }
            let text = if persisted {
                "No scenario selected. Changes were kept as a local draft; use Save As to name them."
            } else {
                "No scenario selected and the local draft could not be written. Use Save As to keep these changes."
            };
            self.set_status(StatusMessage::warning(text));
            return Ok(SaveTarget::Draft { persisted });
        };

        let Some(tree) = self.tree.as_ref() else {
            return self.fail("Failed to save scenario", WorksheetError::TreeNotLoaded);
        };
        let snapshot = self.selection.snapshot(tree);

        self.activity = Activity::Saving;
        let result = self.backend.update_scenario(scenario_id, &snapshot);
        self.activity = Activity::Idle;

        match result {
            Ok(_) => {
                self.autosave.cancel();
                let name = self.binding.scenario_name().unwrap_or_default().to_string();
                self.set_status(StatusMessage::success(format!("Scenario '{}' saved", name)));
                Ok(SaveTarget::Scenario(scenario_id))
            }
            Err(e) => self.fail("Failed to save scenario", e),
        }
    }

    /// Create a scenario holding the current selection and bind to it.
    pub fn save_as(&mut self, name: &str) -> Result<i64, WorksheetError> {
        let name = match validate_name(name) {
            Ok(name) => name,
            Err(e) => return self.fail("Cannot save scenario", e),
        };
        let Some(tree) = self.tree.as_ref() else {
            return self.fail("Cannot save scenario", WorksheetError::TreeNotLoaded);
        };
        let snapshot = self.selection.snapshot(tree);

        // Pending edits go into the new scenario, not the old target
        let had_pending = self.autosave.take_pending();

        self.activity = Activity::Saving;
        let created = self.backend.create_scenario(&name, false);
        let created = match created {
            Ok(scenario) => scenario,
            Err(e) => {
                self.activity = Activity::Idle;
                if had_pending {
                    self.autosave.schedule(self.clock.now());
                }
                return self.fail("Failed to create scenario", e);
            }
        };
        let scenario_id = created.id();

        if let Err(e) = self.backend.update_scenario(scenario_id, &snapshot) {
            self.activity = Activity::Idle;
            if had_pending {
                self.autosave.schedule(self.clock.now());
            }
            return self.fail(
                &format!("Scenario '{}' was created but its selections were not saved", name),
                e,
            );
        }
        self.activity = Activity::Idle;

        match self.backend.load_scenario(scenario_id) {
            Ok(scenario) => self.apply_scenario(scenario),
            Err(e) => {
                // The server has exactly what we sent; keep the local copy
                log::warn!("reload of new scenario {} failed: {}", scenario_id, e);
                self.binding = Binding::from_scenario(&created);
                self.pending_draft = None;
                self.clear_draft();
            }
        }

        self.set_status(StatusMessage::success(format!("Saved as '{}'", name)));
        Ok(scenario_id)
    }

    /// Create an empty scenario and switch to it.
    pub fn create_new(&mut self, name: &str) -> Result<i64, WorksheetError> {
        let name = match validate_name(name) {
            Ok(name) => name,
            Err(e) => return self.fail("Cannot create scenario", e),
        };

        let created = match self.backend.create_scenario(&name, false) {
            Ok(scenario) => scenario,
            Err(e) => return self.fail("Failed to create scenario", e),
        };
        let scenario_id = created.id();

        self.load(Some(scenario_id))?;
        self.set_status(StatusMessage::success(format!("Created scenario '{}'", name)));
        Ok(scenario_id)
    }

    /// Bind to a scenario, or unbind with `None`.
    ///
    /// A pending auto-save is written to the previous target first. If
    /// fetching the scenario fails nothing changes.
    pub fn load(&mut self, scenario_id: Option<i64>) -> Result<(), WorksheetError> {
        let Some(scenario_id) = scenario_id else {
            let flush_error = self.flush_previous();
            self.binding = Binding::NoScenario;
            self.selection.clear();
            self.set_status(StatusMessage::info("No scenario selected"));
            self.recalculate();
            self.report_flush_failure(flush_error);
            return Ok(());
        };

        let scenario = match self.backend.load_scenario(scenario_id) {
            Ok(scenario) => scenario,
            Err(e) => return self.fail(&format!("Failed to load scenario {}", scenario_id), e),
        };
        let flush_error = self.flush_previous();

        let name = scenario.name().to_string();
        self.apply_scenario(scenario);
        self.set_status(StatusMessage::success(format!("Loaded scenario '{}'", name)));
        self.recalculate();
        self.report_flush_failure(flush_error);
        Ok(())
    }

    /// Delete the bound scenario and return to an empty, unbound worksheet.
    pub fn delete(&mut self) -> Result<(), WorksheetError> {
        let Binding::ScenarioBound { scenario_id, scenario_name, .. } = self.binding.clone() else {
            self.set_status(StatusMessage::warning("No scenario selected to delete"));
            return Err(WorksheetError::NoScenarioBound);
        };

        if let Err(e) = self.backend.delete_scenario(scenario_id) {
            return self.fail("Failed to delete scenario", e);
        }

        self.binding = Binding::NoScenario;
        self.selection.clear();
        self.autosave.cancel();
        self.pending_draft = None;
        self.clear_draft();
        self.set_status(StatusMessage::success(format!("Scenario '{}' deleted", scenario_name)));
        self.recalculate();
        Ok(())
    }

    pub fn rename(&mut self, name: &str) -> Result<(), WorksheetError> {
        let Some(scenario_id) = self.binding.scenario_id() else {
            self.set_status(StatusMessage::warning("No scenario selected to rename"));
            return Err(WorksheetError::NoScenarioBound);
        };
        let name = match validate_name(name) {
            Ok(name) => name,
            Err(e) => return self.fail("Cannot rename scenario", e),
        };

        match self.backend.rename_scenario(scenario_id, &name) {
            Ok(scenario) => {
                if let Binding::ScenarioBound { scenario_name, .. } = &mut self.binding {
                    *scenario_name = scenario.name().to_string();
                }
                self.set_status(StatusMessage::success(format!("Renamed to '{}'", name)));
                Ok(())
            }
            Err(e) => self.fail("Failed to rename scenario", e),
        }
    }

    pub fn set_default(&mut self, is_default: bool) -> Result<(), WorksheetError> {
        let Some(scenario_id) = self.binding.scenario_id() else {
            self.set_status(StatusMessage::warning("No scenario selected"));
            return Err(WorksheetError::NoScenarioBound);
        };

        match self.backend.set_default_scenario(scenario_id, is_default) {
            Ok(scenario) => {
                if let Binding::ScenarioBound { is_default: flag, .. } = &mut self.binding {
                    *flag = scenario.summary.is_default;
                }
                let text = if is_default {
                    "Scenario will open by default"
                } else {
                    "Scenario is no longer the default"
                };
                self.set_status(StatusMessage::success(text));
                Ok(())
            }
            Err(e) => self.fail("Failed to update default scenario", e),
        }
    }

    pub fn list_scenarios(&mut self) -> Result<Vec<ScenarioSummary>, WorksheetError> {
        match self.backend.list_scenarios() {
            Ok(list) => Ok(list),
            Err(e) => self.fail("Failed to list scenarios", e),
        }
    }

    // ── View ────────────────────────────────────────────────────────

    pub fn view(&self) -> WorksheetView {
        let capabilities = self
            .tree
            .as_ref()
            .map(|tree| {
                tree.capabilities()
                    .iter()
                    .map(|cap| {
                        let controls: Vec<ControlRow> = cap
                            .controls
                            .iter()
                            .map(|c| ControlRow {
                                control_id: c.control_id.clone(),
                                control_title: c.control_title.clone(),
                                is_active: self.selection.is_capability_active(
                                    cap.id().unwrap_or_default(),
                                ) && self.selection.is_control_active(c.control_id.trim()),
                            })
                            .collect();
                        let id = cap.id();
                        CapabilityRow {
                            capability_id: id.map(String::from),
                            capability_name: cap.capability_name.clone(),
                            capability_type: String::from(cap.capability_type.clone()),
                            capability_domain: cap.capability_domain.clone(),
                            status: self.selection.status(cap),
                            active_controls: controls.iter().filter(|c| c.is_active).count(),
                            total_controls: controls.len(),
                            unique_controls: match (&self.unique, id) {
                                (Some(u), Some(id)) => u.unique_count(id),
                                _ => 0,
                            },
                            removal_impact: match (&self.unique, id) {
                                (Some(u), Some(id)) if self.selection.is_capability_active(id) => {
                                    u.removal_impact(id, self.selection.active_controls())
                                }
                                _ => 0,
                            },
                            controls,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        WorksheetView {
            binding: self.binding.clone(),
            activity: self.activity,
            status: self.status.clone(),
            capabilities,
            active_capability_count: self.selection.active_capabilities().len(),
            active_control_count: self.selection.active_controls().len(),
            metrics: self.metrics.current().cloned(),
            changes: self.metrics.last_change().deltas.clone(),
            metrics_error: self.metrics.last_error().map(String::from),
            autosave_pending: self.autosave.is_pending(),
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn after_mutation(&mut self) {
        self.recalculate();
        self.autosave.schedule(self.clock.now());
    }

    fn recalculate(&mut self) -> RecalcOutcome {
        let outcome = self.recalculate_quiet();
        if let RecalcOutcome::Failed(message) = &outcome {
            self.set_status(StatusMessage::warning(format!(
                "Metrics could not be updated: {}",
                message
            )));
        }
        outcome
    }

    /// Recompute without touching the status line.
    fn recalculate_quiet(&mut self) -> RecalcOutcome {
        self.activity = Activity::Recalculating;
        let outcome = self.metrics.recalculate(
            self.backend.as_ref(),
            self.selection.active_capability_ids(),
            self.selection.active_control_ids(),
        );
        self.activity = Activity::Idle;
        outcome
    }

    fn apply_scenario(&mut self, scenario: Scenario) {
        let empty = CapabilityTree::default();
        let tree = self.tree.as_ref().unwrap_or(&empty);
        self.selection =
            SelectionState::from_snapshot(tree, &scenario.selections, &scenario.control_selections);
        self.binding = Binding::from_scenario(&scenario);
        self.autosave.cancel();
        self.pending_draft = None;
        self.clear_draft();
        log::info!(
            "bound to scenario {} '{}' ({} capabilities active)",
            scenario.id(),
            scenario.name(),
            self.selection.active_capabilities().len()
        );
    }

    fn persist_draft(&mut self) -> bool {
        match self.drafts.as_mut() {
            Some(store) => store.persist(self.selection.active_capabilities(), self.selection.active_controls()),
            None => {
                log::debug!("no draft store configured, draft not written");
                false
            }
        }
    }

    fn clear_draft(&mut self) {
        if let Some(store) = self.drafts.as_mut() {
            store.clear();
        }
    }

    /// Keep a failed flush of the previous scenario visible next to the
    /// outcome of the operation that triggered it.
    fn report_flush_failure(&mut self, flush_error: Option<String>) {
        let Some(error) = flush_error else {
            return;
        };
        let text = match &self.status {
            Some(status) => format!("{}. Previous scenario was not saved: {}", status.text, error),
            None => format!("Previous scenario was not saved: {}", error),
        };
        self.set_status(StatusMessage::error(text));
    }

    fn set_status(&mut self, status: StatusMessage) {
        log::debug!("status: {}", status);
        self.status = Some(status);
    }

    /// Report a failed user operation and return it as an error.
    /// Duplicate-name messages are shown exactly as the server wrote them.
    fn fail<T>(&mut self, context: &str, err: impl Into<WorksheetError>) -> Result<T, WorksheetError> {
        let err = err.into();
        let text = match &err {
            WorksheetError::Api(ApiError::DuplicateName(message)) => message.clone(),
            other => format!("{}: {}", context, other.user_message()),
        };
        log::error!("{}", text);
        self.status = Some(StatusMessage::error(text));
        Err(err)
    }
}

fn validate_name(name: &str) -> Result<String, WorksheetError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(WorksheetError::InvalidName("name cannot be empty".into()));
    }
    Ok(name.to_string())
}
