//! Selection state: which capabilities and controls are switched on.
//!
//! Two membership sets, mutated only through the toggle operations:
//! - switching a capability on switches all of its controls on
//! - switching a capability off removes all of its controls
//! - a control can only be flipped while one of its capabilities is on
//!
//! The control rule is enforced at toggle time only. Per-capability status
//! (inactive / fully / partially active) is always derived, never stored.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tree::{Capability, CapabilityTree};

/// Derived activation status of one capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActivationStatus {
    Inactive,
    FullyActive,
    /// Active, but at least one of its controls is off. Also used for an
    /// active capability that has no controls at all.
    PartiallyActive,
}

impl ActivationStatus {
    pub fn is_active(self) -> bool {
        !matches!(self, ActivationStatus::Inactive)
    }

    pub fn label(self) -> &'static str {
        match self {
            ActivationStatus::Inactive => "inactive",
            ActivationStatus::FullyActive => "active",
            ActivationStatus::PartiallyActive => "partial",
        }
    }
}

/// Rejected selection mutations. The state is left untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// Capability or control without a usable id
    InvalidEntity(String),
    /// Capability id not present in the loaded tree
    UnknownCapability(String),
    /// Control toggle attempted while its capability is off
    CapabilityInactive {
        control_id: String,
        capability_id: String,
    },
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::InvalidEntity(what) => write!(f, "Invalid entity: {}", what),
            SelectionError::UnknownCapability(id) => write!(f, "Unknown capability: {}", id),
            SelectionError::CapabilityInactive { control_id, capability_id } => write!(
                f,
                "Control {} cannot be changed while capability {} is inactive",
                control_id, capability_id
            ),
        }
    }
}

impl std::error::Error for SelectionError {}

/// One capability's flag in a saved scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySelection {
    pub capability_id: String,
    pub is_active: bool,
}

/// One control's flag in a saved scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSelection {
    pub control_id: String,
    pub is_active: bool,
}

/// Wire form of a selection, as stored with a scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSnapshot {
    pub selections: Vec<CapabilitySelection>,
    pub control_selections: Vec<ControlSelection>,
}

impl SelectionSnapshot {
    pub fn active_capability_count(&self) -> usize {
        self.selections.iter().filter(|s| s.is_active).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    active_capabilities: BTreeSet<String>,
    active_controls: BTreeSet<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a state from raw id lists without any validation.
    pub fn from_ids<C, K>(capabilities: C, controls: K) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        Self {
            active_capabilities: capabilities.into_iter().map(Into::into).collect(),
            active_controls: controls.into_iter().map(Into::into).collect(),
        }
    }

    /// Rebuild a state from possibly stale id lists (a local draft).
    ///
    /// Capability ids missing from the tree are dropped, and so are
    /// controls none of whose capabilities ended up active.
    pub fn restored<C, K>(tree: &CapabilityTree, capabilities: C, controls: K) -> Self
    where
        C: IntoIterator,
        C::Item: AsRef<str>,
        K: IntoIterator,
        K::Item: AsRef<str>,
    {
        let mut state = Self::new();
        for id in capabilities {
            let id = id.as_ref();
            if tree.is_empty() || tree.contains(id) {
                state.active_capabilities.insert(id.to_string());
            }
        }
        for id in controls {
            let id = id.as_ref();
            if tree.is_empty() || state.reachable_through_active(tree, id) {
                state.active_controls.insert(id.to_string());
            }
        }
        state
    }

    /// Rebuild a state from a scenario's stored selections.
    ///
    /// When `control_selections` is empty the scenario predates per-control
    /// tracking, so every control of every active capability is switched on.
    pub fn from_snapshot(
        tree: &CapabilityTree,
        selections: &[CapabilitySelection],
        control_selections: &[ControlSelection],
    ) -> Self {
        let active_caps = selections
            .iter()
            .filter(|s| s.is_active)
            .map(|s| s.capability_id.as_str());

        if control_selections.is_empty() {
            let mut state = Self::restored(tree, active_caps, std::iter::empty::<&str>());
            let caps: Vec<String> = state.active_capabilities.iter().cloned().collect();
            for cap_id in caps {
                if let Some(cap) = tree.get(&cap_id) {
                    state.active_controls.extend(cap.control_ids().map(String::from));
                }
            }
            return state;
        }

        let active_controls = control_selections
            .iter()
            .filter(|s| s.is_active)
            .map(|s| s.control_id.as_str());
        Self::restored(tree, active_caps, active_controls)
    }

    pub fn active_capabilities(&self) -> &BTreeSet<String> {
        &self.active_capabilities
    }

    pub fn active_controls(&self) -> &BTreeSet<String> {
        &self.active_controls
    }

    pub fn active_capability_ids(&self) -> Vec<String> {
        self.active_capabilities.iter().cloned().collect()
    }

    pub fn active_control_ids(&self) -> Vec<String> {
        self.active_controls.iter().cloned().collect()
    }

    pub fn is_capability_active(&self, capability_id: &str) -> bool {
        self.active_capabilities.contains(capability_id)
    }

    pub fn is_control_active(&self, control_id: &str) -> bool {
        self.active_controls.contains(control_id)
    }

    pub fn is_empty(&self) -> bool {
        self.active_capabilities.is_empty() && self.active_controls.is_empty()
    }

    /// Flip a capability. Returns the new activation flag.
    pub fn toggle_capability(&mut self, capability: &Capability) -> Result<bool, SelectionError> {
        let id = capability.id().ok_or_else(|| {
            SelectionError::InvalidEntity(format!(
                "capability '{}' has no capability_id",
                capability.capability_name
            ))
        })?;

        if self.active_capabilities.remove(id) {
            for control_id in capability.control_ids() {
                self.active_controls.remove(control_id);
            }
            Ok(false)
        } else {
            self.active_capabilities.insert(id.to_string());
            self.active_controls
                .extend(capability.control_ids().map(String::from));
            Ok(true)
        }
    }

    /// Flip one control under its owning capability. Returns the new flag.
    pub fn toggle_control(
        &mut self,
        control_id: &str,
        owning_capability_id: &str,
    ) -> Result<bool, SelectionError> {
        let control_id = control_id.trim();
        if control_id.is_empty() {
            return Err(SelectionError::InvalidEntity("control has no control_id".into()));
        }
        if !self.active_capabilities.contains(owning_capability_id) {
            return Err(SelectionError::CapabilityInactive {
                control_id: control_id.to_string(),
                capability_id: owning_capability_id.to_string(),
            });
        }

        if self.active_controls.remove(control_id) {
            Ok(false)
        } else {
            self.active_controls.insert(control_id.to_string());
            Ok(true)
        }
    }

    pub fn status(&self, capability: &Capability) -> ActivationStatus {
        let Some(id) = capability.id() else {
            return ActivationStatus::Inactive;
        };
        if !self.active_capabilities.contains(id) {
            return ActivationStatus::Inactive;
        }

        let mut has_controls = false;
        for control_id in capability.control_ids() {
            has_controls = true;
            if !self.active_controls.contains(control_id) {
                return ActivationStatus::PartiallyActive;
            }
        }
        if has_controls {
            ActivationStatus::FullyActive
        } else {
            ActivationStatus::PartiallyActive
        }
    }

    /// Switch on every capability in the tree and every control under them.
    pub fn activate_all(&mut self, tree: &CapabilityTree) {
        for cap in tree.capabilities() {
            if let Some(id) = cap.id() {
                self.active_capabilities.insert(id.to_string());
                self.active_controls.extend(cap.control_ids().map(String::from));
            }
        }
    }

    pub fn clear(&mut self) {
        self.active_capabilities.clear();
        self.active_controls.clear();
    }

    /// Serialize for a scenario update.
    ///
    /// `selections` lists every capability in the tree with an explicit flag.
    /// `control_selections` lists each control reachable through an active
    /// capability once; a control shared by several active capabilities is
    /// active if any of its copies is.
    pub fn snapshot(&self, tree: &CapabilityTree) -> SelectionSnapshot {
        let selections = tree
            .capability_ids()
            .into_iter()
            .map(|id| CapabilitySelection {
                capability_id: id.to_string(),
                is_active: self.active_capabilities.contains(id),
            })
            .collect();

        let mut order: Vec<&str> = Vec::new();
        let mut merged: BTreeMap<&str, bool> = BTreeMap::new();
        for cap in tree.capabilities() {
            let Some(cap_id) = cap.id() else { continue };
            if !self.active_capabilities.contains(cap_id) {
                continue;
            }
            for control_id in cap.control_ids() {
                let active = self.active_controls.contains(control_id);
                match merged.get_mut(control_id) {
                    Some(flag) => *flag |= active,
                    None => {
                        order.push(control_id);
                        merged.insert(control_id, active);
                    }
                }
            }
        }

        let control_selections = order
            .into_iter()
            .map(|id| ControlSelection {
                control_id: id.to_string(),
                is_active: merged.get(id).copied().unwrap_or(false),
            })
            .collect();

        SelectionSnapshot { selections, control_selections }
    }

    fn reachable_through_active(&self, tree: &CapabilityTree, control_id: &str) -> bool {
        tree.capabilities_containing(control_id)
            .iter()
            .filter_map(|cap| cap.id())
            .any(|id| self.active_capabilities.contains(id))
    }
}
