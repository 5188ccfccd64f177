//! Read-only projection of the controller for rendering.

use capsheet_core::{ActivationStatus, MetricDelta, Metrics};
use serde::Serialize;

use crate::controller::{Activity, Binding};
use crate::status::StatusMessage;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlRow {
    pub control_id: String,
    pub control_title: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityRow {
    /// `None` for malformed entries, which are shown but can't be toggled
    pub capability_id: Option<String>,
    pub capability_name: String,
    pub capability_type: String,
    pub capability_domain: String,
    pub status: ActivationStatus,
    pub active_controls: usize,
    pub total_controls: usize,
    /// Controls no other capability provides
    pub unique_controls: usize,
    /// Active controls that would disappear if this capability were switched off
    pub removal_impact: usize,
    pub controls: Vec<ControlRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorksheetView {
    pub binding: Binding,
    pub activity: Activity,
    pub status: Option<StatusMessage>,
    pub capabilities: Vec<CapabilityRow>,
    pub active_capability_count: usize,
    pub active_control_count: usize,
    pub metrics: Option<Metrics>,
    pub changes: Vec<MetricDelta>,
    pub metrics_error: Option<String>,
    pub autosave_pending: bool,
}

impl WorksheetView {
    pub fn capability(&self, capability_id: &str) -> Option<&CapabilityRow> {
        self.capabilities
            .iter()
            .find(|row| row.capability_id.as_deref() == Some(capability_id))
    }
}
