//! Coverage metrics and change classification.
//!
//! Metrics are computed by the data service from the current selection
//! (`POST /api/capability-analysis`). The client only keeps the previous
//! value around to color the change.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Body of `POST /api/capability-analysis`.
///
/// `control_ids` is omitted entirely when no control is active. The service
/// reads an omitted list as "every control of the active capabilities" and
/// an empty list as "filter down to zero controls", so the two must never be
/// conflated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub capability_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_ids: Option<Vec<String>>,
}

impl AnalysisRequest {
    pub fn new(capability_ids: Vec<String>, control_ids: Vec<String>) -> Self {
        let control_ids = if control_ids.is_empty() { None } else { Some(control_ids) };
        Self { capability_ids, control_ids }
    }

    /// Request with an explicit control filter, even an empty one.
    pub fn with_control_filter(capability_ids: Vec<String>, control_ids: Vec<String>) -> Self {
        Self { capability_ids, control_ids: Some(control_ids) }
    }
}

/// Row of `active_controls_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveControlRow {
    pub control_id: String,
    #[serde(default)]
    pub control_description: Option<String>,
    #[serde(default)]
    pub capability_names: Vec<String>,
}

/// Row of `partially_covered_risks_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialRiskRow {
    pub risk_id: String,
    #[serde(default)]
    pub risk_title: String,
    #[serde(default)]
    pub risk_description: String,
    #[serde(default)]
    pub active_controls: Vec<String>,
    #[serde(default)]
    pub inactive_controls: Vec<String>,
    #[serde(default)]
    pub total_controls: u64,
}

/// Row of `exposed_risks_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedRiskRow {
    pub risk_id: String,
    #[serde(default)]
    pub risk_title: String,
    #[serde(default)]
    pub risk_description: String,
    #[serde(default)]
    pub required_controls: Vec<String>,
    #[serde(default)]
    pub total_controls: u64,
}

/// Response of `POST /api/capability-analysis`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    pub total_controls: u64,
    pub controls_in_capabilities: u64,
    pub active_controls: u64,
    /// Fully covered risks (every mitigating control active)
    pub active_risks: u64,
    pub partially_covered_risks: u64,
    pub exposed_risks: u64,
    pub total_risks: u64,
    pub active_controls_list: Vec<ActiveControlRow>,
    pub partially_covered_risks_list: Vec<PartialRiskRow>,
    pub exposed_risks_list: Vec<ExposedRiskRow>,
}

impl Metrics {
    pub fn value(&self, metric: MetricName) -> u64 {
        match metric {
            MetricName::TotalControls => self.total_controls,
            MetricName::ControlsInCapabilities => self.controls_in_capabilities,
            MetricName::ActiveControls => self.active_controls,
            MetricName::ActiveRisks => self.active_risks,
            MetricName::PartiallyCoveredRisks => self.partially_covered_risks,
            MetricName::ExposedRisks => self.exposed_risks,
            MetricName::TotalRisks => self.total_risks,
        }
    }
}

/// Headline metric names, as they appear on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    TotalControls,
    ControlsInCapabilities,
    ActiveControls,
    ActiveRisks,
    PartiallyCoveredRisks,
    ExposedRisks,
    TotalRisks,
}

impl MetricName {
    pub const ALL: [MetricName; 7] = [
        MetricName::TotalControls,
        MetricName::ControlsInCapabilities,
        MetricName::ActiveControls,
        MetricName::ActiveRisks,
        MetricName::PartiallyCoveredRisks,
        MetricName::ExposedRisks,
        MetricName::TotalRisks,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricName::TotalControls => "total_controls",
            MetricName::ControlsInCapabilities => "controls_in_capabilities",
            MetricName::ActiveControls => "active_controls",
            MetricName::ActiveRisks => "active_risks",
            MetricName::PartiallyCoveredRisks => "partially_covered_risks",
            MetricName::ExposedRisks => "exposed_risks",
            MetricName::TotalRisks => "total_risks",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Color flashed next to a metric that just changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaSignal {
    Green,
    Yellow,
    Red,
}

/// Movement of the other risk counters in the same recomputation.
///
/// Needed because a rise in partially covered risks is good news when
/// those risks came out of exposure and bad news when they fell out of
/// full coverage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaContext {
    pub exposed_delta: i64,
    pub fully_covered_delta: i64,
}

impl DeltaContext {
    pub fn between(old: &Metrics, new: &Metrics) -> Self {
        Self {
            exposed_delta: signed_delta(old.exposed_risks, new.exposed_risks),
            fully_covered_delta: signed_delta(old.active_risks, new.active_risks),
        }
    }
}

/// Classify a change of one metric. `None` means unchanged, or a metric
/// that carries no good/bad meaning (the totals).
pub fn classify_delta(
    metric: MetricName,
    old: u64,
    new: u64,
    context: DeltaContext,
) -> Option<DeltaSignal> {
    if old == new {
        return None;
    }
    let increased = new > old;

    match metric {
        MetricName::ActiveControls | MetricName::ActiveRisks => Some(if increased {
            DeltaSignal::Green
        } else {
            DeltaSignal::Yellow
        }),
        MetricName::ExposedRisks => Some(if increased {
            DeltaSignal::Red
        } else {
            DeltaSignal::Green
        }),
        MetricName::PartiallyCoveredRisks => {
            if !increased {
                return Some(DeltaSignal::Green);
            }
            let from_exposed = context.exposed_delta < 0;
            let from_full = context.fully_covered_delta < 0;
            Some(match (from_exposed, from_full) {
                (true, false) => DeltaSignal::Green,
                (false, true) => DeltaSignal::Yellow,
                // Both sources shrank: whichever lost more risks decides
                (true, true) if context.exposed_delta < context.fully_covered_delta => {
                    DeltaSignal::Green
                }
                (true, true) => DeltaSignal::Yellow,
                // No way to tell
                (false, false) => DeltaSignal::Yellow,
            })
        }
        MetricName::TotalControls
        | MetricName::ControlsInCapabilities
        | MetricName::TotalRisks => None,
    }
}

/// One changed headline metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDelta {
    pub metric: MetricName,
    pub old: u64,
    pub new: u64,
    pub signal: Option<DeltaSignal>,
}

impl MetricDelta {
    pub fn delta(&self) -> i64 {
        signed_delta(self.old, self.new)
    }
}

/// Everything that moved between two recomputations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsChange {
    pub deltas: Vec<MetricDelta>,
}

impl MetricsChange {
    pub fn between(old: &Metrics, new: &Metrics) -> Self {
        let context = DeltaContext::between(old, new);
        let deltas = MetricName::ALL
            .iter()
            .filter_map(|&metric| {
                let (o, n) = (old.value(metric), new.value(metric));
                (o != n).then(|| MetricDelta {
                    metric,
                    old: o,
                    new: n,
                    signal: classify_delta(metric, o, n, context),
                })
            })
            .collect();
        Self { deltas }
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn get(&self, metric: MetricName) -> Option<&MetricDelta> {
        self.deltas.iter().find(|d| d.metric == metric)
    }

    pub fn signal(&self, metric: MetricName) -> Option<DeltaSignal> {
        self.get(metric).and_then(|d| d.signal)
    }
}

fn signed_delta(old: u64, new: u64) -> i64 {
    let old = i64::try_from(old).unwrap_or(i64::MAX);
    let new = i64::try_from(new).unwrap_or(i64::MAX);
    new.saturating_sub(old)
}
