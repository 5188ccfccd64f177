//! Capability worksheet model.
//!
//! Pure data and rules, no I/O:
//! - `tree` - the static capability → control → risk reference tree
//! - `selection` - which capabilities and controls are switched on
//! - `metrics` - coverage metrics, analysis requests, change classification
//!
//! Everything that talks to the network or the disk lives in the
//! `capsheet-api`, `capsheet-config` and `capsheet-worksheet` crates.

pub mod metrics;
pub mod selection;
pub mod tree;

pub use metrics::{
    classify_delta, AnalysisRequest, ActiveControlRow, DeltaContext, DeltaSignal, ExposedRiskRow,
    MetricDelta, MetricName, Metrics, MetricsChange, PartialRiskRow,
};
pub use selection::{
    ActivationStatus, CapabilitySelection, ControlSelection, SelectionError, SelectionSnapshot,
    SelectionState,
};
pub use tree::{Capability, CapabilityTree, CapabilityType, ControlRef, RiskRef, UniqueControls};
