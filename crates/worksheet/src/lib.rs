//! Capability worksheet engine.
//!
//! [`WorksheetController`] composes the selection model, the metrics
//! engine, the scenario backend and the local draft store, and runs the
//! NoScenario / ScenarioBound state machine on top of them. Rendering
//! layers read [`WorksheetView`] and never touch the parts directly.

pub mod autosave;
pub mod backend;
pub mod context;
pub mod controller;
pub mod metrics;
pub mod status;
pub mod view;

pub use autosave::{AutoSave, Clock, ManualClock, SystemClock, DEFAULT_DEBOUNCE};
pub use backend::{HttpBackend, WorksheetBackend};
pub use context::AppContext;
pub use controller::{
    Activity, Binding, ControlToggle, SaveTarget, StartupOutcome, WorksheetController, WorksheetError,
};
pub use metrics::{MetricsEngine, PendingRecalc, RecalcOutcome};
pub use status::{StatusLevel, StatusMessage};
pub use view::{CapabilityRow, ControlRow, WorksheetView};
