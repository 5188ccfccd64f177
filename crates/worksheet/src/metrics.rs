//! Metrics recomputation with a stale-response guard.
//!
//! Every recompute takes a ticket. A result is only applied if its ticket
//! is still the newest one issued; anything older lost a race with a later
//! mutation and is dropped. A failed recompute keeps the last known
//! metrics on screen.

use capsheet_api::ApiError;
use capsheet_core::{AnalysisRequest, Metrics, MetricsChange};

use crate::backend::WorksheetBackend;

/// A recompute that has been issued but not yet completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecalc {
    pub ticket: u64,
    pub request: AnalysisRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecalcOutcome {
    /// New metrics are current. Carries what moved (empty on first load).
    Applied(MetricsChange),
    /// Superseded by a newer request, discarded.
    Stale,
    /// Request failed, previous metrics kept.
    Failed(String),
}

#[derive(Debug, Default)]
pub struct MetricsEngine {
    current: Option<Metrics>,
    last_change: MetricsChange,
    issued: u64,
    applied: u64,
    last_error: Option<String>,
}

impl MetricsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&Metrics> {
        self.current.as_ref()
    }

    pub fn last_change(&self) -> &MetricsChange {
        &self.last_change
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Ticket of the most recently applied result (0 = none yet).
    pub fn applied_ticket(&self) -> u64 {
        self.applied
    }

    /// Issue a ticket for the current selection. The control list is only
    /// sent when non-empty.
    pub fn begin(&mut self, capability_ids: Vec<String>, control_ids: Vec<String>) -> PendingRecalc {
        self.issued += 1;
        PendingRecalc {
            ticket: self.issued,
            request: AnalysisRequest::new(capability_ids, control_ids),
        }
    }

    /// Apply or discard the result for `ticket`.
    pub fn complete(&mut self, ticket: u64, result: Result<Metrics, ApiError>) -> RecalcOutcome {
        if ticket < self.issued {
            log::debug!(
                "discarding stale metrics (ticket {}, latest {})",
                ticket,
                self.issued
            );
            return RecalcOutcome::Stale;
        }

        match result {
            Ok(metrics) => {
                let change = match &self.current {
                    Some(previous) => MetricsChange::between(previous, &metrics),
                    None => MetricsChange::default(),
                };
                self.current = Some(metrics);
                self.last_change = change.clone();
                self.applied = ticket;
                self.last_error = None;
                RecalcOutcome::Applied(change)
            }
            Err(e) => {
                let message = e.user_message();
                log::warn!("metrics recompute failed: {}", e);
                self.last_error = Some(message.clone());
                RecalcOutcome::Failed(message)
            }
        }
    }

    /// Issue, send and complete in one blocking call.
    pub fn recalculate(
        &mut self,
        backend: &dyn WorksheetBackend,
        capability_ids: Vec<String>,
        control_ids: Vec<String>,
    ) -> RecalcOutcome {
        let pending = self.begin(capability_ids, control_ids);
        let result = backend.analyze(&pending.request);
        self.complete(pending.ticket, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsheet_core::{DeltaSignal, MetricName};

    fn metrics(active_controls: u64, exposed: u64) -> Metrics {
        Metrics {
            active_controls,
            exposed_risks: exposed,
            ..Metrics::default()
        }
    }

    #[test]
    fn test_empty_control_list_is_omitted() {
        let mut engine = MetricsEngine::new();
        let pending = engine.begin(vec!["CAP-1".into()], Vec::new());
        assert_eq!(pending.request.control_ids, None);

        let pending = engine.begin(vec!["CAP-1".into()], vec!["C-1".into()]);
        assert_eq!(pending.request.control_ids, Some(vec!["C-1".to_string()]));
    }

    #[test]
    fn test_first_result_has_no_change() {
        let mut engine = MetricsEngine::new();
        let pending = engine.begin(Vec::new(), Vec::new());
        let outcome = engine.complete(pending.ticket, Ok(metrics(0, 5)));
        assert_eq!(outcome, RecalcOutcome::Applied(MetricsChange::default()));
        assert_eq!(engine.current().unwrap().exposed_risks, 5);
    }

    #[test]
    fn test_change_is_classified() {
        let mut engine = MetricsEngine::new();
        let first = engine.begin(Vec::new(), Vec::new());
        engine.complete(first.ticket, Ok(metrics(0, 5)));

        let second = engine.begin(vec!["CAP-1".into()], Vec::new());
        let RecalcOutcome::Applied(change) = engine.complete(second.ticket, Ok(metrics(3, 2))) else {
            panic!("expected applied");
        };
        assert_eq!(change.signal(MetricName::ActiveControls), Some(DeltaSignal::Green));
        assert_eq!(change.signal(MetricName::ExposedRisks), Some(DeltaSignal::Green));
        assert_eq!(engine.last_change(), &change);
    }

    #[test]
    fn test_out_of_order_response_is_discarded() {
        let mut engine = MetricsEngine::new();
        let slow = engine.begin(vec!["CAP-1".into()], Vec::new());
        let fast = engine.begin(vec!["CAP-1".into(), "CAP-2".into()], Vec::new());

        assert!(matches!(engine.complete(fast.ticket, Ok(metrics(6, 1))), RecalcOutcome::Applied(_)));
        assert_eq!(engine.complete(slow.ticket, Ok(metrics(3, 4))), RecalcOutcome::Stale);

        assert_eq!(engine.current().unwrap().active_controls, 6);
        assert_eq!(engine.applied_ticket(), fast.ticket);
    }

    #[test]
    fn test_failure_keeps_last_known_metrics() {
        let mut engine = MetricsEngine::new();
        let ok = engine.begin(Vec::new(), Vec::new());
        engine.complete(ok.ticket, Ok(metrics(2, 3)));

        let failing = engine.begin(vec!["CAP-1".into()], Vec::new());
        let outcome = engine.complete(failing.ticket, Err(ApiError::Network("Request timed out".into())));
        assert_eq!(outcome, RecalcOutcome::Failed("Request timed out".into()));
        assert_eq!(engine.current().unwrap().active_controls, 2);
        assert_eq!(engine.last_error(), Some("Request timed out"));
    }
}
