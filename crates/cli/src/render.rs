//! Plain-text rendering of the worksheet view and scenario lists.

use std::fmt::Write as _;

use capsheet_api::ScenarioSummary;
use capsheet_config::Draft;
use capsheet_core::{ActivationStatus, DeltaSignal, MetricDelta, MetricName};
use capsheet_worksheet::{Binding, StatusMessage, WorksheetView};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const NAME_WIDTH: usize = 32;

/// Truncate to `width` display columns, marking the cut with "..".
pub(crate) fn truncate_display(s: &str, width: usize) -> String {
    if UnicodeWidthStr::width(s) <= width {
        return s.to_string();
    }
    let budget = width.saturating_sub(2);
    let mut out = String::new();
    let mut used = 0;
    for ch in s.chars() {
        let cw = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + cw > budget {
            break;
        }
        used += cw;
        out.push(ch);
    }
    if width >= 2 {
        out.push_str("..");
    }
    out
}

/// Pad or truncate to exactly `width` display columns.
pub(crate) fn pad_right(s: &str, width: usize) -> String {
    let cut = truncate_display(s, width);
    let w = UnicodeWidthStr::width(cut.as_str());
    format!("{}{}", cut, " ".repeat(width.saturating_sub(w)))
}

pub(crate) fn status_line(status: &StatusMessage) -> String {
    format!("{}: {}", status.level.label(), status.text)
}

pub(crate) fn binding_line(binding: &Binding) -> String {
    match binding {
        Binding::NoScenario => "No scenario (edits are kept as a local draft)".to_string(),
        Binding::ScenarioBound { scenario_id, scenario_name, is_default } => {
            let default = if *is_default { ", default" } else { "" };
            format!("Scenario: {} (#{}{})", scenario_name, scenario_id, default)
        }
    }
}

fn status_mark(status: ActivationStatus) -> &'static str {
    match status {
        ActivationStatus::FullyActive => "[x]",
        ActivationStatus::PartiallyActive => "[~]",
        ActivationStatus::Inactive => "[ ]",
    }
}

fn signal_label(signal: Option<DeltaSignal>) -> &'static str {
    match signal {
        Some(DeltaSignal::Green) => "green",
        Some(DeltaSignal::Yellow) => "yellow",
        Some(DeltaSignal::Red) => "red",
        None => "",
    }
}

fn delta_note(delta: &MetricDelta) -> String {
    let label = signal_label(delta.signal);
    if label.is_empty() {
        format!("({:+})", delta.delta())
    } else {
        format!("({:+}, {})", delta.delta(), label)
    }
}

/// Full worksheet: binding, capability table, metrics with changes.
/// `show_controls` lists each capability's controls under it.
pub(crate) fn worksheet(view: &WorksheetView, show_controls: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", binding_line(&view.binding));
    let _ = writeln!(
        out,
        "Active: {} capabilities, {} controls{}",
        view.active_capability_count,
        view.active_control_count,
        if view.autosave_pending { " (unsaved)" } else { "" }
    );
    let _ = writeln!(out);

    if view.capabilities.is_empty() {
        let _ = writeln!(out, "No capabilities loaded.");
    } else {
        let _ = writeln!(
            out,
            "    {:<12} {} {:>8} {:>6} {:>6}",
            "ID",
            pad_right("NAME", NAME_WIDTH),
            "CONTROLS",
            "UNIQUE",
            "IMPACT"
        );
        let _ = writeln!(out, "{}", "-".repeat(72));
        for row in &view.capabilities {
            let _ = writeln!(
                out,
                "{} {:<12} {} {:>8} {:>6} {:>6}",
                status_mark(row.status),
                row.capability_id.as_deref().unwrap_or("-"),
                pad_right(&row.capability_name, NAME_WIDTH),
                format!("{}/{}", row.active_controls, row.total_controls),
                row.unique_controls,
                row.removal_impact
            );
            if show_controls {
                for control in &row.controls {
                    let _ = writeln!(
                        out,
                        "      {} {:<10} {}",
                        if control.is_active { "[x]" } else { "[ ]" },
                        control.control_id,
                        truncate_display(&control.control_title, 48)
                    );
                }
            }
        }
    }

    let _ = writeln!(out);
    match &view.metrics {
        Some(metrics) => {
            let _ = writeln!(out, "Metrics");
            for metric in MetricName::ALL {
                let change = view.changes.iter().find(|d| d.metric == metric);
                let _ = writeln!(
                    out,
                    "  {:<26} {:>6} {}",
                    metric.as_str(),
                    metrics.value(metric),
                    change.map(delta_note).unwrap_or_default()
                );
            }
        }
        None => {
            let _ = writeln!(out, "Metrics unavailable");
        }
    }
    if let Some(error) = &view.metrics_error {
        let _ = writeln!(out, "  (last update failed: {})", error);
    }
    out
}

pub(crate) fn scenario_table(scenarios: &[ScenarioSummary], bound: Option<i64>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "  {:>6} {} {:<8} {}",
        "ID",
        pad_right("NAME", NAME_WIDTH),
        "DEFAULT",
        "UPDATED"
    );
    let _ = writeln!(out, "{}", "-".repeat(72));
    for s in scenarios {
        let _ = writeln!(
            out,
            "{} {:>6} {} {:<8} {}",
            if Some(s.scenario_id) == bound { "*" } else { " " },
            s.scenario_id,
            pad_right(&s.scenario_name, NAME_WIDTH),
            if s.is_default { "yes" } else { "" },
            s.updated_at.as_deref().or(s.created_at.as_deref()).unwrap_or("")
        );
    }
    out
}

pub(crate) fn draft(draft: &Draft) -> String {
    let mut out = String::new();
    let updated = draft
        .updated_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let _ = writeln!(out, "Draft saved {}", updated);
    let _ = writeln!(out, "  capabilities: {}", draft.active_capability_ids.join(", "));
    let _ = writeln!(out, "  controls:     {}", draft.active_control_ids.join(", "));
    out
}
