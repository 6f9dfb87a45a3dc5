//! Human-readable rendering of resolution, import, validation and health output.

use crate::entity::EntityRecord;
use crate::importer::{ImportRunOutcome, ItemStatus};
use crate::registry::HealthReport;
use crate::resolver::{AttemptOutcome, ResolutionResult, ResolutionSource};
use crate::validation::{Decision, EnforcementMode, ValidationStatus, Violation};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(header);
    table
}

fn colored_mode(mode: EnforcementMode) -> String {
    match mode {
        EnforcementMode::Enforce => mode.green().to_string(),
        EnforcementMode::Warn => mode.yellow().to_string(),
        EnforcementMode::Bypass => mode.red().to_string(),
    }
}

fn violations_table(violations: &[Violation]) -> String {
    let mut table = table(vec!["Field", "Kind", "Message"]);
    for v in violations {
        table.add_row(vec![
            v.field.clone(),
            format!("{:?}", v.kind),
            v.message.clone(),
        ]);
    }
    table.to_string()
}

/// Record header plus attribute table.
pub fn format_record_text(record: &EntityRecord) -> String {
    let mut out = String::new();
    out.push_str(&format!("  Id: {}\n", record.id));
    out.push_str(&format!("  Type: {}\n", record.entity_type));
    out.push_str(&format!("  Handle: {}\n", record.handle));
    out.push_str(&format!("  Status: {}\n", record.status.as_str()));
    if !record.attributes.is_empty() {
        let mut attributes = table(vec!["Attribute", "Value"]);
        for (key, value) in &record.attributes {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            attributes.add_row(vec![key.clone(), value]);
        }
        out.push_str(&format!("\n{}\n", attributes));
    }
    if !record.violations.is_empty() {
        out.push_str(&format!(
            "\n  {} recorded validation warnings\n{}\n",
            record.violations.len().yellow(),
            violations_table(&record.violations)
        ));
    }
    out
}

pub fn format_resolution_text(identifier: &str, result: &ResolutionResult) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}\n\n",
        format_section_heading(&format!("Resolution: {}", identifier))
    ));
    let source = match result.source {
        ResolutionSource::None => result.source.red().to_string(),
        ResolutionSource::Primary => result.source.green().to_string(),
        _ => result.source.yellow().to_string(),
    };
    out.push_str(&format!("  Source: {}\n", source));

    let mut attempts = table(vec!["Source", "Outcome", "Elapsed (ms)"]);
    for attempt in &result.attempts {
        let outcome = match &attempt.outcome {
            AttemptOutcome::Unavailable { reason } => format!("unavailable: {}", reason),
            other => other.label().to_string(),
        };
        attempts.add_row(vec![
            attempt.source.to_string(),
            outcome,
            attempt.elapsed_ms.to_string(),
        ]);
    }
    out.push_str(&format!("\n{}\n\n", attempts));

    match (&result.data, &result.error) {
        (Some(record), _) => out.push_str(&format_record_text(record)),
        (None, Some(error)) => out.push_str(&format!("  {} {}\n", "Error:".red(), error.message)),
        (None, None) => out.push_str("  Not found in any source.\n"),
    }
    out
}

pub fn format_import_text(outcome: &ImportRunOutcome) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Import")));
    out.push_str(&format!(
        "  Total: {}  Created: {}  Skipped: {}  Rejected: {}  Failed: {}\n\n",
        outcome.total,
        outcome.created.green(),
        outcome.skipped,
        outcome.rejected.yellow(),
        outcome.failed.red()
    ));
    if outcome.items.is_empty() {
        out.push_str("No items submitted.\n");
        return out;
    }

    let mut items = table(vec!["#", "Origin", "Status", "Class", "Detail"]);
    for item in &outcome.items {
        let detail = match &item.status {
            ItemStatus::Created { id } => id.to_string(),
            ItemStatus::Duplicate { existing_id } => existing_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string()),
            ItemStatus::Rejected { violations } => violations
                .iter()
                .map(|v| v.field.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            ItemStatus::Failed { reason } => reason.clone(),
        };
        let class = item
            .classification
            .map(|c| format!("{}/{}", c.work_type.as_str(), c.medium.as_str()))
            .unwrap_or_else(|| "-".to_string());
        items.add_row(vec![
            item.index.to_string(),
            format!("{}:{}", item.origin_system, item.origin_id),
            item.status.label().to_string(),
            class,
            detail,
        ]);
    }
    out.push_str(&format!("{}\n", items));
    out
}

pub fn format_validation_status_text(status: &ValidationStatus) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Validation")));
    out.push_str(&format!("  Default mode: {}\n", colored_mode(status.default_mode)));
    for (name, state) in [
        ("Emergency bypass", &status.emergency_bypass),
        ("Global disable", &status.global_disable),
    ] {
        let flag = if state.active {
            "ACTIVE".red().bold().to_string()
        } else {
            "off".to_string()
        };
        out.push_str(&format!("  {}: {}", name, flag));
        if let (Some(by), Some(at)) = (&state.changed_by, &state.changed_at) {
            out.push_str(&format!(" (by {} at {})", by, at.to_rfc3339()));
        }
        out.push('\n');
    }

    let mut collections = table(vec!["Collection", "Configured", "Effective"]);
    for (collection, effective) in &status.effective {
        let configured = status
            .collections
            .get(collection)
            .map(|m| m.to_string())
            .unwrap_or_else(|| "-".to_string());
        collections.add_row(vec![collection.clone(), configured, colored_mode(*effective)]);
    }
    out.push_str(&format!("\n{}\n", collections));

    if !status.history.is_empty() {
        out.push_str(&format!("\n{}\n\n", format_section_heading("Override history")));
        let mut history = table(vec!["When", "Change", "From", "To", "By", "Reason"]);
        for change in &status.history {
            let what = match &change.collection {
                Some(collection) => format!("{:?} {}", change.kind, collection),
                None => format!("{:?}", change.kind),
            };
            history.add_row(vec![
                change.changed_at.to_rfc3339(),
                what,
                change.previous.clone(),
                change.new.clone(),
                change.changed_by.clone(),
                change.reason.clone().unwrap_or_default(),
            ]);
        }
        out.push_str(&format!("{}\n", history));
    }
    out
}

pub fn format_decision_text(collection: &str, decision: &Decision) -> String {
    let mut out = String::new();
    let verdict = if decision.allow {
        "allowed".green().to_string()
    } else {
        "rejected".red().to_string()
    };
    out.push_str(&format!(
        "  {}: {} under {}",
        collection,
        verdict,
        colored_mode(decision.mode)
    ));
    if let Some(reason) = decision.bypass {
        out.push_str(&format!(" (bypass: {})", reason));
    }
    out.push('\n');
    if !decision.violations.is_empty() {
        out.push_str(&format!("\n{}\n", violations_table(&decision.violations)));
    }
    out
}

pub fn format_health_text(report: &HealthReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Sources")));
    let mut sources = table(vec!["Source", "Healthy", "Elapsed (ms)", "Error"]);
    for source in &report.sources {
        let healthy = if source.healthy {
            "yes".green().to_string()
        } else {
            "no".red().to_string()
        };
        sources.add_row(vec![
            source.source.to_string(),
            healthy,
            source.elapsed_ms.to_string(),
            source.error.clone().unwrap_or_default(),
        ]);
    }
    out.push_str(&format!("{}\n\n", sources));
    out.push_str(&format_validation_status_text(&report.validation));
    out
}
