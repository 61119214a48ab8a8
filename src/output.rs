//! Rendering of reports as colored text, JSON or YAML.

use colored::Colorize;
use serde::Serialize;

use crate::{
    guard::{GuardDecision, Verdict},
    introspect::Introspection,
    prompt::DEFAULT_DIALECT,
    schema::{SchemaDiff, SnapshotMeta},
    snapshots::{SnapshotListItem, UpdateOutcome},
    sql::{DangerReport, Extraction},
    validate::ValidationReport
};

/// Output format for results
#[derive(Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml
}

/// Output options
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format:  OutputFormat,
    pub colored: bool
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format:  OutputFormat::Text,
            colored: true
        }
    }
}

/// Generated statement together with its guard decision
#[derive(Debug, Serialize)]
pub struct GenerationResult {
    pub request:  String,
    pub dialect:  String,
    pub decision: GuardDecision
}

/// Fingerprint of a schema file
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintResult {
    pub name:     String,
    pub checksum: String,
    pub tables:   usize
}

/// Prompts that would be sent to the language model
#[derive(Debug, Serialize)]
pub struct PromptPreview {
    pub system: String,
    pub user:   String
}

/// Serialize structured formats, or fall back to `text` for plain output
fn render<T: Serialize + ?Sized>(
    value: &T,
    opts: &OutputOptions,
    text: impl FnOnce() -> String
) -> String {
    match opts.format {
        OutputFormat::Json => serde_json::to_string_pretty(value).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(value).unwrap_or_default(),
        OutputFormat::Text => text()
    }
}

fn heading(title: &str, opts: &OutputOptions) -> String {
    if opts.colored {
        format!("{}\n", title.bold())
    } else {
        format!("{}\n", title)
    }
}

fn verdict_label(verdict: Verdict, opts: &OutputOptions) -> String {
    let label = match verdict {
        Verdict::Allowed => "ALLOWED",
        Verdict::Warn => "WARN",
        Verdict::Blocked => "BLOCKED"
    };
    if !opts.colored {
        return label.to_string();
    }
    match verdict {
        Verdict::Allowed => label.green().bold().to_string(),
        Verdict::Warn => label.yellow().bold().to_string(),
        Verdict::Blocked => label.red().bold().to_string()
    }
}

pub fn format_danger(report: &DangerReport, opts: &OutputOptions) -> String {
    render(report, opts, || {
        let mut out = heading("=== Danger Classification ===", opts);
        if report.blocked {
            let label = if opts.colored {
                "DANGEROUS".red().bold().to_string()
            } else {
                "DANGEROUS".to_string()
            };
            out.push_str(&format!(
                "{}: {}\n",
                label,
                report.matched_keywords.join(", ")
            ));
            if let Some(reason) = &report.reason {
                out.push_str(&format!("  {}\n", reason));
            }
        } else {
            out.push_str("No destructive keywords found\n");
        }
        out
    })
}

pub fn format_extraction(extraction: &Extraction, opts: &OutputOptions) -> String {
    render(extraction, opts, || {
        let mut out = heading("=== Aliases ===", opts);
        if extraction.alias_map.is_empty() {
            out.push_str("  (none)\n");
        }
        for (alias, table) in &extraction.alias_map {
            out.push_str(&format!("  {} -> {}\n", alias, table));
        }
        out.push('\n');
        out.push_str(&heading("=== References ===", opts));
        if extraction.references.is_empty() {
            out.push_str("  (none)\n");
        }
        for reference in &extraction.references {
            out.push_str(&format!(
                "  {}.{}\n",
                reference.table_or_alias, reference.column
            ));
        }
        out
    })
}

pub fn format_validation(report: &ValidationReport, opts: &OutputOptions) -> String {
    render(report, opts, || {
        let mut out = heading("=== Schema Validation ===", opts);
        if report.ok {
            out.push_str("All references resolve\n");
        } else {
            out.push_str(&format!("{} unknown reference(s):\n", report.unknown.len()));
            for entry in &report.unknown {
                let entry = if opts.colored {
                    entry.yellow().to_string()
                } else {
                    entry.clone()
                };
                out.push_str(&format!("  - {}\n", entry));
            }
        }
        out
    })
}

pub fn format_decisions(decisions: &[GuardDecision], opts: &OutputOptions) -> String {
    render(decisions, opts, || {
        let mut out = heading("=== SQL Check ===", opts);
        for (i, decision) in decisions.iter().enumerate() {
            out.push('\n');
            out.push_str(&format_decision_text(i + 1, decision, opts));
        }
        out
    })
}

fn format_decision_text(index: usize, decision: &GuardDecision, opts: &OutputOptions) -> String {
    let mut out = format!(
        "[{}] Statement #{}\n",
        verdict_label(decision.verdict, opts),
        index
    );
    for line in decision.sql.lines() {
        out.push_str(&format!("  {}\n", line));
    }
    for warning in &decision.warnings {
        out.push_str(&format!("  ! {}\n", warning));
    }
    if decision.verdict == Verdict::Blocked
        && let Some(reason) = &decision.danger.reason
        && decision.warnings.is_empty()
    {
        out.push_str(&format!("  ! {}\n", reason));
    }
    out
}

pub fn format_generation(result: &GenerationResult, opts: &OutputOptions) -> String {
    render(result, opts, || {
        let mut out = heading("=== Generated SQL ===", opts);
        out.push_str(&format!("Request: {}\n", result.request));
        if result.dialect != DEFAULT_DIALECT {
            out.push_str(&format!("Dialect: {}\n", result.dialect));
        }
        out.push('\n');
        out.push_str(&format_decision_text(1, &result.decision, opts));
        out
    })
}

pub fn format_prompt_preview(preview: &PromptPreview, opts: &OutputOptions) -> String {
    render(preview, opts, || {
        let mut out = heading("=== DRY RUN - Would send to LLM ===", opts);
        out.push_str(&format!("\nSystem:\n{}\n\nUser:\n{}\n", preview.system, preview.user));
        out
    })
}

pub fn format_diff(diff: &SchemaDiff, opts: &OutputOptions) -> String {
    render(diff, opts, || {
        let mut out = heading("=== Schema Diff ===", opts);
        if diff.is_empty() {
            out.push_str("No changes\n");
            return out;
        }
        for table in &diff.added {
            let line = format!("+ {}", table);
            out.push_str(&colorize_line(line, true, opts));
        }
        for table in &diff.removed {
            let line = format!("- {}", table);
            out.push_str(&colorize_line(line, false, opts));
        }
        for change in &diff.changed {
            out.push_str(&format!("~ {}\n", change.table));
            for column in &change.added_columns {
                out.push_str(&colorize_line(format!("    + {}", column), true, opts));
            }
            for column in &change.removed_columns {
                out.push_str(&colorize_line(format!("    - {}", column), false, opts));
            }
        }
        out
    })
}

fn colorize_line(line: String, added: bool, opts: &OutputOptions) -> String {
    match (opts.colored, added) {
        (true, true) => format!("{}\n", line.green()),
        (true, false) => format!("{}\n", line.red()),
        (false, _) => format!("{}\n", line)
    }
}

pub fn format_fingerprint(result: &FingerprintResult, opts: &OutputOptions) -> String {
    render(result, opts, || {
        format!(
            "{}  {} ({} tables)\n",
            result.checksum, result.name, result.tables
        )
    })
}

pub fn format_snapshot_list(items: &[SnapshotListItem], opts: &OutputOptions) -> String {
    render(items, opts, || {
        let mut out = heading("=== Snapshots ===", opts);
        if items.is_empty() {
            out.push_str("  (none)\n");
        }
        for item in items {
            let size = item
                .size
                .map(|s| format!("{} bytes", s))
                .unwrap_or_else(|| String::from("-"));
            out.push_str(&format!(
                "  {:<24} {}  {}\n",
                item.name,
                item.updated_at.format("%Y-%m-%d %H:%M:%S"),
                size
            ));
        }
        out
    })
}

pub fn format_meta(meta: &SnapshotMeta, opts: &OutputOptions) -> String {
    render(meta, opts, || {
        format!(
            "Saved '{}' ({}) checksum {} at {}\n",
            meta.name,
            meta.dialect.as_deref().unwrap_or("-"),
            meta.checksum,
            meta.updated_at.to_rfc3339()
        )
    })
}

pub fn format_update(outcome: &UpdateOutcome, opts: &OutputOptions) -> String {
    render(outcome, opts, || {
        format!(
            "{} checksum {}\n",
            outcome.reason, outcome.meta.checksum
        )
    })
}

pub fn format_introspection(result: &Introspection, opts: &OutputOptions) -> String {
    render(result, opts, || {
        let mut out = heading(
            &format!("=== Schema '{}' ({} tables) ===", result.schema, result.count_tables),
            opts
        );
        if let Some(warning) = &result.warning {
            let line = format!("{}: {}", warning.code, warning.reason);
            let line = if opts.colored {
                line.yellow().to_string()
            } else {
                line
            };
            out.push_str(&format!("{}\n", line));
        }
        for (name, table) in &result.tables {
            let columns: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
            out.push_str(&format!("  {}({})\n", name, columns.join(", ")));
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::classify;

    fn plain() -> OutputOptions {
        OutputOptions {
            format:  OutputFormat::Text,
            colored: false
        }
    }

    #[test]
    fn danger_text_lists_keywords() {
        let text = format_danger(&classify("DROP TABLE t"), &plain());
        assert!(text.contains("DANGEROUS: DROP"));
    }

    #[test]
    fn danger_json_uses_camel_case() {
        let opts = OutputOptions {
            format:  OutputFormat::Json,
            colored: false
        };
        let json = format_danger(&classify("SELECT 1"), &opts);
        assert!(json.contains("\"matchedKeywords\""));
        assert!(!json.contains("reason"));
    }

    #[test]
    fn empty_diff_text() {
        assert!(format_diff(&SchemaDiff::default(), &plain()).contains("No changes"));
    }
}
