//! Error handling and formatting for yaml-assist
//!
//! Provides the service error taxonomy and user-friendly terminal rendering
//! of diagnostics with source context.

use crate::diagnostics::{Diagnostic, Severity};
use colored::Colorize;

/// Errors raised while loading schemas or producing results
///
/// None of these escape `validate`, `complete` or `hover`: each entry point
/// converts them into a diagnostic or an empty result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Schema text could not be read or parsed
    #[error("Failed to load schema: {0}")]
    SchemaLoad(String),

    /// Schema parsed but the validator rejected it
    #[error("Failed to compile schema: {0}")]
    SchemaCompile(String),

    /// The document is not well-formed YAML
    #[error("{message}")]
    TextParse {
        message: String,
        line: usize,
        column: usize,
    },

    /// A `$ref` pointing at nothing (or at itself)
    #[error("Unresolved schema reference: {0}")]
    UnresolvedRef(String),
}

/// Format a diagnostic with context and a caret under the offending range
pub fn format_diagnostic(diagnostic: &Diagnostic, input: &str, origin: &str) -> String {
    let mut output = String::new();
    let line = diagnostic.start_line;
    let col = diagnostic.start_col;

    // Header
    let label = match diagnostic.severity {
        Severity::Error => "error:".red().bold(),
        Severity::Warning => "warning:".yellow().bold(),
        Severity::Info => "info:".cyan().bold(),
    };
    output.push_str(&format!("{} {}\n", label, diagnostic.message));

    // Location information
    output.push_str(&format!(
        "  {} {}\n",
        "-->".blue().bold(),
        format!("{}:{}:{}", origin, line, col).cyan()
    ));

    let lines: Vec<&str> = input.lines().collect();
    if line > 0 && line <= lines.len() {
        let line_idx = line - 1;

        output.push_str(&format!("   {}\n", "|".blue()));

        if line_idx > 0 {
            output.push_str(&format!(
                " {} | {}\n",
                format!("{:3}", line - 1).blue().dimmed(),
                lines[line_idx - 1].dimmed()
            ));
        }

        output.push_str(&format!(
            " {} | {}\n",
            format!("{:3}", line).blue().bold(),
            lines[line_idx]
        ));

        // Multi-line ranges only underline the first character
        let width = if diagnostic.end_line == line {
            diagnostic.end_col.saturating_sub(col).max(1)
        } else {
            1
        };
        let indicator = format!("{}{}", " ".repeat(col.saturating_sub(1) + 7), "^".repeat(width));
        let indicator = match diagnostic.severity {
            Severity::Error => indicator.red().bold(),
            Severity::Warning => indicator.yellow().bold(),
            Severity::Info => indicator.cyan().bold(),
        };
        output.push_str(&format!("   {} {}\n", "|".blue(), indicator));

        if line_idx + 1 < lines.len() {
            output.push_str(&format!(
                " {} | {}\n",
                format!("{:3}", line + 1).blue().dimmed(),
                lines[line_idx + 1].dimmed()
            ));
        }

        output.push_str(&format!("   {}\n", "|".blue()));
    }

    if let Some(hint) = hint_for(diagnostic) {
        output.push_str(&format!("\n  {} {}\n", "Hint:".yellow().bold(), hint));
    }

    output
}

/// Get a helpful hint based on the diagnostic message
fn hint_for(diagnostic: &Diagnostic) -> Option<&'static str> {
    let message = diagnostic.message.as_str();
    if message.starts_with("Unexpected property") {
        Some("Check the spelling or remove the property; the schema does not allow it here")
    } else if message.contains("is a required property") {
        Some("Add the missing property as a child of the highlighted key")
    } else if message.contains("found character that cannot start any token")
        || message.contains("mapping values are not allowed")
    {
        Some("Indentation must use two spaces per level and no tabs")
    } else {
        None
    }
}
