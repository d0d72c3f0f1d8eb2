//! Schema diagnostics for YAML documents
//!
//! The document is parsed into a JSON value, validated with a compiled JSON
//! Schema validator, and every validator error is mapped back from its
//! instance path to a text range with [`location_of_path`].

use crate::cache::ValidatorCache;
use crate::error::ServiceError;
use crate::position::{location_of_path, PathScanner, TextLocation};
use jsonschema::error::ValidationErrorKind;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Severity level for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// A diagnostic with a 1-based range; `end_col` is exclusive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
    pub message: String,
    pub severity: Severity,
    pub source: String,
}

impl Diagnostic {
    fn at(location: TextLocation, message: String, severity: Severity, source: &str) -> Self {
        Diagnostic {
            start_line: location.line,
            start_col: location.column,
            end_line: location.line,
            end_col: location.column + location.length,
            message,
            severity,
            source: source.to_string(),
        }
    }

    /// Diagnostic covering the whole document
    fn whole_document(text: &str, message: String, source: &str) -> Self {
        let last = text.lines().last().unwrap_or("");
        Diagnostic {
            start_line: 1,
            start_col: 1,
            end_line: text.lines().count().max(1),
            end_col: last.chars().count() + 1,
            message,
            severity: Severity::Error,
            source: source.to_string(),
        }
    }

    /// Key for location-based deduplication
    fn location_key(&self) -> (usize, usize) {
        (self.start_line, self.start_col)
    }
}

/// The single warning shown while no schema is available
///
/// Editors stay usable without a schema; this marker explains why no
/// validation happens.
pub fn schema_unavailable(reason: &str, source: &str) -> Diagnostic {
    Diagnostic::at(
        TextLocation::FALLBACK,
        format!("Schema unavailable, validation disabled: {reason}"),
        Severity::Warning,
        source,
    )
}

/// Validate a document against a schema
///
/// Never fails: parse errors become one diagnostic at the parser's position,
/// and any other failure becomes one diagnostic spanning the document.
pub fn validate(
    text: &str,
    schema: &Value,
    validators: &ValidatorCache,
    source: &str,
) -> Vec<Diagnostic> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    match run_validation(text, schema, validators, source) {
        Ok(diagnostics) => diagnostics,
        Err(ServiceError::TextParse {
            message,
            line,
            column,
        }) => vec![parse_diagnostic(text, message, line, column, source)],
        Err(err) => {
            warn!(error = %err, "Validation aborted");
            vec![Diagnostic::whole_document(text, err.to_string(), source)]
        }
    }
}

fn run_validation(
    text: &str,
    schema: &Value,
    validators: &ValidatorCache,
    source: &str,
) -> Result<Vec<Diagnostic>, ServiceError> {
    let mut instance = parse_document(text)?;
    normalize_stub_keys(text, &mut instance);

    let validator = validators.get_or_compile(schema)?;
    let mut diagnostics = Vec::new();

    for error in validator.iter_errors(&instance) {
        let pointer = error.instance_path.to_string();
        let path = pointer_segments(&pointer);

        if let ValidationErrorKind::AdditionalProperties { unexpected } = &error.kind {
            for name in unexpected {
                let mut property_path = path.clone();
                property_path.push(name.clone());
                diagnostics.push(Diagnostic::at(
                    location_of_path(text, &property_path),
                    format!("Unexpected property \"{name}\""),
                    Severity::Error,
                    source,
                ));
            }
            continue;
        }

        let subject = path.last().map_or("root", String::as_str);
        let at = if pointer.is_empty() { "root" } else { pointer.as_str() };
        diagnostics.push(Diagnostic::at(
            location_of_path(text, &path),
            format!("{subject} {error} at {at}"),
            Severity::Error,
            source,
        ));
    }

    debug!(count = diagnostics.len(), "Schema validation finished");
    Ok(dedupe_by_location(diagnostics))
}

/// Parse YAML text into a JSON value
///
/// A document holding only comments parses as `null` and is treated as an
/// empty mapping.
pub fn parse_document(text: &str) -> Result<Value, ServiceError> {
    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Null) => Ok(Value::Object(Map::new())),
        Ok(value) => Ok(value),
        Err(err) => {
            let (line, column) = err
                .location()
                .map_or((1, 1), |loc| (loc.line().max(1), loc.column().max(1)));
            Err(ServiceError::TextParse {
                message: err.to_string(),
                line,
                column,
            })
        }
    }
}

fn parse_diagnostic(
    text: &str,
    message: String,
    line: usize,
    column: usize,
    source: &str,
) -> Diagnostic {
    // Extend to the end of the offending line, at least one character
    let line_len = text
        .lines()
        .nth(line - 1)
        .map_or(0, |l| l.chars().count());
    Diagnostic {
        start_line: line,
        start_col: column,
        end_line: line,
        end_col: (line_len + 1).max(column + 1),
        message,
        severity: Severity::Error,
        source: source.to_string(),
    }
}

/// Replace `null`/missing values under stub keys (`key:` with nothing after
/// the colon) with empty mappings
///
/// A key being typed should not report a type error on itself, while the
/// required children of that mapping still get reported.
pub fn normalize_stub_keys(text: &str, instance: &mut Value) {
    let mut scanner = PathScanner::default();
    for line in text.lines() {
        let Some(key) = scanner.feed(line) else {
            continue;
        };
        if key.is_stub() {
            ensure_empty_object(instance, &scanner.path());
        }
    }
}

fn ensure_empty_object(instance: &mut Value, path: &[String]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = instance;
    for segment in parents {
        match current.get_mut(segment.as_str()) {
            Some(next) => current = next,
            None => return,
        }
    }

    if let Value::Object(map) = current {
        let slot = map.entry(last.clone()).or_insert(Value::Null);
        if slot.is_null() {
            *slot = Value::Object(Map::new());
        }
    }
}

/// Split a JSON pointer into unescaped segments
pub fn pointer_segments(pointer: &str) -> Vec<String> {
    pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Keep the first diagnostic at each `line:column`
pub fn dedupe_by_location(diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut seen = HashSet::new();
    diagnostics
        .into_iter()
        .filter(|d| seen.insert(d.location_key()))
        .collect()
}
