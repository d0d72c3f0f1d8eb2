//! Schema-driven completion
//!
//! The cursor's structural path selects a schema node; suggestions come from
//! that node's default, enum values, examples, properties and pattern
//! property examples, plus the same from each `oneOf` alternative.

use crate::position::{leading_whitespace, path_at_position, Position};
use crate::schema::{is_object_schema, resolve_ref, schema_at_path};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Sort buckets, lower sorts first
pub const BUCKET_DEFAULT: u8 = 0;
pub const BUCKET_ENUM: u8 = 1;
pub const BUCKET_EXAMPLE: u8 = 2;
pub const BUCKET_PROPERTY: u8 = 3;
pub const BUCKET_PATTERN_EXAMPLE: u8 = 4;

/// What a suggestion inserts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionKind {
    Property,
    Value,
    EnumMember,
}

/// A completion suggestion; `insert_text` uses snippet syntax
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub label: String,
    pub kind: SuggestionKind,
    pub documentation: Option<String>,
    pub insert_text: String,
    pub sort_bucket: u8,
}

/// Completion suggestions at a cursor position
pub fn complete(text: &str, position: Position, schema: &Value) -> Vec<Suggestion> {
    let line = text
        .lines()
        .nth(position.line.saturating_sub(1))
        .unwrap_or("");
    let indent = leading_whitespace(line);

    if indent == 0 {
        return root_suggestions(schema);
    }

    let path = path_at_position(text, position);

    let Some(node) = schema_at_path(schema, &path) else {
        debug!(path = %path.join("/"), "No schema node for completion");
        return Vec::new();
    };

    let mut suggestions = Vec::new();
    collect(schema, &node, &mut suggestions);

    if let Some(Value::Array(alternatives)) = node.get("oneOf") {
        for alternative in alternatives {
            match resolve_ref(schema, alternative) {
                Ok(alternative) => collect(schema, &alternative, &mut suggestions),
                Err(err) => debug!(error = %err, "Skipping oneOf alternative"),
            }
        }
    }

    finish(suggestions)
}

/// One property suggestion per root key, sorted by key
fn root_suggestions(schema: &Value) -> Vec<Suggestion> {
    let root = match resolve_ref(schema, schema) {
        Ok(root) => root,
        Err(err) => {
            debug!(error = %err, "Cannot resolve schema root");
            return Vec::new();
        }
    };
    let Some(properties) = root.get("properties").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut entries: Vec<(&String, &Value)> = properties.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
        .into_iter()
        .map(|(key, sub)| property_suggestion(schema, key, sub, BUCKET_PROPERTY))
        .collect()
}

fn collect(root: &Value, node: &Value, out: &mut Vec<Suggestion>) {
    let documentation = node
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(default) = node.get("default") {
        out.push(value_suggestion(
            default,
            SuggestionKind::Value,
            Some("Default value".to_string()),
            BUCKET_DEFAULT,
        ));
    }

    for value in node.get("enum").and_then(Value::as_array).into_iter().flatten() {
        out.push(value_suggestion(
            value,
            SuggestionKind::EnumMember,
            documentation.clone(),
            BUCKET_ENUM,
        ));
    }

    for value in node.get("examples").and_then(Value::as_array).into_iter().flatten() {
        out.push(value_suggestion(
            value,
            SuggestionKind::Value,
            documentation.clone(),
            BUCKET_EXAMPLE,
        ));
    }

    if let Some(properties) = node.get("properties").and_then(Value::as_object) {
        for (key, sub) in properties {
            out.push(property_suggestion(root, key, sub, BUCKET_PROPERTY));
        }
    }

    if let Some(patterns) = node.get("patternProperties").and_then(Value::as_object) {
        for (pattern, sub) in patterns {
            pattern_suggestions(root, pattern, sub, out);
        }
    }
}

/// Sample key names for a pattern property
///
/// String examples matching the pattern are key names; object examples
/// contribute their matching keys.
fn pattern_suggestions(root: &Value, pattern: &str, sub: &Value, out: &mut Vec<Suggestion>) {
    let Ok(regex) = Regex::new(pattern) else {
        debug!(pattern, "Ignoring invalid pattern property");
        return;
    };
    let resolved = resolved_owned(root, sub);

    let mut names: Vec<&str> = Vec::new();
    for example in resolved.get("examples").and_then(Value::as_array).into_iter().flatten() {
        match example {
            Value::String(name) => names.push(name),
            Value::Object(map) => names.extend(map.keys().map(String::as_str)),
            _ => {}
        }
    }

    for name in names.into_iter().filter(|name| regex.is_match(name)) {
        let mut suggestion = property_suggestion(root, name, &resolved, BUCKET_PATTERN_EXAMPLE);
        if suggestion.documentation.is_none() {
            suggestion.documentation = Some(format!("Any key matching `{pattern}`"));
        }
        out.push(suggestion);
    }
}

fn property_suggestion(root: &Value, key: &str, sub: &Value, bucket: u8) -> Suggestion {
    let resolved = resolved_owned(root, sub);
    Suggestion {
        label: key.to_string(),
        kind: SuggestionKind::Property,
        documentation: resolved
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        insert_text: property_insert_text(key, &resolved),
        sort_bucket: bucket,
    }
}

fn resolved_owned(root: &Value, node: &Value) -> Value {
    match resolve_ref(root, node) {
        Ok(resolved) => resolved.into_owned(),
        Err(err) => {
            debug!(error = %err, "Using unresolved schema node");
            node.clone()
        }
    }
}

fn value_suggestion(
    value: &Value,
    kind: SuggestionKind,
    documentation: Option<String>,
    bucket: u8,
) -> Suggestion {
    let label = render_scalar(value);
    Suggestion {
        insert_text: escape_snippet(&label),
        label,
        kind,
        documentation,
        sort_bucket: bucket,
    }
}

/// Insert text for `key`: object keys open an indented block, others get a
/// pre-filled value placeholder
pub fn property_insert_text(key: &str, node: &Value) -> String {
    if is_object_schema(node) {
        return format!("{key}:\n  $1");
    }

    let placeholder = first_item(node, "examples")
        .or_else(|| first_item(node, "enum"))
        .or_else(|| node.get("default"));

    match placeholder {
        Some(value) => format!("{key}: ${{1:{}}}\n", escape_snippet(&render_scalar(value))),
        None => format!("{key}: $1\n"),
    }
}

fn first_item<'n>(node: &'n Value, field: &str) -> Option<&'n Value> {
    node.get(field).and_then(Value::as_array).and_then(|items| items.first())
}

/// Strings as-is, everything else as JSON
pub(crate) fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_snippet(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '$' | '}') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Drop repeated `(label, kind)` pairs, then order by bucket
fn finish(suggestions: Vec<Suggestion>) -> Vec<Suggestion> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Suggestion> = suggestions
        .into_iter()
        .filter(|s| seen.insert((s.label.clone(), s.kind)))
        .collect();
    unique.sort_by_key(|s| s.sort_bucket);
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn labels(suggestions: &[Suggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.label.as_str()).collect()
    }

    fn app_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "server": {
                    "type": "object",
                    "description": "HTTP server",
                    "properties": {
                        "port": {"type": "integer", "default": 8080, "description": "Listen port"},
                        "mode": {"type": "string", "enum": ["dev", "prod"]},
                        "tls": {"type": "object"}
                    }
                },
                "name": {"type": "string", "examples": ["myapp"]},
                "level": {"$ref": "#/$defs/level"},
                "jobs": {
                    "type": "object",
                    "patternProperties": {
                        "^[a-z]+$": {"type": "object", "examples": ["build", "Deploy", "test"]}
                    }
                }
            },
            "$defs": {
                "level": {"type": "string", "enum": ["debug", "info"], "default": "info"}
            }
        })
    }

    #[test]
    fn test_root_completion_on_empty_document() {
        let schema = json!({"properties": {"name": {"type": "string", "examples": ["myapp"]}}});
        let suggestions = complete("", Position::new(1, 1), &schema);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].label, "name");
        assert_eq!(suggestions[0].insert_text, "name: ${1:myapp}\n");
        assert_eq!(suggestions[0].kind, SuggestionKind::Property);
    }

    #[test]
    fn test_root_completion_sorted_with_ref_placeholders() {
        let suggestions = complete("na", Position::new(1, 3), &app_schema());
        assert_eq!(labels(&suggestions), vec!["jobs", "level", "name", "server"]);
        assert_eq!(suggestions[0].insert_text, "jobs:\n  $1");
        assert_eq!(suggestions[1].insert_text, "level: ${1:debug}\n");
    }

    #[test]
    fn test_nested_property_completion() {
        let text = "server:\n  ";
        let suggestions = complete(text, Position::new(2, 3), &app_schema());
        assert_eq!(labels(&suggestions), vec!["port", "mode", "tls"]);
        assert_eq!(suggestions[0].insert_text, "port: ${1:8080}\n");
        assert_eq!(suggestions[0].documentation.as_deref(), Some("Listen port"));
        assert_eq!(suggestions[1].insert_text, "mode: ${1:dev}\n");
        assert_eq!(suggestions[2].insert_text, "tls:\n  $1");
    }

    #[test]
    fn test_value_completion_buckets() {
        let text = "level:\n  ";
        let suggestions = complete(text, Position::new(2, 3), &app_schema());
        assert_eq!(labels(&suggestions), vec!["info", "debug", "info"]);
        assert_eq!(suggestions[0].kind, SuggestionKind::Value);
        assert_eq!(suggestions[0].sort_bucket, BUCKET_DEFAULT);
        assert_eq!(suggestions[1].kind, SuggestionKind::EnumMember);
        assert_eq!(suggestions[2].kind, SuggestionKind::EnumMember);
    }

    #[test]
    fn test_pattern_examples_as_keys() {
        let text = "jobs:\n  ";
        let suggestions = complete(text, Position::new(2, 3), &app_schema());
        assert_eq!(labels(&suggestions), vec!["build", "test"]);
        assert!(suggestions.iter().all(|s| s.sort_bucket == BUCKET_PATTERN_EXAMPLE));
        assert_eq!(suggestions[0].insert_text, "build:\n  $1");
    }

    #[test]
    fn test_pattern_object_example_keys() {
        let schema = json!({
            "properties": {
                "env": {
                    "patternProperties": {
                        "^[A-Z_]+$": {"type": "string", "examples": [{"HOME": "/root", "path": "x"}]}
                    }
                }
            }
        });
        let suggestions = complete("env:\n  ", Position::new(2, 3), &schema);
        assert_eq!(labels(&suggestions), vec!["HOME"]);
        assert_eq!(suggestions[0].documentation.as_deref(), Some("Any key matching `^[A-Z_]+$`"));
    }

    #[test]
    fn test_one_of_alternatives_concatenate_and_dedupe() {
        let schema = json!({
            "properties": {
                "build": {
                    "oneOf": [
                        {
                            "type": "object",
                            "properties": {"context": {"type": "string"}, "target": {"type": "string"}}
                        },
                        {
                            "type": "object",
                            "properties": {"context": {"type": "string"}, "args": {"type": "object"}}
                        }
                    ]
                }
            }
        });
        let suggestions = complete("build:\n  ", Position::new(2, 3), &schema);
        assert_eq!(labels(&suggestions), vec!["context", "target", "args"]);
    }

    #[test]
    fn test_unknown_path_yields_nothing() {
        let suggestions = complete("nope:\n  ", Position::new(2, 3), &app_schema());
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_path_includes_last_key_above_cursor() {
        let text = "server:\n  port: 80\n  ";
        let suggestions = complete(text, Position::new(3, 3), &app_schema());
        assert_eq!(labels(&suggestions), vec!["8080"]);
        assert_eq!(suggestions[0].kind, SuggestionKind::Value);
        assert_eq!(suggestions[0].sort_bucket, BUCKET_DEFAULT);
        assert_eq!(suggestions[0].documentation.as_deref(), Some("Default value"));
    }

    #[test]
    fn test_escape_snippet() {
        assert_eq!(escape_snippet("${HOME}"), "\\${HOME\\}");
        assert_eq!(
            property_insert_text("path", &json!({"examples": ["$dir"]})),
            "path: ${1:\\$dir}\n"
        );
        assert_eq!(property_insert_text("x", &json!({"type": "string"})), "x: $1\n");
    }
}
