//! JSON payloads shared by the bindings
//!
//! Every result crosses the binding boundary as a JSON string with
//! camelCase fields. Compiled on every target so the shapes are tested on
//! the host.

use crate::{LanguageService, Position};
use serde::Serialize;

pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Diagnostics as a JSON array
pub fn validate(service: &LanguageService, text: &str) -> String {
    to_json(&service.validate(text))
}

/// Completion suggestions as a JSON array (1-based line and column)
pub fn complete(service: &LanguageService, text: &str, line: usize, column: usize) -> String {
    to_json(&service.complete(text, Position::new(line, column)))
}

/// Hover payload as JSON, or `null`
pub fn hover(service: &LanguageService, text: &str, line: usize, column: usize) -> String {
    to_json(&service.hover(text, Position::new(line, column)))
}

/// Flattened schema index as a JSON object
pub fn index(service: &LanguageService) -> String {
    to_json(service.index())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ServiceConfig;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    const SCHEMA: &str = r#"{
        "type": "object",
        "properties": {"name": {"type": "string", "description": "Application name"}}
    }"#;

    fn service() -> LanguageService {
        LanguageService::from_json(SCHEMA, ServiceConfig::default()).unwrap()
    }

    fn parse(payload: &str) -> Value {
        serde_json::from_str(payload).unwrap()
    }

    #[test]
    fn test_validate_json() {
        let service = service();
        assert_eq!(validate(&service, "name: app\n"), "[]");

        let diagnostics = parse(&validate(&service, "name: 1\n"));
        let first = &diagnostics[0];
        assert_eq!(first["startLine"], 1);
        assert_eq!(first["startCol"], 1);
        assert_eq!(first["endCol"], 5);
        assert!(first.get("start_line").is_none());
    }

    #[test]
    fn test_complete_json() {
        let suggestions = parse(&complete(&service(), "", 1, 1));
        assert_eq!(suggestions[0]["label"], "name");
        assert!(suggestions[0]["insertText"].is_string());
        assert!(suggestions[0].get("insert_text").is_none());
    }

    #[test]
    fn test_hover_json() {
        let service = service();
        let payload = parse(&hover(&service, "name: app\n", 1, 1));
        assert_eq!(payload["contents"][0], "Application name");
        assert_eq!(hover(&service, "other: 1\n", 1, 1), "null");
    }

    #[test]
    fn test_index_json() {
        let index = parse(&index(&service()));
        assert_eq!(index["name"]["type"], "string");
    }
}
