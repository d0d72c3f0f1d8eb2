//! Hover documentation for the key under the cursor

use crate::completion::render_scalar;
use crate::position::{key_at_line, path_through_line, possible_paths, Position, TextRange};
use crate::schema::{IndexEntry, SchemaIndex};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Hover payload: markdown blocks and the range of the hovered key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hover {
    pub contents: Vec<String>,
    pub range: TextRange,
}

impl Hover {
    /// All blocks joined into one markdown document
    pub fn markdown(&self) -> String {
        self.contents.join("\n\n")
    }
}

/// Documentation for the key on the cursor line
///
/// Returns `None` when the line holds no key or no index entry matches.
pub fn hover(text: &str, position: Position, index: &SchemaIndex) -> Option<Hover> {
    let key = key_at_line(text, position.line)?;
    let path = path_through_line(text, position.line);
    let candidates = possible_paths(&path);

    let Some((matched, entry)) = index.first_match(&candidates) else {
        debug!(path = %path.join("/"), "No schema entry for hover");
        return None;
    };
    debug!(path = %path.join("/"), matched, "Hover entry found");

    Some(Hover {
        contents: render(key.key, entry),
        range: TextRange {
            start_line: position.line,
            start_col: key.column(),
            end_line: position.line,
            end_col: key.column() + key.key_len(),
        },
    })
}

fn render(key: &str, entry: &IndexEntry) -> Vec<String> {
    let mut blocks = Vec::new();

    if let Some(description) = &entry.description {
        blocks.push(description.clone());
    }

    blocks.push(format!(
        "Type: {}",
        entry.type_name.as_deref().unwrap_or("any")
    ));

    if let Some(pattern) = &entry.pattern {
        blocks.push(format!("Pattern: `{pattern}`"));
    }

    if !entry.enum_values.is_empty() {
        let values: Vec<String> = entry.enum_values.iter().map(render_scalar).collect();
        blocks.push(format!("Allowed values: {}", values.join(", ")));
    }

    if let Some(default) = &entry.default {
        blocks.push(format!("Default:\n{}", yaml_fragment(key, default)));
    }

    if !entry.examples.is_empty() {
        let fragments: Vec<String> = entry
            .examples
            .iter()
            .map(|example| yaml_fragment(key, example))
            .collect();
        blocks.push(format!("Examples:\n{}", fragments.join("\n")));
    }

    let formats: Vec<String> = entry
        .one_of
        .iter()
        .enumerate()
        .filter_map(|(i, alternative)| {
            let description = alternative.get("description")?.as_str()?;
            Some(format!("{}. {}", i + 1, description))
        })
        .collect();
    if !formats.is_empty() {
        blocks.push(format!("Possible Formats:\n{}", formats.join("\n")));
    }

    blocks
}

/// Fenced `key: value` YAML snippet
fn yaml_fragment(key: &str, value: &Value) -> String {
    let mut map = Map::new();
    map.insert(key.to_string(), value.clone());
    let body = match serde_yaml::to_string(&Value::Object(map)) {
        Ok(yaml) => yaml.trim_end().to_string(),
        Err(err) => {
            debug!(error = %err, "Falling back to JSON for hover fragment");
            format!("{key}: {value}")
        }
    };
    format!("```yaml\n{body}\n```")
}
