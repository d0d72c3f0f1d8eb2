//! Schema loading, `$ref` resolution and the flattened schema index
//!
//! A JSON Schema is flattened once per load into a map from slash-joined
//! structural paths to the documentation metadata hover needs. `*` stands
//! for any key matched by a pattern property.
//!
//! `$ref` resolution never mutates the schema: [`resolve_ref`] returns a new
//! node with the referenced fields merged under the referencing node's own
//! fields, so flattening the same schema any number of times gives the same
//! index.

use crate::error::ServiceError;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, warn};

/// Definition containers flattened at the schema root
const DEFINITION_KEYS: [&str; 2] = ["$defs", "definitions"];

/// Schema source format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Json,
    Yaml,
}

impl SchemaFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|s| s.to_str()) {
            Some("json") => Some(SchemaFormat::Json),
            Some("yaml") | Some("yml") => Some(SchemaFormat::Yaml),
            _ => None,
        }
    }
}

/// Parse schema text into a JSON value
pub fn parse_schema(text: &str, format: SchemaFormat) -> Result<Value, ServiceError> {
    let parsed: Result<Value, String> = match format {
        SchemaFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        SchemaFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
    };
    let value = parsed.map_err(ServiceError::SchemaLoad)?;
    match value {
        Value::Object(_) | Value::Bool(_) => Ok(value),
        other => Err(ServiceError::SchemaLoad(format!(
            "expected a schema object, found {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Documentation metadata for one structural path
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// `oneOf` alternatives, `$ref`s already resolved
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Value>,
    /// Set only on entries created for a pattern property
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Value>,
}

impl IndexEntry {
    /// Entry for a property or leaf node
    fn full(root: &Value, node: &Value) -> Self {
        IndexEntry {
            description: description_of(node),
            type_name: type_name_of(node),
            enum_values: array_field(node, "enum"),
            examples: array_field(node, "examples"),
            default: node.get("default").cloned(),
            one_of: resolved_alternatives(root, node),
            pattern: None,
            additional_properties: node.get("additionalProperties").cloned(),
        }
    }

    /// Entry for the pattern wrapper; value-level fields stay on the value node
    fn pattern_wrapper(root: &Value, pattern: &str, node: &Value) -> Self {
        IndexEntry {
            description: description_of(node),
            type_name: type_name_of(node),
            one_of: resolved_alternatives(root, node),
            pattern: Some(pattern.to_string()),
            additional_properties: node.get("additionalProperties").cloned(),
            ..Default::default()
        }
    }
}

fn description_of(node: &Value) -> Option<String> {
    node.get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// `type` as written; a type array is joined with ` | `
pub fn type_name_of(node: &Value) -> Option<String> {
    match node.get("type")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(types) => {
            let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
            if names.is_empty() {
                None
            } else {
                Some(names.join(" | "))
            }
        }
        _ => None,
    }
}

fn array_field(node: &Value, field: &str) -> Vec<Value> {
    node.get(field)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn resolved_alternatives(root: &Value, node: &Value) -> Vec<Value> {
    node.get("oneOf")
        .and_then(Value::as_array)
        .map(|alts| {
            alts.iter()
                .map(|alt| match resolve_ref(root, alt) {
                    Ok(resolved) => resolved.into_owned(),
                    Err(_) => alt.clone(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// True when the node describes a mapping
pub fn is_object_schema(node: &Value) -> bool {
    match node.get("type") {
        Some(Value::String(t)) => t == "object",
        Some(Value::Array(types)) => types.iter().any(|t| t == "object"),
        _ => node.get("properties").is_some() || node.get("patternProperties").is_some(),
    }
}

/// Look up a local reference (`#/...`) from the schema root
pub fn lookup_ref<'a>(root: &'a Value, reference: &str) -> Option<&'a Value> {
    let pointer = reference.strip_prefix('#')?;
    let mut current = root;
    for raw in pointer.split('/').filter(|s| !s.is_empty()) {
        let segment = raw.replace("~1", "/").replace("~0", "~");
        current = match current {
            Value::Object(map) => map.get(&segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a node's `$ref` chain into a merged node
///
/// The referencing node's own fields win over the referenced ones, so a
/// local `description` overrides the target's. Nodes without `$ref` are
/// returned borrowed.
pub fn resolve_ref<'a>(root: &'a Value, node: &'a Value) -> Result<Cow<'a, Value>, ServiceError> {
    let mut current = Cow::Borrowed(node);
    let mut seen = HashSet::new();

    while let Some(reference) = current.get("$ref").and_then(Value::as_str) {
        let reference = reference.to_string();
        if !seen.insert(reference.clone()) {
            return Err(ServiceError::UnresolvedRef(format!("{reference} (cycle)")));
        }
        let target = lookup_ref(root, &reference)
            .ok_or_else(|| ServiceError::UnresolvedRef(reference.clone()))?;
        current = Cow::Owned(merge_ref(target, &current));
    }

    Ok(current)
}

fn merge_ref(target: &Value, referencing: &Value) -> Value {
    let mut merged: Map<String, Value> = target.as_object().cloned().unwrap_or_default();
    merged.remove("$ref");
    if let Some(own) = referencing.as_object() {
        for (key, value) in own {
            if key != "$ref" {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    // The target's own reference, if any, continues the chain
    if let Some(next) = target.get("$ref") {
        merged.insert("$ref".to_string(), next.clone());
    }
    Value::Object(merged)
}

/// Flattened schema index
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SchemaIndex {
    entries: BTreeMap<String, IndexEntry>,
}

impl SchemaIndex {
    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// First candidate present in the index, in the given order
    pub fn first_match<'s, S: AsRef<str>>(
        &'s self,
        candidates: &'s [S],
    ) -> Option<(&'s str, &'s IndexEntry)> {
        candidates.iter().find_map(|candidate| {
            let candidate = candidate.as_ref();
            self.entries.get(candidate).map(|entry| (candidate, entry))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndexEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Flatten a schema into its index
pub fn flatten(schema: &Value) -> SchemaIndex {
    let mut builder = IndexBuilder {
        root: schema,
        entries: BTreeMap::new(),
        expanding: Vec::new(),
    };

    builder.visit(schema, "", None);

    for container in DEFINITION_KEYS {
        if let Some(Value::Object(defs)) = schema.get(container) {
            for (key, def) in defs {
                builder.visit(def, &format!("{container}/{key}"), None);
            }
        }
    }

    debug!(entries = builder.entries.len(), "Flattened schema");
    SchemaIndex {
        entries: builder.entries,
    }
}

fn child_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}/{key}")
    }
}

struct IndexBuilder<'a> {
    root: &'a Value,
    entries: BTreeMap<String, IndexEntry>,
    /// References being expanded on the current descent
    expanding: Vec<String>,
}

impl IndexBuilder<'_> {
    /// `pattern` is the `patternProperties` key whose value is `node`
    fn visit(&mut self, node: &Value, prefix: &str, pattern: Option<&str>) {
        let root = self.root;
        let reference = node.get("$ref").and_then(Value::as_str);

        if let Some(reference) = reference {
            if self.expanding.iter().any(|r| r == reference) {
                return;
            }
        }

        let resolved = match resolve_ref(root, node) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(path = prefix, error = %err, "Skipping schema subtree");
                return;
            }
        };

        if let Some(reference) = reference {
            self.expanding.push(reference.to_string());
        }
        self.visit_resolved(&resolved, prefix, pattern);
        if reference.is_some() {
            self.expanding.pop();
        }
    }

    fn visit_resolved(&mut self, node: &Value, prefix: &str, pattern: Option<&str>) {
        let root = self.root;
        let Some(object) = node.as_object() else {
            return;
        };

        if let Some(Value::Object(patterns)) = object.get("patternProperties") {
            let path = child_path(prefix, "*");
            // Patterns share the wildcard slot; the last one wins
            for (key_pattern, sub) in patterns {
                let sub_resolved = resolve_ref(root, sub).unwrap_or(Cow::Borrowed(sub));
                self.entries.insert(
                    path.clone(),
                    IndexEntry::pattern_wrapper(root, key_pattern, &sub_resolved),
                );
                self.visit(sub, &path, Some(key_pattern));
            }
        }

        if let Some(Value::Array(alternatives)) = object.get("oneOf") {
            for (i, alternative) in alternatives.iter().enumerate() {
                self.visit(alternative, &format!("{prefix}#{i}"), None);
            }
        }

        if let Some(Value::Object(properties)) = object.get("properties") {
            for (key, sub) in properties {
                let path = child_path(prefix, key);
                let sub_resolved = resolve_ref(root, sub).unwrap_or(Cow::Borrowed(sub));
                self.entries
                    .insert(path.clone(), IndexEntry::full(root, &sub_resolved));
                self.visit(sub, &path, None);
            }
        }

        if !prefix.is_empty()
            && !object.contains_key("patternProperties")
            && !is_object_schema(node)
        {
            let mut entry = IndexEntry::full(root, node);
            entry.pattern = pattern.map(str::to_string);
            self.entries.insert(prefix.to_string(), entry);
        }
    }
}

/// Schema node for a structural path
///
/// Each segment is matched against `properties`, then against the first
/// `patternProperties` regex that matches it, with `$ref` resolved at every
/// step. `None` when any segment matches nothing.
pub fn schema_at_path<'a>(root: &'a Value, path: &[String]) -> Option<Cow<'a, Value>> {
    let mut current = resolve_or_warn(root, Cow::Borrowed(root))?;

    for segment in path {
        let next = match current {
            Cow::Borrowed(node) => Cow::Borrowed(child_schema(node, segment)?),
            Cow::Owned(node) => Cow::Owned(child_schema(&node, segment)?.clone()),
        };
        current = resolve_or_warn(root, next)?;
    }

    Some(current)
}

fn resolve_or_warn<'a>(root: &'a Value, node: Cow<'a, Value>) -> Option<Cow<'a, Value>> {
    let result = match node {
        Cow::Borrowed(node) => resolve_ref(root, node),
        Cow::Owned(node) => resolve_ref(root, &node).map(|r| Cow::Owned(r.into_owned())),
    };
    match result {
        Ok(resolved) => Some(resolved),
        Err(err) => {
            warn!(error = %err, "Cannot resolve schema node");
            None
        }
    }
}

/// Direct child schema for one key
fn child_schema<'n>(node: &'n Value, segment: &str) -> Option<&'n Value> {
    if let Some(sub) = node.get("properties").and_then(|p| p.get(segment)) {
        return Some(sub);
    }

    let patterns = node.get("patternProperties")?.as_object()?;
    patterns.iter().find_map(|(pattern, sub)| match Regex::new(pattern) {
        Ok(regex) if regex.is_match(segment) => Some(sub),
        Ok(_) => None,
        Err(err) => {
            debug!(pattern = %pattern, error = %err, "Ignoring invalid pattern property");
            None
        }
    })
}
