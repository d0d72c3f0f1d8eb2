//! yaml-assist - schema-driven editing support for YAML
//!
//! Diagnostics, completion and hover for YAML documents described by a JSON
//! Schema. The core works on plain text plus a loaded schema and has no I/O;
//! the language server and CLI live behind the `cli` feature.

pub mod cache;
pub mod completion;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hover;
pub mod position;
pub mod schema;

// CLI-only modules
#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod lsp;

// Language bindings (organized under bindings module)
pub mod bindings;

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

// Re-export commonly used types
pub use cache::ValidatorCache;
pub use completion::{complete, Suggestion, SuggestionKind};
pub use config::{ServerSettings, ServiceConfig};
pub use diagnostics::{validate, Diagnostic, Severity};
pub use error::ServiceError;
pub use hover::{hover, Hover};
pub use position::{path_at_position, possible_paths, Position, TextRange};
pub use schema::{flatten, schema_at_path, IndexEntry, SchemaFormat, SchemaIndex};

/// yaml-assist version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One loaded schema with everything derived from it
///
/// The schema and its index are immutable after construction and shared
/// behind `Arc`, so a service can be cloned cheaply into request handlers.
#[derive(Debug, Clone)]
pub struct LanguageService {
    schema: Arc<Value>,
    index: Arc<SchemaIndex>,
    validators: ValidatorCache,
    config: ServiceConfig,
}

impl LanguageService {
    /// Create a service for a schema with default configuration
    pub fn new(schema: Value) -> Self {
        Self::with_config(schema, ServiceConfig::default())
    }

    /// Create a service for a schema
    pub fn with_config(schema: Value, config: ServiceConfig) -> Self {
        let index = schema::flatten(&schema);
        debug!(entries = index.len(), cache_size = config.cache_size, "Schema loaded");
        Self {
            schema: Arc::new(schema),
            index: Arc::new(index),
            validators: ValidatorCache::new(config.cache_size),
            config,
        }
    }

    /// Create a service from JSON schema text
    pub fn from_json(text: &str, config: ServiceConfig) -> Result<Self> {
        Self::from_text(text, SchemaFormat::Json, config)
    }

    /// Create a service from YAML schema text
    pub fn from_yaml(text: &str, config: ServiceConfig) -> Result<Self> {
        Self::from_text(text, SchemaFormat::Yaml, config)
    }

    /// Create a service from schema text and make sure it compiles
    pub fn from_text(text: &str, format: SchemaFormat, config: ServiceConfig) -> Result<Self> {
        let schema = schema::parse_schema(text, format)?;
        let service = Self::with_config(schema, config);
        service.compile_check()?;
        Ok(service)
    }

    /// Load a schema file; the format follows the extension (JSON otherwise)
    pub fn load<P: AsRef<Path>>(path: P, config: ServiceConfig) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema: {}", path.display()))?;
        let format = SchemaFormat::from_path(path).unwrap_or(SchemaFormat::Json);
        Self::from_text(&text, format, config)
            .with_context(|| format!("Invalid schema: {}", path.display()))
    }

    /// Compile the validator once so broken schemas surface at load time
    pub fn compile_check(&self) -> Result<(), ServiceError> {
        self.validators.get_or_compile(&self.schema).map(|_| ()).map_err(|err| {
            warn!(error = %err, "Schema does not compile");
            err
        })
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn index(&self) -> &SchemaIndex {
        &self.index
    }

    pub fn validators(&self) -> &ValidatorCache {
        &self.validators
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Diagnostics for a document
    pub fn validate(&self, text: &str) -> Vec<Diagnostic> {
        diagnostics::validate(text, &self.schema, &self.validators, &self.config.source)
    }

    /// Completion suggestions at a position
    pub fn complete(&self, text: &str, position: Position) -> Vec<Suggestion> {
        completion::complete(text, position, &self.schema)
    }

    /// Hover documentation at a position
    pub fn hover(&self, text: &str, position: Position) -> Option<Hover> {
        hover::hover(text, position, &self.index)
    }
}
