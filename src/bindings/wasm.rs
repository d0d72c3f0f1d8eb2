//! WebAssembly bindings for yaml-assist
//!
//! This module provides a JavaScript-friendly API for editing YAML in the
//! browser. Results cross the boundary as JSON strings with camelCase fields.

use super::json;
use crate::{LanguageService, ServiceConfig};
use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global allocator.
#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in the browser console
#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Main yaml-assist interface for WebAssembly
#[wasm_bindgen]
pub struct YamlAssist {
    service: LanguageService,
}

#[wasm_bindgen]
impl YamlAssist {
    /// Load a JSON schema; throws when it does not parse or compile
    #[wasm_bindgen(constructor)]
    pub fn new(schema_json: &str) -> Result<YamlAssist, JsValue> {
        #[cfg(feature = "console_error_panic_hook")]
        set_panic_hook();

        LanguageService::from_json(schema_json, ServiceConfig::default())
            .map(|service| YamlAssist { service })
            .map_err(|e| JsValue::from_str(&format!("{:#}", e)))
    }

    /// Diagnostics as a JSON array
    pub fn validate(&self, text: &str) -> String {
        json::validate(&self.service, text)
    }

    /// Completion suggestions as a JSON array (1-based line and column)
    pub fn complete(&self, text: &str, line: usize, column: usize) -> String {
        json::complete(&self.service, text, line, column)
    }

    /// Hover payload as JSON, or `null`
    pub fn hover(&self, text: &str, line: usize, column: usize) -> String {
        json::hover(&self.service, text, line, column)
    }

    /// Flattened schema index as JSON
    pub fn index(&self) -> String {
        json::index(&self.service)
    }

    /// Get the yaml-assist version
    pub fn version() -> String {
        crate::VERSION.to_string()
    }
}
