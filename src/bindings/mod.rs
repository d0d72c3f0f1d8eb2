//! Language bindings for yaml-assist
//!
//! Editor hosts that cannot spawn a language server use these instead.

pub mod json;

// WebAssembly support
#[cfg(target_arch = "wasm32")]
pub mod wasm;
