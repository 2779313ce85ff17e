//! # Hene Compiler
//!
//! Turns a module that declares `class X extends HeneElement` into a plain
//! custom element. The class keeps its authored members; the compiler adds:
//!
//! 1. A `__build()` method that creates the `$render` template with direct DOM calls.
//! 2. One `$state` subscription per reactive value read by the template.
//! 3. `$event` listeners bound in `connectedCallback` and removed again in
//!    `disconnectedCallback`.
//! 4. `$node` references resolved to the elements carrying a matching `node` attribute.
//!
//! Modules without a component class pass through untouched.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod class_locator;
mod dom;
mod error;
mod events;
mod interpolation;
mod member_path;
mod nodes;
mod options;
mod pipeline;
mod render;
pub mod runtime;
mod shell;
mod state;
mod syntax;
mod template;
mod watchers;


pub use error::{CompileError, ErrorCode, ErrorSink, LogSink, SourceLocation};
pub use options::CompileOptions;
pub use pipeline::{compile, compile_or_passthrough, compile_with_options};
pub use runtime::RUNTIME_JS;

/// Result handed back across the Node boundary. Errors are returned as data so
/// the host bundler can print them with its own formatting.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeCompileOutput {
    pub code: String,
    pub error: Option<NativeCompileError>,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeCompileError {
    pub code: String,
    pub message: String,
    pub hint: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub frame: Option<String>,
}

impl NativeCompileOutput {
    /// Compile `code`; on failure the original source is returned with the error attached.
    pub fn from_source(code: &str, id: Option<String>) -> Self {
        let options = CompileOptions {
            file_id: id,
            ..CompileOptions::default()
        };
        match compile_with_options(code, &options) {
            Ok(compiled) => NativeCompileOutput {
                code: compiled,
                error: None,
            },
            Err(error) => NativeCompileOutput {
                code: code.to_string(),
                error: Some(NativeCompileError {
                    code: error.code.id().to_string(),
                    message: error.message.clone(),
                    hint: error.hint.clone(),
                    line: error.location.map(|l| l.line),
                    column: error.location.map(|l| l.column),
                    frame: error.location.map(|_| error.render()),
                }),
            },
        }
    }
}

#[cfg(feature = "napi")]
#[napi]
pub fn compile_native(code: String, id: Option<String>) -> napi::Result<serde_json::Value> {
    let output = NativeCompileOutput::from_source(&code, id);
    serde_json::to_value(output).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(feature = "napi")]
#[napi]
pub fn runtime_source_native() -> String {
    RUNTIME_JS.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_output_success() {
        let out = NativeCompileOutput::from_source("const x = 1;\n", None);
        assert!(out.error.is_none());
        assert_eq!(out.code, "const x = 1;\n");
    }

    #[test]
    fn test_native_output_error_keeps_source() {
        let src = "class A extends HeneElement {\n  foo() { this.x = $node('x'); }\n}\n";
        let out = NativeCompileOutput::from_source(src, Some("a.js".to_string()));
        assert_eq!(out.code, src);
        let error = out.error.unwrap();
        assert_eq!(error.code, "ERR_NODE_CONSTRUCTOR_ONLY");
        assert_eq!(error.line, Some(2));
        let frame = error.frame.unwrap();
        assert!(frame.contains("a.js:2:"));
        assert!(frame.contains("foo() { this.x = $node('x'); }"));
    }
}
