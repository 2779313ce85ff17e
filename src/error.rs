//! Error Module for Hene Compiler
//!
//! Structured compile errors and their message catalog. Errors carry the source
//! they were raised against, so they render as `miette` reports with a labeled
//! excerpt.

use miette::{Diagnostic, GraphicalReportHandler, GraphicalTheme, NamedSource, SourceSpan};
use oxc_span::Span;
use serde::{Serialize, Serializer};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Syntax,
    TemplateParse,
    NodeStringLiteral,
    NodeConstructorOnly,
    NodeUsedInConstructor,
    NodePosition,
    NodeNotFound,
    RenderMissing,
    RenderMultiple,
    RenderNotString,
    RenderEmpty,
    RenderCalled,
    EventConnectedOnly,
    EventArguments,
    LifecycleField,
    Internal,
}

struct CatalogEntry {
    id: &'static str,
    message: &'static str,
    hint: Option<&'static str>,
}

impl ErrorCode {
    fn entry(self) -> CatalogEntry {
        let (id, message, hint) = match self {
            ErrorCode::Syntax => ("ERR_SYNTAX", "Source could not be parsed.", None),
            ErrorCode::TemplateParse => (
                "ERR_TEMPLATE_PARSE",
                "The $render template could not be parsed as HTML.",
                None,
            ),
            ErrorCode::NodeStringLiteral => (
                "ERR_NODE_STRING_LITERAL",
                "$node() requires exactly one string literal argument.",
                Some("Write the node name inline, e.g. this.btn = $node('btn')."),
            ),
            ErrorCode::NodeConstructorOnly => (
                "ERR_NODE_CONSTRUCTOR_ONLY",
                "$node() can only be used inside the constructor.",
                Some(
                    "Declare node references in the constructor and use them from \
                     connectedCallback.",
                ),
            ),
            ErrorCode::NodeUsedInConstructor => (
                "ERR_NODE_USED_IN_CONSTRUCTOR",
                "Node references cannot be used inside the constructor.",
                Some(
                    "Nodes are created when the element first connects; move this code to \
                     connectedCallback.",
                ),
            ),
            ErrorCode::NodePosition => (
                "ERR_NODE_POSITION",
                "$node() must be assigned directly to a member path.",
                Some("Use this.name = $node('name') or a nested object literal of $node() calls."),
            ),
            ErrorCode::NodeNotFound => (
                "ERR_NODE_NOT_FOUND",
                "No element in $render declares this node name.",
                Some("Add a matching node=\"...\" attribute to an element in $render."),
            ),
            ErrorCode::RenderMissing => (
                "ERR_RENDER_MISSING",
                "Component does not declare $render.",
                None,
            ),
            ErrorCode::RenderMultiple => (
                "ERR_RENDER_MULTIPLE",
                "Component declares $render more than once.",
                None,
            ),
            ErrorCode::RenderNotString => (
                "ERR_RENDER_NOT_STRING",
                "$render must be a string or template literal.",
                Some(
                    "A $render() method must contain a single return of a string or template \
                     literal.",
                ),
            ),
            ErrorCode::RenderEmpty => ("ERR_RENDER_EMPTY", "$render is empty.", None),
            ErrorCode::RenderCalled => (
                "ERR_RENDER_CALLED",
                "$render cannot be referenced from other class members.",
                Some("The template is compiled away; it does not exist at runtime."),
            ),
            ErrorCode::EventConnectedOnly => (
                "ERR_EVENT_CONNECTED_ONLY",
                "$event() can only be used as a statement inside connectedCallback.",
                None,
            ),
            ErrorCode::EventArguments => (
                "ERR_EVENT_ARGUMENTS",
                "$event() expects (type, listener) or (type, listener, options).",
                None,
            ),
            ErrorCode::LifecycleField => (
                "ERR_LIFECYCLE_FIELD",
                "connectedCallback and disconnectedCallback must be declared as methods.",
                Some(
                    "Write connectedCallback() { ... } instead of assigning a function to a \
                     field.",
                ),
            ),
            ErrorCode::Internal => (
                "ERR_INTERNAL",
                "The compiler produced code it could not re-parse.",
                None,
            ),
        };
        CatalogEntry { id, message, hint }
    }

    /// Stable string id, e.g. `ERR_NODE_NOT_FOUND`.
    pub fn id(self) -> &'static str {
        self.entry().id
    }

    pub fn message(self) -> &'static str {
        self.entry().message
    }

    pub fn hint(self) -> Option<&'static str> {
        self.entry().hint
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILE ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// 1-based line.
    pub line: u32,
    /// 1-based column, counted in characters.
    pub column: u32,
}

impl SourceLocation {
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() as u32 + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() as u32 + 1;
        SourceLocation { line, column }
    }
}

#[derive(Debug, Clone, Serialize, thiserror::Error, Diagnostic)]
#[serde(rename_all = "camelCase")]
#[error("[Hene {code}] {message}")]
pub struct CompileError {
    pub code: ErrorCode,
    pub message: String,
    #[help]
    pub hint: Option<String>,
    pub location: Option<SourceLocation>,
    pub file: Option<String>,

    /// Module text the error was raised against, named after `file`.
    #[serde(skip)]
    #[source_code]
    pub source_code: Option<NamedSource<String>>,

    #[serde(skip)]
    #[label("here")]
    pub span: Option<SourceSpan>,
}

impl CompileError {
    pub fn new(code: ErrorCode) -> Self {
        CompileError {
            code,
            message: code.message().to_string(),
            hint: code.hint().map(str::to_string),
            location: None,
            file: None,
            source_code: None,
            span: None,
        }
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        CompileError {
            message: message.into(),
            ..CompileError::new(code)
        }
    }

    /// Attach the location of `span`, which must index into `source`.
    pub fn at(mut self, source: &str, span: Span) -> Self {
        let start = span.start as usize;
        self.location = Some(SourceLocation::from_offset(source, start));
        self.span = Some((start, span.size() as usize).into());
        self
    }

    pub fn at_offset(mut self, source: &str, offset: usize) -> Self {
        self.location = Some(SourceLocation::from_offset(source, offset));
        self.span = Some((offset.min(source.len()), 0).into());
        self
    }

    pub fn in_file(mut self, file: Option<&str>) -> Self {
        self.file = file.map(str::to_string);
        self
    }

    /// Keep a copy of `source` for reports. Call after [`CompileError::in_file`] so
    /// the excerpt is titled with the file name.
    pub fn with_source(mut self, source: &str) -> Self {
        let name = self.file.as_deref().unwrap_or("<input>");
        self.source_code = Some(NamedSource::new(name, source.to_string()));
        self
    }

    /// Graphical report: prefix, message, labeled excerpt and hint.
    pub fn render(&self) -> String {
        let reporter = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
        let mut out = String::new();
        match reporter.render_report(&mut out, self) {
            Ok(()) => out,
            Err(_) => self.to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Destination for errors raised while compiling. A hosting build tool supplies its own;
/// otherwise [`LogSink`] prints through the `log` facade.
pub trait ErrorSink {
    fn report(&mut self, error: &CompileError, source: &str);
}

impl<F> ErrorSink for F
where
    F: FnMut(&CompileError, &str),
{
    fn report(&mut self, error: &CompileError, source: &str) {
        self(error, source)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn report(&mut self, error: &CompileError, source: &str) {
        match error.source_code {
            Some(_) => log::error!("{}", error.render()),
            None => log::error!("{}", error.clone().with_source(source).render()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_offset() {
        let src = "class A {\n  foo() {}\n}";
        assert_eq!(SourceLocation::from_offset(src, 0), SourceLocation { line: 1, column: 1 });
        let offset = src.find("foo").unwrap();
        assert_eq!(SourceLocation::from_offset(src, offset), SourceLocation { line: 2, column: 3 });
    }

    #[test]
    fn test_report_labels_failing_line() {
        let src = "a\nb\nlet x = $node();\nc\nd";
        let offset = src.find("$node").unwrap();
        let err = CompileError::new(ErrorCode::NodeStringLiteral)
            .at_offset(src, offset)
            .in_file(Some("src/x.js"))
            .with_source(src);
        assert_eq!(err.span, Some(SourceSpan::from((offset, 0))));
        let report = err.render();
        assert!(report.contains("[Hene ERR_NODE_STRING_LITERAL]"));
        assert!(report.contains("src/x.js:3:9"));
        assert!(report.contains("let x = $node();"));
        assert!(report.contains("here"));
        assert!(report.contains("this.btn = $node('btn')"));
        assert!(!report.contains("│ d"));
    }

    #[test]
    fn test_report_without_source_is_plain() {
        let err = CompileError::new(ErrorCode::RenderEmpty);
        assert!(err.render().contains("[Hene ERR_RENDER_EMPTY] $render is empty."));
        let json = serde_json::to_value(&err).unwrap();
        assert!(json.get("sourceCode").is_none());
        assert!(json.get("span").is_none());
    }

    #[test]
    fn test_error_catalog() {
        let err = CompileError::new(ErrorCode::NodeNotFound);
        assert_eq!(err.code.id(), "ERR_NODE_NOT_FOUND");
        assert!(err.hint.is_some());
        assert_eq!(
            err.to_string(),
            "[Hene ERR_NODE_NOT_FOUND] No element in $render declares this node name."
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "ERR_NODE_NOT_FOUND");
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |e: &CompileError, _src: &str| seen.push(e.code);
            sink.report(&CompileError::new(ErrorCode::RenderEmpty), "");
        }
        assert_eq!(seen, vec![ErrorCode::RenderEmpty]);
    }
}
