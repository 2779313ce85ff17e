//! Source Parser / Code Generator boundary around oxc.
//!
//! Generated code is produced as text and parsed back into the arena through the
//! snippet helpers here, so every inserted node comes out of the same parser that
//! read the author's source.

use crate::error::{CompileError, ErrorCode};
use oxc_allocator::{Allocator, Vec as ArenaVec};
use oxc_ast::ast::{ClassElement, Expression, MethodDefinitionKind, Program, Statement};
use oxc_codegen::Codegen;
use oxc_diagnostics::OxcDiagnostic;
use oxc_parser::Parser;
use oxc_span::SourceType;

const SNIPPET_CLASS: &str = "__HeneSnippet";

pub fn source_type() -> SourceType {
    SourceType::default().with_module(true)
}

/// Parse one compilation unit. The first diagnostic becomes `ERR_SYNTAX`.
pub fn parse_program<'a>(
    allocator: &'a Allocator,
    source: &'a str,
) -> Result<Program<'a>, CompileError> {
    let ret = Parser::new(allocator, source, source_type()).parse();
    if let Some(diagnostic) = ret.errors.first() {
        return Err(syntax_error(source, diagnostic));
    }
    if ret.panicked {
        return Err(CompileError::new(ErrorCode::Syntax));
    }
    Ok(ret.program)
}

fn syntax_error(source: &str, diagnostic: &OxcDiagnostic) -> CompileError {
    let error = CompileError::with_message(ErrorCode::Syntax, diagnostic.message.to_string());
    let offset = diagnostic
        .labels
        .as_ref()
        .and_then(|labels| labels.first())
        .map(|label| label.offset());
    match offset {
        Some(offset) => error.at_offset(source, offset),
        None => error,
    }
}

/// Parse a standalone expression, e.g. an interpolation body.
pub fn parse_expression<'a>(
    allocator: &'a Allocator,
    text: &str,
) -> Result<Expression<'a>, String> {
    let text: &'a str = allocator.alloc_str(text);
    Parser::new(allocator, text, source_type())
        .parse_expression()
        .map_err(|errors| {
            errors
                .first()
                .map(|e| e.message.to_string())
                .unwrap_or_else(|| "invalid expression".to_string())
        })
}

/// Whether `text` parses as exactly one expression.
pub fn is_valid_expression(text: &str) -> bool {
    let allocator = Allocator::default();
    parse_expression(&allocator, text).is_ok()
}

fn parse_snippet<'a>(allocator: &'a Allocator, text: String) -> Result<Program<'a>, CompileError> {
    let text: &'a str = allocator.alloc_str(&text);
    let ret = Parser::new(allocator, text, source_type()).parse();
    if let Some(diagnostic) = ret.errors.first() {
        log::debug!("generated snippet failed to parse: {}\n{}", diagnostic.message, text);
        return Err(CompileError::with_message(
            ErrorCode::Internal,
            format!("Generated code did not parse: {}", diagnostic.message),
        ));
    }
    Ok(ret.program)
}

fn snippet_members<'a>(program: Program<'a>) -> Option<ArenaVec<'a, ClassElement<'a>>> {
    program.body.into_iter().find_map(|stmt| match stmt {
        Statement::ClassDeclaration(class) => Some(class.unbox().body.unbox().body),
        _ => None,
    })
}

/// Parse class members, e.g. `__build() { ... }`.
pub fn parse_class_members<'a>(
    allocator: &'a Allocator,
    members: &str,
) -> Result<ArenaVec<'a, ClassElement<'a>>, CompileError> {
    let text = format!("class {} extends HTMLElement {{\n{}\n}}", SNIPPET_CLASS, members);
    let program = parse_snippet(allocator, text)?;
    snippet_members(program).ok_or_else(|| CompileError::new(ErrorCode::Internal))
}

/// Parse statements in constructor position, where `super()` and `this` are legal.
pub fn parse_statements<'a>(
    allocator: &'a Allocator,
    statements: &str,
) -> Result<ArenaVec<'a, Statement<'a>>, CompileError> {
    let text = format!(
        "class {} extends HTMLElement {{\nconstructor() {{\n{}\n}}\n}}",
        SNIPPET_CLASS, statements
    );
    let program = parse_snippet(allocator, text)?;
    let members = snippet_members(program).ok_or_else(|| CompileError::new(ErrorCode::Internal))?;
    members
        .into_iter()
        .find_map(|member| match member {
            ClassElement::MethodDefinition(method)
                if method.kind == MethodDefinitionKind::Constructor =>
            {
                method.unbox().value.unbox().body.map(|body| body.unbox().statements)
            }
            _ => None,
        })
        .ok_or_else(|| CompileError::new(ErrorCode::Internal))
}

/// Parse exactly one statement.
pub fn parse_statement<'a>(
    allocator: &'a Allocator,
    statement: &str,
) -> Result<Statement<'a>, CompileError> {
    parse_statements(allocator, statement)?
        .into_iter()
        .next()
        .ok_or_else(|| CompileError::new(ErrorCode::Internal))
}

/// Print the program. Comments are dropped since generated nodes carry snippet spans
/// that do not line up with the original comment positions.
pub fn print_program(program: &mut Program) -> String {
    program.comments.clear();
    Codegen::new().build(program).code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_program_reports_location() {
        let allocator = Allocator::default();
        let src = "class A {\n  foo( {\n}";
        let err = parse_program(&allocator, src).unwrap_err();
        assert_eq!(err.code, ErrorCode::Syntax);
        assert!(err.location.is_some());
    }

    #[test]
    fn test_parse_statements_allows_super_and_this() {
        let allocator = Allocator::default();
        let stmts = parse_statements(&allocator, "super(); this.a = 1;").unwrap();
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn test_parse_class_members() {
        let allocator = Allocator::default();
        let text = "__build() { this._root = null; }\nconnectedCallback() {}";
        let members = parse_class_members(&allocator, text).unwrap();
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn test_bad_snippet_is_internal_error() {
        let allocator = Allocator::default();
        let err = parse_statements(&allocator, "this.a = ;").unwrap_err();
        assert_eq!(err.code, ErrorCode::Internal);
    }

    #[test]
    fn test_expression_validity() {
        assert!(is_valid_expression("this.count() + 1"));
        assert!(!is_valid_expression("this.count( + "));
        assert!(!is_valid_expression("a; b"));
    }
}
