//! Render Analyzer
//!
//! Extracts the template HTML from the single `$render` declaration and, at
//! transform time, replaces it with the generated `__build` method.

use crate::class_locator::{self, constructor_body, member_name, BUILD_METHOD};
use crate::error::{CompileError, ErrorCode};
use crate::syntax;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Class, ClassElement, Expression, MethodDefinitionKind, ReturnStatement, Statement,
    StaticMemberExpression,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::{GetSpan, Span};

pub const RENDER_MEMBER: &str = "$render";
pub const BUILT_MARKER: &str = "$built";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSource {
    pub html: String,
    /// The `$render` member, for template errors.
    pub span: Span,
    /// Constructor statement index of a legacy `this.$built()` call.
    pub built_marker: Option<usize>,
}

fn is_render_member(member: &ClassElement) -> bool {
    let is_instance = match member {
        ClassElement::PropertyDefinition(prop) => !prop.r#static,
        ClassElement::MethodDefinition(method) => {
            !method.r#static && method.kind == MethodDefinitionKind::Method
        }
        _ => false,
    };
    is_instance && member_name(member) == Some(RENDER_MEMBER)
}

fn template_text(expr: &Expression, source: &str) -> Option<String> {
    match expr {
        Expression::StringLiteral(lit) => Some(lit.value.to_string()),
        Expression::TemplateLiteral(tpl) => {
            let start = tpl.span.start as usize + 1;
            let end = (tpl.span.end as usize).saturating_sub(1);
            source.get(start..end).map(str::to_string)
        }
        _ => None,
    }
}

fn render_html(member: &ClassElement, source: &str) -> Result<String, CompileError> {
    let not_string = || CompileError::new(ErrorCode::RenderNotString).at(source, member.span());
    match member {
        ClassElement::PropertyDefinition(prop) => prop
            .value
            .as_ref()
            .and_then(|value| template_text(value, source))
            .ok_or_else(not_string),
        ClassElement::MethodDefinition(method) => {
            let statements = method
                .value
                .body
                .as_ref()
                .map(|body| &body.statements[..])
                .unwrap_or_default();
            let mut returns = Vec::new();
            let mut nested = ReturnFinder { found: false };
            for stmt in statements {
                match stmt {
                    Statement::ReturnStatement(ret) => returns.push(ret),
                    other => nested.visit_statement(other),
                }
            }
            if nested.found {
                return Err(not_string());
            }
            match (returns.first(), returns.get(1)) {
                (Some(ret), None) => ret
                    .argument
                    .as_ref()
                    .and_then(|arg| template_text(arg, source))
                    .ok_or_else(not_string),
                _ => Err(not_string()),
            }
        }
        _ => Err(not_string()),
    }
}

/// Detects a `return` nested below the top level of the render method.
struct ReturnFinder {
    found: bool,
}

impl<'a> Visit<'a> for ReturnFinder {
    fn visit_return_statement(&mut self, _it: &ReturnStatement<'a>) {
        self.found = true;
    }
}

/// Flags `this.$render` anywhere it is visited.
struct RenderReferenceFinder {
    found: Option<Span>,
}

impl<'a> Visit<'a> for RenderReferenceFinder {
    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if self.found.is_none()
            && it.property.name == RENDER_MEMBER
            && matches!(it.object, Expression::ThisExpression(_))
        {
            self.found = Some(it.span);
        }
        walk::walk_static_member_expression(self, it);
    }
}

/// Whether `stmt` is the legacy `this.$built()` marker.
pub fn is_built_marker(stmt: &Statement) -> bool {
    let Statement::ExpressionStatement(expr_stmt) = stmt else {
        return false;
    };
    let Expression::CallExpression(call) = &expr_stmt.expression else {
        return false;
    };
    match &call.callee {
        Expression::StaticMemberExpression(member) => {
            member.property.name == BUILT_MARKER
                && matches!(member.object, Expression::ThisExpression(_))
                && call.arguments.is_empty()
        }
        _ => false,
    }
}

pub fn analyze(class: &Class, source: &str) -> Result<RenderSource, CompileError> {
    let mut html: Option<(String, Span)> = None;

    for member in &class.body.body {
        if is_render_member(member) {
            if html.is_some() {
                return Err(CompileError::new(ErrorCode::RenderMultiple).at(source, member.span()));
            }
            let text = render_html(member, source)?;
            if text.trim().is_empty() {
                return Err(CompileError::new(ErrorCode::RenderEmpty).at(source, member.span()));
            }
            html = Some((text, member.span()));
            continue;
        }
        let mut finder = RenderReferenceFinder { found: None };
        finder.visit_class_element(member);
        if let Some(span) = finder.found {
            return Err(CompileError::new(ErrorCode::RenderCalled).at(source, span));
        }
    }

    let (html, span) = html
        .ok_or_else(|| CompileError::new(ErrorCode::RenderMissing).at(source, class.span))?;

    let statements = constructor_body(class).unwrap_or_default();
    let markers: Vec<usize> = statements
        .iter()
        .enumerate()
        .filter(|(_, stmt)| is_built_marker(stmt))
        .map(|(i, _)| i)
        .collect();
    if markers.len() > 1 {
        log::warn!("this.$built() appears {} times in the constructor", markers.len());
    }

    log::debug!("render template extracted ({} bytes)", html.len());
    Ok(RenderSource {
        html,
        span,
        built_marker: markers.first().copied(),
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORM
// ═══════════════════════════════════════════════════════════════════════════════

/// Drop `$render` and every `this.$built()` marker.
pub fn strip_declarations(class: &mut Class) -> usize {
    class.body.body.retain(|member| !is_render_member(member));
    match class_locator::constructor_body_mut(class) {
        Some(statements) => {
            let before = statements.len();
            statements.retain(|stmt| !is_built_marker(stmt));
            before - statements.len()
        }
        None => 0,
    }
}

/// Append `__build()` holding the DOM statements followed by the watcher subscriptions.
pub fn install_build_method<'a>(
    allocator: &'a Allocator,
    class: &mut Class<'a>,
    statements: &[String],
) -> Result<(), CompileError> {
    let text = format!("{}() {{\n{}\n}}", BUILD_METHOD, statements.join("\n"));
    for member in syntax::parse_class_members(allocator, &text)? {
        class.body.body.push(member);
    }
    Ok(())
}
