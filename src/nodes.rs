//! Node Analyzer and node-reference rewriting.
//!
//! `$node('name')` declares that a member path will hold the element carrying
//! `node="name"` in the template. Declarations are only legal as top-level
//! constructor assignments, and the declared paths are not live until the first
//! build, so the constructor may not read them.

use crate::class_locator::{constructor_index, key_name};
use crate::error::{CompileError, ErrorCode};
use crate::member_path::MemberPath;
use crate::state::is_call_to;
use crate::syntax;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, AssignmentExpression, CallExpression, Class, Expression, ObjectExpression,
    ObjectPropertyKind, Statement, StaticMemberExpression,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::Span;
use oxc_syntax::operator::AssignmentOperator;
use std::collections::HashSet;

pub const NODE_CONSTRUCTOR: &str = "$node";

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDeclaration {
    pub name: String,
    /// Every member path bound to this node, first declaration first.
    pub paths: Vec<MemberPath>,
    pub span: Span,
}

#[derive(Debug, Default, Clone)]
pub struct NodeTracker {
    declarations: Vec<NodeDeclaration>,
    paths: HashSet<String>,
}

impl NodeTracker {
    pub fn record(&mut self, name: &str, path: MemberPath, span: Span) {
        if !self.paths.insert(path.key()) {
            return;
        }
        match self.declarations.iter_mut().find(|d| d.name == name) {
            Some(decl) => decl.paths.push(path),
            None => self.declarations.push(NodeDeclaration {
                name: name.to_string(),
                paths: vec![path],
                span,
            }),
        }
    }

    pub fn declarations(&self) -> &[NodeDeclaration] {
        &self.declarations
    }

}

// ═══════════════════════════════════════════════════════════════════════════════
// USAGE CHECKING
// ═══════════════════════════════════════════════════════════════════════════════

/// Finds the first misuse in a subtree: a `$node` call that is not a recognized
/// declaration, or a read of an already-declared node path.
struct UsageChecker<'k> {
    known: Option<&'k HashSet<String>>,
    stray_call: ErrorCode,
    violation: Option<(ErrorCode, Span)>,
}

impl<'k> UsageChecker<'k> {
    fn new(known: Option<&'k HashSet<String>>, stray_call: ErrorCode) -> Self {
        UsageChecker {
            known,
            stray_call,
            violation: None,
        }
    }

    fn into_error(self, source: &str) -> Result<(), CompileError> {
        match self.violation {
            Some((code, span)) => Err(CompileError::new(code).at(source, span)),
            None => Ok(()),
        }
    }
}

impl<'a, 'k> Visit<'a> for UsageChecker<'k> {
    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if self.violation.is_none() {
            if let (Some(known), Some(path)) = (self.known, MemberPath::from_static_member(it)) {
                if known.contains(&path.key()) {
                    self.violation = Some((ErrorCode::NodeUsedInConstructor, it.span));
                    return;
                }
            }
        }
        walk::walk_static_member_expression(self, it);
    }

    fn visit_call_expression(&mut self, it: &CallExpression<'a>) {
        if self.violation.is_none()
            && matches!(&it.callee, Expression::Identifier(id) if id.name == NODE_CONSTRUCTOR)
        {
            self.violation = Some((self.stray_call, it.span));
            return;
        }
        walk::walk_call_expression(self, it);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ANALYSIS
// ═══════════════════════════════════════════════════════════════════════════════

fn node_name(call: &CallExpression, source: &str) -> Result<String, CompileError> {
    if let [Argument::StringLiteral(lit)] = &call.arguments[..] {
        return Ok(lit.value.to_string());
    }
    Err(CompileError::new(ErrorCode::NodeStringLiteral).at(source, call.span))
}

struct PendingNode {
    name: String,
    path: MemberPath,
    span: Span,
}

/// Collects the `$node` declarations of one assigned value, checking everything else in it.
fn collect_declarations(
    value: &Expression,
    path: MemberPath,
    tracker: &NodeTracker,
    source: &str,
    pending: &mut Vec<PendingNode>,
) -> Result<(), CompileError> {
    match value {
        Expression::CallExpression(call) if is_call_to(value, NODE_CONSTRUCTOR) => {
            let name = node_name(call, source)?;
            pending.push(PendingNode {
                name,
                path,
                span: call.span,
            });
            Ok(())
        }
        Expression::ObjectExpression(obj) => {
            collect_from_object(obj, &path, tracker, source, pending)
        }
        other => {
            let mut checker = UsageChecker::new(Some(&tracker.paths), ErrorCode::NodePosition);
            checker.visit_expression(other);
            checker.into_error(source)
        }
    }
}

fn collect_from_object(
    obj: &ObjectExpression,
    base: &MemberPath,
    tracker: &NodeTracker,
    source: &str,
    pending: &mut Vec<PendingNode>,
) -> Result<(), CompileError> {
    for property in &obj.properties {
        let named = match property {
            ObjectPropertyKind::ObjectProperty(prop) if !prop.computed => {
                key_name(&prop.key).map(|name| (name, &prop.value))
            }
            _ => None,
        };
        match named {
            Some((name, value)) => {
                collect_declarations(value, base.child(name), tracker, source, pending)?
            }
            None => {
                let mut checker = UsageChecker::new(Some(&tracker.paths), ErrorCode::NodePosition);
                checker.visit_object_property_kind(property);
                checker.into_error(source)?;
            }
        }
    }
    Ok(())
}

/// A top-level `<member-path> = <expr>` statement.
fn member_assignment<'s, 'a>(
    stmt: &'s Statement<'a>,
) -> Option<(MemberPath, &'s AssignmentExpression<'a>)> {
    let Statement::ExpressionStatement(expr_stmt) = stmt else {
        return None;
    };
    let Expression::AssignmentExpression(assign) = &expr_stmt.expression else {
        return None;
    };
    if assign.operator != AssignmentOperator::Assign {
        return None;
    }
    MemberPath::from_assignment_target(&assign.left).map(|path| (path, &**assign))
}

pub fn analyze(class: &Class, source: &str) -> Result<NodeTracker, CompileError> {
    let mut tracker = NodeTracker::default();
    let ctor = constructor_index(class);

    for (index, member) in class.body.body.iter().enumerate() {
        if Some(index) == ctor {
            continue;
        }
        let mut checker = UsageChecker::new(None, ErrorCode::NodeConstructorOnly);
        checker.visit_class_element(member);
        checker.into_error(source)?;
    }

    let statements = crate::class_locator::constructor_body(class).unwrap_or_default();
    for stmt in statements {
        match member_assignment(stmt) {
            Some((path, assign)) => {
                let mut checker = UsageChecker::new(Some(&tracker.paths), ErrorCode::NodePosition);
                checker.visit_assignment_target(&assign.left);
                checker.into_error(source)?;

                let mut pending = Vec::new();
                collect_declarations(&assign.right, path, &tracker, source, &mut pending)?;
                for node in pending {
                    tracker.record(&node.name, node.path, node.span);
                }
            }
            None => {
                let mut checker = UsageChecker::new(Some(&tracker.paths), ErrorCode::NodePosition);
                checker.visit_statement(stmt);
                checker.into_error(source)?;
            }
        }
    }

    log::debug!(
        "node analysis found {} declared nodes",
        tracker.declarations().len()
    );
    Ok(tracker)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORM
// ═══════════════════════════════════════════════════════════════════════════════

fn null_node_calls<'a>(
    allocator: &'a Allocator,
    value: &mut Expression<'a>,
) -> Result<usize, CompileError> {
    if is_call_to(value, NODE_CONSTRUCTOR) {
        *value = syntax::parse_expression(allocator, "null")
            .map_err(|e| CompileError::with_message(ErrorCode::Internal, e))?;
        return Ok(1);
    }
    let mut replaced = 0;
    if let Expression::ObjectExpression(obj) = value {
        for property in obj.properties.iter_mut() {
            if let ObjectPropertyKind::ObjectProperty(prop) = property {
                if !prop.computed && key_name(&prop.key).is_some() {
                    replaced += null_node_calls(allocator, &mut prop.value)?;
                }
            }
        }
    }
    Ok(replaced)
}

/// Replace each `$node(...)` declaration with `null`; the element is bound during build.
pub fn transform<'a>(
    allocator: &'a Allocator,
    class: &mut Class<'a>,
) -> Result<usize, CompileError> {
    let Some(statements) = crate::class_locator::constructor_body_mut(class) else {
        return Ok(0);
    };
    let mut replaced = 0;
    for stmt in statements.iter_mut() {
        let Statement::ExpressionStatement(expr_stmt) = stmt else {
            continue;
        };
        let Expression::AssignmentExpression(assign) = &mut expr_stmt.expression else {
            continue;
        };
        if assign.operator != AssignmentOperator::Assign
            || MemberPath::from_assignment_target(&assign.left).is_none()
        {
            continue;
        }
        replaced += null_node_calls(allocator, &mut assign.right)?;
    }
    log::trace!("replaced {} node declarations with null", replaced);
    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_locator::locate;

    fn analyze_src(src: &str) -> Result<NodeTracker, CompileError> {
        let allocator = Allocator::default();
        let program = syntax::parse_program(&allocator, src).unwrap();
        let class = locate(&program, "HeneElement").unwrap().class(&program).unwrap();
        analyze(class, src)
    }

    #[test]
    fn test_direct_and_nested_declarations() {
        let tracker = analyze_src(
            r#"class A extends HeneElement {
                constructor() {
                    super();
                    this.btn = $node('btn');
                    this.ui = { dialog: { close: $node('close') }, title: $node('title') };
                    this.alias = $node('btn');
                }
            }"#,
        )
        .unwrap();
        let names: Vec<&str> = tracker.declarations().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["btn", "close", "title"]);
        let paths: Vec<Vec<String>> = tracker
            .declarations()
            .iter()
            .map(|d| d.paths.iter().map(MemberPath::key).collect())
            .collect();
        assert_eq!(paths[0], vec!["this.btn", "this.alias"]);
        assert_eq!(paths[1], vec!["this.ui.dialog.close"]);
    }

    #[test]
    fn test_requires_single_string_literal() {
        for call in ["$node()", "$node(name)", "$node('a', 'b')", "$node(`a`)"] {
            let src = format!(
                "class A extends HeneElement {{ constructor() {{ super(); this.a = {}; }} }}",
                call
            );
            let err = analyze_src(&src).unwrap_err();
            assert_eq!(err.code, ErrorCode::NodeStringLiteral, "{}", call);
        }
    }

    #[test]
    fn test_constructor_only() {
        let err = analyze_src(
            "class A extends HeneElement {
  connectedCallback() {
    this.a = $node('a');
  }
}",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NodeConstructorOnly);
        assert_eq!(err.location.map(|l| l.line), Some(3));

        let err = analyze_src("class A extends HeneElement { a = $node('a'); }").unwrap_err();
        assert_eq!(err.code, ErrorCode::NodeConstructorOnly);
    }

    #[test]
    fn test_used_in_constructor() {
        let err = analyze_src(
            r#"class A extends HeneElement {
                constructor() {
                    super();
                    this.btn = $node('btn');
                    this.btn.textContent = 'x';
                }
            }"#,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NodeUsedInConstructor);
    }

    #[test]
    fn test_reads_before_declaration_are_allowed() {
        let tracker = analyze_src(
            r#"class A extends HeneElement {
                constructor() {
                    super();
                    this.label = this.getAttribute('label');
                    this.btn = $node('btn');
                }
            }"#,
        )
        .unwrap();
        assert_eq!(tracker.declarations().len(), 1);
    }

    #[test]
    fn test_unsupported_position() {
        let err = analyze_src(
            "class A extends HeneElement { constructor() { super(); const el = $node('a'); } }",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::NodePosition);
    }

    #[test]
    fn test_transform_replaces_with_null() {
        let allocator = Allocator::default();
        let src = "class A extends HeneElement {
            constructor() { super(); this.b = $node('b'); this.o = { c: $node('c') }; }
        }";
        let mut program = syntax::parse_program(&allocator, src).unwrap();
        let loc = locate(&program, "HeneElement").unwrap();
        let class = loc.class_mut(&mut program).unwrap();
        assert_eq!(transform(&allocator, class).unwrap(), 2);
        let out = syntax::print_program(&mut program);
        assert!(!out.contains("$node"));
        assert!(out.contains("this.b = null"));
    }
}
