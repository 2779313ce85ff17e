//! State Analyzer
//!
//! Records every member path initialized with `$state(...)`, either as a class field
//! or as a top-level constructor assignment. Object literals are walked with the
//! enclosing path as base, so `this.data = { a: $state(0) }` records `this.data.a`.

use crate::class_locator::{constructor_body, key_name};
use crate::member_path::MemberPath;
use oxc_ast::ast::{
    Class, ClassElement, Expression, ObjectExpression, ObjectPropertyKind, Statement,
};
use oxc_syntax::operator::AssignmentOperator;
use std::collections::HashMap;

pub const STATE_CONSTRUCTOR: &str = "$state";

#[derive(Debug, Default, Clone)]
pub struct StateMap {
    paths: HashMap<String, MemberPath>,
}

impl StateMap {
    /// Returns false when the path was already known; the first record wins.
    pub fn record(&mut self, path: MemberPath) -> bool {
        let key = path.key();
        if self.paths.contains_key(&key) {
            return false;
        }
        log::trace!("state path recorded: {}", key);
        self.paths.insert(key, path);
        true
    }

    pub fn get(&self, key: &str) -> Option<&MemberPath> {
        self.paths.get(key)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Whether `expr` is a direct call to the free function `name`.
pub fn is_call_to(expr: &Expression, name: &str) -> bool {
    match expr {
        Expression::CallExpression(call) => {
            matches!(&call.callee, Expression::Identifier(ident) if ident.name == name)
        }
        _ => false,
    }
}

fn collect_from_value(value: &Expression, path: MemberPath, map: &mut StateMap) {
    if is_call_to(value, STATE_CONSTRUCTOR) {
        map.record(path);
    } else if let Expression::ObjectExpression(obj) = value {
        collect_from_object(obj, &path, map);
    }
}

fn collect_from_object(obj: &ObjectExpression, base: &MemberPath, map: &mut StateMap) {
    for property in &obj.properties {
        let ObjectPropertyKind::ObjectProperty(prop) = property else {
            continue;
        };
        if prop.computed {
            continue;
        }
        if let Some(name) = key_name(&prop.key) {
            collect_from_value(&prop.value, base.child(name), map);
        }
    }
}

pub fn analyze(class: &Class) -> StateMap {
    let mut map = StateMap::default();

    for member in &class.body.body {
        let ClassElement::PropertyDefinition(prop) = member else {
            continue;
        };
        if prop.r#static || prop.computed {
            continue;
        }
        if let (Some(name), Some(value)) = (key_name(&prop.key), &prop.value) {
            collect_from_value(value, MemberPath::this().child(name), &mut map);
        }
    }

    for stmt in constructor_body(class).unwrap_or_default() {
        let Statement::ExpressionStatement(expr_stmt) = stmt else {
            continue;
        };
        let Expression::AssignmentExpression(assign) = &expr_stmt.expression else {
            continue;
        };
        if assign.operator != AssignmentOperator::Assign {
            continue;
        }
        if let Some(path) = MemberPath::from_assignment_target(&assign.left) {
            collect_from_value(&assign.right, path, &mut map);
        }
    }

    log::debug!("state analysis found {} reactive paths", map.len());
    map
}
