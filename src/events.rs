//! Event Transformer
//!
//! Rewrites `target.$event(type, listener, options)` statements in
//! `connectedCallback` into `addEventListener` calls, hoisting listeners that would
//! otherwise be recreated on every connect, and prepends the matching
//! `removeEventListener` calls to `disconnectedCallback`.

use crate::class_locator::{
    self, instance_method_names, method_index, CONNECTED_CALLBACK, DISCONNECTED_CALLBACK,
};
use crate::error::{CompileError, ErrorCode};
use crate::syntax;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    Argument, CallExpression, Class, Expression, ObjectPropertyKind, PropertyKey, Statement,
    StaticMemberExpression,
};
use oxc_ast_visit::{walk, Visit};
use oxc_span::{GetSpan, Span};

pub const EVENT_METHOD: &str = "$event";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBinding {
    pub target: String,
    pub event_type: String,
    /// Listener expression passed to both add and remove.
    pub listener: String,
    pub options: String,
    pub capture: String,
    /// `this._eN = ...` assignment when the listener was hoisted.
    pub hoisted: Option<String>,
}

impl EventBinding {
    pub fn add_js(&self) -> String {
        format!(
            "{}.addEventListener({}, {}, {});",
            self.target, self.event_type, self.listener, self.options
        )
    }

    pub fn remove_js(&self) -> String {
        format!(
            "{}.removeEventListener({}, {}, {});",
            self.target, self.event_type, self.listener, self.capture
        )
    }
}

/// Flags any `.$event` access it visits.
struct EventReferenceFinder {
    found: Option<Span>,
}

impl<'a> Visit<'a> for EventReferenceFinder {
    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if self.found.is_none() && it.property.name == EVENT_METHOD {
            self.found = Some(it.span);
        }
        walk::walk_static_member_expression(self, it);
    }
}

fn misplaced(source: &str, span: Span) -> CompileError {
    CompileError::new(ErrorCode::EventConnectedOnly).at(source, span)
}

fn slice(source: &str, span: Span) -> Result<String, CompileError> {
    source
        .get(span.start as usize..span.end as usize)
        .map(str::to_string)
        .ok_or_else(|| CompileError::with_message(ErrorCode::Internal, "span outside of source"))
}

/// The `$event` call and its target when `stmt` is `target.$event(...)`.
fn event_call<'s, 'a>(
    stmt: &'s Statement<'a>,
) -> Option<(&'s CallExpression<'a>, &'s StaticMemberExpression<'a>)> {
    let Statement::ExpressionStatement(expr_stmt) = stmt else {
        return None;
    };
    let Expression::CallExpression(call) = &expr_stmt.expression else {
        return None;
    };
    match &call.callee {
        Expression::StaticMemberExpression(member) if member.property.name == EVENT_METHOD => {
            Some((&**call, &**member))
        }
        _ => None,
    }
}

/// Capture flag for `removeEventListener`, taken from the third `$event` argument.
///
/// Only boolean literals are copied. Any other expression may name a local of
/// `connectedCallback` that does not exist in `disconnectedCallback`, so the flag
/// falls back to `false`.
fn capture_flag(options: Option<&Expression>) -> String {
    let flag = match options {
        None => Some(false),
        Some(Expression::BooleanLiteral(lit)) => Some(lit.value),
        Some(Expression::Identifier(ident)) if ident.name == "undefined" => Some(false),
        Some(Expression::ObjectExpression(obj)) => {
            let capture = obj.properties.iter().find_map(|property| match property {
                ObjectPropertyKind::ObjectProperty(prop) if !prop.computed => {
                    let is_capture = match &prop.key {
                        PropertyKey::StaticIdentifier(ident) => ident.name == "capture",
                        PropertyKey::StringLiteral(lit) => lit.value == "capture",
                        _ => false,
                    };
                    is_capture.then_some(&prop.value)
                }
                _ => None,
            });
            match capture {
                None => Some(false),
                Some(Expression::BooleanLiteral(lit)) => Some(lit.value),
                Some(_) => None,
            }
        }
        Some(_) => None,
    };
    match flag {
        Some(value) => value.to_string(),
        None => {
            log::warn!("$event capture option is not a boolean literal; removal uses false");
            "false".to_string()
        }
    }
}

fn is_bind_call(call: &CallExpression) -> bool {
    matches!(&call.callee, Expression::StaticMemberExpression(m) if m.property.name == "bind")
}

struct BindingCollector<'c> {
    source: &'c str,
    methods: Vec<String>,
    next_slot: usize,
}

impl<'c> BindingCollector<'c> {
    fn hoist(&mut self, value: String) -> (String, Option<String>) {
        let slot = format!("this._e{}", self.next_slot);
        self.next_slot += 1;
        let assignment = format!("{} = {};", slot, value);
        (slot, Some(assignment))
    }

    fn binding(
        &mut self,
        call: &CallExpression,
        member: &StaticMemberExpression,
    ) -> Result<EventBinding, CompileError> {
        let source = self.source;
        let bad_arguments = || CompileError::new(ErrorCode::EventArguments).at(source, call.span);
        if !(2..=3).contains(&call.arguments.len()) {
            return Err(bad_arguments());
        }
        let mut expressions = Vec::new();
        for argument in &call.arguments {
            if matches!(argument, Argument::SpreadElement(_)) {
                return Err(bad_arguments());
            }
            let mut finder = EventReferenceFinder { found: None };
            finder.visit_argument(argument);
            if let Some(span) = finder.found {
                return Err(misplaced(source, span));
            }
            expressions.push(argument.as_expression().ok_or_else(bad_arguments)?);
        }

        let target = slice(source, member.object.span())?;
        let event_type = slice(source, expressions[0].span())?;
        let listener_expr = expressions[1];
        let listener_src = slice(source, listener_expr.span())?;

        let (listener, hoisted) = match listener_expr {
            Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {
                self.hoist(listener_src)
            }
            Expression::StaticMemberExpression(m)
                if matches!(m.object, Expression::ThisExpression(_)) =>
            {
                let name = m.property.name.as_str();
                if self.methods.iter().any(|method| method == name) {
                    self.hoist(format!("e => this.{}(e)", name))
                } else {
                    (listener_src, None)
                }
            }
            Expression::CallExpression(c) if is_bind_call(c) => self.hoist(listener_src),
            _ => {
                log::warn!(
                    "listener `{}` for {} may not be the same reference at removal",
                    listener_src,
                    event_type
                );
                (listener_src, None)
            }
        };

        let options_expr = expressions.get(2).copied();
        let options = match options_expr {
            Some(expr) => slice(source, expr.span())?,
            None => "false".to_string(),
        };

        Ok(EventBinding {
            target,
            event_type,
            listener,
            options,
            capture: capture_flag(options_expr),
            hoisted,
        })
    }
}

/// Validate placement and build one binding per `$event` statement, in declaration order.
pub fn collect(class: &Class, source: &str) -> Result<Vec<EventBinding>, CompileError> {
    let connected = method_index(class, CONNECTED_CALLBACK);

    for (index, member) in class.body.body.iter().enumerate() {
        if Some(index) == connected {
            continue;
        }
        let mut finder = EventReferenceFinder { found: None };
        finder.visit_class_element(member);
        if let Some(span) = finder.found {
            return Err(misplaced(source, span));
        }
    }

    let mut collector = BindingCollector {
        source,
        methods: instance_method_names(class),
        next_slot: 0,
    };
    let mut bindings = Vec::new();
    let statements = class_locator::method_body(class, CONNECTED_CALLBACK).unwrap_or_default();
    for stmt in statements {
        match event_call(stmt) {
            Some((call, member)) => {
                let mut finder = EventReferenceFinder { found: None };
                finder.visit_expression(&member.object);
                if let Some(span) = finder.found {
                    return Err(misplaced(source, span));
                }
                bindings.push(collector.binding(call, member)?);
            }
            None => {
                let mut finder = EventReferenceFinder { found: None };
                finder.visit_statement(stmt);
                if let Some(span) = finder.found {
                    return Err(misplaced(source, span));
                }
            }
        }
    }
    log::debug!("found {} event bindings", bindings.len());
    Ok(bindings)
}

/// Apply collected bindings. Must run after the shell transform so both lifecycle
/// callbacks and the constructor exist.
pub fn apply<'a>(
    allocator: &'a Allocator,
    class: &mut Class<'a>,
    bindings: &[EventBinding],
) -> Result<(), CompileError> {
    if bindings.is_empty() {
        return Ok(());
    }
    let missing =
        || CompileError::with_message(ErrorCode::Internal, "event lifecycle member vanished");

    {
        let connected =
            class_locator::method_body_mut(class, CONNECTED_CALLBACK).ok_or_else(missing)?;
        let mut pending = bindings.iter();
        for stmt in connected.iter_mut() {
            if event_call(stmt).is_some() {
                let binding = pending.next().ok_or_else(missing)?;
                *stmt = syntax::parse_statement(allocator, &binding.add_js())?;
            }
        }
    }

    let hoisted: Vec<&str> = bindings
        .iter()
        .filter_map(|b| b.hoisted.as_deref())
        .collect();
    if !hoisted.is_empty() {
        let statements = syntax::parse_statements(allocator, &hoisted.join("\n"))?;
        let ctor = class_locator::constructor_body_mut(class).ok_or_else(missing)?;
        for stmt in statements {
            ctor.push(stmt);
        }
    }

    let removals: Vec<String> = bindings.iter().map(EventBinding::remove_js).collect();
    let statements = syntax::parse_statements(allocator, &removals.join("\n"))?;
    let disconnected =
        class_locator::method_body_mut(class, DISCONNECTED_CALLBACK).ok_or_else(missing)?;
    for (offset, stmt) in statements.into_iter().enumerate() {
        disconnected.insert(offset, stmt);
    }
    Ok(())
}
