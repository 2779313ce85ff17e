//! Class-Shell Transformer
//!
//! Turns the component class into a well-formed custom element: retargets the
//! superclass, guarantees the lifecycle members exist, puts `super()` first, and
//! installs the one-time build guard.

use crate::class_locator::{
    self, constructor_index, lifecycle_field, method_index, CONNECTED_CALLBACK,
    DISCONNECTED_CALLBACK,
};
use crate::error::{CompileError, ErrorCode};
use crate::syntax;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Class, Expression, Statement};

pub const BUILT_FLAG: &str = "this.__built";

fn is_super_call(stmt: &Statement) -> bool {
    match stmt {
        Statement::ExpressionStatement(expr_stmt) => match &expr_stmt.expression {
            Expression::CallExpression(call) => matches!(call.callee, Expression::Super(_)),
            _ => false,
        },
        _ => false,
    }
}

fn missing_member() -> CompileError {
    CompileError::with_message(ErrorCode::Internal, "lifecycle member vanished during transform")
}

/// Lifecycle callbacks declared as fields would shadow the methods the shell installs.
pub fn check_lifecycle(class: &Class, source: &str) -> Result<(), CompileError> {
    match lifecycle_field(class) {
        Some(field) => Err(CompileError::new(ErrorCode::LifecycleField).at(source, field.span)),
        None => Ok(()),
    }
}

/// Point `extends` at the platform element base.
pub fn retarget_superclass<'a>(
    allocator: &'a Allocator,
    class: &mut Class<'a>,
    element_base: &str,
) {
    if let Some(Expression::Identifier(ident)) = &mut class.super_class {
        let name: &'a str = allocator.alloc_str(element_base);
        ident.name = name.into();
    }
}

/// Insert an empty constructor and lifecycle callbacks where the author left them out.
pub fn ensure_lifecycle<'a>(
    allocator: &'a Allocator,
    class: &mut Class<'a>,
) -> Result<(), CompileError> {
    if constructor_index(class).is_none() {
        let members = syntax::parse_class_members(allocator, "constructor() {\nsuper();\n}")?;
        for (offset, member) in members.into_iter().enumerate() {
            class.body.body.insert(offset, member);
        }
        log::trace!("synthesized constructor");
    }
    for name in [CONNECTED_CALLBACK, DISCONNECTED_CALLBACK] {
        if method_index(class, name).is_none() {
            for member in syntax::parse_class_members(allocator, &format!("{}() {{}}", name))? {
                class.body.body.push(member);
            }
            log::trace!("synthesized {}", name);
        }
    }
    Ok(())
}

/// Move an existing top-level `super(...)` to the front of the constructor, or prepend one.
pub fn ensure_super_first<'a>(
    allocator: &'a Allocator,
    class: &mut Class<'a>,
) -> Result<(), CompileError> {
    let statements = class_locator::constructor_body_mut(class).ok_or_else(missing_member)?;
    match statements.iter().position(is_super_call) {
        Some(0) => {}
        Some(index) => {
            let call = statements.remove(index);
            statements.insert(0, call);
        }
        None => statements.insert(0, syntax::parse_statement(allocator, "super();")?),
    }
    Ok(())
}

/// `this.__built = false` after `super()`, the guarded `__build()` call at the start of
/// `connectedCallback`, and the root append at its end.
pub fn install_build_guard<'a>(
    allocator: &'a Allocator,
    class: &mut Class<'a>,
) -> Result<(), CompileError> {
    let flag = syntax::parse_statement(allocator, &format!("{} = false;", BUILT_FLAG))?;
    let statements = class_locator::constructor_body_mut(class).ok_or_else(missing_member)?;
    let after_super = statements
        .iter()
        .position(is_super_call)
        .map(|i| i + 1)
        .unwrap_or(0);
    statements.insert(after_super, flag);

    let guard = syntax::parse_statement(
        allocator,
        &format!(
            "if (!{flag}) {{\nthis.{build}();\n{flag} = true;\n}}",
            flag = BUILT_FLAG,
            build = class_locator::BUILD_METHOD
        ),
    )?;
    let append = syntax::parse_statement(allocator, "this.appendChild(this._root);")?;
    let connected =
        class_locator::method_body_mut(class, CONNECTED_CALLBACK).ok_or_else(missing_member)?;
    connected.insert(0, guard);
    connected.push(append);
    Ok(())
}

pub fn transform<'a>(
    allocator: &'a Allocator,
    class: &mut Class<'a>,
    element_base: &str,
) -> Result<(), CompileError> {
    retarget_superclass(allocator, class, element_base);
    ensure_lifecycle(allocator, class)?;
    ensure_super_first(allocator, class)?;
    install_build_guard(allocator, class)?;
    Ok(())
}
