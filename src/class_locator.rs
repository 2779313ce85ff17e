//! Finds the component class and gives typed access to its lifecycle members.

use oxc_ast::ast::{
    Class, ClassElement, Declaration, ExportDefaultDeclarationKind, Expression, MethodDefinition,
    MethodDefinitionKind, Program, PropertyDefinition, PropertyKey, Statement,
};

pub const CONNECTED_CALLBACK: &str = "connectedCallback";
pub const DISCONNECTED_CALLBACK: &str = "disconnectedCallback";
pub const BUILD_METHOD: &str = "__build";

/// Position of the component class in the program body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLocation {
    pub statement_index: usize,
    pub name: Option<String>,
}

impl ClassLocation {
    pub fn class<'p, 'a>(&self, program: &'p Program<'a>) -> Option<&'p Class<'a>> {
        program.body.get(self.statement_index).and_then(class_of)
    }

    pub fn class_mut<'p, 'a>(&self, program: &'p mut Program<'a>) -> Option<&'p mut Class<'a>> {
        program
            .body
            .get_mut(self.statement_index)
            .and_then(class_of_mut)
    }
}

fn class_of<'p, 'a>(stmt: &'p Statement<'a>) -> Option<&'p Class<'a>> {
    match stmt {
        Statement::ClassDeclaration(class) => Some(&**class),
        Statement::ExportNamedDeclaration(decl) => match &decl.declaration {
            Some(Declaration::ClassDeclaration(class)) => Some(&**class),
            _ => None,
        },
        Statement::ExportDefaultDeclaration(decl) => match &decl.declaration {
            ExportDefaultDeclarationKind::ClassDeclaration(class) => Some(&**class),
            _ => None,
        },
        _ => None,
    }
}

fn class_of_mut<'p, 'a>(stmt: &'p mut Statement<'a>) -> Option<&'p mut Class<'a>> {
    match stmt {
        Statement::ClassDeclaration(class) => Some(&mut **class),
        Statement::ExportNamedDeclaration(decl) => match &mut decl.declaration {
            Some(Declaration::ClassDeclaration(class)) => Some(&mut **class),
            _ => None,
        },
        Statement::ExportDefaultDeclaration(decl) => match &mut decl.declaration {
            ExportDefaultDeclarationKind::ClassDeclaration(class) => Some(&mut **class),
            _ => None,
        },
        _ => None,
    }
}

fn extends_marker(class: &Class, marker: &str) -> bool {
    matches!(&class.super_class, Some(Expression::Identifier(ident)) if ident.name == marker)
}

/// First top-level class extending `marker`, in program order.
pub fn locate(program: &Program, marker: &str) -> Option<ClassLocation> {
    program.body.iter().enumerate().find_map(|(index, stmt)| {
        let class = class_of(stmt)?;
        extends_marker(class, marker).then(|| ClassLocation {
            statement_index: index,
            name: class.id.as_ref().map(|id| id.name.to_string()),
        })
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// MEMBER ACCESS
// ═══════════════════════════════════════════════════════════════════════════════

/// Static identifier name of a class member key.
pub fn key_name<'k>(key: &'k PropertyKey) -> Option<&'k str> {
    match key {
        PropertyKey::StaticIdentifier(ident) => Some(ident.name.as_str()),
        _ => None,
    }
}

pub fn member_name<'k>(member: &'k ClassElement) -> Option<&'k str> {
    match member {
        ClassElement::MethodDefinition(method) if !method.computed => key_name(&method.key),
        ClassElement::PropertyDefinition(prop) if !prop.computed => key_name(&prop.key),
        _ => None,
    }
}

fn is_constructor(member: &ClassElement) -> bool {
    matches!(
        member,
        ClassElement::MethodDefinition(m) if m.kind == MethodDefinitionKind::Constructor
    )
}

fn is_instance_method(method: &MethodDefinition, name: &str) -> bool {
    method.kind == MethodDefinitionKind::Method
        && !method.r#static
        && !method.computed
        && key_name(&method.key) == Some(name)
}

/// A non-static field named after a lifecycle callback, e.g. `connectedCallback = () => {}`.
pub fn lifecycle_field<'c, 'a>(class: &'c Class<'a>) -> Option<&'c PropertyDefinition<'a>> {
    class.body.body.iter().find_map(|member| match member {
        ClassElement::PropertyDefinition(prop) if !prop.r#static && !prop.computed => {
            let name = key_name(&prop.key)?;
            [CONNECTED_CALLBACK, DISCONNECTED_CALLBACK]
                .contains(&name)
                .then_some(&**prop)
        }
        _ => None,
    })
}

pub fn constructor_index(class: &Class) -> Option<usize> {
    class.body.body.iter().position(is_constructor)
}

pub fn method_index(class: &Class, name: &str) -> Option<usize> {
    class.body.body.iter().position(|member| match member {
        ClassElement::MethodDefinition(method) => is_instance_method(method, name),
        _ => false,
    })
}

/// Names of all non-static methods, excluding the constructor and accessors.
pub fn instance_method_names(class: &Class) -> Vec<String> {
    class
        .body
        .body
        .iter()
        .filter_map(|member| match member {
            ClassElement::MethodDefinition(m)
                if m.kind == MethodDefinitionKind::Method && !m.r#static && !m.computed =>
            {
                key_name(&m.key).map(str::to_string)
            }
            _ => None,
        })
        .collect()
}

fn body_of<'p, 'a>(member: &'p ClassElement<'a>) -> Option<&'p [Statement<'a>]> {
    match member {
        ClassElement::MethodDefinition(method) => method
            .value
            .body
            .as_ref()
            .map(|body| &body.statements[..]),
        _ => None,
    }
}

fn body_of_mut<'p, 'a>(
    member: &'p mut ClassElement<'a>,
) -> Option<&'p mut oxc_allocator::Vec<'a, Statement<'a>>> {
    match member {
        ClassElement::MethodDefinition(method) => method
            .value
            .body
            .as_mut()
            .map(|body| &mut body.statements),
        _ => None,
    }
}

pub fn constructor_body<'p, 'a>(class: &'p Class<'a>) -> Option<&'p [Statement<'a>]> {
    constructor_index(class).and_then(|i| body_of(&class.body.body[i]))
}

pub fn constructor_body_mut<'p, 'a>(
    class: &'p mut Class<'a>,
) -> Option<&'p mut oxc_allocator::Vec<'a, Statement<'a>>> {
    let index = constructor_index(class)?;
    body_of_mut(&mut class.body.body[index])
}

pub fn method_body<'p, 'a>(class: &'p Class<'a>, name: &str) -> Option<&'p [Statement<'a>]> {
    method_index(class, name).and_then(|i| body_of(&class.body.body[i]))
}

pub fn method_body_mut<'p, 'a>(
    class: &'p mut Class<'a>,
    name: &str,
) -> Option<&'p mut oxc_allocator::Vec<'a, Statement<'a>>> {
    let index = method_index(class, name)?;
    body_of_mut(&mut class.body.body[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;

    fn locate_in(src: &str) -> Option<ClassLocation> {
        let allocator = Allocator::default();
        let program = crate::syntax::parse_program(&allocator, src).unwrap();
        locate(&program, "HeneElement")
    }

    #[test]
    fn test_locate_plain_class() {
        let loc = locate_in("import x from 'y';\nclass Counter extends HeneElement {}").unwrap();
        assert_eq!(loc.statement_index, 1);
        assert_eq!(loc.name.as_deref(), Some("Counter"));
    }

    #[test]
    fn test_locate_exported_classes() {
        assert!(locate_in("export class A extends HeneElement {}").is_some());
        let loc = locate_in("export default class extends HeneElement {}").unwrap();
        assert_eq!(loc.name, None);
    }

    #[test]
    fn test_first_match_wins() {
        let loc = locate_in(
            "class Other extends HTMLElement {}
             class A extends HeneElement {}
             class B extends HeneElement {}",
        )
        .unwrap();
        assert_eq!(loc.name.as_deref(), Some("A"));
    }

    #[test]
    fn test_no_component() {
        assert!(locate_in("class A extends HTMLElement {}").is_none());
        assert!(locate_in("const x = 1;").is_none());
    }

    #[test]
    fn test_member_lookup() {
        let allocator = Allocator::default();
        let src = "class A extends HeneElement {
  constructor() { super(); this.a = 1; }
  static connectedCallback() {}
  onClick() {}
  get value() { return 1; }
}";
        let program = crate::syntax::parse_program(&allocator, src).unwrap();
        let class = locate(&program, "HeneElement").unwrap().class(&program).unwrap();
        assert_eq!(constructor_body(class).map(|b| b.len()), Some(2));
        assert!(method_index(class, CONNECTED_CALLBACK).is_none());
        assert_eq!(instance_method_names(class), vec!["onClick".to_string()]);
    }
}
