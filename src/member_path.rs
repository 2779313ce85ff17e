//! Canonical member paths such as `this.data.count`.
//!
//! A path is the chain of static property names walked leftwards from an access
//! to its root identifier or `this`. Computed access has no canonical path.

use oxc_ast::ast::{AssignmentTarget, Expression, StaticMemberExpression};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberPath(Vec<String>);

impl MemberPath {
    pub fn this() -> Self {
        MemberPath(vec!["this".to_string()])
    }

    pub fn from_expression(expr: &Expression) -> Option<Self> {
        match expr {
            Expression::ThisExpression(_) => Some(MemberPath::this()),
            Expression::Identifier(ident) => Some(MemberPath(vec![ident.name.to_string()])),
            Expression::StaticMemberExpression(member) => MemberPath::from_static_member(member),
            Expression::ParenthesizedExpression(paren) => {
                MemberPath::from_expression(&paren.expression)
            }
            _ => None,
        }
    }

    pub fn from_static_member(member: &StaticMemberExpression) -> Option<Self> {
        let mut path = MemberPath::from_expression(&member.object)?;
        path.0.push(member.property.name.to_string());
        Some(path)
    }

    pub fn from_assignment_target(target: &AssignmentTarget) -> Option<Self> {
        match target {
            AssignmentTarget::StaticMemberExpression(member) => {
                MemberPath::from_static_member(member)
            }
            _ => None,
        }
    }

    pub fn child(&self, name: &str) -> Self {
        let mut parts = self.0.clone();
        parts.push(name.to_string());
        MemberPath(parts)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Serialized form used as the identity key.
    pub fn key(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn path_of(src: &str) -> Option<MemberPath> {
        let allocator = Allocator::default();
        let expr = Parser::new(&allocator, src, SourceType::default())
            .parse_expression()
            .unwrap();
        MemberPath::from_expression(&expr)
    }

    #[test]
    fn test_this_rooted_path() {
        let path = path_of("this.data.count").unwrap();
        assert_eq!(path.key(), "this.data.count");
        assert_eq!(path.segments()[0], "this");
    }

    #[test]
    fn test_free_variable_root() {
        let path = path_of("store.items").unwrap();
        assert_eq!(path.segments(), &["store".to_string(), "items".to_string()]);
    }

    #[test]
    fn test_computed_access_aborts() {
        assert!(path_of("this.items[0]").is_none());
        assert!(path_of("this[key].value").is_none());
        assert!(path_of("getStore().value").is_none());
    }

    #[test]
    fn test_child_matches_parsed() {
        assert_eq!(MemberPath::this().child("a").child("b"), path_of("this.a.b").unwrap());
    }
}
