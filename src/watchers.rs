//! Watcher Builder
//!
//! Merges every update site that depends on one reactive value into a single
//! subscription. Subscriptions run at the end of `__build`; their unsubscribe
//! calls open `disconnectedCallback` in reverse order.

use crate::class_locator::{self, DISCONNECTED_CALLBACK};
use crate::error::{CompileError, ErrorCode};
use crate::interpolation;
use crate::member_path::MemberPath;
use crate::syntax;
use oxc_allocator::Allocator;
use oxc_ast::ast::Class;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateSite {
    Text { variable: String },
    Attribute { variable: String, name: String },
}

/// One interpolation site that depends on `state`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherDescriptor {
    pub state: MemberPath,
    pub site: UpdateSite,
    /// Interpolation body for text sites, raw attribute value for attribute sites.
    pub expression: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherUpdate {
    pub site: UpdateSite,
    pub expression: String,
}

impl WatcherUpdate {
    pub fn to_js(&self) -> String {
        match &self.site {
            UpdateSite::Text { variable } => {
                let value = if syntax::is_valid_expression(&self.expression) {
                    self.expression.trim().to_string()
                } else {
                    interpolation::parse_error_placeholder(&self.expression)
                };
                format!("{}.textContent = {}", variable, value)
            }
            UpdateSite::Attribute { variable, name } => format!(
                "{}.setAttribute({}, {})",
                variable,
                interpolation::string_literal(name),
                attribute_value(&self.expression)
            ),
        }
    }
}

/// JS expression re-creating an attribute's value, with unparsable interpolations
/// replaced by a placeholder literal.
pub fn attribute_value(raw: &str) -> String {
    interpolation::value_expression(raw, |expr| {
        if syntax::is_valid_expression(expr) {
            expr.trim().to_string()
        } else {
            interpolation::parse_error_placeholder(expr)
        }
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherGroup {
    pub state: MemberPath,
    /// Receiver slot holding the unsubscribe function, e.g. `_w0`.
    pub slot: String,
    pub updates: Vec<WatcherUpdate>,
}

impl WatcherGroup {
    pub fn subscription_js(&self) -> String {
        let callback = match self.updates.as_slice() {
            [single] => format!("() => {}", single.to_js()),
            updates => {
                let body: Vec<String> =
                    updates.iter().map(|u| format!("  {};", u.to_js())).collect();
                format!("() => {{\n{}\n}}", body.join("\n"))
            }
        };
        format!("this.{} = {}.watch({}, false);", self.slot, self.state, callback)
    }

    pub fn teardown_js(&self) -> String {
        format!("this.{}();", self.slot)
    }
}

/// Group descriptors by state path, in order of first appearance.
pub fn group(descriptors: &[WatcherDescriptor]) -> Vec<WatcherGroup> {
    let mut groups: Vec<WatcherGroup> = Vec::new();
    for descriptor in descriptors {
        let update = WatcherUpdate {
            site: descriptor.site.clone(),
            expression: descriptor.expression.clone(),
        };
        match groups.iter_mut().find(|g| g.state == descriptor.state) {
            Some(group) => {
                if !group.updates.contains(&update) {
                    group.updates.push(update);
                }
            }
            None => {
                let slot = format!("_w{}", groups.len());
                groups.push(WatcherGroup {
                    state: descriptor.state.clone(),
                    slot,
                    updates: vec![update],
                });
            }
        }
    }
    log::debug!(
        "grouped {} watcher sites into {} subscriptions",
        descriptors.len(),
        groups.len()
    );
    groups
}

pub fn subscriptions_js(groups: &[WatcherGroup]) -> Vec<String> {
    groups.iter().map(WatcherGroup::subscription_js).collect()
}

/// Unsubscribe statements, last subscription first.
pub fn teardown_js(groups: &[WatcherGroup]) -> Vec<String> {
    groups.iter().rev().map(WatcherGroup::teardown_js).collect()
}

/// Prepend the unsubscribe calls to `disconnectedCallback`.
pub fn install_teardown<'a>(
    allocator: &'a Allocator,
    class: &mut Class<'a>,
    groups: &[WatcherGroup],
) -> Result<(), CompileError> {
    if groups.is_empty() {
        return Ok(());
    }
    let statements = syntax::parse_statements(allocator, &teardown_js(groups).join("\n"))?;
    let body = class_locator::method_body_mut(class, DISCONNECTED_CALLBACK).ok_or_else(|| {
        CompileError::with_message(
            ErrorCode::Internal,
            "disconnectedCallback missing at watcher install",
        )
    })?;
    for (offset, stmt) in statements.into_iter().enumerate() {
        body.insert(offset, stmt);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count() -> MemberPath {
        MemberPath::this().child("count")
    }

    fn text(var: &str, state: MemberPath, expr: &str) -> WatcherDescriptor {
        WatcherDescriptor {
            state,
            site: UpdateSite::Text {
                variable: var.to_string(),
            },
            expression: expr.to_string(),
        }
    }

    #[test]
    fn test_single_update_subscription() {
        let groups = group(&[text("t_count", count(), "this.count()")]);
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].subscription_js(),
            "this._w0 = this.count.watch(() => t_count.textContent = this.count(), false);"
        );
        assert_eq!(groups[0].teardown_js(), "this._w0();");
    }

    #[test]
    fn test_same_state_is_one_group() {
        let descriptors = vec![
            text("t_count", count(), "this.count()"),
            WatcherDescriptor {
                state: count(),
                site: UpdateSite::Attribute {
                    variable: "button".to_string(),
                    name: "data-count".to_string(),
                },
                expression: "n-${this.count()}".to_string(),
            },
        ];
        let groups = group(&descriptors);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].updates.len(), 2);
        let js = groups[0].subscription_js();
        assert!(js.starts_with("this._w0 = this.count.watch(() => {\n"));
        assert!(js.contains("  t_count.textContent = this.count();\n"));
        assert!(js.contains("  button.setAttribute(\"data-count\", `n-${this.count()}`);\n"));
        assert!(js.ends_with("}, false);"));
    }

    #[test]
    fn test_slots_and_reverse_teardown() {
        let other = MemberPath::this().child("name");
        let groups = group(&[
            text("a", count(), "this.count()"),
            text("b", other.clone(), "this.name()"),
            text("c", count(), "this.count() * 2"),
        ]);
        assert_eq!(groups.iter().map(|g| g.slot.as_str()).collect::<Vec<_>>(), vec!["_w0", "_w1"]);
        assert_eq!(groups[1].state, other);
        assert_eq!(teardown_js(&groups), vec!["this._w1();", "this._w0();"]);
    }

    #[test]
    fn test_invalid_expression_is_placeholder() {
        let update = WatcherUpdate {
            site: UpdateSite::Text {
                variable: "t".to_string(),
            },
            expression: "this.count(".to_string(),
        };
        assert_eq!(
            update.to_js(),
            "t.textContent = \"/* HENE_PARSE_ERROR: this.count( */\""
        );
    }
}
