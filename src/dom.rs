//! Render/DOM Transformer
//!
//! Lowers the template tree into a flat list of DOM instructions for `__build`,
//! naming one local per created node, recording which elements back declared
//! `$node` references, and emitting a watcher descriptor for every interpolation
//! that reads reactive state.

use crate::error::{CompileError, ErrorCode};
use crate::interpolation::{self, Segment};
use crate::member_path::MemberPath;
use crate::nodes::NodeTracker;
use crate::state::StateMap;
use crate::syntax;
use crate::template::{ElementNamespace, ElementNode, TemplateNode};
use crate::watchers::{self, UpdateSite, WatcherDescriptor};
use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{IdentifierReference, StaticMemberExpression};
use oxc_ast_visit::{walk, Visit};
use regex::Regex;
use std::collections::{HashMap, HashSet};

pub const NODE_ATTRIBUTE: &str = "node";
pub const ROOT_CONTAINER: &str = "this._root";

lazy_static! {
    static ref THIS_MEMBER_RE: Regex = Regex::new(r"this\.([A-Za-z0-9_$]+)").unwrap();
}

const RESERVED: &[&str] = &[
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "document", "else", "enum", "eval", "export", "extends", "false",
    "finally", "for", "function", "if", "implements", "import", "in", "instanceof", "interface",
    "let", "new", "null", "package", "private", "protected", "public", "return", "static",
    "super", "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void",
    "while", "with", "yield",
];

// ═══════════════════════════════════════════════════════════════════════════════
// INSTRUCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomInstruction {
    CreateRoot,
    CreateElement {
        variable: String,
        tag: String,
        namespace: ElementNamespace,
        /// Member path assigned in the same statement, for the first `$node` reference.
        bind: Option<MemberPath>,
    },
    CreateText {
        variable: String,
        /// JS expression for the initial content.
        init: String,
    },
    SetAttribute {
        variable: String,
        name: String,
        value: String,
    },
    /// `parent: None` appends to the root container.
    Append {
        parent: Option<String>,
        children: Vec<String>,
    },
    AssignNode {
        path: MemberPath,
        variable: String,
    },
}

impl DomInstruction {
    pub fn to_js(&self) -> String {
        match self {
            DomInstruction::CreateRoot => {
                format!("{} = document.createDocumentFragment();", ROOT_CONTAINER)
            }
            DomInstruction::CreateElement {
                variable,
                tag,
                namespace,
                bind,
            } => {
                let create = match namespace.uri() {
                    Some(uri) => format!(
                        "document.createElementNS({}, {})",
                        interpolation::string_literal(uri),
                        interpolation::string_literal(tag)
                    ),
                    None => format!(
                        "document.createElement({})",
                        interpolation::string_literal(tag)
                    ),
                };
                match bind {
                    Some(path) => format!("const {} = {} = {};", variable, path, create),
                    None => format!("const {} = {};", variable, create),
                }
            }
            DomInstruction::CreateText { variable, init } => {
                format!("const {} = document.createTextNode({});", variable, init)
            }
            DomInstruction::SetAttribute {
                variable,
                name,
                value,
            } => format!(
                "{}.setAttribute({}, {});",
                variable,
                interpolation::string_literal(name),
                value
            ),
            DomInstruction::Append { parent, children } => format!(
                "{}.append({});",
                parent.as_deref().unwrap_or(ROOT_CONTAINER),
                children.join(", ")
            ),
            DomInstruction::AssignNode { path, variable } => format!("{} = {};", path, variable),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DomOutput {
    pub instructions: Vec<DomInstruction>,
    /// Declared node name to generated variable, in template order.
    pub node_map: Vec<(String, String)>,
    pub watchers: Vec<WatcherDescriptor>,
}

impl DomOutput {
    pub fn node_variable(&self, name: &str) -> Option<&str> {
        self.node_map
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn statements_js(&self) -> Vec<String> {
        self.instructions.iter().map(DomInstruction::to_js).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REACTIVE REFERENCES
// ═══════════════════════════════════════════════════════════════════════════════

struct StateRefCollector<'s> {
    state: &'s StateMap,
    seen: HashSet<String>,
    refs: Vec<MemberPath>,
}

impl<'a, 's> Visit<'a> for StateRefCollector<'s> {
    fn visit_static_member_expression(&mut self, it: &StaticMemberExpression<'a>) {
        if let Some(path) = MemberPath::from_static_member(it) {
            if let Some(known) = self.state.get(&path.key()) {
                if self.seen.insert(path.key()) {
                    self.refs.push(known.clone());
                }
            }
        }
        walk::walk_static_member_expression(self, it);
    }
}

/// Distinct state paths read anywhere inside `expression`, or the parse error message.
pub fn state_references(expression: &str, state: &StateMap) -> Result<Vec<MemberPath>, String> {
    let allocator = Allocator::default();
    let expr = syntax::parse_expression(&allocator, expression)?;
    let mut collector = StateRefCollector {
        state,
        seen: HashSet::new(),
        refs: Vec::new(),
    };
    collector.visit_expression(&expr);
    Ok(collector.refs)
}

struct FreeIdentifierCollector<'u> {
    names: &'u mut HashSet<String>,
}

impl<'a, 'u> Visit<'a> for FreeIdentifierCollector<'u> {
    fn visit_identifier_reference(&mut self, it: &IdentifierReference<'a>) {
        self.names.insert(it.name.to_string());
    }
}

fn interpolation_identifiers(text: &str, names: &mut HashSet<String>) {
    for segment in interpolation::scan(text) {
        let Segment::Dynamic { expression, .. } = segment else {
            continue;
        };
        let allocator = Allocator::default();
        if let Ok(expr) = syntax::parse_expression(&allocator, expression) {
            let mut collector = FreeIdentifierCollector { names: &mut *names };
            collector.visit_expression(&expr);
        }
    }
}

/// Every identifier read by an interpolation anywhere in `nodes`, so generated
/// locals never shadow a module binding such as an imported helper.
fn template_identifiers(nodes: &[TemplateNode], names: &mut HashSet<String>) {
    for node in nodes {
        match node {
            TemplateNode::Text(content) => interpolation_identifiers(content, names),
            TemplateNode::Element(element) => {
                for attribute in &element.attributes {
                    interpolation_identifiers(&attribute.value, names);
                }
                template_identifiers(&element.children, names);
            }
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
        .collect()
}

fn is_usable_identifier(name: &str) -> bool {
    match name.chars().next() {
        Some(first) => !first.is_ascii_digit() && !RESERVED.contains(&name),
        None => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

struct DomBuilder<'s> {
    state: &'s StateMap,
    output: DomOutput,
    used: HashSet<String>,
    tag_counters: HashMap<String, usize>,
    text_counters: HashMap<String, usize>,
    anonymous: usize,
}

impl<'s> DomBuilder<'s> {
    fn new(state: &'s StateMap) -> Self {
        DomBuilder {
            state,
            output: DomOutput::default(),
            used: HashSet::new(),
            tag_counters: HashMap::new(),
            text_counters: HashMap::new(),
            anonymous: 0,
        }
    }

    fn anonymous(&mut self, prefix: &str) -> String {
        loop {
            let name = format!("{}{}", prefix, self.anonymous);
            self.anonymous += 1;
            if self.used.insert(name.clone()) {
                return name;
            }
        }
    }

    /// `base`, then `base1`, `base2`... skipping names already taken.
    fn counted(&mut self, base: &str, text: bool) -> String {
        let counters = if text {
            &mut self.text_counters
        } else {
            &mut self.tag_counters
        };
        let mut n = counters.get(base).copied().unwrap_or(0);
        loop {
            let candidate = if n == 0 {
                base.to_string()
            } else {
                format!("{}{}", base, n)
            };
            n += 1;
            if !self.used.contains(&candidate) {
                counters.insert(base.to_string(), n);
                self.used.insert(candidate.clone());
                return candidate;
            }
        }
    }

    fn element_name(&mut self, element: &ElementNode) -> String {
        if let Some(declared) = element.attribute(NODE_ATTRIBUTE) {
            let name = sanitize(declared);
            if is_usable_identifier(&name) && !self.used.contains(&name) {
                self.used.insert(name.clone());
                return name;
            }
        }
        let base = sanitize(&element.tag);
        if is_usable_identifier(&base) {
            return self.counted(&base, false);
        }
        self.anonymous("_el")
    }

    fn text_name(&mut self, expression: &str, refs: &[MemberPath]) -> String {
        let base = THIS_MEMBER_RE
            .captures(expression)
            .map(|caps| caps[1].to_string())
            .or_else(|| refs.first().and_then(|p| p.segments().last().cloned()))
            .map(|ident| format!("t_{}", sanitize(&ident)))
            .unwrap_or_else(|| "t_t".to_string());
        self.counted(&base, true)
    }

    fn children(&mut self, nodes: &[TemplateNode]) -> Vec<String> {
        let mut variables = Vec::new();
        for node in nodes {
            match node {
                TemplateNode::Text(content) => variables.extend(self.text(content)),
                TemplateNode::Element(element) => variables.push(self.element(element)),
            }
        }
        variables
    }

    fn text(&mut self, content: &str) -> Vec<String> {
        let segments = interpolation::scan(content);
        let last = segments.len().saturating_sub(1);
        let mut variables = Vec::new();

        for (index, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Static(text) => {
                    let at_edge = index == 0 || index == last;
                    let edge_whitespace = segments.len() > 1 && at_edge && text.trim().is_empty();
                    if text.is_empty() || edge_whitespace {
                        continue;
                    }
                    let variable = self.anonymous("_t");
                    self.output.instructions.push(DomInstruction::CreateText {
                        variable: variable.clone(),
                        init: interpolation::string_literal(text),
                    });
                    variables.push(variable);
                }
                Segment::Dynamic { expression, .. } => {
                    let expression = expression.trim();
                    let (init, refs) = match state_references(expression, self.state) {
                        Ok(refs) => (expression.to_string(), refs),
                        Err(message) => {
                            log::warn!(
                                "interpolation `{}` does not parse: {}",
                                expression,
                                message
                            );
                            (interpolation::parse_error_placeholder(expression), Vec::new())
                        }
                    };
                    let variable = if refs.is_empty() {
                        self.anonymous("_t")
                    } else {
                        self.text_name(expression, &refs)
                    };
                    self.output.instructions.push(DomInstruction::CreateText {
                        variable: variable.clone(),
                        init,
                    });
                    for state in refs {
                        self.output.watchers.push(WatcherDescriptor {
                            state,
                            site: UpdateSite::Text {
                                variable: variable.clone(),
                            },
                            expression: expression.to_string(),
                        });
                    }
                    variables.push(variable);
                }
            }
        }
        variables
    }

    fn element(&mut self, element: &ElementNode) -> String {
        let variable = self.element_name(element);
        self.output.instructions.push(DomInstruction::CreateElement {
            variable: variable.clone(),
            tag: element.tag.clone(),
            namespace: element.namespace,
            bind: None,
        });

        for attribute in &element.attributes {
            if attribute.name == NODE_ATTRIBUTE {
                if self.output.node_variable(&attribute.value).is_some() {
                    log::warn!(
                        "node name `{}` is declared on more than one element",
                        attribute.value
                    );
                } else {
                    self.output
                        .node_map
                        .push((attribute.value.clone(), variable.clone()));
                }
                continue;
            }

            let mut refs: Vec<MemberPath> = Vec::new();
            for segment in interpolation::scan(&attribute.value) {
                let Segment::Dynamic { expression, .. } = segment else {
                    continue;
                };
                match state_references(expression, self.state) {
                    Ok(found) => {
                        for path in found {
                            if !refs.contains(&path) {
                                refs.push(path);
                            }
                        }
                    }
                    Err(message) => log::warn!(
                        "interpolation `{}` in attribute `{}` does not parse: {}",
                        expression.trim(),
                        attribute.name,
                        message
                    ),
                }
            }

            self.output.instructions.push(DomInstruction::SetAttribute {
                variable: variable.clone(),
                name: attribute.name.clone(),
                value: watchers::attribute_value(&attribute.value),
            });
            for state in refs {
                self.output.watchers.push(WatcherDescriptor {
                    state,
                    site: UpdateSite::Attribute {
                        variable: variable.clone(),
                        name: attribute.name.clone(),
                    },
                    expression: attribute.value.clone(),
                });
            }
        }

        let children = self.children(&element.children);
        if !children.is_empty() {
            let parent = if element.is_template() {
                format!("{}.content", variable)
            } else {
                variable.clone()
            };
            self.output.instructions.push(DomInstruction::Append {
                parent: Some(parent),
                children,
            });
        }
        variable
    }

    fn bind_nodes(&mut self, nodes: &NodeTracker, source: &str) -> Result<(), CompileError> {
        for declaration in nodes.declarations() {
            if self.output.node_variable(&declaration.name).is_none() {
                return Err(CompileError::with_message(
                    ErrorCode::NodeNotFound,
                    format!("No element in $render declares node=\"{}\".", declaration.name),
                )
                .at(source, declaration.span));
            }
        }

        for declaration in nodes.declarations() {
            let variable = self.output.node_variable(&declaration.name).map(str::to_string);
            let Some(variable) = variable else {
                continue;
            };
            let mut paths = declaration.paths.iter();
            if let Some(first) = paths.next() {
                for instruction in self.output.instructions.iter_mut() {
                    if let DomInstruction::CreateElement { variable: v, bind, .. } = instruction {
                        if *v == variable {
                            *bind = Some(first.clone());
                            break;
                        }
                    }
                }
            }
            for path in paths {
                self.output.instructions.push(DomInstruction::AssignNode {
                    path: path.clone(),
                    variable: variable.clone(),
                });
            }
        }
        Ok(())
    }
}

/// `source` is only used to locate a `$node` declaration with no matching element.
pub fn build(
    template: &[TemplateNode],
    state: &StateMap,
    nodes: &NodeTracker,
    source: &str,
) -> Result<DomOutput, CompileError> {
    let mut builder = DomBuilder::new(state);
    template_identifiers(template, &mut builder.used);
    builder.output.instructions.push(DomInstruction::CreateRoot);
    let top = builder.children(template);
    if !top.is_empty() {
        builder.output.instructions.push(DomInstruction::Append {
            parent: None,
            children: top,
        });
    }
    builder.bind_nodes(nodes, source)?;
    log::debug!(
        "render lowered to {} DOM statements and {} watcher sites",
        builder.output.instructions.len(),
        builder.output.watchers.len()
    );
    Ok(builder.output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse_template;
    use oxc_span::Span;

    fn state_of(paths: &[&str]) -> StateMap {
        let mut map = StateMap::default();
        for p in paths {
            let mut path = MemberPath::this();
            for seg in p.split('.') {
                path = path.child(seg);
            }
            map.record(path);
        }
        map
    }

    fn lower(html: &str, state: &StateMap, nodes: &NodeTracker) -> DomOutput {
        let tree = parse_template(html).unwrap();
        build(&tree, state, nodes, "").unwrap()
    }

    fn lower_static(html: &str) -> Vec<String> {
        lower(html, &StateMap::default(), &NodeTracker::default()).statements_js()
    }

    fn has(js: &[String], statement: &str) -> bool {
        js.iter().any(|s| s == statement)
    }

    #[test]
    fn test_reactive_text_node() {
        let state = state_of(&["count"]);
        let out = lower("<p>Count: ${this.count()}</p>", &state, &NodeTracker::default());
        assert_eq!(
            out.statements_js(),
            vec![
                "this._root = document.createDocumentFragment();",
                "const p = document.createElement(\"p\");",
                "const _t0 = document.createTextNode(\"Count: \");",
                "const t_count = document.createTextNode(this.count());",
                "p.append(_t0, t_count);",
                "this._root.append(p);",
            ]
        );
        assert_eq!(out.watchers.len(), 1);
        assert_eq!(out.watchers[0].state.key(), "this.count");
        assert_eq!(
            out.watchers[0].site,
            UpdateSite::Text {
                variable: "t_count".to_string()
            }
        );
    }

    #[test]
    fn test_non_reactive_dynamic_text_is_anonymous() {
        let out = lower(
            "<p>${new Date().getFullYear()}</p>",
            &StateMap::default(),
            &NodeTracker::default(),
        );
        let js = out.statements_js();
        assert!(has(&js, "const _t0 = document.createTextNode(new Date().getFullYear());"));
        assert!(out.watchers.is_empty());
    }

    #[test]
    fn test_sibling_names_are_distinct() {
        let out = lower(
            "<div></div><div></div><div node=\"div\"></div><span></span>",
            &StateMap::default(),
            &NodeTracker::default(),
        );
        let names: Vec<String> = out
            .instructions
            .iter()
            .filter_map(|i| match i {
                DomInstruction::CreateElement { variable, .. } => Some(variable.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["div", "div1", "div2", "span"]);
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_declared_name_wins() {
        let out = lower(
            "<button node=\"save\">Save</button><button>Cancel</button>",
            &StateMap::default(),
            &NodeTracker::default(),
        );
        assert_eq!(out.node_variable("save"), Some("save"));
        let js = out.statements_js();
        assert!(has(&js, "const save = document.createElement(\"button\");"));
        assert!(has(&js, "const button = document.createElement(\"button\");"));
        assert!(!js.iter().any(|s| s.contains("setAttribute(\"node\"")));
    }

    #[test]
    fn test_reserved_tag_falls_back_to_anonymous() {
        let js = lower_static("<var>x</var>");
        assert!(has(&js, "const _el0 = document.createElement(\"var\");"));
    }

    #[test]
    fn test_locals_avoid_identifiers_read_by_interpolations() {
        let state = state_of(&["ts"]);
        let out = lower(
            "<time>${time(this.ts())}</time><p title=\"${label}\">${p}</p>",
            &state,
            &NodeTracker::default(),
        );
        let js = out.statements_js();
        assert!(has(&js, "const time1 = document.createElement(\"time\");"));
        assert!(has(&js, "const t_ts = document.createTextNode(time(this.ts()));"));
        assert!(has(&js, "const p1 = document.createElement(\"p\");"));
        assert!(!js.iter().any(|s| s.starts_with("const time =")));
        assert!(!js.iter().any(|s| s.starts_with("const p =")));
    }

    #[test]
    fn test_template_children_go_to_content() {
        let js = lower_static("<template><li>a</li></template>");
        assert!(has(&js, "const template = document.createElement(\"template\");"));
        assert!(has(&js, "template.content.append(li);"));
        assert!(has(&js, "this._root.append(template);"));
        assert!(!has(&js, "template.append(li);"));
    }

    #[test]
    fn test_attribute_watchers() {
        let state = state_of(&["active"]);
        let out = lower(
            "<a class=\"link ${this.active() ? 'on' : ''}\" aria-current=\"${this.active()}\" \
             href=\"/x\"></a>",
            &state,
            &NodeTracker::default(),
        );
        let js = out.statements_js();
        assert!(has(&js, "a.setAttribute(\"href\", \"/x\");"));
        assert!(has(&js, "a.setAttribute(\"class\", `link ${this.active() ? 'on' : ''}`);"));
        assert_eq!(out.watchers.len(), 2);
        assert!(out.watchers.iter().all(|w| w.state.key() == "this.active"));
        let groups = watchers::group(&out.watchers);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].updates.len(), 2);
    }

    #[test]
    fn test_nested_state_reference() {
        let state = state_of(&["data.items"]);
        let out = lower(
            "<ul>${this.data.items().map(i => `<li>${i}</li>`).join('')}</ul>",
            &state,
            &NodeTracker::default(),
        );
        assert_eq!(out.watchers.len(), 1);
        assert_eq!(out.watchers[0].state.key(), "this.data.items");
        assert!(out.statements_js()[2].starts_with("const t_data = "));
    }

    #[test]
    fn test_unparsable_interpolation_is_placeholder() {
        let state = state_of(&["count"]);
        let out = lower("<p>${this.count(}</p>", &state, &NodeTracker::default());
        let js = out.statements_js();
        assert!(has(
            &js,
            "const _t0 = document.createTextNode(\"/* HENE_PARSE_ERROR: this.count( */\");"
        ));
        assert!(out.watchers.is_empty());
    }

    #[test]
    fn test_node_binding_first_then_trailing() {
        let mut nodes = NodeTracker::default();
        nodes.record("btn", MemberPath::this().child("button"), Span::default());
        nodes.record("btn", MemberPath::this().child("ui").child("button"), Span::default());
        let out = lower("<button node=\"btn\">Go</button>", &StateMap::default(), &nodes);
        let js = out.statements_js();
        assert!(has(&js, "const btn = this.button = document.createElement(\"button\");"));
        assert_eq!(js.last().unwrap(), "this.ui.button = btn;");
    }

    #[test]
    fn test_single_binding_has_no_trailing_assignment() {
        let mut nodes = NodeTracker::default();
        nodes.record("btn", MemberPath::this().child("btn"), Span::default());
        let out = lower("<button node=\"btn\"></button>", &StateMap::default(), &nodes);
        let js = out.statements_js();
        assert_eq!(js.iter().filter(|s| s.contains("this.btn")).count(), 1);
        assert_eq!(js.last().unwrap(), "this._root.append(btn);");
    }

    #[test]
    fn test_missing_node_is_error() {
        let mut nodes = NodeTracker::default();
        nodes.record("missing", MemberPath::this().child("m"), Span::default());
        let tree = parse_template("<div></div>").unwrap();
        let err = build(&tree, &StateMap::default(), &nodes, "").unwrap_err();
        assert_eq!(err.code, ErrorCode::NodeNotFound);
    }

    #[test]
    fn test_svg_uses_namespace() {
        let js = lower_static("<svg><path d=\"M0 0\"></path></svg>");
        assert!(has(
            &js,
            "const svg = document.createElementNS(\"http://www.w3.org/2000/svg\", \"svg\");"
        ));
    }

    #[test]
    fn test_interior_whitespace_is_kept() {
        let state = state_of(&["first", "last"]);
        let out = lower("<p>${this.first()} ${this.last()}</p>", &state, &NodeTracker::default());
        let js = out.statements_js();
        assert!(has(&js, "const _t0 = document.createTextNode(\" \");"));
        assert!(has(&js, "p.append(t_first, _t0, t_last);"));
    }
}
