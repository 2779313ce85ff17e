//! Template Parser
//!
//! Converts the `$render` HTML into a small element/text tree. Interpolations are
//! swapped for placeholder tokens before html5ever sees the markup and swapped back
//! afterwards, so `${...}` text survives tokenization intact.

use crate::error::{CompileError, ErrorCode};
use crate::interpolation;
use html5ever::{parse_fragment, LocalName, Namespace, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tendril::TendrilSink;

pub const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";
pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementNamespace {
    Html,
    Svg,
    MathMl,
}

impl ElementNamespace {
    fn from_uri(uri: &str) -> Self {
        match uri {
            SVG_NAMESPACE => ElementNamespace::Svg,
            MATHML_NAMESPACE => ElementNamespace::MathMl,
            _ => ElementNamespace::Html,
        }
    }

    /// Namespace URI for `createElementNS`, or `None` for plain HTML.
    pub fn uri(self) -> Option<&'static str> {
        match self {
            ElementNamespace::Html => None,
            ElementNamespace::Svg => Some(SVG_NAMESPACE),
            ElementNamespace::MathMl => Some(MATHML_NAMESPACE),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    Text(String),
    Element(ElementNode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementNode {
    pub tag: String,
    pub namespace: ElementNamespace,
    pub attributes: Vec<TemplateAttribute>,
    pub children: Vec<TemplateNode>,
}

impl ElementNode {
    /// An HTML `<template>`, whose children belong to its `.content` fragment.
    pub fn is_template(&self) -> bool {
        self.tag == "template" && self.namespace == ElementNamespace::Html
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateAttribute {
    pub name: String,
    pub value: String,
}

pub fn parse_template(html: &str) -> Result<Vec<TemplateNode>, CompileError> {
    let (protected, originals) = interpolation::protect(html);

    let context = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body"));
    let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, vec![])
        .from_utf8()
        .read_from(&mut protected.as_bytes())
        .map_err(|e| {
            CompileError::with_message(
                ErrorCode::TemplateParse,
                format!("Failed to parse $render template: {}", e),
            )
        })?;

    let mut nodes = Vec::new();
    collect_fragment(&dom.document, &originals, &mut nodes)?;
    log::trace!("template parsed into {} top-level nodes", nodes.len());
    Ok(nodes)
}

/// html5ever wraps fragment content in a synthetic `<html>` element under the document.
fn collect_fragment(
    handle: &Handle,
    originals: &[String],
    nodes: &mut Vec<TemplateNode>,
) -> Result<(), CompileError> {
    match &handle.data {
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                collect_fragment(child, originals, nodes)?;
            }
        }
        NodeData::Element { name, .. } if &*name.local == "html" => {
            for child in handle.children.borrow().iter() {
                nodes.extend(convert_node(child, originals)?);
            }
        }
        _ => nodes.extend(convert_node(handle, originals)?),
    }
    Ok(())
}

fn convert_node(
    handle: &Handle,
    originals: &[String],
) -> Result<Option<TemplateNode>, CompileError> {
    match &handle.data {
        NodeData::Text { contents } => {
            let text = contents.borrow().to_string();
            if text.trim().is_empty() {
                return Ok(None);
            }
            Ok(Some(TemplateNode::Text(interpolation::restore(&text, originals))))
        }
        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let tag = name.local.to_string();
            let mut attributes = Vec::new();
            for attr in attrs.borrow().iter() {
                let local = attr.name.local.to_string();
                if interpolation::holds_placeholder(&local) {
                    return Err(CompileError::with_message(
                        ErrorCode::TemplateParse,
                        format!(
                            "An interpolation cannot be used as an attribute name on <{}>.",
                            tag
                        ),
                    ));
                }
                let name = match &attr.name.prefix {
                    Some(prefix) => format!("{}:{}", prefix, local),
                    None => local,
                };
                attributes.push(TemplateAttribute {
                    name,
                    value: interpolation::restore(&attr.value, originals),
                });
            }

            // <template> content lives in a separate fragment rather than the child list.
            let content_root = template_contents.borrow().clone();
            let children_of = content_root.as_ref().unwrap_or(handle);
            let mut children = Vec::new();
            for child in children_of.children.borrow().iter() {
                children.extend(convert_node(child, originals)?);
            }

            Ok(Some(TemplateNode::Element(ElementNode {
                tag,
                namespace: ElementNamespace::from_uri(&name.ns),
                attributes,
                children,
            })))
        }
        NodeData::Document
        | NodeData::Doctype { .. }
        | NodeData::Comment { .. }
        | NodeData::ProcessingInstruction { .. } => Ok(None),
    }
}
