//! Tree renderer
//!
//! Turns a resolved schema plus a data context into a tree of
//! [`OutputNode`]s. Rendering is synchronous and pure: the same schema,
//! context and iteration element always produce the same output, and no
//! collaborator is consulted.

use schema_types::{IterateSpec, OutputNode, SchemaNode};
use serde_json::Value;

use crate::context::DataContext;
use crate::expr::Evaluator;
use crate::format::ValueFormatter;
use crate::observer::EvalObserver;
use crate::resolver::ResolvedSchema;

/// Result of rendering one schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    /// Condition failed, the iteration source was unusable, or the schema
    /// resolved to nothing
    Absent,
    Node(OutputNode),
    /// An iterated node, one output per element
    Expanded(Vec<OutputNode>),
}

impl Rendered {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn into_nodes(self) -> Vec<OutputNode> {
        match self {
            Self::Absent => Vec::new(),
            Self::Node(node) => vec![node],
            Self::Expanded(nodes) => nodes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Renderer<'a> {
    evaluator: Evaluator<'a>,
    formatter: ValueFormatter,
}

impl Default for Renderer<'static> {
    fn default() -> Self {
        Self::new(ValueFormatter::default())
    }
}

impl Renderer<'static> {
    pub fn new(formatter: ValueFormatter) -> Self {
        Self {
            evaluator: Evaluator::default(),
            formatter,
        }
    }
}

impl<'a> Renderer<'a> {
    /// Report evaluation events to `observer` during rendering
    pub fn with_observer<'b>(self, observer: &'b dyn EvalObserver) -> Renderer<'b> {
        Renderer {
            evaluator: Evaluator::new(observer),
            formatter: self.formatter,
        }
    }

    pub fn render(&self, schema: &ResolvedSchema, ctx: &DataContext) -> Rendered {
        match schema.root() {
            Some(root) => self.render_node(root, ctx, None),
            None => Rendered::Absent,
        }
    }

    fn render_node(&self, node: &SchemaNode, ctx: &DataContext, item: Option<&Value>) -> Rendered {
        if !self.condition_holds(node, ctx, item) {
            return Rendered::Absent;
        }

        match &node.iterate {
            Some(iterate) => self.render_iteration(node, iterate, ctx),
            None => Rendered::Node(self.emit(node, ctx, item)),
        }
    }

    /// The source is read from the context only, never from an enclosing
    /// iteration element. Each element gets the node's condition checked
    /// again with the element bound.
    fn render_iteration(&self, node: &SchemaNode, iterate: &IterateSpec, ctx: &DataContext) -> Rendered {
        let Some(Value::Array(elements)) = ctx.lookup(&iterate.source) else {
            return Rendered::Absent;
        };

        let nodes = window(elements, iterate)
            .filter(|&element| self.condition_holds(node, ctx, Some(element)))
            .map(|element| self.emit(node, ctx, Some(element)))
            .collect();
        Rendered::Expanded(nodes)
    }

    fn condition_holds(&self, node: &SchemaNode, ctx: &DataContext, item: Option<&Value>) -> bool {
        node.condition
            .as_ref()
            .map_or(true, |c| self.evaluator.evaluate_condition(c, ctx, item))
    }

    fn emit(&self, node: &SchemaNode, ctx: &DataContext, item: Option<&Value>) -> OutputNode {
        let text = node.text.as_deref().map(|template| {
            let text = self.evaluator.interpolate(template, ctx, item);
            match &node.format {
                Some(spec) => self.formatter.format_value(&Value::String(text), spec),
                None => text,
            }
        });

        let mut children = Vec::with_capacity(node.children.len());
        for child in &node.children {
            children.extend(self.render_node(child, ctx, item).into_nodes());
        }

        OutputNode {
            tag: node.kind.clone(),
            class_name: node.class_name.clone(),
            resolved_style: self.evaluator.resolve_style(&node.style, ctx, item),
            text,
            children,
        }
    }
}

/// Elements selected by `limit` and `reverse`. With `reverse` the window
/// is the last `limit` elements, newest first.
fn window<'v>(elements: &'v [Value], iterate: &IterateSpec) -> Box<dyn Iterator<Item = &'v Value> + 'v> {
    let limit = iterate.limit.unwrap_or(elements.len());
    if iterate.reverse {
        Box::new(elements.iter().rev().take(limit))
    } else {
        Box::new(elements.iter().take(limit))
    }
}

/// Render with default formatting and no observer
pub fn render(schema: &ResolvedSchema, ctx: &DataContext) -> Rendered {
    Renderer::default().render(schema, ctx)
}
