//! Schema Types - Foundation data structures for declarative widget schemas
//!
//! This crate contains the pure data structures exchanged between schema
//! authors, the schema store, the engine and the host renderer. Schema
//! documents are plain nested JSON/YAML trees with camelCase keys.
//!
//! ## Contents
//!
//! - `SchemaNode` - one node of a declarative UI tree
//! - `StyleValue` - literal, conditional or calculated style property
//! - `Condition`, `FormatSpec`, `IterateSpec` - per-node directives
//! - `SchemaProject` - a storable schema definition keyed by widget key
//! - `RequiredChannel` - a (channel key, alias) pair discovered by resolution
//! - `OutputNode` - the host-agnostic result of a render pass
//!
//! ## Rules
//!
//! 1. **NO EVALUATION** - Only data structures, constructors and accessors
//! 2. **SERIALIZABLE** - All types round-trip through serde
//! 3. **HOST AGNOSTIC** - `kind`/`tag` are opaque strings, mapped by the host

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============================================================================
// NODE DIRECTIVES
// ============================================================================

/// Comparison operator of a [`Condition`].
///
/// `==` and `===` are both strict equality. Anything unrecognised
/// deserializes to [`ConditionOperator::Unknown`], which never matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = "==", alias = "===")]
    Equal,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(other)]
    Unknown,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::GreaterThan => ">",
            Self::LessThan => "<",
            Self::GreaterOrEqual => ">=",
            Self::LessOrEqual => "<=",
            Self::Unknown => "?",
        }
    }
}

/// Visibility condition: `key` is a data path (optionally `$item`-prefixed),
/// `value` is the literal right operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub key: String,
    pub operator: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(key: impl Into<String>, operator: ConditionOperator, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            operator,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.key, self.operator.as_str(), self.value)
    }
}

/// How a text result is turned into display text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// Fixed-point number
    Number,
    /// Abbreviated magnitude (K/M/B)
    Volume,
    /// Date and time from epoch milliseconds
    Datetime,
    /// Time of day from epoch milliseconds
    Time,
    /// Unrecognised kind: the raw value passes through as text
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub kind: FormatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u32>,
}

impl FormatSpec {
    pub fn new(kind: FormatKind) -> Self {
        Self {
            kind,
            decimals: None,
        }
    }

    pub fn with_decimals(kind: FormatKind, decimals: u32) -> Self {
        Self {
            kind,
            decimals: Some(decimals),
        }
    }
}

/// Repeat a node once per element of the array found at `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterateSpec {
    /// Data path, always resolved against the top-level data context
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reverse: bool,
}

impl IterateSpec {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            limit: None,
            reverse: false,
        }
    }
}

// ============================================================================
// STYLE
// ============================================================================

/// Branch-selecting style value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalStyle {
    pub condition: Condition,
    #[serde(default)]
    pub when_true: Value,
    #[serde(default)]
    pub when_false: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculateKind {
    /// `(value / max) * 100` rendered as a two-decimal percentage
    Percentage,
    #[serde(other)]
    Unsupported,
}

/// Computed style value. `value` and `max` are template strings
/// (`"${a.b}"`) or plain numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatedStyle {
    pub calculate: CalculateKind,
    pub value: Value,
    pub max: Value,
}

/// A style property as written in a schema document.
///
/// Untagged: objects carrying `condition` are conditional, objects carrying
/// `calculate` are calculated, everything else is a literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StyleValue {
    Conditional(ConditionalStyle),
    Calculated(CalculatedStyle),
    Literal(Value),
}

impl From<&str> for StyleValue {
    fn from(value: &str) -> Self {
        StyleValue::Literal(Value::String(value.to_string()))
    }
}

impl From<Value> for StyleValue {
    fn from(value: Value) -> Self {
        StyleValue::Literal(value)
    }
}

// ============================================================================
// SCHEMA TREE
// ============================================================================

/// One node of a declarative UI tree.
///
/// A node whose `schema_ref` is set stands in for another widget's schema
/// and is replaced during resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, StyleValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SchemaNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<FormatSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterate: Option<IterateSpec>,
    /// Advisory refresh interval for the host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_hint_ms: Option<u64>,
    /// Widget key of the schema this node stands in for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_ref: Option<String>,
}

impl SchemaNode {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Default::default()
        }
    }

    /// A node standing in for the schema stored under `widget_key`
    pub fn reference(widget_key: impl Into<String>) -> Self {
        Self {
            kind: "ref".to_string(),
            schema_ref: Some(widget_key.into()),
            ..Default::default()
        }
    }

    pub fn is_reference(&self) -> bool {
        self.schema_ref.is_some()
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_format(mut self, format: FormatSpec) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<StyleValue>) -> Self {
        self.style.insert(property.into(), value.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_iterate(mut self, iterate: IterateSpec) -> Self {
        self.iterate = Some(iterate);
        self
    }

    pub fn with_child(mut self, child: SchemaNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = SchemaNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Depth-first pre-order visit of this node and all descendants
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SchemaNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Widget keys referenced anywhere in this tree, in visit order
    pub fn referenced_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.walk(&mut |node| {
            if let Some(key) = node.schema_ref.as_deref() {
                keys.push(key);
            }
        });
        keys
    }
}

// ============================================================================
// PROJECTS AND CHANNELS
// ============================================================================

/// Channel ownership declaration: payloads of `channel_key` appear under `alias`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAlias {
    pub channel_key: String,
    pub alias: String,
}

impl ChannelAlias {
    pub fn new(channel_key: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            channel_key: channel_key.into(),
            alias: alias.into(),
        }
    }
}

/// A named, storable schema definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaProject {
    pub widget_key: String,
    #[serde(rename = "schema")]
    pub root: SchemaNode,
    /// Channels this schema reads directly
    #[serde(default)]
    pub channel_keys: Vec<String>,
    /// Channels this schema owns, with the alias they are exposed under
    #[serde(default)]
    pub channel_aliases: Vec<ChannelAlias>,
}

impl SchemaProject {
    pub fn new(widget_key: impl Into<String>, root: SchemaNode) -> Self {
        Self {
            widget_key: widget_key.into(),
            root,
            channel_keys: Vec::new(),
            channel_aliases: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel_key: impl Into<String>) -> Self {
        self.channel_keys.push(channel_key.into());
        self
    }

    pub fn with_alias(mut self, channel_key: impl Into<String>, alias: impl Into<String>) -> Self {
        self.channel_aliases.push(ChannelAlias::new(channel_key, alias));
        self
    }

    /// Alias this project declares for `channel_key`, if it owns it
    pub fn alias_for(&self, channel_key: &str) -> Option<&str> {
        self.channel_aliases
            .iter()
            .find(|a| a.channel_key == channel_key)
            .map(|a| a.alias.as_str())
    }

    pub fn owns_channel(&self, channel_key: &str) -> bool {
        self.alias_for(channel_key).is_some()
    }
}

/// A channel discovered during resolution and the alias the renderer
/// looks its payload up under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredChannel {
    pub channel_key: String,
    pub alias: String,
}

impl RequiredChannel {
    pub fn new(channel_key: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            channel_key: channel_key.into(),
            alias: alias.into(),
        }
    }
}

// ============================================================================
// RENDER OUTPUT
// ============================================================================

/// Concrete node produced by a render pass. The host maps `tag` onto its
/// own primitives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputNode {
    pub tag: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class_name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resolved_style: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutputNode>,
}

impl OutputNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Concatenated text of this node and its descendants, depth-first
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        for child in &self.children {
            child.collect_text(out);
        }
    }
}
