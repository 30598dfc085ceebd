//! Data context
//!
//! The merged view of channel payloads handed to a render pass: each
//! payload sits under its alias, and the widget's own payload under the
//! reserved alias `self`.

use schema_types::RequiredChannel;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::path::get_value_normalized;

/// Reserved alias for the rendering widget's own payload
pub const SELF_ALIAS: &str = "self";

#[derive(Debug, Clone, PartialEq)]
pub struct DataContext {
    root: Value,
}

impl Default for DataContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DataContext {
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Build the context for one render pass.
    ///
    /// Channels without a payload are left out; lookups through their alias
    /// simply resolve to nothing.
    pub fn from_channels(
        required: &[RequiredChannel],
        payloads: &HashMap<String, Value>,
        self_payload: Option<Value>,
    ) -> Self {
        let mut ctx = Self::new();
        for channel in required {
            if let Some(payload) = payloads.get(&channel.channel_key) {
                ctx.insert(channel.alias.clone(), payload.clone());
            }
        }
        if let Some(payload) = self_payload {
            ctx.insert(SELF_ALIAS, payload);
        }
        ctx
    }

    pub fn insert(&mut self, alias: impl Into<String>, payload: Value) {
        if let Value::Object(map) = &mut self.root {
            map.insert(alias.into(), payload);
        }
    }

    pub fn with(mut self, alias: impl Into<String>, payload: Value) -> Self {
        self.insert(alias, payload);
        self
    }

    pub fn with_self(self, payload: Value) -> Self {
        self.with(SELF_ALIAS, payload)
    }

    /// Payload stored under `alias`
    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.root.get(alias)
    }

    /// Resolve a dotted/bracketed path against the whole context
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        get_value_normalized(&self.root, path)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.root
            .as_object()
            .into_iter()
            .flat_map(|map| map.keys().map(String::as_str))
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }
}

/// Objects become the context as-is; any other value yields an empty context.
impl From<Value> for DataContext {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(_) => Self { root: value },
            _ => Self::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_channels_uses_aliases() {
        let required = vec![
            RequiredChannel::new("binance:btcusdt", "btc"),
            RequiredChannel::new("session", "session"),
            RequiredChannel::new("offline", "offline"),
        ];
        let mut payloads = HashMap::new();
        payloads.insert("binance:btcusdt".to_string(), json!({ "last": 64000 }));
        payloads.insert("session".to_string(), json!({ "user": "ada" }));

        let ctx = DataContext::from_channels(&required, &payloads, Some(json!({ "title": "x" })));

        assert_eq!(ctx.lookup("btc.last"), Some(&json!(64000)));
        assert_eq!(ctx.lookup("session.user"), Some(&json!("ada")));
        assert_eq!(ctx.lookup("self.title"), Some(&json!("x")));
        assert_eq!(ctx.get("offline"), None);
        assert_eq!(ctx.aliases().count(), 3);
    }

    #[test]
    fn test_from_value() {
        let ctx = DataContext::from(json!({ "a": { "b": [10, 20] } }));
        assert_eq!(ctx.lookup("a.b[1]"), Some(&json!(20)));

        let empty = DataContext::from(json!([1, 2, 3]));
        assert_eq!(empty.as_value(), &json!({}));
    }
}
