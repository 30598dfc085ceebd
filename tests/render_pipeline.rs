//! End-to-end: schema documents on disk -> resolution -> data context -> output tree

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

use widget_schema::schema_types::{OutputNode, RequiredChannel, SchemaNode, SchemaProject};
use widget_schema::{
    render, CancelFlag, DataContext, EngineError, FileSchemaStore, InMemorySchemaStore, Rendered,
    SchemaResolver, SchemaStore,
};

const TICKER: &str = r#"
widgetKey: ticker
channelKeys: ["binance:btcusdt"]
channelAliases:
  - channelKey: "binance:btcusdt"
    alias: btc
schema:
  kind: span
  className: price
  text: "${btc.last}"
  format: { kind: number, decimals: 2 }
  refreshHintMs: 500
"#;

const TRADES: &str = r#"{
  "widgetKey": "trades",
  "channelKeys": ["binance:trades", "binance:btcusdt"],
  "channelAliases": [{ "channelKey": "binance:trades", "alias": "fills" }],
  "schema": {
    "kind": "ul",
    "children": [{
      "kind": "li",
      "iterate": { "source": "fills", "limit": 2, "reverse": true },
      "text": "${$item.price * $item.qty}",
      "style": {
        "color": {
          "condition": { "key": "$item.side", "operator": "===", "value": "buy" },
          "whenTrue": "green",
          "whenFalse": "red"
        }
      }
    }]
  }
}"#;

const BOARD: &str = r#"
widgetKey: board
channelKeys: [session]
schema:
  kind: div
  className: board
  children:
    - schemaRef: ticker
    - schemaRef: trades
    - schemaRef: board
    - schemaRef: ghost
    - kind: footer
      condition: { key: self.showFooter, operator: "==", value: true }
      text: "${session.user}"
      style:
        width: { calculate: percentage, value: "${self.used}", max: "${self.quota}" }
"#;

fn write_store() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("ticker.yaml"), TICKER).unwrap();
    std::fs::write(dir.path().join("trades.json"), TRADES).unwrap();
    std::fs::write(dir.path().join("board.yml"), BOARD).unwrap();
    dir
}

fn payloads() -> HashMap<String, Value> {
    let mut payloads = HashMap::new();
    payloads.insert("binance:btcusdt".to_string(), json!({ "last": "64012.5" }));
    payloads.insert(
        "binance:trades".to_string(),
        json!([
            { "price": 10, "qty": 1, "side": "buy" },
            { "price": 20, "qty": 2, "side": "sell" },
            { "price": 30, "qty": 3, "side": "buy" }
        ]),
    );
    payloads.insert("session".to_string(), json!({ "user": "ada" }));
    payloads
}

fn li(text: &str, color: &str) -> OutputNode {
    let mut node = OutputNode::new("li");
    node.text = Some(text.to_string());
    node.resolved_style.insert("color".to_string(), json!(color));
    node
}

#[tokio::test]
async fn test_file_store_pipeline() {
    let dir = write_store();
    let store = Arc::new(FileSchemaStore::new(dir.path()));
    let resolver = SchemaResolver::new(store.clone());

    let board = store
        .get_schema_by_widget_key("board")
        .await
        .unwrap()
        .unwrap();
    let resolution = resolver
        .resolve_project(&board, &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(
        resolution.channels,
        vec![
            RequiredChannel::new("session", "session"),
            RequiredChannel::new("binance:btcusdt", "btc"),
            RequiredChannel::new("binance:trades", "fills"),
        ]
    );
    assert_eq!(resolution.schema.refresh_hint_ms(), Some(500));
    assert!(resolution.schema.root().unwrap().referenced_keys().is_empty());

    let ctx = DataContext::from_channels(
        &resolution.channels,
        &payloads(),
        Some(json!({ "showFooter": true, "used": 3, "quota": 4 })),
    );
    let Rendered::Node(root) = render(&resolution.schema, &ctx) else {
        panic!("board should render as a single node");
    };

    let mut price = OutputNode::new("span");
    price.class_name = "price".to_string();
    price.text = Some("64012.50".to_string());

    let mut list = OutputNode::new("ul");
    list.children = vec![li("90", "green"), li("40", "red")];

    let mut footer = OutputNode::new("footer");
    footer.text = Some("ada".to_string());
    footer.resolved_style.insert("width".to_string(), json!("75.00%"));

    let mut expected = OutputNode::new("div");
    expected.class_name = "board".to_string();
    // the self reference and the missing widget are dropped
    expected.children = vec![price, list, footer];

    assert_eq!(root, expected);
}

#[tokio::test]
async fn test_render_tracks_data_changes() {
    let dir = write_store();
    let store = FileSchemaStore::new(dir.path());
    let resolver = SchemaResolver::from_store(store);

    let project = SchemaProject::new("wrapper", SchemaNode::reference("ticker"));
    let resolution = resolver
        .resolve_project(&project, &CancelFlag::new())
        .await
        .unwrap();

    let mut payloads = payloads();
    let first = DataContext::from_channels(&resolution.channels, &payloads, None);
    payloads.insert("binance:btcusdt".to_string(), json!({ "last": 1 }));
    let second = DataContext::from_channels(&resolution.channels, &payloads, None);

    let text = |ctx: &DataContext| {
        render(&resolution.schema, ctx)
            .into_nodes()
            .iter()
            .map(OutputNode::text_content)
            .collect::<String>()
    };
    assert_eq!(text(&first), "64012.50");
    assert_eq!(text(&second), "1.00");
}

#[tokio::test]
async fn test_hidden_footer_and_missing_channels() {
    let dir = write_store();
    let resolver = SchemaResolver::from_store(FileSchemaStore::new(dir.path()));
    let board: SchemaProject = serde_yaml::from_str(BOARD).unwrap();

    let resolved = resolver.resolve_schema_refs(&board.root).await;
    let ctx = DataContext::new().with_self(json!({ "showFooter": false }));
    let root = render(&resolved, &ctx).into_nodes().remove(0);

    let tags: Vec<_> = root.children.iter().map(|c| c.tag.as_str()).collect();
    // no trades payload: the iterated list item disappears, the footer is hidden
    assert_eq!(tags, vec!["span", "ul", "div"]);
    assert!(root.children[1].children.is_empty());
    assert_eq!(root.children[0].text.as_deref(), Some(""));
    assert!(all_tagged(&root));
}

fn all_tagged(node: &OutputNode) -> bool {
    !node.tag.is_empty() && node.children.iter().all(all_tagged)
}

#[tokio::test]
async fn test_cancelled_project_resolution() {
    let store = InMemorySchemaStore::from_projects([SchemaProject::new(
        "a",
        SchemaNode::new("div").with_child(SchemaNode::reference("a")),
    )]);
    let resolver = SchemaResolver::from_store(store);
    let cancel = CancelFlag::new();
    cancel.cancel();

    let project = SchemaProject::new("a", SchemaNode::reference("a"));
    let err = resolver.resolve_project(&project, &cancel).await.unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert_eq!(err.code(), "CANCELLED");
}
