//! Schema Store Abstraction
//!
//! Port through which the resolver fetches schema projects. The engine only
//! reads; projects are created and edited by the host.
//! Implementations: in-memory (hosts that already hold their projects, tests)
//! and a local directory of JSON/YAML documents.

use async_trait::async_trait;
use schema_types::SchemaProject;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Keyed lookup of schema projects
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Fetch the project stored under `widget_key`
    async fn get_schema_by_widget_key(
        &self,
        widget_key: &str,
    ) -> Result<Option<SchemaProject>, StoreError>;

    /// Fetch the project that declares an alias for `channel_key`
    async fn find_schema_by_channel_key(
        &self,
        channel_key: &str,
    ) -> Result<Option<SchemaProject>, StoreError>;

    /// Like `get_schema_by_widget_key`, but a missing project is an error
    async fn require_schema(&self, widget_key: &str) -> Result<SchemaProject, StoreError> {
        self.get_schema_by_widget_key(widget_key)
            .await?
            .ok_or_else(|| StoreError::NotFound(widget_key.to_string()))
    }
}

#[derive(Debug, Default)]
struct Projects {
    /// Insertion order decides channel ownership
    ordered: Vec<SchemaProject>,
    index: HashMap<String, usize>,
}

/// In-memory schema store
#[derive(Debug, Clone, Default)]
pub struct InMemorySchemaStore {
    projects: Arc<RwLock<Projects>>,
}

impl InMemorySchemaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_projects(projects: impl IntoIterator<Item = SchemaProject>) -> Self {
        let mut inner = Projects::default();
        for project in projects {
            Self::upsert(&mut inner, project);
        }
        Self {
            projects: Arc::new(RwLock::new(inner)),
        }
    }

    /// Insert or replace a project. A replaced project keeps its position.
    pub async fn insert(&self, project: SchemaProject) {
        let mut inner = self.projects.write().await;
        Self::upsert(&mut inner, project);
    }

    pub async fn len(&self) -> usize {
        self.projects.read().await.ordered.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn upsert(inner: &mut Projects, project: SchemaProject) {
        if let Some(&pos) = inner.index.get(&project.widget_key) {
            inner.ordered[pos] = project;
            return;
        }
        inner
            .index
            .insert(project.widget_key.clone(), inner.ordered.len());
        inner.ordered.push(project);
    }
}

#[async_trait]
impl SchemaStore for InMemorySchemaStore {
    async fn get_schema_by_widget_key(
        &self,
        widget_key: &str,
    ) -> Result<Option<SchemaProject>, StoreError> {
        let inner = self.projects.read().await;
        Ok(inner
            .index
            .get(widget_key)
            .map(|&pos| inner.ordered[pos].clone()))
    }

    async fn find_schema_by_channel_key(
        &self,
        channel_key: &str,
    ) -> Result<Option<SchemaProject>, StoreError> {
        let inner = self.projects.read().await;
        Ok(inner
            .ordered
            .iter()
            .find(|p| p.owns_channel(channel_key))
            .cloned())
    }
}

/// Local directory store: one `<widgetKey>.json`, `.yaml` or `.yml`
/// document per project.
pub struct FileSchemaStore {
    base_path: PathBuf,
}

const EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

impl FileSchemaStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    async fn read_project(&self, path: &Path) -> Result<SchemaProject, StoreError> {
        let content = tokio::fs::read_to_string(path).await?;
        parse_project(path, &content)
    }

    /// Document paths sorted by file name
    async fn document_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_document = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| EXTENSIONS.contains(&e))
                .unwrap_or(false);
            if is_document {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

/// Parse a project document, choosing the format by extension
pub fn parse_project(path: &Path, content: &str) -> Result<SchemaProject, StoreError> {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
    let parsed = if is_json {
        serde_json::from_str(content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| StoreError::Parse {
        path: path.display().to_string(),
        message,
    })
}

#[async_trait]
impl SchemaStore for FileSchemaStore {
    async fn get_schema_by_widget_key(
        &self,
        widget_key: &str,
    ) -> Result<Option<SchemaProject>, StoreError> {
        // keys map straight to file names; refuse anything path-like
        if widget_key.is_empty() || widget_key.contains(&['/', '\\'][..]) || widget_key.starts_with('.') {
            return Err(StoreError::Backend(format!(
                "invalid widget key for file store: {}",
                widget_key
            )));
        }

        for ext in EXTENSIONS {
            let path = self.base_path.join(format!("{}.{}", widget_key, ext));
            if tokio::fs::try_exists(&path).await? {
                return self.read_project(&path).await.map(Some);
            }
        }
        Ok(None)
    }

    async fn find_schema_by_channel_key(
        &self,
        channel_key: &str,
    ) -> Result<Option<SchemaProject>, StoreError> {
        for path in self.document_paths().await? {
            let project = self.read_project(&path).await?;
            if project.owns_channel(channel_key) {
                return Ok(Some(project));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema_types::SchemaNode;
    use tempfile::TempDir;

    fn project(key: &str) -> SchemaProject {
        SchemaProject::new(key, SchemaNode::new("div"))
    }

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let store = InMemorySchemaStore::from_projects([project("a"), project("b")]);

        let found = store.get_schema_by_widget_key("b").await.unwrap();
        assert_eq!(found.map(|p| p.widget_key), Some("b".to_string()));
        assert!(store.get_schema_by_widget_key("zzz").await.unwrap().is_none());
        assert!(matches!(
            store.require_schema("zzz").await,
            Err(StoreError::NotFound(key)) if key == "zzz"
        ));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_in_memory_channel_owner_is_first_declared() {
        let store = InMemorySchemaStore::new();
        store.insert(project("first").with_alias("prices", "px")).await;
        store.insert(project("second").with_alias("prices", "quotes")).await;

        let owner = store.find_schema_by_channel_key("prices").await.unwrap().unwrap();
        assert_eq!(owner.widget_key, "first");
        assert!(store.find_schema_by_channel_key("none").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_in_memory_replace_keeps_position() {
        let store = InMemorySchemaStore::from_projects([
            project("a").with_alias("c", "from_a"),
            project("b").with_alias("c", "from_b"),
        ]);
        store.insert(project("a").with_alias("c", "renamed")).await;

        let owner = store.find_schema_by_channel_key("c").await.unwrap().unwrap();
        assert_eq!(owner.alias_for("c"), Some("renamed"));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_file_store_reads_json_and_yaml() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("ticker.json"),
            r#"{ "widgetKey": "ticker", "schema": { "kind": "span", "text": "${btc.last}" },
                 "channelKeys": ["binance:btc"],
                 "channelAliases": [{ "channelKey": "binance:btc", "alias": "btc" }] }"#,
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("board.yaml"),
            "widgetKey: board\nschema:\n  kind: div\n  children:\n    - schemaRef: ticker\n",
        )
        .unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let store = FileSchemaStore::new(temp_dir.path());

        let ticker = store.get_schema_by_widget_key("ticker").await.unwrap().unwrap();
        assert_eq!(ticker.root.text.as_deref(), Some("${btc.last}"));

        let board = store.get_schema_by_widget_key("board").await.unwrap().unwrap();
        assert_eq!(board.root.referenced_keys(), vec!["ticker"]);

        let owner = store.find_schema_by_channel_key("binance:btc").await.unwrap().unwrap();
        assert_eq!(owner.widget_key, "ticker");

        assert!(store.get_schema_by_widget_key("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSchemaStore::new(temp_dir.path());
        let result = store.get_schema_by_widget_key("../etc/passwd").await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }

    #[tokio::test]
    async fn test_file_store_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("broken.json"), "{ not json").unwrap();
        let store = FileSchemaStore::new(temp_dir.path());

        let result = store.get_schema_by_widget_key("broken").await;
        assert!(matches!(result, Err(StoreError::Parse { .. })));
    }
}
