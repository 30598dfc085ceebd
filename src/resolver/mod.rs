//! Schema resolver
//!
//! Inlines nested schema references and discovers the channels a schema
//! transitively needs. Resolution runs once per schema version; its result
//! is cached by the caller and fed into every render pass.
//!
//! Cycle protection uses an explicit [`ResolutionPath`]: the widget keys
//! currently being expanded on the way from the root to the node at hand.
//! A reference to a key already on the path is not followed, so resolution
//! always terminates. References that cannot be followed (cyclic, missing,
//! too deep, store failure) are omitted from the resolved tree.

mod channels;

use futures::future::{join_all, BoxFuture, FutureExt};
use schema_types::{RequiredChannel, SchemaNode, SchemaProject};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::error::{EngineError, Result};
use crate::observer::{EvalObserver, NoopObserver, SkipReason};
use crate::store::SchemaStore;

// ============================================================================
// RESOLUTION ARTIFACTS
// ============================================================================

/// A schema tree in which every reference has been inlined or dropped.
///
/// Empty when the schema itself was a reference that could not be followed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedSchema(Option<SchemaNode>);

impl ResolvedSchema {
    pub fn root(&self) -> Option<&SchemaNode> {
        self.0.as_ref()
    }

    pub fn into_root(self) -> Option<SchemaNode> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    /// Smallest advisory refresh interval anywhere in the tree
    pub fn refresh_hint_ms(&self) -> Option<u64> {
        let mut hint: Option<u64> = None;
        self.0.as_ref()?.walk(&mut |node| {
            if let Some(ms) = node.refresh_hint_ms {
                hint = Some(hint.map_or(ms, |h| h.min(ms)));
            }
        });
        hint
    }
}

/// Both resolution artifacts for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub schema: ResolvedSchema,
    pub channels: Vec<RequiredChannel>,
}

// ============================================================================
// PATH AND CANCELLATION
// ============================================================================

/// Widget keys being expanded from the root down to the current node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionPath {
    keys: Vec<String>,
}

impl ResolutionPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path seeded with the widget being resolved
    pub fn starting_at(widget_key: impl Into<String>) -> Self {
        Self {
            keys: vec![widget_key.into()],
        }
    }

    pub fn contains(&self, widget_key: &str) -> bool {
        self.keys.iter().any(|k| k == widget_key)
    }

    pub fn depth(&self) -> usize {
        self.keys.len()
    }

    /// This path with `widget_key` appended; `self` is unchanged
    pub fn extended(&self, widget_key: &str) -> Self {
        let mut keys = self.keys.clone();
        keys.push(widget_key.to_string());
        Self { keys }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl std::fmt::Display for ResolutionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.keys.join(" -> "))
    }
}

/// Cooperative cancellation for an in-flight resolution.
///
/// Store fetches already issued run to completion; their results are
/// discarded once the flag is set.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Outcome of looking up a referenced widget. The skip reason has already
/// been reported to the observer.
enum Lookup {
    Found(SchemaProject),
    Skipped,
}

pub struct SchemaResolver {
    store: Arc<dyn SchemaStore>,
    config: ResolverConfig,
    observer: Arc<dyn EvalObserver>,
}

impl SchemaResolver {
    pub fn new(store: Arc<dyn SchemaStore>) -> Self {
        Self {
            store,
            config: ResolverConfig::default(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn from_store(store: impl SchemaStore + 'static) -> Self {
        Self::new(Arc::new(store))
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn EvalObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Inline every schema reference under `schema`.
    pub async fn resolve_schema_refs(&self, schema: &SchemaNode) -> ResolvedSchema {
        // a fresh flag is never set, so resolution cannot fail
        self.resolve_schema_refs_with_cancel(schema, &CancelFlag::new())
            .await
            .unwrap_or(ResolvedSchema(None))
    }

    pub async fn resolve_schema_refs_with_cancel(
        &self,
        schema: &SchemaNode,
        cancel: &CancelFlag,
    ) -> Result<ResolvedSchema> {
        let root = self
            .resolve_node(schema, &ResolutionPath::new(), cancel)
            .await?;
        cancel.check()?;
        Ok(ResolvedSchema(root))
    }

    /// Fetch `widget_key` from the store and resolve it.
    ///
    /// Unlike references inside a tree, a missing top-level project is an
    /// error.
    pub async fn resolve_widget(&self, widget_key: &str, cancel: &CancelFlag) -> Result<Resolution> {
        let project = self.store.require_schema(widget_key).await?;
        self.resolve_project(&project, cancel).await
    }

    /// Resolve a project's tree and its required channels.
    ///
    /// The project's own widget key seeds the path, so a project that
    /// references itself is caught at the first repetition.
    pub async fn resolve_project(
        &self,
        project: &SchemaProject,
        cancel: &CancelFlag,
    ) -> Result<Resolution> {
        let path = ResolutionPath::starting_at(project.widget_key.clone());
        let (root, channels) = futures::try_join!(
            self.resolve_node(&project.root, &path, cancel),
            self.collect_channels(project, &path, cancel),
        )?;
        cancel.check()?;

        debug!(
            widget_key = %project.widget_key,
            channels = channels.len(),
            "schema project resolved"
        );
        Ok(Resolution {
            schema: ResolvedSchema(root),
            channels,
        })
    }

    fn resolve_node<'a>(
        &'a self,
        node: &'a SchemaNode,
        path: &'a ResolutionPath,
        cancel: &'a CancelFlag,
    ) -> BoxFuture<'a, Result<Option<SchemaNode>>> {
        async move {
            cancel.check()?;

            if let Some(widget_key) = node.schema_ref.as_deref() {
                return self.expand_reference(node, widget_key, path, cancel).await;
            }

            let children = self.resolve_children(&node.children, path, cancel).await?;
            let mut resolved = without_children(node);
            resolved.children = children;
            Ok(Some(resolved))
        }
        .boxed()
    }

    async fn resolve_children(
        &self,
        children: &[SchemaNode],
        path: &ResolutionPath,
        cancel: &CancelFlag,
    ) -> Result<Vec<SchemaNode>> {
        if self.config.parallel_siblings && children.len() > 1 {
            // join_all yields results in input order
            join_all(children.iter().map(|c| self.resolve_node(c, path, cancel)))
                .await
                .into_iter()
                .filter_map(Result::transpose)
                .collect()
        } else {
            let mut resolved = Vec::with_capacity(children.len());
            for child in children {
                if let Some(child) = self.resolve_node(child, path, cancel).await? {
                    resolved.push(child);
                }
            }
            Ok(resolved)
        }
    }

    async fn expand_reference(
        &self,
        node: &SchemaNode,
        widget_key: &str,
        path: &ResolutionPath,
        cancel: &CancelFlag,
    ) -> Result<Option<SchemaNode>> {
        let Lookup::Found(project) = self.lookup_reference(widget_key, path).await else {
            return Ok(None);
        };
        cancel.check()?;

        let inner_path = path.extended(widget_key);
        let resolved = self.resolve_node(&project.root, &inner_path, cancel).await?;
        cancel.check()?;
        let Some(mut root) = resolved else {
            return Ok(None);
        };

        // directives at the reference site win over the referenced root's
        if node.condition.is_some() {
            root.condition = node.condition.clone();
        }
        if node.iterate.is_some() {
            root.iterate = node.iterate.clone();
        }

        debug!(widget_key, depth = inner_path.depth(), "schema reference inlined");
        Ok(Some(root))
    }

    /// Fetch a referenced project unless the path forbids following it.
    async fn lookup_reference(&self, widget_key: &str, path: &ResolutionPath) -> Lookup {
        let reason = if path.contains(widget_key) {
            warn!(widget_key, path = %path, "cyclic schema reference left unexpanded");
            SkipReason::Cyclic
        } else if path.depth() >= self.config.max_depth {
            warn!(
                widget_key,
                max_depth = self.config.max_depth,
                "schema reference exceeds maximum depth"
            );
            SkipReason::DepthExceeded
        } else {
            match self.store.get_schema_by_widget_key(widget_key).await {
                Ok(Some(project)) => return Lookup::Found(project),
                Ok(None) => {
                    debug!(widget_key, "referenced schema not found");
                    SkipReason::Missing
                }
                Err(e) => {
                    warn!(widget_key, error = %e, "schema store lookup failed");
                    SkipReason::StoreError
                }
            }
        };

        self.observer.reference_skipped(widget_key, reason);
        Lookup::Skipped
    }
}

/// Copy of `node` without its children (avoids cloning a subtree that is
/// about to be replaced).
fn without_children(node: &SchemaNode) -> SchemaNode {
    SchemaNode {
        kind: node.kind.clone(),
        class_name: node.class_name.clone(),
        style: node.style.clone(),
        children: Vec::new(),
        text: node.text.clone(),
        format: node.format.clone(),
        condition: node.condition.clone(),
        iterate: node.iterate.clone(),
        refresh_hint_ms: node.refresh_hint_ms,
        schema_ref: node.schema_ref.clone(),
    }
}
