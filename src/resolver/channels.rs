//! Required channel discovery
//!
//! Walks a project and every project it references, collecting the channel
//! keys each one declares. Each key is then paired with the alias chosen by
//! the project that owns it.

use futures::future::{BoxFuture, FutureExt};
use schema_types::{RequiredChannel, SchemaProject};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::{CancelFlag, Lookup, ResolutionPath, SchemaResolver};
use crate::error::Result;

/// Channel keys in first-discovered order, without duplicates.
#[derive(Debug, Default)]
struct DiscoveredKeys {
    ordered: Vec<String>,
    seen: HashSet<String>,
}

impl DiscoveredKeys {
    fn add(&mut self, channel_key: &str) {
        if self.seen.insert(channel_key.to_string()) {
            self.ordered.push(channel_key.to_string());
        }
    }
}

impl SchemaResolver {
    /// Channels `project` needs, directly or through its references.
    ///
    /// Deduplicated by channel key; the first occurrence decides the
    /// position in the list.
    pub async fn collect_required_channels(&self, project: &SchemaProject) -> Vec<RequiredChannel> {
        let path = ResolutionPath::starting_at(project.widget_key.clone());
        // a fresh flag is never set
        self.collect_channels(project, &path, &CancelFlag::new())
            .await
            .unwrap_or_default()
    }

    pub(super) async fn collect_channels(
        &self,
        project: &SchemaProject,
        path: &ResolutionPath,
        cancel: &CancelFlag,
    ) -> Result<Vec<RequiredChannel>> {
        let mut keys = DiscoveredKeys::default();
        self.discover(project, path, cancel, &mut keys).await?;

        let mut channels = Vec::with_capacity(keys.ordered.len());
        for channel_key in keys.ordered {
            cancel.check()?;
            let alias = self.owning_alias(&channel_key).await;
            // an owner fetched after cancellation is discarded
            cancel.check()?;
            channels.push(RequiredChannel::new(channel_key, alias));
        }
        Ok(channels)
    }

    /// Depth-first, in declaration order: the project's own keys, then
    /// each referenced project in tree order.
    fn discover<'a>(
        &'a self,
        project: &'a SchemaProject,
        path: &'a ResolutionPath,
        cancel: &'a CancelFlag,
        keys: &'a mut DiscoveredKeys,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            cancel.check()?;
            for channel_key in &project.channel_keys {
                keys.add(channel_key);
            }

            for widget_key in project.root.referenced_keys() {
                let referenced = match self.lookup_reference(widget_key, path).await {
                    Lookup::Found(referenced) => referenced,
                    Lookup::Skipped => continue,
                };
                let inner_path = path.extended(widget_key);
                self.discover(&referenced, &inner_path, cancel, keys).await?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Alias declared by the channel's owner, or the channel key itself.
    async fn owning_alias(&self, channel_key: &str) -> String {
        match self.store.find_schema_by_channel_key(channel_key).await {
            Ok(Some(owner)) => {
                if let Some(alias) = owner.alias_for(channel_key) {
                    return alias.to_string();
                }
            }
            Ok(None) => debug!(channel_key, "no owner declares an alias"),
            Err(e) => warn!(channel_key, error = %e, "channel owner lookup failed"),
        }
        channel_key.to_string()
    }
}
