//! Explorer: node selection and on-demand child generation
//!
//! Wraps a [`NodeStore`] and a [`ChildGenerator`]. At most one generation
//! runs per node id at a time; a second request for the same id while one is
//! pending is reported as [`GenerationOutcome::Suppressed`] and does nothing.
//! Failures are logged and reported as [`GenerationOutcome::Failed`]; the
//! node is left untouched and no retry is attempted.

use super::cache::TreeError;
use super::models::{GenerationOutcome, Node, PageInfo, RowView};
use super::traits::NodeStore;
use crate::llm::traits::ChildGenerator;
use crate::llm::types::GenerateRequest;
use dashmap::DashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_CHILDREN_PER_PAGE: usize = 5;

/// Clears the in-flight entry and the loading counter when dropped, so both
/// are reset on success, failure and early return alike.
struct InFlightGuard<'a> {
    in_flight: &'a DashSet<String>,
    loading: &'a AtomicUsize,
    node_id: String,
}

impl<'a> InFlightGuard<'a> {
    /// Returns `None` if a generation for `node_id` is already running
    fn acquire(
        in_flight: &'a DashSet<String>,
        loading: &'a AtomicUsize,
        node_id: &str,
    ) -> Option<Self> {
        if !in_flight.insert(node_id.to_string()) {
            return None;
        }
        loading.fetch_add(1, Ordering::SeqCst);
        Some(Self {
            in_flight,
            loading,
            node_id: node_id.to_string(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.node_id);
        self.loading.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Snapshot of the explorer state for the graph view
#[derive(Debug, Clone, serde::Serialize)]
pub struct PathView {
    pub active_path: Vec<String>,
    pub rows: Vec<RowView>,
    pub is_loading: bool,
}

pub struct Explorer {
    store: Arc<dyn NodeStore>,
    generator: Arc<dyn ChildGenerator>,
    in_flight: DashSet<String>,
    loading: AtomicUsize,
    children_per_page: usize,
}

impl Explorer {
    pub fn new(
        store: Arc<dyn NodeStore>,
        generator: Arc<dyn ChildGenerator>,
        children_per_page: usize,
    ) -> Self {
        Self {
            store,
            generator,
            in_flight: DashSet::new(),
            loading: AtomicUsize::new(0),
            children_per_page: children_per_page.max(1),
        }
    }

    pub fn store(&self) -> &Arc<dyn NodeStore> {
        &self.store
    }

    /// True while any generation is pending
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0
    }

    pub fn is_in_flight(&self, node_id: &str) -> bool {
        self.in_flight.contains(node_id)
    }

    /// Select `node_id` at `depth`, generating its first page if it has none.
    ///
    /// A node that already has children is a cache hit: no request is made.
    pub async fn select_node(
        &self,
        node_id: &str,
        depth: usize,
    ) -> Result<GenerationOutcome, TreeError> {
        let node = self.store.select(node_id, depth).await?;
        debug!(node_id = %node_id, depth, "Node selected");
        if node.has_children() {
            return Ok(GenerationOutcome::CacheHit);
        }
        self.generate_for(node, None).await
    }

    /// Generate the first page of children for `node_id`.
    ///
    /// Returns `CacheHit` if the node already has children; use
    /// [`generate_more_children`](Self::generate_more_children) to add pages.
    pub async fn generate_children(&self, node_id: &str) -> Result<GenerationOutcome, TreeError> {
        let node = self
            .store
            .get(node_id)
            .await
            .ok_or_else(|| TreeError::NodeNotFound(node_id.to_string()))?;
        if node.has_children() {
            return Ok(GenerationOutcome::CacheHit);
        }
        self.generate_for(node, None).await
    }

    /// Generate another page for `node_id`, excluding every title already
    /// generated, and move the page cursor to the new page.
    ///
    /// Fails with [`TreeError::PageLimitReached`] before any request is made
    /// when the node already has the maximum number of pages.
    pub async fn generate_more_children(
        &self,
        node_id: &str,
    ) -> Result<GenerationOutcome, TreeError> {
        let node = self
            .store
            .get(node_id)
            .await
            .ok_or_else(|| TreeError::NodeNotFound(node_id.to_string()))?;

        let max = self.store.max_pages_per_node();
        if node.page_count() >= max {
            return Err(TreeError::PageLimitReached {
                node_id: node_id.to_string(),
                max,
            });
        }

        let exclude = self.store.child_titles(node_id).await?;
        let outcome = self.generate_for(node, Some(exclude)).await?;
        if let GenerationOutcome::Generated { page_index, .. } = &outcome {
            self.store.set_page(node_id, *page_index).await?;
        }
        Ok(outcome)
    }

    async fn generate_for(
        &self,
        node: Node,
        exclude_titles: Option<Vec<String>>,
    ) -> Result<GenerationOutcome, TreeError> {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &self.loading, &node.id) else {
            debug!(node_id = %node.id, "Generation already in flight, skipping");
            return Ok(GenerationOutcome::Suppressed);
        };

        // The node may have been filled while we waited for the guard
        let node = if exclude_titles.is_none() {
            let current = self
                .store
                .get(&node.id)
                .await
                .ok_or_else(|| TreeError::NodeNotFound(node.id.clone()))?;
            if current.has_children() {
                debug!(node_id = %current.id, "Children appeared before generation, cache hit");
                return Ok(GenerationOutcome::CacheHit);
            }
            current
        } else {
            node
        };

        let node_id = node.id.clone();
        let request = GenerateRequest {
            parent_node: node,
            path_history: self.store.path_titles().await,
            exclude_titles,
        };

        info!(
            node_id = %node_id,
            path = ?request.path_history,
            excluded = request.exclude_titles.as_ref().map_or(0, Vec::len),
            "Generating children"
        );

        let mut children = match self.generator.generate(&request).await {
            Ok(children) => children,
            Err(e) => {
                warn!(node_id = %node_id, error = %e, "Generation failed");
                return Ok(GenerationOutcome::Failed {
                    reason: e.to_string(),
                });
            }
        };

        if children.is_empty() {
            warn!(node_id = %node_id, "Generator returned no children");
            return Ok(GenerationOutcome::Failed {
                reason: "no children generated".to_string(),
            });
        }
        children.truncate(self.children_per_page);

        let (page_index, child_ids) = self.store.append_page(&node_id, children).await?;
        info!(
            node_id = %node_id,
            page = page_index,
            count = child_ids.len(),
            "Stored generated page"
        );
        Ok(GenerationOutcome::Generated {
            page_index,
            child_ids,
        })
    }

    // ========================================================================
    // Read-through helpers
    // ========================================================================

    pub async fn page_info(&self, node_id: &str) -> Result<PageInfo, TreeError> {
        self.store.page_info(node_id).await
    }

    /// Move the page cursor. Only navigates; never generates.
    pub async fn set_page(&self, node_id: &str, page: usize) -> Result<PageInfo, TreeError> {
        self.store.set_page(node_id, page).await
    }

    pub async fn path_view(&self) -> PathView {
        PathView {
            active_path: self.store.active_path().await,
            rows: self.store.rows().await,
            is_loading: self.is_loading(),
        }
    }
}
