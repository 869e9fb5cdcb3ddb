//! NodeStore trait definition
//!
//! Abstract interface over the knowledge-tree cache. Every mutation is a
//! single call so implementations can apply it atomically; the explorer and
//! the chat manager only ever hold an `Arc<dyn NodeStore>`.

use super::cache::TreeError;
use super::models::{Node, PageInfo, RowView};
use crate::llm::types::ChildSpec;
use async_trait::async_trait;

#[async_trait]
pub trait NodeStore: Send + Sync {
    // ========================================================================
    // Reads
    // ========================================================================

    /// Root nodes in seed order
    async fn roots(&self) -> Vec<Node>;

    /// Get a node by id
    async fn get(&self, id: &str) -> Option<Node>;

    /// Children on the node's current page
    async fn visible_children(&self, id: &str) -> Result<Vec<Node>, TreeError>;

    /// Pagination summary for a node
    async fn page_info(&self, id: &str) -> Result<PageInfo, TreeError>;

    /// Titles of every child across all pages
    async fn child_titles(&self, id: &str) -> Result<Vec<String>, TreeError>;

    /// Ids on the active path, root first
    async fn active_path(&self) -> Vec<String>;

    /// Titles on the active path, root first
    async fn path_titles(&self) -> Vec<String>;

    /// Titles of the active-path entries before `id`
    async fn ancestry_titles(&self, id: &str) -> Vec<String>;

    /// Graph view rows derived from the active path
    async fn rows(&self) -> Vec<RowView>;

    /// Configured page cap
    fn max_pages_per_node(&self) -> usize;

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Truncate the active path to `depth` and push `id`
    async fn select(&self, id: &str, depth: usize) -> Result<Node, TreeError>;

    /// Move a node's page cursor (0-indexed)
    async fn set_page(&self, id: &str, page: usize) -> Result<PageInfo, TreeError>;

    /// Store `children` as a new page of `parent_id`.
    ///
    /// Returns the new page index and child ids in the given order.
    async fn append_page(
        &self,
        parent_id: &str,
        children: Vec<ChildSpec>,
    ) -> Result<(usize, Vec<String>), TreeError>;
}
