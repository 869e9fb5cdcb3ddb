//! In-memory NodeStore backed by a `tokio::sync::RwLock<NodeCache>`

use super::cache::{NodeCache, TreeError};
use super::models::{Node, PageInfo, RowView};
use super::traits::NodeStore;
use crate::llm::types::ChildSpec;
use async_trait::async_trait;
use tokio::sync::RwLock;

pub struct InMemoryNodeStore {
    cache: RwLock<NodeCache>,
    max_pages_per_node: usize,
}

impl InMemoryNodeStore {
    pub fn new(cache: NodeCache) -> Self {
        let max_pages_per_node = cache.max_pages_per_node();
        Self {
            cache: RwLock::new(cache),
            max_pages_per_node,
        }
    }

    /// Number of nodes currently cached
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

#[async_trait]
impl NodeStore for InMemoryNodeStore {
    async fn roots(&self) -> Vec<Node> {
        self.cache.read().await.roots()
    }

    async fn get(&self, id: &str) -> Option<Node> {
        self.cache.read().await.get(id).cloned()
    }

    async fn visible_children(&self, id: &str) -> Result<Vec<Node>, TreeError> {
        self.cache.read().await.visible_children(id)
    }

    async fn page_info(&self, id: &str) -> Result<PageInfo, TreeError> {
        self.cache.read().await.page_info(id)
    }

    async fn child_titles(&self, id: &str) -> Result<Vec<String>, TreeError> {
        self.cache.read().await.child_titles(id)
    }

    async fn active_path(&self) -> Vec<String> {
        self.cache.read().await.active_path().to_vec()
    }

    async fn path_titles(&self) -> Vec<String> {
        self.cache.read().await.path_titles()
    }

    async fn ancestry_titles(&self, id: &str) -> Vec<String> {
        self.cache.read().await.ancestry_titles(id)
    }

    async fn rows(&self) -> Vec<RowView> {
        self.cache.read().await.rows()
    }

    fn max_pages_per_node(&self) -> usize {
        self.max_pages_per_node
    }

    async fn select(&self, id: &str, depth: usize) -> Result<Node, TreeError> {
        self.cache.write().await.select(id, depth).cloned()
    }

    async fn set_page(&self, id: &str, page: usize) -> Result<PageInfo, TreeError> {
        self.cache.write().await.set_page(id, page)
    }

    async fn append_page(
        &self,
        parent_id: &str,
        children: Vec<ChildSpec>,
    ) -> Result<(usize, Vec<String>), TreeError> {
        self.cache.write().await.append_page(parent_id, children)
    }
}
