//! NodeCache: id → node mapping with paged children and the active path
//!
//! Pure synchronous data structure. Concurrency is handled one level up by
//! [`InMemoryNodeStore`](super::memory::InMemoryNodeStore), which wraps the
//! cache in a lock so every mutation is applied atomically.

use super::models::{Node, PageInfo, RowView};
use crate::llm::types::ChildSpec;
use std::collections::HashMap;

/// Errors raised by cache mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("node {0} not found")]
    NodeNotFound(String),
    #[error("page {page} out of range for node {node_id} ({total} pages)")]
    PageOutOfRange {
        node_id: String,
        page: usize,
        total: usize,
    },
    #[error("node {node_id} already has the maximum of {max} pages")]
    PageLimitReached { node_id: String, max: usize },
}

/// Allocates ids for generated children.
///
/// Ids are derived as `<parent>.<page>.<position>`; if that id is already
/// present (a seed node could have been named that way), a monotonic `~n`
/// suffix is appended until the id is free.
#[derive(Debug, Default)]
pub struct IdAllocator {
    collisions: u64,
}

impl IdAllocator {
    pub fn allocate(
        &mut self,
        parent_id: &str,
        page: usize,
        position: usize,
        taken: impl Fn(&str) -> bool,
    ) -> String {
        let base = format!("{}.{}.{}", parent_id, page, position);
        if !taken(&base) {
            return base;
        }
        loop {
            self.collisions += 1;
            let candidate = format!("{}~{}", base, self.collisions);
            if !taken(&candidate) {
                return candidate;
            }
        }
    }
}

/// The knowledge-tree cache
#[derive(Debug)]
pub struct NodeCache {
    nodes: HashMap<String, Node>,
    root_ids: Vec<String>,
    cursors: HashMap<String, usize>,
    active_path: Vec<String>,
    ids: IdAllocator,
    max_pages_per_node: usize,
}

impl NodeCache {
    /// Create a cache seeded with root nodes and their static descendants.
    ///
    /// `roots` keeps display order; `extra` holds non-root seed nodes.
    pub fn new(roots: Vec<Node>, extra: Vec<Node>, max_pages_per_node: usize) -> Self {
        let mut nodes = HashMap::with_capacity(roots.len() + extra.len());
        let mut root_ids = Vec::with_capacity(roots.len());
        for node in extra {
            nodes.insert(node.id.clone(), node);
        }
        for root in roots {
            root_ids.push(root.id.clone());
            nodes.insert(root.id.clone(), root);
        }
        Self {
            nodes,
            root_ids,
            cursors: HashMap::new(),
            active_path: Vec::new(),
            ids: IdAllocator::default(),
            max_pages_per_node: max_pages_per_node.max(1),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    fn require(&self, id: &str) -> Result<&Node, TreeError> {
        self.nodes
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn max_pages_per_node(&self) -> usize {
        self.max_pages_per_node
    }

    pub fn roots(&self) -> Vec<Node> {
        self.root_ids
            .iter()
            .filter_map(|id| self.nodes.get(id).cloned())
            .collect()
    }

    pub fn active_path(&self) -> &[String] {
        &self.active_path
    }

    /// Truncate the active path to `depth` and append `node_id`
    pub fn select(&mut self, node_id: &str, depth: usize) -> Result<&Node, TreeError> {
        if !self.nodes.contains_key(node_id) {
            return Err(TreeError::NodeNotFound(node_id.to_string()));
        }
        self.active_path.truncate(depth);
        self.active_path.push(node_id.to_string());
        self.require(node_id)
    }

    /// Titles of the active path, in order (the generation `pathHistory`)
    pub fn path_titles(&self) -> Vec<String> {
        self.active_path
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|n| n.title.clone()))
            .collect()
    }

    /// Titles of the active-path entries that precede `node_id`.
    ///
    /// Empty when the node is not on the active path.
    pub fn ancestry_titles(&self, node_id: &str) -> Vec<String> {
        match self.active_path.iter().position(|id| id == node_id) {
            Some(pos) => self.active_path[..pos]
                .iter()
                .filter_map(|id| self.nodes.get(id).map(|n| n.title.clone()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Titles of every child generated so far, across all pages
    pub fn child_titles(&self, node_id: &str) -> Result<Vec<String>, TreeError> {
        let node = self.require(node_id)?;
        Ok(node
            .children_ids
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|n| n.title.clone()))
            .collect())
    }

    /// Create child records for `children` and store them as a new page of
    /// `parent_id`. Returns the page index and the new ids in response order.
    pub fn append_page(
        &mut self,
        parent_id: &str,
        children: Vec<ChildSpec>,
    ) -> Result<(usize, Vec<String>), TreeError> {
        let parent = self.require(parent_id)?;
        // A legacy flat list becomes page 0 before a new page is added
        let mut pages: Vec<Vec<String>> = parent
            .effective_pages()
            .into_iter()
            .map(|p| p.to_vec())
            .collect();
        if pages.len() >= self.max_pages_per_node {
            return Err(TreeError::PageLimitReached {
                node_id: parent_id.to_string(),
                max: self.max_pages_per_node,
            });
        }
        let page_index = pages.len();

        let mut page_ids = Vec::with_capacity(children.len());
        for (position, child) in children.into_iter().enumerate() {
            let nodes = &self.nodes;
            let id = self
                .ids
                .allocate(parent_id, page_index, position, |c| nodes.contains_key(c));
            let node = Node {
                id: id.clone(),
                title: child.title,
                hook: child.hook,
                children_ids: Vec::new(),
                children_pages: Vec::new(),
                is_static: false,
                llm_config: child.llm_config,
                popup_data: child.popup_data,
            };
            self.nodes.insert(id.clone(), node);
            page_ids.push(id);
        }

        pages.push(page_ids.clone());
        let parent = self
            .nodes
            .get_mut(parent_id)
            .ok_or_else(|| TreeError::NodeNotFound(parent_id.to_string()))?;
        parent.children_ids = pages.iter().flatten().cloned().collect();
        parent.children_pages = pages;

        Ok((page_index, page_ids))
    }

    /// Pagination summary derived from the page count and the cursor
    pub fn page_info(&self, node_id: &str) -> Result<PageInfo, TreeError> {
        let node = self.require(node_id)?;
        let total = node.page_count();
        let cursor = self.cursor(node_id).min(total.saturating_sub(1));
        Ok(PageInfo {
            current: if total == 0 { 0 } else { cursor + 1 },
            total,
            has_children: node.has_children(),
        })
    }

    pub fn cursor(&self, node_id: &str) -> usize {
        self.cursors.get(node_id).copied().unwrap_or(0)
    }

    /// Move the cursor to the 0-indexed `page`; out-of-range pages are rejected
    pub fn set_page(&mut self, node_id: &str, page: usize) -> Result<PageInfo, TreeError> {
        let total = self.require(node_id)?.page_count();
        if page >= total {
            return Err(TreeError::PageOutOfRange {
                node_id: node_id.to_string(),
                page,
                total,
            });
        }
        self.cursors.insert(node_id.to_string(), page);
        self.page_info(node_id)
    }

    /// Children shown for `node_id`: the page under its cursor
    pub fn visible_children(&self, node_id: &str) -> Result<Vec<Node>, TreeError> {
        let node = self.require(node_id)?;
        let pages = node.effective_pages();
        let Some(page) = pages.get(self.cursor(node_id)).or_else(|| pages.last()) else {
            return Ok(Vec::new());
        };
        Ok(page
            .iter()
            .filter_map(|id| self.nodes.get(id).cloned())
            .collect())
    }

    /// Rows for the graph view: roots, then one row per active-path entry
    pub fn rows(&self) -> Vec<RowView> {
        let mut rows = Vec::with_capacity(self.active_path.len() + 1);
        rows.push(RowView {
            depth: 0,
            parent_id: None,
            nodes: self.roots(),
            selected_id: self.active_path.first().cloned(),
            page: None,
        });
        for (i, id) in self.active_path.iter().enumerate() {
            let Ok(children) = self.visible_children(id) else {
                continue;
            };
            if children.is_empty() {
                break;
            }
            rows.push(RowView {
                depth: i + 1,
                parent_id: Some(id.clone()),
                nodes: children,
                selected_id: self.active_path.get(i + 1).cloned(),
                page: self.page_info(id).ok(),
            });
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(titles: &[&str]) -> Vec<ChildSpec> {
        titles
            .iter()
            .map(|t| ChildSpec::new(*t, format!("{} hook", t)))
            .collect()
    }

    fn cache() -> NodeCache {
        let mut seeded = Node::leaf("math", "Mathematics", "proof");
        seeded.is_static = true;
        seeded.children_ids = vec!["math_algebra".into()];
        let mut algebra = Node::leaf("math_algebra", "Algebra", "symbols");
        algebra.is_static = true;
        NodeCache::new(
            vec![Node::leaf("history", "History", "past"), seeded],
            vec![algebra],
            3,
        )
    }

    #[test]
    fn test_append_page_creates_children_in_order() {
        let mut cache = cache();
        let (page, ids) = cache
            .append_page("history", specs(&["A", "B", "C", "D", "E"]))
            .unwrap();
        assert_eq!(page, 0);
        assert_eq!(ids.len(), 5);
        assert_eq!(ids[0], "history.0.0");
        assert_eq!(ids[4], "history.0.4");

        let parent = cache.get("history").unwrap();
        assert_eq!(parent.children_pages, vec![ids.clone()]);
        assert_eq!(parent.children_ids, ids);
        assert_eq!(cache.get("history.0.2").unwrap().title, "C");
        assert_eq!(cache.len(), 3 + 5);
    }

    #[test]
    fn test_children_ids_is_flattened_pages() {
        let mut cache = cache();
        let (_, first) = cache.append_page("history", specs(&["A", "B"])).unwrap();
        let (page, second) = cache.append_page("history", specs(&["C", "D"])).unwrap();
        assert_eq!(page, 1);
        let parent = cache.get("history").unwrap();
        let flat: Vec<String> = parent.children_pages.concat();
        assert_eq!(parent.children_ids, flat);
        assert_eq!(flat, [first, second].concat());
    }

    #[test]
    fn test_legacy_children_become_first_page() {
        let mut cache = cache();
        assert_eq!(
            cache.page_info("math").unwrap(),
            PageInfo {
                current: 1,
                total: 1,
                has_children: true
            }
        );
        let (page, ids) = cache.append_page("math", specs(&["Geometry"])).unwrap();
        assert_eq!(page, 1);
        let node = cache.get("math").unwrap();
        assert_eq!(node.children_pages[0], vec!["math_algebra".to_string()]);
        assert_eq!(node.children_pages[1], ids);
        assert_eq!(node.children_ids.len(), 2);
    }

    #[test]
    fn test_page_info_single_page() {
        let mut cache = cache();
        cache
            .append_page("history", specs(&["a", "b", "c", "d", "e"]))
            .unwrap();
        assert_eq!(
            cache.page_info("history").unwrap(),
            PageInfo {
                current: 1,
                total: 1,
                has_children: true
            }
        );
    }

    #[test]
    fn test_page_info_leaf() {
        let cache = cache();
        assert_eq!(
            cache.page_info("history").unwrap(),
            PageInfo {
                current: 0,
                total: 0,
                has_children: false
            }
        );
    }

    #[test]
    fn test_set_page_moves_visible_children() {
        let mut cache = cache();
        cache.append_page("history", specs(&["A", "B"])).unwrap();
        cache.append_page("history", specs(&["C"])).unwrap();

        let info = cache.set_page("history", 1).unwrap();
        assert_eq!(info.current, 2);
        assert_eq!(info.total, 2);
        let visible = cache.visible_children("history").unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].title, "C");
    }

    #[test]
    fn test_set_page_out_of_range_keeps_cursor() {
        let mut cache = cache();
        cache.append_page("history", specs(&["A"])).unwrap();
        let err = cache.set_page("history", 1).unwrap_err();
        assert_eq!(
            err,
            TreeError::PageOutOfRange {
                node_id: "history".into(),
                page: 1,
                total: 1
            }
        );
        assert_eq!(cache.cursor("history"), 0);
    }

    #[test]
    fn test_page_limit() {
        let mut cache = cache();
        for _ in 0..3 {
            cache.append_page("history", specs(&["x"])).unwrap();
        }
        let err = cache.append_page("history", specs(&["y"])).unwrap_err();
        assert!(matches!(err, TreeError::PageLimitReached { max: 3, .. }));
        assert_eq!(cache.get("history").unwrap().children_ids.len(), 3);
    }

    #[test]
    fn test_id_collision_gets_suffix() {
        let mut cache = NodeCache::new(
            vec![Node::leaf("t", "T", "")],
            vec![Node::leaf("t.0.0", "Squatter", "")],
            5,
        );
        let (_, ids) = cache.append_page("t", specs(&["A", "B"])).unwrap();
        assert_eq!(ids[0], "t.0.0~1");
        assert_eq!(ids[1], "t.0.1");
        assert_eq!(cache.get("t.0.0").unwrap().title, "Squatter");
    }

    #[test]
    fn test_select_truncates_path() {
        let mut cache = cache();
        cache.append_page("history", specs(&["A", "B"])).unwrap();
        cache.select("history", 0).unwrap();
        cache.select("history.0.0", 1).unwrap();
        assert_eq!(cache.active_path(), ["history", "history.0.0"]);

        cache.select("math", 0).unwrap();
        assert_eq!(cache.active_path(), ["math"]);
        assert!(cache.select("nope", 0).is_err());
        assert_eq!(cache.active_path(), ["math"]);
    }

    #[test]
    fn test_path_and_ancestry_titles() {
        let mut cache = cache();
        cache.append_page("history", specs(&["Antiquity"])).unwrap();
        cache.select("history", 0).unwrap();
        cache.select("history.0.0", 1).unwrap();
        assert_eq!(cache.path_titles(), vec!["History", "Antiquity"]);
        assert_eq!(cache.ancestry_titles("history.0.0"), vec!["History"]);
        assert!(cache.ancestry_titles("history").is_empty());
        assert!(cache.ancestry_titles("math").is_empty());
    }

    #[test]
    fn test_rows_follow_active_path() {
        let mut cache = cache();
        cache.append_page("history", specs(&["A", "B"])).unwrap();
        cache.select("history", 0).unwrap();
        cache.select("history.0.1", 1).unwrap();

        let rows = cache.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].nodes.len(), 2);
        assert_eq!(rows[0].selected_id.as_deref(), Some("history"));
        assert_eq!(rows[1].parent_id.as_deref(), Some("history"));
        assert_eq!(rows[1].selected_id.as_deref(), Some("history.0.1"));
        assert_eq!(rows[1].page.unwrap().total, 1);
    }
}
