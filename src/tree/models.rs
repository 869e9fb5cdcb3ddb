//! Knowledge-tree models: nodes, pagination info, generation outcomes

use serde::{Deserialize, Serialize};

/// Scope hints handed to the generator when a node is expanded
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
}

/// Rich data shown in the hover popup and used to seed chat questions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupData {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<String>,
}

/// A single topic card in the explorable tree.
///
/// `children_ids` is always the flattened union of `children_pages`, in page
/// order. Seed nodes may carry `children_ids` with no pages; they are shown
/// as one implicit page (see [`Node::effective_pages`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub hook: String,
    #[serde(rename = "childrenIds", default)]
    pub children_ids: Vec<String>,
    #[serde(rename = "childrenPages", default)]
    pub children_pages: Vec<Vec<String>>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_config: Option<LlmConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popup_data: Option<PopupData>,
}

impl Node {
    /// Create a leaf node with no children
    pub fn leaf(id: impl Into<String>, title: impl Into<String>, hook: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            hook: hook.into(),
            children_ids: Vec::new(),
            children_pages: Vec::new(),
            is_static: false,
            llm_config: None,
            popup_data: None,
        }
    }

    /// True once at least one page of children exists (explicit or implicit)
    pub fn has_children(&self) -> bool {
        !self.children_ids.is_empty()
    }

    /// Pages used for display. Legacy nodes with flat children and no pages
    /// are treated as a single implicit page.
    pub fn effective_pages(&self) -> Vec<&[String]> {
        if self.children_pages.is_empty() {
            if self.children_ids.is_empty() {
                Vec::new()
            } else {
                vec![self.children_ids.as_slice()]
            }
        } else {
            self.children_pages.iter().map(Vec::as_slice).collect()
        }
    }

    pub fn page_count(&self) -> usize {
        self.effective_pages().len()
    }
}

/// Pagination summary for one node (`current` is 1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub current: usize,
    pub total: usize,
    #[serde(rename = "hasChildren")]
    pub has_children: bool,
}

/// One rendered row of the graph view
#[derive(Debug, Clone, Serialize)]
pub struct RowView {
    pub depth: usize,
    /// Node whose children fill this row (None for the root row)
    pub parent_id: Option<String>,
    pub nodes: Vec<Node>,
    /// Id selected in this row, if the active path reaches it
    pub selected_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<PageInfo>,
}

/// Result of a generation attempt, reported instead of a thrown error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    /// A new page was appended to the parent
    Generated {
        page_index: usize,
        child_ids: Vec<String>,
    },
    /// The node already had children; nothing was requested
    CacheHit,
    /// Another generation for the same node was already in flight
    Suppressed,
    /// The generator failed; the node is unchanged
    Failed { reason: String },
}

impl GenerationOutcome {
    pub fn is_generated(&self) -> bool {
        matches!(self, GenerationOutcome::Generated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_has_no_pages() {
        let node = Node::leaf("a", "A", "hook");
        assert!(!node.has_children());
        assert_eq!(node.page_count(), 0);
        assert!(node.effective_pages().is_empty());
    }

    #[test]
    fn test_flat_children_form_implicit_page() {
        let mut node = Node::leaf("root", "Root", "hook");
        node.children_ids = vec!["x".into(), "y".into()];
        let pages = node.effective_pages();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0], ["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn test_node_serializes_with_camel_case_children() {
        let mut node = Node::leaf("n", "N", "h");
        node.children_pages = vec![vec!["c".into()]];
        node.children_ids = vec!["c".into()];
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["childrenIds"][0], "c");
        assert_eq!(json["childrenPages"][0][0], "c");
        assert!(json.get("llm_config").is_none());
    }

    #[test]
    fn test_generation_outcome_tagged() {
        let outcome = GenerationOutcome::Failed {
            reason: "boom".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["reason"], "boom");
        assert!(!outcome.is_generated());
    }
}
