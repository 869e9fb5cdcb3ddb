//! Taxonomy seed store
//!
//! Loads the static root topics once at startup. Seeds may list static
//! children and may omit `popup_data`; both are normalised here so the rest
//! of the crate only ever sees [`Node`]s.

use crate::tree::cache::NodeCache;
use crate::tree::models::{LlmConfig, Node, PopupData};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Seed bundled into the binary, used when no taxonomy path is configured
pub const DEFAULT_TAXONOMY: &str = include_str!("../../data/taxonomy.json");

#[derive(Debug, Clone, Deserialize)]
pub struct Taxonomy {
    pub roots: Vec<SeedRoot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedRoot {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub hook: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Option<Vec<String>>,
    #[serde(default)]
    pub llm_config: Option<LlmConfig>,
    #[serde(default)]
    pub popup_data: Option<PopupData>,
    #[serde(default)]
    pub children: Vec<SeedChild>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedChild {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub hook: String,
    #[serde(default)]
    pub llm_config: Option<LlmConfig>,
    #[serde(default)]
    pub popup_data: Option<PopupData>,
}

/// Seed nodes ready for the cache: roots in display order plus their
/// static children
#[derive(Debug, Clone)]
pub struct SeedNodes {
    pub roots: Vec<Node>,
    pub children: Vec<Node>,
}

impl Taxonomy {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse taxonomy JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read taxonomy file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid taxonomy in {}", path.display()))
    }

    /// Load from `path` if given, otherwise the bundled seed
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::parse(DEFAULT_TAXONOMY),
        }
    }

    /// Normalise seeds into nodes.
    ///
    /// Root `childrenIds` lists its static children with no pages, which the
    /// cache shows as one implicit page. Missing `popup_data` is built from
    /// `description` (falling back to `hook`) and `questions`.
    pub fn into_nodes(self) -> Result<SeedNodes> {
        let mut seen = HashSet::new();
        let mut roots = Vec::with_capacity(self.roots.len());
        let mut children = Vec::new();

        for root in self.roots {
            if !seen.insert(root.id.clone()) {
                bail!("Duplicate taxonomy id: {}", root.id);
            }

            let mut child_ids = Vec::with_capacity(root.children.len());
            for child in root.children {
                if !seen.insert(child.id.clone()) {
                    bail!("Duplicate taxonomy id: {}", child.id);
                }
                child_ids.push(child.id.clone());
                children.push(Node {
                    id: child.id,
                    title: child.title,
                    hook: child.hook,
                    children_ids: Vec::new(),
                    children_pages: Vec::new(),
                    is_static: true,
                    llm_config: child.llm_config,
                    popup_data: child.popup_data,
                });
            }

            let popup_data = root.popup_data.unwrap_or_else(|| PopupData {
                description: root.description.unwrap_or_else(|| root.hook.clone()),
                questions: root.questions.unwrap_or_default(),
            });

            roots.push(Node {
                id: root.id,
                title: root.title,
                hook: root.hook,
                children_ids: child_ids,
                children_pages: Vec::new(),
                is_static: true,
                llm_config: root.llm_config,
                popup_data: Some(popup_data),
            });
        }

        Ok(SeedNodes { roots, children })
    }

    /// Build a cache seeded with this taxonomy
    pub fn into_cache(self, max_pages_per_node: usize) -> Result<NodeCache> {
        let seed = self.into_nodes()?;
        info!(
            roots = seed.roots.len(),
            static_children = seed.children.len(),
            "Loaded taxonomy seed"
        );
        Ok(NodeCache::new(seed.roots, seed.children, max_pages_per_node))
    }
}
