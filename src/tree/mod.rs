//! Knowledge tree: node cache, pagination and on-demand generation
//!
//! Layout follows the store pattern used across the crate (trait + impl):
//! - `NodeCache`: synchronous data structure holding nodes, pages, cursors
//!   and the active path
//! - `NodeStore` trait with the `InMemoryNodeStore` implementation
//! - `Explorer`: selection and generation service on top of a store

pub mod cache;
pub mod explorer;
pub mod memory;
pub mod models;
pub mod traits;

pub use cache::{IdAllocator, NodeCache, TreeError};
pub use explorer::{Explorer, PathView, DEFAULT_CHILDREN_PER_PAGE};
pub use memory::InMemoryNodeStore;
pub use models::{GenerationOutcome, LlmConfig, Node, PageInfo, PopupData, RowView};
pub use traits::NodeStore;
