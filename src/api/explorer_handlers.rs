//! Explorer API handlers: node cache, pagination and selection

use crate::api::handlers::{AppError, ExplorerState};
use crate::tree::{GenerationOutcome, Node, PageInfo, PathView};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

/// Node state after a selection or generation call
#[derive(Debug, Serialize)]
pub struct NodeUpdate {
    pub outcome: GenerationOutcome,
    pub node: Node,
    pub children: Vec<Node>,
    pub page: PageInfo,
}

#[derive(Debug, Serialize)]
pub struct ChildrenResponse {
    pub children: Vec<Node>,
    pub page: PageInfo,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    /// Row index of the node; the active path is cut to this length first
    pub depth: usize,
}

#[derive(Debug, Deserialize)]
pub struct SetPageRequest {
    /// 0-indexed page
    pub page: usize,
}

async fn node_update(
    state: &ExplorerState,
    node_id: &str,
    outcome: GenerationOutcome,
) -> Result<Json<NodeUpdate>, AppError> {
    let store = state.explorer.store();
    let node = store
        .get(node_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Node {} not found", node_id)))?;
    Ok(Json(NodeUpdate {
        outcome,
        node,
        children: store.visible_children(node_id).await?,
        page: store.page_info(node_id).await?,
    }))
}

/// GET /api/roots: Root nodes in seed order
pub async fn list_roots(State(state): State<ExplorerState>) -> Json<Vec<Node>> {
    Json(state.explorer.store().roots().await)
}

/// GET /api/nodes/{id}: Get a node record
pub async fn get_node(
    State(state): State<ExplorerState>,
    Path(node_id): Path<String>,
) -> Result<Json<Node>, AppError> {
    state
        .explorer
        .store()
        .get(&node_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Node {} not found", node_id)))
}

/// GET /api/nodes/{id}/children: Children on the current page
pub async fn get_children(
    State(state): State<ExplorerState>,
    Path(node_id): Path<String>,
) -> Result<Json<ChildrenResponse>, AppError> {
    let store = state.explorer.store();
    Ok(Json(ChildrenResponse {
        children: store.visible_children(&node_id).await?,
        page: store.page_info(&node_id).await?,
    }))
}

/// GET /api/nodes/{id}/pages: Pagination summary
pub async fn get_pages(
    State(state): State<ExplorerState>,
    Path(node_id): Path<String>,
) -> Result<Json<PageInfo>, AppError> {
    Ok(Json(state.explorer.page_info(&node_id).await?))
}

/// PUT /api/nodes/{id}/pages: Move the page cursor (never generates)
pub async fn set_page(
    State(state): State<ExplorerState>,
    Path(node_id): Path<String>,
    Json(req): Json<SetPageRequest>,
) -> Result<Json<PageInfo>, AppError> {
    Ok(Json(state.explorer.set_page(&node_id, req.page).await?))
}

/// POST /api/nodes/{id}/select: Select a node, generating children if needed
pub async fn select_node(
    State(state): State<ExplorerState>,
    Path(node_id): Path<String>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<NodeUpdate>, AppError> {
    let outcome = state.explorer.select_node(&node_id, req.depth).await?;
    node_update(&state, &node_id, outcome).await
}

/// POST /api/nodes/{id}/generate: Generate the first page of children
pub async fn generate_children(
    State(state): State<ExplorerState>,
    Path(node_id): Path<String>,
) -> Result<Json<NodeUpdate>, AppError> {
    let outcome = state.explorer.generate_children(&node_id).await?;
    node_update(&state, &node_id, outcome).await
}

/// POST /api/nodes/{id}/more: Generate another page of children
pub async fn generate_more(
    State(state): State<ExplorerState>,
    Path(node_id): Path<String>,
) -> Result<Json<NodeUpdate>, AppError> {
    let outcome = state.explorer.generate_more_children(&node_id).await?;
    node_update(&state, &node_id, outcome).await
}

/// GET /api/path: Active path, rendered rows and loading flag
pub async fn get_path(State(state): State<ExplorerState>) -> Json<PathView> {
    Json(state.explorer.path_view().await)
}
