//! Stateless generation endpoint

use super::handlers::{AppError, ExplorerState, GENERATION_FAILED};
use crate::llm::types::{GenerateRequest, GenerateResponse};
use axum::{extract::State, Json};
use tracing::{debug, error};

/// `POST /api/generate`
///
/// Forwards the request to the configured child generator and returns the
/// parsed children. Nothing is cached; the caller owns the tree.
pub async fn generate(
    State(state): State<ExplorerState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    debug!(
        parent = %req.parent_node.title,
        depth = req.path_history.len(),
        excluded = req.exclude_titles.as_ref().map_or(0, Vec::len),
        "Generating children"
    );
    match state.generator.generate(&req).await {
        Ok(children) => Ok(Json(GenerateResponse { children })),
        Err(e) => {
            error!(parent = %req.parent_node.title, error = %e, "Generation failed");
            Err(AppError::Internal(anyhow::anyhow!(
                "{}: {}",
                GENERATION_FAILED,
                e
            )))
        }
    }
}
