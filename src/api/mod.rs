//! HTTP API for the explorer

pub mod chat_handlers;
pub mod explorer_handlers;
pub mod generate_handlers;
pub mod handlers;
pub mod query;
pub mod routes;

pub use handlers::{ExplorerState, ServerState};
pub use query::*;
pub use routes::create_router;
