pub mod api;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Complete application with state attached.
pub fn create_app(state: Arc<AppState>) -> Router {
    api::create_api_router().with_state(state)
}
