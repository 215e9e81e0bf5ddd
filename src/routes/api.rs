use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{MODEL_ID_HEADER, MODEL_USED_HEADER, api, generate};
use crate::state::AppState;
use std::sync::Arc;

pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/api/generate-audio", post(generate::generate_audio))
        .route("/generate-audio", post(generate::generate_audio))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Browsers need the model headers exposed to read them.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .expose_headers([MODEL_USED_HEADER, MODEL_ID_HEADER])
}
