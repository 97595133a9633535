use crate::gateway::{ws_handler, Gateway};
use axum::{extract::State, http::Method, routing::get, Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub entries: usize,
}

async fn health(State(gateway): State<Gateway>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        entries: gateway.store().len(),
    })
}

pub fn build_router(gateway: Gateway) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/health", get(health))
        .route(ferry_proto::WS_PATH, get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}
