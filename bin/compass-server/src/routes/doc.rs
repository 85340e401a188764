use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::routes::{chat, health, page};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(info(
    title = "compass-server",
    description = "CompassBot chat API",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(chat::ChatApi::openapi());
    root.merge(health::HealthApi::openapi());
    root.merge(page::PageApi::openapi());
    root
}

/// Serve the generated document at `/api-docs/openapi.json`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(get_docs()) }),
    )
}
