//! Chat page (`GET /`).
//!
//! The page is a minijinja template rendered once at startup; it has no
//! per-request content.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use minijinja::{Environment, context};
use utoipa::OpenApi;

use crate::config::Config;
use crate::prompt::BOT_NAME;
use crate::state::AppState;

const INDEX_TEMPLATE: &str = include_str!("../../templates/index.html");

pub const COMPANY_NAME: &str = "Compass Logistics International";

#[derive(OpenApi)]
#[openapi(paths(index))]
pub struct PageApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index))
}

/// Render the chat page for the configured model.
pub fn render_index(config: &Config) -> Result<String, minijinja::Error> {
    let mut env = Environment::new();
    env.add_template("index.html", INDEX_TEMPLATE)?;
    env.get_template("index.html")?.render(context! {
        bot_name => BOT_NAME,
        company_name => COMPANY_NAME,
        model => config.model.as_str(),
    })
}

#[utoipa::path(
    get,
    path = "/",
    tag = "page",
    responses(
        (status = 200, description = "Chat page", content_type = "text/html", body = String)
    )
)]
pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(state.index_html.to_string())
}
