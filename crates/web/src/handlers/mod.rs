use axum::{Router, routing::post};
use pushgate_core::config::Config;

use crate::AppState;

mod webhook;

/// Single route: the configured webhook path. Everything else falls through
/// to axum's 404.
pub fn build_router(config: &Config) -> Router<AppState> {
    Router::new().route(&config.server.path, post(webhook::webhook))
}
