use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pushgate_core::AppError;
use pushgate_github::GitHubEvent;

use crate::{
    AppState,
    relay::{self, Outcome},
};

/// Webhook endpoint. Verification already happened in the extractor; the
/// relay pipeline does the rest. A store failure surfaces as a 500, a
/// publish failure does not — the event is durable by then and the sender
/// has nothing to retry.
pub async fn webhook(
    State(state): State<AppState>,
    event: GitHubEvent,
) -> Result<Response, AppError> {
    match relay::ingest(&state, event).await? {
        Outcome::Ingested { .. } => Ok((StatusCode::OK, "Event processed").into_response()),
        Outcome::Ignored => Ok((StatusCode::OK, "Ignored").into_response()),
    }
}
