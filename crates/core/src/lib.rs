pub mod config;
pub mod models;
pub mod semester;

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::models::PushEvent;

/// Internal fault surfaced to the sender as a 500, logged at the highest
/// severity. Verification failures never reach this type; the extractor
/// rejects those directly with a client status.
#[derive(Debug)]
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("{:?}", self.0);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Something went wrong: {}", self.0))
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self { Self(err.into()) }
}

/// Persistence seam for the relay. Implemented by the MongoDB adapter in
/// `pushgate-db`; tests substitute in-memory fakes.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert the event, or fully replace any existing document with the
    /// same id. Replace, not merge: repeated deliveries converge to the
    /// most recent one. Failures are reported, never swallowed.
    async fn upsert(&self, event: &PushEvent) -> Result<()>;
}

/// Queue seam for the relay. Implemented by the Redis adapter in
/// `pushgate-queue`.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Publish a single message onto the named queue. Best-effort: the
    /// caller decides what a failure means, publishing never rolls back
    /// prior work.
    async fn publish(&self, queue: &str, message: &str) -> Result<()>;
}
