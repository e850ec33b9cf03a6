use std::{future::Future, time::Duration};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use pushgate_core::{AppError, models::PushEvent};
use pushgate_github::GitHubEvent;

use crate::AppState;

/// Terminal state of one verified delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Event stored. `enqueued` is false when the queue publish failed
    /// after the upsert had already committed.
    Ingested { id: String, enqueued: bool },
    /// Not a push event; dropped without side effects.
    Ignored,
}

/// Run one delivery through annotate → persist → enqueue.
///
/// Persist happens strictly before enqueue, and an enqueue failure never
/// rolls the upsert back. Re-running the pipeline for the same delivery id
/// converges to the same stored document; the queue sees one message per
/// invocation, duplicates and all.
pub async fn ingest(state: &AppState, event: GitHubEvent) -> Result<Outcome, AppError> {
    let GitHubEvent { kind, delivery, mut payload } = event;
    if kind != "push" {
        tracing::debug!(kind = %kind, delivery = %delivery, "Ignoring event");
        return Ok(Outcome::Ignored);
    }

    // The document is keyed by the delivery GUID alone; drop payload keys
    // that would alias it once the payload is flattened into the document.
    payload.remove("id");
    payload.remove("_id");

    let received_at = Utc::now();
    let received_semester = state.schedule.resolve(received_at).map(str::to_string);
    let event = PushEvent { id: delivery, payload, received_at, received_semester };

    let call_timeout = Duration::from_secs(state.config.server.call_timeout);
    bounded(call_timeout, state.store.upsert(&event))
        .await
        .with_context(|| format!("Failed to store push event {}", event.id))?;

    // The event is durable from here on. A failed publish is operator work,
    // not a client error: log loudly and still acknowledge the delivery.
    match bounded(call_timeout, state.queue.publish(&state.config.queue.name, &event.id)).await {
        Ok(()) => {
            tracing::info!(
                id = %event.id,
                semester = event.received_semester.as_deref().unwrap_or("none"),
                "Stored and enqueued push event"
            );
            Ok(Outcome::Ingested { id: event.id, enqueued: true })
        }
        Err(err) => {
            tracing::error!(
                id = %event.id,
                "Push event stored but not enqueued; re-enqueue manually: {err:?}"
            );
            Ok(Outcome::Ingested { id: event.id, enqueued: false })
        }
    }
}

/// Bound a store or queue call so a stalled dependency cannot pile up
/// in-flight deliveries indefinitely.
async fn bounded<T>(limit: Duration, call: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => bail!("Call timed out after {limit:?}"),
    }
}
