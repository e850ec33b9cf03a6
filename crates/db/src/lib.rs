//! MongoDB adapter for the relay's event store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use mongodb::{Client, Collection, bson::doc};
use pushgate_core::{EventStore, config::DbConfig, models::PushEvent};

/// Long-lived handle to the push event collection. Cheap to clone; all
/// deliveries share one underlying client.
#[derive(Clone)]
pub struct Database {
    collection: Collection<PushEvent>,
}

impl Database {
    /// Connect and ping the server so a bad connection string fails at
    /// startup rather than on the first delivery.
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.url)
            .await
            .context("Failed to create MongoDB client")?;
        let database = client.database(&config.database);
        database
            .run_command(doc! { "ping": 1 })
            .await
            .with_context(|| format!("Failed to reach MongoDB database {}", config.database))?;
        tracing::info!(
            database = %config.database,
            collection = %config.collection,
            "Connected to MongoDB"
        );
        Ok(Self { collection: database.collection(&config.collection) })
    }
}

#[async_trait]
impl EventStore for Database {
    async fn upsert(&self, event: &PushEvent) -> Result<()> {
        // Whole-document replace keyed by the delivery GUID. The server
        // applies this atomically per key, so redeliveries converge without
        // any coordination on our side.
        self.collection
            .replace_one(doc! { "_id": &event.id }, event)
            .upsert(true)
            .await
            .with_context(|| format!("Failed to upsert push event {}", event.id))?;
        Ok(())
    }
}
