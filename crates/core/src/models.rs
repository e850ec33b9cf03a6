use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One webhook delivery, as persisted. Serializes to the stored document:
/// the payload fields are flattened alongside the ingest metadata, and the
/// delivery id becomes the document key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    /// Delivery GUID assigned by the sender. Also the queue message body.
    #[serde(rename = "_id")]
    pub id: String,
    /// Original push payload, stored verbatim. Opaque to the relay beyond
    /// the aliasing keys stripped at annotation time.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    #[serde(rename = "receivedAt", with = "chrono_datetime_as_bson_datetime")]
    pub received_at: DateTime<Utc>,
    /// Label of the semester the event arrived in, if any. Omitted entirely
    /// when no configured interval contains `received_at`.
    #[serde(rename = "receivedSemester", default, skip_serializing_if = "Option::is_none")]
    pub received_semester: Option<String>,
}
