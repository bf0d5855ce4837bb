use crate::BusResult;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A published message.
///
/// `key` is the partitioning key (the principal id for every current topic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub id: Uuid,
    pub topic: String,
    pub key: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new<T: Serialize>(topic: &str, key: &str, payload: &T) -> BusResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            key: key.to_string(),
            payload: serde_json::to_value(payload)?,
            published_at: Utc::now(),
        })
    }

    pub fn decode<T: DeserializeOwned>(&self) -> BusResult<T> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}
