//! Usage counters kept in a single statistics document.
//!
//! An increment is fetch, bump, overwrite. Two concurrent increments can read
//! the same value and one of them is lost; the store offers no conditional
//! write, so these counters are best-effort telemetry only.

use crate::services::document_store::{bin_suffix, DocumentStore, StoreError};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

pub const IMAGES_ANALYZED: &str = "images_analyzed";
pub const DICTIONARY_SEARCHES: &str = "dictionary_searches";

#[derive(Error, Debug)]
pub enum ActivityError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("statistics document is malformed: {0}")]
    MalformedStatistics(String),
}

#[derive(Clone)]
pub struct ActivityCounter {
    store: Arc<dyn DocumentStore>,
    stats_bin_id: String,
}

impl ActivityCounter {
    pub fn new(store: Arc<dyn DocumentStore>, stats_bin_id: impl Into<String>) -> Self {
        Self {
            store,
            stats_bin_id: stats_bin_id.into(),
        }
    }

    /// Add one to `activity_type` and return the stored count.
    pub async fn try_increment(&self, activity_type: &str) -> Result<u64, ActivityError> {
        let stats = self.store.fetch(&self.stats_bin_id).await?;
        let (updated, count) = bump(stats, activity_type)?;
        self.store.replace(&self.stats_bin_id, &updated).await?;
        Ok(count)
    }

    /// Best-effort increment. Failures are logged and counted, never returned.
    pub async fn increment(&self, activity_type: &str) {
        match self.try_increment(activity_type).await {
            Ok(count) => {
                tracing::info!(activity = activity_type, count, "Activity logged");
            }
            Err(e) => {
                tracing::warn!(
                    activity = activity_type,
                    bin = %bin_suffix(&self.stats_bin_id),
                    error = %e,
                    "Failed to log activity"
                );
                metrics::counter!(
                    "activity_log_failures_total",
                    "activity" => activity_type.to_string()
                )
                .increment(1);
            }
        }
    }

    /// Run [`increment`](Self::increment) on a detached task.
    pub fn spawn_increment(&self, activity_type: &'static str) -> tokio::task::JoinHandle<()> {
        let counter = self.clone();
        tokio::spawn(async move { counter.increment(activity_type).await })
    }
}

/// Apply one increment to a statistics document.
fn bump(stats: Value, activity_type: &str) -> Result<(Value, u64), ActivityError> {
    let mut counters: Map<String, Value> = match stats {
        Value::Object(map) => map,
        other => {
            return Err(ActivityError::MalformedStatistics(format!(
                "expected an object, found {}",
                json_kind(&other)
            )))
        }
    };

    let current = match counters.get(activity_type) {
        None | Some(Value::Null) => 0,
        Some(value) => value.as_u64().ok_or_else(|| {
            ActivityError::MalformedStatistics(format!(
                "counter `{}` is not a non-negative integer: {}",
                activity_type, value
            ))
        })?,
    };

    let next = current.saturating_add(1);
    counters.insert(activity_type.to_string(), Value::from(next));
    Ok((Value::Object(counters), next))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::document_store::MemoryDocumentStore;
    use serde_json::json;

    const STATS: &str = "stats-bin";

    fn counter_with(store: &Arc<MemoryDocumentStore>) -> ActivityCounter {
        ActivityCounter::new(store.clone(), STATS)
    }

    #[tokio::test]
    async fn increments_missing_counter_from_zero() {
        let store = Arc::new(MemoryDocumentStore::new().with_document(STATS, json!({})));
        let counter = counter_with(&store);

        counter.increment("x").await;
        assert_eq!(store.get(STATS), Some(json!({"x": 1})));

        counter.increment("x").await;
        assert_eq!(store.get(STATS), Some(json!({"x": 2})));
    }

    #[tokio::test]
    async fn keeps_other_counters() {
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_document(STATS, json!({"images_analyzed": 7, "dictionary_searches": 3})),
        );
        let count = counter_with(&store)
            .try_increment(DICTIONARY_SEARCHES)
            .await
            .unwrap();

        assert_eq!(count, 4);
        assert_eq!(
            store.get(STATS),
            Some(json!({"images_analyzed": 7, "dictionary_searches": 4}))
        );
    }

    #[tokio::test]
    async fn swallows_store_failures() {
        let store = Arc::new(MemoryDocumentStore::new().with_document(STATS, json!({"x": 1})));
        store.set_unavailable(true);

        // Must not panic or surface an error.
        counter_with(&store).increment("x").await;

        store.set_unavailable(false);
        assert_eq!(store.get(STATS), Some(json!({"x": 1})));
    }

    #[tokio::test]
    async fn rejects_non_object_statistics() {
        let store = Arc::new(MemoryDocumentStore::new().with_document(STATS, json!([1, 2])));
        let err = counter_with(&store).try_increment("x").await.unwrap_err();
        assert!(matches!(err, ActivityError::MalformedStatistics(_)));
        assert_eq!(store.get(STATS), Some(json!([1, 2])));
    }

    #[tokio::test]
    async fn rejects_non_integer_counter() {
        let store =
            Arc::new(MemoryDocumentStore::new().with_document(STATS, json!({"x": "many"})));
        let err = counter_with(&store).try_increment("x").await.unwrap_err();
        assert!(matches!(err, ActivityError::MalformedStatistics(_)));
    }

    #[tokio::test]
    async fn spawned_increment_lands() {
        let store = Arc::new(MemoryDocumentStore::new().with_document(STATS, json!({})));
        counter_with(&store)
            .spawn_increment(IMAGES_ANALYZED)
            .await
            .unwrap();
        assert_eq!(store.get(STATS), Some(json!({"images_analyzed": 1})));
    }
}
