//! Access to whole JSON documents held in a remote bin store (JSONBin v3).
//!
//! The store has no partial update: callers fetch the full document, change it
//! locally and write the full document back.

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use service_core::observability::TracedClientExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Header carrying the store credential on every request.
pub const MASTER_KEY_HEADER: &str = "X-Master-Key";

#[derive(Error, Debug)]
pub enum StoreError {
    /// The store answered with a non-success status.
    #[error("document store returned {status}: {body}")]
    Http { status: u16, body: String },

    /// The request never produced a response (connect, timeout, I/O).
    #[error("document store unreachable: {0}")]
    Transport(String),

    /// The response arrived but did not hold a usable document.
    #[error("invalid document store response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Only transport failures are worth repeating.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the latest version of a document.
    async fn fetch(&self, bin_id: &str) -> Result<Value, StoreError>;

    /// Overwrite a document with `value`.
    async fn replace(&self, bin_id: &str, value: &Value) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct JsonBinConfig {
    pub base_url: String,
    pub api_key: SecretString,
    pub timeout: Duration,
    /// Zero disables retries.
    pub retry_max_elapsed: Duration,
}

/// [`DocumentStore`] backed by the JSONBin REST API.
#[derive(Clone)]
pub struct JsonBinClient {
    client: Client,
    config: JsonBinConfig,
}

impl JsonBinClient {
    pub fn new(config: JsonBinConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn latest_url(&self, bin_id: &str) -> String {
        format!("{}/{}/latest", self.config.base_url.trim_end_matches('/'), bin_id)
    }

    fn bin_url(&self, bin_id: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), bin_id)
    }

    async fn fetch_once(&self, bin_id: &str) -> Result<Value, StoreError> {
        let response = self
            .client
            .traced_get(&self.latest_url(bin_id))
            .header(MASTER_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let body = read_success_body(response).await?;

        let mut envelope: Value = serde_json::from_str(&body)
            .map_err(|e| StoreError::Decode(format!("body is not JSON: {}", e)))?;

        match envelope.get_mut("record") {
            Some(record) => Ok(record.take()),
            None => Err(StoreError::Decode("missing `record` field".to_string())),
        }
    }

    async fn replace_once(&self, bin_id: &str, value: &Value) -> Result<(), StoreError> {
        let response = self
            .client
            .traced_put(&self.bin_url(bin_id))
            .header(MASTER_KEY_HEADER, self.config.api_key.expose_secret())
            .json(value)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        read_success_body(response).await.map(|_| ())
    }

    /// Run `op`, retrying transport failures with exponential backoff until
    /// `retry_max_elapsed` is spent.
    async fn with_retry<T, F, Fut>(&self, operation: &'static str, op: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let result = if self.config.retry_max_elapsed.is_zero() {
            op().await
        } else {
            let policy = ExponentialBackoffBuilder::new()
                .with_initial_interval(Duration::from_millis(100))
                .with_max_interval(Duration::from_secs(1))
                .with_max_elapsed_time(Some(self.config.retry_max_elapsed))
                .build();

            backoff::future::retry_notify(
                policy,
                || {
                    let attempt = op();
                    async move { attempt.await.map_err(classify) }
                },
                |e: StoreError, wait: Duration| {
                    tracing::warn!(
                        operation,
                        error = %e,
                        backoff_ms = wait.as_millis() as u64,
                        "Document store call failed, retrying after backoff"
                    );
                },
            )
            .await
        };

        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::counter!(
            "document_store_requests_total",
            "operation" => operation,
            "outcome" => outcome
        )
        .increment(1);

        result
    }
}

fn classify(e: StoreError) -> backoff::Error<StoreError> {
    if e.is_transient() {
        backoff::Error::transient(e)
    } else {
        backoff::Error::permanent(e)
    }
}

/// Return the body of a 2xx response, or the status and body verbatim.
async fn read_success_body(response: reqwest::Response) -> Result<String, StoreError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;

    if status.is_success() {
        Ok(body)
    } else {
        Err(StoreError::Http {
            status: status.as_u16(),
            body,
        })
    }
}

/// Last four characters of a bin id, enough to tell bins apart in logs.
pub fn bin_suffix(bin_id: &str) -> &str {
    let start = bin_id
        .char_indices()
        .rev()
        .nth(3)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &bin_id[start..]
}

#[async_trait]
impl DocumentStore for JsonBinClient {
    async fn fetch(&self, bin_id: &str) -> Result<Value, StoreError> {
        tracing::debug!(bin = %bin_suffix(bin_id), "Fetching document");

        self.with_retry("fetch", || self.fetch_once(bin_id))
            .await
            .map_err(|e| {
                tracing::error!(bin = %bin_suffix(bin_id), error = %e, "Failed to fetch document");
                e
            })
    }

    async fn replace(&self, bin_id: &str, value: &Value) -> Result<(), StoreError> {
        tracing::debug!(bin = %bin_suffix(bin_id), "Replacing document");

        self.with_retry("replace", || self.replace_once(bin_id, value))
            .await
            .map_err(|e| {
                tracing::error!(bin = %bin_suffix(bin_id), error = %e, "Failed to replace document");
                e
            })
    }
}

/// In-process [`DocumentStore`] for tests and local runs.
///
/// `set_unavailable(true)` makes every call fail with a transport error.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, Value>>,
    unavailable: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, bin_id: impl Into<String>, value: Value) -> Self {
        self.insert(bin_id, value);
        self
    }

    pub fn insert(&self, bin_id: impl Into<String>, value: Value) {
        self.lock().insert(bin_id.into(), value);
    }

    pub fn get(&self, bin_id: &str) -> Option<Value> {
        self.lock().get(bin_id).cloned()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        // A poisoned map is still a valid map.
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Transport("memory store marked unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch(&self, bin_id: &str) -> Result<Value, StoreError> {
        self.check_available()?;
        self.get(bin_id).ok_or_else(|| StoreError::Http {
            status: 404,
            body: format!("{{\"message\":\"Bin not found\",\"bin\":\"{}\"}}", bin_id),
        })
    }

    async fn replace(&self, bin_id: &str, value: &Value) -> Result<(), StoreError> {
        self.check_available()?;
        self.insert(bin_id, value.clone());
        Ok(())
    }
}
