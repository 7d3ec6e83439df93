//! Substring search over the sign dictionary document.

use crate::models::{DictionaryEntry, SearchResult};
use crate::services::document_store::{DocumentStore, StoreError};
use crate::services::normalize::normalize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("search query is empty")]
    EmptyQuery,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("dictionary document is malformed: {0}")]
    MalformedDictionary(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct DictionarySearch {
    store: Arc<dyn DocumentStore>,
    dictionary_bin_id: String,
}

impl DictionarySearch {
    pub fn new(store: Arc<dyn DocumentStore>, dictionary_bin_id: impl Into<String>) -> Self {
        Self {
            store,
            dictionary_bin_id: dictionary_bin_id.into(),
        }
    }

    /// Entries whose Arabic or English word contains `query`, in document order.
    ///
    /// Only a zero-length query is rejected. A query that normalizes to the
    /// empty string (whitespace) matches every entry.
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>, SearchError> {
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let document = self.store.fetch(&self.dictionary_bin_id).await?;
        let entries: Vec<DictionaryEntry> = serde_json::from_value(document)?;

        let results: Vec<SearchResult> = filter_entries(&entries, query)
            .into_iter()
            .map(SearchResult::from)
            .collect();

        tracing::debug!(
            entries = entries.len(),
            matches = results.len(),
            "Dictionary search completed"
        );

        Ok(results)
    }
}

/// Entries where the normalized `query` is a substring of either normalized word.
pub fn filter_entries<'a>(entries: &'a [DictionaryEntry], query: &str) -> Vec<&'a DictionaryEntry> {
    let needle = normalize(query);
    entries
        .iter()
        .filter(|entry| {
            normalize(entry.word_ar.as_deref().unwrap_or_default()).contains(&needle)
                || normalize(entry.word_en.as_deref().unwrap_or_default()).contains(&needle)
        })
        .collect()
}
