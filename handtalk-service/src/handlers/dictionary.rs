use crate::dtos::{SearchParams, SearchResponse};
use crate::services::{SearchError, DICTIONARY_SEARCHES};
use crate::startup::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::AppError;

pub const SEARCH_FAILED: &str = "An error occurred while searching the dictionary.";

pub async fn search_dictionary(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    // Whitespace is a valid query; only an absent or zero-length one is rejected.
    let query = params.query.unwrap_or_default();
    if query.is_empty() {
        metrics::counter!("dictionary_searches_total", "outcome" => "rejected").increment(1);
        return Err(AppError::bad_request("Query parameter `query` is required."));
    }

    match state.dictionary.search(&query).await {
        Ok(results) => {
            metrics::counter!("dictionary_searches_total", "outcome" => "success").increment(1);
            state.activity.spawn_increment(DICTIONARY_SEARCHES);
            Ok(Json(SearchResponse { results }))
        }
        Err(SearchError::EmptyQuery) => {
            metrics::counter!("dictionary_searches_total", "outcome" => "rejected").increment(1);
            Err(AppError::bad_request("Query parameter `query` is required."))
        }
        Err(e) => {
            tracing::error!(error = %e, "Dictionary search failed");
            metrics::counter!("dictionary_searches_total", "outcome" => "error").increment(1);
            Err(AppError::upstream(SEARCH_FAILED))
        }
    }
}
