mod common;

use axum::http::StatusCode;
use common::*;
use handtalk_service::models::DictionaryEntry;
use handtalk_service::services::dictionary::filter_entries;
use handtalk_service::services::{normalize, MockVisionProvider};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;

fn app(store: Arc<handtalk_service::services::MemoryDocumentStore>) -> axum::Router {
    router(store, Arc::new(MockVisionProvider::replying("unused")))
}

#[tokio::test]
async fn search_matches_folded_arabic() {
    let store = seeded_store();

    // "اهلا" matches the stored "أهلا".
    let response = app(store.clone())
        .oneshot(get_request("/search-dictionary/?query=%D8%A7%D9%87%D9%84%D8%A7"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "results": [
            { "title": "أهلا", "thumbnail_link": "https://img.test/hello.png" }
        ]})
    );
    assert!(wait_for_stats(&store, json!({ "dictionary_searches": 1 })).await);
}

#[tokio::test]
async fn search_matches_english_and_fills_defaults() {
    let response = app(seeded_store())
        .oneshot(get_request("/search-dictionary?query=%20THANK%20"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "results": [{ "title": "No Title", "thumbnail_link": "" }] })
    );
}

#[tokio::test]
async fn search_without_matches_is_empty() {
    let response = app(seeded_store())
        .oneshot(get_request("/search-dictionary/?query=zebra"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "results": [] }));
}

#[tokio::test]
async fn search_rejects_missing_or_empty_query() {
    for uri in ["/search-dictionary/", "/search-dictionary/?query="] {
        let store = seeded_store();
        let response = app(store.clone()).oneshot(get_request(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(store.get(STATS_BIN), Some(json!({})));
    }
}

#[tokio::test]
async fn whitespace_query_returns_every_entry() {
    let store = seeded_store();

    let response = app(store.clone())
        .oneshot(get_request("/search-dictionary/?query=%20%20"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({ "results": [
            { "title": "أهلا", "thumbnail_link": "https://img.test/hello.png" },
            { "title": "مدرسة", "thumbnail_link": "https://img.test/school.png" },
            { "title": "No Title", "thumbnail_link": "" },
            { "title": "إشارة", "thumbnail_link": "" }
        ]})
    );
    assert!(wait_for_stats(&store, json!({ "dictionary_searches": 1 })).await);
}

#[tokio::test]
async fn store_failure_is_generic_error() {
    let store = seeded_store();
    store.set_unavailable(true);

    let response = app(store)
        .oneshot(get_request("/search-dictionary/?query=hello"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "An error occurred while searching the dictionary." })
    );
}

#[tokio::test]
async fn malformed_dictionary_is_generic_error() {
    let store = seeded_store();
    store.insert(DICTIONARY_BIN, json!({ "word_ar": "not a list" }));

    let response = app(store)
        .oneshot(get_request("/search-dictionary/?query=list"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

const ARABIC_LETTERS: &[char] = &[
    'ا', 'أ', 'إ', 'آ', 'ب', 'ت', 'ة', 'ه', 'ى', 'ي', 'م', 'ر', 'س', 'ل', 'ك', 'د',
];

fn random_word(rng: &mut StdRng, alphabet: &[char]) -> String {
    let len = rng.gen_range(2..8);
    (0..len)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
        .collect()
}

fn random_fragment(rng: &mut StdRng, word: &str) -> String {
    let chars: Vec<char> = word.chars().collect();
    let start = rng.gen_range(0..chars.len());
    let end = rng.gen_range(start + 1..=chars.len());
    chars[start..end].iter().collect()
}

#[test]
fn fragments_of_a_word_always_find_their_entry() {
    let latin: Vec<char> = ('a'..='z').chain('A'..='Z').collect();
    let mut rng = StdRng::seed_from_u64(0x4a5d);

    let entries: Vec<DictionaryEntry> = (0..40)
        .map(|_| DictionaryEntry {
            word_ar: Some(random_word(&mut rng, ARABIC_LETTERS)),
            word_en: Some(random_word(&mut rng, &latin)),
            image_url: None,
        })
        .collect();

    for _ in 0..500 {
        let index = rng.gen_range(0..entries.len());
        let entry = &entries[index];
        let source = if rng.gen_bool(0.5) {
            entry.word_ar.as_deref().unwrap()
        } else {
            entry.word_en.as_deref().unwrap()
        };
        let fragment = random_fragment(&mut rng, source);

        let matches = filter_entries(&entries, &fragment);
        assert!(
            matches.iter().any(|m| std::ptr::eq(*m, entry)),
            "fragment {:?} of {:?} missed its entry",
            fragment,
            source
        );

        let needle = normalize(&fragment);
        for m in matches {
            let ar = normalize(m.word_ar.as_deref().unwrap_or_default());
            let en = normalize(m.word_en.as_deref().unwrap_or_default());
            assert!(ar.contains(&needle) || en.contains(&needle));
        }
    }
}

#[test]
fn normalize_is_idempotent_on_random_text() {
    let mut rng = StdRng::seed_from_u64(7);
    let alphabet: Vec<char> = ARABIC_LETTERS
        .iter()
        .copied()
        .chain(['A', 'b', ' ', 'Z'])
        .collect();

    for _ in 0..200 {
        let text = random_word(&mut rng, &alphabet);
        let once = normalize(&text);
        assert_eq!(normalize(&once), once);
    }
}
