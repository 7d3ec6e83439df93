#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, Response};
use axum::Router;
use handtalk_service::config::{
    BinIds, GeminiSettings, HandtalkConfig, HttpSettings, JsonBinSettings,
};
use handtalk_service::services::{DocumentStore, MemoryDocumentStore, VisionProvider};
use handtalk_service::startup::{build_router, AppState, Application};
use image::{ImageFormat, RgbaImage};
use secrecy::SecretString;
use serde_json::{json, Value};
use service_core::config::Config as CoreConfig;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

pub const DICTIONARY_BIN: &str = "dictionary-bin-0001";
pub const STATS_BIN: &str = "stats-bin-0002";
pub const PROMPT_BIN: &str = "prompt-bin-0003";

pub const TEST_PROMPT: &str = "Describe the hand sign in this picture.";
pub const TEST_ORIGIN: &str = "https://handtalk.test";

const BOUNDARY: &str = "handtalk-test-boundary";

pub fn bins() -> BinIds {
    BinIds {
        dictionary: DICTIONARY_BIN.to_string(),
        statistics: STATS_BIN.to_string(),
        prompt: PROMPT_BIN.to_string(),
    }
}

pub fn http_settings() -> HttpSettings {
    HttpSettings {
        cors_origins: vec![TEST_ORIGIN.to_string()],
        max_upload_bytes: 1024 * 1024,
    }
}

/// A store seeded with a prompt, empty statistics and a small dictionary.
pub fn seeded_store() -> Arc<MemoryDocumentStore> {
    Arc::new(
        MemoryDocumentStore::new()
            .with_document(PROMPT_BIN, json!({ "prompt_text": TEST_PROMPT }))
            .with_document(STATS_BIN, json!({}))
            .with_document(
                DICTIONARY_BIN,
                json!([
                    {"word_ar": "أهلا", "word_en": "Hello", "image_url": "https://img.test/hello.png"},
                    {"word_ar": "مدرسة", "word_en": "School", "image_url": "https://img.test/school.png"},
                    {"word_en": "Thank you"},
                    {"word_ar": "إشارة", "word_en": "Sign", "image_url": null}
                ]),
            ),
    )
}

pub fn router(store: Arc<MemoryDocumentStore>, vision: Arc<dyn VisionProvider>) -> Router {
    let store: Arc<dyn DocumentStore> = store;
    build_router(AppState::new(&bins(), store, vision), &http_settings())
}

/// A small PNG encoded on the fly.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    RgbaImage::new(width, height)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode test png");
    out.into_inner()
}

/// A multipart/form-data request carrying one file field.
pub fn upload_request(uri: &str, field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.bin\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `store` until the statistics document equals `expected`.
pub async fn wait_for_stats(store: &MemoryDocumentStore, expected: Value) -> bool {
    for _ in 0..50 {
        if store.get(STATS_BIN).as_ref() == Some(&expected) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// A running server wired to mock JSONBin and Gemini endpoints.
pub struct TestApp {
    pub address: String,
    pub port: u16,
}

impl TestApp {
    pub async fn spawn(jsonbin_uri: &str, gemini_uri: &str) -> Self {
        let config = HandtalkConfig {
            common: CoreConfig { port: 0 },
            gemini: GeminiSettings {
                api_key: SecretString::new("test-gemini-key".to_string()),
                model: "gemini-1.5-flash".to_string(),
                base_url: format!("{}/v1beta", gemini_uri),
                timeout_secs: 5,
            },
            jsonbin: JsonBinSettings {
                api_key: SecretString::new("test-master-key".to_string()),
                base_url: format!("{}/v3/b", jsonbin_uri),
                timeout_secs: 5,
                retry_max_elapsed_ms: 0,
                bins: bins(),
            },
            http: http_settings(),
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        TestApp { address, port }
    }
}
