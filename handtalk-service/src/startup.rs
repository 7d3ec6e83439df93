use crate::config::{BinIds, HandtalkConfig, HttpSettings};
use crate::handlers;
use crate::services::{
    ActivityCounter, DictionarySearch, DocumentStore, GeminiConfig, GeminiVisionProvider,
    JsonBinClient, JsonBinConfig, PromptLoader, VisionProvider,
};
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request},
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub vision: Arc<dyn VisionProvider>,
    pub prompts: PromptLoader,
    pub activity: ActivityCounter,
    pub dictionary: DictionarySearch,
}

impl AppState {
    pub fn new(
        bins: &BinIds,
        store: Arc<dyn DocumentStore>,
        vision: Arc<dyn VisionProvider>,
    ) -> Self {
        Self {
            vision,
            prompts: PromptLoader::new(store.clone(), bins.prompt.clone()),
            activity: ActivityCounter::new(store.clone(), bins.statistics.clone()),
            dictionary: DictionarySearch::new(store, bins.dictionary.clone()),
        }
    }
}

pub fn build_router(state: AppState, http: &HttpSettings) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/analyze-image/", post(handlers::analyze_image))
        .route("/analyze-image", post(handlers::analyze_image))
        .route("/search-dictionary/", get(handlers::search_dictionary))
        .route("/search-dictionary", get(handlers::search_dictionary))
        .layer(DefaultBodyLimit::max(http.max_upload_bytes))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&http.cors_origins))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Credentialed CORS for the configured origins. Methods and headers are
/// mirrored from the preflight since wildcards cannot be combined with credentials.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
}

impl Application {
    pub async fn build(config: HandtalkConfig) -> Result<Self, AppError> {
        let store: Arc<dyn DocumentStore> = Arc::new(
            JsonBinClient::new(JsonBinConfig {
                base_url: config.jsonbin.base_url.clone(),
                api_key: config.jsonbin.api_key.clone(),
                timeout: config.jsonbin.timeout(),
                retry_max_elapsed: config.jsonbin.retry_max_elapsed(),
            })
            .map_err(|e| {
                tracing::error!("Failed to create document store client: {}", e);
                AppError::InternalError(anyhow::Error::new(e))
            })?,
        );

        let vision: Arc<dyn VisionProvider> = Arc::new(
            GeminiVisionProvider::new(GeminiConfig {
                api_key: config.gemini.api_key.clone(),
                model: config.gemini.model.clone(),
                base_url: config.gemini.base_url.clone(),
                timeout: config.gemini.timeout(),
            })
            .map_err(|e| {
                tracing::error!("Failed to create Gemini provider: {}", e);
                AppError::InternalError(anyhow::Error::new(e))
            })?,
        );

        tracing::info!(
            model = %config.gemini.model,
            origins = ?config.http.cors_origins,
            "Handtalk service configured"
        );

        let state = AppState::new(&config.jsonbin.bins, store, vision);
        let app = build_router(state, &config.http);

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .into_future();

        Ok(Self {
            port,
            server: Box::new(server),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
