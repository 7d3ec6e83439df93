use crate::dtos::AnalysisResponse;
use crate::services::{ImageInput, ProviderError, IMAGES_ANALYZED};
use crate::startup::AppState;
use axum::{
    extract::{Multipart, State},
    Json,
};
use service_core::error::AppError;

/// Name of the multipart field carrying the upload.
pub const FILE_FIELD: &str = "file";

pub const NOT_AN_IMAGE: &str = "File must be an image.";
pub const SAFETY_FILTERED: &str = "AI model failed to analyze the image due to safety filters.";

struct Upload {
    content_type: String,
    data: Vec<u8>,
}

pub async fn analyze_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, AppError> {
    let outcome = analyze(&state, multipart).await;

    let label = match &outcome {
        Ok(_) => "success",
        Err(AppError::BadRequest(_)) => "rejected",
        Err(AppError::Upstream(message)) if message == SAFETY_FILTERED => "filtered",
        Err(_) => "error",
    };
    metrics::counter!("image_analyses_total", "outcome" => label).increment(1);

    outcome.map(Json)
}

async fn analyze(state: &AppState, multipart: Multipart) -> Result<AnalysisResponse, AppError> {
    let upload = read_upload(multipart).await?;

    if !upload.content_type.starts_with("image/") {
        return Err(AppError::bad_request(NOT_AN_IMAGE));
    }

    let prompt = state.prompts.load().await;

    let image = ImageInput::decode(upload.data, &upload.content_type).map_err(|e| {
        tracing::warn!(error = %e, content_type = %upload.content_type, "Uploaded image is unreadable");
        internal_error(e)
    })?;

    tracing::debug!(
        width = image.width,
        height = image.height,
        mime_type = %image.mime_type,
        degraded_prompt = prompt.is_degraded(),
        "Analyzing image"
    );

    let response = match state.vision.describe_image(prompt.as_str(), &image).await {
        Ok(response) => response,
        Err(ProviderError::ContentFiltered) => {
            tracing::warn!("Image analysis blocked by safety filters");
            return Err(AppError::upstream(SAFETY_FILTERED));
        }
        Err(e) => {
            tracing::error!(error = %e, "Image analysis failed");
            return Err(internal_error(e));
        }
    };

    let Some(text) = response.text.filter(|text| !text.trim().is_empty()) else {
        tracing::warn!(
            finish_reason = ?response.finish_reason,
            "Model returned no text"
        );
        return Err(AppError::upstream(SAFETY_FILTERED));
    };

    tracing::info!(
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        "Image analyzed"
    );

    state.activity.spawn_increment(IMAGES_ANALYZED);

    Ok(AnalysisResponse {
        analysis_result: text,
    })
}

/// Take the `file` field, skipping any other fields.
async fn read_upload(mut multipart: Multipart) -> Result<Upload, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read file bytes: {}", e)))?
            .to_vec();

        return Ok(Upload { content_type, data });
    }

    Err(AppError::bad_request("No file uploaded"))
}

fn internal_error(cause: impl std::fmt::Display) -> AppError {
    AppError::upstream(format!("An internal error occurred: {}", cause))
}
