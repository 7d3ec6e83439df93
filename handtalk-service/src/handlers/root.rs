use crate::dtos::WelcomeResponse;
use axum::Json;

pub async fn root() -> Json<WelcomeResponse> {
    tracing::debug!("Root endpoint accessed");
    Json(WelcomeResponse {
        message: "Welcome to Handtalk Main API".to_string(),
    })
}
