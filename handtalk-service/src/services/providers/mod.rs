//! AI provider abstractions and implementations.
//!
//! The handlers only see [`VisionProvider`], so the Gemini backend can be
//! swapped for the mock in tests.

pub mod gemini;
pub mod mock;

use async_trait::async_trait;
use image::{ImageFormat, ImageReader};
use std::io::Cursor;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Result of a provider response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// Generated text, if the model produced any.
    pub text: Option<String>,

    /// Input tokens consumed.
    pub input_tokens: i32,

    /// Output tokens generated.
    pub output_tokens: i32,

    /// Finish reason.
    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    pub fn from_gemini(reason: Option<&str>) -> Self {
        match reason {
            Some("STOP") | None => FinishReason::Complete,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") | Some("SPII") => {
                FinishReason::ContentFilter
            }
            Some(_) => FinishReason::Other,
        }
    }
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("cannot identify image file: {0}")]
    Unreadable(String),
}

/// An uploaded image that decoded successfully.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// MIME type sent to the model.
    pub mime_type: String,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ImageInput {
    /// Check that `data` is a readable image and settle its MIME type.
    ///
    /// The sniffed format wins over `declared_mime`, which comes from the
    /// client and is only trusted to start with `image/`.
    pub fn decode(data: Vec<u8>, declared_mime: &str) -> Result<Self, ImageError> {
        let reader = ImageReader::new(Cursor::new(data.as_slice()))
            .with_guessed_format()
            .map_err(|e| ImageError::Unreadable(e.to_string()))?;

        let format = reader.format();
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| ImageError::Unreadable(e.to_string()))?;

        let mime_type = format
            .and_then(mime_for_format)
            .unwrap_or(declared_mime)
            .to_string();

        Ok(Self {
            mime_type,
            data,
            width,
            height,
        })
    }
}

fn mime_for_format(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

/// Capability: given an instruction and an image, describe the image.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    async fn describe_image(
        &self,
        prompt: &str,
        image: &ImageInput,
    ) -> Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
pub(crate) mod test_images {
    use image::{ImageFormat, RgbaImage};
    use std::io::Cursor;

    /// A small PNG encoded on the fly.
    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        RgbaImage::new(width, height)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }
}
