//! Mock vision provider for testing.

use super::{FinishReason, ImageInput, ProviderError, ProviderResponse, VisionProvider};
use async_trait::async_trait;
use std::sync::Mutex;

/// What the mock returns from [`VisionProvider::describe_image`].
#[derive(Debug, Clone)]
pub enum MockBehaviour {
    /// Answer with this text.
    Reply(String),
    /// Complete without producing any text.
    Empty,
    /// Block the response on safety grounds.
    Filtered,
    /// Fail with an API error carrying this message.
    Fail(String),
}

/// Mock vision provider that records every prompt it receives.
pub struct MockVisionProvider {
    behaviour: MockBehaviour,
    prompts: Mutex<Vec<String>>,
}

impl MockVisionProvider {
    pub fn new(behaviour: MockBehaviour) -> Self {
        Self {
            behaviour,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: impl Into<String>) -> Self {
        Self::new(MockBehaviour::Reply(text.into()))
    }

    /// Prompts seen so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl VisionProvider for MockVisionProvider {
    async fn describe_image(
        &self,
        prompt: &str,
        image: &ImageInput,
    ) -> Result<ProviderResponse, ProviderError> {
        match self.prompts.lock() {
            Ok(mut prompts) => prompts.push(prompt.to_string()),
            Err(poisoned) => poisoned.into_inner().push(prompt.to_string()),
        }

        let input_tokens = (prompt.len() + image.data.len()) as i32 / 4;

        match &self.behaviour {
            MockBehaviour::Reply(text) => Ok(ProviderResponse {
                text: Some(text.clone()),
                input_tokens,
                output_tokens: text.len() as i32 / 4,
                finish_reason: FinishReason::Complete,
            }),
            MockBehaviour::Empty => Ok(ProviderResponse {
                text: None,
                input_tokens,
                output_tokens: 0,
                finish_reason: FinishReason::Complete,
            }),
            MockBehaviour::Filtered => Err(ProviderError::ContentFiltered),
            MockBehaviour::Fail(message) => Err(ProviderError::ApiError(message.clone())),
        }
    }
}
