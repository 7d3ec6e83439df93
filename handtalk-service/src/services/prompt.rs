//! Loads the instruction text sent to the model with every image.

use crate::services::document_store::DocumentStore;
use serde_json::Value;
use std::sync::Arc;

/// Text used when the prompt document cannot be read.
pub const FALLBACK_PROMPT: &str = "Error: Could not load prompt.";

/// Field of the prompt document holding the instruction text.
pub const PROMPT_FIELD: &str = "prompt_text";

/// Prompt text, tagged with whether it came from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptText {
    Loaded(String),
    Degraded { text: String, cause: String },
}

impl PromptText {
    pub fn as_str(&self) -> &str {
        match self {
            PromptText::Loaded(text) => text,
            PromptText::Degraded { text, .. } => text,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PromptText::Degraded { .. })
    }

    fn degraded(cause: impl Into<String>) -> Self {
        PromptText::Degraded {
            text: FALLBACK_PROMPT.to_string(),
            cause: cause.into(),
        }
    }
}

#[derive(Clone)]
pub struct PromptLoader {
    store: Arc<dyn DocumentStore>,
    prompt_bin_id: String,
}

impl PromptLoader {
    pub fn new(store: Arc<dyn DocumentStore>, prompt_bin_id: impl Into<String>) -> Self {
        Self {
            store,
            prompt_bin_id: prompt_bin_id.into(),
        }
    }

    /// Fetch the current prompt. Never fails; see [`PromptText::Degraded`].
    pub async fn load(&self) -> PromptText {
        let prompt = match self.store.fetch(&self.prompt_bin_id).await {
            Ok(document) => extract_prompt(&document),
            Err(e) => PromptText::degraded(e.to_string()),
        };

        if let PromptText::Degraded { cause, .. } = &prompt {
            tracing::warn!(cause = %cause, "Falling back to default prompt");
            metrics::counter!("prompt_fallback_total").increment(1);
        }

        prompt
    }
}

fn extract_prompt(document: &Value) -> PromptText {
    let Some(fields) = document.as_object() else {
        return PromptText::degraded("prompt document is not an object");
    };

    match fields.get(PROMPT_FIELD) {
        None | Some(Value::Null) => PromptText::Loaded(String::new()),
        Some(Value::String(text)) => PromptText::Loaded(text.clone()),
        Some(_) => PromptText::degraded(format!("`{}` is not a string", PROMPT_FIELD)),
    }
}
