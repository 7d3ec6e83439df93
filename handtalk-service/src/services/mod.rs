pub mod activity;
pub mod dictionary;
pub mod document_store;
pub mod metrics;
pub mod normalize;
pub mod prompt;
pub mod providers;

pub use activity::{ActivityCounter, ActivityError, DICTIONARY_SEARCHES, IMAGES_ANALYZED};
pub use dictionary::{DictionarySearch, SearchError};
pub use document_store::{
    DocumentStore, JsonBinClient, JsonBinConfig, MemoryDocumentStore, StoreError,
};
pub use self::metrics::{get_metrics, init_metrics};
pub use normalize::normalize;
pub use prompt::{PromptLoader, PromptText, FALLBACK_PROMPT};
pub use providers::{
    gemini::{GeminiConfig, GeminiVisionProvider},
    mock::{MockBehaviour, MockVisionProvider},
    ImageError, ImageInput, ProviderError, ProviderResponse, VisionProvider,
};
