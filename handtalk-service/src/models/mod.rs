//! Domain models for the handtalk service.

pub mod dictionary;

pub use dictionary::{DictionaryEntry, SearchResult};
