use serde::{Deserialize, Serialize};

/// One sign in the dictionary document.
///
/// Entries are edited by hand, so every field may be missing or null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    /// Arabic word.
    #[serde(default)]
    pub word_ar: Option<String>,

    /// English word.
    #[serde(default)]
    pub word_en: Option<String>,

    /// Illustration of the sign.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A dictionary match as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub thumbnail_link: String,
}

impl From<&DictionaryEntry> for SearchResult {
    fn from(entry: &DictionaryEntry) -> Self {
        Self {
            title: entry
                .word_ar
                .clone()
                .unwrap_or_else(|| "No Title".to_string()),
            thumbnail_link: entry.image_url.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_sparse_entries() {
        let entry: DictionaryEntry =
            serde_json::from_value(json!({"word_en": "Tree", "word_ar": null, "extra": true}))
                .unwrap();
        assert_eq!(entry.word_ar, None);
        assert_eq!(entry.word_en.as_deref(), Some("Tree"));

        let result = SearchResult::from(&entry);
        assert_eq!(result.title, "No Title");
        assert_eq!(result.thumbnail_link, "");
    }
}
