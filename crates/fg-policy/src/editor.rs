// editor.rs — Read/write access to the permanent allowlist.
//
// Backs the administration surface (`fg sections`). Saving applies the
// same sanitization the PolicyStore applies on load, so what the operator
// sees after saving is exactly what pages will enforce.

use std::sync::Arc;

use serde_json::Value;

use crate::error::PolicyError;
use crate::section::{sanitize_sections, sections_from_value};
use crate::storage::{KeyValueStore, StorageArea, SECTIONS_KEY};

pub struct SectionsEditor {
    storage: Arc<dyn KeyValueStore>,
    defaults: Vec<String>,
}

impl SectionsEditor {
    pub fn new(storage: Arc<dyn KeyValueStore>, defaults: Vec<String>) -> Self {
        Self { storage, defaults }
    }

    /// The stored allowlist, sanitized (defaults when unset or unreadable).
    pub async fn load(&self) -> Vec<String> {
        let value = self
            .storage
            .get(
                StorageArea::Sync,
                SECTIONS_KEY,
                Value::from(self.defaults.clone()),
            )
            .await;
        sections_from_value(&value, &self.defaults)
    }

    /// Sanitize and store a new allowlist. Returns what was stored.
    pub fn save<I, S>(&self, lines: I) -> Result<Vec<String>, PolicyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sections = sanitize_sections(lines, &self.defaults);
        self.storage
            .set(StorageArea::Sync, SECTIONS_KEY, Value::from(sections.clone()))?;
        tracing::info!(sections = ?sections, "allowlist saved");
        Ok(sections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::default_sections;
    use crate::storage::MemoryStorage;

    #[tokio::test]
    async fn load_without_stored_value_returns_defaults() {
        let editor = SectionsEditor::new(Arc::new(MemoryStorage::new()), default_sections());
        assert_eq!(editor.load().await, vec!["freelance"]);
    }

    #[tokio::test]
    async fn save_sanitizes_before_storing() {
        let storage = Arc::new(MemoryStorage::new());
        let shared: Arc<dyn KeyValueStore> = storage.clone();
        let editor = SectionsEditor::new(shared, default_sections());
        let saved = editor.save(["r/Rust", "", "rust", "/r/learnrust"]).unwrap();
        assert_eq!(saved, vec!["rust", "learnrust"]);
        assert_eq!(editor.load().await, saved);
        assert_eq!(
            storage.peek(StorageArea::Sync, SECTIONS_KEY),
            Some(serde_json::json!(["rust", "learnrust"]))
        );
    }

    #[test]
    fn saving_nothing_stores_defaults() {
        let editor = SectionsEditor::new(Arc::new(MemoryStorage::new()), default_sections());
        let empty: Vec<&str> = Vec::new();
        assert_eq!(editor.save(empty).unwrap(), vec!["freelance"]);
    }
}
