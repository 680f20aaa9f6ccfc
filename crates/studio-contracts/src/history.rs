use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::HistoryStorage;

pub const PROMPT_HISTORY_KEY: &str = "promptHistory";
pub const PROMPT_HISTORY_CAP: usize = 20;
pub const IMAGE_HISTORY_KEY: &str = "imageHistory";
pub const IMAGE_HISTORY_CAP: usize = 50;

pub trait HistoryItem: Clone + Serialize + DeserializeOwned {
    fn key(&self) -> &str;

    /// Normalizes an item before it is recorded; `None` skips the record.
    fn prepare(self) -> Option<Self> {
        Some(self)
    }
}

impl HistoryItem for String {
    fn key(&self) -> &str {
        self.as_str()
    }

    fn prepare(self) -> Option<Self> {
        let trimmed = self.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHistoryEntry {
    /// `data:` URL of the generated image.
    pub url: String,
    pub prompt: String,
}

impl ImageHistoryEntry {
    pub fn new(url: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            prompt: prompt.into(),
        }
    }
}

impl HistoryItem for ImageHistoryEntry {
    fn key(&self) -> &str {
        self.url.as_str()
    }
}

/// Bounded most-recent-first list, deduplicated by [`HistoryItem::key`],
/// written through to storage on every change.
pub struct HistoryCache<T: HistoryItem> {
    storage_key: &'static str,
    cap: usize,
    entries: Vec<T>,
    storage: Arc<dyn HistoryStorage>,
}

pub type PromptHistory = HistoryCache<String>;
pub type ImageHistory = HistoryCache<ImageHistoryEntry>;

impl PromptHistory {
    pub fn prompts(storage: Arc<dyn HistoryStorage>) -> Self {
        Self::load(storage, PROMPT_HISTORY_KEY, PROMPT_HISTORY_CAP)
    }
}

impl ImageHistory {
    pub fn images(storage: Arc<dyn HistoryStorage>) -> Self {
        Self::load(storage, IMAGE_HISTORY_KEY, IMAGE_HISTORY_CAP)
    }
}

impl<T: HistoryItem> HistoryCache<T> {
    /// Restores the collection saved under `storage_key`. Missing or
    /// unreadable data starts an empty cache.
    pub fn load(storage: Arc<dyn HistoryStorage>, storage_key: &'static str, cap: usize) -> Self {
        let entries = match storage.get(storage_key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<T>>(&raw) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(key = storage_key, error = %err, "discarding malformed history");
                    Vec::new()
                }
            },
            Ok(None) => {
                debug!(key = storage_key, "no stored history");
                Vec::new()
            }
            Err(err) => {
                let detail = format!("{err:#}");
                warn!(key = storage_key, error = %detail, "failed to load history");
                Vec::new()
            }
        };

        let mut cache = Self {
            storage_key,
            cap,
            entries: Vec::with_capacity(entries.len().min(cap)),
            storage,
        };
        for entry in entries {
            if cache.entries.len() >= cap {
                break;
            }
            let Some(entry) = entry.prepare() else {
                continue;
            };
            if cache.position(entry.key()).is_none() {
                cache.entries.push(entry);
            }
        }
        cache
    }

    pub fn record(&mut self, item: T) {
        let Some(item) = item.prepare() else {
            return;
        };
        if let Some(existing) = self.position(item.key()) {
            self.entries.remove(existing);
        }
        self.entries.insert(0, item);
        self.entries.truncate(self.cap);
        self.persist();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key() == key)
    }

    fn persist(&self) {
        let limit = self.entries.len().min(self.cap);
        let raw = match serde_json::to_string(&self.entries[..limit]) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = self.storage_key, error = %err, "failed to serialize history");
                return;
            }
        };
        if let Err(err) = self.storage.set(self.storage_key, &raw) {
            let detail = format!("{err:#}");
            warn!(key = self.storage_key, error = %detail, "failed to save history");
        }
    }
}

impl<T: HistoryItem + fmt::Debug> fmt::Debug for HistoryCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryCache")
            .field("storage_key", &self.storage_key)
            .field("cap", &self.cap)
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::storage::{FileStorage, HistoryStorage, MemoryStorage};

    use super::*;

    fn memory() -> Arc<MemoryStorage> {
        Arc::new(MemoryStorage::new())
    }

    #[test]
    fn duplicate_prompt_moves_to_front() {
        let mut history = PromptHistory::prompts(memory());
        history.record("cat".to_string());
        history.record("dog".to_string());
        history.record("cat".to_string());
        assert_eq!(history.entries(), ["cat", "dog"]);
    }

    #[test]
    fn recording_same_prompt_twice_keeps_one_entry() {
        let mut history = PromptHistory::prompts(memory());
        history.record("sunset".to_string());
        history.record("sunset".to_string());
        assert_eq!(history.len(), 1);
        assert_eq!(history.latest().map(String::as_str), Some("sunset"));
    }

    #[test]
    fn prompts_are_trimmed_and_blank_prompts_skipped() {
        let storage = memory();
        let mut history = PromptHistory::prompts(storage.clone());
        history.record("   ".to_string());
        assert!(history.is_empty());
        assert_eq!(storage.get(PROMPT_HISTORY_KEY).ok().flatten(), None);

        history.record("  owl  ".to_string());
        history.record("owl".to_string());
        assert_eq!(history.entries(), ["owl"]);
    }

    #[test]
    fn prompt_history_caps_at_twenty_most_recent() {
        let mut history = PromptHistory::prompts(memory());
        for idx in 0..25 {
            history.record(format!("prompt {idx}"));
        }
        assert_eq!(history.len(), PROMPT_HISTORY_CAP);
        assert_eq!(history.get(0).map(String::as_str), Some("prompt 24"));
        assert_eq!(history.get(19).map(String::as_str), Some("prompt 5"));
    }

    #[test]
    fn image_history_caps_at_fifty_and_dedupes_by_url() {
        let storage = memory();
        let mut history = ImageHistory::images(storage.clone());
        for idx in 0..60 {
            history.record(ImageHistoryEntry::new(format!("data:image/png;base64,{idx}"), "p"));
        }
        assert_eq!(history.len(), IMAGE_HISTORY_CAP);
        assert_eq!(history.get(0).map(|e| e.url.as_str()), Some("data:image/png;base64,59"));

        history.record(ImageHistoryEntry::new("data:image/png;base64,30", "again"));
        assert_eq!(history.len(), IMAGE_HISTORY_CAP);
        assert_eq!(history.get(0).map(|e| e.prompt.as_str()), Some("again"));
        assert_eq!(
            history
                .entries()
                .iter()
                .filter(|entry| entry.url.ends_with(",30"))
                .count(),
            1
        );

        let raw = storage.get(IMAGE_HISTORY_KEY).ok().flatten().unwrap_or_default();
        let persisted: Vec<ImageHistoryEntry> = serde_json::from_str(&raw).unwrap_or_default();
        assert_eq!(persisted.len(), IMAGE_HISTORY_CAP);
    }

    #[test]
    fn history_survives_reload() {
        let storage = memory();
        let mut history = PromptHistory::prompts(storage.clone());
        history.record("first".to_string());
        history.record("second".to_string());

        let reloaded = PromptHistory::prompts(storage);
        assert_eq!(reloaded.entries(), ["second", "first"]);
    }

    #[test]
    fn clear_then_load_is_empty() {
        let storage = memory();
        let mut history = ImageHistory::images(storage.clone());
        history.record(ImageHistoryEntry::new("data:image/png;base64,AA", "fox"));
        history.clear();
        assert!(history.is_empty());

        let reloaded = ImageHistory::images(storage.clone());
        assert!(reloaded.is_empty());
        assert_eq!(storage.get(IMAGE_HISTORY_KEY).ok().flatten().as_deref(), Some("[]"));
    }

    #[test]
    fn malformed_data_loads_empty() {
        let storage = memory();
        storage.insert_raw(PROMPT_HISTORY_KEY, "{\"not\": \"an array\"");
        storage.insert_raw(IMAGE_HISTORY_KEY, "[1, 2, 3]");
        assert!(PromptHistory::prompts(storage.clone()).is_empty());
        assert!(ImageHistory::images(storage).is_empty());
    }

    #[test]
    fn oversized_or_duplicated_payload_is_normalized_on_load() {
        let storage = memory();
        let rows: Vec<String> = (0..30).map(|idx| format!("p{}", idx % 25)).collect();
        storage.insert_raw(
            PROMPT_HISTORY_KEY,
            &serde_json::to_string(&rows).unwrap_or_default(),
        );
        let history = PromptHistory::prompts(storage);
        assert_eq!(history.len(), PROMPT_HISTORY_CAP);
        assert_eq!(history.get(0).map(String::as_str), Some("p0"));
    }

    #[test]
    fn hand_edited_blank_prompts_are_dropped_on_load() {
        let storage = memory();
        storage.insert_raw(PROMPT_HISTORY_KEY, r#"["  ", " cat ", "", "cat", "dog"]"#);
        let history = PromptHistory::prompts(storage);
        assert_eq!(history.entries(), ["cat", "dog"]);
    }

    #[test]
    fn storage_failures_degrade_to_memory_only() {
        let storage = Arc::new(MemoryStorage::failing(true, true));
        let mut history = PromptHistory::prompts(storage);
        assert!(history.is_empty());
        history.record("still works".to_string());
        assert_eq!(history.entries(), ["still works"]);
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn file_backed_caches_share_one_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let storage: Arc<dyn HistoryStorage> =
            Arc::new(FileStorage::new(temp.path().join("history.json")));
        let mut prompts = PromptHistory::prompts(storage.clone());
        let mut images = ImageHistory::images(storage.clone());
        prompts.record("a red fox".to_string());
        images.record(ImageHistoryEntry::new("data:image/png;base64,Zm94", "a red fox"));

        let prompts = PromptHistory::prompts(storage.clone());
        let images = ImageHistory::images(storage);
        assert_eq!(prompts.entries(), ["a red fox"]);
        assert_eq!(images.entries()[0].url, "data:image/png;base64,Zm94");
        Ok(())
    }

    #[test]
    fn image_entries_serialize_as_url_and_prompt() -> anyhow::Result<()> {
        let raw = serde_json::to_string(&ImageHistoryEntry::new("data:x", "y"))?;
        assert_eq!(raw, "{\"url\":\"data:x\",\"prompt\":\"y\"}");
        Ok(())
    }
}
