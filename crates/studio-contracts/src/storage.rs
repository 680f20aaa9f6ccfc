use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Context};
use serde_json::{Map, Value};
use tracing::warn;

/// String key-value persistence behind the history caches, shaped like
/// browser local storage: every value is an opaque string.
pub trait HistoryStorage: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage whose reads and/or writes always error, for exercising the
    /// degraded paths.
    pub fn failing(fail_reads: bool, fail_writes: bool) -> Self {
        Self {
            values: Mutex::new(BTreeMap::new()),
            fail_reads,
            fail_writes,
        }
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
    }
}

impl HistoryStorage for MemoryStorage {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        if self.fail_reads {
            bail!("memory storage read disabled");
        }
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.fail_writes {
            bail!("memory storage write disabled");
        }
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow!("memory storage lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON object file holding every key. Writes re-read the file and only
/// replace their own key so independent writers sharing the file keep each
/// other's values.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStorage for FileStorage {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let payload = read_json_object(&self.path)?;
        Ok(payload.get(key).and_then(Value::as_str).map(str::to_string))
    }

    /// Rewrites the file keeping the other keys. A missing or unparsable
    /// file starts from an empty object; any other read error aborts so
    /// the other cache's data is never dropped.
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut on_disk = match std::fs::read_to_string(&self.path) {
            Ok(raw) => parse_json_object(&self.path, &raw).unwrap_or_else(|err| {
                let detail = format!("{err:#}");
                warn!(
                    path = %self.path.display(),
                    error = %detail,
                    "replacing unparsable history file"
                );
                Map::new()
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Map::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed reading {}", self.path.display()))
            }
        };
        on_disk.insert(key.to_string(), Value::String(value.to_string()));
        write_json_object(&self.path, &on_disk)
    }
}

fn read_json_object(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed reading {}", path.display()))?;
    parse_json_object(path, &raw)
}

fn parse_json_object(path: &Path, raw: &str) -> anyhow::Result<Map<String, Value>> {
    let parsed: Value = serde_json::from_str(raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    match parsed {
        Value::Object(obj) => Ok(obj),
        _ => bail!("{} is not a JSON object", path.display()),
    }
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )
    .with_context(|| format!("failed writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{FileStorage, HistoryStorage, MemoryStorage};

    #[test]
    fn file_storage_roundtrip() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let storage = FileStorage::new(temp.path().join("storage.json"));
        assert_eq!(storage.get("promptHistory")?, None);
        storage.set("promptHistory", "[\"cat\"]")?;
        assert_eq!(storage.get("promptHistory")?.as_deref(), Some("[\"cat\"]"));
        Ok(())
    }

    #[test]
    fn file_storage_keeps_other_writers_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("storage.json");
        let storage_a = FileStorage::new(&path);
        let storage_b = FileStorage::new(&path);

        storage_a.set("a", "1")?;
        storage_b.set("b", "2")?;
        storage_a.set("c", "3")?;

        let reloaded = FileStorage::new(path);
        assert_eq!(reloaded.get("a")?.as_deref(), Some("1"));
        assert_eq!(reloaded.get("b")?.as_deref(), Some("2"));
        assert_eq!(reloaded.get("c")?.as_deref(), Some("3"));
        Ok(())
    }

    #[test]
    fn file_storage_creates_parent_directories() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("dir").join("storage.json");
        FileStorage::new(&path).set("k", "v")?;
        assert!(path.exists());
        Ok(())
    }

    #[test]
    fn file_storage_reports_corrupt_file_on_read() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("storage.json");
        std::fs::write(&path, "{not json")?;
        let storage = FileStorage::new(&path);
        assert!(storage.get("k").is_err());

        // a write replaces the corrupt file instead of failing forever
        storage.set("k", "v")?;
        assert_eq!(storage.get("k")?.as_deref(), Some("v"));
        Ok(())
    }

    #[test]
    fn file_storage_write_aborts_when_file_cannot_be_read() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        // a directory at the storage path fails every read without being missing
        let path = temp.path().join("storage.json");
        std::fs::create_dir_all(&path)?;
        let storage = FileStorage::new(&path);
        assert!(storage.set("k", "v").is_err());
        assert!(path.is_dir());
        Ok(())
    }

    #[test]
    fn memory_storage_failure_injection() {
        let storage = MemoryStorage::failing(true, true);
        assert!(storage.get("k").is_err());
        assert!(storage.set("k", "v").is_err());
    }
}
