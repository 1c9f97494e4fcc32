use std::cell::{Cell, RefCell};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{ConfigLoadError, ConfigWriteError};
use crate::rules::RuleStore;

/// Durable home of the rule store.
pub trait RuleBackend {
    /// A missing resource is an empty store, not an error.
    fn load(&self) -> Result<RuleStore, ConfigLoadError>;

    fn flush(&self, store: &RuleStore) -> Result<(), ConfigWriteError>;
}

/// The human-editable TOML rule file.
pub struct TomlRuleFile {
    path: PathBuf,
}

impl TomlRuleFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: std::io::Error) -> ConfigWriteError {
        ConfigWriteError {
            path: self.path.clone(),
            source,
        }
    }
}

impl RuleBackend for TomlRuleFile {
    fn load(&self) -> Result<RuleStore, ConfigLoadError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "Rule file {} not found, starting with empty rules",
                    self.path.display()
                );
                return Ok(RuleStore::empty());
            }
            Err(source) => {
                return Err(ConfigLoadError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let store = RuleStore::from_toml(&content)?;
        tracing::info!(
            "Loaded {} keywords from {}",
            store.len(),
            self.path.display()
        );
        Ok(store)
    }

    /// Writes to a sibling temp file, syncs it and renames it over the
    /// target, so readers see either the old file or the new one.
    fn flush(&self, store: &RuleStore) -> Result<(), ConfigWriteError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.write_err(e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.write_err(e))?;
        tmp.write_all(store.to_toml().as_bytes())
            .map_err(|e| self.write_err(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.write_err(e.error))?;

        tracing::info!("Saved {} keywords to {}", store.len(), self.path.display());
        Ok(())
    }
}

/// Keeps the store in memory. Used for dry runs and as a test double that
/// counts flushes.
#[derive(Debug, Default)]
pub struct MemoryRules {
    store: RefCell<RuleStore>,
    flushes: Cell<usize>,
    fail_flush: bool,
}

impl MemoryRules {
    pub fn new(store: RuleStore) -> Self {
        Self {
            store: RefCell::new(store),
            ..Self::default()
        }
    }

    /// Every flush fails with an I/O error.
    pub fn failing(store: RuleStore) -> Self {
        Self {
            fail_flush: true,
            ..Self::new(store)
        }
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.get()
    }

    /// The store as of the last successful flush.
    pub fn snapshot(&self) -> RuleStore {
        self.store.borrow().clone()
    }
}

impl RuleBackend for MemoryRules {
    fn load(&self) -> Result<RuleStore, ConfigLoadError> {
        Ok(self.store.borrow().clone())
    }

    fn flush(&self, store: &RuleStore) -> Result<(), ConfigWriteError> {
        self.flushes.set(self.flushes.get() + 1);
        if self.fail_flush {
            return Err(ConfigWriteError {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::new(std::io::ErrorKind::Other, "simulated write failure"),
            });
        }
        *self.store.borrow_mut() = store.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spendsort_core::Category;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TomlRuleFile::new(dir.path().join("rules.toml"));
        let store = backend.load().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.iter().count(), Category::ALL.len());
    }

    #[test]
    fn flush_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = TomlRuleFile::new(dir.path().join("nested").join("rules.toml"));
        let store = RuleStore::from_rules([
            (Category::Food, vec!["starbucks"]),
            (Category::Travel, vec!["delta air", "alaska air"]),
        ]);
        backend.flush(&store).unwrap();
        assert_eq!(backend.load().unwrap(), store);

        // Only the target file remains; the temp file was renamed away.
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn flush_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, "Food = [\"old\"]\n").unwrap();
        let backend = TomlRuleFile::new(&path);

        let mut store = backend.load().unwrap();
        store.learn(Category::Food, "new");
        backend.flush(&store).unwrap();

        let reloaded = backend.load().unwrap();
        assert_eq!(reloaded.keywords(Category::Food), ["old", "new"]);
    }

    #[test]
    fn malformed_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.toml");
        std::fs::write(&path, "Groceries = [\"safeway\"]\n").unwrap();
        assert!(matches!(
            TomlRuleFile::new(&path).load(),
            Err(ConfigLoadError::UnknownCategory(_))
        ));
    }

    #[test]
    fn flush_into_unwritable_location_is_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let backend = TomlRuleFile::new(blocker.join("rules.toml"));
        let err = backend.flush(&RuleStore::empty()).unwrap_err();
        assert_eq!(err.path, blocker.join("rules.toml"));
    }

    #[test]
    fn memory_backend_counts_flushes() {
        let backend = MemoryRules::default();
        let mut store = backend.load().unwrap();
        store.learn(Category::Food, "pizza");
        backend.flush(&store).unwrap();
        assert_eq!(backend.flush_count(), 1);
        assert_eq!(backend.snapshot(), store);

        let failing = MemoryRules::failing(RuleStore::empty());
        assert!(failing.flush(&store).is_err());
        assert_eq!(failing.flush_count(), 1);
        assert!(failing.snapshot().is_empty());
    }
}
