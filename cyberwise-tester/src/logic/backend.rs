use std::path::{Path, PathBuf};

use cyberwise_game::{FileBackend, MemoryBackend, StorageBackend, StorageError};

/// Storage a scenario iteration runs against.
#[derive(Debug, Clone)]
pub enum HarnessBackend {
    Memory(MemoryBackend),
    File(FileBackend),
}

impl HarnessBackend {
    /// Fresh storage for one iteration. With a save directory every
    /// iteration gets its own JSON file so runs can be inspected afterwards;
    /// a file left by an earlier run of the same seed is discarded.
    pub fn fresh(save_dir: Option<&Path>, scenario: &str, seed: u64) -> Self {
        let Some(dir) = save_dir else {
            return Self::Memory(MemoryBackend::new());
        };
        let path = save_path(dir, scenario, seed);
        if path.exists() && std::fs::remove_file(&path).is_err() {
            log::warn!("could not clear stale save {}", path.display());
        }
        Self::File(FileBackend::new(path))
    }

    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
        }
    }
}

fn save_path(dir: &Path, scenario: &str, seed: u64) -> PathBuf {
    dir.join(scenario).join(format!("seed-{seed}.json"))
}

impl StorageBackend for HarnessBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self {
            Self::Memory(backend) => backend.get_item(key),
            Self::File(backend) => backend.get_item(key),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(backend) => backend.set_item(key, value),
            Self::File(backend) => backend.set_item(key, value),
        }
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match self {
            Self::Memory(backend) => backend.remove_item(key),
            Self::File(backend) => backend.remove_item(key),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        match self {
            Self::Memory(backend) => backend.keys(),
            Self::File(backend) => backend.keys(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_without_dir_is_memory() {
        let backend = HarnessBackend::fresh(None, "smoke", 1);
        assert_eq!(backend.label(), "memory");
        backend.set_item("k", "v").unwrap();
        assert_eq!(backend.get_item("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn fresh_with_dir_uses_per_seed_file() {
        let dir = std::env::temp_dir().join("cyberwise-harness-backend");
        let backend = HarnessBackend::fresh(Some(&dir), "career", 42);
        let HarnessBackend::File(file) = &backend else {
            panic!("expected file backend");
        };
        assert!(file.path().ends_with("career/seed-42.json"));
        let _ = std::fs::remove_dir_all(dir);
    }
}
