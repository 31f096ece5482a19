//! Production `GraphStore`: one RocksDB handle per project, lazily opened
//! under `<base_dir>/<project_uuid>/store/`. WAL-backed, fsync-on-commit for
//! single `put`s, one shared fsync per `batch_save`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use rocksdb::{DB, IteratorMode, Options, WriteBatch, WriteOptions};
use tokio_util::sync::CancellationToken;

use super::{Entry, GraphStore, keys};
use crate::error::{StoreError, StoreResult};

const ENGINE_SUBDIR: &str = "store";

pub struct RocksStore {
    base_dir: PathBuf,
    handles: DashMap<String, Arc<DB>>,
    closed: std::sync::atomic::AtomicBool,
}

impl RocksStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            handles: DashMap::new(),
            closed: std::sync::atomic::AtomicBool::new(false),
        }
    }

    fn project_dir(&self, project: &str) -> PathBuf {
        self.base_dir.join(project).join(ENGINE_SUBDIR)
    }

    fn handle(&self, project: &str) -> StoreResult<Arc<DB>> {
        if self.closed.load(std::sync::atomic::Ordering::Acquire) {
            return Err(StoreError::StoreClosed { project: project.to_string() });
        }
        if let Some(existing) = self.handles.get(project) {
            return Ok(existing.clone());
        }
        let dir = self.project_dir(project);
        let db = self.open_or_recreate(project, &dir)?;
        let db = Arc::new(db);
        self.handles.insert(project.to_string(), db.clone());
        Ok(db)
    }

    /// Open the project's store, purging and recreating on integrity
    /// failure rather than surfacing corruption to the caller.
    fn open_or_recreate(&self, project: &str, dir: &Path) -> StoreResult<DB> {
        std::fs::create_dir_all(dir)?;
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        match DB::open(&opts, dir) {
            Ok(db) => Ok(db),
            Err(e) => {
                tracing::warn!(
                    project,
                    path = %dir.display(),
                    error = %e,
                    "store integrity check failed, purging project namespace"
                );
                std::fs::remove_dir_all(dir)?;
                std::fs::create_dir_all(dir)?;
                DB::open(&opts, dir).map_err(StoreError::from)
            }
        }
    }
}

impl GraphStore for RocksStore {
    fn put(&self, project: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        keys::validate_key(key)?;
        let db = self.handle(project)?;
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        db.put_opt(key.as_bytes(), value, &write_opts)?;
        Ok(())
    }

    fn batch_save(&self, project: &str, entries: &[Entry]) -> StoreResult<()> {
        for (key, _) in entries {
            keys::validate_key(key)?;
        }
        let db = self.handle(project)?;
        let mut batch = WriteBatch::default();
        for (key, value) in entries {
            batch.put(key.as_bytes(), value);
        }
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(true);
        db.write_opt(batch, &write_opts)?;
        Ok(())
    }

    fn get(&self, project: &str, key: &str) -> StoreResult<Vec<u8>> {
        keys::validate_key(key)?;
        let db = self.handle(project)?;
        db.get(key.as_bytes())?
            .ok_or_else(|| StoreError::KeyNotFound { key: key.to_string() })
    }

    fn exists(&self, project: &str, key: &str) -> StoreResult<bool> {
        keys::validate_key(key)?;
        let db = self.handle(project)?;
        Ok(db.key_may_exist(key.as_bytes()) && db.get(key.as_bytes())?.is_some())
    }

    fn delete(&self, project: &str, key: &str) -> StoreResult<()> {
        keys::validate_key(key)?;
        let db = self.handle(project)?;
        db.delete(key.as_bytes())?;
        Ok(())
    }

    fn delete_all(&self, project: &str) -> StoreResult<()> {
        self.handles.remove(project);
        let dir = self.project_dir(project);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    fn iter(
        &self,
        project: &str,
        key_prefix: &str,
        cancel: CancellationToken,
    ) -> StoreResult<Box<dyn Iterator<Item = StoreResult<Entry>> + '_>> {
        let db = self.handle(project)?;
        let prefix = key_prefix.to_string();
        let raw = db.iterator(IteratorMode::From(prefix.as_bytes(), rocksdb::Direction::Forward));
        let iter = raw
            .take_while(move |_| !cancel.is_cancelled())
            .map_while(move |item| match item {
                Ok((k, v)) => {
                    let key = String::from_utf8_lossy(&k).into_owned();
                    if key.starts_with(&prefix) {
                        Some(Ok((key, v.to_vec())))
                    } else {
                        None
                    }
                }
                Err(e) => Some(Err(StoreError::from(e))),
            });
        Ok(Box::new(iter))
    }

    fn size(&self, project: &str, key_prefix: &str) -> StoreResult<usize> {
        let token = CancellationToken::new();
        let mut count = 0;
        for item in self.iter(project, key_prefix, token)? {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn project_exists(&self, project: &str) -> StoreResult<bool> {
        Ok(self.handles.contains_key(project) || self.project_dir(project).exists())
    }

    fn list_projects(&self) -> StoreResult<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut projects = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    projects.push(name.to_string());
                }
            }
        }
        Ok(projects)
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, std::sync::atomic::Ordering::Release);
        self.handles.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;
    use tempfile::TempDir;

    #[test]
    fn put_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::new(dir.path());
        let key = keys::path_key(Language::Rust, "a.rs");
        store.put("proj", &key, b"hello").unwrap();
        assert_eq!(store.get("proj", &key).unwrap(), b"hello");
    }

    #[test]
    fn delete_all_removes_project_directory() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::new(dir.path());
        let key = keys::path_key(Language::Rust, "a.rs");
        store.put("proj", &key, b"hello").unwrap();
        assert!(store.project_exists("proj").unwrap());
        store.delete_all("proj").unwrap();
        assert!(!store.project_exists("proj").unwrap());
        assert!(matches!(store.get("proj", &key), Err(StoreError::KeyNotFound { .. })));
    }

    #[test]
    fn operations_after_close_fail() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::new(dir.path());
        store.close().unwrap();
        let key = keys::path_key(Language::Rust, "a.rs");
        let result = store.put("proj", &key, b"x");
        assert!(matches!(result, Err(StoreError::StoreClosed { .. })));
    }

    #[test]
    fn size_counts_only_matching_prefix() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::new(dir.path());
        store.put("proj", &keys::path_key(Language::Rust, "a.rs"), b"a").unwrap();
        store.put("proj", &keys::path_key(Language::Rust, "b.rs"), b"b").unwrap();
        store.put("proj", &keys::sym_key(Language::Rust, "foo"), b"c").unwrap();
        assert_eq!(store.size("proj", "@path").unwrap(), 2);
        assert_eq!(store.size("proj", "@sym").unwrap(), 1);
    }
}
