//! In-memory `GraphStore` for tests: one `BTreeMap` per project namespace,
//! guarded by a single mutex. No durability, no WAL — the whole point is
//! that tests never touch a filesystem.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{Entry, GraphStore, keys};
use crate::error::{StoreError, StoreResult};

#[derive(Default)]
pub struct MemStore {
    projects: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
    closed: Mutex<bool>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GraphStore for MemStore {
    fn put(&self, project: &str, key: &str, value: &[u8]) -> StoreResult<()> {
        keys::validate_key(key)?;
        if *self.closed.lock() {
            return Err(StoreError::StoreClosed { project: project.to_string() });
        }
        self.projects
            .lock()
            .entry(project.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn batch_save(&self, project: &str, entries: &[Entry]) -> StoreResult<()> {
        for (key, _) in entries {
            keys::validate_key(key)?;
        }
        let mut projects = self.projects.lock();
        let namespace = projects.entry(project.to_string()).or_default();
        for (key, value) in entries {
            namespace.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    fn get(&self, project: &str, key: &str) -> StoreResult<Vec<u8>> {
        keys::validate_key(key)?;
        self.projects
            .lock()
            .get(project)
            .and_then(|ns| ns.get(key))
            .cloned()
            .ok_or_else(|| StoreError::KeyNotFound { key: key.to_string() })
    }

    fn exists(&self, project: &str, key: &str) -> StoreResult<bool> {
        keys::validate_key(key)?;
        Ok(self.projects.lock().get(project).is_some_and(|ns| ns.contains_key(key)))
    }

    fn delete(&self, project: &str, key: &str) -> StoreResult<()> {
        keys::validate_key(key)?;
        if let Some(ns) = self.projects.lock().get_mut(project) {
            ns.remove(key);
        }
        Ok(())
    }

    fn delete_all(&self, project: &str) -> StoreResult<()> {
        self.projects.lock().remove(project);
        Ok(())
    }

    fn iter(
        &self,
        project: &str,
        key_prefix: &str,
        cancel: CancellationToken,
    ) -> StoreResult<Box<dyn Iterator<Item = StoreResult<Entry>> + '_>> {
        let snapshot: Vec<Entry> = self
            .projects
            .lock()
            .get(project)
            .map(|ns| {
                ns.range(key_prefix.to_string()..)
                    .take_while(|(k, _)| k.starts_with(key_prefix))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(Box::new(snapshot.into_iter().map_while(move |entry| {
            if cancel.is_cancelled() {
                None
            } else {
                Some(Ok(entry))
            }
        })))
    }

    fn size(&self, project: &str, key_prefix: &str) -> StoreResult<usize> {
        Ok(self
            .projects
            .lock()
            .get(project)
            .map(|ns| ns.range(key_prefix.to_string()..).take_while(|(k, _)| k.starts_with(key_prefix)).count())
            .unwrap_or(0))
    }

    fn project_exists(&self, project: &str) -> StoreResult<bool> {
        Ok(self.projects.lock().contains_key(project))
    }

    fn list_projects(&self) -> StoreResult<Vec<String>> {
        Ok(self.projects.lock().keys().cloned().collect())
    }

    fn close(&self) -> StoreResult<()> {
        *self.closed.lock() = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;

    #[test]
    fn iter_respects_prefix_and_cancellation() {
        let store = MemStore::new();
        store.put("p", &keys::path_key(Language::Rust, "a.rs"), b"a").unwrap();
        store.put("p", &keys::path_key(Language::Rust, "b.rs"), b"b").unwrap();
        store.put("p", &keys::sym_key(Language::Rust, "foo"), b"c").unwrap();

        let token = CancellationToken::new();
        let items: Vec<_> = store.iter("p", "@path", token.clone()).unwrap().collect::<StoreResult<Vec<_>>>().unwrap();
        assert_eq!(items.len(), 2);

        token.cancel();
        let items: Vec<_> = store.iter("p", "@path", token).unwrap().collect();
        assert!(items.is_empty());
    }

    #[test]
    fn put_after_close_fails() {
        let store = MemStore::new();
        store.close().unwrap();
        let result = store.put("p", &keys::path_key(Language::Go, "a.go"), b"x");
        assert!(matches!(result, Err(StoreError::StoreClosed { .. })));
    }
}
