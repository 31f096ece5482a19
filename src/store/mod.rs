//! Graph Store: one physical embedded KV store per project UUID,
//! addressed through the composite key scheme in [`keys`]. Two
//! implementations share the [`GraphStore`] trait — [`RocksStore`] for
//! production, [`MemStore`] for tests — so nothing above this module leaks
//! backend specifics.

mod codec;
pub mod keys;
mod mem;
mod rocks;

pub use mem::MemStore;
pub use rocks::RocksStore;

use crate::error::StoreResult;
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

/// One entry to write: `(key, raw value bytes)`.
pub type Entry = (String, Vec<u8>);

/// The operation set every backend exposes. Implementors validate keys
/// against [`keys::validate_key`] before touching the underlying engine.
pub trait GraphStore: Send + Sync {
    /// Durably write `value` under `key`, overwriting any prior value.
    fn put(&self, project: &str, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Write `entries` atomically with respect to a process crash.
    /// Ordering among entries is irrelevant.
    fn batch_save(&self, project: &str, entries: &[Entry]) -> StoreResult<()>;

    /// Read the raw bytes stored under `key`, or `KeyNotFound`.
    fn get(&self, project: &str, key: &str) -> StoreResult<Vec<u8>>;

    /// Cheaper than `get` when the value itself is not needed.
    fn exists(&self, project: &str, key: &str) -> StoreResult<bool>;

    /// Idempotent: deleting an absent key is success.
    fn delete(&self, project: &str, key: &str) -> StoreResult<()>;

    /// Remove the entire project namespace.
    fn delete_all(&self, project: &str) -> StoreResult<()>;

    /// Forward iteration over every key with `key_prefix`, in ascending
    /// byte order. `cancel` is polled at each `next()`; a cancelled
    /// iteration yields no further items.
    fn iter(
        &self,
        project: &str,
        key_prefix: &str,
        cancel: CancellationToken,
    ) -> StoreResult<Box<dyn Iterator<Item = StoreResult<Entry>> + '_>>;

    /// Count of keys starting with `key_prefix`.
    fn size(&self, project: &str, key_prefix: &str) -> StoreResult<usize>;

    /// Whether a namespace for `project` currently exists on disk.
    fn project_exists(&self, project: &str) -> StoreResult<bool>;

    /// Every project UUID the store currently holds a namespace for,
    /// open or not. Used by the retention janitor to discover candidates
    /// without needing a workspace path.
    fn list_projects(&self) -> StoreResult<Vec<String>>;

    /// Close every open project store.
    fn close(&self) -> StoreResult<()>;
}

/// Read and JSON-decode a record stored under `key`.
pub fn get_record<T: DeserializeOwned>(store: &dyn GraphStore, project: &str, key: &str) -> StoreResult<T> {
    let bytes = store.get(project, key)?;
    codec::decode(&bytes)
}

/// JSON-encode and write `value` under `key`.
pub fn put_record<T: Serialize>(store: &dyn GraphStore, project: &str, key: &str, value: &T) -> StoreResult<()> {
    let bytes = codec::encode(value)?;
    store.put(project, key, &bytes)
}

/// Encode a batch of `(key, value)` records for `batch_save`.
pub fn encode_batch<T: Serialize>(entries: &[(String, T)]) -> StoreResult<Vec<Entry>> {
    entries
        .iter()
        .map(|(key, value)| codec::encode(value).map(|bytes| (key.clone(), bytes)))
        .collect()
}

/// Decode a raw entry's value into `T`, surfacing the key on failure.
pub fn decode_record<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    codec::decode(bytes)
}

#[cfg(test)]
mod shared_tests {
    use super::*;
    use crate::types::{DefinitionRef, ElementKind, Language, Range, SymbolDefinitionRecord};

    fn exercise(store: &dyn GraphStore, project: &str) {
        let key = keys::path_key(Language::Rust, "a.rs");
        assert!(!store.exists(project, &key).unwrap());
        assert!(matches!(store.get(project, &key), Err(crate::error::StoreError::KeyNotFound { .. })));

        let record = SymbolDefinitionRecord {
            language: Language::Rust,
            name: "foo".into(),
            definitions: vec![DefinitionRef {
                path: "a.rs".into(),
                range: Range::new(0, 0, 2, 0),
                element_kind: ElementKind::Function,
                param_count: Some(0),
            }],
        };
        put_record(store, project, &key, &record).unwrap();
        assert!(store.exists(project, &key).unwrap());

        let loaded: SymbolDefinitionRecord = get_record(store, project, &key).unwrap();
        assert_eq!(loaded, record);

        assert_eq!(store.size(project, "@path").unwrap(), 1);
        store.delete(project, &key).unwrap();
        assert_eq!(store.size(project, "@path").unwrap(), 0);
    }

    #[test]
    fn mem_store_put_get_delete_size() {
        let store = MemStore::new();
        exercise(&store, "proj1");
    }

    #[test]
    fn mem_store_rejects_unknown_key_prefix() {
        let store = MemStore::new();
        let result = store.put("proj1", "@bogus:x", b"data");
        assert!(matches!(result, Err(crate::error::StoreError::InvalidKey { .. })));
    }

    #[test]
    fn mem_store_delete_all_clears_namespace() {
        let store = MemStore::new();
        let key = keys::path_key(Language::Go, "a.go");
        store.put("proj1", &key, b"x").unwrap();
        assert!(store.project_exists("proj1").unwrap());
        store.delete_all("proj1").unwrap();
        assert!(!store.project_exists("proj1").unwrap());
    }
}
