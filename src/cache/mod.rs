//! LRU Cache: a bounded, thread-safe most-recently-used cache sitting
//! in front of the graph store on query paths, amortizing the decode cost
//! of hot file element tables. Classical doubly-linked-list + hash-map,
//! guarded by a single lock — reads and writes are cheap enough that a
//! lock-free structure is not worth the complexity here.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::Mutex;

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Inner<K, V> {
    nodes: Vec<Option<Node<K, V>>>,
    index: HashMap<K, usize>,
    head: Option<usize>,
    tail: Option<usize>,
    free: Vec<usize>,
    max_capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> Inner<K, V> {
    fn detach(&mut self, slot: usize) {
        let (prev, next) = {
            let node = self.nodes[slot].as_ref().unwrap();
            (node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes[p].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        {
            let node = self.nodes[slot].as_mut().unwrap();
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head {
            self.nodes[h].as_mut().unwrap().prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    fn touch(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.detach(slot);
        self.push_front(slot);
    }

    fn evict_tail(&mut self) {
        if let Some(tail) = self.tail {
            self.detach(tail);
            let node = self.nodes[tail].take().unwrap();
            self.index.remove(&node.key);
            self.free.push(tail);
        }
    }
}

/// A bounded, concurrency-safe LRU cache. `initial_capacity` is a
/// reservation hint only; `max_capacity` is the hard eviction bound.
pub struct LruCache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    pub fn new(initial_capacity: usize, max_capacity: usize) -> Self {
        let max_capacity = max_capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                nodes: Vec::with_capacity(initial_capacity.min(max_capacity)),
                index: HashMap::with_capacity(initial_capacity.min(max_capacity)),
                head: None,
                tail: None,
                free: Vec::new(),
                max_capacity,
            }),
        }
    }

    /// Look up `key`, moving it to most-recently-used on a hit.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let slot = *inner.index.get(key)?;
        inner.touch(slot);
        Some(inner.nodes[slot].as_ref().unwrap().value.clone())
    }

    /// Insert or overwrite `key`. Evicts the least-recently-used entry
    /// when the map would otherwise exceed `max_capacity`.
    pub fn put(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        if let Some(&slot) = inner.index.get(&key) {
            inner.nodes[slot].as_mut().unwrap().value = value;
            inner.touch(slot);
            return;
        }

        if inner.index.len() >= inner.max_capacity {
            inner.evict_tail();
        }

        let slot = match inner.free.pop() {
            Some(slot) => slot,
            None => {
                inner.nodes.push(None);
                inner.nodes.len() - 1
            }
        };
        inner.nodes[slot] = Some(Node { key: key.clone(), value, prev: None, next: None });
        inner.index.insert(key, slot);
        inner.push_front(slot);
    }

    /// Reset to empty.
    pub fn purge(&self) {
        let mut inner = self.inner.lock();
        inner.nodes.clear();
        inner.index.clear();
        inner.free.clear();
        inner.head = None;
        inner.tail = None;
    }

    /// Remove a single key, used when the indexer mutates the value this
    /// key would otherwise serve stale.
    pub fn invalidate(&self, key: &K) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.index.get(key).copied() {
            inner.detach(slot);
            let node = inner.nodes[slot].take().unwrap();
            inner.index.remove(&node.key);
            inner.free.push(slot);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let cache: LruCache<String, u32> = LruCache::new(2, 4);
        cache.put("a".into(), 1);
        assert_eq!(cache.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn evicts_least_recently_used_on_overflow() {
        let cache: LruCache<&str, u32> = LruCache::new(2, 2);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.put("c", 3);
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn get_promotes_entry_to_most_recently_used() {
        let cache: LruCache<&str, u32> = LruCache::new(2, 2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.put("c", 3);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(1));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn purge_empties_the_cache() {
        let cache: LruCache<&str, u32> = LruCache::new(2, 2);
        cache.put("a", 1);
        cache.purge();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn invalidate_removes_a_single_key() {
        let cache: LruCache<&str, u32> = LruCache::new(2, 2);
        cache.put("a", 1);
        cache.put("b", 2);
        cache.invalidate(&"a");
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn put_overwriting_existing_key_updates_value_without_growing() {
        let cache: LruCache<&str, u32> = LruCache::new(2, 2);
        cache.put("a", 1);
        cache.put("a", 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), Some(2));
    }
}
