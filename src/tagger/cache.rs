use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::annotation::Entity;

/// Thread-safe LRU cache of tagging results
///
/// Keyed by the SHA-256 of the tagged text so repeated abstracts do not hold
/// the full text as a key.
pub struct TagCache {
    cache: Mutex<LruCache<String, Vec<Entity>>>,
}

impl TagCache {
    /// Create a new cache holding up to `capacity` texts (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn get(&self, text: &str) -> Option<Vec<Entity>> {
        let key = Self::key(text);
        self.cache.lock().ok()?.get(&key).cloned()
    }

    pub fn put(&self, text: &str, entities: Vec<Entity>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(Self::key(text), entities);
        }
    }

    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn key(text: &str) -> String {
        format!("{:x}", Sha256::digest(text.as_bytes()))
    }
}
