//! Open-ended tag storage for lines and documents.
//!
//! Collaborators (parsers, renderers, the document manager) hang their own
//! state off lines and documents without the document knowing the types.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Map from a string key to a type-erased value.
#[derive(Default)]
pub struct TagMap {
    tags: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl TagMap {
    /// Create an empty tag map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under `key`, returning true if a previous value was replaced.
    pub fn put<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) -> bool {
        self.tags.insert(key.into(), Box::new(value)).is_some()
    }

    /// Get the value under `key` if it exists and has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.tags.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    /// Mutable access to the value under `key` if it exists and has type `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.tags
            .get_mut(key)
            .and_then(|value| value.downcast_mut::<T>())
    }

    /// Remove the value under `key`, returning it if it had type `T`.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        let value = self.tags.remove(key)?;
        value.downcast::<T>().ok().map(|boxed| *boxed)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn clear(&mut self) {
        self.tags.clear();
    }
}

impl fmt::Debug for TagMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.tags.keys().collect();
        keys.sort();
        f.debug_struct("TagMap").field("keys", &keys).finish()
    }
}
