// Field value interning for owned records
//
// Repeated short values (enum-like columns, booleans, country codes) share one
// allocation across every OwnedRecord a session produces.

use std::collections::HashSet;
use std::sync::Arc;

/// Longest field value that is interned.
pub const MAX_CACHED_LEN: usize = 128;

/// Distinct values kept before the cache stops growing.
pub const MAX_CACHED_ENTRIES: usize = 16 * 1024;

#[derive(Debug, Default)]
pub struct FieldCache {
    values: HashSet<Arc<str>>,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared copy of `value`, reusing an earlier allocation when possible.
    pub fn intern(&mut self, value: &str) -> Arc<str> {
        if value.len() > MAX_CACHED_LEN {
            return Arc::from(value);
        }
        if let Some(hit) = self.values.get(value) {
            return Arc::clone(hit);
        }
        let shared: Arc<str> = Arc::from(value);
        if self.values.len() < MAX_CACHED_ENTRIES {
            self.values.insert(Arc::clone(&shared));
        }
        shared
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
