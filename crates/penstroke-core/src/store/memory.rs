use std::collections::HashMap;

use parking_lot::RwLock;

use super::CredentialStore;

/// In-memory store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.write().insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.write().remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("accessToken"), None);

        store.set("accessToken", "t1");
        assert_eq!(store.get("accessToken").as_deref(), Some("t1"));

        store.set("accessToken", "t2");
        assert_eq!(store.get("accessToken").as_deref(), Some("t2"));
        assert_eq!(store.len(), 1);

        store.remove("accessToken");
        assert_eq!(store.get("accessToken"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_missing_key_is_noop() {
        let store = MemoryStore::new();
        store.remove("nothing-here");
        assert!(store.is_empty());
    }
}
