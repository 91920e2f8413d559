use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use super::{DurableStore, StoreError};

/// In-process store. Nothing survives the process, but it honors the
/// `DurableStore` contract and can be switched into a failing mode.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    faults: Mutex<Faults>,
}

/// Injected write failures
#[derive(Debug, Default)]
struct Faults {
    /// Successful `set` calls left before every write fails; `None` is unlimited
    writes_left: Option<usize>,
    /// Keys whose writes always fail
    keys: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing entries
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let store = Self::new();
        store
            .entries
            .lock()
            .extend(entries.into_iter().map(|(k, v)| (k.into(), v.into())));
        store
    }

    /// Make every subsequent `set` fail. Removals keep working.
    pub fn fail_writes(&self, fail: bool) {
        self.faults.lock().writes_left = fail.then_some(0);
    }

    /// Let `count` more writes through, then fail every later one
    pub fn fail_writes_after(&self, count: usize) {
        self.faults.lock().writes_left = Some(count);
    }

    /// Make writes to `key` fail
    pub fn fail_writes_to(&self, key: &str) {
        self.faults.lock().keys.insert(key.to_string());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}

impl DurableStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        {
            let mut faults = self.faults.lock();
            let exhausted = match faults.writes_left.as_mut() {
                Some(0) => true,
                Some(left) => {
                    *left -= 1;
                    false
                }
                None => false,
            };
            if exhausted || faults.keys.contains(key) {
                return Err(StoreError::Unavailable(format!("write to '{}' rejected", key)));
            }
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("token").unwrap(), None);

        store.set("token", "tok123").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("tok123"));

        store.remove("token").unwrap();
        assert_eq!(store.get("token").unwrap(), None);
        // Removing again is fine
        store.remove("token").unwrap();
    }

    #[test]
    fn test_fail_writes() {
        let store = MemoryStore::with_entries([("user", "{}")]);
        store.fail_writes(true);
        assert!(store.set("token", "tok").is_err());
        assert!(!store.contains("token"));
        // Removal still succeeds so cleanup is possible
        store.remove("user").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_fail_writes_after_and_per_key() {
        let store = MemoryStore::new();
        store.fail_writes_after(1);
        store.set("token", "tok").unwrap();
        assert!(store.set("user", "{}").is_err());

        let store = MemoryStore::new();
        store.fail_writes_to("user");
        store.set("token", "tok").unwrap();
        assert!(store.set("user", "{}").is_err());
        assert!(!store.contains("user"));
    }
}
