// Storage (spec.md §6): "a key-value store exposing get/put/delete with
// bytes keys and values, and a state-root-committing trie API." The exact
// on-disk encoding is explicitly left unspecified by the core (spec.md §1
// Non-goal: "persistent storage engine internals") — this module only
// defines the seam validation code is allowed to depend on, plus an
// in-memory implementation so the daemon and its tests have something to
// run against without a real backend.

use std::collections::HashMap;
use std::sync::RwLock;

use blockflow_common::error::IOError;

/// The byte-oriented KV contract every storage backend must satisfy.
/// Validation code never reaches for a concrete backend directly — it goes
/// through this trait (or, for world state, `WorldState`'s own
/// `persist`/`cached` pair) so a disk engine can be swapped in later.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, IOError>;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), IOError>;
    fn delete(&self, key: &[u8]) -> Result<(), IOError>;
}

/// A trie-like store that commits a batch of writes atomically and returns
/// the resulting root — the shape `WorldState::persist` needs if it is ever
/// backed by something other than the in-memory digest trie.
pub trait TrieStore: Send + Sync {
    fn commit(&self, writes: &[(Vec<u8>, Vec<u8>)]) -> Result<blockflow_common::crypto::Hash, IOError>;
}

/// In-memory `KeyValueStore`. Every entry is lost on process exit; this
/// exists for tests and for the default daemon configuration when no disk
/// backend is configured, not as a production storage engine.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, IOError> {
        Ok(self.map.read().expect("storage mutex poisoned").get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), IOError> {
        self.map.write().expect("storage mutex poisoned").insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), IOError> {
        self.map.write().expect("storage mutex poisoned").remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_get_put_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.get(b"k").unwrap(), None);

        store.put(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));

        store.delete(b"k").unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);
    }
}
