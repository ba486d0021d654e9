//! An in-memory store.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::{
    byte_range::ByteRange,
    storage::{
        Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits, StorageError, StoreKey,
        StoreKeys, StorePrefix, WritableStorageTraits,
    },
};

/// An in-memory store.
///
/// Values are reference counted [`Bytes`], so a read never copies and a write swaps the whole value under the lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data_map: Mutex<BTreeMap<StoreKey, Bytes>>,
}

impl MemoryStore {
    /// Create a new empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadableStorageTraits for MemoryStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Ok(self.data_map.lock().get(key).cloned())
    }

    fn get_partial_values_key(
        &self,
        key: &StoreKey,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Bytes>>, StorageError> {
        let Some(data) = self.get(key)? else {
            return Ok(None);
        };
        let size = data.len() as u64;
        let values = byte_ranges
            .iter()
            .map(|byte_range| Ok(data.slice(byte_range.to_range(size)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;
        Ok(Some(values))
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        Ok(self.data_map.lock().get(key).map(|data| data.len() as u64))
    }
}

impl WritableStorageTraits for MemoryStore {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.data_map.lock().insert(key.clone(), value);
        Ok(())
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.data_map.lock().remove(key);
        Ok(())
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        self.data_map.lock().retain(|key, _| !key.has_prefix(prefix));
        Ok(())
    }
}

impl ListableStorageTraits for MemoryStore {
    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self
            .data_map
            .lock()
            .keys()
            .filter(|key| key.has_prefix(prefix))
            .cloned()
            .collect())
    }

    fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError> {
        Ok(self
            .data_map
            .lock()
            .iter()
            .filter(|(key, _)| key.has_prefix(prefix))
            .map(|(_, data)| data.len() as u64)
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store() -> Result<(), Box<dyn std::error::Error>> {
        let store = MemoryStore::new();
        let key = StoreKey::new("a/b")?;
        assert!(store.get(&key)?.is_none());
        store.set(&key, vec![0, 1, 2, 3].into())?;
        assert_eq!(store.get(&key)?.unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(store.size_key(&key)?, Some(4));
        assert_eq!(
            store.get_partial_values_key(&key, &[ByteRange::FromEnd(0, Some(2))])?,
            Some(vec![Bytes::from(vec![2u8, 3])])
        );
        assert!(store
            .get_partial_values_key(&key, &[ByteRange::FromStart(3, Some(2))])
            .is_err());

        store.set(&StoreKey::new("a/c")?, vec![0].into())?;
        store.set(&StoreKey::new("b")?, vec![0].into())?;
        assert_eq!(store.list()?.len(), 3);
        assert_eq!(
            store.list_prefix(&StorePrefix::new("a/")?)?,
            vec![StoreKey::new("a/b")?, StoreKey::new("a/c")?]
        );
        assert_eq!(store.size_prefix(&StorePrefix::new("a/")?)?, 5);

        store.erase_prefix(&StorePrefix::new("a/")?)?;
        assert_eq!(store.list()?, vec![StoreKey::new("b")?]);
        store.erase(&StoreKey::new("b")?)?;
        store.erase(&StoreKey::new("b")?)?;
        assert!(store.list()?.is_empty());
        Ok(())
    }
}
