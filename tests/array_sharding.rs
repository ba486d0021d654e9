use std::{error::Error, sync::Arc};

use zarrs_compat::{
    array::{
        open_dataset, sharding::ShardingIndexLocation, ArrayBuilder, ArrayCodecs, ArrayError,
        DataType, ReadOptions,
    },
    array_subset::ArraySubset,
    byte_range::ByteRange,
    metadata::{ArrayMetadata, Metadata},
    storage::{
        store::MemoryStore, Bytes, ListableStorageTraits, MaybeBytes, ReadableStorageTraits,
        StorageError, StoreKey, WritableStorageTraits,
    },
};

fn elements(shape: &[u64]) -> Vec<u16> {
    let num_elements: u16 = shape.iter().product::<u64>().try_into().unwrap_or_default();
    (0..num_elements).collect()
}

fn sharded_array(
    store: &Arc<MemoryStore>,
    path: &str,
    index_location: ShardingIndexLocation,
) -> Result<(), Box<dyn Error>> {
    sharded_array_of(store, path, index_location, &elements(&[10, 10]))
}

fn sharded_array_of(
    store: &Arc<MemoryStore>,
    path: &str,
    index_location: ShardingIndexLocation,
    data: &[u16],
) -> Result<(), Box<dyn Error>> {
    let array = ArrayBuilder::new(vec![10, 10], DataType::UInt16, vec![2, 2])
        .shard_shape(vec![4, 4])
        .shard_index_location(index_location)
        .bytes_to_bytes_codecs_metadata(vec![Metadata::new("crc32c")])
        .build(store.clone(), path)?;
    array.store_metadata()?;
    array.store_array_elements(&[10, 10], data)?;
    Ok(())
}

/// A store where another writer replaces the value at `key` right after it is first read.
struct ReplacedAfterReadStore {
    inner: MemoryStore,
    key: StoreKey,
    replacement: parking_lot::Mutex<Option<Bytes>>,
}

impl ReplacedAfterReadStore {
    fn after_read(&self, key: &StoreKey) -> Result<(), StorageError> {
        if key == &self.key {
            if let Some(replacement) = self.replacement.lock().take() {
                self.inner.set(key, replacement)?;
            }
        }
        Ok(())
    }
}

impl ReadableStorageTraits for ReplacedAfterReadStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let value = self.inner.get(key)?;
        self.after_read(key)?;
        Ok(value)
    }

    fn get_partial_values_key(
        &self,
        key: &StoreKey,
        byte_ranges: &[ByteRange],
    ) -> Result<Option<Vec<Bytes>>, StorageError> {
        let values = self.inner.get_partial_values_key(key, byte_ranges)?;
        self.after_read(key)?;
        Ok(values)
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        let size = self.inner.size_key(key)?;
        self.after_read(key)?;
        Ok(size)
    }
}

#[test]
fn sharding_round_trip() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    for (path, index_location) in [
        ("/end", ShardingIndexLocation::End),
        ("/start", ShardingIndexLocation::Start),
    ] {
        sharded_array(&store, path, index_location)?;
        let array = open_dataset(store.clone(), path)?;
        let ArrayCodecs::Sharding(sharding) = array.codecs() else {
            panic!("array is not sharded");
        };
        assert_eq!(sharding.chunk_shape(), &[2, 2]);
        assert_eq!(sharding.index_location(), index_location);
        assert_eq!(array.chunk_grid_shape(), vec![3, 3]);
        assert_eq!(
            array.retrieve_array_subset_elements::<u16>(&array.subset_all())?,
            elements(&[10, 10])
        );

        let region = ArraySubset::new_with_start_shape(vec![3, 3], vec![4, 2])?;
        assert_eq!(
            array.retrieve_array_subset_elements::<u16>(&region)?,
            vec![33, 34, 43, 44, 53, 54, 63, 64]
        );

        let mut shards = array.stored_chunks()?;
        shards.sort();
        assert_eq!(shards.len(), 9);
        assert_eq!(shards[8], vec![2, 2]);
    }

    let ArrayMetadata::V3(metadata) = open_dataset(store, "/end")?.metadata()? else {
        panic!("sharded arrays are Zarr V3");
    };
    assert_eq!(metadata.codecs.len(), 1);
    assert_eq!(metadata.codecs[0].name(), "sharding_indexed");
    Ok(())
}

#[test]
fn sharding_edge_shard_holds_inner_chunks_within_the_array() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    sharded_array(&store, "/array", ShardingIndexLocation::End)?;

    // shard [2, 2] covers elements [8..10, 8..10], a single inner chunk of 2x2 u16 plus a crc32c
    let shard = store
        .get(&StoreKey::new("array/c/2/2")?)?
        .unwrap_or_default();
    let index_size = 4 * 16 + 4;
    assert_eq!(shard.len(), (2 * 2 * 2 + 4) + index_size);
    Ok(())
}

#[test]
fn sharding_missing_shards_read_as_fill_value() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(vec![8, 8], DataType::UInt8, vec![2, 2])
        .shard_shape(vec![4, 4])
        .fill_value(9u8.into())
        .build(store, "/array")?;
    array.store_chunk(&[0, 0], &[1; 16])?;
    let read = array.read(&array.subset_all())?;
    assert!(read.is_complete());
    let mut expected = vec![9u8; 64];
    for row in 0..4 {
        expected[row * 8..row * 8 + 4].fill(1);
    }
    assert_eq!(read.bytes, expected);
    Ok(())
}

#[test]
fn sharding_corrupt_shard_fails_member_chunks() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    sharded_array(&store, "/array", ShardingIndexLocation::End)?;
    store.set(&StoreKey::new("array/c/0/1")?, vec![0u8; 3].into())?;

    let array = open_dataset(store.clone(), "/array")?;
    let region = ArraySubset::new_with_start_shape(vec![0, 0], vec![4, 10])?;
    let read = array.read(&region)?;
    let mut failed: Vec<_> = read
        .failures
        .iter()
        .map(|failure| failure.chunk_indices.clone())
        .collect();
    failed.sort();
    assert_eq!(
        failed,
        vec![vec![0, 2], vec![0, 3], vec![1, 2], vec![1, 3]]
    );
    assert!(read
        .failures
        .iter()
        .all(|failure| matches!(failure.error, ArrayError::CorruptShard { .. })));

    let expected = elements(&[10, 10]);
    let bytes: Vec<u16> = bytemuck::pod_collect_to_vec(&read.bytes);
    for row in 0..4 {
        for column in 0..10 {
            let element = bytes[row * 10 + column];
            if (4..8).contains(&column) {
                assert_eq!(element, 0);
            } else {
                assert_eq!(element, expected[row * 10 + column]);
            }
        }
    }

    let strict = ReadOptions::default().with_strict(true);
    assert!(matches!(
        array.read_opt(&region, &strict),
        Err(ArrayError::CorruptShard { .. })
    ));
    Ok(())
}

#[test]
fn sharding_index_checksum() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    sharded_array(&store, "/array", ShardingIndexLocation::End)?;
    let key = StoreKey::new("array/c/1/1")?;
    let mut shard = store.get(&key)?.unwrap_or_default().to_vec();
    if let Some(last) = shard.last_mut() {
        *last ^= 0xff;
    }
    store.set(&key, shard.into())?;

    let array = open_dataset(store, "/array")?;
    let read = array.read(&array.subset_all())?;
    assert_eq!(read.failures.len(), 4);
    assert!(read
        .failures
        .iter()
        .all(|failure| failure.chunk_indices.iter().all(|i| (2..4).contains(i))));
    Ok(())
}

#[test]
fn sharding_read_sees_one_version_of_a_replaced_shard() -> Result<(), Box<dyn Error>> {
    let old_data = elements(&[10, 10]);
    let new_data: Vec<u16> = old_data.iter().map(|e| e + 1000).collect();
    let old = Arc::new(MemoryStore::new());
    sharded_array_of(&old, "/array", ShardingIndexLocation::End, &old_data)?;
    let new = Arc::new(MemoryStore::new());
    sharded_array_of(&new, "/array", ShardingIndexLocation::End, &new_data)?;

    let key = StoreKey::new("array/c/0/0")?;
    let store = ReplacedAfterReadStore {
        inner: MemoryStore::new(),
        key: key.clone(),
        replacement: parking_lot::Mutex::new(new.get(&key)?),
    };
    for stored_key in old.list()? {
        if let Some(value) = old.get(&stored_key)? {
            store.inner.set(&stored_key, value)?;
        }
    }

    let array = open_dataset(Arc::new(store), "/array")?;
    let shard_region = ArraySubset::new_with_start_shape(vec![0, 0], vec![4, 4])?;
    let read = array.read(&shard_region)?;
    assert!(read.is_complete());
    let first: Vec<u16> = bytemuck::pod_collect_to_vec(&read.bytes);
    let expected_old: Vec<u16> = (0..4)
        .flat_map(|row| (0..4).map(move |column| row * 10 + column))
        .collect();
    assert_eq!(first, expected_old);

    let second = array.retrieve_array_subset_elements::<u16>(&shard_region)?;
    let expected_new: Vec<u16> = expected_old.iter().map(|e| e + 1000).collect();
    assert_eq!(second, expected_new);
    Ok(())
}
