use std::{error::Error, sync::Arc};

use zarrs_compat::{
    array::{
        create_dataset, open_dataset, ArrayBuilder, ArrayError, ChunkKeyLayout, DataType,
        FillValue, ReadOptions,
    },
    array_subset::ArraySubset,
    metadata::{ContainerFormat, Metadata},
    storage::{
        store::{FilesystemStore, MemoryStore},
        ReadableStorageTraits, StoreKey, WritableStorageTraits,
    },
};

fn image(shape: &[u64]) -> Vec<u8> {
    let num_elements: u64 = shape.iter().product();
    (0..num_elements).map(|i| (i % 251) as u8).collect()
}

#[test]
fn array_write_read_v3() -> Result<(), Box<dyn Error>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = Arc::new(MemoryStore::new());
    let array = create_dataset(
        store.clone(),
        "/array",
        vec![8, 8],
        vec![4, 4],
        DataType::UInt8,
        vec![],
        ChunkKeyLayout::Nested,
    )?;
    let data = image(&[8, 8]);
    array.write(&[8, 8], &data)?;
    assert!(store.get(&StoreKey::new("array/c/1/1")?)?.is_some());

    let array = open_dataset(store, "/array")?;
    assert_eq!(array.retrieve_array_subset(&array.subset_all())?, data);

    let region = ArraySubset::new_with_start_shape(vec![3, 2], vec![2, 3])?;
    let read = array.read(&region)?;
    assert!(read.is_complete());
    assert_eq!(read.bytes, vec![26, 27, 28, 34, 35, 36]);
    Ok(())
}

#[test]
fn array_geometry_500x500x3() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = create_dataset(
        store.clone(),
        "/gzip",
        vec![500, 500, 3],
        vec![100, 100, 1],
        DataType::UInt8,
        vec![Metadata::new_with_configuration(
            "gzip",
            serde_json::json!({"level": 5}).as_object().cloned().unwrap_or_default(),
        )],
        ChunkKeyLayout::Nested,
    )?;
    assert_eq!(array.chunk_grid_shape(), vec![5, 5, 3]);
    assert_eq!(array.chunk_shape(&[4, 4, 0])?, vec![100, 100, 1]);

    let data = image(&[500, 500, 3]);
    array.write(&[500, 500, 3], &data)?;
    assert_eq!(array.stored_chunks()?.len(), 75);
    assert_eq!(array.retrieve_array_subset(&array.subset_all())?, data);

    let array = ArrayBuilder::new(vec![500, 500, 3], DataType::UInt8, vec![150, 150, 1])
        .build(store, "/edges")?;
    assert_eq!(array.chunk_grid_shape(), vec![4, 4, 3]);
    assert_eq!(array.chunk_shape(&[3, 3, 2])?, vec![50, 50, 1]);

    array.write(&[500, 500, 3], &data)?;
    let edge_chunk = array.retrieve_chunk(&[3, 3, 2])?;
    let expected: Vec<u8> = (450..500)
        .flat_map(|row| (450..500).map(move |column| (row * 500 + column) * 3 + 2))
        .map(|i: usize| data[i])
        .collect();
    assert_eq!(edge_chunk.len(), 50 * 50);
    assert_eq!(edge_chunk, expected);
    Ok(())
}

#[test]
fn array_edge_chunks_are_truncated() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let data = image(&[221, 221, 3]);
    for (path, format) in [
        ("/v3", ContainerFormat::ZarrV3),
        ("/v2", ContainerFormat::ZarrV2),
        ("/n5", ContainerFormat::N5),
    ] {
        let array = ArrayBuilder::new(vec![221, 221, 3], DataType::UInt8, vec![100, 100, 1])
            .format(format)
            .build(store.clone(), path)?;
        array.store_metadata()?;
        array.write(&[221, 221, 3], &data)?;
        assert_eq!(array.chunk_shape(&[2, 2, 0])?, vec![21, 21, 1]);
        assert_eq!(array.retrieve_chunk(&[2, 2, 0])?.len(), 21 * 21);

        let array = open_dataset(store.clone(), path)?;
        assert_eq!(array.format(), format);
        assert_eq!(array.retrieve_array_subset(&array.subset_all())?, data);
    }

    // a raw edge chunk holds only the elements within the array
    let edge_chunk = store.get(&StoreKey::new("v3/c/2/2/0")?)?.unwrap_or_default();
    assert_eq!(edge_chunk.len(), 21 * 21);
    Ok(())
}

#[test]
fn array_missing_chunks_read_as_fill_value() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(vec![4, 4], DataType::UInt8, vec![2, 2])
        .fill_value(FillValue::from(42u8))
        .build(store, "/array")?;
    array.store_chunk(&[1, 1], &[1, 2, 3, 4])?;

    let read = array.read(&array.subset_all())?;
    assert!(read.is_complete());
    assert_eq!(
        read.bytes,
        vec![42, 42, 42, 42, 42, 42, 42, 42, 42, 42, 1, 2, 42, 42, 3, 4]
    );
    assert_eq!(array.retrieve_chunk(&[0, 0])?, vec![42; 4]);

    array.erase_chunk(&[1, 1])?;
    assert_eq!(array.retrieve_chunk(&[1, 1])?, vec![42; 4]);
    Ok(())
}

#[test]
fn array_corrupt_chunk() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = create_dataset(
        store.clone(),
        "/array",
        vec![4, 4],
        vec![2, 2],
        DataType::UInt8,
        vec![Metadata::new("crc32c")],
        ChunkKeyLayout::Flat,
    )?;
    let data = image(&[4, 4]);
    array.write(&[4, 4], &data)?;
    store.set(&StoreKey::new("array/c.0.1")?, b"garbage".to_vec().into())?;

    let read = array.read(&array.subset_all())?;
    assert_eq!(read.failures.len(), 1);
    assert_eq!(read.failures[0].chunk_indices, vec![0, 1]);
    assert!(matches!(
        read.failures[0].error,
        ArrayError::CorruptChunk { .. }
    ));
    let mut expected = data.clone();
    for index in [2, 3, 6, 7] {
        expected[index] = 0;
    }
    assert_eq!(read.bytes, expected);

    let strict = ReadOptions::default().with_strict(true);
    assert!(matches!(
        array.read_opt(&array.subset_all(), &strict),
        Err(ArrayError::CorruptChunk { .. })
    ));
    assert!(array.retrieve_array_subset(&array.subset_all()).is_err());

    // chunks other than the corrupt one are unaffected
    let region = ArraySubset::new_with_start_shape(vec![2, 0], vec![2, 4])?;
    assert_eq!(array.retrieve_array_subset(&region)?, data[8..].to_vec());
    Ok(())
}

#[test]
fn array_invalid_writes() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(vec![4, 4], DataType::UInt16, vec![2, 2]).build(store, "/array")?;
    assert!(matches!(
        array.write(&[4, 5], &[0; 40]),
        Err(ArrayError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        array.write(&[4, 4], &[0; 16]),
        Err(ArrayError::InvalidBytesInputSize(16, 32))
    ));
    assert!(matches!(
        array.store_chunk(&[2, 0], &[0; 8]),
        Err(ArrayError::InvalidChunkGridIndices(_))
    ));
    assert!(matches!(
        array.store_array_elements::<u8>(&[4, 4], &[0; 16]),
        Err(ArrayError::IncompatibleElementSize(1, 2))
    ));
    let region = ArraySubset::new_with_start_shape(vec![2, 2], vec![3, 1])?;
    assert!(matches!(
        array.read(&region),
        Err(ArrayError::InvalidArraySubset(..))
    ));
    Ok(())
}

#[test]
fn array_stored_chunks() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(vec![4, 4], DataType::UInt8, vec![2, 2])
        .format(ContainerFormat::ZarrV2)
        .attributes(
            serde_json::json!({"description": "stored chunks"})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        )
        .build(store.clone(), "/array")?;
    array.store_metadata()?;
    array.store_chunk(&[1, 0], &[1; 4])?;
    array.store_chunk(&[0, 1], &[2; 4])?;

    let mut chunks = array.stored_chunks()?;
    chunks.sort();
    assert_eq!(chunks, vec![vec![0, 1], vec![1, 0]]);

    store.set(&StoreKey::new("array/x.0")?, vec![0u8].into())?;
    assert!(matches!(
        array.stored_chunks(),
        Err(ArrayError::InvalidKey(_))
    ));
    Ok(())
}

#[test]
fn array_elements_and_options() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(vec![6, 5], DataType::Float32, vec![4, 4])
        .fill_value(FillValue::from(-1.0f32))
        .build(store, "/array")?;
    let elements: Vec<f32> = (0..30u8).map(f32::from).collect();
    array.store_array_elements(&[6, 5], &elements)?;
    assert_eq!(
        array.retrieve_array_subset_elements::<f32>(&array.subset_all())?,
        elements
    );
    assert_eq!(
        array.retrieve_chunk_elements::<f32>(&[1, 1])?,
        vec![24.0, 29.0]
    );

    let sequential = ReadOptions::default().with_parallel(false);
    let parallel = ReadOptions::default().with_parallel(true);
    assert_eq!(
        array.read_opt(&array.subset_all(), &sequential)?.bytes,
        array.read_opt(&array.subset_all(), &parallel)?.bytes
    );
    Ok(())
}

#[cfg(feature = "ndarray")]
#[test]
fn array_ndarray() -> Result<(), Box<dyn Error>> {
    let store = Arc::new(MemoryStore::new());
    let array = ArrayBuilder::new(vec![4, 6], DataType::Int16, vec![3, 3])
        .format(ContainerFormat::N5)
        .build(store, "/ndarray")?;
    let elements = ndarray::Array2::from_shape_fn((4, 6), |(i, j)| (i * 10 + j) as i16);
    array.store_array_ndarray(&elements.view().into_dyn())?;

    let region = ArraySubset::new_with_start_shape(vec![1, 2], vec![3, 2])?;
    let read = array.retrieve_array_subset_ndarray::<i16>(&region)?;
    assert_eq!(read.shape(), &[3, 2]);
    assert_eq!(
        read,
        elements.slice(ndarray::s![1..4, 2..4]).to_owned().into_dyn()
    );

    let transposed = elements.t().to_owned().into_dyn();
    assert!(array.store_array_ndarray(&transposed.view()).is_err());
    Ok(())
}

#[test]
#[cfg_attr(miri, ignore)]
fn array_filesystem() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let store = Arc::new(FilesystemStore::new(path.path())?);
    let array = create_dataset(
        store,
        "/group/array",
        vec![10, 10],
        vec![5, 5],
        DataType::UInt64,
        vec![],
        ChunkKeyLayout::Flat,
    )?;
    let elements: Vec<u64> = (0..100).collect();
    array.store_array_elements(&[10, 10], &elements)?;
    assert!(path.path().join("group/array/zarr.json").is_file());
    assert!(path.path().join("group/array/c.1.1").is_file());

    let store = Arc::new(FilesystemStore::new(path.path())?);
    let array = open_dataset(store, "/group/array")?;
    assert_eq!(
        array.retrieve_array_subset_elements::<u64>(&array.subset_all())?,
        elements
    );
    Ok(())
}
