use std::sync::Arc;

use crate::{
    metadata::{
        n5::{N5ArrayMetadata, N5Compression, N5CompressionError, N5_VERSION},
        v2::{ArrayMetadataV2, ArrayOrderV2, CodecMetadataV2},
        v3::ArrayMetadataV3,
        warn_unknown_fields, ArrayMetadata, ContainerFormat, NodeType,
    },
    node::{node_kind, NodePath},
    plugin::PluginCreateError,
    storage::{node_metadata_key, retrieve_metadata_json, zattrs_key, ReadableStorageTraits},
};

use super::{
    chunk_key_encoding::{N5ChunkKeyEncoding, V2ChunkKeyEncoding},
    sharding, Array, ArrayCodecs, ArrayCreateError, ArrayShape, ChunkKeyEncoding, CodecChain,
    CodecRegistry, DataType, Endianness, FillValue, RegularChunkGrid, ShardingParameters,
};

/// Retrieve the metadata of the array at `path`, probing the formats in discovery order.
///
/// # Errors
/// Returns [`ArrayCreateError::MissingMetadata`] if there is no metadata at `path` or the node is a group,
/// or [`ArrayCreateError::StorageError`] if a metadata document is invalid.
pub fn retrieve_array_metadata<TStorage: ?Sized + ReadableStorageTraits>(
    storage: &TStorage,
    path: &NodePath,
) -> Result<ArrayMetadata, ArrayCreateError> {
    let missing = || ArrayCreateError::MissingMetadata(path.clone());
    let kind = node_kind(storage, path)?.ok_or_else(missing)?;
    if kind.node_type != NodeType::Array {
        return Err(missing());
    }
    let key = node_metadata_key(path, kind.format, NodeType::Array);
    Ok(match kind.format {
        ContainerFormat::ZarrV3 => {
            ArrayMetadata::V3(retrieve_metadata_json(storage, &key)?.ok_or_else(missing)?)
        }
        ContainerFormat::ZarrV2 => {
            let mut metadata: ArrayMetadataV2 =
                retrieve_metadata_json(storage, &key)?.ok_or_else(missing)?;
            if let Some(attributes) = retrieve_metadata_json(storage, &zattrs_key(path))? {
                metadata.attributes = attributes;
            }
            ArrayMetadata::V2(metadata)
        }
        ContainerFormat::N5 => {
            ArrayMetadata::N5(retrieve_metadata_json(storage, &key)?.ok_or_else(missing)?)
        }
    })
}

/// The parts of an array shared by every container format.
pub(super) struct ArrayParts {
    pub format: ContainerFormat,
    pub shape: ArrayShape,
    pub data_type: DataType,
    pub chunk_grid: RegularChunkGrid,
    pub chunk_key_encoding: ChunkKeyEncoding,
    pub fill_value: FillValue,
    pub codecs: ArrayCodecs,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub dimension_names: Option<Vec<Option<String>>>,
}

impl<TStorage: ?Sized + ReadableStorageTraits> Array<TStorage> {
    /// Open the array at `path`, discovering its format from its metadata.
    ///
    /// Codecs are created with the default [`CodecRegistry`].
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if there is no array metadata at `path` or the metadata is invalid or unsupported.
    pub fn open(storage: Arc<TStorage>, path: &str) -> Result<Self, ArrayCreateError> {
        Self::open_with_registry(storage, path, &CodecRegistry::default())
    }

    /// Open the array at `path`, creating codecs with `registry`.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if there is no array metadata at `path` or the metadata is invalid or unsupported.
    pub fn open_with_registry(
        storage: Arc<TStorage>,
        path: &str,
        registry: &CodecRegistry,
    ) -> Result<Self, ArrayCreateError> {
        let node_path = NodePath::new(path)?;
        let metadata = retrieve_array_metadata(&*storage, &node_path)?;
        log::debug!("opening {} array at {node_path}", metadata.format());
        Self::new_with_metadata(storage, path, metadata, registry)
    }
}

impl<TStorage: ?Sized> Array<TStorage> {
    /// Create an array in `storage` at `path` from `metadata`, creating codecs with `registry`.
    ///
    /// This does not read or write the store.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if the metadata is invalid or unsupported.
    pub fn new_with_metadata(
        storage: Arc<TStorage>,
        path: &str,
        metadata: ArrayMetadata,
        registry: &CodecRegistry,
    ) -> Result<Self, ArrayCreateError> {
        let path = NodePath::new(path)?;
        let parts = match metadata {
            ArrayMetadata::V3(metadata) => parts_from_v3(metadata, registry)?,
            ArrayMetadata::V2(metadata) => parts_from_v2(metadata, registry)?,
            ArrayMetadata::N5(metadata) => parts_from_n5(metadata, registry)?,
        };
        Self::new_with_parts(storage, path, parts)
    }

    pub(super) fn new_with_parts(
        storage: Arc<TStorage>,
        path: NodePath,
        parts: ArrayParts,
    ) -> Result<Self, ArrayCreateError> {
        let ArrayParts {
            format,
            shape,
            data_type,
            chunk_grid,
            chunk_key_encoding,
            fill_value,
            codecs,
            attributes,
            dimension_names,
        } = parts;
        if chunk_grid.dimensionality() != shape.len() {
            return Err(ArrayCreateError::InvalidChunkGridDimensionality(
                chunk_grid.dimensionality(),
                shape.len(),
            ));
        }
        if let Some(dimension_names) = &dimension_names {
            if dimension_names.len() != shape.len() {
                return Err(ArrayCreateError::InvalidDimensionNames(
                    dimension_names.len(),
                    shape.len(),
                ));
            }
        }
        if fill_value.size() != data_type.size() {
            return Err(ArrayCreateError::InvalidFillValue(
                data_type,
                fill_value.size(),
            ));
        }
        codecs.chunk_codecs().bytes_codec().validate(data_type)?;
        if let ArrayCodecs::Sharding(sharding) = &codecs {
            sharding
                .chunks_per_shard(chunk_grid.chunk_shape())
                .map_err(ArrayCreateError::InvalidShardShape)?;
        }
        Ok(Self {
            storage,
            path,
            format,
            shape,
            data_type,
            chunk_grid,
            chunk_key_encoding,
            fill_value,
            codecs,
            attributes,
            dimension_names,
        })
    }

    /// Create the metadata of the array in its container format.
    ///
    /// # Errors
    /// Returns [`ArrayCreateError::UnsupportedByFormat`] if the array configuration cannot be expressed in its format.
    pub fn metadata(&self) -> Result<ArrayMetadata, ArrayCreateError> {
        match self.format {
            ContainerFormat::ZarrV3 => self.metadata_v3().map(ArrayMetadata::V3),
            ContainerFormat::ZarrV2 => self.metadata_v2().map(ArrayMetadata::V2),
            ContainerFormat::N5 => self.metadata_n5().map(ArrayMetadata::N5),
        }
    }

    fn metadata_v3(&self) -> Result<ArrayMetadataV3, ArrayCreateError> {
        let mut metadata = ArrayMetadataV3::new(
            self.shape.clone(),
            self.data_type.name().to_string(),
            self.chunk_grid.create_metadata(),
            self.chunk_key_encoding.create_metadata(),
            self.data_type.metadata_fill_value(&self.fill_value)?,
            self.codecs.create_metadatas(),
        );
        metadata.attributes.clone_from(&self.attributes);
        metadata.dimension_names.clone_from(&self.dimension_names);
        Ok(metadata)
    }

    fn chain_codecs(&self) -> Result<&CodecChain, ArrayCreateError> {
        match &self.codecs {
            ArrayCodecs::Chain(codecs) => Ok(codecs),
            ArrayCodecs::Sharding(_) => Err(ArrayCreateError::unsupported_by_format(
                self.format,
                "sharding",
            )),
        }
    }

    fn metadata_v2(&self) -> Result<ArrayMetadataV2, ArrayCreateError> {
        let codecs = self.chain_codecs()?;
        let endian = codecs.bytes_codec().endian().unwrap_or(Endianness::Little);
        let mut v2_codecs: Vec<CodecMetadataV2> = codecs
            .bytes_to_bytes_codecs()
            .iter()
            .map(|codec| codec.create_metadata_v2())
            .collect();
        let compressor = v2_codecs.pop();
        Ok(ArrayMetadataV2 {
            zarr_format: monostate::MustBe!(2u64),
            shape: self.shape.clone(),
            chunks: self.chunk_grid.chunk_shape().to_vec(),
            dtype: self.data_type.to_v2_dtype(endian),
            compressor,
            fill_value: self.data_type.metadata_fill_value(&self.fill_value)?,
            order: ArrayOrderV2::C,
            filters: if v2_codecs.is_empty() {
                None
            } else {
                Some(v2_codecs)
            },
            dimension_separator: self.chunk_key_encoding.separator(),
            attributes: self.attributes.clone(),
            additional_fields: serde_json::Map::default(),
        })
    }

    fn metadata_n5(&self) -> Result<N5ArrayMetadata, ArrayCreateError> {
        let codecs = self.chain_codecs()?;
        if codecs.bytes_codec().endian() == Some(Endianness::Little) && self.data_type.size() > 1 {
            return Err(ArrayCreateError::unsupported_by_format(
                self.format,
                "little-endian elements",
            ));
        }
        if self.data_type == DataType::Bool {
            return Err(ArrayCreateError::unsupported_by_format(
                self.format,
                "the bool data type",
            ));
        }
        let compression = match codecs.bytes_to_bytes_codecs() {
            [] => N5Compression::raw(),
            [codec] => codec.create_metadata_n5().ok_or_else(|| {
                ArrayCreateError::unsupported_by_format(
                    self.format,
                    format!("the {} codec", codec.create_metadata().name()),
                )
            })?,
            _ => {
                return Err(ArrayCreateError::unsupported_by_format(
                    self.format,
                    "more than one compression codec",
                ))
            }
        };
        let mut attributes = self.attributes.clone();
        if self.path.is_root() {
            attributes.insert("n5".to_string(), N5_VERSION.into());
        }
        Ok(N5ArrayMetadata {
            dimensions: self.shape.iter().rev().copied().collect(),
            block_size: self.chunk_grid.chunk_shape().iter().rev().copied().collect(),
            data_type: self.data_type.name().to_string(),
            compression: Some(compression),
            compression_type: None,
            attributes,
        })
    }
}

fn parts_from_v3(
    metadata: ArrayMetadataV3,
    registry: &CodecRegistry,
) -> Result<ArrayParts, ArrayCreateError> {
    warn_unknown_fields("zarr.json", &metadata.additional_fields);
    if !metadata.storage_transformers.is_empty() {
        return Err(ArrayCreateError::unsupported_by_format(
            ContainerFormat::ZarrV3,
            "storage transformers",
        ));
    }
    let data_type = DataType::from_name(&metadata.data_type)?;
    let chunk_grid = RegularChunkGrid::from_metadata(&metadata.chunk_grid)
        .map_err(ArrayCreateError::ChunkGridCreateError)?;
    let chunk_key_encoding = ChunkKeyEncoding::from_metadata(&metadata.chunk_key_encoding)
        .map_err(ArrayCreateError::ChunkKeyEncodingCreateError)?;
    let fill_value = data_type.fill_value_from_metadata(&metadata.fill_value)?;
    let codecs = match metadata.codecs.as_slice() {
        [codec] if codec.name() == sharding::IDENTIFIER => ArrayCodecs::Sharding(
            ShardingParameters::from_metadata(codec, registry)
                .map_err(ArrayCreateError::from_codec_create_error)?,
        ),
        codecs => ArrayCodecs::Chain(
            CodecChain::from_metadata(codecs, registry)
                .map_err(ArrayCreateError::from_codec_create_error)?,
        ),
    };
    Ok(ArrayParts {
        format: ContainerFormat::ZarrV3,
        shape: metadata.shape,
        data_type,
        chunk_grid,
        chunk_key_encoding,
        fill_value,
        codecs,
        attributes: metadata.attributes,
        dimension_names: metadata.dimension_names,
    })
}

fn parts_from_v2(
    metadata: ArrayMetadataV2,
    registry: &CodecRegistry,
) -> Result<ArrayParts, ArrayCreateError> {
    warn_unknown_fields(".zarray", &metadata.additional_fields);
    if metadata.order == ArrayOrderV2::F {
        return Err(ArrayCreateError::unsupported_by_format(
            ContainerFormat::ZarrV2,
            "column-major (F) order",
        ));
    }
    let (data_type, endian) = DataType::from_v2_dtype(&metadata.dtype)?;
    let chunk_grid = RegularChunkGrid::new(metadata.chunks.clone())?;
    let fill_value = data_type.fill_value_from_metadata(&metadata.fill_value)?;
    let codecs = CodecChain::from_bytes_to_bytes_metadata(
        endian,
        &metadata.codecs(data_type.size()),
        registry,
    )
    .map_err(ArrayCreateError::from_codec_create_error)?;
    Ok(ArrayParts {
        format: ContainerFormat::ZarrV2,
        shape: metadata.shape,
        data_type,
        chunk_grid,
        chunk_key_encoding: ChunkKeyEncoding::new(V2ChunkKeyEncoding::new(
            metadata.dimension_separator,
        )),
        fill_value,
        codecs: ArrayCodecs::Chain(codecs),
        attributes: metadata.attributes,
        dimension_names: None,
    })
}

fn parts_from_n5(
    metadata: N5ArrayMetadata,
    registry: &CodecRegistry,
) -> Result<ArrayParts, ArrayCreateError> {
    let data_type = DataType::from_name(&metadata.data_type)?;
    let chunk_grid = RegularChunkGrid::new(metadata.chunk_shape())?;
    let codecs = metadata.codecs(data_type.size()).map_err(|N5CompressionError(name)| {
        ArrayCreateError::UnsupportedCodec(PluginCreateError::Unsupported {
            name,
            plugin_type: "codec",
        })
    })?;
    let codecs = CodecChain::from_bytes_to_bytes_metadata(Some(Endianness::Big), &codecs, registry)
        .map_err(ArrayCreateError::from_codec_create_error)?;
    let mut attributes = metadata.attributes;
    attributes.remove("n5");
    Ok(ArrayParts {
        format: ContainerFormat::N5,
        shape: metadata.dimensions.iter().rev().copied().collect(),
        data_type,
        chunk_grid,
        chunk_key_encoding: ChunkKeyEncoding::new(N5ChunkKeyEncoding),
        fill_value: FillValue::zero(data_type),
        codecs: ArrayCodecs::Chain(codecs),
        attributes,
        dimension_names: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{store::MemoryStore, StoreKey, WritableStorageTraits};

    fn store_json(store: &MemoryStore, key: &str, json: &str) {
        store
            .set(&StoreKey::new(key).unwrap(), json.as_bytes().to_vec().into())
            .unwrap();
    }

    #[test]
    fn array_metadata_v2_parse() {
        let store = Arc::new(MemoryStore::new());
        store_json(
            &store,
            "raw/.zarray",
            r#"{"zarr_format": 2, "shape": [512, 512, 3], "chunks": [100, 100, 1], "dtype": "<u2",
                "compressor": null, "fill_value": null, "order": "C", "filters": null, "dimension_separator": "/"}"#,
        );
        store_json(&store, "raw/.zattrs", r#"{"description": "raw"}"#);
        let array = Array::open(store, "/raw").unwrap();
        assert_eq!(array.format(), ContainerFormat::ZarrV2);
        assert_eq!(array.data_type(), DataType::UInt16);
        assert_eq!(array.fill_value(), &FillValue::from(0u16));
        assert_eq!(array.attributes()["description"], "raw");
        assert_eq!(array.chunk_key(&[1, 2, 0]).as_str(), "raw/1/2/0");
        assert_eq!(
            array.codecs().chunk_codecs().bytes_codec().endian(),
            Some(Endianness::Little)
        );
        let ArrayMetadata::V2(metadata) = array.metadata().unwrap() else {
            panic!("expected Zarr V2 metadata")
        };
        assert_eq!(metadata.dtype, "<u2");
        assert!(metadata.compressor.is_none());
        assert!(metadata.filters.is_none());
        assert_eq!(metadata.fill_value, serde_json::json!(0));
    }

    #[test]
    fn array_metadata_v2_fortran_order() {
        let store = Arc::new(MemoryStore::new());
        store_json(
            &store,
            "f/.zarray",
            r#"{"zarr_format": 2, "shape": [4], "chunks": [2], "dtype": "|u1",
                "compressor": null, "fill_value": 0, "order": "F", "filters": null}"#,
        );
        assert!(matches!(
            Array::open(store, "/f"),
            Err(ArrayCreateError::UnsupportedByFormat { .. })
        ));
    }

    #[test]
    fn array_metadata_n5_parse() {
        let store = Arc::new(MemoryStore::new());
        store_json(&store, "attributes.json", r#"{"n5": "4.0.0"}"#);
        store_json(
            &store,
            "gzip/attributes.json",
            r#"{"dimensions": [3, 512, 256], "blockSize": [1, 100, 50], "dataType": "int16",
                "compression": {"type": "gzip", "level": -1, "useZlib": false}, "resolution": [1, 1, 1]}"#,
        );
        let array = Array::open(store, "/gzip").unwrap();
        assert_eq!(array.format(), ContainerFormat::N5);
        assert_eq!(array.shape(), &[256, 512, 3]);
        assert_eq!(array.chunk_grid().chunk_shape(), &[50, 100, 1]);
        assert_eq!(array.chunk_key(&[1, 2, 0]).as_str(), "gzip/0/2/1");
        assert_eq!(array.attributes()["resolution"], serde_json::json!([1, 1, 1]));
        let codecs = array.codecs().chunk_codecs();
        assert_eq!(codecs.bytes_codec().endian(), Some(Endianness::Big));
        assert_eq!(codecs.bytes_to_bytes_codecs()[0].create_metadata().name(), "gzip");
    }

    #[test]
    fn array_metadata_n5_unsupported_compression() {
        let store = Arc::new(MemoryStore::new());
        store_json(
            &store,
            "xz/attributes.json",
            r#"{"dimensions": [8], "blockSize": [4], "dataType": "uint8", "compression": {"type": "xz"}}"#,
        );
        assert!(matches!(
            Array::open(store, "/xz"),
            Err(ArrayCreateError::UnsupportedCodec(_))
        ));
    }

    #[test]
    fn array_metadata_missing() {
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            Array::open(store.clone(), "/none"),
            Err(ArrayCreateError::MissingMetadata(_))
        ));
        store_json(&store, "group/.zgroup", r#"{"zarr_format": 2}"#);
        assert!(matches!(
            Array::open(store.clone(), "/group"),
            Err(ArrayCreateError::MissingMetadata(_))
        ));
        store_json(&store, "bad/zarr.json", r#"{"zarr_format": 3, "node_type": "array"}"#);
        assert!(matches!(
            Array::open(store, "/bad"),
            Err(ArrayCreateError::StorageError(_))
        ));
    }

    #[test]
    fn array_metadata_v3_shard_shape() {
        let store = Arc::new(MemoryStore::new());
        store_json(
            &store,
            "sharded/zarr.json",
            r#"{"zarr_format": 3, "node_type": "array", "shape": [16, 16], "data_type": "uint8",
                "chunk_grid": {"name": "regular", "configuration": {"chunk_shape": [8, 8]}},
                "chunk_key_encoding": {"name": "default"}, "fill_value": 0,
                "codecs": [{"name": "sharding_indexed", "configuration": {"chunk_shape": [3, 3],
                    "codecs": [{"name": "bytes"}],
                    "index_codecs": [{"name": "bytes", "configuration": {"endian": "little"}}, {"name": "crc32c"}]}}]}"#,
        );
        assert!(matches!(
            Array::open(store, "/sharded"),
            Err(ArrayCreateError::InvalidShardShape(_))
        ));
    }
}
