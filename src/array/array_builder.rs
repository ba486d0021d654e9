use std::sync::Arc;

use crate::{
    metadata::{ContainerFormat, Metadata},
    node::NodePath,
};

use super::{
    array_metadata::ArrayParts,
    chunk_key_encoding::{DefaultChunkKeyEncoding, N5ChunkKeyEncoding, V2ChunkKeyEncoding},
    codec::{BytesCodec, Codec},
    sharding::{default_index_codecs, ShardingIndexLocation},
    Array, ArrayCodecs, ArrayCreateError, ArrayShape, ChunkKeyEncoding, ChunkKeySeparator,
    CodecChain, CodecRegistry, DataType, Endianness, FillValue, RegularChunkGrid,
    ShardingParameters,
};

#[derive(Debug, Clone)]
enum BuilderCodecs {
    Codecs(Vec<Codec>),
    Metadata(Vec<Metadata>),
}

/// An [`Array`] builder.
///
/// The array builder is initialised from an array shape, data type, and chunk shape.
///  - The container format is Zarr V3.
///  - The only codec enabled by default is `bytes` (little-endian, or big-endian for N5), so the output is uncompressed.
///  - The chunk key separator is `/` for Zarr V3 and N5, and `.` for Zarr V2.
///  - The fill value is zero.
///  - The array is not sharded.
///  - Attributes and dimension names are empty.
///
/// Use the methods in the array builder to change the configuration away from these defaults, and then build the array at a path of some storage with [`ArrayBuilder::build`].
/// Note that [`build`](ArrayBuilder::build) does not modify the store; the array metadata has to be explicitly written with [`Array::store_metadata`].
///
/// For example:
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # use std::sync::Arc;
/// use zarrs_compat::array::{ArrayBuilder, DataType, FillValue};
/// use zarrs_compat::metadata::ContainerFormat;
/// # let store = Arc::new(zarrs_compat::storage::store::MemoryStore::new());
/// let array = ArrayBuilder::new(
///     vec![8, 8], // array shape
///     DataType::Float32,
///     vec![4, 4], // chunk shape
/// )
/// .format(ContainerFormat::ZarrV2)
/// .fill_value(FillValue::from(f32::NAN))
/// .bytes_to_bytes_codecs(vec![
///     zarrs_compat::array::codec::Codec::new(zarrs_compat::array::codec::Crc32cCodec::new()),
/// ])
/// .build(store.clone(), "/group/array")?;
/// array.store_metadata()?; // write metadata to the store
///
/// // array.write(...)
/// // array.store_chunk(...)
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ArrayBuilder {
    shape: ArrayShape,
    data_type: DataType,
    chunk_shape: ArrayShape,
    format: ContainerFormat,
    chunk_key_separator: Option<ChunkKeySeparator>,
    chunk_key_encoding: Option<ChunkKeyEncoding>,
    fill_value: Option<FillValue>,
    codecs: BuilderCodecs,
    endianness: Option<Endianness>,
    shard_shape: Option<ArrayShape>,
    shard_index_location: ShardingIndexLocation,
    attributes: serde_json::Map<String, serde_json::Value>,
    dimension_names: Option<Vec<Option<String>>>,
}

impl ArrayBuilder {
    /// Create a new array builder.
    #[must_use]
    pub fn new(shape: ArrayShape, data_type: DataType, chunk_shape: ArrayShape) -> Self {
        Self {
            shape,
            data_type,
            chunk_shape,
            format: ContainerFormat::default(),
            chunk_key_separator: None,
            chunk_key_encoding: None,
            fill_value: None,
            codecs: BuilderCodecs::Codecs(Vec::default()),
            endianness: None,
            shard_shape: None,
            shard_index_location: ShardingIndexLocation::default(),
            attributes: serde_json::Map::default(),
            dimension_names: None,
        }
    }

    /// Set the container format.
    pub fn format(&mut self, format: ContainerFormat) -> &mut Self {
        self.format = format;
        self
    }

    /// Set the chunk key separator, and thus the [`ChunkKeyLayout`](super::ChunkKeyLayout).
    ///
    /// N5 only supports the `/` separator.
    pub fn chunk_key_separator(&mut self, separator: ChunkKeySeparator) -> &mut Self {
        self.chunk_key_separator = Some(separator);
        self
    }

    /// Set the chunk key encoding of a Zarr V3 array, overriding the chunk key separator.
    pub fn chunk_key_encoding(&mut self, chunk_key_encoding: ChunkKeyEncoding) -> &mut Self {
        self.chunk_key_encoding = Some(chunk_key_encoding);
        self
    }

    /// Set the fill value.
    ///
    /// N5 arrays always have a zero fill value.
    pub fn fill_value(&mut self, fill_value: FillValue) -> &mut Self {
        self.fill_value = Some(fill_value);
        self
    }

    /// Set the bytes to bytes codecs.
    pub fn bytes_to_bytes_codecs(&mut self, codecs: Vec<Codec>) -> &mut Self {
        self.codecs = BuilderCodecs::Codecs(codecs);
        self
    }

    /// Set the bytes to bytes codecs from metadata, which is resolved against the codec registry on [`build`](ArrayBuilder::build).
    pub fn bytes_to_bytes_codecs_metadata(&mut self, codecs: Vec<Metadata>) -> &mut Self {
        self.codecs = BuilderCodecs::Metadata(codecs);
        self
    }

    /// Set the byte order of multi-byte elements.
    ///
    /// N5 only supports big-endian elements.
    pub fn endianness(&mut self, endianness: Endianness) -> &mut Self {
        self.endianness = Some(endianness);
        self
    }

    /// Shard a Zarr V3 array, storing the chunks within each region of `shard_shape` in a single shard.
    ///
    /// The shard shape must be a multiple of the chunk shape.
    pub fn shard_shape(&mut self, shard_shape: ArrayShape) -> &mut Self {
        self.shard_shape = Some(shard_shape);
        self
    }

    /// Set the location of the shard index.
    ///
    /// If left unmodified, the index is at the end of each shard.
    pub fn shard_index_location(&mut self, index_location: ShardingIndexLocation) -> &mut Self {
        self.shard_index_location = index_location;
        self
    }

    /// Set the user defined attributes.
    pub fn attributes(&mut self, attributes: serde_json::Map<String, serde_json::Value>) -> &mut Self {
        self.attributes = attributes;
        self
    }

    /// Set the dimension names of a Zarr V3 array.
    pub fn dimension_names<I, D>(&mut self, dimension_names: I) -> &mut Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        self.dimension_names = Some(
            dimension_names
                .into_iter()
                .map(|name| Some(name.into()))
                .collect(),
        );
        self
    }

    /// Build into an [`Array`], creating codecs from metadata with the default [`CodecRegistry`].
    ///
    /// # Errors
    /// Returns [`ArrayCreateError`] if the path is invalid, a codec is unsupported,
    /// or the configuration is invalid or cannot be expressed in the container format.
    pub fn build<TStorage: ?Sized>(
        &self,
        storage: Arc<TStorage>,
        path: &str,
    ) -> Result<Array<TStorage>, ArrayCreateError> {
        self.build_with_registry(storage, path, &CodecRegistry::default())
    }

    /// Build into an [`Array`], creating codecs from metadata with `registry`.
    ///
    /// # Errors
    /// See [`build`](ArrayBuilder::build).
    pub fn build_with_registry<TStorage: ?Sized>(
        &self,
        storage: Arc<TStorage>,
        path: &str,
        registry: &CodecRegistry,
    ) -> Result<Array<TStorage>, ArrayCreateError> {
        let path = NodePath::new(path)?;
        self.validate_format()?;

        let bytes_to_bytes = match &self.codecs {
            BuilderCodecs::Codecs(codecs) => codecs.clone(),
            BuilderCodecs::Metadata(metadatas) => metadatas
                .iter()
                .map(|metadata| registry.create(metadata))
                .collect::<Result<Vec<_>, _>>()
                .map_err(ArrayCreateError::from_codec_create_error)?,
        };
        let endianness = self.endianness.unwrap_or(match self.format {
            ContainerFormat::N5 => Endianness::Big,
            ContainerFormat::ZarrV3 | ContainerFormat::ZarrV2 => Endianness::Little,
        });
        let codecs = CodecChain::new(BytesCodec::new(Some(endianness)), bytes_to_bytes);

        let chunk_key_encoding = match self.format {
            ContainerFormat::ZarrV3 => self.chunk_key_encoding.clone().unwrap_or_else(|| {
                ChunkKeyEncoding::new(DefaultChunkKeyEncoding::new(
                    self.chunk_key_separator.unwrap_or(ChunkKeySeparator::Slash),
                ))
            }),
            ContainerFormat::ZarrV2 => ChunkKeyEncoding::new(V2ChunkKeyEncoding::new(
                self.chunk_key_separator.unwrap_or(ChunkKeySeparator::Dot),
            )),
            ContainerFormat::N5 => ChunkKeyEncoding::new(N5ChunkKeyEncoding),
        };

        let (chunk_grid, codecs) = match &self.shard_shape {
            Some(shard_shape) => (
                RegularChunkGrid::new(shard_shape.clone())?,
                ArrayCodecs::Sharding(
                    ShardingParameters::new(
                        self.chunk_shape.clone(),
                        codecs,
                        default_index_codecs(),
                        self.shard_index_location,
                    )
                    .map_err(ArrayCreateError::CodecsCreateError)?,
                ),
            ),
            None => (
                RegularChunkGrid::new(self.chunk_shape.clone())?,
                ArrayCodecs::Chain(codecs),
            ),
        };

        let array = Array::new_with_parts(
            storage,
            path,
            ArrayParts {
                format: self.format,
                shape: self.shape.clone(),
                data_type: self.data_type,
                chunk_grid,
                chunk_key_encoding,
                fill_value: self
                    .fill_value
                    .clone()
                    .unwrap_or_else(|| FillValue::zero(self.data_type)),
                codecs,
                attributes: self.attributes.clone(),
                dimension_names: self.dimension_names.clone(),
            },
        )?;
        // The configuration must be expressible in the container format before anything is stored.
        array.metadata()?;
        log::debug!("created {} array at {}", array.format(), array.path());
        Ok(array)
    }

    fn validate_format(&self) -> Result<(), ArrayCreateError> {
        let unsupported = |reason| Err(ArrayCreateError::unsupported_by_format(self.format, reason));
        if self.format != ContainerFormat::ZarrV3 {
            if self.shard_shape.is_some() {
                return unsupported("sharding");
            }
            if self.dimension_names.is_some() {
                return unsupported("dimension names");
            }
            if self.chunk_key_encoding.is_some() {
                return unsupported("a custom chunk key encoding");
            }
        }
        if self.format == ContainerFormat::N5 {
            if self.chunk_key_separator == Some(ChunkKeySeparator::Dot) {
                return unsupported("the flat chunk key layout");
            }
            if self.endianness == Some(Endianness::Little) {
                return unsupported("little-endian elements");
            }
            if let Some(fill_value) = &self.fill_value {
                if fill_value != &FillValue::zero(self.data_type) {
                    return unsupported("a non-zero fill value");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        array::ChunkKeyLayout,
        metadata::ArrayMetadata,
        storage::store::MemoryStore,
    };

    #[test]
    fn array_builder_defaults() {
        let store = Arc::new(MemoryStore::new());
        let array = ArrayBuilder::new(vec![8, 8], DataType::UInt16, vec![4, 4])
            .build(store, "/array")
            .unwrap();
        assert_eq!(array.format(), ContainerFormat::ZarrV3);
        assert_eq!(array.fill_value(), &FillValue::from(0u16));
        assert_eq!(array.chunk_key_encoding().layout(), ChunkKeyLayout::Nested);
        assert_eq!(
            array.codecs().chunk_codecs().bytes_codec().endian(),
            Some(Endianness::Little)
        );
        assert!(array.sharding().is_none());
    }

    #[test]
    fn array_builder_format_defaults() {
        let store = Arc::new(MemoryStore::new());
        let array = ArrayBuilder::new(vec![8, 8], DataType::Int32, vec![4, 4])
            .format(ContainerFormat::ZarrV2)
            .build(store.clone(), "/v2")
            .unwrap();
        assert_eq!(array.chunk_key(&[1, 0]).as_str(), "v2/1.0");
        let ArrayMetadata::V2(metadata) = array.metadata().unwrap() else {
            panic!("expected Zarr V2 metadata")
        };
        assert_eq!(metadata.dtype, "<i4");

        let array = ArrayBuilder::new(vec![8, 8], DataType::Int32, vec![4, 4])
            .format(ContainerFormat::N5)
            .build(store, "/n5")
            .unwrap();
        assert_eq!(array.chunk_key(&[1, 0]).as_str(), "n5/0/1");
        assert_eq!(
            array.codecs().chunk_codecs().bytes_codec().endian(),
            Some(Endianness::Big)
        );
    }

    #[test]
    fn array_builder_unsupported_by_format() {
        let store = Arc::new(MemoryStore::new());
        let unsupported = |builder: &ArrayBuilder| {
            matches!(
                builder.build(store.clone(), "/array"),
                Err(ArrayCreateError::UnsupportedByFormat { .. })
            )
        };
        let mut builder = ArrayBuilder::new(vec![8], DataType::UInt8, vec![4]);
        builder.format(ContainerFormat::N5);
        assert!(unsupported(builder.clone().chunk_key_separator(ChunkKeySeparator::Dot)));
        assert!(unsupported(builder.clone().endianness(Endianness::Little)));
        assert!(unsupported(builder.clone().fill_value(FillValue::from(1u8))));
        assert!(unsupported(builder.clone().shard_shape(vec![8])));
        assert!(unsupported(builder.clone().bytes_to_bytes_codecs_metadata(vec![
            Metadata::new("crc32c")
        ])));
        assert!(!unsupported(&builder));
        let mut builder = ArrayBuilder::new(vec![8], DataType::UInt8, vec![4]);
        builder.format(ContainerFormat::ZarrV2);
        assert!(unsupported(builder.clone().dimension_names(["x"])));
    }

    #[test]
    fn array_builder_sharding() {
        let store = Arc::new(MemoryStore::new());
        let array = ArrayBuilder::new(vec![16, 16], DataType::UInt8, vec![4, 4])
            .shard_shape(vec![8, 8])
            .build(store.clone(), "/sharded")
            .unwrap();
        assert_eq!(array.chunk_grid().chunk_shape(), &[8, 8]);
        assert_eq!(array.sharding().unwrap().chunk_shape(), &[4, 4]);
        assert!(matches!(
            ArrayBuilder::new(vec![16, 16], DataType::UInt8, vec![3, 3])
                .shard_shape(vec![8, 8])
                .build(store, "/invalid"),
            Err(ArrayCreateError::InvalidShardShape(_))
        ));
    }

    #[test]
    fn array_builder_invalid() {
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            ArrayBuilder::new(vec![8, 8], DataType::UInt8, vec![4])
                .build(store.clone(), "/array"),
            Err(ArrayCreateError::InvalidChunkGridDimensionality(1, 2))
        ));
        assert!(matches!(
            ArrayBuilder::new(vec![8, 8], DataType::UInt8, vec![4, 0])
                .build(store.clone(), "/array"),
            Err(ArrayCreateError::InvalidChunkShape(_))
        ));
        assert!(matches!(
            ArrayBuilder::new(vec![8], DataType::UInt16, vec![4])
                .fill_value(FillValue::from(1u8))
                .build(store.clone(), "/array"),
            Err(ArrayCreateError::InvalidFillValue(DataType::UInt16, 1))
        ));
        assert!(matches!(
            ArrayBuilder::new(vec![8], DataType::UInt8, vec![4]).build(store, "array"),
            Err(ArrayCreateError::NodePathError(_))
        ));
    }
}
