//! A chunked N-dimensional array storage engine that reads and writes [Zarr V3](https://zarr.dev), Zarr V2 and [N5](https://github.com/saalfeldlab/n5) datasets.
//!
//! An array is partitioned into chunks, each independently encoded by a codec pipeline (e.g. `gzip`, `blosc`, `zlib`, or raw)
//! and stored under a key derived from its chunk grid indices by a chunk key encoding.
//! Datasets written by this crate are readable by other implementations of each format, and vice versa.
//!
//! ## Getting Started
//! [`array::Array`] and [`storage`] are good places to start.
//! [`array::create_dataset`] and [`array::open_dataset`] cover the common case,
//! and [`array::ArrayBuilder`] exposes every option (format, chunk key layout, codecs, sharding, fill value, attributes).
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use zarrs_compat::array::{create_dataset, open_dataset, ChunkKeyLayout, DataType};
//! use zarrs_compat::metadata::Metadata;
//! # let store = Arc::new(zarrs_compat::storage::store::MemoryStore::new());
//! let array = create_dataset(
//!     store.clone(),
//!     "/crc32c",
//!     vec![512, 512, 3],
//!     vec![100, 100, 1],
//!     DataType::UInt8,
//!     vec![Metadata::new("crc32c")],
//!     ChunkKeyLayout::Nested,
//! )?;
//! let image: Vec<u8> = (0..512 * 512 * 3).map(|i| (i % 251) as u8).collect();
//! array.write(&[512, 512, 3], &image)?;
//!
//! let array = open_dataset(store, "/crc32c")?;
//! assert_eq!(array.retrieve_array_subset(&array.subset_all())?, image);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Crate Features
//! #### Default
//!  - `ndarray`: [`ndarray`] utility functions for [`Array`](crate::array::Array).
//!  - Codecs: `blosc`, `bz2`, `gzip`, `zlib`, `zstd`.
//!
//! The `crc32c` codec is always available.
//!
//! ## Licence
//! `zarrs_compat` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod array;
pub mod array_subset;
pub mod byte_range;
pub mod config;
pub mod group;
pub mod metadata;
pub mod node;
pub mod plugin;
pub mod storage;
