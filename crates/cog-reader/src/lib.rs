//! Lazy, range-fetch Cloud-Optimized GeoTIFF reader.
//!
//! Exposes each IFD as an [`overview::Overview`], decoded through a pluggable
//! [`codec::CodecRegistry`], behind a [`geotiff::GeoTiff`] file façade.

pub mod bytesource;
pub mod codec;
mod error;
mod geotiff;
mod ifd;
mod overview;
pub mod raster_array;

pub use bytesource::{ByteSource, CachedByteSource, ChunkedByteSource, FileByteSource, HttpByteSource, MemoryByteSource};
pub use codec::{CodecRegistry, Predictor, TileDecoder};
pub use error::{CogError, ErrorKind, Result};
pub use geotiff::{CogOpenOptions, GeoTiff};
pub use ifd::CachedTags;
pub use overview::{FetchOptions, Overview};
pub use raster_array::{ArrayDataType, Layout, RasterArray, Window};
