//! Raster acquisition and decoding.
//!
//! [`RasterAcquirer`] turns a [`UnitKey`](crate::demography::UnitKey) into a
//! decoded [`GridHandle`]: it resolves the source URL, consults the cache,
//! streams the download through a [`RasterSource`](crate::source::RasterSource)
//! and decodes the GeoTIFF with its spatial metadata.

mod acquirer;
mod batch;
mod crs;
pub(crate) mod decode;
mod types;

pub use acquirer::{resolve_url, RasterAcquirer};
pub use batch::{run_units, BatchResults};
pub use crs::Crs;
pub use decode::{decode_grid, decode_path, read_metadata};
pub use types::{AcquireError, BoundingBox, DecodeError, GeoTransform, GridHandle, RasterMetadata};
