//! Builds an OGC-style Tile Matrix Set from a raster's overview pyramid and geotransform.

mod builder;
mod error;
mod tile_matrix;

pub use builder::{build, build_from_bounds, OverviewShape, ToWgs84, ZarrLevel};
pub use error::{ErrorKind, Result, TmsError};
pub use tile_matrix::{TileMatrix, TileMatrixSet, STANDARDIZED_RENDERING_PIXEL_SIZE_M};
