//! Facade crate tying the COG reader, tile matrix set builder and reprojection mesher together.
//!
//! Rendering layers, map-widget integration and Zarr store reading are external collaborators;
//! this crate only wires the three subsystems' public types together for convenience.

pub use cog_reader::{
    ArrayDataType, ByteSource, CogError, CogOpenOptions, FetchOptions, GeoTiff, Layout, Overview, RasterArray,
};
pub use raster_affine::crs::{Crs, ProjJsonCrs};
pub use raster_affine::{Affine, AffineError, Anchor, RoundingMode};
pub use reproject_mesh::{CrsConverter, MesherOptions, MeshError, ReprojectorMesh};
pub use tile_matrix_set::{OverviewShape, TileMatrix, TileMatrixSet, TmsError, ToWgs84};

/// Builds the `OverviewShape` list `tile_matrix_set::build` expects directly from an opened
/// `GeoTiff`'s overview pyramid.
pub fn overview_shapes(geotiff: &GeoTiff) -> Vec<OverviewShape> {
    geotiff
        .overviews
        .iter()
        .map(|overview| OverviewShape {
            width: overview.width(),
            height: overview.height(),
            tile_width: overview.tile_width(),
            tile_height: overview.tile_height(),
            affine: overview.affine,
        })
        .collect()
}
