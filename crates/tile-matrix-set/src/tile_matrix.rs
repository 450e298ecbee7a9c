//! Types mirroring OGC 17-083r2 ("Two Dimensional Tile Matrix Set"), field-named the way
//! `pka-tile-grid`'s `tms.rs`/`tile_matrix_set.rs` wrap `ogcapi_types::tiles::TileMatrixSet`.

use raster_affine::{Affine, Crs};
use serde::Serialize;

/// The standardized rendering pixel size OGC 17-083r2 uses to relate cell size to
/// scale denominator: 0.28mm, matching the WMTS/TMS specifications.
pub const STANDARDIZED_RENDERING_PIXEL_SIZE_M: f64 = 0.28e-3;

#[derive(Debug, Clone, Serialize)]
pub struct TileMatrix {
    pub id: String,
    pub scale_denominator: f64,
    pub cell_size: f64,
    pub point_of_origin: (f64, f64),
    pub tile_width: u32,
    pub tile_height: u32,
    pub matrix_width: u32,
    pub matrix_height: u32,
    #[serde(skip)]
    pub affine: Affine,
}

#[derive(Debug, Clone, Serialize)]
pub struct TileMatrixSet {
    pub crs: Crs,
    pub bounding_box: (f64, f64, f64, f64),
    pub wgs84_bounding_box: (f64, f64, f64, f64),
    /// Coarsest (lowest resolution) first, matching OGC 17-083r2's canonical ordering.
    pub tile_matrices: Vec<TileMatrix>,
}

impl TileMatrixSet {
    pub fn matrix(&self, id: &str) -> Option<&TileMatrix> {
        self.tile_matrices.iter().find(|m| m.id == id)
    }

    pub fn finest(&self) -> Option<&TileMatrix> {
        self.tile_matrices.last()
    }

    pub fn coarsest(&self) -> Option<&TileMatrix> {
        self.tile_matrices.first()
    }
}
