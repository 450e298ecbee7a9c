//! Builds a [`TileMatrixSet`] from a raster's overview pyramid.
//!
//! Follows `tile.rs` (`pixel_size_at_zoom_level`'s literal-expected-value test style, reused
//! here for the scale denominator table) and `pka-tile-grid`'s `tms.rs` for OGC field naming.
//! The CRS forward/inverse projector is injected rather than computed internally — this crate
//! does no map-projection math of its own.

use raster_affine::crs::LinearUnit;
use raster_affine::{Affine, Crs};

use crate::error::{Result, TmsError};
use crate::tile_matrix::{TileMatrix, TileMatrixSet, STANDARDIZED_RENDERING_PIXEL_SIZE_M};

/// One overview level's shape, as consumed by the builder. Deliberately decoupled from
/// `cog_reader::Overview` so this crate doesn't need a hard dependency on the reader's
/// internals beyond the few fields a tile matrix actually needs.
#[derive(Debug, Clone)]
pub struct OverviewShape {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub affine: Affine,
}

/// Converts a point from the raster's CRS to longitude/latitude (degrees), used only to
/// compute the tile matrix set's WGS84 bounding box by sampling the image boundary.
pub trait ToWgs84 {
    fn to_wgs84(&self, x: f64, y: f64) -> (f64, f64);
}

/// Returns the number of metres one unit of `unit` represents; degrees use the WGS84
/// semi-major-axis-derived approximation, matching common WMTS TileMatrixSet implementations.
fn meters_per_unit_linear(unit: LinearUnit) -> f64 {
    unit.to_metres_factor()
}

const METERS_PER_DEGREE: f64 = 111_319.490_793_273_58;

fn scale_denominator(cell_size: f64, meters_per_unit: f64) -> f64 {
    (cell_size.abs() * meters_per_unit) / STANDARDIZED_RENDERING_PIXEL_SIZE_M
}

/// Samples `n_points` (minimum 20) evenly spaced points along the image boundary and returns
/// the union of their WGS84 longitude/latitude, i.e. an axis-aligned bounding box that is
/// guaranteed to contain the true (possibly non-rectangular, under reprojection) image footprint.
fn wgs84_bounds_from_boundary(width: f64, height: f64, affine: &Affine, to_wgs84: &dyn ToWgs84) -> Result<(f64, f64, f64, f64)> {
    const MIN_SAMPLES_PER_EDGE: usize = 5; // 4 edges * 5 = 20 boundary points minimum.

    let mut min_lon = f64::INFINITY;
    let mut max_lon = f64::NEG_INFINITY;
    let mut min_lat = f64::INFINITY;
    let mut max_lat = f64::NEG_INFINITY;

    let mut sample = |col: f64, row: f64| {
        let (x, y) = affine.forward(col, row);
        let (lon, lat) = to_wgs84.to_wgs84(x, y);
        min_lon = min_lon.min(lon);
        max_lon = max_lon.max(lon);
        min_lat = min_lat.min(lat);
        max_lat = max_lat.max(lat);
    };

    for i in 0..=MIN_SAMPLES_PER_EDGE {
        let t = i as f64 / MIN_SAMPLES_PER_EDGE as f64;
        sample(t * width, 0.0);
        sample(t * width, height);
        sample(0.0, t * height);
        sample(width, t * height);
    }

    if !min_lon.is_finite() || !max_lon.is_finite() || !min_lat.is_finite() || !max_lat.is_finite() {
        return Err(TmsError::InvalidBounds { reason: "boundary sampling produced non-finite coordinates".into() });
    }

    Ok((min_lon, min_lat, max_lon, max_lat))
}

/// Builds a [`TileMatrixSet`] from `overviews` (finest-first, as `GeoTiff::overviews` returns
/// them) and the raster's CRS.
pub fn build(overviews: &[OverviewShape], crs: Crs, linear_unit: Option<LinearUnit>, to_wgs84: &dyn ToWgs84) -> Result<TileMatrixSet> {
    let primary = overviews.first().ok_or(TmsError::NoOverviews)?;

    let meters_per_unit = match &crs {
        Crs::Epsg(code) if is_geographic_epsg(*code) => METERS_PER_DEGREE,
        _ => linear_unit.map(meters_per_unit_linear).unwrap_or(1.0),
    };

    let (origin_x, origin_y) = primary.affine.origin();
    let bounding_box = (
        origin_x,
        origin_y + primary.height as f64 * primary.affine.cell_size_y(),
        origin_x + primary.width as f64 * primary.affine.cell_size_x(),
        origin_y,
    );
    let wgs84_bounding_box = wgs84_bounds_from_boundary(primary.width as f64, primary.height as f64, &primary.affine, to_wgs84)?;

    let mut tile_matrices: Vec<TileMatrix> = overviews
        .iter()
        .enumerate()
        .map(|(level, overview)| {
            let cell_size = overview.affine.cell_size_x().abs();
            TileMatrix {
                id: level.to_string(),
                scale_denominator: scale_denominator(cell_size, meters_per_unit),
                cell_size,
                point_of_origin: overview.affine.origin(),
                tile_width: overview.tile_width,
                tile_height: overview.tile_height,
                matrix_width: overview.width.div_ceil(overview.tile_width),
                matrix_height: overview.height.div_ceil(overview.tile_height),
                affine: overview.affine,
            }
        })
        .collect();

    // `overviews` is finest-first; the tile matrix set's canonical order is coarsest-first.
    tile_matrices.reverse();

    Ok(TileMatrixSet { crs, bounding_box, wgs84_bounding_box, tile_matrices })
}

fn is_geographic_epsg(code: u32) -> bool {
    // The common geographic CRS codes (WGS84 and friends); a full EPSG registry lookup is out
    // of scope, matching this crate's "no network lookup" CRS policy.
    matches!(code, 4326 | 4269 | 4258 | 4267)
}

/// One resolution level of a Zarr-style pyramid: just its full pixel dimensions, since Zarr
/// stores each level as its own pre-resampled array rather than deriving resolution from a
/// single geotransform the way a COG overview pyramid does.
#[derive(Debug, Clone, Copy)]
pub struct ZarrLevel {
    pub width: u32,
    pub height: u32,
}

/// Wraps longitude bounds into the canonical -180..180 range. A span that already covers the
/// full globe (360 degrees or more, e.g. the common `[0, 360]` Zarr convention) maps to the
/// canonical `[-180, 180]` rather than being wrapped point-by-point, which would otherwise
/// collapse it to a zero-width range. Narrower spans wrap each endpoint independently and bump
/// the max back above the min if wrapping reordered them across the antimeridian.
fn normalize_longitude_bounds(min_lon: f64, max_lon: f64) -> (f64, f64) {
    if max_lon - min_lon >= 360.0 {
        return (-180.0, 180.0);
    }
    let wrap = |lon: f64| (lon + 180.0).rem_euclid(360.0) - 180.0;
    let norm_min = wrap(min_lon);
    let mut norm_max = wrap(max_lon);
    if norm_max <= norm_min {
        norm_max += 360.0;
    }
    (norm_min, norm_max)
}

/// Builds a [`TileMatrixSet`] the way a Zarr-backed dataset would, from an authoritative bounds
/// rectangle and an already-computed pyramid of resolution levels (coarsest first), rather than
/// from a raster's own overview pyramid and geotransform (see [`build`]). This is the builder's
/// *contract* for that data source, not a Zarr array/metadata parser.
///
/// Each level's cell size is derived independently per dimension from `bounds` and that level's
/// own pixel dimensions — pyramid generation can round `width` and `height` differently — and
/// every level's `point_of_origin` is taken from the same (possibly longitude-normalised)
/// bounds, so it is bit-identical across the whole set.
pub fn build_from_bounds(
    bounds: (f64, f64, f64, f64),
    levels: &[ZarrLevel],
    crs: Crs,
    linear_unit: Option<LinearUnit>,
    chunk_shape: (u32, u32),
) -> Result<TileMatrixSet> {
    if levels.is_empty() {
        return Err(TmsError::NoOverviews);
    }

    let is_geographic = matches!(&crs, Crs::Epsg(code) if is_geographic_epsg(*code));
    let (min_lon, min_lat, max_lon, max_lat) = bounds;
    let (min_lon, max_lon) = if is_geographic { normalize_longitude_bounds(min_lon, max_lon) } else { (min_lon, max_lon) };

    let meters_per_unit = if is_geographic { METERS_PER_DEGREE } else { linear_unit.map(meters_per_unit_linear).unwrap_or(1.0) };
    let origin = (min_lon, max_lat);

    let tile_matrices: Vec<TileMatrix> = levels
        .iter()
        .enumerate()
        .map(|(index, level)| {
            let cell_size_x = (max_lon - min_lon) / level.width as f64;
            let cell_size_y = (max_lat - min_lat) / level.height as f64;
            let tile_width = chunk_shape.0.min(level.width).max(1);
            let tile_height = chunk_shape.1.min(level.height).max(1);
            TileMatrix {
                id: index.to_string(),
                scale_denominator: scale_denominator(cell_size_x.max(cell_size_y), meters_per_unit),
                cell_size: cell_size_x,
                point_of_origin: origin,
                tile_width,
                tile_height,
                matrix_width: level.width.div_ceil(tile_width),
                matrix_height: level.height.div_ceil(tile_height),
                affine: Affine::from_origin_and_cell_size(origin.0, origin.1, cell_size_x, -cell_size_y),
            }
        })
        .collect();

    Ok(TileMatrixSet { crs, bounding_box: (min_lon, min_lat, max_lon, max_lat), wgs84_bounding_box: (min_lon, min_lat, max_lon, max_lat), tile_matrices })
}
