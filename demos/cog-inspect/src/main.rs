//! Opens a COG from a local path and prints its overview pyramid, CRS, and the tile matrix set
//! derived from it. Thin integration glue demonstrating how the three crates compose; the
//! actual layer/widget consumers of this data live outside this repository.

use std::path::PathBuf;

use cog_reader::{CogOpenOptions, FileByteSource, GeoTiff};
use raster_affine::Crs;
use tile_matrix_set::ToWgs84;

struct IdentityWgs84;
impl ToWgs84 for IdentityWgs84 {
    fn to_wgs84(&self, x: f64, y: f64) -> (f64, f64) {
        // Real callers supply a CRS-aware converter; this demo assumes the source is already
        // in geographic coordinates so the boundary sampling has something to print.
        (x, y)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = std::env::args().nth(1).map(PathBuf::from).ok_or_else(|| anyhow::anyhow!("usage: cog-inspect <path.tif>"))?;

    let source = FileByteSource::new(path);
    let geotiff = GeoTiff::open(source, CogOpenOptions::default()).await?;

    println!("overview levels: {}", geotiff.overview_count());
    for (level, overview) in geotiff.overviews.iter().enumerate() {
        println!(
            "  level {level}: {}x{} px, tiles {}x{}, affine {:?}",
            overview.width(),
            overview.height(),
            overview.tiles_wide(),
            overview.tiles_high(),
            overview.affine
        );
    }

    match &geotiff.crs {
        Some(Crs::Epsg(code)) => println!("crs: EPSG:{code}"),
        Some(Crs::Projjson(crs)) => println!("crs: {}", serde_json::to_string_pretty(crs)?),
        None => println!("crs: none found"),
    }

    let overviews = raster_viz::overview_shapes(&geotiff);
    if let Some(crs) = geotiff.crs.clone() {
        let tms = tile_matrix_set::build(&overviews, crs, None, &IdentityWgs84)?;
        println!("tile matrix set: {} levels, wgs84 bounds {:?}", tms.tile_matrices.len(), tms.wgs84_bounding_box);
    }

    Ok(())
}
