//! The opened COG as a whole: primary image plus sorted overviews, with cached CRS and tags.
//!
//! `GeoTiff::open`'s five steps (tag pre-fetch, IFD walk, tile inventory, GeoKeyDirectory
//! parsing) follow `cog/reader.rs::parse_cog_header` and `cog/decoder.rs::read_projection_info`
//! in the reference COG reader this workspace builds on, generalised from a single-band/LZW-only
//! reader to a multi-band, multi-codec, mask-aware one.

use std::sync::Arc;

use raster_affine::{crs::GeoKeyDirectory, Affine, Crs};
use tiff::decoder::ifd::Value;
use tiff::tags::Tag;
use tokio_util::sync::CancellationToken;

use crate::bytesource::{CachedByteSource, ByteSource};
use crate::codec::CodecRegistry;
use crate::error::{CogError, Result};
use crate::ifd::{self, CachedTags};
use crate::overview::{FetchOptions, Overview};
use crate::raster_array::{RasterArray, Window};

/// Bytes fetched eagerly to cover the TIFF header and IFD chain. IFDs are small relative to
/// pixel data, so the whole metadata region is read into memory once at open time; pixel data
/// is always fetched lazily, per tile, straight from the byte source.
const INITIAL_HEADER_REGION: u64 = 256 * 1024;

#[derive(Clone)]
pub struct CogOpenOptions {
    pub chunk_size: u64,
    pub cache_size: u64,
    pub decoder_pool: Option<Arc<tokio::sync::Semaphore>>,
    pub cancellation: Option<CancellationToken>,
}

impl Default for CogOpenOptions {
    fn default() -> Self {
        CogOpenOptions {
            chunk_size: 32 * 1024,
            cache_size: 1024 * 1024 * 1024,
            decoder_pool: None,
            cancellation: None,
        }
    }
}

pub struct GeoTiff {
    /// Finest-first, matching the TIFF's own IFD traversal order.
    pub overviews: Vec<Overview>,
    pub crs: Option<Crs>,
    pub cancellation: Option<CancellationToken>,
}

impl GeoTiff {
    pub async fn open<S: ByteSource + 'static>(source: S, options: CogOpenOptions) -> Result<Self> {
        let cached_source: Arc<dyn ByteSource> = Arc::new(CachedByteSource::new(source, options.chunk_size, options.cache_size));
        let registry = Arc::new(CodecRegistry::with_defaults());

        // Step 1: fetch the header + IFD-chain region eagerly.
        let total_len = cached_source.len().await?;
        let header_len = total_len.min(INITIAL_HEADER_REGION);
        let buffer = cached_source.fetch(0, header_len).await?.to_vec();

        let mut decoder = ifd::open_decoder(buffer)?;

        // Step 2: parse the primary IFD's tags and the geotransform/CRS.
        let primary_tags = ifd::read_cached_tags(&mut decoder)?;
        let affine = read_geo_transform(&mut decoder)?;
        let crs = read_crs(&mut decoder)?;

        // Step 3: walk the remaining IFDs, each one either another overview level or a mask
        // paired with the most recently seen data IFD.
        let mut levels: Vec<(CachedTags, Option<CachedTags>)> = vec![(primary_tags, None)];

        loop {
            match decoder.next_image() {
                Ok(()) => {}
                Err(tiff::TiffError::FormatError(tiff::TiffFormatError::ImageFileDirectoryNotFound)) => break,
                Err(e) => return Err(CogError::Tiff(e)),
            }
            let tags = ifd::read_cached_tags(&mut decoder)?;

            // Step 4: pair mask IFDs with the preceding data IFD instead of treating them as
            // their own overview level.
            if tags.is_mask() {
                if let Some(last) = levels.last_mut() {
                    last.1 = Some(tags);
                    continue;
                }
            }
            levels.push((tags, None));
        }

        // Overviews are already finest-first (primary first) by construction; verify the
        // invariant explicitly rather than assume the file was well-formed.
        for pair in levels.windows(2) {
            let a_pixels = pair[0].0.image_width as u64 * pair[0].0.image_height as u64;
            let b_pixels = pair[1].0.image_width as u64 * pair[1].0.image_height as u64;
            if b_pixels >= a_pixels {
                return Err(CogError::InvalidTiff {
                    reason: "overview IFDs are not in strictly descending pixel-count order".into(),
                });
            }
        }

        let primary_width = levels[0].0.image_width as f64;
        let primary_height = levels[0].0.image_height as f64;

        let overviews = levels
            .into_iter()
            .map(|(data_tags, mask_tags)| {
                let level_affine = overview_affine(&affine, primary_width, primary_height, &data_tags);
                Overview::new(
                    data_tags,
                    mask_tags,
                    level_affine,
                    cached_source.clone(),
                    registry.clone(),
                    options.decoder_pool.clone(),
                )
            })
            .collect::<Vec<_>>();

        Ok(GeoTiff { overviews, crs, cancellation: options.cancellation })
    }

    pub fn primary(&self) -> &Overview {
        &self.overviews[0]
    }

    pub fn overview_count(&self) -> usize {
        self.overviews.len()
    }

    /// Reads `window` from the primary (finest) resolution level. Delegates to
    /// `Overview::read`, which issues each tile's data and mask fetches concurrently.
    pub async fn read(&self, window: Window, options: &FetchOptions) -> Result<RasterArray> {
        self.primary().read(window, options).await
    }

    /// Reads `window` from a specific overview level (`0` is the primary/finest level).
    pub async fn read_overview(&self, level: usize, window: Window, options: &FetchOptions) -> Result<RasterArray> {
        let overview = self.overviews.get(level).ok_or_else(|| CogError::InvalidTiff { reason: format!("no overview level {level}") })?;
        overview.read(window, options).await
    }
}

/// Each overview shares the primary image's origin; its cell size is the primary's scaled by
/// the ratio of pixel dimensions, matching how GDAL writes power-of-two overview pyramids.
fn overview_affine(primary_affine: &Affine, primary_width: f64, primary_height: f64, tags: &CachedTags) -> Affine {
    let (origin_x, origin_y) = primary_affine.origin();
    let scale_x = primary_width / tags.image_width as f64;
    let scale_y = primary_height / tags.image_height as f64;
    Affine::from_origin_and_cell_size(
        origin_x,
        origin_y,
        primary_affine.cell_size_x() * scale_x,
        primary_affine.cell_size_y() * scale_y,
    )
}

fn read_geo_transform<R: std::io::Read + std::io::Seek>(decoder: &mut tiff::decoder::Decoder<R>) -> Result<Affine> {
    let pixel_scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tie_points = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();
    let transformation = decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok();

    if let Some(t) = transformation {
        if t.len() >= 16 {
            // Row-major 4x4: [a, b, 0, c, d, e, 0, f, ...]
            return Ok(Affine::new([t[0], t[1], t[3], t[4], t[5], t[7]]));
        }
    }

    if let (Some(scale), Some(tie)) = (pixel_scale, tie_points) {
        if scale.len() < 2 || tie.len() < 6 {
            return Err(CogError::InvalidTiff { reason: "ModelPixelScale/ModelTiepoint tag has too few values".into() });
        }
        let cell_size_x = scale[0];
        let cell_size_y = -scale[1];
        let origin_x = tie[3] - tie[0] * cell_size_x;
        let origin_y = tie[4] - tie[1] * cell_size_y;
        return Ok(Affine::from_origin_and_cell_size(origin_x, origin_y, cell_size_x, cell_size_y));
    }

    Err(CogError::InvalidTiff { reason: "no ModelTransformation or ModelPixelScale/ModelTiepoint tags present".into() })
}

fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut tiff::decoder::Decoder<R>) -> Result<Option<Crs>> {
    let raw = match decoder.get_tag(Tag::GeoKeyDirectoryTag) {
        Ok(Value::List(values)) => values,
        Ok(Value::Short(_)) | Err(_) => return Ok(None),
        Ok(_) => return Ok(None),
    };

    let mut key_dir = Vec::with_capacity(raw.len());
    for v in raw {
        match v {
            Value::Short(s) => key_dir.push(s),
            _ => return Err(CogError::InvalidTiff { reason: "GeoKeyDirectoryTag contains non-SHORT values".into() }),
        }
    }

    if key_dir.len() < 4 {
        return Ok(None);
    }

    // Out-of-line GeoDouble-valued keys (projection parameters, user-defined ellipsoid axes)
    // index into this array rather than carrying their value inline.
    let doubles = decoder.get_tag_f64_vec(Tag::GeoDoubleParamsTag).unwrap_or_default();

    let dir = GeoKeyDirectory::new(&key_dir, &doubles);
    raster_affine::crs::parse_geo_keys(&dir).map(Some).map_err(CogError::UnsupportedCrs)
}
