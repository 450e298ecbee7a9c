//! One resolution level of a `GeoTiff`: a data IFD, an optional mask IFD, and the machinery to
//! fetch and decode a single tile from either.

use std::sync::Arc;

use raster_affine::Affine;
use tokio_util::sync::CancellationToken;

use crate::bytesource::{check_cancelled, ByteSource};
use crate::codec::{self, CodecRegistry};
use crate::error::{CogError, Result};
use crate::ifd::CachedTags;
use crate::raster_array::{Layout, RasterArray, Window};

/// Options threaded through every tile fetch.
#[derive(Clone)]
pub struct FetchOptions {
    pub cancellation: Option<CancellationToken>,
    /// When true, a request that runs past the overview's bounds (a tile outside the tile
    /// grid, or a window that overhangs the image edge) is padded with nodata instead of
    /// erroring, and an edge tile's full `tile_width`/`tile_height` extent is returned as-is.
    /// When false, edge tiles and windows are clipped to the raster's valid pixel region.
    pub boundless: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        FetchOptions { cancellation: None, boundless: true }
    }
}

pub struct Overview {
    pub data_tags: CachedTags,
    pub mask_tags: Option<CachedTags>,
    pub affine: Affine,
    source: Arc<dyn ByteSource>,
    registry: Arc<CodecRegistry>,
    decoder_pool: Option<Arc<tokio::sync::Semaphore>>,
}

impl Overview {
    pub fn new(
        data_tags: CachedTags,
        mask_tags: Option<CachedTags>,
        affine: Affine,
        source: Arc<dyn ByteSource>,
        registry: Arc<CodecRegistry>,
        decoder_pool: Option<Arc<tokio::sync::Semaphore>>,
    ) -> Self {
        Overview { data_tags, mask_tags, affine, source, registry, decoder_pool }
    }

    pub fn width(&self) -> u32 {
        self.data_tags.image_width
    }

    pub fn height(&self) -> u32 {
        self.data_tags.image_height
    }

    pub fn tile_width(&self) -> u32 {
        self.data_tags.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.data_tags.tile_height
    }

    pub fn tiles_wide(&self) -> u32 {
        self.data_tags.tiles_wide()
    }

    pub fn tiles_high(&self) -> u32 {
        self.data_tags.tiles_high()
    }

    /// Fetches and decodes tile `(tile_x, tile_y)`, along with its mask if one is paired.
    pub async fn fetch_tile(&self, tile_x: u32, tile_y: u32, options: &FetchOptions) -> Result<RasterArray> {
        check_cancelled(options.cancellation.as_ref())?;

        let out_of_bounds = tile_x >= self.tiles_wide() || tile_y >= self.tiles_high();
        if out_of_bounds {
            if options.boundless {
                return self.nodata_tile();
            }
            return Err(CogError::InvalidTiff {
                reason: format!("tile ({tile_x}, {tile_y}) is outside the {}x{} tile grid", self.tiles_wide(), self.tiles_high()),
            });
        }

        let index = (tile_y * self.tiles_wide() + tile_x) as usize;

        let (data, mask_bytes) = self.fetch_data_and_mask(index, options).await?;

        let tile_affine = self.affine.compose(&Affine::new([
            1.0,
            0.0,
            (tile_x * self.tile_width()) as f64,
            0.0,
            1.0,
            (tile_y * self.tile_height()) as f64,
        ]));

        let valid_width = self.valid_tile_width(tile_x);
        let valid_height = self.valid_tile_height(tile_y);
        let needs_clip = !options.boundless && (valid_width < self.tile_width() || valid_height < self.tile_height());

        let samples_per_pixel = self.data_tags.samples_per_pixel as usize;
        let bytes_per_sample = self.data_tags.data_type.bytes_per_sample();
        let pixel_stride = samples_per_pixel * bytes_per_sample;

        let (width, height, data, mask) = if needs_clip {
            let clipped_data = clip_pixel_interleaved(&data, self.tile_width() as usize, valid_width as usize, valid_height as usize, pixel_stride);
            let clipped_mask = mask_bytes.map(|m| clip_rows(&m, self.tile_width() as usize, valid_width as usize, valid_height as usize, 1));
            (valid_width, valid_height, clipped_data, clipped_mask.map(|m| m.into_iter().map(|b| b != 0).collect()))
        } else {
            (self.tile_width(), self.tile_height(), data, mask_bytes.map(|m| m.into_iter().map(|b| b != 0).collect()))
        };

        RasterArray::new(
            Layout::PixelInterleaved,
            self.data_tags.data_type,
            width as usize,
            height as usize,
            samples_per_pixel,
            tile_affine,
            self.data_tags.nodata,
            mask,
            data,
        )
    }

    /// Fetches and decodes tile `index`'s data and, if a mask IFD is paired, its mask, issuing
    /// both fetches concurrently and joining them.
    async fn fetch_data_and_mask(&self, index: usize, options: &FetchOptions) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
        let data_fut = self.fetch_and_decode(&self.data_tags, index, options);
        let mask_fut = async {
            match &self.mask_tags {
                Some(mask_tags) => self.fetch_and_decode(mask_tags, index, options).await.map(Some),
                None => Ok(None),
            }
        };
        let (data_result, mask_result) = tokio::join!(data_fut, mask_fut);
        let (data, _sparse) = data_result?;
        let mask = match mask_result? {
            Some((bytes, _sparse)) => Some(bytes),
            None => None,
        };
        Ok((data, mask))
    }

    fn valid_tile_width(&self, tile_x: u32) -> u32 {
        self.width().saturating_sub(tile_x * self.tile_width()).min(self.tile_width())
    }

    fn valid_tile_height(&self, tile_y: u32) -> u32 {
        self.height().saturating_sub(tile_y * self.tile_height()).min(self.tile_height())
    }

    /// Reads an arbitrary pixel-space window, stitching together every tile it overlaps. Within
    /// each tile, the data and mask fetches are issued concurrently and joined before the next
    /// tile is requested.
    pub async fn read(&self, window: Window, options: &FetchOptions) -> Result<RasterArray> {
        check_cancelled(options.cancellation.as_ref())?;

        if window.width == 0 || window.height == 0 {
            return Err(CogError::WindowOutOfBounds {
                col_off: window.col_off,
                row_off: window.row_off,
                width: window.width,
                height: window.height,
            });
        }

        let col_end = window.col_off as u64 + window.width as u64;
        let row_end = window.row_off as u64 + window.height as u64;
        if !options.boundless && (col_end > self.width() as u64 || row_end > self.height() as u64) {
            return Err(CogError::WindowOutOfBounds {
                col_off: window.col_off,
                row_off: window.row_off,
                width: window.width,
                height: window.height,
            });
        }

        let samples_per_pixel = self.data_tags.samples_per_pixel as usize;
        let bytes_per_sample = self.data_tags.data_type.bytes_per_sample();
        let pixel_stride = samples_per_pixel * bytes_per_sample;
        let window_width = window.width as usize;
        let window_height = window.height as usize;

        let mut out_data = vec![0u8; window_width * window_height * pixel_stride];
        let mut out_mask = self.mask_tags.as_ref().map(|_| vec![false; window_width * window_height]);

        let tile_w = self.tile_width();
        let tile_h = self.tile_height();
        let last_col = window.col_off + window.width - 1;
        let last_row = window.row_off + window.height - 1;
        let first_tile_x = window.col_off / tile_w;
        let first_tile_y = window.row_off / tile_h;
        let last_tile_x = (last_col / tile_w).min(self.tiles_wide().saturating_sub(1));
        let last_tile_y = (last_row / tile_h).min(self.tiles_high().saturating_sub(1));

        for tile_y in first_tile_y..=last_tile_y.max(first_tile_y) {
            if tile_y >= self.tiles_high() {
                continue;
            }
            for tile_x in first_tile_x..=last_tile_x.max(first_tile_x) {
                if tile_x >= self.tiles_wide() {
                    continue;
                }

                let index = (tile_y * self.tiles_wide() + tile_x) as usize;
                let (tile_data, tile_mask) = self.fetch_data_and_mask(index, options).await?;

                let tile_origin_col = tile_x * tile_w;
                let tile_origin_row = tile_y * tile_h;
                let overlap_col_start = window.col_off.max(tile_origin_col);
                let overlap_col_end = (window.col_off + window.width).min(tile_origin_col + tile_w);
                let overlap_row_start = window.row_off.max(tile_origin_row);
                let overlap_row_end = (window.row_off + window.height).min(tile_origin_row + tile_h);
                if overlap_col_end <= overlap_col_start || overlap_row_end <= overlap_row_start {
                    continue;
                }
                let copy_cols = (overlap_col_end - overlap_col_start) as usize;

                for row in overlap_row_start..overlap_row_end {
                    let src_row = (row - tile_origin_row) as usize;
                    let src_col = (overlap_col_start - tile_origin_col) as usize;
                    let dst_row = (row - window.row_off) as usize;
                    let dst_col = (overlap_col_start - window.col_off) as usize;

                    let src_offset = (src_row * tile_w as usize + src_col) * pixel_stride;
                    let dst_offset = (dst_row * window_width + dst_col) * pixel_stride;
                    out_data[dst_offset..dst_offset + copy_cols * pixel_stride]
                        .copy_from_slice(&tile_data[src_offset..src_offset + copy_cols * pixel_stride]);

                    if let (Some(mask_bytes), Some(out_mask)) = (&tile_mask, &mut out_mask) {
                        for col in 0..copy_cols {
                            out_mask[dst_row * window_width + dst_col + col] = mask_bytes[src_row * tile_w as usize + src_col + col] != 0;
                        }
                    }
                }
            }
        }

        let window_affine = self.affine.compose(&Affine::new([1.0, 0.0, window.col_off as f64, 0.0, 1.0, window.row_off as f64]));

        RasterArray::new(
            Layout::PixelInterleaved,
            self.data_tags.data_type,
            window_width,
            window_height,
            samples_per_pixel,
            window_affine,
            self.data_tags.nodata,
            out_mask,
            out_data,
        )
    }

    async fn fetch_and_decode(&self, tags: &CachedTags, index: usize, options: &FetchOptions) -> Result<(Vec<u8>, bool)> {
        check_cancelled(options.cancellation.as_ref())?;

        let tiles_wide = tags.tiles_wide().max(1);
        let tile_x = (index as u32) % tiles_wide;
        let tile_y = (index as u32) / tiles_wide;
        let offset = *tags.tile_offsets.get(index).ok_or(CogError::TileNotFound { tile_x, tile_y })?;
        let size = *tags.tile_byte_counts.get(index).ok_or(CogError::TileNotFound { tile_x, tile_y })?;

        let expected_len =
            tags.tile_width as usize * tags.tile_height as usize * tags.samples_per_pixel as usize * tags.data_type.bytes_per_sample();

        if size == 0 {
            // Sparse tile: GDAL and friends write a zero-length tile to mean "all nodata".
            return Ok((vec![0u8; expected_len], true));
        }

        let compressed = self.source.fetch(offset, size).await?;
        let registry = self.registry.clone();
        let predictor = tags.predictor;
        let tile_width = tags.tile_width as usize;
        let samples_per_pixel = tags.samples_per_pixel as usize;
        let bytes_per_sample = tags.data_type.bytes_per_sample();
        let is_float = tags.data_type.is_float();
        let compression = tags.compression;
        let jpeg_tables = tags.jpeg_tables.clone();

        // Decoding and un-predicting are CPU-bound; run them on the blocking pool, bounded by
        // `decoder_pool` if the caller supplied one, so a burst of tile requests doesn't starve
        // the async runtime's worker threads.
        let decode = move || -> Result<Vec<u8>> {
            let decoder = registry.decoder_for(compression)?;
            let mut decoded = decoder.decode(&compressed, expected_len, jpeg_tables.as_deref())?;
            codec::unpredict(predictor, &mut decoded, tile_width, samples_per_pixel, bytes_per_sample, is_float)?;
            Ok(decoded)
        };

        let decoded = match &self.decoder_pool {
            Some(pool) => {
                let permit = pool.clone().acquire_owned().await.map_err(|_| CogError::Aborted)?;
                tokio::task::spawn_blocking(move || {
                    let result = decode();
                    drop(permit);
                    result
                })
                .await
                .map_err(|e| CogError::InvalidTiff { reason: format!("decode task panicked: {e}") })??
            }
            None => tokio::task::spawn_blocking(decode)
                .await
                .map_err(|e| CogError::InvalidTiff { reason: format!("decode task panicked: {e}") })??,
        };

        Ok((decoded, false))
    }

    fn nodata_tile(&self) -> Result<RasterArray> {
        let len = self.tile_width() as usize
            * self.tile_height() as usize
            * self.data_tags.samples_per_pixel as usize
            * self.data_tags.data_type.bytes_per_sample();
        RasterArray::new(
            Layout::PixelInterleaved,
            self.data_tags.data_type,
            self.tile_width() as usize,
            self.tile_height() as usize,
            self.data_tags.samples_per_pixel as usize,
            self.affine,
            self.data_tags.nodata,
            Some(vec![false; self.tile_width() as usize * self.tile_height() as usize]),
            vec![0u8; len],
        )
    }
}

/// Copies the top-left `valid_width x valid_height` sub-rectangle out of a
/// `full_width`-wide pixel-interleaved buffer, dropping the rest of each row.
fn clip_pixel_interleaved(data: &[u8], full_width: usize, valid_width: usize, valid_height: usize, pixel_stride: usize) -> Vec<u8> {
    clip_rows(data, full_width, valid_width, valid_height, pixel_stride)
}

/// Generic row-major clip: keeps the first `valid_width` `element_stride`-sized elements of
/// each of the first `valid_height` rows out of a `full_width`-wide buffer.
fn clip_rows<T: Copy>(data: &[T], full_width: usize, valid_width: usize, valid_height: usize, element_stride: usize) -> Vec<T> {
    let row_stride = full_width * element_stride;
    let mut out = Vec::with_capacity(valid_width * valid_height * element_stride);
    for row in 0..valid_height {
        let start = row * row_stride;
        out.extend_from_slice(&data[start..start + valid_width * element_stride]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fetch_options_are_boundless() {
        assert!(FetchOptions::default().boundless);
    }

    #[test]
    fn clip_keeps_only_the_valid_sub_rectangle() {
        // A 128x128 single-byte tile where only the top-left 9x10 pixels are valid, matching
        // the last column/row tile of a 265x266 image cut into 128-pixel tiles.
        let full_width = 128usize;
        let valid_width = 9usize;
        let valid_height = 10usize;
        let mut data = vec![0u8; full_width * full_width];
        for row in 0..full_width {
            for col in 0..full_width {
                data[row * full_width + col] = (row * full_width + col) as u8;
            }
        }
        let clipped = clip_pixel_interleaved(&data, full_width, valid_width, valid_height, 1);
        assert_eq!(clipped.len(), valid_width * valid_height);
        for row in 0..valid_height {
            for col in 0..valid_width {
                assert_eq!(clipped[row * valid_width + col], data[row * full_width + col]);
            }
        }
    }
}
