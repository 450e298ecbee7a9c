//! Decoded tile payload, in either band-separate or pixel-interleaved layout.
//!
//! Uses the same tagged-variant approach as `AnyDenseArray` (`crates/geo/src/anydensearray.rs`),
//! but dispatches on the two byte layouts a decoded tile can have rather than on per-element
//! numeric type.

use raster_affine::Affine;

use crate::error::{CogError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayDataType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl ArrayDataType {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            ArrayDataType::Int8 | ArrayDataType::Uint8 => 1,
            ArrayDataType::Int16 | ArrayDataType::Uint16 => 2,
            ArrayDataType::Int32 | ArrayDataType::Uint32 | ArrayDataType::Float32 => 4,
            ArrayDataType::Float64 => 8,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ArrayDataType::Float32 | ArrayDataType::Float64)
    }
}

/// A pixel-space sub-rectangle of a raster, as consumed by `Overview::read`/`GeoTiff::read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col_off: u32,
    pub row_off: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// All of band 0, then all of band 1, ... (`BSQ`-like).
    BandSeparate,
    /// Pixel 0's bands, then pixel 1's bands, ... (`BIP`-like).
    PixelInterleaved,
}

/// A decoded tile (or window), with its own affine and an optional per-pixel validity mask.
#[derive(Debug, Clone)]
pub struct RasterArray {
    pub layout: Layout,
    pub data_type: ArrayDataType,
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub affine: Affine,
    pub nodata: Option<f64>,
    pub mask: Option<Vec<bool>>,
    data: Vec<u8>,
}

impl RasterArray {
    pub fn new(
        layout: Layout,
        data_type: ArrayDataType,
        width: usize,
        height: usize,
        band_count: usize,
        affine: Affine,
        nodata: Option<f64>,
        mask: Option<Vec<bool>>,
        data: Vec<u8>,
    ) -> Result<Self> {
        let expected_len = width * height * band_count * data_type.bytes_per_sample();
        if data.len() != expected_len {
            return Err(CogError::InvalidTiff {
                reason: format!("raster array data length {} does not match expected {expected_len}", data.len()),
            });
        }
        if let Some(mask) = &mask {
            if mask.len() != width * height {
                return Err(CogError::InvalidTiff {
                    reason: format!("mask length {} does not match width*height {}", mask.len(), width * height),
                });
            }
        }
        Ok(RasterArray { layout, data_type, width, height, band_count, affine, nodata, mask, data })
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the raw byte range for `band` in the current layout.
    pub fn band(&self, band: usize) -> Result<&[u8]> {
        if band >= self.band_count {
            return Err(CogError::BandIndexOutOfRange { index: band, band_count: self.band_count });
        }
        let bps = self.data_type.bytes_per_sample();
        match self.layout {
            Layout::BandSeparate => {
                let band_len = self.width * self.height * bps;
                Ok(&self.data[band * band_len..(band + 1) * band_len])
            }
            Layout::PixelInterleaved => {
                // Not a contiguous slice in this layout; callers that need contiguous
                // per-band data should call `to_band_separate` first.
                Err(CogError::InvalidTiff {
                    reason: "band() requires BandSeparate layout; call to_band_separate() first".into(),
                })
            }
        }
    }

    /// Returns a copy of this array converted to `BandSeparate` layout.
    pub fn to_band_separate(&self) -> RasterArray {
        if self.layout == Layout::BandSeparate {
            return self.clone();
        }
        let bps = self.data_type.bytes_per_sample();
        let pixel_count = self.width * self.height;
        let mut out = vec![0u8; self.data.len()];
        for pixel in 0..pixel_count {
            for band in 0..self.band_count {
                let src = (pixel * self.band_count + band) * bps;
                let dst = (band * pixel_count + pixel) * bps;
                out[dst..dst + bps].copy_from_slice(&self.data[src..src + bps]);
            }
        }
        RasterArray {
            layout: Layout::BandSeparate,
            data: out,
            ..self.clone()
        }
    }

    /// Returns a copy of this array converted to `PixelInterleaved` layout.
    pub fn to_pixel_interleaved(&self) -> RasterArray {
        if self.layout == Layout::PixelInterleaved {
            return self.clone();
        }
        let bps = self.data_type.bytes_per_sample();
        let pixel_count = self.width * self.height;
        let mut out = vec![0u8; self.data.len()];
        for band in 0..self.band_count {
            for pixel in 0..pixel_count {
                let src = (band * pixel_count + pixel) * bps;
                let dst = (pixel * self.band_count + band) * bps;
                out[dst..dst + bps].copy_from_slice(&self.data[src..src + bps]);
            }
        }
        RasterArray {
            layout: Layout::PixelInterleaved,
            data: out,
            ..self.clone()
        }
    }

    /// Returns a new array restricted to `bands` (a half-open index range), preserving layout.
    pub fn select_bands(&self, bands: std::ops::Range<usize>) -> Result<RasterArray> {
        if bands.is_empty() {
            return Err(CogError::EmptyBandRange);
        }
        if bands.end > self.band_count {
            return Err(CogError::BandIndexOutOfRange { index: bands.end - 1, band_count: self.band_count });
        }
        let band_separate = self.to_band_separate();
        let bps = self.data_type.bytes_per_sample();
        let band_len = self.width * self.height * bps;
        let data = band_separate.data[bands.start * band_len..bands.end * band_len].to_vec();
        RasterArray::new(
            Layout::BandSeparate,
            self.data_type,
            self.width,
            self.height,
            bands.len(),
            self.affine,
            self.nodata,
            self.mask.clone(),
            data,
        )
    }

    /// Returns a new array with its bands permuted (and optionally subset) according to `order`,
    /// e.g. `[2, 1, 0]` to flip a BGR-ordered raster to RGB.
    pub fn reorder_bands(&self, order: &[usize]) -> Result<RasterArray> {
        if order.is_empty() {
            return Err(CogError::EmptyBandOrder);
        }
        for &index in order {
            if index >= self.band_count {
                return Err(CogError::BandIndexOutOfRange { index, band_count: self.band_count });
            }
        }
        let band_separate = self.to_band_separate();
        let bps = self.data_type.bytes_per_sample();
        let band_len = self.width * self.height * bps;
        let mut data = Vec::with_capacity(band_len * order.len());
        for &index in order {
            data.extend_from_slice(&band_separate.data[index * band_len..(index + 1) * band_len]);
        }
        RasterArray::new(
            Layout::BandSeparate,
            self.data_type,
            self.width,
            self.height,
            order.len(),
            self.affine,
            self.nodata,
            self.mask.clone(),
            data,
        )
    }

    /// Reorders `order` (at most 4 source bands) into an RGBA-shaped, band-separate array,
    /// padding any of the 4 output slots `order` doesn't cover with `fill_value` and ignoring
    /// any source bands beyond the 4th. Meant for handing a raster straight to a GPU texture
    /// upload that expects exactly 4 channels.
    pub fn pack_bands_to_rgba(&self, order: &[usize], fill_value: f64) -> Result<RasterArray> {
        if order.is_empty() {
            return Err(CogError::EmptyBandOrder);
        }
        for &index in order.iter().take(4) {
            if index >= self.band_count {
                return Err(CogError::BandIndexOutOfRange { index, band_count: self.band_count });
            }
        }
        let band_separate = self.to_band_separate();
        let bps = self.data_type.bytes_per_sample();
        let pixel_count = self.width * self.height;
        let band_len = pixel_count * bps;
        let fill_bytes = encode_fill_value(self.data_type, fill_value);

        let mut data = vec![0u8; band_len * 4];
        for slot in 0..4 {
            let dst_start = slot * band_len;
            match order.get(slot) {
                Some(&source_band) => {
                    data[dst_start..dst_start + band_len].copy_from_slice(&band_separate.data[source_band * band_len..(source_band + 1) * band_len]);
                }
                None => {
                    for pixel in 0..pixel_count {
                        let offset = dst_start + pixel * bps;
                        data[offset..offset + bps].copy_from_slice(&fill_bytes);
                    }
                }
            }
        }

        RasterArray::new(
            Layout::BandSeparate,
            self.data_type,
            self.width,
            self.height,
            4,
            self.affine,
            self.nodata,
            self.mask.clone(),
            data,
        )
    }
}

fn encode_fill_value(data_type: ArrayDataType, value: f64) -> Vec<u8> {
    match data_type {
        ArrayDataType::Int8 => vec![(value as i8) as u8],
        ArrayDataType::Uint8 => vec![value as u8],
        ArrayDataType::Int16 => (value as i16).to_ne_bytes().to_vec(),
        ArrayDataType::Uint16 => (value as u16).to_ne_bytes().to_vec(),
        ArrayDataType::Int32 => (value as i32).to_ne_bytes().to_vec(),
        ArrayDataType::Uint32 => (value as u32).to_ne_bytes().to_vec(),
        ArrayDataType::Float32 => (value as f32).to_ne_bytes().to_vec(),
        ArrayDataType::Float64 => value.to_ne_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_array() -> RasterArray {
        // 2x1 pixels, 2 bands, u8, band-separate: band0=[1,2], band1=[10,20]
        RasterArray::new(
            Layout::BandSeparate,
            ArrayDataType::Uint8,
            2,
            1,
            2,
            Affine::from_origin_and_cell_size(0.0, 0.0, 1.0, -1.0),
            None,
            None,
            vec![1, 2, 10, 20],
        )
        .unwrap()
    }

    #[test]
    fn band_separate_to_pixel_interleaved_round_trips() {
        let bsq = sample_array();
        let bip = bsq.to_pixel_interleaved();
        assert_eq!(bip.raw_bytes(), &[1, 10, 2, 20]);
        let back = bip.to_band_separate();
        assert_eq!(back.raw_bytes(), bsq.raw_bytes());
    }

    #[test]
    fn select_bands_rejects_empty_range() {
        let arr = sample_array();
        assert!(arr.select_bands(1..1).is_err());
    }

    #[test]
    fn band_index_out_of_range_is_reported() {
        let arr = sample_array();
        let err = arr.band(5).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BandIndexOutOfRange);
    }

    #[test]
    fn reorder_identity_is_a_no_op() {
        let arr = sample_array();
        let reordered = arr.reorder_bands(&[0, 1]).unwrap();
        assert_eq!(reordered.raw_bytes(), arr.raw_bytes());
    }

    #[test]
    fn reorder_bands_flips_order() {
        let arr = sample_array();
        let reordered = arr.reorder_bands(&[1, 0]).unwrap();
        assert_eq!(reordered.raw_bytes(), &[10, 20, 1, 2]);
    }

    #[test]
    fn reorder_bands_rejects_empty_order() {
        let arr = sample_array();
        let err = arr.reorder_bands(&[]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EmptyBandOrder);
    }

    #[test]
    fn pack_bands_to_rgba_fills_missing_channels() {
        let arr = sample_array();
        let rgba = arr.pack_bands_to_rgba(&[1, 0], 255.0).unwrap();
        assert_eq!(rgba.band_count, 4);
        // band0=[10,20] (source band 1), band1=[1,2] (source band 0), band2/3 filled with 255.
        assert_eq!(rgba.raw_bytes(), &[10, 20, 1, 2, 255, 255, 255, 255]);
    }
}
