//! IFD walking and the per-IFD tag cache.
//!
//! Follows `cog/reader.rs::parse_cog_header` (tag pre-fetch, IFD-to-overview bookkeeping) and
//! `cog/decoder.rs::read_projection_info` (GeoKeyDirectory access) in the reference COG reader
//! this workspace builds on, extended with mask-IFD pairing and heterogeneous-tag rejection for
//! multi-band rasters.

use std::io::{Cursor, Read, Seek};

use tiff::decoder::{ifd::Value, Decoder};
use tiff::tags::Tag;

use crate::codec::Predictor;
use crate::error::{CogError, Result};
use crate::raster_array::ArrayDataType;

/// TIFF `SubFileType` (tag 254) bit flag for "this is a reduced-resolution image" — not used
/// directly here but documented since `NewSubFileType` drives overview detection in some
/// writers; this reader instead uses one-IFD-per-overview-level ordering (see `geotiff.rs`).
pub const SUBFILETYPE_MASK_BIT: u32 = 0x4;
/// TIFF `PhotometricInterpretation` value used by mask IFDs (transparency mask).
pub const PHOTOMETRIC_MASK: u16 = 4;

/// The tag values this reader needs for every IFD, pre-fetched once at IFD-open time so that
/// later tile decode calls don't re-issue tag reads.
#[derive(Debug, Clone)]
pub struct CachedTags {
    pub image_width: u32,
    pub image_height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub compression: u16,
    pub predictor: Predictor,
    pub samples_per_pixel: u16,
    pub data_type: ArrayDataType,
    pub photometric: Option<u16>,
    pub subfile_type: Option<u32>,
    pub nodata: Option<f64>,
    pub tile_offsets: Vec<u64>,
    pub tile_byte_counts: Vec<u64>,
    /// Shared quantization/Huffman tables for new-style JPEG compression (tag 347). `None` for
    /// every other compression, and for old-style JPEG streams that embed their own tables.
    pub jpeg_tables: Option<Vec<u8>>,
}

impl CachedTags {
    pub fn is_mask(&self) -> bool {
        self.photometric == Some(PHOTOMETRIC_MASK) && self.subfile_type.map(|v| v & SUBFILETYPE_MASK_BIT != 0).unwrap_or(false)
    }

    pub fn tiles_wide(&self) -> u32 {
        self.image_width.div_ceil(self.tile_width)
    }

    pub fn tiles_high(&self) -> u32 {
        self.image_height.div_ceil(self.tile_height)
    }
}

fn sample_format_to_data_type(format: u16, bits: u16) -> Result<ArrayDataType> {
    Ok(match (format, bits) {
        (1, 8) => ArrayDataType::Uint8,
        (1, 16) => ArrayDataType::Uint16,
        (1, 32) => ArrayDataType::Uint32,
        (2, 8) => ArrayDataType::Int8,
        (2, 16) => ArrayDataType::Int16,
        (2, 32) => ArrayDataType::Int32,
        (3, 32) => ArrayDataType::Float32,
        (3, 64) => ArrayDataType::Float64,
        _ => {
            return Err(CogError::InvalidTiff { reason: format!("unsupported sample format {format} / bits {bits}") });
        }
    })
}

/// Extracts raw bytes from a BYTE/UNDEFINED tag value (`JPEGTables` is tagged UNDEFINED).
fn value_to_bytes(value: Value) -> Option<Vec<u8>> {
    match value {
        Value::Byte(b) => Some(vec![b]),
        Value::List(values) => values
            .into_iter()
            .map(|v| match v {
                Value::Byte(b) => Some(b),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

fn uniform_u16_list(value: Value, kind: &'static str) -> Result<u16> {
    match value {
        Value::Short(v) => Ok(v),
        Value::List(values) => {
            let mut iter = values.into_iter();
            let first = match iter.next() {
                Some(Value::Short(v)) => v,
                _ => return Err(CogError::InvalidTiff { reason: format!("{kind} tag has no values") }),
            };
            for v in iter {
                let v = match v {
                    Value::Short(v) => v,
                    _ => return Err(CogError::InvalidTiff { reason: format!("{kind} tag has mixed value types") }),
                };
                if v != first {
                    return Err(match kind {
                        "SampleFormat" => CogError::HeterogeneousSampleFormat,
                        "BitsPerSample" => CogError::HeterogeneousBitsPerSample,
                        _ => CogError::InvalidTiff { reason: format!("heterogeneous {kind} values") },
                    });
                }
            }
            Ok(first)
        }
        _ => Err(CogError::InvalidTiff { reason: format!("unexpected value type for {kind}") }),
    }
}

/// Reads and caches the tags required to decode tiles from the decoder's *current* IFD.
pub fn read_cached_tags<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<CachedTags> {
    let image_width = decoder.get_tag_u32(Tag::ImageWidth)?;
    let image_height = decoder.get_tag_u32(Tag::ImageLength)?;

    if decoder.tile_count()? == 0 {
        return Err(CogError::InvalidTiff { reason: "only tiled TIFFs are supported".into() });
    }
    let tile_width = decoder.get_tag_u32(Tag::TileWidth)?;
    let tile_height = decoder.get_tag_u32(Tag::TileLength)?;

    let bits_per_sample = uniform_u16_list(decoder.get_tag(Tag::BitsPerSample)?, "BitsPerSample")?;
    let sample_format = decoder
        .get_tag(Tag::SampleFormat)
        .map(|v| uniform_u16_list(v, "SampleFormat"))
        .unwrap_or(Ok(1))?;
    let data_type = sample_format_to_data_type(sample_format, bits_per_sample)?;

    let samples_per_pixel = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1) as u16;
    let compression = decoder.get_tag_u32(Tag::Compression)? as u16;
    let predictor = decoder.get_tag_u32(Tag::Predictor).map(|v| Predictor::from_tag_value(v as u16)).unwrap_or(Predictor::None);
    let photometric = decoder.get_tag_u32(Tag::PhotometricInterpretation).ok().map(|v| v as u16);
    let subfile_type = decoder.get_tag_u32(Tag::NewSubfileType).ok();
    let nodata = decoder
        .get_tag_ascii_string(Tag::GdalNodata)
        .ok()
        .and_then(|s| s.trim().parse::<f64>().ok());

    let tile_offsets = decoder.get_tag_u64_vec(Tag::TileOffsets)?;
    let tile_byte_counts = decoder.get_tag_u64_vec(Tag::TileByteCounts)?;
    let jpeg_tables = decoder.get_tag(Tag::JPEGTables).ok().and_then(value_to_bytes);

    Ok(CachedTags {
        image_width,
        image_height,
        tile_width,
        tile_height,
        compression,
        predictor,
        samples_per_pixel,
        data_type,
        photometric,
        subfile_type,
        nodata,
        tile_offsets,
        tile_byte_counts,
        jpeg_tables,
    })
}

/// Opens a `tiff::decoder::Decoder` over an in-memory buffer. IFD metadata is small relative to
/// pixel data, so this crate fetches the header + IFD-chain region eagerly into memory (see
/// `geotiff.rs::fetch_header_region`) and only fetches tile pixel bytes lazily per request.
pub fn open_decoder(buffer: Vec<u8>) -> Result<Decoder<Cursor<Vec<u8>>>> {
    Decoder::new(Cursor::new(buffer))
        .map(|d| d.with_limits(tiff::decoder::Limits::unlimited()))
        .map_err(CogError::Tiff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_detection_requires_both_flags() {
        let mut tags = blank_tags();
        tags.photometric = Some(PHOTOMETRIC_MASK);
        tags.subfile_type = Some(SUBFILETYPE_MASK_BIT);
        assert!(tags.is_mask());

        tags.subfile_type = Some(0);
        assert!(!tags.is_mask());
    }

    fn blank_tags() -> CachedTags {
        CachedTags {
            image_width: 256,
            image_height: 256,
            tile_width: 256,
            tile_height: 256,
            compression: 1,
            predictor: Predictor::None,
            samples_per_pixel: 1,
            data_type: ArrayDataType::Uint8,
            photometric: None,
            subfile_type: None,
            nodata: None,
            tile_offsets: vec![],
            tile_byte_counts: vec![],
            jpeg_tables: None,
        }
    }

    #[test]
    fn tiles_wide_rounds_up() {
        let mut tags = blank_tags();
        tags.image_width = 300;
        tags.tile_width = 256;
        assert_eq!(tags.tiles_wide(), 2);
    }
}
