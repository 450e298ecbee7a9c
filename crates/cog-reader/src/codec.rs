//! Tile codec registry keyed by TIFF Compression code, and the post-decode TIFF Predictor step.
//!
//! Predictor math mirrors `cog/utils.rs` (`HorizontalUnpredictable`, `unpredict_fp32`/
//! `unpredict_fp64`) in the reference COG reader this workspace builds on; the registry shape
//! (a map from compression code to a factory returning a boxed decoder) keeps codecs pluggable
//! without touching this crate for each new one.

use std::collections::HashMap;
use std::io::Read;

use crate::error::{CogError, Result};

/// TIFF `Compression` tag values this registry recognises out of the box.
pub mod compression {
    pub const NONE: u16 = 1;
    pub const LZW: u16 = 5;
    pub const DEFLATE_OLD: u16 = 32946;
    pub const DEFLATE: u16 = 8;
    pub const JPEG: u16 = 7;
    pub const LERC: u16 = 34887;
    pub const WEBP: u16 = 50001;
    pub const ZSTD: u16 = 50000;
}

/// TIFF `Predictor` tag values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predictor {
    None,
    Horizontal,
    FloatingPoint,
}

impl Predictor {
    pub fn from_tag_value(value: u16) -> Self {
        match value {
            2 => Predictor::Horizontal,
            3 => Predictor::FloatingPoint,
            _ => Predictor::None,
        }
    }
}

/// A decoder for one compression scheme: turns the raw compressed tile bytes into a decoded
/// byte buffer of `samples_per_pixel * bits_per_sample/8 * width * height` bytes. The predictor
/// step runs separately, after decoding. `jpeg_tables` carries the IFD's shared JPEGTables blob
/// (tag 347) when the codec needs side data beyond the tile's own bytes; every other decoder
/// ignores it.
pub trait TileDecoder: Send + Sync {
    fn decode(&self, compressed: &[u8], expected_len: usize, jpeg_tables: Option<&[u8]>) -> Result<Vec<u8>>;
}

struct IdentityDecoder;
impl TileDecoder for IdentityDecoder {
    fn decode(&self, compressed: &[u8], expected_len: usize, _jpeg_tables: Option<&[u8]>) -> Result<Vec<u8>> {
        if compressed.len() < expected_len {
            return Err(CogError::InvalidTiff {
                reason: format!("uncompressed tile has {} bytes, expected {}", compressed.len(), expected_len),
            });
        }
        Ok(compressed[..expected_len].to_vec())
    }
}

struct LzwDecoder;
impl TileDecoder for LzwDecoder {
    fn decode(&self, compressed: &[u8], expected_len: usize, _jpeg_tables: Option<&[u8]>) -> Result<Vec<u8>> {
        let mut decoder = weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
        let mut out = Vec::with_capacity(expected_len);
        decoder
            .into_stream(&mut out)
            .decode_all(compressed)
            .status
            .map_err(|e| CogError::InvalidTiff { reason: format!("LZW decode failed: {e}") })?;
        Ok(out)
    }
}

struct DeflateDecoder;
impl TileDecoder for DeflateDecoder {
    fn decode(&self, compressed: &[u8], expected_len: usize, _jpeg_tables: Option<&[u8]>) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(expected_len);
        flate2::read::ZlibDecoder::new(compressed)
            .read_to_end(&mut out)
            .map_err(CogError::Io)?;
        Ok(out)
    }
}

struct LercDecoder;
impl TileDecoder for LercDecoder {
    fn decode(&self, compressed: &[u8], _expected_len: usize, _jpeg_tables: Option<&[u8]>) -> Result<Vec<u8>> {
        let decoded = lerc_codec::decode(compressed)
            .map_err(|e| CogError::InvalidTiff { reason: format!("LERC decode failed: {e}") })?;
        Ok(lerc_pixels_to_bytes(&decoded.data))
    }
}

struct JpegDecoder;
impl TileDecoder for JpegDecoder {
    fn decode(&self, compressed: &[u8], _expected_len: usize, jpeg_tables: Option<&[u8]>) -> Result<Vec<u8>> {
        let merged;
        let stream = match jpeg_tables {
            Some(tables) => {
                merged = merge_jpeg_tables(tables, compressed);
                merged.as_slice()
            }
            None => compressed,
        };

        let mut decoder = jpeg_decoder::Decoder::new(stream);
        decoder
            .decode()
            .map_err(|e| CogError::InvalidTiff { reason: format!("JPEG decode failed: {e}") })
    }
}

/// Splices a tile's abbreviated JPEG stream (SOI, scan data, EOI — no tables) onto the IFD's
/// shared JPEGTables blob (SOI, DQT/DHT, EOI), producing one complete JPEG stream: the tables'
/// trailing EOI and the tile's leading SOI are both dropped so the two segments concatenate
/// into a single valid marker sequence.
fn merge_jpeg_tables(tables: &[u8], tile: &[u8]) -> Vec<u8> {
    let tables_body = tables.strip_suffix(&[0xFF, 0xD9]).unwrap_or(tables);
    let tile_body = tile.strip_prefix(&[0xFF, 0xD8]).unwrap_or(tile);
    let mut merged = Vec::with_capacity(tables_body.len() + tile_body.len());
    merged.extend_from_slice(tables_body);
    merged.extend_from_slice(tile_body);
    merged
}

fn lerc_pixels_to_bytes(pixels: &lerc_codec::DecodedPixels) -> Vec<u8> {
    use lerc_codec::DecodedPixels::*;
    match pixels {
        I8(v) => bytemuck::cast_slice(v).to_vec(),
        U8(v) => v.clone(),
        I16(v) => bytemuck::cast_slice(v).to_vec(),
        U16(v) => bytemuck::cast_slice(v).to_vec(),
        I32(v) => bytemuck::cast_slice(v).to_vec(),
        U32(v) => bytemuck::cast_slice(v).to_vec(),
        F32(v) => bytemuck::cast_slice(v).to_vec(),
        F64(v) => bytemuck::cast_slice(v).to_vec(),
    }
}

pub type DecoderFactory = Box<dyn Fn() -> Box<dyn TileDecoder> + Send + Sync>;

/// Maps a TIFF compression code to a decoder factory. None/Deflate/JPEG/LERC are registered by
/// `with_defaults`; LZW is registered too since COGs commonly use it. Callers can `register`
/// Zstd/WebP/JP2000 without touching this crate.
pub struct CodecRegistry {
    factories: HashMap<u16, DecoderFactory>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        CodecRegistry { factories: HashMap::new() }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(compression::NONE, || Box::new(IdentityDecoder));
        registry.register(compression::LZW, || Box::new(LzwDecoder));
        registry.register(compression::DEFLATE, || Box::new(DeflateDecoder));
        registry.register(compression::DEFLATE_OLD, || Box::new(DeflateDecoder));
        registry.register(compression::JPEG, || Box::new(JpegDecoder));
        registry.register(compression::LERC, || Box::new(LercDecoder));
        registry
    }

    pub fn register(&mut self, code: u16, factory: impl Fn() -> Box<dyn TileDecoder> + Send + Sync + 'static) {
        self.factories.insert(code, Box::new(factory));
    }

    pub fn decoder_for(&self, code: u16) -> Result<Box<dyn TileDecoder>> {
        self.factories
            .get(&code)
            .map(|factory| factory())
            .ok_or(CogError::UnsupportedCompression { code })
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Undoes the horizontal or floating-point TIFF predictor in place, row by row.
/// `bytes_per_sample` and `samples_per_pixel` describe the decoded (post-codec) layout.
pub fn unpredict(
    predictor: Predictor,
    data: &mut [u8],
    width: usize,
    samples_per_pixel: usize,
    bytes_per_sample: usize,
    is_float: bool,
) -> Result<()> {
    match predictor {
        Predictor::None => Ok(()),
        Predictor::Horizontal => unpredict_horizontal(data, width, samples_per_pixel, bytes_per_sample, is_float),
        Predictor::FloatingPoint => unpredict_floating_point(data, width, samples_per_pixel, bytes_per_sample),
    }
}

fn unpredict_horizontal(data: &mut [u8], width: usize, samples_per_pixel: usize, bytes_per_sample: usize, is_float: bool) -> Result<()> {
    let row_stride = width * samples_per_pixel * bytes_per_sample;
    if is_float {
        // Predictor 2 on floating point data operates on raw bytes, not decoded values.
        for row in data.chunks_mut(row_stride) {
            for i in samples_per_pixel..row.len() {
                row[i] = row[i].wrapping_add(row[i - samples_per_pixel]);
            }
        }
        return Ok(());
    }

    match bytes_per_sample {
        1 => unpredict_horizontal_typed::<1>(data, row_stride, samples_per_pixel),
        2 => unpredict_horizontal_u16(data, row_stride, samples_per_pixel),
        4 => unpredict_horizontal_u32(data, row_stride, samples_per_pixel),
        _ => {
            return Err(CogError::UnsupportedPredictor { predictor: Predictor::Horizontal, bytes_per_sample });
        }
    }
    Ok(())
}

fn unpredict_horizontal_typed<const N: usize>(data: &mut [u8], row_stride: usize, samples_per_pixel: usize) {
    for row in data.chunks_mut(row_stride) {
        for i in samples_per_pixel..row.len() {
            row[i] = row[i].wrapping_add(row[i - samples_per_pixel]);
        }
    }
}

fn unpredict_horizontal_u16(data: &mut [u8], row_stride: usize, samples_per_pixel: usize) {
    for row in data.chunks_mut(row_stride) {
        let values: &mut [u16] = bytemuck::cast_slice_mut(row);
        for i in samples_per_pixel..values.len() {
            values[i] = values[i].wrapping_add(values[i - samples_per_pixel]);
        }
    }
}

fn unpredict_horizontal_u32(data: &mut [u8], row_stride: usize, samples_per_pixel: usize) {
    for row in data.chunks_mut(row_stride) {
        let values: &mut [u32] = bytemuck::cast_slice_mut(row);
        for i in samples_per_pixel..values.len() {
            values[i] = values[i].wrapping_add(values[i - samples_per_pixel]);
        }
    }
}

/// Predictor 3: bytes are stored transposed (all high bytes of a row, then all next-highest,
/// ...) and delta-encoded within that byte plane; decode undoes the delta then the transpose.
fn unpredict_floating_point(data: &mut [u8], width: usize, samples_per_pixel: usize, bytes_per_sample: usize) -> Result<()> {
    let row_stride = width * samples_per_pixel * bytes_per_sample;
    if bytes_per_sample != 4 && bytes_per_sample != 8 {
        return Err(CogError::UnsupportedPredictor { predictor: Predictor::FloatingPoint, bytes_per_sample });
    }

    for row in data.chunks_mut(row_stride) {
        // Undo the byte-plane delta encoding.
        for i in 1..row.len() {
            row[i] = row[i].wrapping_add(row[i - 1]);
        }

        // Un-shuffle the byte planes back into native sample byte order (big-endian on disk).
        let samples = width * samples_per_pixel;
        let mut reassembled = vec![0u8; row.len()];
        for sample in 0..samples {
            for plane in 0..bytes_per_sample {
                reassembled[sample * bytes_per_sample + plane] = row[plane * samples + sample];
            }
        }
        row.copy_from_slice(&reassembled);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_decoder_rejects_short_input() {
        let decoder = IdentityDecoder;
        assert!(decoder.decode(&[1, 2, 3], 4, None).is_err());
        assert_eq!(decoder.decode(&[1, 2, 3, 4], 4, None).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn jpeg_table_merge_drops_duplicate_markers() {
        let tables = [0xFFu8, 0xD8, 0xFF, 0xDB, 0x00, 0x01, 0xFF, 0xD9];
        let tile = [0xFFu8, 0xD8, 0xFF, 0xDA, 0x00, 0x01, 0xFF, 0xD9];
        let merged = merge_jpeg_tables(&tables, &tile);
        assert_eq!(merged, vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x01, 0xFF, 0xDA, 0x00, 0x01, 0xFF, 0xD9]);
    }

    #[test]
    fn horizontal_predictor_round_trips_u8() {
        // Row [10, 3, 3, 3] predictor-encoded (deltas) from [10, 13, 16, 19].
        let mut data = vec![10u8, 3, 3, 3];
        unpredict(Predictor::Horizontal, &mut data, 4, 1, 1, false).unwrap();
        assert_eq!(data, vec![10, 13, 16, 19]);
    }

    #[test]
    fn horizontal_predictor_rejects_64_bit_samples() {
        let mut data = vec![0u8; 16];
        let err = unpredict(Predictor::Horizontal, &mut data, 1, 1, 8, false).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedPredictor);
    }

    #[test]
    fn unknown_compression_code_is_unsupported() {
        let registry = CodecRegistry::with_defaults();
        let err = registry.decoder_for(50002).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedCompression);
    }
}
