use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    InvalidTiff,
    UnsupportedCompression,
    UnsupportedPredictor,
    DegenerateTransform,
    UnsupportedCrs,
    HeterogeneousSampleFormat,
    HeterogeneousBitsPerSample,
    BandIndexOutOfRange,
    EmptyBandRange,
    EmptyBandOrder,
    TileNotFound,
    SparseTile,
    UnsupportedTiffFeature,
    WindowOutOfBounds,
    Io,
    Aborted,
    ShortRead,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CogError {
    #[error("not a valid TIFF/GeoTIFF: {reason}")]
    InvalidTiff { reason: String },

    #[error("unsupported compression code {code}")]
    UnsupportedCompression { code: u16 },

    #[error("predictor {predictor:?} does not support {bytes_per_sample}-byte samples")]
    UnsupportedPredictor { predictor: crate::codec::Predictor, bytes_per_sample: usize },

    #[error("geotransform is degenerate and cannot be inverted")]
    DegenerateTransform(#[source] raster_affine::AffineError),

    #[error("unsupported or unrecognised CRS")]
    UnsupportedCrs(#[source] raster_affine::AffineError),

    #[error("samples in IFD have differing SampleFormat values, expected one uniform value")]
    HeterogeneousSampleFormat,

    #[error("samples in IFD have differing BitsPerSample values, expected one uniform value")]
    HeterogeneousBitsPerSample,

    #[error("band index {index} out of range, raster has {band_count} bands")]
    BandIndexOutOfRange { index: usize, band_count: usize },

    #[error("requested band range is empty")]
    EmptyBandRange,

    #[error("requested band order is empty")]
    EmptyBandOrder,

    #[error("tile ({tile_x}, {tile_y}) has no TileOffsets/TileByteCounts entry")]
    TileNotFound { tile_x: u32, tile_y: u32 },

    #[error("tile ({tile_x}, {tile_y}) is sparse and carries no stored data")]
    SparseTile { tile_x: u32, tile_y: u32 },

    #[error("unsupported TIFF feature: {feature}")]
    UnsupportedTiffFeature { feature: String },

    #[error("window (col_off={col_off}, row_off={row_off}, width={width}, height={height}) is out of bounds")]
    WindowOutOfBounds { col_off: u32, row_off: u32, width: u32, height: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tiff decoding error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("operation aborted")]
    Aborted,

    #[error("byte source returned fewer bytes than requested: wanted {wanted}, got {got}")]
    ShortRead { wanted: u64, got: u64 },

    #[error("HTTP byte source error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CogError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CogError::InvalidTiff { .. } => ErrorKind::InvalidTiff,
            CogError::UnsupportedCompression { .. } => ErrorKind::UnsupportedCompression,
            CogError::UnsupportedPredictor { .. } => ErrorKind::UnsupportedPredictor,
            CogError::DegenerateTransform(_) => ErrorKind::DegenerateTransform,
            CogError::UnsupportedCrs(_) => ErrorKind::UnsupportedCrs,
            CogError::HeterogeneousSampleFormat => ErrorKind::HeterogeneousSampleFormat,
            CogError::HeterogeneousBitsPerSample => ErrorKind::HeterogeneousBitsPerSample,
            CogError::BandIndexOutOfRange { .. } => ErrorKind::BandIndexOutOfRange,
            CogError::EmptyBandRange => ErrorKind::EmptyBandRange,
            CogError::EmptyBandOrder => ErrorKind::EmptyBandOrder,
            CogError::TileNotFound { .. } => ErrorKind::TileNotFound,
            CogError::SparseTile { .. } => ErrorKind::SparseTile,
            CogError::UnsupportedTiffFeature { .. } => ErrorKind::UnsupportedTiffFeature,
            CogError::WindowOutOfBounds { .. } => ErrorKind::WindowOutOfBounds,
            CogError::Io(_) => ErrorKind::Io,
            CogError::Tiff(_) => ErrorKind::InvalidTiff,
            CogError::Aborted => ErrorKind::Aborted,
            CogError::ShortRead { .. } => ErrorKind::ShortRead,
            CogError::Http(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, CogError>;
