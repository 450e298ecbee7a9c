use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    NoOverviews,
    DegenerateTransform,
    InvalidBounds,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TmsError {
    #[error("cannot build a tile matrix set from a raster with no overviews")]
    NoOverviews,

    #[error("overview geotransform is degenerate and cannot be inverted")]
    DegenerateTransform(#[source] raster_affine::AffineError),

    #[error("computed WGS84 bounds are invalid: {reason}")]
    InvalidBounds { reason: String },
}

impl TmsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TmsError::NoOverviews => ErrorKind::NoOverviews,
            TmsError::DegenerateTransform(_) => ErrorKind::DegenerateTransform,
            TmsError::InvalidBounds { .. } => ErrorKind::InvalidBounds,
        }
    }
}

pub type Result<T> = std::result::Result<T, TmsError>;
