use thiserror::Error;

/// Stable, matchable error classification, independent of the `Display` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    DegenerateTransform,
    UnsupportedCrs,
    InvalidEllipsoid,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AffineError {
    #[error("affine transform is degenerate (determinant {determinant} below tolerance {tolerance})")]
    DegenerateTransform { determinant: f64, tolerance: f64 },

    #[error("unsupported CRS: GeoKey projection method {proj_method} is not recognised")]
    UnsupportedCrs { proj_method: u16 },

    #[error("invalid ellipsoid definition: {reason}")]
    InvalidEllipsoid { reason: String },
}

impl AffineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AffineError::DegenerateTransform { .. } => ErrorKind::DegenerateTransform,
            AffineError::UnsupportedCrs { .. } => ErrorKind::UnsupportedCrs,
            AffineError::InvalidEllipsoid { .. } => ErrorKind::InvalidEllipsoid,
        }
    }
}
