use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    InvalidRasterSize,
    DegenerateTransform,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MeshError {
    #[error("raster size {width}x{height} is invalid, both dimensions must be positive")]
    InvalidRasterSize { width: u32, height: u32 },

    #[error("output affine transform is degenerate and cannot be inverted")]
    DegenerateTransform(#[source] raster_affine::AffineError),
}

impl MeshError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeshError::InvalidRasterSize { .. } => ErrorKind::InvalidRasterSize,
            MeshError::DegenerateTransform(_) => ErrorKind::DegenerateTransform,
        }
    }
}

pub type Result<T> = std::result::Result<T, MeshError>;
