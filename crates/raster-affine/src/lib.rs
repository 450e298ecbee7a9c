//! Affine pixel/CRS transforms and GeoKeyDirectory-derived CRS parsing.

mod affine;
pub mod crs;
mod error;

pub use affine::{Affine, Anchor, RoundingMode};
pub use error::{AffineError, ErrorKind};

pub type Result<T> = std::result::Result<T, AffineError>;
