//! Failure modes of a reduction run.

use std::path::PathBuf;

use thiserror::Error;

use crate::cosmic_ray::DetectionError;
use crate::frame::FrameRole;

/// Errors that abort a reduction.
///
/// Nothing is retried and no output file exists after any of these.
#[derive(Debug, Error)]
pub enum ReductionError {
    /// An input path does not resolve to a file.
    #[error("Input file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file is not readable FITS or holds no 2D image.
    #[error("Invalid FITS file {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    /// A header keyword the reduction depends on is absent.
    #[error("{} is missing required keyword {keyword}", path.display())]
    MissingMetadata { path: PathBuf, keyword: String },

    /// A required header keyword is present but unusable.
    #[error("{} has invalid {keyword}: {reason}", path.display())]
    InvalidMetadata {
        path: PathBuf,
        keyword: String,
        reason: String,
    },

    /// A calibration frame does not match the science frame's dimensions.
    #[error("{frame} frame has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        frame: FrameRole,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Exposure time must be finite and non-negative, got {0}")]
    InvalidExposure(f64),

    #[error("Cosmic-ray detection failed: {0}")]
    Detection(#[from] DetectionError),

    /// The output file could not be encoded or written.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, ReductionError>;

/// Why a file cannot be used as an input frame.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error(transparent)]
    Fits(#[from] fitsio::Error),

    #[error("No HDU holds image data")]
    NoImage,

    #[error("Expected a 2D image, found axes {0:?}")]
    NotTwoDimensional(Vec<usize>),

    #[error("Pixel data does not fill the image: {0}")]
    Shape(#[from] ndarray::ShapeError),
}
