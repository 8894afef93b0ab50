//! Cosmic-ray detection on calibrated images.
//!
//! The pipeline only depends on [`CosmicRayDetector`]: an image goes in, a defect
//! mask and a cleaned image come out. [`LACosmic`] is the working detector and
//! [`PassThrough`] stands in when removal is switched off.

mod config;
pub mod filters;
mod fine_structure;
mod lacosmic;
mod laplacian;

pub use config::LACosmicConfig;
pub use lacosmic::LACosmic;

use ndarray::Array2;
use thiserror::Error;

use crate::frame::Image;

/// Per-pixel defect flags, co-extensive with the image they describe.
pub type Mask = Array2<bool>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("Image is empty")]
    EmptyImage,

    #[error("Image of {height}x{width} pixels is smaller than 3x3")]
    TooSmall { height: usize, width: usize },

    #[error("Image has no finite pixels")]
    NoFinitePixels,

    #[error("Invalid detector configuration: {0}")]
    InvalidConfig(String),

    /// A detector returned planes that do not match its input.
    #[error("Detector output has shape {found:?}, expected {expected:?}")]
    OutputShape {
        expected: (usize, usize),
        found: (usize, usize),
    },
}

/// Output of a detector run.
#[derive(Debug, Clone)]
pub struct CosmicRayResult {
    pub mask: Mask,
    pub cleaned: Image,
}

impl CosmicRayResult {
    pub fn flagged_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }

    /// Check both planes against the shape of the detector input.
    pub fn check_shape(&self, expected: (usize, usize)) -> Result<(), DetectionError> {
        for found in [self.mask.dim(), self.cleaned.dim()] {
            if found != expected {
                return Err(DetectionError::OutputShape { expected, found });
            }
        }
        Ok(())
    }
}

/// Finds and repairs cosmic-ray hits in a calibrated image.
pub trait CosmicRayDetector {
    fn detect(&self, image: &Image) -> Result<CosmicRayResult, DetectionError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Flags nothing and returns the image unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl CosmicRayDetector for PassThrough {
    fn detect(&self, image: &Image) -> Result<CosmicRayResult, DetectionError> {
        Ok(CosmicRayResult {
            mask: Mask::from_elem(image.dim(), false),
            cleaned: image.clone(),
        })
    }

    fn name(&self) -> &'static str {
        "pass-through"
    }
}
