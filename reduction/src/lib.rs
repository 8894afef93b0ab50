//! Science frame reduction.
//!
//! Removes the instrumental signature from one raw exposure using median bias, dark
//! and flat masters, masks cosmic-ray hits and writes a two-HDU FITS file: the
//! cleaned float32 image under the science header, annotated with the masters it was
//! reduced with, followed by a `COSMICRAY_MASK` uint8 extension.
//!
//! ```no_run
//! use std::path::Path;
//!
//! let reduced = reduction::reduce(
//!     Path::new("science.fits"),
//!     Path::new("master_bias.fits"),
//!     Path::new("master_flat.fits"),
//!     Path::new("master_dark.fits"),
//!     None,
//! )?;
//! println!("{:?}", reduced.dim());
//! # Ok::<(), reduction::ReductionError>(())
//! ```

pub mod calibration;
pub mod config;
pub mod cosmic_ray;
pub mod error;
pub mod fits;
pub mod frame;
pub mod packager;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_util;

pub use calibration::CalibrationMasters;
pub use config::ReductionConfig;
pub use cosmic_ray::{CosmicRayDetector, CosmicRayResult, DetectionError, LACosmic, PassThrough};
pub use error::{FormatError, ReductionError, Result};
pub use frame::{FrameRole, Image, ScienceFrame};
pub use pipeline::{reduce, reduce_science_frame, reduce_with_config, ReducedFrame, ReductionInputs};
