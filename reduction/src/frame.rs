//! Loading science and calibration frames from FITS.
//!
//! Pixels come from the first HDU that carries image data and are always converted to
//! `f32` physical values. The header attached to a frame is the primary header, which
//! is where acquisition keywords such as `EXPTIME` live.

use std::fmt;
use std::path::{Path, PathBuf};

use fitsio::header::Card;
use fitsio::value::Value;
use ndarray::Array2;

use crate::error::{ReductionError, Result};
use crate::fits::{self, FitsInput, Header};

/// A single-plane detector image, `(height, width)`.
pub type Image = Array2<f32>;

/// Science frame keyword holding the integration time in seconds.
pub const EXPTIME: &str = "EXPTIME";

/// Which input a frame plays in the reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameRole {
    Science,
    Bias,
    Dark,
    Flat,
}

impl fmt::Display for FrameRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameRole::Science => "science",
            FrameRole::Bias => "bias",
            FrameRole::Dark => "dark",
            FrameRole::Flat => "flat",
        };
        f.write_str(name)
    }
}

/// Pixels and primary header of one input file.
#[derive(Debug, Clone)]
pub struct Frame {
    pub path: PathBuf,
    pub role: FrameRole,
    pub image: Image,
    pub header: Header,
}

impl Frame {
    pub fn load<P: AsRef<Path>>(path: P, role: FrameRole) -> Result<Self> {
        let path = path.as_ref();
        let file = FitsInput::open(path)?;
        let format_error = |source| ReductionError::Format {
            path: path.to_path_buf(),
            source,
        };

        let hdu = file.first_image_hdu().map_err(format_error)?;
        let image = file.read_image(hdu).map_err(format_error)?;
        let (height, width) = image.dim();
        log::info!(
            "Loaded {role} frame {} ({width}x{height}, BITPIX {})",
            path.display(),
            fits::bitpix(hdu).unwrap_or_default()
        );

        Ok(Self {
            path: path.to_path_buf(),
            role,
            image,
            header: file.primary_header(),
        })
    }

    /// `(height, width)`
    pub fn shape(&self) -> (usize, usize) {
        self.image.dim()
    }
}

/// The frame being reduced, with its validated exposure time.
#[derive(Debug, Clone)]
pub struct ScienceFrame {
    pub frame: Frame,
    pub exposure_time: f64,
}

impl ScienceFrame {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let frame = Frame::load(path, FrameRole::Science)?;
        let exposure_time = exposure_time(&frame.header, &frame.path)?;
        log::info!("Science exposure time {exposure_time} s");
        Ok(Self {
            frame,
            exposure_time,
        })
    }
}

/// `EXPTIME` of a header as a positive, finite number of seconds.
///
/// `path` only labels the error.
pub fn exposure_time(header: &[Card], path: &Path) -> Result<f64> {
    let invalid = |reason: String| ReductionError::InvalidMetadata {
        path: path.to_path_buf(),
        keyword: EXPTIME.to_string(),
        reason,
    };

    let card = fits::find_card(header, EXPTIME).ok_or_else(|| ReductionError::MissingMetadata {
        path: path.to_path_buf(),
        keyword: EXPTIME.to_string(),
    })?;
    let seconds = match &card.value {
        Some(Value::Integer(n)) => *n as f64,
        Some(Value::Float(x)) => *x,
        other => return Err(invalid(format!("expected a number, found {other:?}"))),
    };

    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(invalid(format!(
            "expected a positive number of seconds, found {seconds}"
        )));
    }
    Ok(seconds)
}
