//! Master calibration frames and the bias, dark, flat correction.

use std::path::Path;

use ndarray::Zip;

use crate::error::{ReductionError, Result};
use crate::frame::{Frame, FrameRole, Image};

/// Median-combined calibration frames for one detector configuration.
///
/// The dark is current per second of exposure and is scaled by the science
/// exposure time. Bias and flat are applied as-is.
#[derive(Debug, Clone)]
pub struct CalibrationMasters {
    pub bias: Image,
    pub dark: Image,
    pub flat: Image,
}

impl CalibrationMasters {
    pub fn new(bias: Image, dark: Image, flat: Image) -> Self {
        Self { bias, dark, flat }
    }

    pub fn load<P: AsRef<Path>>(bias: P, dark: P, flat: P) -> Result<Self> {
        Ok(Self {
            bias: Frame::load(bias, FrameRole::Bias)?.image,
            dark: Frame::load(dark, FrameRole::Dark)?.image,
            flat: Frame::load(flat, FrameRole::Flat)?.image,
        })
    }

    /// Fail with the first master whose shape differs from `expected`.
    pub fn check_shape(&self, expected: (usize, usize)) -> Result<()> {
        for (frame, image) in [
            (FrameRole::Bias, &self.bias),
            (FrameRole::Dark, &self.dark),
            (FrameRole::Flat, &self.flat),
        ] {
            if image.dim() != expected {
                return Err(ReductionError::ShapeMismatch {
                    frame,
                    expected,
                    found: image.dim(),
                });
            }
        }
        Ok(())
    }

    /// Compute `((science - bias) - dark * exposure_time) / flat` per pixel.
    ///
    /// Flat pixels at or near zero are not guarded; the affected outputs become
    /// infinite or NaN and are reported in the log.
    pub fn calibrate(&self, science: &Image, exposure_time: f64) -> Result<Image> {
        if !exposure_time.is_finite() || exposure_time < 0.0 {
            return Err(ReductionError::InvalidExposure(exposure_time));
        }
        self.check_shape(science.dim())?;

        let t = exposure_time as f32;
        let mut corrected = science.clone();
        Zip::from(&mut corrected)
            .and(&self.bias)
            .and(&self.dark)
            .and(&self.flat)
            .par_for_each(|pixel, &bias, &dark, &flat| {
                *pixel = ((*pixel - bias) - dark * t) / flat;
            });

        let non_finite = corrected.iter().filter(|v| !v.is_finite()).count();
        if non_finite > 0 {
            log::warn!("{non_finite} pixel(s) are not finite after flat-field division");
        }
        Ok(corrected)
    }
}
