//! End-to-end reduction of one science frame.
//!
//! Load, correct, mask, write; strictly in that order. The first failure ends the run
//! and nothing is written.

use std::path::{Path, PathBuf};

use crate::calibration::CalibrationMasters;
use crate::config::{ReductionConfig, DEFAULT_OUTPUT};
use crate::cosmic_ray::{CosmicRayDetector, CosmicRayResult, Mask};
use crate::error::Result;
use crate::frame::{Image, ScienceFrame};
use crate::packager::{write_reduced, Provenance};

/// Paths of the science frame and its three calibration masters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionInputs {
    pub science: PathBuf,
    pub bias: PathBuf,
    pub dark: PathBuf,
    pub flat: PathBuf,
}

impl ReductionInputs {
    /// Arguments follow the conventional science, bias, flat, dark order.
    pub fn new(
        science: impl Into<PathBuf>,
        bias: impl Into<PathBuf>,
        flat: impl Into<PathBuf>,
        dark: impl Into<PathBuf>,
    ) -> Self {
        Self {
            science: science.into(),
            bias: bias.into(),
            dark: dark.into(),
            flat: flat.into(),
        }
    }

    pub fn provenance(&self) -> Provenance {
        Provenance::from_paths(&self.bias, &self.dark, &self.flat)
    }
}

/// The two data planes written to the output file.
#[derive(Debug, Clone)]
pub struct ReducedFrame {
    pub image: Image,
    pub mask: Mask,
}

impl ReducedFrame {
    pub fn flagged_count(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

/// Reduce one frame with an explicit detector and write it to `output`.
pub fn reduce_science_frame(
    inputs: &ReductionInputs,
    output: &Path,
    detector: &dyn CosmicRayDetector,
) -> Result<ReducedFrame> {
    let science = ScienceFrame::load(&inputs.science)?;
    let masters = CalibrationMasters::load(&inputs.bias, &inputs.dark, &inputs.flat)?;
    let corrected = masters.calibrate(&science.frame.image, science.exposure_time)?;

    let result = detector.detect(&corrected)?;
    result.check_shape(corrected.dim())?;
    log::info!(
        "{} flagged {} pixel(s)",
        detector.name(),
        result.flagged_count()
    );
    let CosmicRayResult { mask, cleaned } = result;

    write_reduced(
        output,
        &cleaned,
        &mask,
        &science.frame.header,
        &inputs.provenance(),
    )?;
    Ok(ReducedFrame {
        image: cleaned,
        mask,
    })
}

/// Reduce one frame as described by `config`.
pub fn reduce_with_config(
    inputs: &ReductionInputs,
    config: &ReductionConfig,
) -> Result<ReducedFrame> {
    let detector = config.detector();
    reduce_science_frame(inputs, &config.output_path, detector.as_ref())
}

/// Reduce with default settings, returning the cleaned image.
///
/// `output` defaults to `reduced_science.fits` in the working directory.
pub fn reduce(
    science: &Path,
    bias: &Path,
    flat: &Path,
    dark: &Path,
    output: Option<&Path>,
) -> Result<Image> {
    let inputs = ReductionInputs::new(science, bias, flat, dark);
    let output = output.unwrap_or(Path::new(DEFAULT_OUTPUT));
    let detector = ReductionConfig::default().detector();
    Ok(reduce_science_frame(&inputs, output, detector.as_ref())?.image)
}
