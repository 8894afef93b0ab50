//! Run configuration persisted as JSON.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cosmic_ray::{CosmicRayDetector, LACosmic, LACosmicConfig, PassThrough};
use crate::error::{ReductionError, Result};

/// Output file name used when none is configured.
pub const DEFAULT_OUTPUT: &str = "reduced_science.fits";

/// Settings for one reduction run. Missing JSON fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    pub output_path: PathBuf,
    /// Run cosmic-ray detection. When off the mask is written all zero.
    pub remove_cosmic_rays: bool,
    pub cosmic_ray: LACosmicConfig,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT),
            remove_cosmic_rays: true,
            cosmic_ray: LACosmicConfig::default(),
        }
    }
}

impl ReductionConfig {
    /// The detector this configuration selects.
    pub fn detector(&self) -> Box<dyn CosmicRayDetector> {
        if self.remove_cosmic_rays {
            Box::new(LACosmic::new(self.cosmic_ray))
        } else {
            Box::new(PassThrough)
        }
    }

    /// Save as pretty-printed JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let write_error = |source| ReductionError::Write {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| write_error(std::io::Error::new(ErrorKind::InvalidData, e)))?;
        std::fs::write(path, json).map_err(write_error)
    }

    /// Load from JSON and check the detector settings.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config_error = |reason: String| ReductionError::Config {
            path: path.to_path_buf(),
            reason,
        };

        let json = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ReductionError::NotFound {
                path: path.to_path_buf(),
            },
            _ => config_error(e.to_string()),
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|e| config_error(e.to_string()))?;
        config
            .cosmic_ray
            .validate()
            .map_err(|e| config_error(e.to_string()))?;
        Ok(config)
    }
}
