//! Tuning for the L.A.Cosmic detector.

use serde::{Deserialize, Serialize};

use super::DetectionError;

/// Detector tuning. Defaults match common L.A.Cosmic usage on CCD data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LACosmicConfig {
    /// Detection limit in units of the noise.
    pub sigclip: f64,
    /// Fraction of `sigclip` applied to neighbours of a detection.
    pub sigfrac: f64,
    /// Minimum Laplacian to fine-structure contrast.
    pub objlim: f64,
    /// Electrons per ADU.
    pub gain: f64,
    /// Read noise in electrons.
    pub readnoise: f64,
    /// Saturation level in ADU.
    pub satlevel: f64,
    pub niter: usize,
}

impl Default for LACosmicConfig {
    fn default() -> Self {
        Self {
            sigclip: 4.5,
            sigfrac: 0.3,
            objlim: 5.0,
            gain: 1.0,
            readnoise: 6.5,
            satlevel: 65536.0,
            niter: 4,
        }
    }
}

impl LACosmicConfig {
    pub fn validate(&self) -> Result<(), DetectionError> {
        let positive = [
            ("sigclip", self.sigclip),
            ("objlim", self.objlim),
            ("gain", self.gain),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(DetectionError::InvalidConfig(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if !(self.readnoise.is_finite() && self.readnoise >= 0.0) {
            return Err(DetectionError::InvalidConfig(format!(
                "readnoise must be non-negative, got {}",
                self.readnoise
            )));
        }
        if !(self.sigfrac > 0.0 && self.sigfrac <= 1.0) {
            return Err(DetectionError::InvalidConfig(format!(
                "sigfrac must be in (0, 1], got {}",
                self.sigfrac
            )));
        }
        if self.satlevel.is_nan() || self.satlevel <= 0.0 {
            return Err(DetectionError::InvalidConfig(format!(
                "satlevel must be positive, got {}",
                self.satlevel
            )));
        }
        if self.niter == 0 {
            return Err(DetectionError::InvalidConfig(
                "niter must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LACosmicConfig::default();
        assert_eq!(config.sigclip, 4.5);
        assert_eq!(config.sigfrac, 0.3);
        assert_eq!(config.objlim, 5.0);
        assert_eq!(config.readnoise, 6.5);
        assert_eq!(config.satlevel, 65536.0);
        assert_eq!(config.niter, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let bad = [
            LACosmicConfig {
                gain: 0.0,
                ..LACosmicConfig::default()
            },
            LACosmicConfig {
                sigclip: f64::NAN,
                ..LACosmicConfig::default()
            },
            LACosmicConfig {
                sigfrac: 1.5,
                ..LACosmicConfig::default()
            },
            LACosmicConfig {
                readnoise: -1.0,
                ..LACosmicConfig::default()
            },
            LACosmicConfig {
                satlevel: 0.0,
                ..LACosmicConfig::default()
            },
            LACosmicConfig {
                niter: 0,
                ..LACosmicConfig::default()
            },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(DetectionError::InvalidConfig(_))),
                "{config:?}"
            );
        }
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: LACosmicConfig = serde_json::from_str(r#"{"sigclip": 6.0}"#).unwrap();
        assert_eq!(config.sigclip, 6.0);
        assert_eq!(config.niter, 4);
    }
}
