//! Laplacian edge detection of cosmic rays (van Dokkum 2001, PASP 113, 1420).
//!
//! Cosmic-ray hits are sharper than anything the optics can deliver, so they stand
//! out in the Laplacian of the image. Each iteration:
//!
//! 1. Laplacian of a 2x subsampled copy, negatives clipped, rebinned: `L+`
//! 2. Noise model from the 5x5 median and read noise
//! 3. Significance `S = L+ / (2 noise)` with large-scale structure removed: `S'`
//! 4. Candidates above `sigclip`, rejecting compact stars whose fine-structure
//!    contrast `L+ / F` stays below `objlim`
//! 5. Growth into neighbours above `sigclip`, then above `sigfrac * sigclip`
//! 6. Flagged pixels replaced by the mean of clean 5x5 neighbours
//!
//! Iteration stops once nothing new is found or after `niter` passes.

use ndarray::{Array2, Zip};

use super::config::LACosmicConfig;
use super::filters::{clean_masked, dilate3, median_filter, median_in_place};
use super::fine_structure::compute_fine_structure;
use super::laplacian::compute_laplacian_plus;
use super::{CosmicRayDetector, CosmicRayResult, DetectionError, Mask};
use crate::frame::Image;

/// Floor for the median used in the noise model, avoiding sqrt of negatives.
const MIN_NOISE_MEDIAN: f32 = 1e-4;

/// L.A.Cosmic detector.
#[derive(Debug, Clone, Default)]
pub struct LACosmic {
    config: LACosmicConfig,
}

impl LACosmic {
    pub fn new(config: LACosmicConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LACosmicConfig {
        &self.config
    }

    /// One detection pass over the working image in electrons.
    ///
    /// Returns the grown detections and the 5x5 median used as the cleaning fallback.
    fn find_hits(&self, work: &Image, saturated: &Mask, usable: &Mask) -> (Mask, Image) {
        let sigclip = self.config.sigclip as f32;
        let sigcliplow = (self.config.sigfrac * self.config.sigclip) as f32;
        let objlim = self.config.objlim as f32;
        let readnoise_sq = (self.config.readnoise * self.config.readnoise) as f32;

        let lplus = compute_laplacian_plus(work.view());
        let med5 = median_filter(work.view(), 5);

        let significance = Zip::from(&lplus)
            .and(&med5)
            .map_collect(|&l, &m| l / (2.0 * (m.max(MIN_NOISE_MEDIAN) + readnoise_sq).sqrt()));
        let sprime = &significance - &median_filter(significance.view(), 5);

        let fine = compute_fine_structure(work.view());

        let candidates = Zip::from(&sprime)
            .and(&lplus)
            .and(&fine)
            .and(saturated)
            .map_collect(|&s, &l, &f, &sat| s > sigclip && !sat && l / f > objlim);

        let grown = Zip::from(&dilate3(&candidates))
            .and(&sprime)
            .map_collect(|&d, &s| d && s > sigclip);
        let grown = Zip::from(&dilate3(&grown))
            .and(&sprime)
            .and(saturated)
            .and(usable)
            .map_collect(|&d, &s, &sat, &ok| d && s > sigcliplow && !sat && ok);

        (grown, med5)
    }
}

impl CosmicRayDetector for LACosmic {
    fn detect(&self, image: &Image) -> Result<CosmicRayResult, DetectionError> {
        self.config.validate()?;
        let (height, width) = image.dim();
        if height == 0 || width == 0 {
            return Err(DetectionError::EmptyImage);
        }
        if height < 3 || width < 3 {
            return Err(DetectionError::TooSmall { height, width });
        }

        let usable = image.mapv(f32::is_finite);
        let mut finite: Vec<f32> = image.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return Err(DetectionError::NoFinitePixels);
        }
        let fill = median_in_place(&mut finite);

        let gain = self.config.gain as f32;
        let mut work = Zip::from(image)
            .and(&usable)
            .map_collect(|&v, &ok| (if ok { v } else { fill }) * gain);

        let saturation = (self.config.satlevel * self.config.gain) as f32;
        let saturated = dilate3(
            &Zip::from(&work)
                .and(&usable)
                .map_collect(|&v, &ok| ok && v >= saturation),
        );

        let mut mask = Mask::from_elem(image.dim(), false);
        for iteration in 1..=self.config.niter {
            let (hits, med5) = self.find_hits(&work, &saturated, &usable);
            let new_hits = Zip::from(&hits)
                .and(&mask)
                .fold(0usize, |n, &hit, &old| n + usize::from(hit && !old));
            log::debug!("L.A.Cosmic iteration {iteration}: {new_hits} new pixel(s)");
            if new_hits == 0 {
                break;
            }

            Zip::from(&mut mask).and(&hits).for_each(|m, &hit| *m |= hit);
            work = clean_masked(work.view(), &mask, med5.view());
        }

        let cleaned: Array2<f32> = Zip::from(image)
            .and(&work)
            .and(&mask)
            .map_collect(|&original, &repaired, &flagged| {
                if flagged {
                    repaired / gain
                } else {
                    original
                }
            });

        Ok(CosmicRayResult { mask, cleaned })
    }

    fn name(&self) -> &'static str {
        "L.A.Cosmic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rand_distr::{Distribution, Normal};

    fn sky(size: usize, level: f32, sigma: f32, seed: u64) -> Image {
        let mut rng = StdRng::seed_from_u64(seed);
        let noise = Normal::new(0.0f32, sigma).unwrap();
        Image::from_shape_fn((size, size), |_| level + noise.sample(&mut rng))
    }

    fn add_star(image: &mut Image, (cy, cx): (f32, f32), peak: f32, sigma: f32) {
        image.indexed_iter_mut().for_each(|((r, c), v)| {
            let d2 = (r as f32 - cy).powi(2) + (c as f32 - cx).powi(2);
            *v += peak * (-d2 / (2.0 * sigma * sigma)).exp();
        });
    }

    #[test]
    fn test_flags_single_pixel_hit() {
        let mut image = sky(40, 100.0, 5.0, 7);
        image[[20, 20]] += 2000.0;

        let result = LACosmic::default().detect(&image).unwrap();
        assert!(result.mask[[20, 20]]);
        assert_eq!(result.flagged_count(), 1);
        assert_relative_eq!(result.cleaned[[20, 20]], 100.0, epsilon = 10.0);
        assert_eq!(result.cleaned[[5, 5]], image[[5, 5]]);
    }

    #[test]
    fn test_star_is_not_flagged() {
        let mut image = sky(40, 100.0, 5.0, 11);
        add_star(&mut image, (20.0, 20.0), 3000.0, 2.0);

        let result = LACosmic::default().detect(&image).unwrap();
        assert_eq!(result.flagged_count(), 0);
        assert_eq!(result.cleaned, image);
    }

    #[test]
    fn test_star_and_hit_together() {
        let mut image = sky(48, 100.0, 5.0, 3);
        add_star(&mut image, (12.0, 12.0), 3000.0, 2.0);
        image[[35, 30]] += 1500.0;

        let result = LACosmic::default().detect(&image).unwrap();
        assert!(result.mask[[35, 30]]);
        for r in 6..19 {
            for c in 6..19 {
                assert!(!result.mask[[r, c]], "star pixel ({r}, {c}) flagged");
            }
        }
    }

    #[test]
    fn test_saturated_pixels_are_not_flagged() {
        let mut image = sky(30, 100.0, 5.0, 5);
        image[[15, 15]] = 70000.0;

        let result = LACosmic::default().detect(&image).unwrap();
        assert!(!result.mask[[15, 15]]);
        assert_eq!(result.cleaned[[15, 15]], 70000.0);
    }

    #[test]
    fn test_non_finite_pixels_pass_through() {
        let mut image = sky(30, 100.0, 5.0, 9);
        image[[3, 4]] = f32::NAN;
        image[[10, 10]] = f32::INFINITY;
        image[[20, 20]] += 2000.0;

        let result = LACosmic::default().detect(&image).unwrap();
        assert!(result.cleaned[[3, 4]].is_nan());
        assert_eq!(result.cleaned[[10, 10]], f32::INFINITY);
        assert!(!result.mask[[3, 4]]);
        assert!(!result.mask[[10, 10]]);
        assert!(result.mask[[20, 20]]);
    }

    #[test]
    fn test_gain_round_trips_to_adu() {
        let mut image = sky(40, 50.0, 3.0, 21);
        image[[18, 22]] += 1000.0;
        let detector = LACosmic::new(LACosmicConfig {
            gain: 2.0,
            ..LACosmicConfig::default()
        });

        let result = detector.detect(&image).unwrap();
        assert!(result.mask[[18, 22]]);
        assert_relative_eq!(result.cleaned[[18, 22]], 50.0, epsilon = 6.0);
    }

    #[test]
    fn test_rejects_degenerate_images() {
        let detector = LACosmic::default();
        assert_eq!(
            detector.detect(&Image::zeros((0, 5))).unwrap_err(),
            DetectionError::EmptyImage
        );
        assert_eq!(
            detector.detect(&Image::zeros((2, 8))).unwrap_err(),
            DetectionError::TooSmall {
                height: 2,
                width: 8
            }
        );
        assert_eq!(
            detector
                .detect(&Image::from_elem((4, 4), f32::NAN))
                .unwrap_err(),
            DetectionError::NoFinitePixels
        );
    }

    #[test]
    fn test_invalid_config_fails_detection() {
        let detector = LACosmic::new(LACosmicConfig {
            niter: 0,
            ..LACosmicConfig::default()
        });
        assert!(matches!(
            detector.detect(&Image::zeros((8, 8))),
            Err(DetectionError::InvalidConfig(_))
        ));
    }
}
