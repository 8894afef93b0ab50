//! Fine-structure image for telling hits apart from compact stars.
//!
//! A 3x3 median keeps the core of anything the PSF has smoothed; subtracting a 7x7
//! median of that leaves the small-scale structure. Stars keep a large fine
//! structure relative to their Laplacian, hits do not.

use ndarray::{Array2, ArrayView2, Zip};

use super::filters::median_filter;

/// Floor applied to the fine structure so it can be divided by.
pub const MIN_FINE_STRUCTURE: f32 = 0.01;

/// `max(med3 - med7(med3), MIN_FINE_STRUCTURE)`
pub fn compute_fine_structure(image: ArrayView2<f32>) -> Array2<f32> {
    let med3 = median_filter(image, 3);
    let med37 = median_filter(med3.view(), 7);
    Zip::from(&med3)
        .and(&med37)
        .map_collect(|&a, &b| (a - b).max(MIN_FINE_STRUCTURE))
}
