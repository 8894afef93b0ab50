//! Neighbourhood filters for the Laplacian cosmic-ray detector.
//!
//! Median filters replicate edge pixels. Binary dilation and masked cleaning treat
//! pixels outside the image as absent.

use ndarray::{Array2, ArrayView2, Zip};

/// Largest supported median window.
pub const MAX_MEDIAN_SIZE: usize = 7;

pub(super) fn clamp(index: isize, len: usize) -> usize {
    index.clamp(0, len as isize - 1) as usize
}

/// Median of a non-empty slice, reordering it. Even lengths give the upper middle value.
pub fn median_in_place(values: &mut [f32]) -> f32 {
    let mid = values.len() / 2;
    *values.select_nth_unstable_by(mid, f32::total_cmp).1
}

/// Median over a `size`x`size` window centred on each pixel.
///
/// # Panics
/// If `size` is even or larger than [`MAX_MEDIAN_SIZE`].
pub fn median_filter(image: ArrayView2<f32>, size: usize) -> Array2<f32> {
    assert!(
        size % 2 == 1 && size <= MAX_MEDIAN_SIZE,
        "median window must be odd and at most {MAX_MEDIAN_SIZE}, got {size}"
    );
    let (height, width) = image.dim();
    let half = (size / 2) as isize;

    let mut filtered = Array2::zeros((height, width));
    Zip::indexed(&mut filtered).par_for_each(|(row, col), value| {
        let mut window = [0.0f32; MAX_MEDIAN_SIZE * MAX_MEDIAN_SIZE];
        let mut n = 0;
        for dr in -half..=half {
            let r = clamp(row as isize + dr, height);
            for dc in -half..=half {
                window[n] = image[[r, clamp(col as isize + dc, width)]];
                n += 1;
            }
        }
        *value = median_in_place(&mut window[..n]);
    });
    filtered
}

/// 3x3 binary dilation.
pub fn dilate3(mask: &Array2<bool>) -> Array2<bool> {
    let (height, width) = mask.dim();
    Array2::from_shape_fn((height, width), |(row, col)| {
        (row.saturating_sub(1)..(row + 2).min(height)).any(|r| {
            (col.saturating_sub(1)..(col + 2).min(width)).any(|c| mask[[r, c]])
        })
    })
}

/// Replace each flagged pixel by the mean of the unflagged pixels in its 5x5
/// neighbourhood, or by `fallback` when every neighbour is flagged.
pub fn clean_masked(
    image: ArrayView2<f32>,
    mask: &Array2<bool>,
    fallback: ArrayView2<f32>,
) -> Array2<f32> {
    let (height, width) = image.dim();
    let mut cleaned = image.to_owned();
    Zip::indexed(&mut cleaned)
        .and(mask)
        .and(fallback)
        .par_for_each(|(row, col), value, &flagged, &fallback| {
            if !flagged {
                return;
            }
            let mut sum = 0.0f64;
            let mut count = 0usize;
            for r in row.saturating_sub(2)..(row + 3).min(height) {
                for c in col.saturating_sub(2)..(col + 3).min(width) {
                    if !mask[[r, c]] {
                        sum += image[[r, c]] as f64;
                        count += 1;
                    }
                }
            }
            *value = if count > 0 {
                (sum / count as f64) as f32
            } else {
                fallback
            };
        });
    cleaned
}
