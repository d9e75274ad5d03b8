//! Local-maximum detection.

use itertools::iproduct;
use ndarray::{Array2, ArrayView2};

/// Mark local maxima of `image`.
///
/// A pixel is a peak when it is strictly positive and no pixel within its
/// `(2 * min_distance + 1)` square window exceeds it. When `labels` is
/// given, only nonzero-labeled pixels are candidates and comparisons stay
/// within the pixel's own label region. Plateau pixels all qualify;
/// callers collapse connected runs of peaks as needed.
pub fn peak_local_max(
    image: ArrayView2<'_, f64>,
    min_distance: usize,
    labels: Option<ArrayView2<'_, u32>>,
) -> Array2<bool> {
    if let Some(labels) = labels {
        assert_eq!(image.dim(), labels.dim(), "labels shape must match image");
    }
    let (nrows, ncols) = image.dim();
    let d = min_distance as isize;
    Array2::from_shape_fn((nrows, ncols), |(r, c)| {
        let value = image[[r, c]];
        if value <= 0.0 {
            return false;
        }
        let region = labels.map_or(u32::MAX, |l| l[[r, c]]);
        if region == 0 {
            return false;
        }
        for (dr, dc) in iproduct!(-d..=d, -d..=d) {
            if dr == 0 && dc == 0 {
                continue;
            }
            let (nr, nc) = (r as isize + dr, c as isize + dc);
            if nr < 0 || nr >= nrows as isize || nc < 0 || nc >= ncols as isize {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            if let Some(l) = labels {
                if l[[nr, nc]] != region {
                    continue;
                }
            }
            if image[[nr, nc]] > value {
                return false;
            }
        }
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isolated_maxima() {
        let mut image = Array2::zeros((7, 7));
        image[[1, 1]] = 5.0;
        image[[5, 5]] = 3.0;
        let peaks = peak_local_max(image.view(), 2, None);
        assert!(peaks[[1, 1]]);
        assert!(peaks[[5, 5]]);
        assert_eq!(peaks.iter().filter(|&&v| v).count(), 2);
    }

    #[test]
    fn test_lesser_maximum_suppressed_within_window() {
        let mut image = Array2::zeros((5, 5));
        image[[2, 1]] = 5.0;
        image[[2, 3]] = 4.0;
        let peaks = peak_local_max(image.view(), 2, None);
        assert!(peaks[[2, 1]]);
        assert!(!peaks[[2, 3]]);
    }

    #[test]
    fn test_labels_partition_the_search() {
        let mut image = Array2::zeros((1, 5));
        image[[0, 1]] = 5.0;
        image[[0, 3]] = 4.0;
        let mut labels = Array2::<u32>::zeros((1, 5));
        labels[[0, 0]] = 1;
        labels[[0, 1]] = 1;
        labels[[0, 2]] = 2;
        labels[[0, 3]] = 2;
        let peaks = peak_local_max(image.view(), 2, Some(labels.view()));
        // The lesser maximum survives because it leads its own region.
        assert!(peaks[[0, 1]]);
        assert!(peaks[[0, 3]]);
    }
}
