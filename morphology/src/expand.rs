//! Outward growth of label images.

use ndarray::{Array2, ArrayView2};

const NEIGHBORS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Grow every nonzero label outward by `distance` one-pixel steps.
///
/// On each step an unlabeled pixel adopts the smallest positive label among
/// its 4-neighbors; labeled pixels never change, so existing instances are
/// preserved exactly.
pub fn expand_labels(labels: ArrayView2<'_, u32>, distance: usize) -> Array2<u32> {
    let (nrows, ncols) = labels.dim();
    let mut current = labels.to_owned();
    for _ in 0..distance {
        let previous = current.clone();
        for ((r, c), out) in current.indexed_iter_mut() {
            if *out != 0 {
                continue;
            }
            let mut best = 0u32;
            for &(dr, dc) in &NEIGHBORS {
                let (nr, nc) = (r as isize + dr, c as isize + dc);
                if nr < 0 || nr >= nrows as isize || nc < 0 || nc >= ncols as isize {
                    continue;
                }
                let neighbor = previous[[nr as usize, nc as usize]];
                if neighbor > 0 && (best == 0 || neighbor < best) {
                    best = neighbor;
                }
            }
            *out = best;
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_step_growth() {
        let mut labels = Array2::<u32>::zeros((5, 5));
        labels[[2, 2]] = 7;
        let expanded = expand_labels(labels.view(), 1);
        assert_eq!(expanded[[2, 2]], 7);
        assert_eq!(expanded[[1, 2]], 7);
        assert_eq!(expanded[[2, 1]], 7);
        // Diagonals are farther than one step.
        assert_eq!(expanded[[1, 1]], 0);
    }

    #[test]
    fn test_competing_labels_keep_their_ground() {
        let mut labels = Array2::<u32>::zeros((1, 5));
        labels[[0, 0]] = 2;
        labels[[0, 4]] = 1;
        let expanded = expand_labels(labels.view(), 2);
        assert_eq!(expanded[[0, 0]], 2);
        assert_eq!(expanded[[0, 1]], 2);
        // The middle pixel is reached by both; the smaller label wins.
        assert_eq!(expanded[[0, 2]], 1);
        assert_eq!(expanded[[0, 3]], 1);
        assert_eq!(expanded[[0, 4]], 1);
    }
}
