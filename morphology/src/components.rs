//! Connected-component labeling of binary masks.

use itertools::iproduct;
use ndarray::{Array2, ArrayView2};
use std::collections::VecDeque;

/// Connected-component labels plus the pixel count of every label.
pub struct ComponentStats {
    /// Label image; 0 is background, components are numbered from 1 in
    /// row-major discovery order.
    pub labels: Array2<u32>,
    /// Pixel count per label, indexed by label; index 0 counts background
    /// pixels.
    pub areas: Vec<usize>,
}

/// Label the 8-connected components of `mask`. Components are numbered
/// from 1 in the order their first pixel appears in a row-major scan;
/// background pixels stay 0.
pub fn connected_components(mask: ArrayView2<'_, bool>) -> Array2<u32> {
    connected_components_with_areas(mask).labels
}

/// Label the 8-connected components of `mask` and report per-label areas.
pub fn connected_components_with_areas(mask: ArrayView2<'_, bool>) -> ComponentStats {
    let (nrows, ncols) = mask.dim();
    let mut labels = Array2::<u32>::zeros((nrows, ncols));
    let mut areas = vec![mask.iter().filter(|&&v| !v).count()];
    let mut queue = VecDeque::new();

    for (r, c) in iproduct!(0..nrows, 0..ncols) {
        if !mask[[r, c]] || labels[[r, c]] != 0 {
            continue;
        }
        let label = areas.len() as u32;
        let mut area = 0usize;
        labels[[r, c]] = label;
        queue.push_back((r, c));
        while let Some((qr, qc)) = queue.pop_front() {
            area += 1;
            for (dr, dc) in iproduct!(-1..=1isize, -1..=1isize) {
                let (nr, nc) = (qr as isize + dr, qc as isize + dc);
                if nr < 0 || nr >= nrows as isize || nc < 0 || nc >= ncols as isize {
                    continue;
                }
                let (nr, nc) = (nr as usize, nc as usize);
                if mask[[nr, nc]] && labels[[nr, nc]] == 0 {
                    labels[[nr, nc]] = label;
                    queue.push_back((nr, nc));
                }
            }
        }
        areas.push(area);
    }
    ComponentStats { labels, areas }
}
