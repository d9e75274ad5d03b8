//! Marker-seeded watershed flooding.

use ndarray::{Array2, ArrayView2};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

const NEIGHBORS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Flood `image` from the marker seeds, assigning each masked pixel the
/// label of the basin that reaches it first.
///
/// Flooding proceeds in ascending image value with insertion order breaking
/// ties, visiting 4-neighbors only. Pixels outside `mask` (and markers
/// placed outside it) are ignored and stay 0.
pub fn watershed(
    image: ArrayView2<'_, f64>,
    markers: ArrayView2<'_, u32>,
    mask: ArrayView2<'_, bool>,
) -> Array2<u32> {
    assert_eq!(image.dim(), markers.dim(), "markers shape must match image");
    assert_eq!(image.dim(), mask.dim(), "mask shape must match image");
    let (nrows, ncols) = image.dim();

    let mut labels = Array2::<u32>::zeros((nrows, ncols));
    let mut heap = BinaryHeap::new();
    let mut tick = 0u64;

    for ((r, c), &label) in markers.indexed_iter() {
        if label > 0 && mask[[r, c]] {
            labels[[r, c]] = label;
            heap.push(Reverse((OrderedFloat(image[[r, c]]), tick, r, c)));
            tick += 1;
        }
    }

    while let Some(Reverse((_, _, r, c))) = heap.pop() {
        let label = labels[[r, c]];
        for &(dr, dc) in &NEIGHBORS {
            let (nr, nc) = (r as isize + dr, c as isize + dc);
            if nr < 0 || nr >= nrows as isize || nc < 0 || nc >= ncols as isize {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            if mask[[nr, nc]] && labels[[nr, nc]] == 0 {
                labels[[nr, nc]] = label;
                heap.push(Reverse((OrderedFloat(image[[nr, nc]]), tick, nr, nc)));
                tick += 1;
            }
        }
    }
    labels
}
