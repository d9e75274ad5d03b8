//! Structuring elements and binary erosion/dilation.

use ndarray::{Array2, ArrayView2};

/// Shape of a structuring element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KernelShape {
    /// Disc inscribed in the `k x k` bounding box.
    Circle,
    /// Full `k x k` square.
    Square,
}

/// Build a `k x k` structuring element. `k` must be odd so the element has
/// a center pixel.
pub fn kernel(k: usize, shape: KernelShape) -> Array2<bool> {
    assert!(k % 2 == 1, "structuring element size must be odd, got {k}");
    match shape {
        KernelShape::Square => Array2::from_elem((k, k), true),
        KernelShape::Circle => {
            let radius = (k / 2) as f64;
            Array2::from_shape_fn((k, k), |(i, j)| {
                let di = i as f64 - radius;
                let dj = j as f64 - radius;
                (di * di + dj * dj).sqrt() <= radius
            })
        }
    }
}

/// Offsets of the active structuring-element pixels relative to its center.
fn offsets(element: ArrayView2<'_, bool>) -> Vec<(isize, isize)> {
    let (kr, kc) = element.dim();
    let (cr, cc) = ((kr / 2) as isize, (kc / 2) as isize);
    element
        .indexed_iter()
        .filter(|&(_, &on)| on)
        .map(|((i, j), _)| (i as isize - cr, j as isize - cc))
        .collect()
}

/// Binary erosion: a pixel survives only when every pixel under the
/// structuring element is foreground. Pixels outside the image count as
/// background, so a nonempty mask strictly shrinks.
pub fn erode(mask: ArrayView2<'_, bool>, element: ArrayView2<'_, bool>) -> Array2<bool> {
    let (nrows, ncols) = mask.dim();
    let offs = offsets(element);
    Array2::from_shape_fn((nrows, ncols), |(r, c)| {
        offs.iter().all(|&(dr, dc)| {
            let (nr, nc) = (r as isize + dr, c as isize + dc);
            nr >= 0
                && nr < nrows as isize
                && nc >= 0
                && nc < ncols as isize
                && mask[[nr as usize, nc as usize]]
        })
    })
}

/// Binary dilation: a pixel turns on when any pixel under the structuring
/// element is foreground.
pub fn dilate(mask: ArrayView2<'_, bool>, element: ArrayView2<'_, bool>) -> Array2<bool> {
    let (nrows, ncols) = mask.dim();
    let offs = offsets(element);
    Array2::from_shape_fn((nrows, ncols), |(r, c)| {
        offs.iter().any(|&(dr, dc)| {
            let (nr, nc) = (r as isize + dr, c as isize + dc);
            nr >= 0
                && nr < nrows as isize
                && nc >= 0
                && nc < ncols as isize
                && mask[[nr as usize, nc as usize]]
        })
    })
}
