//! Separable Gaussian smoothing.

use ndarray::{Array1, Array2, ArrayView2};

/// Normalized 1-D Gaussian taps for an odd kernel size, with sigma derived
/// from the size: `0.3 * ((k - 1) / 2 - 1) + 0.8`.
fn gaussian_taps(k: usize) -> Array1<f64> {
    assert!(k % 2 == 1, "blur kernel size must be odd, got {k}");
    let sigma = 0.3 * ((k as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (k / 2) as isize;
    let mut taps = Array1::from_shape_fn(k, |i| {
        let d = (i as isize - center) as f64;
        (-(d * d) / (2.0 * sigma * sigma)).exp()
    });
    let sum = taps.sum();
    taps.mapv_inplace(|v| v / sum);
    taps
}

/// Mirror an out-of-range index back into `0..len` without repeating the
/// edge sample.
fn reflect(index: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    let mut i = index;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * (len - 1) - i;
        } else {
            return i as usize;
        }
    }
}

/// Blur `image` with a `k x k` Gaussian kernel, reflecting at the borders.
pub fn gaussian_blur(image: ArrayView2<'_, f64>, k: usize) -> Array2<f64> {
    let taps = gaussian_taps(k);
    let center = (k / 2) as isize;
    let (nrows, ncols) = image.dim();

    let mut rows_pass = Array2::zeros((nrows, ncols));
    for ((r, c), out) in rows_pass.indexed_iter_mut() {
        let mut acc = 0.0;
        for (t, &weight) in taps.indexed_iter() {
            let src = reflect(c as isize + t as isize - center, ncols);
            acc += weight * image[[r, src]];
        }
        *out = acc;
    }

    let mut cols_pass = Array2::zeros((nrows, ncols));
    for ((r, c), out) in cols_pass.indexed_iter_mut() {
        let mut acc = 0.0;
        for (t, &weight) in taps.indexed_iter() {
            let src = reflect(r as isize + t as isize - center, nrows);
            acc += weight * rows_pass[[src, c]];
        }
        *out = acc;
    }
    cols_pass
}
