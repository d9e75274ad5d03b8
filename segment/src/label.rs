//! Instance labeling: watershed assignment, bounded label expansion and
//! splitting of oversized connected components.

use itertools::Itertools;
use log::debug;
use morphology::KernelShape;
use ndarray::{Array2, ArrayView2, Zip};
use std::collections::BTreeMap;

/// Watershed seed specification.
#[derive(Clone, Debug)]
pub enum Markers {
    /// Boolean seed mask; converted to uniquely labeled seeds via
    /// connected components.
    Mask(Array2<bool>),
    /// Pre-labeled seeds, used as-is.
    Labels(Array2<u32>),
}

/// Assign individual instances by flooding the Gaussian-blurred intensity
/// (kernel size `k`) from the markers, restricted to `mask`.
pub fn watershed(
    x: ArrayView2<'_, f64>,
    mask: ArrayView2<'_, bool>,
    markers: &Markers,
    k: usize,
) -> Array2<u32> {
    let blurred = morphology::gaussian_blur(x, k);
    let seeds = match markers {
        Markers::Mask(seed_mask) => morphology::connected_components(seed_mask.view()),
        Markers::Labels(labels) => labels.clone(),
    };
    let inverted = blurred.mapv(|v| -v);
    morphology::watershed(inverted.view(), seeds.view(), mask)
}

/// Pixel count per label; index 0 counts background.
fn label_areas(labels: &Array2<u32>) -> Vec<usize> {
    let top = labels.iter().copied().max().unwrap_or(0) as usize;
    let mut areas = vec![0usize; top + 1];
    for &label in labels {
        areas[label as usize] += 1;
    }
    areas
}

/// Grow labels outward by `distance` one-pixel steps.
///
/// A label whose area reaches `max_area` is frozen: its pixels are pulled
/// out before the remaining growth rounds and restored verbatim at the
/// end, so oversized instances cannot swallow their neighbors. When `mask`
/// is given, growth is confined to it.
pub fn expand_labels(
    labels: ArrayView2<'_, u32>,
    distance: usize,
    max_area: usize,
    mask: Option<ArrayView2<'_, bool>>,
) -> Array2<u32> {
    let mut expanded = labels.to_owned();
    let mut frozen: BTreeMap<u32, Vec<(usize, usize)>> = BTreeMap::new();
    for _ in 0..distance {
        let areas = label_areas(&expanded);
        for (label, &area) in areas.iter().enumerate().skip(1) {
            if area >= max_area {
                let label = label as u32;
                let pixels: Vec<_> = expanded
                    .indexed_iter()
                    .filter(|&(_, &l)| l == label)
                    .map(|(index, _)| index)
                    .collect();
                for &index in &pixels {
                    expanded[index] = 0;
                }
                frozen.insert(label, pixels);
            }
        }
        expanded = morphology::expand_labels(expanded.view(), 1);
        if let Some(mask) = mask {
            Zip::from(&mut expanded).and(mask).for_each(|label, &keep| {
                if !keep {
                    *label = 0;
                }
            });
        }
    }
    for (label, pixels) in frozen {
        for index in pixels {
            expanded[index] = label;
        }
    }
    expanded
}

/// Erode a mask while protecting small fragments.
///
/// Connected components under `min_area` are set aside before each erosion
/// round and restored at the end. `n_iter` bounds the number of rounds;
/// `-1` keeps eroding until nothing at or above `min_area` remains, which
/// terminates because erosion strictly shrinks a bounded mask.
pub fn safe_erode(
    mask: ArrayView2<'_, bool>,
    k: usize,
    square: bool,
    min_area: usize,
    n_iter: i32,
) -> Array2<bool> {
    let shape = if square {
        KernelShape::Square
    } else {
        KernelShape::Circle
    };
    let element = morphology::kernel(k, shape);
    let mut eroded = mask.to_owned();
    let mut saved = Array2::from_elem(mask.dim(), false);
    let mut rounds = 0;
    loop {
        let stats = morphology::connected_components_with_areas(eroded.view());
        for (index, &label) in stats.labels.indexed_iter() {
            if label > 0 && stats.areas[label as usize] < min_area {
                saved[index] = true;
                eroded[index] = false;
            }
        }
        let done = if n_iter < 0 {
            eroded.iter().all(|&v| !v)
        } else {
            rounds >= n_iter
        };
        if done {
            break;
        }
        eroded = morphology::erode(eroded.view(), element.view());
        rounds += 1;
    }
    Zip::from(&saved)
        .and(&eroded)
        .map_collect(|&kept, &left| kept || left)
}

/// Options for [`label_connected_components`].
#[derive(Clone, Copy, Debug)]
pub struct SplitOptions {
    /// Erosion kernel size.
    pub k: usize,
    /// Fragments under this area are protected from erosion.
    pub min_area: usize,
    /// Erosion rounds; `-1` erodes until every fragment is under
    /// `min_area`.
    pub n_iter: i32,
    /// Distance to expand the eroded cores back out.
    pub distance: usize,
    /// Components over this area get split.
    pub max_area: usize,
}

impl Default for SplitOptions {
    fn default() -> Self {
        SplitOptions {
            k: 3,
            min_area: 100,
            n_iter: -1,
            distance: 5,
            max_area: 400,
        }
    }
}

/// Label the connected components of `mask`, splitting every component
/// whose area exceeds `max_area`.
///
/// Oversized components are peeled off, eroded down to separated cores,
/// relabeled and expanded back within their original footprint. The new
/// labels are then reconciled against the untouched ones: the first split
/// cores take over the ids of the components they replace, the rest take
/// sequential ids past the maximum pre-existing label, so no id ever
/// refers to two instances.
pub fn label_connected_components(mask: ArrayView2<'_, bool>, opts: &SplitOptions) -> Array2<u32> {
    let stats = morphology::connected_components_with_areas(mask);
    let oversized: Vec<u32> = stats
        .areas
        .iter()
        .enumerate()
        .skip(1)
        .filter(|&(_, &area)| area > opts.max_area)
        .map(|(label, _)| label as u32)
        .collect();
    if oversized.is_empty() {
        return stats.labels;
    }
    debug!("splitting {} oversized components", oversized.len());
    let max_label = (stats.areas.len() - 1) as u32;

    let subset = stats
        .labels
        .mapv(|label| label > 0 && oversized.binary_search(&label).is_ok());
    let eroded = safe_erode(subset.view(), opts.k, false, opts.min_area, opts.n_iter);
    let cores = morphology::connected_components(eroded.view());
    let expanded = expand_labels(cores.view(), opts.distance, opts.max_area, Some(subset.view()));

    let mut fixed = expanded.clone();
    let n_oversized = oversized.len() as u32;
    for label in expanded.iter().copied().filter(|&l| l > 0).sorted().dedup() {
        let replacement = if label <= n_oversized {
            oversized[(label - 1) as usize]
        } else {
            max_label + label - n_oversized
        };
        if replacement != label {
            for (index, &l) in expanded.indexed_iter() {
                if l == label {
                    fixed[index] = replacement;
                }
            }
        }
    }
    for (index, &inside) in subset.indexed_iter() {
        if !inside {
            fixed[index] = stats.labels[index];
        }
    }
    fixed
}
