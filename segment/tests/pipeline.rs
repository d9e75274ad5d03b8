//! End-to-end run of the segmentation core: fit a mixture on a synthetic
//! count grid, score it, threshold into a mask and carve out instances.

use anyhow::Result;
use ndarray::Array2;
use segment::em::MixtureFit;
use segment::label::{label_connected_components, watershed, Markers, SplitOptions};
use segment::sample::{fit_mixture, EmConfig};
use segment::score::confidence;

const SIZE: usize = 28;
const CELL_CENTERS: [(usize, usize); 2] = [(8, 8), (19, 19)];

/// Deterministic grid: sparse background counts 0..=8 with two bright
/// disks (radius 3, counts 45..=64) standing in for cells.
fn synthetic_counts() -> Array2<u32> {
    let mut x = Array2::from_shape_fn((SIZE, SIZE), |(r, c)| ((r * 5 + c * 3) % 9) as u32);
    for (center_r, center_c) in CELL_CENTERS {
        for ((r, c), v) in x.indexed_iter_mut() {
            let dr = r as isize - center_r as isize;
            let dc = c as isize - center_c as isize;
            if dr * dr + dc * dc <= 9 {
                *v = 45 + ((r * 7 + c * 5) % 20) as u32;
            }
        }
    }
    x
}

#[test]
fn test_counts_to_labels() -> Result<()> {
    let x = synthetic_counts();

    let config = EmConfig {
        mu: [4.0, 50.0],
        var: [8.0, 150.0],
        seed: Some(42),
        ..EmConfig::default()
    };
    let fit = fit_mixture(x.view(), None, &config)?;
    let MixtureFit::Global(params) = &fit else {
        panic!("expected a global fit");
    };
    assert!((params.w[0] + params.w[1] - 1.0).abs() < 1e-9);
    let [background_mu, cell_mu] = params.means();
    assert!(background_mu < 10.0, "background mean {background_mu}");
    assert!(cell_mu > 40.0, "cell mean {cell_mu}");

    let scores = confidence(x.view(), &fit, None)?;
    for &score in &scores {
        assert!((0.0..=1.0).contains(&score));
    }
    // The fitted mixture separates the two populations at 0.5.
    let mask = scores.mapv(|score| score > 0.5);
    for (index, &count) in x.indexed_iter() {
        assert_eq!(mask[index], count >= 45, "pixel {index:?}");
    }

    // Seed one marker per cell and flood the mask.
    let mut seeds = Array2::from_elem((SIZE, SIZE), false);
    for (r, c) in CELL_CENTERS {
        seeds[[r, c]] = true;
    }
    let intensity = x.mapv(f64::from);
    let labels = watershed(intensity.view(), mask.view(), &Markers::Mask(seeds), 3);

    // Every masked pixel belongs to one of the two instances and the two
    // centers ended up in different ones.
    for (index, &inside) in mask.indexed_iter() {
        assert_eq!(labels[index] > 0, inside);
    }
    let first = labels[[CELL_CENTERS[0].0, CELL_CENTERS[0].1]];
    let second = labels[[CELL_CENTERS[1].0, CELL_CENTERS[1].1]];
    assert!(first > 0 && second > 0 && first != second);

    // Plain component labeling agrees on this mask: two small instances,
    // nothing to split.
    let component_labels = label_connected_components(mask.view(), &SplitOptions::default());
    let distinct: std::collections::BTreeSet<u32> =
        component_labels.iter().copied().filter(|&l| l > 0).collect();
    assert_eq!(distinct.len(), 2);

    // Growing the instances outward preserves every original assignment.
    let expanded = segment::label::expand_labels(labels.view(), 2, 10_000, Some(mask.view()));
    for (index, &label) in labels.indexed_iter() {
        if label > 0 {
            assert_eq!(expanded[index], label);
        }
    }
    Ok(())
}
