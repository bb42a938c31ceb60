//! Spatial weight masks and reference orientation fields for the histogram builders.
//!
//! Pixel coordinates are centered: row `i` of an image of height `h` sits at
//! `y = -h/2 + i * h / (h - 1)`, so the first and last rows are at `-h/2` and `h/2`,
//! and likewise for columns.

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};
use crate::EPSILON;

/// Added to the radius of the log-normal ring so the center pixel stays finite.
const LOGNORMAL_RADIUS_OFFSET: f32 = 1e-5;

/// Radial profile of a [`donut`] mask.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Distribution {
    /// `exp(-(r - radius)^2 / (2 width^2))`
    #[default]
    Gaussian,
    /// Log-normal density in `r` with mean `radius` and standard deviation `width`.
    Lognormal,
}

impl FromStr for Distribution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gaussian" => Ok(Distribution::Gaussian),
            "lognormal" => Ok(Distribution::Lognormal),
            other => Err(Error::invalid(format!(
                "unknown distribution function '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Distribution::Gaussian => "gaussian",
            Distribution::Lognormal => "lognormal",
        })
    }
}

fn centered_coords(n: usize) -> Array1<f32> {
    let half = n as f32 / 2.0;
    if n == 1 {
        return Array1::from_elem(1, -half);
    }
    Array1::linspace(-half, half, n)
}

fn check_shape((height, width): (usize, usize)) -> Result<()> {
    if height == 0 || width == 0 {
        return Err(Error::invalid(format!(
            "mask shape must be non-empty, got ({height}, {width})"
        )));
    }
    Ok(())
}

/// Ring-shaped weight mask of the given shape centered in the image, normalized to
/// unit sum.
///
/// A log-normal ring needs a positive radius; with `radius == 0` the Gaussian
/// profile is used instead.
pub fn donut(
    shape: (usize, usize),
    radius: f32,
    width: f32,
    distribution: Distribution,
) -> Result<Array2<f32>> {
    check_shape(shape)?;
    if !(width > 0.0) {
        return Err(Error::invalid(format!(
            "donut width must be positive, got {width}"
        )));
    }
    if radius < 0.0 || radius.is_nan() {
        return Err(Error::invalid(format!(
            "donut radius must not be negative, got {radius}"
        )));
    }
    let ys = centered_coords(shape.0);
    let xs = centered_coords(shape.1);
    let r = Array2::from_shape_fn(shape, |(i, j)| ys[i].hypot(xs[j]));

    let mut mask = match distribution {
        Distribution::Lognormal if radius > 0.0 => {
            let var = width * width;
            let mu = (radius * radius / (var + radius * radius).sqrt()).ln();
            let s = (var / (radius * radius) + 1.0).ln().sqrt();
            let norm = s * (2.0 * std::f32::consts::PI).sqrt();
            r.mapv(|r| {
                let d = r + LOGNORMAL_RADIUS_OFFSET;
                (-(d.ln() - mu).powi(2) / (2.0 * s * s)).exp() / (d * norm)
            })
        }
        _ => r.mapv(|r| (-(r - radius).powi(2) / (2.0 * width * width)).exp()),
    };
    let total = mask.sum();
    if !(total > 0.0) {
        return Err(Error::invalid(format!(
            "donut with radius {radius} and width {width} has no mass inside {shape:?}"
        )));
    }
    mask /= total;
    Ok(mask)
}

/// `n` concentric [`donut`] masks with radii evenly spaced in `[0, radius_max]` and
/// widths `width_min * width_ratio^i`.
pub fn donuts(
    shape: (usize, usize),
    n: usize,
    radius_max: f32,
    width_min: f32,
    width_ratio: f32,
    distribution: Distribution,
) -> Result<Vec<Array2<f32>>> {
    let radii = if n == 1 {
        Array1::zeros(1)
    } else {
        Array1::linspace(0.0, radius_max, n)
    };
    let widths = crate::geometric_scales(n, width_min, width_ratio);
    radii
        .iter()
        .zip(widths)
        .map(|(&radius, width)| donut(shape, radius, width, distribution))
        .collect()
}

/// Orientation of the vector from the image center to every pixel.
///
/// Signed orientations are `atan2(y, x)`; unsigned ones are `atan(y / (x + 1e-10))`,
/// matching the conventions of [`crate::gradient_orientation`]. Passed as the offset
/// field of the histogram builders this measures orientations relative to the radial
/// direction, which makes the histograms invariant to rotations about the center.
pub fn radial_offsets(shape: (usize, usize), signed: bool) -> Result<Array2<f32>> {
    check_shape(shape)?;
    let ys = centered_coords(shape.0);
    let xs = centered_coords(shape.1);
    Ok(Array2::from_shape_fn(shape, |(i, j)| {
        let (y, x) = (ys[i], xs[j]);
        if signed {
            y.atan2(x)
        } else {
            (y / (x + EPSILON)).atan()
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    fn argmax(a: &Array2<f32>) -> (usize, usize) {
        let (idx, _) = a
            .indexed_iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        idx
    }

    #[test]
    fn coordinates_span_the_image() {
        let c = centered_coords(5);
        assert_abs_diff_eq!(c[0], -2.5);
        assert_abs_diff_eq!(c[4], 2.5);
        assert_abs_diff_eq!(c[2], 0.0);
    }

    #[test]
    fn gaussian_disk_peaks_at_center() {
        let mask = donut((21, 21), 0.0, 3.0, Distribution::Gaussian).unwrap();
        assert_abs_diff_eq!(mask.sum(), 1.0, epsilon = 1e-5);
        assert_eq!(argmax(&mask), (10, 10));
        assert_abs_diff_eq!(mask[(3, 10)], mask[(17, 10)], epsilon = 1e-7);
        assert_abs_diff_eq!(mask[(10, 3)], mask[(3, 10)], epsilon = 1e-7);
    }

    #[test]
    fn ring_peaks_at_radius() {
        // Odd sizes put the center exactly on a pixel and give unit spacing for 41.
        let mask = donut((41, 41), 10.0, 1.5, Distribution::Gaussian).unwrap();
        let row = mask.row(20);
        let peak = (0..41).max_by(|&a, &b| row[a].total_cmp(&row[b])).unwrap();
        let distance = (peak as i32 - 20).abs();
        assert!((9..=11).contains(&distance), "peak at column {peak}");
        assert!(mask[(20, 20)] < row[peak] * 1e-3);
    }

    #[test]
    fn lognormal_ring() {
        let mask = donut((41, 41), 10.0, 3.0, Distribution::Lognormal).unwrap();
        assert_abs_diff_eq!(mask.sum(), 1.0, epsilon = 1e-5);
        assert!(mask.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(mask[(20, 30)] > mask[(20, 20)]);
        // Zero radius falls back to the Gaussian profile.
        let a = donut((15, 15), 0.0, 2.0, Distribution::Lognormal).unwrap();
        let b = donut((15, 15), 0.0, 2.0, Distribution::Gaussian).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn donut_series() {
        let masks = donuts((100, 100), 3, 30.0, 8.0, 1.2, Distribution::Gaussian).unwrap();
        assert_eq!(masks.len(), 3);
        for m in &masks {
            assert_eq!(m.dim(), (100, 100));
            assert_abs_diff_eq!(m.sum(), 1.0, epsilon = 1e-4);
        }
        // The first mask is a disk, the later ones are rings.
        assert!(masks[0][(50, 50)] > masks[2][(50, 50)]);
        assert_eq!(donuts((8, 8), 1, 5.0, 1.0, 2.0, Distribution::Gaussian).unwrap().len(), 1);
        assert!(donuts((8, 8), 0, 5.0, 1.0, 2.0, Distribution::Gaussian)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(donut((0, 4), 0.0, 1.0, Distribution::Gaussian).is_err());
        assert!(donut((4, 4), 0.0, 0.0, Distribution::Gaussian).is_err());
        assert!(donut((4, 4), -1.0, 1.0, Distribution::Gaussian).is_err());
        assert!("uniform".parse::<Distribution>().is_err());
        assert_eq!(
            "lognormal".parse::<Distribution>().unwrap(),
            Distribution::Lognormal
        );
        assert_eq!(Distribution::Gaussian.to_string(), "gaussian");
    }

    #[test]
    fn radial_directions() {
        let signed = radial_offsets((5, 5), true).unwrap();
        // Row index grows downwards, so the bottom center pixel has y > 0.
        assert_abs_diff_eq!(signed[(4, 2)], FRAC_PI_2, epsilon = 1e-6);
        assert_abs_diff_eq!(signed[(2, 4)], 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(signed[(2, 0)], PI, epsilon = 1e-6);
        assert_abs_diff_eq!(signed[(4, 4)], FRAC_PI_4, epsilon = 1e-6);

        let unsigned = radial_offsets((5, 5), false).unwrap();
        assert_abs_diff_eq!(unsigned[(0, 0)], FRAC_PI_4, epsilon = 1e-6);
        assert_abs_diff_eq!(unsigned[(4, 4)], FRAC_PI_4, epsilon = 1e-6);
        assert!(unsigned
            .iter()
            .all(|o| (-FRAC_PI_2..=FRAC_PI_2).contains(o)));
    }
}
