//! Soft isophote images.
//!
//! A scalar field is turned into a stack of `n` soft indicator images, one per
//! evenly spaced reference level. Each pixel contributes to every level with a
//! weight that decays with its distance to the level: a Gaussian for linear
//! quantities, a Von Mises (circular normal) function for periodic ones such as
//! orientations.

use std::f32::consts::PI;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array3, ArrayView2, Axis, Zip};

use crate::error::{Error, Result};

/// Smoothing function used to spread a value over neighbouring levels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum IsophoteKind {
    #[default]
    Gaussian,
    /// Treats the field as circular with period `limits.1 - limits.0`.
    VonMises,
}

impl FromStr for IsophoteKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gaussian" => Ok(IsophoteKind::Gaussian),
            "von_mises" => Ok(IsophoteKind::VonMises),
            other => Err(Error::invalid(format!(
                "unknown isophote smoothing function '{other}'"
            ))),
        }
    }
}

impl fmt::Display for IsophoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IsophoteKind::Gaussian => "gaussian",
            IsophoteKind::VonMises => "von_mises",
        })
    }
}

/// Computes `n_bins` soft isophote images of `field` with levels evenly spaced in
/// `limits`, returned as an `(n_bins, height, width)` array.
///
/// Level `i` sits at the center of the `i`-th of `n_bins` equal sub-intervals of
/// `limits`. With [`IsophoteKind::Gaussian`] the response is
/// `exp(-(x - c_i)^2 / (2 scale^2))`. With [`IsophoteKind::VonMises`] the field is
/// mapped linearly onto `[-pi, pi)` and the response is
/// `exp(kappa (cos(x - c_i) - 1))` with `kappa = 1 / scale^2`, peaking at 1 on the
/// level like the Gaussian. Both kinds stay within `[0, 1]` for any scale.
///
/// `field` is only read.
pub fn isophotes(
    field: &ArrayView2<f32>,
    n_bins: usize,
    limits: (f32, f32),
    scale: f32,
    kind: IsophoteKind,
) -> Result<Array3<f32>> {
    if n_bins == 0 {
        return Err(Error::invalid("isophotes need at least one bin"));
    }
    let (lo, hi) = limits;
    let span = hi - lo;
    if !(span > 0.0) {
        return Err(Error::invalid(format!(
            "isophote limits must be increasing, got ({lo}, {hi})"
        )));
    }
    if !(scale > 0.0) {
        return Err(Error::invalid(format!(
            "isophote smoothing scale must be positive, got {scale}"
        )));
    }

    let (height, width) = field.dim();
    let mut iso = Array3::zeros((n_bins, height, width));
    match kind {
        IsophoteKind::Gaussian => {
            let step = span / n_bins as f32;
            let denom = 2.0 * scale * scale;
            for (i, mut level) in iso.axis_iter_mut(Axis(0)).enumerate() {
                let center = lo + step * (i as f32 + 0.5);
                Zip::from(&mut level).and(field).for_each(|out, &x| {
                    let d = x - center;
                    *out = (-d * d / denom).exp();
                });
            }
        }
        IsophoteKind::VonMises => {
            let to_circle = 2.0 * PI / span;
            let angles = field.mapv(|x| (x - lo) * to_circle - PI);
            let step = 2.0 * PI / n_bins as f32;
            let kappa = 1.0 / (scale * scale);
            for (i, mut level) in iso.axis_iter_mut(Axis(0)).enumerate() {
                let center = -PI + step * (i as f32 + 0.5);
                Zip::from(&mut level).and(&angles).for_each(|out, &x| {
                    *out = (kappa * ((x - center).cos() - 1.0)).exp();
                });
            }
        }
    }
    Ok(iso)
}
