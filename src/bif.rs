//! Basic image features (BIF).
//!
//! Every pixel is classified into one of seven local structure types by comparing
//! responses computed from first and second order scale-normalized derivatives.
//! Labels from several scales are combined into a joint multi-scale histogram.

use std::f32::consts::FRAC_1_SQRT_2;

use itertools::izip;
use log::debug;
use ndarray::{s, Array1, Array2, Array3, ArrayView2, ArrayView3, Axis, Zip};

use crate::error::{Error, Result};
use crate::normalization::{normalize_inplace, Norm};
use crate::scalespace::{derivatives, multiscale_derivatives, DerivativeMode};

/// Structure types, in response channel order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum BifClass {
    /// Gradient strength `2 |grad L|`.
    Slope = 0,
    /// Laplacian `lambda`.
    DarkBlob = 1,
    /// `-lambda`.
    LightBlob = 2,
    /// `(gamma + lambda) / sqrt(2)`.
    DarkLine = 3,
    /// `(gamma - lambda) / sqrt(2)`.
    LightLine = 4,
    /// `gamma = sqrt((Lyy - Lxx)^2 + 4 Lxy^2)`.
    Saddle = 5,
    /// `eps * L`, only present when `eps > 0`.
    Flat = 6,
}

impl BifClass {
    pub const ALL: [BifClass; 7] = [
        BifClass::Slope,
        BifClass::DarkBlob,
        BifClass::LightBlob,
        BifClass::DarkLine,
        BifClass::LightLine,
        BifClass::Saddle,
        BifClass::Flat,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Display color as RGB in `[0, 1]`.
    pub fn color(self) -> [f32; 3] {
        match self {
            BifClass::Slope => [0.5, 0.5, 0.5],
            BifClass::DarkBlob => [0.0, 0.0, 0.0],
            BifClass::LightBlob => [1.0, 1.0, 1.0],
            BifClass::DarkLine => [0.0, 0.0, 1.0],
            BifClass::LightLine => [1.0, 1.0, 0.0],
            BifClass::Saddle => [0.0, 1.0, 0.0],
            BifClass::Flat => [1.0, 0.0, 0.0],
        }
    }
}

/// Number of response channels for a given flatness weight.
pub fn n_responses(eps: f32) -> usize {
    if eps > 0.0 {
        7
    } else {
        6
    }
}

/// BIF responses of `img` at scale `sigma` as an `(height, width, k)` array with
/// `k = 7` if `eps > 0` and `k = 6` otherwise. Channels follow [`BifClass`].
pub fn bif_response(
    img: &ArrayView2<f32>,
    sigma: f32,
    eps: f32,
    mode: DerivativeMode,
) -> Result<Array3<f32>> {
    let fields = derivatives(img, sigma, &response_orders(eps), mode)?;
    Ok(response_from_derivatives(&fields, eps))
}

/// `Ly, Lx, Lyy, Lxy, Lxx`, then `L` when the flat channel is on.
fn response_orders(eps: f32) -> Vec<(usize, usize)> {
    let mut orders = vec![(1, 0), (0, 1), (2, 0), (1, 1), (0, 2)];
    if n_responses(eps) == 7 {
        orders.push((0, 0));
    }
    orders
}

fn response_from_derivatives(fields: &[Array2<f32>], eps: f32) -> Array3<f32> {
    let k = n_responses(eps);
    let (ly, lx, lyy, lxy, lxx) = (&fields[0], &fields[1], &fields[2], &fields[3], &fields[4]);
    let (height, width) = ly.dim();

    let mut response = Array3::zeros((height, width, k));
    Zip::from(response.lanes_mut(Axis(2)))
        .and(ly)
        .and(lx)
        .and(lyy)
        .and(lxy)
        .and(lxx)
        .for_each(|mut r, &ly, &lx, &lyy, &lxy, &lxx| {
            let lambda = lyy + lxx;
            let gamma = ((lyy - lxx).powi(2) + 4.0 * lxy * lxy).sqrt();
            r[0] = 2.0 * ly.hypot(lx);
            r[1] = lambda;
            r[2] = -lambda;
            r[3] = FRAC_1_SQRT_2 * (gamma + lambda);
            r[4] = FRAC_1_SQRT_2 * (gamma - lambda);
            r[5] = gamma;
        });
    if k == 7 {
        let smoothed = &fields[5];
        response
            .slice_mut(s![.., .., 6])
            .zip_mut_with(smoothed, |r, &l| *r = eps * l);
    }
    response
}

/// Per-pixel BIF label: index of the strongest response channel. Ties resolve to
/// the lowest index.
pub fn bif_max(response: &ArrayView3<f32>) -> Array2<u8> {
    response.map_axis(Axis(2), |r| {
        let mut best = 0;
        for (i, &v) in r.iter().enumerate().skip(1) {
            if v > r[best] {
                best = i;
            }
        }
        best as u8
    })
}

/// Color visualization of a label image, `(height, width, 3)` RGB in `[0, 1]`.
/// Labels without a class are painted black.
pub fn bif_colors(labels: &ArrayView2<u8>) -> Array3<f32> {
    let (height, width) = labels.dim();
    let mut img = Array3::zeros((height, width, 3));
    Zip::from(img.lanes_mut(Axis(2)))
        .and(labels)
        .for_each(|mut px, &label| {
            if let Some(class) = BifClass::from_index(label as usize) {
                px.iter_mut().zip(class.color()).for_each(|(d, c)| *d = c);
            }
        });
    img
}

/// Parameters of [`bif_hist`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BifHistParams {
    pub n_scales: usize,
    pub scale_min: f32,
    pub scale_ratio: f32,
    /// Weight of the flat channel; `0` disables it.
    pub eps: f32,
    pub norm: Norm,
    pub mode: DerivativeMode,
}

impl Default for BifHistParams {
    fn default() -> Self {
        Self {
            n_scales: 4,
            scale_min: 1.0,
            scale_ratio: 2.0,
            eps: 0.0,
            norm: Norm::L1,
            mode: DerivativeMode::default(),
        }
    }
}

impl BifHistParams {
    pub fn new(n_scales: usize, scale_min: f32, scale_ratio: f32) -> Self {
        Self {
            n_scales,
            scale_min,
            scale_ratio,
            ..Default::default()
        }
    }

    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_norm(mut self, norm: Norm) -> Self {
        self.norm = norm;
        self
    }

    pub fn with_mode(mut self, mode: DerivativeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn scales(&self) -> Vec<f32> {
        crate::geometric_scales(self.n_scales, self.scale_min, self.scale_ratio)
    }
}

/// Joint multi-scale BIF histogram of length `k^n_scales` where `k` is the number of
/// response channels.
///
/// The labels of a pixel at all scales are combined into one index
/// `sum_s label_s * k^s`, so bin `i` counts pixels whose structure types across
/// scales are the base-`k` digits of `i`, finest scale first.
pub fn bif_hist(img: &ArrayView2<f32>, params: &BifHistParams) -> Result<Array1<f32>> {
    let k = n_responses(params.eps);
    let n_bins = u32::try_from(params.n_scales)
        .ok()
        .and_then(|n| k.checked_pow(n))
        .ok_or_else(|| {
            Error::invalid(format!(
                "a BIF histogram over {} scales has too many bins",
                params.n_scales
            ))
        })?;
    debug!(
        "bif histogram: {} scales from {} (ratio {}), {n_bins} bins",
        params.n_scales, params.scale_min, params.scale_ratio
    );

    let fields = multiscale_derivatives(
        img,
        &params.scales(),
        &response_orders(params.eps),
        params.mode,
    )?;
    let mut index = Array2::<usize>::zeros(img.raw_dim());
    let mut place = 1;
    for scale_fields in &fields {
        let labels = bif_max(&response_from_derivatives(scale_fields, params.eps).view());
        Zip::from(&mut index)
            .and(&labels)
            .for_each(|i, &label| *i += label as usize * place);
        place *= k;
    }

    let mut hist = Array1::zeros(n_bins);
    index.iter().for_each(|&i| hist[i] += 1.0);
    normalize_inplace(&mut hist, params.norm);
    Ok(hist)
}

/// Decodes a [`bif_hist`] bin into the per-scale labels it counts, finest scale first.
pub fn decode_bin(bin: usize, n_scales: usize, eps: f32) -> Vec<BifClass> {
    let k = n_responses(eps);
    let mut rest = bin;
    (0..n_scales)
        .filter_map(|_| {
            let digit = rest % k;
            rest /= k;
            BifClass::from_index(digit)
        })
        .collect()
}

/// Fraction of pixels whose labels agree between two label images of equal shape.
pub fn label_agreement(a: &ArrayView2<u8>, b: &ArrayView2<u8>) -> f32 {
    let same = izip!(a.iter(), b.iter()).filter(|(x, y)| x == y).count();
    same as f32 / a.len().max(1) as f32
}
