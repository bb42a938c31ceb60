//! Multi-scale histograms of gradient orientation and shape index.
//!
//! For every scale a descriptor field is soft-binned into isophote images, each
//! isophote image is weighted by the descriptor's confidence (gradient magnitude,
//! curvedness or eigenvalue gap) and optionally by spatial weight masks, and summed
//! over all pixels. Every `(scale, mask)` histogram is normalized on its own.
//!
//! Without masks the confidence alone weights the contributions and the mask axis
//! of the result has length one. Orientation offsets, when given, are subtracted
//! per pixel before binning so orientations can be measured relative to a local
//! reference frame (see [`crate::spatial::radial_offsets`]).

use std::f32::consts::{FRAC_PI_2, PI};

use log::debug;
use ndarray::{s, Array1, Array2, Array3, Array4, ArrayBase, ArrayView2, Data, Dimension, Zip};

use crate::descriptors::{
    orientation_from_gradient, shape_index_from_hessian, GRADIENT_ORDERS, HESSIAN_ORDERS,
};
use crate::error::{ensure_shape, Error, Result};
use crate::isophotes::{isophotes, IsophoteKind};
use crate::normalization::{normalize_inplace, Norm};
use crate::scalespace::{multiscale_derivatives, DerivativeMode};

/// Parameters shared by all histogram builders.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct HistogramParams {
    /// Scales at which the descriptor is extracted.
    pub scales: Vec<f32>,
    pub n_bins: usize,
    /// Smoothing scale along the binned dimension.
    pub tonal_scale: f32,
    pub norm: Norm,
    pub mode: DerivativeMode,
}

impl Default for HistogramParams {
    fn default() -> Self {
        Self {
            scales: crate::geometric_scales(4, 1.0, 2.0),
            n_bins: 8,
            tonal_scale: 0.25,
            norm: Norm::L1,
            mode: DerivativeMode::default(),
        }
    }
}

impl HistogramParams {
    pub fn new(scales: Vec<f32>) -> Self {
        Self {
            scales,
            ..Default::default()
        }
    }

    pub fn with_bins(mut self, n_bins: usize) -> Self {
        self.n_bins = n_bins;
        self
    }

    pub fn with_tonal_scale(mut self, tonal_scale: f32) -> Self {
        self.tonal_scale = tonal_scale;
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
}

/// Parameters of the oriented shape index histograms: the shape index binning plus
/// the binning of the Hessian orientation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct OrientedHistogramParams {
    pub shape_index: HistogramParams,
    pub ori_n_bins: usize,
    pub ori_tonal_scale: f32,
}

impl Default for OrientedHistogramParams {
    fn default() -> Self {
        Self {
            shape_index: HistogramParams::default(),
            ori_n_bins: 8,
            ori_tonal_scale: 0.25,
        }
    }
}

impl OrientedHistogramParams {
    pub fn new(shape_index: HistogramParams) -> Self {
        Self {
            shape_index,
            ..Default::default()
        }
    }

    pub fn with_orientation_bins(mut self, n_bins: usize, tonal_scale: f32) -> Self {
        self.ori_n_bins = n_bins;
        self.ori_tonal_scale = tonal_scale;
        self
    }
}

/// Marginal oriented shape index histograms, see [`osi_hist`].
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedShapeIndexHistogram {
    /// `(n_bins, n_scales, n_masks)`
    pub shape_index: Array3<f32>,
    /// `(ori_n_bins, n_scales, n_masks)`
    pub orientation: Array3<f32>,
}

impl OrientedShapeIndexHistogram {
    /// Shape index histograms followed by orientation histograms.
    pub fn to_feature_vector(&self) -> Array1<f32> {
        self.shape_index
            .iter()
            .chain(self.orientation.iter())
            .copied()
            .collect()
    }
}

/// Flattens a histogram in row-major order.
pub fn to_feature_vector<S, D>(hist: &ArrayBase<S, D>) -> Array1<f32>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    hist.iter().copied().collect()
}

/// Multi-scale gradient orientation histogram shaped `(n_bins, n_scales, n_masks)`.
///
/// Orientations are binned with Von Mises smoothing over `(-pi, pi)` when `signed`
/// and over `(-pi/2, pi/2)` otherwise, weighted by gradient magnitude.
pub fn go_hist(
    img: &ArrayView2<f32>,
    params: &HistogramParams,
    signed: bool,
    weights: Option<&[Array2<f32>]>,
    offsets: Option<&ArrayView2<f32>>,
) -> Result<Array3<f32>> {
    check_inputs(img, weights, offsets)?;
    let n_masks = weights.map_or(1, <[_]>::len);
    debug!(
        "gradient orientation histogram: scales {:?}, {} bins, {n_masks} masks, signed {signed}",
        params.scales, params.n_bins
    );
    let limits = if signed {
        (-PI, PI)
    } else {
        (-FRAC_PI_2, FRAC_PI_2)
    };

    let fields = multiscale_derivatives(img, &params.scales, &GRADIENT_ORDERS, params.mode)?;
    let mut hist = Array3::zeros((params.n_bins, params.scales.len(), n_masks));
    for (scale_idx, g) in fields.iter().enumerate() {
        let go = orientation_from_gradient(&g[0], &g[1], signed);
        let orientation = match offsets {
            Some(offsets) if signed => shift_signed(&go.orientation, offsets),
            Some(offsets) => shift_unsigned(&go.orientation, offsets),
            None => go.orientation,
        };
        let iso = flat_isophotes(
            &orientation.view(),
            params.n_bins,
            limits,
            params.tonal_scale,
            IsophoteKind::VonMises,
        )?;
        for (mask_idx, weight) in confidence_weights(&go.magnitude, weights).enumerate() {
            let mut h = hist.slice_mut(s![.., scale_idx, mask_idx]);
            h.assign(&iso.dot(&weight));
            normalize_inplace(&mut h, params.norm);
        }
    }
    Ok(hist)
}

/// Multi-scale shape index histogram shaped `(n_bins, n_scales, n_masks)`.
///
/// Shape indices are binned with Gaussian smoothing over `(-pi/2, pi/2)`, weighted
/// by curvedness.
pub fn si_hist(
    img: &ArrayView2<f32>,
    params: &HistogramParams,
    weights: Option<&[Array2<f32>]>,
) -> Result<Array3<f32>> {
    check_inputs(img, weights, None)?;
    let n_masks = weights.map_or(1, <[_]>::len);
    debug!(
        "shape index histogram: scales {:?}, {} bins, {n_masks} masks",
        params.scales, params.n_bins
    );

    let fields = multiscale_derivatives(img, &params.scales, &HESSIAN_ORDERS, params.mode)?;
    let mut hist = Array3::zeros((params.n_bins, params.scales.len(), n_masks));
    for (scale_idx, h) in fields.iter().enumerate() {
        let si = shape_index_from_hessian(&h[0], &h[1], &h[2], false);
        let iso = shape_index_isophotes(&si.shape_index.view(), params)?;
        for (mask_idx, weight) in confidence_weights(&si.curvedness, weights).enumerate() {
            let mut h = hist.slice_mut(s![.., scale_idx, mask_idx]);
            h.assign(&iso.dot(&weight));
            normalize_inplace(&mut h, params.norm);
        }
    }
    Ok(hist)
}

/// Joint oriented shape index histogram shaped
/// `(n_bins, ori_n_bins, n_scales, n_masks)`.
///
/// Each pixel contributes the outer product of its shape index and orientation
/// isophote responses, scaled by curvedness times eigenvalue gap times mask.
/// Orientations are unsigned, binned with Von Mises smoothing over `(-pi/2, pi/2)`.
pub fn josi_hist(
    img: &ArrayView2<f32>,
    params: &OrientedHistogramParams,
    weights: Option<&[Array2<f32>]>,
    offsets: Option<&ArrayView2<f32>>,
) -> Result<Array4<f32>> {
    check_inputs(img, weights, offsets)?;
    let si_params = &params.shape_index;
    let n_masks = weights.map_or(1, <[_]>::len);
    debug!(
        "joint oriented shape index histogram: scales {:?}, {}x{} bins, {n_masks} masks",
        si_params.scales, si_params.n_bins, params.ori_n_bins
    );

    let fields =
        multiscale_derivatives(img, &si_params.scales, &HESSIAN_ORDERS, si_params.mode)?;
    let mut hist = Array4::zeros((
        si_params.n_bins,
        params.ori_n_bins,
        si_params.scales.len(),
        n_masks,
    ));
    for (scale_idx, hessian) in fields.iter().enumerate() {
        let OrientedBins {
            si_iso,
            curvedness,
            ori_iso,
            ori_magnitude,
        } = oriented_bins(hessian, params, offsets)?;
        let ori = &ori_iso * &flatten(&ori_magnitude);
        for (mask_idx, weight) in confidence_weights(&curvedness, weights).enumerate() {
            let si = &si_iso * &weight;
            let mut h = hist.slice_mut(s![.., .., scale_idx, mask_idx]);
            h.assign(&si.dot(&ori.t()));
            normalize_inplace(&mut h, si_params.norm);
        }
    }
    Ok(hist)
}

/// Marginal oriented shape index histograms.
///
/// The shape index histogram is weighted by curvedness, the orientation histogram
/// by the eigenvalue gap, each times the mask, and both are normalized per
/// `(scale, mask)` independently.
pub fn osi_hist(
    img: &ArrayView2<f32>,
    params: &OrientedHistogramParams,
    weights: Option<&[Array2<f32>]>,
    offsets: Option<&ArrayView2<f32>>,
) -> Result<OrientedShapeIndexHistogram> {
    check_inputs(img, weights, offsets)?;
    let si_params = &params.shape_index;
    let n_scales = si_params.scales.len();
    let n_masks = weights.map_or(1, <[_]>::len);
    debug!(
        "oriented shape index histograms: scales {:?}, {}+{} bins, {n_masks} masks",
        si_params.scales, si_params.n_bins, params.ori_n_bins
    );

    let fields =
        multiscale_derivatives(img, &si_params.scales, &HESSIAN_ORDERS, si_params.mode)?;
    let mut si_hist = Array3::zeros((si_params.n_bins, n_scales, n_masks));
    let mut ori_hist = Array3::zeros((params.ori_n_bins, n_scales, n_masks));
    for (scale_idx, hessian) in fields.iter().enumerate() {
        let OrientedBins {
            si_iso,
            curvedness,
            ori_iso,
            ori_magnitude,
        } = oriented_bins(hessian, params, offsets)?;
        let si_weights = confidence_weights(&curvedness, weights);
        let ori_weights = confidence_weights(&ori_magnitude, weights);
        for (mask_idx, (si_weight, ori_weight)) in si_weights.zip(ori_weights).enumerate() {
            let mut h = si_hist.slice_mut(s![.., scale_idx, mask_idx]);
            h.assign(&si_iso.dot(&si_weight));
            normalize_inplace(&mut h, si_params.norm);

            let mut h = ori_hist.slice_mut(s![.., scale_idx, mask_idx]);
            h.assign(&ori_iso.dot(&ori_weight));
            normalize_inplace(&mut h, si_params.norm);
        }
    }
    Ok(OrientedShapeIndexHistogram {
        shape_index: si_hist,
        orientation: ori_hist,
    })
}

/// Isophote images flattened to `(n_bins, height * width)` with their confidence
/// fields, for one scale.
struct OrientedBins {
    si_iso: Array2<f32>,
    curvedness: Array2<f32>,
    ori_iso: Array2<f32>,
    ori_magnitude: Array2<f32>,
}

/// Bins one scale's Hessian, given as `[Lyy, Lxy, Lxx]`.
fn oriented_bins(
    hessian: &[Array2<f32>],
    params: &OrientedHistogramParams,
    offsets: Option<&ArrayView2<f32>>,
) -> Result<OrientedBins> {
    let si = shape_index_from_hessian(&hessian[0], &hessian[1], &hessian[2], true);
    let ori = si.orientation.ok_or_else(|| {
        Error::invalid("shape index was computed without orientations")
    })?;
    let orientation = match offsets {
        Some(offsets) => shift_unsigned(&ori.orientation, offsets),
        None => ori.orientation,
    };
    let si_iso = shape_index_isophotes(&si.shape_index.view(), &params.shape_index)?;
    let ori_iso = flat_isophotes(
        &orientation.view(),
        params.ori_n_bins,
        (-FRAC_PI_2, FRAC_PI_2),
        params.ori_tonal_scale,
        IsophoteKind::VonMises,
    )?;
    Ok(OrientedBins {
        si_iso,
        curvedness: si.curvedness,
        ori_iso,
        ori_magnitude: ori.magnitude,
    })
}

fn shape_index_isophotes(field: &ArrayView2<f32>, params: &HistogramParams) -> Result<Array2<f32>> {
    flat_isophotes(
        field,
        params.n_bins,
        (-FRAC_PI_2, FRAC_PI_2),
        params.tonal_scale,
        IsophoteKind::Gaussian,
    )
}

fn flat_isophotes(
    field: &ArrayView2<f32>,
    n_bins: usize,
    limits: (f32, f32),
    scale: f32,
    kind: IsophoteKind,
) -> Result<Array2<f32>> {
    let n_pixels = field.len();
    Ok(isophotes(field, n_bins, limits, scale, kind)?.into_shape_with_order((n_bins, n_pixels))?)
}

fn flatten(field: &Array2<f32>) -> Array1<f32> {
    field.iter().copied().collect()
}

/// The confidence field alone, or the confidence times each mask; flattened.
fn confidence_weights<'a>(
    confidence: &'a Array2<f32>,
    masks: Option<&'a [Array2<f32>]>,
) -> Box<dyn Iterator<Item = Array1<f32>> + 'a> {
    match masks {
        None => Box::new(std::iter::once(flatten(confidence))),
        Some(masks) => Box::new(masks.iter().map(move |m| flatten(&(m * confidence)))),
    }
}

fn check_inputs(
    img: &ArrayView2<f32>,
    weights: Option<&[Array2<f32>]>,
    offsets: Option<&ArrayView2<f32>>,
) -> Result<()> {
    if let Some(weights) = weights {
        if weights.is_empty() {
            return Err(Error::invalid(
                "an empty list of weight masks; pass None to weight by confidence only",
            ));
        }
        for w in weights {
            ensure_shape(img.dim(), w.dim())?;
        }
    }
    if let Some(offsets) = offsets {
        ensure_shape(img.dim(), offsets.dim())?;
    }
    Ok(())
}

/// `x mod period` in `[0, period)`. `rem_euclid` alone rounds tiny negative `x`
/// up to `period` itself.
fn wrap(x: f32, period: f32) -> f32 {
    let r = x.rem_euclid(period);
    if r >= period {
        0.0
    } else {
        r
    }
}

/// `(theta - offset) mod 2 pi`, in `[0, 2 pi)`.
fn shift_signed(orientation: &Array2<f32>, offsets: &ArrayView2<f32>) -> Array2<f32> {
    Zip::from(orientation)
        .and(offsets)
        .map_collect(|&o, &off| wrap(o - off, 2.0 * PI))
}

/// `theta - offset` wrapped into `(-pi/2, pi/2]`, the range of unsigned orientations.
fn shift_unsigned(orientation: &Array2<f32>, offsets: &ArrayView2<f32>) -> Array2<f32> {
    Zip::from(orientation)
        .and(offsets)
        .map_collect(|&o, &off| FRAC_PI_2 - wrap(FRAC_PI_2 - (o - off), PI))
}
