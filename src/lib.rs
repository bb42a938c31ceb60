//! This crate extracts multi-scale differential image descriptors and aggregates them
//! into histograms usable as image feature vectors.
//!
//! Everything is built on Gaussian scale-space derivatives: smoothed partial derivatives
//! of an image at a scale `sigma`, computed either in the frequency domain with filters
//! that are precomputed once per image shape ([`ScaleSpace`]) or by direct convolution
//! ([`DerivativeMode::Spatial`]). On top of those sit
//! - gradient orientation and shape index descriptors ([`gradient_orientation`],
//!   [`shape_index`]),
//! - basic image features (BIF), a 7-way classification of local structure
//!   ([`bif_response`], [`bif_hist`]),
//! - soft binning of scalar fields into isophote images ([`isophotes`]) and the histogram
//!   builders that combine all of the above ([`go_hist`], [`si_hist`], [`josi_hist`],
//!   [`osi_hist`]), optionally weighted by the ring masks of [`spatial::donuts`] and
//!   measured relative to [`spatial::radial_offsets`],
//! - local jet descriptors at keypoints ([`JetDescriptor`]).
//!
//! Images are `ndarray::Array2<f32>` in row-major `(height, width)` layout; derivative
//! orders are given as `(dy, dx)`.
//!
//! Useful resources:
//! - [1]: Koenderink & van Doorn, "Surface shape and curvature scales", 1992. Shape index and curvedness.
//! - [2]: Lindeberg, "Feature detection with automatic scale selection", 1998. Scale-normalized derivatives.
//! - [3]: Crosier & Griffin, "Using basic image features for texture classification", 2010.
//! - [4]: Larsen, Darkner, Dahl & Pedersen, "Jet-based local image descriptors", 2012.

use image::{ImageBuffer, Luma};

pub mod bif;
pub mod descriptors;
pub mod error;
pub mod gaussian;
pub mod histograms;
pub mod io;
pub mod isophotes;
pub mod jet;
pub mod normalization;
pub mod scalespace;
pub mod spatial;

pub use bif::{bif_colors, bif_hist, bif_max, bif_response, BifClass, BifHistParams};
pub use descriptors::{
    gradient_orientation, shape_index, GradientOrientation, HessianOrientation, ShapeIndex,
};
pub use error::{Error, Result};
pub use gaussian::BoundaryMode;
pub use histograms::{
    go_hist, josi_hist, osi_hist, si_hist, HistogramParams, OrientedHistogramParams,
    OrientedShapeIndexHistogram,
};
pub use isophotes::{isophotes, IsophoteKind};
pub use jet::{JetDescriptor, KeyPoint};
pub use normalization::{normalize, normalize_inplace, Norm};
pub use scalespace::{
    derivatives, multiscale_derivatives, scalespace, DerivativeMode, DerivativeSpec, ScaleSpace,
};

/// Added to denominators of the orientation and shape index formulas. This is a
/// deliberate small bias, not exact handling of zero.
pub const EPSILON: f32 = 1e-10;

type LumaFImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Geometric series of `n` scales `min * ratio^i`.
pub fn geometric_scales(n: usize, min: f32, ratio: f32) -> Vec<f32> {
    (0..n).map(|i| min * ratio.powi(i as i32)).collect()
}
