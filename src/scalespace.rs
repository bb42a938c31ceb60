//! Gaussian scale-space derivatives.
//!
//! [`ScaleSpace`] precomputes frequency-domain Gaussian derivative filters for one
//! image shape. Applying it costs one forward FFT of the image plus one inverse
//! FFT per filter, so the filter set should be built once and reused for every
//! image of that shape. [`derivatives`] is the per-call entry point used by the
//! descriptors and dispatches between the FFT path and direct spatial
//! convolution.
//!
//! All derivative fields returned from this module are scale normalized, i.e.
//! multiplied by `sigma^(dy + dx)`.

use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

use log::trace;
use ndarray::{Array2, ArrayView2, Zip};
use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::error::{ensure_shape, Error, Result};
use crate::gaussian::{gaussian_filter, BoundaryMode};

/// One requested derivative: Gaussian scale `sigma` and differentiation orders
/// along the rows (`dy`) and columns (`dx`).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DerivativeSpec {
    pub sigma: f32,
    pub dy: usize,
    pub dx: usize,
}

impl DerivativeSpec {
    pub fn new(sigma: f32, (dy, dx): (usize, usize)) -> Self {
        Self { sigma, dy, dx }
    }

    fn normalizer(&self) -> f32 {
        self.sigma.powi((self.dy + self.dx) as i32)
    }
}

/// Where derivative fields are computed.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum DerivativeMode {
    /// Frequency-domain filtering. The image is treated as periodic.
    Fourier,
    /// Direct convolution with sampled Gaussian derivative kernels.
    Spatial(BoundaryMode),
}

impl Default for DerivativeMode {
    fn default() -> Self {
        DerivativeMode::Spatial(BoundaryMode::Reflect)
    }
}

/// Precomputed frequency-domain Gaussian derivative filters for a fixed image shape.
///
/// A filter set is read-only after construction and can be shared between
/// threads working on images of the same shape.
#[derive(Clone)]
pub struct ScaleSpace {
    shape: (usize, usize),
    specs: Vec<DerivativeSpec>,
    filters: Vec<Array2<Complex32>>,
    plans: FftPlans,
}

impl fmt::Debug for ScaleSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScaleSpace")
            .field("shape", &self.shape)
            .field("specs", &self.specs)
            .finish()
    }
}

impl ScaleSpace {
    /// Builds filters for images of shape `(height, width)`. `sigmas`, `dys` and
    /// `dxs` must have equal length; entry `i` of each describes filter `i`.
    pub fn new(shape: (usize, usize), sigmas: &[f32], dys: &[usize], dxs: &[usize]) -> Result<Self> {
        if sigmas.len() != dys.len() || sigmas.len() != dxs.len() {
            return Err(Error::invalid(format!(
                "sigma and order lists differ in length: {} sigmas, {} dys, {} dxs",
                sigmas.len(),
                dys.len(),
                dxs.len()
            )));
        }
        let specs: Vec<_> = sigmas
            .iter()
            .zip(dys)
            .zip(dxs)
            .map(|((&sigma, &dy), &dx)| DerivativeSpec { sigma, dy, dx })
            .collect();
        Self::from_specs(shape, &specs)
    }

    pub fn from_specs(shape: (usize, usize), specs: &[DerivativeSpec]) -> Result<Self> {
        let (height, width) = shape;
        if height == 0 || width == 0 {
            return Err(Error::invalid(format!("empty image shape {shape:?}")));
        }
        if let Some(bad) = specs.iter().find(|s| !(s.sigma >= 0.0)) {
            return Err(Error::invalid(format!(
                "sigma must not be negative, got {}",
                bad.sigma
            )));
        }
        trace!(
            "building {} scale-space filters for shape {height}x{width}",
            specs.len()
        );
        let fy = frequencies(height);
        let fx = frequencies(width);
        let filters = specs.iter().map(|spec| filter(&fy, &fx, spec)).collect();
        Ok(Self {
            shape,
            specs: specs.to_vec(),
            filters,
            plans: FftPlans::new(height, width),
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    pub fn specs(&self) -> &[DerivativeSpec] {
        &self.specs
    }

    /// Forward 2D DFT of `img`, laid out with zero frequency at `(0, 0)`.
    pub fn spectrum(&self, img: &ArrayView2<f32>) -> Result<Array2<Complex32>> {
        ensure_shape(self.shape, img.dim())?;
        let mut buf = img.mapv(|v| Complex32::new(v, 0.0));
        self.plans.forward(&mut buf);
        Ok(buf)
    }

    /// Scale-normalized derivative fields of `img`, one per filter in construction order.
    pub fn apply(&self, img: &ArrayView2<f32>) -> Result<Vec<Array2<f32>>> {
        let spectrum = self.spectrum(img)?;
        self.apply_spectrum(&spectrum.view())
    }

    /// Like [`apply`](Self::apply), starting from an already transformed image.
    pub fn apply_spectrum(&self, spectrum: &ArrayView2<Complex32>) -> Result<Vec<Array2<f32>>> {
        Ok(self
            .filter_spectrum(spectrum)?
            .into_iter()
            .map(|mut product| {
                self.plans.inverse(&mut product);
                // The imaginary part is numerical noise.
                product.mapv(|c| c.re)
            })
            .collect())
    }

    /// Filtered spectra, one per filter, without transforming back.
    pub fn filter_spectrum(
        &self,
        spectrum: &ArrayView2<Complex32>,
    ) -> Result<Vec<Array2<Complex32>>> {
        ensure_shape(self.shape, spectrum.dim())?;
        Ok(self.filters.iter().map(|f| f * spectrum).collect())
    }
}

/// Signed DFT frequencies `k / n`: `0, 1, .., ceil(n/2) - 1, -floor(n/2), .., -1`.
fn frequencies(n: usize) -> Vec<f32> {
    let half = n.div_ceil(2);
    (0..n)
        .map(|k| {
            let k = if k < half { k as f32 } else { k as f32 - n as f32 };
            k / n as f32
        })
        .collect()
}

/// Gaussian transfer function `exp(-(2 pi sigma)^2 (fy^2 + fx^2) / 2)` times the
/// derivative transfer function `(i 2 pi fy)^dy (i 2 pi fx)^dx`, scale normalized.
fn filter(fy: &[f32], fx: &[f32], spec: &DerivativeSpec) -> Array2<Complex32> {
    let scale = (2.0 * PI * spec.sigma).powi(2) / 2.0;
    let i_pow = Complex32::i().powu((spec.dy + spec.dx) as u32);
    let normalizer = spec.normalizer();
    Array2::from_shape_fn((fy.len(), fx.len()), |(y, x)| {
        let (v, u) = (fy[y], fx[x]);
        let g = (-(v * v + u * u) * scale).exp();
        let dg = (2.0 * PI * v).powi(spec.dy as i32) * (2.0 * PI * u).powi(spec.dx as i32);
        i_pow * (g * dg * normalizer)
    })
}

#[derive(Clone)]
struct FftPlans {
    row_forward: Arc<dyn Fft<f32>>,
    col_forward: Arc<dyn Fft<f32>>,
    row_inverse: Arc<dyn Fft<f32>>,
    col_inverse: Arc<dyn Fft<f32>>,
}

impl FftPlans {
    fn new(height: usize, width: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            row_forward: planner.plan_fft_forward(width),
            col_forward: planner.plan_fft_forward(height),
            row_inverse: planner.plan_fft_inverse(width),
            col_inverse: planner.plan_fft_inverse(height),
        }
    }

    fn forward(&self, buf: &mut Array2<Complex32>) {
        transform_2d(buf, &*self.row_forward, &*self.col_forward);
    }

    /// Inverse transform including the `1 / (height * width)` normalization.
    fn inverse(&self, buf: &mut Array2<Complex32>) {
        transform_2d(buf, &*self.row_inverse, &*self.col_inverse);
        let n = buf.len() as f32;
        buf.mapv_inplace(|c| c / n);
    }
}

/// Separable 2D transform: all rows, then all columns through a transposed copy.
fn transform_2d(buf: &mut Array2<Complex32>, rows: &dyn Fft<f32>, cols: &dyn Fft<f32>) {
    if !buf.is_standard_layout() {
        *buf = buf.as_standard_layout().into_owned();
    }
    {
        let data = buf
            .as_slice_mut()
            .expect("standard layout arrays are contiguous");
        rows.process(data);
    }
    let mut transposed = buf.t().as_standard_layout().into_owned();
    {
        let data = transposed
            .as_slice_mut()
            .expect("as_standard_layout yields contiguous data");
        cols.process(data);
    }
    Zip::from(buf).and(&transposed.t()).for_each(|dst, &src| *dst = src);
}

/// Scale-normalized derivatives of `img` at `sigma`, one field per `(dy, dx)` order.
///
/// In [`DerivativeMode::Fourier`] a single filter set is built and the image is
/// transformed once for all orders.
pub fn derivatives(
    img: &ArrayView2<f32>,
    sigma: f32,
    orders: &[(usize, usize)],
    mode: DerivativeMode,
) -> Result<Vec<Array2<f32>>> {
    match mode {
        DerivativeMode::Fourier => {
            let specs: Vec<_> = orders
                .iter()
                .map(|&order| DerivativeSpec::new(sigma, order))
                .collect();
            ScaleSpace::from_specs(img.dim(), &specs)?.apply(img)
        }
        DerivativeMode::Spatial(boundary) => orders
            .iter()
            .map(|&order| {
                let normalizer = DerivativeSpec::new(sigma, order).normalizer();
                let mut field = gaussian_filter(img, sigma, order, boundary)?;
                if normalizer != 1.0 {
                    field.mapv_inplace(|v| v * normalizer);
                }
                Ok(field)
            })
            .collect(),
    }
}

/// Scale-normalized derivatives of `img` for every `(sigma, order)` pair, grouped
/// by scale: entry `i` holds one field per order at `sigmas[i]`.
///
/// In [`DerivativeMode::Fourier`] one filter set covers all scales and the image
/// is transformed once.
pub fn multiscale_derivatives(
    img: &ArrayView2<f32>,
    sigmas: &[f32],
    orders: &[(usize, usize)],
    mode: DerivativeMode,
) -> Result<Vec<Vec<Array2<f32>>>> {
    match mode {
        DerivativeMode::Fourier => {
            if sigmas.is_empty() || orders.is_empty() {
                return Ok(vec![Vec::new(); sigmas.len()]);
            }
            let specs: Vec<_> = sigmas
                .iter()
                .flat_map(|&sigma| orders.iter().map(move |&o| DerivativeSpec::new(sigma, o)))
                .collect();
            let mut fields = ScaleSpace::from_specs(img.dim(), &specs)?
                .apply(img)?
                .into_iter();
            Ok(sigmas
                .iter()
                .map(|_| fields.by_ref().take(orders.len()).collect())
                .collect())
        }
        DerivativeMode::Spatial(_) => sigmas
            .iter()
            .map(|&sigma| derivatives(img, sigma, orders, mode))
            .collect(),
    }
}

/// Single scale-space derivative of `img` computed in the frequency domain.
pub fn scalespace(img: &ArrayView2<f32>, sigma: f32, order: (usize, usize)) -> Result<Array2<f32>> {
    let mut fields = ScaleSpace::from_specs(img.dim(), &[DerivativeSpec::new(sigma, order)])?
        .apply(img)?;
    Ok(fields.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn periodic_wave(h: usize, w: usize, ky: f32, kx: f32) -> Array2<f32> {
        Array2::from_shape_fn((h, w), |(y, x)| {
            (2.0 * PI * (ky * y as f32 / h as f32 + kx * x as f32 / w as f32)).sin()
        })
    }

    #[test]
    fn frequency_layout() {
        assert_eq!(frequencies(4), vec![0.0, 0.25, -0.5, -0.25]);
        assert_eq!(frequencies(5), vec![0.0, 0.2, 0.4, -0.4, -0.2]);
    }

    #[test]
    fn tiny_sigma_is_identity() {
        let img = Array2::from_shape_fn((16, 12), |(y, x)| ((y * 12 + x) % 7) as f32);
        let out = scalespace(&img.view(), 1e-4, (0, 0)).unwrap();
        Zip::from(&out)
            .and(&img)
            .for_each(|&a, &b| assert_abs_diff_eq!(a, b, epsilon = 1e-3));
    }

    #[test]
    fn flat_image_is_preserved() {
        let img = Array2::from_elem((10, 14), 2.0f32);
        let out = scalespace(&img.view(), 3.0, (0, 0)).unwrap();
        out.iter().for_each(|v| assert_abs_diff_eq!(*v, 2.0, epsilon = 1e-4));
        let dy = scalespace(&img.view(), 3.0, (1, 0)).unwrap();
        dy.iter().for_each(|v| assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-4));
    }

    #[test]
    fn derivative_of_plane_wave() {
        // f = sin(2 pi x / w) has f_x = (2 pi / w) cos(2 pi x / w), attenuated by the
        // Gaussian transfer function at that frequency.
        let (h, w) = (16, 32);
        let img = periodic_wave(h, w, 0.0, 1.0);
        let sigma = 1.0;
        let f = 1.0 / w as f32;
        let gain = (-(2.0 * PI * sigma * f).powi(2) / 2.0).exp();
        let fields = ScaleSpace::new((h, w), &[sigma, sigma], &[0, 1], &[1, 0])
            .unwrap()
            .apply(&img.view())
            .unwrap();
        let (lx, ly) = (&fields[0], &fields[1]);
        for ((y, x), v) in lx.indexed_iter() {
            let expected = gain * 2.0 * PI * f * sigma * (2.0 * PI * x as f32 / w as f32).cos();
            assert_abs_diff_eq!(*v, expected, epsilon = 1e-4);
            assert_abs_diff_eq!(ly[(y, x)], 0.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn fourier_and_spatial_agree_on_periodic_image() {
        let img = periodic_wave(32, 32, 2.0, 1.0);
        for order in [(0, 0), (1, 0), (0, 1), (2, 0), (1, 1), (0, 2)] {
            let f = derivatives(&img.view(), 1.5, &[order], DerivativeMode::Fourier).unwrap();
            let s = derivatives(
                &img.view(),
                1.5,
                &[order],
                DerivativeMode::Spatial(BoundaryMode::Wrap),
            )
            .unwrap();
            Zip::from(&f[0])
                .and(&s[0])
                .for_each(|&a, &b| assert_abs_diff_eq!(a, b, epsilon = 1e-2));
        }
    }

    #[test]
    fn spectrum_can_be_shared() {
        let img = periodic_wave(8, 8, 1.0, 3.0);
        let a = ScaleSpace::new((8, 8), &[1.0], &[0], &[1]).unwrap();
        let b = ScaleSpace::new((8, 8), &[2.0], &[1], &[1]).unwrap();
        let spectrum = a.spectrum(&img.view()).unwrap();
        let shared = b.apply_spectrum(&spectrum.view()).unwrap();
        let direct = b.apply(&img.view()).unwrap();
        Zip::from(&shared[0])
            .and(&direct[0])
            .for_each(|&x, &y| assert_abs_diff_eq!(x, y, epsilon = 1e-6));
        assert_eq!(a.filter_spectrum(&spectrum.view()).unwrap().len(), 1);
    }

    #[test]
    fn one_filter_set_for_all_scales() {
        let img = periodic_wave(24, 20, 3.0, 2.0);
        let sigmas = [1.0, 2.0, 3.5];
        let orders = [(1, 0), (1, 1), (0, 2)];
        let grouped =
            multiscale_derivatives(&img.view(), &sigmas, &orders, DerivativeMode::Fourier)
                .unwrap();
        assert_eq!(grouped.len(), 3);
        for (fields, &sigma) in grouped.iter().zip(&sigmas) {
            assert_eq!(fields.len(), 3);
            let single = derivatives(&img.view(), sigma, &orders, DerivativeMode::Fourier).unwrap();
            for (a, b) in fields.iter().zip(&single) {
                Zip::from(a)
                    .and(b)
                    .for_each(|&x, &y| assert_abs_diff_eq!(x, y, epsilon = 1e-5));
            }
        }
        let spatial = multiscale_derivatives(
            &img.view(),
            &sigmas,
            &orders,
            DerivativeMode::Spatial(BoundaryMode::Wrap),
        )
        .unwrap();
        assert_eq!(spatial.len(), 3);
        assert!(multiscale_derivatives(&img.view(), &[], &orders, DerivativeMode::Fourier)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn rejects_mismatched_lists_and_shapes() {
        assert!(matches!(
            ScaleSpace::new((8, 8), &[1.0, 2.0], &[0], &[0, 1]),
            Err(Error::InvalidArgument(_))
        ));
        let ss = ScaleSpace::new((8, 8), &[1.0], &[0], &[0]).unwrap();
        let img = Array2::<f32>::zeros((8, 9));
        assert!(matches!(
            ss.apply(&img.view()),
            Err(Error::ShapeMismatch {
                expected: (8, 8),
                actual: (8, 9)
            })
        ));
    }
}
