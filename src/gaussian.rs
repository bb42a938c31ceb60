//! Gaussian derivative filtering in the spatial domain.
//!
//! The 2D filter is separable: rows and columns are convolved with sampled
//! 1D Gaussian derivative kernels truncated at four standard deviations. Pixels
//! outside the image are synthesized according to a [`BoundaryMode`].

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2, ArrayView2, ArrayViewMut1, Axis};

use crate::error::{Error, Result};

/// Kernels are truncated at this many standard deviations.
const TRUNCATE: f32 = 4.0;

/// How samples outside the image are synthesized.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum BoundaryMode {
    /// `d c b a | a b c d | d c b a`, half-sample symmetric.
    #[default]
    Reflect,
    /// `d c b | a b c d | c b a`, whole-sample symmetric.
    Mirror,
    /// `a a a | a b c d | d d d`
    Nearest,
    /// `b c d | a b c d | a b c`, periodic.
    Wrap,
    /// `k k k | a b c d | k k k`
    Constant(f32),
}

impl FromStr for BoundaryMode {
    type Err = Error;

    /// Parses the mode names. `constant` pads with zeros.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reflect" => Ok(BoundaryMode::Reflect),
            "mirror" => Ok(BoundaryMode::Mirror),
            "nearest" => Ok(BoundaryMode::Nearest),
            "wrap" => Ok(BoundaryMode::Wrap),
            "constant" => Ok(BoundaryMode::Constant(0.0)),
            other => Err(Error::invalid(format!("unknown padding mode '{other}'"))),
        }
    }
}

impl fmt::Display for BoundaryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryMode::Reflect => f.write_str("reflect"),
            BoundaryMode::Mirror => f.write_str("mirror"),
            BoundaryMode::Nearest => f.write_str("nearest"),
            BoundaryMode::Wrap => f.write_str("wrap"),
            BoundaryMode::Constant(c) => write!(f, "constant({c})"),
        }
    }
}

impl BoundaryMode {
    /// Maps a possibly out of range index onto `0..n`. `None` means the sample is
    /// the constant padding value.
    fn resolve(self, i: isize, n: usize) -> Option<usize> {
        let n = n as isize;
        if (0..n).contains(&i) {
            return Some(i as usize);
        }
        let idx = match self {
            BoundaryMode::Reflect => {
                let period = 2 * n;
                let m = i.rem_euclid(period);
                if m < n {
                    m
                } else {
                    period - 1 - m
                }
            }
            BoundaryMode::Mirror => {
                if n == 1 {
                    0
                } else {
                    let period = 2 * n - 2;
                    let m = i.rem_euclid(period);
                    if m < n {
                        m
                    } else {
                        period - m
                    }
                }
            }
            BoundaryMode::Nearest => i.clamp(0, n - 1),
            BoundaryMode::Wrap => i.rem_euclid(n),
            BoundaryMode::Constant(_) => return None,
        };
        Some(idx as usize)
    }

    fn fill_value(self) -> f32 {
        match self {
            BoundaryMode::Constant(c) => c,
            _ => 0.0,
        }
    }
}

/// Sampled 1D Gaussian derivative kernel of the given `order`, centered at index
/// `radius`. Order 0 is normalized to unit sum; higher orders are the matching
/// analytic derivatives of that normalized Gaussian.
pub fn gaussian_kernel1d(sigma: f32, order: usize) -> Result<Array1<f32>> {
    if sigma < 0.0 || sigma.is_nan() {
        return Err(Error::invalid(format!("sigma must not be negative, got {sigma}")));
    }
    if sigma == 0.0 {
        return if order == 0 {
            Ok(Array1::ones(1))
        } else {
            Err(Error::invalid(
                "a derivative kernel needs a positive sigma".to_string(),
            ))
        };
    }
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let sigma2 = f64::from(sigma).powi(2);
    let xs = (-radius..=radius).map(|x| x as f64);
    let phi: Vec<f64> = xs.clone().map(|x| (-0.5 * x * x / sigma2).exp()).collect();
    let phi_sum: f64 = phi.iter().sum();

    // The n-th derivative of phi is q_n(x) * phi(x) for a polynomial q_n with
    // q_0 = 1 and q_{n+1} = q_n' - x / sigma^2 * q_n. Coefficients are stored
    // lowest power first.
    let mut q = vec![1.0f64];
    for _ in 0..order {
        let mut next = vec![0.0f64; q.len() + 1];
        for (power, &c) in q.iter().enumerate().skip(1) {
            next[power - 1] += power as f64 * c;
        }
        for (power, &c) in q.iter().enumerate() {
            next[power + 1] -= c / sigma2;
        }
        q = next;
    }

    Ok(xs
        .zip(phi)
        .map(|(x, p)| {
            let poly = q.iter().rev().fold(0.0, |acc, c| acc * x + c);
            (poly * p / phi_sum) as f32
        })
        .collect())
}

/// Smoothed partial derivative `d^(dy+dx) / dy^dy dx^dx (G_sigma * img)` computed by
/// direct convolution. The result is not scale normalized.
pub fn gaussian_filter(
    img: &ArrayView2<f32>,
    sigma: f32,
    (dy, dx): (usize, usize),
    mode: BoundaryMode,
) -> Result<Array2<f32>> {
    let ky = gaussian_kernel1d(sigma, dy)?;
    let kx = gaussian_kernel1d(sigma, dx)?;
    let mut out = img.to_owned();
    convolve_axis(&mut out, Axis(0), &ky, mode);
    convolve_axis(&mut out, Axis(1), &kx, mode);
    Ok(out)
}

fn convolve_axis(arr: &mut Array2<f32>, axis: Axis, kernel: &Array1<f32>, mode: BoundaryMode) {
    if kernel.len() == 1 && kernel[0] == 1.0 {
        return;
    }
    let n = arr.len_of(axis);
    let radius = (kernel.len() / 2) as isize;
    let mut line = vec![0.0f32; n];
    for mut lane in arr.lanes_mut(axis) {
        line.iter_mut().zip(lane.iter()).for_each(|(l, v)| *l = *v);
        convolve_line(&line, lane.view_mut(), kernel, radius, mode);
    }
}

fn convolve_line(
    input: &[f32],
    mut output: ArrayViewMut1<f32>,
    kernel: &Array1<f32>,
    radius: isize,
    mode: BoundaryMode,
) {
    let n = input.len();
    let fill = mode.fill_value();
    for (i, out) in output.iter_mut().enumerate() {
        // Convolution flips the kernel, which matters for odd derivative orders.
        *out = kernel
            .iter()
            .enumerate()
            .map(|(k, w)| {
                let src = i as isize + radius - k as isize;
                let v = match mode.resolve(src, n) {
                    Some(j) => input[j],
                    None => fill,
                };
                w * v
            })
            .sum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn kernel_moments() {
        let sigma = 2.0;
        let x = |k: &Array1<f32>| {
            let r = (k.len() / 2) as f32;
            k.iter()
                .enumerate()
                .map(|(i, w)| (i as f32 - r, *w))
                .collect::<Vec<_>>()
        };
        let k0 = gaussian_kernel1d(sigma, 0).unwrap();
        assert_eq!(k0.len(), 17);
        assert_abs_diff_eq!(k0.sum(), 1.0, epsilon = 1e-6);

        // First derivative kernel integrates x * k1(x) to -1: convolving the ramp f(x) = x
        // with it gives a slope of one.
        let k1 = gaussian_kernel1d(sigma, 1).unwrap();
        assert_abs_diff_eq!(k1.sum(), 0.0, epsilon = 1e-6);
        let m1: f32 = x(&k1).iter().map(|(p, w)| p * w).sum();
        assert_abs_diff_eq!(m1, -1.0, epsilon = 1e-3);

        let k2 = gaussian_kernel1d(sigma, 2).unwrap();
        assert_abs_diff_eq!(k2.sum(), 0.0, epsilon = 1e-3);
        let m2: f32 = x(&k2).iter().map(|(p, w)| p * p * w).sum();
        assert_abs_diff_eq!(m2, 2.0, epsilon = 2e-2);
    }

    #[test]
    fn boundary_index_mapping() {
        let n = 4;
        let map = |mode: BoundaryMode| (-3..7).map(|i| mode.resolve(i, n)).collect::<Vec<_>>();
        let s = |v: &[usize]| v.iter().map(|&i| Some(i)).collect::<Vec<_>>();
        assert_eq!(map(BoundaryMode::Reflect), s(&[2, 1, 0, 0, 1, 2, 3, 3, 2, 1]));
        assert_eq!(map(BoundaryMode::Mirror), s(&[3, 2, 1, 0, 1, 2, 3, 2, 1, 0]));
        assert_eq!(map(BoundaryMode::Nearest), s(&[0, 0, 0, 0, 1, 2, 3, 3, 3, 3]));
        assert_eq!(map(BoundaryMode::Wrap), s(&[1, 2, 3, 0, 1, 2, 3, 0, 1, 2]));
        assert_eq!(BoundaryMode::Constant(1.0).resolve(-1, n), None);
    }

    #[test]
    fn smoothing_preserves_constant_image() {
        let img = Array2::from_elem((12, 9), 3.5f32);
        let out = gaussian_filter(&img.view(), 1.5, (0, 0), BoundaryMode::Reflect).unwrap();
        out.iter().for_each(|v| assert_abs_diff_eq!(*v, 3.5, epsilon = 1e-5));
        let d = gaussian_filter(&img.view(), 1.5, (1, 0), BoundaryMode::Reflect).unwrap();
        d.iter().for_each(|v| assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-5));
    }

    #[test]
    fn derivative_of_ramp() {
        // f(y, x) = 2x - y has df/dx = 2 and df/dy = -1 away from the borders.
        let img = Array2::from_shape_fn((32, 32), |(y, x)| 2.0 * x as f32 - y as f32);
        let sigma = 1.5;
        let lx = gaussian_filter(&img.view(), sigma, (0, 1), BoundaryMode::Nearest).unwrap();
        let ly = gaussian_filter(&img.view(), sigma, (1, 0), BoundaryMode::Nearest).unwrap();
        let lxx = gaussian_filter(&img.view(), sigma, (0, 2), BoundaryMode::Nearest).unwrap();
        for y in 8..24 {
            for x in 8..24 {
                assert_abs_diff_eq!(lx[(y, x)], 2.0, epsilon = 1e-3);
                assert_abs_diff_eq!(ly[(y, x)], -1.0, epsilon = 1e-3);
                assert_abs_diff_eq!(lxx[(y, x)], 0.0, epsilon = 1e-2);
            }
        }
    }

    #[test]
    fn zero_sigma() {
        let img = Array2::from_shape_fn((5, 7), |(y, x)| (y * 7 + x) as f32);
        let out = gaussian_filter(&img.view(), 0.0, (0, 0), BoundaryMode::Reflect).unwrap();
        assert_eq!(out, img);
        assert!(gaussian_filter(&img.view(), 0.0, (1, 0), BoundaryMode::Reflect).is_err());
        assert!(gaussian_filter(&img.view(), -1.0, (0, 0), BoundaryMode::Reflect).is_err());
    }

    #[test]
    fn parses_padding_modes() {
        assert_eq!("wrap".parse::<BoundaryMode>().unwrap(), BoundaryMode::Wrap);
        assert_eq!(
            "constant".parse::<BoundaryMode>().unwrap(),
            BoundaryMode::Constant(0.0)
        );
        assert!(matches!(
            "symmetric".parse::<BoundaryMode>(),
            Err(Error::InvalidArgument(_))
        ));
    }
}
