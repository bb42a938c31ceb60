//! Differential descriptors built from scale-normalized Gaussian derivatives.

use ndarray::{Array2, ArrayView2, Zip};

use crate::error::Result;
use crate::scalespace::{derivatives, DerivativeMode};
use crate::EPSILON;

/// Per-pixel gradient orientation and its magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientOrientation {
    /// Radians in `(-pi, pi]` when signed, `(-pi/2, pi/2]` otherwise.
    pub orientation: Array2<f32>,
    /// `sqrt(Lx^2 + Ly^2)` of the scale-normalized first derivatives.
    pub magnitude: Array2<f32>,
}

/// Gradient orientation of `img` at scale `sigma`.
///
/// Signed orientations are `atan2(Ly, Lx)`. Unsigned orientations fold opposite
/// directions together as `atan(Ly / (Lx + 1e-10))`; the epsilon biases exact
/// vertical gradients instead of dividing by zero.
pub fn gradient_orientation(
    img: &ArrayView2<f32>,
    sigma: f32,
    signed: bool,
    mode: DerivativeMode,
) -> Result<GradientOrientation> {
    let fields = derivatives(img, sigma, &GRADIENT_ORDERS, mode)?;
    Ok(orientation_from_gradient(&fields[0], &fields[1], signed))
}

/// Derivative orders used by [`gradient_orientation`]: `Ly`, `Lx`.
pub(crate) const GRADIENT_ORDERS: [(usize, usize); 2] = [(1, 0), (0, 1)];

pub(crate) fn orientation_from_gradient(
    ly: &Array2<f32>,
    lx: &Array2<f32>,
    signed: bool,
) -> GradientOrientation {
    let orientation = if signed {
        Zip::from(ly).and(lx).map_collect(|&y, &x| y.atan2(x))
    } else {
        Zip::from(ly)
            .and(lx)
            .map_collect(|&y, &x| (y / (x + EPSILON)).atan())
    };
    let magnitude = Zip::from(ly).and(lx).map_collect(|&y, &x| y.hypot(x));
    GradientOrientation {
        orientation,
        magnitude,
    }
}

/// Orientation of the principal curvature direction, derived from the Hessian.
#[derive(Debug, Clone, PartialEq)]
pub struct HessianOrientation {
    /// Radians in `(-pi/2, pi/2]`.
    pub orientation: Array2<f32>,
    /// Eigenvalue gap `l1 - l2 >= 0`, the strength of the anisotropy.
    pub magnitude: Array2<f32>,
}

/// Shape index encoded as an angle, with curvedness and optional orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeIndex {
    /// Radians in `[-pi/2, pi/2]`: cups at `-pi/2`, saddles at 0, caps at `pi/2`.
    pub shape_index: Array2<f32>,
    /// `0.5 sqrt(Lxx^2 + 2 Lxy^2 + Lyy^2)`, the confidence of the shape index.
    pub curvedness: Array2<f32>,
    pub orientation: Option<HessianOrientation>,
}

/// Shape index of `img` at scale `sigma` from scale-normalized second derivatives.
///
/// `si = atan((-Lxx - Lyy) / (sqrt((Lxx - Lyy)^2 + 4 Lxy^2) + 1e-10))`.
/// When `with_orientation` is set, the Hessian eigenvalues
/// `l1,2 = t/2 +- sqrt(|t^2/4 - d|)` give the orientation
/// `atan((l1 - Lyy) / (Lxy + 1e-10))` and the eigenvalue gap as its magnitude.
/// The absolute value under the root absorbs tiny negative rounding residues.
pub fn shape_index(
    img: &ArrayView2<f32>,
    sigma: f32,
    with_orientation: bool,
    mode: DerivativeMode,
) -> Result<ShapeIndex> {
    let fields = derivatives(img, sigma, &HESSIAN_ORDERS, mode)?;
    Ok(shape_index_from_hessian(
        &fields[0],
        &fields[1],
        &fields[2],
        with_orientation,
    ))
}

/// Derivative orders used by [`shape_index`]: `Lyy`, `Lxy`, `Lxx`.
pub(crate) const HESSIAN_ORDERS: [(usize, usize); 3] = [(2, 0), (1, 1), (0, 2)];

pub(crate) fn shape_index_from_hessian(
    lyy: &Array2<f32>,
    lxy: &Array2<f32>,
    lxx: &Array2<f32>,
    with_orientation: bool,
) -> ShapeIndex {
    let shape_index = Zip::from(lyy)
        .and(lxy)
        .and(lxx)
        .map_collect(|&yy, &xy, &xx| {
            let denom = ((xx - yy).powi(2) + 4.0 * xy * xy).sqrt() + EPSILON;
            ((-xx - yy) / denom).atan()
        });
    let curvedness = Zip::from(lyy)
        .and(lxy)
        .and(lxx)
        .map_collect(|&yy, &xy, &xx| 0.5 * (xx * xx + 2.0 * xy * xy + yy * yy).sqrt());

    let orientation = with_orientation.then(|| {
        let mut orientation = Array2::zeros(lyy.raw_dim());
        let mut magnitude = Array2::zeros(lyy.raw_dim());
        Zip::from(&mut orientation)
            .and(&mut magnitude)
            .and(lyy)
            .and(lxy)
            .and(lxx)
            .for_each(|o, m, &yy, &xy, &xx| {
                let t = xx + yy;
                let d = xx * yy - xy * xy;
                let root = (t * t / 4.0 - d).abs().sqrt();
                let (l1, l2) = (t / 2.0 + root, t / 2.0 - root);
                *o = ((l1 - yy) / (xy + EPSILON)).atan();
                *m = l1 - l2;
            });
        HessianOrientation {
            orientation,
            magnitude,
        }
    });

    ShapeIndex {
        shape_index,
        curvedness,
        orientation,
    }
}
