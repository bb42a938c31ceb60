//! Local jet descriptors.
//!
//! The jet of an image at a point is the vector of its scale-normalized Gaussian
//! derivatives there. Collecting all derivatives up to some order at several
//! scales gives a compact local descriptor.

use ndarray::{Array2, ArrayView2, Axis};

use crate::error::{ensure_shape, Error, Result};
use crate::normalization::{normalize_inplace, Norm};
use crate::scalespace::{DerivativeSpec, ScaleSpace};

/// Image location in pixel coordinates: `x` along columns, `y` along rows.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(
    any(test, feature = "serde"),
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct KeyPoint {
    pub x: f32,
    pub y: f32,
}

impl KeyPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Nearest pixel `(row, col)`, clamped to an image of the given shape.
    fn pixel(&self, (height, width): (usize, usize)) -> (usize, usize) {
        // Negative and NaN coordinates saturate to 0.
        let row = (self.y.round() as usize).min(height - 1);
        let col = (self.x.round() as usize).min(width - 1);
        (row, col)
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct JetDescriptor {
    pub scales: Vec<f32>,
    /// Highest total derivative order `dy + dx`. The zeroth order is never included.
    pub max_order: usize,
    pub norm: Norm,
}

impl Default for JetDescriptor {
    fn default() -> Self {
        Self {
            scales: vec![1.0, 2.0, 4.0],
            max_order: 2,
            norm: Norm::L2,
        }
    }
}

impl JetDescriptor {
    pub fn new(scales: Vec<f32>, max_order: usize) -> Self {
        Self {
            scales,
            max_order,
            ..Default::default()
        }
    }

    pub fn with_norm(mut self, norm: Norm) -> Self {
        self.norm = norm;
        self
    }

    /// Derivative orders `(dy, dx)` of one scale in descriptor order: by total
    /// order, then from pure `y` to pure `x` derivatives.
    pub fn orders(&self) -> Vec<(usize, usize)> {
        (1..=self.max_order)
            .flat_map(|n| (0..=n).map(move |dx| (n - dx, dx)))
            .collect()
    }

    /// Length of one descriptor.
    pub fn n_features(&self) -> usize {
        self.scales.len() * self.orders().len()
    }

    /// Filter set for images of the given shape. Build it once and pass it to
    /// [`compute_with`](Self::compute_with) to describe many images of that shape.
    pub fn scalespace(&self, shape: (usize, usize)) -> Result<ScaleSpace> {
        if self.max_order == 0 || self.scales.is_empty() {
            return Err(Error::invalid(format!(
                "jet descriptor needs at least one scale and max_order >= 1, got {} scales and max_order {}",
                self.scales.len(),
                self.max_order
            )));
        }
        let orders = self.orders();
        let specs: Vec<_> = self
            .scales
            .iter()
            .flat_map(|&sigma| orders.iter().map(move |&o| DerivativeSpec::new(sigma, o)))
            .collect();
        ScaleSpace::from_specs(shape, &specs)
    }

    /// Descriptors of `img` at `keypoints`, one row per keypoint.
    pub fn compute(&self, img: &ArrayView2<f32>, keypoints: &[KeyPoint]) -> Result<Array2<f32>> {
        let ss = self.scalespace(img.dim())?;
        self.compute_with(&ss, img, keypoints)
    }

    /// Like [`compute`](Self::compute), reusing a filter set from
    /// [`scalespace`](Self::scalespace).
    ///
    /// An all-zero jet, e.g. in a flat image region, cannot be normalized and
    /// yields non-finite values.
    pub fn compute_with(
        &self,
        ss: &ScaleSpace,
        img: &ArrayView2<f32>,
        keypoints: &[KeyPoint],
    ) -> Result<Array2<f32>> {
        ensure_shape(ss.shape(), img.dim())?;
        let fields = ss.apply(img)?;
        let mut desc = Array2::zeros((keypoints.len(), fields.len()));
        for (mut row, kp) in desc.axis_iter_mut(Axis(0)).zip(keypoints) {
            let px = kp.pixel(img.dim());
            row.iter_mut()
                .zip(&fields)
                .for_each(|(d, field)| *d = field[px]);
            normalize_inplace(&mut row, self.norm);
        }
        Ok(desc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalespace::scalespace;
    use approx::assert_abs_diff_eq;
    use std::f32::consts::PI;

    fn wave() -> Array2<f32> {
        Array2::from_shape_fn((32, 32), |(y, x)| {
            (2.0 * PI * x as f32 / 16.0).sin() + 0.5 * (2.0 * PI * y as f32 / 8.0).cos()
        })
    }

    #[test]
    fn orders_and_size() {
        let jd = JetDescriptor::default();
        assert_eq!(
            jd.orders(),
            vec![(1, 0), (0, 1), (2, 0), (1, 1), (0, 2)]
        );
        assert_eq!(jd.n_features(), 15);
        assert_eq!(JetDescriptor::new(vec![1.0], 3).n_features(), 9);
    }

    #[test]
    fn descriptors_are_unit_length() {
        let img = wave();
        let kps = [KeyPoint::new(3.0, 4.0), KeyPoint::new(20.0, 11.0)];
        let desc = JetDescriptor::default().compute(&img.view(), &kps).unwrap();
        assert_eq!(desc.dim(), (2, 15));
        for row in desc.rows() {
            assert_abs_diff_eq!(row.dot(&row), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn raw_jet_matches_scalespace() {
        let img = wave();
        let jd = JetDescriptor::new(vec![1.5], 1).with_norm(Norm::Identity);
        let desc = jd.compute(&img.view(), &[KeyPoint::new(7.4, 2.6)]).unwrap();
        let ly = scalespace(&img.view(), 1.5, (1, 0)).unwrap();
        let lx = scalespace(&img.view(), 1.5, (0, 1)).unwrap();
        // Rounded to row 3, column 7.
        assert_abs_diff_eq!(desc[(0, 0)], ly[(3, 7)], epsilon = 1e-5);
        assert_abs_diff_eq!(desc[(0, 1)], lx[(3, 7)], epsilon = 1e-5);
    }

    #[test]
    fn keypoints_are_clamped() {
        let img = wave();
        let jd = JetDescriptor::default();
        let ss = jd.scalespace(img.dim()).unwrap();
        let desc = jd
            .compute_with(
                &ss,
                &img.view(),
                &[
                    KeyPoint::new(-4.0, -1.0),
                    KeyPoint::new(0.0, 0.0),
                    KeyPoint::new(100.0, 31.2),
                    KeyPoint::new(31.0, 31.0),
                ],
            )
            .unwrap();
        assert_eq!(desc.row(0), desc.row(1));
        assert_eq!(desc.row(2), desc.row(3));
    }

    #[test]
    fn rejects_bad_configuration() {
        let img = wave();
        assert!(JetDescriptor::new(vec![], 2).compute(&img.view(), &[]).is_err());
        assert!(JetDescriptor::new(vec![1.0], 0).compute(&img.view(), &[]).is_err());
        let ss = JetDescriptor::default().scalespace((16, 16)).unwrap();
        assert!(matches!(
            JetDescriptor::default().compute_with(&ss, &img.view(), &[]),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn keypoint_json() {
        let kp: KeyPoint = serde_json::from_str(r#"{"x": 1.5, "y": 2.0}"#).unwrap();
        assert_eq!(kp, KeyPoint::new(1.5, 2.0));
    }
}
