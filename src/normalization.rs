use std::fmt;
use std::str::FromStr;

use ndarray::{Array, ArrayBase, Data, DataMut, Dimension};

use crate::error::{Error, Result};

/// Histogram / feature vector normalization.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Norm {
    /// Divide by the sum of all elements.
    #[default]
    L1,
    /// L1 normalize, take the elementwise square root, L1 normalize again.
    /// Gives Hellinger-style root histograms that compare well under a linear kernel.
    L1Root,
    /// Divide by the Euclidean norm.
    L2,
    /// Leave the values untouched.
    Identity,
}

impl FromStr for Norm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "l1" => Ok(Norm::L1),
            "l1_root" => Ok(Norm::L1Root),
            "l2" => Ok(Norm::L2),
            "none" => Ok(Norm::Identity),
            other => Err(Error::invalid(format!(
                "unknown normalization method '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Norm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Norm::L1 => "l1",
            Norm::L1Root => "l1_root",
            Norm::L2 => "l2",
            Norm::Identity => "none",
        };
        f.write_str(name)
    }
}

/// Returns a normalized copy of `x`, see [`normalize_inplace`].
pub fn normalize<S, D>(x: &ArrayBase<S, D>, norm: Norm) -> Array<f32, D>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let mut out = x.to_owned();
    normalize_inplace(&mut out, norm);
    out
}

/// Normalizes all elements of `x` together according to `norm`.
///
/// All-zero input is not guarded against: the division produces non-finite
/// values and it is up to the caller to avoid feeding empty histograms.
pub fn normalize_inplace<S, D>(x: &mut ArrayBase<S, D>, norm: Norm)
where
    S: DataMut<Elem = f32>,
    D: Dimension,
{
    match norm {
        Norm::L1 => l1(x),
        Norm::L1Root => {
            l1(x);
            x.mapv_inplace(f32::sqrt);
            l1(x);
        }
        Norm::L2 => {
            let l2 = x.iter().map(|v| v * v).sum::<f32>().sqrt();
            x.mapv_inplace(|v| v / l2);
        }
        Norm::Identity => {}
    }
}

fn l1<S, D>(x: &mut ArrayBase<S, D>)
where
    S: DataMut<Elem = f32>,
    D: Dimension,
{
    let sum = x.sum();
    x.mapv_inplace(|v| v / sum);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    #[test]
    fn l1_sums_to_one() {
        let x = array![1.0f32, 2.0, 3.0, 4.0];
        let n = normalize(&x, Norm::L1);
        assert_abs_diff_eq!(n.sum(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(n[3], 0.4, epsilon = 1e-6);
    }

    #[test]
    fn l1_root_is_l1_normalized() {
        let x = array![[1.0f32, 4.0], [9.0, 16.0]];
        let n = normalize(&x, Norm::L1Root);
        assert_abs_diff_eq!(n.sum(), 1.0, epsilon = 1e-6);
        // sqrt of l1 normalized values are proportional to 1, 2, 3, 4
        assert_abs_diff_eq!(n[(0, 1)] / n[(0, 0)], 2.0, epsilon = 1e-5);
        assert_abs_diff_eq!(n[(1, 1)] / n[(0, 0)], 4.0, epsilon = 1e-5);
    }

    #[test]
    fn l2_has_unit_norm() {
        let x = array![3.0f32, 4.0];
        let n = normalize(&x, Norm::L2);
        assert_abs_diff_eq!(n[0], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(n[1], 0.8, epsilon = 1e-6);
        let norm = n.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert_abs_diff_eq!(norm, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn identity_keeps_values() {
        let x = Array2::from_shape_fn((3, 5), |(y, x)| (y * 5 + x) as f32 - 4.0);
        assert_eq!(normalize(&x, Norm::Identity), x);
    }

    #[test]
    fn all_zero_input_is_not_finite() {
        let x = array![0.0f32, 0.0];
        assert!(normalize(&x, Norm::L1).iter().all(|v| !v.is_finite()));
    }

    #[test]
    fn parses_method_names() {
        assert_eq!("l1".parse::<Norm>().unwrap(), Norm::L1);
        assert_eq!("l1_root".parse::<Norm>().unwrap(), Norm::L1Root);
        assert_eq!("l2".parse::<Norm>().unwrap(), Norm::L2);
        assert_eq!("none".parse::<Norm>().unwrap(), Norm::Identity);
        assert!(matches!(
            "max".parse::<Norm>(),
            Err(Error::InvalidArgument(_))
        ));
        for norm in [Norm::L1, Norm::L1Root, Norm::L2, Norm::Identity] {
            assert_eq!(norm.to_string().parse::<Norm>().unwrap(), norm);
        }
    }
}
