use thiserror::Error;

/// Errors raised by the feature extraction routines.
///
/// All errors are raised synchronously to the immediate caller. Near-zero
/// denominators in the descriptor formulas are not errors; they are guarded by
/// [`EPSILON`](crate::EPSILON).
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown method name, inconsistent parameter lists, or a parameter
    /// outside its valid domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// An array does not have the `(height, width)` shape it must share with
    /// the image or filter set it is combined with.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }
}

/// Fails with [`Error::ShapeMismatch`] unless `actual == expected`.
pub(crate) fn ensure_shape(expected: (usize, usize), actual: (usize, usize)) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::ShapeMismatch { expected, actual })
    }
}
