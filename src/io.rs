//! Reading images into arrays and writing arrays out for inspection.

use std::fs;
use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};
use ndarray::{Array, ArrayBase, ArrayView2, ArrayView3, Data, Dimension, Ix2, Ix3};
use nshare::IntoNdarray2;

use crate::error::{Error, Result};
use crate::LumaFImage;

/// Loads an image file as grayscale with intensities in `[0, 1]`, shaped
/// `(height, width)`.
pub fn load_grayscale(path: impl AsRef<Path>) -> Result<ndarray::Array2<f32>> {
    let img: LumaFImage = image::open(path)?.to_luma32f();
    Ok(img.into_ndarray2())
}

/// Linearly maps the values of `x` onto `[0, 1]`: subtracts the minimum and
/// divides by the resulting maximum (plus `1e-12`).
pub fn stretch_intensity<S, D>(x: &ArrayBase<S, D>) -> Array<f32, D>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let min = x.iter().copied().fold(f32::INFINITY, f32::min);
    let mut out = x.mapv(|v| v - min);
    let max = out.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    out.mapv_inplace(|v| v / (max + 1e-12));
    out
}

fn to_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Writes a `(height, width)` array as a grayscale image or a `(height, width, 3)`
/// array as an RGB image; the file format follows the extension. Missing parent
/// directories are created.
///
/// With `stretch` the values are first mapped onto `[0, 1]` by
/// [`stretch_intensity`], so arbitrary fields such as derivatives or orientations
/// can be written directly. Otherwise they are clamped to `[0, 1]`, which suits
/// data that already is an image, e.g. [`crate::bif_colors`].
pub fn save_image<S, D>(
    path: impl AsRef<Path>,
    x: &ArrayBase<S, D>,
    stretch: bool,
) -> Result<()>
where
    S: Data<Elem = f32>,
    D: Dimension,
{
    let path = path.as_ref();
    let stretched;
    let view = if stretch {
        stretched = stretch_intensity(x);
        stretched.view().into_dyn()
    } else {
        x.view().into_dyn()
    };
    if let Ok(gray) = view.view().into_dimensionality::<Ix2>() {
        prepare_dir(path)?;
        gray_image(&gray).save(path)?;
        return Ok(());
    }
    match view.into_dimensionality::<Ix3>() {
        Ok(rgb) if rgb.dim().2 == 3 => {
            prepare_dir(path)?;
            rgb_image(&rgb).save(path)?;
            Ok(())
        }
        _ => Err(Error::invalid(format!(
            "can only save (height, width) or (height, width, 3) arrays, got shape {:?}",
            x.shape()
        ))),
    }
}

fn prepare_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(fs::create_dir_all(parent)?),
        _ => Ok(()),
    }
}

fn gray_image(x: &ArrayView2<f32>) -> GrayImage {
    let (height, width) = x.dim();
    GrayImage::from_fn(width as u32, height as u32, |col, row| {
        Luma([to_u8(x[(row as usize, col as usize)])])
    })
}

fn rgb_image(x: &ArrayView3<f32>) -> RgbImage {
    let (height, width, _) = x.dim();
    RgbImage::from_fn(width as u32, height as u32, |col, row| {
        let (row, col) = (row as usize, col as usize);
        Rgb([
            to_u8(x[(row, col, 0)]),
            to_u8(x[(row, col, 1)]),
            to_u8(x[(row, col, 2)]),
        ])
    })
}
