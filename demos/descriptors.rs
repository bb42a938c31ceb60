//! Visualizes gradient orientation and shape index fields, and the shape index
//! orientation relative to the radial direction from the image center.
//!
//! Usage: descriptors <image> [output dir]

use std::path::PathBuf;

use ndarray::Zip;
use scalespace_features::io::{load_grayscale, save_image};
use scalespace_features::spatial::radial_offsets;
use scalespace_features::{gradient_orientation, shape_index, DerivativeMode};

fn main() -> scalespace_features::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: {} <image> [output dir]", args[0]);
        return Ok(());
    };
    let out_dir = PathBuf::from(args.get(2).map_or("descriptors", String::as_str));
    let save = |name: &str, field: &ndarray::Array2<f32>| {
        save_image(out_dir.join(name), field, true)
    };

    let img = load_grayscale(path)?;
    let go = gradient_orientation(&img.view(), 3.0, true, DerivativeMode::Fourier)?;
    save("go.png", &go.orientation)?;
    save("go_m.png", &go.magnitude)?;
    save("go_weighted.png", &(&go.orientation * &go.magnitude))?;

    let si = shape_index(&img.view(), 2.5, true, DerivativeMode::Fourier)?;
    save("si.png", &si.shape_index)?;
    save("si_c.png", &si.curvedness)?;
    save("si_weighted.png", &(&si.shape_index * &si.curvedness))?;
    if let Some(ori) = si.orientation {
        save("si_o.png", &ori.orientation)?;
        save("si_om.png", &ori.magnitude)?;

        let offsets = radial_offsets(img.dim(), false)?;
        let relative = Zip::from(&ori.orientation)
            .and(&offsets)
            .map_collect(|&o, &r| (o - r).rem_euclid(std::f32::consts::PI));
        save("si_o_radial.png", &relative)?;
        save("si_o_radial_weighted.png", &(&relative * &ori.magnitude))?;
    }
    Ok(())
}
