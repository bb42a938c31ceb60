//! Writes the gradient orientation isophotes of an image, with both smoothing
//! functions.
//!
//! Usage: isophotes <image> [output dir]

use std::f32::consts::PI;
use std::path::PathBuf;

use ndarray::Axis;
use scalespace_features::io::{load_grayscale, save_image};
use scalespace_features::{gradient_orientation, isophotes, DerivativeMode, IsophoteKind};

fn main() -> scalespace_features::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: {} <image> [output dir]", args[0]);
        return Ok(());
    };
    let out_dir = PathBuf::from(args.get(2).map_or("isophotes", String::as_str));

    let img = load_grayscale(path)?;
    let go = gradient_orientation(&img.view(), 3.0, true, DerivativeMode::Fourier)?;
    save_image(
        out_dir.join("go.png"),
        &(&go.orientation * &go.magnitude),
        true,
    )?;
    for kind in [IsophoteKind::Gaussian, IsophoteKind::VonMises] {
        let iso = isophotes(&go.orientation.view(), 5, (-PI, PI), 0.5, kind)?;
        for (i, level) in iso.axis_iter(Axis(0)).enumerate() {
            let weighted = &level * &go.magnitude;
            save_image(out_dir.join(format!("go_iso_{i}_{kind}.png")), &weighted, true)?;
        }
    }
    Ok(())
}
