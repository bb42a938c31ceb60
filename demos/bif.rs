//! Writes BIF color images of an image at a few scales.
//!
//! Usage: bif <image> [output dir]

use std::path::PathBuf;

use scalespace_features::io::{load_grayscale, save_image};
use scalespace_features::{bif_colors, bif_max, bif_response, DerivativeMode};

fn main() -> scalespace_features::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: {} <image> [output dir]", args[0]);
        return Ok(());
    };
    let out_dir = PathBuf::from(args.get(2).map_or("bif", String::as_str));

    let img = load_grayscale(path)?;
    for sigma in [2.0, 4.0, 8.0] {
        let response = bif_response(&img.view(), sigma, 0.02, DerivativeMode::Fourier)?;
        let colors = bif_colors(&bif_max(&response.view()).view());
        save_image(out_dir.join(format!("bif-sigma{sigma}.png")), &colors, false)?;
    }
    Ok(())
}
