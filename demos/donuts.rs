//! Writes a few donut weight masks.
//!
//! Usage: donuts [output dir]

use std::path::PathBuf;

use scalespace_features::io::save_image;
use scalespace_features::spatial::{donuts, Distribution};

fn main() -> scalespace_features::Result<()> {
    let out_dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| "donuts".into()));
    for distribution in [Distribution::Gaussian, Distribution::Lognormal] {
        let masks = donuts((100, 100), 3, 30.0, 8.0, 1.2, distribution)?;
        for (i, mask) in masks.iter().enumerate() {
            save_image(out_dir.join(format!("donut{i}_{distribution}.png")), mask, true)?;
        }
    }
    Ok(())
}
