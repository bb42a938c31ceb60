//! Computes histogram feature vectors of an image and prints them as JSON.
//!
//! Usage: histogram-features <image> [config.json]
//!
//! The optional config overrides any of the defaults below, e.g.
//! `{"go": {"scales": [1.5, 3.0], "mode": "fourier"}, "donuts": {"n": 3, "radius_max": 20.0}}`.

use std::fs;

use serde::{Deserialize, Serialize};

use scalespace_features::histograms::to_feature_vector;
use scalespace_features::io::load_grayscale;
use scalespace_features::spatial::{donuts, radial_offsets, Distribution};
use scalespace_features::{
    bif_hist, go_hist, osi_hist, si_hist, BifHistParams, HistogramParams,
    OrientedHistogramParams,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    go: HistogramParams,
    si: HistogramParams,
    osi: OrientedHistogramParams,
    bif: BifHistParams,
    /// Measure orientations relative to the direction from the image center.
    radial: bool,
    donuts: Option<DonutConfig>,
}

#[derive(Debug, Deserialize)]
struct DonutConfig {
    n: usize,
    radius_max: f32,
    #[serde(default = "default_width")]
    width_min: f32,
    #[serde(default = "default_ratio")]
    width_ratio: f32,
    #[serde(default)]
    distribution: Distribution,
}

fn default_width() -> f32 {
    4.0
}

fn default_ratio() -> f32 {
    1.0
}

#[derive(Debug, Serialize)]
struct Features {
    go: Vec<f32>,
    si: Vec<f32>,
    osi: Vec<f32>,
    bif: Vec<f32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("usage: {} <image> [config.json]", args[0]);
        return Ok(());
    };
    let config: Config = match args.get(2) {
        Some(config) => serde_json::from_str(&fs::read_to_string(config)?)?,
        None => Config::default(),
    };

    let img = load_grayscale(path)?;
    let masks = config
        .donuts
        .as_ref()
        .map(|d| {
            donuts(
                img.dim(),
                d.n,
                d.radius_max,
                d.width_min,
                d.width_ratio,
                d.distribution,
            )
        })
        .transpose()?;
    let masks = masks.as_deref();
    let signed_offsets = config
        .radial
        .then(|| radial_offsets(img.dim(), true))
        .transpose()?;
    let unsigned_offsets = config
        .radial
        .then(|| radial_offsets(img.dim(), false))
        .transpose()?;
    let signed_offsets = signed_offsets.as_ref().map(|o| o.view());
    let unsigned_offsets = unsigned_offsets.as_ref().map(|o| o.view());

    let go = go_hist(&img.view(), &config.go, true, masks, signed_offsets.as_ref())?;
    let si = si_hist(&img.view(), &config.si, masks)?;
    let osi = osi_hist(&img.view(), &config.osi, masks, unsigned_offsets.as_ref())?;
    let bif = bif_hist(&img.view(), &config.bif)?;

    let features = Features {
        go: to_feature_vector(&go).to_vec(),
        si: to_feature_vector(&si).to_vec(),
        osi: osi.to_feature_vector().to_vec(),
        bif: bif.to_vec(),
    };
    println!("{}", serde_json::to_string_pretty(&features)?);
    Ok(())
}
