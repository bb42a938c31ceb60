use divan::{black_box, Bencher};
use ndarray::Array2;
use scalespace_features::spatial::{donuts, Distribution};
use scalespace_features::{
    bif_hist, go_hist, josi_hist, si_hist, BifHistParams, HistogramParams,
    OrientedHistogramParams,
};

fn main() {
    divan::main();
}

const SIZE: usize = 128;

fn test_image() -> Array2<f32> {
    Array2::from_shape_fn((SIZE, SIZE), |(y, x)| {
        let (y, x) = (y as f32, x as f32);
        0.5 + 0.25 * (x * 0.21).sin() * (y * 0.17).cos() + 0.25 * ((x - y) * 0.09).cos()
    })
}

#[divan::bench]
fn gradient_orientation_histogram(bencher: Bencher) {
    let img = test_image();
    let params = HistogramParams::default();
    bencher.bench_local(|| black_box(go_hist(&img.view(), &params, true, None, None)));
}

#[divan::bench]
fn gradient_orientation_histogram_with_donuts(bencher: Bencher) {
    let img = test_image();
    let params = HistogramParams::default();
    let masks = donuts((SIZE, SIZE), 4, 48.0, 6.0, 1.3, Distribution::Gaussian).unwrap();
    bencher.bench_local(|| {
        black_box(go_hist(&img.view(), &params, true, Some(masks.as_slice()), None))
    });
}

#[divan::bench]
fn shape_index_histogram(bencher: Bencher) {
    let img = test_image();
    let params = HistogramParams::default();
    bencher.bench_local(|| black_box(si_hist(&img.view(), &params, None)));
}

#[divan::bench]
fn joint_oriented_shape_index_histogram(bencher: Bencher) {
    let img = test_image();
    let params = OrientedHistogramParams::default();
    bencher.bench_local(|| black_box(josi_hist(&img.view(), &params, None, None)));
}

#[divan::bench]
fn bif_histogram(bencher: Bencher) {
    let img = test_image();
    let params = BifHistParams::default().with_eps(0.01);
    bencher.bench_local(|| black_box(bif_hist(&img.view(), &params)));
}
