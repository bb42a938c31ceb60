use image::{ImageBuffer, Luma};
use imageproc::drawing::draw_filled_circle_mut;
use ndarray::Array2;
use nshare::IntoNdarray2;

/// Bright disk of intensity `foreground` centered in a `size x size` image.
pub fn disk(size: u32, radius: i32, foreground: f32, background: f32) -> Array2<f32> {
    let mut img = ImageBuffer::from_pixel(size, size, Luma([background]));
    let c = (size / 2) as i32;
    draw_filled_circle_mut(&mut img, (c, c), radius, Luma([foreground]));
    img.into_ndarray2()
}

/// Intensity increasing by `dy` per row and `dx` per column.
pub fn ramp(height: usize, width: usize, dy: f32, dx: f32) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(y, x)| dy * y as f32 + dx * x as f32)
}

/// Alternating cells of 0 and 1.
pub fn checkerboard(height: usize, width: usize, cell: usize) -> Array2<f32> {
    Array2::from_shape_fn((height, width), |(y, x)| ((y / cell + x / cell) % 2) as f32)
}
