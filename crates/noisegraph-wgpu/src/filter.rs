//! Host-side image filters.
//!
//! Blur and normal-map generation need neighbourhood access that does not fit the
//! one-texel-per-invocation kernels, so both backends run them here on read-back pixels.

use glam::Vec3;
use image::{Rgba, RgbaImage, imageops};

use crate::backend::ImageFilter;

/// Applies a filter, producing an image of the same size as `input`
pub fn apply(filter: &ImageFilter, input: &RgbaImage) -> RgbaImage {
    match *filter {
        ImageFilter::GaussianBlur { sigma } => gaussian_blur(input, sigma),
        ImageFilter::NormalMap { intensity, smoothing } => normal_map(input, intensity, smoothing),
    }
}

fn gaussian_blur(input: &RgbaImage, sigma: f32) -> RgbaImage {
    if sigma <= 0.0 {
        return input.clone();
    }
    imageops::blur(input, sigma)
}

/// Sobel gradient of the red channel, encoded as a tangent-space normal
///
/// # Arguments
/// * `intensity` - Height scale; larger values give steeper normals
/// * `smoothing` - Pre-blur strength; the blur sigma is `smoothing * 4`
fn normal_map(input: &RgbaImage, intensity: f32, smoothing: f32) -> RgbaImage {
    let blurred;
    let source = if smoothing > 0.0 {
        blurred = imageops::blur(input, smoothing * 4.0);
        &blurred
    } else {
        input
    };

    let (width, height) = source.dimensions();
    let height_at = |x: i64, y: i64| -> f32 {
        let x = x.clamp(0, width as i64 - 1) as u32;
        let y = y.clamp(0, height as i64 - 1) as u32;
        source.get_pixel(x, y).0[0] as f32 / 255.0
    };

    RgbaImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let dx = (height_at(x + 1, y - 1) + 2.0 * height_at(x + 1, y) + height_at(x + 1, y + 1))
            - (height_at(x - 1, y - 1) + 2.0 * height_at(x - 1, y) + height_at(x - 1, y + 1));
        let dy = (height_at(x - 1, y + 1) + 2.0 * height_at(x, y + 1) + height_at(x + 1, y + 1))
            - (height_at(x - 1, y - 1) + 2.0 * height_at(x, y - 1) + height_at(x + 1, y - 1));
        let normal = Vec3::new(-dx * intensity, -dy * intensity, 1.0).normalize();
        let encoded = (normal * 0.5 + 0.5).clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
        Rgba([encoded.x.round() as u8, encoded.y.round() as u8, encoded.z.round() as u8, 255])
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_blur_is_identity() {
        let image = RgbaImage::from_fn(8, 8, |x, y| Rgba([(x * 30) as u8, (y * 30) as u8, 7, 255]));
        assert_eq!(apply(&ImageFilter::GaussianBlur { sigma: 0.0 }, &image), image);
    }

    #[test]
    fn test_blur_keeps_flat_image() {
        let image = RgbaImage::from_pixel(16, 16, Rgba([100, 100, 100, 255]));
        let blurred = apply(&ImageFilter::GaussianBlur { sigma: 2.0 }, &image);
        assert_eq!(blurred.dimensions(), (16, 16));
        for pixel in blurred.pixels() {
            assert!(pixel.0[0].abs_diff(100) <= 1);
        }
    }

    #[test]
    fn test_flat_height_points_up() {
        let image = RgbaImage::from_pixel(8, 8, Rgba([90, 0, 0, 255]));
        let normals = apply(&ImageFilter::NormalMap { intensity: 3.0, smoothing: 0.0 }, &image);
        assert_eq!(normals.get_pixel(4, 4).0, [128, 128, 255, 255]);
    }

    #[test]
    fn test_slope_tilts_normal() {
        let image = RgbaImage::from_fn(16, 16, |x, _| Rgba([(x * 16) as u8, 0, 0, 255]));
        let normals = apply(&ImageFilter::NormalMap { intensity: 1.0, smoothing: 0.0 }, &image);
        let pixel = normals.get_pixel(8, 8).0;
        // Height rises to the right, so the normal leans left
        assert!(pixel[0] < 128);
        assert_eq!(pixel[1], 128);
        assert_eq!(pixel[3], 255);
    }
}
