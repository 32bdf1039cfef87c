//! Letterbox geometry: aspect-preserving resize onto a square canvas.
//!
//! The detector runs on a fixed `target_size x target_size` input. The source image is
//! scaled by `min(target/width, target/height)` and centred, the remainder is padding.
//! Every decoded coordinate has to go through [`LetterboxTransform::inverse`] to get
//! back to original-image pixels.

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use serde::{Deserialize, Serialize};

/// Placement of the resized image inside the square model input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LetterboxTransform {
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub target_size: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub resized_width: u32,
    pub resized_height: u32,
}

impl LetterboxTransform {
    /// Compute the transform for an image of `width x height` fitted into `target_size`.
    ///
    /// Zero dimensions are clamped to 1.
    pub fn new(width: u32, height: u32, target_size: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let target_size = target_size.max(1);

        let target = target_size as f64;
        let scale = (target / width as f64).min(target / height as f64);
        let (new_width, new_height) = scaled_dims(width, height, scale, target_size);

        Self {
            scale: scale as f32,
            offset_x: target_size.saturating_sub(new_width) / 2,
            offset_y: target_size.saturating_sub(new_height) / 2,
            target_size,
            original_width: width,
            original_height: height,
            resized_width: new_width,
            resized_height: new_height,
        }
    }

    /// Size of the resized image before padding.
    pub fn resized_dims(&self) -> (u32, u32) {
        (self.resized_width, self.resized_height)
    }

    /// Map an original-image point into model input space.
    pub fn forward(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale + self.offset_x as f32,
            y * self.scale + self.offset_y as f32,
        )
    }

    /// Map a model-space point back to original-image space. No clamping.
    pub fn inverse(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.offset_x as f32) / self.scale,
            (y - self.offset_y as f32) / self.scale,
        )
    }

    /// Clamp a point to `[0, width] x [0, height]` of the original image.
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x.clamp(0.0, self.original_width as f32),
            y.clamp(0.0, self.original_height as f32),
        )
    }

    /// Resize `img` and paste it onto a black square canvas at the offsets.
    pub fn apply(&self, img: &DynamicImage, filter: FilterType) -> DynamicImage {
        let (new_width, new_height) = self.resized_dims();
        let resized = if img.dimensions() == (new_width, new_height) {
            img.clone()
        } else {
            img.resize_exact(new_width, new_height, filter)
        };

        let mut canvas = DynamicImage::new_rgb8(self.target_size, self.target_size);
        image::imageops::overlay(
            &mut canvas,
            &resized,
            self.offset_x as i64,
            self.offset_y as i64,
        );
        canvas
    }
}

fn scaled_dims(width: u32, height: u32, scale: f64, target_size: u32) -> (u32, u32) {
    let w = ((width as f64 * scale).round() as u32).clamp(1, target_size);
    let h = ((height as f64 * scale).round() as u32).clamp(1, target_size);
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landscape_hd() {
        let t = LetterboxTransform::new(1920, 1080, 640);
        assert!((t.scale - 1.0 / 3.0).abs() < 1e-4);
        assert_eq!(t.offset_x, 0);
        assert_eq!(t.offset_y, 140);
        assert_eq!(t.resized_dims(), (640, 360));
    }

    #[test]
    fn test_portrait() {
        let t = LetterboxTransform::new(480, 640, 640);
        assert!((t.scale - 1.0).abs() < 1e-6);
        assert_eq!(t.offset_x, 80);
        assert_eq!(t.offset_y, 0);
    }

    #[test]
    fn test_square_upscale() {
        let t = LetterboxTransform::new(320, 320, 640);
        assert!((t.scale - 2.0).abs() < 1e-6);
        assert_eq!((t.offset_x, t.offset_y), (0, 0));
    }

    #[test]
    fn test_zero_dims_clamped() {
        let t = LetterboxTransform::new(0, 0, 0);
        assert_eq!(t.target_size, 1);
        assert_eq!(t.original_width, 1);
        assert!(t.scale > 0.0);
    }

    #[test]
    fn test_inverse_undoes_forward() {
        let t = LetterboxTransform::new(1920, 1080, 640);
        let (mx, my) = t.forward(960.0, 540.0);
        assert!((mx - 320.0).abs() < 1e-3);
        assert!((my - 320.0).abs() < 1e-3);
        let (x, y) = t.inverse(mx, my);
        assert!((x - 960.0).abs() < 1e-2);
        assert!((y - 540.0).abs() < 1e-2);
    }

    #[test]
    fn test_apply_produces_square_canvas() {
        let img = DynamicImage::new_rgb8(200, 100);
        let t = LetterboxTransform::new(200, 100, 64);
        let out = t.apply(&img, FilterType::Nearest);
        assert_eq!(out.dimensions(), (64, 64));
        assert_eq!(t.offset_y, 16);
    }
}
