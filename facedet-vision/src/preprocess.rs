use anyhow::Result;
use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::letterbox::LetterboxTransform;

/// Pixel normalisation applied before inference: `(px - mean) / std`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub mean: f32,
    pub std: f32,
    /// Feed channels as B, G, R instead of R, G, B.
    pub swap_rb: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            mean: 127.5,
            std: 128.0,
            swap_rb: false,
        }
    }
}

/// Letterbox `img` into a `target_size` square and build the `[1, 3, S, S]` input tensor.
pub fn prepare(
    img: &DynamicImage,
    target_size: u32,
    config: &PreprocessConfig,
) -> Result<(Array4<f32>, LetterboxTransform)> {
    let transform = LetterboxTransform::new(img.width(), img.height(), target_size);
    let canvas = transform.apply(img, FilterType::Triangle);
    Ok((to_tensor(&canvas, config)?, transform))
}

/// Convert a square canvas to a normalised NCHW tensor.
pub fn to_tensor(canvas: &DynamicImage, config: &PreprocessConfig) -> Result<Array4<f32>> {
    let rgb = canvas.to_rgb8();
    let (width, height) = rgb.dimensions();
    let pixel_count = (width * height) as usize;
    let mut input_data = vec![0.0f32; 3 * pixel_count];

    // Split into channel slices for better cache locality
    let (c0, rest) = input_data.split_at_mut(pixel_count);
    let (c1, c2) = rest.split_at_mut(pixel_count);
    let (r_channel, g_channel, b_channel) = if config.swap_rb {
        (c2, c1, c0)
    } else {
        (c0, c1, c2)
    };

    let scale = 1.0 / config.std;
    for (i, px) in rgb.as_raw().chunks_exact(3).enumerate() {
        r_channel[i] = (px[0] as f32 - config.mean) * scale;
        g_channel[i] = (px[1] as f32 - config.mean) * scale;
        b_channel[i] = (px[2] as f32 - config.mean) * scale;
    }

    Ok(Array4::from_shape_vec(
        (1, 3, height as usize, width as usize),
        input_data,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_channel_order() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([255, 127, 0])));
        let rgb = to_tensor(&img, &PreprocessConfig::default()).unwrap();
        assert!((rgb[[0, 0, 0, 0]] - (127.5 / 128.0)).abs() < 1e-6);
        assert!((rgb[[0, 2, 1, 1]] - (-127.5 / 128.0)).abs() < 1e-6);

        let bgr = to_tensor(
            &img,
            &PreprocessConfig {
                swap_rb: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(bgr[[0, 0, 0, 0]], rgb[[0, 2, 0, 0]]);
        assert_eq!(bgr[[0, 2, 0, 0]], rgb[[0, 0, 0, 0]]);
    }

    #[test]
    fn test_prepare_shape() {
        let img = DynamicImage::new_rgb8(300, 150);
        let (tensor, transform) = prepare(&img, 64, &PreprocessConfig::default()).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 64, 64]);
        assert_eq!(transform.offset_y, 16);
        // padding stays black -> (0 - mean) / std
        assert!((tensor[[0, 1, 0, 0]] + 127.5 / 128.0).abs() < 1e-6);
    }
}
