use std::fmt::Debug;

use burn::tensor::TensorData;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

/// Side length of the square network input.
pub const INPUT_SIZE: u32 = 224;

/// Turns a decoded image into the `[3, INPUT_SIZE, INPUT_SIZE]` tensor the
/// classifier expects. Must match whatever the artifact was trained with.
pub trait Preprocessor: Send + Sync + Debug {
    fn preprocess(&self, image: &DynamicImage) -> TensorData;
}

/// Bilinear resize and scale to `[0, 1]`, no normalization.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResizeToTensor;

impl Preprocessor for ResizeToTensor {
    fn preprocess(&self, image: &DynamicImage) -> TensorData {
        let resized = image.resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
        let (width, height) = resized.dimensions();
        let plane = (width * height) as usize;

        let mut values = vec![0f32; 3 * plane];
        for (i, pixel) in resized.to_rgb8().pixels().enumerate() {
            for (c, &channel) in pixel.0.iter().enumerate() {
                values[c * plane + i] = f32::from(channel) / 255.0;
            }
        }

        TensorData::new(values, [3, height as usize, width as usize])
    }
}

/// Grayscale replicated over three channels, resized, then
/// `(x - mean) / std` per channel. Suits models trained on rendered glyphs.
#[derive(Debug, Clone, Copy)]
pub struct GrayscaleNormalize {
    pub mean: f32,
    pub std: f32,
}

impl Default for GrayscaleNormalize {
    fn default() -> Self {
        Self { mean: 0.5, std: 0.5 }
    }
}

impl Preprocessor for GrayscaleNormalize {
    fn preprocess(&self, image: &DynamicImage) -> TensorData {
        let luma = image
            .grayscale()
            .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
            .to_luma8();
        let (width, height) = luma.dimensions();

        let channel: Vec<f32> = luma
            .pixels()
            .map(|p| (f32::from(p.0[0]) / 255.0 - self.mean) / self.std)
            .collect();

        let mut values = Vec::with_capacity(channel.len() * 3);
        for _ in 0..3 {
            values.extend_from_slice(&channel);
        }

        TensorData::new(values, [3, height as usize, width as usize])
    }
}
