use image::DynamicImage;
use image::imageops::FilterType;
use ndarray::Array4;
use std::path::Path;

use super::model::InferenceError;
use crate::config::{Normalization, PreprocessingConfig, ResizeFilter, TensorLayout};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

pub fn load_and_preprocess(
    path: &Path,
    config: &PreprocessingConfig,
) -> Result<Array4<f32>, InferenceError> {
    let image = image::open(path)?;
    preprocess(&image, config)
}

/// Resizes to a square RGB image and packs it into a batch of one.
pub fn preprocess(
    image: &DynamicImage,
    config: &PreprocessingConfig,
) -> Result<Array4<f32>, InferenceError> {
    let size = config.image_size;
    if size == 0 {
        return Err(InferenceError::Preprocessing("image size must be positive".into()));
    }

    let rgb = image
        .resize_exact(size, size, config.resize_filter.into())
        .to_rgb8();
    let side = size as usize;

    let shape = match config.layout {
        TensorLayout::Nhwc => (1, side, side, 3),
        TensorLayout::Nchw => (1, 3, side, side),
    };
    let mut tensor = Array4::<f32>::zeros(shape);

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for c in 0..3 {
            let value = normalize(pixel[c], c, config.normalization);
            match config.layout {
                TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
            }
        }
    }

    Ok(tensor)
}

fn normalize(value: u8, channel: usize, normalization: Normalization) -> f32 {
    let value = value as f32;
    match normalization {
        Normalization::Raw => value,
        Normalization::Unit => value / 255.0,
        Normalization::Imagenet => (value / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_nhwc_raw_shape_and_values() {
        let config = PreprocessingConfig::default();
        let tensor = preprocess(&solid(50, 30, [10, 20, 30]), &config).unwrap();

        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert_eq!(tensor[[0, 0, 0, 0]], 10.0);
        assert_eq!(tensor[[0, 223, 223, 2]], 30.0);
        assert!(tensor.as_slice().is_some());
    }

    #[test]
    fn test_nchw_unit_scaling() {
        let config = PreprocessingConfig {
            image_size: 8,
            layout: TensorLayout::Nchw,
            normalization: Normalization::Unit,
            resize_filter: ResizeFilter::Triangle,
        };
        let tensor = preprocess(&solid(16, 16, [255, 0, 51]), &config).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 8, 8]);
        assert!((tensor[[0, 0, 4, 4]] - 1.0).abs() < 1e-6);
        assert!((tensor[[0, 1, 4, 4]]).abs() < 1e-6);
        assert!((tensor[[0, 2, 4, 4]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_imagenet_normalization() {
        let value = normalize(255, 0, Normalization::Imagenet);
        assert!((value - (1.0 - 0.485) / 0.229).abs() < 1e-5);
    }

    #[test]
    fn test_grayscale_input_is_expanded_to_rgb() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(4, 4, image::Luma([77])));
        let config = PreprocessingConfig {
            image_size: 4,
            ..PreprocessingConfig::default()
        };
        let tensor = preprocess(&gray, &config).unwrap();
        assert_eq!(tensor[[0, 1, 1, 0]], 77.0);
        assert_eq!(tensor[[0, 1, 1, 2]], 77.0);
    }

    #[test]
    fn test_zero_image_size_is_preprocessing_error() {
        let config = PreprocessingConfig {
            image_size: 0,
            ..PreprocessingConfig::default()
        };
        let err = preprocess(&solid(4, 4, [1, 2, 3]), &config).unwrap_err();
        assert!(matches!(err, InferenceError::Preprocessing(_)));
    }
}
