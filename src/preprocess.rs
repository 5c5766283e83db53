use std::path::Path;

use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};
use ndarray::prelude::*;
use nshare::AsNdarray3;

use crate::errors::{Result, WoundAnalysisError};

pub const CHANNELS: usize = 3;

/// Per-channel RGB means on the 0..=255 scale, subtracted from every pixel.
/// Must match the convention the paired models were trained with.
pub const CHANNEL_MEANS: [f32; CHANNELS] = [123.68, 116.779, 103.939];

/// A preprocessed image in NHWC layout (batch = 1), mean-centered per channel.
///
/// Read-only once built; shared by reference across the analysis stages.
#[derive(Debug, Clone)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    pub fn new(data: Array4<f32>) -> Self {
        Self {
            data: data.as_standard_layout().into_owned(),
        }
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    pub fn height(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn channels(&self) -> usize {
        self.data.shape()[3]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flat row-major (height, width, channel) buffer.
    pub fn as_slice(&self) -> &[f32] {
        // constructor guarantees standard layout
        self.data.as_slice().unwrap_or(&[])
    }
}

/// Decode `path` and convert it to a `width`×`height` tensor.
pub fn preprocess(path: &Path, width: u32, height: u32) -> Result<ImageTensor> {
    let image = decode(path)?;
    Ok(image_to_tensor(&image, width, height))
}

/// Scale to cover `width`×`height`, center-crop the overflow, then
/// mean-center each channel.
pub fn image_to_tensor(image: &DynamicImage, width: u32, height: u32) -> ImageTensor {
    let rgb: RgbImage = image
        .resize_to_fill(width, height, FilterType::Triangle)
        .into_rgb8();

    // (channel, height, width) -> (height, width, channel)
    let mut hwc = rgb
        .as_ndarray3()
        .permuted_axes([1, 2, 0])
        .mapv(|v| v as f32);
    for (channel, mean) in CHANNEL_MEANS.iter().enumerate() {
        hwc.index_axis_mut(Axis(2), channel)
            .mapv_inplace(|v| v - mean);
    }

    ImageTensor::new(hwc.insert_axis(Axis(0)))
}

fn decode(path: &Path) -> Result<DynamicImage> {
    image::ImageReader::open(path)
        .map_err(|e| WoundAnalysisError::FileSystem {
            path: path.to_path_buf(),
            operation: "open image".to_string(),
            source: e,
        })?
        .with_guessed_format()
        .map_err(|e| WoundAnalysisError::FileSystem {
            path: path.to_path_buf(),
            operation: "sniff image format".to_string(),
            source: e,
        })?
        .decode()
        .map_err(|e| WoundAnalysisError::Decode {
            path: path.to_path_buf(),
            source: Box::new(e),
        })
}

/// True if `path` exists and decodes to an image with non-zero dimensions.
pub fn validate_photo(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    match decode(path) {
        Ok(image) => {
            let (w, h) = image.dimensions();
            w > 0 && h > 0
        }
        Err(_) => false,
    }
}
