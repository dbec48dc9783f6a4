mod rgb;
pub use rgb::{IntoArray3, IntoImageRgb8};

mod ops;
pub use ops::{
    crop_image, denormalize_image, normalize_image, resize_image, IMAGENET_MEAN, IMAGENET_STD,
};

use image::RgbImage;
use ndarray::Array3;

use crate::error::Error;

/// A per-camera sample image, either raw RGB or ImageNet-normalized.
/// Both layouts are [height, width, channels].
#[derive(Clone, Debug, PartialEq)]
pub enum SampleImage {
    Rgb(Array3<u8>),
    Normalized(Array3<f32>),
}

impl SampleImage {
    /// (height, width) of the image.
    pub fn shape(&self) -> (usize, usize) {
        let dim = match self {
            SampleImage::Rgb(image) => image.dim(),
            SampleImage::Normalized(image) => image.dim(),
        };
        (dim.0, dim.1)
    }

    pub fn width(&self) -> usize {
        self.shape().1
    }

    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// Converts into an 8-bit RGB image, undoing the normalization if needed.
    pub fn to_image_rgb8(&self) -> Result<RgbImage, Error> {
        match self {
            SampleImage::Rgb(image) => image.clone().into_image_rgb8(),
            SampleImage::Normalized(image) => denormalize_image(image).into_image_rgb8(),
        }
    }
}
