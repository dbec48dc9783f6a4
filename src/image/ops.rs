use image::imageops::{self, FilterType};
use ndarray::{s, Array3};

use super::{IntoArray3, IntoImageRgb8};
use crate::{bbox::BBox, error::Error};

/// ImageNet channel means, RGB order.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// ImageNet channel standard deviations, RGB order.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Crops an [height, width, channels] image to `bbox`.
///
/// Regions of the box outside the image are filled with zeros, so the output
/// always has the box size.
pub fn crop_image(image: &Array3<u8>, bbox: &BBox) -> Array3<u8> {
    let (height, width, channels) = image.dim();
    let out_height = bbox.height().max(0) as usize;
    let out_width = bbox.width().max(0) as usize;
    let mut cropped = Array3::<u8>::zeros((out_height, out_width, channels));

    let src_top = bbox.top.clamp(0, height as i64);
    let src_bottom = bbox.bottom.clamp(0, height as i64);
    let src_left = bbox.left.clamp(0, width as i64);
    let src_right = bbox.right.clamp(0, width as i64);
    if src_top >= src_bottom || src_left >= src_right {
        return cropped;
    }

    let dst_top = (src_top - bbox.top) as usize;
    let dst_left = (src_left - bbox.left) as usize;
    let rows = (src_bottom - src_top) as usize;
    let cols = (src_right - src_left) as usize;

    cropped
        .slice_mut(s![dst_top..dst_top + rows, dst_left..dst_left + cols, ..])
        .assign(&image.slice(s![
            src_top as usize..src_bottom as usize,
            src_left as usize..src_right as usize,
            ..
        ]));
    cropped
}

/// Resizes an RGB image to `shape` = (height, width) with bilinear (`Triangle`) filtering.
pub fn resize_image(image: Array3<u8>, shape: (usize, usize)) -> Result<Array3<u8>, Error> {
    let (height, width) = shape;
    if height == 0 || width == 0 {
        return Err(Error::invalid_parameter(format!(
            "Cannot resize to an empty shape {height}x{width}"
        )));
    }
    let (src_height, src_width, _) = image.dim();
    if src_height == 0 || src_width == 0 {
        return Err(Error::invalid_parameter("Cannot resize an empty image"));
    }

    let image = image.into_image_rgb8()?;
    Ok(imageops::resize(&image, width as u32, height as u32, FilterType::Triangle).into_array3())
}

/// Scales pixel values into [0, 1] and standardizes them with the ImageNet statistics.
pub fn normalize_image(image: &Array3<u8>) -> Array3<f32> {
    Array3::from_shape_fn(image.dim(), |(row, col, channel)| {
        let c = channel % 3;
        (image[[row, col, channel]] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
    })
}

/// Inverse of [`normalize_image`], clamping into the u8 range.
pub fn denormalize_image(image: &Array3<f32>) -> Array3<u8> {
    Array3::from_shape_fn(image.dim(), |(row, col, channel)| {
        let c = channel % 3;
        let v = (image[[row, col, channel]] * IMAGENET_STD[c] + IMAGENET_MEAN[c]) * 255.0;
        num::clamp(v.round(), 0.0, 255.0) as u8
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use ndarray::Array3;
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn gradient_rgb() -> Array3<u8> {
        Array3::from_shape_fn((40, 60, 3), |(y, x, c)| ((y * 3 + x * 2 + c * 50) % 256) as u8)
    }

    #[rstest]
    fn verify_crop_inside(gradient_rgb: Array3<u8>) {
        let bbox = BBox::new(10, 5, 30, 25);
        let cropped = crop_image(&gradient_rgb, &bbox);
        assert_eq!(cropped.dim(), (20, 20, 3));
        assert_eq!(cropped[[0, 0, 1]], gradient_rgb[[5, 10, 1]]);
        assert_eq!(cropped[[19, 19, 2]], gradient_rgb[[24, 29, 2]]);
    }

    #[rstest]
    fn verify_crop_pads_outside(gradient_rgb: Array3<u8>) {
        let bbox = BBox::new(-10, -4, 20, 16);
        let cropped = crop_image(&gradient_rgb, &bbox);
        assert_eq!(cropped.dim(), (20, 30, 3));
        assert_eq!(cropped[[0, 0, 0]], 0);
        assert_eq!(cropped[[3, 9, 2]], 0);
        assert_eq!(cropped[[4, 10, 2]], gradient_rgb[[0, 0, 2]]);
        assert_eq!(cropped[[19, 29, 0]], gradient_rgb[[15, 19, 0]]);
    }

    #[rstest]
    fn verify_crop_fully_outside(gradient_rgb: Array3<u8>) {
        let cropped = crop_image(&gradient_rgb, &BBox::new(100, 100, 110, 120));
        assert_eq!(cropped.dim(), (20, 10, 3));
        assert!(cropped.iter().all(|v| *v == 0));
    }

    #[rstest]
    fn verify_resize(gradient_rgb: Array3<u8>) {
        let resized = resize_image(gradient_rgb, (16, 24)).unwrap();
        assert_eq!(resized.dim(), (16, 24, 3));
    }

    #[rstest]
    fn verify_resize_rejects_empty(gradient_rgb: Array3<u8>) {
        assert!(resize_image(gradient_rgb, (0, 24)).is_err());
    }

    #[rstest]
    fn verify_normalize(gradient_rgb: Array3<u8>) {
        let normalized = normalize_image(&gradient_rgb);
        let expected = (gradient_rgb[[2, 3, 1]] as f32 / 255.0 - 0.456) / 0.224;
        assert_relative_eq!(normalized[[2, 3, 1]], expected, epsilon = 1e-6);
        assert_eq!(denormalize_image(&normalized), gradient_rgb);
    }
}
