use nalgebra::{Matrix3, Matrix3x4, Vector3, Vector4};
use ndarray::{Array2, ArrayView2, Axis};

use crate::bbox::BBox;

/// Pinhole camera with optional lens distortion coefficients.
///
/// The extrinsics map world points into the camera frame: `x_cam = R * x_world + t`.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
    /// Intrinsic matrix K.
    pub intrinsics: Matrix3<f64>,
    pub distortion: Vec<f64>,
    pub name: String,
}

impl Camera {
    pub fn new(
        rotation: Matrix3<f64>,
        translation: Vector3<f64>,
        intrinsics: Matrix3<f64>,
        distortion: Vec<f64>,
        name: &str,
    ) -> Self {
        Self {
            rotation,
            translation,
            intrinsics,
            distortion,
            name: name.to_string(),
        }
    }

    pub fn fx(&self) -> f64 {
        self.intrinsics[(0, 0)]
    }

    pub fn fy(&self) -> f64 {
        self.intrinsics[(1, 1)]
    }

    pub fn cx(&self) -> f64 {
        self.intrinsics[(0, 2)]
    }

    pub fn cy(&self) -> f64 {
        self.intrinsics[(1, 2)]
    }

    /// The `[R | t]` matrix.
    pub fn extrinsics(&self) -> Matrix3x4<f64> {
        let mut extrinsics = Matrix3x4::zeros();
        extrinsics.fixed_slice_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        extrinsics.fixed_slice_mut::<3, 1>(0, 3).copy_from(&self.translation);
        extrinsics
    }

    /// The `K * [R | t]` projection matrix.
    pub fn projection(&self) -> Matrix3x4<f64> {
        self.intrinsics * self.extrinsics()
    }

    /// Returns the camera for an image cropped to `bbox`.
    ///
    /// Only the principal point moves, the crop origin becomes the new image origin.
    pub fn cropped(&self, bbox: &BBox) -> Self {
        let mut intrinsics = self.intrinsics;
        intrinsics[(0, 2)] -= bbox.left as f64;
        intrinsics[(1, 2)] -= bbox.top as f64;
        Self {
            intrinsics,
            ..self.clone()
        }
    }

    /// Returns the camera for an image resized from `image_shape` to `new_image_shape`.
    ///
    /// # Arguments
    ///
    /// * image_shape: (height, width) before resizing.
    /// * new_image_shape: (height, width) after resizing.
    pub fn resized(&self, image_shape: (usize, usize), new_image_shape: (usize, usize)) -> Self {
        let (height, width) = image_shape;
        let (new_height, new_width) = new_image_shape;
        let x_ratio = new_width as f64 / width as f64;
        let y_ratio = new_height as f64 / height as f64;

        let mut intrinsics = self.intrinsics;
        intrinsics[(0, 0)] *= x_ratio;
        intrinsics[(1, 1)] *= y_ratio;
        intrinsics[(0, 2)] *= x_ratio;
        intrinsics[(1, 2)] *= y_ratio;
        Self {
            intrinsics,
            ..self.clone()
        }
    }

    /// Project a 3D world point into image space, ignoring distortion.
    ///
    /// # Returns
    ///
    /// * (x and y) coordinates.
    pub fn project(&self, point: &Vector3<f64>) -> (f64, f64) {
        let p = self.projection() * Vector4::new(point[0], point[1], point[2], 1.0);
        (p[0] / p[2], p[1] / p[2])
    }
}

/// Projects an array of 3D points (N x 3) into the image plane using a 3x4
/// projection matrix, without applying lens distortion.
///
/// # Returns
///
/// * An N x 2 array with the pixel coordinates.
pub fn project_points_without_distortion(
    projection: &Matrix3x4<f64>,
    points: &ArrayView2<f64>,
) -> Array2<f64> {
    let mut result = Array2::<f64>::zeros((points.len_of(Axis(0)), 2));
    for (point, mut out) in points.axis_iter(Axis(0)).zip(result.axis_iter_mut(Axis(0))) {
        let p = projection * Vector4::new(point[0], point[1], point[2], 1.0);
        out[0] = p[0] / p[2];
        out[1] = p[1] / p[2];
    }
    result
}
