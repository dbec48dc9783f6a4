use nalgebra::Matrix3x4;
use ndarray::Array2;

use crate::{bbox::BBox, camera::Camera, image::SampleImage};

/// A detected subject box in one view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BBox,
    pub confidence: f64,
}

impl Detection {
    /// [left, top, right, bottom, confidence]
    pub fn to_array(&self) -> [f64; 5] {
        [
            self.bbox.left as f64,
            self.bbox.top as f64,
            self.bbox.right as f64,
            self.bbox.bottom as f64,
            self.confidence,
        ]
    }
}

/// Multi-view sample of one shot.
///
/// The per-view vectors (`images`, `cameras`, `detections`, `proj_matrices`,
/// `camera_indices`) always have the same length, one entry per available view.
/// `image_shapes_before_resize` is only filled when the images were resized.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sample {
    pub images: Vec<SampleImage>,
    pub cameras: Vec<Camera>,
    pub detections: Vec<Detection>,
    pub proj_matrices: Vec<Matrix3x4<f64>>,
    /// Label table camera index of each view.
    pub camera_indices: Vec<usize>,
    /// (height, width) of each view before resizing.
    pub image_shapes_before_resize: Vec<(usize, usize)>,
    /// J x 4 world keypoints, the last column is always 1.0.
    pub keypoints_3d: Array2<f64>,
    pub pred_keypoints_3d: Option<Array2<f64>>,
    pub index: usize,
    /// Whether the images were cropped to their detections.
    pub cropped: bool,
}

impl Sample {
    pub fn new(index: usize, keypoints_3d: Array2<f64>) -> Self {
        Self {
            keypoints_3d,
            index,
            ..Default::default()
        }
    }

    pub(crate) fn push_view(
        &mut self,
        camera_index: usize,
        image: SampleImage,
        camera: Camera,
        bbox: BBox,
    ) {
        self.images.push(image);
        self.detections.push(Detection {
            bbox,
            confidence: 1.0,
        });
        self.proj_matrices.push(camera.projection());
        self.cameras.push(camera);
        self.camera_indices.push(camera_index);
    }

    pub fn num_views(&self) -> usize {
        self.images.len()
    }

    /// Position in the per-view vectors of the label table camera `camera_index`.
    pub fn view_position(&self, camera_index: usize) -> Option<usize> {
        self.camera_indices.iter().position(|i| *i == camera_index)
    }
}
