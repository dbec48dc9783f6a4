use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{Array2, Array3, Axis};
use serde_derive::{Deserialize, Serialize};

use super::{DatasetError, MultiviewDataset, Sample, ShotInfo};
use crate::{
    error::Error,
    image::{crop_image, normalize_image, resize_image, IntoArray3, SampleImage},
    io::labels::{pad_keypoints, LabelTable, Predictions, Shot},
    metrics::{evaluate_keypoints, Evaluation, JointTransfer, PoseGrouping},
    skeleton::KeypointKind,
};

/// Options of [`PanopticDataset`]. Every field is optional when read from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// JSON file with externally predicted keypoints, see [`Predictions`].
    pub pred_results_path: Option<PathBuf>,
    /// (height, width) the images are resized to, `None` keeps their size.
    pub image_shape: Option<(usize, usize)>,
    pub train: bool,
    pub test: bool,
    /// Keeps one test frame out of every n.
    pub retain_every_n_frames_in_test: usize,
    pub scale_bbox: f64,
    pub square_bbox: bool,
    pub norm_image: bool,
    /// Keypoint format, `"mpii"` or `"cmu"`.
    pub kind: String,
    pub undistort_images: bool,
    /// Camera indices never loaded.
    pub ignore_cameras: Vec<usize>,
    /// When not empty, only these camera indices are loaded.
    pub choose_cameras: Vec<usize>,
    pub crop: bool,
    pub train_subjects: Vec<String>,
    pub test_subjects: Vec<String>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            pred_results_path: None,
            image_shape: Some((256, 256)),
            train: false,
            test: false,
            retain_every_n_frames_in_test: 1,
            scale_bbox: 1.5,
            square_bbox: false,
            norm_image: true,
            kind: "mpii".to_string(),
            undistort_images: false,
            ignore_cameras: Vec::new(),
            choose_cameras: Vec::new(),
            crop: true,
            train_subjects: ["S1", "S5", "S6", "S7", "S8"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            test_subjects: ["S9", "S11"].iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DatasetConfig {
    pub fn from_json_file<P: AsRef<Path>>(filepath: P) -> Result<Self, DatasetError> {
        let filepath = filepath.as_ref();
        if !filepath.is_file() {
            return Err(DatasetError::MissingFile(filepath.to_path_buf()));
        }
        let buffer = std::io::BufReader::new(std::fs::File::open(filepath)?);
        Ok(serde_json::from_reader(buffer)?)
    }
}

/// Multi-view CMU Panoptic dataset.
///
/// Images are expected at
/// `<root>/<subject>/<action>/imageSequence[-undistorted]/<camera>/img_%06d.jpg`,
/// numbered from 1.
pub struct PanopticDataset {
    root: PathBuf,
    labels: LabelTable,
    config: DatasetConfig,
    kind: KeypointKind,
    keypoints_3d_pred: Option<Array3<f64>>,
}

fn resolve_subjects(labels: &LabelTable, names: &[String]) -> Result<Vec<usize>, Error> {
    names
        .iter()
        .map(|name| {
            labels
                .subject_index(name)
                .ok_or_else(|| Error::invalid_parameter(format!("Unknown subject {name}")))
        })
        .collect()
}

impl PanopticDataset {
    /// Loads the label table and, if configured, the predictions.
    ///
    /// # Arguments
    ///
    /// * root: Directory with the extracted images.
    /// * labels_path: JSON label table, see [`LabelTable`].
    /// * config: Split and image options.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        root: P,
        labels_path: Q,
        config: DatasetConfig,
    ) -> Result<Self, DatasetError> {
        if !config.train && !config.test {
            return Err(Error::invalid_parameter(
                "PanopticDataset must be constructed with at least one of test or train",
            )
            .into());
        }
        let labels = LabelTable::load(labels_path)?;
        let mut dataset = Self::from_labels(root, labels, config)?;

        if let Some(pred_path) = dataset.config.pred_results_path.clone() {
            let predictions = Predictions::load(&pred_path)?.ordered()?;
            dataset.set_predictions(predictions)?;
        }
        Ok(dataset)
    }

    /// Builds the dataset from an already loaded label table, keeping the rows of the
    /// requested splits. Train rows come first, then the strided test rows.
    pub fn from_labels<P: AsRef<Path>>(
        root: P,
        mut labels: LabelTable,
        config: DatasetConfig,
    ) -> Result<Self, Error> {
        if !config.train && !config.test {
            return Err(Error::invalid_parameter(
                "PanopticDataset must be constructed with at least one of test or train",
            ));
        }
        if config.retain_every_n_frames_in_test == 0 {
            return Err(Error::invalid_parameter(
                "retain_every_n_frames_in_test must be at least 1",
            ));
        }
        let kind = config.kind.parse::<KeypointKind>()?;
        labels.validate()?;

        let n_cameras = labels.camera_names.len();
        if let Some(camera) = config
            .ignore_cameras
            .iter()
            .chain(config.choose_cameras.iter())
            .find(|c| **c >= n_cameras)
        {
            return Err(Error::invalid_parameter(format!(
                "Camera index {camera} out of range, there are {n_cameras} cameras"
            )));
        }

        let mut indices = Vec::new();
        if config.train {
            let subjects = resolve_subjects(&labels, &config.train_subjects)?;
            indices.extend(
                labels
                    .table
                    .iter()
                    .enumerate()
                    .filter(|(_, shot)| subjects.contains(&shot.subject_idx))
                    .map(|(i, _)| i),
            );
        }
        if config.test {
            let subjects = resolve_subjects(&labels, &config.test_subjects)?;
            indices.extend(
                labels
                    .table
                    .iter()
                    .enumerate()
                    .filter(|(_, shot)| subjects.contains(&shot.subject_idx))
                    .map(|(i, _)| i)
                    .step_by(config.retain_every_n_frames_in_test),
            );
        }
        labels.select_rows(&indices);
        labels.check_joint_count()?;

        info!(
            "Loaded {} shots (train={}, test={}) with {} cameras",
            labels.len(),
            config.train,
            config.test,
            n_cameras
        );

        Ok(Self {
            root: root.as_ref().to_path_buf(),
            labels,
            config,
            kind,
            keypoints_3d_pred: None,
        })
    }

    /// Attaches predictions sorted by sample index. The test stride is applied here,
    /// so `predictions` covers the unstrided split.
    pub fn set_predictions(&mut self, predictions: Array3<f64>) -> Result<(), Error> {
        let predictions = predictions
            .axis_iter(Axis(0))
            .step_by(self.config.retain_every_n_frames_in_test)
            .map(|pose| pose.insert_axis(Axis(0)))
            .collect::<Vec<_>>();
        if predictions.len() != self.len() {
            return Err(Error::assertion(format!(
                "[train={}, test={}] labels have {} samples, but predictions have {}",
                self.config.train,
                self.config.test,
                self.len(),
                predictions.len()
            )));
        }
        if predictions.is_empty() {
            self.keypoints_3d_pred = Some(Array3::zeros((0, self.kind.num_keypoints(), 3)));
            return Ok(());
        }
        let stacked = ndarray::concatenate(Axis(0), &predictions)
            .map_err(|err| Error::assertion(err.to_string()))?;
        self.keypoints_3d_pred = Some(stacked);
        Ok(())
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    pub fn predictions(&self) -> Option<&Array3<f64>> {
        self.keypoints_3d_pred.as_ref()
    }

    pub fn image_path(&self, shot: &Shot, camera_idx: usize) -> PathBuf {
        let sequence = if self.config.undistort_images {
            "imageSequence-undistorted"
        } else {
            "imageSequence"
        };
        self.root
            .join(&self.labels.subject_names[shot.subject_idx])
            .join(&self.labels.action_names[shot.action_idx])
            .join(sequence)
            .join(&self.labels.camera_names[camera_idx])
            .join(format!("img_{:06}.jpg", shot.frame_idx + 1))
    }

    fn uses_camera(&self, camera_idx: usize) -> bool {
        !self.config.ignore_cameras.contains(&camera_idx)
            && (self.config.choose_cameras.is_empty()
                || self.config.choose_cameras.contains(&camera_idx))
    }

    /// World keypoints of `index` padded with a column of ones.
    pub fn keypoints_3d(&self, index: usize) -> Option<Array2<f64>> {
        let shot = self.labels.table.get(index)?;
        Some(pad_keypoints(&shot.keypoints[..self.kind.num_keypoints()]))
    }

    /// Scores `keypoints_3d_predicted` (N x J x 3, aligned with this dataset's rows).
    ///
    /// # Returns
    ///
    /// * The overall root-relative error and the scores by subject and action.
    pub fn evaluate(
        &self,
        keypoints_3d_predicted: &Array3<f64>,
        transfer: JointTransfer,
    ) -> Result<(f64, Evaluation), Error> {
        let ground_truth = self.labels.keypoints(self.kind.num_keypoints())?;
        let action_idx = self.labels.action_indices();
        let subject_idx = self.labels.subject_indices();
        let grouping = PoseGrouping {
            action_idx: &action_idx,
            subject_idx: &subject_idx,
            action_names: &self.labels.action_names,
            subject_names: &self.labels.subject_names,
        };
        evaluate_keypoints(
            &ground_truth.view(),
            &keypoints_3d_predicted.view(),
            &grouping,
            transfer,
            self.kind.root_index(),
        )
    }
}

impl MultiviewDataset for PanopticDataset {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Result<Sample, DatasetError> {
        let shot = self.labels.table.get(index).ok_or_else(|| {
            Error::invalid_parameter(format!(
                "Index {index} out of range for {} samples",
                self.len()
            ))
        })?;

        let keypoints_3d = pad_keypoints(&shot.keypoints[..self.kind.num_keypoints()]);
        let mut sample = Sample::new(index, keypoints_3d);
        sample.cropped = self.config.crop;

        for (camera_idx, camera_name) in self.labels.camera_names.iter().enumerate() {
            if !self.uses_camera(camera_idx) {
                continue;
            }

            let bbox = match shot.bbox(camera_idx) {
                Some(bbox) if !bbox.is_empty() => bbox,
                _ => {
                    debug!("Sample {index}: no detection in camera {camera_name}, skipping");
                    continue;
                }
            };
            let bbox = if self.config.square_bbox {
                bbox.square()
            } else {
                bbox
            };
            let bbox = bbox.scale(self.config.scale_bbox);

            let image_path = self.image_path(shot, camera_idx);
            if !image_path.is_file() {
                return Err(DatasetError::MissingFile(image_path));
            }
            let mut image = image::open(&image_path)?.into_rgb8().into_array3();

            let mut camera = self
                .labels
                .camera(shot.subject_idx, camera_idx)
                .ok_or_else(|| {
                    Error::assertion(format!("No calibration for camera {camera_name}"))
                })?
                .to_camera(camera_name);

            if self.config.crop {
                image = crop_image(&image, &bbox);
                camera = camera.cropped(&bbox);
            }

            if let Some(image_shape) = self.config.image_shape {
                let (height, width, _) = image.dim();
                image = resize_image(image, image_shape)?;
                camera = camera.resized((height, width), image_shape);
                sample.image_shapes_before_resize.push((height, width));
            }

            let image = if self.config.norm_image {
                SampleImage::Normalized(normalize_image(&image))
            } else {
                SampleImage::Rgb(image)
            };

            sample.push_view(camera_idx, image, camera, bbox);
        }

        if let Some(pred) = &self.keypoints_3d_pred {
            sample.pred_keypoints_3d = Some(pred.index_axis(Axis(0), index).to_owned());
        }

        debug!("Sample {index}: assembled {} views", sample.num_views());
        Ok(sample)
    }

    fn shot_info(&self, index: usize) -> Option<ShotInfo> {
        let shot = self.labels.table.get(index)?;
        Some(ShotInfo {
            subject_name: self.labels.subject_names[shot.subject_idx].clone(),
            action_idx: shot.action_idx,
            action_name: self.labels.action_names[shot.action_idx].clone(),
            frame_name: shot.frame_name(),
            person_id: shot.person_id,
        })
    }

    fn camera_names(&self) -> &[String] {
        &self.labels.camera_names
    }

    fn keypoint_kind(&self) -> KeypointKind {
        self.kind
    }
}
