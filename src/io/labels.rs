use std::path::Path;

use itertools::Itertools;
use nalgebra::{Matrix3, Vector3};
use ndarray::{Array2, Array3};
use serde_derive::{Deserialize, Serialize};

use super::dataset::DatasetError;
use crate::{bbox::BBox, camera::Camera, error::Error, skeleton::NUM_LABEL_JOINTS};

/// Stored calibration of one camera for one subject.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    #[serde(rename = "R")]
    pub rotation: [[f64; 3]; 3],
    #[serde(rename = "t")]
    pub translation: [f64; 3],
    #[serde(rename = "K")]
    pub intrinsics: [[f64; 3]; 3],
    #[serde(default)]
    pub dist: Vec<f64>,
}

impl CameraParams {
    pub fn to_camera(&self, name: &str) -> Camera {
        Camera::new(
            Matrix3::from_fn(|r, c| self.rotation[r][c]),
            Vector3::from(self.translation),
            Matrix3::from_fn(|r, c| self.intrinsics[r][c]),
            self.dist.clone(),
            name,
        )
    }
}

/// One recorded frame of a subject performing an action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    pub subject_idx: usize,
    pub action_idx: usize,
    pub frame_idx: usize,
    /// Frame number used for exported file names, defaults to `frame_idx`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_name: Option<usize>,
    #[serde(default)]
    pub person_id: usize,
    /// One [top, left, bottom, right] box per camera, all zeros when the view is missing.
    pub bbox_by_camera_tlbr: Vec<[i64; 4]>,
    pub keypoints: Vec<[f64; 3]>,
}

impl Shot {
    pub fn frame_name(&self) -> usize {
        self.frame_name.unwrap_or(self.frame_idx)
    }

    /// Detection of the camera in LTRB order.
    pub fn bbox(&self, camera_idx: usize) -> Option<BBox> {
        self.bbox_by_camera_tlbr
            .get(camera_idx)
            .map(|tlbr| BBox::from_tlbr(*tlbr))
    }
}

/// Label table of the multi-view dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelTable {
    pub subject_names: Vec<String>,
    pub action_names: Vec<String>,
    pub camera_names: Vec<String>,
    /// Calibration indexed by [subject][camera].
    pub cameras: Vec<Vec<CameraParams>>,
    pub table: Vec<Shot>,
}

impl LabelTable {
    /// Loads and validates a JSON label file.
    pub fn load<P: AsRef<Path>>(filepath: P) -> Result<Self, DatasetError> {
        let filepath = filepath.as_ref();
        if !filepath.is_file() {
            return Err(DatasetError::MissingFile(filepath.to_path_buf()));
        }
        let buffer = std::io::BufReader::new(std::fs::File::open(filepath)?);
        let labels: LabelTable = serde_json::from_reader(buffer)?;
        labels.validate()?;
        Ok(labels)
    }

    pub fn save<P: AsRef<Path>>(&self, filepath: P) -> Result<(), DatasetError> {
        let writer = std::io::BufWriter::new(std::fs::File::create(filepath)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Checks that every index and per-camera list is consistent with the name tables.
    pub fn validate(&self) -> Result<(), Error> {
        let n_cameras = self.camera_names.len();
        if self.cameras.len() != self.subject_names.len() {
            return Err(Error::assertion(format!(
                "Expected calibration for {} subjects, got {}",
                self.subject_names.len(),
                self.cameras.len()
            )));
        }
        if let Some(subject) = self.cameras.iter().position(|c| c.len() != n_cameras) {
            return Err(Error::assertion(format!(
                "Subject {} does not have calibration for {n_cameras} cameras",
                self.subject_names[subject]
            )));
        }

        for (row, shot) in self.table.iter().enumerate() {
            if shot.subject_idx >= self.subject_names.len()
                || shot.action_idx >= self.action_names.len()
            {
                return Err(Error::assertion(format!(
                    "Row {row} references an unknown subject or action"
                )));
            }
            if shot.bbox_by_camera_tlbr.len() != n_cameras {
                return Err(Error::assertion(format!(
                    "Row {row} has {} boxes for {n_cameras} cameras",
                    shot.bbox_by_camera_tlbr.len()
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn subject_index(&self, name: &str) -> Option<usize> {
        self.subject_names.iter().position(|s| s == name)
    }

    pub fn camera(&self, subject_idx: usize, camera_idx: usize) -> Option<&CameraParams> {
        self.cameras.get(subject_idx)?.get(camera_idx)
    }

    /// Keeps only the rows at `indices`, in that order.
    pub fn select_rows(&mut self, indices: &[usize]) {
        let table = std::mem::take(&mut self.table);
        self.table = indices.iter().map(|i| table[*i].clone()).collect();
    }

    /// Ground truth keypoints as an N x `num_joints` x 3 array.
    pub fn keypoints(&self, num_joints: usize) -> Result<Array3<f64>, Error> {
        if let Some(row) = self.table.iter().position(|s| s.keypoints.len() < num_joints) {
            return Err(Error::assertion(format!(
                "Row {row} has fewer than {num_joints} keypoints"
            )));
        }
        Ok(Array3::from_shape_fn(
            (self.table.len(), num_joints, 3),
            |(i, j, k)| self.table[i].keypoints[j][k],
        ))
    }

    pub fn action_indices(&self) -> Vec<usize> {
        self.table.iter().map(|shot| shot.action_idx).collect()
    }

    pub fn subject_indices(&self) -> Vec<usize> {
        self.table.iter().map(|shot| shot.subject_idx).collect()
    }

    /// Fails unless every row carries the full label skeleton.
    pub fn check_joint_count(&self) -> Result<(), Error> {
        match self
            .table
            .iter()
            .map(|shot| shot.keypoints.len())
            .find(|n| *n != NUM_LABEL_JOINTS)
        {
            Some(n) => Err(Error::assertion(format!(
                "Expected {NUM_LABEL_JOINTS} keypoints per shot, found {n}. Use a newer labels file"
            ))),
            None => Ok(()),
        }
    }
}

/// Externally predicted 3D keypoints, one pose per entry of `indexes`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    pub keypoints_3d: Vec<Vec<[f64; 3]>>,
    pub indexes: Vec<usize>,
}

impl Predictions {
    pub fn load<P: AsRef<Path>>(filepath: P) -> Result<Self, DatasetError> {
        let filepath = filepath.as_ref();
        if !filepath.is_file() {
            return Err(DatasetError::MissingFile(filepath.to_path_buf()));
        }
        let buffer = std::io::BufReader::new(std::fs::File::open(filepath)?);
        Ok(serde_json::from_reader(buffer)?)
    }

    pub fn save<P: AsRef<Path>>(&self, filepath: P) -> Result<(), DatasetError> {
        let writer = std::io::BufWriter::new(std::fs::File::create(filepath)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Poses sorted by their sample index, as an N x J x 3 array.
    pub fn ordered(&self) -> Result<Array3<f64>, Error> {
        if self.keypoints_3d.len() != self.indexes.len() {
            return Err(Error::assertion(format!(
                "{} predicted poses for {} indexes",
                self.keypoints_3d.len(),
                self.indexes.len()
            )));
        }
        let num_joints = self.keypoints_3d.first().map_or(0, |pose| pose.len());
        if self.keypoints_3d.iter().any(|pose| pose.len() != num_joints) {
            return Err(Error::assertion(
                "Predicted poses have different joint counts",
            ));
        }

        let order = (0..self.indexes.len())
            .sorted_by_key(|i| self.indexes[*i])
            .collect::<Vec<usize>>();
        Ok(Array3::from_shape_fn(
            (order.len(), num_joints, 3),
            |(i, j, k)| self.keypoints_3d[order[i]][j][k],
        ))
    }
}

/// Pads N x 3 keypoints with a trailing column of ones.
pub fn pad_keypoints(keypoints: &[[f64; 3]]) -> Array2<f64> {
    Array2::from_shape_fn((keypoints.len(), 4), |(i, j)| {
        if j < 3 {
            keypoints[i][j]
        } else {
            1.0
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_params() -> CameraParams {
        CameraParams {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [1.0, 2.0, 3.0],
            intrinsics: [[500.0, 0.0, 32.0], [0.0, 510.0, 24.0], [0.0, 0.0, 1.0]],
            dist: vec![0.1, 0.0],
        }
    }

    fn small_table() -> LabelTable {
        let shot = |subject_idx, action_idx, frame_idx| Shot {
            subject_idx,
            action_idx,
            frame_idx,
            frame_name: None,
            person_id: 0,
            bbox_by_camera_tlbr: vec![[0, 0, 10, 10]],
            keypoints: vec![[frame_idx as f64, 0.0, 0.0]; NUM_LABEL_JOINTS],
        };
        LabelTable {
            subject_names: vec!["S1".into(), "S9".into()],
            action_names: vec!["Walking-1".into()],
            camera_names: vec!["00_00".into()],
            cameras: vec![vec![camera_params()], vec![camera_params()]],
            table: vec![shot(0, 0, 0), shot(1, 0, 1), shot(0, 0, 2)],
        }
    }

    #[test]
    fn test_camera_params() {
        let camera = camera_params().to_camera("00_00");
        assert_eq!(camera.fx(), 500.0);
        assert_eq!(camera.fy(), 510.0);
        assert_eq!(camera.cx(), 32.0);
        assert_eq!(camera.translation, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(camera.name, "00_00");
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "subject_names": ["S1"],
            "action_names": ["Posing"],
            "camera_names": ["00_00", "00_01"],
            "cameras": [[
                {"R": [[1,0,0],[0,1,0],[0,0,1]], "t": [0,0,0], "K": [[1,0,0],[0,1,0],[0,0,1]]},
                {"R": [[1,0,0],[0,1,0],[0,0,1]], "t": [0,0,0], "K": [[1,0,0],[0,1,0],[0,0,1]], "dist": [0.1]}
            ]],
            "table": [{
                "subject_idx": 0, "action_idx": 0, "frame_idx": 7, "person_id": 2,
                "bbox_by_camera_tlbr": [[1, 2, 3, 4], [0, 0, 0, 0]],
                "keypoints": [[1.0, 2.0, 3.0]]
            }]
        }"#;
        let labels: LabelTable = serde_json::from_str(json).unwrap();
        labels.validate().unwrap();
        assert_eq!(labels.table[0].frame_name(), 7);
        assert_eq!(labels.table[0].person_id, 2);
        assert_eq!(labels.table[0].bbox(0), Some(BBox::new(2, 1, 4, 3)));
        assert!(labels.table[0].bbox(1).unwrap().is_empty());
        assert!(labels.check_joint_count().is_err());
    }

    #[test]
    fn test_validate_box_count() {
        let mut labels = small_table();
        labels.table[1].bbox_by_camera_tlbr.push([0, 0, 0, 0]);
        assert!(labels.validate().is_err());
    }

    #[test]
    fn test_select_rows() {
        let mut labels = small_table();
        labels.select_rows(&[2, 0]);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.table[0].frame_idx, 2);
        assert_eq!(labels.table[1].frame_idx, 0);
        assert_eq!(labels.subject_indices(), vec![0, 0]);
    }

    #[test]
    fn test_keypoints_array() {
        let labels = small_table();
        let keypoints = labels.keypoints(16).unwrap();
        assert_eq!(keypoints.shape(), &[3, 16, 3]);
        assert_eq!(keypoints[[2, 15, 0]], 2.0);
        assert!(labels.keypoints(18).is_err());
    }

    #[test]
    fn test_predictions_ordered() {
        let predictions = Predictions {
            keypoints_3d: vec![vec![[2.0; 3]; 2], vec![[0.0; 3]; 2], vec![[1.0; 3]; 2]],
            indexes: vec![20, 0, 10],
        };
        let ordered = predictions.ordered().unwrap();
        assert_eq!(ordered.shape(), &[3, 2, 3]);
        assert_eq!(ordered[[0, 0, 0]], 0.0);
        assert_eq!(ordered[[1, 1, 2]], 1.0);
        assert_eq!(ordered[[2, 0, 1]], 2.0);
    }

    #[test]
    fn test_pad_keypoints() {
        let padded = pad_keypoints(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(padded.shape(), &[2, 4]);
        assert_eq!(padded.column(3).to_vec(), vec![1.0, 1.0]);
        assert_eq!(padded[[1, 2]], 6.0);
    }
}
