use std::path::PathBuf;

use image::{Rgb, RgbImage};
use rstest::fixture;
use tempfile::TempDir;

use crate::{
    io::{
        dataset::DatasetError,
        labels::{CameraParams, LabelTable, Predictions, Shot},
    },
    skeleton::NUM_LABEL_JOINTS,
};

/// Small on-disk dataset with three cameras, written into a temporary directory.
///
/// Only S1 (train), S9 and S11 (test) have shots, the other default subjects exist
/// in the name table without rows.
pub struct SyntheticPanoptic {
    dir: TempDir,
    labels: LabelTable,
}

impl SyntheticPanoptic {
    pub const SUBJECTS: [&'static str; 7] = ["S1", "S5", "S6", "S7", "S8", "S9", "S11"];
    pub const RECORDED_SUBJECTS: [usize; 3] = [0, 5, 6];
    pub const ACTIONS: [&'static str; 3] = ["Walking-1", "Walking-2", "Posing"];
    pub const CAMERAS: [&'static str; 3] = ["00_00", "00_01", "00_02"];
    pub const FRAMES: usize = 4;
    /// Camera 2 has an empty box in this frame.
    pub const MISSING_VIEW_FRAME: usize = 1;
    pub const IMAGE_SIZE: (u32, u32) = (160, 120);

    pub fn create() -> Result<Self, DatasetError> {
        let dir = tempfile::tempdir()?;

        let camera = |camera_idx: usize| CameraParams {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [camera_idx as f64 * 50.0 - 50.0, 0.0, 3000.0],
            intrinsics: [[200.0, 0.0, 80.0], [0.0, 200.0, 60.0], [0.0, 0.0, 1.0]],
            dist: vec![0.0; 5],
        };

        let mut table = Vec::new();
        for &subject_idx in Self::RECORDED_SUBJECTS.iter() {
            for action_idx in 0..Self::ACTIONS.len() {
                for frame_idx in 0..Self::FRAMES {
                    let bbox_by_camera_tlbr = (0..Self::CAMERAS.len())
                        .map(|camera_idx| {
                            if camera_idx == 2 && frame_idx == Self::MISSING_VIEW_FRAME {
                                [0, 0, 0, 0]
                            } else {
                                [20, 40 + camera_idx as i64, 100, 120]
                            }
                        })
                        .collect();
                    let keypoints = (0..NUM_LABEL_JOINTS)
                        .map(|j| {
                            [
                                (j % 4) as f64 * 40.0 - 60.0 + subject_idx as f64,
                                j as f64 * 30.0 - 250.0 + action_idx as f64,
                                frame_idx as f64 * 5.0,
                            ]
                        })
                        .collect();
                    table.push(Shot {
                        subject_idx,
                        action_idx,
                        frame_idx,
                        frame_name: None,
                        person_id: subject_idx % 2,
                        bbox_by_camera_tlbr,
                        keypoints,
                    });
                }
            }
        }

        let labels = LabelTable {
            subject_names: Self::SUBJECTS.iter().map(|s| s.to_string()).collect(),
            action_names: Self::ACTIONS.iter().map(|s| s.to_string()).collect(),
            camera_names: Self::CAMERAS.iter().map(|s| s.to_string()).collect(),
            cameras: Self::SUBJECTS
                .iter()
                .map(|_| (0..Self::CAMERAS.len()).map(camera).collect())
                .collect(),
            table,
        };

        let synthetic = Self { dir, labels };
        synthetic.labels.save(synthetic.labels_path())?;
        synthetic.write_images()?;
        Ok(synthetic)
    }

    fn write_images(&self) -> Result<(), DatasetError> {
        let (width, height) = Self::IMAGE_SIZE;
        for shot in self.labels.table.iter() {
            for (camera_idx, camera_name) in Self::CAMERAS.iter().enumerate() {
                let dir = self
                    .root()
                    .join(Self::SUBJECTS[shot.subject_idx])
                    .join(Self::ACTIONS[shot.action_idx])
                    .join("imageSequence")
                    .join(camera_name);
                std::fs::create_dir_all(&dir)?;
                let image = RgbImage::from_fn(width, height, |x, y| {
                    Rgb([
                        (x + shot.frame_idx as u32 * 10) as u8,
                        y as u8,
                        (camera_idx * 60 + shot.action_idx * 20) as u8,
                    ])
                });
                image.save(dir.join(format!("img_{:06}.jpg", shot.frame_idx + 1)))?;
            }
        }
        Ok(())
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn labels_path(&self) -> PathBuf {
        self.dir.path().join("labels.json")
    }

    /// Number of shots recorded for the given subjects.
    pub fn rows_of(&self, subjects: &[&str]) -> usize {
        self.labels
            .table
            .iter()
            .filter(|shot| subjects.contains(&Self::SUBJECTS[shot.subject_idx]))
            .count()
    }

    /// Writes predictions equal to the ground truth of `subjects` shifted by `offset`,
    /// stored in reverse index order.
    pub fn write_predictions(&self, subjects: &[&str], offset: f64) -> PathBuf {
        let poses = self
            .labels
            .table
            .iter()
            .filter(|shot| subjects.contains(&Self::SUBJECTS[shot.subject_idx]))
            .map(|shot| {
                shot.keypoints
                    .iter()
                    .map(|k| [k[0] + offset, k[1] + offset, k[2] + offset])
                    .collect::<Vec<[f64; 3]>>()
            })
            .collect::<Vec<_>>();
        let predictions = Predictions {
            indexes: (0..poses.len()).rev().collect(),
            keypoints_3d: poses.into_iter().rev().collect(),
        };
        let path = self.dir.path().join("predictions.json");
        predictions.save(&path).unwrap();
        path
    }
}

#[fixture]
pub fn sample_panoptic() -> SyntheticPanoptic {
    SyntheticPanoptic::create().unwrap()
}
