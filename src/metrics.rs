use std::collections::BTreeMap;

use ndarray::{s, Array1, Array3, ArrayView1, ArrayView3, Axis};
use serde_derive::Serialize;

use crate::error::Error;

/// Mean error by action name, plus the `"Average"` entry.
pub type ActionScores = BTreeMap<String, f64>;
/// Action scores by subject name, plus the `"Average"` entry over all subjects.
pub type SubjectScores = BTreeMap<String, ActionScores>;

pub const AVERAGE_KEY: &str = "Average";

const HUMAN36M_TRANSFER_JOINTS: [usize; 6] = [10, 11, 15, 14, 1, 4];
const CMU_TRANSFER_JOINTS: [usize; 6] = [10, 8, 9, 7, 14, 13];

/// Joint subset matching applied before scoring poses from a different skeleton.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum JointTransfer {
    #[default]
    None,
    /// Compares Human3.6M-ordered ground truth against CMU-ordered predictions.
    CmuToHuman36m,
    /// Compares the shared Human3.6M joints of both sides.
    Human36mToHuman36m,
}

impl JointTransfer {
    /// Ground truth and predicted joint subsets.
    pub fn joints(&self) -> Option<(&'static [usize], &'static [usize])> {
        match self {
            JointTransfer::None => None,
            JointTransfer::CmuToHuman36m => Some((&HUMAN36M_TRANSFER_JOINTS, &CMU_TRANSFER_JOINTS)),
            JointTransfer::Human36mToHuman36m => {
                Some((&HUMAN36M_TRANSFER_JOINTS, &HUMAN36M_TRANSFER_JOINTS))
            }
        }
    }
}

/// Absolute and root-relative scores.
#[derive(Clone, Debug, Serialize)]
pub struct Evaluation {
    pub per_pose_error: SubjectScores,
    pub per_pose_error_relative: SubjectScores,
}

impl Evaluation {
    /// Root-relative error over every subject and action.
    pub fn relative_average(&self) -> f64 {
        self.per_pose_error_relative
            .get(AVERAGE_KEY)
            .and_then(|scores| scores.get(AVERAGE_KEY))
            .copied()
            .unwrap_or(f64::NAN)
    }
}

/// Per-pose labels used to group errors.
#[derive(Clone, Copy, Debug)]
pub struct PoseGrouping<'a> {
    pub action_idx: &'a [usize],
    pub subject_idx: &'a [usize],
    pub action_names: &'a [String],
    pub subject_names: &'a [String],
}

/// Mean Euclidean joint distance for each pose.
///
/// # Arguments
///
/// * ground_truth: N x J x 3 keypoints.
/// * predicted: N x J x 3 keypoints.
pub fn per_pose_error(ground_truth: &ArrayView3<f64>, predicted: &ArrayView3<f64>) -> Array1<f64> {
    let diff = ground_truth - predicted;
    (&diff * &diff)
        .sum_axis(Axis(2))
        .mapv(f64::sqrt)
        .mean_axis(Axis(1))
        .unwrap_or_else(|| Array1::zeros(ground_truth.len_of(Axis(0))))
}

/// Keypoints expressed relative to the `root` joint of each pose.
pub fn root_relative(keypoints: &ArrayView3<f64>, root: usize) -> Array3<f64> {
    let root_joint = keypoints.slice(s![.., root..root + 1, ..]);
    keypoints - &root_joint
}

/// Per-pose error after moving both poses to their root joint.
pub fn per_pose_error_relative(
    ground_truth: &ArrayView3<f64>,
    predicted: &ArrayView3<f64>,
    root: usize,
) -> Array1<f64> {
    per_pose_error(
        &root_relative(ground_truth, root).view(),
        &root_relative(predicted, root).view(),
    )
}

#[derive(Clone, Copy, Default)]
struct Accumulator {
    total_loss: f64,
    frame_count: usize,
}

impl Accumulator {
    fn mean(&self) -> f64 {
        if self.frame_count == 0 {
            f64::NAN
        } else {
            self.total_loss / self.frame_count as f64
        }
    }
}

/// Averages the errors per action, restricted to the poses where `mask` is set.
///
/// Actions recorded as two trials (`<name>-1` and `<name>-2`) are merged into `<name>`.
/// Groups without any pose average to NaN.
pub fn evaluate_by_actions(
    per_pose_error: &ArrayView1<f64>,
    grouping: &PoseGrouping,
    mask: Option<&[bool]>,
) -> ActionScores {
    let selected = |i: usize| mask.map_or(true, |m| m[i]);

    let mut scores = BTreeMap::<String, Accumulator>::new();
    let mut average = Accumulator::default();
    let mut by_action = vec![Accumulator::default(); grouping.action_names.len()];
    for (i, error) in per_pose_error.iter().enumerate() {
        if !selected(i) {
            continue;
        }
        average.total_loss += error;
        average.frame_count += 1;
        let action = &mut by_action[grouping.action_idx[i]];
        action.total_loss += error;
        action.frame_count += 1;
    }

    for (name, acc) in grouping.action_names.iter().zip(by_action) {
        scores.insert(name.clone(), acc);
    }

    for name in grouping.action_names {
        let Some(base_name) = name.strip_suffix("-1") else {
            continue;
        };
        let mut combined = Accumulator::default();
        for trial in 1..=2 {
            if let Some(acc) = scores.remove(&format!("{base_name}-{trial}")) {
                combined.total_loss += acc.total_loss;
                combined.frame_count += acc.frame_count;
            }
        }
        scores.insert(base_name.to_string(), combined);
    }

    scores.insert(AVERAGE_KEY.to_string(), average);
    scores
        .into_iter()
        .map(|(name, acc)| (name, acc.mean()))
        .collect()
}

/// Action scores over all poses and for each subject.
pub fn evaluate_per_pose_error(
    per_pose_error: &ArrayView1<f64>,
    grouping: &PoseGrouping,
) -> SubjectScores {
    let mut scores = SubjectScores::new();
    for (subject_idx, subject_name) in grouping.subject_names.iter().enumerate() {
        let mask = grouping
            .subject_idx
            .iter()
            .map(|s| *s == subject_idx)
            .collect::<Vec<bool>>();
        scores.insert(
            subject_name.clone(),
            evaluate_by_actions(per_pose_error, grouping, Some(&mask)),
        );
    }
    scores.insert(
        AVERAGE_KEY.to_string(),
        evaluate_by_actions(per_pose_error, grouping, None),
    );
    scores
}

/// Scores predicted keypoints against the ground truth.
///
/// # Arguments
///
/// * ground_truth: N x J x 3 keypoints.
/// * predicted: N x J x 3 keypoints, same shape as `ground_truth`.
/// * grouping: Action and subject of each pose.
/// * transfer: Joint subset matching. When set, the root becomes joint 0 of the subset.
/// * root_index: Root joint used without transfer.
///
/// # Returns
///
/// * The overall root-relative error and the full evaluation.
pub fn evaluate_keypoints(
    ground_truth: &ArrayView3<f64>,
    predicted: &ArrayView3<f64>,
    grouping: &PoseGrouping,
    transfer: JointTransfer,
    root_index: usize,
) -> Result<(f64, Evaluation), Error> {
    if ground_truth.shape() != predicted.shape() {
        return Err(Error::invalid_parameter(format!(
            "predicted keypoints shape should be {:?}, got {:?}",
            ground_truth.shape(),
            predicted.shape()
        )));
    }
    let num_poses = ground_truth.len_of(Axis(0));
    if grouping.action_idx.len() != num_poses || grouping.subject_idx.len() != num_poses {
        return Err(Error::invalid_parameter(format!(
            "Grouping labels do not cover the {num_poses} poses"
        )));
    }
    if grouping.action_idx.iter().any(|a| *a >= grouping.action_names.len()) {
        return Err(Error::invalid_parameter("Action index out of range"));
    }

    let (ground_truth, predicted, root) = match transfer.joints() {
        Some((gt_joints, pred_joints)) => (
            ground_truth.select(Axis(1), gt_joints),
            predicted.select(Axis(1), pred_joints),
            0,
        ),
        None => (ground_truth.to_owned(), predicted.to_owned(), root_index),
    };
    if root >= ground_truth.len_of(Axis(1)) {
        return Err(Error::invalid_parameter(format!(
            "Root joint {root} out of range"
        )));
    }

    let absolute = per_pose_error(&ground_truth.view(), &predicted.view());
    let relative = per_pose_error_relative(&ground_truth.view(), &predicted.view(), root);

    let evaluation = Evaluation {
        per_pose_error: evaluate_per_pose_error(&absolute.view(), grouping),
        per_pose_error_relative: evaluate_per_pose_error(&relative.view(), grouping),
    };
    Ok((evaluation.relative_average(), evaluation))
}
