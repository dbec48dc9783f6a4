use std::path::PathBuf;

use image::ImageError;
use thiserror::Error as ThisError;

use super::Sample;
use crate::{error::Error, skeleton::KeypointKind};

#[derive(Debug, ThisError)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parser error: {0}")]
    Parser(String),
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
    #[error("{} doesn't exist", .0.display())]
    MissingFile(PathBuf),
    #[error("Display error: {0}")]
    Display(String),
    #[error(transparent)]
    Invalid(#[from] Error),
}

impl From<serde_json::Error> for DatasetError {
    fn from(err: serde_json::Error) -> Self {
        DatasetError::Parser(err.to_string())
    }
}

/// Label metadata of one shot, resolved to names.
#[derive(Clone, Debug, PartialEq)]
pub struct ShotInfo {
    pub subject_name: String,
    pub action_idx: usize,
    pub action_name: String,
    pub frame_name: usize,
    pub person_id: usize,
}

pub trait MultiviewDataset {
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool;
    /// Assembles the sample at `index`, reading its images from disk.
    fn get(&self, index: usize) -> Result<Sample, DatasetError>;
    /// Label metadata of `index` without touching the images.
    fn shot_info(&self, index: usize) -> Option<ShotInfo>;
    fn camera_names(&self) -> &[String];
    fn keypoint_kind(&self) -> KeypointKind;
}
