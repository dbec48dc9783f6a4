//! Inspection of dataset samples: keypoints and detections drawn over one camera view.

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use log::{error, info, warn};
use ndarray::s;

use crate::{
    camera::project_points_without_distortion,
    io::dataset::{DatasetError, MultiviewDataset, Sample, ShotInfo},
    skeleton::{draw_2d_pose, draw_bbox, PoseStyle},
};

#[cfg(feature = "viz")]
mod window;
#[cfg(feature = "viz")]
pub use window::WindowSink;

/// Frames shown for a new action before jumping to the next one.
pub const DEFAULT_PATIENCE: usize = 2000;

#[derive(Clone, Debug)]
pub struct ViewerConfig {
    pub start_index: usize,
    pub step: usize,
    /// Label table camera drawn for every sample.
    pub camera_index: usize,
    pub patience: usize,
    pub style: PoseStyle,
    pub bbox_color: Rgb<u8>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            start_index: 0,
            step: 10,
            camera_index: 9,
            patience: DEFAULT_PATIENCE,
            style: PoseStyle::default(),
            bbox_color: Rgb([0, 0, 255]),
        }
    }
}

/// Walks the sample indices, skipping the tail of long actions.
///
/// Every action change grants `patience` steps. Once they are used up the cursor
/// jumps by `step` until the action changes again.
#[derive(Clone, Debug)]
pub struct FrameCursor {
    index: usize,
    step: usize,
    patience_budget: usize,
    patience: usize,
    prev_action: Option<usize>,
}

impl FrameCursor {
    pub fn new(start_index: usize, step: usize, patience_budget: usize) -> Self {
        Self {
            index: start_index,
            step: step.max(1),
            patience_budget,
            patience: 0,
            prev_action: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Moves by one step without looking at the actions.
    pub fn skip(&mut self) {
        self.index += self.step;
    }

    /// Moves past the current sample.
    ///
    /// # Arguments
    ///
    /// * action_at: Action of a sample index, `None` past the end of the dataset.
    pub fn advance<F>(&mut self, action_at: F)
    where
        F: Fn(usize) -> Option<usize>,
    {
        let action = action_at(self.index);
        if action != self.prev_action {
            self.prev_action = action;
            self.patience = self.patience_budget;
            self.index += self.step;
        } else if self.patience == 0 {
            loop {
                self.index += self.step;
                match action_at(self.index) {
                    None => break,
                    Some(next) if Some(next) != self.prev_action => break,
                    _ => (),
                }
            }
        } else {
            self.patience -= 1;
            self.index += self.step;
        }
    }
}

/// Identification of a rendered frame.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameInfo {
    pub index: usize,
    pub action_name: String,
    pub camera_name: String,
    pub frame_name: usize,
    pub person_id: usize,
}

impl FrameInfo {
    pub fn new(index: usize, shot: &ShotInfo, camera_name: &str) -> Self {
        Self {
            index,
            action_name: shot.action_name.clone(),
            camera_name: camera_name.to_string(),
            frame_name: shot.frame_name,
            person_id: shot.person_id,
        }
    }

    pub fn title(&self) -> String {
        format!(
            "Person {}: {}/{}/{}",
            self.person_id, self.action_name, self.camera_name, self.frame_name
        )
    }

    /// `<action>/<camera>/<frame>_p<person>.jpg`
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.action_name)
            .join(&self.camera_name)
            .join(format!("{:08}_p{}.jpg", self.frame_name, self.person_id))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    Quit,
}

/// Destination of the rendered frames.
pub trait FrameSink {
    fn consume(&mut self, frame: &RgbImage, info: &FrameInfo) -> Result<SinkControl, DatasetError>;
}

/// Writes frames as JPEG files below a directory.
pub struct DirectorySink {
    out_dir: PathBuf,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(out_dir: P) -> Self {
        Self {
            out_dir: out_dir.as_ref().to_path_buf(),
        }
    }
}

impl FrameSink for DirectorySink {
    fn consume(&mut self, frame: &RgbImage, info: &FrameInfo) -> Result<SinkControl, DatasetError> {
        let img_path = self.out_dir.join(info.relative_path());
        if let Some(parent) = img_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Saving image to {}", img_path.display());
        if let Err(err) = frame.save(&img_path) {
            error!("Cannot save to {}: {err}", img_path.display());
        }
        Ok(SinkControl::Continue)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewerSummary {
    pub frames: usize,
    pub skipped: usize,
    pub quit: bool,
}

pub struct DatasetViewer<D: MultiviewDataset> {
    dataset: D,
    config: ViewerConfig,
}

impl<D: MultiviewDataset> DatasetViewer<D> {
    pub fn new(dataset: D, config: ViewerConfig) -> Self {
        Self { dataset, config }
    }

    pub fn dataset(&self) -> &D {
        &self.dataset
    }

    /// Number of frames a full run visits when no action is skipped.
    pub fn expected_frames(&self) -> usize {
        let remaining = self.dataset.len().saturating_sub(self.config.start_index);
        let step = self.config.step.max(1);
        (remaining + step - 1) / step
    }

    /// Draws the skeleton and detection of the configured camera.
    ///
    /// # Returns
    ///
    /// * `None` if the sample has no view of that camera.
    pub fn render(&self, sample: &Sample) -> Result<Option<RgbImage>, DatasetError> {
        let camera_idx = self.config.camera_index;
        let Some(view) = sample.view_position(camera_idx) else {
            return Ok(None);
        };

        let mut display = sample.images[view].to_image_rgb8()?;
        let points = sample.keypoints_3d.slice(s![.., ..3]);
        let keypoints_2d = project_points_without_distortion(&sample.proj_matrices[view], &points);
        draw_2d_pose(
            &mut display,
            &keypoints_2d.view(),
            self.dataset.keypoint_kind(),
            &self.config.style,
        )?;

        let mut bbox = sample.detections[view].bbox;
        if let Some(&(height_before, width_before)) = sample.image_shapes_before_resize.get(view) {
            let (height_after, width_after) = sample.images[view].shape();
            bbox = bbox.rescale(
                width_after as f64 / width_before as f64,
                height_after as f64 / height_before as f64,
            );
        }

        if bbox.is_empty() {
            warn!("Sample {}, Camera {camera_idx}: No bbox data found", sample.index);
        } else if !sample.cropped {
            info!(
                "Sample {}, Camera {camera_idx}: Drawing rectangle at ({}, {}), ({}, {}) for image of dimensions ({}, {})",
                sample.index,
                bbox.left,
                bbox.top,
                bbox.right,
                bbox.bottom,
                display.height(),
                display.width()
            );
            draw_bbox(&mut display, &bbox, self.config.bbox_color, 2);
        }

        Ok(Some(display))
    }

    /// Renders samples into `sink` until the dataset ends or the sink quits.
    pub fn run(&self, sink: &mut dyn FrameSink) -> Result<ViewerSummary, DatasetError> {
        let camera_idx = self.config.camera_index;
        let camera_name = self
            .dataset
            .camera_names()
            .get(camera_idx)
            .cloned()
            .unwrap_or_else(|| camera_idx.to_string());

        let mut summary = ViewerSummary::default();
        let mut cursor = FrameCursor::new(
            self.config.start_index,
            self.config.step,
            self.config.patience,
        );

        while cursor.index() < self.dataset.len() {
            let index = cursor.index();
            let sample = self.dataset.get(index)?;

            let Some(display) = self.render(&sample)? else {
                warn!("Sample {index} does not have an associated image or camera {camera_idx}");
                summary.skipped += 1;
                cursor.skip();
                continue;
            };

            let Some(shot) = self.dataset.shot_info(index) else {
                break;
            };
            let info = FrameInfo::new(index, &shot, &camera_name);
            summary.frames += 1;
            if sink.consume(&display, &info)? == SinkControl::Quit {
                info!("Quitting...");
                summary.quit = true;
                break;
            }

            cursor.advance(|i| self.dataset.shot_info(i).map(|s| s.action_idx));
        }

        info!("Done.");
        Ok(summary)
    }
}
