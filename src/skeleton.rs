use std::str::FromStr;

use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut},
    rect::Rect,
};
use ndarray::{ArrayView2, Axis};

use crate::{bbox::BBox, error::Error};

/// Number of joints stored per shot in the label files.
pub const NUM_LABEL_JOINTS: usize = 17;

/// Joint used as origin for root-relative errors (pelvis).
pub const ROOT_JOINT: usize = 6;

const CMU_CONNECTIVITY: [(usize, usize); 16] = [
    (0, 1),
    (1, 2),
    (2, 6),
    (5, 4),
    (4, 3),
    (3, 6),
    (6, 7),
    (7, 8),
    (8, 16),
    (9, 16),
    (8, 12),
    (11, 12),
    (10, 11),
    (8, 13),
    (13, 14),
    (14, 15),
];

const MPII_CONNECTIVITY: [(usize, usize); 15] = [
    (0, 1),
    (1, 2),
    (2, 6),
    (5, 4),
    (4, 3),
    (3, 6),
    (6, 7),
    (7, 8),
    (8, 9),
    (8, 12),
    (8, 13),
    (10, 11),
    (11, 12),
    (13, 14),
    (14, 15),
];

/// Keypoint layout of the poses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeypointKind {
    /// First 16 joints of the label skeleton.
    Mpii,
    /// All 17 joints of the label skeleton.
    Cmu,
}

impl KeypointKind {
    pub fn num_keypoints(&self) -> usize {
        match self {
            KeypointKind::Mpii => 16,
            KeypointKind::Cmu => 17,
        }
    }

    pub fn root_index(&self) -> usize {
        ROOT_JOINT
    }

    /// Pairs of joint indices forming the bones.
    pub fn connectivity(&self) -> &'static [(usize, usize)] {
        match self {
            KeypointKind::Mpii => &MPII_CONNECTIVITY,
            KeypointKind::Cmu => &CMU_CONNECTIVITY,
        }
    }
}

impl FromStr for KeypointKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mpii" => Ok(KeypointKind::Mpii),
            "cmu" => Ok(KeypointKind::Cmu),
            _ => Err(Error::invalid_parameter(format!(
                "Unsupported keypoint kind: {s}"
            ))),
        }
    }
}

/// Drawing parameters of the pose overlay.
#[derive(Clone, Debug)]
pub struct PoseStyle {
    pub point_size: i32,
    pub line_width: i32,
    pub point_color: Rgb<u8>,
    pub line_color: Rgb<u8>,
}

impl Default for PoseStyle {
    fn default() -> Self {
        Self {
            point_size: 3,
            line_width: 2,
            point_color: Rgb([255, 0, 0]),
            line_color: Rgb([0, 0, 255]),
        }
    }
}

fn is_drawable(point: (f32, f32)) -> bool {
    point.0.is_finite() && point.1.is_finite()
}

/// Clips the segment to the rectangle `[min, max]` (Liang-Barsky).
///
/// # Returns
///
/// * The visible part of the segment, `None` if it misses the rectangle.
fn clip_segment(
    start: (f32, f32),
    end: (f32, f32),
    min: (f32, f32),
    max: (f32, f32),
) -> Option<((f32, f32), (f32, f32))> {
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;
    for (p, q) in [
        (-dx, start.0 - min.0),
        (dx, max.0 - start.0),
        (-dy, start.1 - min.1),
        (dy, max.1 - start.1),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((
        (start.0 + t0 * dx, start.1 + t0 * dy),
        (start.0 + t1 * dx, start.1 + t1 * dy),
    ))
}

/// Draws a 2D skeleton over `canvas`.
///
/// # Arguments
///
/// * canvas: The image to draw on.
/// * keypoints: N x 2 pixel coordinates, at least `kind.num_keypoints()` rows.
/// * kind: Selects the bones to draw.
/// * style: Sizes and colors.
pub fn draw_2d_pose(
    canvas: &mut RgbImage,
    keypoints: &ArrayView2<f64>,
    kind: KeypointKind,
    style: &PoseStyle,
) -> Result<(), Error> {
    if keypoints.len_of(Axis(0)) < kind.num_keypoints() || keypoints.len_of(Axis(1)) < 2 {
        return Err(Error::invalid_parameter(format!(
            "Expected at least {} 2D keypoints, got shape {:?}",
            kind.num_keypoints(),
            keypoints.shape()
        )));
    }

    let point = |i: usize| (keypoints[[i, 0]] as f32, keypoints[[i, 1]] as f32);
    // Lines are drawn up to `line_width` pixels off the bone, circles up to `point_size`.
    let margin = style.line_width.max(style.point_size).max(0) as f32 + 1.0;
    let min = (-margin, -margin);
    let max = (
        canvas.width() as f32 + margin,
        canvas.height() as f32 + margin,
    );

    for &(from, to) in kind.connectivity() {
        let (start, end) = (point(from), point(to));
        if !is_drawable(start) || !is_drawable(end) {
            continue;
        }
        let Some((start, end)) = clip_segment(start, end, min, max) else {
            continue;
        };
        let half = style.line_width / 2;
        for offset in -half..=(style.line_width - 1 - half) {
            let offset = offset as f32;
            draw_line_segment_mut(
                canvas,
                (start.0 + offset, start.1),
                (end.0 + offset, end.1),
                style.line_color,
            );
            draw_line_segment_mut(
                canvas,
                (start.0, start.1 + offset),
                (end.0, end.1 + offset),
                style.line_color,
            );
        }
    }

    for i in 0..kind.num_keypoints() {
        let p = point(i);
        if !is_drawable(p) || p.0 < min.0 || p.1 < min.1 || p.0 > max.0 || p.1 > max.1 {
            continue;
        }
        draw_filled_circle_mut(
            canvas,
            (p.0.round() as i32, p.1.round() as i32),
            style.point_size,
            style.point_color,
        );
    }

    Ok(())
}

/// Draws a hollow `bbox` with the given border thickness. Empty boxes are ignored.
pub fn draw_bbox(canvas: &mut RgbImage, bbox: &BBox, color: Rgb<u8>, thickness: u32) {
    for t in 0..thickness as i64 {
        let (width, height) = (bbox.width() - 2 * t, bbox.height() - 2 * t);
        if width <= 0 || height <= 0 {
            break;
        }
        draw_hollow_rect_mut(
            canvas,
            Rect::at((bbox.left + t) as i32, (bbox.top + t) as i32)
                .of_size(width as u32, height as u32),
            color,
        );
    }
}
