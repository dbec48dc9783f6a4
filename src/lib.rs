pub mod bbox;
pub mod camera;

pub mod error;
pub mod io;
pub mod metrics;
pub mod skeleton;
pub mod viewer;

#[cfg(test)]
mod unit_test;

pub mod image;
pub use crate::image::SampleImage;
pub use crate::io::dataset::{DatasetConfig, MultiviewDataset, PanopticDataset, Sample};
