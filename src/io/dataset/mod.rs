mod core;
pub use self::core::{DatasetError, MultiviewDataset, ShotInfo};

mod sample;
pub use sample::{Detection, Sample};

mod panoptic;
pub use panoptic::{DatasetConfig, PanopticDataset};
