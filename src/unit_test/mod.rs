mod datasets;
pub(crate) use datasets::{sample_panoptic, SyntheticPanoptic};
