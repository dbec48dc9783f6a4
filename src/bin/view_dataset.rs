use std::path::PathBuf;

use clap::Parser;
use log::info;
use panoptic_mv::{
    viewer::{DatasetViewer, DirectorySink, FrameSink, ViewerConfig, DEFAULT_PATIENCE},
    DatasetConfig, MultiviewDataset, PanopticDataset,
};

/// Inspects the multi-view labels: draws the 3D keypoints and the detection of one
/// camera over its image, showing it in a window or saving it to disk.
#[derive(Parser)]
struct CommandLine {
    /// Root directory of the extracted images
    dataset_root: PathBuf,
    /// Label table (JSON)
    labels_path: PathBuf,
    /// First sample shown
    start_index: Option<String>,
    /// Samples advanced between frames
    step: Option<String>,
    /// `1` saves the frames instead of displaying them
    save: Option<String>,
    /// Camera drawn for every sample
    #[clap(short, long, default_value = "9")]
    camera: usize,
    /// Frames shown for each action before jumping to the next one
    #[clap(long, default_value_t = DEFAULT_PATIENCE)]
    patience: usize,
    /// Output directory of the saved frames
    #[clap(short, long, default_value = "dataset_imgs")]
    output_dir: PathBuf,
    /// Dataset options (JSON), replaces the inspection defaults
    #[clap(long)]
    config: Option<PathBuf>,
}

/// Whole frames, no normalization, both splits.
fn inspection_config() -> DatasetConfig {
    DatasetConfig {
        image_shape: None,
        train: true,
        test: true,
        retain_every_n_frames_in_test: 1,
        scale_bbox: 1.0,
        square_bbox: false,
        norm_image: false,
        kind: "cmu".to_string(),
        crop: false,
        ..Default::default()
    }
}

#[cfg(feature = "viz")]
fn display_sink() -> Result<Box<dyn FrameSink>, Box<dyn std::error::Error>> {
    Ok(Box::new(panoptic_mv::viewer::WindowSink::new()))
}

#[cfg(not(feature = "viz"))]
fn display_sink() -> Result<Box<dyn FrameSink>, Box<dyn std::error::Error>> {
    Err("Displaying frames requires the `viz` feature, pass a save flag of 1 to export them".into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CommandLine::parse();

    let start_index = args
        .start_index
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(0);
    let step = args
        .step
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(10);
    let save_images = args
        .save
        .and_then(|s| s.parse::<i64>().ok())
        .map_or(false, |v| v == 1);

    let config = match &args.config {
        Some(path) => DatasetConfig::from_json_file(path)?,
        None => inspection_config(),
    };
    info!("Scale bbox: {}", config.scale_bbox);
    info!("Square bbox: {}", config.square_bbox);
    info!("Image Shape: {:?}", config.image_shape);
    info!("Norm Image: {}", config.norm_image);
    info!("Crop: {}", config.crop);

    let dataset = PanopticDataset::load(&args.dataset_root, &args.labels_path, config)?;
    let viewer = DatasetViewer::new(
        dataset,
        ViewerConfig {
            start_index,
            step,
            camera_index: args.camera,
            patience: args.patience,
            ..Default::default()
        },
    );
    info!("Total Samples: {}", viewer.dataset().len());
    info!("Total Images Shown/Saved: {}", viewer.expected_frames());

    let mut sink: Box<dyn FrameSink> = if save_images {
        info!(
            "Saving images to {} instead of displaying them...",
            args.output_dir.display()
        );
        Box::new(DirectorySink::new(&args.output_dir))
    } else {
        display_sink()?
    };

    let summary = viewer.run(sink.as_mut())?;
    info!(
        "{} frames, {} samples without camera {}",
        summary.frames, summary.skipped, args.camera
    );
    Ok(())
}
