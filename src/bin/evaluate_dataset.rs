use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use log::info;
use panoptic_mv::{metrics::JointTransfer, DatasetConfig, MultiviewDataset, PanopticDataset};

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
enum Transfer {
    None,
    CmuToHuman36m,
    Human36mToHuman36m,
}

impl From<Transfer> for JointTransfer {
    fn from(transfer: Transfer) -> Self {
        match transfer {
            Transfer::None => JointTransfer::None,
            Transfer::CmuToHuman36m => JointTransfer::CmuToHuman36m,
            Transfer::Human36mToHuman36m => JointTransfer::Human36mToHuman36m,
        }
    }
}

/// Scores predicted 3D keypoints against the label table and prints the
/// per subject and per action errors as JSON.
#[derive(Parser)]
struct CommandLine {
    /// Root directory of the extracted images
    dataset_root: PathBuf,
    /// Label table (JSON)
    labels_path: PathBuf,
    /// Predictions (JSON with `keypoints_3d` and `indexes`)
    predictions: PathBuf,
    /// Dataset options (JSON), defaults to the test split
    #[clap(long)]
    config: Option<PathBuf>,
    #[clap(long, value_enum, default_value = "none")]
    transfer: Transfer,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = CommandLine::parse();

    let mut config = match &args.config {
        Some(path) => DatasetConfig::from_json_file(path)?,
        None => DatasetConfig {
            test: true,
            ..Default::default()
        },
    };
    config.pred_results_path = Some(args.predictions.clone());

    let dataset = PanopticDataset::load(&args.dataset_root, &args.labels_path, config)?;
    let predictions = dataset
        .predictions()
        .ok_or("The dataset did not load the predictions")?;
    let (average, evaluation) = dataset.evaluate(predictions, args.transfer.into())?;

    info!(
        "Relative mean per joint error over {} poses: {average:.3}",
        dataset.len()
    );
    println!("{}", serde_json::to_string_pretty(&evaluation)?);
    Ok(())
}
