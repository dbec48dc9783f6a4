use std::path::Path;

use image::{Rgb, RgbImage};
use panoptic_mv::{
    io::labels::{CameraParams, LabelTable, Predictions, Shot},
    metrics::{JointTransfer, AVERAGE_KEY},
    skeleton::NUM_LABEL_JOINTS,
    viewer::{DatasetViewer, DirectorySink, ViewerConfig},
    DatasetConfig, MultiviewDataset, PanopticDataset, SampleImage,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

const FRAMES: usize = 6;

/// Two subjects (S1 train, S9 test), one action, two cameras, 640x480 frames.
fn write_dataset(root: &Path) -> LabelTable {
    let camera = |x: f64| CameraParams {
        rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        translation: [x, 0.0, 4000.0],
        intrinsics: [[1000.0, 0.0, 320.0], [0.0, 1000.0, 240.0], [0.0, 0.0, 1.0]],
        dist: Vec::new(),
    };
    let subjects = ["S1", "S5", "S6", "S7", "S8", "S9", "S11"];
    let cameras = ["00_00", "00_01"];

    let mut table = Vec::new();
    for subject_idx in [0, 5] {
        for frame_idx in 0..FRAMES {
            table.push(Shot {
                subject_idx,
                action_idx: 0,
                frame_idx,
                frame_name: Some(frame_idx * 10),
                person_id: 0,
                bbox_by_camera_tlbr: vec![[100, 200, 400, 440], [120, 180, 420, 400]],
                keypoints: (0..NUM_LABEL_JOINTS)
                    .map(|j| [j as f64 * 10.0 - 80.0, j as f64 * 40.0 - 300.0, frame_idx as f64])
                    .collect(),
            });
            for camera_name in cameras {
                let dir = root
                    .join(subjects[subject_idx])
                    .join("Greeting")
                    .join("imageSequence")
                    .join(camera_name);
                std::fs::create_dir_all(&dir).unwrap();
                RgbImage::from_pixel(640, 480, Rgb([90, 120, 150]))
                    .save(dir.join(format!("img_{:06}.jpg", frame_idx + 1)))
                    .unwrap();
            }
        }
    }

    let labels = LabelTable {
        subject_names: subjects.iter().map(|s| s.to_string()).collect(),
        action_names: vec!["Greeting".to_string()],
        camera_names: cameras.iter().map(|s| s.to_string()).collect(),
        cameras: subjects
            .iter()
            .map(|_| vec![camera(-100.0), camera(100.0)])
            .collect(),
        table,
    };
    labels.save(root.join("labels.json")).unwrap();
    labels
}

#[fixture]
fn dataset_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_dataset(dir.path());
    dir
}

#[rstest]
fn test_training_samples(dataset_dir: TempDir) {
    let dataset = PanopticDataset::load(
        dataset_dir.path(),
        dataset_dir.path().join("labels.json"),
        DatasetConfig {
            train: true,
            image_shape: Some((128, 128)),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(dataset.len(), FRAMES);

    let sample = dataset.get(2).unwrap();
    assert_eq!(sample.num_views(), 2);
    assert_eq!(sample.image_shapes_before_resize, vec![(450, 360), (450, 330)]);
    for image in sample.images.iter() {
        assert!(matches!(image, SampleImage::Normalized(_)));
        assert_eq!(image.shape(), (128, 128));
    }
    assert_eq!(sample.keypoints_3d.shape(), &[16, 4]);
    assert_eq!(sample.keypoints_3d[[0, 2]], 2.0);
}

#[rstest]
fn test_export_frames(dataset_dir: TempDir) {
    let dataset = PanopticDataset::load(
        dataset_dir.path(),
        dataset_dir.path().join("labels.json"),
        DatasetConfig {
            train: true,
            test: true,
            image_shape: None,
            scale_bbox: 1.0,
            norm_image: false,
            crop: false,
            kind: "cmu".to_string(),
            ..Default::default()
        },
    )
    .unwrap();
    let viewer = DatasetViewer::new(
        dataset,
        ViewerConfig {
            step: 2,
            camera_index: 1,
            ..Default::default()
        },
    );

    let out_dir = tempfile::tempdir().unwrap();
    let summary = viewer.run(&mut DirectorySink::new(out_dir.path())).unwrap();
    assert_eq!(summary.frames, FRAMES);

    let exported = out_dir
        .path()
        .join("Greeting")
        .join("00_01")
        .join("00000040_p0.jpg");
    assert!(exported.is_file());
    let image = image::open(exported).unwrap();
    assert_eq!((image.width(), image.height()), (640, 480));
}

#[rstest]
fn test_evaluate_predictions(dataset_dir: TempDir) {
    let labels = LabelTable::load(dataset_dir.path().join("labels.json")).unwrap();
    let test_rows = labels
        .table
        .iter()
        .filter(|shot| shot.subject_idx == 5)
        .collect::<Vec<_>>();
    let predictions = Predictions {
        keypoints_3d: test_rows
            .iter()
            .map(|shot| {
                shot.keypoints
                    .iter()
                    .map(|k| [k[0] + 3.0, k[1] + 4.0, k[2]])
                    .collect()
            })
            .collect(),
        indexes: (0..test_rows.len()).collect(),
    };
    let pred_path = dataset_dir.path().join("predictions.json");
    predictions.save(&pred_path).unwrap();

    let dataset = PanopticDataset::load(
        dataset_dir.path(),
        dataset_dir.path().join("labels.json"),
        DatasetConfig {
            test: true,
            kind: "cmu".to_string(),
            pred_results_path: Some(pred_path),
            ..Default::default()
        },
    )
    .unwrap();

    let (average, evaluation) = dataset
        .evaluate(dataset.predictions().unwrap(), JointTransfer::None)
        .unwrap();
    assert!(average.abs() < 1e-9);
    assert!((evaluation.per_pose_error["S9"]["Greeting"] - 5.0).abs() < 1e-9);
    assert!(evaluation.per_pose_error["S1"][AVERAGE_KEY].is_nan());
}
