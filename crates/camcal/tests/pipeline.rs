mod common;

use approx::assert_relative_eq;
use camcal::{pipeline, CalibError, CalibrationReport};
use common::{populate, write_gray, CornerDropBackend, DropStage, FakeBackend, Workspace};
use std::fs;

#[test]
fn empty_directory_is_no_input() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.image_dir()).unwrap();

    let err = pipeline::run(&ws.config, &FakeBackend::default()).unwrap_err();
    assert!(matches!(err, CalibError::NoInput { .. }), "{err}");
    assert!(err.to_string().contains("no calibration images found"));
    assert!(!ws.config.report_path.exists());
    assert!(!ws.config.undistort_dir.exists());
}

#[test]
fn missing_directory_is_no_input() {
    let ws = Workspace::new();
    let err = pipeline::run(&ws.config, &FakeBackend::default()).unwrap_err();
    assert!(matches!(err, CalibError::NoInput { .. }), "{err}");
}

#[test]
fn too_few_images_write_nothing() {
    let ws = Workspace::new();
    populate(&ws.image_dir(), 9, 0);

    let backend = FakeBackend::default();
    let err = pipeline::run(&ws.config, &backend).unwrap_err();
    match &err {
        CalibError::InsufficientInput {
            found, required, ..
        } => {
            assert_eq!(*found, 9);
            assert_eq!(*required, 10);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("at least 10 images"));
    assert_eq!(backend.calibrate_calls.get(), 0);
    assert!(!ws.config.report_path.exists());
    assert!(!ws.config.undistort_dir.exists());
}

#[test]
fn files_with_other_extensions_do_not_count() {
    let ws = Workspace::new();
    populate(&ws.image_dir(), 9, 0);
    fs::write(ws.image_dir().join("notes.txt"), "not an image").unwrap();
    fs::write(ws.image_dir().join("upper.PNG"), "ignored").unwrap();

    let err = pipeline::run(&ws.config, &FakeBackend::default()).unwrap_err();
    assert!(matches!(err, CalibError::InsufficientInput { found: 9, .. }));
}

#[test]
fn poses_follow_successful_detections_only() {
    let ws = Workspace::new();
    populate(&ws.image_dir(), 9, 3);

    let run = pipeline::run(&ws.config, &FakeBackend::default()).unwrap();
    let report = &run.report;

    assert_eq!(run.invalid_images, vec!["img_09.png", "img_10.png", "img_11.png"]);
    assert_eq!(report.image_data.len(), 9);
    for (i, entry) in report.image_data.iter().enumerate() {
        assert_eq!(entry.img_name, format!("img_{i:02}.png"));
        assert_eq!(entry.width, 64);
        assert_eq!(entry.height, 48);
        assert_relative_eq!(entry.tvec[2], 1.0 + i as f64);
    }
    assert_relative_eq!(report.camera_matrix[0][0], 64.0);
    assert_eq!(report.distortion, vec![0.0; 5]);
    assert_eq!(report.image_dir_path, ws.image_dir().to_string_lossy());
}

fn assert_short_corner_lists_are_invalid(stage: DropStage) {
    let ws = Workspace::new();
    populate(&ws.image_dir(), 10, 0);
    write_gray(&ws.image_dir().join("img_99.png"), 80, 60, 230);

    let backend = CornerDropBackend::new(64, stage);
    let run = pipeline::run(&ws.config, &backend).unwrap();

    let expected: Vec<String> = (0..10).map(|i| format!("img_{i:02}.png")).collect();
    assert_eq!(run.invalid_images, expected);
    assert_eq!(backend.inner.calibrate_calls.get(), 1);
    assert_eq!(backend.inner.last_view_count.get(), 1);
    assert_eq!(run.report.image_data.len(), 1);
    assert_eq!(run.report.image_data[0].img_name, "img_99.png");
    assert_eq!(run.report.image_data[0].width, 80);
}

#[test]
fn short_detection_counts_as_missing_board() {
    assert_short_corner_lists_are_invalid(DropStage::Detect);
}

#[test]
fn short_refinement_counts_as_missing_board() {
    assert_short_corner_lists_are_invalid(DropStage::Refine);
}

#[test]
fn undistorted_copies_are_written_and_referenced() {
    let ws = Workspace::new();
    populate(&ws.image_dir(), 10, 1);

    let run = pipeline::run(&ws.config, &FakeBackend::default()).unwrap();
    let report = CalibrationReport::load_json(&ws.config.report_path).unwrap();
    assert_eq!(report.image_data.len(), run.report.image_data.len());
    assert_eq!(report.image_data.len(), 10);

    assert_eq!(
        report.undistort_image_dir_path.as_deref(),
        ws.config.undistort_dir.to_str()
    );
    for entry in &report.image_data {
        let name = entry.img_distorted.as_deref().unwrap();
        assert!(!name.is_empty());
        let out = image::open(ws.config.undistort_dir.join(name)).unwrap();
        assert_eq!((out.width(), out.height()), (entry.width, entry.height));
    }
    assert!(!ws.config.undistort_dir.join("img_10.png").exists());
}

#[test]
fn disabled_undistortion_leaves_no_trace() {
    let mut ws = Workspace::new();
    ws.config.undistort_images = false;
    populate(&ws.image_dir(), 10, 0);

    pipeline::run(&ws.config, &FakeBackend::default()).unwrap();

    assert!(!ws.config.undistort_dir.exists());
    let raw = fs::read_to_string(&ws.config.report_path).unwrap();
    assert!(!raw.contains("img_distorted"));
    assert!(!raw.contains("undistort_image_dir_path"));
    assert!(raw.contains("\n    \"image_data\""));
}

#[test]
fn solver_failure_is_fatal_and_writes_nothing() {
    let ws = Workspace::new();
    populate(&ws.image_dir(), 10, 0);

    let err = pipeline::run(&ws.config, &FakeBackend::failing()).unwrap_err();
    assert!(matches!(err, CalibError::CalibrationFailed { .. }), "{err}");
    assert!(!ws.config.report_path.exists());
    assert!(!ws.config.undistort_dir.exists());
}

#[test]
fn no_detections_fail_calibration() {
    let ws = Workspace::new();
    populate(&ws.image_dir(), 0, 10);

    let backend = FakeBackend::default();
    let err = pipeline::run(&ws.config, &backend).unwrap_err();
    assert!(matches!(err, CalibError::CalibrationFailed { .. }), "{err}");
    assert_eq!(backend.calibrate_calls.get(), 0);
}

#[test]
fn calibration_uses_last_image_size() {
    let ws = Workspace::new();
    populate(&ws.image_dir(), 10, 0);
    write_gray(&ws.image_dir().join("img_99.png"), 80, 60, 230);

    let backend = FakeBackend::default();
    let run = pipeline::run(&ws.config, &backend).unwrap();
    let size = backend.last_image_size.get().unwrap();
    assert_eq!((size.width, size.height), (80, 60));

    let last = run.report.image_data.last().unwrap();
    assert_eq!((last.width, last.height), (80, 60));
    let out = image::open(ws.config.undistort_dir.join("img_99.png")).unwrap();
    assert_eq!((out.width(), out.height()), (80, 60));
}

#[test]
fn unreadable_image_aborts_the_run() {
    let ws = Workspace::new();
    populate(&ws.image_dir(), 10, 0);
    fs::write(ws.image_dir().join("broken.png"), b"not a png").unwrap();

    let err = pipeline::run(&ws.config, &FakeBackend::default()).unwrap_err();
    assert!(matches!(err, CalibError::ImageRead { .. }), "{err}");
    assert!(!ws.config.report_path.exists());
}
