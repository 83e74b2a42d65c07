use std::fs;

use kvid::capture::{DataKey, ImageKey, InfoKey, VolumeKey};
use kvid::{CaptureMode, CompressedFrame, CompressionMode, FrameInfo, VideoError, VolumetricVideo};
use nalgebra::Matrix4;

fn frame(device_id: u32, capture_id: i32, received_ms: i64) -> CompressedFrame {
    let mut frame = CompressedFrame::new(
        FrameInfo {
            device_id,
            capture_id,
            after_capture_ts: received_ms * 1_000_000 - 500,
            received_ts: received_ms * 1_000_000,
        },
        CaptureMode::FbC1280x720Di640x576Nv12F30,
    );
    frame.valid_vertex_count = 2;
    frame.set_info(InfoKey::AudioSamplesCount, 0);
    frame.insert_data(DataKey::Calibration, CompressionMode::None, vec![7u8; 32]);
    frame.insert_image(ImageKey::Depth16, CompressionMode::None, 2, 2, vec![1u8; 8]);
    frame.insert_volume(VolumeKey::CloudXyz, CompressionMode::None, vec![0u8; 24]);
    frame
}

fn translation(x: f64) -> Matrix4<f64> {
    Matrix4::new_translation(&nalgebra::Vector3::new(x, 0.0, 0.0)).transpose()
}

fn two_device_video() -> VolumetricVideo {
    let mut video = VolumetricVideo::default();
    let first = video.add_device(Matrix4::identity());
    let second = video.add_device(translation(1.5));
    for (i, ms) in [0, 33, 66].into_iter().enumerate() {
        video.add_frame(first, frame(0, i as i32, ms)).unwrap();
    }
    video.add_frame(second, frame(1, 0, 10)).unwrap();
    video
}

#[test]
fn save_then_load_is_byte_exact() {
    let dir = tempfile::tempdir().unwrap();
    let first_path = dir.path().join("first.kvid");
    let second_path = dir.path().join("second.kvid");

    let video = two_device_video();
    video.save(&first_path).unwrap();

    let mut loaded = VolumetricVideo::default();
    loaded.load(&first_path).unwrap();
    assert_eq!(loaded.nb_devices(), 2);
    assert_eq!(loaded.nb_frames(0).unwrap(), 3);
    assert_eq!(loaded.nb_frames(1).unwrap(), 1);
    assert_eq!(loaded.device_transform(1).unwrap(), &translation(1.5));
    for device in 0..2 {
        assert_eq!(loaded.device(device).unwrap().frames(), video.device(device).unwrap().frames());
    }

    loaded.save(&second_path).unwrap();
    assert_eq!(fs::read(&first_path).unwrap(), fs::read(&second_path).unwrap());
}

#[test]
fn mapped_load_matches_buffered_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("video.kvid");
    two_device_video().save(&path).unwrap();

    let mut buffered = VolumetricVideo::default();
    buffered.load(&path).unwrap();
    let mut mapped = VolumetricVideo::default();
    mapped.load_mapped(&path).unwrap();

    assert_eq!(mapped.nb_devices(), buffered.nb_devices());
    for device in 0..mapped.nb_devices() {
        assert_eq!(
            mapped.device(device).unwrap().frames(),
            buffered.device(device).unwrap().frames()
        );
    }
    assert_eq!(mapped.duration_ms(), buffered.duration_ms());
}

#[test]
fn devices_without_frames_are_dropped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sparse.kvid");

    let mut video = VolumetricVideo::default();
    video.add_device(Matrix4::identity());
    video.add_device(translation(3.0));
    video.add_device(translation(2.0));
    video.add_frame(0, frame(0, 0, 0)).unwrap();
    video.add_frame(2, frame(2, 0, 5)).unwrap();
    video.save(&path).unwrap();

    let mut loaded = VolumetricVideo::default();
    loaded.load(&path).unwrap();
    assert_eq!(loaded.nb_devices(), 2);
    assert_eq!(loaded.device_transform(1).unwrap(), &translation(2.0));
    assert_eq!(loaded.get_frame(1, 0).unwrap().info.device_id, 2);
}

#[test]
fn failed_load_leaves_video_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("truncated.kvid");
    let good = dir.path().join("good.kvid");

    let video = two_device_video();
    video.save(&good).unwrap();
    let bytes = fs::read(&good).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 4]).unwrap();

    let mut loaded = VolumetricVideo::default();
    loaded.load(&good).unwrap();
    assert_eq!(loaded.nb_devices(), 2);

    let err = loaded.load(&path).unwrap_err();
    assert!(matches!(err, VideoError::CorruptFrame { device: 1, frame: 0, .. }));
    assert_eq!(loaded.nb_devices(), 0);
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.kvid");

    let mut video = VolumetricVideo::default();
    match video.load(&path) {
        Err(VideoError::Io { path: reported, .. }) => assert_eq!(reported, path),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn timing_queries_after_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("timing.kvid");
    two_device_video().save(&path).unwrap();

    let mut video = VolumetricVideo::default();
    video.load(&path).unwrap();
    assert_eq!(video.first_frame_received_timestamp(), Some(0));
    assert_eq!(video.last_frame_received_timestamp(), Some(66_000_000));
    assert_eq!(video.device_duration_ms(0).unwrap(), 66);
    assert_eq!(video.closest_frame_id_from_time(0, 40.0), Some(1));
    assert_eq!(video.closest_frame_id_from_time(1, 40.0), Some(0));
}
