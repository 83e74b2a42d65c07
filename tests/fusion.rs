use kvid::capture::{DataKey, VolumeKey};
use kvid::{
    CaptureMode, ColorCloud, ColorVoxelGrid, CompressedFrame, CompressionMode, DecodeSettings, FrameInfo,
    FusionConfig, VideoError, VolumetricVideo,
};
use nalgebra::{Matrix4, Point3, Vector3};

fn bounds() -> FusionConfig {
    FusionConfig {
        voxel_size: 0.5,
        origin: [0.0, 0.0, 0.0],
        extent: [2.0, 2.0, 2.0],
    }
}

/// Row-vector translation, as stored in device transforms
fn translation(x: f64) -> Matrix4<f64> {
    Matrix4::new_translation(&Vector3::new(x, 0.0, 0.0)).transpose()
}

fn cloud_frame(capture_id: i32, received_ms: i64, mode: CaptureMode, points: &[([f32; 3], [f32; 3])]) -> CompressedFrame {
    let cloud = ColorCloud {
        vertices: points.iter().map(|(p, _)| Point3::from(*p)).collect(),
        colors: points.iter().map(|(_, c)| Vector3::from(*c)).collect(),
    };
    let mut frame = CompressedFrame::new(
        FrameInfo {
            device_id: 0,
            capture_id,
            after_capture_ts: received_ms * 1_000_000,
            received_ts: received_ms * 1_000_000,
        },
        mode,
    );
    frame.valid_vertex_count = cloud.len();
    frame.insert_volume(VolumeKey::ColoredCloud, CompressionMode::None, cloud.to_colored_bytes());
    frame
}

/// Same cloud tagged with a codec that is not registered
fn undecodable(mut frame: CompressedFrame) -> CompressedFrame {
    if let Some(cloud) = frame.remove_volume(VolumeKey::ColoredCloud) {
        frame.insert_volume(VolumeKey::ColoredCloud, CompressionMode::FastPFor, cloud.payload);
    }
    frame
}

const MODE: CaptureMode = CaptureMode::FbC1280x720Di640x576Nv12F30;
const RED: [f32; 3] = [1.0, 0.0, 0.0];
const BLUE: [f32; 3] = [0.0, 0.0, 1.0];

fn two_devices() -> VolumetricVideo {
    let mut video = VolumetricVideo::default();
    video.add_device(Matrix4::identity());
    video.add_device(translation(1.0));

    let mut reference = cloud_frame(0, 0, MODE, &[([0.1, 0.1, 0.1], RED), ([5.0, 0.1, 0.1], RED)]);
    reference.insert_data(DataKey::Calibration, CompressionMode::None, vec![9u8; 16]);
    video.add_frame(0, reference).unwrap();
    video.add_frame(0, cloud_frame(1, 33, MODE, &[([0.1, 0.1, 0.1], RED)])).unwrap();

    video.add_frame(1, cloud_frame(0, 2, MODE, &[([0.1, 0.1, 0.1], BLUE)])).unwrap();
    video.add_frame(1, cloud_frame(1, 36, MODE, &[([0.6, 0.1, 0.1], BLUE)])).unwrap();
    video
}

#[test]
fn merged_frame_combines_transformed_devices() {
    let mut video = two_devices();
    let merged = video.merge_devices_frame(0, &DecodeSettings::default(), &bounds()).unwrap();

    assert_eq!(merged.mode, CaptureMode::Merged);
    assert_eq!(merged.info.capture_id, 0);
    // the point at x = 5 falls outside the bounds
    assert_eq!(merged.cloud.len(), 2);
    assert_eq!(merged.cloud.vertices[0], Point3::new(0.0, 0.0, 0.0));
    assert_eq!(merged.cloud.colors[0], Vector3::from(RED));
    assert_eq!(merged.cloud.vertices[1], Point3::new(1.0, 0.0, 0.0));
    assert_eq!(merged.cloud.colors[1], Vector3::from(BLUE));
}

#[test]
fn merged_frame_uses_time_aligned_frames() {
    let mut video = two_devices();
    let merged = video.merge_devices_frame(1, &DecodeSettings::cloud_only(), &bounds()).unwrap();

    // device 1 frame 1 lands at x = 1.6
    assert_eq!(merged.cloud.len(), 2);
    assert_eq!(merged.cloud.vertices[1], Point3::new(1.5, 0.0, 0.0));
}

#[test]
fn overlapping_points_average_their_colors() {
    let mut video = VolumetricVideo::default();
    video.add_device(Matrix4::identity());
    video.add_device(Matrix4::identity());
    video.add_frame(0, cloud_frame(0, 0, MODE, &[([0.2, 0.2, 0.2], RED)])).unwrap();
    video.add_frame(1, cloud_frame(0, 0, MODE, &[([0.3, 0.3, 0.3], BLUE)])).unwrap();

    let merged = video.merge_devices_frame(0, &DecodeSettings::cloud_only(), &bounds()).unwrap();
    assert_eq!(merged.cloud.len(), 1);
    assert_eq!(merged.cloud.colors[0], Vector3::new(0.5, 0.0, 0.5));
}

#[test]
fn voxelization_is_deterministic() {
    let cloud = ColorCloud {
        vertices: (0..200)
            .map(|i| Point3::new((i % 7) as f32 * 0.13, (i % 11) as f32 * 0.07, (i % 5) as f32 * 0.21))
            .collect(),
        colors: (0..200).map(|i| Vector3::new((i % 3) as f32 / 2.0, 0.25, 1.0)).collect(),
    };
    let grid = |c: &ColorCloud| {
        ColorVoxelGrid::from_cloud_within_bounds(c, 0.1, Point3::origin(), Vector3::new(1.0, 1.0, 1.0)).unwrap()
    };

    let first = grid(&cloud);
    let second = grid(&cloud);
    assert!(!first.is_empty());
    assert_eq!(first.to_voxels(), second.to_voxels());
    assert_eq!(first.to_cloud(), second.to_cloud());
}

#[test]
fn merge_all_devices_collapses_to_one_device() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("merged.kvid");

    let mut video = two_devices();
    video.merge_all_devices(&bounds(), CompressionMode::FastPFor).unwrap();

    assert_eq!(video.nb_devices(), 1);
    assert_eq!(video.nb_frames(0).unwrap(), 2);
    assert_eq!(video.device_transform(0).unwrap(), &Matrix4::identity());

    let frame = video.get_frame(0, 0).unwrap();
    assert_eq!(frame.mode, CaptureMode::Merged);
    assert_eq!(frame.valid_vertex_count, 2);
    // no FastPFor codec is registered by default
    assert_eq!(frame.volume(VolumeKey::ColoredCloud).unwrap().compression, CompressionMode::None);
    assert_eq!(frame.data(DataKey::Calibration).unwrap().payload.len(), 16);

    video.save(&path).unwrap();
    let mut loaded = VolumetricVideo::default();
    loaded.load(&path).unwrap();
    let decoded = loaded.generate_frame(0, 0, &DecodeSettings::cloud_only()).unwrap();
    assert_eq!(decoded.cloud.len(), 2);
    assert_eq!(decoded.cloud.colors[1], Vector3::from(BLUE));
}

#[test]
fn merge_rejects_mixed_modes() {
    let mut video = two_devices();
    video.add_device(Matrix4::identity());
    video
        .add_frame(2, cloud_frame(0, 0, CaptureMode::FmuC1280x720Di640x576MjpgF30, &[]))
        .unwrap();

    let err = video.merge_all_devices(&bounds(), CompressionMode::None).unwrap_err();
    assert!(matches!(
        err,
        VideoError::ModeMismatch {
            expected: MODE,
            found: CaptureMode::FmuC1280x720Di640x576MjpgF30,
        }
    ));
    assert_eq!(video.nb_devices(), 3);
}

#[test]
fn merge_requires_reference_frames() {
    let mut video = VolumetricVideo::default();
    video.add_device(Matrix4::identity());
    assert!(matches!(
        video.merge_all_devices(&bounds(), CompressionMode::None),
        Err(VideoError::NoFrames)
    ));
}

#[test]
fn undecodable_secondary_frame_is_skipped() {
    let mut video = two_devices();
    let broken = undecodable(cloud_frame(1, 36, MODE, &[([0.6, 0.1, 0.1], BLUE)]));
    video.replace_frame(1, 1, broken).unwrap();

    video.merge_all_devices(&bounds(), CompressionMode::None).unwrap();
    assert_eq!(video.nb_devices(), 1);
    assert_eq!(video.nb_frames(0).unwrap(), 2);
    assert_eq!(video.get_frame(0, 0).unwrap().valid_vertex_count, 2);
    // only the reference cloud remains for the second output frame
    assert_eq!(video.get_frame(0, 1).unwrap().valid_vertex_count, 1);
}

#[test]
fn undecodable_reference_frame_is_dropped_from_merge() {
    let mut video = two_devices();
    let broken = undecodable(cloud_frame(0, 0, MODE, &[([0.1, 0.1, 0.1], RED)]));
    video.replace_frame(0, 0, broken).unwrap();

    let err = video
        .merge_devices_frame(0, &DecodeSettings::cloud_only(), &bounds())
        .unwrap_err();
    assert!(matches!(err, VideoError::Decode(_)));

    video.merge_all_devices(&bounds(), CompressionMode::None).unwrap();
    assert_eq!(video.nb_frames(0).unwrap(), 1);
    assert_eq!(video.get_frame(0, 0).unwrap().info.capture_id, 1);
}

#[test]
fn repeated_capture_ids_keep_every_merged_frame() {
    let mut video = two_devices();
    video
        .replace_frame(0, 1, cloud_frame(0, 33, MODE, &[([0.1, 0.1, 0.1], RED)]))
        .unwrap();

    video.merge_all_devices(&bounds(), CompressionMode::None).unwrap();
    assert_eq!(video.nb_frames(0).unwrap(), 2);
    let ids: Vec<i32> = video.device(0).unwrap().iter().map(|f| f.info.capture_id).collect();
    assert_eq!(ids, vec![0, 0]);
}
