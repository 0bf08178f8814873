use std::path::{Path, PathBuf};
use std::process::Command;

use media_ffmpeg::{FfmpegTools, MediaFfmpegError, decode_video_frame_near_seconds, probe_media};

fn tools_or_skip() -> Option<FfmpegTools> {
    match FfmpegTools::locate() {
        Ok(tools) => Some(tools),
        Err(err) => {
            eprintln!("skipping: {err}");
            None
        }
    }
}

fn make_sample_video(tools: &FfmpegTools, dir: &Path) -> PathBuf {
    let output = dir.join("sample.mp4");
    let status = Command::new(&tools.ffmpeg)
        .args([
            "-y",
            "-v",
            "error",
            "-f",
            "lavfi",
            "-i",
            "testsrc=size=320x180:rate=30",
            "-f",
            "lavfi",
            "-i",
            "sine=frequency=440:sample_rate=48000",
            "-t",
            "1.2",
            "-pix_fmt",
            "yuv420p",
        ])
        .arg(&output)
        .output()
        .expect("ffmpeg should start");

    assert!(
        status.status.success(),
        "ffmpeg command must succeed: {}",
        String::from_utf8_lossy(&status.stderr)
    );
    output
}

#[test]
fn probe_media_finds_video_audio_and_duration() {
    let Some(tools) = tools_or_skip() else {
        return;
    };
    let dir = tempfile::tempdir().expect("create temp dir");
    let sample = make_sample_video(&tools, dir.path());

    let info = probe_media(&tools, &sample).expect("probe should succeed");

    let video = info.first_video().expect("video stream should exist");
    assert_eq!(video.width, Some(320));
    assert_eq!(video.height, Some(180));
    assert!(video.frame_rate.is_some());

    let audio = info.first_audio().expect("audio stream should exist");
    assert_eq!(audio.sample_rate, Some(48_000));
    assert_eq!(audio.channels, Some(1));

    let duration = info.duration_seconds.expect("duration should exist");
    assert!((duration - 1.2).abs() < 0.1, "unexpected duration {duration}");
}

#[test]
fn decode_returns_rgba_scaled_to_max_width() {
    let Some(tools) = tools_or_skip() else {
        return;
    };
    let dir = tempfile::tempdir().expect("create temp dir");
    let sample = make_sample_video(&tools, dir.path());

    let full = decode_video_frame_near_seconds(&tools, &sample, 0.5, None)
        .expect("frame decode should succeed");
    assert_eq!((full.width, full.height), (320, 180));
    assert_eq!(full.rgba.len(), 320 * 180 * 4);

    let small = decode_video_frame_near_seconds(&tools, &sample, 0.5, Some(160))
        .expect("scaled decode should succeed");
    assert_eq!((small.width, small.height), (160, 90));
    assert_eq!(small.rgba.len(), 160 * 90 * 4);
}

#[test]
fn probe_of_missing_file_reports_command_failure() {
    let Some(tools) = tools_or_skip() else {
        return;
    };
    let dir = tempfile::tempdir().expect("create temp dir");

    let result = probe_media(&tools, dir.path().join("missing.mp4"));
    assert!(matches!(result, Err(MediaFfmpegError::CommandFailed { .. })));
}

#[test]
fn decode_rejects_negative_timestamp() {
    let tools = FfmpegTools::new("ffmpeg", "ffprobe");

    let result = decode_video_frame_near_seconds(&tools, "unused.mp4", -1.0, None);
    assert!(matches!(
        result,
        Err(MediaFfmpegError::InvalidSeekSeconds(_))
    ));
}
