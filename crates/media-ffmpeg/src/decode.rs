use std::path::Path;

use crate::error::{MediaFfmpegError, Result};
use crate::probe::probe_media;
use crate::tools::{FfmpegTools, spawn_error, tool_command};

/// A decoded video frame in RGBA format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedVideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Decodes the first video frame at-or-after `at_seconds` from the file start.
///
/// When `max_width` is set and the source is wider, the frame is scaled down
/// keeping the aspect ratio.
///
/// # Example
/// ```no_run
/// use media_ffmpeg::{FfmpegTools, decode_video_frame_near_seconds};
///
/// let tools = FfmpegTools::locate().expect("tools");
/// let frame = decode_video_frame_near_seconds(&tools, "sample.mp4", 0.5, Some(640))
///     .expect("decode should succeed");
/// assert!(frame.width <= 640);
/// ```
pub fn decode_video_frame_near_seconds(
    tools: &FfmpegTools,
    path: impl AsRef<Path>,
    at_seconds: f64,
    max_width: Option<u32>,
) -> Result<DecodedVideoFrame> {
    if !at_seconds.is_finite() || at_seconds < 0.0 {
        return Err(MediaFfmpegError::InvalidSeekSeconds(at_seconds));
    }

    let path = path.as_ref();
    let media = probe_media(tools, path)?;
    let video = media
        .first_video()
        .ok_or_else(|| MediaFfmpegError::MissingVideoStream(path.to_path_buf()))?;
    let (Some(source_width), Some(source_height)) = (video.width, video.height) else {
        return Err(MediaFfmpegError::MissingVideoDimensions(path.to_path_buf()));
    };
    let (width, height) = fit_width(source_width, source_height, max_width);

    let output = tool_command(&tools.ffmpeg)
        .args(["-hide_banner", "-v", "error", "-ss"])
        .arg(format!("{at_seconds:.6}"))
        .arg("-i")
        .arg(path)
        .arg("-vf")
        .arg(format!("scale={width}:{height}"))
        .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "rgba", "-"])
        .output()
        .map_err(|source| {
            spawn_error("ffmpeg", &tools.ffmpeg, "run ffmpeg decode frame", source)
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffmpeg decode frame {}", path.display()),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let rgba = output.stdout;
    let expected_size = width as usize * height as usize * 4;
    if rgba.len() != expected_size {
        return Err(MediaFfmpegError::Parse {
            context: "decoded rgba size",
            value: format!("expected {expected_size} bytes, got {}", rgba.len()),
        });
    }

    Ok(DecodedVideoFrame {
        width,
        height,
        rgba,
    })
}

fn fit_width(width: u32, height: u32, max_width: Option<u32>) -> (u32, u32) {
    let Some(max_width) = max_width.filter(|max| *max > 0 && *max < width) else {
        return (width, height);
    };

    let scaled = u64::from(height) * u64::from(max_width) / u64::from(width);
    // Keep both dimensions even so chroma-subsampled sources scale cleanly.
    let scaled_height = (scaled as u32 & !1).max(2);
    (max_width & !1, scaled_height)
}
