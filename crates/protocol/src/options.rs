use serde::{Deserialize, Serialize};

use crate::types::Color;

/// Frame rate requested from the display-capture host. Best effort; the
/// browser picks the actual rate.
pub const CAPTURE_FRAME_RATE: f64 = 30.0;

/// Constraints passed to the host's display-media request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayMediaConstraints {
    pub video: VideoConstraints,
    pub audio: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoConstraints {
    pub frame_rate: f64,
}

impl DisplayMediaConstraints {
    /// Video-only screen capture at the default frame rate.
    pub fn screen() -> Self {
        Self {
            video: VideoConstraints {
                frame_rate: CAPTURE_FRAME_RATE,
            },
            audio: false,
        }
    }
}

/// Playback flags applied to the video element that hosts the stream.
///
/// Autoplay and muted default to on so that browsers allow playback
/// without a further user gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoElementOptions {
    pub autoplay: bool,
    pub controls: bool,
    pub muted: bool,
}

impl Default for VideoElementOptions {
    fn default() -> Self {
        Self {
            autoplay: true,
            controls: false,
            muted: true,
        }
    }
}

/// Parameters of an animated-image export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExportOptions {
    /// Total sampling window in milliseconds.
    pub duration_ms: u32,
    /// Samples per second.
    pub fps: u32,
    /// Name of the downloaded file.
    pub filename: String,
    /// GIF quantizer speed, 1 (best) to 30 (fastest).
    pub speed: i32,
    /// Loop the animation forever instead of playing once.
    pub repeat_forever: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            duration_ms: 3000,
            fps: 10,
            filename: "canvas.gif".into(),
            speed: 10,
            repeat_forever: true,
        }
    }
}

/// Everything the browser front end needs to mount.
///
/// Deserialized from a JSON object; every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CanvasConfig {
    pub canvas_id: String,
    pub capture_button_id: String,
    pub export_button_id: String,
    pub background: Color,
    pub video: VideoElementOptions,
    pub export: ExportOptions,
    /// Maximum log level forwarded to the browser console.
    pub log_level: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            canvas_id: "c".into(),
            capture_button_id: "addScreenCapture".into(),
            export_button_id: "exportGif".into(),
            background: Color::WHITE,
            video: VideoElementOptions::default(),
            export: ExportOptions::default(),
            log_level: "info".into(),
        }
    }
}
