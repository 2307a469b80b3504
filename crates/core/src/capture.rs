//! Screen capture acquisition, independent of the browser bindings.
//!
//! The host environment is reached through [`CaptureHost`]; the browser crate
//! implements it over `navigator.mediaDevices` and `HTMLVideoElement`.

use screencanvas_protocol::{DisplayMediaConstraints, Size, VideoElementOptions};
use tracing::{debug, warn};

use crate::error::{CaptureError, HostFailure};

/// Display-capture capabilities of the host.
///
/// Implementations are single-threaded; futures need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait CaptureHost {
    type Stream: Clone;
    type Video: Clone;
    /// Keeps a track-end observer registered; dropping it unregisters the
    /// observer.
    type TrackWatch;

    /// Whether the host exposes a display-media request at all.
    fn supports_display_capture(&self) -> bool;

    /// Ask the user to share a screen or window. May wait indefinitely on
    /// the permission prompt.
    async fn get_display_media(
        &self,
        constraints: &DisplayMediaConstraints,
    ) -> Result<Self::Stream, HostFailure>;

    /// Create an unattached video element with the given playback flags.
    fn create_video(&self, options: &VideoElementOptions) -> Result<Self::Video, HostFailure>;

    /// Bind `stream` to `video` and wait until its metadata (native
    /// resolution) is known.
    async fn bind_stream(
        &self,
        video: &Self::Video,
        stream: &Self::Stream,
    ) -> Result<Size, HostFailure>;

    /// Clear the element's stream reference once the stream's video track
    /// ends.
    fn observe_track_end(
        &self,
        video: &Self::Video,
        stream: &Self::Stream,
    ) -> Result<Self::TrackWatch, HostFailure>;

    /// Stop every track of the stream.
    fn stop_stream(&self, stream: &Self::Stream);

    /// Detach and discard a video element.
    fn release_video(&self, video: &Self::Video);
}

/// A playing video element bound to a live capture stream.
#[derive(Debug)]
pub struct CapturedVideo<V, S, W> {
    pub video: V,
    pub stream: S,
    /// Native resolution reported by the stream metadata.
    pub size: Size,
    /// Track-end cleanup; must outlive the capture.
    pub track_watch: W,
}

/// Request a video-only screen capture stream at 30 fps.
pub async fn capture_screen<H: CaptureHost>(host: &H) -> Result<H::Stream, CaptureError> {
    if !host.supports_display_capture() {
        return Err(CaptureError::Unsupported);
    }
    let constraints = DisplayMediaConstraints::screen();
    debug!(frame_rate = constraints.video.frame_rate, "requesting display media");
    host.get_display_media(&constraints)
        .await
        .map_err(CaptureError::from_request)
}

/// Build a playing video element fed by a fresh screen capture.
///
/// On any failure the element is released and any acquired stream is
/// stopped before the error is returned.
pub async fn create_screen_capture_video<H: CaptureHost>(
    host: &H,
    options: &VideoElementOptions,
) -> Result<CapturedVideo<H::Video, H::Stream, H::TrackWatch>, CaptureError> {
    let video = host
        .create_video(options)
        .map_err(|e| CaptureError::Setup(e.to_string()))?;

    let stream = match capture_screen(host).await {
        Ok(stream) => stream,
        Err(err) => {
            host.release_video(&video);
            return Err(err);
        }
    };

    match bind(host, &video, &stream).await {
        Ok((size, track_watch)) => Ok(CapturedVideo {
            video,
            stream,
            size,
            track_watch,
        }),
        Err(err) => {
            warn!(error = %err, "releasing partially constructed capture video");
            host.stop_stream(&stream);
            host.release_video(&video);
            Err(err)
        }
    }
}

async fn bind<H: CaptureHost>(
    host: &H,
    video: &H::Video,
    stream: &H::Stream,
) -> Result<(Size, H::TrackWatch), CaptureError> {
    let size = host
        .bind_stream(video, stream)
        .await
        .map_err(|e| CaptureError::Setup(e.to_string()))?;
    if size.is_empty() {
        return Err(CaptureError::Setup(format!(
            "stream reported an empty resolution ({}x{})",
            size.width, size.height
        )));
    }
    let watch = host
        .observe_track_end(video, stream)
        .map_err(|e| CaptureError::Setup(e.to_string()))?;
    Ok((size, watch))
}
