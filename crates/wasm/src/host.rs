//! `web-sys` implementations of the core host traits.

use gloo_events::EventListener;
use gloo_render::{AnimationFrame, request_animation_frame};
use js_sys::{Function, Object, Promise, Reflect};
use screencanvas_core::HostFailure;
use screencanvas_core::capture::CaptureHost;
use screencanvas_core::error::ExportError;
use screencanvas_core::export::{ExportHost, RasterFrame};
use screencanvas_core::render_loop::FrameScheduler;
use screencanvas_protocol::{DisplayMediaConstraints, Size, VideoElementOptions};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    AddEventListenerOptions, CanvasRenderingContext2d, DisplayMediaStreamConstraints,
    DomException, HtmlCanvasElement, HtmlVideoElement, MediaDevices, MediaStream,
    MediaStreamTrack, Window,
};

/// Convert a thrown or rejected JS value into a host failure, keeping the
/// `DOMException` name when there is one.
pub fn host_failure(value: JsValue) -> HostFailure {
    if let Some(exception) = value.dyn_ref::<DomException>() {
        return HostFailure::named(exception.name(), exception.message());
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return HostFailure::new(String::from(error.message()));
    }
    HostFailure::new(value.as_string().unwrap_or_else(|| format!("{value:?}")))
}

pub fn first_video_track(stream: &MediaStream) -> Option<MediaStreamTrack> {
    stream.get_video_tracks().get(0).dyn_into().ok()
}

fn display_media_options(
    constraints: &DisplayMediaConstraints,
) -> Result<DisplayMediaStreamConstraints, HostFailure> {
    let video = Object::new();
    Reflect::set(
        &video,
        &JsValue::from_str("frameRate"),
        &JsValue::from_f64(constraints.video.frame_rate),
    )
    .map_err(host_failure)?;
    let options = DisplayMediaStreamConstraints::new();
    options.set_video(&video);
    options.set_audio(&JsValue::from_bool(constraints.audio));
    Ok(options)
}

/// `navigator.mediaDevices.getDisplayMedia` plus `<video>` elements.
pub struct BrowserCapture {
    window: Window,
}

impl BrowserCapture {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    /// `None` outside secure contexts, where `mediaDevices` is undefined.
    fn media_devices(&self) -> Option<MediaDevices> {
        let devices = self.window.navigator().media_devices().ok()?;
        (!devices.is_undefined() && !devices.is_null()).then_some(devices)
    }
}

impl CaptureHost for BrowserCapture {
    type Stream = MediaStream;
    type Video = HtmlVideoElement;
    type TrackWatch = EventListener;

    fn supports_display_capture(&self) -> bool {
        let Some(devices) = self.media_devices() else {
            return false;
        };
        Reflect::get(&devices, &JsValue::from_str("getDisplayMedia"))
            .is_ok_and(|f| f.is_function())
    }

    async fn get_display_media(
        &self,
        constraints: &DisplayMediaConstraints,
    ) -> Result<MediaStream, HostFailure> {
        let devices = self.media_devices().ok_or_else(|| {
            HostFailure::named("NotSupportedError", "navigator.mediaDevices is unavailable")
        })?;
        let options = display_media_options(constraints)?;
        let promise = devices
            .get_display_media_with_constraints(&options)
            .map_err(host_failure)?;
        JsFuture::from(promise)
            .await
            .map_err(host_failure)?
            .dyn_into::<MediaStream>()
            .map_err(host_failure)
    }

    fn create_video(&self, options: &VideoElementOptions) -> Result<HtmlVideoElement, HostFailure> {
        let document = self
            .window
            .document()
            .ok_or_else(|| HostFailure::new("window has no document"))?;
        let video = document
            .create_element("video")
            .map_err(host_failure)?
            .dyn_into::<HtmlVideoElement>()
            .map_err(|_| HostFailure::new("created element is not a <video>"))?;
        video.set_autoplay(options.autoplay);
        video.set_controls(options.controls);
        video.set_muted(options.muted);
        Ok(video)
    }

    async fn bind_stream(
        &self,
        video: &HtmlVideoElement,
        stream: &MediaStream,
    ) -> Result<Size, HostFailure> {
        video.set_src_object(Some(stream));
        let loaded = Promise::new(&mut |resolve: Function, reject: Function| {
            let once = AddEventListenerOptions::new();
            once.set_once(true);
            let registered = video
                .add_event_listener_with_callback_and_add_event_listener_options(
                    "loadedmetadata",
                    &resolve,
                    &once,
                )
                .and_then(|()| {
                    video.add_event_listener_with_callback_and_add_event_listener_options(
                        "error", &reject, &once,
                    )
                });
            if let Err(err) = registered {
                let _ = reject.call1(&JsValue::NULL, &err);
            }
        });
        JsFuture::from(loaded).await.map_err(|_| {
            HostFailure::named("MediaError", "video element could not load the stream metadata")
        })?;
        Ok(Size::new(video.video_width(), video.video_height()))
    }

    fn observe_track_end(
        &self,
        video: &HtmlVideoElement,
        stream: &MediaStream,
    ) -> Result<EventListener, HostFailure> {
        let track = first_video_track(stream).ok_or_else(|| {
            HostFailure::named("NotFoundError", "capture stream has no video track")
        })?;
        let video = video.clone();
        Ok(EventListener::once(&track, "ended", move |_| {
            video.set_src_object(None);
        }))
    }

    fn stop_stream(&self, stream: &MediaStream) {
        for track in stream.get_tracks().iter() {
            if let Ok(track) = track.dyn_into::<MediaStreamTrack>() {
                track.stop();
            }
        }
    }

    fn release_video(&self, video: &HtmlVideoElement) {
        video.set_src_object(None);
        video.remove();
    }
}

/// `requestAnimationFrame` as a frame scheduler. Dropping a pending
/// [`AnimationFrame`] cancels it and frees its callback.
pub struct AnimationFrames;

impl FrameScheduler for AnimationFrames {
    type Request = AnimationFrame;

    fn request_frame(&self, tick: Box<dyn FnOnce(f64)>) -> Result<AnimationFrame, HostFailure> {
        Ok(request_animation_frame(tick))
    }

    fn cancel_frame(&self, request: AnimationFrame) {
        drop(request);
    }
}

/// Canvas snapshots and timers for the frame exporter.
pub struct BrowserCanvas {
    window: Window,
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
}

impl BrowserCanvas {
    pub fn new(
        window: Window,
        canvas: HtmlCanvasElement,
        context: CanvasRenderingContext2d,
    ) -> Self {
        Self {
            window,
            canvas,
            context,
        }
    }
}

impl ExportHost for BrowserCanvas {
    fn now_ms(&self) -> f64 {
        self.window
            .performance()
            .map_or_else(js_sys::Date::now, |performance| performance.now())
    }

    async fn sleep_ms(&self, ms: f64) {
        gloo_timers::future::TimeoutFuture::new(ms.ceil() as u32).await;
    }

    async fn snapshot(&self) -> Result<RasterFrame, ExportError> {
        let (width, height) = (self.canvas.width(), self.canvas.height());
        let image = self
            .context
            .get_image_data(0.0, 0.0, f64::from(width), f64::from(height))
            .map_err(|e| ExportError::Snapshot(host_failure(e).to_string()))?;
        RasterFrame::new(width, height, image.data().0)
    }
}
