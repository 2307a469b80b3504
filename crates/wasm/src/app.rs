use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use gloo_events::{EventListener, EventListenerOptions};
use screencanvas_core::capture::CaptureHost;
use screencanvas_core::compositor::composite_screen_capture;
use screencanvas_core::export::{ExportArtifact, GifAnimationEncoder, export_animation};
use screencanvas_core::render_loop::{LoopControl, RenderLoopHandle, start_render_loop};
use screencanvas_core::viewport::{PointerButtons, WheelInput};
use screencanvas_core::{CaptureError, Compositor, HostFailure, SessionId};
use screencanvas_protocol::{CanvasConfig, Point, Size, SourceId};
use tracing::{debug, error, info, trace, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Blob, BlobPropertyBag, CanvasRenderingContext2d, Document, Event, EventTarget,
    HtmlAnchorElement, HtmlCanvasElement, MediaStream, MouseEvent, Url, WheelEvent, Window,
};

use crate::host::{AnimationFrames, BrowserCanvas, BrowserCapture, first_video_track, host_failure};
use crate::painter::CanvasPainter;

/// Listeners tied to the active capture session. Dropping it unregisters
/// them, so a replaced session leaves nothing behind on its track.
struct LiveCapture {
    session: SessionId,
    source: SourceId,
    _clear_on_end: EventListener,
    _end_session: EventListener,
}

/// The mounted canvas and everything attached to it.
pub struct App {
    config: CanvasConfig,
    window: Window,
    document: Document,
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    compositor: RefCell<Compositor<MediaStream>>,
    painter: RefCell<CanvasPainter>,
    frames: Rc<AnimationFrames>,
    render_loop: RefCell<Option<RenderLoopHandle<AnimationFrames>>>,
    live: RefCell<Option<LiveCapture>>,
    listeners: RefCell<Vec<EventListener>>,
    exporting: Cell<bool>,
}

impl App {
    pub fn mount(config: CanvasConfig) -> Result<Rc<Self>, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let canvas = document
            .get_element_by_id(&config.canvas_id)
            .ok_or_else(|| {
                JsValue::from_str(&format!("no canvas element with id '{}'", config.canvas_id))
            })?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| JsValue::from_str("element is not a canvas"))?;
        fit_to_css_size(&window, &canvas)?;
        let context = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|_| JsValue::from_str("context is not a CanvasRenderingContext2d"))?;

        let app = Rc::new(Self {
            compositor: RefCell::new(Compositor::new(config.background)),
            painter: RefCell::new(CanvasPainter::new(context.clone())),
            frames: Rc::new(AnimationFrames),
            render_loop: RefCell::new(None),
            live: RefCell::new(None),
            listeners: RefCell::new(Vec::new()),
            exporting: Cell::new(false),
            config,
            window,
            document,
            canvas,
            context,
        });
        app.bind_viewport_events();
        app.bind_buttons();
        app.render_now();
        info!(
            width = app.canvas.width(),
            height = app.canvas.height(),
            "canvas ready"
        );
        Ok(app)
    }

    pub fn zoom(&self) -> f64 {
        self.compositor.borrow().view().zoom
    }

    fn canvas_size(&self) -> Size {
        Size::new(self.canvas.width(), self.canvas.height())
    }

    /// Paint if anything changed since the last frame, and report whether
    /// a redraw loop still has live content to follow.
    fn paint_frame(&self) -> LoopControl {
        let size = self.canvas_size();
        let frame = self.compositor.borrow_mut().render_frame(size);
        if let Some(commands) = &frame.commands {
            self.painter.borrow().paint(commands, size);
        }
        frame.control
    }

    fn render_now(&self) {
        self.paint_frame();
    }

    /// Paint on the next loop frame, or right away when no loop runs.
    fn request_render(&self) {
        let looping = self
            .render_loop
            .borrow()
            .as_ref()
            .is_some_and(RenderLoopHandle::is_running);
        if !looping {
            self.render_now();
        }
    }

    fn ensure_render_loop(self: &Rc<Self>) {
        let mut slot = self.render_loop.borrow_mut();
        if slot.as_ref().is_some_and(RenderLoopHandle::is_running) {
            return;
        }
        let weak = Rc::downgrade(self);
        *slot = Some(start_render_loop(Rc::clone(&self.frames), move |_| {
            weak.upgrade().map_or(LoopControl::Stop, |app| app.paint_frame())
        }));
        debug!("render loop started");
    }

    fn stop_render_loop(&self) {
        if let Some(handle) = self.render_loop.borrow_mut().take() {
            handle.cancel();
            debug!(frames = handle.frames_drawn(), "render loop stopped");
        }
    }

    /// Listen on `target` for the app's lifetime; the handler reaches the
    /// app through a weak reference.
    fn listen<F>(
        self: &Rc<Self>,
        target: &EventTarget,
        event_type: &'static str,
        options: EventListenerOptions,
        handler: F,
    ) where
        F: Fn(&Rc<Self>, &Event) + 'static,
    {
        let weak = Rc::downgrade(self);
        let listener = EventListener::new_with_options(target, event_type, options, move |event| {
            if let Some(app) = weak.upgrade() {
                handler(&app, event);
            }
        });
        self.listeners.borrow_mut().push(listener);
    }

    fn bind_viewport_events(self: &Rc<Self>) {
        let canvas = self.canvas.clone();
        self.listen(
            &canvas,
            "wheel",
            EventListenerOptions::enable_prevent_default(),
            |app, event| {
                if let Some(event) = event.dyn_ref::<WheelEvent>() {
                    app.on_wheel(event);
                }
            },
        );
        self.listen(
            &canvas,
            "mousedown",
            EventListenerOptions::enable_prevent_default(),
            |app, event| {
                if let Some(event) = event.dyn_ref::<MouseEvent>() {
                    app.on_mouse_down(event);
                }
            },
        );
        self.listen(&canvas, "mousemove", EventListenerOptions::default(), |app, event| {
            if let Some(event) = event.dyn_ref::<MouseEvent>() {
                app.on_mouse_move(event);
            }
        });
        for event_type in ["mouseup", "mouseleave"] {
            self.listen(&canvas, event_type, EventListenerOptions::default(), |app, _| {
                app.compositor.borrow_mut().end_pan();
            });
        }
    }

    fn bind_buttons(self: &Rc<Self>) {
        match self.document.get_element_by_id(&self.config.capture_button_id) {
            Some(button) => {
                self.listen(&button, "click", EventListenerOptions::default(), |app, _| {
                    let app = Rc::clone(app);
                    wasm_bindgen_futures::spawn_local(app.handle_screen_capture_click());
                });
            }
            None => warn!(id = %self.config.capture_button_id, "capture button not found"),
        }

        match self.document.get_element_by_id(&self.config.export_button_id) {
            Some(button) => {
                self.listen(&button, "click", EventListenerOptions::default(), |app, _| {
                    let app = Rc::clone(app);
                    wasm_bindgen_futures::spawn_local(app.handle_export_click());
                });
            }
            None => warn!(id = %self.config.export_button_id, "export button not found"),
        }
    }

    fn on_wheel(&self, event: &WheelEvent) {
        let outcome = self.compositor.borrow_mut().handle_wheel(WheelInput {
            delta_y: event.delta_y(),
            offset_x: f64::from(event.offset_x()),
            offset_y: f64::from(event.offset_y()),
        });
        if outcome.prevent_default {
            event.prevent_default();
        }
        if outcome.stop_propagation {
            event.stop_propagation();
        }
        trace!(zoom = outcome.view.zoom, "wheel zoom");
        self.request_render();
    }

    fn on_mouse_down(&self, event: &MouseEvent) {
        let pointer = Point::new(f64::from(event.offset_x()), f64::from(event.offset_y()));
        let buttons = PointerButtons {
            alt_key: event.alt_key(),
            button: event.button(),
        };
        if self.compositor.borrow_mut().begin_pan(pointer, buttons) {
            event.prevent_default();
        }
    }

    fn on_mouse_move(&self, event: &MouseEvent) {
        let pointer = Point::new(f64::from(event.offset_x()), f64::from(event.offset_y()));
        let moved = self.compositor.borrow_mut().update_pan(pointer);
        if moved {
            self.request_render();
        }
    }

    /// Capture the screen and composite it; failures end in an alert.
    pub async fn handle_screen_capture_click(self: Rc<Self>) {
        if let Err(err) = self.start_capture().await {
            error!(error = %err, "screen capture failed");
            self.alert(&err.user_message());
        }
    }

    async fn start_capture(self: &Rc<Self>) -> Result<(), CaptureError> {
        let host = BrowserCapture::new(self.window.clone());
        let done = composite_screen_capture(&host, &self.compositor, &self.config.video, |video| {
            self.painter.borrow_mut().register(video.clone())
        })
        .await?;

        drop(self.live.borrow_mut().take());
        if let Some(old) = &done.replaced {
            if let Some(video) = self.painter.borrow_mut().unregister(old.source) {
                host.release_video(&video);
            }
        }

        let end_session = match self.watch_track_end(done.session, &done.stream) {
            Ok(listener) => listener,
            Err(failure) => {
                host.stop_stream(&done.stream);
                self.compositor.borrow_mut().end_session(done.session);
                self.painter.borrow_mut().unregister(done.source);
                host.release_video(&done.video);
                self.request_render();
                return Err(CaptureError::Setup(failure.to_string()));
            }
        };
        *self.live.borrow_mut() = Some(LiveCapture {
            session: done.session,
            source: done.source,
            _clear_on_end: done.track_watch,
            _end_session: end_session,
        });

        self.ensure_render_loop();
        Ok(())
    }

    fn watch_track_end(
        self: &Rc<Self>,
        session: SessionId,
        stream: &MediaStream,
    ) -> Result<EventListener, HostFailure> {
        let track = first_video_track(stream).ok_or_else(|| {
            HostFailure::named("NotFoundError", "capture stream has no video track")
        })?;
        let weak: Weak<Self> = Rc::downgrade(self);
        Ok(EventListener::once(&track, "ended", move |_| {
            if let Some(app) = weak.upgrade() {
                info!(session = session.0, "capture track ended");
                app.end_capture(session);
            }
        }))
    }

    /// Remove the session's node and release its element. The redraw loop
    /// paints one more frame and stops itself once nothing live remains.
    fn end_capture(&self, session: SessionId) {
        if self.compositor.borrow_mut().end_session(session).is_none() {
            return;
        }
        let live = self
            .live
            .borrow_mut()
            .take_if(|live| live.session == session);
        if let Some(live) = live {
            if let Some(video) = self.painter.borrow_mut().unregister(live.source) {
                BrowserCapture::new(self.window.clone()).release_video(&video);
            }
        }
        self.request_render();
    }

    /// Sample the canvas and download the resulting GIF.
    pub async fn handle_export_click(self: Rc<Self>) {
        if self.exporting.replace(true) {
            warn!("export already in progress");
            return;
        }
        let host = BrowserCanvas::new(
            self.window.clone(),
            self.canvas.clone(),
            self.context.clone(),
        );
        let options = self.config.export.clone();
        let result = export_animation(&host, GifAnimationEncoder::new(&options), &options).await;
        self.exporting.set(false);

        let outcome = match result {
            Ok(artifact) => download(&self.document, &artifact).map_err(|f| f.to_string()),
            Err(err) => Err(err.to_string()),
        };
        if let Err(message) = outcome {
            error!(error = %message, "export failed");
            self.alert(&format!("Operation failed: {message}"));
        }
    }

    fn alert(&self, message: &str) {
        if self.window.alert_with_message(message).is_err() {
            warn!("alert could not be shown");
        }
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.stop_render_loop();
    }
}

/// Match the canvas' backing store to its laid-out CSS size.
fn fit_to_css_size(window: &Window, canvas: &HtmlCanvasElement) -> Result<(), JsValue> {
    let Some(style) = window.get_computed_style(canvas)? else {
        return Ok(());
    };
    let width = css_pixels(&style.get_property_value("width")?);
    let height = css_pixels(&style.get_property_value("height")?);
    if let (Some(width), Some(height)) = (width, height) {
        canvas.set_width(width);
        canvas.set_height(height);
        debug!(width, height, "canvas sized to CSS box");
    }
    Ok(())
}

/// Parse a computed CSS length such as `"812.5px"` into whole pixels.
pub(crate) fn css_pixels(value: &str) -> Option<u32> {
    value
        .trim()
        .trim_end_matches("px")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 1.0)
        .map(|v| v.floor() as u32)
}

/// Hand the file to the browser as a download.
fn download(document: &Document, artifact: &ExportArtifact) -> Result<(), HostFailure> {
    let anchor = document
        .create_element("a")
        .map_err(host_failure)?
        .dyn_into::<HtmlAnchorElement>()
        .map_err(|_| HostFailure::new("created element is not an <a>"))?;

    let bytes = js_sys::Uint8Array::from(artifact.bytes.as_slice());
    let parts = js_sys::Array::of1(&bytes);
    let properties = BlobPropertyBag::new();
    properties.set_type("image/gif");
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &properties)
        .map_err(host_failure)?;
    let url = Url::create_object_url_with_blob(&blob).map_err(host_failure)?;

    anchor.set_href(&url);
    anchor.set_download(&artifact.filename);
    anchor.click();
    Url::revoke_object_url(&url).map_err(host_failure)?;
    info!(file = %artifact.filename, bytes = artifact.bytes.len(), "export downloaded");
    Ok(())
}
