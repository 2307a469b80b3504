use std::cell::RefCell;

use screencanvas_protocol::{
    Color, Point, RenderCommand, Size, SourceId, VideoElementOptions, ViewState,
};
use tracing::{debug, info};

use crate::capture::{CaptureHost, create_screen_capture_video};
use crate::error::CaptureError;
use crate::render_loop::LoopControl;
use crate::scene::{NodeId, Scene, create_video_image_object};
use crate::viewport::{PanGesture, PointerButtons, WheelInput, WheelOutcome, handle_wheel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

/// One live screen capture composited into the scene.
#[derive(Debug, Clone)]
pub struct CaptureSession<S> {
    pub id: SessionId,
    /// Cleared when the session ends.
    pub stream: Option<S>,
    pub node: NodeId,
    pub source: SourceId,
    pub size: Size,
}

/// Scene, view transform and the (single) capture session.
///
/// A second capture request while one is still pending is rejected; a new
/// session replaces the active one.
#[derive(Debug)]
pub struct Compositor<S> {
    scene: Scene,
    view: ViewState,
    pan: PanGesture,
    session: Option<CaptureSession<S>>,
    pending: bool,
    next_session: u64,
}

impl<S> Compositor<S> {
    pub fn new(background: Color) -> Self {
        Self {
            scene: Scene::new(background),
            view: ViewState::default(),
            pan: PanGesture::default(),
            session: None,
            pending: false,
            next_session: 1,
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn set_view(&mut self, view: ViewState) {
        self.view = view;
        self.scene.request_render();
    }

    pub fn handle_wheel(&mut self, input: WheelInput) -> WheelOutcome {
        let outcome = handle_wheel(&self.view, input);
        self.set_view(outcome.view);
        outcome
    }

    pub fn begin_pan(&mut self, pointer: Point, buttons: PointerButtons) -> bool {
        self.pan.begin(pointer, buttons)
    }

    /// Returns whether the view moved.
    pub fn update_pan(&mut self, pointer: Point) -> bool {
        match self.pan.update(&self.view, pointer) {
            Some(view) => {
                self.set_view(view);
                true
            }
            None => false,
        }
    }

    pub fn end_pan(&mut self) {
        self.pan.end();
    }

    pub fn session(&self) -> Option<&CaptureSession<S>> {
        self.session.as_ref()
    }

    pub fn is_capture_pending(&self) -> bool {
        self.pending
    }

    /// Reserve the capture slot for a new request.
    pub fn begin_capture(&mut self) -> Result<(), CaptureError> {
        if self.pending {
            return Err(CaptureError::Busy);
        }
        self.pending = true;
        Ok(())
    }

    /// Release the slot after a failed request.
    pub fn abort_capture(&mut self) {
        self.pending = false;
    }

    /// Place a freshly captured stream in the scene as the active session.
    ///
    /// Returns the new session id and the session it replaced, if any. The
    /// caller is responsible for stopping the replaced stream.
    pub fn attach_capture(
        &mut self,
        stream: S,
        source: SourceId,
        size: Size,
    ) -> (SessionId, Option<CaptureSession<S>>) {
        self.pending = false;
        let replaced = self.session.take().map(|old| {
            self.scene.remove(old.node);
            info!(session = old.id.0, "replacing active capture session");
            old
        });

        let id = SessionId(self.next_session);
        self.next_session += 1;
        let node = self.scene.add(create_video_image_object(source, size));
        self.session = Some(CaptureSession {
            id,
            stream: Some(stream),
            node,
            source,
            size,
        });
        info!(
            session = id.0,
            width = size.width,
            height = size.height,
            "capture composited"
        );
        (id, replaced)
    }

    /// Tear down a session after its track ended: remove the node, force a
    /// redraw and clear the stream reference.
    ///
    /// Ids of sessions that were already replaced are ignored.
    pub fn end_session(&mut self, id: SessionId) -> Option<CaptureSession<S>> {
        if self.session.as_ref().map(|s| s.id) != Some(id) {
            debug!(session = id.0, "ignoring end of inactive session");
            return None;
        }
        let mut session = self.session.take()?;
        self.scene.remove(session.node);
        self.scene.request_render();
        session.stream = None;
        info!(session = id.0, "capture session ended");
        Some(session)
    }

    pub fn needs_render(&self) -> bool {
        self.scene.needs_render()
    }

    /// Whether frames keep changing without user input.
    pub fn has_live_content(&self) -> bool {
        self.scene.has_live_nodes()
    }

    pub fn render(&mut self, canvas: Size) -> Vec<RenderCommand> {
        self.scene.render(&self.view, canvas)
    }

    /// One redraw-loop frame: the draw list if anything changed, and
    /// whether the loop should keep going. The frame that follows the
    /// removal of the last live node is still painted before the loop is
    /// told to stop.
    pub fn render_frame(&mut self, canvas: Size) -> Frame {
        let commands = self.needs_render().then(|| self.render(canvas));
        let control = if self.has_live_content() {
            LoopControl::Continue
        } else {
            LoopControl::Stop
        };
        Frame { commands, control }
    }
}

/// Output of [`Compositor::render_frame`].
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub commands: Option<Vec<RenderCommand>>,
    pub control: LoopControl,
}

/// A capture that made it into the scene.
#[derive(Debug)]
pub struct CompositedCapture<V, S, W> {
    pub session: SessionId,
    pub source: SourceId,
    pub video: V,
    pub stream: S,
    pub track_watch: W,
    /// The session this capture displaced; its stream is already stopped.
    pub replaced: Option<CaptureSession<S>>,
}

/// Acquire a screen capture and composite it into the scene.
///
/// `register` maps the new video element to the source id the renderer
/// will draw from. The compositor is never borrowed across an await.
pub async fn composite_screen_capture<H, F>(
    host: &H,
    compositor: &RefCell<Compositor<H::Stream>>,
    options: &VideoElementOptions,
    register: F,
) -> Result<CompositedCapture<H::Video, H::Stream, H::TrackWatch>, CaptureError>
where
    H: CaptureHost,
    F: FnOnce(&H::Video) -> SourceId,
{
    compositor.borrow_mut().begin_capture()?;

    let captured = match create_screen_capture_video(host, options).await {
        Ok(captured) => captured,
        Err(err) => {
            compositor.borrow_mut().abort_capture();
            return Err(err);
        }
    };

    let source = register(&captured.video);
    let (session, replaced) =
        compositor
            .borrow_mut()
            .attach_capture(captured.stream.clone(), source, captured.size);
    if let Some(stream) = replaced.as_ref().and_then(|old| old.stream.as_ref()) {
        host.stop_stream(stream);
    }

    Ok(CompositedCapture {
        session,
        source,
        video: captured.video,
        stream: captured.stream,
        track_watch: captured.track_watch,
        replaced,
    })
}
