//! Integration test: composite a capture, drive the render loop from a
//! manual frame clock, end the track, then export the canvas.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::executor::block_on;
use screencanvas_core::capture::CaptureHost;
use screencanvas_core::compositor::composite_screen_capture;
use screencanvas_core::export::{
    ExportHost, GifAnimationEncoder, RasterFrame, export_animation,
};
use screencanvas_core::render_loop::{FrameScheduler, start_render_loop};
use screencanvas_core::{Compositor, ExportError, HostFailure};
use screencanvas_protocol::{
    Color, DisplayMediaConstraints, ExportOptions, RenderCommand, Size, SourceId,
    VideoElementOptions,
};

#[derive(Clone, Debug, PartialEq)]
struct Stream {
    frame_rate: f64,
    audio: bool,
}

#[derive(Default)]
struct Browser {
    frames: RefCell<Vec<Box<dyn FnOnce(f64)>>>,
    now: Cell<f64>,
}

impl Browser {
    fn fire(&self, ts: f64) -> usize {
        let due: Vec<_> = self.frames.borrow_mut().drain(..).collect();
        let n = due.len();
        for tick in due {
            tick(ts);
        }
        n
    }
}

impl CaptureHost for Browser {
    type Stream = Stream;
    type Video = u32;
    type TrackWatch = ();

    fn supports_display_capture(&self) -> bool {
        true
    }

    async fn get_display_media(
        &self,
        constraints: &DisplayMediaConstraints,
    ) -> Result<Stream, HostFailure> {
        Ok(Stream {
            frame_rate: constraints.video.frame_rate,
            audio: constraints.audio,
        })
    }

    fn create_video(&self, _options: &VideoElementOptions) -> Result<u32, HostFailure> {
        Ok(1)
    }

    async fn bind_stream(&self, _video: &u32, _stream: &Stream) -> Result<Size, HostFailure> {
        Ok(Size::new(640, 360))
    }

    fn observe_track_end(&self, _video: &u32, _stream: &Stream) -> Result<(), HostFailure> {
        Ok(())
    }

    fn stop_stream(&self, _stream: &Stream) {}

    fn release_video(&self, _video: &u32) {}
}

impl FrameScheduler for Browser {
    type Request = ();

    fn request_frame(&self, tick: Box<dyn FnOnce(f64)>) -> Result<(), HostFailure> {
        self.frames.borrow_mut().push(tick);
        Ok(())
    }

    fn cancel_frame(&self, _request: ()) {
        self.frames.borrow_mut().clear();
    }
}

impl ExportHost for Browser {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }

    async fn sleep_ms(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }

    async fn snapshot(&self) -> Result<RasterFrame, ExportError> {
        RasterFrame::new(4, 4, vec![128; 64])
    }
}

#[test]
fn capture_render_end_and_export() {
    let browser = Rc::new(Browser::default());
    let compositor = Rc::new(RefCell::new(Compositor::<Stream>::new(Color::WHITE)));

    let done = block_on(composite_screen_capture(
        browser.as_ref(),
        &compositor,
        &VideoElementOptions::default(),
        |_| SourceId(9),
    ))
    .expect("capture succeeds");
    assert_eq!(
        done.stream,
        Stream {
            frame_rate: 30.0,
            audio: false
        }
    );

    let painted: Rc<RefCell<Vec<Vec<RenderCommand>>>> = Rc::new(RefCell::new(Vec::new()));
    let handle = {
        let compositor = Rc::clone(&compositor);
        let painted = Rc::clone(&painted);
        start_render_loop(Rc::clone(&browser), move |_| {
            let frame = compositor.borrow_mut().render_frame(Size::new(800, 600));
            if let Some(commands) = frame.commands {
                painted.borrow_mut().push(commands);
            }
            frame.control
        })
    };

    browser.fire(16.0);
    browser.fire(32.0);
    assert_eq!(painted.borrow().len(), 2, "live video repaints every frame");
    assert!(painted.borrow()[0].contains(&RenderCommand::DrawImage {
        source: SourceId(9),
        rect: screencanvas_protocol::Rect::new(0.0, 0.0, 640.0, 360.0),
    }));

    compositor
        .borrow_mut()
        .end_session(done.session)
        .expect("session was active");
    assert_eq!(browser.fire(48.0), 1);
    assert_eq!(browser.fire(64.0), 0, "loop stopped after the final redraw");
    assert!(!handle.is_running());
    let painted = painted.borrow();
    assert_eq!(painted.len(), 3, "one final redraw after the track ends");
    assert!(
        !painted[2]
            .iter()
            .any(|c| matches!(c, RenderCommand::DrawImage { .. }))
    );

    let options = ExportOptions {
        duration_ms: 1000,
        fps: 10,
        ..ExportOptions::default()
    };
    let artifact = block_on(export_animation(
        browser.as_ref(),
        GifAnimationEncoder::new(&options),
        &options,
    ))
    .expect("export succeeds");
    assert_eq!(artifact.frame_count, 10);
    assert_eq!(artifact.filename, "canvas.gif");
    assert!(artifact.bytes.starts_with(b"GIF89a"));
}
