//! Sampling the rendered canvas into an animated GIF.
//!
//! Sample times are fixed up front at `k * 1000 / fps` for every `k` with
//! `k * interval < duration`, i.e. the half-open window `[0, duration)`.
//! Each wait is measured against the job's start, so a slow snapshot
//! shortens the next wait instead of pushing every later frame back.

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};
use screencanvas_protocol::ExportOptions;
use tracing::{debug, info, warn};

use crate::error::ExportError;

const MAX_FPS: u32 = 100;

/// One snapshot of the canvas in straight RGBA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RasterFrame {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, ExportError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ExportError::FrameSize {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }
}

/// Evenly spaced sample times for one export.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSchedule {
    duration_ms: u32,
    fps: u32,
    frame_count: usize,
}

impl FrameSchedule {
    pub fn new(options: &ExportOptions) -> Result<Self, ExportError> {
        if options.fps == 0 || options.fps > MAX_FPS {
            return Err(ExportError::InvalidOptions(format!(
                "fps must be between 1 and {MAX_FPS}, got {}",
                options.fps
            )));
        }
        if options.duration_ms == 0 {
            return Err(ExportError::InvalidOptions(
                "duration must be positive".into(),
            ));
        }
        // ceil(duration * fps / 1000) in integers, so 1000ms at 10fps is
        // exactly 10 frames.
        let numerator = u64::from(options.duration_ms) * u64::from(options.fps);
        let frame_count = numerator.div_ceil(1000) as usize;
        Ok(Self {
            duration_ms: options.duration_ms,
            fps: options.fps,
            frame_count,
        })
    }

    pub fn interval_ms(&self) -> f64 {
        1000.0 / f64::from(self.fps)
    }

    pub fn duration_ms(&self) -> u32 {
        self.duration_ms
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Offset from the job start at which frame `index` is due.
    pub fn target_ms(&self, index: usize) -> f64 {
        index as f64 * self.interval_ms()
    }

    /// Per-frame display delay written into the animation.
    pub fn delay(&self) -> Delay {
        Delay::from_numer_denom_ms(1000, self.fps)
    }
}

/// Sink for sampled frames.
pub trait AnimationEncoder {
    fn add_frame(&mut self, frame: RasterFrame, delay: Delay) -> Result<(), ExportError>;

    /// Number of frames added so far.
    fn frame_count(&self) -> usize;

    /// Encode all frames into the output file.
    fn finish(self) -> Result<Vec<u8>, ExportError>;
}

/// GIF output via the `image` crate's encoder.
pub struct GifAnimationEncoder {
    frames: Vec<Frame>,
    speed: i32,
    /// `None` plays the animation once.
    repeat: Option<Repeat>,
}

impl GifAnimationEncoder {
    pub fn new(options: &ExportOptions) -> Self {
        Self {
            frames: Vec::new(),
            speed: options.speed.clamp(1, 30),
            repeat: options.repeat_forever.then_some(Repeat::Infinite),
        }
    }
}

impl AnimationEncoder for GifAnimationEncoder {
    fn add_frame(&mut self, frame: RasterFrame, delay: Delay) -> Result<(), ExportError> {
        let RasterFrame {
            width,
            height,
            rgba,
        } = frame;
        let actual = rgba.len();
        let buffer =
            RgbaImage::from_raw(width, height, rgba).ok_or(ExportError::FrameSize {
                width,
                height,
                expected: width as usize * height as usize * 4,
                actual,
            })?;
        self.frames.push(Frame::from_parts(buffer, 0, 0, delay));
        Ok(())
    }

    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn finish(self) -> Result<Vec<u8>, ExportError> {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new_with_speed(&mut bytes, self.speed);
            if let Some(repeat) = self.repeat {
                encoder.set_repeat(repeat)?;
            }
            encoder.encode_frames(self.frames)?;
        }
        Ok(bytes)
    }
}

/// Timing and snapshot capabilities of the host.
#[allow(async_fn_in_trait)]
pub trait ExportHost {
    /// Monotonic clock in milliseconds.
    fn now_ms(&self) -> f64;

    async fn sleep_ms(&self, ms: f64);

    /// Read the canvas' current raster content.
    async fn snapshot(&self) -> Result<RasterFrame, ExportError>;
}

/// In-progress export: the schedule, when it started, and the frames
/// collected so far.
pub struct ExportJob<E> {
    schedule: FrameSchedule,
    started_at_ms: f64,
    encoder: E,
}

impl<E: AnimationEncoder> ExportJob<E> {
    pub fn new(schedule: FrameSchedule, started_at_ms: f64, encoder: E) -> Self {
        Self {
            schedule,
            started_at_ms,
            encoder,
        }
    }

    pub fn collected(&self) -> usize {
        self.encoder.frame_count()
    }

    pub fn is_complete(&self) -> bool {
        self.collected() >= self.schedule.frame_count()
    }

    /// How long to wait at `now_ms` before taking the next sample, or
    /// `None` once every sample is in.
    pub fn delay_before_next(&self, now_ms: f64) -> Option<f64> {
        if self.is_complete() {
            return None;
        }
        let due = self.started_at_ms + self.schedule.target_ms(self.collected());
        Some((due - now_ms).max(0.0))
    }

    pub fn push(&mut self, frame: RasterFrame) -> Result<(), ExportError> {
        let delay = self.schedule.delay();
        self.encoder.add_frame(frame, delay)
    }

    pub fn finish(self) -> Result<Vec<u8>, ExportError> {
        self.encoder.finish()
    }
}

/// The encoded file, ready for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub frame_count: usize,
}

/// Sample the canvas for `options.duration_ms` at `options.fps` and encode
/// the samples.
pub async fn export_animation<H, E>(
    host: &H,
    encoder: E,
    options: &ExportOptions,
) -> Result<ExportArtifact, ExportError>
where
    H: ExportHost,
    E: AnimationEncoder,
{
    let schedule = FrameSchedule::new(options)?;
    info!(
        duration_ms = schedule.duration_ms(),
        fps = options.fps,
        frames = schedule.frame_count(),
        "export started"
    );
    let mut job = ExportJob::new(schedule, host.now_ms(), encoder);

    while let Some(wait) = job.delay_before_next(host.now_ms()) {
        if wait > 0.0 {
            host.sleep_ms(wait).await;
        } else if job.collected() > 0 {
            warn!(frame = job.collected(), "export sampling is behind schedule");
        }
        let frame = host.snapshot().await?;
        job.push(frame)?;
        debug!(frame = job.collected(), "sampled frame");
    }

    let frame_count = job.collected();
    let bytes = job.finish()?;
    info!(frames = frame_count, bytes = bytes.len(), "export finished");
    Ok(ExportArtifact {
        filename: options.filename.clone(),
        bytes,
        frame_count,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use futures::executor::block_on;
    use image::AnimationDecoder;
    use image::codecs::gif::GifDecoder;

    use super::*;

    /// Virtual clock: sleeping advances time, snapshots cost `snapshot_ms`.
    struct FakeCanvas {
        now: Cell<f64>,
        snapshot_ms: f64,
        sleeps: RefCell<Vec<f64>>,
        shots: RefCell<Vec<f64>>,
        fail_at: Option<usize>,
    }

    impl FakeCanvas {
        fn new(snapshot_ms: f64) -> Self {
            Self {
                now: Cell::new(1_000.0),
                snapshot_ms,
                sleeps: RefCell::new(Vec::new()),
                shots: RefCell::new(Vec::new()),
                fail_at: None,
            }
        }
    }

    impl ExportHost for FakeCanvas {
        fn now_ms(&self) -> f64 {
            self.now.get()
        }

        async fn sleep_ms(&self, ms: f64) {
            self.sleeps.borrow_mut().push(ms);
            self.now.set(self.now.get() + ms);
        }

        async fn snapshot(&self) -> Result<RasterFrame, ExportError> {
            if self.fail_at == Some(self.shots.borrow().len()) {
                return Err(ExportError::Snapshot("context lost".into()));
            }
            self.shots.borrow_mut().push(self.now.get() - 1_000.0);
            self.now.set(self.now.get() + self.snapshot_ms);
            let shade = (self.shots.borrow().len() * 40) as u8;
            RasterFrame::new(2, 2, [shade, 0, 0, 255].repeat(4))
        }
    }

    /// Records frames instead of encoding them.
    #[derive(Default)]
    struct CountingEncoder {
        delays: Vec<Delay>,
        finished: Rc<Cell<Option<usize>>>,
    }

    impl AnimationEncoder for CountingEncoder {
        fn add_frame(&mut self, _frame: RasterFrame, delay: Delay) -> Result<(), ExportError> {
            assert!(self.finished.get().is_none(), "frame after finish");
            self.delays.push(delay);
            Ok(())
        }

        fn frame_count(&self) -> usize {
            self.delays.len()
        }

        fn finish(self) -> Result<Vec<u8>, ExportError> {
            self.finished.set(Some(self.delays.len()));
            Ok(vec![0x47, 0x49, 0x46])
        }
    }

    fn options(duration_ms: u32, fps: u32) -> ExportOptions {
        ExportOptions {
            duration_ms,
            fps,
            ..ExportOptions::default()
        }
    }

    #[test]
    fn one_second_at_ten_fps_is_ten_frames() {
        let canvas = FakeCanvas::new(0.0);
        let finished = Rc::new(Cell::new(None));
        let encoder = CountingEncoder {
            finished: Rc::clone(&finished),
            ..CountingEncoder::default()
        };
        let artifact =
            block_on(export_animation(&canvas, encoder, &options(1000, 10))).expect("export");

        assert_eq!(finished.get(), Some(10));
        assert_eq!(artifact.frame_count, 10);
        assert_eq!(artifact.filename, "canvas.gif");
        let shots = canvas.shots.borrow();
        assert_eq!(shots.first(), Some(&0.0));
        assert_eq!(shots.last(), Some(&900.0));
    }

    #[test]
    fn frame_count_rounds_partial_interval_up() {
        let schedule = FrameSchedule::new(&options(1050, 10)).expect("valid");
        assert_eq!(schedule.frame_count(), 11);
        let schedule = FrameSchedule::new(&options(3000, 10)).expect("valid");
        assert_eq!(schedule.frame_count(), 30);
        let schedule = FrameSchedule::new(&options(1, 1)).expect("valid");
        assert_eq!(schedule.frame_count(), 1);
    }

    #[test]
    fn slow_snapshots_shorten_waits() {
        let canvas = FakeCanvas::new(30.0);
        let encoder = CountingEncoder::default();
        block_on(export_animation(&canvas, encoder, &options(500, 10))).expect("export");

        assert_eq!(*canvas.shots.borrow(), vec![0.0, 100.0, 200.0, 300.0, 400.0]);
        assert_eq!(*canvas.sleeps.borrow(), vec![70.0, 70.0, 70.0, 70.0]);
    }

    #[test]
    fn overrunning_snapshots_do_not_skip_frames() {
        let canvas = FakeCanvas::new(250.0);
        let encoder = CountingEncoder::default();
        let artifact =
            block_on(export_animation(&canvas, encoder, &options(300, 10))).expect("export");

        assert_eq!(artifact.frame_count, 3);
        assert!(canvas.sleeps.borrow().is_empty());
        assert_eq!(*canvas.shots.borrow(), vec![0.0, 250.0, 500.0]);
    }

    #[test]
    fn snapshot_failure_aborts_export() {
        let canvas = FakeCanvas {
            fail_at: Some(2),
            ..FakeCanvas::new(0.0)
        };
        let err = block_on(export_animation(
            &canvas,
            CountingEncoder::default(),
            &options(1000, 10),
        ))
        .expect_err("snapshot fails");
        assert!(matches!(err, ExportError::Snapshot(_)));
    }

    #[test]
    fn invalid_options_are_rejected() {
        assert!(matches!(
            FrameSchedule::new(&options(1000, 0)),
            Err(ExportError::InvalidOptions(_))
        ));
        assert!(matches!(
            FrameSchedule::new(&options(0, 10)),
            Err(ExportError::InvalidOptions(_))
        ));
    }

    #[test]
    fn raster_frame_checks_length() {
        let err = RasterFrame::new(2, 2, vec![0; 15]).expect_err("short buffer");
        assert!(matches!(
            err,
            ExportError::FrameSize {
                expected: 16,
                actual: 15,
                ..
            }
        ));
    }

    #[test]
    fn gif_output_decodes_to_same_frames() {
        let canvas = FakeCanvas::new(0.0);
        let opts = options(300, 10);
        let encoder = GifAnimationEncoder::new(&opts);
        let artifact = block_on(export_animation(&canvas, encoder, &opts)).expect("export");

        assert!(artifact.bytes.starts_with(b"GIF89a"));
        let decoder = GifDecoder::new(std::io::Cursor::new(artifact.bytes)).expect("valid gif");
        let frames = decoder.into_frames().collect_frames().expect("frames");
        assert_eq!(frames.len(), 3);
        let (numer, denom) = frames[0].delay().numer_denom_ms();
        assert_eq!(f64::from(numer) / f64::from(denom), 100.0);
    }
}
