use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::warn;

use crate::error::HostFailure;

/// The host's per-refresh callback primitive (`requestAnimationFrame`).
pub trait FrameScheduler {
    /// Token identifying a scheduled callback.
    type Request;

    /// Run `tick` once on the next display refresh, passing the frame
    /// timestamp in milliseconds.
    fn request_frame(&self, tick: Box<dyn FnOnce(f64)>) -> Result<Self::Request, HostFailure>;

    /// Unschedule a callback that has not run yet.
    fn cancel_frame(&self, request: Self::Request);
}

struct LoopState<R> {
    running: Cell<bool>,
    pending: Cell<Option<R>>,
    frames: Cell<u64>,
}

/// Returned by each `draw` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    /// End the loop after this frame; no further frame is requested.
    Stop,
}

type DrawFn = Rc<RefCell<dyn FnMut(f64) -> LoopControl>>;

/// Handle to a running redraw loop. Cancelling unschedules the next frame;
/// dropping the handle leaves the loop running.
pub struct RenderLoopHandle<S: FrameScheduler> {
    scheduler: Rc<S>,
    state: Rc<LoopState<S::Request>>,
}

impl<S: FrameScheduler> Clone for RenderLoopHandle<S> {
    fn clone(&self) -> Self {
        Self {
            scheduler: Rc::clone(&self.scheduler),
            state: Rc::clone(&self.state),
        }
    }
}

impl<S: FrameScheduler> RenderLoopHandle<S> {
    pub fn is_running(&self) -> bool {
        self.state.running.get()
    }

    /// Number of completed `draw` calls.
    pub fn frames_drawn(&self) -> u64 {
        self.state.frames.get()
    }

    /// Stop the loop. Safe to call from inside `draw` and more than once.
    pub fn cancel(&self) {
        self.state.running.set(false);
        if let Some(request) = self.state.pending.take() {
            self.scheduler.cancel_frame(request);
        }
    }
}

/// Call `draw` on every display refresh until it returns
/// [`LoopControl::Stop`] or the returned handle is cancelled. Each frame
/// schedules the next from inside its own callback.
pub fn start_render_loop<S, F>(scheduler: Rc<S>, draw: F) -> RenderLoopHandle<S>
where
    S: FrameScheduler + 'static,
    F: FnMut(f64) -> LoopControl + 'static,
{
    let state = Rc::new(LoopState {
        running: Cell::new(true),
        pending: Cell::new(None),
        frames: Cell::new(0),
    });
    let draw: DrawFn = Rc::new(RefCell::new(draw));
    schedule_next(&scheduler, &state, &draw);
    RenderLoopHandle { scheduler, state }
}

fn schedule_next<S>(
    scheduler: &Rc<S>,
    state: &Rc<LoopState<S::Request>>,
    draw: &DrawFn,
) where
    S: FrameScheduler + 'static,
{
    if !state.running.get() {
        return;
    }

    let tick = {
        let scheduler = Rc::clone(scheduler);
        let state = Rc::clone(state);
        let draw = Rc::clone(draw);
        Box::new(move |timestamp: f64| {
            state.pending.set(None);
            if !state.running.get() {
                return;
            }
            let control = (*draw.borrow_mut())(timestamp);
            state.frames.set(state.frames.get() + 1);
            if control == LoopControl::Stop {
                state.running.set(false);
                return;
            }
            schedule_next(&scheduler, &state, &draw);
        })
    };

    match scheduler.request_frame(tick) {
        Ok(request) => state.pending.set(Some(request)),
        Err(failure) => {
            warn!(%failure, "frame request failed, stopping render loop");
            state.running.set(false);
        }
    }
}

#[cfg(test)]
pub(crate) mod manual {
    //! Frame scheduler driven by hand from tests.

    use super::*;

    pub type Tick = Box<dyn FnOnce(f64)>;

    /// Scheduler whose frames fire only when the test says so.
    #[derive(Default)]
    pub struct ManualFrames {
        pub queue: RefCell<Vec<(u32, Tick)>>,
        pub next: Cell<u32>,
        pub cancelled: RefCell<Vec<u32>>,
        pub fail: Cell<bool>,
    }

    impl ManualFrames {
        /// Run every callback queued before this call.
        pub fn fire(&self, timestamp: f64) -> usize {
            let due: Vec<_> = self.queue.borrow_mut().drain(..).collect();
            let n = due.len();
            for (_, tick) in due {
                tick(timestamp);
            }
            n
        }

        pub fn queued(&self) -> usize {
            self.queue.borrow().len()
        }
    }

    impl FrameScheduler for ManualFrames {
        type Request = u32;

        fn request_frame(&self, tick: Tick) -> Result<u32, HostFailure> {
            if self.fail.get() {
                return Err(HostFailure::new("no window"));
            }
            let id = self.next.get() + 1;
            self.next.set(id);
            self.queue.borrow_mut().push((id, tick));
            Ok(id)
        }

        fn cancel_frame(&self, request: u32) {
            self.cancelled.borrow_mut().push(request);
            self.queue.borrow_mut().retain(|(id, _)| *id != request);
        }
    }
}
