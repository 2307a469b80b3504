//! Host-independent logic for the screencanvas demo: view math, the scene
//! draw list, screen-capture sessions, the redraw loop and GIF export.
//!
//! Browser APIs are reached only through the [`capture::CaptureHost`],
//! [`render_loop::FrameScheduler`] and [`export::ExportHost`] traits.

pub mod capture;
pub mod compositor;
pub mod error;
pub mod export;
pub mod render_loop;
pub mod scene;
pub mod viewport;
pub mod zoom;

pub use compositor::{CaptureSession, Compositor, SessionId};
pub use error::{CaptureError, ExportError, HostFailure};
pub use zoom::calculate_zoom;
