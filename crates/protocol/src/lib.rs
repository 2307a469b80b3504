pub mod commands;
pub mod options;
pub mod types;
pub mod view;

pub use commands::{RenderCommand, SourceId};
pub use options::{
    CAPTURE_FRAME_RATE, CanvasConfig, DisplayMediaConstraints, ExportOptions, VideoConstraints,
    VideoElementOptions,
};
pub use types::{Color, Point, Rect, Size};
pub use view::{MAX_ZOOM, MIN_ZOOM, ViewState};
