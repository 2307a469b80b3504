use serde::{Deserialize, Serialize};

use crate::types::Point;

/// Smallest zoom factor the view will accept.
pub const MIN_ZOOM: f64 = 0.01;
/// Largest zoom factor the view will accept.
pub const MAX_ZOOM: f64 = 20.0;

/// The pan/zoom mapping from scene coordinates to screen pixels.
///
/// `screen = scene * zoom + pan`. Zoom always lies in `[MIN_ZOOM, MAX_ZOOM]`
/// when produced by the viewport operations in `screencanvas-core`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub zoom: f64,
    pub pan: Point,
}

impl ViewState {
    pub fn new(zoom: f64, pan: Point) -> Self {
        Self { zoom, pan }
    }

    pub fn scene_to_screen(&self, p: Point) -> Point {
        Point::new(p.x * self.zoom + self.pan.x, p.y * self.zoom + self.pan.y)
    }

    pub fn screen_to_scene(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.pan.x) / self.zoom,
            (p.y - self.pan.y) / self.zoom,
        )
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan: Point::ORIGIN,
        }
    }
}
