//! Pointer and wheel interaction on the view transform.
//!
//! Every operation here is a pure function of (input, current view) to the
//! next view. The browser layer owns the event listeners and applies the
//! returned state; nothing is retained between events except the drag anchor
//! held by [`PanGesture`].

use screencanvas_protocol::{Point, ViewState};

use crate::zoom::calculate_zoom;

/// The parts of a DOM `WheelEvent` the viewport needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelInput {
    pub delta_y: f64,
    /// Cursor position relative to the canvas element, in CSS pixels.
    pub offset_x: f64,
    pub offset_y: f64,
}

/// The new view plus what the caller must do with the originating event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelOutcome {
    pub view: ViewState,
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

/// Set the zoom factor to `zoom` while keeping the scene point under
/// `anchor` (screen coordinates) in place.
pub fn zoom_to_point(view: &ViewState, anchor: Point, zoom: f64) -> ViewState {
    let scene = view.screen_to_scene(anchor);
    ViewState {
        zoom,
        pan: Point::new(anchor.x - scene.x * zoom, anchor.y - scene.y * zoom),
    }
}

/// Zoom around the cursor in response to a wheel event.
///
/// The event must never scroll the page, so both flags are always set.
pub fn handle_wheel(view: &ViewState, input: WheelInput) -> WheelOutcome {
    let zoom = calculate_zoom(view.zoom, input.delta_y);
    let anchor = Point::new(input.offset_x, input.offset_y);
    WheelOutcome {
        view: zoom_to_point(view, anchor, zoom),
        prevent_default: true,
        stop_propagation: true,
    }
}

/// Modifier and button state accompanying a pointer press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerButtons {
    pub alt_key: bool,
    /// DOM `MouseEvent.button`: 0 primary, 1 middle, 2 secondary.
    pub button: i16,
}

impl PointerButtons {
    /// Panning is bound to alt+drag or the middle button so the primary
    /// button stays free for scene interaction.
    pub fn starts_pan(&self) -> bool {
        self.alt_key || self.button == 1
    }
}

/// Drag-to-pan state: whether a drag is active and where the pointer was
/// last seen.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PanGesture {
    last: Option<Point>,
}

impl PanGesture {
    pub fn is_dragging(&self) -> bool {
        self.last.is_some()
    }

    /// Start a drag at `pointer` if the buttons allow it. Returns whether a
    /// drag started.
    pub fn begin(&mut self, pointer: Point, buttons: PointerButtons) -> bool {
        if buttons.starts_pan() {
            self.last = Some(pointer);
        }
        self.is_dragging()
    }

    /// Translate the view by the pointer movement since the last call.
    /// Returns `None` when no drag is in progress.
    pub fn update(&mut self, view: &ViewState, pointer: Point) -> Option<ViewState> {
        let last = self.last?;
        self.last = Some(pointer);
        Some(ViewState {
            zoom: view.zoom,
            pan: Point::new(
                view.pan.x + (pointer.x - last.x),
                view.pan.y + (pointer.y - last.y),
            ),
        })
    }

    pub fn end(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: Point, b: Point) {
        assert!(
            (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9,
            "{a:?} != {b:?}"
        );
    }

    #[test]
    fn zoom_to_point_keeps_anchor_fixed() {
        let view = ViewState::new(1.5, Point::new(30.0, -10.0));
        let anchor = Point::new(200.0, 120.0);
        let before = view.screen_to_scene(anchor);

        let zoomed = zoom_to_point(&view, anchor, 4.0);
        assert_eq!(zoomed.zoom, 4.0);
        assert_close(zoomed.screen_to_scene(anchor), before);
    }

    #[test]
    fn wheel_zooms_around_cursor_and_blocks_scroll() {
        let view = ViewState::default();
        let input = WheelInput {
            delta_y: -100.0,
            offset_x: 320.0,
            offset_y: 240.0,
        };
        let out = handle_wheel(&view, input);

        assert!(out.prevent_default);
        assert!(out.stop_propagation);
        assert!(out.view.zoom > 1.0);
        assert_close(
            out.view.screen_to_scene(Point::new(320.0, 240.0)),
            Point::new(320.0, 240.0),
        );
    }

    #[test]
    fn wheel_at_bound_does_not_move_view() {
        let view = ViewState::new(20.0, Point::new(5.0, 5.0));
        let out = handle_wheel(
            &view,
            WheelInput {
                delta_y: -500.0,
                offset_x: 50.0,
                offset_y: 60.0,
            },
        );
        assert_eq!(out.view.zoom, 20.0);
        assert_close(out.view.pan, view.pan);
    }

    #[test]
    fn pan_follows_pointer_delta() {
        let mut gesture = PanGesture::default();
        let view = ViewState::new(2.0, Point::new(10.0, 10.0));
        assert!(gesture.begin(
            Point::new(100.0, 100.0),
            PointerButtons {
                alt_key: true,
                button: 0
            }
        ));

        let moved = gesture
            .update(&view, Point::new(130.0, 90.0))
            .expect("drag active");
        assert_close(moved.pan, Point::new(40.0, 0.0));
        assert_eq!(moved.zoom, 2.0);

        let moved = gesture
            .update(&moved, Point::new(131.0, 91.0))
            .expect("drag active");
        assert_close(moved.pan, Point::new(41.0, 1.0));

        gesture.end();
        assert!(gesture.update(&moved, Point::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn plain_primary_press_does_not_pan() {
        let mut gesture = PanGesture::default();
        assert!(!gesture.begin(Point::ORIGIN, PointerButtons::default()));
        assert!(gesture.begin(
            Point::ORIGIN,
            PointerButtons {
                alt_key: false,
                button: 1
            }
        ));
    }
}
