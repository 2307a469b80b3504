use std::collections::HashMap;

use screencanvas_protocol::{RenderCommand, Size, SourceId};
use tracing::debug;
use web_sys::{CanvasRenderingContext2d, HtmlVideoElement};

/// `HTMLMediaElement.HAVE_CURRENT_DATA`: a frame is available to draw.
const HAVE_CURRENT_DATA: u16 = 2;

#[derive(Debug, Clone, Copy)]
struct Transform {
    tx: f64,
    ty: f64,
    sx: f64,
    sy: f64,
}

impl Transform {
    fn identity() -> Self {
        Self {
            tx: 0.0,
            ty: 0.0,
            sx: 1.0,
            sy: 1.0,
        }
    }
}

/// Replays `RenderCommand`s onto a Canvas2D context.
///
/// Owns the mapping from `SourceId` to the video element drawn for it.
pub struct CanvasPainter {
    context: CanvasRenderingContext2d,
    sources: HashMap<SourceId, HtmlVideoElement>,
    next_source: u32,
}

impl CanvasPainter {
    pub fn new(context: CanvasRenderingContext2d) -> Self {
        Self {
            context,
            sources: HashMap::new(),
            next_source: 1,
        }
    }

    pub fn register(&mut self, video: HtmlVideoElement) -> SourceId {
        let id = SourceId(self.next_source);
        self.next_source += 1;
        self.sources.insert(id, video);
        id
    }

    pub fn unregister(&mut self, source: SourceId) -> Option<HtmlVideoElement> {
        self.sources.remove(&source)
    }

    pub fn paint(&self, commands: &[RenderCommand], size: Size) {
        let ctx = &self.context;
        let mut transform_stack = vec![Transform::identity()];

        for cmd in commands {
            let tf = transform_stack
                .last()
                .copied()
                .unwrap_or(Transform::identity());
            match cmd {
                RenderCommand::Clear { color } => {
                    let (w, h) = (f64::from(size.width), f64::from(size.height));
                    ctx.clear_rect(0.0, 0.0, w, h);
                    ctx.set_fill_style_str(&color.to_css());
                    ctx.fill_rect(0.0, 0.0, w, h);
                }

                RenderCommand::DrawImage { source, rect } => {
                    let Some(video) = self.sources.get(source) else {
                        debug!(source = source.0, "no element for source");
                        continue;
                    };
                    if video.ready_state() < HAVE_CURRENT_DATA {
                        continue;
                    }
                    let drawn = ctx.draw_image_with_html_video_element_and_dw_and_dh(
                        video,
                        rect.x * tf.sx + tf.tx,
                        rect.y * tf.sy + tf.ty,
                        rect.w * tf.sx,
                        rect.h * tf.sy,
                    );
                    if drawn.is_err() {
                        debug!(source = source.0, "video frame not drawable");
                    }
                }

                RenderCommand::PushTransform { translate, scale } => {
                    transform_stack.push(Transform {
                        tx: tf.tx + translate.x * tf.sx,
                        ty: tf.ty + translate.y * tf.sy,
                        sx: tf.sx * scale.x,
                        sy: tf.sy * scale.y,
                    });
                }

                RenderCommand::PopTransform => {
                    if transform_stack.len() > 1 {
                        transform_stack.pop();
                    }
                }
            }
        }
    }
}
