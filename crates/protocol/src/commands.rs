use serde::{Deserialize, Serialize};

use crate::types::{Color, Point, Rect};

/// Opaque handle to a host-side image source (a live video element in the
/// browser). The renderer owns the mapping from id to element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u32);

/// A single, stateless render instruction.
///
/// The scene emits a `Vec<RenderCommand>` per frame. Renderers consume
/// this list sequentially; each command carries all the data it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Reset the whole surface to a solid color, ignoring any transform.
    Clear { color: Color },

    /// Draw the current content of an image source into `rect`.
    DrawImage { source: SourceId, rect: Rect },

    /// Push an affine transform (applied to all subsequent commands until
    /// the matching `PopTransform`).
    PushTransform { translate: Point, scale: Point },

    /// Pop the most recent transform.
    PopTransform,
}
