use screencanvas_protocol::{Color, Point, Rect, RenderCommand, Size, SourceId, ViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

/// An addressable image in the draw list.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: NodeId,
    /// Placement in scene coordinates.
    pub rect: Rect,
    pub source: SourceId,
    /// Cached nodes may be drawn from a stale bitmap. Live sources (video)
    /// change every frame and must have this off.
    pub object_caching: bool,
}

impl SceneNode {
    pub fn is_live(&self) -> bool {
        !self.object_caching
    }
}

/// Wrap a live video source as a renderable node at the scene origin, sized
/// to the video's native resolution, with caching disabled.
pub fn create_video_image_object(source: SourceId, size: Size) -> SceneNode {
    SceneNode {
        id: NodeId(0),
        rect: Rect::new(0.0, 0.0, f64::from(size.width), f64::from(size.height)),
        source,
        object_caching: false,
    }
}

/// Ordered draw list. Later nodes paint over earlier ones.
#[derive(Debug, Clone)]
pub struct Scene {
    nodes: Vec<SceneNode>,
    next_id: u64,
    background: Color,
    redraw_requested: bool,
}

impl Scene {
    pub fn new(background: Color) -> Self {
        Self {
            nodes: Vec::new(),
            next_id: 1,
            background,
            redraw_requested: true,
        }
    }

    /// Add a node on top of the draw list, assigning it a fresh id.
    pub fn add(&mut self, mut node: SceneNode) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        node.id = id;
        self.nodes.push(node);
        self.redraw_requested = true;
        id
    }

    /// Remove a node. Returns it if it was present.
    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        let index = self.nodes.iter().position(|n| n.id == id)?;
        self.redraw_requested = true;
        Some(self.nodes.remove(index))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether any node shows content that changes without a scene edit.
    pub fn has_live_nodes(&self) -> bool {
        self.nodes.iter().any(SceneNode::is_live)
    }

    /// Ask for a redraw on the next opportunity, even if nothing is live.
    pub fn request_render(&mut self) {
        self.redraw_requested = true;
    }

    /// Whether the next frame must be painted.
    pub fn needs_render(&self) -> bool {
        self.redraw_requested || self.has_live_nodes()
    }

    /// Emit the draw list for one frame and clear the redraw request.
    ///
    /// Nodes entirely outside `canvas` after the view transform are culled.
    pub fn render(&mut self, view: &ViewState, canvas: Size) -> Vec<RenderCommand> {
        self.redraw_requested = false;

        let screen = Rect::new(0.0, 0.0, f64::from(canvas.width), f64::from(canvas.height));
        let mut commands = Vec::with_capacity(self.nodes.len() + 3);
        commands.push(RenderCommand::Clear {
            color: self.background,
        });
        commands.push(RenderCommand::PushTransform {
            translate: view.pan,
            scale: Point::new(view.zoom, view.zoom),
        });
        for node in &self.nodes {
            let top_left = view.scene_to_screen(Point::new(node.rect.x, node.rect.y));
            let on_screen = Rect::new(
                top_left.x,
                top_left.y,
                node.rect.w * view.zoom,
                node.rect.h * view.zoom,
            );
            if !on_screen.intersects(&screen) {
                continue;
            }
            commands.push(RenderCommand::DrawImage {
                source: node.source,
                rect: node.rect,
            });
        }
        commands.push(RenderCommand::PopTransform);
        commands
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(Color::WHITE)
    }
}
