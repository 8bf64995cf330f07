use crate::model::state::AspectRatio;
use crate::script::Script;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Heading,
    Action,
    Character,
    Parenthetical,
    Dialogue,
    Transition,
}

impl NodeKind {
    pub fn is_dialogue(self) -> bool {
        matches!(self, NodeKind::Dialogue)
    }
}

/// A structurally tagged block of rendered script.
///
/// `top` and `height` are in content coordinates (pixels from the top of the
/// scrollable content), so a node's distance from the viewport top is
/// `top - scroll_top`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentNode {
    pub kind: NodeKind,
    pub text: String,
    pub top: f64,
    pub height: f64,
}

impl ContentNode {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn center(&self) -> f64 {
        self.top + self.height / 2.0
    }

    pub fn is_dialogue(&self) -> bool {
        self.kind.is_dialogue() && self.has_text()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub scroll_height: f64,
}

impl ViewportMetrics {
    pub fn max_scroll(&self) -> f64 {
        (self.scroll_height - self.viewport_height).max(0.0)
    }

    pub fn clamp(&self, offset: f64) -> f64 {
        if offset.is_finite() {
            offset.clamp(0.0, self.max_scroll())
        } else {
            0.0
        }
    }

    /// Scroll offset as a fraction of the scrollable range.
    pub fn normalized(&self) -> f64 {
        let range = (self.scroll_height - self.viewport_height).max(1.0);
        (self.scroll_top / range).clamp(0.0, 1.0)
    }
}

/// A surface's local rendering of the active script.
///
/// Implementations own layout: font size, aspect ratio, and viewport height all
/// change node geometry, which is why positions cross the wire as anchors.
pub trait ScriptView: Send {
    fn metrics(&self) -> ViewportMetrics;

    /// Content nodes in document order.
    fn nodes(&self) -> &[ContentNode];

    fn scroll_to(&mut self, offset: f64);

    /// Transient visual cue for a resolved node. Must not block.
    fn highlight(&mut self, _node: usize) {}

    fn load_script(&mut self, script: Option<&Script>);

    fn set_font_size(&mut self, font_size: u32);

    fn set_aspect_ratio(&mut self, ratio: AspectRatio);

    fn resize(&mut self, viewport_height: f64);
}

/// Node indices of the dialogue-class set, in document order. The position in
/// the returned vector is the dialogue ordinal.
pub fn dialogue_positions(nodes: &[ContentNode]) -> Vec<usize> {
    nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.is_dialogue())
        .map(|(idx, _)| idx)
        .collect()
}
