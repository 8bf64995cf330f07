//! Reference rendering of a tagged script.
//!
//! Geometry depends on font size, aspect ratio, and viewport height the same
//! way a real display's does: wider or larger text reflows, so node tops move
//! while dialogue ordinals stay put.

pub mod tagger;

use crate::model::state::DEFAULT_FONT_SIZE;
use crate::model::{AspectRatio, ContentNode, NodeKind, ScriptView, ViewportMetrics};
use crate::script::Script;

pub use tagger::{Block, tag_blocks};

const CHAR_WIDTH_EM: f64 = 0.6;
const LINE_HEIGHT_EM: f64 = 1.4;
const BLOCK_GAP_EM: f64 = 0.8;
const TEXT_COLUMN: f64 = 0.8;
const DIALOGUE_COLUMN: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct RenderedScript {
    blocks: Vec<Block>,
    nodes: Vec<ContentNode>,
    font_size: u32,
    aspect_ratio: AspectRatio,
    viewport_height: f64,
    scroll_top: f64,
    scroll_height: f64,
    highlighted: Option<usize>,
}

impl RenderedScript {
    pub fn new(viewport_height: f64) -> Self {
        Self::from_blocks(
            Vec::new(),
            DEFAULT_FONT_SIZE,
            AspectRatio::default(),
            viewport_height,
        )
    }

    pub fn from_blocks(
        blocks: Vec<Block>,
        font_size: u32,
        aspect_ratio: AspectRatio,
        viewport_height: f64,
    ) -> Self {
        let mut rendered = Self {
            blocks,
            nodes: Vec::new(),
            font_size: font_size.max(1),
            aspect_ratio,
            viewport_height: viewport_height.max(1.0),
            scroll_top: 0.0,
            scroll_height: 0.0,
            highlighted: None,
        };
        rendered.relayout();
        rendered
    }

    pub fn font_size(&self) -> u32 {
        self.font_size
    }

    pub fn viewport_width(&self) -> f64 {
        self.viewport_height * self.aspect_ratio.width_over_height()
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    fn relayout(&mut self) {
        let font = f64::from(self.font_size);
        let char_width = font * CHAR_WIDTH_EM;
        let line_height = font * LINE_HEIGHT_EM;
        let gap = font * BLOCK_GAP_EM;
        let width = self.viewport_width();

        let mut top = 0.0;
        self.nodes = self
            .blocks
            .iter()
            .map(|block| {
                let column = if block.kind == NodeKind::Dialogue {
                    DIALOGUE_COLUMN
                } else {
                    TEXT_COLUMN
                };
                let chars_per_line = ((width * column) / char_width).floor().max(1.0);
                let chars = block.text.chars().count().max(1) as f64;
                let lines = (chars / chars_per_line).ceil().max(1.0);
                let height = lines * line_height;
                let node = ContentNode {
                    kind: block.kind,
                    text: block.text.clone(),
                    top,
                    height,
                };
                top += height + gap;
                node
            })
            .collect();

        // Trailing padding lets the last line reach the tracking line.
        self.scroll_height = top + self.viewport_height;
        self.scroll_top = self.metrics().clamp(self.scroll_top);
        self.highlighted = None;
    }
}

impl ScriptView for RenderedScript {
    fn metrics(&self) -> ViewportMetrics {
        ViewportMetrics {
            scroll_top: self.scroll_top,
            viewport_height: self.viewport_height,
            scroll_height: self.scroll_height,
        }
    }

    fn nodes(&self) -> &[ContentNode] {
        &self.nodes
    }

    fn scroll_to(&mut self, offset: f64) {
        self.scroll_top = self.metrics().clamp(offset);
    }

    fn highlight(&mut self, node: usize) {
        self.highlighted = Some(node);
    }

    fn load_script(&mut self, script: Option<&Script>) {
        self.blocks = script
            .map(|script| tag_blocks(&script.text_content))
            .unwrap_or_default();
        self.scroll_top = 0.0;
        self.relayout();
    }

    fn set_font_size(&mut self, font_size: u32) {
        let font_size = font_size.max(1);
        if font_size != self.font_size {
            self.font_size = font_size;
            self.relayout();
        }
    }

    fn set_aspect_ratio(&mut self, ratio: AspectRatio) {
        if ratio != self.aspect_ratio {
            self.aspect_ratio = ratio;
            self.relayout();
        }
    }

    fn resize(&mut self, viewport_height: f64) {
        let viewport_height = viewport_height.max(1.0);
        if (viewport_height - self.viewport_height).abs() > f64::EPSILON {
            self.viewport_height = viewport_height;
            self.relayout();
        }
    }
}
