use tracing::trace;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::anchor::text_fingerprint;
use crate::model::{AnchorOrigin, ContentNode, PositionAnchor, ScriptView, ViewportMetrics};

/// Turns "the node nearest the tracking line" into a [`PositionAnchor`].
#[derive(Debug, Clone)]
pub struct AnchorEncoder {
    tracking_line_offset: f64,
    text_len: usize,
}

impl AnchorEncoder {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            tracking_line_offset: config.tracking_line_offset.max(0.0),
            text_len: config.anchor_text_len.max(1),
        }
    }

    /// Tracking line in content coordinates.
    pub fn tracking_line(&self, metrics: &ViewportMetrics) -> f64 {
        metrics.scroll_top + self.tracking_line_offset.min(metrics.viewport_height)
    }

    pub fn encode_view<V: ScriptView + ?Sized>(
        &self,
        view: &V,
        origin: AnchorOrigin,
    ) -> SyncResult<PositionAnchor> {
        self.encode(&view.metrics(), view.nodes(), origin)
    }

    pub fn encode(
        &self,
        metrics: &ViewportMetrics,
        nodes: &[ContentNode],
        origin: AnchorOrigin,
    ) -> SyncResult<PositionAnchor> {
        let line = self.tracking_line(metrics);
        let (nearest_idx, nearest) = nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.has_text())
            .min_by(|(_, a), (_, b)| {
                (a.top - line).abs().total_cmp(&(b.top - line).abs())
            })
            .ok_or(SyncError::EmptyContent)?;

        let mut anchor = PositionAnchor::for_text(text_fingerprint(&nearest.text, self.text_len), origin)
            .with_normalized(metrics.normalized());

        if nearest.is_dialogue() {
            let mut total = 0;
            let mut ordinal = None;
            for (idx, node) in nodes.iter().enumerate() {
                if node.is_dialogue() {
                    if idx == nearest_idx {
                        ordinal = Some(total);
                    }
                    total += 1;
                }
            }
            if let Some(ordinal) = ordinal {
                anchor = anchor.with_index(ordinal, total);
            }
        }

        trace!(
            target = "prompter.encoder",
            node = nearest_idx,
            index = ?anchor.index,
            normalized = ?anchor.normalized_position,
            "encoded anchor"
        );
        Ok(anchor)
    }
}
