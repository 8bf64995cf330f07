use tracing::{debug, trace};

use crate::config::SyncConfig;
use crate::model::anchor::text_fingerprint;
use crate::model::{AnchorOrigin, ContentNode, PositionAnchor, ViewportMetrics, dialogue_positions};

/// Single rollback checkpoint for the active script: "one dialogue line back"
/// from the line nearest the viewport center at the last sample.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    script_id: Option<String>,
    checkpoint: Option<PositionAnchor>,
    tracking_line_offset: f64,
    text_len: usize,
}

impl CheckpointStore {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            script_id: None,
            checkpoint: None,
            tracking_line_offset: config.tracking_line_offset.max(0.0),
            text_len: config.anchor_text_len.max(1),
        }
    }

    pub fn current(&self) -> Option<&PositionAnchor> {
        self.checkpoint.as_ref()
    }

    pub fn script_id(&self) -> Option<&str> {
        self.script_id.as_deref()
    }

    /// Overwrites the checkpoint from the current rendering. Leaves the previous
    /// checkpoint alone if the rendering has no dialogue.
    pub fn sample(
        &mut self,
        script_id: &str,
        metrics: &ViewportMetrics,
        nodes: &[ContentNode],
        origin: AnchorOrigin,
    ) -> Option<&PositionAnchor> {
        if self.script_id.as_deref() != Some(script_id) {
            self.script_id = Some(script_id.to_string());
            self.checkpoint = None;
        }

        let dialogue = dialogue_positions(nodes);
        let center = metrics.scroll_top + metrics.viewport_height / 2.0;
        let Some(current) = (0..dialogue.len()).min_by(|&a, &b| {
            (nodes[dialogue[a]].center() - center)
                .abs()
                .total_cmp(&(nodes[dialogue[b]].center() - center).abs())
        }) else {
            trace!(target = "prompter.checkpoint", script_id, "no dialogue to sample");
            return self.checkpoint.as_ref();
        };

        let ordinal = current.saturating_sub(1);
        let anchor = self.anchor_for(ordinal, &dialogue, metrics, nodes, origin);
        debug!(
            target = "prompter.checkpoint",
            script_id,
            current,
            checkpoint = ordinal,
            "sampled rollback checkpoint"
        );
        self.checkpoint = Some(anchor);
        self.checkpoint.as_ref()
    }

    /// Clears the checkpoint when the active script changes or is cleared.
    pub fn on_script_changed(&mut self, script_id: Option<&str>) {
        if self.script_id.as_deref() != script_id {
            self.script_id = script_id.map(str::to_string);
            self.checkpoint = None;
        }
    }

    /// Rollback anchor for the first dialogue node, used when nothing was sampled.
    pub fn first_dialogue_anchor(
        &self,
        metrics: &ViewportMetrics,
        nodes: &[ContentNode],
        origin: AnchorOrigin,
    ) -> Option<PositionAnchor> {
        let dialogue = dialogue_positions(nodes);
        if dialogue.is_empty() {
            return None;
        }
        Some(self.anchor_for(0, &dialogue, metrics, nodes, origin))
    }

    fn anchor_for(
        &self,
        ordinal: usize,
        dialogue: &[usize],
        metrics: &ViewportMetrics,
        nodes: &[ContentNode],
        origin: AnchorOrigin,
    ) -> PositionAnchor {
        let node = &nodes[dialogue[ordinal]];
        let offset = self.tracking_line_offset.min(metrics.viewport_height);
        let range = (metrics.scroll_height - metrics.viewport_height).max(1.0);
        let normalized = (metrics.clamp(node.top - offset) / range).clamp(0.0, 1.0);
        PositionAnchor::for_text(text_fingerprint(&node.text, self.text_len), origin)
            .with_index(ordinal, dialogue.len())
            .with_normalized(normalized)
            .rollback()
    }
}
