use tracing::{debug, trace};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::model::{ContentNode, PositionAnchor, ScriptView, ViewportMetrics, dialogue_positions};
use crate::telemetry::PerfGuard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPath {
    Index,
    Text,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    /// Scroll offset the view was (or would be) moved to.
    pub target: f64,
    /// Node index in the local content tree, absent on the fallback path.
    pub node: Option<usize>,
    pub path: ResolutionPath,
}

/// Re-resolves a received anchor against the local rendering.
///
/// First match wins: dialogue ordinal, then case-insensitive text within the
/// dialogue set, then the normalized fallback position.
#[derive(Debug, Clone)]
pub struct AnchorResolver {
    tracking_line_offset: f64,
}

impl AnchorResolver {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            tracking_line_offset: config.tracking_line_offset.max(0.0),
        }
    }

    /// Resolves and scrolls the view. Resolution is a pure function of the anchor
    /// and the rendering, so repeating it lands on the same target.
    pub fn resolve<V: ScriptView + ?Sized>(
        &self,
        anchor: &PositionAnchor,
        view: &mut V,
    ) -> SyncResult<Resolution> {
        let _perf = PerfGuard::new("resolver.resolve");
        let resolution = self.plan(anchor, &view.metrics(), view.nodes())?;
        view.scroll_to(resolution.target);
        if let Some(node) = resolution.node {
            view.highlight(node);
        }
        Ok(resolution)
    }

    pub fn plan(
        &self,
        anchor: &PositionAnchor,
        metrics: &ViewportMetrics,
        nodes: &[ContentNode],
    ) -> SyncResult<Resolution> {
        let dialogue = dialogue_positions(nodes);

        if let Some(resolution) = self.by_index(anchor, metrics, nodes, &dialogue) {
            return Ok(resolution);
        }
        if let Some(resolution) = self.by_text(anchor, metrics, nodes, &dialogue) {
            return Ok(resolution);
        }
        if let Some(position) = anchor.normalized_position.filter(|p| p.is_finite()) {
            let target = metrics.clamp(position.clamp(0.0, 1.0) * metrics.max_scroll());
            trace!(target = "prompter.resolver", position, target, "resolved by fallback position");
            return Ok(Resolution {
                target,
                node: None,
                path: ResolutionPath::Fallback,
            });
        }

        debug!(
            target = "prompter.resolver",
            index = ?anchor.index,
            text = ?anchor.text,
            dialogue_nodes = dialogue.len(),
            "anchor did not resolve"
        );
        Err(SyncError::ResolutionMiss)
    }

    fn by_index(
        &self,
        anchor: &PositionAnchor,
        metrics: &ViewportMetrics,
        nodes: &[ContentNode],
        dialogue: &[usize],
    ) -> Option<Resolution> {
        let index = anchor.index?;
        if index >= dialogue.len() {
            return None;
        }
        // An ordinal from a structurally different script says nothing here.
        if anchor.total_count.is_some_and(|total| total != dialogue.len()) {
            return None;
        }
        let node_idx = dialogue[index];
        Some(Resolution {
            target: self.target_for(&nodes[node_idx], metrics),
            node: Some(node_idx),
            path: ResolutionPath::Index,
        })
    }

    fn by_text(
        &self,
        anchor: &PositionAnchor,
        metrics: &ViewportMetrics,
        nodes: &[ContentNode],
        dialogue: &[usize],
    ) -> Option<Resolution> {
        let needle = normalize(anchor.text.as_deref()?);
        if needle.is_empty() {
            return None;
        }
        let mut matches = dialogue
            .iter()
            .copied()
            .filter(|&idx| normalize(&nodes[idx].text).contains(&needle));

        let chosen = if anchor.from_rollback {
            matches.next()
        } else {
            let line = metrics.scroll_top + self.effective_offset(metrics);
            matches.min_by(|&a, &b| {
                (nodes[a].top - line)
                    .abs()
                    .total_cmp(&(nodes[b].top - line).abs())
            })
        }?;

        Some(Resolution {
            target: self.target_for(&nodes[chosen], metrics),
            node: Some(chosen),
            path: ResolutionPath::Text,
        })
    }

    fn effective_offset(&self, metrics: &ViewportMetrics) -> f64 {
        self.tracking_line_offset.min(metrics.viewport_height)
    }

    /// Scroll offset that puts the node's top edge on the tracking line.
    pub fn target_for(&self, node: &ContentNode, metrics: &ViewportMetrics) -> f64 {
        metrics.clamp(node.top - self.effective_offset(metrics))
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnchorOrigin, NodeKind};

    fn dialogue(text: &str, top: f64) -> ContentNode {
        ContentNode {
            kind: NodeKind::Dialogue,
            text: text.into(),
            top,
            height: 40.0,
        }
    }

    fn metrics(scroll_top: f64) -> ViewportMetrics {
        ViewportMetrics {
            scroll_top,
            viewport_height: 600.0,
            scroll_height: 3000.0,
        }
    }

    fn resolver() -> AnchorResolver {
        AnchorResolver::new(&SyncConfig::default())
    }

    #[test]
    fn index_wins_over_text() {
        let nodes = vec![dialogue("A", 200.0), dialogue("B", 400.0), dialogue("C", 600.0)];
        let anchor = PositionAnchor::for_text("C", AnchorOrigin::Admin).with_index(1, 3);
        let resolution = resolver().plan(&anchor, &metrics(0.0), &nodes).expect("resolved");
        assert_eq!(resolution.path, ResolutionPath::Index);
        assert_eq!(resolution.node, Some(1));
        assert_eq!(resolution.target, 300.0);
    }

    #[test]
    fn mismatched_total_count_falls_through_to_text() {
        let nodes = vec![dialogue("A", 200.0), dialogue("B", 400.0), dialogue("C", 600.0)];
        let anchor = PositionAnchor::for_text("c", AnchorOrigin::Admin).with_index(1, 5);
        let resolution = resolver().plan(&anchor, &metrics(0.0), &nodes).expect("resolved");
        assert_eq!(resolution.path, ResolutionPath::Text);
        assert_eq!(resolution.node, Some(2));
    }

    #[test]
    fn live_text_match_prefers_the_nearest_occurrence() {
        let nodes = vec![
            dialogue("Stand by.", 200.0),
            dialogue("Other", 800.0),
            dialogue("stand by.", 1400.0),
        ];
        let anchor = PositionAnchor::for_text("STAND BY", AnchorOrigin::Remote);
        let resolution = resolver()
            .plan(&anchor, &metrics(1200.0), &nodes)
            .expect("resolved");
        assert_eq!(resolution.node, Some(2));
    }

    #[test]
    fn rollback_text_match_prefers_the_first_occurrence() {
        let nodes = vec![
            dialogue("Stand by.", 200.0),
            dialogue("Other", 800.0),
            dialogue("stand by.", 1400.0),
        ];
        let anchor = PositionAnchor::for_text("stand by", AnchorOrigin::Remote).rollback();
        let resolution = resolver()
            .plan(&anchor, &metrics(1200.0), &nodes)
            .expect("resolved");
        assert_eq!(resolution.node, Some(0));
    }

    #[test]
    fn fallback_scales_to_local_scroll_range() {
        let nodes = vec![dialogue("A", 200.0)];
        let anchor = PositionAnchor::new(AnchorOrigin::Admin).with_normalized(0.5);
        let resolution = resolver().plan(&anchor, &metrics(0.0), &nodes).expect("resolved");
        assert_eq!(resolution.path, ResolutionPath::Fallback);
        assert_eq!(resolution.target, 1200.0);
        assert_eq!(resolution.node, None);
    }

    #[test]
    fn unmatched_anchor_is_a_miss() {
        let nodes = vec![dialogue("A", 200.0)];
        let anchor = PositionAnchor::for_text("zzz", AnchorOrigin::Admin).with_index(4, 9);
        let result = resolver().plan(&anchor, &metrics(0.0), &nodes);
        assert!(matches!(result, Err(SyncError::ResolutionMiss)));
    }
}
