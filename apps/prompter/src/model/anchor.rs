use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorOrigin {
    Admin,
    Remote,
    #[default]
    #[serde(other)]
    Unspecified,
}

/// Device-independent description of a place in the script.
///
/// Resolution prefers `index` (dialogue ordinal), then `text` (content
/// fingerprint), then `normalized_position` (fraction of the scroll range).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionAnchor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normalized_position: Option<f64>,
    #[serde(default)]
    pub origin: AnchorOrigin,
    #[serde(default)]
    pub from_rollback: bool,
    #[serde(default)]
    pub timestamp: i64,
}

impl PositionAnchor {
    pub fn new(origin: AnchorOrigin) -> Self {
        Self {
            text: None,
            index: None,
            total_count: None,
            normalized_position: None,
            origin,
            from_rollback: false,
            timestamp: now_millis(),
        }
    }

    /// "Beginning of script"; the anchor of last resort.
    pub fn at_beginning(origin: AnchorOrigin) -> Self {
        Self {
            normalized_position: Some(0.0),
            ..Self::new(origin)
        }
    }

    pub fn for_text(text: impl Into<String>, origin: AnchorOrigin) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::new(origin)
        }
    }

    pub fn with_index(mut self, index: usize, total_count: usize) -> Self {
        self.index = Some(index);
        self.total_count = Some(total_count);
        self
    }

    pub fn with_normalized(mut self, position: f64) -> Self {
        self.normalized_position = Some(position);
        self
    }

    pub fn rollback(mut self) -> Self {
        self.from_rollback = true;
        self
    }

    pub fn restamped(mut self, origin: AnchorOrigin) -> Self {
        self.origin = origin;
        self.timestamp = now_millis();
        self
    }

    pub fn has_locator(&self) -> bool {
        self.index.is_some()
            || self.normalized_position.is_some()
            || self.text.as_deref().is_some_and(|text| !text.trim().is_empty())
    }

    pub fn validate(&self) -> SyncResult<()> {
        if !self.has_locator() {
            return Err(SyncError::InvalidAnchor(
                "anchor carries no text, index, or normalized position".into(),
            ));
        }
        if let Some(position) = self.normalized_position {
            if !position.is_finite() || !(0.0..=1.0).contains(&position) {
                return Err(SyncError::InvalidAnchor(format!(
                    "normalized position {position} outside [0, 1]"
                )));
            }
        }
        if let (Some(index), Some(total)) = (self.index, self.total_count) {
            if index >= total {
                return Err(SyncError::InvalidAnchor(format!(
                    "index {index} not below total count {total}"
                )));
            }
        }
        Ok(())
    }
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Char-boundary-safe prefix used as the anchor's content fingerprint.
pub fn text_fingerprint(text: &str, max_chars: usize) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_without_locator_is_invalid() {
        let anchor = PositionAnchor::new(AnchorOrigin::Remote);
        assert!(matches!(anchor.validate(), Err(SyncError::InvalidAnchor(_))));
        let blank = PositionAnchor::for_text("   ", AnchorOrigin::Remote);
        assert!(blank.validate().is_err());
    }

    #[test]
    fn out_of_range_fallback_is_rejected() {
        let anchor = PositionAnchor::new(AnchorOrigin::Admin).with_normalized(1.5);
        assert!(anchor.validate().is_err());
        let anchor = PositionAnchor::new(AnchorOrigin::Admin).with_normalized(f64::NAN);
        assert!(anchor.validate().is_err());
    }

    #[test]
    fn decodes_wire_shape_with_defaults() {
        let anchor: PositionAnchor = serde_json::from_value(serde_json::json!({
            "text": "We begin",
            "index": 1,
            "totalCount": 3
        }))
        .expect("decode");
        assert_eq!(anchor.origin, AnchorOrigin::Unspecified);
        assert!(!anchor.from_rollback);
        assert_eq!(anchor.index, Some(1));
        anchor.validate().expect("valid");
    }

    #[test]
    fn unknown_origin_degrades_to_unspecified() {
        let anchor: PositionAnchor = serde_json::from_value(serde_json::json!({
            "text": "We begin",
            "origin": "stage-manager"
        }))
        .expect("decode");
        assert_eq!(anchor.origin, AnchorOrigin::Unspecified);
        assert_eq!(
            serde_json::to_value(AnchorOrigin::Unspecified).expect("encode"),
            serde_json::json!("unspecified")
        );
    }

    #[test]
    fn fingerprint_collapses_whitespace_and_respects_char_boundaries() {
        assert_eq!(text_fingerprint("  Hola   señor  ", 8), "Hola señ");
    }
}
