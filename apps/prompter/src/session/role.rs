use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::model::AnchorOrigin;

/// Which kind of device a surface is.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    #[default]
    Admin,
    Viewer,
    Remote,
}

impl SurfaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SurfaceKind::Admin => "admin",
            SurfaceKind::Viewer => "viewer",
            SurfaceKind::Remote => "remote",
        }
    }

    pub fn role(self) -> Role {
        match self {
            SurfaceKind::Admin => Role::Initiator,
            SurfaceKind::Remote => Role::Mirror,
            SurfaceKind::Viewer => Role::ReadOnly,
        }
    }
}

/// Outbound permissions of a surface, fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Mirror,
    ReadOnly,
}

impl Role {
    pub fn can_send_positions(self) -> bool {
        !self.is_read_only()
    }

    pub fn can_send_controls(self) -> bool {
        !self.is_read_only()
    }

    /// Rollback checkpoints are only worth keeping where rollback can be invoked.
    pub fn samples_checkpoints(self) -> bool {
        !self.is_read_only()
    }

    pub fn is_read_only(self) -> bool {
        matches!(self, Role::ReadOnly)
    }

    pub fn anchor_origin(self) -> AnchorOrigin {
        match self {
            Role::Initiator => AnchorOrigin::Admin,
            Role::Mirror => AnchorOrigin::Remote,
            Role::ReadOnly => AnchorOrigin::Unspecified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_viewer_is_read_only() {
        assert_eq!(SurfaceKind::Admin.role(), Role::Initiator);
        assert_eq!(SurfaceKind::Remote.role(), Role::Mirror);
        assert!(SurfaceKind::Viewer.role().is_read_only());
        assert!(!Role::Mirror.is_read_only());
        assert!(Role::Mirror.can_send_positions());
        assert!(!Role::ReadOnly.can_send_controls());
    }

    #[test]
    fn anchors_carry_the_role_origin() {
        assert_eq!(Role::Initiator.anchor_origin(), AnchorOrigin::Admin);
        assert_eq!(Role::Mirror.anchor_origin(), AnchorOrigin::Remote);
    }
}
