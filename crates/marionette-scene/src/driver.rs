// SPDX-License-Identifier: Apache-2.0
//! Retained drivers: pose-follow-links and channel plumbing.
//!
//! Drivers are stored in creation order and applied in creation order on
//! every evaluation pass. Component builds create their drivers bottom-up,
//! so a single ordered pass settles the whole pose the same way the host's
//! command-style evaluation would.

use glam::{DQuat, DVec3};

use crate::ident::{NodeId, Plug};
use crate::transform::Transform;

/// Which channels a constraint copies from its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// Translation and rotation follow the target.
    Parent,
    /// Rotation only.
    Orient,
    /// Translation only.
    Point,
    /// Scale only.
    Scale,
}

/// Scalar mapping applied by a channel link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkOp {
    /// Copy the source value.
    Direct,
    /// Multiply the source value by a constant.
    Mul(f64),
    /// Clamp the source value into `[min, max]`.
    Clamp {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Write `1 / source` — rig-scale compensation for build groups.
    InverseScale,
}

impl LinkOp {
    /// Applies the mapping to a source value.
    #[must_use]
    pub fn apply(self, value: f64) -> f64 {
        match self {
            Self::Direct => value,
            Self::Mul(m) => value * m,
            Self::Clamp { min, max } => value.clamp(min, max),
            Self::InverseScale => {
                if value.abs() < f64::EPSILON {
                    1.0
                } else {
                    1.0 / value
                }
            }
        }
    }
}

/// A single retained driver.
#[derive(Debug, Clone)]
pub enum Driver {
    /// Pose-follow-link from one or more targets onto a driven transform.
    ///
    /// With multiple targets, the first entry wins; space switching swaps the
    /// active target through [`Driver::SpaceSwitch`] instead of blending.
    Constraint {
        /// Channel subset to copy.
        kind: ConstraintKind,
        /// Driven transform.
        driven: NodeId,
        /// Target transforms, in declaration order.
        targets: Vec<NodeId>,
        /// World-space offsets captured at creation (one per target).
        offsets: Vec<Transform>,
    },
    /// Discrete multi-target follow: the integer selector plug picks the
    /// active target; the swap is instantaneous, never blended.
    SpaceSwitch {
        /// Driven transform.
        driven: NodeId,
        /// Candidate targets, in declaration order.
        targets: Vec<NodeId>,
        /// Per-target offsets captured at creation.
        offsets: Vec<Transform>,
        /// Integer attribute choosing the active target.
        selector: Plug,
        /// Whether translation follows.
        translate: bool,
        /// Whether rotation follows.
        rotate: bool,
        /// Whether scale follows.
        scale: bool,
    },
    /// Look-at: rotates the driven node so `aim_axis` points at the target.
    Aim {
        /// Driven transform.
        driven: NodeId,
        /// Target transform.
        target: NodeId,
        /// Local axis to point at the target.
        aim_axis: DVec3,
        /// Local axis to align with the up hint.
        up_axis: DVec3,
        /// Optional world-up object; world +Y when absent.
        up_object: Option<NodeId>,
        /// Rotation offset captured at creation.
        offset: DQuat,
    },
    /// Scalar channel link with a mapping op.
    Link {
        /// Source channel.
        src: Plug,
        /// Destination channel.
        dst: Plug,
        /// Mapping applied between them.
        op: LinkOp,
    },
}

impl Driver {
    /// The node this driver writes to, for channel links the plug's node.
    #[must_use]
    pub fn driven_node(&self) -> NodeId {
        match self {
            Self::Constraint { driven, .. }
            | Self::SpaceSwitch { driven, .. }
            | Self::Aim { driven, .. } => *driven,
            Self::Link { dst, .. } => dst.node,
        }
    }

    /// Every node the driver reads from or writes to.
    pub(crate) fn touches(&self, node: NodeId) -> bool {
        match self {
            Self::Constraint {
                driven, targets, ..
            }
            | Self::SpaceSwitch {
                driven, targets, ..
            } => *driven == node || targets.contains(&node),
            Self::Aim {
                driven,
                target,
                up_object,
                ..
            } => *driven == node || *target == node || *up_object == Some(node),
            Self::Link { src, dst, .. } => src.node == node || dst.node == node,
        }
    }

    /// `true` when this is a pose-follow-link (constraint family).
    #[must_use]
    pub fn is_pose_link(&self) -> bool {
        matches!(
            self,
            Self::Constraint { .. } | Self::SpaceSwitch { .. } | Self::Aim { .. }
        )
    }
}
