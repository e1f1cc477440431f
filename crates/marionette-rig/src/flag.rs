// SPDX-License-Identifier: Apache-2.0
//! Animator-facing control handles.

use marionette_scene::{AttrValue, NodeId, NodeKind, Scene, SceneError};

use crate::node::{REGION_ATTR, SIDE_ATTR};

/// Marker attribute identifying a control transform.
pub const IS_FLAG_ATTR: &str = "isFlag";
/// Plug the align (zero) transform connects into.
pub const ALIGN_ATTR: &str = "alignTransform";
/// Attribute listing channels locked away from the animator.
pub const LOCKED_ATTR: &str = "lockedAttrs";

/// Secondary classification a flag can carry on top of side/region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagType {
    /// Secondary control, hidden by default display filters.
    Sub,
    /// Fine-tuning control.
    Detail,
    /// Contact control (feet, palms).
    Contact,
    /// Utility control, not exported.
    Util,
}

impl FlagType {
    const fn attr(self) -> &'static str {
        match self {
            Self::Sub => "isSub",
            Self::Detail => "isDetail",
            Self::Contact => "isContact",
            Self::Util => "isUtil",
        }
    }

    /// Every classification attribute, serialization order.
    pub const ALL: [Self; 4] = [Self::Sub, Self::Detail, Self::Contact, Self::Util];
}

/// A control handle: one scene transform plus its align transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flag {
    node: NodeId,
}

impl Flag {
    /// Creates a flag aligned to `target`'s world pose.
    ///
    /// The flag parents under a freshly created align transform so its own
    /// channels rest at zero in the bind pose.
    pub fn create(
        scene: &mut Scene,
        target: NodeId,
        label: &str,
        side: &str,
        region: &str,
    ) -> Result<Self, SceneError> {
        let align = scene.create_node(format!("{label}_align"), NodeKind::Transform);
        scene.align_to(align, target)?;
        let node = scene.create_node(format!("f_{label}"), NodeKind::Transform);
        scene.set_parent(node, Some(align))?;
        scene.set_attr(node, IS_FLAG_ATTR, true)?;
        scene.set_attr(node, SIDE_ATTR, side.to_lowercase())?;
        scene.set_attr(node, REGION_ATTR, region)?;
        scene.connect(align, node, ALIGN_ATTR)?;
        Ok(Self { node })
    }

    /// Wraps an existing flag node; `None` when the marker is absent.
    #[must_use]
    pub fn from_node(scene: &Scene, node: NodeId) -> Option<Self> {
        is_flag_node(scene, node).then_some(Self { node })
    }

    /// Underlying control transform.
    #[must_use]
    pub fn node(self) -> NodeId {
        self.node
    }

    /// The align (zero) transform, when still connected.
    #[must_use]
    pub fn align_transform(self, scene: &Scene) -> Option<NodeId> {
        scene.connected_first(self.node, ALIGN_ATTR)
    }

    /// Side markup.
    #[must_use]
    pub fn side(self, scene: &Scene) -> String {
        scene
            .attr(self.node, SIDE_ATTR)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default()
    }

    /// Region markup.
    #[must_use]
    pub fn region(self, scene: &Scene) -> String {
        scene
            .attr(self.node, REGION_ATTR)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default()
    }

    /// Marks the flag with a secondary classification.
    pub fn set_flag_type(self, scene: &mut Scene, ty: FlagType) -> Result<(), SceneError> {
        scene.set_attr(self.node, ty.attr(), true)
    }

    /// `true` when the flag carries the classification.
    #[must_use]
    pub fn has_flag_type(self, scene: &Scene, ty: FlagType) -> bool {
        scene
            .attr(self.node, ty.attr())
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
    }

    /// Records `channels` as locked and hidden from the animator.
    ///
    /// The scene store has no locking machinery; the set is carried as
    /// metadata so serialization and rebuilds can restore animator-facing
    /// state.
    pub fn lock_and_hide(
        self,
        scene: &mut Scene,
        channels: &[&str],
    ) -> Result<(), SceneError> {
        let mut locked = self.locked_channels(scene);
        for ch in channels {
            if !locked.iter().any(|c| c == ch) {
                locked.push((*ch).to_owned());
            }
        }
        scene.set_attr(self.node, LOCKED_ATTR, serde_json::json!(locked))
    }

    /// Channels recorded as locked, in recording order.
    #[must_use]
    pub fn locked_channels(self, scene: &Scene) -> Vec<String> {
        scene
            .attr(self.node, LOCKED_ATTR)
            .and_then(AttrValue::as_json)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

/// Classification predicate for control transforms.
#[must_use]
pub fn is_flag_node(scene: &Scene, node: NodeId) -> bool {
    scene.exists(node)
        && scene
            .attr(node, IS_FLAG_ATTR)
            .and_then(AttrValue::as_bool)
            .unwrap_or(false)
}
