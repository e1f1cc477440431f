// SPDX-License-Identifier: Apache-2.0
//! Node records stored by the scene.

use std::collections::BTreeMap;

use crate::attr::AttrValue;
use crate::ident::NodeId;
use crate::transform::Transform;

/// Classification of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Plain transform (groups, controls).
    Transform,
    /// Skeleton joint.
    Joint,
    /// Non-DAG dependency node (component graph anchors).
    Network,
    /// Helper locator.
    Locator,
    /// Retained IK handle record; never solved here.
    IkHandle,
    /// Display layer container.
    DisplayLayer,
}

impl NodeKind {
    /// `true` for kinds that live in the transform hierarchy.
    #[must_use]
    pub fn is_dag(self) -> bool {
        !matches!(self, Self::Network | Self::DisplayLayer)
    }
}

/// Materialised record for a single scene node.
///
/// Invariants
/// - `parent`, when set, references a live node in the same store.
/// - `children` is the insertion-ordered inverse of `parent`; the store
///   maintains both sides on every reparent.
#[derive(Debug, Clone)]
pub(crate) struct NodeRec {
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) local: Transform,
    pub(crate) attrs: BTreeMap<String, AttrValue>,
}

impl NodeRec {
    pub(crate) fn new(name: String, kind: NodeKind) -> Self {
        Self {
            name,
            kind,
            parent: None,
            children: Vec::new(),
            local: Transform::identity(),
            attrs: BTreeMap::new(),
        }
    }
}
