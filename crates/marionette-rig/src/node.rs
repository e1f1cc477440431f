// SPDX-License-Identifier: Apache-2.0
//! Graph node base: the typed wrapper every rig node builds on.
//!
//! A graph node owns exactly one scene `Network` object. It stamps the
//! object with a kind tag and a version, and stores a single weak parent
//! link (a message connection to the parent's object). Children are never
//! stored: they are discovered through the scene's reverse connection
//! index, so the parent link stays the one source of truth.

use marionette_scene::{NodeId, NodeKind, Scene};
use tracing::warn;

use crate::error::BuildError;
use crate::kind::ComponentKind;

/// Attribute carrying the kind tag.
pub const TYPE_ATTR: &str = "nodeType";
/// Attribute carrying the stored version.
pub const VERSION_ATTR: &str = "version";
/// Plug a child's parent link connects into.
pub const PARENT_ATTR: &str = "graphParent";
/// Side markup attribute shared with joints and flags.
pub const SIDE_ATTR: &str = "side";
/// Region markup attribute shared with joints and flags.
pub const REGION_ATTR: &str = "region";

/// Typed wrapper over one scene network node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphNode {
    id: NodeId,
}

impl GraphNode {
    /// Creates a network node stamped with `kind` and `version`, linked
    /// under `parent`.
    ///
    /// The `Rig` kind is singleton-per-root: creating it under anything but
    /// an `AssetRoot` fails with [`BuildError::WrongParent`].
    pub fn create(
        scene: &mut Scene,
        parent: Option<GraphNode>,
        kind: ComponentKind,
        version: u32,
    ) -> Result<Self, BuildError> {
        if kind == ComponentKind::Rig {
            let parent_kind = parent.map(|p| p.kind(scene)).transpose()?;
            if parent_kind != Some(ComponentKind::AssetRoot) {
                warn!(kind = %kind, "singleton node created under wrong parent");
                return Err(BuildError::WrongParent {
                    kind: "Rig",
                    expected: "AssetRoot",
                });
            }
        }
        let id = scene.create_node(kind.as_str(), NodeKind::Network);
        scene.set_attr(id, TYPE_ATTR, kind.as_str())?;
        scene.set_attr(id, VERSION_ATTR, i64::from(version))?;
        let node = Self { id };
        if let Some(parent) = parent {
            node.set_graph_parent(scene, parent)?;
        }
        Ok(node)
    }

    /// Wraps an existing scene node, validating it is a graph node.
    pub fn from_node(scene: &Scene, id: NodeId) -> Result<Self, BuildError> {
        if is_graph_node(scene, id) {
            Ok(Self { id })
        } else {
            Err(BuildError::NotAGraphNode(id))
        }
    }

    /// Underlying scene object.
    #[must_use]
    pub fn id(self) -> NodeId {
        self.id
    }

    /// Kind tag resolved through the closed registry.
    pub fn kind(self, scene: &Scene) -> Result<ComponentKind, BuildError> {
        let tag = scene
            .attr(self.id, TYPE_ATTR)
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or(BuildError::NotAGraphNode(self.id))?;
        ComponentKind::parse(&tag)
    }

    /// Stored version (0 when the attribute is missing or mistyped).
    #[must_use]
    pub fn version(self, scene: &Scene) -> u32 {
        scene
            .attr(self.id, VERSION_ATTR)
            .and_then(marionette_scene::AttrValue::as_int)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0)
    }

    /// Overwrites the stored version.
    pub fn set_version(self, scene: &mut Scene, version: u32) -> Result<(), BuildError> {
        scene.set_attr(self.id, VERSION_ATTR, i64::from(version))?;
        Ok(())
    }

    /// Replaces the parent link.
    pub fn set_graph_parent(self, scene: &mut Scene, parent: GraphNode) -> Result<(), BuildError> {
        scene.disconnect_all(self.id, PARENT_ATTR);
        scene.connect(parent.id, self.id, PARENT_ATTR)?;
        Ok(())
    }

    /// Resolves the stored parent link.
    #[must_use]
    pub fn graph_parent(self, scene: &Scene) -> Option<GraphNode> {
        let parent = scene.connected_first(self.id, PARENT_ATTR)?;
        GraphNode::from_node(scene, parent).ok()
    }

    /// Children: nodes whose parent link points at this node, optionally
    /// filtered by kind, in link-creation order.
    #[must_use]
    pub fn graph_children(self, scene: &Scene, of_kind: Option<ComponentKind>) -> Vec<GraphNode> {
        scene
            .outgoing(self.id)
            .into_iter()
            .filter(|plug| plug.attr == PARENT_ATTR)
            .filter_map(|plug| GraphNode::from_node(scene, plug.node).ok())
            .filter(|child| match of_kind {
                None => true,
                Some(kind) => child.kind(scene).ok() == Some(kind),
            })
            .collect()
    }

    /// First child of a kind.
    #[must_use]
    pub fn graph_child(self, scene: &Scene, kind: ComponentKind) -> Option<GraphNode> {
        self.graph_children(scene, Some(kind)).into_iter().next()
    }

    /// Walks parent links up to the asset root, if any.
    #[must_use]
    pub fn find_asset_root(self, scene: &Scene) -> Option<GraphNode> {
        let mut cursor = Some(self);
        while let Some(node) = cursor {
            if node.kind(scene).ok() == Some(ComponentKind::AssetRoot) {
                return Some(node);
            }
            cursor = node.graph_parent(scene);
        }
        None
    }

    /// Side markup (empty when unset).
    #[must_use]
    pub fn side(self, scene: &Scene) -> String {
        scene
            .attr(self.id, SIDE_ATTR)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default()
    }

    /// Region markup (empty when unset).
    #[must_use]
    pub fn region(self, scene: &Scene) -> String {
        scene
            .attr(self.id, REGION_ATTR)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default()
    }

    /// Stamps side and region markup.
    pub fn set_side_region(
        self,
        scene: &mut Scene,
        side: &str,
        region: &str,
    ) -> Result<(), BuildError> {
        scene.set_attr(self.id, SIDE_ATTR, side.to_lowercase())?;
        scene.set_attr(self.id, REGION_ATTR, region)?;
        Ok(())
    }

    /// Connects `nodes` into this node's `attr` plug, in order. With
    /// `owned`, also back-connects this node into each child's `owner` plug
    /// so ownership is traversable from either end.
    pub fn connect_nodes(
        self,
        scene: &mut Scene,
        nodes: &[NodeId],
        attr: &str,
        owned: bool,
    ) -> Result<(), BuildError> {
        for node in nodes {
            scene.connect(*node, self.id, attr)?;
            if owned {
                scene.connect(self.id, *node, "owner")?;
            }
        }
        Ok(())
    }

    /// Ordered nodes connected into `attr`.
    #[must_use]
    pub fn connected_nodes(self, scene: &Scene, attr: &str) -> Vec<NodeId> {
        scene.connected(self.id, attr)
    }

    /// First node connected into `attr`.
    #[must_use]
    pub fn connected_node(self, scene: &Scene, attr: &str) -> Option<NodeId> {
        scene.connected_first(self.id, attr)
    }
}

/// Classification predicate: a live `Network` node carrying the type tag.
#[must_use]
pub fn is_graph_node(scene: &Scene, id: NodeId) -> bool {
    scene.exists(id)
        && scene.kind(id) == Ok(NodeKind::Network)
        && scene.has_attr(id, TYPE_ATTR)
}

/// Every graph node in the scene, in id (creation) order.
#[must_use]
pub fn all_graph_nodes(scene: &Scene) -> Vec<GraphNode> {
    scene
        .nodes_of_kind(NodeKind::Network)
        .into_iter()
        .filter_map(|id| GraphNode::from_node(scene, id).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_discovered_by_reverse_query() {
        let mut scene = Scene::new();
        let root =
            GraphNode::create(&mut scene, None, ComponentKind::AssetRoot, 1).unwrap();
        let rig = GraphNode::create(&mut scene, Some(root), ComponentKind::Rig, 1).unwrap();
        let fk = GraphNode::create(&mut scene, Some(rig), ComponentKind::Fk, 1).unwrap();
        let ik = GraphNode::create(&mut scene, Some(rig), ComponentKind::Ik, 1).unwrap();

        let children = rig.graph_children(&scene, None);
        assert_eq!(children, vec![fk, ik]);
        let only_fk = rig.graph_children(&scene, Some(ComponentKind::Fk));
        assert_eq!(only_fk, vec![fk]);
        assert_eq!(fk.graph_parent(&scene), Some(rig));
        assert_eq!(ik.find_asset_root(&scene), Some(root));
    }

    #[test]
    fn rig_under_non_root_is_rejected() {
        let mut scene = Scene::new();
        let stray = GraphNode::create(&mut scene, None, ComponentKind::Fk, 1).unwrap();
        let err = GraphNode::create(&mut scene, Some(stray), ComponentKind::Rig, 1);
        assert!(matches!(err, Err(BuildError::WrongParent { .. })));
        let err = GraphNode::create(&mut scene, None, ComponentKind::Rig, 1);
        assert!(matches!(err, Err(BuildError::WrongParent { .. })));
    }
}
