// SPDX-License-Identifier: Apache-2.0
//! Per-asset anchor node.

use marionette_scene::{AttrValue, NodeId, Scene};

use crate::error::BuildError;
use crate::kind::ComponentKind;
use crate::node::{all_graph_nodes, GraphNode};
use crate::rig::Rig;

const ASSET_TYPE_ATTR: &str = "assetType";
const ASSET_ID_ATTR: &str = "assetId";
const ASSET_NAME_ATTR: &str = "assetName";
const ROOT_JOINT_ATTR: &str = "rootJoint";

/// Anchor for everything built against one imported asset.
///
/// Created once per asset; destroyed when the asset is removed. The rig and
/// any other per-asset graph nodes hang off this anchor through their
/// parent links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetRoot {
    node: GraphNode,
}

impl AssetRoot {
    /// Current definition version for the anchor node.
    pub const VERSION: u32 = 1;

    /// Creates the anchor and connects the skeleton root joint.
    pub fn create(
        scene: &mut Scene,
        root_joint: NodeId,
        asset_type: &str,
        asset_id: &str,
        asset_name: &str,
    ) -> Result<Self, BuildError> {
        let node = GraphNode::create(scene, None, ComponentKind::AssetRoot, Self::VERSION)?;
        scene.set_attr(node.id(), ASSET_TYPE_ATTR, asset_type)?;
        scene.set_attr(node.id(), ASSET_ID_ATTR, asset_id)?;
        scene.set_attr(node.id(), ASSET_NAME_ATTR, asset_name.to_lowercase())?;
        scene.connect(root_joint, node.id(), ROOT_JOINT_ATTR)?;
        Ok(Self { node })
    }

    /// Wraps an existing anchor node.
    pub fn from_node(scene: &Scene, id: NodeId) -> Result<Self, BuildError> {
        let node = GraphNode::from_node(scene, id)?;
        if node.kind(scene)? == ComponentKind::AssetRoot {
            Ok(Self { node })
        } else {
            Err(BuildError::NotAGraphNode(id))
        }
    }

    /// Underlying graph node.
    #[must_use]
    pub fn node(self) -> GraphNode {
        self.node
    }

    /// The skeleton root joint this asset was built against.
    #[must_use]
    pub fn root_joint(self, scene: &Scene) -> Option<NodeId> {
        self.node.connected_node(scene, ROOT_JOINT_ATTR)
    }

    /// Asset identifier.
    #[must_use]
    pub fn asset_id(self, scene: &Scene) -> String {
        self.string_attr(scene, ASSET_ID_ATTR)
    }

    /// Asset type tag.
    #[must_use]
    pub fn asset_type(self, scene: &Scene) -> String {
        self.string_attr(scene, ASSET_TYPE_ATTR)
    }

    /// Asset display name.
    #[must_use]
    pub fn asset_name(self, scene: &Scene) -> String {
        self.string_attr(scene, ASSET_NAME_ATTR)
    }

    fn string_attr(self, scene: &Scene, attr: &str) -> String {
        scene
            .attr(self.node.id(), attr)
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default()
    }

    /// The rig built under this anchor, if any.
    #[must_use]
    pub fn rig(self, scene: &Scene) -> Option<Rig> {
        self.node
            .graph_child(scene, ComponentKind::Rig)
            .and_then(|n| Rig::from_node(scene, n.id()).ok())
    }
}

/// Every asset root in the scene, in creation order.
#[must_use]
pub fn all_asset_roots(scene: &Scene) -> Vec<AssetRoot> {
    all_graph_nodes(scene)
        .into_iter()
        .filter(|n| n.kind(scene).ok() == Some(ComponentKind::AssetRoot))
        .map(|node| AssetRoot { node })
        .collect()
}

/// Finds an asset root by its asset id.
#[must_use]
pub fn asset_root_by_id(scene: &Scene, asset_id: &str) -> Option<AssetRoot> {
    all_asset_roots(scene).into_iter().find(|root| {
        scene
            .attr(root.node.id(), ASSET_ID_ATTR)
            .and_then(AttrValue::as_str)
            == Some(asset_id)
    })
}
