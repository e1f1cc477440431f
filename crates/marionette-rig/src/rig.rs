// SPDX-License-Identifier: Apache-2.0
//! Rig container node.
//!
//! Singleton under an asset root. Owns the rig hierarchy groups (`*_all`,
//! `DO_NOT_TOUCH`, `flags_all`), carries the global `rigScale` channel, and
//! lists its components in creation order for serialization.

use marionette_scene::{AttrValue, LinkOp, NodeId, NodeKind, Plug, Scene};

use crate::component::AnyComponent;
use crate::error::BuildError;
use crate::kind::ComponentKind;
use crate::node::GraphNode;
use crate::root::AssetRoot;

const ALL_ATTR: &str = "all";
const DNT_ATTR: &str = "doNotTouch";
const FLAGS_ALL_ATTR: &str = "flagsAll";
/// Global scale channel driven from the all-group's x scale.
pub const RIG_SCALE_ATTR: &str = "rigScale";

/// The rig node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rig {
    node: GraphNode,
}

impl Rig {
    /// Current definition version.
    pub const VERSION: u32 = 1;

    /// Creates the rig under `root` and builds the container hierarchy.
    ///
    /// # Errors
    /// [`BuildError::WrongParent`] when `root` is not an asset root (the
    /// rig is singleton-per-root).
    pub fn create(scene: &mut Scene, root: &AssetRoot) -> Result<Self, BuildError> {
        let node = GraphNode::create(
            scene,
            Some(root.node()),
            ComponentKind::Rig,
            Self::VERSION,
        )?;
        let asset_name = root.asset_name(scene);
        let asset_name = if asset_name.is_empty() {
            "asset".to_owned()
        } else {
            asset_name
        };

        let all_grp = scene.create_node(format!("{asset_name}_all"), NodeKind::Transform);
        let dnt_grp = scene.create_node("DO_NOT_TOUCH", NodeKind::Transform);
        let flags_grp = scene.create_node("flags_all", NodeKind::Transform);
        scene.set_parent(dnt_grp, Some(all_grp))?;
        scene.set_parent(flags_grp, Some(all_grp))?;
        if let Some(root_joint) = root.root_joint(scene) {
            scene.set_parent(root_joint, Some(all_grp))?;
        }

        scene.set_attr(node.id(), RIG_SCALE_ATTR, 1.0_f64)?;
        scene.add_link(
            Plug::new(all_grp, "sx"),
            LinkOp::Direct,
            Plug::new(node.id(), RIG_SCALE_ATTR),
        )?;

        node.connect_nodes(scene, &[all_grp], ALL_ATTR, true)?;
        node.connect_nodes(scene, &[dnt_grp], DNT_ATTR, true)?;
        node.connect_nodes(scene, &[flags_grp], FLAGS_ALL_ATTR, true)?;
        Ok(Self { node })
    }

    /// Wraps an existing rig node.
    pub fn from_node(scene: &Scene, id: NodeId) -> Result<Self, BuildError> {
        let node = GraphNode::from_node(scene, id)?;
        if node.kind(scene)? == ComponentKind::Rig {
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

    /// Top group of the rig hierarchy.
    #[must_use]
    pub fn all_group(self, scene: &Scene) -> Option<NodeId> {
        self.node.connected_node(scene, ALL_ATTR)
    }

    /// Master do-not-touch container.
    #[must_use]
    pub fn do_not_touch(self, scene: &Scene) -> Option<NodeId> {
        self.node.connected_node(scene, DNT_ATTR)
    }

    /// Master flags container.
    #[must_use]
    pub fn flags_all(self, scene: &Scene) -> Option<NodeId> {
        self.node.connected_node(scene, FLAGS_ALL_ATTR)
    }

    /// The asset root this rig hangs under.
    #[must_use]
    pub fn asset_root(self, scene: &Scene) -> Option<AssetRoot> {
        self.node
            .find_asset_root(scene)
            .and_then(|n| AssetRoot::from_node(scene, n.id()).ok())
    }

    /// Current global scale value.
    #[must_use]
    pub fn rig_scale(self, scene: &Scene) -> f64 {
        scene
            .attr(self.node.id(), RIG_SCALE_ATTR)
            .and_then(AttrValue::as_float)
            .unwrap_or(1.0)
    }

    /// Scales the whole rig by scaling the all-group uniformly.
    pub fn set_rig_scale(self, scene: &mut Scene, value: f64) -> Result<(), BuildError> {
        if let Some(all_grp) = self.all_group(scene) {
            let mut local = scene.local(all_grp)?;
            local.scale = glam::DVec3::splat(value);
            scene.set_local(all_grp, local)?;
        }
        Ok(())
    }

    /// Components owned by this rig, in creation order.
    #[must_use]
    pub fn components(self, scene: &Scene) -> Vec<AnyComponent> {
        self.node
            .graph_children(scene, None)
            .into_iter()
            .filter_map(|child| AnyComponent::resolve(scene, child.id()).ok())
            .collect()
    }

    /// Re-applies per-component scale wiring after a build or load pass.
    pub fn finalize(self, scene: &mut Scene) -> Result<(), BuildError> {
        for component in self.components(scene) {
            component.set_scale(scene, &self)?;
        }
        Ok(())
    }
}
